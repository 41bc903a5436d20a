use anyhow::{Context, Result};
use clap::Subcommand;

use super::App;
use cloudtune_core::SanitizedConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration, session cookie redacted
    Show,
}

pub async fn run(app: &App, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let sanitized = SanitizedConfig::from(&app.config);
            let rendered =
                toml::to_string_pretty(&sanitized).context("Failed to render configuration")?;
            print!("{}", rendered);
            Ok(())
        }
    }
}
