use anyhow::Result;
use clap::Subcommand;

use super::App;

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// List users in the catalog
    List,
}

pub async fn run(app: &App, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::List => {
            let store = app.open_store()?;
            for user in store.users() {
                println!("{}: {} ({} playlists)", user.id, user.name, user.playlists.len());
            }
            Ok(())
        }
    }
}
