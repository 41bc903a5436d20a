use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Provider URL is set and request timeout is not 0
/// - Download and upload attempt counts are at least 1
/// - An SFTP mirror has a host, a username and a non-zero port
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.provider.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "provider.base_url cannot be empty".to_string(),
        ));
    }

    if config.provider.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "provider.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.download.attempts == 0 {
        return Err(ConfigError::ValidationError(
            "download.attempts cannot be 0".to_string(),
        ));
    }

    if config.mirror.put_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "mirror.put_attempts cannot be 0".to_string(),
        ));
    }

    if let Some(sftp) = &config.mirror.sftp {
        if sftp.host.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mirror.sftp.host cannot be empty".to_string(),
            ));
        }
        if sftp.username.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mirror.sftp.username cannot be empty".to_string(),
            ));
        }
        if sftp.port == 0 {
            return Err(ConfigError::ValidationError(
                "mirror.sftp.port cannot be 0".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_base_url_fails() {
        let mut config = Config::default();
        config.provider.base_url = "  ".to_string();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = Config::default();
        config.download.attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.mirror.put_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.provider.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_sftp_mirror() {
        use crate::config::SftpConfig;

        let mut config = Config::default();
        config.mirror.sftp = Some(SftpConfig::new("radio.example.org", 2022, "dj"));
        assert!(validate_config(&config).is_ok());

        config.mirror.sftp = Some(SftpConfig::new("radio.example.org", 2022, " "));
        assert!(validate_config(&config).is_err());

        config.mirror.sftp = Some(SftpConfig::new("", 2022, "dj"));
        assert!(validate_config(&config).is_err());

        config.mirror.sftp = Some(SftpConfig::new("radio.example.org", 0, "dj"));
        assert!(validate_config(&config).is_err());
    }
}
