//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AuthConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Why a configuration file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", joined(.0))]
    Validation(Vec<ValidationError>),
}

fn joined(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AuthConfig, ConfigError> {
    let config: AuthConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AuthConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [identity]
            token_endpoint = "https://idp.example.com/oauth/token"
            issuer = "https://idp.example.com/"

            [token]
            window_width_secs = 600
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.token.window_width_secs, 600);
        assert_eq!(config.token.expiry_threshold_secs, 3600);
        assert_eq!(
            config.identity.token_endpoint.as_deref(),
            Some("https://idp.example.com/oauth/token")
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let err = parse_config("[circuit]\nstand_down_secs = 0\n").unwrap_err();
        assert!(err.to_string().starts_with("invalid config: circuit.stand_down_secs"));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("[identity\nissuer = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("config is not valid TOML"));
    }
}
