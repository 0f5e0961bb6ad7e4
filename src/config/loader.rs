//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `workspace.dir`.
pub const ENV_WORKSPACE_DIR: &str = "WORKSPACE_DIR";
/// Environment variable overriding the port of `listener.bind_address`.
pub const ENV_PORT: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Env { var: &'static str, value: String },
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Env { var, value } => write!(f, "Invalid value for {}: '{}'", var, value),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `WORKSPACE_DIR` / `PORT` overrides using `lookup` to read variables.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_WORKSPACE_DIR).filter(|d| !d.is_empty()) {
        config.workspace.dir = PathBuf::from(dir);
    }

    if let Some(port) = lookup(ENV_PORT) {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: ENV_PORT,
            value: port.clone(),
        })?;
        config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
            Ok(mut addr) => {
                addr.set_port(port);
                addr.to_string()
            }
            Err(_) => format!("127.0.0.1:{}", port),
        };
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "[listener]\nbind_address = \"0.0.0.0:5000\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:5000");
    }

    #[test]
    fn test_load_reports_parse_and_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");

        fs::write(&path, "[listener\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));

        fs::write(&path, "[timeouts]\nrequest_secs = 0\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));

        assert!(matches!(
            load_config(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        apply_env_overrides(&mut config, env(&[("WORKSPACE_DIR", "/tmp/ws"), ("PORT", "8088")])).unwrap();

        assert_eq!(config.workspace.dir, PathBuf::from("/tmp/ws"));
        assert_eq!(config.listener.bind_address, "127.0.0.1:8088");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = ServerConfig::default();
        let result = apply_env_overrides(&mut config, env(&[("PORT", "eighty")]));
        assert!(matches!(result, Err(ConfigError::Env { var: "PORT", .. })));
    }
}
