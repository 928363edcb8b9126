//! Layered configuration: typed defaults, optional TOML file, validation.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, TftpClientError};
use crate::AddressFamily;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_hostname: String,
    pub server_port: u16,
    pub address_family: AddressFamily,
    pub rx_inactivity_timeout_ms: u32,
    pub logging: LoggingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_hostname: String::new(),
            server_port: crate::DEFAULT_SERVER_PORT,
            address_family: AddressFamily::Unspecified,
            rx_inactivity_timeout_ms: crate::DEFAULT_TIMEOUT_MS,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    /// Emit one structured `AuditEvent` per transfer lifecycle milestone.
    pub transfer_audit: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
            transfer_audit: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

pub fn load_config(path: &std::path::Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: ClientConfig = toml::from_str(&contents)
        .map_err(|e| TftpClientError::CfgInvalid(format!("{}: {e}", path.display())))?;
    Ok(config)
}

pub fn write_default_config(path: &std::path::Path) -> Result<()> {
    write_config(path, &ClientConfig::default())
}

pub fn write_config(path: &std::path::Path, config: &ClientConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| TftpClientError::CfgInvalid(format!("failed to serialize config: {e}")))?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn validate_config(config: &ClientConfig) -> Result<()> {
    if config.server_hostname.trim().is_empty() {
        return Err(TftpClientError::CfgInvalid(
            "server_hostname must not be empty".to_string(),
        ));
    }

    if config.server_port == 0 {
        return Err(TftpClientError::CfgInvalid(
            "server_port must be non-zero".to_string(),
        ));
    }

    if config.rx_inactivity_timeout_ms == 0 {
        return Err(TftpClientError::CfgInvalid(
            "rx_inactivity_timeout_ms must be non-zero".to_string(),
        ));
    }

    if let Some(ref log_file) = config.logging.file {
        let parent = log_file.parent().filter(|p| !p.as_os_str().is_empty());
        let parent = parent.ok_or_else(|| {
            TftpClientError::CfgInvalid("logging.file must include a parent directory".to_string())
        })?;
        match std::fs::metadata(parent) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(TftpClientError::CfgInvalid(
                    "logging.file parent must be a directory".to_string(),
                ));
            }
            Err(e) => {
                return Err(TftpClientError::CfgInvalid(format!(
                    "logging.file parent error: {e}"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("create temp dir")
    }

    #[test]
    fn parses_minimal_toml() {
        let log_dir = temp_dir();
        let toml = format!(
            r#"
server_hostname = "tftp.example.test"

[logging]
file = "{}/client.log"
"#,
            log_dir.path().display()
        );
        let config: ClientConfig = toml::from_str(&toml).unwrap();
        assert_eq!(config.server_port, crate::DEFAULT_SERVER_PORT);
        validate_config(&config).unwrap();
    }

    #[test]
    fn rejects_empty_hostname() {
        let config = ClientConfig::default();
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{err}").contains("server_hostname"));
    }

    #[test]
    fn rejects_zero_port() {
        let config = ClientConfig {
            server_hostname: "host".into(),
            server_port: 0,
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{err}").contains("server_port"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = ClientConfig {
            server_hostname: "host".into(),
            rx_inactivity_timeout_ms: 0,
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{err}").contains("rx_inactivity_timeout_ms"));
    }

    #[test]
    fn rejects_logging_file_with_missing_parent() {
        let config = ClientConfig {
            server_hostname: "host".into(),
            logging: LoggingConfig {
                file: Some(PathBuf::from("/nonexistent/tftp-client/log.txt")),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{err}").contains("logging.file parent error"));
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = temp_dir();
        let path = dir.path().join("client.toml");
        let mut config = ClientConfig::default();
        config.server_hostname = "tftp.example.test".into();
        write_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.server_hostname, config.server_hostname);
    }

    #[test]
    fn write_default_config_is_valid_once_hostname_is_set() {
        let dir = temp_dir();
        let path = dir.path().join("default.toml");
        write_default_config(&path).unwrap();
        let mut loaded = load_config(&path).unwrap();
        loaded.server_hostname = "host".into();
        validate_config(&loaded).unwrap();
    }
}
