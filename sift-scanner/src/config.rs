//! Configuration resolution for sift-scanner
//!
//! Two-tier resolution with ENV taking priority over the TOML file at
//! `~/.config/sift/scanner.toml`. Provider credentials are required; the
//! rest has defaults.

use serde::Deserialize;
use sift_common::{Error, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Default service port
pub const DEFAULT_PORT: u16 = 5741;

/// TOML file shape
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub classifier_command: Option<String>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub port: u16,
    /// OAuth application id for the token refresh Basic header
    pub client_id: String,
    pub client_secret: String,
    /// Long-lived refresh token obtained out-of-band by the login flow
    pub refresh_token: String,
    /// Optional bootstrap access token; refreshed on first 401 otherwise
    pub access_token: Option<String>,
    /// External classifier scorer command; audio analysis degrades to
    /// unscored tracks when it is absent
    pub classifier_command: Option<String>,
}

impl ScannerConfig {
    /// Load from ENV → TOML.
    pub fn load() -> Result<Self> {
        let toml_path = default_config_path();
        let toml_config = read_toml(&toml_path)?;
        Self::resolve_with(toml_config, |key| std::env::var(key).ok())
    }

    /// Resolution core, testable without touching the process environment.
    pub fn resolve_with(
        toml_config: TomlConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let pick = |env_key: &str, toml_value: Option<String>| -> Option<String> {
            match (env(env_key), toml_value) {
                (Some(from_env), Some(_)) => {
                    warn!(
                        "{} found in both environment and TOML; using environment",
                        env_key
                    );
                    Some(from_env)
                }
                (Some(from_env), None) => Some(from_env),
                (None, from_toml) => from_toml,
            }
        };

        let port = match env("SIFT_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("SIFT_PORT is not a port number: {raw}")))?,
            None => toml_config.port.unwrap_or(DEFAULT_PORT),
        };

        let client_id = pick("SIFT_CLIENT_ID", toml_config.client_id);
        let client_secret = pick("SIFT_CLIENT_SECRET", toml_config.client_secret);
        let refresh_token = pick("SIFT_REFRESH_TOKEN", toml_config.refresh_token);

        let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (client_id, client_secret, refresh_token)
        else {
            return Err(Error::Config(
                "Provider credentials not configured. Set all of:\n\
                 1. Environment: SIFT_CLIENT_ID, SIFT_CLIENT_SECRET, SIFT_REFRESH_TOKEN\n\
                 2. or TOML config: ~/.config/sift/scanner.toml (client_id, client_secret, refresh_token)"
                    .to_string(),
            ));
        };

        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(Error::Config("Provider credentials are empty".to_string()));
        }

        Ok(ScannerConfig {
            port,
            client_id,
            client_secret,
            refresh_token,
            access_token: pick("SIFT_ACCESS_TOKEN", toml_config.access_token),
            classifier_command: pick("SIFT_CLASSIFIER_CMD", toml_config.classifier_command),
        })
    }
}

/// `~/.config/sift/scanner.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sift")
        .join("scanner.toml")
}

fn read_toml(path: &PathBuf) -> Result<TomlConfig> {
    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {e}")))?;
    let config =
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {e}")))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn toml_with_creds() -> TomlConfig {
        TomlConfig {
            client_id: Some("toml-id".into()),
            client_secret: Some("toml-secret".into()),
            refresh_token: Some("toml-refresh".into()),
            ..TomlConfig::default()
        }
    }

    #[test]
    fn env_overrides_toml() {
        let env = env_of(&[("SIFT_CLIENT_ID", "env-id")]);
        let config =
            ScannerConfig::resolve_with(toml_with_creds(), |k| env.get(k).cloned()).unwrap();

        assert_eq!(config.client_id, "env-id");
        assert_eq!(config.client_secret, "toml-secret");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn missing_credentials_fail_with_guidance() {
        let err = ScannerConfig::resolve_with(TomlConfig::default(), |_| None).unwrap_err();
        assert!(err.to_string().contains("SIFT_CLIENT_ID"));
    }

    #[test]
    fn port_resolution() {
        let env = env_of(&[("SIFT_PORT", "8080")]);
        let config =
            ScannerConfig::resolve_with(toml_with_creds(), |k| env.get(k).cloned()).unwrap();
        assert_eq!(config.port, 8080);

        let mut toml = toml_with_creds();
        toml.port = Some(9000);
        let config = ScannerConfig::resolve_with(toml, |_| None).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn invalid_port_rejected() {
        let env = env_of(&[("SIFT_PORT", "not-a-port")]);
        assert!(ScannerConfig::resolve_with(toml_with_creds(), |k| env.get(k).cloned()).is_err());
    }

    #[test]
    fn toml_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanner.toml");
        std::fs::write(
            &path,
            "client_id = \"abc\"\nclient_secret = \"def\"\nrefresh_token = \"ghi\"\nport = 6000\n",
        )
        .unwrap();

        let parsed = read_toml(&path).unwrap();
        let config = ScannerConfig::resolve_with(parsed, |_| None).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.client_id, "abc");
    }
}
