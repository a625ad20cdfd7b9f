use std::path::PathBuf;

use anyhow::{Context, Result};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Server settings, read from `ATLAS_*` environment variables (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub attachment_dir: PathBuf,
    pub token_days: i64,
    pub backup_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port: u16 = or("ATLAS_PORT", "3000")
            .parse()
            .context("ATLAS_PORT must be a port number")?;
        let token_days: i64 = or("ATLAS_TOKEN_DAYS", "30")
            .parse()
            .context("ATLAS_TOKEN_DAYS must be a whole number of days")?;

        Ok(Self {
            host: or("ATLAS_HOST", "0.0.0.0"),
            port,
            db_path: or("ATLAS_DB_PATH", "mushroomatlas.db").into(),
            jwt_secret: get("ATLAS_JWT_SECRET").unwrap_or_default(),
            attachment_dir: or("ATLAS_ATTACHMENT_DIR", "./attachments").into(),
            token_days,
            backup_dir: or("ATLAS_BACKUP_DIR", "backups").into(),
        })
    }

    /// Only the HTTP server signs tokens, so only `serve` insists on a real secret.
    pub fn has_usable_secret(&self) -> bool {
        !self.jwt_secret.is_empty() && !PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("mushroomatlas.db"));
        assert_eq!(config.token_days, 30);
        assert!(!config.has_usable_secret());
    }

    #[test]
    fn placeholder_secrets_are_rejected() {
        assert!(!config(&[("ATLAS_JWT_SECRET", "dev-secret-change-me")]).unwrap().has_usable_secret());
        assert!(config(&[("ATLAS_JWT_SECRET", "s3cr3t-houby")]).unwrap().has_usable_secret());
    }

    #[test]
    fn bad_port_is_an_error() {
        assert!(config(&[("ATLAS_PORT", "houby")]).is_err());
    }
}
