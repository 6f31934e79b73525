use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Values that ship in sample `.env` files and must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "changeme",
    "secret",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub max_upload_mb: usize,
    pub bootstrap_admins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Unset and empty values take
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("BACKSTAGE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BACKSTAGE_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = match var("BACKSTAGE_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("BACKSTAGE_PORT is not a port number: {raw}"))?,
            None => 3000,
        };
        let max_upload_mb: usize = match var("BACKSTAGE_MAX_UPLOAD_MB") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("BACKSTAGE_MAX_UPLOAD_MB is not a number: {raw}"))?,
            None => 50,
        };
        if max_upload_mb == 0 {
            bail!("BACKSTAGE_MAX_UPLOAD_MB must be at least 1");
        }

        let bootstrap_admins = var("BACKSTAGE_BOOTSTRAP_ADMINS")
            .map(|list| {
                list.split(',')
                    .map(|email| email.trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            jwt_secret,
            db_path: var("BACKSTAGE_DB_PATH").unwrap_or_else(|| "backstage.db".into()).into(),
            storage_dir: var("BACKSTAGE_STORAGE_DIR").unwrap_or_else(|| "./storage".into()).into(),
            host: var("BACKSTAGE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            public_url: var("BACKSTAGE_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}")),
            max_upload_mb,
            bootstrap_admins,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}
