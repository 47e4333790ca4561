use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Prefix for environment variables used when no config file is present
pub const ENV_PREFIX: &str = "MCP_CRUD_";

/// Backend connection parameters.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpCrudConfig {
    pub db_user: String,
    pub db_password: String,
    pub db_host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub db_port: u16,
    pub db_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

impl McpCrudConfig {
    /// `user@host:port/db`, safe to log
    pub fn target(&self) -> String {
        format!("{}@{}:{}/{}", self.db_user, self.db_host, self.db_port, self.db_name)
    }

    /// Template written by `init-config`
    pub fn template() -> Self {
        Self {
            db_user: "postgres".to_string(),
            db_password: "postgres".to_string(),
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_name: "postgres".to_string(),
            connect_timeout_secs: Some(10),
            command_timeout_secs: None,
        }
    }

    /// Build from `MCP_CRUD_*` variables via `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            let name = format!("{}{}", ENV_PREFIX, key);
            lookup(&name).ok_or_else(|| Error::Config(format!("{} is not set", name)))
        };

        let port = var("DB_PORT")?;
        let db_port: u16 = port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("invalid port '{}'", port)))?;
        let optional_secs = |key: &str| -> Result<Option<u64>> {
            let name = format!("{}{}", ENV_PREFIX, key);
            lookup(&name)
                .map(|v| {
                    v.trim()
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid {} '{}'", name, v)))
                })
                .transpose()
        };

        Ok(Self {
            db_user: var("DB_USER")?,
            db_password: var("DB_PASSWORD")?,
            db_host: var("DB_HOST")?,
            db_port,
            db_name: var("DB_NAME")?,
            connect_timeout_secs: optional_secs("CONNECT_TIMEOUT_SECS")?,
            command_timeout_secs: optional_secs("COMMAND_TIMEOUT_SECS")?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl std::fmt::Debug for McpCrudConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpCrudConfig")
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_name", &self.db_name)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("command_timeout_secs", &self.command_timeout_secs)
            .finish()
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{}'", s))),
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}

fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Read a config file; `.toml` is parsed as TOML, anything else as JSON.
pub fn read_config(path: &Path) -> Result<McpCrudConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let parsed: std::result::Result<McpCrudConfig, String> = if is_toml(path) {
        toml::from_str(&contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&contents).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Config(format!("malformed {}: {}", path.display(), e)))
}

/// Load from `path` (or `config.json`), falling back to the environment
/// only when the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<McpCrudConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if path.exists() {
        return read_config(&path);
    }

    tracing::debug!("{} not found, reading {}* environment", path.display(), ENV_PREFIX);
    McpCrudConfig::from_env().map_err(|e| {
        Error::Config(format!("no config file at {} and {}", path.display(), e))
    })
}

pub fn write_config(path: &Path, config: &McpCrudConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = if is_toml(path) {
        toml::to_string_pretty(config)?
    } else {
        serde_json::to_string_pretty(config)?
    };
    std::fs::write(path, contents)?;
    Ok(())
}
