use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level key accepted in place of `[log] msg_limit` by older config files.
const LEGACY_LOG_LIMIT_KEY: &str = "log_msg_limit";

const DEFAULT_QUOTE_URL: &str = "https://inspirobot.me/api?generate=true";

/// Section name -> (key -> value). Values stay opaque TOML primitives; the
/// typed accessors below interpret the keys the bot knows about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    sections: BTreeMap<String, toml::Table>,
}

impl Config {
    /// Load the config file, falling back to defaults when it is missing or
    /// malformed. Startup never fails here.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => {
                info!("Configuration loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{:#}; continuing with default configuration", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;

        let mut config = Self::default();
        let mut legacy_limit = None;
        for (name, value) in table {
            match value {
                toml::Value::Table(section) => {
                    config.sections.insert(name, section);
                }
                // Bare top-level keys are only meaningful for the legacy limit.
                other if name == LEGACY_LOG_LIMIT_KEY => legacy_limit = Some(other),
                _ => warn!("Ignoring top-level config key outside a section: {}", name),
            }
        }

        // `[log] msg_limit` wins over the bare legacy key.
        if let Some(limit) = legacy_limit {
            if config.get("log", "msg_limit").is_some() {
                warn!(
                    "Both {} and [log] msg_limit are set; using [log] msg_limit",
                    LEGACY_LOG_LIMIT_KEY
                );
            } else {
                config.set("log", "msg_limit", limit);
            }
        }
        Ok(config)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&toml::Value> {
        self.sections.get(section).and_then(|s| s.get(key))
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<toml::Value>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn get_str(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).and_then(|v| v.as_str())
    }

    /// Integers may be written bare or quoted.
    pub fn get_u64(&self, section: &str, key: &str) -> Option<u64> {
        match self.get(section, key)? {
            toml::Value::Integer(i) => u64::try_from(*i).ok(),
            toml::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Message log capacity; 0 means unbounded.
    pub fn log_msg_limit(&self) -> usize {
        self.get_u64("log", "msg_limit")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    pub fn log_path(&self) -> PathBuf {
        self.get_str("log", "path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("messages.log"))
    }

    pub fn token_file(&self) -> PathBuf {
        self.get_str("bot", "token_file")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("token.txt"))
    }

    /// Channel that receives member-join greetings, if any.
    pub fn welcome_channel_id(&self) -> Option<u64> {
        self.get_u64("welcome", "channel_id").filter(|id| *id != 0)
    }

    pub fn quote_url(&self) -> String {
        self.get_str("quote", "url")
            .unwrap_or(DEFAULT_QUOTE_URL)
            .to_string()
    }
}

/// Read the bot credential. Unlike the config file, a missing token is fatal.
pub fn load_token(path: &Path) -> Result<String> {
    let token = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file: {}", path.display()))?;
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("Token file is empty: {}", path.display());
    }
    Ok(token.to_string())
}
