//! Runtime settings for the server binary.
//!
//! Settings come from environment variables.  `from_lookup` takes the
//! lookup as a function so tests do not need to touch the process
//! environment.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DATA_DIR_VAR: &str = "BONIFICATION_DATA_DIR";
pub const BIND_ADDR_VAR: &str = "BONIFICATION_BIND_ADDR";
pub const LOG_JSON_VAR: &str = "BONIFICATION_LOG_JSON";

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `catalog.json` and `rules.json`.
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup(DATA_DIR_VAR).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let addr = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = addr
            .parse()
            .with_context(|| format!("{BIND_ADDR_VAR} is not a socket address: {addr}"))?;
        let log_json = lookup(LOG_JSON_VAR).map(|v| parse_bool(&v)).unwrap_or(false);
        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            bind_addr,
            log_json,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
