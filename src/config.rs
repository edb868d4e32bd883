use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};
use service::PortRange;

/// Log verbosity, mirrored from `log::LevelFilter` so it can be deserialized
/// straight out of the config file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_level(&self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warn => log::Level::Warn,
            Self::Info => log::Level::Info,
            Self::Debug => log::Level::Debug,
            Self::Trace => log::Level::Trace,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub level: LogLevel,
}

/// Server-facing settings: which UDP sockets to listen on, the realm
/// advertised in 401 challenges, and the port range relay sockets are
/// allocated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    /// Addresses to bind listening sockets on. Each becomes its own
    /// independent reactor.
    pub interfaces: Vec<SocketAddr>,
    /// Realm string sent in 401 challenges and expected back in
    /// authenticated requests.
    pub realm: String,
    /// Value of the SOFTWARE attribute in responses.
    #[serde(default = "default_software")]
    pub software: String,
    /// Range relay sockets are bound from.
    #[serde(default)]
    pub port_range: PortRange,
    /// How often the allocation table is swept for expired allocations and
    /// permissions.
    #[serde(default = "default_collect_interval_secs")]
    pub collect_interval_secs: u64,
    /// Permission lifetime assumed when a CreatePermission request doesn't
    /// carry a LIFETIME attribute.
    #[serde(default = "default_permission_lifetime_secs")]
    pub default_permission_lifetime_secs: u32,
    /// Upper bound on a requested permission lifetime; a CreatePermission
    /// asking for more is rejected with 400, not silently capped.
    #[serde(default = "default_max_permission_lifetime_secs")]
    pub max_permission_lifetime_secs: u32,
    /// Size of the buffer the client-facing socket reads into. Datagrams
    /// that don't fit are truncated and dropped as malformed.
    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,
    /// Deadline for writing a response back to the client.
    #[serde(default = "default_write_deadline_millis")]
    pub write_deadline_millis: u64,
}

fn default_software() -> String {
    "turn-server".to_string()
}

fn default_collect_interval_secs() -> u64 {
    1
}

fn default_permission_lifetime_secs() -> u32 {
    60
}

fn default_max_permission_lifetime_secs() -> u32 {
    3600
}

fn default_read_buffer() -> usize {
    1024
}

fn default_write_deadline_millis() -> u64 {
    1000
}

/// Long-term credentials, keyed by username.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Auth {
    #[serde(default)]
    pub static_credentials: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: Server,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub log: Log,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Pure rust-implemented TURN server.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, short, default_value = "turn-server.toml")]
    pub config: String,
}
