use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use uuid::Uuid;

pub const BIND_VAR: &str = "GRAPH_ANYTHING_BIND";
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "GRAPH_ANYTHING_MAX_CONNECTIONS";
pub const DEFAULT_USER_ID_VAR: &str = "GRAPH_ANYTHING_DEFAULT_USER_ID";
pub const DEFAULT_USER_EMAIL_VAR: &str = "GRAPH_ANYTHING_DEFAULT_USER_EMAIL";
pub const REQUIRE_USER_HEADER_VAR: &str = "GRAPH_ANYTHING_REQUIRE_USER_HEADER";

const DEFAULT_BIND: &str = "127.0.0.1:4010";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Absent means graphs are kept in memory for the life of the process.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub default_user_id: Option<Uuid>,
    pub default_user_email: String,
    pub require_user_header: bool,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup(BIND_VAR).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid {BIND_VAR} '{bind}'"))?;

        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {MAX_CONNECTIONS_VAR} '{raw}'"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let default_user_id = lookup(DEFAULT_USER_ID_VAR)
            .map(|raw| {
                Uuid::parse_str(raw.trim())
                    .with_context(|| format!("invalid {DEFAULT_USER_ID_VAR} '{raw}'"))
            })
            .transpose()?;

        Ok(Self {
            bind,
            database_url: lookup(DATABASE_URL_VAR).filter(|url| !url.trim().is_empty()),
            max_connections,
            default_user_id,
            default_user_email: lookup(DEFAULT_USER_EMAIL_VAR)
                .unwrap_or_else(|| "graph-anything@example.local".to_string()),
            require_user_header: lookup(REQUIRE_USER_HEADER_VAR)
                .map(|value| flag(&value))
                .unwrap_or(false),
        })
    }
}

fn flag(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}
