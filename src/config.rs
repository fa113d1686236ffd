use std::{net, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub db: Db,
    pub http: Http,
    pub jwt: Jwt,
    #[serde(default)]
    pub maintenance: Maintenance,
    #[serde(default)]
    pub log: Log,
}

#[derive(Deserialize)]
pub struct Db {
    pub url: String,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    #[serde(with = "humantime_serde")]
    pub expiration_time: time::Duration,
}

/// Maintenance ticket policy knobs.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Maintenance {
    /// Age after which an unresolved ticket counts as overdue.
    #[serde(with = "humantime_serde")]
    pub overdue_after: time::Duration,

    /// Whether CLOSED tickets are left out of the overdue count.
    pub overdue_excludes_closed: bool,
}

impl Default for Maintenance {
    fn default() -> Self {
        Self {
            overdue_after: time::Duration::from_secs(7 * 24 * 60 * 60),
            overdue_excludes_closed: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Log {
    /// `tracing_subscriber::EnvFilter` directives, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}
