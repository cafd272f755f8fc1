use std::env;

use anyhow::{Context, Result};

/// HTTP-edge-specific settings layered on top of `fetch_core::Config`
/// (spec §10: `Config` loaded via `dotenvy::dotenv()` + `std::env::var`,
/// mirroring `packages/server/src/config.rs`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub rate_limit_per_minute: u32,
    pub core: fetch_core::Config,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            rate_limit_per_minute: 120,
            core: fetch_core::Config::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Ok(v) = env::var("FETCH_SERVER_PORT") {
            cfg.port = v.parse().context("FETCH_SERVER_PORT must be an integer")?;
        }
        if let Ok(v) = env::var("FETCH_SERVER_BIND_ADDR") {
            cfg.bind_addr = v;
        }
        if let Ok(v) = env::var("FETCH_RATE_LIMIT_PER_MINUTE") {
            cfg.rate_limit_per_minute = v.parse().context("FETCH_RATE_LIMIT_PER_MINUTE must be an integer")?;
        }

        cfg.core = fetch_core::Config::from_env()?;
        Ok(cfg)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
