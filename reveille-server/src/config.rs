//! Daemon configuration.
//!
//! Everything has a compiled default and can be overridden from the
//! environment:
//!
//! - `REVEILLE_BIND`  -- listen address (default `0.0.0.0`)
//! - `REVEILLE_PORT`  -- listen port (default 49500)
//! - `REVEILLE_STORE` -- preference file path (default `reveille-prefs.json`)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_BIND_PORT: u16 = 49500;
const DEFAULT_STORE_PATH: &str = "reveille-prefs.json";

/// How often the scheduler re-reads preferences and checks the wakeup
/// window. Should be no longer than the tightest window in use.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Buzzer on/off half-period while ringing.
const RING_CYCLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub bind_port: u16,
    pub store_path: PathBuf,
    pub poll_interval: Duration,
    pub ring_cycle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            bind_port: DEFAULT_BIND_PORT,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            poll_interval: POLL_INTERVAL,
            ring_cycle: RING_CYCLE,
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(addr) = env::var("REVEILLE_BIND") {
            config.bind_address = addr;
        }
        if let Ok(port) = env::var("REVEILLE_PORT") {
            config.bind_port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid REVEILLE_PORT: {port}")))?;
        }
        if let Ok(path) = env::var("REVEILLE_STORE") {
            config.store_path = PathBuf::from(path);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provisioning() {
        let config = Config::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.bind_port, 49500);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
    }
}
