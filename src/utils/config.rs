// src/utils/config.rs
//! Engine configuration
//!
//! Every value has a compiled-in default matching what the client expects, so
//! the module works injected with no configuration at all. Overrides come from
//! an optional `serverless.toml` next to the host executable and from
//! `SERVERLESS__<SECTION>__<KEY>` environment variables.

use crate::network::definitions::MAX_NAMESIZE;
use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default port of the account (authentication) server
pub const DEFAULT_ACCOUNT_PORT: u16 = 9958;

/// Default port of the game server
pub const DEFAULT_GAME_PORT: u16 = 5816;

/// Address advertised to the client for the game server
pub const DEFAULT_GAME_ADDRESS: &str = "192.0.2.1";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoints: EndpointConfig,
    pub session: SessionConfig,
    pub spawn: SpawnConfig,
    pub logging: LoggingConfig,
}

/// Which destinations are emulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Destination port diverted to the account server emulation
    pub account_port: u16,

    /// Destination port diverted to the game server emulation
    pub game_port: u16,

    /// Game server address handed out in the login reply (never dialed for real)
    pub game_address: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            account_port: DEFAULT_ACCOUNT_PORT,
            game_port: DEFAULT_GAME_PORT,
            game_address: DEFAULT_GAME_ADDRESS.to_string(),
        }
    }
}

/// Credentials issued by the account server emulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub account_uid: i32,
    pub token: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            account_uid: 123_456_789,
            token: 987_654_321,
        }
    }
}

/// Where the player appears when entering the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub map: i32,
    pub x: u16,
    pub y: u16,
    pub direction: u16,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            map: 1002,
            x: 400,
            y: 400,
            direction: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `serverless.toml` (optional) and the environment
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("serverless").required(false))
            .add_source(
                Environment::with_prefix("SERVERLESS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<EngineConfig>()?;

        config.validate()?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Load configuration from `SERVERLESS__*` environment variables only
    pub fn from_env() -> Result<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SERVERLESS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<EngineConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(true))
            .build()?
            .try_deserialize::<EngineConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let endpoints = &self.endpoints;

        if endpoints.account_port == 0 || endpoints.game_port == 0 {
            return Err(EngineError::ConfigError(
                "endpoint ports cannot be 0".to_string(),
            ));
        }

        if endpoints.account_port == endpoints.game_port {
            return Err(EngineError::ConfigError(format!(
                "account and game ports must differ (both {})",
                endpoints.account_port
            )));
        }

        // NUL terminator must fit in the Info field
        if endpoints.game_address.is_empty() || endpoints.game_address.len() >= MAX_NAMESIZE {
            return Err(EngineError::ConfigError(format!(
                "game address must be 1..{} bytes, got {:?}",
                MAX_NAMESIZE - 1,
                endpoints.game_address
            )));
        }

        Ok(())
    }
}
