// src/config.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dotenv::dotenv;
use lapin::uri::{AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::plant::ids::DEFAULT_ID_PREFIX;
use crate::rabbitmq::{PlantError, Result};

/// Where a plant connects and how it names itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantConfig {
    /// Routing key this plant listens on for commands. `None` for pure observers.
    #[serde(default)]
    pub plant_id: Option<String>,
    pub exchange: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

// Default values
fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 5672 }
fn default_username() -> String { "guest".to_string() }
fn default_password() -> String { "guest".to_string() }
fn default_vhost() -> String { "/".to_string() }
fn default_id_prefix() -> String { DEFAULT_ID_PREFIX.to_string() }

impl PlantConfig {
    pub fn new(plant_id: Option<&str>, exchange: &str) -> Self {
        Self {
            plant_id: plant_id.map(str::to_string),
            exchange: exchange.to_string(),
            host: default_host(),
            port: default_port(),
            username: default_username(),
            password: default_password(),
            vhost: default_vhost(),
            id_prefix: default_id_prefix(),
        }
    }

    pub fn with_endpoint(mut self, host: &str, port: u16) -> Self {
        self.host = host.to_string();
        self.port = port;
        self
    }

    /// Read `PLANT_*` variables, honouring a `.env` file.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let config = Self {
            plant_id: env::var("PLANT_ID").ok().filter(|id| !id.is_empty()),
            exchange: env::var("PLANT_EXCHANGE")
                .map_err(|e| PlantError::ConfigError(format!("PLANT_EXCHANGE: {}", e)))?,
            host: env::var("PLANT_HOST").unwrap_or_else(|_| default_host()),
            port: match env::var("PLANT_PORT") {
                Ok(val) => val.parse::<u16>().map_err(|e| {
                    PlantError::ConfigError(format!("PLANT_PORT '{}': {}", val, e))
                })?,
                Err(_) => default_port(),
            },
            username: env::var("PLANT_USERNAME").unwrap_or_else(|_| default_username()),
            password: env::var("PLANT_PASSWORD").unwrap_or_else(|_| default_password()),
            vhost: env::var("PLANT_VHOST").unwrap_or_else(|_| default_vhost()),
            id_prefix: env::var("PLANT_ID_PREFIX").unwrap_or_else(|_| default_id_prefix()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PlantError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: PlantConfig = serde_json::from_str(&content).map_err(|e| {
            PlantError::ConfigError(format!("Invalid configuration in {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.exchange.is_empty() {
            return Err(PlantError::ConfigError("exchange cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Broker address as structured fields, so credentials and vhost are
    /// never re-parsed out of a formatted string.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            scheme: AMQPScheme::AMQP,
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.username.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            query: AMQPQueryString::default(),
        }
    }
}

/// Look for `plant.json` in the working directory, then `~/.plant.json`.
pub fn find_config_file() -> Result<PathBuf> {
    let local = Path::new("plant.json");
    if local.exists() {
        debug!("Found config file in current directory: {}", local.display());
        return Ok(local.to_path_buf());
    }

    if let Some(home_dir) = home::home_dir() {
        let home_config = home_dir.join(".plant.json");
        if home_config.exists() {
            debug!("Found config file in home directory: {}", home_config.display());
            return Ok(home_config);
        }
    }

    Err(PlantError::ConfigError(
        "Could not find plant.json in the current directory or ~/.plant.json".to_string(),
    ))
}
