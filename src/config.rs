//! Configuration loading for the robot daemon

use crate::{Result, RobotError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub robot: RobotConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotConfig {
    pub host: String,
    pub port: Option<u16>,
    pub unit_id: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MotionConfig {
    pub default_speed: Option<f32>,
    pub move_timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub start_grace_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub connect_timeout_seconds: Option<u64>,
    pub io_timeout_seconds: Option<u64>,
}

impl Config {
    pub fn load_from_path(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| RobotError::Config(format!("Failed to read {}: {}", path, e)))?;
        Self::load_from_str(&contents)
    }

    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(contents)?;
        Ok(config)
    }
}

impl RobotConfig {
    /// Register server port with default fallback
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(502)
    }

    /// Unit/slave identifier with default fallback
    pub fn unit_id(&self) -> u8 {
        self.unit_id.unwrap_or(1)
    }
}

impl MotionConfig {
    /// Speed asserted before a move when no SET_SPEED was issued
    pub fn default_speed(&self) -> f32 {
        self.default_speed.unwrap_or(100.0)
    }

    /// Upper bound on a single motion, measured from the start of waiting
    pub fn move_timeout(&self) -> Duration {
        Duration::from_secs(self.move_timeout_seconds.unwrap_or(30))
    }

    /// Delay between status polls while waiting on a motion
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(500))
    }

    /// Window in which a triggered motion must be observed running
    pub fn start_grace(&self) -> Duration {
        Duration::from_secs(self.start_grace_seconds.unwrap_or(5))
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds.unwrap_or(3))
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_seconds.unwrap_or(3))
    }
}
