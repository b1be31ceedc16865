//! Error types for robot register operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RobotError>;

#[derive(Error, Debug)]
pub enum RobotError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Register protocol error: {0}")]
    Protocol(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Robot alarm active (code {0:#06x})")]
    Alarm(u16),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Command planner error: {0}")]
    Planner(String),

    #[error("A float value spans exactly 2 registers, got {0}")]
    InvalidRegisterCount(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}
