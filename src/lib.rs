//! gvd - register-map robot motion control
//!
//! Library behind the `gvd` daemon: issues motion commands to an industrial
//! robot controller over its Modbus TCP register map, either as canonical
//! command tokens or as free text resolved by an external command planner.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use gvd::{Config, RobotService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_from_path("config/default_config.yaml")?;
//!     let service = RobotService::from_config(&config);
//!
//!     let result = service.submit_batch("SET_SPEED 50\nMOVE J1 30").await?;
//!     println!("{}", serde_json::to_string(&result)?);
//!
//!     let status = service.status().await?;
//!     println!("run status: {}", status.run_status.name());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **RobotService**: shared, serialized facade (submit batch / read status)
//! - **BatchExecutor**: strict/planner mode selection, sequencing, motion waits
//! - **RobotController**: semantic operations on the fixed register map
//! - **MotionWaiter**: polling state machine supervising motion completion
//! - **ModbusLink**: register transactions over TCP
//! - **CommandPlanner**: seam to the external natural-language collaborator

pub mod batch_executor;
pub mod codec;
pub mod config;
pub mod controller;
pub mod error;
pub mod interpreter;
pub mod modbus;
pub mod planner;
pub mod registers;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

// High-level exports for easy usage
pub use batch_executor::{BatchExecutor, BatchResult, CommandReport, OutcomeStatus};
pub use config::{Config, ConnectionConfig, MotionConfig, RobotConfig};
pub use controller::{
    AxisKey, BaseAxis, CoordinateFrame, MotionOutcome, MotionWaiter, RobotController, RobotMode,
    RobotStatus, RunStatus,
};
pub use error::{Result, RobotError};
pub use interpreter::{normalize, resolve, CanonicalCommand};
pub use modbus::{ModbusLink, RegisterLink};
pub use planner::{CommandPlanner, PlanResponse, StructuredCommand, UnconfiguredPlanner};
pub use service::RobotService;
