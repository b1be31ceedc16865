//! Robot service facade
//!
//! Owns the controller behind one mutex and exposes the two operations the
//! outside world consumes: submit a command batch and read a status
//! snapshot. Cloneable, so any number of front ends can share it; every
//! device access serializes behind the same lock.

use crate::batch_executor::{BatchExecutor, BatchResult};
use crate::config::Config;
use crate::controller::{RobotController, RobotStatus};
use crate::planner::{CommandPlanner, UnconfiguredPlanner};
use crate::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
pub struct RobotService {
    controller: Arc<Mutex<RobotController>>,
    executor: Arc<BatchExecutor>,
    config: Config,
}

impl RobotService {
    /// Build a service with no command planner: canonical batches only.
    pub fn from_config(config: &Config) -> Self {
        Self::with_planner(config, Arc::new(UnconfiguredPlanner))
    }

    /// Build a service with an injected command planner collaborator.
    pub fn with_planner(config: &Config, planner: Arc<dyn CommandPlanner>) -> Self {
        info!(
            "Initializing robot service for {}:{}",
            config.robot.host,
            config.robot.port()
        );
        let controller = Arc::new(Mutex::new(RobotController::from_config(config)));
        let executor = Arc::new(BatchExecutor::new(
            Arc::clone(&controller),
            planner,
            config,
        ));
        Self {
            controller,
            executor,
            config: config.clone(),
        }
    }

    /// Execute one batch of raw command text.
    pub async fn submit_batch(&self, text: &str) -> Result<BatchResult> {
        self.executor.execute_batch(text).await
    }

    /// Read a status snapshot, connecting lazily if needed.
    pub async fn status(&self) -> Result<RobotStatus> {
        let mut controller = self.controller.lock().await;
        controller.connect()?;
        controller.get_status()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
