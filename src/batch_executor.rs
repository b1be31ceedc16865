//! Batch executor
//!
//! Turns one multi-line batch of operator text into an ordered sequence of
//! dispatched robot commands: strict canonical lines run directly, anything
//! else defers the whole batch to the command planner. Commands run under a
//! single controller lock; motion commands block on physical completion and
//! the first failure aborts the rest of the batch.

use crate::config::Config;
use crate::controller::{AxisKey, CoordinateFrame, RobotController, RobotStatus};
use crate::interpreter::{self, CanonicalCommand};
use crate::modbus::{ModbusLink, RegisterLink};
use crate::planner::CommandPlanner;
use crate::{Result, RobotError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Per-command and per-batch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of one command within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub status: OutcomeStatus,
    pub message: String,
}

/// Result of one whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    #[serde(rename = "status")]
    pub overall: OutcomeStatus,
    pub message: String,
    #[serde(rename = "detailed_results")]
    pub results: Vec<CommandReport>,
    pub motion_started: bool,
    pub robot_status: Option<RobotStatus>,
}

/// Executes command batches against a shared robot controller.
pub struct BatchExecutor<L: RegisterLink = ModbusLink> {
    controller: Arc<Mutex<RobotController<L>>>,
    planner: Arc<dyn CommandPlanner>,
    default_speed: f32,
    move_timeout: Duration,
    poll_interval: Duration,
}

impl<L: RegisterLink> BatchExecutor<L> {
    pub fn new(
        controller: Arc<Mutex<RobotController<L>>>,
        planner: Arc<dyn CommandPlanner>,
        config: &Config,
    ) -> Self {
        Self {
            controller,
            planner,
            default_speed: config.motion.default_speed(),
            move_timeout: config.motion.move_timeout(),
            poll_interval: config.motion.poll_interval(),
        }
    }

    /// Execute one batch of raw multi-line text.
    ///
    /// Returns `Err` when nothing ran at all (unparseable batch, planner
    /// failure, or a failed precondition); otherwise the per-command
    /// outcomes land in the [`BatchResult`], aborted at the first failure.
    /// The controller lock is held for the whole batch so two batches can
    /// never interleave on the wire.
    pub async fn execute_batch(&self, text: &str) -> Result<BatchResult> {
        let commands = self.parse_batch(text).await?;
        if commands.is_empty() {
            return Err(RobotError::Validation(
                "Batch contains no commands".to_string(),
            ));
        }

        let mut controller = self.controller.lock().await;
        controller.connect()?;
        controller.set_auto_mode().map_err(|e| {
            RobotError::Connection(format!("Failed to switch robot to auto mode: {}", e))
        })?;

        let mut results = Vec::with_capacity(commands.len());
        let mut overall = OutcomeStatus::Success;
        let mut motion_started = false;

        for (label, command) in &commands {
            match self
                .run_command(&mut controller, command, &mut motion_started)
                .await
            {
                Ok(()) => results.push(CommandReport {
                    command: label.clone(),
                    status: OutcomeStatus::Success,
                    message: "Command executed".to_string(),
                }),
                Err(e) => {
                    warn!("Command '{}' failed, aborting batch: {}", label, e);
                    results.push(CommandReport {
                        command: label.clone(),
                        status: OutcomeStatus::Error,
                        message: e.to_string(),
                    });
                    overall = OutcomeStatus::Error;
                    break;
                }
            }
        }

        let robot_status = controller.get_status().ok();
        let message = match overall {
            OutcomeStatus::Success => "Batch completed".to_string(),
            OutcomeStatus::Error => "Batch aborted on first failing command".to_string(),
        };
        Ok(BatchResult {
            overall,
            message,
            results,
            motion_started,
            robot_status,
        })
    }

    /// Mode selection: all lines canonical -> strict; otherwise the whole
    /// original text goes to the planner. Modes never mix within a batch.
    async fn parse_batch(&self, text: &str) -> Result<Vec<(String, CanonicalCommand)>> {
        let mut strict = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match interpreter::resolve(line) {
                Some(command) => strict.push((line.to_string(), command)),
                None => {
                    info!(
                        "Line '{}' is not canonical; handing the whole batch to the planner",
                        line
                    );
                    let planned = self.planner.plan(text).await?;
                    return Ok(planned
                        .into_iter()
                        .map(|structured| {
                            let command = CanonicalCommand::from(structured);
                            (command.to_string(), command)
                        })
                        .collect());
                }
            }
        }
        info!("Batch parsed in strict mode ({} commands)", strict.len());
        Ok(strict)
    }

    async fn run_command(
        &self,
        controller: &mut RobotController<L>,
        command: &CanonicalCommand,
        motion_started: &mut bool,
    ) -> Result<()> {
        command.validate()?;
        if command.triggers_motion() {
            *motion_started = true;
        }

        match command {
            CanonicalCommand::AutoMode => controller.set_auto_mode(),
            CanonicalCommand::SetSpeed { value } => {
                controller.set_speed(value.unwrap_or(self.default_speed))
            }
            CanonicalCommand::MoveJoint { axis, angle } => controller.start_incremental_move(
                &[(AxisKey::Joint(*axis), *angle)],
                CoordinateFrame::Joint,
            ),
            CanonicalCommand::MoveBase { axis, value } => controller
                .start_incremental_move(&[(AxisKey::Base(*axis), *value)], CoordinateFrame::Base),
            CanonicalCommand::GoHomeAll => controller.go_home(None),
            CanonicalCommand::GoHomeJoint { axis } => controller.go_home(Some(*axis)),
            CanonicalCommand::Pause => controller.pause_move(),
            CanonicalCommand::Continue => controller.continue_move(),
            CanonicalCommand::Stop => controller.stop_move(),
            // Status is captured in the batch's final snapshot.
            CanonicalCommand::Monitor => Ok(()),
            CanonicalCommand::WriteTest { value } => controller.write_test_value(*value),
        }?;

        if command.triggers_motion() {
            controller
                .wait_for_motion_completion(self.move_timeout, self.poll_interval)
                .await
                .into_result()?;
        }
        Ok(())
    }
}
