//! Structured-command collaborator interface
//!
//! The daemon hands free-form batch text to an external service (in
//! production a natural-language model behind an API) and gets back a list
//! of structured commands. Only the contract lives here: the trait, the
//! wire DTOs and the conversion into dispatchable commands.

use crate::controller::BaseAxis;
use crate::interpreter::CanonicalCommand;
use crate::{Result, RobotError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One structured command as the collaborator emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command_type", content = "parameters")]
pub enum StructuredCommand {
    #[serde(rename = "SET_SPEED")]
    SetSpeed { speed_value: f32 },
    #[serde(rename = "MOVE_JOINT")]
    MoveJoint { axis_id: u8, angle: f32 },
    #[serde(rename = "MOVE_BASE")]
    MoveBase { axis_name: BaseAxis, value: f32 },
    #[serde(rename = "GO_HOME_JOINT")]
    GoHomeJoint { axis_id: u8 },
    #[serde(rename = "GO_HOME_ALL")]
    GoHomeAll {},
    #[serde(rename = "PAUSE_MOVE")]
    PauseMove {},
    #[serde(rename = "CONTINUE_MOVE")]
    ContinueMove {},
    #[serde(rename = "STOP_MOVE")]
    StopMove {},
    #[serde(rename = "MONITOR")]
    Monitor {},
    #[serde(rename = "TEST_WRITE_GV0")]
    TestWriteGv0 { value: f32 },
}

impl From<StructuredCommand> for CanonicalCommand {
    fn from(command: StructuredCommand) -> Self {
        match command {
            StructuredCommand::SetSpeed { speed_value } => CanonicalCommand::SetSpeed {
                value: Some(speed_value),
            },
            StructuredCommand::MoveJoint { axis_id, angle } => CanonicalCommand::MoveJoint {
                axis: axis_id,
                angle,
            },
            StructuredCommand::MoveBase { axis_name, value } => CanonicalCommand::MoveBase {
                axis: axis_name,
                value,
            },
            StructuredCommand::GoHomeJoint { axis_id } => {
                CanonicalCommand::GoHomeJoint { axis: axis_id }
            }
            StructuredCommand::GoHomeAll {} => CanonicalCommand::GoHomeAll,
            StructuredCommand::PauseMove {} => CanonicalCommand::Pause,
            StructuredCommand::ContinueMove {} => CanonicalCommand::Continue,
            StructuredCommand::StopMove {} => CanonicalCommand::Stop,
            StructuredCommand::Monitor {} => CanonicalCommand::Monitor,
            StructuredCommand::TestWriteGv0 { value } => CanonicalCommand::WriteTest { value },
        }
    }
}

/// Full response envelope of the collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanResponse {
    #[serde(default)]
    pub commands: Vec<StructuredCommand>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl PlanResponse {
    /// Unwrap the envelope: a set `error` code wins over any commands.
    pub fn into_commands(self) -> Result<Vec<StructuredCommand>> {
        match self.error {
            Some(code) => {
                let message = self
                    .message
                    .unwrap_or_else(|| "planner rejected the request".to_string());
                Err(RobotError::Planner(format!("{}: {}", code, message)))
            }
            None => Ok(self.commands),
        }
    }
}

/// Resolver from free text to structured commands.
///
/// Transport-agnostic on purpose: the daemon core never talks to the
/// language model directly, it only consumes this seam.
#[async_trait]
pub trait CommandPlanner: Send + Sync {
    async fn plan(&self, text: &str) -> Result<Vec<StructuredCommand>>;
}

/// Default planner used when no collaborator is configured.
///
/// Every free-form batch fails with a [`RobotError::Planner`], so strict
/// canonical batches keep working without any external service.
#[derive(Debug, Clone)]
pub struct UnconfiguredPlanner;

#[async_trait]
impl CommandPlanner for UnconfiguredPlanner {
    async fn plan(&self, _text: &str) -> Result<Vec<StructuredCommand>> {
        Err(RobotError::Planner(
            "No command planner configured; only canonical commands are accepted".to_string(),
        ))
    }
}
