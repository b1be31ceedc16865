//! Robot controller over the register link
//!
//! High-level operations (mode, speed, incremental moves, homing, status)
//! expressed as reads and writes against the fixed register map, plus the
//! polling state machine that supervises motion completion.

use crate::codec;
use crate::config::Config;
use crate::modbus::{ModbusLink, RegisterLink};
use crate::registers::*;
use crate::{Result, RobotError};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Operating mode reported by GV280_L.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotMode {
    Manual,
    Auto,
    TeachEnabled,
    Unknown(u16),
}

impl RobotMode {
    pub fn from_register(raw: u16) -> Self {
        match raw {
            0 => RobotMode::Manual,
            1 => RobotMode::Auto,
            2 => RobotMode::TeachEnabled,
            other => RobotMode::Unknown(other),
        }
    }

    pub fn name(&self) -> String {
        match self {
            RobotMode::Manual => "manual".to_string(),
            RobotMode::Auto => "auto".to_string(),
            RobotMode::TeachEnabled => "teach-enabled".to_string(),
            RobotMode::Unknown(code) => format!("unknown({})", code),
        }
    }
}

impl Serialize for RobotMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

/// Run status reported by GV280_H.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Stopped,
    Running,
    Paused,
    Unknown(u16),
}

impl RunStatus {
    pub fn from_register(raw: u16) -> Self {
        match raw {
            0 => RunStatus::Stopped,
            1 => RunStatus::Running,
            2 => RunStatus::Paused,
            other => RunStatus::Unknown(other),
        }
    }

    pub fn name(&self) -> String {
        match self {
            RunStatus::Stopped => "stopped".to_string(),
            RunStatus::Running => "running".to_string(),
            RunStatus::Paused => "paused".to_string(),
            RunStatus::Unknown(code) => format!("unknown({})", code),
        }
    }
}

impl Serialize for RunStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

const ALARM_BITS: [(u16, &str); 5] = [
    (ALARM_EMERGENCY_STOP, "emergency-stop"),
    (ALARM_SERVO, "servo"),
    (ALARM_BRAKE, "brake"),
    (ALARM_ALGORITHM, "algorithm"),
    (ALARM_ENCODER_ANGLE, "encoder-angle"),
];

/// Render the set alarm bits; `None` iff the code is zero.
pub fn describe_alarm(code: u16) -> Option<String> {
    if code == 0 {
        return None;
    }
    let names: Vec<&str> = ALARM_BITS
        .iter()
        .filter(|(bit, _)| code & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        Some(format!("unknown alarm bits {:#06x}", code))
    } else {
        Some(names.join(", "))
    }
}

/// One consistent status snapshot of the robot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotStatus {
    pub mode: RobotMode,
    pub run_status: RunStatus,
    pub alarm_code: u16,
    pub alarm: Option<String>,
    pub test_value: f32,
}

impl RobotStatus {
    pub fn has_alarm(&self) -> bool {
        self.alarm_code != 0
    }
}

/// Base-frame axis, in offset-slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseAxis {
    X,
    Y,
    Z,
    A,
    B,
    C,
}

impl BaseAxis {
    /// Offset slot this axis occupies in the GV200-GV205 block.
    pub fn slot(self) -> usize {
        match self {
            BaseAxis::X => 0,
            BaseAxis::Y => 1,
            BaseAxis::Z => 2,
            BaseAxis::A => 3,
            BaseAxis::B => 4,
            BaseAxis::C => 5,
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'X' => Some(BaseAxis::X),
            'Y' => Some(BaseAxis::Y),
            'Z' => Some(BaseAxis::Z),
            'A' => Some(BaseAxis::A),
            'B' => Some(BaseAxis::B),
            'C' => Some(BaseAxis::C),
            _ => None,
        }
    }
}

impl fmt::Display for BaseAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            BaseAxis::X => "X",
            BaseAxis::Y => "Y",
            BaseAxis::Z => "Z",
            BaseAxis::A => "A",
            BaseAxis::B => "B",
            BaseAxis::C => "C",
        };
        f.write_str(letter)
    }
}

/// Key into the six-slot offset block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisKey {
    /// Joint axis J1-J6.
    Joint(u8),
    /// Base-frame axis.
    Base(BaseAxis),
}

impl AxisKey {
    fn slot(self) -> Result<usize> {
        match self {
            AxisKey::Joint(axis) if (1..=6).contains(&axis) => Ok(usize::from(axis - 1)),
            AxisKey::Joint(axis) => Err(RobotError::Validation(format!(
                "Joint axis J{} out of range (J1-J6)",
                axis
            ))),
            AxisKey::Base(axis) => Ok(axis.slot()),
        }
    }
}

/// Coordinate frame of an incremental move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateFrame {
    Joint,
    Base,
}

impl CoordinateFrame {
    fn trigger_code(self) -> u16 {
        match self {
            CoordinateFrame::Joint => TRIGGER_JOINT_MOVE,
            CoordinateFrame::Base => TRIGGER_BASE_MOVE,
        }
    }

    fn name(self) -> &'static str {
        match self {
            CoordinateFrame::Joint => "joint",
            CoordinateFrame::Base => "base",
        }
    }
}

/// Terminal result of supervising one motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    Success,
    Alarmed(u16),
    TimedOutBeforeStart,
    TimedOutDuringRun,
    LinkFailure,
}

impl MotionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MotionOutcome::Success)
    }

    /// Fold the outcome into the error taxonomy for batch reporting.
    pub fn into_result(self) -> Result<()> {
        match self {
            MotionOutcome::Success => Ok(()),
            MotionOutcome::Alarmed(code) => Err(RobotError::Alarm(code)),
            MotionOutcome::TimedOutBeforeStart => Err(RobotError::Timeout(
                "Motion did not start within the grace window".to_string(),
            )),
            MotionOutcome::TimedOutDuringRun => Err(RobotError::Timeout(
                "Motion did not finish before the timeout; it may still be in progress".to_string(),
            )),
            MotionOutcome::LinkFailure => Err(RobotError::Connection(
                "Status read failed while waiting for motion".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitPhase {
    WaitingForStart,
    Running,
}

/// Motion-wait state machine: `WaitingForStart -> Running -> done`.
///
/// Pure and synchronously steppable; the async driver feeds it one status
/// observation per poll, stamped with the elapsed time since the wait began.
/// The start grace window bounds only the first phase and is independent of
/// the overall timeout, so a slow-to-start motion is never mistaken for a
/// finished one.
#[derive(Debug)]
pub struct MotionWaiter {
    phase: WaitPhase,
    grace: Duration,
    timeout: Duration,
}

impl MotionWaiter {
    pub fn new(grace: Duration, timeout: Duration) -> Self {
        Self {
            phase: WaitPhase::WaitingForStart,
            grace,
            timeout,
        }
    }

    /// Feed one poll. `Some` is terminal; the caller must not poll again.
    pub fn observe(&mut self, status: &RobotStatus, elapsed: Duration) -> Option<MotionOutcome> {
        if status.has_alarm() {
            return Some(MotionOutcome::Alarmed(status.alarm_code));
        }
        match self.phase {
            WaitPhase::WaitingForStart => {
                if status.run_status == RunStatus::Running {
                    self.phase = WaitPhase::Running;
                    None
                } else if elapsed >= self.grace {
                    Some(MotionOutcome::TimedOutBeforeStart)
                } else {
                    None
                }
            }
            WaitPhase::Running => {
                if status.run_status == RunStatus::Stopped {
                    Some(MotionOutcome::Success)
                } else if elapsed >= self.timeout {
                    Some(MotionOutcome::TimedOutDuringRun)
                } else {
                    None
                }
            }
        }
    }
}

/// Robot controller owning the register link exclusively.
///
/// Generic over the link so the operations and the wait loop can run against
/// a scripted bus in tests; production code uses the Modbus TCP link.
pub struct RobotController<L: RegisterLink = ModbusLink> {
    link: L,
    current_speed: f32,
    start_grace: Duration,
}

impl RobotController<ModbusLink> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ModbusLink::from_config(config),
            config.motion.default_speed(),
            config.motion.start_grace(),
        )
    }
}

impl<L: RegisterLink> RobotController<L> {
    pub fn new(link: L, default_speed: f32, start_grace: Duration) -> Self {
        Self {
            link,
            current_speed: default_speed,
            start_grace,
        }
    }

    /// Open the register session if needed. Idempotent.
    pub fn connect(&mut self) -> Result<()> {
        self.link.connect()
    }

    /// Last speed handed to [`set_speed`](Self::set_speed); re-asserted
    /// before every move.
    pub fn current_speed(&self) -> f32 {
        self.current_speed
    }

    pub fn set_auto_mode(&mut self) -> Result<()> {
        self.link.write_register(REG_AUTO_MODE, AUTO_MODE_ON)?;
        info!("Switched robot to auto mode");
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        self.current_speed = speed;
        self.link
            .write_registers(REG_SPEED, &codec::encode_float(speed))?;
        info!("Speed set to {}", speed);
        Ok(())
    }

    pub fn pause_move(&mut self) -> Result<()> {
        self.link.write_register(REG_PAUSE, CONTROL_FIRE)?;
        info!("Motion paused");
        Ok(())
    }

    pub fn continue_move(&mut self) -> Result<()> {
        self.link.write_register(REG_CONTINUE, CONTROL_FIRE)?;
        info!("Motion continued");
        Ok(())
    }

    pub fn stop_move(&mut self) -> Result<()> {
        self.link.write_register(REG_STOP, CONTROL_FIRE)?;
        info!("Motion stopped");
        Ok(())
    }

    pub fn write_test_value(&mut self, value: f32) -> Result<()> {
        self.link
            .write_registers(REG_TEST_VALUE, &codec::encode_float(value))?;
        info!("Test value GV0 set to {}", value);
        Ok(())
    }

    /// Start an incremental move.
    ///
    /// Zero-fills all six offset slots, overlays the supplied keys, writes
    /// the twelve registers in one transaction, re-asserts the cached speed,
    /// then fires the trigger. The trigger is never written unless the
    /// offset write succeeded.
    pub fn start_incremental_move(
        &mut self,
        offsets: &[(AxisKey, f32)],
        frame: CoordinateFrame,
    ) -> Result<()> {
        let mut slots = [0.0f32; AXIS_COUNT];
        for (key, value) in offsets {
            slots[key.slot()?] = *value;
        }

        self.link
            .write_registers(REG_MOVE_OFFSETS, &codec::encode_floats(&slots))?;
        self.set_speed(self.current_speed)?;
        self.link
            .write_register(REG_MOVE_TRIGGER, frame.trigger_code())?;
        info!(
            "Started {} incremental move with offsets {:?}",
            frame.name(),
            slots
        );
        Ok(())
    }

    /// Home one joint (1-6) or, with `None`, all axes.
    pub fn go_home(&mut self, axis: Option<u8>) -> Result<()> {
        let code = match axis {
            Some(axis) if (1..=6).contains(&axis) => u16::from(axis - 1),
            Some(axis) => {
                return Err(RobotError::Validation(format!(
                    "Joint axis J{} out of range (J1-J6)",
                    axis
                )))
            }
            None => HOME_ALL_AXES,
        };
        self.link.write_register(REG_HOME, code)?;
        match axis {
            Some(axis) => info!("Homing joint J{}", axis),
            None => info!("Homing all axes"),
        }
        Ok(())
    }

    /// Read one consistent status snapshot.
    ///
    /// Mode, run status and alarm come from a single three-register read,
    /// the test value from a second; either failure fails the whole call so
    /// a snapshot is never a patchwork of stale and fresh fields.
    pub fn get_status(&mut self) -> Result<RobotStatus> {
        let status_regs = self.link.read_registers(REG_MODE, 3)?;
        let [mode_reg, run_reg, alarm_reg] = status_regs.as_slice() else {
            return Err(RobotError::Protocol(format!(
                "Status read returned {} registers, expected 3",
                status_regs.len()
            )));
        };
        let test_regs = self.link.read_registers(REG_TEST_VALUE, 2)?;

        Ok(RobotStatus {
            mode: RobotMode::from_register(*mode_reg),
            run_status: RunStatus::from_register(*run_reg),
            alarm_code: *alarm_reg,
            alarm: describe_alarm(*alarm_reg),
            test_value: codec::decode_float(&test_regs)?,
        })
    }

    /// Block until the motion physically completes or faults.
    ///
    /// Polls [`get_status`](Self::get_status) every `poll_interval`, driving
    /// the [`MotionWaiter`] machine. A status-read failure is a failure of
    /// the wait, never "still waiting".
    pub async fn wait_for_motion_completion(
        &mut self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> MotionOutcome {
        info!("Waiting for motion completion (up to {:?})", timeout);
        let mut waiter = MotionWaiter::new(self.start_grace, timeout);
        let started = tokio::time::Instant::now();

        loop {
            let elapsed = started.elapsed();
            let status = match self.get_status() {
                Ok(status) => status,
                Err(e) => {
                    error!("Status read failed while waiting for motion: {}", e);
                    return MotionOutcome::LinkFailure;
                }
            };

            if let Some(outcome) = waiter.observe(&status, elapsed) {
                match outcome {
                    MotionOutcome::Success => info!("Motion completed"),
                    MotionOutcome::Alarmed(code) => error!(
                        "Alarm during motion (code {:#06x}: {})",
                        code,
                        describe_alarm(code).unwrap_or_default()
                    ),
                    MotionOutcome::TimedOutBeforeStart => {
                        warn!("Robot never reported running; motion may not have started")
                    }
                    MotionOutcome::TimedOutDuringRun => {
                        warn!("Motion timed out after {:?}", timeout)
                    }
                    MotionOutcome::LinkFailure => {}
                }
                return outcome;
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    #[cfg(test)]
    pub(crate) fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
