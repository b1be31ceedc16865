//! Command normalizer
//!
//! Resolves operator-typed lines (English tokens or their Chinese
//! equivalents) into canonical commands via a fixed, ordered table of
//! (pattern, constructor) pairs, compiled once and evaluated
//! first-match-wins per line.

use crate::controller::BaseAxis;
use crate::{Result, RobotError};
use regex::{Captures, Regex};
use std::fmt;
use std::sync::LazyLock;

/// A command the batch executor can dispatch directly.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalCommand {
    AutoMode,
    /// `None` means "use the configured default speed".
    SetSpeed { value: Option<f32> },
    MoveJoint { axis: u8, angle: f32 },
    MoveBase { axis: BaseAxis, value: f32 },
    GoHomeAll,
    GoHomeJoint { axis: u8 },
    Pause,
    Continue,
    Stop,
    Monitor,
    WriteTest { value: f32 },
}

impl CanonicalCommand {
    /// Parameter validation, run before any device access.
    pub fn validate(&self) -> Result<()> {
        match self {
            CanonicalCommand::MoveJoint { axis, .. } | CanonicalCommand::GoHomeJoint { axis }
                if !(1..=6).contains(axis) =>
            {
                Err(RobotError::Validation(format!(
                    "Joint axis J{} out of range (J1-J6)",
                    axis
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether dispatching this command starts a physical motion that must
    /// be waited on.
    pub fn triggers_motion(&self) -> bool {
        matches!(
            self,
            CanonicalCommand::MoveJoint { .. }
                | CanonicalCommand::MoveBase { .. }
                | CanonicalCommand::GoHomeAll
                | CanonicalCommand::GoHomeJoint { .. }
        )
    }
}

impl fmt::Display for CanonicalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalCommand::AutoMode => write!(f, "AUTO_MODE"),
            CanonicalCommand::SetSpeed { value: None } => write!(f, "SET_SPEED"),
            CanonicalCommand::SetSpeed { value: Some(value) } => write!(f, "SET_SPEED {}", value),
            CanonicalCommand::MoveJoint { axis, angle } => write!(f, "MOVE J{} {}", axis, angle),
            CanonicalCommand::MoveBase { axis, value } => write!(f, "MOVE {} {}", axis, value),
            CanonicalCommand::GoHomeAll => write!(f, "GO_HOME_ALL"),
            CanonicalCommand::GoHomeJoint { axis } => write!(f, "GO_HOME_J{}", axis),
            CanonicalCommand::Pause => write!(f, "PAUSE_MOVE"),
            CanonicalCommand::Continue => write!(f, "CONTINUE_MOVE"),
            CanonicalCommand::Stop => write!(f, "STOP_MOVE"),
            CanonicalCommand::Monitor => write!(f, "MONITOR"),
            CanonicalCommand::WriteTest { value } => write!(f, "TEST_WRITE_GV0 {}", value),
        }
    }
}

struct CommandPattern {
    regex: Regex,
    build: fn(&Captures) -> Option<CanonicalCommand>,
}

fn float_arg(caps: &Captures, name: &str) -> Option<f32> {
    caps.name(name)?.as_str().parse().ok()
}

fn axis_arg(caps: &Captures, name: &str) -> Option<u8> {
    caps.name(name)?.as_str().parse().ok()
}

static COMMAND_PATTERNS: LazyLock<Vec<CommandPattern>> = LazyLock::new(|| {
    fn entry(pattern: &str, build: fn(&Captures) -> Option<CanonicalCommand>) -> CommandPattern {
        CommandPattern {
            regex: Regex::new(pattern).expect("invalid command pattern"),
            build,
        }
    }

    vec![
        entry(r"^(?:AUTO_MODE|自动模式)$", |_| {
            Some(CanonicalCommand::AutoMode)
        }),
        entry(r"^(?:PAUSE_MOVE|暂停运动)$", |_| {
            Some(CanonicalCommand::Pause)
        }),
        entry(r"^(?:CONTINUE_MOVE|继续运动)$", |_| {
            Some(CanonicalCommand::Continue)
        }),
        entry(r"^(?:STOP_MOVE|停止运动)$", |_| Some(CanonicalCommand::Stop)),
        entry(r"^(?:GO_HOME_ALL|全轴回零)$", |_| {
            Some(CanonicalCommand::GoHomeAll)
        }),
        entry(r"^(?:MONITOR|状态监控)$", |_| {
            Some(CanonicalCommand::Monitor)
        }),
        entry(r"^(?:SET_SPEED|设置速度)\s*(?P<value>[\d.\-]+)?$", |caps| {
            let value = match caps.name("value") {
                Some(m) => Some(m.as_str().parse().ok()?),
                None => None,
            };
            Some(CanonicalCommand::SetSpeed { value })
        }),
        entry(
            r"^(?:TEST_WRITE_GV0|测试写入GV0)\s+(?P<value>[\d.\-]+)$",
            |caps| {
                Some(CanonicalCommand::WriteTest {
                    value: float_arg(caps, "value")?,
                })
            },
        ),
        entry(
            r"^(?:MOVE|移动)\s+J(?P<axis>\d+)\s+(?P<value>[\d.\-]+)$",
            |caps| {
                Some(CanonicalCommand::MoveJoint {
                    axis: axis_arg(caps, "axis")?,
                    angle: float_arg(caps, "value")?,
                })
            },
        ),
        entry(
            r"^(?:MOVE|移动)\s+(?P<axis>[XYZABC])\s+(?P<value>[\d.\-]+)$",
            |caps| {
                let letter = caps.name("axis")?.as_str().chars().next()?;
                Some(CanonicalCommand::MoveBase {
                    axis: BaseAxis::from_letter(letter)?,
                    value: float_arg(caps, "value")?,
                })
            },
        ),
        entry(r"^(?:GO_HOME_J|回零 J)(?P<axis>\d+)$", |caps| {
            Some(CanonicalCommand::GoHomeJoint {
                axis: axis_arg(caps, "axis")?,
            })
        }),
    ]
});

/// Resolve one line against the pattern table, first match wins.
///
/// `None` means the line is not a canonical command and the batch it came
/// from must go to the command planner instead.
pub fn resolve(line: &str) -> Option<CanonicalCommand> {
    let line = line.trim().to_uppercase();
    for pattern in COMMAND_PATTERNS.iter() {
        if let Some(caps) = pattern.regex.captures(&line) {
            return (pattern.build)(&caps);
        }
    }
    None
}

/// Normalize one line to its canonical text form.
///
/// Lines matching no pattern come back as the uppercased original, which
/// callers recognize as "not canonical".
pub fn normalize(line: &str) -> String {
    match resolve(line) {
        Some(command) => command.to_string(),
        None => line.trim().to_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_argument_aliases_normalize_to_one_form() {
        for (alias, canonical) in [
            ("AUTO_MODE", "AUTO_MODE"),
            ("自动模式", "AUTO_MODE"),
            ("PAUSE_MOVE", "PAUSE_MOVE"),
            ("暂停运动", "PAUSE_MOVE"),
            ("继续运动", "CONTINUE_MOVE"),
            ("停止运动", "STOP_MOVE"),
            ("全轴回零", "GO_HOME_ALL"),
            ("状态监控", "MONITOR"),
        ] {
            assert_eq!(normalize(alias), canonical, "alias {}", alias);
        }
    }

    #[test]
    fn test_set_speed_value_is_optional() {
        assert_eq!(normalize("SET_SPEED"), "SET_SPEED");
        assert_eq!(normalize("SET_SPEED 50"), "SET_SPEED 50");
        assert_eq!(normalize("设置速度 50"), "SET_SPEED 50");
        assert_eq!(normalize("设置速度"), "SET_SPEED");
        assert_eq!(
            resolve("SET_SPEED"),
            Some(CanonicalCommand::SetSpeed { value: None })
        );
        assert_eq!(
            resolve("SET_SPEED 50"),
            Some(CanonicalCommand::SetSpeed { value: Some(50.0) })
        );
    }

    #[test]
    fn test_move_templates() {
        assert_eq!(
            resolve("move j1 30"),
            Some(CanonicalCommand::MoveJoint {
                axis: 1,
                angle: 30.0
            })
        );
        assert_eq!(normalize("move j1 30"), "MOVE J1 30");
        assert_eq!(
            resolve("移动 X -50.5"),
            Some(CanonicalCommand::MoveBase {
                axis: BaseAxis::X,
                value: -50.5
            })
        );
        assert_eq!(normalize("MOVE X -50.5"), "MOVE X -50.5");
    }

    #[test]
    fn test_home_templates() {
        assert_eq!(
            resolve("GO_HOME_J3"),
            Some(CanonicalCommand::GoHomeJoint { axis: 3 })
        );
        assert_eq!(normalize("回零 J2"), "GO_HOME_J2");
        assert_eq!(resolve("GO_HOME_ALL"), Some(CanonicalCommand::GoHomeAll));
    }

    #[test]
    fn test_test_write_template() {
        assert_eq!(normalize("TEST_WRITE_GV0 123.45"), "TEST_WRITE_GV0 123.45");
        assert_eq!(
            resolve("测试写入GV0 1.5"),
            Some(CanonicalCommand::WriteTest { value: 1.5 })
        );
    }

    #[test]
    fn test_unknown_text_passes_through_uppercased() {
        assert_eq!(resolve("wave hello"), None);
        assert_eq!(normalize("wave hello"), "WAVE HELLO");
        assert_eq!(resolve("MOVE Q 10"), None);
    }

    #[test]
    fn test_out_of_range_axis_resolves_but_fails_validation() {
        // Prefix-wise these are canonical commands; the range check happens
        // before dispatch, never on the wire.
        let command = resolve("MOVE J9 50").unwrap();
        assert!(command.validate().is_err());
        let command = resolve("GO_HOME_J0").unwrap();
        assert!(command.validate().is_err());
        assert!(resolve("MOVE J2 15.5").unwrap().validate().is_ok());
    }

    #[test]
    fn test_motion_trigger_classification() {
        assert!(resolve("MOVE J1 10").unwrap().triggers_motion());
        assert!(resolve("GO_HOME_ALL").unwrap().triggers_motion());
        assert!(!resolve("SET_SPEED 50").unwrap().triggers_motion());
        assert!(!resolve("STOP_MOVE").unwrap().triggers_motion());
    }
}
