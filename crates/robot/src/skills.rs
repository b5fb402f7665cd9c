//! The skill catalogue: one enum variant per robot action.
//!
//! [`SkillKind`] names the catalogue and produces the capability schema;
//! [`Skill`] is a fully-typed, range-checked invocation parsed from a
//! [`SkillCall`].

use robovox_core::error::{SkillError, ValidationError};
use robovox_core::hardware::{Joints, Pose};
use robovox_core::skill::{
    ActuatorKind, ArgSpec, ArgType, CapabilitySchema, ConcurrencyClass, HardwareInterface,
    SkillCall, SkillSpec,
};
use serde_json::Value;

/// A physical actuator. Calls touching the same actuator never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Actuator {
    Arm,
    Gripper,
    Finger(u8),
    Servo(u8),
}

impl std::fmt::Display for Actuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm => write!(f, "arm"),
            Self::Gripper => write!(f, "gripper"),
            Self::Finger(i) => write!(f, "finger{i}"),
            Self::Servo(ch) => write!(f, "servo{ch}"),
        }
    }
}

pub const FINGER_COUNT: u8 = 5;
pub const SERVO_MAX_ANGLE: u16 = 180;

/// Relative move directions in the base frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    const NAMES: [&'static str; 6] = ["forward", "back", "left", "right", "up", "down"];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(Self::Forward),
            "back" => Some(Self::Back),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    /// Unit offset (dx, dy, dz) in the base frame.
    pub fn unit(self) -> (f64, f64, f64) {
        match self {
            Self::Forward => (1.0, 0.0, 0.0),
            Self::Back => (-1.0, 0.0, 0.0),
            Self::Left => (0.0, 1.0, 0.0),
            Self::Right => (0.0, -1.0, 0.0),
            Self::Up => (0.0, 0.0, 1.0),
            Self::Down => (0.0, 0.0, -1.0),
        }
    }
}

/// Speed/acceleration overrides carried by motion skills.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionProfile {
    pub speed: Option<f64>,
    pub accel: Option<f64>,
}

/// A typed skill invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Skill {
    GetJointPositions,
    GetTcpPose { frame: String },
    GetState,
    MoveTo {
        direction: Direction,
        distance_mm: Option<f64>,
        profile: MotionProfile,
    },
    MoveP2pPose { pose: Pose, profile: MotionProfile },
    MoveP2pJoints { joints: Joints, profile: MotionProfile },
    Stop,
    SetGripper { open: bool, force: Option<f64> },
    AdjustFinger { finger: u8, closure: f64 },
    RunFk { joints: Joints },
    RunIk { pose: Pose, seed: Option<Joints> },
    SetServoAngle { channel: u8, angle: u16 },
    EndSession { reason: String },
}

/// The catalogue of skill names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkillKind {
    GetJointPositions,
    GetTcpPose,
    GetState,
    MoveTo,
    MoveP2pPose,
    MoveP2pJoints,
    Stop,
    SetGripper,
    AdjustFinger,
    RunFk,
    RunIk,
    SetServoAngle,
    EndSession,
}

fn pose_args() -> Vec<ArgSpec> {
    ["x", "y", "z"]
        .into_iter()
        .map(|axis| ArgSpec::required(axis, ArgType::Number, "Position in millimetres"))
        .chain(
            ["rx", "ry", "rz"]
                .into_iter()
                .map(|axis| ArgSpec::required(axis, ArgType::Number, "Rotation in degrees")),
        )
        .collect()
}

fn profile_args() -> Vec<ArgSpec> {
    vec![
        ArgSpec::optional("speed", ArgType::Number, "Movement speed"),
        ArgSpec::optional("accel", ArgType::Number, "Movement acceleration"),
    ]
}

impl SkillKind {
    pub const ALL: [SkillKind; 13] = [
        Self::GetJointPositions,
        Self::GetTcpPose,
        Self::GetState,
        Self::MoveTo,
        Self::MoveP2pPose,
        Self::MoveP2pJoints,
        Self::Stop,
        Self::SetGripper,
        Self::AdjustFinger,
        Self::RunFk,
        Self::RunIk,
        Self::SetServoAngle,
        Self::EndSession,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::GetJointPositions => "get_joint_positions",
            Self::GetTcpPose => "get_tcp_pose",
            Self::GetState => "get_state",
            Self::MoveTo => "move_to",
            Self::MoveP2pPose => "move_p2p_pose",
            Self::MoveP2pJoints => "move_p2p_joints",
            Self::Stop => "stop",
            Self::SetGripper => "set_gripper",
            Self::AdjustFinger => "adjust_finger",
            Self::RunFk => "run_fk",
            Self::RunIk => "run_ik",
            Self::SetServoAngle => "set_servo_angle",
            Self::EndSession => "end_session",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn concurrency(self) -> ConcurrencyClass {
        match self {
            Self::GetJointPositions
            | Self::GetTcpPose
            | Self::GetState
            | Self::RunFk
            | Self::RunIk
            | Self::AdjustFinger
            | Self::SetServoAngle => ConcurrencyClass::ParallelSafe,
            Self::MoveTo
            | Self::MoveP2pPose
            | Self::MoveP2pJoints
            | Self::Stop
            | Self::SetGripper
            | Self::EndSession => ConcurrencyClass::Exclusive,
        }
    }

    /// The capability schema entry for this skill.
    pub fn spec(self) -> SkillSpec {
        use HardwareInterface::{Kinematics, Motion, Servo};

        let (description, args, interfaces, actuators): (&str, Vec<ArgSpec>, _, _) = match self {
            Self::GetJointPositions => (
                "Get the current angular positions of all robot joints.",
                vec![],
                vec![Motion],
                vec![],
            ),
            Self::GetTcpPose => (
                "Get the current tool center point pose.",
                vec![ArgSpec::optional(
                    "frame",
                    ArgType::String,
                    "Reference frame, defaults to \"base\"",
                )],
                vec![Motion, Kinematics],
                vec![],
            ),
            Self::GetState => (
                "Get the full robot state: joints and tool pose.",
                vec![],
                vec![Motion, Kinematics],
                vec![],
            ),
            Self::MoveTo => (
                "Move the tool point a short distance in a direction.",
                [
                    vec![
                        ArgSpec::required(
                            "direction",
                            ArgType::OneOf(Direction::NAMES.iter().map(|s| s.to_string()).collect()),
                            "Direction of travel in the base frame",
                        ),
                        ArgSpec::optional(
                            "distance_mm",
                            ArgType::Number,
                            "Distance in millimetres",
                        ),
                    ],
                    profile_args(),
                ]
                .concat(),
                vec![Motion, Kinematics],
                vec![ActuatorKind::Arm],
            ),
            Self::MoveP2pPose => (
                "Move point-to-point to a Cartesian pose.",
                [
                    pose_args(),
                    vec![ArgSpec::optional("frame", ArgType::String, "Reference frame")],
                    profile_args(),
                ]
                .concat(),
                vec![Motion, Kinematics],
                vec![ActuatorKind::Arm],
            ),
            Self::MoveP2pJoints => (
                "Move point-to-point to a set of joint angles.",
                [
                    vec![ArgSpec::required(
                        "joints",
                        ArgType::NumberList,
                        "Joint angles in degrees, base first",
                    )],
                    profile_args(),
                ]
                .concat(),
                vec![Motion, Kinematics],
                vec![ActuatorKind::Arm],
            ),
            Self::Stop => (
                "Stop all robot motion immediately.",
                vec![],
                vec![Motion],
                vec![ActuatorKind::Arm],
            ),
            Self::SetGripper => (
                "Open or close the gripper.",
                vec![
                    ArgSpec::required(
                        "state",
                        ArgType::OneOf(vec!["open".into(), "closed".into()]),
                        "Desired gripper state",
                    ),
                    ArgSpec::optional("force", ArgType::Number, "Grasping force in newtons"),
                ],
                vec![Motion],
                vec![ActuatorKind::Gripper],
            ),
            Self::AdjustFinger => (
                "Bend one finger of the hand.",
                vec![
                    ArgSpec::required("finger", ArgType::Integer, "Finger index, 0 (thumb) to 4")
                        .within(0.0, 4.0),
                    ArgSpec::required(
                        "position",
                        ArgType::Number,
                        "Closure from 0.0 (open) to 1.0 (closed)",
                    )
                    .within(0.0, 1.0),
                ],
                vec![Servo],
                vec![ActuatorKind::Finger],
            ),
            Self::RunFk => (
                "Compute the tool pose for a set of joint angles.",
                vec![ArgSpec::required("joints", ArgType::NumberList, "Joint angles in degrees")],
                vec![Kinematics],
                vec![],
            ),
            Self::RunIk => (
                "Compute joint solutions for a Cartesian pose.",
                [
                    pose_args(),
                    vec![ArgSpec::optional("seed", ArgType::NumberList, "Seed joint angles")],
                ]
                .concat(),
                vec![Kinematics],
                vec![],
            ),
            Self::SetServoAngle => (
                "Set the angle of a single servo motor, from 0 to 180 degrees.",
                vec![
                    ArgSpec::required("angle", ArgType::Integer, "Angle in degrees").within(0.0, 180.0),
                    ArgSpec::optional("channel", ArgType::Integer, "Servo channel, defaults to 0"),
                ],
                vec![Servo],
                vec![ActuatorKind::Servo],
            ),
            Self::EndSession => (
                "End the conversation. Call this when the user's task is fully complete.",
                vec![ArgSpec::optional("reason", ArgType::String, "Reason for ending")],
                vec![],
                vec![],
            ),
        };

        SkillSpec {
            name: self.name().into(),
            description: description.into(),
            args,
            concurrency: self.concurrency(),
            interfaces,
            actuators,
        }
    }
}

/// The full capability schema of the catalogue.
pub fn catalogue_schema() -> CapabilitySchema {
    let mut schema = CapabilitySchema::new();
    for kind in SkillKind::ALL {
        schema.register(kind.spec());
    }
    schema
}

fn out_of_range(argument: &str, reason: impl Into<String>) -> SkillError {
    SkillError::OutOfRange {
        argument: argument.into(),
        reason: reason.into(),
    }
}

fn wrong_type(call: &SkillCall, argument: &str, expected: &str) -> SkillError {
    SkillError::Invalid(ValidationError::WrongType {
        skill: call.name().into(),
        argument: argument.into(),
        expected: expected.into(),
    })
}

struct Args<'a> {
    call: &'a SkillCall,
}

impl<'a> Args<'a> {
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.call.arguments().get(key).filter(|v| !v.is_null())
    }

    fn number(&self, key: &str) -> Result<Option<f64>, SkillError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| wrong_type(self.call, key, "a number")),
        }
    }

    fn required_number(&self, key: &str) -> Result<f64, SkillError> {
        self.number(key)?.ok_or_else(|| {
            SkillError::Invalid(ValidationError::MissingArgument {
                skill: self.call.name().into(),
                argument: key.into(),
            })
        })
    }

    fn integer(&self, key: &str) -> Result<Option<i64>, SkillError> {
        match self.number(key)? {
            None => Ok(None),
            Some(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
            Some(_) => Err(wrong_type(self.call, key, "an integer")),
        }
    }

    fn string(&self, key: &str) -> Result<Option<&'a str>, SkillError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_str()
                .map(Some)
                .ok_or_else(|| wrong_type(self.call, key, "a string")),
        }
    }

    fn numbers(&self, key: &str) -> Result<Option<Vec<f64>>, SkillError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v
                .as_array()
                .and_then(|items| items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>())
                .map(Some)
                .ok_or_else(|| wrong_type(self.call, key, "a list of numbers")),
        }
    }

    fn pose(&self) -> Result<Pose, SkillError> {
        let mut pose = Pose::new(
            self.required_number("x")?,
            self.required_number("y")?,
            self.required_number("z")?,
            self.required_number("rx")?,
            self.required_number("ry")?,
            self.required_number("rz")?,
        );
        if let Some(frame) = self.string("frame")? {
            pose.frame = frame.to_string();
        }
        Ok(pose)
    }

    fn profile(&self) -> Result<MotionProfile, SkillError> {
        let speed = self.number("speed")?;
        let accel = self.number("accel")?;
        for (key, value) in [("speed", speed), ("accel", accel)] {
            if value.is_some_and(|v| v <= 0.0) {
                return Err(out_of_range(key, "must be positive"));
            }
        }
        Ok(MotionProfile { speed, accel })
    }

    fn joints(&self, key: &str) -> Result<Option<Joints>, SkillError> {
        match self.numbers(key)? {
            Some(values) if values.is_empty() => Err(out_of_range(key, "must not be empty")),
            other => Ok(other.map(Joints::new)),
        }
    }
}

impl Skill {
    /// Parse and range-check a call. The call is assumed to have passed
    /// schema validation; type checks are repeated only to stay total.
    pub fn parse(call: &SkillCall) -> Result<Self, SkillError> {
        let kind = SkillKind::from_name(call.name())
            .ok_or_else(|| ValidationError::UnknownSkill(call.name().to_string()))?;
        let args = Args { call };

        let skill = match kind {
            SkillKind::GetJointPositions => Self::GetJointPositions,
            SkillKind::GetTcpPose => Self::GetTcpPose {
                frame: args.string("frame")?.unwrap_or("base").to_string(),
            },
            SkillKind::GetState => Self::GetState,
            SkillKind::MoveTo => {
                let raw = args.string("direction")?.unwrap_or_default();
                let direction = Direction::parse(raw)
                    .ok_or_else(|| out_of_range("direction", format!("unknown direction '{raw}'")))?;
                let distance_mm = args.number("distance_mm")?;
                if distance_mm.is_some_and(|d| d <= 0.0) {
                    return Err(out_of_range("distance_mm", "must be positive"));
                }
                Self::MoveTo {
                    direction,
                    distance_mm,
                    profile: args.profile()?,
                }
            }
            SkillKind::MoveP2pPose => Self::MoveP2pPose {
                pose: args.pose()?,
                profile: args.profile()?,
            },
            SkillKind::MoveP2pJoints => Self::MoveP2pJoints {
                joints: args.joints("joints")?.unwrap_or_else(|| Joints::new(vec![])),
                profile: args.profile()?,
            },
            SkillKind::Stop => Self::Stop,
            SkillKind::SetGripper => {
                let open = match args.string("state")? {
                    Some("open") => true,
                    Some("closed") => false,
                    other => {
                        return Err(out_of_range(
                            "state",
                            format!("expected open or closed, got {other:?}"),
                        ));
                    }
                };
                let force = args.number("force")?;
                if force.is_some_and(|f| f < 0.0) {
                    return Err(out_of_range("force", "must not be negative"));
                }
                Self::SetGripper { open, force }
            }
            SkillKind::AdjustFinger => {
                let finger = args.integer("finger")?.unwrap_or(-1);
                if !(0..i64::from(FINGER_COUNT)).contains(&finger) {
                    return Err(out_of_range(
                        "finger",
                        format!("must be between 0 and {}", FINGER_COUNT - 1),
                    ));
                }
                let closure = args.required_number("position")?;
                if !(0.0..=1.0).contains(&closure) {
                    return Err(out_of_range("position", "must be between 0.0 and 1.0"));
                }
                Self::AdjustFinger {
                    finger: finger as u8,
                    closure,
                }
            }
            SkillKind::RunFk => Self::RunFk {
                joints: args.joints("joints")?.unwrap_or_else(|| Joints::new(vec![])),
            },
            SkillKind::RunIk => Self::RunIk {
                pose: args.pose()?,
                seed: args.joints("seed")?,
            },
            SkillKind::SetServoAngle => {
                let angle = args.integer("angle")?.unwrap_or(-1);
                if !(0..=i64::from(SERVO_MAX_ANGLE)).contains(&angle) {
                    return Err(out_of_range("angle", "Angle must be between 0 and 180."));
                }
                let channel = args.integer("channel")?.unwrap_or(0);
                if !(0..=i64::from(u8::MAX)).contains(&channel) {
                    return Err(out_of_range("channel", "must be between 0 and 255"));
                }
                Self::SetServoAngle {
                    channel: channel as u8,
                    angle: angle as u16,
                }
            }
            SkillKind::EndSession => Self::EndSession {
                reason: args
                    .string("reason")?
                    .unwrap_or("Ending the session.")
                    .to_string(),
            },
        };
        Ok(skill)
    }

    pub fn kind(&self) -> SkillKind {
        match self {
            Self::GetJointPositions => SkillKind::GetJointPositions,
            Self::GetTcpPose { .. } => SkillKind::GetTcpPose,
            Self::GetState => SkillKind::GetState,
            Self::MoveTo { .. } => SkillKind::MoveTo,
            Self::MoveP2pPose { .. } => SkillKind::MoveP2pPose,
            Self::MoveP2pJoints { .. } => SkillKind::MoveP2pJoints,
            Self::Stop => SkillKind::Stop,
            Self::SetGripper { .. } => SkillKind::SetGripper,
            Self::AdjustFinger { .. } => SkillKind::AdjustFinger,
            Self::RunFk { .. } => SkillKind::RunFk,
            Self::RunIk { .. } => SkillKind::RunIk,
            Self::SetServoAngle { .. } => SkillKind::SetServoAngle,
            Self::EndSession { .. } => SkillKind::EndSession,
        }
    }

    /// The concrete actuators this invocation moves.
    pub fn actuators(&self) -> Vec<Actuator> {
        match self {
            Self::MoveTo { .. } | Self::MoveP2pPose { .. } | Self::MoveP2pJoints { .. } | Self::Stop => {
                vec![Actuator::Arm]
            }
            Self::SetGripper { .. } => vec![Actuator::Gripper],
            Self::AdjustFinger { finger, .. } => vec![Actuator::Finger(*finger)],
            Self::SetServoAngle { channel, .. } => vec![Actuator::Servo(*channel)],
            Self::GetJointPositions
            | Self::GetTcpPose { .. }
            | Self::GetState
            | Self::RunFk { .. }
            | Self::RunIk { .. }
            | Self::EndSession { .. } => vec![],
        }
    }
}
