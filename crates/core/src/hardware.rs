//! Hardware capability interfaces.
//!
//! These are the contracts concrete robot stacks implement. Only the robot
//! tools registry calls them; every command is awaited until the hardware
//! reports success, a transient failure, or a fatal failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HardwareError;

pub type HardwareResult<T> = std::result::Result<T, HardwareError>;

/// A Cartesian tool-center-point pose (millimetres / degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    #[serde(default = "default_frame")]
    pub frame: String,
}

fn default_frame() -> String {
    "base".into()
}

impl Pose {
    pub fn new(x: f64, y: f64, z: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self {
            x,
            y,
            z,
            rx,
            ry,
            rz,
            frame: default_frame(),
        }
    }

    /// Same orientation, translated by (dx, dy, dz).
    pub fn translated(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
            ..self.clone()
        }
    }

    /// Distance of the tool point from the base origin.
    pub fn reach(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Joint angles in degrees, base first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joints {
    pub values: Vec<f64>,
}

impl Joints {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// Identifier of a motion command accepted by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHandle {
    pub handle_id: String,
}

/// A motion target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionGoal {
    Pose(Pose),
    Joints(Joints),
}

/// Snapshot of the arm: joints from the driver, TCP pose from forward kinematics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotState {
    pub joints: Joints,
    pub tcp: Pose,
    pub mode: String,
}

/// The motion controller of the arm and its gripper.
#[async_trait]
pub trait MotionDriver: Send + Sync {
    async fn read_joints(&self) -> HardwareResult<Joints>;

    async fn command_joint_goal(
        &self,
        goal: &Joints,
        speed: f64,
        accel: f64,
    ) -> HardwareResult<MoveHandle>;

    async fn command_cartesian_goal(
        &self,
        goal: &Pose,
        speed: f64,
        accel: f64,
    ) -> HardwareResult<MoveHandle>;

    async fn command_gripper(&self, open: bool, force: Option<f64>) -> HardwareResult<()>;

    async fn stop(&self) -> HardwareResult<()>;

    /// Whether an in-flight command can be safely interrupted.
    fn supports_abort(&self) -> bool {
        false
    }

    async fn abort(&self) -> HardwareResult<()> {
        Err(HardwareError::AbortUnsupported)
    }
}

/// Forward and inverse kinematics solver.
#[async_trait]
pub trait Kinematics: Send + Sync {
    async fn fk(&self, joints: &Joints) -> HardwareResult<Pose>;

    async fn ik(&self, pose: &Pose, seed: Option<&Joints>) -> HardwareResult<Vec<Joints>>;
}

/// Hobby-servo style actuators: free servo channels and hand fingers.
#[async_trait]
pub trait Servo: Send + Sync {
    /// Set a servo channel to an angle in degrees (0–180).
    async fn set_angle(&self, channel: u8, angle: u16) -> HardwareResult<()>;

    /// Move one finger to a closure between 0.0 (open) and 1.0 (closed).
    async fn set_finger(&self, finger: u8, closure: f64) -> HardwareResult<()>;
}

/// Rules consulted before every motion command.
///
/// A rejection is reported as [`HardwareError::SafetyViolation`]; the command
/// is never sent.
#[async_trait]
pub trait SafetyRules: Send + Sync {
    async fn check_motion(&self, goal: &MotionGoal, state: &RobotState) -> HardwareResult<()>;
}
