//! RobotTools: the only component that talks to hardware.
//!
//! Every call is validated against the capability schema and range-checked
//! before any hardware interface is touched. Calls touching the same actuator
//! are serialized no matter how the plan scheduled them, transient failures
//! are retried, and every outcome comes back as a classified [`SkillResult`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use robovox_core::error::{FailureClass, HardwareError};
use robovox_core::hardware::{
    HardwareResult, Joints, Kinematics, MotionDriver, MotionGoal, RobotState, SafetyRules, Servo,
};
use robovox_core::skill::{CapabilitySchema, SkillCall, SkillFailure, SkillHost, SkillResult};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::locks::ActuatorLocks;
use crate::skills::{MotionProfile, Skill, catalogue_schema};

/// Defaults applied to motion skills that do not specify them.
#[derive(Debug, Clone, Copy)]
pub struct MotionDefaults {
    pub speed: f64,
    pub accel: f64,
    pub step_mm: f64,
}

impl Default for MotionDefaults {
    fn default() -> Self {
        let hw = robovox_config::HardwareConfig::default();
        Self {
            speed: hw.default_speed,
            accel: hw.default_accel,
            step_mm: hw.default_step_mm,
        }
    }
}

/// The robot's capability registry.
pub struct RobotTools {
    driver: Arc<dyn MotionDriver>,
    kinematics: Arc<dyn Kinematics>,
    servo: Arc<dyn Servo>,
    safety: Arc<dyn SafetyRules>,
    schema: CapabilitySchema,
    locks: ActuatorLocks,
    transient_retries: u32,
    transient_retry_delay: Duration,
    motion: MotionDefaults,
}

impl RobotTools {
    pub fn new(
        driver: Arc<dyn MotionDriver>,
        kinematics: Arc<dyn Kinematics>,
        servo: Arc<dyn Servo>,
        safety: Arc<dyn SafetyRules>,
    ) -> Self {
        Self {
            driver,
            kinematics,
            servo,
            safety,
            schema: catalogue_schema(),
            locks: ActuatorLocks::new(),
            transient_retries: 1,
            transient_retry_delay: Duration::from_millis(250),
            motion: MotionDefaults::default(),
        }
    }

    /// Retry policy for transient hardware failures.
    pub fn with_transient_retry(mut self, retries: u32, delay: Duration) -> Self {
        self.transient_retries = retries;
        self.transient_retry_delay = delay;
        self
    }

    pub fn with_motion_defaults(mut self, motion: MotionDefaults) -> Self {
        self.motion = motion;
        self
    }

    /// Read joints and compose the TCP pose through forward kinematics.
    pub async fn get_state(&self) -> HardwareResult<RobotState> {
        let joints = self.driver.read_joints().await?;
        let tcp = self.kinematics.fk(&joints).await?;
        Ok(RobotState {
            joints,
            tcp,
            mode: "idle".into(),
        })
    }

    async fn checked_move(&self, goal: MotionGoal, profile: MotionProfile) -> HardwareResult<Value> {
        let state = self.get_state().await?;
        self.safety.check_motion(&goal, &state).await?;

        let speed = profile.speed.unwrap_or(self.motion.speed);
        let accel = profile.accel.unwrap_or(self.motion.accel);
        let handle = match &goal {
            MotionGoal::Pose(pose) => {
                self.driver
                    .command_cartesian_goal(pose, speed, accel)
                    .await?
            }
            MotionGoal::Joints(joints) => self.driver.command_joint_goal(joints, speed, accel).await?,
        };
        Ok(json!({ "handle_id": handle.handle_id }))
    }

    /// Issue the hardware calls for one attempt of a skill.
    async fn perform(&self, skill: &Skill) -> HardwareResult<Value> {
        match skill {
            Skill::GetJointPositions => {
                let joints = self.driver.read_joints().await?;
                Ok(json!({ "joints": joints.values }))
            }
            Skill::GetTcpPose { frame } => {
                let joints = self.driver.read_joints().await?;
                let mut pose = self.kinematics.fk(&joints).await?;
                pose.frame = frame.clone();
                Ok(to_value(&pose))
            }
            Skill::GetState => Ok(to_value(&self.get_state().await?)),
            Skill::MoveTo {
                direction,
                distance_mm,
                profile,
            } => {
                let state = self.get_state().await?;
                let distance = distance_mm.unwrap_or(self.motion.step_mm);
                let (dx, dy, dz) = direction.unit();
                let goal = state.tcp.translated(dx * distance, dy * distance, dz * distance);
                self.checked_move(MotionGoal::Pose(goal), *profile).await
            }
            Skill::MoveP2pPose { pose, profile } => {
                self.checked_move(MotionGoal::Pose(pose.clone()), *profile)
                    .await
            }
            Skill::MoveP2pJoints { joints, profile } => {
                self.checked_move(MotionGoal::Joints(joints.clone()), *profile)
                    .await
            }
            Skill::Stop => {
                self.driver.stop().await?;
                Ok(json!({ "status": "stopped" }))
            }
            Skill::SetGripper { open, force } => {
                self.driver.command_gripper(*open, *force).await?;
                Ok(json!({ "state": if *open { "open" } else { "closed" } }))
            }
            Skill::AdjustFinger { finger, closure } => {
                self.servo.set_finger(*finger, *closure).await?;
                Ok(json!({ "finger": finger, "position": closure }))
            }
            Skill::RunFk { joints } => Ok(to_value(&self.kinematics.fk(joints).await?)),
            Skill::RunIk { pose, seed } => {
                let solutions: Vec<Joints> = self.kinematics.ik(pose, seed.as_ref()).await?;
                Ok(json!({ "solutions": solutions.into_iter().map(|j| j.values).collect::<Vec<_>>() }))
            }
            Skill::SetServoAngle { channel, angle } => {
                self.servo.set_angle(*channel, *angle).await?;
                Ok(json!({ "status": "done", "channel": channel, "angle": angle }))
            }
            Skill::EndSession { reason } => {
                Ok(json!({ "status": "session_end", "reason": reason }))
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[async_trait]
impl SkillHost for RobotTools {
    fn schema(&self) -> &CapabilitySchema {
        &self.schema
    }

    async fn invoke(&self, call: &SkillCall) -> SkillResult {
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        if let Err(e) = self.schema.validate(call) {
            warn!(skill = %call.name(), error = %e, "Skill call rejected by schema");
            return SkillResult::failed(call, SkillFailure::from(&e))
                .with_attempts(0)
                .with_duration_ms(elapsed_ms());
        }

        let skill = match Skill::parse(call) {
            Ok(skill) => skill,
            Err(e) => {
                warn!(skill = %call.name(), error = %e, "Skill arguments rejected");
                return SkillResult::failed(
                    call,
                    SkillFailure {
                        class: FailureClass::Rejected,
                        message: e.to_string(),
                    },
                )
                .with_attempts(0)
                .with_duration_ms(elapsed_ms());
            }
        };

        let actuators = skill.actuators();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = {
                let _guard = self.locks.acquire(&actuators).await;
                debug!(skill = %call.name(), attempt, ?actuators, "Invoking skill");
                self.perform(&skill).await
            };

            match outcome {
                Ok(payload) => {
                    info!(skill = %call.name(), call_id = %call.id(), attempt, "Skill succeeded");
                    return SkillResult::ok(call, Some(payload))
                        .with_attempts(attempt)
                        .with_duration_ms(elapsed_ms());
                }
                Err(e) if e.class() == FailureClass::Transient && attempt <= self.transient_retries => {
                    warn!(
                        skill = %call.name(),
                        attempt,
                        error = %e,
                        "Transient hardware failure, retrying"
                    );
                    tokio::time::sleep(self.transient_retry_delay).await;
                }
                Err(e) => {
                    match e.class() {
                        FailureClass::Fatal => {
                            error!(skill = %call.name(), call_id = %call.id(), error = %e, "Fatal hardware failure")
                        }
                        _ => warn!(skill = %call.name(), call_id = %call.id(), error = %e, "Skill failed"),
                    }
                    return SkillResult::failed(call, SkillFailure::from(&e))
                        .with_attempts(attempt)
                        .with_duration_ms(elapsed_ms());
                }
            }
        }
    }

    fn supports_abort(&self) -> bool {
        self.driver.supports_abort()
    }

    async fn abort(&self) -> Result<(), HardwareError> {
        info!("Aborting in-flight motion");
        self.driver.abort().await
    }
}
