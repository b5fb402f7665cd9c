//! A simulated arm with a five-finger hand and free servo channels.
//!
//! Implements every hardware capability interface so the orchestrator can run
//! without a robot attached. Each command takes a fixed latency, failures can
//! be injected per operation, and every call is recorded with its start and
//! end instants.
//!
//! Kinematics are a linear toy model: x, y and z follow joints 0–2 at 2 mm per
//! degree around a home point, and the wrist joints map straight to rx/ry/rz.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use robovox_core::error::HardwareError;
use robovox_core::hardware::{HardwareResult, Joints, Kinematics, MotionDriver, MoveHandle, Pose, Servo};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::skills::FINGER_COUNT;

const JOINT_COUNT: usize = 6;
const MM_PER_DEGREE: f64 = 2.0;
const HOME: (f64, f64, f64) = (300.0, 0.0, 300.0);

/// One recorded hardware call.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareCall {
    pub op: &'static str,
    /// Finger index or servo channel, when the op has one.
    pub target: Option<u8>,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub ok: bool,
}

impl HardwareCall {
    pub fn overlaps(&self, other: &HardwareCall) -> bool {
        self.started_at < other.finished_at && other.started_at < self.finished_at
    }
}

#[derive(Default)]
struct SimState {
    joints: Vec<f64>,
    gripper_open: bool,
    fingers: [f64; FINGER_COUNT as usize],
    servo_angles: HashMap<u8, u16>,
    counters: HashMap<&'static str, usize>,
    faults: HashMap<&'static str, BTreeMap<usize, HardwareError>>,
    log: Vec<HardwareCall>,
}

/// Simulated robot hardware.
pub struct SimulatedArm {
    latency: Duration,
    abort_supported: bool,
    abort: Notify,
    state: Mutex<SimState>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedArm {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            abort_supported: false,
            abort: Notify::new(),
            state: Mutex::new(SimState {
                joints: vec![0.0; JOINT_COUNT],
                gripper_open: true,
                ..SimState::default()
            }),
        }
    }

    /// Let in-flight motion be interrupted by [`MotionDriver::abort`].
    pub fn with_abort_support(mut self) -> Self {
        self.abort_supported = true;
        self
    }

    /// Make the `nth` (1-based) call of `op` fail with `error`.
    ///
    /// Ops: `read_joints`, `command_joint_goal`, `command_cartesian_goal`,
    /// `command_gripper`, `stop`, `fk`, `ik`, `set_angle`, `set_finger`.
    pub fn fail_call(&self, op: &'static str, nth: usize, error: HardwareError) {
        lock(&self.state)
            .faults
            .entry(op)
            .or_default()
            .insert(nth, error);
    }

    /// Every hardware call so far, in completion order.
    pub fn calls(&self) -> Vec<HardwareCall> {
        lock(&self.state).log.clone()
    }

    /// Recorded calls of one op.
    pub fn calls_of(&self, op: &str) -> Vec<HardwareCall> {
        lock(&self.state)
            .log
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    pub fn joints(&self) -> Vec<f64> {
        lock(&self.state).joints.clone()
    }

    pub fn finger(&self, finger: u8) -> Option<f64> {
        lock(&self.state).fingers.get(usize::from(finger)).copied()
    }

    pub fn servo_angle(&self, channel: u8) -> Option<u16> {
        lock(&self.state).servo_angles.get(&channel).copied()
    }

    pub fn gripper_open(&self) -> bool {
        lock(&self.state).gripper_open
    }

    /// Run one simulated operation: count it, apply any injected fault,
    /// wait out the latency (interruptible when abort is supported) and
    /// record it.
    async fn operate(&self, op: &'static str, target: Option<u8>, latency: Duration) -> HardwareResult<()> {
        let fault = {
            let mut state = lock(&self.state);
            let counter = state.counters.entry(op).or_insert(0);
            *counter += 1;
            let nth = *counter;
            state.faults.get_mut(op).and_then(|f| f.remove(&nth))
        };

        let started_at = Instant::now();
        let aborted = self.abort.notified();
        tokio::pin!(aborted);

        let outcome = if latency.is_zero() {
            Ok(())
        } else if self.abort_supported {
            tokio::select! {
                _ = tokio::time::sleep(latency) => Ok(()),
                _ = &mut aborted => Err(HardwareError::Aborted),
            }
        } else {
            tokio::time::sleep(latency).await;
            Ok(())
        };
        let outcome = match (outcome, fault) {
            (Ok(()), Some(err)) => Err(err),
            (other, _) => other,
        };

        debug!(op, ?target, ok = outcome.is_ok(), "Simulated hardware call");
        lock(&self.state).log.push(HardwareCall {
            op,
            target,
            started_at,
            finished_at: Instant::now(),
            ok: outcome.is_ok(),
        });
        outcome
    }

    fn forward(joints: &[f64]) -> HardwareResult<Pose> {
        if joints.len() != JOINT_COUNT {
            return Err(HardwareError::Fatal(format!(
                "kinematics expects {JOINT_COUNT} joints, got {}",
                joints.len()
            )));
        }
        Ok(Pose::new(
            HOME.0 + joints[0] * MM_PER_DEGREE,
            HOME.1 + joints[1] * MM_PER_DEGREE,
            HOME.2 + joints[2] * MM_PER_DEGREE,
            joints[3],
            joints[4],
            joints[5],
        ))
    }

    fn inverse(pose: &Pose) -> Joints {
        Joints::new(vec![
            (pose.x - HOME.0) / MM_PER_DEGREE,
            (pose.y - HOME.1) / MM_PER_DEGREE,
            (pose.z - HOME.2) / MM_PER_DEGREE,
            pose.rx,
            pose.ry,
            pose.rz,
        ])
    }

    fn handle() -> MoveHandle {
        MoveHandle {
            handle_id: Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl MotionDriver for SimulatedArm {
    async fn read_joints(&self) -> HardwareResult<Joints> {
        self.operate("read_joints", None, Duration::ZERO).await?;
        Ok(Joints::new(self.joints()))
    }

    async fn command_joint_goal(&self, goal: &Joints, _speed: f64, _accel: f64) -> HardwareResult<MoveHandle> {
        if goal.values.len() != JOINT_COUNT {
            return Err(HardwareError::Fatal(format!(
                "controller expects {JOINT_COUNT} joints, got {}",
                goal.values.len()
            )));
        }
        self.operate("command_joint_goal", None, self.latency).await?;
        lock(&self.state).joints = goal.values.clone();
        Ok(Self::handle())
    }

    async fn command_cartesian_goal(&self, goal: &Pose, _speed: f64, _accel: f64) -> HardwareResult<MoveHandle> {
        let joints = Self::inverse(goal);
        self.operate("command_cartesian_goal", None, self.latency).await?;
        lock(&self.state).joints = joints.values;
        Ok(Self::handle())
    }

    async fn command_gripper(&self, open: bool, _force: Option<f64>) -> HardwareResult<()> {
        self.operate("command_gripper", None, self.latency).await?;
        lock(&self.state).gripper_open = open;
        Ok(())
    }

    async fn stop(&self) -> HardwareResult<()> {
        self.operate("stop", None, Duration::ZERO).await
    }

    fn supports_abort(&self) -> bool {
        self.abort_supported
    }

    async fn abort(&self) -> HardwareResult<()> {
        if !self.abort_supported {
            return Err(HardwareError::AbortUnsupported);
        }
        self.abort.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl Kinematics for SimulatedArm {
    async fn fk(&self, joints: &Joints) -> HardwareResult<Pose> {
        self.operate("fk", None, Duration::ZERO).await?;
        Self::forward(&joints.values)
    }

    async fn ik(&self, pose: &Pose, _seed: Option<&Joints>) -> HardwareResult<Vec<Joints>> {
        self.operate("ik", None, Duration::ZERO).await?;
        Ok(vec![Self::inverse(pose)])
    }
}

#[async_trait]
impl Servo for SimulatedArm {
    async fn set_angle(&self, channel: u8, angle: u16) -> HardwareResult<()> {
        self.operate("set_angle", Some(channel), self.latency).await?;
        lock(&self.state).servo_angles.insert(channel, angle);
        Ok(())
    }

    async fn set_finger(&self, finger: u8, closure: f64) -> HardwareResult<()> {
        if finger >= FINGER_COUNT {
            return Err(HardwareError::Fatal(format!("no finger {finger}")));
        }
        self.operate("set_finger", Some(finger), self.latency).await?;
        lock(&self.state).fingers[usize::from(finger)] = closure;
        Ok(())
    }
}
