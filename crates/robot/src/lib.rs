//! Robot capability registry for robovox.
//!
//! [`RobotTools`] exposes the skill catalogue as a [`SkillHost`] and is the
//! single boundary into the hardware capability interfaces. A simulated arm
//! and the default workspace safety rules ship alongside it.
//!
//! [`SkillHost`]: robovox_core::skill::SkillHost

pub mod locks;
pub mod safety;
pub mod sim;
pub mod skills;
pub mod tools;

use std::sync::Arc;

use robovox_config::AppConfig;

pub use locks::ActuatorLocks;
pub use safety::WorkspaceLimits;
pub use sim::{HardwareCall, SimulatedArm};
pub use skills::{Actuator, Direction, Skill, SkillKind, catalogue_schema};
pub use tools::{MotionDefaults, RobotTools};

/// Build a registry over the simulated arm using the hardware and executor
/// settings from `config`.
pub fn simulated(config: &AppConfig) -> (Arc<SimulatedArm>, RobotTools) {
    let arm = Arc::new(SimulatedArm::new(config.hardware.simulated_latency()));
    let tools = RobotTools::new(
        arm.clone(),
        arm.clone(),
        arm.clone(),
        Arc::new(WorkspaceLimits::from_config(&config.hardware)),
    )
    .with_transient_retry(
        config.executor.transient_retries,
        config.executor.transient_retry_delay(),
    )
    .with_motion_defaults(MotionDefaults {
        speed: config.hardware.default_speed,
        accel: config.hardware.default_accel,
        step_mm: config.hardware.default_step_mm,
    });
    (arm, tools)
}
