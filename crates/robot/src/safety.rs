//! Motion safety rules.

use async_trait::async_trait;
use robovox_core::error::HardwareError;
use robovox_core::hardware::{HardwareResult, MotionGoal, RobotState, SafetyRules};

/// Joint limits plus a reach sphere and floor height.
#[derive(Debug, Clone)]
pub struct WorkspaceLimits {
    joint_limits: Vec<[f64; 2]>,
    max_reach_mm: f64,
    min_z_mm: f64,
}

impl WorkspaceLimits {
    pub fn new(joint_limits: Vec<[f64; 2]>, max_reach_mm: f64, min_z_mm: f64) -> Self {
        Self {
            joint_limits,
            max_reach_mm,
            min_z_mm,
        }
    }

    pub fn from_config(config: &robovox_config::HardwareConfig) -> Self {
        Self::new(
            config.joint_limits_deg.clone(),
            config.max_reach_mm,
            config.min_z_mm,
        )
    }

    fn check_joints(&self, values: &[f64]) -> HardwareResult<()> {
        if values.len() != self.joint_limits.len() {
            return Err(HardwareError::SafetyViolation(format!(
                "expected {} joint values, got {}",
                self.joint_limits.len(),
                values.len()
            )));
        }
        for (i, (value, [min, max])) in values.iter().zip(&self.joint_limits).enumerate() {
            if value < min || value > max {
                return Err(HardwareError::SafetyViolation(format!(
                    "joint {i} target {value:.1}° outside [{min:.1}, {max:.1}]"
                )));
            }
        }
        Ok(())
    }
}

impl Default for WorkspaceLimits {
    fn default() -> Self {
        Self::from_config(&robovox_config::HardwareConfig::default())
    }
}

#[async_trait]
impl SafetyRules for WorkspaceLimits {
    async fn check_motion(&self, goal: &MotionGoal, _state: &RobotState) -> HardwareResult<()> {
        match goal {
            MotionGoal::Joints(joints) => self.check_joints(&joints.values),
            MotionGoal::Pose(pose) => {
                if pose.reach() > self.max_reach_mm {
                    return Err(HardwareError::SafetyViolation(format!(
                        "target is {:.0} mm from the base, limit is {:.0} mm",
                        pose.reach(),
                        self.max_reach_mm
                    )));
                }
                if pose.z < self.min_z_mm {
                    return Err(HardwareError::SafetyViolation(format!(
                        "target height {:.0} mm is below {:.0} mm",
                        pose.z, self.min_z_mm
                    )));
                }
                Ok(())
            }
        }
    }
}
