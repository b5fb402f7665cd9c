//! Per-actuator mutual exclusion.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::skills::Actuator;

/// One async lock per physical actuator, created on first use.
#[derive(Default)]
pub struct ActuatorLocks {
    locks: Mutex<HashMap<Actuator, Arc<tokio::sync::Mutex<()>>>>,
}

/// Guards for a set of actuators; released on drop.
pub struct ActuatorGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ActuatorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, actuator: Actuator) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(actuator)
            .or_default()
            .clone()
    }

    /// Acquire every listed actuator. Locks are taken in sorted order so two
    /// calls needing overlapping sets cannot deadlock.
    pub async fn acquire(&self, actuators: &[Actuator]) -> ActuatorGuard {
        let ordered: BTreeSet<Actuator> = actuators.iter().copied().collect();
        let mut guards = Vec::with_capacity(ordered.len());
        for actuator in ordered {
            guards.push(self.lock_for(actuator).lock_owned().await);
        }
        ActuatorGuard { _guards: guards }
    }
}
