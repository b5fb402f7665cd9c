//! Plan execution for robovox.
//!
//! A plan is cut into batches: consecutive parallel-safe calls run together,
//! each exclusive call runs alone and acts as a barrier. Batches run strictly
//! in order. The executor never touches hardware itself; every call goes
//! through a [`SkillHost`](robovox_core::SkillHost).

pub mod batch;
pub mod executor;

pub use batch::{Batch, partition};
pub use executor::SkillExecutor;
