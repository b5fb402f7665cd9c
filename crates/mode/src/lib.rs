//! The LLM mode: robovox's orchestrator.
//!
//! [`LlmMode`] consumes transcript events and drives each turn through:
//!
//! 1. **Listening**: fragments accumulate until end-of-utterance
//! 2. **Planning**: the planner returns a plan or a plain reply
//! 3. **Executing**: the skill executor runs the plan
//! 4. **Responding**: the result is spoken, then back to idle
//!
//! Failures go through **Error** (spoken) back to idle. Speaking while a turn
//! is in flight cancels it: the cancelled turn is finalized and recorded, then
//! the new utterance starts a fresh cycle.

pub mod mode;
pub mod state;
mod turn;
pub mod wording;

pub use mode::{LlmMode, ModeReport, end_reason};
pub use state::{ModeState, ModeStateMachine};
pub use wording::clean_for_speech;
