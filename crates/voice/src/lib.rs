//! Speech adapters for running robovox from a terminal.
//!
//! Real recognizers and TTS engines plug in through the same
//! [`SpeechInput`](robovox_core::speech::SpeechInput) and
//! [`SpeechOutput`](robovox_core::speech::SpeechOutput) traits.

pub mod console;
pub mod lines;

pub use console::ConsoleSpeechOutput;
pub use lines::LineSpeechInput;
