//! Detection module for supervised detection sessions
//!
//! Provides the session runner, the external engine boundary and the scoped
//! voice feedback resource handed to the engine.

mod engine;
mod feedback;
mod session;

pub use engine::{DetectionEngine, ProcessEngine};
pub use feedback::{CommandSynthesizer, FeedbackSession, FeedbackSink, Synthesizer};
pub use session::{DetectionSessionConfig, DetectionSessionResult, DetectionSessionRunner};
