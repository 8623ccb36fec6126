//! State machine module for the voice control loop
//!
//! Provides an explicit state machine with five states:
//! - Listening: microphone open, waiting for speech
//! - Recognizing: captured phrase sent to the recognition service
//! - Dispatching: transcript classified into a command
//! - RunningSession: detection session in progress
//! - Stopped: terminal, after an exit command or an interrupt

mod machine;

pub use machine::{SessionController, State, StopReason};
