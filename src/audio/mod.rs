//! Audio module for microphone capture
//!
//! Provides bounded phrase capture over an abstract microphone, a cpal
//! input-device microphone and a recorder-process alternative.

mod capture;
mod device;
mod microphone;

pub use capture::{AudioCapture, AudioSample, CaptureOutcome, Microphone, MicrophoneStream};
pub use device::DeviceMicrophone;
pub use microphone::CommandMicrophone;
