//! Audio plumbing shared by live playback and offline rendering.
//!
//! An [`AudioContext`] owns the process-wide output and the audio clock.
//! Operations create a fresh [`Voice`] per call, arm note triggers on it at
//! absolute clock times and hand it either to the output device (live) or to
//! a [`CaptureSink`] (offline).

mod capture;
mod context;
mod output;
mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::{encode_wav, CaptureDevice, CaptureSink, WavCapture, WavRecorder};
pub use context::{AudioContext, ContextState};
pub use output::{AudioOutput, NullOutput, OutputConnection, RodioOutput, VoiceSource};
pub use voice::{lock_voice, SharedVoice, Voice};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio output: {0}")]
    Device(String),
    #[error("audio context is not running")]
    Suspended,
    #[error("note at {at:.3}s armed after a note at {previous:.3}s")]
    OutOfOrder { at: f64, previous: f64 },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture already started")]
    AlreadyStarted,
    #[error("capture was never started")]
    NotStarted,
    #[error("capture sink has been disposed")]
    Disposed,
    #[error("capture produced no audio")]
    Empty,
    #[error("capture device unavailable: {0}")]
    Device(String),
    #[error("capture task failed")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to encode recording")]
    Encode(#[from] hound::Error),
}
