use crate::audio::{AudioError, CaptureError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MelodyError {
    #[error("no moods to turn into a melody")]
    EmptyInput,

    #[error("a melody is already playing")]
    AlreadyPlaying,

    #[error("audio context failed to start")]
    AudioContext(#[source] AudioError),

    #[error("failed to arm melody notes")]
    Synthesis(#[source] AudioError),

    #[error("recorder failed to start")]
    CaptureStart(#[source] CaptureError),

    #[error("recorder failed to stop")]
    CaptureStop(#[source] CaptureError),

    #[error("failed to save `{filename}`")]
    Dispatch {
        filename: String,
        #[source]
        source: std::io::Error,
    },
}
