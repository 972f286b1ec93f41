use super::{AudioError, AudioOutput, OutputConnection, SharedVoice, Voice};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
}

/// Process-wide audio clock plus the output it drives.
///
/// Starts suspended and is resumed lazily by the first operation that needs
/// it. Resumption is serialized so concurrent callers open the output once.
/// The clock reads seconds since the context started running.
pub struct AudioContext {
    output: Arc<dyn AudioOutput>,
    sample_rate: u32,
    started: Mutex<Option<Instant>>,
    resume_gate: tokio::sync::Mutex<()>,
}

impl AudioContext {
    pub fn new(output: Arc<dyn AudioOutput>, sample_rate: u32) -> Self {
        Self {
            output,
            sample_rate,
            started: Mutex::new(None),
            resume_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        match *self.started.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(_) => ContextState::Running,
            None => ContextState::Suspended,
        }
    }

    pub async fn ensure_running(&self) -> Result<(), AudioError> {
        if self.state() == ContextState::Running {
            return Ok(());
        }
        let _gate = self.resume_gate.lock().await;
        if self.state() == ContextState::Running {
            return Ok(());
        }

        debug!("resuming audio context");
        if let Err(err) = self.output.resume() {
            warn!("audio context failed to resume: {err}");
            return Err(err);
        }
        *self.started.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        info!(sample_rate = self.sample_rate, "audio context running");
        Ok(())
    }

    /// Current audio clock time in seconds; zero while suspended.
    pub fn now(&self) -> f64 {
        self.started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// A fresh voice whose first sample lines up with the current clock time.
    pub fn create_voice(&self) -> SharedVoice {
        Voice::new(self.sample_rate, self.now()).shared()
    }

    pub fn connect(&self, voice: SharedVoice) -> Result<Box<dyn OutputConnection>, AudioError> {
        if self.state() != ContextState::Running {
            return Err(AudioError::Suspended);
        }
        self.output.connect(voice)
    }

    /// Holds the resume gate so a test can stall `ensure_running`.
    #[cfg(test)]
    pub(crate) async fn hold_resume(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.resume_gate.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::FakeOutput;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn resumes_once_for_concurrent_callers() {
        let output = Arc::new(FakeOutput::default());
        let context = Arc::new(AudioContext::new(output.clone(), 8_000));
        assert_eq!(context.state(), ContextState::Suspended);
        assert_eq!(context.now(), 0.0);

        let (a, b) = tokio::join!(context.ensure_running(), context.ensure_running());
        a.unwrap();
        b.unwrap();
        assert_eq!(output.resumes(), 1);
        assert_eq!(context.state(), ContextState::Running);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!((context.now() - 0.25).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_suspended_when_resume_fails() {
        let output = Arc::new(FakeOutput::failing());
        let context = AudioContext::new(output.clone(), 8_000);

        assert!(matches!(context.ensure_running().await, Err(AudioError::Device(_))));
        assert_eq!(context.state(), ContextState::Suspended);
        assert!(matches!(context.connect(context.create_voice()), Err(AudioError::Suspended)));

        output.set_failing(false);
        context.ensure_running().await.unwrap();
        assert_eq!(output.resumes(), 2);
    }
}
