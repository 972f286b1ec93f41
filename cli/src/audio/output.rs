use super::{lock_voice, AudioError, SharedVoice};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tracing::debug;

const SOURCE_BLOCK: usize = 512;

/// Where live voices are heard.
pub trait AudioOutput: Send + Sync {
    /// Brings the output into a running state. Called once per context.
    fn resume(&self) -> Result<(), AudioError>;

    fn connect(&self, voice: SharedVoice) -> Result<Box<dyn OutputConnection>, AudioError>;
}

pub trait OutputConnection: Send {
    fn disconnect(self: Box<Self>);
}

struct OpenStream {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

// SAFETY: cpal marks its stream `!Send` on every platform, but the stream
// is never used after it is opened. It is only kept alive and dropped, and
// all playback goes through the `Send + Sync` handle.
unsafe impl Send for OpenStream {}

/// Default sound device via rodio.
pub struct RodioOutput {
    stream: Mutex<Option<OpenStream>>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self { stream: Mutex::new(None) }
    }
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for RodioOutput {
    fn resume(&self) -> Result<(), AudioError> {
        let mut guard = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            let (stream, handle) =
                OutputStream::try_default().map_err(|err| AudioError::Device(err.to_string()))?;
            debug!("opened default audio output");
            *guard = Some(OpenStream { _stream: stream, handle });
        }
        Ok(())
    }

    fn connect(&self, voice: SharedVoice) -> Result<Box<dyn OutputConnection>, AudioError> {
        let guard = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let open = guard.as_ref().ok_or(AudioError::Suspended)?;
        let sink =
            Sink::try_new(&open.handle).map_err(|err| AudioError::Device(err.to_string()))?;
        sink.append(VoiceSource::new(voice));
        sink.play();
        Ok(Box::new(RodioConnection { sink }))
    }
}

struct RodioConnection {
    sink: Sink,
}

impl OutputConnection for RodioConnection {
    fn disconnect(self: Box<Self>) {
        self.sink.stop();
    }
}

/// Output that accepts voices without ever pulling samples, for headless use.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn resume(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn connect(&self, _voice: SharedVoice) -> Result<Box<dyn OutputConnection>, AudioError> {
        Ok(Box::new(NullConnection))
    }
}

struct NullConnection;

impl OutputConnection for NullConnection {
    fn disconnect(self: Box<Self>) {}
}

/// Streams a voice into rodio, pulling blocks to keep lock traffic low.
pub struct VoiceSource {
    voice: SharedVoice,
    sample_rate: u32,
    block: Vec<f32>,
    pos: usize,
}

impl VoiceSource {
    pub fn new(voice: SharedVoice) -> Self {
        let sample_rate = lock_voice(&voice).sample_rate();
        Self { voice, sample_rate, block: Vec::with_capacity(SOURCE_BLOCK), pos: 0 }
    }
}

impl Iterator for VoiceSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.block.len() {
            let mut voice = lock_voice(&self.voice);
            if voice.is_finished() {
                return None;
            }
            self.block.clear();
            self.pos = 0;
            voice.fill(&mut self.block, SOURCE_BLOCK);
        }
        let sample = self.block[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for VoiceSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Voice;

    #[test]
    fn voice_source_ends_when_voice_finishes() {
        let voice = Voice::new(4_000, 0.0).shared();
        lock_voice(&voice).trigger_attack_release("C4".parse().unwrap(), 0.25, 0.0).unwrap();

        let source = VoiceSource::new(voice.clone());
        assert_eq!(source.sample_rate(), 4_000);
        let produced = source.count();
        // 0.25s held plus 1s release, rounded up to whole blocks.
        assert!(produced >= 5_000 && produced < 5_000 + SOURCE_BLOCK);
        assert!(lock_voice(&voice).is_finished());
    }

    #[test]
    fn null_output_connects_without_pulling() {
        let voice = Voice::new(4_000, 0.0).shared();
        NullOutput.resume().unwrap();
        NullOutput.connect(voice.clone()).unwrap().disconnect();
        assert!((lock_voice(&voice).now() - 0.0).abs() < f64::EPSILON);
    }
}
