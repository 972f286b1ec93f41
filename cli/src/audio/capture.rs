use super::{lock_voice, CaptureError, SharedVoice};
use async_trait::async_trait;
use std::{io::Cursor, time::Duration};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

const CAPTURE_TICK: Duration = Duration::from_millis(20);

/// Opens capture sinks bound to a voice.
pub trait CaptureDevice: Send + Sync {
    fn open(&self, voice: SharedVoice) -> Result<Box<dyn CaptureSink>, CaptureError>;
}

/// A recorder tapping one voice in real time.
#[async_trait]
pub trait CaptureSink: Send {
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Stops capturing and returns the encoded recording.
    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError>;

    /// Releases the voice and any running capture. Safe to call repeatedly.
    fn dispose(&mut self);
}

/// Captures voices into 16-bit mono WAV.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCapture;

impl CaptureDevice for WavCapture {
    fn open(&self, voice: SharedVoice) -> Result<Box<dyn CaptureSink>, CaptureError> {
        Ok(Box::new(WavRecorder::new(voice)))
    }
}

struct Tap {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<Vec<f32>>,
}

pub struct WavRecorder {
    voice: Option<SharedVoice>,
    sample_rate: u32,
    tap: Option<Tap>,
    stopped: bool,
}

impl WavRecorder {
    pub fn new(voice: SharedVoice) -> Self {
        let sample_rate = lock_voice(&voice).sample_rate();
        Self { voice: Some(voice), sample_rate, tap: None, stopped: false }
    }
}

#[async_trait]
impl CaptureSink for WavRecorder {
    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.tap.is_some() || self.stopped {
            return Err(CaptureError::AlreadyStarted);
        }
        let voice = self.voice.clone().ok_or(CaptureError::Disposed)?;
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_tap(voice, self.sample_rate, stop_rx));
        self.tap = Some(Tap { stop_tx, task });
        debug!(sample_rate = self.sample_rate, "capture started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        let tap = self.tap.take().ok_or(CaptureError::NotStarted)?;
        self.stopped = true;
        let _ = tap.stop_tx.send(());
        let samples = tap.task.await?;
        if samples.is_empty() {
            return Err(CaptureError::Empty);
        }
        debug!(samples = samples.len(), "capture stopped");
        encode_wav(&samples, self.sample_rate)
    }

    fn dispose(&mut self) {
        if let Some(tap) = self.tap.take() {
            warn!("disposing capture that was still running");
            tap.task.abort();
        }
        self.voice = None;
    }
}

impl Drop for WavRecorder {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Pulls samples from the voice as fast as wall-clock time passes.
async fn run_tap(
    voice: SharedVoice,
    sample_rate: u32,
    mut stop_rx: oneshot::Receiver<()>,
) -> Vec<f32> {
    let started = Instant::now();
    let mut samples = Vec::new();
    let mut ticker = interval(CAPTURE_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => pull(&voice, sample_rate, started, &mut samples),
            _ = &mut stop_rx => {
                pull(&voice, sample_rate, started, &mut samples);
                break;
            }
        }
    }
    samples
}

fn pull(voice: &SharedVoice, sample_rate: u32, started: Instant, samples: &mut Vec<f32>) {
    let target = (started.elapsed().as_secs_f64() * f64::from(sample_rate)).round() as usize;
    if target > samples.len() {
        let missing = target - samples.len();
        lock_voice(voice).fill(samples, missing);
    }
}

pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer.write_sample(quantized)?;
    }
    writer.finalize()?;
    Ok(cursor.into_inner())
}
