use super::{
    arm_schedule,
    sequencer::{build_schedule, seconds},
    MelodyError,
};
use crate::{
    audio::{AudioContext, CaptureDevice, CaptureError, CaptureSink, SharedVoice},
    mood::Pitch,
};
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// An encoded melody ready to be saved.
#[derive(Debug, Clone)]
pub struct RenderedAsset {
    bytes: Vec<u8>,
    filename: String,
    note_count: usize,
    duration: Duration,
}

impl RenderedAsset {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn note_count(&self) -> usize {
        self.note_count
    }

    /// Wall-clock time the capture ran for.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[cfg(test)]
    pub(crate) fn for_tests(bytes: Vec<u8>, filename: &str) -> Self {
        Self { bytes, filename: filename.to_string(), note_count: 0, duration: Duration::ZERO }
    }
}

/// Voice and recorder owned by a single render; both released on drop.
struct RenderSession {
    voice: SharedVoice,
    sink: Box<dyn CaptureSink>,
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.sink.dispose();
        debug!("released render voice and recorder");
    }
}

pub struct RenderEngine {
    context: Arc<AudioContext>,
    capture: Arc<dyn CaptureDevice>,
}

impl RenderEngine {
    pub fn new(context: Arc<AudioContext>, capture: Arc<dyn CaptureDevice>) -> Self {
        Self { context, capture }
    }

    /// Records the melody for `pitches` in real time and returns the WAV.
    ///
    /// Takes `pitches.len() * 0.5s` plus the trailing margin, the same span a
    /// live playback of the melody lasts.
    pub async fn render(
        &self,
        pitches: &[Pitch],
        filename: &str,
    ) -> Result<RenderedAsset, MelodyError> {
        if pitches.is_empty() {
            return Err(MelodyError::EmptyInput);
        }
        info!(notes = pitches.len(), filename, "rendering melody");
        self.context.ensure_running().await.map_err(MelodyError::AudioContext)?;

        let voice = self.context.create_voice();
        let sink = self.capture.open(voice.clone()).map_err(MelodyError::CaptureStart)?;
        let mut session = RenderSession { voice, sink };

        session.sink.start().await.map_err(MelodyError::CaptureStart)?;
        let started = Instant::now();

        let schedule = build_schedule(pitches);
        arm_schedule(&session.voice, &schedule, self.context.now())?;
        sleep(seconds(schedule.completion_offset())).await;

        let bytes = session.sink.stop().await.map_err(MelodyError::CaptureStop)?;
        if bytes.is_empty() {
            return Err(MelodyError::CaptureStop(CaptureError::Empty));
        }
        let duration = started.elapsed();
        drop(session);

        info!(bytes = bytes.len(), seconds = duration.as_secs_f64(), "melody rendered");
        Ok(RenderedAsset {
            bytes,
            filename: filename.to_string(),
            note_count: schedule.len(),
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            testing::{FakeCapture, FakeOutput},
            WavCapture,
        },
        mood::Mood,
    };
    use std::io::Cursor;

    const RATE: u32 = 8_000;

    fn engine(output: FakeOutput, capture: Arc<dyn CaptureDevice>) -> RenderEngine {
        let context = Arc::new(AudioContext::new(Arc::new(output), RATE));
        RenderEngine::new(context, capture)
    }

    fn pitches(names: &[&str]) -> Vec<Pitch> {
        names.iter().map(|name| name.parse().unwrap()).collect()
    }

    /// Estimates the pitch of a triangle wave from its zero crossings.
    fn dominant_frequency(samples: &[i16]) -> f64 {
        let crossings = samples.windows(2).filter(|w| (w[0] < 0) != (w[1] < 0)).count();
        crossings as f64 / 2.0 / (samples.len() as f64 / f64::from(RATE))
    }

    #[tokio::test(start_paused = true)]
    async fn renders_after_full_schedule_has_elapsed() {
        let engine = engine(FakeOutput::default(), Arc::new(WavCapture));
        let started = Instant::now();

        let asset = engine.render(&pitches(&["C4", "E4", "G4"]), "melody.wav").await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(1_700));
        assert!(!asset.bytes().is_empty());
        assert_eq!(asset.note_count(), 3);
        assert_eq!(asset.filename(), "melody.wav");
    }

    #[tokio::test(start_paused = true)]
    async fn recording_contains_each_note_in_order() {
        let engine = engine(FakeOutput::default(), Arc::new(WavCapture));
        let melody = pitches(&["C4", "E4", "A3"]);
        let asset = engine.render(&melody, "melody.wav").await.unwrap();

        let mut reader = hound::WavReader::new(Cursor::new(asset.bytes().to_vec())).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        let seconds = samples.len() as f64 / f64::from(RATE);
        assert!((seconds - 1.7).abs() < 0.05, "recording lasted {seconds}s");

        let per_note = (0.5 * f64::from(RATE)) as usize;
        for (i, pitch) in melody.iter().enumerate() {
            // Skip the attack and stop before the next onset.
            let from = i * per_note + per_note / 10;
            let to = i * per_note + per_note * 4 / 10;
            let measured = dominant_frequency(&samples[from..to]);
            let wanted = pitch.frequency();
            assert!((measured - wanted).abs() / wanted < 0.05, "note {i}: {measured} Hz vs {wanted} Hz");
        }
        assert_eq!(asset.note_count(), melody.len());
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_empty_input() {
        let capture = Arc::new(FakeCapture::default());
        let engine = engine(FakeOutput::default(), capture.clone());
        assert!(matches!(engine.render(&[], "x.wav").await, Err(MelodyError::EmptyInput)));
        assert!(!capture.tracker.disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_start_failure_releases_voice_and_sink() {
        let capture = Arc::new(FakeCapture { fail_start: true, ..FakeCapture::default() });
        let engine = engine(FakeOutput::default(), capture.clone());

        let err = engine.render(&pitches(&["C4", "E4", "G4"]), "x.wav").await.unwrap_err();
        assert!(matches!(err, MelodyError::CaptureStart(_)));
        assert!(capture.tracker.disposed());
        assert!(capture.tracker.voice_released());
    }

    #[tokio::test(start_paused = true)]
    async fn capture_stop_failure_returns_no_asset() {
        let capture = Arc::new(FakeCapture { fail_stop: true, ..FakeCapture::default() });
        let engine = engine(FakeOutput::default(), capture.clone());

        let err = engine.render(&pitches(&["D4"]), "x.wav").await.unwrap_err();
        assert!(matches!(err, MelodyError::CaptureStop(_)));
        assert!(capture.tracker.disposed());
        assert!(capture.tracker.voice_released());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_failure_never_opens_recorder() {
        let capture = Arc::new(FakeCapture::default());
        let engine = engine(FakeOutput::failing(), capture.clone());

        let err = engine.render(&[Mood::Calm.pitch()], "x.wav").await.unwrap_err();
        assert!(matches!(err, MelodyError::AudioContext(_)));
        assert!(!capture.tracker.disposed());
    }
}
