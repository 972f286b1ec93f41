//! # Melody pipeline
//!
//! Turns an ordered list of mood pitches into sound.
//!
//! - `sequencer` - pure schedule of note onsets (0.5s apart, eighth-note long)
//! - `playback` - live playback with per-note progress events, one at a time
//! - `render` - real-time capture of the same schedule into a WAV asset
//! - `dispatch` - one-shot save of a rendered asset with deferred cleanup
//!
//! Playback and render share [`sequencer::TRAILING_MARGIN_SECS`], so a melody
//! of N notes always lasts `N * 0.5s + margin` whichever way it is realized.

mod dispatch;
mod error;
mod playback;
mod render;
mod sequencer;

pub use dispatch::{DirectoryTarget, DownloadDispatcher, SaveTarget, SavedDownload, RELEASE_DELAY};
pub use error::MelodyError;
pub use playback::{PlaybackEngine, PlaybackEvent, PlaybackHandle, PlaybackState};
pub use render::{RenderEngine, RenderedAsset};
pub use sequencer::{
    build_schedule, MelodySchedule, ScheduledNote, NOTE_DURATION_SECS, NOTE_INTERVAL_SECS,
    TEMPO_BPM, TRAILING_MARGIN_SECS,
};

use crate::{
    audio::{lock_voice, AudioContext, CaptureDevice, SharedVoice},
    mood::Pitch,
};
use std::sync::Arc;

/// Arms every note of `schedule` on `voice`, relative to clock time `now`.
fn arm_schedule(voice: &SharedVoice, schedule: &MelodySchedule, now: f64) -> Result<(), MelodyError> {
    let mut voice = lock_voice(voice);
    for note in schedule.notes() {
        voice
            .trigger_attack_release(note.pitch, note.duration, now + note.start_offset)
            .map_err(MelodyError::Synthesis)?;
    }
    Ok(())
}

/// Entry points the presentation layer drives.
pub struct MelodyService {
    playback: PlaybackEngine,
    render: RenderEngine,
    dispatcher: DownloadDispatcher,
}

impl MelodyService {
    pub fn new(
        context: Arc<AudioContext>,
        capture: Arc<dyn CaptureDevice>,
        dispatcher: DownloadDispatcher,
    ) -> Self {
        Self {
            playback: PlaybackEngine::new(context.clone()),
            render: RenderEngine::new(context, capture),
            dispatcher,
        }
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    pub async fn play(&self, pitches: &[Pitch]) -> Result<PlaybackHandle, MelodyError> {
        self.playback.play(pitches).await
    }

    pub async fn render(
        &self,
        pitches: &[Pitch],
        filename: &str,
    ) -> Result<RenderedAsset, MelodyError> {
        self.render.render(pitches, filename).await
    }

    pub async fn render_and_download(
        &self,
        pitches: &[Pitch],
        filename: &str,
    ) -> Result<SavedDownload, MelodyError> {
        let asset = self.render.render(pitches, filename).await?;
        self.dispatcher.save(asset, filename).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{testing::FakeOutput, WavCapture},
        mood::Mood,
        week::Week,
    };
    use chrono::NaiveDate;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn weekly_moods_become_a_saved_melody() {
        let downloads = tempfile::tempdir().unwrap();
        let context = Arc::new(AudioContext::new(Arc::new(FakeOutput::default()), 8_000));
        let dispatcher = DownloadDispatcher::new(Arc::new(DirectoryTarget::new(downloads.path())))
            .with_release_delay(Duration::from_millis(100));
        let service = MelodyService::new(context, Arc::new(WavCapture), dispatcher);

        let week = Week::containing(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());
        let filename = week.download_filename();
        let pitches = [Mood::Happy.pitch(), Mood::Calm.pitch(), Mood::Sad.pitch()];

        let started = Instant::now();
        let saved = service.render_and_download(&pitches, &filename).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1_700));

        let path = saved.released().await;
        assert_eq!(path, downloads.path().join("WeeklyMoodMelody_Jan1_Jan7.wav"));
        let reader = hound::WavReader::open(&path).unwrap();
        let seconds = reader.duration() as f64 / 8_000.0;
        assert!((seconds - 1.7).abs() < 0.05);
    }

    #[tokio::test(start_paused = true)]
    async fn playback_and_render_reject_empty_moods() {
        let context = Arc::new(AudioContext::new(Arc::new(FakeOutput::default()), 8_000));
        let dispatcher = DownloadDispatcher::new(Arc::new(DirectoryTarget::new("unused")));
        let service = MelodyService::new(context, Arc::new(WavCapture), dispatcher);

        assert!(matches!(service.play(&[]).await, Err(MelodyError::EmptyInput)));
        assert!(matches!(
            service.render_and_download(&[], "empty.wav").await,
            Err(MelodyError::EmptyInput)
        ));
        assert_eq!(service.playback().state(), PlaybackState::Idle);
    }
}
