use super::{
    arm_schedule,
    sequencer::{build_schedule, seconds, MelodySchedule},
    MelodyError,
};
use crate::{
    audio::{lock_voice, AudioContext, OutputConnection},
    mood::Pitch,
};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NotePlaying { index: usize, pitch: Pitch },
    Finished,
}

/// Plays melodies through the context's output, one at a time.
///
/// `Idle -> Playing` happens only for an accepted `play` request and
/// `Playing -> Idle` only when the playback driver completes or the start
/// fails or is abandoned. The voice stays connected after completion until
/// its release tail has died away.
pub struct PlaybackEngine {
    context: Arc<AudioContext>,
    state: Arc<watch::Sender<PlaybackState>>,
}

impl PlaybackEngine {
    pub fn new(context: Arc<AudioContext>) -> Self {
        let (state, _) = watch::channel(PlaybackState::Idle);
        Self { context, state: Arc::new(state) }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.borrow()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    pub async fn play(&self, pitches: &[Pitch]) -> Result<PlaybackHandle, MelodyError> {
        if pitches.is_empty() {
            return Err(MelodyError::EmptyInput);
        }
        let acquired = self.state.send_if_modified(|state| match state {
            PlaybackState::Idle => {
                *state = PlaybackState::Playing;
                true
            }
            PlaybackState::Playing => false,
        });
        if !acquired {
            debug!("rejecting play request while a melody is playing");
            return Err(MelodyError::AlreadyPlaying);
        }

        let idle = IdleOnDrop(self.state.clone());
        self.start(pitches, idle).await.map_err(|err| {
            warn!("melody playback failed to start: {err}");
            err
        })
    }

    /// Owns `idle` until the driver takes it; dropping this future early or
    /// returning an error puts the engine back to idle.
    async fn start(
        &self,
        pitches: &[Pitch],
        idle: IdleOnDrop,
    ) -> Result<PlaybackHandle, MelodyError> {
        self.context.ensure_running().await.map_err(MelodyError::AudioContext)?;

        let schedule = build_schedule(pitches);
        let voice = self.context.create_voice();
        let now = self.context.now();
        arm_schedule(&voice, &schedule, now)?;
        let silent_offset = lock_voice(&voice)
            .silent_at()
            .map_or(0.0, |at| at - now)
            .max(schedule.completion_offset());
        let connection = self.context.connect(voice).map_err(MelodyError::AudioContext)?;

        let issued = Instant::now();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        info!(notes = schedule.len(), seconds = schedule.completion_offset(), "playing melody");
        let driver = tokio::spawn(drive(
            Timeline { schedule, issued, silent_offset },
            connection,
            events_tx,
            idle,
        ));
        Ok(PlaybackHandle { events: events_rx, driver })
    }
}

pub struct PlaybackHandle {
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
    driver: JoinHandle<()>,
}

impl PlaybackHandle {
    /// Next progress event; `None` once the playback is over.
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        self.events.recv().await
    }

    /// Waits until the voice has rung out and been disconnected.
    pub async fn finished(self) {
        if let Err(err) = self.driver.await {
            error!("playback driver stopped abnormally: {err}");
        }
    }
}

/// Returns the engine to idle when playback ends, fails or is abandoned.
struct IdleOnDrop(Arc<watch::Sender<PlaybackState>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(PlaybackState::Idle);
    }
}

struct Timeline {
    schedule: MelodySchedule,
    issued: Instant,
    /// Offset at which the last release has faded to silence.
    silent_offset: f64,
}

async fn drive(
    timeline: Timeline,
    connection: Box<dyn OutputConnection>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    idle: IdleOnDrop,
) {
    let Timeline { schedule, issued, silent_offset } = timeline;
    for note in schedule.notes() {
        sleep_until(issued + seconds(note.start_offset)).await;
        debug!(index = note.index, pitch = %note.pitch, "note playing");
        let _ = events.send(PlaybackEvent::NotePlaying { index: note.index, pitch: note.pitch });
    }

    sleep_until(issued + seconds(schedule.completion_offset())).await;
    drop(idle);
    let _ = events.send(PlaybackEvent::Finished);
    drop(events);
    info!("melody playback finished");

    sleep_until(issued + seconds(silent_offset)).await;
    connection.disconnect();
    debug!("playback voice released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::testing::FakeOutput, mood::Mood};
    use std::time::Duration;

    fn engine(output: Arc<FakeOutput>) -> PlaybackEngine {
        PlaybackEngine::new(Arc::new(AudioContext::new(output, 8_000)))
    }

    fn melody() -> Vec<Pitch> {
        vec![Mood::Happy.pitch(), Mood::Calm.pitch(), Mood::Sad.pitch()]
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_empty_melody_without_touching_audio() {
        let output = Arc::new(FakeOutput::default());
        let engine = engine(output.clone());

        assert!(matches!(engine.play(&[]).await, Err(MelodyError::EmptyInput)));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(output.resumes(), 0);
        assert_eq!(output.connects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn emits_notes_in_order_then_finishes() {
        let output = Arc::new(FakeOutput::default());
        let engine = engine(output.clone());
        let start = Instant::now();

        let mut handle = engine.play(&melody()).await.unwrap();
        assert!(engine.is_playing());

        let mut seen = Vec::new();
        while let Some(event) = handle.next_event().await {
            seen.push((event, start.elapsed()));
        }

        handle.finished().await;
        let expected = melody();
        assert_eq!(seen.len(), 4);
        for (i, (event, at)) in seen.iter().take(3).enumerate() {
            assert_eq!(*event, PlaybackEvent::NotePlaying { index: i, pitch: expected[i] });
            let expected_at = Duration::from_millis(500 * i as u64);
            let drift = if *at > expected_at { *at - expected_at } else { expected_at - *at };
            assert!(drift < Duration::from_millis(10), "note {i} at {at:?}");
        }
        assert_eq!(seen[3].0, PlaybackEvent::Finished);
        assert!(seen[3].1 >= Duration::from_millis(1_700));

        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(output.connects(), 1);
        assert_eq!(output.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_overlapping_playback_until_idle() {
        let output = Arc::new(FakeOutput::default());
        let engine = engine(output.clone());
        let mut state = engine.subscribe();

        let handle = engine.play(&melody()).await.unwrap();
        assert!(matches!(engine.play(&melody()).await, Err(MelodyError::AlreadyPlaying)));

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(engine.is_playing());

        // 3 notes * 0.5s + margin, well inside 3 * 0.5 + 0.5.
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        state.wait_for(|s| *s == PlaybackState::Idle).await.unwrap();
        handle.finished().await;

        let again = engine.play(&melody()[..1]).await.unwrap();
        again.finished().await;
        assert_eq!(output.connects(), 2);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn release_tail_rings_out_after_finish() {
        let output = Arc::new(FakeOutput::default());
        let engine = engine(output.clone());
        let start = Instant::now();

        let mut handle = engine.play(&melody()).await.unwrap();
        while let Some(event) = handle.next_event().await {
            if event == PlaybackEvent::Finished {
                break;
            }
        }
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(output.disconnects(), 0);

        handle.finished().await;
        assert_eq!(output.disconnects(), 1);
        // Last onset at 1.0s, held 0.25s, then a 1s release.
        assert!(start.elapsed() >= Duration::from_millis(2_250));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_start_returns_to_idle() {
        let output = Arc::new(FakeOutput::default());
        let context = Arc::new(AudioContext::new(output.clone(), 8_000));
        let engine = PlaybackEngine::new(context.clone());

        let resume = context.hold_resume().await;
        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), engine.play(&melody())).await;
        assert!(abandoned.is_err());
        assert_eq!(engine.state(), PlaybackState::Idle);
        drop(resume);

        engine.play(&melody()).await.unwrap().finished().await;
        assert_eq!(output.connects(), 1);
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_failure_resets_to_idle() {
        let output = Arc::new(FakeOutput::failing());
        let engine = engine(output.clone());

        let err = engine.play(&melody()).await.err().unwrap();
        assert!(matches!(err, MelodyError::AudioContext(_)));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(output.connects(), 0);

        output.set_failing(false);
        engine.play(&melody()).await.unwrap().finished().await;
        assert_eq!(output.disconnects(), 1);
    }
}
