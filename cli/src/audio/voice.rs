use super::AudioError;
use crate::mood::Pitch;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const ATTACK_SECS: f64 = 0.005;
const DECAY_SECS: f64 = 0.1;
const SUSTAIN_LEVEL: f64 = 0.3;
const RELEASE_SECS: f64 = 1.0;
const GAIN: f64 = 0.5;

pub type SharedVoice = Arc<Mutex<Voice>>;

/// Locks a shared voice, recovering it if a previous holder panicked.
pub fn lock_voice(voice: &SharedVoice) -> MutexGuard<'_, Voice> {
    voice.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
struct Trigger {
    frequency: f64,
    start: u64,
    release: u64,
}

/// Monophonic triangle synth with an ADSR envelope.
///
/// Triggers are stored in sample positions relative to `origin`, the audio
/// clock time at which the voice produced its first sample. A new trigger
/// cuts off whatever note was sounding before it.
#[derive(Debug)]
pub struct Voice {
    sample_rate: u32,
    origin: f64,
    position: u64,
    triggers: Vec<Trigger>,
    next_trigger: usize,
    active: Option<Trigger>,
    phase: f64,
}

impl Voice {
    pub fn new(sample_rate: u32, origin: f64) -> Self {
        Self {
            sample_rate,
            origin,
            position: 0,
            triggers: Vec::new(),
            next_trigger: 0,
            active: None,
            phase: 0.0,
        }
    }

    pub fn shared(self) -> SharedVoice {
        Arc::new(Mutex::new(self))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio clock time of the next sample this voice will produce.
    pub fn now(&self) -> f64 {
        self.origin + self.position as f64 / f64::from(self.sample_rate)
    }

    pub fn armed(&self) -> usize {
        self.triggers.len()
    }

    /// Arms `pitch` to start at clock time `at` and release `duration` later.
    ///
    /// Triggers must arrive in ascending start order. A start time already in
    /// the past sounds at the next produced sample.
    pub fn trigger_attack_release(
        &mut self,
        pitch: Pitch,
        duration: f64,
        at: f64,
    ) -> Result<(), AudioError> {
        let start = self.to_sample(at).max(self.position);
        if let Some(previous) = self.triggers.last() {
            if start < previous.start {
                return Err(AudioError::OutOfOrder { at, previous: self.to_time(previous.start) });
            }
        }
        let release = start + self.to_samples(duration.max(0.0));
        self.triggers.push(Trigger { frequency: pitch.frequency(), start, release });
        Ok(())
    }

    /// True once every armed note has fully released.
    pub fn is_finished(&self) -> bool {
        match self.triggers.last() {
            Some(last) => self.position >= self.silent_sample(last),
            None => true,
        }
    }

    /// Clock time at which the last armed note has faded out.
    pub fn silent_at(&self) -> Option<f64> {
        self.triggers.last().map(|last| self.to_time(self.silent_sample(last)))
    }

    fn silent_sample(&self, trigger: &Trigger) -> u64 {
        trigger.release + self.to_samples(RELEASE_SECS)
    }

    pub fn next_sample(&mut self) -> f32 {
        while let Some(trigger) = self.triggers.get(self.next_trigger).copied() {
            if trigger.start > self.position {
                break;
            }
            self.active = Some(trigger);
            self.next_trigger += 1;
            self.phase = 0.0;
        }

        let sample = match self.active {
            Some(trigger) => {
                let rate = f64::from(self.sample_rate);
                let elapsed = (self.position - trigger.start) as f64 / rate;
                let held = (trigger.release - trigger.start) as f64 / rate;
                let value = triangle(self.phase) * envelope(elapsed, held) * GAIN;
                self.phase = (self.phase + trigger.frequency / rate).fract();
                value
            }
            None => 0.0,
        };
        self.position += 1;
        sample as f32
    }

    pub fn fill(&mut self, out: &mut Vec<f32>, count: usize) {
        out.reserve(count);
        for _ in 0..count {
            out.push(self.next_sample());
        }
    }

    fn to_sample(&self, at: f64) -> u64 {
        self.to_samples(at - self.origin)
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * f64::from(self.sample_rate)).round() as u64
    }

    fn to_time(&self, sample: u64) -> f64 {
        self.origin + sample as f64 / f64::from(self.sample_rate)
    }
}

fn triangle(phase: f64) -> f64 {
    1.0 - 4.0 * (phase - 0.5).abs()
}

fn envelope(elapsed: f64, held: f64) -> f64 {
    if elapsed < held {
        return attack_decay_sustain(elapsed);
    }
    let released = elapsed - held;
    if released >= RELEASE_SECS {
        return 0.0;
    }
    attack_decay_sustain(held) * (1.0 - released / RELEASE_SECS)
}

fn attack_decay_sustain(elapsed: f64) -> f64 {
    if elapsed < ATTACK_SECS {
        elapsed / ATTACK_SECS
    } else if elapsed < ATTACK_SECS + DECAY_SECS {
        1.0 - (1.0 - SUSTAIN_LEVEL) * (elapsed - ATTACK_SECS) / DECAY_SECS
    } else {
        SUSTAIN_LEVEL
    }
}
