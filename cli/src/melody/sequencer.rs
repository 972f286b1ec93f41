use crate::mood::Pitch;
use std::time::Duration;

/// Gap between consecutive note onsets.
pub const NOTE_INTERVAL_SECS: f64 = 0.5;
pub const TEMPO_BPM: f64 = 120.0;
/// One eighth note at [`TEMPO_BPM`].
pub const NOTE_DURATION_SECS: f64 = 60.0 / TEMPO_BPM / 2.0;
/// Silence kept after the last interval before playback or capture ends.
pub const TRAILING_MARGIN_SECS: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    pub index: usize,
    pub pitch: Pitch,
    pub start_offset: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MelodySchedule {
    notes: Vec<ScheduledNote>,
}

impl MelodySchedule {
    pub fn notes(&self) -> &[ScheduledNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.notes.len() as f64 * NOTE_INTERVAL_SECS
    }

    /// Offset at which a playback or capture of this schedule is over.
    pub fn completion_offset(&self) -> f64 {
        self.total_duration() + TRAILING_MARGIN_SECS
    }
}

pub fn build_schedule(pitches: &[Pitch]) -> MelodySchedule {
    let notes = pitches
        .iter()
        .enumerate()
        .map(|(index, pitch)| ScheduledNote {
            index,
            pitch: *pitch,
            start_offset: index as f64 * NOTE_INTERVAL_SECS,
            duration: NOTE_DURATION_SECS,
        })
        .collect();
    MelodySchedule { notes }
}

pub(crate) fn seconds(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::Mood;

    #[test]
    fn spaces_notes_half_a_second_apart() {
        let pitches: Vec<Pitch> = [Mood::Happy, Mood::Calm, Mood::Sad, Mood::Tired, Mood::Happy]
            .iter()
            .map(Mood::pitch)
            .collect();
        let schedule = build_schedule(&pitches);

        assert_eq!(schedule.len(), pitches.len());
        for (i, note) in schedule.notes().iter().enumerate() {
            assert_eq!(note.index, i);
            assert_eq!(note.pitch, pitches[i]);
            assert_eq!(note.start_offset, i as f64 * 0.5);
            assert!(note.duration <= NOTE_INTERVAL_SECS);
        }
        assert!(schedule.notes().windows(2).all(|w| w[0].start_offset < w[1].start_offset));
    }

    #[test]
    fn mood_sequence_becomes_eighth_notes() {
        let pitches = [Mood::Happy.pitch(), Mood::Calm.pitch(), Mood::Sad.pitch()];
        let schedule = build_schedule(&pitches);

        let summary: Vec<(String, f64, f64)> = schedule
            .notes()
            .iter()
            .map(|note| (note.pitch.to_string(), note.start_offset, note.duration))
            .collect();
        assert_eq!(
            summary,
            [
                ("C4".to_string(), 0.0, 0.25),
                ("E4".to_string(), 0.5, 0.25),
                ("A3".to_string(), 1.0, 0.25)
            ]
        );
        assert!((schedule.completion_offset() - 1.7).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_empty_schedule() {
        let schedule = build_schedule(&[]);
        assert!(schedule.is_empty());
        assert_eq!(schedule.total_duration(), 0.0);
    }
}
