use crate::{
    mood::{Mood, Pitch, PitchError, DAILY_MOOD_LIMIT},
    types::MoodRecord,
    week::Week,
};
use chrono::NaiveDate;
use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("you can only record up to {DAILY_MOOD_LIMIT} moods per day")]
    DailyLimitReached,
    #[error("a day holds at most {DAILY_MOOD_LIMIT} moods, got {0}")]
    TooManyForDay(usize),
}

/// One recorded mood as the journal stores it.
///
/// `pitch` is the note saved with the record and is what melodies play;
/// `mood` is the catalog match used for display only.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub id: Option<String>,
    pub name: String,
    pub pitch: Pitch,
    pub mood: Option<Mood>,
}

impl JournalEntry {
    pub fn from_record(record: &MoodRecord) -> Result<Self, PitchError> {
        Ok(Self {
            id: record.id.clone(),
            name: record.mood.name.clone(),
            pitch: record.pitch()?,
            mood: record.resolve(),
        })
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.pitch)
    }
}

impl From<Mood> for JournalEntry {
    fn from(mood: Mood) -> Self {
        Self { id: None, name: mood.name().to_string(), pitch: mood.pitch(), mood: Some(mood) }
    }
}

/// Client-side view of the journal: today's moods plus one week grid.
#[derive(Debug, Clone)]
pub struct Journal {
    today: Vec<JournalEntry>,
    week: Week,
    week_moods: IndexMap<NaiveDate, Vec<JournalEntry>>,
}

impl Journal {
    pub fn new(week: Week) -> Self {
        Self { today: Vec::new(), week, week_moods: empty_grid(week) }
    }

    pub fn today(&self) -> &[JournalEntry] {
        &self.today
    }

    pub fn week(&self) -> Week {
        self.week
    }

    pub fn week_moods(&self) -> &IndexMap<NaiveDate, Vec<JournalEntry>> {
        &self.week_moods
    }

    pub fn remaining_today(&self) -> usize {
        DAILY_MOOD_LIMIT.saturating_sub(self.today.len())
    }

    pub fn ensure_capacity(&self) -> Result<(), JournalError> {
        if self.remaining_today() == 0 {
            return Err(JournalError::DailyLimitReached);
        }
        Ok(())
    }

    /// Checks a full replacement of one day's moods against the daily limit.
    pub fn ensure_day_fits(count: usize) -> Result<(), JournalError> {
        if count > DAILY_MOOD_LIMIT {
            return Err(JournalError::TooManyForDay(count));
        }
        Ok(())
    }

    /// Appends an entry that the remote journal has accepted.
    pub fn record(&mut self, entry: JournalEntry, today: NaiveDate) -> Result<(), JournalError> {
        self.ensure_capacity()?;
        if let Some(day) = self.week_moods.get_mut(&today) {
            day.push(entry.clone());
        }
        self.today.push(entry);
        Ok(())
    }

    pub fn set_today(&mut self, records: &[MoodRecord]) {
        self.today = entries(records);
    }

    /// Server ids of today's entries; entries without one are skipped.
    pub fn today_ids(&self) -> Vec<String> {
        self.today.iter().filter_map(|entry| entry.id.clone()).collect()
    }

    /// Replaces the week grid; days outside `week` are ignored.
    pub fn set_week(&mut self, week: Week, days: IndexMap<NaiveDate, Vec<MoodRecord>>) {
        self.week = week;
        self.week_moods = empty_grid(week);
        for (date, records) in days {
            match self.week_moods.get_mut(&date) {
                Some(slot) => *slot = entries(&records),
                None => warn!("ignoring moods for {date} outside week of {}", week.first_day()),
            }
        }
    }

    pub fn today_pitches(&self) -> Vec<Pitch> {
        self.today.iter().map(|entry| entry.pitch).collect()
    }

    /// All moods of the week in day order, flattened into one melody.
    pub fn week_pitches(&self) -> Vec<Pitch> {
        self.week_moods.values().flatten().map(|entry| entry.pitch).collect()
    }
}

fn empty_grid(week: Week) -> IndexMap<NaiveDate, Vec<JournalEntry>> {
    week.days().map(|day| (day.date, Vec::new())).collect()
}

fn entries(records: &[MoodRecord]) -> Vec<JournalEntry> {
    records
        .iter()
        .filter_map(|record| match JournalEntry::from_record(record) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping mood {:?} with unusable note: {err}", record.mood.name);
                None
            }
        })
        .collect()
}
