use crate::{
    journal::JournalEntry,
    mood::{Mood, Pitch},
    week::{short_label, Week},
};
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::path::PathBuf;

const MAX_STATUS_LINES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelodyScope {
    Today,
    Week,
}

impl MelodyScope {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Today => "today's",
            Self::Week => "this week's",
        }
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub status_lines: Vec<String>,
    pub is_playing: bool,
    pub active_note: Option<usize>,
    pub last_download: Option<PathBuf>,
    pub had_error: bool,
    printed: usize,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Info(message) => self.push_status_line(message),
            AppEvent::Error(message) => {
                self.had_error = true;
                self.push_status_line(format!("Error: {message}"));
            }
            AppEvent::MoodRecorded { mood, remaining } => {
                self.push_status_line(format!(
                    "Recorded {} ({}), {remaining} left today",
                    mood.name(),
                    mood.pitch()
                ));
            }
            AppEvent::TodayLoaded { entries } => {
                if entries.is_empty() {
                    self.push_status_line("No moods recorded today".to_string());
                } else {
                    self.push_status_line(format!("Today: {}", entry_list(&entries)));
                }
            }
            AppEvent::TodayCleared { removed } => {
                self.push_status_line(format!("Removed {removed} moods from today"));
            }
            AppEvent::WeekLoaded { week, days } => {
                for line in week_grid(week, &days) {
                    self.push_status_line(line);
                }
            }
            AppEvent::PlaybackStarted { scope, notes } => {
                self.is_playing = true;
                self.active_note = None;
                self.push_status_line(format!("Playing {} melody ({notes} notes)", scope.label()));
            }
            AppEvent::NotePlaying { index, pitch } => {
                self.active_note = Some(index);
                self.push_status_line(format!("  note {} - {pitch}", index + 1));
            }
            AppEvent::PlaybackFinished => {
                self.is_playing = false;
                self.active_note = None;
                self.push_status_line("Playback finished".to_string());
            }
            AppEvent::DownloadStarted { filename } => {
                self.push_status_line(format!("Rendering {filename}..."));
            }
            AppEvent::DownloadSaved { path } => {
                self.push_status_line(format!("Saved {}", path.display()));
                self.last_download = Some(path);
            }
        }
    }

    pub fn push_status_line(&mut self, line: String) {
        self.status_lines.push(line);
        if self.status_lines.len() > MAX_STATUS_LINES {
            let overflow = self.status_lines.len() - MAX_STATUS_LINES;
            self.status_lines.drain(0..overflow);
            self.printed = self.printed.saturating_sub(overflow);
        }
    }

    /// Status lines added since the last call.
    pub fn drain_status(&mut self) -> Vec<String> {
        let fresh = self.status_lines[self.printed..].to_vec();
        self.printed = self.status_lines.len();
        fresh
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Info(String),
    Error(String),
    MoodRecorded { mood: Mood, remaining: usize },
    TodayLoaded { entries: Vec<JournalEntry> },
    TodayCleared { removed: usize },
    WeekLoaded { week: Week, days: IndexMap<NaiveDate, Vec<JournalEntry>> },
    PlaybackStarted { scope: MelodyScope, notes: usize },
    NotePlaying { index: usize, pitch: Pitch },
    PlaybackFinished,
    DownloadStarted { filename: String },
    DownloadSaved { path: PathBuf },
}

#[derive(Debug, Clone)]
pub enum AppCommand {
    Record { mood: Mood },
    ReplaceToday { moods: Vec<Mood> },
    ClearToday,
    ShowToday,
    ShowWeek { week: Week },
    Play { scope: MelodyScope, week: Week },
    Download { scope: MelodyScope, week: Week },
}

fn entry_list(entries: &[JournalEntry]) -> String {
    entries.iter().map(JournalEntry::label).collect::<Vec<_>>().join(", ")
}

fn week_grid(week: Week, days: &IndexMap<NaiveDate, Vec<JournalEntry>>) -> Vec<String> {
    let mut lines = vec![format!(
        "Week of {} - {}",
        short_label(week.first_day()),
        short_label(week.last_day())
    )];
    for day in week.days() {
        let entries = days.get(&day.date).map(Vec::as_slice).unwrap_or_default();
        let cell = if entries.is_empty() {
            "-".to_string()
        } else {
            entries.iter().map(|entry| entry.pitch.to_string()).collect::<Vec<_>>().join(" ")
        };
        lines.push(format!("  {} {:<7} {cell}", day.name, day.label()));
    }
    lines
}
