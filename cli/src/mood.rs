use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// How many moods a user may record on a single calendar day.
pub const DAILY_MOOD_LIMIT: usize = 3;

const MIN_OCTAVE: i32 = -1;
const MAX_OCTAVE: i32 = 9;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PitchError {
    #[error("pitch is empty")]
    Empty,
    #[error("`{0}` does not start with a note letter A-G")]
    Letter(String),
    #[error("`{0}` has no valid octave number")]
    Octave(String),
    #[error("`{0}` is outside the MIDI range")]
    OutOfRange(String),
}

/// A musical pitch in scientific notation (`C4`, `F#3`, `Bb4`).
///
/// Stored as a MIDI note number; C4 is 60 and A4 (440 Hz) is 69.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    midi: u8,
}

impl Pitch {
    pub const fn from_midi(midi: u8) -> Self {
        Self { midi }
    }

    pub fn midi(&self) -> u8 {
        self.midi
    }

    pub fn frequency(&self) -> f64 {
        440.0 * 2f64.powf((f64::from(self.midi) - 69.0) / 12.0)
    }

    pub fn octave(&self) -> i8 {
        (self.midi / 12) as i8 - 1
    }
}

impl FromStr for Pitch {
    type Err = PitchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        let mut chars = value.chars();
        let letter = chars.next().ok_or(PitchError::Empty)?;
        let base: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(PitchError::Letter(value.to_string())),
        };

        let rest = chars.as_str();
        let (accidental, octave_text) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };
        let octave: i32 =
            octave_text.parse().map_err(|_| PitchError::Octave(value.to_string()))?;
        if !(MIN_OCTAVE..=MAX_OCTAVE).contains(&octave) {
            return Err(PitchError::OutOfRange(value.to_string()));
        }

        let midi = (octave + 1) * 12 + base + accidental;
        u8::try_from(midi)
            .ok()
            .filter(|midi| *midi <= 127)
            .map(Self::from_midi)
            .ok_or_else(|| PitchError::OutOfRange(value.to_string()))
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NOTE_NAMES[usize::from(self.midi % 12)], self.octave())
    }
}

impl TryFrom<String> for Pitch {
    type Error = PitchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Square,
    Triangle,
    Tear,
    Diamond,
    Hexagon,
    Cloud,
}

impl Shape {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Square => "square",
            Self::Triangle => "triangle",
            Self::Tear => "tear",
            Self::Diamond => "diamond",
            Self::Hexagon => "hexagon",
            Self::Cloud => "cloud",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown mood `{0}`")]
pub struct UnknownMood(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Happy,
    Calm,
    Energetic,
    Sad,
    Anxious,
    Focused,
    Tired,
}

pub const CATALOG: [Mood; 7] = [
    Mood::Happy,
    Mood::Calm,
    Mood::Energetic,
    Mood::Sad,
    Mood::Anxious,
    Mood::Focused,
    Mood::Tired,
];

impl Mood {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Happy => "Happy",
            Self::Calm => "Calm",
            Self::Energetic => "Energetic",
            Self::Sad => "Sad",
            Self::Anxious => "Anxious",
            Self::Focused => "Focused",
            Self::Tired => "Tired",
        }
    }

    pub fn pitch(&self) -> Pitch {
        let midi = match self {
            Self::Happy => 60,     // C4
            Self::Calm => 64,      // E4
            Self::Energetic => 67, // G4
            Self::Sad => 57,       // A3
            Self::Anxious => 62,   // D4
            Self::Focused => 65,   // F4
            Self::Tired => 59,     // B3
        };
        Pitch::from_midi(midi)
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Happy => "yellow",
            Self::Calm => "blue",
            Self::Energetic => "red",
            Self::Sad => "indigo",
            Self::Anxious => "purple",
            Self::Focused => "green",
            Self::Tired => "gray",
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Self::Happy => Shape::Circle,
            Self::Calm => Shape::Square,
            Self::Energetic => Shape::Triangle,
            Self::Sad => Shape::Tear,
            Self::Anxious => Shape::Diamond,
            Self::Focused => Shape::Hexagon,
            Self::Tired => Shape::Cloud,
        }
    }

    pub fn from_pitch(pitch: Pitch) -> Option<Self> {
        CATALOG.into_iter().find(|mood| mood.pitch() == pitch)
    }
}

impl FromStr for Mood {
    type Err = UnknownMood;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        CATALOG
            .into_iter()
            .find(|mood| mood.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnknownMood(value.to_string()))
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
