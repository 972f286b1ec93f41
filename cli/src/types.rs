use crate::mood::{Mood, Pitch, PitchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodPayload {
    pub name: String,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
}

impl From<Mood> for MoodPayload {
    fn from(mood: Mood) -> Self {
        Self {
            name: mood.name().to_string(),
            note: mood.pitch().to_string(),
            color: Some(mood.color().to_string()),
            shape: Some(mood.shape().label().to_string()),
        }
    }
}

/// A journal entry as stored by the remote journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodRecord {
    #[serde(default, rename = "_id", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub mood: MoodPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl MoodRecord {
    pub fn pitch(&self) -> Result<Pitch, PitchError> {
        self.mood.note.parse()
    }

    /// Maps the record back onto the catalog, by name first and then by note.
    pub fn resolve(&self) -> Option<Mood> {
        self.mood
            .name
            .parse::<Mood>()
            .ok()
            .or_else(|| self.pitch().ok().and_then(Mood::from_pitch))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddMoodRequest {
    pub mood: MoodPayload,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MoodsResponse {
    #[serde(default)]
    pub moods: Vec<MoodRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateDayRequest {
    pub date: DateTime<Utc>,
    pub moods: Vec<MoodPayload>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SavedMoodsResponse {
    #[serde(default)]
    pub saved_moods: Vec<MoodRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMoodsRequest {
    pub mood_ids: Vec<String>,
}
