use serde::{Deserialize, Serialize};

/// Immutable ledger row. `day` is the habit-local calendar day frozen at
/// append time; later time-zone edits never reclassify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEventRecord {
    pub seq: i64,
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    pub day: String,
    pub delta: i64,
    pub recorded_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionInput {
    pub user_id: String,
    pub habit_id: String,
    /// +1 to record a completion, -1 to undo the most recent one.
    pub delta: i64,
    /// RFC 3339 wall-clock timestamp from the client; defaults to now.
    #[serde(default)]
    pub client_timestamp: Option<String>,
}

/// Net accepted delta for one (habit, day), as grouped by the repository.
#[derive(Debug, Clone, PartialEq)]
pub struct DayTotal {
    pub habit_id: String,
    pub day: String,
    pub net: i64,
}
