use serde::{Deserialize, Serialize};

/// Read-side platform aggregates for the administrative surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_users: i64,
    pub total_habits: i64,
    pub active_habits: i64,
    pub events_recorded: i64,
    pub events_today: i64,
    pub total_challenges: i64,
    pub active_challenges: i64,
}
