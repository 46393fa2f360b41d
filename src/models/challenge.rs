use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    pub id: String,
    pub title: String,
    pub start_day: String,
    pub end_day: Option<String>,
    /// When set, incomplete counter days earn `count / target` credit
    /// instead of zero.
    pub partial_credit: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCreateInput {
    pub title: String,
    pub start_day: String,
    #[serde(default)]
    pub end_day: Option<String>,
    #[serde(default)]
    pub partial_credit: Option<bool>,
}

/// One membership interval. `left_at = None` means the membership is open;
/// a rejoin after leaving creates a fresh record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub joined_at: String,
    pub left_at: Option<String>,
    pub opt_out: bool,
}

impl ParticipantRecord {
    pub fn is_active(&self) -> bool {
        self.left_at.is_none()
    }
}

/// Recomputed challenge score; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeProgress {
    pub challenge_id: String,
    pub user_id: String,
    pub score: f64,
    /// Fully complete (habit, day) pairs contributing to the score.
    pub days_credited: i64,
    pub as_of: String,
}

impl ChallengeProgress {
    pub fn zero(challenge_id: &str, user_id: &str, as_of: &str) -> Self {
        Self {
            challenge_id: challenge_id.to_string(),
            user_id: user_id.to_string(),
            score: 0.0,
            days_credited: 0,
            as_of: as_of.to_string(),
        }
    }
}
