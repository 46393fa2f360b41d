use serde::{Deserialize, Serialize};

use crate::models::privacy::ScopeClass;

pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "id")]
pub enum LeaderboardScope {
    Global,
    Organization,
    Friends,
    Challenge(String),
}

impl LeaderboardScope {
    /// The privacy scope class governing this view.
    pub fn scope_class(&self) -> ScopeClass {
        match self {
            LeaderboardScope::Global => ScopeClass::Global,
            LeaderboardScope::Organization => ScopeClass::Organization,
            LeaderboardScope::Friends => ScopeClass::Friends,
            // Challenge boards rank a self-selected group; the subject's
            // global choice governs them.
            LeaderboardScope::Challenge(_) => ScopeClass::Global,
        }
    }
}

/// View-time artifact: rank and identity are computed per request and never
/// persisted. `user_id` is absent when the identity is masked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub display_name: String,
    pub score: f64,
    pub is_viewer: bool,
}
