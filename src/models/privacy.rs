use serde::{Deserialize, Serialize};

/// The population class a visibility choice applies to. Challenge-scope
/// leaderboards fall under the global class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeClass {
    Global,
    Organization,
    Friends,
}

impl ScopeClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeClass::Global => "global",
            ScopeClass::Organization => "organization",
            ScopeClass::Friends => "friends",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "global" => Some(ScopeClass::Global),
            "organization" => Some(ScopeClass::Organization),
            "friends" => Some(ScopeClass::Friends),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyChoice {
    Public,
    AnonymousScore,
    Hidden,
}

impl PrivacyChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            PrivacyChoice::Public => "public",
            PrivacyChoice::AnonymousScore => "anonymous",
            PrivacyChoice::Hidden => "hidden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(PrivacyChoice::Public),
            "anonymous" => Some(PrivacyChoice::AnonymousScore),
            "hidden" => Some(PrivacyChoice::Hidden),
            _ => None,
        }
    }
}

impl Default for PrivacyChoice {
    fn default() -> Self {
        PrivacyChoice::Public
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettingRecord {
    pub user_id: String,
    pub scope_class: ScopeClass,
    pub setting: PrivacyChoice,
    pub updated_at: String,
}

/// Outcome of resolving one viewer/subject pair for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Real identity and score.
    Full,
    /// Score and rank with masked identity.
    Anonymous,
    /// Excluded from the view entirely.
    Hidden,
}
