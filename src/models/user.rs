use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub display_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCreateInput {
    pub display_name: String,
    /// Identity issuance lives outside the core; hosts may supply the id
    /// minted by their auth collaborator.
    #[serde(default)]
    pub id: Option<String>,
}
