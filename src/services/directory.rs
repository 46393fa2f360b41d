use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// External collaborators the core consumes: the social graph and the
/// organization roster. Hosts implement this against their own systems.
pub trait Directory: Send + Sync {
    /// Outgoing friend edges for one user. A friendship counts only when
    /// the edge exists in both directions.
    fn friends_of(&self, user_id: &str) -> HashSet<String>;

    fn organization_of(&self, user_id: &str) -> Option<String>;
}

/// Mutual-edge check over the raw graph.
pub fn are_mutual_friends(directory: &dyn Directory, a: &str, b: &str) -> bool {
    a != b && directory.friends_of(a).contains(b) && directory.friends_of(b).contains(a)
}

/// In-memory directory for hosts without a social backend, and for tests.
#[derive(Default)]
pub struct StaticDirectory {
    friends: RwLock<HashMap<String, HashSet<String>>>,
    organizations: RwLock<HashMap<String, String>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds edges in both directions.
    pub fn add_friendship(&self, a: &str, b: &str) {
        let mut friends = self.friends.write().expect("directory lock");
        friends.entry(a.to_string()).or_default().insert(b.to_string());
        friends.entry(b.to_string()).or_default().insert(a.to_string());
    }

    /// One-directional edge; useful to model an unreciprocated request.
    pub fn add_friend_edge(&self, from: &str, to: &str) {
        let mut friends = self.friends.write().expect("directory lock");
        friends
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn assign_organization(&self, user_id: &str, organization_id: &str) {
        let mut organizations = self.organizations.write().expect("directory lock");
        organizations.insert(user_id.to_string(), organization_id.to_string());
    }
}

impl Directory for StaticDirectory {
    fn friends_of(&self, user_id: &str) -> HashSet<String> {
        self.friends
            .read()
            .expect("directory lock")
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn organization_of(&self, user_id: &str) -> Option<String> {
        self.organizations
            .read()
            .expect("directory lock")
            .get(user_id)
            .cloned()
    }
}
