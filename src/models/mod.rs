pub mod challenge;
pub mod habit;
pub mod leaderboard;
pub mod ledger;
pub mod privacy;
pub mod stats;
pub mod user;
