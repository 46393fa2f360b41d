pub mod challenge_progress_service;
pub mod challenge_service;
pub mod coaching;
pub mod day_utils;
pub mod directory;
pub mod habit_service;
pub mod habit_state_service;
pub mod leaderboard_service;
pub mod ledger_service;
pub mod privacy_service;
pub mod stats_service;
pub mod user_service;
