pub mod challenge_repository;
pub mod habit_repository;
pub mod ledger_repository;
pub mod privacy_repository;
pub mod user_repository;
