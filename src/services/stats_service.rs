use chrono::Utc;

use crate::db::repositories::challenge_repository::ChallengeRepository;
use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::ledger_repository::LedgerRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::stats::PlatformStats;
use crate::services::day_utils;

/// Operator-facing counters. "Today" is the current UTC day; per-user local
/// days only matter inside the tracking pipeline.
#[derive(Clone)]
pub struct StatsService {
    db: DbPool,
}

impl StatsService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn platform_stats(&self) -> AppResult<PlatformStats> {
        let today = day_utils::format_day(Utc::now().date_naive());
        self.db.with_connection(|conn| {
            Ok(PlatformStats {
                total_users: UserRepository::count(conn)?,
                total_habits: HabitRepository::count_all(conn)?,
                active_habits: HabitRepository::count_active(conn)?,
                events_recorded: LedgerRepository::count_all(conn)?,
                events_today: LedgerRepository::count_for_day(conn, &today)?,
                total_challenges: ChallengeRepository::count_all(conn)?,
                active_challenges: ChallengeRepository::count_active_on(conn, &today)?,
            })
        })
    }
}
