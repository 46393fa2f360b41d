use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

use crate::db::repositories::challenge_repository::ChallengeRepository;
use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::ledger_repository::LedgerRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::challenge::{ChallengeProgress, ChallengeRecord};
use crate::services::day_utils;
use crate::services::habit_state_service::projected_count;

/// A closed or open membership window in challenge-local days.
#[derive(Debug, Clone, Copy)]
struct MembershipWindow {
    from: NaiveDate,
    to: Option<NaiveDate>,
}

impl MembershipWindow {
    fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && self.to.map_or(true, |to| day <= to)
    }
}

/// Rolls qualifying habit-day completions up into a challenge score.
/// Everything is recomputed from the ledger; nothing here mutates.
#[derive(Clone)]
pub struct ChallengeProgressService {
    db: DbPool,
}

impl ChallengeProgressService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn progress(
        &self,
        challenge_id: &str,
        user_id: &str,
        as_of: NaiveDate,
    ) -> AppResult<ChallengeProgress> {
        let as_of_key = day_utils::format_day(as_of);
        let challenge = self
            .db
            .with_connection(|conn| ChallengeRepository::find_by_id(conn, challenge_id))?
            .ok_or_else(|| {
                AppError::validation_with_details(
                    "未知的挑战",
                    json!({"challengeId": challenge_id}),
                )
            })?;

        let windows = self.membership_windows(challenge_id, user_id)?;
        if windows.is_empty() {
            // Viewing progress for a challenge one never joined is allowed;
            // it is simply zero.
            return Ok(ChallengeProgress::zero(challenge_id, user_id, &as_of_key));
        }

        let start = day_utils::parse_day(&challenge.start_day)?;
        let end = effective_end(&challenge, as_of)?;
        if end < start {
            return Ok(ChallengeProgress::zero(challenge_id, user_id, &as_of_key));
        }
        let end_key = day_utils::format_day(end);

        let (score, days_credited) = self.db.with_connection(|conn| {
            let mut score = 0.0_f64;
            let mut days_credited = 0_i64;

            for habit_id in ChallengeRepository::habit_ids_for_challenge(conn, challenge_id)? {
                let Some(habit) = HabitRepository::find_by_id(conn, &habit_id)? else {
                    continue;
                };
                // Tagged habits belong to many participants; only this
                // user's own completions score for them.
                if habit.owner_id != user_id {
                    continue;
                }

                let totals =
                    LedgerRepository::day_totals_for_habit(conn, &habit_id, None, &end_key)?;
                for total in totals {
                    let day = day_utils::parse_day(&total.day)?;
                    if day < start || day > end {
                        continue;
                    }
                    if !windows.iter().any(|window| window.contains(day)) {
                        continue;
                    }

                    let count = projected_count(&habit, total.net);
                    if count == habit.target_count {
                        score += 1.0;
                        days_credited += 1;
                    } else if challenge.partial_credit && count > 0 {
                        score += count as f64 / habit.target_count as f64;
                    }
                }
            }

            Ok((score, days_credited))
        })?;

        debug!(
            target: "app::progress",
            challenge_id = %challenge_id,
            user_id = %user_id,
            as_of = %as_of_key,
            score,
            "challenge progress computed"
        );
        Ok(ChallengeProgress {
            challenge_id: challenge_id.to_string(),
            user_id: user_id.to_string(),
            score,
            days_credited,
            as_of: as_of_key,
        })
    }

    /// Membership intervals in days: join day inclusive through leave day
    /// inclusive; an open interval runs forward indefinitely.
    fn membership_windows(
        &self,
        challenge_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<MembershipWindow>> {
        let participations = self.db.with_connection(|conn| {
            ChallengeRepository::participations_for_user(conn, challenge_id, user_id)
        })?;

        participations
            .into_iter()
            .map(|participation| {
                let from = day_utils::utc_day_of(&participation.joined_at)?;
                let to = participation
                    .left_at
                    .as_deref()
                    .map(day_utils::utc_day_of)
                    .transpose()?;
                Ok(MembershipWindow { from, to })
            })
            .collect()
    }
}

fn effective_end(challenge: &ChallengeRecord, as_of: NaiveDate) -> AppResult<NaiveDate> {
    match &challenge.end_day {
        Some(end_raw) => {
            let end = day_utils::parse_day(end_raw)?;
            Ok(end.min(as_of))
        }
        None => Ok(as_of),
    }
}
