use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::db::repositories::challenge_repository::ChallengeRepository;
use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::challenge::{ChallengeCreateInput, ChallengeRecord, ParticipantRecord};
use crate::services::day_utils;

#[derive(Clone)]
pub struct ChallengeService {
    db: DbPool,
}

impl ChallengeService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_challenge(&self, input: ChallengeCreateInput) -> AppResult<ChallengeRecord> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("挑战标题不能为空"));
        }
        let start_day = day_utils::parse_day(&input.start_day)?;
        if let Some(end_raw) = &input.end_day {
            let end_day = day_utils::parse_day(end_raw)?;
            if end_day < start_day {
                return Err(AppError::validation_with_details(
                    "挑战结束日不能早于开始日",
                    json!({"startDay": input.start_day, "endDay": end_raw}),
                ));
            }
        }

        let record = ChallengeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            title,
            start_day: input.start_day,
            end_day: input.end_day,
            partial_credit: input.partial_credit.unwrap_or(false),
            created_at: Utc::now().to_rfc3339(),
        };

        self.db
            .with_connection(|conn| ChallengeRepository::insert(conn, &record))?;
        info!(challenge_id = %record.id, "challenge created");
        Ok(record)
    }

    pub fn get_challenge(&self, id: &str) -> AppResult<ChallengeRecord> {
        self.db
            .with_connection(|conn| ChallengeRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    /// Marks a habit as scoring toward a challenge. The habit keeps living
    /// in its owner's tracker; the tag only widens what the aggregator sums.
    pub fn tag_habit(&self, challenge_id: &str, habit_id: &str) -> AppResult<()> {
        self.db.with_connection(|conn| {
            if ChallengeRepository::find_by_id(conn, challenge_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的挑战",
                    json!({"challengeId": challenge_id}),
                ));
            }
            if HabitRepository::find_by_id(conn, habit_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的习惯",
                    json!({"habitId": habit_id}),
                ));
            }
            ChallengeRepository::tag_habit(conn, challenge_id, habit_id, &Utc::now().to_rfc3339())
        })?;
        debug!(challenge_id = %challenge_id, habit_id = %habit_id, "habit tagged");
        Ok(())
    }

    pub fn untag_habit(&self, challenge_id: &str, habit_id: &str) -> AppResult<()> {
        let removed = self.db.with_connection(|conn| {
            ChallengeRepository::untag_habit(conn, challenge_id, habit_id)
        })?;
        if !removed {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    /// Opens a membership interval. Credit accrues only inside intervals,
    /// so completions before the first join never count.
    pub fn join(&self, challenge_id: &str, user_id: &str) -> AppResult<ParticipantRecord> {
        self.db.with_connection(|conn| {
            if ChallengeRepository::find_by_id(conn, challenge_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的挑战",
                    json!({"challengeId": challenge_id}),
                ));
            }
            if UserRepository::find_by_id(conn, user_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的用户",
                    json!({"userId": user_id}),
                ));
            }
            if ChallengeRepository::active_participation(conn, challenge_id, user_id)?.is_some() {
                return Err(AppError::conflict("已经加入了该挑战"));
            }

            let record = ParticipantRecord {
                id: uuid::Uuid::new_v4().to_string(),
                challenge_id: challenge_id.to_string(),
                user_id: user_id.to_string(),
                joined_at: Utc::now().to_rfc3339(),
                left_at: None,
                opt_out: false,
            };
            ChallengeRepository::insert_participant(conn, &record)?;
            info!(challenge_id = %challenge_id, user_id = %user_id, "participant joined");
            Ok(record)
        })
    }

    /// Closes the open interval. History stays for audit; the user drops
    /// out of future rankings until a rejoin.
    pub fn leave(&self, challenge_id: &str, user_id: &str) -> AppResult<()> {
        self.db.with_connection(|conn| {
            let active = ChallengeRepository::active_participation(conn, challenge_id, user_id)?
                .ok_or_else(|| {
                    AppError::validation_with_details(
                        "当前没有加入该挑战",
                        json!({"challengeId": challenge_id, "userId": user_id}),
                    )
                })?;
            ChallengeRepository::close_participation(conn, &active.id, &Utc::now().to_rfc3339())?;
            info!(challenge_id = %challenge_id, user_id = %user_id, "participant left");
            Ok(())
        })
    }

    pub fn set_opt_out(&self, challenge_id: &str, user_id: &str, opt_out: bool) -> AppResult<()> {
        self.db.with_connection(|conn| {
            let active = ChallengeRepository::active_participation(conn, challenge_id, user_id)?
                .ok_or_else(|| {
                    AppError::validation_with_details(
                        "当前没有加入该挑战",
                        json!({"challengeId": challenge_id, "userId": user_id}),
                    )
                })?;
            ChallengeRepository::set_opt_out(conn, &active.id, opt_out)?;
            debug!(challenge_id = %challenge_id, user_id = %user_id, opt_out, "opt-out updated");
            Ok(())
        })
    }
}
