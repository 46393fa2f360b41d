pub mod admin;
pub mod community;
pub mod tracking;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::services::challenge_progress_service::ChallengeProgressService;
use crate::services::challenge_service::ChallengeService;
use crate::services::coaching::{CoachingRelay, TipSink};
use crate::services::directory::Directory;
use crate::services::habit_service::HabitService;
use crate::services::habit_state_service::HabitStateService;
use crate::services::leaderboard_service::LeaderboardService;
use crate::services::ledger_service::LedgerService;
use crate::services::privacy_service::PrivacyService;
use crate::services::stats_service::StatsService;
use crate::services::user_service::UserService;

/// One wired instance of the core. Hosts hold a single `AppState` and call
/// the operation functions in the sibling modules against it.
#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    user_service: Arc<UserService>,
    habit_service: Arc<HabitService>,
    habit_state_service: Arc<HabitStateService>,
    ledger_service: Arc<LedgerService>,
    challenge_service: Arc<ChallengeService>,
    progress_service: Arc<ChallengeProgressService>,
    privacy_service: Arc<PrivacyService>,
    leaderboard_service: Arc<LeaderboardService>,
    stats_service: Arc<StatsService>,
}

impl AppState {
    /// Wires every service over one database. `tip_sink` is optional: with
    /// `None` the tracking pipeline simply never emits coaching events.
    pub fn new(
        db_pool: DbPool,
        directory: Arc<dyn Directory>,
        tip_sink: Option<Box<dyn TipSink>>,
    ) -> AppResult<Self> {
        let ledger_generation = Arc::new(AtomicU64::new(0));

        let user_service = Arc::new(UserService::new(db_pool.clone()));
        let habit_service = Arc::new(HabitService::new(db_pool.clone()));
        let habit_state_service = Arc::new(HabitStateService::new(db_pool.clone()));

        let coaching = match tip_sink {
            Some(sink) => Some(Arc::new(CoachingRelay::start(sink)?)),
            None => None,
        };
        let ledger_service = Arc::new(LedgerService::new(
            db_pool.clone(),
            Arc::clone(&habit_state_service),
            coaching,
            Arc::clone(&ledger_generation),
        ));

        let challenge_service = Arc::new(ChallengeService::new(db_pool.clone()));
        let progress_service = Arc::new(ChallengeProgressService::new(db_pool.clone()));
        let privacy_service = Arc::new(PrivacyService::new(db_pool.clone()));
        let leaderboard_service = Arc::new(LeaderboardService::new(
            db_pool.clone(),
            Arc::clone(&progress_service),
            Arc::clone(&privacy_service),
            directory,
            ledger_generation,
        ));
        let stats_service = Arc::new(StatsService::new(db_pool.clone()));

        Ok(Self {
            db_pool,
            user_service,
            habit_service,
            habit_state_service,
            ledger_service,
            challenge_service,
            progress_service,
            privacy_service,
            leaderboard_service,
            stats_service,
        })
    }

    pub fn users(&self) -> Arc<UserService> {
        Arc::clone(&self.user_service)
    }

    pub fn habits(&self) -> Arc<HabitService> {
        Arc::clone(&self.habit_service)
    }

    pub fn habit_state(&self) -> Arc<HabitStateService> {
        Arc::clone(&self.habit_state_service)
    }

    pub fn ledger(&self) -> Arc<LedgerService> {
        Arc::clone(&self.ledger_service)
    }

    pub fn challenges(&self) -> Arc<ChallengeService> {
        Arc::clone(&self.challenge_service)
    }

    pub fn progress(&self) -> Arc<ChallengeProgressService> {
        Arc::clone(&self.progress_service)
    }

    pub fn privacy(&self) -> Arc<PrivacyService> {
        Arc::clone(&self.privacy_service)
    }

    pub fn leaderboards(&self) -> Arc<LeaderboardService> {
        Arc::clone(&self.leaderboard_service)
    }

    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats_service)
    }

    pub fn db(&self) -> DbPool {
        self.db_pool.clone()
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl CommandError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Option<JsonValue>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details,
        }
    }
}

impl From<AppError> for CommandError {
    fn from(error: AppError) -> Self {
        match error {
            AppError::Validation {
                message, details, ..
            } => CommandError::new("VALIDATION_ERROR", message, details),
            AppError::InvariantViolation { message, details } => {
                warn!(target: "app::command", %message, "invariant rejection in command");
                CommandError::new("INVARIANT_VIOLATION", message, details)
            }
            AppError::NotFound => CommandError::new("NOT_FOUND", "请求的资源不存在", None),
            AppError::Conflict { message } => CommandError::new("CONFLICT", message, None),
            AppError::Database { message } => {
                error!(target: "app::command", %message, "database error in command");
                CommandError::new("UNKNOWN", message, None)
            }
            AppError::Serialization(error) => {
                error!(target: "app::command", error = %error, "serialization error in command");
                CommandError::new("UNKNOWN", "序列化失败", None)
            }
            AppError::Io(error) => {
                error!(target: "app::command", error = %error, "io error in command");
                CommandError::new("UNKNOWN", "文件系统读写失败", None)
            }
            AppError::Other(message) => {
                error!(target: "app::command", %message, "unexpected error in command");
                CommandError::new("UNKNOWN", message, None)
            }
        }
    }
}
