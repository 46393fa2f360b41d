use chrono::Utc;
use tracing::info;

use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::user::{UserCreateInput, UserRecord};

#[derive(Clone)]
pub struct UserService {
    db: DbPool,
}

impl UserService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Registers a profile. Callers may supply a stable external id;
    /// otherwise one is minted.
    pub fn register(&self, input: UserCreateInput) -> AppResult<UserRecord> {
        let display_name = input.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AppError::validation("用户昵称不能为空"));
        }

        let record = UserRecord {
            id: input
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            display_name,
            created_at: Utc::now().to_rfc3339(),
        };
        self.db
            .with_connection(|conn| UserRepository::insert(conn, &record))?;
        info!(user_id = %record.id, "user registered");
        Ok(record)
    }

    pub fn get_user(&self, id: &str) -> AppResult<UserRecord> {
        self.db
            .with_connection(|conn| UserRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)
    }

    pub fn list_users(&self) -> AppResult<Vec<UserRecord>> {
        self.db.with_connection(UserRepository::list_all)
    }
}
