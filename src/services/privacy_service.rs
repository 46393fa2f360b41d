use chrono::Utc;
use tracing::info;

use crate::db::repositories::privacy_repository::PrivacyRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::privacy::{PrivacyChoice, PrivacySettingRecord, ScopeClass, Visibility};

/// Pure visibility resolution for one viewer/subject pair. Kept free of
/// storage so the rules can change without touching aggregation.
///
/// Priority order: self-view always wins; a missing mutual edge excludes
/// the subject from friends-scope views outright; the subject's Hidden
/// choice hides them from everyone else; AnonymousScore keeps score and
/// rank with a masked identity; the default is fully public.
pub fn resolve_visibility(
    viewer_id: &str,
    subject_id: &str,
    scope_class: ScopeClass,
    subject_setting: PrivacyChoice,
    mutual_friends: bool,
) -> Visibility {
    if viewer_id == subject_id {
        return Visibility::Full;
    }
    if scope_class == ScopeClass::Friends && !mutual_friends {
        return Visibility::Hidden;
    }
    match subject_setting {
        PrivacyChoice::Hidden => Visibility::Hidden,
        PrivacyChoice::AnonymousScore => Visibility::Anonymous,
        PrivacyChoice::Public => Visibility::Full,
    }
}

/// Persistence for per-user visibility choices. Settings take effect on
/// the next leaderboard computation, never retroactively.
#[derive(Clone)]
pub struct PrivacyService {
    db: DbPool,
}

impl PrivacyService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn set_privacy(
        &self,
        user_id: &str,
        scope_class: ScopeClass,
        setting: PrivacyChoice,
    ) -> AppResult<()> {
        self.db.with_connection(|conn| {
            if UserRepository::find_by_id(conn, user_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的用户",
                    serde_json::json!({"userId": user_id}),
                ));
            }
            PrivacyRepository::upsert(
                conn,
                user_id,
                scope_class,
                setting,
                &Utc::now().to_rfc3339(),
            )
        })?;
        info!(
            target: "app::privacy",
            user_id = %user_id,
            scope_class = scope_class.as_str(),
            setting = setting.as_str(),
            "privacy setting updated"
        );
        Ok(())
    }

    /// The stored choice, defaulting to Public when the user never chose.
    pub fn effective_setting(
        &self,
        user_id: &str,
        scope_class: ScopeClass,
    ) -> AppResult<PrivacyChoice> {
        let record = self
            .db
            .with_connection(|conn| PrivacyRepository::find(conn, user_id, scope_class))?;
        Ok(record.map(|record| record.setting).unwrap_or_default())
    }

    pub fn list_settings(&self, user_id: &str) -> AppResult<Vec<PrivacySettingRecord>> {
        self.db
            .with_connection(|conn| PrivacyRepository::list_for_user(conn, user_id))
    }
}
