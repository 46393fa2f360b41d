use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::privacy::{PrivacyChoice, PrivacySettingRecord, ScopeClass};

#[derive(Debug, Clone)]
pub struct PrivacySettingRow {
    pub user_id: String,
    pub scope_class: String,
    pub setting: String,
    pub updated_at: String,
}

impl PrivacySettingRow {
    pub fn into_record(self) -> AppResult<PrivacySettingRecord> {
        let scope_class = ScopeClass::parse(&self.scope_class)
            .ok_or_else(|| AppError::database(format!("未知的可见范围: {}", self.scope_class)))?;
        let setting = PrivacyChoice::parse(&self.setting)
            .ok_or_else(|| AppError::database(format!("未知的隐私设置: {}", self.setting)))?;

        Ok(PrivacySettingRecord {
            user_id: self.user_id,
            scope_class,
            setting,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for PrivacySettingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.get("user_id")?,
            scope_class: row.get("scope_class")?,
            setting: row.get("setting")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct PrivacyRepository;

impl PrivacyRepository {
    pub fn upsert(
        conn: &Connection,
        user_id: &str,
        scope_class: ScopeClass,
        setting: PrivacyChoice,
        updated_at: &str,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO privacy_settings (user_id, scope_class, setting, updated_at)
                VALUES (:user_id, :scope_class, :setting, :updated_at)
                ON CONFLICT(user_id, scope_class) DO UPDATE SET
                    setting = excluded.setting,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":user_id": user_id,
                ":scope_class": scope_class.as_str(),
                ":setting": setting.as_str(),
                ":updated_at": updated_at,
            },
        )?;
        Ok(())
    }

    pub fn find(
        conn: &Connection,
        user_id: &str,
        scope_class: ScopeClass,
    ) -> AppResult<Option<PrivacySettingRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT user_id, scope_class, setting, updated_at
                FROM privacy_settings
                WHERE user_id = :user_id AND scope_class = :scope_class
            "#,
        )?;

        let row = stmt
            .query_row(
                named_params! {":user_id": user_id, ":scope_class": scope_class.as_str()},
                |row| PrivacySettingRow::try_from(row),
            )
            .optional()?;

        row.map(PrivacySettingRow::into_record).transpose()
    }

    pub fn list_for_user(conn: &Connection, user_id: &str) -> AppResult<Vec<PrivacySettingRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT user_id, scope_class, setting, updated_at
                FROM privacy_settings
                WHERE user_id = :user_id
                ORDER BY scope_class ASC
            "#,
        )?;

        let rows = stmt
            .query_map(named_params! {":user_id": user_id}, |row| {
                PrivacySettingRow::try_from(row)
            })?
            .map(|row| {
                row.map_err(AppError::from)
                    .and_then(PrivacySettingRow::into_record)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }
}
