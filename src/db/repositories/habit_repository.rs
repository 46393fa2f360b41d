use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::habit::{HabitKind, HabitRecord, HabitSchedule, OverflowPolicy};

#[derive(Debug, Clone)]
pub struct HabitRow {
    pub id: String,
    pub owner_id: String,
    pub kind: String,
    pub target_count: i64,
    pub schedule_mask: String,
    pub time_zone: String,
    pub overflow_policy: String,
    pub created_at: String,
    pub created_on: String,
    pub deleted_at: Option<String>,
}

impl HabitRow {
    pub fn from_record(record: &HabitRecord) -> Self {
        Self {
            id: record.id.clone(),
            owner_id: record.owner_id.clone(),
            kind: record.kind.as_str().to_string(),
            target_count: record.target_count,
            schedule_mask: record.schedule.mask_string(),
            time_zone: record.time_zone.clone(),
            overflow_policy: record.overflow_policy.as_str().to_string(),
            created_at: record.created_at.clone(),
            created_on: record.created_on.clone(),
            deleted_at: record.deleted_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<HabitRecord> {
        let kind = HabitKind::parse(&self.kind)
            .ok_or_else(|| AppError::database(format!("未知的习惯类型: {}", self.kind)))?;
        let schedule = HabitSchedule::parse(&self.schedule_mask).ok_or_else(|| {
            AppError::database(format!("无效的排期掩码: {}", self.schedule_mask))
        })?;
        let overflow_policy = OverflowPolicy::parse(&self.overflow_policy).ok_or_else(|| {
            AppError::database(format!("未知的溢出策略: {}", self.overflow_policy))
        })?;

        Ok(HabitRecord {
            id: self.id,
            owner_id: self.owner_id,
            kind,
            target_count: self.target_count,
            schedule,
            time_zone: self.time_zone,
            overflow_policy,
            created_at: self.created_at,
            created_on: self.created_on,
            deleted_at: self.deleted_at,
        })
    }
}

impl TryFrom<&Row<'_>> for HabitRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            kind: row.get("kind")?,
            target_count: row.get("target_count")?,
            schedule_mask: row.get("schedule_mask")?,
            time_zone: row.get("time_zone")?,
            overflow_policy: row.get("overflow_policy")?,
            created_at: row.get("created_at")?,
            created_on: row.get("created_on")?,
            deleted_at: row.get("deleted_at")?,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    id,
    owner_id,
    kind,
    target_count,
    schedule_mask,
    time_zone,
    overflow_policy,
    created_at,
    created_on,
    deleted_at
"#;

pub struct HabitRepository;

impl HabitRepository {
    pub fn insert(conn: &Connection, record: &HabitRecord) -> AppResult<()> {
        let row = HabitRow::from_record(record);
        conn.execute(
            r#"
                INSERT INTO habits (
                    id,
                    owner_id,
                    kind,
                    target_count,
                    schedule_mask,
                    time_zone,
                    overflow_policy,
                    created_at,
                    created_on,
                    deleted_at
                ) VALUES (
                    :id,
                    :owner_id,
                    :kind,
                    :target_count,
                    :schedule_mask,
                    :time_zone,
                    :overflow_policy,
                    :created_at,
                    :created_on,
                    :deleted_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":owner_id": &row.owner_id,
                ":kind": &row.kind,
                ":target_count": &row.target_count,
                ":schedule_mask": &row.schedule_mask,
                ":time_zone": &row.time_zone,
                ":overflow_policy": &row.overflow_policy,
                ":created_at": &row.created_at,
                ":created_on": &row.created_on,
                ":deleted_at": &row.deleted_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<HabitRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM habits WHERE id = :id"
        ))?;

        let row = stmt
            .query_row(named_params! {":id": id}, |row| HabitRow::try_from(row))
            .optional()?;

        row.map(HabitRow::into_record).transpose()
    }

    pub fn list_for_owner(conn: &Connection, owner_id: &str) -> AppResult<Vec<HabitRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM habits WHERE owner_id = :owner_id ORDER BY created_at ASC"
        ))?;

        let rows = stmt
            .query_map(named_params! {":owner_id": owner_id}, |row| {
                HabitRow::try_from(row)
            })?
            .map(|row| {
                row.map_err(AppError::from)
                    .and_then(HabitRow::into_record)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn soft_delete(conn: &Connection, id: &str, deleted_at: &str) -> AppResult<bool> {
        let changed = conn.execute(
            r#"
                UPDATE habits
                SET deleted_at = :deleted_at
                WHERE id = :id AND deleted_at IS NULL
            "#,
            named_params! {":id": id, ":deleted_at": deleted_at},
        )?;
        Ok(changed > 0)
    }

    pub fn count_all(conn: &Connection) -> AppResult<i64> {
        let total = conn.query_row("SELECT COUNT(*) FROM habits", [], |row| row.get(0))?;
        Ok(total)
    }

    pub fn count_active(conn: &Connection) -> AppResult<i64> {
        let total = conn.query_row(
            "SELECT COUNT(*) FROM habits WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
