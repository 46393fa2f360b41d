use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::habit::{HabitCreateInput, HabitKind, HabitRecord, HabitSchedule, OverflowPolicy};
use crate::services::day_utils;

#[derive(Clone)]
pub struct HabitService {
    db: DbPool,
}

impl HabitService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_habit(&self, input: HabitCreateInput) -> AppResult<HabitRecord> {
        let tz = day_utils::parse_time_zone(&input.time_zone)?;
        let schedule = normalize_schedule(input.schedule.as_deref())?;
        let target_count = normalize_target(input.kind, input.target_count)?;
        let overflow_policy = input.overflow_policy.unwrap_or(OverflowPolicy::Saturate);

        self.db.with_connection(|conn| {
            if UserRepository::find_by_id(conn, &input.owner_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的用户",
                    json!({"userId": input.owner_id}),
                ));
            }

            let now = Utc::now();
            let record = HabitRecord {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: input.owner_id.clone(),
                kind: input.kind,
                target_count,
                schedule: schedule.clone(),
                time_zone: input.time_zone.clone(),
                overflow_policy,
                created_at: now.to_rfc3339(),
                created_on: day_utils::format_day(day_utils::local_day(now, &tz)),
                deleted_at: None,
            };

            HabitRepository::insert(conn, &record)?;
            info!(habit_id = %record.id, owner_id = %record.owner_id, "habit created");
            Ok(record)
        })
    }

    pub fn get_habit(&self, id: &str) -> AppResult<HabitRecord> {
        let record = self
            .db
            .with_connection(|conn| HabitRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        debug!(habit_id = %record.id, "habit fetched");
        Ok(record)
    }

    pub fn list_habits(&self, owner_id: &str) -> AppResult<Vec<HabitRecord>> {
        let habits = self
            .db
            .with_connection(|conn| HabitRepository::list_for_owner(conn, owner_id))?;
        debug!(owner_id = %owner_id, count = habits.len(), "habits listed");
        Ok(habits)
    }

    /// Soft delete: the definition stops accepting events but its ledger
    /// history stays intact.
    pub fn delete_habit(&self, id: &str, requester_id: &str) -> AppResult<()> {
        let habit = self.get_habit(id)?;
        if habit.owner_id != requester_id {
            return Err(AppError::validation_with_details(
                "只有习惯的创建者可以删除它",
                json!({"habitId": id, "requesterId": requester_id}),
            ));
        }
        if habit.is_deleted() {
            return Err(AppError::conflict("习惯已被删除"));
        }

        let deleted_at = Utc::now().to_rfc3339();
        self.db
            .with_connection(|conn| HabitRepository::soft_delete(conn, id, &deleted_at))?;
        info!(habit_id = %id, "habit soft-deleted");
        Ok(())
    }
}

fn normalize_schedule(raw: Option<&str>) -> AppResult<HabitSchedule> {
    let schedule = match raw {
        Some(mask) => HabitSchedule::parse(mask).ok_or_else(|| {
            AppError::validation_with_details(
                "排期掩码必须是 7 位的 0/1 字符串",
                json!({"schedule": mask}),
            )
        })?,
        None => HabitSchedule::every_day(),
    };

    if schedule.is_empty() {
        return Err(AppError::validation("排期不能为空"));
    }

    Ok(schedule)
}

fn normalize_target(kind: HabitKind, target: Option<i64>) -> AppResult<i64> {
    match kind {
        HabitKind::Simple => match target {
            None | Some(1) => Ok(1),
            Some(other) => Err(AppError::validation_with_details(
                "简单习惯的目标次数必须为 1",
                json!({"targetCount": other}),
            )),
        },
        HabitKind::Counter => {
            let target = target.unwrap_or(1);
            if target < 1 {
                return Err(AppError::validation_with_details(
                    "目标次数必须不小于 1",
                    json!({"targetCount": target}),
                ));
            }
            Ok(target)
        }
    }
}
