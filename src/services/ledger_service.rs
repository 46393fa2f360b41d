use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::ledger_repository::LedgerRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::habit::{HabitDayState, HabitRecord};
use crate::models::ledger::CompletionInput;
use crate::services::coaching::{CoachingEvent, CoachingRelay};
use crate::services::day_utils;
use crate::services::habit_state_service::{state_from_net, HabitStateService};

/// The single side-effecting operation in the core. Everything else reads.
pub struct LedgerService {
    db: DbPool,
    habit_state: Arc<HabitStateService>,
    coaching: Option<Arc<CoachingRelay>>,
    /// Bumped on every accepted append; leaderboard caches compare against it.
    ledger_generation: Arc<AtomicU64>,
    append_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LedgerService {
    pub fn new(
        db: DbPool,
        habit_state: Arc<HabitStateService>,
        coaching: Option<Arc<CoachingRelay>>,
        ledger_generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            db,
            habit_state,
            coaching,
            ledger_generation,
            append_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validates and appends one completion event, returning the projected
    /// day state after the append. Rejections leave the ledger untouched.
    pub fn append(&self, input: CompletionInput) -> AppResult<HabitDayState> {
        if input.delta != 1 && input.delta != -1 {
            return Err(AppError::validation_with_details(
                "增量必须是 +1 或 -1",
                json!({"delta": input.delta}),
            ));
        }

        let habit = self.fetch_habit(&input.habit_id)?;
        if habit.is_deleted() {
            return Err(AppError::invariant_with_details(
                "习惯已删除，不能再记录打卡",
                json!({"habitId": habit.id}),
            ));
        }
        if habit.owner_id != input.user_id {
            return Err(AppError::validation_with_details(
                "只能为自己的习惯打卡",
                json!({"habitId": habit.id, "userId": input.user_id}),
            ));
        }

        let tz = day_utils::parse_time_zone(&habit.time_zone)?;
        let instant = match &input.client_timestamp {
            Some(raw) => day_utils::parse_timestamp(raw)?,
            None => Utc::now(),
        };
        // Frozen at append time: later time-zone edits never reclassify it.
        let day = day_utils::local_day(instant, &tz);
        let day_key = day_utils::format_day(day);

        let created_on = day_utils::parse_day(&habit.created_on)?;
        if day < created_on {
            return Err(AppError::validation_with_details(
                "打卡日期早于习惯创建日",
                json!({"day": day_key, "createdOn": habit.created_on}),
            ));
        }
        if !habit.schedule.is_scheduled_on(day) {
            return Err(AppError::validation_with_details(
                "该日期不在习惯的排期内",
                json!({"day": day_key, "schedule": habit.schedule.mask_string()}),
            ));
        }

        // Per-(habit, day) critical section: the habit has one owner, so
        // this serializes exactly the (user, habit, day) appends that share
        // mutable state. Distinct keys proceed in parallel.
        let lock = self.lock_for(&habit.id, &day_key)?;
        let guard = lock
            .lock()
            .map_err(|_| AppError::other("打卡串行锁中毒"))?;

        let (state, was_complete) = self.db.with_connection(|conn| {
            let net = LedgerRepository::net_count(conn, &habit.id, &day_key)?;
            if input.delta < 0 && net == 0 {
                return Err(AppError::invariant_with_details(
                    "当日打卡次数已为 0，不能再撤销",
                    json!({"habitId": habit.id, "day": day_key}),
                ));
            }

            let event_id = uuid::Uuid::new_v4().to_string();
            let seq = LedgerRepository::append(
                conn,
                &event_id,
                &habit.id,
                &input.user_id,
                &day_key,
                input.delta,
                &Utc::now().to_rfc3339(),
            )?;
            debug!(
                target: "app::ledger",
                habit_id = %habit.id,
                day = %day_key,
                delta = input.delta,
                seq,
                "completion event appended"
            );

            let was_complete = state_from_net(&habit, &day_key, net).is_complete;
            Ok((state_from_net(&habit, &day_key, net + input.delta), was_complete))
        })?;
        drop(guard);

        self.habit_state.invalidate(&habit.id);
        self.ledger_generation.fetch_add(1, Ordering::SeqCst);

        // Only the append that crossed the target counts as "completing the
        // day"; over-target increments on an already-complete day stay quiet.
        if state.is_complete && !was_complete && input.delta > 0 {
            self.emit_coaching_event(&habit, &state);
        }

        info!(
            target: "app::ledger",
            habit_id = %habit.id,
            day = %state.day,
            count = state.current_count,
            complete = state.is_complete,
            "completion recorded"
        );
        Ok(state)
    }

    fn emit_coaching_event(&self, habit: &HabitRecord, state: &HabitDayState) {
        let Some(relay) = &self.coaching else {
            return;
        };
        // Best effort: a failed or dropped tip is invisible to the caller.
        let streak = match day_utils::parse_day(&state.day)
            .and_then(|day| self.habit_state.streak(&habit.id, day))
        {
            Ok(streak) => streak,
            Err(_) => 0,
        };
        relay.emit(CoachingEvent {
            user_id: habit.owner_id.clone(),
            habit_id: habit.id.clone(),
            day: state.day.clone(),
            streak,
        });
    }

    fn lock_for(&self, habit_id: &str, day: &str) -> AppResult<Arc<Mutex<()>>> {
        let key = format!("{habit_id}:{day}");
        let mut locks = self
            .append_locks
            .lock()
            .map_err(|_| AppError::other("打卡锁表中毒"))?;
        // A strong count of 1 means only the map still holds the entry, so
        // no append is in flight for that key and it can be reclaimed.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(Arc::clone(locks.entry(key).or_default()))
    }

    fn fetch_habit(&self, habit_id: &str) -> AppResult<HabitRecord> {
        self.db
            .with_connection(|conn| HabitRepository::find_by_id(conn, habit_id))?
            .ok_or_else(|| {
                AppError::validation_with_details("未知的习惯", json!({"habitId": habit_id}))
            })
    }
}
