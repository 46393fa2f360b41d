use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::NaiveDate;
use tracing::debug;

use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::ledger_repository::LedgerRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::habit::{HabitDayState, HabitRecord, OverflowPolicy};
use crate::services::day_utils;

#[derive(Debug, Clone)]
struct CachedStreak {
    as_of: NaiveDate,
    length: u32,
}

/// Projects per-(habit, day) state and streaks from the ledger. Holds no
/// authoritative state: the streak cache is a pure memo, invalidated on
/// every append for the habit.
pub struct HabitStateService {
    db: DbPool,
    streak_cache: RwLock<HashMap<String, CachedStreak>>,
    /// Bumped by `invalidate`; a streak computed against an older generation
    /// is discarded instead of cached, so a reader racing an append can
    /// never repopulate the memo with pre-append data.
    streak_generation: AtomicU64,
}

impl HabitStateService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            streak_cache: RwLock::new(HashMap::new()),
            streak_generation: AtomicU64::new(0),
        }
    }

    pub fn project(&self, habit_id: &str, day: NaiveDate) -> AppResult<HabitDayState> {
        let habit = self.fetch_habit(habit_id)?;
        self.project_for(&habit, day)
    }

    /// Projection with the habit row already in hand, for callers holding
    /// the append critical section.
    pub fn project_for(&self, habit: &HabitRecord, day: NaiveDate) -> AppResult<HabitDayState> {
        let day_key = day_utils::format_day(day);
        let net = self
            .db
            .with_connection(|conn| LedgerRepository::net_count(conn, &habit.id, &day_key))?;
        Ok(state_from_net(habit, &day_key, net))
    }

    /// Length of the maximal suffix of consecutive complete scheduled days
    /// ending at the most recent scheduled day on or before `as_of`.
    pub fn streak(&self, habit_id: &str, as_of: NaiveDate) -> AppResult<u32> {
        let habit = self.fetch_habit(habit_id)?;
        let created_on = day_utils::parse_day(&habit.created_on)?;

        let reference = match habit.schedule.latest_scheduled_on_or_before(as_of) {
            Some(day) if day >= created_on => day,
            _ => return Ok(0),
        };

        // Read before the ledger query: anything computed from this point on
        // is only cached if no append invalidates in between.
        let generation = self.streak_generation.load(Ordering::SeqCst);

        let cached = {
            let cache = self
                .streak_cache
                .read()
                .map_err(|_| AppError::other("连环缓存锁中毒"))?;
            cache.get(habit_id).cloned()
        };

        if let Some(entry) = &cached {
            if entry.as_of == reference {
                debug!(habit_id = %habit_id, streak = entry.length, "streak cache hit");
                return Ok(entry.length);
            }
        }

        // Walk backward from the reference day; a prior cached result bounds
        // the walk so cost tracks streak length, not total history.
        let resume_at = cached.as_ref().filter(|c| c.as_of < reference).map(|c| c.as_of);
        let after_key = resume_at.map(day_utils::format_day);
        let reference_key = day_utils::format_day(reference);
        let totals = self.db.with_connection(|conn| {
            LedgerRepository::day_totals_for_habit(
                conn,
                habit_id,
                after_key.as_deref(),
                &reference_key,
            )
        })?;
        let net_by_day: HashMap<String, i64> = totals
            .into_iter()
            .map(|total| (total.day, total.net))
            .collect();

        let mut length: u32 = 0;
        let mut unbroken_to_resume = resume_at.is_some();
        let mut cursor = Some(reference);
        while let Some(day) = cursor {
            if day < created_on {
                unbroken_to_resume = false;
                break;
            }
            if resume_at == Some(day) {
                break;
            }
            let net = net_by_day
                .get(&day_utils::format_day(day))
                .copied()
                .unwrap_or(0);
            if projected_count(&habit, net) != habit.target_count {
                unbroken_to_resume = false;
                break;
            }
            length += 1;
            cursor = habit.schedule.previous_scheduled(day);
            if cursor.is_none() {
                unbroken_to_resume = false;
            }
        }

        if unbroken_to_resume {
            if let Some(entry) = &cached {
                length += entry.length;
            }
        }

        self.store_streak(
            habit_id,
            CachedStreak {
                as_of: reference,
                length,
            },
            generation,
        )?;
        debug!(habit_id = %habit_id, streak = length, "streak computed");
        Ok(length)
    }

    /// Memoizes a computed streak unless an append invalidated the habit
    /// while the computation ran; a stale result is still correct to return
    /// once, but must not stick in the cache.
    fn store_streak(
        &self,
        habit_id: &str,
        entry: CachedStreak,
        generation: u64,
    ) -> AppResult<()> {
        let mut cache = self
            .streak_cache
            .write()
            .map_err(|_| AppError::other("连环缓存锁中毒"))?;
        if self.streak_generation.load(Ordering::SeqCst) == generation {
            cache.insert(habit_id.to_string(), entry);
        } else {
            debug!(habit_id = %habit_id, "streak result outdated by an append, not cached");
        }
        Ok(())
    }

    /// Drops the memoized streak after an accepted append. The generation
    /// bump happens under the same write lock as the removal, so an
    /// in-flight computation cannot slip its result in afterwards.
    pub fn invalidate(&self, habit_id: &str) {
        if let Ok(mut cache) = self.streak_cache.write() {
            self.streak_generation.fetch_add(1, Ordering::SeqCst);
            cache.remove(habit_id);
        }
    }

    fn fetch_habit(&self, habit_id: &str) -> AppResult<HabitRecord> {
        self.db
            .with_connection(|conn| HabitRepository::find_by_id(conn, habit_id))?
            .ok_or_else(|| {
                AppError::validation_with_details(
                    "未知的习惯",
                    serde_json::json!({"habitId": habit_id}),
                )
            })
    }
}

/// The view clamp: events past the target stay in the ledger but the
/// projected count never exceeds it.
pub fn projected_count(habit: &HabitRecord, net: i64) -> i64 {
    let net = net.max(0);
    match habit.overflow_policy {
        OverflowPolicy::Saturate => net.min(habit.target_count),
        OverflowPolicy::Wrap => net % (habit.target_count + 1),
    }
}

pub fn state_from_net(habit: &HabitRecord, day: &str, net: i64) -> HabitDayState {
    let current_count = projected_count(habit, net);
    HabitDayState {
        habit_id: habit.id.clone(),
        day: day.to_string(),
        current_count,
        target: habit.target_count,
        is_complete: current_count == habit.target_count,
    }
}
