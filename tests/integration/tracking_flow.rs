use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use habitarena_core::api::{self, AppState};
use habitarena_core::db::DbPool;
use habitarena_core::error::AppResult;
use habitarena_core::models::habit::{HabitCreateInput, HabitKind, OverflowPolicy};
use habitarena_core::models::ledger::CompletionInput;
use habitarena_core::models::user::UserCreateInput;
use habitarena_core::services::coaching::{CoachingEvent, TipSink};
use habitarena_core::services::directory::StaticDirectory;
use tempfile::tempdir;

struct RecordingSink {
    tx: Mutex<Sender<CoachingEvent>>,
}

impl TipSink for RecordingSink {
    fn deliver(&self, event: &CoachingEvent) -> AppResult<()> {
        self.tx.lock().expect("sink lock").send(event.clone()).ok();
        Ok(())
    }
}

fn create_state(sink: Option<Box<dyn TipSink>>) -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("tracking.sqlite")).expect("db pool");
    let state =
        AppState::new(pool, Arc::new(StaticDirectory::new()), sink).expect("app state");
    (state, dir)
}

fn register(state: &AppState, id: &str) {
    api::community::users_register(
        state,
        UserCreateInput {
            display_name: id.to_string(),
            id: Some(id.to_string()),
        },
    )
    .expect("register user");
}

fn completion(user: &str, habit: &str, delta: i64, timestamp: &str) -> CompletionInput {
    CompletionInput {
        user_id: user.to_string(),
        habit_id: habit.to_string(),
        delta,
        client_timestamp: Some(timestamp.to_string()),
    }
}

#[test]
fn counter_habit_saturates_at_target_and_keeps_audit_trail() {
    let (state, _dir) = create_state(None);
    register(&state, "ada");
    let habit = api::tracking::habits_create(
        &state,
        HabitCreateInput {
            owner_id: "ada".into(),
            kind: HabitKind::Counter,
            target_count: Some(3),
            schedule: None,
            time_zone: "UTC".into(),
            overflow_policy: Some(OverflowPolicy::Saturate),
        },
    )
    .expect("create habit");

    for _ in 0..5 {
        api::tracking::record_completion(
            &state,
            completion("ada", &habit.id, 1, "2030-06-03T09:00:00+00:00"),
        )
        .expect("record");
    }

    let view = api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-03").expect("state");
    assert_eq!(view.day_state.current_count, 3);
    assert!(view.day_state.is_complete);

    // All five accepted increments stay in the ledger behind the clamp.
    let events = state
        .db()
        .with_connection(|conn| {
            habitarena_core::db::repositories::ledger_repository::LedgerRepository::events_for_day(
                conn,
                &habit.id,
                "2030-06-03",
            )
        })
        .expect("events");
    assert_eq!(events.len(), 5);
}

#[test]
fn simple_habit_toggle_returns_to_zero_without_erasing_history() {
    let (state, _dir) = create_state(None);
    register(&state, "ada");
    let habit = api::tracking::habits_create(
        &state,
        HabitCreateInput {
            owner_id: "ada".into(),
            kind: HabitKind::Simple,
            target_count: None,
            schedule: None,
            time_zone: "UTC".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit");

    api::tracking::record_completion(
        &state,
        completion("ada", &habit.id, 1, "2030-06-03T09:00:00+00:00"),
    )
    .expect("complete");
    api::tracking::record_completion(
        &state,
        completion("ada", &habit.id, -1, "2030-06-03T10:00:00+00:00"),
    )
    .expect("undo");

    let view = api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-03").expect("state");
    assert_eq!(view.day_state.current_count, 0);
    assert!(!view.day_state.is_complete);

    let events = state
        .db()
        .with_connection(|conn| {
            habitarena_core::db::repositories::ledger_repository::LedgerRepository::events_for_day(
                conn,
                &habit.id,
                "2030-06-03",
            )
        })
        .expect("events");
    assert_eq!(events.len(), 2);
}

#[test]
fn streak_counts_consecutive_scheduled_complete_days() {
    let (state, _dir) = create_state(None);
    register(&state, "ada");
    let habit = api::tracking::habits_create(
        &state,
        HabitCreateInput {
            owner_id: "ada".into(),
            kind: HabitKind::Simple,
            target_count: None,
            schedule: None,
            time_zone: "UTC".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit");

    for day in ["2030-06-01", "2030-06-02", "2030-06-03"] {
        api::tracking::record_completion(
            &state,
            completion("ada", &habit.id, 1, &format!("{day}T08:00:00+00:00")),
        )
        .expect("record");
    }

    let view = api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-03").expect("state");
    assert_eq!(view.streak, 3);

    // A gap resets: June 5 completed, June 4 missed.
    api::tracking::record_completion(
        &state,
        completion("ada", &habit.id, 1, "2030-06-05T08:00:00+00:00"),
    )
    .expect("record");
    let after_gap =
        api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-05").expect("state");
    assert_eq!(after_gap.streak, 1);
}

#[test]
fn projections_depend_on_the_event_set_not_the_arrival_order() {
    let arrivals = [
        ("2030-06-02", "2030-06-02T09:00:00+00:00"),
        ("2030-06-01", "2030-06-01T08:00:00+00:00"),
        ("2030-06-03", "2030-06-03T21:00:00+00:00"),
        ("2030-06-02", "2030-06-02T18:00:00+00:00"),
    ];

    let project = |ordering: &[(&str, &str)]| {
        let (state, dir) = create_state(None);
        register(&state, "ada");
        let habit = api::tracking::habits_create(
            &state,
            HabitCreateInput {
                owner_id: "ada".into(),
                kind: HabitKind::Counter,
                target_count: Some(1),
                schedule: None,
                time_zone: "UTC".into(),
                overflow_policy: Some(OverflowPolicy::Saturate),
            },
        )
        .expect("create habit");
        for (_, timestamp) in ordering {
            api::tracking::record_completion(&state, completion("ada", &habit.id, 1, timestamp))
                .expect("record");
        }
        let counts: Vec<i64> = ["2030-06-01", "2030-06-02", "2030-06-03"]
            .iter()
            .map(|day| {
                api::tracking::get_habit_state(&state, "ada", &habit.id, day)
                    .expect("state")
                    .day_state
                    .current_count
            })
            .collect();
        let streak = api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-03")
            .expect("state")
            .streak;
        drop(dir);
        (counts, streak)
    };

    let forward = project(&arrivals);
    let mut shuffled = arrivals;
    shuffled.reverse();
    let backward = project(&shuffled);

    assert_eq!(forward, backward);
    assert_eq!(forward.0, vec![1, 1, 1]);
    assert_eq!(forward.1, 3);
}

#[test]
fn day_boundary_follows_the_habit_time_zone_frozen_at_append() {
    let (state, _dir) = create_state(None);
    register(&state, "ada");
    let habit = api::tracking::habits_create(
        &state,
        HabitCreateInput {
            owner_id: "ada".into(),
            kind: HabitKind::Simple,
            target_count: None,
            schedule: None,
            time_zone: "Pacific/Auckland".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit");

    // 13:30 UTC on June 3 is already June 4 in Auckland (UTC+12).
    api::tracking::record_completion(
        &state,
        completion("ada", &habit.id, 1, "2030-06-03T13:30:00+00:00"),
    )
    .expect("record");

    let june_fourth =
        api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-04").expect("state");
    assert_eq!(june_fourth.day_state.current_count, 1);

    let june_third =
        api::tracking::get_habit_state(&state, "ada", &habit.id, "2030-06-03").expect("state");
    assert_eq!(june_third.day_state.current_count, 0);
}

#[test]
fn completing_a_day_emits_one_coaching_event() {
    let (tx, rx) = mpsc::channel();
    let (state, _dir) = create_state(Some(Box::new(RecordingSink { tx: Mutex::new(tx) })));
    register(&state, "ada");
    let habit = api::tracking::habits_create(
        &state,
        HabitCreateInput {
            owner_id: "ada".into(),
            kind: HabitKind::Counter,
            target_count: Some(2),
            schedule: None,
            time_zone: "UTC".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit");

    // First increment: incomplete, no event expected yet.
    api::tracking::record_completion(
        &state,
        completion("ada", &habit.id, 1, "2030-06-03T08:00:00+00:00"),
    )
    .expect("record");
    // Second increment reaches the target.
    api::tracking::record_completion(
        &state,
        completion("ada", &habit.id, 1, "2030-06-03T09:00:00+00:00"),
    )
    .expect("record");

    let event = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("coaching event");
    assert_eq!(event.habit_id, habit.id);
    assert_eq!(event.day, "2030-06-03");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}
