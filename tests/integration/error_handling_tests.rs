use std::sync::Arc;

use habitarena_core::api::{self, AppState, CommandError};
use habitarena_core::db::DbPool;
use habitarena_core::models::challenge::ChallengeCreateInput;
use habitarena_core::models::habit::{HabitCreateInput, HabitKind};
use habitarena_core::models::leaderboard::LeaderboardScope;
use habitarena_core::models::ledger::CompletionInput;
use habitarena_core::models::user::UserCreateInput;
use habitarena_core::services::directory::StaticDirectory;
use tempfile::tempdir;

fn create_state() -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("errors.sqlite")).expect("db pool");
    let state = AppState::new(pool, Arc::new(StaticDirectory::new()), None).expect("app state");
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

fn simple_habit(state: &AppState, owner: &str) -> String {
    api::tracking::habits_create(
        state,
        HabitCreateInput {
            owner_id: owner.into(),
            kind: HabitKind::Simple,
            target_count: None,
            schedule: None,
            time_zone: "UTC".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit")
    .id
}

fn code(result: Result<impl std::fmt::Debug, CommandError>) -> String {
    result.expect_err("expected an error").code
}

#[test]
fn decrement_below_zero_is_an_invariant_violation() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    let habit = simple_habit(&state, "ada");

    let result = api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "ada".into(),
            habit_id: habit,
            delta: -1,
            client_timestamp: Some("2030-06-03T09:00:00+00:00".into()),
        },
    );
    assert_eq!(code(result), "INVARIANT_VIOLATION");
}

#[test]
fn deleted_habit_rejects_new_events_but_keeps_history_readable() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    let habit = simple_habit(&state, "ada");

    api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "ada".into(),
            habit_id: habit.clone(),
            delta: 1,
            client_timestamp: Some("2030-06-03T09:00:00+00:00".into()),
        },
    )
    .expect("record before delete");
    api::tracking::habits_delete(&state, &habit, "ada").expect("delete");

    let rejected = api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "ada".into(),
            habit_id: habit.clone(),
            delta: 1,
            client_timestamp: Some("2030-06-04T09:00:00+00:00".into()),
        },
    );
    assert_eq!(code(rejected), "INVARIANT_VIOLATION");

    // Historical state stays queryable after the soft delete.
    let view =
        api::tracking::get_habit_state(&state, "ada", &habit, "2030-06-03").expect("state");
    assert_eq!(view.day_state.current_count, 1);
}

#[test]
fn habit_state_is_only_readable_by_its_owner() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    register(&state, "grace");
    let habit = simple_habit(&state, "ada");

    let foreign = api::tracking::get_habit_state(&state, "grace", &habit, "2030-06-03");
    assert_eq!(code(foreign), "VALIDATION_ERROR");

    api::tracking::get_habit_state(&state, "ada", &habit, "2030-06-03").expect("owner view");
}

#[test]
fn unknown_ids_surface_as_validation_errors() {
    let (state, _dir) = create_state();
    register(&state, "ada");

    let unknown_habit = api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "ada".into(),
            habit_id: "no-such-habit".into(),
            delta: 1,
            client_timestamp: None,
        },
    );
    assert_eq!(code(unknown_habit), "VALIDATION_ERROR");

    let unknown_challenge =
        api::community::challenge_progress_fetch(&state, "no-such-challenge", "ada", "2030-06-03");
    assert_eq!(code(unknown_challenge), "VALIDATION_ERROR");

    let unknown_viewer = api::community::leaderboard_fetch(
        &state,
        LeaderboardScope::Global,
        "nobody",
        "2030-06-03",
    );
    assert_eq!(code(unknown_viewer), "VALIDATION_ERROR");
}

#[test]
fn event_before_habit_creation_day_is_rejected() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    let habit = simple_habit(&state, "ada");

    let result = api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "ada".into(),
            habit_id: habit,
            delta: 1,
            client_timestamp: Some("2020-01-01T09:00:00+00:00".into()),
        },
    );
    assert_eq!(code(result), "VALIDATION_ERROR");
}

#[test]
fn unscheduled_weekday_is_rejected() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    let habit = api::tracking::habits_create(
        &state,
        HabitCreateInput {
            owner_id: "ada".into(),
            kind: HabitKind::Simple,
            target_count: None,
            // Monday only.
            schedule: Some("1000000".into()),
            time_zone: "UTC".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit")
    .id;

    // 2030-06-04 is a Tuesday.
    let result = api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "ada".into(),
            habit_id: habit,
            delta: 1,
            client_timestamp: Some("2030-06-04T09:00:00+00:00".into()),
        },
    );
    assert_eq!(code(result), "VALIDATION_ERROR");
}

#[test]
fn joining_twice_is_a_conflict_and_foreign_habits_reject_events() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    register(&state, "grace");
    let habit = simple_habit(&state, "ada");

    let challenge = api::community::challenges_create(
        &state,
        ChallengeCreateInput {
            title: "Protocol".into(),
            start_day: "2020-01-01".into(),
            end_day: None,
            partial_credit: None,
        },
    )
    .expect("create challenge");
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");
    let duplicate = api::community::challenges_join(&state, &challenge.id, "ada");
    assert_eq!(code(duplicate), "CONFLICT");

    let foreign = api::tracking::record_completion(
        &state,
        CompletionInput {
            user_id: "grace".into(),
            habit_id: habit,
            delta: 1,
            client_timestamp: None,
        },
    );
    assert_eq!(code(foreign), "VALIDATION_ERROR");
}

#[test]
fn duplicate_registration_is_a_conflict_and_deleting_twice_too() {
    let (state, _dir) = create_state();
    register(&state, "ada");

    let duplicate = api::community::users_register(
        &state,
        UserCreateInput {
            display_name: "Ada again".into(),
            id: Some("ada".into()),
        },
    );
    assert_eq!(code(duplicate), "CONFLICT");

    let habit = simple_habit(&state, "ada");
    api::tracking::habits_delete(&state, &habit, "ada").expect("delete");
    let twice = api::tracking::habits_delete(&state, &habit, "ada");
    assert_eq!(code(twice), "CONFLICT");
}
