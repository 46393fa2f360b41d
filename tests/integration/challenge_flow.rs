use std::sync::Arc;

use chrono::Utc;
use habitarena_core::api::{self, AppState};
use habitarena_core::db::DbPool;
use habitarena_core::models::challenge::ChallengeCreateInput;
use habitarena_core::models::habit::{HabitCreateInput, HabitKind};
use habitarena_core::models::ledger::CompletionInput;
use habitarena_core::models::user::UserCreateInput;
use habitarena_core::services::directory::StaticDirectory;
use tempfile::tempdir;

fn create_state() -> (AppState, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("challenges.sqlite")).expect("db pool");
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

fn create_counter_habit(state: &AppState, owner: &str, target: i64) -> String {
    api::tracking::habits_create(
        state,
        HabitCreateInput {
            owner_id: owner.into(),
            kind: HabitKind::Counter,
            target_count: Some(target),
            schedule: None,
            time_zone: "UTC".into(),
            overflow_policy: None,
        },
    )
    .expect("create habit")
    .id
}

fn complete_today(state: &AppState, user: &str, habit_id: &str, times: i64) {
    for _ in 0..times {
        api::tracking::record_completion(
            state,
            CompletionInput {
                user_id: user.into(),
                habit_id: habit_id.into(),
                delta: 1,
                client_timestamp: None,
            },
        )
        .expect("record completion");
    }
}

fn today_key() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

#[test]
fn full_and_partial_credit_roll_up_into_the_score() {
    let (state, _dir) = create_state();
    register(&state, "ada");

    let challenge = api::community::challenges_create(
        &state,
        ChallengeCreateInput {
            title: "Deep work protocol".into(),
            start_day: "2020-01-01".into(),
            end_day: None,
            partial_credit: Some(true),
        },
    )
    .expect("create challenge");

    let full = create_counter_habit(&state, "ada", 2);
    let partial = create_counter_habit(&state, "ada", 4);
    api::community::challenges_tag_habit(&state, &challenge.id, &full).expect("tag");
    api::community::challenges_tag_habit(&state, &challenge.id, &partial).expect("tag");
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");

    complete_today(&state, "ada", &full, 2);
    complete_today(&state, "ada", &partial, 1);

    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "ada", &today_key())
            .expect("progress");
    assert_eq!(progress.days_credited, 1);
    assert!((progress.score - 1.25).abs() < 1e-9);
}

#[test]
fn partial_credit_disabled_means_all_or_nothing() {
    let (state, _dir) = create_state();
    register(&state, "ada");

    let challenge = api::community::challenges_create(
        &state,
        ChallengeCreateInput {
            title: "Strict protocol".into(),
            start_day: "2020-01-01".into(),
            end_day: None,
            partial_credit: None,
        },
    )
    .expect("create challenge");

    let habit = create_counter_habit(&state, "ada", 4);
    api::community::challenges_tag_habit(&state, &challenge.id, &habit).expect("tag");
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");
    complete_today(&state, "ada", &habit, 3);

    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "ada", &today_key())
            .expect("progress");
    assert_eq!(progress.score, 0.0);
    assert_eq!(progress.days_credited, 0);
}

#[test]
fn leaving_keeps_credit_earned_inside_the_membership_interval() {
    let (state, _dir) = create_state();
    register(&state, "ada");

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
    let habit = create_counter_habit(&state, "ada", 1);
    api::community::challenges_tag_habit(&state, &challenge.id, &habit).expect("tag");
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");

    complete_today(&state, "ada", &habit, 1);
    api::community::challenges_leave(&state, &challenge.id, "ada").expect("leave");

    // The leave day itself is inside the interval, so today's credit stays.
    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "ada", &today_key())
            .expect("progress");
    assert_eq!(progress.days_credited, 1);
}

#[test]
fn days_before_the_join_day_earn_no_credit() {
    use habitarena_core::db::repositories::challenge_repository::ChallengeRepository;
    use habitarena_core::models::challenge::ParticipantRecord;

    let (state, _dir) = create_state();
    register(&state, "ada");

    let challenge = api::community::challenges_create(
        &state,
        ChallengeCreateInput {
            title: "June protocol".into(),
            start_day: "2030-06-01".into(),
            end_day: Some("2030-06-30".into()),
            partial_credit: None,
        },
    )
    .expect("create challenge");
    let habit = create_counter_habit(&state, "ada", 1);
    api::community::challenges_tag_habit(&state, &challenge.id, &habit).expect("tag");

    // Membership opens on June 10, after a completion has already landed.
    state
        .db()
        .with_connection(|conn| {
            ChallengeRepository::insert_participant(
                conn,
                &ParticipantRecord {
                    id: "p1".into(),
                    challenge_id: challenge.id.clone(),
                    user_id: "ada".into(),
                    joined_at: "2030-06-10T00:00:00+00:00".into(),
                    left_at: None,
                    opt_out: false,
                },
            )
        })
        .expect("insert participant");

    for timestamp in ["2030-06-05T08:00:00+00:00", "2030-06-15T08:00:00+00:00"] {
        api::tracking::record_completion(
            &state,
            CompletionInput {
                user_id: "ada".into(),
                habit_id: habit.clone(),
                delta: 1,
                client_timestamp: Some(timestamp.into()),
            },
        )
        .expect("record");
    }

    // June 5 falls before the join day and stays uncredited; June 15 counts.
    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "ada", "2030-06-30")
            .expect("progress");
    assert_eq!(progress.days_credited, 1);
    assert_eq!(progress.score, 1.0);
}

#[test]
fn completions_outside_the_challenge_window_never_count() {
    let (state, _dir) = create_state();
    register(&state, "ada");

    // The window closed years before today's completions.
    let challenge = api::community::challenges_create(
        &state,
        ChallengeCreateInput {
            title: "Ancient protocol".into(),
            start_day: "2019-01-01".into(),
            end_day: Some("2019-12-31".into()),
            partial_credit: None,
        },
    )
    .expect("create challenge");
    let habit = create_counter_habit(&state, "ada", 1);
    api::community::challenges_tag_habit(&state, &challenge.id, &habit).expect("tag");
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");
    complete_today(&state, "ada", &habit, 1);

    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "ada", &today_key())
            .expect("progress");
    assert_eq!(progress.score, 0.0);
}

#[test]
fn progress_for_a_non_member_is_zero_not_an_error() {
    let (state, _dir) = create_state();
    register(&state, "ada");
    register(&state, "grace");

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

    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "grace", &today_key())
            .expect("progress");
    assert_eq!(progress.score, 0.0);
    assert_eq!(progress.days_credited, 0);
}

#[test]
fn untagged_habits_stop_scoring() {
    let (state, _dir) = create_state();
    register(&state, "ada");

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
    let habit = create_counter_habit(&state, "ada", 1);
    api::community::challenges_tag_habit(&state, &challenge.id, &habit).expect("tag");
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");
    complete_today(&state, "ada", &habit, 1);

    api::community::challenges_untag_habit(&state, &challenge.id, &habit).expect("untag");
    let progress =
        api::community::challenge_progress_fetch(&state, &challenge.id, "ada", &today_key())
            .expect("progress");
    assert_eq!(progress.score, 0.0);
}
