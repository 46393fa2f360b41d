use std::sync::Arc;

use chrono::Utc;
use habitarena_core::api::{self, AppState};
use habitarena_core::db::DbPool;
use habitarena_core::models::challenge::ChallengeCreateInput;
use habitarena_core::models::habit::{HabitCreateInput, HabitKind};
use habitarena_core::models::leaderboard::{LeaderboardScope, ANONYMOUS_DISPLAY_NAME};
use habitarena_core::models::ledger::CompletionInput;
use habitarena_core::models::privacy::{PrivacyChoice, ScopeClass};
use habitarena_core::models::user::UserCreateInput;
use habitarena_core::services::directory::StaticDirectory;
use tempfile::tempdir;

fn create_state() -> (AppState, Arc<StaticDirectory>, tempfile::TempDir) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("boards.sqlite")).expect("db pool");
    let directory = Arc::new(StaticDirectory::new());
    let state = AppState::new(pool, directory.clone(), None).expect("app state");
    (state, directory, dir)
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

/// One simple habit completed `days` times on distinct past-free days, i.e.
/// today plus nothing else; callers differentiate users by habit count.
fn score_points(state: &AppState, user: &str, habits: usize) {
    for _ in 0..habits {
        let habit = api::tracking::habits_create(
            state,
            HabitCreateInput {
                owner_id: user.into(),
                kind: HabitKind::Simple,
                target_count: None,
                schedule: None,
                time_zone: "UTC".into(),
                overflow_policy: None,
            },
        )
        .expect("create habit");
        api::tracking::record_completion(
            state,
            CompletionInput {
                user_id: user.into(),
                habit_id: habit.id,
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
fn global_ranks_are_dense_and_anonymous_keeps_rank_and_score() {
    let (state, _directory, _dir) = create_state();
    for id in ["ada", "grace", "linus"] {
        register(&state, id);
    }
    score_points(&state, "ada", 3);
    score_points(&state, "grace", 2);
    score_points(&state, "linus", 1);

    api::community::privacy_update(&state, "ada", ScopeClass::Global, PrivacyChoice::AnonymousScore)
        .expect("privacy");

    let board =
        api::community::leaderboard_fetch(&state, LeaderboardScope::Global, "grace", &today_key())
            .expect("board");

    assert_eq!(board.len(), 3);
    assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);

    // Ada leads, masked: rank and score intact, identity gone.
    assert_eq!(board[0].score, 3.0);
    assert_eq!(board[0].user_id, None);
    assert_eq!(board[0].display_name, ANONYMOUS_DISPLAY_NAME);

    assert_eq!(board[1].user_id.as_deref(), Some("grace"));
    assert!(board[1].is_viewer);
    assert_eq!(board[2].user_id.as_deref(), Some("linus"));
}

#[test]
fn hidden_user_is_absent_for_others_but_sees_their_own_row() {
    let (state, _directory, _dir) = create_state();
    register(&state, "ada");
    register(&state, "grace");
    score_points(&state, "ada", 2);

    api::community::privacy_update(&state, "ada", ScopeClass::Global, PrivacyChoice::Hidden)
        .expect("privacy");

    let for_grace =
        api::community::leaderboard_fetch(&state, LeaderboardScope::Global, "grace", &today_key())
            .expect("board");
    assert!(for_grace.iter().all(|e| e.user_id.as_deref() != Some("ada")));
    // Grace still gets dense ranks over the remaining rows.
    assert_eq!(for_grace.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1]);

    let for_ada =
        api::community::leaderboard_fetch(&state, LeaderboardScope::Global, "ada", &today_key())
            .expect("board");
    let own = for_ada.iter().find(|e| e.is_viewer).expect("own row");
    assert_eq!(own.user_id.as_deref(), Some("ada"));
    assert_eq!(own.score, 2.0);
}

#[test]
fn friends_board_contains_only_mutual_friends_plus_viewer() {
    let (state, directory, _dir) = create_state();
    for id in ["ada", "grace", "linus"] {
        register(&state, id);
    }
    directory.add_friendship("ada", "grace");
    // Linus never accepted the request back.
    directory.add_friend_edge("ada", "linus");

    let board =
        api::community::leaderboard_fetch(&state, LeaderboardScope::Friends, "ada", &today_key())
            .expect("board");
    let ids: Vec<_> = board.iter().filter_map(|e| e.user_id.as_deref()).collect();
    assert!(ids.contains(&"ada"));
    assert!(ids.contains(&"grace"));
    assert!(!ids.contains(&"linus"));
}

#[test]
fn organization_board_is_scoped_to_the_viewers_org() {
    let (state, directory, _dir) = create_state();
    for id in ["ada", "grace", "linus"] {
        register(&state, id);
    }
    directory.assign_organization("ada", "acme");
    directory.assign_organization("grace", "acme");
    directory.assign_organization("linus", "globex");

    let board = api::community::leaderboard_fetch(
        &state,
        LeaderboardScope::Organization,
        "ada",
        &today_key(),
    )
    .expect("board");
    let ids: Vec<_> = board.iter().filter_map(|e| e.user_id.as_deref()).collect();
    assert!(ids.contains(&"ada"));
    assert!(ids.contains(&"grace"));
    assert!(!ids.contains(&"linus"));
}

#[test]
fn challenge_board_excludes_opted_out_rows_except_their_own_view() {
    let (state, _directory, _dir) = create_state();
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
    api::community::challenges_join(&state, &challenge.id, "ada").expect("join");
    api::community::challenges_join(&state, &challenge.id, "grace").expect("join");
    api::community::challenges_set_opt_out(&state, &challenge.id, "grace", true).expect("opt out");

    let scope = LeaderboardScope::Challenge(challenge.id.clone());
    let for_ada = api::community::leaderboard_fetch(&state, scope.clone(), "ada", &today_key())
        .expect("board");
    assert!(for_ada.iter().all(|e| e.user_id.as_deref() != Some("grace")));

    // Even with ada's fetch cached, grace still sees her own row.
    let for_grace =
        api::community::leaderboard_fetch(&state, scope, "grace", &today_key()).expect("board");
    assert!(for_grace
        .iter()
        .any(|e| e.user_id.as_deref() == Some("grace")));
}

#[test]
fn new_appends_show_up_in_the_next_fetch() {
    let (state, _directory, _dir) = create_state();
    register(&state, "ada");
    score_points(&state, "ada", 1);

    let before =
        api::community::leaderboard_fetch(&state, LeaderboardScope::Global, "ada", &today_key())
            .expect("board");
    assert_eq!(before[0].score, 1.0);

    // The append bumps the ledger generation, so the cached scores are stale.
    score_points(&state, "ada", 1);
    let after =
        api::community::leaderboard_fetch(&state, LeaderboardScope::Global, "ada", &today_key())
            .expect("board");
    assert_eq!(after[0].score, 2.0);
}
