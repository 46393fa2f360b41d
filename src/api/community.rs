use crate::api::{AppState, CommandResult};
use crate::models::challenge::{ChallengeCreateInput, ChallengeProgress, ChallengeRecord, ParticipantRecord};
use crate::models::leaderboard::{LeaderboardEntry, LeaderboardScope};
use crate::models::privacy::{PrivacyChoice, PrivacySettingRecord, ScopeClass};
use crate::models::user::{UserCreateInput, UserRecord};
use crate::services::day_utils;

pub fn users_register(state: &AppState, input: UserCreateInput) -> CommandResult<UserRecord> {
    Ok(state.users().register(input)?)
}

pub fn challenges_create(
    state: &AppState,
    input: ChallengeCreateInput,
) -> CommandResult<ChallengeRecord> {
    Ok(state.challenges().create_challenge(input)?)
}

pub fn challenges_tag_habit(
    state: &AppState,
    challenge_id: &str,
    habit_id: &str,
) -> CommandResult<()> {
    Ok(state.challenges().tag_habit(challenge_id, habit_id)?)
}

pub fn challenges_untag_habit(
    state: &AppState,
    challenge_id: &str,
    habit_id: &str,
) -> CommandResult<()> {
    Ok(state.challenges().untag_habit(challenge_id, habit_id)?)
}

pub fn challenges_join(
    state: &AppState,
    challenge_id: &str,
    user_id: &str,
) -> CommandResult<ParticipantRecord> {
    Ok(state.challenges().join(challenge_id, user_id)?)
}

pub fn challenges_leave(state: &AppState, challenge_id: &str, user_id: &str) -> CommandResult<()> {
    Ok(state.challenges().leave(challenge_id, user_id)?)
}

pub fn challenges_set_opt_out(
    state: &AppState,
    challenge_id: &str,
    user_id: &str,
    opt_out: bool,
) -> CommandResult<()> {
    Ok(state.challenges().set_opt_out(challenge_id, user_id, opt_out)?)
}

/// One user's score inside one challenge, as of a calendar day.
pub fn challenge_progress_fetch(
    state: &AppState,
    challenge_id: &str,
    user_id: &str,
    as_of: &str,
) -> CommandResult<ChallengeProgress> {
    let as_of = day_utils::parse_day(as_of)?;
    Ok(state.progress().progress(challenge_id, user_id, as_of)?)
}

/// Ranked, privacy-filtered board for the viewer.
pub fn leaderboard_fetch(
    state: &AppState,
    scope: LeaderboardScope,
    viewer_id: &str,
    as_of: &str,
) -> CommandResult<Vec<LeaderboardEntry>> {
    let as_of = day_utils::parse_day(as_of)?;
    Ok(state.leaderboards().rank(&scope, viewer_id, as_of)?)
}

pub fn privacy_update(
    state: &AppState,
    user_id: &str,
    scope_class: ScopeClass,
    setting: PrivacyChoice,
) -> CommandResult<()> {
    Ok(state.privacy().set_privacy(user_id, scope_class, setting)?)
}

pub fn privacy_list(state: &AppState, user_id: &str) -> CommandResult<Vec<PrivacySettingRecord>> {
    Ok(state.privacy().list_settings(user_id)?)
}
