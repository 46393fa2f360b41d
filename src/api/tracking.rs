use serde::Serialize;

use crate::api::{AppState, CommandResult};
use crate::error::AppError;
use crate::models::habit::{HabitCreateInput, HabitDayState, HabitRecord};
use crate::models::ledger::CompletionInput;
use crate::services::day_utils;

/// Appends one completion event and returns the habit's projected state for
/// the event's (frozen) local day.
pub fn record_completion(state: &AppState, input: CompletionInput) -> CommandResult<HabitDayState> {
    Ok(state.ledger().append(input)?)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitStateView {
    #[serde(flatten)]
    pub day_state: HabitDayState,
    pub streak: u32,
}

/// Projected count plus the current streak as of `day`. Callers only read
/// their own habits, mirroring the ownership check on the write path.
pub fn get_habit_state(
    state: &AppState,
    user_id: &str,
    habit_id: &str,
    day: &str,
) -> CommandResult<HabitStateView> {
    let day = day_utils::parse_day(day)?;
    let habit = state.habits().get_habit(habit_id)?;
    if habit.owner_id != user_id {
        return Err(AppError::validation_with_details(
            "只能查看自己的习惯状态",
            serde_json::json!({"habitId": habit_id, "userId": user_id}),
        )
        .into());
    }
    let day_state = state.habit_state().project_for(&habit, day)?;
    let streak = state.habit_state().streak(habit_id, day)?;
    Ok(HabitStateView { day_state, streak })
}

pub fn habits_create(state: &AppState, input: HabitCreateInput) -> CommandResult<HabitRecord> {
    Ok(state.habits().create_habit(input)?)
}

pub fn habits_list(state: &AppState, owner_id: &str) -> CommandResult<Vec<HabitRecord>> {
    Ok(state.habits().list_habits(owner_id)?)
}

pub fn habits_delete(state: &AppState, habit_id: &str, requester_id: &str) -> CommandResult<()> {
    Ok(state.habits().delete_habit(habit_id, requester_id)?)
}
