use crate::api::{AppState, CommandResult};
use crate::models::stats::PlatformStats;

pub fn platform_stats_fetch(state: &AppState) -> CommandResult<PlatformStats> {
    Ok(state.stats().platform_stats()?)
}
