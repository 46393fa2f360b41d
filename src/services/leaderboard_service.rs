use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, warn};

use crate::db::repositories::challenge_repository::ChallengeRepository;
use crate::db::repositories::habit_repository::HabitRepository;
use crate::db::repositories::ledger_repository::LedgerRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::leaderboard::{LeaderboardEntry, LeaderboardScope, ANONYMOUS_DISPLAY_NAME};
use crate::models::privacy::Visibility;
use crate::models::user::UserRecord;
use crate::services::challenge_progress_service::ChallengeProgressService;
use crate::services::day_utils;
use crate::services::directory::{are_mutual_friends, Directory};
use crate::services::habit_state_service::projected_count;
use crate::services::privacy_service::{resolve_visibility, PrivacyService};

const CACHE_TTL_SECONDS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    scope: LeaderboardScope,
    /// Org id or viewer id when the candidate pool depends on the viewer.
    population: Option<String>,
    as_of: NaiveDate,
}

#[derive(Debug, Clone)]
struct ScoredCandidate {
    user_id: String,
    display_name: String,
    /// Join timestamp (challenge scope) or account creation timestamp.
    tie_break: String,
    score: f64,
    /// Challenge-scope opt-out flag; filtered per viewer, never cached away.
    opt_out: bool,
}

#[derive(Clone)]
struct CachedScores {
    candidates: Vec<ScoredCandidate>,
    cached_at: DateTime<Utc>,
    generation: u64,
}

/// Produces ranked, privacy-filtered views. Scores may be served from a
/// short-lived cache (one computation cycle of lag is acceptable); privacy
/// is resolved live on every request and never cached per entry.
pub struct LeaderboardService {
    db: DbPool,
    progress: Arc<ChallengeProgressService>,
    privacy: Arc<PrivacyService>,
    directory: Arc<dyn Directory>,
    cache: RwLock<HashMap<CacheKey, CachedScores>>,
    cache_ttl: Duration,
    ledger_generation: Arc<AtomicU64>,
}

impl LeaderboardService {
    pub fn new(
        db: DbPool,
        progress: Arc<ChallengeProgressService>,
        privacy: Arc<PrivacyService>,
        directory: Arc<dyn Directory>,
        ledger_generation: Arc<AtomicU64>,
    ) -> Self {
        Self {
            db,
            progress,
            privacy,
            directory,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::seconds(CACHE_TTL_SECONDS),
            ledger_generation,
        }
    }

    pub fn rank(
        &self,
        scope: &LeaderboardScope,
        viewer_id: &str,
        as_of: NaiveDate,
    ) -> AppResult<Vec<LeaderboardEntry>> {
        if self
            .db
            .with_connection(|conn| UserRepository::find_by_id(conn, viewer_id))?
            .is_none()
        {
            return Err(AppError::validation_with_details(
                "未知的用户",
                json!({"userId": viewer_id}),
            ));
        }

        let candidates = self.scored_candidates(scope, viewer_id, as_of)?;
        let scope_class = scope.scope_class();

        // Privacy is never cached: every request re-resolves each subject
        // against the viewer under current settings and the live graph.
        let mut visible: Vec<(ScoredCandidate, Visibility)> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            // Opted-out rows stay off the board for everyone but themselves.
            if candidate.opt_out && candidate.user_id != viewer_id {
                continue;
            }
            let visibility = if candidate.user_id == viewer_id {
                Visibility::Full
            } else {
                let setting = self
                    .privacy
                    .effective_setting(&candidate.user_id, scope_class)?;
                let mutual =
                    are_mutual_friends(self.directory.as_ref(), viewer_id, &candidate.user_id);
                resolve_visibility(viewer_id, &candidate.user_id, scope_class, setting, mutual)
            };
            if visibility == Visibility::Hidden {
                continue;
            }
            visible.push((candidate, visibility));
        }

        // Total order: score desc, earliest join/creation, then the stable
        // id. Ranks are therefore always a strict 1..N permutation.
        visible.sort_by(|(a, _), (b, _)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.tie_break.cmp(&b.tie_break))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let entries = visible
            .into_iter()
            .enumerate()
            .map(|(index, (candidate, visibility))| {
                let is_viewer = candidate.user_id == viewer_id;
                let masked = visibility == Visibility::Anonymous && !is_viewer;
                LeaderboardEntry {
                    rank: index as i64 + 1,
                    user_id: if masked { None } else { Some(candidate.user_id) },
                    display_name: if masked {
                        ANONYMOUS_DISPLAY_NAME.to_string()
                    } else {
                        candidate.display_name
                    },
                    score: candidate.score,
                    is_viewer,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            target: "app::leaderboard",
            viewer_id = %viewer_id,
            entries = entries.len(),
            "leaderboard ranked"
        );
        Ok(entries)
    }

    /// Invalidation hook for tests and hosts that want a fresh computation
    /// regardless of TTL.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    fn scored_candidates(
        &self,
        scope: &LeaderboardScope,
        viewer_id: &str,
        as_of: NaiveDate,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let population = match scope {
            LeaderboardScope::Organization => Some(
                self.directory
                    .organization_of(viewer_id)
                    .unwrap_or_else(|| format!("solo:{viewer_id}")),
            ),
            LeaderboardScope::Friends => Some(viewer_id.to_string()),
            LeaderboardScope::Global | LeaderboardScope::Challenge(_) => None,
        };
        let key = CacheKey {
            scope: scope.clone(),
            population,
            as_of,
        };

        let generation = self.ledger_generation.load(Ordering::SeqCst);
        {
            let cache = self
                .cache
                .read()
                .map_err(|_| AppError::other("排行榜缓存锁中毒"))?;
            if let Some(entry) = cache.get(&key) {
                if entry.generation == generation
                    && Utc::now() - entry.cached_at < self.cache_ttl
                {
                    debug!(target: "app::leaderboard", "score cache hit");
                    return Ok(entry.candidates.clone());
                }
            }
        }

        // A snapshot observed mid-write is retried once before surfacing.
        let candidates = match self.compute_candidates(scope, viewer_id, as_of) {
            Ok(candidates) => candidates,
            Err(err) if err.is_retryable() => {
                warn!(
                    target: "app::leaderboard",
                    error = %err,
                    "score computation hit a stale snapshot, retrying"
                );
                self.compute_candidates(scope, viewer_id, as_of)?
            }
            Err(err) => return Err(err),
        };

        let mut cache = self
            .cache
            .write()
            .map_err(|_| AppError::other("排行榜缓存锁中毒"))?;
        cache.insert(
            key,
            CachedScores {
                candidates: candidates.clone(),
                cached_at: Utc::now(),
                generation,
            },
        );
        Ok(candidates)
    }

    fn compute_candidates(
        &self,
        scope: &LeaderboardScope,
        viewer_id: &str,
        as_of: NaiveDate,
    ) -> AppResult<Vec<ScoredCandidate>> {
        match scope {
            LeaderboardScope::Challenge(challenge_id) => {
                self.challenge_candidates(challenge_id, as_of)
            }
            LeaderboardScope::Global => {
                let users = self.db.with_connection(UserRepository::list_all)?;
                self.platform_candidates(users, as_of)
            }
            LeaderboardScope::Organization => {
                let organization = self.directory.organization_of(viewer_id);
                let users = self.db.with_connection(UserRepository::list_all)?;
                let members = users
                    .into_iter()
                    .filter(|user| {
                        user.id == viewer_id
                            || (organization.is_some()
                                && self.directory.organization_of(&user.id) == organization)
                    })
                    .collect();
                self.platform_candidates(members, as_of)
            }
            LeaderboardScope::Friends => {
                let users = self.db.with_connection(UserRepository::list_all)?;
                let members = users
                    .into_iter()
                    .filter(|user| {
                        user.id == viewer_id
                            || are_mutual_friends(self.directory.as_ref(), viewer_id, &user.id)
                    })
                    .collect();
                self.platform_candidates(members, as_of)
            }
        }
    }

    fn challenge_candidates(
        &self,
        challenge_id: &str,
        as_of: NaiveDate,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let participants = self.db.with_connection(|conn| {
            if ChallengeRepository::find_by_id(conn, challenge_id)?.is_none() {
                return Err(AppError::validation_with_details(
                    "未知的挑战",
                    json!({"challengeId": challenge_id}),
                ));
            }
            ChallengeRepository::active_participants(conn, challenge_id)
        })?;

        let mut candidates = Vec::with_capacity(participants.len());
        for participant in participants {
            let Some(user) = self
                .db
                .with_connection(|conn| UserRepository::find_by_id(conn, &participant.user_id))?
            else {
                continue;
            };
            let progress = self
                .progress
                .progress(challenge_id, &participant.user_id, as_of)?;
            candidates.push(ScoredCandidate {
                user_id: participant.user_id,
                display_name: user.display_name,
                tie_break: participant.joined_at,
                score: progress.score,
                opt_out: participant.opt_out,
            });
        }
        Ok(candidates)
    }

    fn platform_candidates(
        &self,
        users: Vec<UserRecord>,
        as_of: NaiveDate,
    ) -> AppResult<Vec<ScoredCandidate>> {
        let through = day_utils::format_day(as_of);
        self.db.with_connection(|conn| {
            let mut candidates = Vec::with_capacity(users.len());
            for user in users {
                let score = platform_score(conn, &user.id, &through)?;
                candidates.push(ScoredCandidate {
                    user_id: user.id,
                    display_name: user.display_name,
                    tie_break: user.created_at,
                    score,
                    opt_out: false,
                });
            }
            Ok(candidates)
        })
    }
}

/// Cross-challenge score: the number of fully complete (habit, day) pairs
/// across all of the user's habits, deleted ones included (history stays).
fn platform_score(
    conn: &rusqlite::Connection,
    user_id: &str,
    through: &str,
) -> AppResult<f64> {
    let habits = HabitRepository::list_for_owner(conn, user_id)?;
    let by_id: HashMap<&str, _> = habits
        .iter()
        .map(|habit| (habit.id.as_str(), habit))
        .collect();

    let mut complete_days = 0_i64;
    for total in LedgerRepository::day_totals_for_user(conn, user_id, through)? {
        let Some(habit) = by_id.get(total.habit_id.as_str()) else {
            continue;
        };
        if projected_count(habit, total.net) == habit.target_count {
            complete_days += 1;
        }
    }
    Ok(complete_days as f64)
}
