use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::{AppError, AppResult};
use crate::models::ledger::{CompletionEventRecord, DayTotal};

#[derive(Debug, Clone)]
pub struct CompletionEventRow {
    pub seq: i64,
    pub id: String,
    pub habit_id: String,
    pub user_id: String,
    pub day: String,
    pub delta: i64,
    pub recorded_at: String,
}

impl CompletionEventRow {
    pub fn into_record(self) -> CompletionEventRecord {
        CompletionEventRecord {
            seq: self.seq,
            id: self.id,
            habit_id: self.habit_id,
            user_id: self.user_id,
            day: self.day,
            delta: self.delta,
            recorded_at: self.recorded_at,
        }
    }
}

impl TryFrom<&Row<'_>> for CompletionEventRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            seq: row.get("seq")?,
            id: row.get("id")?,
            habit_id: row.get("habit_id")?,
            user_id: row.get("user_id")?,
            day: row.get("day")?,
            delta: row.get("delta")?,
            recorded_at: row.get("recorded_at")?,
        })
    }
}

pub struct LedgerRepository;

impl LedgerRepository {
    /// Appends one event and returns its ledger sequence number. The ledger
    /// is insert-only; there is no update or delete path.
    pub fn append(
        conn: &Connection,
        id: &str,
        habit_id: &str,
        user_id: &str,
        day: &str,
        delta: i64,
        recorded_at: &str,
    ) -> AppResult<i64> {
        conn.execute(
            r#"
                INSERT INTO completion_events (id, habit_id, user_id, day, delta, recorded_at)
                VALUES (:id, :habit_id, :user_id, :day, :delta, :recorded_at)
            "#,
            named_params! {
                ":id": id,
                ":habit_id": habit_id,
                ":user_id": user_id,
                ":day": day,
                ":delta": delta,
                ":recorded_at": recorded_at,
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Net accepted delta for one (habit, day). Zero when no events exist.
    pub fn net_count(conn: &Connection, habit_id: &str, day: &str) -> AppResult<i64> {
        let net = conn.query_row(
            r#"
                SELECT COALESCE(SUM(delta), 0)
                FROM completion_events
                WHERE habit_id = :habit_id AND day = :day
            "#,
            named_params! {":habit_id": habit_id, ":day": day},
            |row| row.get(0),
        )?;
        Ok(net)
    }

    pub fn events_for_day(
        conn: &Connection,
        habit_id: &str,
        day: &str,
    ) -> AppResult<Vec<CompletionEventRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT seq, id, habit_id, user_id, day, delta, recorded_at
                FROM completion_events
                WHERE habit_id = :habit_id AND day = :day
                ORDER BY seq ASC
            "#,
        )?;

        let rows = stmt
            .query_map(named_params! {":habit_id": habit_id, ":day": day}, |row| {
                CompletionEventRow::try_from(row)
            })?
            .map(|row| {
                row.map(CompletionEventRow::into_record)
                    .map_err(AppError::from)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// Per-day net totals for one habit up to `through` inclusive. `after`
    /// bounds the scan on the left (exclusive) so incremental streak
    /// extension does not rescan full history.
    pub fn day_totals_for_habit(
        conn: &Connection,
        habit_id: &str,
        after: Option<&str>,
        through: &str,
    ) -> AppResult<Vec<DayTotal>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT habit_id, day, SUM(delta) AS net
                FROM completion_events
                WHERE habit_id = :habit_id
                  AND day <= :through
                  AND (:after IS NULL OR day > :after)
                GROUP BY day
                ORDER BY day ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":habit_id": habit_id, ":after": after, ":through": through},
                day_total_from_row,
            )?
            .map(|row| row.map_err(AppError::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// Per-(habit, day) net totals across all of one user's habits up to
    /// `through` inclusive. Feeds the platform-wide leaderboard score.
    pub fn day_totals_for_user(
        conn: &Connection,
        user_id: &str,
        through: &str,
    ) -> AppResult<Vec<DayTotal>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT habit_id, day, SUM(delta) AS net
                FROM completion_events
                WHERE user_id = :user_id AND day <= :through
                GROUP BY habit_id, day
                ORDER BY habit_id ASC, day ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":user_id": user_id, ":through": through},
                day_total_from_row,
            )?
            .map(|row| row.map_err(AppError::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn count_all(conn: &Connection) -> AppResult<i64> {
        let total = conn.query_row("SELECT COUNT(*) FROM completion_events", [], |row| {
            row.get(0)
        })?;
        Ok(total)
    }

    pub fn count_for_day(conn: &Connection, day: &str) -> AppResult<i64> {
        let total = conn.query_row(
            "SELECT COUNT(*) FROM completion_events WHERE day = :day",
            named_params! {":day": day},
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

fn day_total_from_row(row: &Row<'_>) -> Result<DayTotal, rusqlite::Error> {
    Ok(DayTotal {
        habit_id: row.get("habit_id")?,
        day: row.get("day")?,
        net: row.get("net")?,
    })
}
