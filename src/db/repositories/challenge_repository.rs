use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::challenge::{ChallengeRecord, ParticipantRecord};

#[derive(Debug, Clone)]
pub struct ChallengeRow {
    pub id: String,
    pub title: String,
    pub start_day: String,
    pub end_day: Option<String>,
    pub partial_credit: bool,
    pub created_at: String,
}

impl ChallengeRow {
    pub fn into_record(self) -> ChallengeRecord {
        ChallengeRecord {
            id: self.id,
            title: self.title,
            start_day: self.start_day,
            end_day: self.end_day,
            partial_credit: self.partial_credit,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for ChallengeRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            start_day: row.get("start_day")?,
            end_day: row.get("end_day")?,
            partial_credit: row.get::<_, i64>("partial_credit")? != 0,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ParticipantRow {
    pub id: String,
    pub challenge_id: String,
    pub user_id: String,
    pub joined_at: String,
    pub left_at: Option<String>,
    pub opt_out: bool,
}

impl ParticipantRow {
    pub fn into_record(self) -> ParticipantRecord {
        ParticipantRecord {
            id: self.id,
            challenge_id: self.challenge_id,
            user_id: self.user_id,
            joined_at: self.joined_at,
            left_at: self.left_at,
            opt_out: self.opt_out,
        }
    }
}

impl TryFrom<&Row<'_>> for ParticipantRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            challenge_id: row.get("challenge_id")?,
            user_id: row.get("user_id")?,
            joined_at: row.get("joined_at")?,
            left_at: row.get("left_at")?,
            opt_out: row.get::<_, i64>("opt_out")? != 0,
        })
    }
}

pub struct ChallengeRepository;

impl ChallengeRepository {
    pub fn insert(conn: &Connection, record: &ChallengeRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO challenges (id, title, start_day, end_day, partial_credit, created_at)
                VALUES (:id, :title, :start_day, :end_day, :partial_credit, :created_at)
            "#,
            named_params! {
                ":id": &record.id,
                ":title": &record.title,
                ":start_day": &record.start_day,
                ":end_day": &record.end_day,
                ":partial_credit": record.partial_credit as i64,
                ":created_at": &record.created_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<ChallengeRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, title, start_day, end_day, partial_credit, created_at
                FROM challenges
                WHERE id = :id
            "#,
        )?;

        let row = stmt
            .query_row(named_params! {":id": id}, |row| ChallengeRow::try_from(row))
            .optional()?;

        Ok(row.map(ChallengeRow::into_record))
    }

    pub fn tag_habit(
        conn: &Connection,
        challenge_id: &str,
        habit_id: &str,
        created_at: &str,
    ) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT OR IGNORE INTO challenge_habits (challenge_id, habit_id, created_at)
                VALUES (:challenge_id, :habit_id, :created_at)
            "#,
            named_params! {
                ":challenge_id": challenge_id,
                ":habit_id": habit_id,
                ":created_at": created_at,
            },
        )?;
        Ok(())
    }

    pub fn untag_habit(conn: &Connection, challenge_id: &str, habit_id: &str) -> AppResult<bool> {
        let changed = conn.execute(
            r#"
                DELETE FROM challenge_habits
                WHERE challenge_id = :challenge_id AND habit_id = :habit_id
            "#,
            named_params! {":challenge_id": challenge_id, ":habit_id": habit_id},
        )?;
        Ok(changed > 0)
    }

    pub fn habit_ids_for_challenge(conn: &Connection, challenge_id: &str) -> AppResult<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT habit_id
                FROM challenge_habits
                WHERE challenge_id = :challenge_id
                ORDER BY habit_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(named_params! {":challenge_id": challenge_id}, |row| {
                row.get::<_, String>(0)
            })?
            .map(|row| row.map_err(AppError::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn insert_participant(conn: &Connection, record: &ParticipantRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO challenge_participants (id, challenge_id, user_id, joined_at, left_at, opt_out)
                VALUES (:id, :challenge_id, :user_id, :joined_at, :left_at, :opt_out)
            "#,
            named_params! {
                ":id": &record.id,
                ":challenge_id": &record.challenge_id,
                ":user_id": &record.user_id,
                ":joined_at": &record.joined_at,
                ":left_at": &record.left_at,
                ":opt_out": record.opt_out as i64,
            },
        )?;
        Ok(())
    }

    /// The open membership interval, if any. At most one exists per
    /// (challenge, user); join rejects a second one.
    pub fn active_participation(
        conn: &Connection,
        challenge_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ParticipantRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, challenge_id, user_id, joined_at, left_at, opt_out
                FROM challenge_participants
                WHERE challenge_id = :challenge_id AND user_id = :user_id AND left_at IS NULL
            "#,
        )?;

        let row = stmt
            .query_row(
                named_params! {":challenge_id": challenge_id, ":user_id": user_id},
                |row| ParticipantRow::try_from(row),
            )
            .optional()?;

        Ok(row.map(ParticipantRow::into_record))
    }

    /// All membership intervals for one user, open and closed.
    pub fn participations_for_user(
        conn: &Connection,
        challenge_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<ParticipantRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, challenge_id, user_id, joined_at, left_at, opt_out
                FROM challenge_participants
                WHERE challenge_id = :challenge_id AND user_id = :user_id
                ORDER BY joined_at ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {":challenge_id": challenge_id, ":user_id": user_id},
                |row| ParticipantRow::try_from(row),
            )?
            .map(|row| row.map(ParticipantRow::into_record).map_err(AppError::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    /// Open memberships for a challenge: the candidate pool for its
    /// leaderboard. Earliest first join wins ties downstream.
    pub fn active_participants(
        conn: &Connection,
        challenge_id: &str,
    ) -> AppResult<Vec<ParticipantRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, challenge_id, user_id, joined_at, left_at, opt_out
                FROM challenge_participants
                WHERE challenge_id = :challenge_id AND left_at IS NULL
                ORDER BY joined_at ASC, user_id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(named_params! {":challenge_id": challenge_id}, |row| {
                ParticipantRow::try_from(row)
            })?
            .map(|row| row.map(ParticipantRow::into_record).map_err(AppError::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn close_participation(
        conn: &Connection,
        participation_id: &str,
        left_at: &str,
    ) -> AppResult<bool> {
        let changed = conn.execute(
            r#"
                UPDATE challenge_participants
                SET left_at = :left_at
                WHERE id = :id AND left_at IS NULL
            "#,
            named_params! {":id": participation_id, ":left_at": left_at},
        )?;
        Ok(changed > 0)
    }

    pub fn set_opt_out(
        conn: &Connection,
        participation_id: &str,
        opt_out: bool,
    ) -> AppResult<bool> {
        let changed = conn.execute(
            r#"
                UPDATE challenge_participants
                SET opt_out = :opt_out
                WHERE id = :id
            "#,
            named_params! {":id": participation_id, ":opt_out": opt_out as i64},
        )?;
        Ok(changed > 0)
    }

    pub fn count_all(conn: &Connection) -> AppResult<i64> {
        let total = conn.query_row("SELECT COUNT(*) FROM challenges", [], |row| row.get(0))?;
        Ok(total)
    }

    /// Challenges whose window contains `day` (no end day means open-ended).
    pub fn count_active_on(conn: &Connection, day: &str) -> AppResult<i64> {
        let total = conn.query_row(
            r#"
                SELECT COUNT(*)
                FROM challenges
                WHERE start_day <= :day AND (end_day IS NULL OR end_day >= :day)
            "#,
            named_params! {":day": day},
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
