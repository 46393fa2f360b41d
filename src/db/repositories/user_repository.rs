use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::user::UserRecord;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_record(self) -> UserRecord {
        UserRecord {
            id: self.id,
            display_name: self.display_name,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for UserRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            display_name: row.get("display_name")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct UserRepository;

impl UserRepository {
    pub fn insert(conn: &Connection, record: &UserRecord) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO users (id, display_name, created_at)
                VALUES (:id, :display_name, :created_at)
            "#,
            named_params! {
                ":id": &record.id,
                ":display_name": &record.display_name,
                ":created_at": &record.created_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<UserRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, display_name, created_at
                FROM users
                WHERE id = :id
            "#,
        )?;

        let row = stmt
            .query_row(named_params! {":id": id}, |row| UserRow::try_from(row))
            .optional()?;

        Ok(row.map(UserRow::into_record))
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<UserRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, display_name, created_at
                FROM users
                ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| UserRow::try_from(row))?
            .map(|row| row.map(UserRow::into_record).map_err(AppError::from))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(rows)
    }

    pub fn count(conn: &Connection) -> AppResult<i64> {
        let total = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(total)
    }
}
