use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::User;
use crate::tree::Collection;

/// Loads and saves whole user aggregates. A save either writes the complete
/// aggregate or nothing, and fails with `Conflict` when the stored copy has
/// moved on since it was loaded.
pub trait AggregateStore {
    fn load(&self, user_id: &str) -> Result<User>;
    fn save(&self, user: &mut User) -> Result<()>;
}

/// Account lookups needed for registration and login.
pub trait Accounts {
    fn insert_user(&self, user: &User) -> Result<()>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                classes TEXT NOT NULL DEFAULT '[]',
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            "#,
        )?;

        // Run migrations for existing databases
        self.migrate()?;

        Ok(())
    }

    // Databases created before optimistic versioning lack the column
    fn migrate(&self) -> Result<()> {
        let has_version: bool = self.conn.prepare("SELECT version FROM users LIMIT 1").is_ok();

        if !has_version {
            self.conn
                .execute_batch("ALTER TABLE users ADD COLUMN version INTEGER NOT NULL DEFAULT 0;")?;
        }

        Ok(())
    }

    pub fn user_exists(&self, username: &str, email: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1 OR email = ?2",
                params![username.trim(), email.trim()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.find_user("id = ?1", id)
    }

    fn find_user(&self, predicate: &str, value: &str) -> Result<Option<User>> {
        let query = format!(
            r#"
            SELECT id, username, email, password_hash, classes, version, created_at, updated_at
            FROM users
            WHERE {}
            "#,
            predicate
        );

        let row = self
            .conn
            .query_row(&query, params![value], |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                    classes: row.get(4)?,
                    version: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .optional()?;

        row.map(UserRow::into_user).transpose()
    }

    pub fn count_users(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl Accounts for Database {
    fn insert_user(&self, user: &User) -> Result<()> {
        if self.user_exists(&user.username, &user.email)? {
            return Err(duplicate_user());
        }
        self.insert_row(user)?;

        debug!(user_id = %user.id, username = %user.username, "Inserted user");
        Ok(())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user("email = ?1", email.trim())
    }
}

impl Database {
    // A registration racing past the existence check still trips the UNIQUE columns
    fn insert_row(&self, user: &User) -> Result<()> {
        let classes = serde_json::to_string(&user.classes)?;
        let inserted = self.conn.execute(
            r#"
            INSERT INTO users (id, username, email, password_hash, classes, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                classes,
                user.version,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(duplicate_user())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn duplicate_user() -> Error {
    Error::Conflict("User already exists with this username or email".into())
}

impl AggregateStore for Database {
    fn load(&self, user_id: &str) -> Result<User> {
        self.find_user_by_id(user_id)?
            .ok_or_else(|| Error::not_found("User"))
    }

    fn save(&self, user: &mut User) -> Result<()> {
        let now = Utc::now();
        let rows = self.conn.execute(
            r#"
            UPDATE users
            SET username = ?1,
                email = ?2,
                password_hash = ?3,
                classes = ?4,
                version = version + 1,
                updated_at = ?5
            WHERE id = ?6 AND version = ?7
            "#,
            params![
                user.username,
                user.email,
                user.password_hash,
                serde_json::to_string(&user.classes)?,
                now.to_rfc3339(),
                user.id,
                user.version,
            ],
        )?;

        if rows == 0 {
            return Err(if self.find_user_by_id(&user.id)?.is_some() {
                Error::Conflict("the user was modified concurrently; reload and retry".into())
            } else {
                Error::not_found("User")
            });
        }

        user.version += 1;
        user.updated_at = now;
        debug!(user_id = %user.id, version = user.version, "Saved user aggregate");
        Ok(())
    }
}

struct UserRow {
    id: String,
    username: String,
    email: String,
    password_hash: String,
    classes: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let classes: Collection<_> = serde_json::from_str(&self.classes)?;
        Ok(User {
            id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            classes,
            version: self.version,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("bad timestamp '{s}': {e}")))
}
