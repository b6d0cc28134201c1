//! Persisted auth session.
//!
//! Holds at most one row. Saving replaces it; signing out clears it.

use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

/// A stored auth session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
    pub email: Option<String>,
    /// Unix seconds; `None` while the address is unverified.
    pub email_confirmed_at: Option<i64>,
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds at which `access_token` stops being accepted.
    pub expires_at: i64,
}

/// Load the persisted session, if any.
pub fn load(conn: &Connection) -> Result<Option<StoredSession>> {
    conn.query_row(
        "SELECT user_id, email, email_confirmed_at, access_token, refresh_token, expires_at
         FROM auth_session WHERE id = 1",
        [],
        |row| {
            Ok(StoredSession {
                user_id: row.get(0)?,
                email: row.get(1)?,
                email_confirmed_at: row.get(2)?,
                access_token: row.get(3)?,
                refresh_token: row.get(4)?,
                expires_at: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(DbError::Sqlite)
}

/// Save (replace) the persisted session.
pub fn save(conn: &Connection, session: &StoredSession, saved_at: i64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO auth_session
         (id, user_id, email, email_confirmed_at, access_token, refresh_token, expires_at, saved_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            session.user_id,
            session.email,
            session.email_confirmed_at,
            session.access_token,
            session.refresh_token,
            session.expires_at,
            saved_at,
        ],
    )?;
    Ok(())
}

/// Remove the persisted session. Clearing an empty table is not an error.
pub fn clear(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM auth_session", [])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    fn sample(user_id: &str) -> StoredSession {
        StoredSession {
            user_id: user_id.to_string(),
            email: Some("a@example.com".to_string()),
            email_confirmed_at: Some(1_700_000_000),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_003_600,
        }
    }

    #[test]
    fn test_empty_load() {
        let conn = test_db();
        assert!(load(&conn).expect("load").is_none());
    }

    #[test]
    fn test_save_and_load() {
        let conn = test_db();
        save(&conn, &sample("u1"), 100).expect("save");
        assert_eq!(load(&conn).expect("load"), Some(sample("u1")));
    }

    #[test]
    fn test_save_replaces_previous() {
        let conn = test_db();
        save(&conn, &sample("u1"), 100).expect("save");
        save(&conn, &sample("u2"), 200).expect("save");
        let loaded = load(&conn).expect("load").expect("row");
        assert_eq!(loaded.user_id, "u2");
    }

    #[test]
    fn test_clear() {
        let conn = test_db();
        save(&conn, &sample("u1"), 100).expect("save");
        clear(&conn).expect("clear");
        assert!(load(&conn).expect("load").is_none());
        clear(&conn).expect("clear twice");
    }
}
