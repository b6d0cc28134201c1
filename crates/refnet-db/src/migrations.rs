//! Forward-only schema upgrades keyed on `PRAGMA user_version`.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring the database up to [`SCHEMA_VERSION`].
///
/// Each step runs in its own transaction together with the version bump, so
/// an interrupted upgrade resumes from the last completed step.
pub fn run(conn: &Connection) -> Result<()> {
    let found = user_version(conn)?;
    if found > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "database is at v{found}, this build only knows v{SCHEMA_VERSION}"
        )));
    }

    for (index, sql) in schema::STEPS.iter().enumerate().skip(found as usize) {
        let target = index as u32 + 1;
        tracing::info!(from = target - 1, to = target, "upgrading local schema");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .map_err(|e| DbError::Migration(format!("step to v{target}: {e}")))?;
        tx.pragma_update(None, "user_version", target)?;
        tx.commit()?;
    }
    Ok(())
}
