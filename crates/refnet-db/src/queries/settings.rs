//! Client preferences stored as key/value rows.
//!
//! Only two keys exist. Values that fail to parse read as the default, so a
//! hand-edited database never blocks startup.

use rusqlite::{Connection, OptionalExtension};
use refnet_types::settings::Theme;

use crate::Result;

pub const THEME_KEY: &str = "theme";
pub const SHOW_BALANCES_KEY: &str = "show_balances";

/// Raw value of a key, `None` when unset.
pub fn raw(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?)
}

fn put(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

pub fn theme(conn: &Connection) -> Result<Theme> {
    Ok(raw(conn, THEME_KEY)?
        .and_then(|v| v.parse().ok())
        .unwrap_or_default())
}

pub fn set_theme(conn: &Connection, theme: Theme) -> Result<()> {
    put(conn, THEME_KEY, theme.as_str())
}

/// Whether money values are shown. Defaults to shown.
pub fn show_balances(conn: &Connection) -> Result<bool> {
    Ok(match raw(conn, SHOW_BALANCES_KEY)?.as_deref() {
        Some("false") | Some("0") => false,
        _ => true,
    })
}

pub fn set_show_balances(conn: &Connection, show: bool) -> Result<()> {
    put(conn, SHOW_BALANCES_KEY, if show { "true" } else { "false" })
}
