//! SQL schema, one step per schema version.
//!
//! `STEPS[n]` moves a database from version `n` to `n + 1`. Steps are only
//! ever appended.

/// v1: preferences with their defaults.
const V1_SETTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR IGNORE INTO settings (key, value) VALUES ('theme', 'light');
INSERT OR IGNORE INTO settings (key, value) VALUES ('show_balances', 'true');
"#;

/// v2: the persisted auth session (at most one signed-in identity).
const V2_AUTH_SESSION: &str = r#"
CREATE TABLE IF NOT EXISTS auth_session (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    user_id TEXT NOT NULL,
    email TEXT,
    email_confirmed_at INTEGER,
    access_token TEXT NOT NULL,
    refresh_token TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    saved_at INTEGER NOT NULL
);
"#;

pub const STEPS: &[&str] = &[V1_SETTINGS, V2_AUTH_SESSION];
