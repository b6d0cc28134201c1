//! Injected application state.
//!
//! Preferences that outlive a dashboard view (theme, balance visibility)
//! are read and written only through [`AppContext`], which is created once at
//! startup and handed to whoever needs it.

use std::sync::Arc;

use refnet_db::queries::settings;
use refnet_types::settings::Theme;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::Result;

/// The local database shared across tasks.
pub type SharedDb = Arc<Mutex<Connection>>;

/// Accessor for persisted preferences.
#[derive(Clone)]
pub struct AppContext {
    db: SharedDb,
}

impl AppContext {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &SharedDb {
        &self.db
    }

    pub async fn theme(&self) -> Result<Theme> {
        let conn = self.db.lock().await;
        Ok(settings::theme(&conn)?)
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<Theme> {
        let conn = self.db.lock().await;
        settings::set_theme(&conn, theme)?;
        info!(theme = %theme, "theme changed");
        Ok(theme)
    }

    /// Flip between light and dark, returning the new theme.
    pub async fn toggle_theme(&self) -> Result<Theme> {
        let conn = self.db.lock().await;
        let next = settings::theme(&conn)?.toggled();
        settings::set_theme(&conn, next)?;
        info!(theme = %next, "theme toggled");
        Ok(next)
    }

    pub async fn show_balances(&self) -> Result<bool> {
        let conn = self.db.lock().await;
        Ok(settings::show_balances(&conn)?)
    }

    /// Flip balance visibility, returning the new value.
    pub async fn toggle_balances(&self) -> Result<bool> {
        let conn = self.db.lock().await;
        let next = !settings::show_balances(&conn)?;
        settings::set_show_balances(&conn, next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AppContext {
        let conn = refnet_db::open_memory().expect("open db");
        AppContext::new(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_theme_defaults_light_and_toggles() {
        let ctx = context();
        assert_eq!(ctx.theme().await.expect("theme"), Theme::Light);
        assert_eq!(ctx.toggle_theme().await.expect("toggle"), Theme::Dark);
        assert_eq!(ctx.theme().await.expect("theme"), Theme::Dark);
        ctx.set_theme(Theme::Light).await.expect("set");
        assert_eq!(ctx.theme().await.expect("theme"), Theme::Light);
    }

    #[tokio::test]
    async fn test_balances_toggle() {
        let ctx = context();
        assert!(ctx.show_balances().await.expect("read"));
        assert!(!ctx.toggle_balances().await.expect("toggle"));
        assert!(!ctx.show_balances().await.expect("read"));
    }
}
