use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{db::{self, User}, AppResult};

pub const USER_ID: &str = "user_id";
pub const FLASHES: &str = "flashes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Error,
}

/// A one-shot notice shown on the next rendered page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub text: String,
}

pub async fn flash(session: &Session, level: FlashLevel, text: impl Into<String>) -> AppResult<()> {
    let mut flashes: Vec<Flash> = session.get(FLASHES).await?.unwrap_or_default();
    flashes.push(Flash { level, text: text.into() });
    session.insert(FLASHES, flashes).await?;
    Ok(())
}

pub async fn take_flashes(session: &Session) -> AppResult<Vec<Flash>> {
    Ok(session.remove::<Vec<Flash>>(FLASHES).await?.unwrap_or_default())
}

/// Resolves the logged in user, dropping a stale id whose user is gone.
pub async fn current_user(session: &Session, db_pool: &SqlitePool) -> AppResult<Option<User>> {
    let Some(user_id) = session.get::<String>(USER_ID).await? else {
        return Ok(None);
    };

    let user = db::find_user(db_pool, &user_id).await?;
    if user.is_none() {
        session.remove::<String>(USER_ID).await?;
    }
    Ok(user)
}

pub async fn log_in(session: &Session, user: &User) -> AppResult<()> {
    session.cycle_id().await?;
    session.insert(USER_ID, &user.id).await?;
    Ok(())
}

pub async fn log_out(session: &Session) -> AppResult<()> {
    session.remove::<String>(USER_ID).await?;
    session.cycle_id().await?;
    Ok(())
}

pub fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("/login?next={next}")).into_response()
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') => next,
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_rejects_offsite_targets() {
        assert_eq!(safe_next(Some("/r/abc")), "/r/abc");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
