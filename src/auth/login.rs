use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::{info, warn};

use crate::{db, include_res, res, session::{self, FlashLevel}, AppResult, AppState};

use super::verify_password;

#[derive(Deserialize)]
pub(crate) struct LoginQuery {
    pub(crate) next: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

#[debug_handler(state = AppState)]
pub async fn login_page(
    Query(LoginQuery { next }): Query<LoginQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let viewer = session::current_user(&session, &db_pool).await?;
    let flashes = session::take_flashes(&session).await?;

    let content = include_res!(str, "/pages/login.html")
        .replace("{next}", &res::escape(session::safe_next(next.as_deref())));

    Ok(res::page("Login", viewer.as_ref(), &flashes, &content).into_response())
}

#[debug_handler(state = AppState)]
pub async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Form(LoginForm { username, password, next }): Form<LoginForm>,
) -> AppResult<Response> {
    let username = username.trim();

    let user = match db::find_user_by_username(&db_pool, username).await? {
        Some(user) => {
            let hash = user.password_hash.clone();
            let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash).unwrap_or(false)).await?;
            matches.then_some(user)
        }
        None => None,
    };

    let Some(user) = user else {
        warn!("failed login for @{username}");
        session::flash(&session, FlashLevel::Error, "Error logging in. Please try again...").await?;
        return Ok(Redirect::to("/login").into_response());
    };

    session::log_in(&session, &user).await?;
    session::flash(&session, FlashLevel::Success, "Login successful").await?;
    info!("welcome @{}#{}", user.username, user.id);

    Ok(Redirect::to(session::safe_next(next.as_deref())).into_response())
}
