use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{session::{self, FlashLevel}, AppResult, AppState};

#[debug_handler(state = AppState)]
pub async fn logout(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    if session::current_user(&session, &db_pool).await?.is_none() {
        return Ok(session::login_redirect("/logout"));
    }

    session::log_out(&session).await?;
    session::flash(&session, FlashLevel::Success, "You have been logged out...").await?;
    Ok(Redirect::to("/login").into_response())
}
