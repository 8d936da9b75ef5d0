pub mod auth;
pub mod config;
pub mod db;
pub mod forms;
pub mod index;
pub mod moderation;
pub mod profiles;
pub mod res;
pub mod rooms;
pub mod search;
pub mod session;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{Html, IntoResponse, Response}, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};
use tracing::error;

use config::Config;
use moderation::Moderation;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub moderation: Moderation,
    pub config: Arc<Config>,
}

/// Builds the full application: routes, sessions and request tracing.
pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(state.config.session_inactivity));

    Router::new()
        .route("/", get(index::home))
        .route("/health", get(|| async { "ok" }))
        .merge(auth::router())
        .nest("/r", rooms::router())
        .nest("/m", rooms::message_router())
        .nest("/p", profiles::router())
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(sqlx::Error::RowNotFound) = self.0.downcast_ref::<sqlx::Error>() {
            return res::not_found();
        }

        error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(include_res!(str, "/pages/error.html")),
        )
            .into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(bcrypt::BcryptError);
apperr_impl!(tokio::task::JoinError);
apperr_impl!(moderation::ModerationError);
