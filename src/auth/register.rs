use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::info;

use crate::{db::{self, NewUser}, forms::{FieldErrors, SignUpForm}, include_res, res, session::{self, FlashLevel}, AppResult, AppState};

use super::hash_password;

const USERNAME_TAKEN: &str = "A user with that username already exists.";

async fn render_form(
    db_pool: &SqlitePool,
    session: &Session,
    form: &SignUpForm,
    errors: &FieldErrors,
) -> AppResult<Response> {
    let viewer = session::current_user(session, db_pool).await?;
    let flashes = session::take_flashes(session).await?;

    let content = include_res!(str, "/pages/register.html")
        .replace("{username_errors}", &errors.html("username"))
        .replace("{first_name_errors}", &errors.html("first_name"))
        .replace("{last_name_errors}", &errors.html("last_name"))
        .replace("{email_errors}", &errors.html("email"))
        .replace("{password1_errors}", &errors.html("password1"))
        .replace("{password2_errors}", &errors.html("password2"))
        .replace("{username}", &res::escape(&form.username))
        .replace("{first_name}", &res::escape(&form.first_name))
        .replace("{last_name}", &res::escape(&form.last_name))
        .replace("{email}", &res::escape(&form.email));

    Ok(res::page("Register", viewer.as_ref(), &flashes, &content).into_response())
}

#[debug_handler(state = AppState)]
pub async fn register_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    render_form(&db_pool, &session, &SignUpForm::default(), &FieldErrors::default()).await
}

#[debug_handler(state = AppState)]
pub async fn register(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Form(form): Form<SignUpForm>,
) -> AppResult<Response> {
    let mut errors = form.validate().err().unwrap_or_default();
    let username = form.username.trim();

    if !errors.contains("username") && db::find_user_by_username(&db_pool, username).await?.is_some() {
        errors.add("username", USERNAME_TAKEN);
    }

    if errors.is_empty() {
        let password = form.password1.clone();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

        let created = db::create_user(&db_pool, NewUser {
            username,
            password_hash: &password_hash,
            email: form.email.trim(),
            first_name: form.first_name.trim(),
            last_name: form.last_name.trim(),
            is_staff: false,
        })
        .await;

        match created {
            Ok(user) => {
                session::log_in(&session, &user).await?;
                session::flash(&session, FlashLevel::Success, "You Have Successfully Registered!").await?;
                info!("registered @{}#{}", user.username, user.id);
                return Ok(Redirect::to("/login").into_response());
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                errors.add("username", USERNAME_TAKEN);
            }
            Err(e) => return Err(e.into()),
        }
    }

    session::flash(&session, FlashLevel::Error, "An error occurred during registration!").await?;
    render_form(&db_pool, &session, &form, &errors).await
}
