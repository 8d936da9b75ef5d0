use axum::{debug_handler, extract::State, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    db::{self, RoomFields, User},
    forms::{FieldErrors, RoomForm},
    include_res,
    res::{self, escape},
    session::{self, FlashLevel},
    AppResult, AppState,
};

/// Renders the shared create/update form.
pub(super) async fn render_room_form(
    db_pool: &SqlitePool,
    session: &Session,
    viewer: &User,
    heading: &str,
    action: &str,
    form: &RoomForm,
    errors: &FieldErrors,
) -> AppResult<Response> {
    let flashes = session::take_flashes(session).await?;

    let topic_options: String = db::topics(db_pool)
        .await?
        .iter()
        .map(|topic| format!(r#"<option value="{}">"#, escape(&topic.name)))
        .collect();

    let host_field = if viewer.is_staff {
        format!(
            r#"<input type="text" id="host" name="host" value="{}" placeholder="{}">"#,
            escape(form.host.as_deref().unwrap_or_default()),
            escape(&viewer.username),
        )
    } else {
        format!(r#"<input type="text" id="host" value="{}" readonly disabled>"#, escape(&viewer.username))
    };

    let content = include_res!(str, "/pages/rooms/room_form.html")
        .replace("{heading}", &escape(heading))
        .replace("{action}", action)
        .replace("{topic_options}", &topic_options)
        .replace("{host_field}", &host_field)
        .replace("{host_errors}", &errors.html("host"))
        .replace("{topic_errors}", &errors.html("topic"))
        .replace("{name_errors}", &errors.html("name"))
        .replace("{description_errors}", &errors.html("description"))
        .replace("{topic}", &escape(&form.topic))
        .replace("{name}", &escape(&form.name))
        .replace("{description}", &escape(&form.description));

    Ok(res::page(heading, Some(viewer), &flashes, &content).into_response())
}

/// Validates the form and works out who hosts the room. Staff may hand a
/// room to any existing user; everyone else hosts their own rooms, falling
/// back to `default_host` for staff who leave the field blank.
pub(super) async fn resolve_host(
    db_pool: &SqlitePool,
    viewer: &User,
    form: &RoomForm,
    default_host: &str,
) -> AppResult<Result<String, FieldErrors>> {
    let mut errors = form.validate().err().unwrap_or_default();

    let host_id = match form.requested_host() {
        Some(username) if viewer.is_staff => match db::find_user_by_username(db_pool, username).await? {
            Some(host) => host.id,
            None => {
                errors.add("host", "Select a valid choice. That user does not exist.");
                String::new()
            }
        },
        _ if viewer.is_staff => default_host.to_owned(),
        _ => viewer.id.clone(),
    };

    Ok(if errors.is_empty() { Ok(host_id) } else { Err(errors) })
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_room_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect("/r/new"));
    };

    render_room_form(&db_pool, &session, &viewer, "Create room", "/r/new", &RoomForm::default(), &FieldErrors::default()).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Form(form): Form<RoomForm>,
) -> AppResult<Response> {
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect("/r/new"));
    };

    match resolve_host(&db_pool, &viewer, &form, &viewer.id).await? {
        Ok(host_id) => {
            db::create_room(&db_pool, RoomFields {
                host_id: &host_id,
                topic: form.topic.trim(),
                name: form.name.trim(),
                description: form.description.trim(),
            })
            .await?;
            Ok(Redirect::to("/").into_response())
        }
        Err(errors) => {
            session::flash(&session, FlashLevel::Error, "An Error Occurred during Room Creation").await?;
            render_room_form(&db_pool, &session, &viewer, "Create room", "/r/new", &form, &errors).await
        }
    }
}
