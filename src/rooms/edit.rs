use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    db::{self, RoomFields},
    forms::{FieldErrors, RoomForm},
    res,
    session::{self, FlashLevel},
    AppResult, AppState,
};

use super::new::{render_room_form, resolve_host};

#[debug_handler(state = AppState)]
pub(crate) async fn edit_room_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let action = format!("/r/{room_id}/edit");
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&action));
    };
    let Some(room) = db::find_room(&db_pool, &room_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    if !viewer.can_manage(&room.host_id) {
        return Ok(res::permission_denied());
    }

    let form = RoomForm {
        topic: room.topic_name,
        name: room.name,
        description: room.description,
        host: Some(room.host_username),
    };
    render_room_form(&db_pool, &session, &viewer, "Update room", &action, &form, &FieldErrors::default()).await
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,

    Form(form): Form<RoomForm>,
) -> AppResult<Response> {
    let action = format!("/r/{room_id}/edit");
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&action));
    };
    let Some(room) = db::find_room(&db_pool, &room_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    if !viewer.can_manage(&room.host_id) {
        return Ok(res::permission_denied());
    }

    match resolve_host(&db_pool, &viewer, &form, &room.host_id).await? {
        Ok(host_id) => {
            db::update_room(&db_pool, &room.id, RoomFields {
                host_id: &host_id,
                topic: form.topic.trim(),
                name: form.name.trim(),
                description: form.description.trim(),
            })
            .await?;
            Ok(Redirect::to(&format!("/r/{}", room.id)).into_response())
        }
        Err(errors) => {
            session::flash(&session, FlashLevel::Error, "An Error Occurred during Room Update").await?;
            render_room_form(&db_pool, &session, &viewer, "Update room", &action, &form, &errors).await
        }
    }
}
