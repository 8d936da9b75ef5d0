use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{db, include_res, res::{self, escape}, session, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/r/{room_id}/delete")));
    };
    let Some(room) = db::find_room(&db_pool, &room_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    if !viewer.can_manage(&room.host_id) {
        return Ok(res::permission_denied());
    }

    let flashes = session::take_flashes(&session).await?;
    let content = include_res!(str, "/pages/delete.html")
        .replace("{action}", &format!("/r/{room_id}/delete"))
        .replace("{cancel}", &format!("/r/{room_id}"))
        .replace("{obj}", &format!("the room \"{}\"", escape(&room.name)));

    Ok(res::page("Delete room", Some(&viewer), &flashes, &content).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/r/{room_id}/delete")));
    };
    let Some(room) = db::find_room(&db_pool, &room_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    if !viewer.can_manage(&room.host_id) {
        return Ok(res::permission_denied());
    }

    db::delete_room(&db_pool, &room.id).await?;
    Ok(Redirect::to("/").into_response())
}
