use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{db, include_res, moderation::Moderation, res::{self, escape}, session::{self, FlashLevel}, AppResult, AppState};

use super::msg::{self, PostError};

#[derive(Deserialize)]
pub(crate) struct SendMessageForm {
    #[serde(default)]
    body: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(room) = db::find_room(&db_pool, &room_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    let viewer = session::current_user(&session, &db_pool).await?;
    let flashes = session::take_flashes(&session).await?;

    let messages: String = db::room_messages(&db_pool, &room.id)
        .await?
        .iter()
        .map(|message| msg::msg_to_html(message, viewer.as_ref(), false))
        .collect();

    let participants = db::participants(&db_pool, &room.id).await?;
    let participant_items: String = participants
        .iter()
        .map(|p| format!(r#"<li><a href="/p/{}">@{}</a></li>"#, escape(&p.id), escape(&p.username)))
        .collect();

    let host_actions = match &viewer {
        Some(viewer) if viewer.can_manage(&room.host_id) => include_res!(str, "/pages/rooms/host_actions.html")
            .replace("{room_id}", &escape(&room.id)),
        _ => String::new(),
    };

    let composer = match &viewer {
        Some(_) => include_res!(str, "/pages/rooms/composer.html").replace("{room_id}", &escape(&room.id)),
        None => format!(r#"<p><a href="/login?next=/r/{}">Log in</a> to join the conversation.</p>"#, escape(&room.id)),
    };

    let body = include_res!(str, "/pages/rooms/room.html")
        .replace("{host_actions}", &host_actions)
        .replace("{composer}", &composer)
        .replace("{participant_count}", &participants.len().to_string())
        .replace("{participants}", &participant_items)
        .replace("{since}", &res::since(room.created))
        .replace("{host_id}", &escape(&room.host_id))
        .replace("{host_username}", &escape(&room.host_username))
        .replace("{topic}", &escape(&room.topic_name))
        .replace("{room_name}", &escape(&room.name))
        .replace("{description}", &escape(&room.description))
        .replace("{messages}", &messages);

    Ok(res::page(&room.name, viewer.as_ref(), &flashes, &body).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_msg(
    State(db_pool): State<SqlitePool>,
    State(moderation): State<Moderation>,
    session: Session,
    Path(room_id): Path<Uuid>,

    Form(SendMessageForm { body }): Form<SendMessageForm>,
) -> AppResult<Response> {
    let Some(author) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/r/{room_id}")));
    };
    let Some(room) = db::find_room(&db_pool, &room_id.to_string()).await? else {
        return Ok(res::not_found());
    };

    match msg::post_message(&db_pool, &moderation, &room.id, &author, &body).await {
        Ok(_) => {}
        Err(PostError::Database(e)) => return Err(e.into()),
        Err(rejection) => session::flash(&session, FlashLevel::Error, rejection.to_string()).await?,
    }

    Ok(Redirect::to(&format!("/r/{}", room.id)).into_response())
}
