use axum::{debug_handler, extract::{Path, State}, response::{IntoResponse, Redirect, Response}};
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag};
use sqlx::SqlitePool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::info;
use uuid::Uuid;

use crate::{
    db::{self, Message, User},
    include_res,
    moderation::{Moderation, Verdict},
    res::{self, escape, now_micros},
    session,
    AppResult, AppState,
};

/// Why a message was not posted. Everything but `Database` is shown to the
/// poster as-is.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("Please Provide a Valid Comment")]
    Empty,

    #[error("This comment contains inappropriate content and cannot be posted.")]
    Inappropriate,

    #[error("Comments cannot be screened right now. Please try again later.")]
    Unscreened,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Screens `body` and, when it passes, stores it and makes `author` a
/// participant of the room. Returns the new message id.
pub async fn post_message(
    db_pool: &SqlitePool,
    moderation: &Moderation,
    room_id: &str,
    author: &User,
    body: &str,
) -> Result<String, PostError> {
    if body.trim().is_empty() {
        return Err(PostError::Empty);
    }

    match moderation.screen(body).await {
        Verdict::Allowed => {}
        Verdict::Toxic(score) => {
            info!("rejected message from @{} in room {room_id}, toxicity {score:.2}", author.username);
            return Err(PostError::Inappropriate);
        }
        Verdict::Unavailable => return Err(PostError::Unscreened),
    }

    let id = Uuid::now_v7().to_string();
    let now = now_micros();

    let mut tx = db_pool.begin().await?;
    sqlx::query("INSERT INTO messages (id,user_id,room_id,body,created,updated) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(&author.id)
        .bind(room_id)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT OR IGNORE INTO room_participants (room_id,user_id) VALUES (?,?)")
        .bind(room_id)
        .bind(&author.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("@{} posted {id} in room {room_id}", author.username);
    Ok(id)
}

/// Relative URLs and http, https and mailto links are kept. Whitespace and
/// control characters are ignored the way browsers ignore them in schemes.
fn safe_url(url: &str) -> bool {
    let url: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    match url.find([':', '/', '?', '#']) {
        Some(i) if url[i..].starts_with(':') => matches!(&url[..i], "http" | "https" | "mailto"),
        _ => true,
    }
}

fn defang(dest_url: CowStr<'_>) -> CowStr<'_> {
    if safe_url(&dest_url) { dest_url } else { CowStr::Borrowed("#") }
}

/// Markdown to HTML with raw HTML demoted to text and unsafe link targets
/// replaced by `#`.
fn render_body(body: &str) -> String {
    let parser = Parser::new_ext(body, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => {
            Event::Start(Tag::Link { link_type, dest_url: defang(dest_url), title, id })
        }
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => {
            Event::Start(Tag::Image { link_type, dest_url: defang(dest_url), title, id })
        }
        _ => event,
    });

    let mut html_output = String::new();
    pulldown_cmark::html::push_html(&mut html_output, parser);
    html_output.replace('{', "&#123;").replace('}', "&#125;")
}

/// Renders one message. `with_room` adds a link to the room, used by
/// activity feeds that mix rooms.
pub(crate) fn msg_to_html(message: &Message, viewer: Option<&User>, with_room: bool) -> String {
    let room_link = if with_room {
        format!(
            r#"<a class="room-link" href="/r/{}">{}</a>"#,
            escape(&message.room_id),
            escape(&message.room_name)
        )
    } else {
        String::new()
    };

    let actions = match viewer {
        Some(viewer) if viewer.can_manage(&message.user_id) => {
            format!(r#"<a class="danger" href="/m/{}/delete">Delete</a>"#, escape(&message.id))
        }
        _ => String::new(),
    };

    include_res!(str, "/pages/rooms/message.html")
        .replace("{id}", &escape(&message.id))
        .replace("{user_id}", &escape(&message.user_id))
        .replace("{username}", &escape(&message.username))
        .replace("{since}", &res::since(message.created))
        .replace("{room_link}", &room_link)
        .replace("{actions}", &actions)
        .replace("{body}", &render_body(&message.body))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_msg_page(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(message_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/m/{message_id}/delete")));
    };
    let Some(message) = db::find_message(&db_pool, &message_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    if !viewer.can_manage(&message.user_id) {
        return Ok(res::permission_denied());
    }

    let flashes = session::take_flashes(&session).await?;
    let content = include_res!(str, "/pages/delete.html")
        .replace("{action}", &format!("/m/{message_id}/delete"))
        .replace("{cancel}", &format!("/r/{}", escape(&message.room_id)))
        .replace("{obj}", &format!("the message \"{}\"", escape(&message.body)));

    Ok(res::page("Delete message", Some(&viewer), &flashes, &content).into_response())
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_msg(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Path(message_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(viewer) = session::current_user(&session, &db_pool).await? else {
        return Ok(session::login_redirect(&format!("/m/{message_id}/delete")));
    };
    let Some(message) = db::find_message(&db_pool, &message_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    if !viewer.can_manage(&message.user_id) {
        return Ok(res::permission_denied());
    }

    db::delete_message(&db_pool, &message.id).await?;
    Ok(Redirect::to(&format!("/r/{}", message.room_id)).into_response())
}
