use axum::{debug_handler, extract::{Query, State}, response::{IntoResponse, Response}};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    db::{self, Room, TopicCount, User},
    include_res,
    res::{self, escape},
    rooms, search, session, AppResult, AppState,
};

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    pub(crate) q: Option<String>,
}

pub(crate) fn room_to_html(room: &Room) -> String {
    include_res!(str, "/pages/room_item.html")
        .replace("{id}", &escape(&room.id))
        .replace("{host_id}", &escape(&room.host_id))
        .replace("{host_username}", &escape(&room.host_username))
        .replace("{since}", &res::since(room.updated))
        .replace("{topic}", &escape(&room.topic_name))
        .replace("{name}", &escape(&room.name))
}

pub(crate) fn topics_to_html(topics: &[TopicCount]) -> String {
    topics
        .iter()
        .map(|topic| {
            format!(
                r#"<li><a href="/?q={}">{}</a> <span class="count">{}</span></li>"#,
                res::encode_query(&topic.name),
                escape(&topic.name),
                topic.room_count
            )
        })
        .collect()
}

pub(crate) fn room_count_label(count: usize) -> String {
    match count {
        1 => "1 room available".to_owned(),
        n => format!("{n} rooms available"),
    }
}

/// Renders the feed of rooms and messages shared by home and profile pages.
pub(crate) async fn render_feed(
    db_pool: &SqlitePool,
    viewer: Option<&User>,
    q: Option<&str>,
    user_id: Option<&str>,
) -> AppResult<(String, String, usize)> {
    let rooms = search::rooms(db_pool, q, user_id).await?;
    let messages = search::messages(db_pool, q, user_id).await?;

    let room_items: String = rooms.iter().map(room_to_html).collect();
    let activity: String = messages
        .iter()
        .map(|message| rooms::msg_to_html(message, viewer, true))
        .collect();

    Ok((room_items, activity, rooms.len()))
}

#[debug_handler(state = AppState)]
pub async fn home(
    Query(SearchQuery { q }): Query<SearchQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let viewer = session::current_user(&session, &db_pool).await?;
    let flashes = session::take_flashes(&session).await?;
    let q = search::normalize(q.as_deref());

    let (room_items, activity, room_count) = render_feed(&db_pool, viewer.as_ref(), q, None).await?;
    let topics = db::topics(&db_pool).await?;

    let content = include_res!(str, "/pages/index.html")
        .replace("{topics}", &topics_to_html(&topics))
        .replace("{room_count}", &room_count_label(room_count))
        .replace("{q}", &escape(q.unwrap_or_default()))
        .replace("{activity}", &activity)
        .replace("{room_items}", &room_items);

    Ok(res::page("Home", viewer.as_ref(), &flashes, &content).into_response())
}
