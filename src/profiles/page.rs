use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Response}};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    db, include_res,
    index::{render_feed, room_count_label, topics_to_html, SearchQuery},
    res::{self, escape},
    search, session, AppResult, AppState,
};

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    Path(profile_id): Path<Uuid>,
    Query(SearchQuery { q }): Query<SearchQuery>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let Some(profile) = db::find_user(&db_pool, &profile_id.to_string()).await? else {
        return Ok(res::not_found());
    };
    let viewer = session::current_user(&session, &db_pool).await?;
    let flashes = session::take_flashes(&session).await?;
    let q = search::normalize(q.as_deref());

    let (room_items, activity, room_count) = render_feed(&db_pool, viewer.as_ref(), q, Some(&profile.id)).await?;
    let topics = db::topics(&db_pool).await?;

    let full_name = profile.full_name();
    let content = include_res!(str, "/pages/profiles/profile.html")
        .replace("{topics}", &topics_to_html(&topics))
        .replace("{room_count}", &room_count_label(room_count))
        .replace("{joined}", &res::since(profile.date_joined))
        .replace("{id}", &escape(&profile.id))
        .replace("{q}", &escape(q.unwrap_or_default()))
        .replace("{username}", &escape(&profile.username))
        .replace("{full_name}", &escape(if full_name.is_empty() { &profile.username } else { &full_name }))
        .replace("{activity}", &activity)
        .replace("{room_items}", &room_items);

    Ok(res::page(&format!("@{}", profile.username), viewer.as_ref(), &flashes, &content).into_response())
}
