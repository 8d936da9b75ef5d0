mod delete;
mod edit;
mod msg;
mod new;
mod room;

use axum::{routing::get, Router};

use crate::AppState;

pub use msg::{post_message, PostError};
pub(crate) use msg::msg_to_html;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", get(new::new_room_page).post(new::new_room))
        .route("/{uuid}", get(room::room).post(room::send_msg))
        .route("/{uuid}/edit", get(edit::edit_room_page).post(edit::edit_room))
        .route("/{uuid}/delete", get(delete::delete_room_page).post(delete::delete_room))
}

pub fn message_router() -> Router<AppState> {
    Router::new()
        .route("/{uuid}/delete", get(msg::delete_msg_page).post(msg::delete_msg))
}
