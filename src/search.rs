//! Case-insensitive substring search over rooms and messages.

use sqlx::SqlitePool;

use crate::db::{Message, Room, MESSAGE_ORDER, MESSAGE_SELECT, ROOM_ORDER, ROOM_SELECT};

/// Treats a blank query the same as no query.
pub fn normalize(q: Option<&str>) -> Option<&str> {
    q.map(str::trim).filter(|q| !q.is_empty())
}

/// Rooms whose topic, host, name or description contain `q`, optionally
/// limited to one host.
pub async fn rooms(db_pool: &SqlitePool, q: Option<&str>, host_id: Option<&str>) -> Result<Vec<Room>, sqlx::Error> {
    let sql = format!(
        r#"{ROOM_SELECT}
        WHERE (? IS NULL OR r.host_id = ?)
          AND (? IS NULL
               OR instr(lower(t.name), lower(?)) > 0
               OR instr(lower(u.username), lower(?)) > 0
               OR instr(lower(r.name), lower(?)) > 0
               OR instr(lower(r.description), lower(?)) > 0)
        {ROOM_ORDER}"#
    );
    let q = normalize(q);

    sqlx::query_as(&sql)
        .bind(host_id)
        .bind(host_id)
        .bind(q)
        .bind(q)
        .bind(q)
        .bind(q)
        .bind(q)
        .fetch_all(db_pool)
        .await
}

/// Messages whose author, room topic, room name, body or room description
/// contain `q`, optionally limited to one author.
pub async fn messages(db_pool: &SqlitePool, q: Option<&str>, user_id: Option<&str>) -> Result<Vec<Message>, sqlx::Error> {
    let sql = format!(
        r#"{MESSAGE_SELECT}
        WHERE (? IS NULL OR m.user_id = ?)
          AND (? IS NULL
               OR instr(lower(u.username), lower(?)) > 0
               OR instr(lower(t.name), lower(?)) > 0
               OR instr(lower(r.name), lower(?)) > 0
               OR instr(lower(m.body), lower(?)) > 0
               OR instr(lower(r.description), lower(?)) > 0)
        {MESSAGE_ORDER}"#
    );
    let q = normalize(q);

    sqlx::query_as(&sql)
        .bind(user_id)
        .bind(user_id)
        .bind(q)
        .bind(q)
        .bind(q)
        .bind(q)
        .bind(q)
        .bind(q)
        .fetch_all(db_pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{tests::{pool, room, user}, RoomFields};

    async fn say(db_pool: &SqlitePool, user_id: &str, room_id: &str, body: &str) {
        sqlx::query("INSERT INTO messages (id,user_id,room_id,body,created,updated) VALUES (?,?,?,?,0,0)")
            .bind(uuid::Uuid::now_v7().to_string())
            .bind(user_id)
            .bind(room_id)
            .bind(body)
            .execute(db_pool)
            .await
            .unwrap();
    }

    #[test]
    fn blank_queries_mean_everything() {
        assert_eq!(normalize(Some("  ")), None);
        assert_eq!(normalize(Some(" rust ")), Some("rust"));
        assert_eq!(normalize(None), None);
    }

    #[tokio::test]
    async fn rooms_match_on_topic_host_name_and_description() {
        let db_pool = pool().await;
        let alice = user(&db_pool, "alice", false).await;
        let bob = user(&db_pool, "bob", false).await;
        let django = room(&db_pool, &alice, "Python", "Django Room").await;
        let tokio_room = crate::db::create_room(&db_pool, RoomFields {
            host_id: &bob.id,
            topic: "Rust",
            name: "Async talk",
            description: "All about TOKIO",
        })
        .await
        .unwrap();

        let ids = |rooms: Vec<Room>| rooms.into_iter().map(|r| r.id).collect::<Vec<_>>();

        assert_eq!(ids(rooms(&db_pool, Some("python"), None).await.unwrap()), [django.clone()]);
        assert_eq!(ids(rooms(&db_pool, Some("BOB"), None).await.unwrap()), [tokio_room.clone()]);
        assert_eq!(ids(rooms(&db_pool, Some("django"), None).await.unwrap()), [django.clone()]);
        assert_eq!(ids(rooms(&db_pool, Some("tokio"), None).await.unwrap()), [tokio_room.clone()]);
        assert_eq!(rooms(&db_pool, None, None).await.unwrap().len(), 2);
        assert_eq!(ids(rooms(&db_pool, None, Some(&alice.id)).await.unwrap()), [django.clone()]);
        assert!(rooms(&db_pool, Some("rust"), Some(&alice.id)).await.unwrap().is_empty());
        assert!(rooms(&db_pool, Some("%"), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_match_on_author_room_and_body() {
        let db_pool = pool().await;
        let alice = user(&db_pool, "alice", false).await;
        let bob = user(&db_pool, "bob", false).await;
        let django = room(&db_pool, &alice, "Python", "Django Room").await;
        say(&db_pool, &alice.id, &django, "first post").await;
        say(&db_pool, &bob.id, &django, "Borrow checker question").await;

        assert_eq!(messages(&db_pool, None, None).await.unwrap().len(), 2);
        assert_eq!(messages(&db_pool, Some("python"), None).await.unwrap().len(), 2);
        assert_eq!(messages(&db_pool, Some("django room"), None).await.unwrap().len(), 2);

        let bobs = messages(&db_pool, Some("bob"), None).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].body, "Borrow checker question");

        let checker = messages(&db_pool, Some("CHECKER"), None).await.unwrap();
        assert_eq!(checker.len(), 1);

        let alices = messages(&db_pool, None, Some(&alice.id)).await.unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].body, "first post");
    }
}
