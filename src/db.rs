use std::str::FromStr;

use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqliteConnection, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::res::now_micros;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub date_joined: i64,
}

impl User {
    /// Hosts and authors manage their own rooms and messages, staff manage all.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.is_staff || self.id == owner_id
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_owned()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicCount {
    pub name: String,
    pub room_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Room {
    pub id: String,
    pub host_id: String,
    pub host_username: String,
    pub topic_name: String,
    pub name: String,
    pub description: String,
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub room_id: String,
    pub room_name: String,
    pub body: String,
    pub created: i64,
    pub updated: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Participant {
    pub id: String,
    pub username: String,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub is_staff: bool,
}

pub struct RoomFields<'a> {
    pub host_id: &'a str,
    pub topic: &'a str,
    pub name: &'a str,
    pub description: &'a str,
}

pub(crate) const ROOM_SELECT: &str = r#"
    SELECT r.id, r.host_id, u.username AS host_username, t.name AS topic_name,
           r.name, r.description, r.created, r.updated
    FROM rooms r
    JOIN users u ON u.id = r.host_id
    JOIN topics t ON t.id = r.topic_id
"#;

pub(crate) const ROOM_ORDER: &str = " ORDER BY r.updated DESC, r.created DESC, r.rowid DESC";

pub(crate) const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.user_id, u.username, m.room_id, r.name AS room_name,
           m.body, m.created, m.updated
    FROM messages m
    JOIN users u ON u.id = m.user_id
    JOIN rooms r ON r.id = m.room_id
    JOIN topics t ON t.id = r.topic_id
"#;

pub(crate) const MESSAGE_ORDER: &str = " ORDER BY m.updated DESC, m.created DESC, m.rowid DESC";

/// Opens the pool and makes sure the schema exists.
///
/// In-memory databases live and die with their connection, so they get a
/// single connection that is never recycled.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await?
    };

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            is_staff BOOLEAN NOT NULL DEFAULT 0,
            date_joined INTEGER NOT NULL
        );
        "#,
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS topics (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE
        );
        "#,
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            host_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            topic_id TEXT NOT NULL REFERENCES topics(id),
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created INTEGER NOT NULL,
            updated INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_rooms_updated ON rooms(updated, created);
        "#,
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS room_participants (
            room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (room_id, user_id)
        );
        "#,
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            room_id TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
            body TEXT NOT NULL,
            created INTEGER NOT NULL,
            updated INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_room ON messages(room_id, updated);
        "#,
    )
    .execute(db_pool)
    .await?;

    info!("database schema ready");
    Ok(())
}

pub async fn find_user(db_pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id=?")
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

pub async fn find_user_by_username(db_pool: &SqlitePool, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE username=?")
        .bind(username)
        .fetch_optional(db_pool)
        .await
}

pub async fn create_user(db_pool: &SqlitePool, new_user: NewUser<'_>) -> Result<User, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    sqlx::query(
        "INSERT INTO users (id,username,password_hash,email,first_name,last_name,is_staff,date_joined) VALUES (?,?,?,?,?,?,?,?)",
    )
    .bind(&id)
    .bind(new_user.username)
    .bind(new_user.password_hash)
    .bind(new_user.email)
    .bind(new_user.first_name)
    .bind(new_user.last_name)
    .bind(new_user.is_staff)
    .bind(now_micros())
    .execute(db_pool)
    .await?;

    info!("added user @{}#{id}", new_user.username);
    sqlx::query_as("SELECT * FROM users WHERE id=?")
        .bind(&id)
        .fetch_one(db_pool)
        .await
}

/// Looks a topic up by name (case-insensitive), creating it when new.
async fn topic_id_for(conn: &mut SqliteConnection, name: &str) -> Result<String, sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO topics (id,name) VALUES (?,?)")
        .bind(Uuid::now_v7().to_string())
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let (id,): (String,) = sqlx::query_as("SELECT id FROM topics WHERE name=?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

pub async fn topics(db_pool: &SqlitePool) -> Result<Vec<TopicCount>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT t.name, COUNT(r.id) AS room_count
        FROM topics t LEFT JOIN rooms r ON r.topic_id = t.id
        GROUP BY t.id
        ORDER BY room_count DESC, t.name
        "#,
    )
    .fetch_all(db_pool)
    .await
}

pub async fn find_room(db_pool: &SqlitePool, id: &str) -> Result<Option<Room>, sqlx::Error> {
    sqlx::query_as(&format!("{ROOM_SELECT} WHERE r.id=?"))
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

pub async fn create_room(db_pool: &SqlitePool, fields: RoomFields<'_>) -> Result<String, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let now = now_micros();

    let mut tx = db_pool.begin().await?;
    let topic_id = topic_id_for(&mut *tx, fields.topic).await?;
    sqlx::query("INSERT INTO rooms (id,host_id,topic_id,name,description,created,updated) VALUES (?,?,?,?,?,?,?)")
        .bind(&id)
        .bind(fields.host_id)
        .bind(topic_id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("room {id} created by {}", fields.host_id);
    Ok(id)
}

pub async fn update_room(db_pool: &SqlitePool, id: &str, fields: RoomFields<'_>) -> Result<(), sqlx::Error> {
    let mut tx = db_pool.begin().await?;
    let topic_id = topic_id_for(&mut *tx, fields.topic).await?;
    sqlx::query("UPDATE rooms SET host_id=?, topic_id=?, name=?, description=?, updated=? WHERE id=?")
        .bind(fields.host_id)
        .bind(topic_id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(now_micros())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("room {id} updated");
    Ok(())
}

pub async fn delete_room(db_pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM rooms WHERE id=?")
        .bind(id)
        .execute(db_pool)
        .await?;

    info!("room {id} deleted");
    Ok(())
}

pub async fn participants(db_pool: &SqlitePool, room_id: &str) -> Result<Vec<Participant>, sqlx::Error> {
    sqlx::query_as(
        "SELECT u.id, u.username FROM room_participants p JOIN users u ON u.id = p.user_id WHERE p.room_id=? ORDER BY u.username",
    )
    .bind(room_id)
    .fetch_all(db_pool)
    .await
}

pub async fn room_messages(db_pool: &SqlitePool, room_id: &str) -> Result<Vec<Message>, sqlx::Error> {
    sqlx::query_as(&format!("{MESSAGE_SELECT} WHERE m.room_id=?{MESSAGE_ORDER}"))
        .bind(room_id)
        .fetch_all(db_pool)
        .await
}

pub async fn find_message(db_pool: &SqlitePool, id: &str) -> Result<Option<Message>, sqlx::Error> {
    sqlx::query_as(&format!("{MESSAGE_SELECT} WHERE m.id=?"))
        .bind(id)
        .fetch_optional(db_pool)
        .await
}

pub async fn delete_message(db_pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM messages WHERE id=?")
        .bind(id)
        .execute(db_pool)
        .await?;

    info!("message {id} deleted");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) async fn pool() -> SqlitePool {
        connect("sqlite::memory:").await.unwrap()
    }

    pub(crate) async fn user(db_pool: &SqlitePool, username: &str, is_staff: bool) -> User {
        create_user(db_pool, NewUser {
            username,
            password_hash: "x",
            email: "",
            first_name: "",
            last_name: "",
            is_staff,
        })
        .await
        .unwrap()
    }

    pub(crate) async fn room(db_pool: &SqlitePool, host: &User, topic: &str, name: &str) -> String {
        create_room(db_pool, RoomFields {
            host_id: &host.id,
            topic,
            name,
            description: "",
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn rooms_list_most_recently_updated_first() {
        let db_pool = pool().await;
        let host = user(&db_pool, "testuser", false).await;
        let a = room(&db_pool, &host, "Python", "Room A").await;
        let b = room(&db_pool, &host, "Python", "Room B").await;

        let rooms: Vec<Room> = sqlx::query_as(&format!("{ROOM_SELECT}{ROOM_ORDER}"))
            .fetch_all(&db_pool)
            .await
            .unwrap();
        let ids: Vec<_> = rooms.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, [b.as_str(), a.as_str()]);

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        update_room(&db_pool, &a, RoomFields {
            host_id: &host.id,
            topic: "Python",
            name: "Room A2",
            description: "",
        })
        .await
        .unwrap();
        let rooms: Vec<Room> = sqlx::query_as(&format!("{ROOM_SELECT}{ROOM_ORDER}"))
            .fetch_all(&db_pool)
            .await
            .unwrap();
        assert_eq!(rooms[0].id, a);
        assert_eq!(rooms[0].name, "Room A2");
    }

    #[tokio::test]
    async fn topics_are_created_on_demand_and_shared() {
        let db_pool = pool().await;
        let host = user(&db_pool, "testuser", false).await;
        room(&db_pool, &host, "Python", "One").await;
        room(&db_pool, &host, "python", "Two").await;
        room(&db_pool, &host, "Rust", "Three").await;

        let topics = topics(&db_pool).await.unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "Python");
        assert_eq!(topics[0].room_count, 2);
        assert_eq!(topics[1].name, "Rust");
        assert_eq!(topics[1].room_count, 1);
    }

    #[tokio::test]
    async fn failed_room_writes_leave_no_topic_behind() {
        let db_pool = pool().await;
        let host = user(&db_pool, "testuser", false).await;
        let room_id = room(&db_pool, &host, "Python", "Django Room").await;

        let created = create_room(&db_pool, RoomFields {
            host_id: "no-such-user",
            topic: "Orphan",
            name: "Ghost Room",
            description: "",
        })
        .await;
        assert!(created.is_err());

        let updated = update_room(&db_pool, &room_id, RoomFields {
            host_id: "no-such-user",
            topic: "Stray",
            name: "Django Room",
            description: "",
        })
        .await;
        assert!(updated.is_err());

        let names: Vec<_> = topics(&db_pool).await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["Python"]);
        assert_eq!(find_room(&db_pool, &room_id).await.unwrap().unwrap().host_id, host.id);
    }

    #[tokio::test]
    async fn deleting_a_room_cascades_to_its_messages() {
        let db_pool = pool().await;
        let host = user(&db_pool, "testuser", false).await;
        let room_id = room(&db_pool, &host, "Python", "Django Room").await;
        sqlx::query("INSERT INTO messages (id,user_id,room_id,body,created,updated) VALUES ('m1',?,?,'hi',0,0)")
            .bind(&host.id)
            .bind(&room_id)
            .execute(&db_pool)
            .await
            .unwrap();

        delete_room(&db_pool, &room_id).await.unwrap();

        assert!(find_room(&db_pool, &room_id).await.unwrap().is_none());
        assert!(find_message(&db_pool, "m1").await.unwrap().is_none());
        let (left,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&db_pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn staff_and_owners_can_manage() {
        let mut u = User {
            id: "u1".into(),
            username: "u".into(),
            password_hash: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            is_staff: false,
            date_joined: 0,
        };
        assert!(u.can_manage("u1"));
        assert!(!u.can_manage("u2"));
        u.is_staff = true;
        assert!(u.can_manage("u2"));
    }
}
