//! SQLite persistence layer.
//!
//! Every operation opens its own connection and runs on the blocking
//! thread pool; no transaction spans more than one logical operation.
//! Mutations whose outcome drives the conversation flow swallow and log
//! persistence failures, reporting plain `bool` success to the chat layer.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tokio::task;
use tracing::{error, info};

/// Password seeded into a fresh database and restored by a full reset.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    username TEXT,
    full_name TEXT,
    role TEXT NOT NULL DEFAULT 'regular',
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS requests (
    request_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    message_id INTEGER NOT NULL,
    body TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at INTEGER NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users (user_id)
);

CREATE TABLE IF NOT EXISTS responses (
    response_id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id INTEGER NOT NULL,
    responder_id INTEGER NOT NULL,
    message_id INTEGER NOT NULL,
    body TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (request_id) REFERENCES requests (request_id),
    FOREIGN KEY (responder_id) REFERENCES users (user_id)
);

CREATE TABLE IF NOT EXISTS admin_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS social_subscriptions (
    user_id INTEGER NOT NULL,
    platform TEXT NOT NULL,
    subscribed INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, platform),
    FOREIGN KEY (user_id) REFERENCES users (user_id)
);
"#;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("sqlite task join failed: {0}")]
    Join(#[from] task::JoinError),
}

/// Account role. Roles are only ever switched, never deleted with the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Regular,
    Responder,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Regular => "regular",
            Role::Responder => "responder",
        }
    }

    fn parse(s: &str) -> Role {
        match s {
            "responder" => Role::Responder,
            _ => Role::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Answered,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Answered => "answered",
        }
    }

    fn parse(s: &str) -> RequestStatus {
        match s {
            "answered" => RequestStatus::Answered,
            _ => RequestStatus::Pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub request_id: i64,
    pub user_id: i64,
    pub message_id: i32,
    pub body: String,
    pub status: RequestStatus,
    pub created_at: i64,
}

/// Roster entry, newest first in listings.
#[derive(Debug, Clone)]
pub struct Responder {
    pub user_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub created_at: i64,
}

/// One line of a requester's own request history.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub request_id: i64,
    pub body: String,
    pub status: RequestStatus,
    pub created_at: i64,
}

/// Handle to the SQLite database. Cheap to clone; connections are opened
/// per operation.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Opens the database at `path`, creating tables and seeding the
    /// default admin password on first use.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Self {
            path: path.as_ref().to_path_buf(),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<(), StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO admin_settings (key, value) VALUES ('admin_password', ?1)",
            params![DEFAULT_ADMIN_PASSWORD],
        )?;
        info!("database initialised at {}", self.path.display());
        Ok(())
    }

    // Runs sqlite work off the async executor; rusqlite connections are
    // not Sync and each operation gets a fresh one.
    async fn call<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let path = self.path.clone();
        Ok(task::spawn_blocking(move || {
            let conn = Connection::open(path)?;
            f(conn)
        })
        .await??)
    }

    /// Records a user on first contact. Existing rows are left untouched.
    pub async fn ensure_user(
        &self,
        user_id: i64,
        username: Option<String>,
        full_name: Option<String>,
    ) -> bool {
        let now = Utc::now().timestamp();
        let res = self
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO users (user_id, username, full_name, role, created_at)
                     VALUES (?1, ?2, ?3, 'regular', ?4)",
                    params![user_id, username, full_name, now],
                )
            })
            .await;
        match res {
            Ok(_) => true,
            Err(e) => {
                error!("failed to record user {user_id}: {e}");
                false
            }
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, StorageError> {
        self.call(move |conn| {
            conn.query_row(
                "SELECT user_id, username, full_name, role, created_at
                 FROM users WHERE user_id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()
        })
        .await
    }

    /// Persists a new pending request and returns its id.
    pub async fn add_request(
        &self,
        user_id: i64,
        message_id: i32,
        body: String,
    ) -> Result<i64, StorageError> {
        let now = Utc::now().timestamp();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO requests (user_id, message_id, body, status, created_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
                params![user_id, message_id, body, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_request(&self, request_id: i64) -> Result<Option<Request>, StorageError> {
        self.call(move |conn| {
            conn.query_row(
                "SELECT request_id, user_id, message_id, body, status, created_at
                 FROM requests WHERE request_id = ?1",
                params![request_id],
                |row| {
                    Ok(Request {
                        request_id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                        body: row.get(3)?,
                        status: RequestStatus::parse(&row.get::<_, String>(4)?),
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Appends a response and marks the request answered. The status flip
    /// is idempotent; answering an already-answered request is allowed.
    pub async fn add_response(
        &self,
        request_id: i64,
        responder_id: i64,
        message_id: i32,
        body: String,
    ) -> Result<i64, StorageError> {
        let now = Utc::now().timestamp();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO responses (request_id, responder_id, message_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![request_id, responder_id, message_id, body, now],
            )?;
            let response_id = conn.last_insert_rowid();
            conn.execute(
                "UPDATE requests SET status = 'answered' WHERE request_id = ?1",
                params![request_id],
            )?;
            Ok(response_id)
        })
        .await
    }

    /// Most recent requests for one requester, newest first.
    pub async fn user_requests(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<RequestSummary>, StorageError> {
        self.call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT request_id, body, status, created_at
                 FROM requests WHERE user_id = ?1
                 ORDER BY created_at DESC, request_id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user_id, limit], |row| {
                Ok(RequestSummary {
                    request_id: row.get(0)?,
                    body: row.get(1)?,
                    status: RequestStatus::parse(&row.get::<_, String>(2)?),
                    created_at: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    /// Current responder roster, newest first.
    pub async fn responders(&self) -> Result<Vec<Responder>, StorageError> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, username, full_name, created_at
                 FROM users WHERE role = 'responder' ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Responder {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    full_name: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    /// Create-or-promote roster upsert. Contact fields never overwrite a
    /// known value with NULL.
    pub async fn add_responder(
        &self,
        user_id: i64,
        username: Option<String>,
        full_name: Option<String>,
    ) -> bool {
        let now = Utc::now().timestamp();
        let res = self
            .call(move |conn| {
                let exists = conn
                    .query_row(
                        "SELECT 1 FROM users WHERE user_id = ?1",
                        params![user_id],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if exists {
                    conn.execute(
                        "UPDATE users SET role = 'responder',
                                          username = COALESCE(?2, username),
                                          full_name = COALESCE(?3, full_name)
                         WHERE user_id = ?1",
                        params![user_id, username, full_name],
                    )?;
                } else {
                    conn.execute(
                        "INSERT INTO users (user_id, username, full_name, role, created_at)
                         VALUES (?1, ?2, ?3, 'responder', ?4)",
                        params![user_id, username, full_name, now],
                    )?;
                }
                Ok(())
            })
            .await;
        match res {
            Ok(()) => true,
            Err(e) => {
                error!("failed to add responder {user_id}: {e}");
                false
            }
        }
    }

    /// Demotes a responder back to a regular user. `false` when the id is
    /// not currently on the roster (or the write failed).
    pub async fn remove_responder(&self, user_id: i64) -> bool {
        let res = self
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET role = 'regular'
                     WHERE user_id = ?1 AND role = 'responder'",
                    params![user_id],
                )
            })
            .await;
        match res {
            Ok(affected) => affected > 0,
            Err(e) => {
                error!("failed to remove responder {user_id}: {e}");
                false
            }
        }
    }

    /// Current admin password, falling back to the default sentinel when
    /// the settings row is missing.
    pub async fn admin_password(&self) -> Result<String, StorageError> {
        self.call(|conn| {
            let stored: Option<String> = conn
                .query_row(
                    "SELECT value FROM admin_settings WHERE key = 'admin_password'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(stored.unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()))
        })
        .await
    }

    pub async fn set_admin_password(&self, new_password: String) -> bool {
        let res = self
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO admin_settings (key, value)
                     VALUES ('admin_password', ?1)",
                    params![new_password],
                )
            })
            .await;
        match res {
            Ok(_) => true,
            Err(e) => {
                error!("failed to update admin password: {e}");
                false
            }
        }
    }

    /// Records a self-reported platform subscription claim.
    pub async fn set_social_subscription(
        &self,
        user_id: i64,
        platform: &str,
        subscribed: bool,
    ) -> bool {
        let platform = platform.to_string();
        let now = Utc::now().timestamp();
        let value = platform.clone();
        let res = self
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO social_subscriptions
                         (user_id, platform, subscribed, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, value, subscribed as i64, now],
                )
            })
            .await;
        match res {
            Ok(_) => true,
            Err(e) => {
                error!("failed to store {platform} subscription for {user_id}: {e}");
                false
            }
        }
    }

    /// Stored subscription claim; absent rows count as unsubscribed.
    pub async fn social_subscription(
        &self,
        user_id: i64,
        platform: &str,
    ) -> Result<bool, StorageError> {
        let platform = platform.to_string();
        self.call(move |conn| {
            let subscribed: Option<i64> = conn
                .query_row(
                    "SELECT subscribed FROM social_subscriptions
                     WHERE user_id = ?1 AND platform = ?2",
                    params![user_id, platform],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(subscribed == Some(1))
        })
        .await
    }

    /// Bulk clear for the maintenance tools. With `keep_admin_settings`
    /// the current password survives; otherwise it is reset to the
    /// default sentinel.
    pub async fn clear_all_data(&self, keep_admin_settings: bool) -> bool {
        let res = self
            .call(move |mut conn| {
                let kept: String = if keep_admin_settings {
                    conn.query_row(
                        "SELECT value FROM admin_settings WHERE key = 'admin_password'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?
                    .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string())
                } else {
                    DEFAULT_ADMIN_PASSWORD.to_string()
                };

                let tx = conn.transaction()?;
                tx.execute("DELETE FROM responses", [])?;
                tx.execute("DELETE FROM requests", [])?;
                tx.execute("DELETE FROM social_subscriptions", [])?;
                tx.execute("DELETE FROM users", [])?;
                tx.execute("DELETE FROM admin_settings", [])?;
                tx.execute(
                    "INSERT INTO admin_settings (key, value) VALUES ('admin_password', ?1)",
                    params![kept],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await;
        match res {
            Ok(()) => {
                info!("database cleared (keep_admin_settings: {keep_admin_settings})");
                true
            }
            Err(e) => {
                error!("failed to clear database: {e}");
                false
            }
        }
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        role: Role::parse(&row.get::<_, String>(3)?),
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("test.db")).expect("open db");
        (dir, db)
    }

    #[tokio::test]
    async fn fresh_database_has_default_password() {
        let (_dir, db) = temp_db();
        assert_eq!(db.admin_password().await.unwrap(), DEFAULT_ADMIN_PASSWORD);
    }

    #[tokio::test]
    async fn ensure_user_is_first_write_wins() {
        let (_dir, db) = temp_db();
        assert!(db.ensure_user(5, Some("ali".into()), None).await);
        assert!(db.ensure_user(5, Some("vali".into()), None).await);
        let user = db.get_user(5).await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("ali"));
        assert_eq!(user.role, Role::Regular);
    }

    #[tokio::test]
    async fn request_lifecycle_pending_then_answered() {
        let (_dir, db) = temp_db();
        db.ensure_user(555, None, Some("Bemor".into())).await;
        let id = db
            .add_request(555, 10, "tizzamda og'riq".into())
            .await
            .unwrap();

        let listed = db.user_requests(555, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].request_id, id);
        assert_eq!(listed[0].status, RequestStatus::Pending);
        assert_eq!(listed[0].body, "tizzamda og'riq");

        db.add_response(id, 777, 20, "muz qo'ying".into())
            .await
            .unwrap();
        let request = db.get_request(id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Answered);

        // A second answer is allowed and leaves the status answered.
        db.add_response(id, 778, 21, "shifokorga boring".into())
            .await
            .unwrap();
        let request = db.get_request(id).await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Answered);
        assert_eq!(
            db.user_requests(555, 10).await.unwrap()[0].status,
            RequestStatus::Answered
        );
    }

    #[tokio::test]
    async fn user_requests_newest_first_and_limited() {
        let (_dir, db) = temp_db();
        for i in 0..4 {
            db.add_request(1, i, format!("savol {i}")).await.unwrap();
        }
        let listed = db.user_requests(1, 3).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].body, "savol 3");
        assert_eq!(listed[2].body, "savol 1");
    }

    #[tokio::test]
    async fn unknown_request_is_none() {
        let (_dir, db) = temp_db();
        assert!(db.get_request(404).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn roster_upsert_is_idempotent_with_coalesce_contacts() {
        let (_dir, db) = temp_db();
        assert!(db.add_responder(42, None, None).await);
        assert!(db.add_responder(42, Some("doc".into()), None).await);

        let roster = db.responders().await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].username.as_deref(), Some("doc"));

        // A later None must not erase the stored handle, but a later name
        // fills the still-empty field.
        assert!(db.add_responder(42, None, Some("Dr. Olim".into())).await);
        let roster = db.responders().await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].username.as_deref(), Some("doc"));
        assert_eq!(roster[0].full_name.as_deref(), Some("Dr. Olim"));
    }

    #[tokio::test]
    async fn promoting_existing_user_keeps_the_row() {
        let (_dir, db) = temp_db();
        db.ensure_user(9, Some("eski".into()), Some("Eski Ism".into()))
            .await;
        assert!(db.add_responder(9, None, None).await);
        let user = db.get_user(9).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Responder);
        assert_eq!(user.username.as_deref(), Some("eski"));
    }

    #[tokio::test]
    async fn remove_responder_demotes_and_reports_not_found() {
        let (_dir, db) = temp_db();
        db.add_responder(7, None, None).await;
        assert!(db.remove_responder(7).await);
        assert_eq!(db.get_user(7).await.unwrap().unwrap().role, Role::Regular);
        // Already demoted, and never-seen ids, both report false.
        assert!(!db.remove_responder(7).await);
        assert!(!db.remove_responder(404).await);
    }

    #[tokio::test]
    async fn admin_password_round_trip() {
        let (_dir, db) = temp_db();
        assert!(db.set_admin_password("yangi-parol".into()).await);
        assert_eq!(db.admin_password().await.unwrap(), "yangi-parol");
    }

    #[tokio::test]
    async fn social_subscription_flags() {
        let (_dir, db) = temp_db();
        assert!(!db.social_subscription(1, "instagram").await.unwrap());
        assert!(db.set_social_subscription(1, "instagram", true).await);
        assert!(db.social_subscription(1, "instagram").await.unwrap());
        assert!(!db.social_subscription(1, "youtube").await.unwrap());
        assert!(db.set_social_subscription(1, "instagram", false).await);
        assert!(!db.social_subscription(1, "instagram").await.unwrap());
    }

    #[tokio::test]
    async fn partial_clear_preserves_password_full_clear_resets() {
        let (_dir, db) = temp_db();
        db.set_admin_password("sirli".into()).await;
        db.ensure_user(1, None, None).await;
        db.add_request(1, 1, "savol".into()).await.unwrap();
        db.set_social_subscription(1, "youtube", true).await;

        assert!(db.clear_all_data(true).await);
        assert!(db.get_user(1).await.unwrap().is_none());
        assert!(db.user_requests(1, 10).await.unwrap().is_empty());
        assert!(!db.social_subscription(1, "youtube").await.unwrap());
        assert_eq!(db.admin_password().await.unwrap(), "sirli");

        assert!(db.clear_all_data(false).await);
        assert_eq!(db.admin_password().await.unwrap(), DEFAULT_ADMIN_PASSWORD);
    }
}
