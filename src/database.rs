use anyhow::Result;
use libsql::{Builder, Connection};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::RwLock;

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id             TEXT    PRIMARY KEY,
    username       TEXT    UNIQUE NOT NULL,
    email          TEXT    UNIQUE NOT NULL,
    password_hash  TEXT    NOT NULL,
    created_at     TEXT    NOT NULL
);
"#;

const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    FOREIGN KEY (user_id) REFERENCES users(id)
);
"#;

const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    description   TEXT,
    adult_budget  REAL NOT NULL,
    child_budget  REAL NOT NULL,
    general_costs REAL NOT NULL DEFAULT 0,
    creator_id    TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    FOREIGN KEY (creator_id) REFERENCES users(id)
);
"#;

const CREATE_PARTICIPANTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS participants (
    id            TEXT PRIMARY KEY,
    event_id      TEXT NOT NULL,
    name          TEXT NOT NULL,
    type          TEXT NOT NULL,
    custom_budget REAL,
    is_couple     INTEGER NOT NULL DEFAULT 0,
    partner_id    TEXT,
    user_id       TEXT,
    FOREIGN KEY (event_id) REFERENCES events(id)
);
"#;

const CREATE_PAYMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    id             TEXT PRIMARY KEY,
    event_id       TEXT NOT NULL,
    amount         REAL NOT NULL,
    payer_name     TEXT,
    note           TEXT,
    participant_id TEXT,
    created_at     TEXT NOT NULL,
    FOREIGN KEY (event_id) REFERENCES events(id)
);
"#;

const CREATE_EVENTS_CREATOR_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_events_creator ON events(creator_id);
"#;

const CREATE_PARTICIPANTS_EVENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_participants_event ON participants(event_id);
"#;

const CREATE_PAYMENTS_EVENT_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_payments_event ON payments(event_id);
"#;

const CREATE_SESSIONS_USER_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
"#;

pub type Db = Arc<RwLock<Connection>>;

/// Opens (and migrates) the application database at `<data_dir>/events.db`.
pub async fn init_db(data_dir: &str) -> Result<Db> {
    tokio::fs::create_dir_all(data_dir).await?;
    let path = Path::new(data_dir).join("events.db");
    let db = Builder::new_local(path).build().await?;
    let conn = db.connect()?;

    conn.execute(CREATE_USERS_TABLE, ()).await?;
    conn.execute(CREATE_SESSIONS_TABLE, ()).await?;
    conn.execute(CREATE_EVENTS_TABLE, ()).await?;
    conn.execute(CREATE_PARTICIPANTS_TABLE, ()).await?;
    conn.execute(CREATE_PAYMENTS_TABLE, ()).await?;
    conn.execute(CREATE_EVENTS_CREATOR_INDEX, ()).await?;
    conn.execute(CREATE_PARTICIPANTS_EVENT_INDEX, ()).await?;
    conn.execute(CREATE_PAYMENTS_EVENT_INDEX, ()).await?;
    conn.execute(CREATE_SESSIONS_USER_INDEX, ()).await?;

    Ok(Arc::new(RwLock::new(conn)))
}

/// Errors that can occur during transaction management
#[derive(Debug)]
pub enum TransactionError {
    Begin,
    Commit,
}

impl From<TransactionError> for (axum::http::StatusCode, String) {
    fn from(e: TransactionError) -> Self {
        let context = match e {
            TransactionError::Begin => "failed to begin transaction",
            TransactionError::Commit => "failed to commit transaction",
        };
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Database error: {}", context),
        )
    }
}

/// Execute a function within a database transaction, returning handler-compatible errors.
///
/// The closure must return a boxed future to handle lifetime issues with async closures.
pub async fn with_transaction<F, T, E>(db_conn: &Db, f: F) -> Result<T, E>
where
    F: for<'a> FnOnce(&'a Connection) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>,
    E: From<TransactionError>,
{
    // Acquire write lock for exclusive access during transaction
    let conn = db_conn.write().await;

    conn.execute("BEGIN TRANSACTION", ())
        .await
        .map_err(|_| TransactionError::Begin)?;

    match f(&*conn).await {
        Ok(result) => {
            conn.execute("COMMIT", ())
                .await
                .map_err(|_| TransactionError::Commit)?;
            Ok(result)
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK", ()).await;
            Err(e)
        }
    }
}
