pub mod auth;
pub mod budget;
pub mod client;
pub mod config;
pub mod constants;
pub mod database;
pub mod events;
pub mod forms;
pub mod models;
pub mod participants;
pub mod payments;
pub mod utils;

// Re-export types at crate root for convenient importing
pub use crate::database::{Db, TransactionError, with_transaction};

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
}
