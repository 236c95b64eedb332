pub mod board;
pub mod config;
pub mod error;
pub mod models;
pub mod openapi;
pub mod password;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod security;

// Re-export commonly used items for tests / external users
pub use board::{BoardStore, DeleteOutcome};
pub use routes::{config, AppState};
pub use security::SecurityHeaders;
