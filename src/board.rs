//! Board store: posting, listing, reporting and deleting threads and replies.
//!
//! Handlers talk to this layer only. It owns the redaction rules (callers get
//! [`ThreadSummary`] / [`ThreadView`], never a stored [`Thread`]) and the
//! delete-password checks.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::*;
use crate::password::{PasswordError, PasswordHasher};
use crate::repo::{Repo, RepoError};

#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    #[error("missing required field: {0}")]
    Validation(&'static str),
    #[error("not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(RepoError),
    #[error("hashing error: {0}")]
    Hashing(String),
}

impl From<RepoError> for BoardError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => BoardError::NotFound,
            other => BoardError::Store(other),
        }
    }
}

impl From<PasswordError> for BoardError {
    fn from(e: PasswordError) -> Self { BoardError::Hashing(e.to_string()) }
}

pub type BoardResult<T> = Result<T, BoardError>;

/// Result of a password-checked delete. A wrong password is an expected
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Success,
    IncorrectPassword,
}

impl DeleteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeleteOutcome::Success => "success",
            DeleteOutcome::IncorrectPassword => "incorrect password",
        }
    }
}

#[derive(Clone)]
pub struct BoardStore {
    repo: Arc<dyn Repo>,
    hasher: Arc<dyn PasswordHasher>,
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> BoardResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BoardError::Validation(field)),
    }
}

/// Client supplied id. Anything that does not parse cannot name a record.
fn parse_id(value: Option<&str>, field: &'static str) -> BoardResult<Id> {
    let raw = required(value, field)?;
    Uuid::parse_str(raw.trim()).map_err(|_| BoardError::NotFound)
}

impl BoardStore {
    pub fn new(repo: Arc<dyn Repo>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { repo, hasher }
    }

    // Argon2 is CPU bound; keep it off the async workers.
    async fn hash(&self, plain: &str) -> BoardResult<String> {
        let hasher = self.hasher.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| BoardError::Hashing(e.to_string()))?
            .map_err(BoardError::from)
    }

    async fn verify(&self, plain: &str, hash: &str) -> BoardResult<bool> {
        let hasher = self.hasher.clone();
        let (plain, hash) = (plain.to_owned(), hash.to_owned());
        tokio::task::spawn_blocking(move || hasher.verify(&plain, &hash))
            .await
            .map_err(|e| BoardError::Hashing(e.to_string()))
    }

    pub async fn create_thread(&self, board: &str, text: Option<&str>, password: Option<&str>) -> BoardResult<Thread> {
        let text = required(text, "text")?;
        let password = required(password, "delete_password")?;
        let delete_password_hash = self.hash(password).await?;
        let now = Utc::now();
        let thread = self.repo.insert_thread(Thread {
            id: Uuid::new_v4(),
            board: board.to_string(),
            text: text.to_string(),
            created_on: now,
            bumped_on: now,
            reported: false,
            delete_password_hash,
            replies: Vec::new(),
        }).await?;
        metrics::increment_counter!("board_threads_created_total");
        info!(board, thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    pub async fn list_threads(&self, board: &str) -> BoardResult<Vec<ThreadSummary>> {
        let threads = self.repo.list_threads(board, BOARD_PAGE_SIZE).await?;
        Ok(threads.iter().map(Thread::summary).collect())
    }

    /// Fails with `NotFound` when the thread is missing; nothing is created.
    pub async fn create_reply(&self, thread_id: Option<&str>, text: Option<&str>, password: Option<&str>) -> BoardResult<Thread> {
        let thread_id = parse_id(thread_id, "thread_id")?;
        let text = required(text, "text")?;
        let password = required(password, "delete_password")?;
        let delete_password_hash = self.hash(password).await?;
        let now = Utc::now();
        let reply = Reply {
            id: Uuid::new_v4(),
            text: text.to_string(),
            created_on: now,
            bumped_on: now,
            reported: false,
            delete_password_hash,
        };
        let reply_id = reply.id;
        let thread = self.repo.push_reply(thread_id, reply).await?;
        metrics::increment_counter!("board_replies_created_total");
        info!(thread_id = %thread_id, reply_id = %reply_id, "reply created");
        Ok(thread)
    }

    pub async fn get_thread_with_replies(&self, thread_id: Option<&str>) -> BoardResult<ThreadView> {
        let thread_id = parse_id(thread_id, "thread_id")?;
        Ok(self.repo.get_thread(thread_id).await?.view())
    }

    pub async fn report_thread(&self, thread_id: Option<&str>) -> BoardResult<()> {
        let thread_id = parse_id(thread_id, "thread_id")?;
        self.repo.report_thread(thread_id).await?;
        metrics::increment_counter!("board_reports_total", "target" => "thread");
        debug!(thread_id = %thread_id, "thread reported");
        Ok(())
    }

    pub async fn report_reply(&self, thread_id: Option<&str>, reply_id: Option<&str>) -> BoardResult<()> {
        let thread_id = parse_id(thread_id, "thread_id")?;
        let reply_id = parse_id(reply_id, "reply_id")?;
        self.repo.report_reply(thread_id, reply_id).await?;
        metrics::increment_counter!("board_reports_total", "target" => "reply");
        debug!(thread_id = %thread_id, reply_id = %reply_id, "reply reported");
        Ok(())
    }

    /// Hard delete: the thread and every reply are removed.
    pub async fn delete_thread(&self, thread_id: Option<&str>, password: Option<&str>) -> BoardResult<DeleteOutcome> {
        let thread_id = parse_id(thread_id, "thread_id")?;
        let password = required(password, "delete_password")?;
        let thread = self.repo.get_thread(thread_id).await?;
        let outcome = if self.verify(password, &thread.delete_password_hash).await? {
            self.repo.delete_thread(thread_id).await?;
            info!(thread_id = %thread_id, "thread deleted");
            DeleteOutcome::Success
        } else {
            DeleteOutcome::IncorrectPassword
        };
        metrics::increment_counter!("board_deletions_total", "target" => "thread", "outcome" => outcome.as_str());
        Ok(outcome)
    }

    /// Soft delete: the reply keeps its place and id, only its text changes.
    pub async fn delete_reply(&self, thread_id: Option<&str>, reply_id: Option<&str>, password: Option<&str>) -> BoardResult<DeleteOutcome> {
        let thread_id = parse_id(thread_id, "thread_id")?;
        let reply_id = parse_id(reply_id, "reply_id")?;
        let password = required(password, "delete_password")?;
        let thread = self.repo.get_thread(thread_id).await?;
        let reply = thread.reply(reply_id).ok_or(BoardError::NotFound)?;
        let outcome = if self.verify(password, &reply.delete_password_hash).await? {
            self.repo.set_reply_text(thread_id, reply_id, DELETED_TEXT, Utc::now()).await?;
            info!(thread_id = %thread_id, reply_id = %reply_id, "reply deleted");
            DeleteOutcome::Success
        } else {
            DeleteOutcome::IncorrectPassword
        };
        metrics::increment_counter!("board_deletions_total", "target" => "reply", "outcome" => outcome.as_str());
        Ok(outcome)
    }
}
