use chrono::{DateTime, Utc};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

/// Thread documents. Every returned `Thread` carries its full reply list.
#[async_trait]
pub trait ThreadRepo: Send + Sync {
    /// Newest-bumped first, at most `limit`.
    async fn list_threads(&self, board: &str, limit: usize) -> RepoResult<Vec<Thread>>;
    async fn insert_thread(&self, thread: Thread) -> RepoResult<Thread>;
    async fn get_thread(&self, id: Id) -> RepoResult<Thread>;
    async fn report_thread(&self, id: Id) -> RepoResult<()>;
    /// Removes the thread together with its replies.
    async fn delete_thread(&self, id: Id) -> RepoResult<()>;
}

/// Reply subdocuments, always addressed through their parent thread.
#[async_trait]
pub trait ReplyRepo: Send + Sync {
    /// Appends `reply` and bumps the thread to `reply.created_on`.
    async fn push_reply(&self, thread_id: Id, reply: Reply) -> RepoResult<Thread>;
    async fn report_reply(&self, thread_id: Id, reply_id: Id) -> RepoResult<()>;
    async fn set_reply_text(&self, thread_id: Id, reply_id: Id, text: &str, at: DateTime<Utc>) -> RepoResult<()>;
}

pub trait Repo: ThreadRepo + ReplyRepo {}

impl<T> Repo for T where T: ThreadRepo + ReplyRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Serialize, Deserialize};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
    use tracing::{info, warn, error};

    pub const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Clone, Default, Serialize, Deserialize)]
    struct State {
        threads: Vec<Thread>, // insertion order
    }

    impl State {
        fn thread_mut(&mut self, id: Id) -> RepoResult<&mut Thread> {
            self.threads.iter_mut().find(|t| t.id == id).ok_or(RepoError::NotFound)
        }
    }

    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        /// Ephemeral store, nothing touches disk.
        pub fn new() -> Self { Self::default() }

        /// Store backed by `<dir>/state.json`: loaded now, rewritten after every write.
        pub fn with_snapshot_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), threads = s.threads.len(), "loaded snapshot");
                        s
                    }
                    Err(e) => {
                        error!(path = %path.display(), "failed to parse snapshot: {e}; starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), "no snapshot: {e}; starting empty");
                    State::default()
                }
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        /// Applies `f` to the state. With a snapshot configured the change is
        /// made on a copy, written to disk, and only then committed, so a
        /// failed write leaves memory and disk as they were.
        fn update<T>(&self, f: impl FnOnce(&mut State) -> RepoResult<T>) -> RepoResult<T> {
            let mut guard = self.write()?;
            let Some(path) = self.snapshot_path.as_deref() else { return f(&mut *guard) };
            let mut next = (*guard).clone();
            let out = f(&mut next)?;
            // the write lock is held until the rename, so writers never race on the file
            Self::persist(path, &next)?;
            *guard = next;
            Ok(out)
        }

        // Written next to the snapshot and renamed over it; a crash mid-write
        // leaves the previous snapshot intact.
        fn persist(path: &Path, state: &State) -> RepoResult<()> {
            let fail = |e: std::io::Error| {
                error!(path = %path.display(), "failed to write snapshot: {e}");
                RepoError::Internal(e.to_string())
            };
            let bytes = serde_json::to_vec_pretty(state).map_err(|e| RepoError::Internal(e.to_string()))?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir).map_err(fail)?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, bytes).map_err(fail)?;
            std::fs::rename(&tmp, path).map_err(fail)
        }
    }

    #[async_trait]
    impl ThreadRepo for InMemRepo {
        async fn list_threads(&self, board: &str, limit: usize) -> RepoResult<Vec<Thread>> {
            let s = self.read()?;
            // newest inserted first so equal bump times favour the newer thread
            let mut v: Vec<_> = s.threads.iter().rev()
                .filter(|t| t.board == board)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.bumped_on.cmp(&a.bumped_on)); // stable, latest first
            v.truncate(limit);
            Ok(v)
        }
        async fn insert_thread(&self, thread: Thread) -> RepoResult<Thread> {
            self.update(|s| {
                s.threads.push(thread.clone());
                Ok(thread)
            })
        }
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            let s = self.read()?;
            s.threads.iter().find(|t| t.id == id).cloned().ok_or(RepoError::NotFound)
        }
        async fn report_thread(&self, id: Id) -> RepoResult<()> {
            self.update(|s| {
                s.thread_mut(id)?.reported = true;
                Ok(())
            })
        }
        async fn delete_thread(&self, id: Id) -> RepoResult<()> {
            self.update(|s| {
                let before = s.threads.len();
                s.threads.retain(|t| t.id != id);
                if s.threads.len() == before { return Err(RepoError::NotFound); }
                Ok(())
            })
        }
    }

    #[async_trait]
    impl ReplyRepo for InMemRepo {
        async fn push_reply(&self, thread_id: Id, reply: Reply) -> RepoResult<Thread> {
            self.update(|s| {
                let th = s.thread_mut(thread_id)?;
                th.bumped_on = reply.created_on;
                th.replies.push(reply);
                Ok(th.clone())
            })
        }
        async fn report_reply(&self, thread_id: Id, reply_id: Id) -> RepoResult<()> {
            self.update(|s| {
                let th = s.thread_mut(thread_id)?;
                let reply = th.replies.iter_mut().find(|r| r.id == reply_id).ok_or(RepoError::NotFound)?;
                reply.reported = true;
                Ok(())
            })
        }
        async fn set_reply_text(&self, thread_id: Id, reply_id: Id, text: &str, at: DateTime<Utc>) -> RepoResult<()> {
            self.update(|s| {
                let th = s.thread_mut(thread_id)?;
                let reply = th.replies.iter_mut().find(|r| r.id == reply_id).ok_or(RepoError::NotFound)?;
                reply.text = text.to_string();
                reply.bumped_on = at;
                Ok(())
            })
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use std::collections::HashMap;
    use sqlx::{Pool, Postgres};

    fn internal(e: sqlx::Error) -> RepoError {
        tracing::error!("postgres error: {e}");
        RepoError::Internal(e.to_string())
    }

    #[derive(sqlx::FromRow)]
    struct ReplyRow {
        thread_id: Id,
        #[sqlx(flatten)]
        reply: Reply,
    }

    const THREAD_COLS: &str = "id, board, text, created_on, bumped_on, reported, delete_password_hash";
    const REPLY_COLS: &str = "thread_id, id, text, created_on, bumped_on, reported, delete_password_hash";

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }

        /// Fills `replies` on each thread, ordered by insertion.
        async fn attach_replies(&self, threads: &mut [Thread]) -> RepoResult<()> {
            if threads.is_empty() { return Ok(()); }
            let ids: Vec<Id> = threads.iter().map(|t| t.id).collect();
            let rows = sqlx::query_as::<_, ReplyRow>(&format!(
                "SELECT {REPLY_COLS} FROM replies WHERE thread_id = ANY($1) ORDER BY seq ASC"
            ))
                .bind(&ids)
                .fetch_all(&self.pool).await.map_err(internal)?;
            let mut by_thread: HashMap<Id, Vec<Reply>> = HashMap::new();
            for row in rows {
                by_thread.entry(row.thread_id).or_default().push(row.reply);
            }
            for t in threads.iter_mut() {
                t.replies = by_thread.remove(&t.id).unwrap_or_default();
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ThreadRepo for PgRepo {
        async fn list_threads(&self, board: &str, limit: usize) -> RepoResult<Vec<Thread>> {
            let mut threads = sqlx::query_as::<_, Thread>(&format!(
                "SELECT {THREAD_COLS} FROM threads WHERE board = $1 ORDER BY bumped_on DESC, created_on DESC LIMIT $2"
            ))
                .bind(board)
                .bind(limit as i64)
                .fetch_all(&self.pool).await.map_err(internal)?;
            self.attach_replies(&mut threads).await?;
            Ok(threads)
        }
        async fn insert_thread(&self, thread: Thread) -> RepoResult<Thread> {
            sqlx::query(&format!("INSERT INTO threads ({THREAD_COLS}) VALUES ($1,$2,$3,$4,$5,$6,$7)"))
                .bind(thread.id)
                .bind(&thread.board)
                .bind(&thread.text)
                .bind(thread.created_on)
                .bind(thread.bumped_on)
                .bind(thread.reported)
                .bind(&thread.delete_password_hash)
                .execute(&self.pool).await.map_err(internal)?;
            Ok(thread)
        }
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            let thread = sqlx::query_as::<_, Thread>(&format!("SELECT {THREAD_COLS} FROM threads WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool).await.map_err(internal)?
                .ok_or(RepoError::NotFound)?;
            let mut one = [thread];
            self.attach_replies(&mut one).await?;
            let [thread] = one;
            Ok(thread)
        }
        async fn report_thread(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE threads SET reported = TRUE WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn delete_thread(&self, id: Id) -> RepoResult<()> {
            // replies go with it (ON DELETE CASCADE)
            let res = sqlx::query("DELETE FROM threads WHERE id = $1")
                .bind(id)
                .execute(&self.pool).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl ReplyRepo for PgRepo {
        async fn push_reply(&self, thread_id: Id, reply: Reply) -> RepoResult<Thread> {
            let mut tx = self.pool.begin().await.map_err(internal)?;
            let bumped = sqlx::query("UPDATE threads SET bumped_on = $2 WHERE id = $1")
                .bind(thread_id)
                .bind(reply.created_on)
                .execute(&mut *tx).await.map_err(internal)?;
            if bumped.rows_affected() == 0 { return Err(RepoError::NotFound); } // tx rolls back on drop
            sqlx::query(&format!("INSERT INTO replies ({REPLY_COLS}) VALUES ($1,$2,$3,$4,$5,$6,$7)"))
                .bind(thread_id)
                .bind(reply.id)
                .bind(&reply.text)
                .bind(reply.created_on)
                .bind(reply.bumped_on)
                .bind(reply.reported)
                .bind(&reply.delete_password_hash)
                .execute(&mut *tx).await.map_err(internal)?;
            tx.commit().await.map_err(internal)?;
            self.get_thread(thread_id).await
        }
        async fn report_reply(&self, thread_id: Id, reply_id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE replies SET reported = TRUE WHERE thread_id = $1 AND id = $2")
                .bind(thread_id)
                .bind(reply_id)
                .execute(&self.pool).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
        async fn set_reply_text(&self, thread_id: Id, reply_id: Id, text: &str, at: DateTime<Utc>) -> RepoResult<()> {
            let res = sqlx::query("UPDATE replies SET text = $3, bumped_on = $4 WHERE thread_id = $1 AND id = $2")
                .bind(thread_id)
                .bind(reply_id)
                .bind(text)
                .bind(at)
                .execute(&self.pool).await.map_err(internal)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }
}
