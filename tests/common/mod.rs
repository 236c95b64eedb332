#![allow(dead_code)]

use std::sync::Arc;

use anonboard::password::{Argon2Hasher, HashParams};
use anonboard::rate_limit::RateLimiterFacade;
use anonboard::repo::inmem::InMemRepo;
use anonboard::{AppState, BoardStore};

/// Argon2 with minimal cost so tests stay fast.
pub fn cheap_hasher() -> Arc<Argon2Hasher> {
    Arc::new(Argon2Hasher::new(HashParams { memory_kib: 1024, iterations: 1, parallelism: 1 }).unwrap())
}

pub fn store_over(repo: InMemRepo) -> BoardStore {
    BoardStore::new(Arc::new(repo), cheap_hasher())
}

pub fn store() -> BoardStore {
    store_over(InMemRepo::new())
}

pub fn state(rate_limiter: Option<RateLimiterFacade>) -> AppState {
    AppState { board: store(), rate_limiter }
}
