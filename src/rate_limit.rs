use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Expired keys are swept after this many checks.
const SWEEP_EVERY: usize = 1024;

struct Hits {
    window: Duration,
    at: VecDeque<Instant>,
}

impl Hits {
    fn expired(&self, now: Instant) -> bool {
        self.at.back().map_or(true, |t| now.duration_since(*t) >= self.window)
    }
}

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, Hits>>,
    checks: Arc<AtomicUsize>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), checks: Arc::new(AtomicUsize::new(0)), enabled }
    }

    /// Records a hit for `key` and reports whether it fits in `limit` hits per `window`.
    /// Denied hits are not recorded.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        // sweep before taking an entry; retain locks every shard
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_at(now);
        }
        let mut hits = self.store
            .entry(key.to_owned())
            .or_insert_with(|| Hits { window, at: VecDeque::new() });
        hits.window = window;
        while hits.at.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.at.pop_front();
        }
        let allowed = hits.at.len() < limit;
        if allowed { hits.at.push_back(now); }
        let drained = hits.at.is_empty();
        drop(hits);
        if drained {
            self.store.remove_if(key, |_, h| h.at.is_empty());
        }
        allowed
    }

    /// Drops keys whose newest hit has left its window.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        self.store.retain(|_, h| !h.expired(now));
    }

    /// Number of keys currently holding hits.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// Per-action limits.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub thread_limit: usize,
    pub thread_window: Duration,
    pub reply_limit: usize,
    pub reply_window: Duration,
    pub report_limit: usize,
    pub report_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            thread_limit: 1,
            thread_window: Duration::from_secs(60),
            reply_limit: 10,
            reply_window: Duration::from_secs(60),
            report_limit: 20,
            report_window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize { std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default) }
        fn dur_env(name: &str, default: Duration) -> Duration {
            std::env::var(name).ok().and_then(|v| v.parse().ok()).map(Duration::from_secs).unwrap_or(default)
        }
        let d = Self::default();
        Self {
            enabled: std::env::var("RL_ENABLED").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(d.enabled),
            thread_limit: usize_env("RL_THREAD_LIMIT", d.thread_limit),
            thread_window: dur_env("RL_THREAD_WINDOW", d.thread_window),
            reply_limit: usize_env("RL_REPLY_LIMIT", d.reply_limit),
            reply_window: dur_env("RL_REPLY_WINDOW", d.reply_window),
            report_limit: usize_env("RL_REPORT_LIMIT", d.report_limit),
            report_window: dur_env("RL_REPORT_WINDOW", d.report_window),
        }
    }
}

/// High level guard used by handlers.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }
    pub fn from_config(cfg: RateLimitConfig) -> Self { Self::new(InMemoryRateLimiter::new(cfg.enabled), cfg) }
    pub fn allow_thread(&self, ip: &str) -> bool { self.limiter.check(&format!("thread:{ip}"), self.cfg.thread_limit, self.cfg.thread_window) }
    pub fn allow_reply(&self, ip: &str) -> bool { self.limiter.check(&format!("reply:{ip}"), self.cfg.reply_limit, self.cfg.reply_window) }
    pub fn allow_report(&self, ip: &str) -> bool { self.limiter.check(&format!("report:{ip}"), self.cfg.report_limit, self.cfg.report_window) }
}
