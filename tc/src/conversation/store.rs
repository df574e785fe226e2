//! Per-user session storage
//!
//! Pending tasks, conversation sessions and pending selections are each kept
//! in a [`SessionStore`] keyed by user id. The engine only talks to the trait,
//! so the in-memory map can be replaced by a shared store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

/// A session value that knows when it was last touched
pub trait Expiring {
    fn last_activity(&self) -> NaiveDateTime;

    /// Idle for strictly longer than `ttl`
    fn is_expired(&self, now: NaiveDateTime, ttl: Duration) -> bool {
        now - self.last_activity() > ttl
    }
}

/// Keyed session storage with explicit expiry sweeps
pub trait SessionStore<T>: Send + Sync {
    fn get(&self, user_id: &str) -> Option<T>;

    fn set(&self, user_id: &str, value: T);

    /// Remove and return the session
    fn delete(&self, user_id: &str) -> Option<T>;

    /// Remove every session idle longer than `ttl`, returning their user ids
    fn sweep_expired(&self, now: NaiveDateTime, ttl: Duration) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local session store
#[derive(Debug)]
pub struct MemorySessionStore<T> {
    sessions: Mutex<HashMap<String, T>>,
}

impl<T> Default for MemorySessionStore<T> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> MemorySessionStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, T>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<T> SessionStore<T> for MemorySessionStore<T>
where
    T: Expiring + Clone + Send,
{
    fn get(&self, user_id: &str) -> Option<T> {
        self.lock().get(user_id).cloned()
    }

    fn set(&self, user_id: &str, value: T) {
        self.lock().insert(user_id.to_string(), value);
    }

    fn delete(&self, user_id: &str) -> Option<T> {
        self.lock().remove(user_id)
    }

    fn sweep_expired(&self, now: NaiveDateTime, ttl: Duration) -> Vec<String> {
        let mut sessions = self.lock();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, v)| v.is_expired(now, ttl))
            .map(|(k, _)| k.clone())
            .collect();
        for user_id in &expired {
            sessions.remove(user_id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "sweep_expired: removed sessions");
        }
        expired
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[derive(Debug, Clone)]
    struct Touched(NaiveDateTime);

    impl Expiring for Touched {
        fn last_activity(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_users_do_not_share_sessions() {
        let store = MemorySessionStore::new();
        store.set("a", Touched(at(9, 0)));
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());
        assert!(store.delete("a").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_idle_sessions() {
        let store = MemorySessionStore::new();
        store.set("idle", Touched(at(9, 0)));
        store.set("edge", Touched(at(9, 5)));
        store.set("fresh", Touched(at(9, 8)));

        let expired = store.sweep_expired(at(9, 10), Duration::minutes(5));

        assert_eq!(expired, vec!["idle".to_string()]);
        assert_eq!(store.len(), 2);
    }
}
