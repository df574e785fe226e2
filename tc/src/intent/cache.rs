//! Bounded, per-user cache of remote classification results

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::config::{CacheConfig, secs_duration};
use crate::domain::{ParseResult, ParseSource};

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ParseResult,
    timestamp: NaiveDateTime,
    usage_count: u64,
}

/// LFU-ish cache with TTL; overflow drops the least used, oldest entries
#[derive(Debug)]
pub struct ClassifierCache {
    entries: HashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
    min_confidence: f64,
    eviction_fraction: f64,
}

impl ClassifierCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: config.capacity,
            ttl: secs_duration(config.ttl_secs),
            min_confidence: config.min_confidence,
            eviction_fraction: config.eviction_fraction.clamp(0.0, 1.0),
        }
    }

    /// Case-folded, whitespace-collapsed message scoped to a user
    pub fn key(user_id: &str, message: &str) -> String {
        let normalized = message.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
        format!("{}\u{1f}{}", user_id, normalized)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Look up a cached result, bumping its usage count
    pub fn get(&mut self, user_id: &str, message: &str, now: NaiveDateTime) -> Option<ParseResult> {
        let key = Self::key(user_id, message);
        let expired = match self.entries.get(&key) {
            None => return None,
            Some(entry) => now - entry.timestamp > self.ttl,
        };
        if expired {
            debug!("ClassifierCache::get: entry expired");
            self.entries.remove(&key);
            return None;
        }
        let entry = self.entries.get_mut(&key)?;
        entry.usage_count += 1;
        debug!(usage = entry.usage_count, "ClassifierCache::get: hit");
        Some(entry.result.clone().with_source(ParseSource::Cache))
    }

    /// Store a result; returns false when it is not confident enough to keep
    pub fn insert(&mut self, user_id: &str, message: &str, result: ParseResult, now: NaiveDateTime) -> bool {
        if result.confidence() < self.min_confidence || self.capacity == 0 {
            debug!(confidence = result.confidence(), "ClassifierCache::insert: not cached");
            return false;
        }
        let key = Self::key(user_id, message);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.purge_expired(now);
            if self.entries.len() >= self.capacity {
                self.evict();
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                result,
                timestamp: now,
                usage_count: 0,
            },
        );
        true
    }

    /// Drop every entry older than the TTL
    pub fn purge_expired(&mut self, now: NaiveDateTime) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, e| now - e.timestamp <= ttl);
        before - self.entries.len()
    }

    /// Remove the lowest (usage_count, timestamp) share of entries
    fn evict(&mut self) {
        let count = ((self.entries.len() as f64 * self.eviction_fraction).ceil() as usize).max(1);
        let mut ranked: Vec<(u64, NaiveDateTime, String)> = self
            .entries
            .iter()
            .map(|(k, e)| (e.usage_count, e.timestamp, k.clone()))
            .collect();
        ranked.sort();
        for (_, _, key) in ranked.into_iter().take(count) {
            self.entries.remove(&key);
        }
        debug!(evicted = count, remaining = self.entries.len(), "ClassifierCache::evict: done");
    }
}
