//! Resolve a user's task reference against the list they were shown

use serde::Serialize;
use taskstore::Task;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Largest number accepted at either end of an "a-b" range
pub const MAX_RANGE_END: u32 = 50;

/// Reference tokens shorter than this are ignored by fuzzy matching
const MIN_FUZZY_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MatchMethod {
    /// 1-based position in the snapshot
    Position,
    /// Literal stable id
    Id,
    /// Case-insensitive substring of title or description
    Substring,
    /// Shared keywords; `candidates` counts every task that matched
    Fuzzy { ambiguous: bool, candidates: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved {
    pub task: Task,
    pub method: MatchMethod,
}

impl Resolved {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.method, MatchMethod::Fuzzy { ambiguous: true, .. })
    }
}

/// Find the task a reference points at
///
/// Strategies in order: number (position, then id), substring, fuzzy
/// keywords. Several fuzzy candidates resolve to the first in snapshot order
/// and are flagged ambiguous.
pub fn resolve(reference: &str, snapshot: &[Task]) -> Option<Resolved> {
    let reference = reference.trim();
    debug!(%reference, tasks = snapshot.len(), "resolve: called");
    if reference.is_empty() {
        return None;
    }

    if let Some(n) = parse_digits::<i64>(reference) {
        if n >= 1
            && let Some(task) = snapshot.get((n - 1) as usize)
        {
            return Some(Resolved {
                task: task.clone(),
                method: MatchMethod::Position,
            });
        }
        return snapshot.iter().find(|t| t.id == n).map(|task| Resolved {
            task: task.clone(),
            method: MatchMethod::Id,
        });
    }

    let needle = reference.to_lowercase();
    if let Some(task) = snapshot.iter().find(|t| t.content().to_lowercase().contains(&needle)) {
        return Some(Resolved {
            task: task.clone(),
            method: MatchMethod::Substring,
        });
    }

    fuzzy_match(&needle, snapshot)
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_FUZZY_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

fn fuzzy_match(reference: &str, snapshot: &[Task]) -> Option<Resolved> {
    let wanted = tokens(reference);
    if wanted.is_empty() {
        return None;
    }

    let matched: Vec<&Task> = snapshot
        .iter()
        .filter(|task| {
            let have = tokens(&task.content());
            wanted.iter().any(|w| have.contains(w))
        })
        .collect();

    let candidates = matched.len();
    let task = matched.first()?;
    debug!(candidates, "fuzzy_match: matched");
    Some(Resolved {
        task: (*task).clone(),
        method: MatchMethod::Fuzzy {
            ambiguous: candidates > 1,
            candidates,
        },
    })
}

/// Resolve or explain why not
///
/// Ambiguous fuzzy matches are refused unless `allow_ambiguous`.
pub fn resolve_strict(reference: &str, snapshot: &[Task], allow_ambiguous: bool) -> CoreResult<Resolved> {
    let resolved = resolve(reference, snapshot).ok_or_else(|| CoreError::NotFound {
        reference: reference.to_string(),
        candidates: snapshot.iter().take(5).map(|t| t.title.clone()).collect(),
    })?;
    if resolved.is_ambiguous() && !allow_ambiguous {
        let wanted = tokens(reference);
        let candidates = snapshot
            .iter()
            .filter(|t| {
                let have = tokens(&t.content());
                wanted.iter().any(|w| have.contains(w))
            })
            .map(|t| t.title.clone())
            .collect();
        return Err(CoreError::Ambiguous {
            reference: reference.to_string(),
            candidates,
        });
    }
    Ok(resolved)
}

/// Split a batch reference
///
/// Comma lists are split as written; a lone "a-b" range with
/// 1 <= a <= b <= 50 expands inclusively; anything else is one reference.
pub fn parse_batch_references(input: &str) -> Vec<String> {
    let trimmed = input.trim();
    if trimmed.contains(',') {
        return trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some((a, b)) = parse_range(trimmed) {
        return (a..=b).map(|n| n.to_string()).collect();
    }
    vec![trimmed.to_string()]
}

/// Parse a plain run of ASCII digits; signs and other prefixes are rejected
fn parse_digits<T: std::str::FromStr>(input: &str) -> Option<T> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

fn parse_range(input: &str) -> Option<(u32, u32)> {
    let (a, b) = input.split_once('-')?;
    let a: u32 = parse_digits(a.trim())?;
    let b: u32 = parse_digits(b.trim())?;
    (1 <= a && a <= b && b <= MAX_RANGE_END).then_some((a, b))
}
