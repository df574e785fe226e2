//! TargetSelector - picks where a finished task is saved

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use super::preferences::UserPreference;
use super::rules::{self, pattern_key, shared_terms};
use super::{Selection, SelectionOption, SelectionSource, TargetKind};
use crate::clock::Clock;
use crate::config::SelectorConfig;
use crate::domain::clamp_confidence;

const LEARNED_BASE: f64 = 0.5;
const LEARNED_STEP: f64 = 0.1;
const FUZZY_CONFIDENCE: f64 = 0.6;
const FUZZY_MIN_SHARED: usize = 2;
const HEURISTIC_CONFIDENCE: f64 = 0.5;
const USER_DEFAULT_CONFIDENCE: f64 = 0.6;
const FALLBACK_CONFIDENCE: f64 = 0.4;

pub struct TargetSelector {
    config: SelectorConfig,
    preferences: Mutex<HashMap<String, UserPreference>>,
    clock: Arc<dyn Clock>,
}

/// A destination before availability is checked
struct Candidate {
    kind: TargetKind,
    id: Option<String>,
    confidence: f64,
    source: SelectionSource,
    reasoning: String,
}

impl TargetSelector {
    pub fn new(config: SelectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            preferences: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserPreference>> {
        self.preferences.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of one user's learned preferences
    pub fn preference(&self, user_id: &str) -> Option<UserPreference> {
        self.lock().get(user_id).cloned()
    }

    /// Choose a calendar or task list for a message
    pub fn select(
        &self,
        message: &str,
        user_id: &str,
        calendars: &[SelectionOption],
        task_lists: &[SelectionOption],
    ) -> Selection {
        debug!(%user_id, %message, "TargetSelector::select: called");
        let pref = self.preference(user_id).unwrap_or_default();
        let candidate = self.candidate(message, &pref);
        let selection = self.resolve_availability(candidate, calendars, task_lists);
        debug!(?selection, "TargetSelector::select: done");
        selection
    }

    fn candidate(&self, message: &str, pref: &UserPreference) -> Candidate {
        if let Some(rule) = rules::match_static(message) {
            return Candidate {
                kind: rule.kind,
                id: pref.default_for(rule.kind).map(str::to_string),
                confidence: rule.confidence,
                source: SelectionSource::StaticRule,
                reasoning: format!("static rule: {}", rule.name),
            };
        }

        let key = pattern_key(message);
        if let Some(entry) = pref.patterns.get(&key)
            && entry.count >= self.config.min_occurrences as u64
        {
            let confidence = (LEARNED_BASE + LEARNED_STEP * entry.count as f64).min(self.config.confidence_cap);
            return Candidate {
                kind: entry.kind,
                id: Some(entry.target_id.clone()),
                confidence,
                source: SelectionSource::Learned,
                reasoning: format!("learned from {} earlier choices for '{}'", entry.count, key),
            };
        }

        let similar = pref
            .patterns
            .iter()
            .map(|(k, e)| (shared_terms(&key, k), e))
            .filter(|(shared, _)| *shared >= FUZZY_MIN_SHARED)
            .max_by_key(|(shared, e)| (*shared, e.count, e.last_used));
        if let Some((shared, entry)) = similar {
            return Candidate {
                kind: entry.kind,
                id: Some(entry.target_id.clone()),
                confidence: FUZZY_CONFIDENCE,
                source: SelectionSource::Fuzzy,
                reasoning: format!("similar to an earlier message ({} shared words)", shared),
            };
        }

        if let Some((kind, why)) = rules::heuristic(message, self.clock.today()) {
            return Candidate {
                kind,
                id: pref.default_for(kind).map(str::to_string),
                confidence: HEURISTIC_CONFIDENCE,
                source: SelectionSource::Heuristic,
                reasoning: format!("heuristic: {}", why),
            };
        }

        let (kind, confidence) = match (&pref.default_task_list, &pref.default_calendar) {
            (Some(_), _) => (TargetKind::TaskList, USER_DEFAULT_CONFIDENCE),
            (None, Some(_)) => (TargetKind::Calendar, USER_DEFAULT_CONFIDENCE),
            (None, None) => (TargetKind::TaskList, FALLBACK_CONFIDENCE),
        };
        Candidate {
            kind,
            id: pref.default_for(kind).map(str::to_string),
            confidence,
            source: SelectionSource::Default,
            reasoning: "no signal; using default".to_string(),
        }
    }

    /// Swap unavailable ids for a safe default, at reduced confidence
    fn resolve_availability(
        &self,
        candidate: Candidate,
        calendars: &[SelectionOption],
        task_lists: &[SelectionOption],
    ) -> Selection {
        let (mut kind, options) = match candidate.kind {
            TargetKind::Calendar => (TargetKind::Calendar, calendars),
            TargetKind::TaskList => (TargetKind::TaskList, task_lists),
        };
        let mut confidence = candidate.confidence;
        let mut reasoning = candidate.reasoning;

        let mut id = match &candidate.id {
            Some(id) if options.iter().any(|o| &o.id == id) => Some(id.clone()),
            Some(id) => {
                confidence *= self.config.unavailable_penalty;
                reasoning.push_str(&format!("; '{}' is not available, using the default", id));
                safe_default(kind, options)
            }
            // No specific id learned yet; the kind's default is expected
            None => safe_default(kind, options),
        };

        // Nothing of that kind exists at all: try the other kind
        if id.is_none() {
            let (other, other_options) = match kind {
                TargetKind::Calendar => (TargetKind::TaskList, task_lists),
                TargetKind::TaskList => (TargetKind::Calendar, calendars),
            };
            if let Some(fallback) = safe_default(other, other_options) {
                confidence *= self.config.unavailable_penalty;
                reasoning.push_str(&format!("; no {} available", kind.label()));
                kind = other;
                id = Some(fallback);
            }
        }

        let confidence = clamp_confidence(confidence);
        let auto_selected = id.is_some() && confidence >= self.config.auto_select_threshold;
        let (calendar_id, task_list_id) = match kind {
            TargetKind::Calendar => (id, None),
            TargetKind::TaskList => (None, id),
        };
        Selection {
            calendar_id,
            task_list_id,
            confidence,
            auto_selected,
            source: candidate.source,
            reasoning,
        }
    }

    /// Remember the user's final destination for this kind of message
    pub fn learn(&self, user_id: &str, message: &str, calendar_id: Option<&str>, task_list_id: Option<&str>) {
        let (kind, target_id) = match (calendar_id, task_list_id) {
            (Some(id), _) => (TargetKind::Calendar, id),
            (None, Some(id)) => (TargetKind::TaskList, id),
            (None, None) => return,
        };
        let key = pattern_key(message);
        info!(%user_id, %key, %target_id, "TargetSelector::learn");
        let now = self.clock.now();
        let mut prefs = self.lock();
        prefs.entry(user_id.to_string()).or_default().record(
            &key,
            kind,
            target_id,
            now,
            self.config.max_patterns_per_user,
        );
    }
}

/// Primary calendar (else the first one), or the first task list
fn safe_default(kind: TargetKind, options: &[SelectionOption]) -> Option<String> {
    let chosen = match kind {
        TargetKind::Calendar => options.iter().find(|o| o.primary).or_else(|| options.first()),
        TargetKind::TaskList => options.first(),
    };
    chosen.map(|o| o.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;

    fn option(id: &str, kind: TargetKind, primary: bool) -> SelectionOption {
        SelectionOption {
            id: id.to_string(),
            name: id.to_string(),
            kind,
            primary,
        }
    }

    fn calendars() -> Vec<SelectionOption> {
        vec![
            option("primary", TargetKind::Calendar, true),
            option("work", TargetKind::Calendar, false),
        ]
    }

    fn task_lists() -> Vec<SelectionOption> {
        vec![
            option("todo", TargetKind::TaskList, false),
            option("personal", TargetKind::TaskList, false),
        ]
    }

    fn selector() -> TargetSelector {
        let clock = Arc::new(FixedClock::at(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(), 9, 0));
        TargetSelector::new(SelectorConfig::default(), clock)
    }

    #[test]
    fn test_static_rule_picks_primary_calendar() {
        let s = selector().select("Họp nhóm dự án", "u1", &calendars(), &task_lists());
        assert_eq!(s.calendar_id.as_deref(), Some("primary"));
        assert_eq!(s.source, SelectionSource::StaticRule);
        assert!(s.auto_selected);
    }

    #[test]
    fn test_learned_after_three_choices() {
        let sel = selector();
        let msg = "chạy bộ công viên";
        for _ in 0..2 {
            sel.learn("u1", msg, None, Some("personal"));
        }
        assert_ne!(
            sel.select(msg, "u1", &calendars(), &task_lists()).source,
            SelectionSource::Learned
        );

        sel.learn("u1", msg, None, Some("personal"));
        let s = sel.select(msg, "u1", &calendars(), &task_lists());
        assert_eq!(s.source, SelectionSource::Learned);
        assert_eq!(s.task_list_id.as_deref(), Some("personal"));
        assert!((s.confidence - 0.8).abs() < 1e-9);
        assert!(s.auto_selected);

        // Other users are unaffected
        let other = sel.select(msg, "u2", &calendars(), &task_lists());
        assert_ne!(other.source, SelectionSource::Learned);
    }

    #[test]
    fn test_learned_confidence_capped() {
        let sel = selector();
        for _ in 0..20 {
            sel.learn("u1", "chạy bộ công viên", Some("work"), None);
        }
        let s = sel.select("chạy bộ công viên", "u1", &calendars(), &task_lists());
        assert_eq!(s.confidence, 0.95);
    }

    #[test]
    fn test_fuzzy_match_on_shared_words() {
        let sel = selector();
        sel.learn("u1", "tưới cây ban công", None, Some("personal"));

        let s = sel.select("tưới cây trong vườn", "u1", &calendars(), &task_lists());

        assert_eq!(s.source, SelectionSource::Fuzzy);
        assert_eq!(s.task_list_id.as_deref(), Some("personal"));
        assert!(!s.auto_selected);
    }

    #[test]
    fn test_unavailable_id_replaced_with_penalty() {
        let sel = selector();
        for _ in 0..3 {
            sel.learn("u1", "chạy bộ công viên", Some("gone"), None);
        }

        let s = sel.select("chạy bộ công viên", "u1", &calendars(), &task_lists());

        assert_eq!(s.calendar_id.as_deref(), Some("primary"));
        assert!((s.confidence - 0.8 * 0.8).abs() < 1e-9);
        assert!(s.reasoning.contains("not available"));
    }

    #[test]
    fn test_heuristic_and_default() {
        let sel = selector();
        let s = sel.select("chạy bộ lúc 6h", "u1", &calendars(), &task_lists());
        assert_eq!(s.source, SelectionSource::Heuristic);
        assert_eq!(s.calendar_id.as_deref(), Some("primary"));
        assert!(!s.auto_selected);

        let s = sel.select("dọn kho", "u1", &calendars(), &task_lists());
        assert_eq!(s.source, SelectionSource::Default);
        assert_eq!(s.task_list_id.as_deref(), Some("todo"));
    }

    #[test]
    fn test_falls_back_to_other_kind_when_none_available() {
        let s = selector().select("mua sữa", "u1", &calendars(), &[]);
        assert_eq!(s.calendar_id.as_deref(), Some("primary"));
        assert!(s.confidence < 0.75);
    }
}
