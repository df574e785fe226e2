//! taskchat configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Longest accepted cache TTL or session timeout (one year)
pub const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

/// Seconds as a chrono duration, saturating at [`MAX_DURATION_SECS`]
pub fn secs_duration(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_DURATION_SECS) as i64)
}

/// Main taskchat configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Remote NLU (LLM) provider configuration
    pub llm: LlmConfig,

    /// Intent classifier thresholds and cache sizing
    pub classifier: ClassifierConfig,

    /// Slot-filling session settings
    pub conversation: ConversationConfig,

    /// Conflict detection window and buffers
    pub conflict: ConflictConfig,

    /// Target selector learning parameters
    pub selector: SelectorConfig,

    /// Calendar/task service settings
    pub services: ServicesConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        if !(0.0..=1.0).contains(&c.confidence_threshold) || !(0.0..=1.0).contains(&c.prefilter_short_circuit) {
            return Err(eyre::eyre!("classifier thresholds must be within [0, 1]"));
        }
        if c.cache.capacity == 0 {
            return Err(eyre::eyre!("classifier.cache.capacity must be greater than zero"));
        }
        if !(c.cache.eviction_fraction > 0.0 && c.cache.eviction_fraction <= 1.0) {
            return Err(eyre::eyre!("classifier.cache.eviction-fraction must be within (0, 1]"));
        }
        if self.conflict.work_start >= self.conflict.work_end {
            return Err(eyre::eyre!(
                "conflict.work-start ({}) must be before conflict.work-end ({})",
                self.conflict.work_start.format("%H:%M"),
                self.conflict.work_end.format("%H:%M")
            ));
        }
        if c.cache.ttl_secs > MAX_DURATION_SECS {
            return Err(eyre::eyre!(
                "classifier.cache.ttl-secs must be at most {}",
                MAX_DURATION_SECS
            ));
        }
        if self.conversation.session_timeout_secs == 0 {
            return Err(eyre::eyre!("conversation.session-timeout-secs must be greater than zero"));
        }
        if self.conversation.session_timeout_secs > MAX_DURATION_SECS {
            return Err(eyre::eyre!(
                "conversation.session-timeout-secs must be at most {}",
                MAX_DURATION_SECS
            ));
        }
        if self.services.calendars.is_empty() && self.services.task_lists.is_empty() {
            return Err(eyre::eyre!("services must declare at least one calendar or task list"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .taskchat.yml
        let local_config = PathBuf::from(".taskchat.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/taskchat/taskchat.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("taskchat").join("taskchat.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: the full load reports them once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".taskchat.yml")];
                if let Some(dir) = dirs::config_dir() {
                    paths.push(dir.join("taskchat").join("taskchat.yml"));
                }
                paths
            }
        };
        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Remote NLU provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai"-compatible endpoints)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1024,
            timeout_ms: 15_000,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

/// Intent classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Below this confidence the remote NLU is consulted
    #[serde(rename = "confidence-threshold")]
    pub confidence_threshold: f64,

    /// Hard timeout for one remote NLU call in milliseconds
    #[serde(rename = "remote-timeout-ms")]
    pub remote_timeout_ms: u64,

    /// A "likely not task" pre-filter verdict at or above this short-circuits
    #[serde(rename = "prefilter-short-circuit")]
    pub prefilter_short_circuit: f64,

    /// Result cache settings
    pub cache: CacheConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            remote_timeout_ms: 8_000,
            prefilter_short_circuit: 0.8,
            cache: CacheConfig::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

/// Classifier result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results
    pub capacity: usize,

    /// Entry time-to-live in seconds
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    /// Only results at or above this confidence are cached
    #[serde(rename = "min-confidence")]
    pub min_confidence: f64,

    /// Share of capacity evicted when the cache overflows
    #[serde(rename = "eviction-fraction")]
    pub eviction_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            ttl_secs: 24 * 60 * 60,
            min_confidence: 0.7,
            eviction_fraction: 0.2,
        }
    }
}

/// Slot-filling session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Idle time after which a pending session expires
    #[serde(rename = "session-timeout-secs")]
    pub session_timeout_secs: u64,

    /// Number of recent user messages passed to the remote NLU as context
    #[serde(rename = "history-size")]
    pub history_size: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 300,
            history_size: 5,
        }
    }
}

impl ConversationConfig {
    pub fn session_timeout(&self) -> chrono::Duration {
        secs_duration(self.session_timeout_secs)
    }
}

/// Conflict detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Start of the working-hours window used for suggestions
    #[serde(rename = "work-start", with = "hhmm")]
    pub work_start: NaiveTime,

    /// End (exclusive) of the working-hours window
    #[serde(rename = "work-end", with = "hhmm")]
    pub work_end: NaiveTime,

    /// Minimum spacing between events
    #[serde(rename = "buffer-minutes")]
    pub buffer_minutes: i64,

    /// Duration assumed when an event has no end time
    #[serde(rename = "default-duration-minutes")]
    pub default_duration_minutes: i64,

    /// Maximum number of alternative start times offered
    #[serde(rename = "max-suggestions")]
    pub max_suggestions: usize,

    /// Fixed suggestions used when no in-window gap qualifies
    #[serde(rename = "fallback-times", with = "hhmm_list")]
    pub fallback_times: Vec<NaiveTime>,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            work_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            buffer_minutes: 60,
            default_duration_minutes: 60,
            max_suggestions: 3,
            fallback_times: vec![
                NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
                NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default(),
            ],
        }
    }
}

/// Target selector learning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Occurrences of a pattern key before the learned target is used
    #[serde(rename = "min-occurrences")]
    pub min_occurrences: u32,

    /// Upper bound for learned-pattern confidence
    #[serde(rename = "confidence-cap")]
    pub confidence_cap: f64,

    /// Selections at or above this confidence are applied without asking
    #[serde(rename = "auto-select-threshold")]
    pub auto_select_threshold: f64,

    /// Confidence multiplier applied when a chosen id is unavailable
    #[serde(rename = "unavailable-penalty")]
    pub unavailable_penalty: f64,

    /// Pattern entries kept per user; least recently used are evicted
    #[serde(rename = "max-patterns-per-user")]
    pub max_patterns_per_user: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            confidence_cap: 0.95,
            auto_select_threshold: 0.7,
            unavailable_penalty: 0.8,
            max_patterns_per_user: 500,
        }
    }
}

/// A calendar declared for the offline calendar service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub primary: bool,
}

/// A task list declared for the offline calendar service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListEntry {
    pub id: String,
    pub name: String,
}

/// Calendar/task service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Timeout for one calendar/task service call in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Reminders fire this many minutes before the event
    #[serde(rename = "reminder-lead-minutes")]
    pub reminder_lead_minutes: i64,

    pub calendars: Vec<CalendarEntry>,

    #[serde(rename = "task-lists")]
    pub task_lists: Vec<TaskListEntry>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            reminder_lead_minutes: 15,
            calendars: vec![
                CalendarEntry {
                    id: "primary".to_string(),
                    name: "Lịch chính".to_string(),
                    primary: true,
                },
                CalendarEntry {
                    id: "work".to_string(),
                    name: "Công việc".to_string(),
                    primary: false,
                },
            ],
            task_lists: vec![
                TaskListEntry {
                    id: "todo".to_string(),
                    name: "Việc cần làm".to_string(),
                },
                TaskListEntry {
                    id: "personal".to_string(),
                    name: "Cá nhân".to_string(),
                },
            ],
        }
    }
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "db-path")]
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/taskchat on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("taskchat"))
            .unwrap_or_else(|| PathBuf::from(".taskchat"))
            .join("tasks.db");

        Self { db_path }
    }
}

/// `HH:MM` serialization for times of day
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(serde::de::Error::custom)
    }
}

mod hhmm_list {
    use chrono::NaiveTime;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(times.len()))?;
        for time in times {
            seq.serialize_element(&time.format("%H:%M").to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<NaiveTime>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(serde::de::Error::custom))
            .collect()
    }
}
