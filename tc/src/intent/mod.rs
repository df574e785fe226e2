//! Intent classification
//!
//! Decides what a free-form chat message wants (create a task, run a
//! command, or nothing) and extracts task fields from it. Local rules run
//! first; the remote NLU is only consulted when they are not confident.

pub mod cache;
pub mod classifier;
pub mod fallback;
pub mod patterns;
pub mod prefilter;
pub mod temporal;
pub mod vocab;

pub use cache::ClassifierCache;
pub use classifier::{ClassifyOutcome, Diagnostics, IntentClassifier, Stage, canned_reply};
pub use fallback::FallbackLevel;
pub use patterns::{PatternLibrary, Rule, RuleMatch, RuleTable};
pub use prefilter::{PrefilterResult, Verdict, prefilter};
pub use temporal::TemporalMatch;
