//! TaskChat - conversational task and calendar assistant
//!
//! Turns free-form chat messages (Vietnamese and English) into tasks and
//! calendar entries.
//!
//! # Pipeline
//!
//! - [`intent`] - tiered classifier: prefilter, pattern rules, cache,
//!   remote NLU under a timeout, local fallback
//! - [`conversation`] - slot filling for missing fields with idle expiry
//! - [`selector`] - picks a calendar or task list, learning per user
//! - [`conflict`] - overlap and buffer checks with free-slot suggestions
//! - [`reference`] - resolves "1,2,3", "2-4" or a title fragment to tasks
//! - [`assistant`] - the per-message handler tying it all together
//!
//! Persistence lives in the `taskstore` crate; external calendars, chat
//! delivery and reminders sit behind the traits in [`services`].

pub mod assistant;
pub mod cli;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod conversation;
pub mod domain;
pub mod error;
pub mod intent;
pub mod llm;
pub mod nlu;
pub mod reference;
pub mod repl;
pub mod selector;
pub mod services;

pub use assistant::{Assistant, Collaborators};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use domain::{CommandKind, CommandRequest, ExtractedFields, Intent, ParseResult, ParseSource, TaskField, TaskInfo};
pub use error::{CoreError, CoreResult};
pub use intent::{ClassifyOutcome, IntentClassifier};
pub use nlu::{NluError, OfflineNlu, RemoteNlu};
