//! Domain types shared by the classifier, conversation engine, resolver,
//! conflict detector and target selector

mod command;
mod parse;
mod pending;
mod task_info;

pub use command::{CommandKind, CommandRequest};
pub use parse::{Intent, ParseResult, ParseSource, clamp_confidence};
pub use pending::PendingTask;
pub use task_info::{ExtractedFields, TaskField, TaskInfo};
pub use taskstore::TaskType;
