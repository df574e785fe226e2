//! Task references: "2", "1,3", "2-4", "báo cáo"
//!
//! References are resolved against the snapshot the user was last shown.

mod batch;
mod resolver;

pub use batch::{BatchOp, BatchResult, ReferenceDetail, ReferenceOutcome, batch_apply};
pub use resolver::{MAX_RANGE_END, MatchMethod, Resolved, parse_batch_references, resolve, resolve_strict};
