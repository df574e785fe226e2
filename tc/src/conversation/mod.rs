//! Slot-filling conversations
//!
//! Asks only for the fields a task genuinely lacks, one question per turn,
//! and expires sessions that sit idle.

mod engine;
mod state;
mod store;

pub use engine::{CANCELLED_MESSAGE, ConversationEngine, Turn, field_prompt, timeout_message};
pub use state::{ConversationStage, ConversationState, required_fields};
pub use store::{Expiring, MemorySessionStore, SessionStore};
