//! Commands recognized in chat input

use serde::{Deserialize, Serialize};

/// Command verbs understood by the assistant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Help,
    List,
    Today,
    Done,
    Delete,
    Edit,
    Cancel,
    Unknown(String),
}

impl CommandKind {
    /// Map a command word (with or without the leading '/') to a kind
    pub fn from_word(word: &str) -> Self {
        match word.trim_start_matches('/').to_lowercase().as_str() {
            "help" | "h" | "trogiup" | "giupdo" => Self::Help,
            "list" | "ls" | "tasks" | "danhsach" => Self::List,
            "today" | "homnay" => Self::Today,
            "done" | "complete" | "xong" | "hoanthanh" => Self::Done,
            "delete" | "del" | "rm" | "remove" | "xoa" => Self::Delete,
            "edit" | "sua" | "update" => Self::Edit,
            "cancel" | "huy" => Self::Cancel,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn needs_args(&self) -> bool {
        matches!(self, Self::Done | Self::Delete | Self::Edit)
    }
}

/// A parsed command with its raw argument string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub args: String,
}

impl CommandRequest {
    pub fn new(kind: CommandKind, args: impl Into<String>) -> Self {
        Self {
            kind,
            args: args.into().trim().to_string(),
        }
    }
}
