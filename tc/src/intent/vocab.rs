//! Vocabularies for Vietnamese and English chat input
//!
//! Terms are matched as whole words against folded text (see [`fold`]).

/// Chit-chat openers and acknowledgements
pub const GREETINGS: &[&str] = &[
    "xin chào",
    "chào",
    "chào bạn",
    "chào buổi sáng",
    "alo",
    "hello",
    "hi",
    "hey",
    "good morning",
    "good evening",
    "cảm ơn",
    "cám ơn",
    "thanks",
    "thank you",
    "tạm biệt",
    "bye",
];

/// Question words that suggest the user is asking rather than instructing
pub const QUESTIONS: &[&str] = &[
    "là gì",
    "tại sao",
    "vì sao",
    "như thế nào",
    "thế nào",
    "bao nhiêu",
    "ai là",
    "bạn là ai",
    "có phải",
    "what",
    "why",
    "how",
    "who",
    "which",
];

/// Words that point at something the user wants to do or schedule
pub const TASK_INDICATORS: &[&str] = &[
    "nhắc",
    "nhắc nhở",
    "nhớ",
    "họp",
    "cuộc họp",
    "gặp",
    "hẹn",
    "lịch",
    "đặt lịch",
    "deadline",
    "hạn",
    "nộp",
    "gửi",
    "gọi",
    "làm",
    "hoàn thành",
    "mua",
    "tạo",
    "thêm",
    "task",
    "todo",
    "meeting",
    "meet",
    "remind",
    "call",
    "appointment",
    "schedule",
    "submit",
    "send",
    "buy",
    "finish",
    "due",
];

/// Whole-message replies that cancel whatever is in progress
pub const CANCEL: &[&str] = &[
    "hủy",
    "huỷ",
    "hủy bỏ",
    "huỷ bỏ",
    "thôi",
    "thôi không tạo nữa",
    "không tạo nữa",
    "dừng",
    "dừng lại",
    "cancel",
    "stop",
    "abort",
    "never mind",
    "nevermind",
];

/// Phrases declining to provide a field
pub const SKIP: &[&str] = &[
    "không cần",
    "ko cần",
    "k cần",
    "khỏi",
    "bỏ qua",
    "không có",
    "chưa biết",
    "không biết",
    "skip",
    "no need",
    "no deadline",
    "none",
    "pass",
];

/// Whole-message skip replies too short to be phrases
pub const SKIP_EXACT: &[&str] = &["không", "ko", "no", "-"];

pub const YES: &[&str] = &[
    "có",
    "ừ",
    "ừm",
    "ok",
    "oke",
    "okay",
    "đồng ý",
    "được",
    "vâng",
    "dạ",
    "tiếp tục",
    "vẫn tạo",
    "cứ tạo",
    "tạo luôn",
    "yes",
    "y",
    "sure",
    "proceed",
];

pub const NO: &[&str] = &["không", "ko", "no", "n", "không tạo", "khỏi", "thôi"];

/// Lowercase, replace punctuation with spaces, collapse whitespace, pad
///
/// The leading and trailing space let callers test whole-word membership
/// with a plain `contains(" term ")`.
pub fn fold(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}

/// Whether `folded` contains `term` as whole words
pub fn has_term(folded: &str, term: &str) -> bool {
    folded.contains(&format!(" {} ", term))
}

pub fn contains_any(folded: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| has_term(folded, t))
}

/// Number of distinct terms present
pub fn count_terms(folded: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| has_term(folded, t)).count()
}

/// Whether the whole message is exactly one of `terms`
pub fn is_exactly(text: &str, terms: &[&str]) -> bool {
    let folded = fold(text);
    let trimmed = folded.trim();
    !trimmed.is_empty() && terms.iter().any(|t| *t == trimmed)
}

pub fn is_cancel(text: &str) -> bool {
    is_exactly(text, CANCEL)
}

pub fn is_skip(text: &str) -> bool {
    let trimmed = text.trim();
    if SKIP_EXACT.iter().any(|t| trimmed.eq_ignore_ascii_case(t)) || is_exactly(text, SKIP_EXACT) {
        return true;
    }
    contains_any(&fold(text), SKIP)
}

pub fn is_yes(text: &str) -> bool {
    is_exactly(text, YES)
}

pub fn is_no(text: &str) -> bool {
    is_exactly(text, NO)
}
