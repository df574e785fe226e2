//! Keyword rules, content heuristic and pattern keys

use chrono::NaiveDate;

use super::TargetKind;
use crate::intent::{patterns, temporal, vocab};

/// A fixed keyword rule pointing at a destination kind
pub(crate) struct StaticRule {
    pub name: &'static str,
    pub terms: &'static [&'static str],
    pub kind: TargetKind,
    pub confidence: f64,
}

pub(crate) const STATIC_RULES: &[StaticRule] = &[
    StaticRule {
        name: "meeting vocabulary",
        terms: &[
            "họp",
            "cuộc họp",
            "meeting",
            "hẹn",
            "lịch hẹn",
            "cuộc hẹn",
            "appointment",
            "phỏng vấn",
            "interview",
            "hội thảo",
            "webinar",
        ],
        kind: TargetKind::Calendar,
        confidence: 0.8,
    },
    StaticRule {
        name: "personal or deadline vocabulary",
        terms: &[
            "deadline",
            "hạn chót",
            "hạn nộp",
            "nộp",
            "việc nhà",
            "cá nhân",
            "personal",
            "todo",
            "mua",
            "đi chợ",
            "shopping",
        ],
        kind: TargetKind::TaskList,
        confidence: 0.75,
    },
];

pub(crate) fn match_static(message: &str) -> Option<&'static StaticRule> {
    let folded = vocab::fold(message);
    STATIC_RULES.iter().find(|r| vocab::contains_any(&folded, r.terms))
}

const ACTION_TERMS: &[&str] = &[
    "làm", "viết", "gửi", "hoàn thành", "sửa", "kiểm tra", "chuẩn bị", "finish", "write", "send", "fix", "review",
    "prepare", "due",
];

/// Destination suggested by the shape of the message
pub(crate) fn heuristic(message: &str, today: NaiveDate) -> Option<(TargetKind, &'static str)> {
    let found = temporal::extract(message, today);
    if found.start.is_some() {
        return Some((TargetKind::Calendar, "message has a time"));
    }
    if patterns::extract_location(message).is_some() {
        return Some((TargetKind::Calendar, "message has a location"));
    }
    if !patterns::extract_attendees(message).is_empty() {
        return Some((TargetKind::Calendar, "message has attendees"));
    }
    let folded = vocab::fold(message);
    if vocab::contains_any(&folded, ACTION_TERMS) {
        return Some((TargetKind::TaskList, "message has an action verb"));
    }
    None
}

/// Words that never identify what a task is about
const STOPWORDS: &[&str] = &[
    "với", "lúc", "vào", "ngày", "mai", "nay", "hôm", "tuần", "sau", "tới", "này", "thứ", "giờ", "sáng", "trưa",
    "chiều", "tối", "đêm", "tôi", "mình", "cho", "của", "các", "những", "một", "và", "là", "để", "nhé", "nha",
    "nhắc", "nhớ", "hãy", "cần", "phải", "trước", "the", "and", "for", "with", "about", "tomorrow", "today",
    "tonight", "next", "this", "remind", "please",
];

/// Significant keywords kept in a pattern key
const MAX_KEY_TERMS: usize = 4;

/// Order-independent summary of what a message is about
///
/// Up to four significant words (three or more letters, not stopwords, not
/// numbers), sorted. Messages with none fall back to their first three words.
pub fn pattern_key(message: &str) -> String {
    let folded = vocab::fold(message);
    let words: Vec<&str> = folded.split_whitespace().collect();

    let mut significant: Vec<&str> = Vec::new();
    for word in &words {
        if word.chars().count() < 3
            || word.chars().any(|c| c.is_ascii_digit())
            || STOPWORDS.contains(word)
            || significant.contains(word)
        {
            continue;
        }
        significant.push(word);
        if significant.len() == MAX_KEY_TERMS {
            break;
        }
    }

    if significant.is_empty() {
        return words.iter().take(3).copied().collect::<Vec<_>>().join(" ");
    }
    significant.sort_unstable();
    significant.join(" ")
}

/// Number of key terms two pattern keys share
pub(crate) fn shared_terms(a: &str, b: &str) -> usize {
    let theirs: Vec<&str> = b.split_whitespace().collect();
    a.split_whitespace().filter(|t| theirs.contains(t)).count()
}
