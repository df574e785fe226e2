//! Declarative rule table for local intent matching
//!
//! A [`Rule`] pairs a trigger regex with a fixed confidence and an extractor.
//! High-confidence rules are evaluated in order and the first match wins;
//! medium rules are all evaluated and their fields merged, with the mean of
//! their confidences.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};
use taskstore::TaskType;
use tracing::debug;

use super::temporal::{self, TemporalMatch};
use crate::domain::{CommandKind, CommandRequest, ExtractedFields, Intent};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("pattern regex must compile")
}

/// Extractor called with the trigger's captures, the full text and today's date
pub type Extractor = fn(&Captures, &str, NaiveDate) -> Option<(Intent, ExtractedFields)>;

pub struct Rule {
    pub name: &'static str,
    pub regex: Regex,
    pub confidence: f64,
    pub extract: Extractor,
}

impl Rule {
    pub fn new(name: &'static str, pattern: &str, confidence: f64, extract: Extractor) -> Self {
        Self {
            name,
            regex: re(pattern),
            confidence,
            extract,
        }
    }

    /// Apply this rule alone
    pub fn apply(&self, text: &str, today: NaiveDate) -> Option<(Intent, ExtractedFields)> {
        let caps = self.regex.captures(text)?;
        (self.extract)(&caps, text, today)
    }
}

/// Result of evaluating a rule table
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rules: Vec<&'static str>,
    pub intent: Intent,
    pub fields: ExtractedFields,
    pub confidence: f64,
}

pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose trigger and extractor both succeed
    pub fn first_match(&self, text: &str, today: NaiveDate) -> Option<RuleMatch> {
        self.rules.iter().find_map(|rule| {
            let (intent, fields) = rule.apply(text, today)?;
            debug!(rule = rule.name, "first_match: matched");
            Some(RuleMatch {
                rules: vec![rule.name],
                intent,
                fields,
                confidence: rule.confidence,
            })
        })
    }

    /// Every matching rule, fields merged, confidence averaged
    pub fn accumulate(&self, text: &str, today: NaiveDate) -> Option<RuleMatch> {
        let mut names = Vec::new();
        let mut fields = ExtractedFields::default();
        let mut total = 0.0;

        for rule in &self.rules {
            if let Some((_, extracted)) = rule.apply(text, today) {
                names.push(rule.name);
                total += rule.confidence;
                fields.merge(extracted);
            }
        }

        if names.is_empty() {
            return None;
        }
        debug!(rules = ?names, "accumulate: matched");
        let confidence = total / names.len() as f64;
        Some(RuleMatch {
            rules: names,
            intent: Intent::CreateTask,
            fields,
            confidence,
        })
    }
}

/// The high and medium rule tables
pub struct PatternLibrary {
    high: RuleTable,
    medium: RuleTable,
}

impl Default for PatternLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self {
            high: high_confidence_rules(),
            medium: medium_confidence_rules(),
        }
    }

    /// Evaluate high rules, then medium rules
    pub fn evaluate(&self, text: &str, today: NaiveDate) -> Option<RuleMatch> {
        if let Some(m) = self.high.first_match(text, today) {
            return Some(m);
        }
        let mut m = self.medium.accumulate(text, today)?;
        let (base, _) = base_fields(text, today);
        let title = base.title.clone()?;
        m.fields.title = Some(title);
        m.fields.merge(base);
        Some(m)
    }
}

pub fn high_confidence_rules() -> RuleTable {
    RuleTable::new(vec![
        Rule::new("explicit_command", r"(?s)^\s*/(\w+)(?:\s+(.*))?$", 1.0, extract_command),
        Rule::new(
            "natural_delete",
            r"(?i)^\s*(?:xóa|xoá|delete|remove)\s+(?:(?:task|việc|công việc)\s+(.+?)|(?:số\s+)?([\d\s,-]+?))\s*$",
            0.95,
            |caps, _, _| natural_command(caps, CommandKind::Delete),
        ),
        Rule::new(
            "natural_done",
            r"(?i)^\s*(?:done|xong|đã xong|hoàn thành|complete|finish)\s+(?:(?:task|việc|công việc)\s+(.+?)|(?:số\s+)?([\d\s,-]+?))\s*$",
            0.95,
            |caps, _, _| natural_command(caps, CommandKind::Done),
        ),
        Rule::new(
            "natural_list",
            r"(?i)^\s*(?:danh sách|liệt kê|xem (?:danh sách|task|việc|công việc)|list|show tasks|my tasks|tasks)(?:\s+(?:task|việc|công việc|của tôi))?\s*[?!.]*\s*$",
            0.9,
            |_, _, _| Some((Intent::Command(CommandRequest::new(CommandKind::List, "")), ExtractedFields::default())),
        ),
        Rule::new(
            "natural_today",
            r"(?i)^\s*(?:lịch hôm nay|việc hôm nay|hôm nay có gì|hôm nay làm gì|today|agenda|today'?s? (?:tasks|agenda|schedule))\s*[?!.]*\s*$",
            0.9,
            |_, _, _| Some((Intent::Command(CommandRequest::new(CommandKind::Today, "")), ExtractedFields::default())),
        ),
        Rule::new(
            "meeting_attendee_time",
            r"(?i)\b(?:họp|cuộc họp|meeting|meet|gặp|gặp gỡ)\b.*\b(?:với|with|cùng)\s+\S",
            0.9,
            extract_meeting,
        ),
        Rule::new(
            "deadline_date",
            r"(?i)\b(?:deadline|hạn chót|hạn nộp|hạn|nộp|submit|due|trước|before)\b",
            0.85,
            extract_deadline,
        ),
        Rule::new(
            "call_person_time",
            r"(?i)\b(?:gọi(?:\s+điện)?(?:\s+cho)?|call|phone)\s+(\p{L}+)",
            0.85,
            extract_call,
        ),
        Rule::new(
            "reminder",
            r"(?i)^\s*(?:(?:hãy|please)\s+)?(?:nhắc|nhớ|đừng\s+quên|remind\s+me|reminder|don'?t\s+forget)\b",
            0.8,
            extract_reminder,
        ),
    ])
}

pub fn medium_confidence_rules() -> RuleTable {
    RuleTable::new(vec![
        Rule::new("attendee_mention", r"(?i)\b(?:với|with|cùng)\s+\p{L}", 0.6, |_, text, _| {
            let attendees = extract_attendees(text);
            if attendees.is_empty() {
                return None;
            }
            Some((
                Intent::CreateTask,
                ExtractedFields {
                    attendees,
                    ..Default::default()
                },
            ))
        }),
        Rule::new("location_mention", r"(?i)\b(?:tại|ở|at)\s+\p{L}", 0.55, |_, text, _| {
            let location = extract_location(text)?;
            Some((
                Intent::CreateTask,
                ExtractedFields {
                    location: Some(location),
                    ..Default::default()
                },
            ))
        }),
        Rule::new(
            "temporal_mention",
            r"(?i)\d|hôm nay|ngày|mai|mốt|thứ|chủ nhật|tuần|sáng|trưa|chiều|tối|today|tonight|tomorrow|week|monday|tuesday|wednesday|thursday|friday|saturday|sunday",
            0.6,
            |_, text, today| {
                let found = temporal::extract(text, today);
                if found.is_empty() {
                    return None;
                }
                let task_type = if found.start.is_some() {
                    TaskType::Calendar
                } else {
                    TaskType::Task
                };
                Some((
                    Intent::CreateTask,
                    ExtractedFields {
                        date: found.date,
                        start_time: found.start,
                        end_time: found.end,
                        task_type: Some(task_type),
                        ..Default::default()
                    },
                ))
            },
        ),
    ])
}

fn extract_command(caps: &Captures, _text: &str, _today: NaiveDate) -> Option<(Intent, ExtractedFields)> {
    let word = caps.get(1)?.as_str();
    let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let cmd = CommandRequest::new(CommandKind::from_word(word), args);
    Some((Intent::Command(cmd), ExtractedFields::default()))
}

fn natural_command(caps: &Captures, kind: CommandKind) -> Option<(Intent, ExtractedFields)> {
    let args = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    if args.is_empty() {
        return None;
    }
    Some((Intent::Command(CommandRequest::new(kind, args)), ExtractedFields::default()))
}

fn extract_meeting(_caps: &Captures, text: &str, today: NaiveDate) -> Option<(Intent, ExtractedFields)> {
    let (mut fields, found) = base_fields(text, today);
    found.start?;
    fields.title.as_ref()?;
    fields.attendees = extract_attendees(text);
    if fields.attendees.is_empty() {
        return None;
    }
    fields.location = extract_location(text);
    fields.task_type = Some(TaskType::Meeting);
    Some((Intent::CreateTask, fields))
}

fn extract_deadline(_caps: &Captures, text: &str, today: NaiveDate) -> Option<(Intent, ExtractedFields)> {
    let (mut fields, found) = base_fields(text, today);
    found.date?;
    fields.title.as_ref()?;
    fields.task_type = Some(TaskType::Task);
    Some((Intent::CreateTask, fields))
}

fn extract_call(caps: &Captures, text: &str, today: NaiveDate) -> Option<(Intent, ExtractedFields)> {
    let person = caps.get(1)?.as_str();
    let (mut fields, found) = base_fields(text, today);
    found.start?;
    fields.title.as_ref()?;
    fields.attendees = vec![person.to_string()];
    fields.task_type = Some(TaskType::Calendar);
    Some((Intent::CreateTask, fields))
}

fn extract_reminder(_caps: &Captures, text: &str, today: NaiveDate) -> Option<(Intent, ExtractedFields)> {
    let (mut fields, _) = base_fields(text, today);
    fields.title.as_ref()?;
    fields.task_type = Some(TaskType::Task);
    Some((Intent::CreateTask, fields))
}

/// Title, date and time common to every task-creating rule
pub fn base_fields(text: &str, today: NaiveDate) -> (ExtractedFields, TemporalMatch) {
    let found = temporal::extract(text, today);
    let fields = ExtractedFields {
        title: clean_title(text, &found),
        date: found.date,
        start_time: found.start,
        end_time: found.end,
        ..Default::default()
    };
    (fields, found)
}

static LEAD_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)^\s*(?:(?:hãy|please|làm ơn)\s+)?(?:nhắc(?:\s+nhở)?(?:\s+(?:tôi|mình|em|anh|chị|tớ))?(?:\s+(?:là|về))?|nhớ(?:\s+là)?|đừng\s+quên|remind\s+me(?:\s+(?:to|about))?|don'?t\s+forget(?:\s+to)?|(?:tạo|thêm|add|create)(?:\s+(?:một|1|a|an|new))?\s+(?:task|lịch hẹn|sự kiện|event|công việc|việc|nhắc nhở|reminder)(?:\s+mới)?|(?:todo|task)\s*:)[\s:,-]*")
});

static TRAILING_CONNECTOR: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:[\s,;:-]+(?:vào lúc|lúc|vào|at|on|by|ngày|hôm|trước|before|from|từ|đến|to|và|and|hạn|deadline))+[\s,;:.!?-]*$")
});

/// Message minus temporal phrases, lead-ins and dangling connectors
pub fn clean_title(text: &str, found: &TemporalMatch) -> Option<String> {
    let stripped = temporal::remove_spans(text, &found.spans);
    let without_lead = LEAD_PHRASE.replace(&stripped, "");
    let without_tail = TRAILING_CONNECTOR.replace(&without_lead, "");
    let title = without_tail
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-' | '.' | '!' | '?'))
        .to_string();
    if !title.chars().any(char::is_alphanumeric) {
        return None;
    }
    Some(capitalize(&title))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

static ATTENDEES: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(?:cùng\s+với|với|with|cùng)\s+(\p{L}[\p{L}\p{N}\s,&@.'_-]*?)(?:\s+(?:lúc|vào|at|on|tại|ở|về|để|ngày|hôm|sáng|trưa|chiều|tối|tomorrow|today|tonight|thứ|tuần|from|từ|to|about|regarding)\b|\s*[;:!?(]|\.(?:\s|$)|\s+\d|$)")
});

static NAME_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)\s*(?:,|&|\bvà\b|\band\b)\s*"));

/// Names after "với"/"with", split on commas and "và"/"and"
pub fn extract_attendees(text: &str) -> Vec<String> {
    let Some(list) = ATTENDEES.captures(text).and_then(|c| c.get(1)) else {
        return Vec::new();
    };
    split_names(list.as_str())
}

/// Split a free-form list of people
pub fn split_names(list: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in NAME_SEPARATOR.split(list) {
        let name = name.trim().trim_end_matches('.').trim();
        if name.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)\b(?:tại|ở|at)\s+(\p{L}[\p{L}\p{N}\s'-]*?)(?:\s+(?:lúc|vào|với|with|cùng|on|ngày|hôm|sáng|trưa|chiều|tối|tomorrow|today|tonight|thứ|tuần|from|từ|để)\b|\s*[,;:!?(]|\.(?:\s|$)|\s+\d|$)")
});

/// Place after "tại"/"ở"/"at"
pub fn extract_location(text: &str) -> Option<String> {
    LOCATION
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|l| !l.is_empty())
}
