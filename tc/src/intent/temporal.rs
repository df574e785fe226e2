//! Date and time phrase extraction
//!
//! Understands Vietnamese and English phrasings: relative days ("ngày mai",
//! "tomorrow"), weekdays ("thứ 6 tuần sau", "next friday"), numeric dates
//! ("20/10", "2026-10-20", "ngày 20 tháng 10"), clock times ("15:00", "3h30",
//! "3 giờ chiều", "3pm") and simple ranges ("9h-10h", "từ 2 đến 4 giờ").
//!
//! Matching runs on the original text with case-insensitive regexes so the
//! returned spans can be cut out of the message to leave the title.

use std::ops::Range;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::{Captures, Regex};
use tracing::debug;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("temporal regex must compile")
}

/// Optional words introducing a date ("vào thứ 6", "trước ngày 20/10")
const DATE_LEAD: &str = r"(?:\b(?:vào|trước|hạn|on|by|before|due)\s+)?";

type DateResolver = fn(&Captures, NaiveDate) -> Option<NaiveDate>;

static DATE_RULES: LazyLock<Vec<(Regex, DateResolver)>> = LazyLock::new(|| {
    let with_lead = |core: &str| re(&format!("(?i){}{}", DATE_LEAD, core));
    vec![
        (with_lead(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"), resolve_iso as DateResolver),
        (
            with_lead(r"(?:\bngày\s+)?\b(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?\b"),
            resolve_dmy as DateResolver,
        ),
        (
            with_lead(r"\bngày\s+(\d{1,2})(?:\s+tháng\s+(\d{1,2}))?(?:\s+năm\s+(\d{4}))?\b"),
            resolve_day_month as DateResolver,
        ),
        (
            with_lead(
                r"\b(hôm nay|today|tối nay|tonight|sáng nay|trưa nay|chiều nay|ngày mai|sáng mai|trưa mai|chiều mai|tối mai|day after tomorrow|tomorrow|ngày kia|ngày mốt|mốt)\b",
            ),
            resolve_relative as DateResolver,
        ),
        (
            with_lead(
                r"\b(?:(next|this|tuần\s+sau|tuần\s+tới|tuần\s+này)\s+)?(thứ\s*(?:hai|ba|tư|năm|sáu|bảy|[2-7])|chủ\s*nhật|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b(?:\s+(tuần\s+sau|tuần\s+tới|tuần\s+này|next\s+week|this\s+week))?",
            ),
            resolve_weekday as DateResolver,
        ),
        (
            with_lead(r"\b(?:(\d{1,2})\s*ngày\s*(?:nữa|tới)|in\s+(\d{1,2})\s+days?)\b"),
            resolve_in_days as DateResolver,
        ),
        (
            with_lead(r"\b(tuần\s+sau|tuần\s+tới|next\s+week|cuối\s+tuần|this\s+weekend|weekend)\b"),
            resolve_week as DateResolver,
        ),
    ]
});

static TIME: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:\b(?:vào\s+lúc|lúc|vào|at|by|from|từ)\s+)?\b(\d{1,2})(?::(\d{2})|\s*h(\d{2})?|\s*giờ(?:\s*(\d{1,2})(?:\s*phút)?|\s*(rưỡi))?|\s*(am|pm))\b(?:\s*(sáng|trưa|chiều|tối|đêm|am|pm)\b)?")
});

static SHORT_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?i)(?:\b(?:từ|from)\s+)?\b(\d{1,2})(?::(\d{2}))?\s*(?:-|–|đến|tới|to)\s*(\d{1,2})(?::(\d{2}))?\s*(?:h|giờ)\b(?:\s*(sáng|trưa|chiều|tối|đêm|am|pm)\b)?")
});

static RANGE_CONNECTOR: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^\s*(?:-|–|~|đến|tới|to|until)\s*$"));

static PERIOD_HINT: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?i)\b(sáng|trưa|chiều|tối|đêm|morning|noon|afternoon|evening|tonight|night)\b"));

/// Part of the day, used to turn 12-hour readings into 24-hour times
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Morning,
    Noon,
    Afternoon,
    Evening,
    Night,
}

impl Period {
    pub fn from_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "sáng" | "am" | "morning" => Some(Self::Morning),
            "trưa" | "noon" => Some(Self::Noon),
            "chiều" | "pm" | "afternoon" => Some(Self::Afternoon),
            "tối" | "evening" | "tonight" => Some(Self::Evening),
            "đêm" | "night" => Some(Self::Night),
            _ => None,
        }
    }

    /// Convert an hour as spoken into a 24-hour hour
    pub fn to_24h(period: Option<Self>, hour: u32) -> Option<u32> {
        if hour > 23 {
            return None;
        }
        if hour > 12 {
            return Some(hour);
        }
        let h = match period {
            Some(Self::Morning) if hour == 12 => 0,
            Some(Self::Morning) => hour,
            Some(Self::Noon) if hour <= 4 => hour + 12,
            Some(Self::Noon) => hour,
            Some(Self::Afternoon | Self::Evening) if hour < 12 => hour + 12,
            Some(Self::Afternoon | Self::Evening) => hour,
            Some(Self::Night) if hour == 12 => 0,
            Some(Self::Night) if hour >= 7 => hour + 12,
            Some(Self::Night) => hour,
            None => hour,
        };
        Some(h)
    }
}

/// Everything temporal found in one message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalMatch {
    pub date: Option<NaiveDate>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    /// Byte ranges of the matched phrases in the input
    pub spans: Vec<Range<usize>>,
}

impl TemporalMatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.start.is_none()
    }
}

/// A clock reading before the period is applied
struct RawTime {
    span: Range<usize>,
    hour: u32,
    minute: u32,
    period: Option<Period>,
}

impl RawTime {
    fn resolve(&self, fallback: Option<Period>) -> Option<NaiveTime> {
        let hour = Period::to_24h(self.period.or(fallback), self.hour)?;
        NaiveTime::from_hms_opt(hour, self.minute, 0)
    }
}

/// Extract the first date and the first time (or time range) in `text`
pub fn extract(text: &str, today: NaiveDate) -> TemporalMatch {
    let mut found = TemporalMatch::default();

    'rules: for (regex, resolve) in DATE_RULES.iter() {
        for caps in regex.captures_iter(text) {
            if let Some(date) = resolve(&caps, today)
                && let Some(m) = caps.get(0)
            {
                found.date = Some(date);
                found.spans.push(m.range());
                break 'rules;
            }
        }
    }

    let hint = PERIOD_HINT
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| Period::from_word(m.as_str()));

    let date_spans = found.spans.clone();
    let free = |span: &Range<usize>| !date_spans.iter().any(|d| overlaps(d, span));

    if let Some((start, end)) = short_range(text).filter(|(s, _)| free(&s.span)) {
        let shared = end.period.or(start.period).or(hint);
        found.start = start.resolve(shared);
        found.end = end.resolve(shared);
        found.spans.push(start.span.start..end.span.end);
    } else {
        let times: Vec<RawTime> = TIME
            .captures_iter(text)
            .filter_map(|caps| raw_time(&caps))
            .filter_map(|mut t| {
                // "3h chiều mai": the period word belongs to the date phrase too
                t.span = clip(&t.span, &date_spans)?;
                Some(t)
            })
            .collect();

        if let Some(first) = times.first() {
            let second = times
                .get(1)
                .filter(|second| RANGE_CONNECTOR.is_match(&text[first.span.end..second.span.start]));
            let shared = first.period.or(second.and_then(|s| s.period)).or(hint);
            found.start = first.resolve(shared);
            found.spans.push(first.span.clone());
            if let Some(second) = second {
                found.end = second.resolve(second.period.or(shared));
                found.spans.push(first.span.end..second.span.end);
            }
        }
    }

    if let (Some(start), Some(end)) = (found.start, found.end)
        && end <= start
    {
        found.end = None;
    }

    found.spans.sort_by_key(|r| r.start);
    debug!(?found.date, ?found.start, ?found.end, "extract: done");
    found
}

/// Parse a standalone time reply ("15:00", "3h chiều")
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    extract(text, NaiveDate::default()).start
}

/// Remove `spans` from `text` and collapse the leftover whitespace
pub fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut sorted: Vec<&Range<usize>> = spans.iter().collect();
    sorted.sort_by_key(|r| r.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in sorted {
        if span.start > cursor {
            out.push_str(&text[cursor..span.start]);
        }
        out.push(' ');
        cursor = cursor.max(span.end);
    }
    if cursor < text.len() {
        out.push_str(&text[cursor..]);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Trim `span` so it ends before any date span it runs into
fn clip(span: &Range<usize>, dates: &[Range<usize>]) -> Option<Range<usize>> {
    let mut clipped = span.clone();
    for date in dates.iter().filter(|d| overlaps(d, span)) {
        if clipped.start >= date.start {
            return None;
        }
        clipped.end = clipped.end.min(date.start);
    }
    Some(clipped)
}

fn num(caps: &Captures, idx: usize) -> Option<u32> {
    caps.get(idx).and_then(|m| m.as_str().parse().ok())
}

fn raw_time(caps: &Captures) -> Option<RawTime> {
    let span = caps.get(0)?.range();
    let hour = num(caps, 1)?;
    let minute = if caps.get(5).is_some() {
        30
    } else {
        num(caps, 2).or_else(|| num(caps, 3)).or_else(|| num(caps, 4)).unwrap_or(0)
    };
    if minute > 59 {
        return None;
    }
    let period = caps
        .get(7)
        .or_else(|| caps.get(6))
        .and_then(|m| Period::from_word(m.as_str()));
    Some(RawTime {
        span,
        hour,
        minute,
        period,
    })
}

fn short_range(text: &str) -> Option<(RawTime, RawTime)> {
    let caps = SHORT_RANGE.captures(text)?;
    let whole = caps.get(0)?.range();
    let period = caps.get(5).and_then(|m| Period::from_word(m.as_str()));
    let start = RawTime {
        span: whole.start..whole.start,
        hour: num(&caps, 1)?,
        minute: num(&caps, 2).unwrap_or(0),
        period: None,
    };
    let end = RawTime {
        span: whole.end..whole.end,
        hour: num(&caps, 3)?,
        minute: num(&caps, 4).unwrap_or(0),
        period,
    };
    if start.minute > 59 || end.minute > 59 {
        return None;
    }
    Some((start, end))
}

fn resolve_iso(caps: &Captures, _today: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(num(caps, 1)? as i32, num(caps, 2)?, num(caps, 3)?)
}

fn resolve_dmy(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let day = num(caps, 1)?;
    let month = num(caps, 2)?;
    match num(caps, 3) {
        Some(year) if year < 100 => NaiveDate::from_ymd_opt(2000 + year as i32, month, day),
        Some(year) => NaiveDate::from_ymd_opt(year as i32, month, day),
        None => next_occurrence(today, month, day),
    }
}

fn resolve_day_month(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let day = num(caps, 1)?;
    match (num(caps, 2), num(caps, 3)) {
        (Some(month), Some(year)) => NaiveDate::from_ymd_opt(year as i32, month, day),
        (Some(month), None) => next_occurrence(today, month, day),
        (None, _) => {
            let this_month = NaiveDate::from_ymd_opt(today.year(), today.month(), day);
            match this_month {
                Some(date) if date >= today => Some(date),
                _ => {
                    let (year, month) = if today.month() == 12 {
                        (today.year() + 1, 1)
                    } else {
                        (today.year(), today.month() + 1)
                    };
                    NaiveDate::from_ymd_opt(year, month, day)
                }
            }
        }
    }
}

/// This year's day/month, or next year's once it has passed
fn next_occurrence(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(date) if date >= today => Some(date),
        Some(_) => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
        None => None,
    }
}

fn resolve_relative(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let word = caps.get(1)?.as_str().to_lowercase();
    let offset = match word.as_str() {
        "hôm nay" | "today" | "tối nay" | "tonight" | "sáng nay" | "trưa nay" | "chiều nay" => 0,
        "ngày mai" | "sáng mai" | "trưa mai" | "chiều mai" | "tối mai" | "tomorrow" => 1,
        "ngày kia" | "ngày mốt" | "mốt" | "day after tomorrow" => 2,
        _ => return None,
    };
    Some(today + Duration::days(offset))
}

fn weekday_from_word(word: &str) -> Option<Weekday> {
    let word = word.to_lowercase();
    let word = word.split_whitespace().collect::<Vec<_>>().join(" ");
    let day = match word.as_str() {
        "thứ 2" | "thứ2" | "thứ hai" | "monday" => Weekday::Mon,
        "thứ 3" | "thứ3" | "thứ ba" | "tuesday" => Weekday::Tue,
        "thứ 4" | "thứ4" | "thứ tư" | "wednesday" => Weekday::Wed,
        "thứ 5" | "thứ5" | "thứ năm" | "thursday" => Weekday::Thu,
        "thứ 6" | "thứ6" | "thứ sáu" | "friday" => Weekday::Fri,
        "thứ 7" | "thứ7" | "thứ bảy" | "saturday" => Weekday::Sat,
        "chủ nhật" | "chủnhật" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn resolve_weekday(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let target = weekday_from_word(caps.get(2)?.as_str())?;
    let modifier = caps
        .get(1)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" "));

    let offset = target.num_days_from_monday() as i64;
    match modifier.as_deref() {
        Some("next" | "tuần sau" | "tuần tới" | "next week") => {
            Some(monday_of(today) + Duration::days(7 + offset))
        }
        Some("this" | "tuần này" | "this week") => Some(monday_of(today) + Duration::days(offset)),
        _ => {
            let current = today.weekday().num_days_from_monday() as i64;
            let ahead = (offset - current).rem_euclid(7);
            Some(today + Duration::days(if ahead == 0 { 7 } else { ahead }))
        }
    }
}

fn resolve_in_days(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let days = num(caps, 1).or_else(|| num(caps, 2))?;
    Some(today + Duration::days(days as i64))
}

fn resolve_week(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let word = caps.get(1)?.as_str().to_lowercase();
    if word.contains("cuối") || word.contains("weekend") {
        let current = today.weekday().num_days_from_monday() as i64;
        let ahead = (5 - current).rem_euclid(7);
        Some(today + Duration::days(ahead))
    } else {
        Some(today + Duration::days(7))
    }
}
