//! Posting dates as sources report them: ISO timestamps, several written
//! formats, epoch milliseconds and relative phrases like "3 days ago".

use chrono::{DateTime, Duration, NaiveDate, Utc};

const FORMATS: &[&str] = &[
    "%d/%m/%Y", "%m/%d/%Y", "%B %d, %Y", "%b %d, %Y", "%d-%m-%Y", "%d %b %Y", "%d %B %Y",
];

/// "5 hours ago", "a week ago", "yesterday". Months count as 30 days and
/// years as 365. Amounts too large to subtract from `now` give None.
pub fn parse_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.trim().to_lowercase();
    match lower.as_str() {
        "just now" | "today" => return Some(now),
        "yesterday" => return Some(now - Duration::days(1)),
        _ => {}
    }

    let words: Vec<&str> = lower.split_whitespace().collect();
    let [amount, unit, "ago"] = words.as_slice() else {
        return None;
    };
    let amount: i64 = match *amount {
        "a" | "an" => 1,
        n => n.parse::<i64>().ok().filter(|n| *n >= 0)?,
    };
    let delta = match unit.trim_end_matches('s') {
        "second" => Duration::try_seconds(amount),
        "minute" => Duration::try_minutes(amount),
        "hour" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        "month" => amount.checked_mul(30).and_then(Duration::try_days),
        "year" => amount.checked_mul(365).and_then(Duration::try_days),
        _ => return None,
    }?;
    now.checked_sub_signed(delta)
}

pub fn parse_date(text: &str, now: DateTime<Utc>) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Some(date) = text
        .get(..10)
        .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
    {
        return Some(date);
    }
    if let Some(date) = FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return Some(date);
    }
    parse_relative(text, now).map(|dt| dt.date_naive())
}

/// YYYY-MM-DD, falling back to the ingestion date when nothing parses.
pub fn normalize_posted_date(raw: Option<&str>, now: DateTime<Utc>) -> String {
    raw.and_then(|text| parse_date(text, now))
        .unwrap_or_else(|| now.date_naive())
        .format("%Y-%m-%d")
        .to_string()
}

pub fn from_epoch_millis(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.format("%Y-%m-%d").to_string())
}
