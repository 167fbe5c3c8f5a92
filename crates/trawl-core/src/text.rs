//! Text normalization shared by every extractor and adapter.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;
use scraper::Html;
use url::Url;

/// Feed-derived descriptions are cut to this many characters.
pub const DESCRIPTION_MAX_CHARS: usize = 400;

static TRAILING_PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("Invalid parenthetical regex"));

static RELATIVE_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(minute|min|hour|day|week)s?\s+ago")
        .expect("Invalid relative age regex")
});

/// Remove tags, decode entities and collapse whitespace.
pub fn strip_html(input: &str) -> String {
    if !input.contains('<') && !input.contains('&') {
        return collapse_whitespace(input);
    }
    let fragment = Html::parse_fragment(input);
    let text: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `max` characters, on a char boundary.
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((idx, _)) => input[..idx].trim_end().to_string(),
        None => input.to_string(),
    }
}

/// Strip markup then truncate to [`DESCRIPTION_MAX_CHARS`].
pub fn clean_description(input: &str) -> String {
    truncate_chars(&strip_html(input), DESCRIPTION_MAX_CHARS)
}

/// True if any keyword occurs, case-insensitively, in any surface.
///
/// An empty (or all-blank) keyword list matches everything.
pub fn matches_keywords(keywords: &[String], surfaces: &[&str]) -> bool {
    let needles: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if needles.is_empty() {
        return true;
    }
    let haystack = surfaces.join(" ").to_lowercase();
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

/// Best-effort timestamp parsing across the formats feeds and APIs use.
///
/// Accepts RFC 2822, RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, and
/// unix epochs in seconds or milliseconds.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    raw.parse::<i64>().ok().and_then(from_epoch)
}

/// Unix epoch in seconds, or milliseconds when implausibly large for seconds.
pub fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 {
        return None;
    }
    if value >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    }
}

/// Turn "3 hours ago" style text into an absolute time, `now` if unparseable.
pub fn parse_relative_age(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(caps) = RELATIVE_AGE.captures(text) else {
        return now;
    };
    let Ok(amount) = caps[1].parse::<i64>() else {
        return now;
    };
    let unit = match caps[2].to_lowercase().as_str() {
        "minute" | "min" => TimeDelta::try_minutes(amount),
        "hour" => TimeDelta::try_hours(amount),
        "day" => TimeDelta::try_days(amount),
        "week" => TimeDelta::try_weeks(amount),
        _ => None,
    };
    unit.and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(now)
}

/// Source name without a trailing parenthetical: "Acme (Greenhouse)" -> "Acme".
pub fn clean_company_name(source_name: &str) -> String {
    TRAILING_PARENTHETICAL
        .replace(source_name, "")
        .trim()
        .to_string()
}

/// Resolve `href` against `base`. Absolute links pass through; anything
/// unresolvable falls back to `base`.
pub fn resolve_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return base.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => base.to_string(),
    }
}
