//! Splitting "title + employer" headlines into their parts.
//!
//! Feeds rarely carry the employer in its own field, so it is mined from
//! the headline with an ordered table of patterns; the first pattern that
//! matches wins. Each pattern captures a `frag` group (the text to cut
//! from the headline) containing a `company` group.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::UNKNOWN_COMPANY;

struct CompanyPattern {
    name: &'static str,
    regex: Regex,
}

static PATTERNS: LazyLock<Vec<CompanyPattern>> = LazyLock::new(|| {
    [
        // "Acme (YC S21) Is Hiring a Senior Engineer"
        (
            "is-hiring",
            r"(?i)^(?P<frag>(?P<company>.+?)\s+(?:\([^)]*\)\s+)?(?:is|are)\s+hiring\b(?:\s+(?:an?|for)\b)?)",
        ),
        // "Senior Engineer at Acme Corp - Remote"
        (
            "at",
            r"(?P<frag>\s+at\s+(?P<company>[^|@(\-–—]+?))\s*(?:[|(\-–—]|$)",
        ),
        // "Senior Engineer @ Acme Corp"
        (
            "at-sign",
            r"(?P<frag>\s*@\s*(?P<company>[^|(\-–—]+?))\s*(?:[|(\-–—]|$)",
        ),
        // "Senior Engineer | Acme Corp"
        ("pipe", r"(?P<frag>\s*\|\s*(?P<company>[^|]+?))\s*$"),
        // "Acme Corp: Senior Engineer"
        ("colon-prefix", r"^(?P<frag>(?P<company>[^:]{2,60}?)\s*:\s+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| CompanyPattern {
        name,
        regex: Regex::new(pattern).expect("Invalid company pattern"),
    })
    .collect()
});

const SEPARATORS: &[char] = &['-', '–', '—', '|', ':', '@', ',', '·'];

/// Headline split into a clean title and an employer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleParts {
    pub title: String,
    pub company: String,
}

/// Split a headline using the first matching pattern.
///
/// Falls back to the raw headline and [`UNKNOWN_COMPANY`].
pub fn split_title_company(raw: &str) -> TitleParts {
    let raw = raw.trim();

    for pattern in PATTERNS.iter() {
        let Some(caps) = pattern.regex.captures(raw) else {
            continue;
        };
        let (Some(frag), Some(company)) = (caps.name("frag"), caps.name("company")) else {
            continue;
        };
        let company = company.as_str().trim();
        if company.is_empty() {
            continue;
        }

        let mut title = String::with_capacity(raw.len());
        title.push_str(&raw[..frag.start()]);
        title.push(' ');
        title.push_str(&raw[frag.end()..]);
        let title = trim_separators(&title);
        if title.is_empty() {
            continue;
        }

        tracing::trace!(pattern = pattern.name, %company, "Matched company pattern");
        return TitleParts {
            title,
            company: company.to_string(),
        };
    }

    TitleParts {
        title: raw.to_string(),
        company: UNKNOWN_COMPANY.to_string(),
    }
}

fn trim_separators(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .to_string()
}
