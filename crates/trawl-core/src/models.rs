use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_LOCATION: &str = "Remote";
pub const DEFAULT_JOB_TYPE: &str = "Full-time";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Wire format of a source, deciding which extractor handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Named public job-board API, fetched directly.
    Api,
    Rss,
    Json,
    Html,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Api => "api",
            SourceType::Rss => "rss",
            SourceType::Json => "json",
            SourceType::Html => "html",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(SourceType::Api),
            "rss" => Ok(SourceType::Rss),
            "json" => Ok(SourceType::Json),
            "html" => Ok(SourceType::Html),
            _ => Err(format!("Unknown source type: {s}")),
        }
    }
}

/// A configured origin (feed, API, or page) that job postings are read from.
///
/// Read-only for the duration of a scrape; the scraper never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// ATS vendor key; only meaningful for `html` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ats: Option<String>,
    pub enabled: bool,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Explicit employer name for single-company career pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl JobSource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        source_type: SourceType,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            source_type,
            ats: None,
            enabled: true,
            category: category.into(),
            description: String::new(),
            company_name: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ats(mut self, vendor: impl Into<String>) -> Self {
        self.ats = Some(vendor.into());
        self
    }

    pub fn with_company_name(mut self, company: impl Into<String>) -> Self {
        self.company_name = Some(company.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// A job posting reshaped into the common schema, whatever its origin format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedJob {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_logo: Option<String>,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    pub job_type: String,
    pub description: String,
    pub url: String,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Human-readable origin name.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl NormalizedJob {
    /// Start a record with the defaults every extractor shares.
    ///
    /// The id is derived from the source id and the record's identifying
    /// fields, so re-scraping unchanged content yields the same id.
    pub fn new(
        source: &JobSource,
        title: impl Into<String>,
        company: impl Into<String>,
        url: impl Into<String>,
        posted_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        let company = company.into();
        let url = url.into();
        Self {
            id: job_id(&source.id, &title, &company, &url),
            title,
            company,
            company_logo: None,
            location: DEFAULT_LOCATION.to_string(),
            salary: None,
            job_type: DEFAULT_JOB_TYPE.to_string(),
            description: String::new(),
            url,
            posted_at,
            tags: Vec::new(),
            source: source.name.clone(),
            category: Some(source.category.clone()),
        }
    }

    /// Key used to collapse the same posting seen through several sources.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}",
            self.title.trim().to_lowercase(),
            self.company.trim().to_lowercase()
        )
    }
}

/// Parameters of one orchestrated scrape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeConfig {
    /// A record passes if ANY keyword matches. Empty means no filtering.
    pub keywords: Vec<String>,
    /// Explicit source ids; empty means every enabled source.
    #[serde(default)]
    pub selected_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jobs_per_source: Option<usize>,
}

impl ScrapeConfig {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_sources<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_sources = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_jobs_per_source(mut self, max: usize) -> Self {
        self.max_jobs_per_source = Some(max);
        self
    }
}

/// Emitted once per completed source during a scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeProgress {
    /// Sources finished so far, including this one.
    pub current: usize,
    pub total: usize,
    pub source_id: String,
    pub source_name: String,
    /// Records this source contributed before dedup.
    pub jobs_found: usize,
    /// Merged, deduplicated records accumulated so far.
    pub total_jobs: usize,
    pub is_complete: bool,
}

/// CSS selectors describing one ATS vendor's careers-page markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsSelectors {
    pub job_container: String,
    pub title: String,
    pub location: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsVendor {
    pub name: String,
    pub selectors: AtsSelectors,
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable record id: `<source_id>-<16 hex chars of sha256(title|company|url)>`.
pub fn job_id(source_id: &str, title: &str, company: &str, url: &str) -> String {
    let digest = compute_hash(&format!("{title}|{company}|{url}"));
    format!("{source_id}-{}", &digest[..16])
}
