use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a record originated. Kept for provenance and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceCategory {
    /// Direct applicant-tracking-system board (Greenhouse, Lever, Ashby).
    Ats,
    /// Third-party job aggregator API (Adzuna, JSearch, Remote OK).
    ApiAggregator,
    /// Search-result discovery (SerpAPI).
    SearchDiscovery,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Ats => "ATS",
            SourceCategory::ApiAggregator => "API",
            SourceCategory::SearchDiscovery => "SEARCH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ATS" => Some(SourceCategory::Ats),
            "API" => Some(SourceCategory::ApiAggregator),
            "SEARCH" => Some(SourceCategory::SearchDiscovery),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedJob {
    pub id: String,
    pub title: String,
    pub company: String,
    pub apply_url: String,
    pub source: String,
    pub category: SourceCategory,
    pub location: String, // raw text as the source gave it
    pub country: String,  // ISO-3166 alpha-2 or ""
    pub state: String,
    pub city: String,
    pub is_remote: bool,
    pub is_india: bool,
    pub salary_min: Option<f64>, // lakhs per annum
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub visa_sponsored: bool,
    pub has_equity: bool,
    pub match_score: u8,
    pub posted_date: String, // YYYY-MM-DD
    pub created_at: String,  // RFC 3339, UTC
    pub saved: bool,
    pub is_notable_employer: bool,
}

/// Content-addressed id: the same (title, company, location) always maps to
/// the same id, regardless of case or surrounding whitespace.
pub fn job_id(title: &str, company: &str, location: &str) -> String {
    let raw = format!(
        "{}|{}|{}",
        title.trim().to_lowercase(),
        company.trim().to_lowercase(),
        location.trim().to_lowercase()
    );
    hex::encode(Sha256::digest(raw.as_bytes()))
}

// --- Adapter output ---

/// Geography a source already knows natively. Non-empty fields win over
/// what the resolver derives from free text.
#[derive(Debug, Clone, Default)]
pub struct GeoHint {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// One candidate salary signal. An adapter lists them in preference order;
/// the first one that yields a bound is kept.
#[derive(Debug, Clone)]
pub enum SalaryHint {
    /// Free text to run through the normalizer's pattern cascade.
    Text(String),
    /// Structured amounts with an explicit currency code and pay period.
    Amounts {
        min: Option<f64>,
        max: Option<f64>,
        currency: Option<String>,
        period: Option<String>,
    },
    /// Annual amounts whose currency follows the resolved country.
    CountryAmounts { min: Option<f64>, max: Option<f64> },
}

/// A source record mapped into common field names, before analysis.
#[derive(Debug, Clone)]
pub struct JobDraft {
    pub title: String,
    pub company: String,
    pub location: String,
    pub apply_url: String,
    pub source: String,
    pub category: SourceCategory,
    pub posted: Option<String>,
    pub remote_hint: bool,
    pub geo: GeoHint,
    pub salary: Vec<SalaryHint>,
    pub perks_text: String,
}

impl JobDraft {
    pub fn new(source: &str, category: SourceCategory) -> Self {
        Self {
            title: String::new(),
            company: String::new(),
            location: String::new(),
            apply_url: String::new(),
            source: source.to_string(),
            category,
            posted: None,
            remote_hint: false,
            geo: GeoHint::default(),
            salary: Vec::new(),
            perks_text: String::new(),
        }
    }
}

// --- Read path ---

#[derive(Debug, Clone)]
pub struct JobQuery {
    pub min_score: u8,
    pub remote_only: bool,
    pub keyword: Option<String>,
    pub country: Option<String>,
    pub india_only: bool,
    pub notable_only: bool,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub source: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            min_score: 0,
            remote_only: false,
            keyword: None,
            country: None,
            india_only: false,
            notable_only: false,
            min_salary: None,
            max_salary: None,
            source: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub today: usize,
    pub by_source: BTreeMap<String, usize>,
    pub india: usize,
    pub remote: usize,
    pub with_salary: usize,
    pub notable: usize,
}

/// Written after every cycle for the dashboard to pick up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub last_run: String,
    pub new_jobs: usize,
    pub total: usize,
    pub elapsed_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_ignores_case_and_whitespace() {
        let a = job_id("Software Engineer", "Stripe", "Bangalore, India");
        let b = job_id("  software engineer ", "STRIPE", "bangalore, india  ");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_job_id_differs_by_location() {
        let a = job_id("Software Engineer", "Stripe", "Remote");
        let b = job_id("Software Engineer", "Stripe", "Dublin");
        assert_ne!(a, b);
    }

    #[test]
    fn test_source_category_round_trips_through_label() {
        for cat in [
            SourceCategory::Ats,
            SourceCategory::ApiAggregator,
            SourceCategory::SearchDiscovery,
        ] {
            assert_eq!(SourceCategory::parse(cat.as_str()), Some(cat));
        }
        assert_eq!(SourceCategory::parse("ats"), Some(SourceCategory::Ats));
        assert_eq!(SourceCategory::parse("rss"), None);
    }

    #[test]
    fn test_default_query_pages_fifty() {
        let q = JobQuery::default();
        assert_eq!(q.limit, 50);
        assert_eq!(q.offset, 0);
        assert_eq!(q.min_score, 0);
    }
}
