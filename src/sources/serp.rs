//! Google results via SerpAPI. Besides yielding postings, results that link
//! to Greenhouse or Lever boards are mined for board slugs, which are merged
//! into the companies file so later runs poll those boards directly.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    company_from_slug, expand_company_boards, polite_delay, strip_html, truncate_chars,
    FetchError, HttpClient, RawRecord, RequestTally, Source,
};
use crate::dates::parse_date;
use crate::models::{JobDraft, SalaryHint, SourceCategory};

const API_URL: &str = "https://serpapi.com/search.json";
const RESULTS_PER_QUERY: u32 = 40;
const MAX_AGE_DAYS: i64 = 30;

const NOISE_EXCLUDE: &str = concat!(
    " -site:glassdoor.com -site:indeed.com -site:payscale.com -site:ambitionbox.com",
    " -site:naukri.com -site:quora.com -site:reddit.com -site:medium.com",
    " -site:youtube.com -site:linkedin.com",
    r#" -"top companies" -"highest paying" -"salary guide" -"salary report""#,
    r#" -"interview questions" -"how to" -"career advice" -"salary comparison""#,
    r#" -"best jobs" -"jobs in 2025" -"jobs in 2026" -"review""#,
);

struct SerpQuery {
    query: &'static str,
    /// Google `tbs` value: qdr:d, qdr:w or qdr:m.
    freshness: &'static str,
    label: &'static str,
    /// Mine result links for new board slugs.
    discover: bool,
    /// Append [`NOISE_EXCLUDE`] to the query.
    exclude_noise: bool,
}

const fn ats(query: &'static str, freshness: &'static str, label: &'static str) -> SerpQuery {
    SerpQuery {
        query,
        freshness,
        label,
        discover: true,
        exclude_noise: false,
    }
}

const fn open(query: &'static str, freshness: &'static str, label: &'static str) -> SerpQuery {
    SerpQuery {
        query,
        freshness,
        label,
        discover: false,
        exclude_noise: true,
    }
}

const QUERIES: &[SerpQuery] = &[
    ats(r#"site:boards.greenhouse.io intitle:"software engineer""#, "qdr:w", "GH: Software Engineer"),
    ats(
        r#"site:boards.greenhouse.io intitle:"react" OR intitle:"frontend" OR intitle:"front-end""#,
        "qdr:w",
        "GH: React/Frontend",
    ),
    ats(
        r#"site:boards.greenhouse.io intitle:"backend" OR intitle:"back-end" OR intitle:"fullstack" OR intitle:"full stack""#,
        "qdr:w",
        "GH: Backend/Fullstack",
    ),
    ats(
        r#"site:boards.greenhouse.io intitle:"software engineer" ("india" OR "bangalore" OR "bengaluru" OR "hyderabad" OR "mumbai" OR "pune")"#,
        "qdr:w",
        "GH: SWE India",
    ),
    ats(r#"site:boards.greenhouse.io intitle:"software engineer" "remote""#, "qdr:w", "GH: SWE Remote"),
    ats(
        r#"site:boards.greenhouse.io intitle:"sde" OR intitle:"sde-2" OR intitle:"sde-3" OR intitle:"sde ii""#,
        "qdr:w",
        "GH: SDE Roles",
    ),
    ats(r#"site:jobs.lever.co intitle:"software engineer""#, "qdr:w", "LV: Software Engineer"),
    ats(
        r#"site:jobs.lever.co intitle:"full stack" OR intitle:"frontend" OR intitle:"backend""#,
        "qdr:w",
        "LV: Fullstack/FE/BE",
    ),
    ats(
        r#"site:jobs.lever.co intitle:"software engineer" ("india" OR "remote")"#,
        "qdr:w",
        "LV: SWE India/Remote",
    ),
    SerpQuery {
        query: r#"site:apply.workable.com intitle:"software engineer" OR intitle:"frontend developer" OR intitle:"backend developer""#,
        freshness: "qdr:w",
        label: "WK: SWE/FE/BE",
        discover: false,
        exclude_noise: false,
    },
    SerpQuery {
        query: r#"site:apply.workable.com intitle:"react" OR intitle:"angular" OR intitle:"node""#,
        freshness: "qdr:w",
        label: "WK: React/Angular/Node",
        discover: false,
        exclude_noise: false,
    },
    open(
        r#"intitle:"software engineer" intitle:"hiring" ("bangalore" OR "hyderabad" OR "mumbai" OR "pune" OR "delhi" OR "gurgaon" OR "noida")"#,
        "qdr:d",
        "India: SWE Hiring Cities",
    ),
    open(
        r#"intitle:"frontend developer" OR intitle:"react developer" ("india" OR "bangalore" OR "remote")"#,
        "qdr:w",
        "India: Frontend/React",
    ),
    open(
        r#"intitle:"backend developer" OR intitle:"backend engineer" ("india" OR "bangalore" OR "hyderabad")"#,
        "qdr:w",
        "India: Backend",
    ),
    SerpQuery {
        query: r#"site:boards.greenhouse.io OR site:jobs.lever.co intitle:"fullstack" OR intitle:"full stack" ("india" OR "bangalore" OR "remote")"#,
        freshness: "qdr:w",
        label: "India: Fullstack ATS",
        discover: false,
        exclude_noise: false,
    },
    open(
        r#"intitle:"software development engineer" ("google" OR "amazon" OR "meta" OR "microsoft" OR "apple")"#,
        "qdr:w",
        "FAANG: SDE",
    ),
    ats(
        r#"site:boards.greenhouse.io OR site:jobs.lever.co intitle:"software engineer" "remote" "anywhere""#,
        "qdr:w",
        "Remote Anywhere ATS",
    ),
    ats(
        r#"site:boards.greenhouse.io intitle:"software engineer" "YC" OR "Y Combinator""#,
        "qdr:m",
        "GH: YC Startups",
    ),
];

/// Review, salary and forum sites that rank for job queries but host no postings.
const NOISE_DOMAINS: &[&str] = &[
    "glassdoor.com",
    "payscale.com",
    "ambitionbox.com",
    "naukri.com",
    "quora.com",
    "reddit.com",
    "medium.com",
    "youtube.com",
    "linkedin.com/pulse",
    "linkedin.com/posts",
    "ziprecruiter.com",
    "salary.com",
    "comparably.com",
    "careerbliss.com",
    "kununu.com",
    "teamblind.com",
];

const SKIP_TITLE_PATTERNS: &[&str] = &[
    "blog",
    "about",
    "career page",
    "company culture",
    "press",
    "news",
    "top companies",
    "highest paying",
    "salary guide",
    "salary report",
    "interview questions",
    "how to",
    "career advice",
    "salary comparison",
    "best jobs",
    "review",
    "ratings",
    "salaries at",
    "salary for",
    "jobs in 2025",
    "jobs in 2026",
    "average salary",
    "pay scale",
    "career path",
    "job market",
    "hiring trends",
    "job outlook",
];

static RE_GREENHOUSE_BOARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)boards\.greenhouse\.io/([a-z0-9_-]+)").expect("valid regex"));
static RE_LEVER_BOARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)jobs\.lever\.co/([a-z0-9_-]+)").expect("valid regex"));
static RE_WORKABLE_BOARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)apply\.workable\.com/([a-z0-9_-]+)").expect("valid regex"));
static RE_AT_COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\bat|@)\s+(.+?)(?:\s*[-|–]|$)").expect("valid regex")
});
static RE_TITLE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[-|–]\s.*$").expect("valid regex"));
static RE_SNIPPET_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Location|Office|Based in)[:\s]+([^.;]+)").expect("valid regex")
});
static RE_LISTICLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2,}").expect("valid regex"));

struct BoardPattern {
    platform: &'static str,
    regex: &'static LazyLock<Regex>,
    skip_segments: &'static [&'static str],
}

/// Only platforms whose boards are polled directly are worth discovering.
static DISCOVERABLE: &[BoardPattern] = &[
    BoardPattern {
        platform: "greenhouse",
        regex: &RE_GREENHOUSE_BOARD,
        skip_segments: &["embed", "include", "api", "v1"],
    },
    BoardPattern {
        platform: "lever",
        regex: &RE_LEVER_BOARD,
        skip_segments: &["embed", "include", "api"],
    },
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic_results: Vec<SerpResult>,
    error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SerpResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub displayed_link: String,
    pub date: Option<String>,
}

pub struct SerpSource {
    api_key: Option<String>,
    companies_path: PathBuf,
    delay: (f64, f64),
}

impl SerpSource {
    pub fn new(api_key: Option<String>, companies_path: PathBuf, delay: (f64, f64)) -> Self {
        Self {
            api_key,
            companies_path,
            delay,
        }
    }

    fn save_discoveries(&self, discovered: BTreeMap<&'static str, BTreeSet<String>>) {
        for (platform, slugs) in discovered {
            match expand_company_boards(&self.companies_path, platform, slugs.into_iter().collect()) {
                Ok(0) => {}
                Ok(added) => info!(platform, added, "expanded companies file"),
                Err(e) => warn!(platform, error = %e, "could not update companies file"),
            }
        }
    }
}

impl Source for SerpSource {
    fn name(&self) -> &'static str {
        "serp"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::SearchDiscovery
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let Some(api_key) = &self.api_key else {
            return Err(FetchError::MissingCredentials("SERPAPI_KEY"));
        };

        let now = Utc::now();
        let mut records = Vec::new();
        let mut tally = RequestTally::default();
        let mut discovered: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();

        for (i, q) in QUERIES.iter().enumerate() {
            let mut query = q.query.to_string();
            if q.exclude_noise {
                query.push_str(NOISE_EXCLUDE);
            }
            let params = [
                ("engine", "google".to_string()),
                ("q", query),
                ("api_key", api_key.clone()),
                ("num", RESULTS_PER_QUERY.to_string()),
                ("tbs", q.freshness.to_string()),
            ];

            match http.get_json::<SearchResponse>(API_URL, &params, &[]) {
                Ok(SearchResponse { error: Some(msg), .. }) => {
                    let e = FetchError::Api(msg);
                    warn!(label = q.label, error = %e, "serp query rejected");
                    tally.failed(e);
                }
                Ok(resp) => {
                    tally.ok();
                    let total = resp.organic_results.len();
                    let mut kept = 0;
                    for result in resp.organic_results {
                        if q.discover {
                            if let Some((platform, slug)) = board_slug(&result.link) {
                                discovered.entry(platform).or_default().insert(slug);
                            }
                        }
                        if is_fresh(&result, now) {
                            kept += 1;
                            records.push(RawRecord::Serp(result));
                        }
                    }
                    info!(
                        label = q.label,
                        results = total,
                        fresh = kept,
                        "serp query {}/{}",
                        i + 1,
                        QUERIES.len()
                    );
                }
                Err(e) => {
                    warn!(label = q.label, error = %e, "serp query failed");
                    tally.failed(e);
                }
            }
            polite_delay(self.delay);
        }

        self.save_discoveries(discovered);
        tally.finish(records)
    }
}

/// Results without a parseable date are kept.
fn is_fresh(result: &SerpResult, now: DateTime<Utc>) -> bool {
    match result.date.as_deref().and_then(|d| parse_date(d, now)) {
        Some(posted) => (now.date_naive() - posted).num_days() <= MAX_AGE_DAYS,
        None => true,
    }
}

/// (platform, slug) for a Greenhouse or Lever board link.
pub fn board_slug(url: &str) -> Option<(&'static str, String)> {
    DISCOVERABLE.iter().find_map(|p| {
        let slug = p.regex.captures(url)?.get(1)?.as_str().to_lowercase();
        (!p.skip_segments.contains(&slug.as_str())).then_some((p.platform, slug))
    })
}

fn source_name(link: &str) -> &'static str {
    const HOSTS: &[(&str, &str)] = &[
        ("greenhouse", "serp_greenhouse"),
        ("lever", "serp_lever"),
        ("workable", "serp_workable"),
        ("indeed", "serp_indeed"),
        ("adzuna", "serp_adzuna"),
    ];
    HOSTS
        .iter()
        .find(|(needle, _)| link.contains(needle))
        .map_or("serp", |&(_, name)| name)
}

fn company_for(result: &SerpResult) -> String {
    let from_board = [&RE_GREENHOUSE_BOARD, &RE_LEVER_BOARD, &RE_WORKABLE_BOARD]
        .into_iter()
        .find_map(|re| re.captures(&result.link)?.get(1).map(|m| company_from_slug(m.as_str())));
    if let Some(company) = from_board {
        return company;
    }
    if let Some(company) = RE_AT_COMPANY
        .captures(&result.title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| !c.is_empty())
    {
        return company;
    }
    result
        .displayed_link
        .split('/')
        .next()
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}

fn looks_like_posting(result: &SerpResult) -> bool {
    let link = result.link.to_lowercase();
    if NOISE_DOMAINS.iter().any(|d| link.contains(d)) {
        return false;
    }
    let title = result.title.trim().to_lowercase();
    let names_a_role = title.contains("engineer") || title.contains("developer");
    if !names_a_role && SKIP_TITLE_PATTERNS.iter().any(|p| title.contains(p)) {
        return false;
    }
    // "6331 React JS developer jobs in ..."
    !RE_LISTICLE.is_match(&title)
}

pub fn to_draft(result: SerpResult) -> Option<JobDraft> {
    let raw_title = strip_html(&result.title);
    if raw_title.is_empty() || result.link.trim().is_empty() || !looks_like_posting(&result) {
        return None;
    }

    let title = match RE_TITLE_SUFFIX.replace(&raw_title, "").trim() {
        "" => raw_title.clone(),
        cleaned => cleaned.to_string(),
    };
    let snippet = strip_html(&result.snippet);
    let location = RE_SNIPPET_LOCATION
        .captures(&snippet)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| truncate_chars(&snippet, 100).to_string());

    let mut draft = JobDraft::new(source_name(&result.link), SourceCategory::SearchDiscovery);
    draft.company = company_for(&result);
    draft.apply_url = result.link;
    draft.posted = result.date;
    draft.salary = vec![SalaryHint::Text(snippet.clone())];
    draft.perks_text = snippet;
    draft.location = location;
    draft.title = title;
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result(title: &str, link: &str, snippet: &str) -> SerpResult {
        SerpResult {
            title: title.into(),
            link: link.into(),
            snippet: snippet.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_greenhouse_result() {
        let r = result(
            "Senior Software Engineer - Backend | Stripe",
            "https://boards.greenhouse.io/stripe/jobs/5551234",
            "Location: Bengaluru, India. Competitive salary and equity.",
        );
        let draft = to_draft(r).unwrap();
        assert_eq!(draft.title, "Senior Software Engineer");
        assert_eq!(draft.company, "Stripe");
        assert_eq!(draft.source, "serp_greenhouse");
        assert_eq!(draft.location, "Bengaluru, India");
        assert_eq!(draft.category, SourceCategory::SearchDiscovery);
    }

    #[test]
    fn test_company_fallbacks() {
        let r = result("Frontend Developer at Acme Corp - Pune", "https://acme.example/jobs/1", "");
        assert_eq!(company_for(&r), "Acme Corp");

        let mut r = result("Data Engineer", "https://careers.example.com/1", "");
        r.displayed_link = "careers.example.com/jobs/1".into();
        assert_eq!(company_for(&r), "careers.example.com");

        let r = result("Data Engineer", "https://x.example/1", "");
        assert_eq!(company_for(&r), "Unknown");
    }

    #[test]
    fn test_hyphenated_titles_survive_cleanup() {
        let r = result("Front-end Engineer", "https://jobs.lever.co/acme/1", "Remote");
        let draft = to_draft(r).unwrap();
        assert_eq!(draft.title, "Front-end Engineer");
        assert_eq!(draft.source, "serp_lever");
        assert_eq!(draft.location, "Remote");
    }

    #[test]
    fn test_noise_is_rejected() {
        assert!(to_draft(result("Stripe salaries", "https://www.glassdoor.com/x", "")).is_none());
        assert!(to_draft(result("Salary guide 2026", "https://example.com/guide", "")).is_none());
        assert!(
            to_draft(result("6331 react developer jobs in India", "https://example.com/l", ""))
                .is_none()
        );
        // Role titles pass even when they contain a skip word.
        assert!(
            to_draft(result("Developer Relations Engineer, News", "https://example.com/j", ""))
                .is_some()
        );
    }

    #[test]
    fn test_board_slug_discovery() {
        assert_eq!(
            board_slug("https://boards.greenhouse.io/Figma/jobs/1"),
            Some(("greenhouse", "figma".to_string()))
        );
        assert_eq!(
            board_slug("https://jobs.lever.co/plaid/abc-123"),
            Some(("lever", "plaid".to_string()))
        );
        assert_eq!(board_slug("https://boards.greenhouse.io/embed/job_app?for=x"), None);
        assert_eq!(board_slug("https://apply.workable.com/acme/j/1"), None);
    }

    #[test]
    fn test_freshness_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        let mut r = result("SDE", "https://x.test", "");
        assert!(is_fresh(&r, now));

        r.date = Some("3 days ago".into());
        assert!(is_fresh(&r, now));
        r.date = Some("Feb 13, 2026".into());
        assert!(is_fresh(&r, now));
        r.date = Some("2 months ago".into());
        assert!(!is_fresh(&r, now));
        r.date = Some("Jan 2, 2026".into());
        assert!(!is_fresh(&r, now));
    }
}
