//! Job sources. Each module pairs a fetcher that talks to one remote API with
//! an adapter that maps that API's record shape onto a [`JobDraft`].

pub mod adzuna;
pub mod ashby;
pub mod greenhouse;
pub mod jsearch;
pub mod lever;
pub mod remoteok;
pub mod serp;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::StatusCode;
use scraper::Html;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{JobDraft, SourceCategory};
use crate::settings::Settings;

pub const SOURCE_NAMES: &[&str] = &[
    "greenhouse",
    "lever",
    "ashby",
    "adzuna",
    "jsearch",
    "remoteok",
    "serp",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("rate limited")]
    RateLimited,

    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("api error: {0}")]
    Api(String),
}

impl FetchError {
    /// A skip the operator expects, not a failure worth a warning.
    pub fn is_soft_skip(&self) -> bool {
        matches!(self, FetchError::MissingCredentials(_))
    }
}

/// One record as a source returned it, tagged by source.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Greenhouse {
        board: String,
        job: greenhouse::GreenhouseJob,
    },
    Lever {
        board: String,
        posting: lever::LeverPosting,
    },
    Ashby {
        board: String,
        job: ashby::AshbyJob,
    },
    Adzuna {
        market: String,
        result: adzuna::AdzunaResult,
    },
    JSearch(jsearch::JSearchJob),
    RemoteOk(remoteok::RemoteOkJob),
    Serp(serp::SerpResult),
}

impl RawRecord {
    /// None when the record lacks a title or an apply URL, or the source's
    /// own filters reject it.
    pub fn into_draft(self) -> Option<JobDraft> {
        match self {
            RawRecord::Greenhouse { board, job } => greenhouse::to_draft(&board, job),
            RawRecord::Lever { board, posting } => lever::to_draft(&board, posting),
            RawRecord::Ashby { board, job } => ashby::to_draft(&board, job),
            RawRecord::Adzuna { market, result } => adzuna::to_draft(&market, result),
            RawRecord::JSearch(job) => jsearch::to_draft(job),
            RawRecord::RemoteOk(job) => remoteok::to_draft(job),
            RawRecord::Serp(result) => serp::to_draft(result),
        }
    }
}

/// Outcome of a source that makes one request per query or board. Failed
/// requests are skipped, but if none succeeded the last error is returned.
#[derive(Debug, Default)]
pub struct RequestTally {
    succeeded: usize,
    last_error: Option<FetchError>,
}

impl RequestTally {
    pub fn ok(&mut self) {
        self.succeeded += 1;
    }

    pub fn failed(&mut self, e: FetchError) {
        self.last_error = Some(e);
    }

    pub fn finish(self, records: Vec<RawRecord>) -> Result<Vec<RawRecord>, FetchError> {
        match self.last_error {
            Some(e) if self.succeeded == 0 => Err(e),
            _ => Ok(records),
        }
    }
}

pub trait Source {
    fn name(&self) -> &'static str;
    fn category(&self) -> SourceCategory;
    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError>;
}

/// Every source the settings and companies file allow, in run order.
pub fn build_sources(settings: &Settings, boards: &CompanyBoards) -> Vec<Box<dyn Source>> {
    let d = &settings.delays;
    vec![
        Box::new(greenhouse::GreenhouseSource::new(boards.greenhouse.clone(), d.ats)),
        Box::new(lever::LeverSource::new(boards.lever.clone(), d.ats)),
        Box::new(ashby::AshbySource::new(boards.ashby.clone(), d.ashby)),
        Box::new(adzuna::AdzunaSource::new(
            settings.adzuna_app_id.clone(),
            settings.adzuna_app_key.clone(),
            d.adzuna,
        )),
        Box::new(jsearch::JSearchSource::new(settings.jsearch_api_key.clone(), d.jsearch)),
        Box::new(remoteok::RemoteOkSource::new()),
        Box::new(serp::SerpSource::new(
            settings.serpapi_key.clone(),
            settings.companies_path(),
            d.serp,
        )),
    ]
}

// --- HTTP ---

pub struct HttpClient {
    client: reqwest::blocking::Client,
}

impl HttpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// GET and decode a JSON body. 429 maps to `RateLimited`, any other
    /// non-success status to `Status`.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send()?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text()?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(serde_json::from_str(&body)?)
    }
}

/// Sleep for a random duration within `range` seconds.
pub fn polite_delay(range: (f64, f64)) {
    let (lo, hi) = range;
    if !lo.is_finite() || !hi.is_finite() || hi <= 0.0 {
        return;
    }
    let lo = lo.max(0.0).min(hi);
    let secs = rand::thread_rng().gen_range(lo..=hi);
    std::thread::sleep(Duration::from_secs_f64(secs));
}

// --- Text helpers shared by adapters ---

/// Text content of an HTML fragment with entities decoded and whitespace
/// collapsed.
pub fn strip_html(s: &str) -> String {
    if !s.contains('<') && !s.contains('&') {
        return collapse_whitespace(s);
    }
    let fragment = Html::parse_fragment(s);
    let text: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `n` characters, for bounding the description text scanned for perks.
pub fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// "dbt-labs" becomes "Dbt Labs".
pub fn company_from_slug(slug: &str) -> String {
    crate::location::title_case(&slug.replace(['-', '_'], " "))
}

// --- Company boards ---

/// ATS board slugs per platform, persisted as `companies.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyBoards {
    #[serde(default)]
    pub greenhouse: Vec<String>,
    #[serde(default)]
    pub lever: Vec<String>,
    #[serde(default)]
    pub ashby: Vec<String>,
}

const GREENHOUSE_BOARDS: &[&str] = &[
    "airbnb", "stripe", "figma", "discord", "databricks", "cloudflare", "datadog", "coinbase",
    "robinhood", "dropbox", "gitlab", "pinterest", "lyft", "twilio", "instacart", "reddit",
    "razorpaysoftwareprivatelimited", "postman", "browserstack", "groww",
];

const LEVER_BOARDS: &[&str] = &["plaid", "palantir", "spotify", "meesho", "cred", "zeta"];

const ASHBY_BOARDS: &[&str] = &[
    "ramp", "brex", "mercury", "deel", "carta", "plaid", "column", "pipe", "notion", "figma",
    "linear", "vercel", "supabase", "railway", "planetscale", "neon", "resend", "dbt-labs",
    "grafana", "snyk", "anthropic", "cohere", "together-ai", "anyscale", "perplexity",
    "stability-ai", "adept", "character-ai", "midjourney", "writesonic", "loom", "calendly",
    "airtable", "retool", "miro", "webflow", "drata", "postman", "jasper-ai", "wiz",
    "lacework", "onepassword", "tailscale", "teleport", "gusto", "rippling", "lattice",
    "ashbyhq",
];

impl Default for CompanyBoards {
    fn default() -> Self {
        let owned = |list: &[&str]| -> Vec<String> { list.iter().map(|s| s.to_string()).collect() };
        Self {
            greenhouse: owned(GREENHOUSE_BOARDS),
            lever: owned(LEVER_BOARDS),
            ashby: owned(ASHBY_BOARDS),
        }
    }
}

impl CompanyBoards {
    /// Built-in boards when the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Adds slugs not already listed for `platform`; returns how many were new.
    /// Lists stay sorted and free of duplicates.
    pub fn merge(&mut self, platform: &str, slugs: impl IntoIterator<Item = String>) -> usize {
        let list = match platform {
            "greenhouse" => &mut self.greenhouse,
            "lever" => &mut self.lever,
            "ashby" => &mut self.ashby,
            _ => return 0,
        };
        let before = list.len();
        for slug in slugs {
            let slug = slug.trim().to_lowercase();
            if !slug.is_empty() && !list.contains(&slug) {
                info!(platform, slug = %slug, "discovered board");
                list.push(slug);
            }
        }
        let added = list.len() - before;
        if added > 0 {
            list.sort();
        }
        added
    }
}

/// Load, merge and write back in one step. The file is only rewritten when
/// something new was added.
pub fn expand_company_boards(path: &Path, platform: &str, slugs: Vec<String>) -> Result<usize> {
    let mut boards = CompanyBoards::load(path)?;
    let added = boards.merge(platform, slugs);
    if added > 0 {
        boards.save(path)?;
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html("<b>Senior</b>  Engineer"), "Senior Engineer");
        assert_eq!(strip_html("R&amp;D Engineer"), "R&D Engineer");
        assert_eq!(strip_html("  plain   text "), "plain text");
        assert_eq!(strip_html("<p>Line one</p><p>Line two</p>"), "Line one Line two");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
        assert_eq!(truncate_chars("₹₹₹₹", 2), "₹₹");
    }

    #[test]
    fn test_company_from_slug() {
        assert_eq!(company_from_slug("dbt-labs"), "Dbt Labs");
        assert_eq!(company_from_slug("stripe"), "Stripe");
    }

    #[test]
    fn test_fetch_error_soft_skip() {
        assert!(FetchError::MissingCredentials("SERPAPI_KEY").is_soft_skip());
        assert!(!FetchError::RateLimited.is_soft_skip());
        assert!(!FetchError::Api("quota".into()).is_soft_skip());
    }

    #[test]
    fn test_tally_reports_failure_only_when_nothing_succeeded() {
        let mut all_failed = RequestTally::default();
        all_failed.failed(FetchError::RateLimited);
        all_failed.failed(FetchError::Api("Invalid API key".into()));
        let err = all_failed.finish(Vec::new()).unwrap_err();
        assert!(matches!(err, FetchError::Api(ref msg) if msg == "Invalid API key"));
        assert!(!err.is_soft_skip());

        let mut partial = RequestTally::default();
        partial.failed(FetchError::RateLimited);
        partial.ok();
        let records = vec![RawRecord::RemoteOk(remoteok::RemoteOkJob::default())];
        assert_eq!(partial.finish(records).unwrap().len(), 1);

        let mut empty_ok = RequestTally::default();
        empty_ok.ok();
        assert!(empty_ok.finish(Vec::new()).unwrap().is_empty());

        assert!(RequestTally::default().finish(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_merge_dedupes_and_sorts() {
        let mut boards = CompanyBoards {
            greenhouse: vec!["stripe".into()],
            lever: vec![],
            ashby: vec![],
        };
        let added = boards.merge(
            "greenhouse",
            vec!["Acme".into(), "stripe".into(), "acme".into(), " ".into()],
        );
        assert_eq!(added, 1);
        assert_eq!(boards.greenhouse, vec!["acme", "stripe"]);
        assert_eq!(boards.merge("workday", vec!["x".into()]), 0);
    }

    #[test]
    fn test_boards_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.json");

        assert_eq!(CompanyBoards::load(&path).unwrap(), CompanyBoards::default());

        std::fs::write(&path, r#"{"greenhouse": ["figma"], "lever": ["plaid"]}"#).unwrap();
        let boards = CompanyBoards::load(&path).unwrap();
        assert_eq!(boards.greenhouse, vec!["figma"]);
        assert!(boards.ashby.is_empty());

        let added = expand_company_boards(&path, "lever", vec!["netflix".into()]).unwrap();
        assert_eq!(added, 1);
        let boards = CompanyBoards::load(&path).unwrap();
        assert_eq!(boards.lever, vec!["netflix", "plaid"]);

        assert_eq!(expand_company_boards(&path, "lever", vec!["plaid".into()]).unwrap(), 0);
    }

    #[test]
    fn test_zero_delay_returns_immediately() {
        polite_delay((0.0, 0.0));
    }
}
