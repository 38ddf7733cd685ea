//! Source records in, stored jobs out. Every record, whatever its source,
//! passes through the same four analyzers before it reaches the store.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::dates::normalize_posted_date;
use crate::db::Database;
use crate::location::LocationResolver;
use crate::models::{job_id, JobDraft, NormalizedJob, RunSummary, SalaryHint};
use crate::perks::PerksDetector;
use crate::salary::{currency_for_country, Salary, SalaryNormalizer};
use crate::scoring::RelevanceScorer;
use crate::settings::Settings;
use crate::sources::{HttpClient, RawRecord, Source};

pub struct Analyzers {
    location: LocationResolver,
    salary: SalaryNormalizer,
    perks: PerksDetector,
    scorer: RelevanceScorer,
}

impl Analyzers {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            location: LocationResolver::default(),
            salary: SalaryNormalizer::new(settings.exchange_rates())
                .context("Failed to compile salary patterns")?,
            perks: PerksDetector::default(),
            scorer: RelevanceScorer::new(settings.scoring.clone()),
        })
    }

    pub fn extract_one(&self, raw: RawRecord, now: DateTime<Utc>) -> Option<NormalizedJob> {
        self.normalize(raw.into_draft()?, now)
    }

    /// None when the draft has no title or link, or scores 0.
    pub fn normalize(&self, draft: JobDraft, now: DateTime<Utc>) -> Option<NormalizedJob> {
        let title = draft.title.trim().to_string();
        let company = draft.company.trim().to_string();
        let apply_url = draft.apply_url.trim().to_string();
        if title.is_empty() || apply_url.is_empty() {
            return None;
        }

        let loc = self.location.resolve(&draft.location);
        let hint = |h: &Option<String>| h.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        let country = hint(&draft.geo.country)
            .map(|c| c.to_uppercase())
            .unwrap_or(loc.country);
        let state = hint(&draft.geo.state).unwrap_or(loc.state);
        let city = hint(&draft.geo.city).unwrap_or(loc.city);
        let is_remote = loc.is_remote || draft.remote_hint;
        let is_india = country == "IN"
            || (country.is_empty() && self.location.mentions_india(&title, &draft.location, &company));

        let match_score = self.scorer.score(&title, &draft.location, &company, is_remote);
        if match_score == 0 {
            debug!(title = %title, company = %company, source = %draft.source, "rejected by scorer");
            return None;
        }

        let salary = self.first_salary(&draft.salary, &country);
        let (salary_min, salary_max) = match (salary.min, salary.max) {
            (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
            other => other,
        };
        let perks = self.perks.detect(&format!("{} {}", title, draft.perks_text));

        let location = loc.location_raw;
        Some(NormalizedJob {
            id: job_id(&title, &company, &location),
            is_notable_employer: self.scorer.is_notable_employer(&company),
            posted_date: normalize_posted_date(draft.posted.as_deref(), now),
            created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            source: draft.source,
            category: draft.category,
            salary_currency: salary.currency.unwrap_or_default(),
            visa_sponsored: perks.visa_sponsored,
            has_equity: perks.has_equity,
            saved: false,
            title,
            company,
            apply_url,
            location,
            country,
            state,
            city,
            is_remote,
            is_india,
            salary_min,
            salary_max,
            match_score,
        })
    }

    /// First hint, in the adapter's order, that yields a bound.
    fn first_salary(&self, hints: &[SalaryHint], country: &str) -> Salary {
        hints
            .iter()
            .map(|h| match h {
                SalaryHint::Text(text) => self.salary.normalize(text),
                SalaryHint::Amounts {
                    min,
                    max,
                    currency,
                    period,
                } => self
                    .salary
                    .from_amounts(*min, *max, currency.as_deref(), period.as_deref()),
                SalaryHint::CountryAmounts { min, max } => {
                    self.salary
                        .from_amounts(*min, *max, currency_for_country(country), None)
                }
            })
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

// --- Ingestion ---

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Ingested,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: &'static str,
    pub status: SourceStatus,
    pub fetched: usize,
    pub extracted: usize,
    pub inserted: usize,
}

impl SourceReport {
    fn empty(source: &'static str, status: SourceStatus) -> Self {
        Self {
            source,
            status,
            fetched: 0,
            extracted: 0,
            inserted: 0,
        }
    }
}

pub struct Pipeline<'a> {
    db: &'a Database,
    http: HttpClient,
    analyzers: Analyzers,
}

impl<'a> Pipeline<'a> {
    pub fn new(db: &'a Database, settings: &Settings) -> Result<Self> {
        Ok(Self {
            db,
            http: HttpClient::new(settings)?,
            analyzers: Analyzers::new(settings)?,
        })
    }

    /// Fetch, normalize and store one source. Fetch failures cost the source
    /// its records for this run; store failures abort the run.
    pub fn ingest_source(&self, source: &dyn Source) -> Result<SourceReport> {
        let name = source.name();
        let started = Instant::now();

        let records = match source.fetch(&self.http) {
            Ok(records) => records,
            Err(e) if e.is_soft_skip() => {
                info!(source = name, reason = %e, "skipping source");
                return Ok(SourceReport::empty(name, SourceStatus::Skipped(e.to_string())));
            }
            Err(e) => {
                warn!(source = name, error = %e, "source fetch failed");
                return Ok(SourceReport::empty(name, SourceStatus::Failed(e.to_string())));
            }
        };

        let now = Utc::now();
        let fetched = records.len();
        let jobs: Vec<NormalizedJob> = records
            .into_iter()
            .filter_map(|raw| self.analyzers.extract_one(raw, now))
            .collect();
        let inserted = self
            .db
            .insert_batch(&jobs)
            .with_context(|| format!("Failed to store jobs from {}", name))?;

        info!(
            source = name,
            category = source.category().as_str(),
            fetched,
            extracted = jobs.len(),
            inserted,
            duplicates = jobs.len() - inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "source done"
        );
        Ok(SourceReport {
            source: name,
            status: SourceStatus::Ingested,
            fetched,
            extracted: jobs.len(),
            inserted,
        })
    }

    pub fn ingest_all(&self, sources: &[Box<dyn Source>]) -> Result<Vec<SourceReport>> {
        sources.iter().map(|s| self.ingest_source(s.as_ref())).collect()
    }
}

// --- Run summary ---

pub fn run_summary(new_jobs: usize, total: usize, started: Instant) -> RunSummary {
    let elapsed = started.elapsed().as_secs_f64();
    RunSummary {
        last_run: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        new_jobs,
        total,
        elapsed_seconds: (elapsed * 10.0).round() / 10.0,
    }
}

pub fn write_run_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), new_jobs = summary.new_jobs, total = summary.total, "wrote run summary");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoHint, SourceCategory};
    use crate::sources::greenhouse::{GreenhouseJob, GreenhouseLocation};
    use crate::sources::FetchError;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn analyzers() -> Analyzers {
        Analyzers::new(&Settings::default()).unwrap()
    }

    fn draft(title: &str, company: &str, location: &str) -> JobDraft {
        let mut d = JobDraft::new("greenhouse", SourceCategory::Ats);
        d.title = title.into();
        d.company = company.into();
        d.location = location.into();
        d.apply_url = "https://example.com/apply".into();
        d
    }

    #[test]
    fn test_normalize_full_record() {
        let mut d = draft("Senior Software Engineer", "Stripe", "Bangalore, India");
        d.salary = vec![SalaryHint::Text("CTC 30 to 45 LPA".into())];
        d.perks_text = "We offer ESOPs".into();
        d.posted = Some("3 days ago".into());

        let job = analyzers().normalize(d, now()).unwrap();
        assert_eq!(job.country, "IN");
        assert!(job.is_india);
        assert!(!job.is_remote);
        assert_eq!(job.salary_min, Some(30.0));
        assert_eq!(job.salary_max, Some(45.0));
        assert_eq!(job.salary_currency, "INR");
        assert!(job.has_equity);
        assert!(job.is_notable_employer);
        assert_eq!(job.match_score, 100);
        assert_eq!(job.posted_date, "2026-03-12");
        assert_eq!(job.created_at, "2026-03-15T12:00:00Z");
        assert_eq!(job.id, job_id("Senior Software Engineer", "Stripe", "Bangalore, India"));
        assert!(!job.saved);
    }

    #[test]
    fn test_zero_score_is_rejected() {
        let a = analyzers();
        assert!(a.normalize(draft("Head of Sales", "Acme", "Remote"), now()).is_none());
        assert!(a.normalize(draft("Software Engineer (unpaid)", "Acme", ""), now()).is_none());
    }

    #[test]
    fn test_missing_title_or_url_is_rejected() {
        let a = analyzers();
        assert!(a.normalize(draft("   ", "Acme", ""), now()).is_none());
        let mut d = draft("Backend Engineer", "Acme", "");
        d.apply_url = " ".into();
        assert!(a.normalize(d, now()).is_none());
    }

    #[test]
    fn test_geo_hints_override_resolver() {
        let mut d = draft("React Developer", "Acme", "Springfield");
        d.geo = GeoHint {
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            country: Some("us".into()),
        };
        d.remote_hint = true;
        let job = analyzers().normalize(d, now()).unwrap();
        assert_eq!(job.country, "US");
        assert_eq!(job.state, "IL");
        assert!(job.is_remote);
        assert!(!job.is_india);
        assert_eq!(job.match_score, 100);
    }

    #[test]
    fn test_salary_hints_fall_through_in_order() {
        let mut d = draft("Python Developer", "Acme", "London, UK");
        d.geo.country = Some("GB".into());
        d.salary = vec![
            SalaryHint::Amounts {
                min: None,
                max: None,
                currency: Some("USD".into()),
                period: None,
            },
            SalaryHint::CountryAmounts {
                min: Some(100_000.0),
                max: Some(50_000.0),
            },
        ];
        let job = analyzers().normalize(d, now()).unwrap();
        assert_eq!(job.salary_currency, "GBP");
        assert_eq!(job.salary_min, Some(53.0));
        assert_eq!(job.salary_max, Some(106.0));
    }

    #[test]
    fn test_no_salary_leaves_fields_empty() {
        let job = analyzers()
            .normalize(draft("Frontend Engineer", "Acme", "Berlin"), now())
            .unwrap();
        assert_eq!(job.salary_min, None);
        assert_eq!(job.salary_max, None);
        assert_eq!(job.salary_currency, "");
        assert_eq!(job.posted_date, "2026-03-15");
    }

    #[test]
    fn test_extract_one_from_raw_record() {
        let raw = RawRecord::Greenhouse {
            board: "figma".into(),
            job: GreenhouseJob {
                id: Some(9),
                title: "Software Engineer, Backend".into(),
                location: Some(GreenhouseLocation {
                    name: "Remote - India".into(),
                }),
                ..Default::default()
            },
        };
        let job = analyzers().extract_one(raw, now()).unwrap();
        assert_eq!(job.company, "Figma");
        assert_eq!(job.source, "greenhouse");
        assert_eq!(job.category, SourceCategory::Ats);
        assert!(job.is_remote);
        assert!(job.is_india);
    }

    // --- Ingestion with stub sources ---

    struct StubSource {
        name: &'static str,
        result: fn() -> Result<Vec<RawRecord>, FetchError>,
    }

    impl Source for StubSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn category(&self) -> SourceCategory {
            SourceCategory::Ats
        }

        fn fetch(&self, _http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
            (self.result)()
        }
    }

    fn greenhouse_records() -> Result<Vec<RawRecord>, FetchError> {
        let job = |id: u64, title: &str| RawRecord::Greenhouse {
            board: "stripe".into(),
            job: GreenhouseJob {
                id: Some(id),
                title: title.into(),
                location: Some(GreenhouseLocation {
                    name: "Dublin, Ireland".into(),
                }),
                ..Default::default()
            },
        };
        Ok(vec![
            job(1, "Software Engineer"),
            job(2, "Frontend Engineer"),
            job(3, "Account Executive"),
            job(4, "Software Engineer"),
        ])
    }

    #[test]
    fn test_ingest_is_idempotent_and_isolates_failures() {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        let pipeline = Pipeline::new(&db, &Settings::default()).unwrap();

        let sources: Vec<Box<dyn Source>> = vec![
            Box::new(StubSource {
                name: "missing-key",
                result: || Err(FetchError::MissingCredentials("SERPAPI_KEY")),
            }),
            Box::new(StubSource {
                name: "broken",
                result: || Err(FetchError::RateLimited),
            }),
            Box::new(StubSource {
                name: "greenhouse",
                result: greenhouse_records,
            }),
        ];

        let reports = pipeline.ingest_all(&sources).unwrap();
        assert!(matches!(reports[0].status, SourceStatus::Skipped(_)));
        assert!(matches!(reports[1].status, SourceStatus::Failed(_)));
        assert_eq!(reports[2].status, SourceStatus::Ingested);
        assert_eq!(reports[2].fetched, 4);
        // Sales role scores 0; the repeated title collapses to one id.
        assert_eq!(reports[2].extracted, 3);
        assert_eq!(reports[2].inserted, 2);
        assert_eq!(db.count().unwrap(), 2);

        let again = pipeline.ingest_all(&sources).unwrap();
        assert_eq!(again[2].inserted, 0);
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn test_write_run_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("last_run.json");
        let summary = run_summary(7, 120, Instant::now());
        write_run_summary(&path, &summary).unwrap();

        let written: RunSummary =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.new_jobs, 7);
        assert_eq!(written.total, 120);
        assert!(written.last_run.ends_with('Z'));
        assert!(written.elapsed_seconds < 1.0);
    }
}
