use serde::Deserialize;
use tracing::{info, warn};

use super::{
    polite_delay, strip_html, FetchError, HttpClient, RawRecord, RequestTally, Source,
};
use crate::models::{GeoHint, JobDraft, SalaryHint, SourceCategory};

const API_BASE: &str = "https://api.adzuna.com/v1/api/jobs";
const RESULTS_PER_PAGE: u32 = 50;

/// (what, where, market)
const QUERIES: &[(&str, &str, &str)] = &[
    ("software engineer", "india", "in"),
    ("react developer", "india", "in"),
    ("frontend developer", "india", "in"),
    ("backend developer", "india", "in"),
    ("fullstack developer", "india", "in"),
    ("python developer", "india", "in"),
    ("java developer", "bangalore", "in"),
    ("node developer", "india", "in"),
    ("software engineer", "remote", "us"),
    ("react developer", "", "us"),
    ("frontend developer", "", "us"),
    ("backend developer", "", "us"),
    ("software engineer", "london", "gb"),
    ("software engineer", "amsterdam", "nl"),
    ("frontend developer", "netherlands", "nl"),
    ("software engineer", "dublin", "ie"),
    ("react developer", "ireland", "ie"),
    ("software engineer", "paris", "fr"),
    ("frontend developer", "france", "fr"),
    ("software engineer", "auckland", "nz"),
    ("web developer", "new zealand", "nz"),
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<AdzunaResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdzunaResult {
    pub title: String,
    pub company: Option<AdzunaCompany>,
    pub location: Option<AdzunaLocation>,
    pub redirect_url: Option<String>,
    pub adref: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub created: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdzunaCompany {
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdzunaLocation {
    pub display_name: String,
    /// Broadest first: country, region, city.
    pub area: Vec<String>,
}

pub struct AdzunaSource {
    app_id: Option<String>,
    app_key: Option<String>,
    delay: (f64, f64),
}

impl AdzunaSource {
    pub fn new(app_id: Option<String>, app_key: Option<String>, delay: (f64, f64)) -> Self {
        Self {
            app_id,
            app_key,
            delay,
        }
    }
}

impl Source for AdzunaSource {
    fn name(&self) -> &'static str {
        "adzuna"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::ApiAggregator
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let (Some(app_id), Some(app_key)) = (&self.app_id, &self.app_key) else {
            return Err(FetchError::MissingCredentials("ADZUNA_APP_ID / ADZUNA_APP_KEY"));
        };

        let mut records = Vec::new();
        let mut tally = RequestTally::default();
        for (i, (what, where_, market)) in QUERIES.iter().enumerate() {
            let url = format!("{API_BASE}/{market}/search/1");
            let mut query = vec![
                ("app_id", app_id.clone()),
                ("app_key", app_key.clone()),
                ("what", what.to_string()),
                ("results_per_page", RESULTS_PER_PAGE.to_string()),
                ("content-type", "application/json".to_string()),
                ("sort_by", "date".to_string()),
            ];
            if !where_.is_empty() {
                query.push(("where", where_.to_string()));
            }

            match http.get_json::<SearchResponse>(&url, &query, &[]) {
                Ok(resp) => {
                    tally.ok();
                    info!(
                        what,
                        market,
                        results = resp.results.len(),
                        "adzuna query {}/{}",
                        i + 1,
                        QUERIES.len()
                    );
                    records.extend(resp.results.into_iter().map(|result| RawRecord::Adzuna {
                        market: market.to_string(),
                        result,
                    }));
                }
                Err(e) => {
                    warn!(what, market, error = %e, "adzuna query failed");
                    tally.failed(e);
                }
            }
            polite_delay(self.delay);
        }
        tally.finish(records)
    }
}

pub fn to_draft(market: &str, result: AdzunaResult) -> Option<JobDraft> {
    let title = strip_html(&result.title);
    let apply_url = [result.redirect_url.as_deref(), result.adref.as_deref()]
        .into_iter()
        .flatten()
        .find(|u| !u.trim().is_empty())?
        .to_string();
    if title.is_empty() {
        return None;
    }

    // Most specific first, so "Bangalore, Karnataka, India" rather than
    // the area order Adzuna returns.
    let location = match result.location {
        Some(loc) if !loc.area.is_empty() => loc
            .area
            .iter()
            .rev()
            .filter(|a| !a.trim().is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
        Some(loc) => loc.display_name,
        None => String::new(),
    };

    let mut draft = JobDraft::new("adzuna", SourceCategory::ApiAggregator);
    draft.company = result.company.map(|c| c.display_name).unwrap_or_default();
    draft.apply_url = apply_url;
    draft.posted = result.created;
    draft.geo = GeoHint {
        country: Some(market.to_uppercase()),
        ..Default::default()
    };
    draft.salary = vec![SalaryHint::CountryAmounts {
        min: result.salary_min,
        max: result.salary_max,
    }];
    draft.perks_text = strip_html(result.description.as_deref().unwrap_or(""));
    draft.location = location;
    draft.title = title;
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_maps_to_draft() {
        let body = r#"{"results": [{
            "title": "<strong>Python</strong> Developer",
            "company": {"display_name": "Zoho"},
            "location": {"display_name": "Chennai, Tamil Nadu", "area": ["India", "Tamil Nadu", "Chennai"]},
            "redirect_url": "https://www.adzuna.in/details/123",
            "salary_min": 1200000,
            "salary_max": 1800000.0,
            "created": "2026-03-10T08:00:00Z",
            "description": "ESOPs available"
        }]}"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        let draft = to_draft("in", resp.results[0].clone()).unwrap();

        assert_eq!(draft.title, "Python Developer");
        assert_eq!(draft.company, "Zoho");
        assert_eq!(draft.location, "Chennai, Tamil Nadu, India");
        assert_eq!(draft.geo.country.as_deref(), Some("IN"));
        assert_eq!(draft.category, SourceCategory::ApiAggregator);
        assert!(matches!(
            draft.salary[0],
            SalaryHint::CountryAmounts { min: Some(_), max: Some(_) }
        ));
    }

    #[test]
    fn test_display_name_when_no_area() {
        let result = AdzunaResult {
            title: "SDE".into(),
            adref: Some("eyJhbGciOi".into()),
            location: Some(AdzunaLocation {
                display_name: "London".into(),
                area: vec![],
            }),
            ..Default::default()
        };
        let draft = to_draft("gb", result).unwrap();
        assert_eq!(draft.location, "London");
        assert_eq!(draft.apply_url, "eyJhbGciOi");
    }

    #[test]
    fn test_missing_link_is_dropped() {
        let result = AdzunaResult {
            title: "SDE".into(),
            ..Default::default()
        };
        assert!(to_draft("us", result).is_none());
    }
}
