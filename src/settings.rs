use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::salary::ExchangeRates;
use crate::scoring::ScoringConfig;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Randomized pause ranges, in seconds, between requests to the same source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelaySettings {
    pub ats: (f64, f64),
    pub ashby: (f64, f64),
    pub adzuna: (f64, f64),
    pub jsearch: (f64, f64),
    pub serp: (f64, f64),
}

impl Default for DelaySettings {
    fn default() -> Self {
        Self {
            ats: (0.5, 1.5),
            ashby: (0.3, 0.8),
            adzuna: (0.5, 1.0),
            jsearch: (1.0, 2.0),
            serp: (1.0, 2.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub companies_file: Option<PathBuf>,
    pub retention_days: u32,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub serpapi_key: Option<String>,
    pub adzuna_app_id: Option<String>,
    pub adzuna_app_key: Option<String>,
    pub jsearch_api_key: Option<String>,
    pub delays: DelaySettings,
    pub scoring: ScoringConfig,
    /// Overlaid on the built-in table; codes not listed keep their default.
    pub exchange_rates: ExchangeRates,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            db_path: None,
            companies_file: None,
            retention_days: 30,
            request_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            serpapi_key: None,
            adzuna_app_id: None,
            adzuna_app_key: None,
            jsearch_api_key: None,
            delays: DelaySettings::default(),
            scoring: ScoringConfig::default(),
            exchange_rates: ExchangeRates::default(),
        }
    }
}

impl Settings {
    /// File (optional) under `JOBFEED_` environment variables, then the
    /// conventional un-prefixed credential variables for anything still unset.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()).required(false))
            .add_source(
                config::Environment::with_prefix("JOBFEED")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        let mut settings: Settings = raw
            .try_deserialize()
            .context("Failed to parse settings")?;
        settings.fill_credentials(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn fill_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let slots = [
            (&mut self.serpapi_key, "SERPAPI_KEY"),
            (&mut self.adzuna_app_id, "ADZUNA_APP_ID"),
            (&mut self.adzuna_app_key, "ADZUNA_APP_KEY"),
            (&mut self.jsearch_api_key, "JSEARCH_API_KEY"),
        ];
        for (slot, var) in slots {
            let current = slot.take().filter(|v| !v.trim().is_empty());
            *slot = current.or_else(|| lookup(var).filter(|v| !v.trim().is_empty()));
        }
    }

    // --- Paths ---

    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobfeed") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from("data")
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join("jobs.db"))
    }

    pub fn companies_path(&self) -> PathBuf {
        self.companies_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("companies.json"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.data_dir().join("last_run.json")
    }

    pub fn exchange_rates(&self) -> ExchangeRates {
        ExchangeRates::default().merged(&self.exchange_rates)
    }
}
