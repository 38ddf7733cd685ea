mod dates;
mod db;
mod location;
mod models;
mod perks;
mod pipeline;
mod salary;
mod scoring;
mod settings;
mod sources;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use db::Database;
use models::{JobQuery, NormalizedJob};
use pipeline::{run_summary, write_run_summary, Pipeline, SourceReport, SourceStatus};
use settings::Settings;
use sources::{build_sources, CompanyBoards, SOURCE_NAMES};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobfeed")]
#[command(about = "Collect, normalize and de-duplicate job postings from many sources")]
struct Cli {
    /// Settings file (TOML). Missing file means defaults plus environment.
    #[arg(short, long, global = true, default_value = "jobfeed.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the job store
    Init,

    /// Sweep old jobs, ingest every source, write the run summary
    Run {
        /// Delete unsaved jobs older than this many days
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Ingest sources without sweeping
    Scrape {
        /// Only this source (greenhouse, lever, ashby, adzuna, jsearch, remoteok, serp)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Delete unsaved jobs older than the retention window
    Cleanup {
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// List stored jobs, newest first
    List {
        #[arg(long, default_value = "0")]
        min_score: u8,

        #[arg(short, long)]
        remote: bool,

        /// Substring of title or company
        #[arg(short, long)]
        keyword: Option<String>,

        /// ISO country code, e.g. IN or US
        #[arg(long)]
        country: Option<String>,

        #[arg(long)]
        india: bool,

        #[arg(long)]
        notable: bool,

        /// Lakhs per annum
        #[arg(long)]
        min_salary: Option<f64>,

        /// Lakhs per annum
        #[arg(long)]
        max_salary: Option<f64>,

        #[arg(short, long)]
        source: Option<String>,

        #[arg(short, long, default_value = "50")]
        limit: usize,

        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Show job details
    Show {
        /// Job ID or a unique prefix of it
        id: String,
    },

    /// Protect a job from cleanup
    Save { id: String },

    /// Remove the saved mark
    Unsave { id: String },

    /// Store statistics
    Stats,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    let db = Database::open(&settings.db_path())?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            let boards_path = settings.companies_path();
            if !boards_path.exists() {
                CompanyBoards::default().save(&boards_path)?;
                println!("Wrote default boards to {}", boards_path.display());
            }
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Run { max_age_days } => {
            db.ensure_initialized()?;
            let started = Instant::now();
            let days = max_age_days.unwrap_or(settings.retention_days);

            let deleted = db.sweep(days)?;
            println!("Removed {} job(s) older than {} days", deleted, days);

            let reports = ingest(&db, &settings, None)?;
            let new_jobs = print_reports(&reports);

            let summary = run_summary(new_jobs, db.count()?, started);
            write_run_summary(&settings.summary_path(), &summary)?;
            println!("\n{} new job(s), {} total, {:.1}s", new_jobs, summary.total, summary.elapsed_seconds);
        }

        Commands::Scrape { source } => {
            db.ensure_initialized()?;
            if let Some(name) = &source {
                if !SOURCE_NAMES.contains(&name.as_str()) {
                    bail!("Unknown source '{}'. Expected one of: {}", name, SOURCE_NAMES.join(", "));
                }
            }
            let started = Instant::now();

            let reports = ingest(&db, &settings, source.as_deref())?;
            let new_jobs = print_reports(&reports);

            let summary = run_summary(new_jobs, db.count()?, started);
            write_run_summary(&settings.summary_path(), &summary)?;
            println!("\n{} new job(s), {} total", new_jobs, summary.total);
        }

        Commands::Cleanup { max_age_days } => {
            db.ensure_initialized()?;
            let started = Instant::now();
            let days = max_age_days.unwrap_or(settings.retention_days);
            let deleted = db.sweep(days)?;

            let summary = run_summary(0, db.count()?, started);
            write_run_summary(&settings.summary_path(), &summary)?;
            println!("Removed {} job(s) older than {} days ({} remaining)", deleted, days, summary.total);
        }

        Commands::List {
            min_score,
            remote,
            keyword,
            country,
            india,
            notable,
            min_salary,
            max_salary,
            source,
            limit,
            offset,
        } => {
            db.ensure_initialized()?;
            let query = JobQuery {
                min_score,
                remote_only: remote,
                keyword,
                country,
                india_only: india,
                notable_only: notable,
                min_salary,
                max_salary,
                source,
                limit,
                offset,
            };
            let (jobs, total) = db.query(&query)?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!(
                    "{:<10} {:>5} {:<32} {:<20} {:<18} {:>12}",
                    "ID", "SCORE", "TITLE", "COMPANY", "LOCATION", "LPA"
                );
                println!("{}", "-".repeat(102));
                for job in &jobs {
                    println!(
                        "{:<10} {:>5} {:<32} {:<20} {:<18} {:>12}",
                        &job.id[..8.min(job.id.len())],
                        job.match_score,
                        truncate(&job.title, 30),
                        truncate(&job.company, 18),
                        truncate(&location_label(job), 16),
                        salary_label(job)
                    );
                }
                println!("\nShowing {}-{} of {}", offset + 1, offset + jobs.len(), total);
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.resolve_id(&id)? {
                Some(full) => match db.get(&full)? {
                    Some(job) => print_job(&job),
                    None => println!("Job {} not found.", id),
                },
                None => println!("Job {} not found.", id),
            }
        }

        Commands::Save { id } => {
            db.ensure_initialized()?;
            match db.resolve_id(&id)? {
                Some(full) if db.set_saved(&full, true)? => println!("Saved {}.", full),
                _ => println!("Job {} not found.", id),
            }
        }

        Commands::Unsave { id } => {
            db.ensure_initialized()?;
            match db.resolve_id(&id)? {
                Some(full) if db.set_saved(&full, false)? => println!("Unsaved {}.", full),
                _ => println!("Job {} not found.", id),
            }
        }

        Commands::Stats => {
            db.ensure_initialized()?;
            let stats = db.stats()?;
            println!("Total:        {}", stats.total);
            println!("Added today:  {}", stats.today);
            println!("India:        {}", stats.india);
            println!("Remote:       {}", stats.remote);
            println!("With salary:  {}", stats.with_salary);
            println!("Notable:      {}", stats.notable);
            if !stats.by_source.is_empty() {
                println!("\nBy source:");
                for (source, count) in &stats.by_source {
                    println!("  {:<18} {:>6}", source, count);
                }
            }
        }
    }

    Ok(())
}

fn ingest(db: &Database, settings: &Settings, only: Option<&str>) -> Result<Vec<SourceReport>> {
    let boards = CompanyBoards::load(&settings.companies_path())?;
    let sources: Vec<_> = build_sources(settings, &boards)
        .into_iter()
        .filter(|s| only.is_none_or(|name| s.name() == name))
        .collect();
    Pipeline::new(db, settings)?.ingest_all(&sources)
}

/// Prints one line per source and returns the number of new jobs.
fn print_reports(reports: &[SourceReport]) -> usize {
    println!(
        "\n{:<12} {:<10} {:>8} {:>10} {:>6}",
        "SOURCE", "STATUS", "FETCHED", "EXTRACTED", "NEW"
    );
    println!("{}", "-".repeat(50));
    for r in reports {
        let status = match &r.status {
            SourceStatus::Ingested => "ok",
            SourceStatus::Skipped(_) => "skipped",
            SourceStatus::Failed(_) => "failed",
        };
        println!(
            "{:<12} {:<10} {:>8} {:>10} {:>6}",
            r.source, status, r.fetched, r.extracted, r.inserted
        );
    }
    reports.iter().map(|r| r.inserted).sum()
}

fn print_job(job: &NormalizedJob) {
    println!("Job {}", job.id);
    println!("Title: {}", job.title);
    println!("Company: {}", job.company);
    if !job.location.is_empty() {
        println!("Location: {}", job.location);
    }
    let geo: Vec<&str> = [job.city.as_str(), job.state.as_str(), job.country.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    if !geo.is_empty() {
        println!("Resolved: {}", geo.join(", "));
    }
    if job.is_remote {
        println!("Remote: yes");
    }
    let salary = salary_label(job);
    if salary != "-" {
        println!("Salary: {} LPA ({})", salary, job.salary_currency);
    }
    let perks: Vec<&str> = [(job.visa_sponsored, "visa sponsorship"), (job.has_equity, "equity")]
        .into_iter()
        .filter_map(|(on, label)| on.then_some(label))
        .collect();
    if !perks.is_empty() {
        println!("Perks: {}", perks.join(", "));
    }
    println!("Score: {}", job.match_score);
    println!("Source: {} ({})", job.source, job.category.as_str());
    println!("URL: {}", job.apply_url);
    println!("Posted: {}", job.posted_date);
    println!("Added: {}", job.created_at);
    if job.saved {
        println!("Saved: yes");
    }
}

fn location_label(job: &NormalizedJob) -> String {
    let place = if !job.city.is_empty() {
        job.city.clone()
    } else if !job.country.is_empty() {
        job.country.clone()
    } else {
        job.location.clone()
    };
    match (job.is_remote, place.is_empty()) {
        (true, true) => "Remote".to_string(),
        (true, false) => format!("{} (R)", place),
        (false, _) => place,
    }
}

fn salary_label(job: &NormalizedJob) -> String {
    match (job.salary_min, job.salary_max) {
        (Some(min), Some(max)) if min == max => format!("{:.1}", min),
        (Some(min), Some(max)) => format!("{:.1}-{:.1}", min, max),
        (Some(min), None) => format!("{:.1}+", min),
        (None, Some(max)) => format!("<{:.1}", max),
        (None, None) => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
