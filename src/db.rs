use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{JobQuery, NormalizedJob, SourceCategory, StoreStats};

/// Columns added after the first release. Checked against `PRAGMA table_info`
/// before any ALTER so `init` can run against any older store.
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("country", "TEXT NOT NULL DEFAULT ''"),
    ("state", "TEXT NOT NULL DEFAULT ''"),
    ("city", "TEXT NOT NULL DEFAULT ''"),
    ("is_india", "INTEGER NOT NULL DEFAULT 0"),
    ("is_notable", "INTEGER NOT NULL DEFAULT 0"),
    ("salary_min", "REAL"),
    ("salary_max", "REAL"),
    ("salary_currency", "TEXT NOT NULL DEFAULT ''"),
    ("category", "TEXT NOT NULL DEFAULT 'ATS'"),
    ("visa_sponsored", "INTEGER NOT NULL DEFAULT 0"),
    ("has_equity", "INTEGER NOT NULL DEFAULT 0"),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_jobs_company ON jobs(company)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_match_score ON jobs(match_score DESC)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_remote ON jobs(remote)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_country ON jobs(country)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_is_india ON jobs(is_india)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_is_notable ON jobs(is_notable)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_salary ON jobs(salary_min)",
];

const JOB_COLUMNS: &str = "id, title, company, apply_url, source, category, location, \
     country, state, city, remote, is_india, salary_min, salary_max, salary_currency, \
     visa_sponsored, has_equity, match_score, posted_date, created_at, saved, is_notable";

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                remote INTEGER NOT NULL DEFAULT 0,
                apply_url TEXT NOT NULL,
                source TEXT NOT NULL,
                posted_date TEXT,
                match_score INTEGER NOT NULL DEFAULT 0,
                saved INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )?;

        // Columns first, indexes reference some of them.
        self.migrate()?;
        for sql in INDEXES {
            self.conn.execute(sql, [])?;
        }
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let existing = self.columns()?;
        for (name, decl) in ADDED_COLUMNS {
            if existing.iter().any(|c| c == name) {
                continue;
            }
            self.conn
                .execute(&format!("ALTER TABLE jobs ADD COLUMN {name} {decl}"), [])
                .with_context(|| format!("Failed to add column {name}"))?;
            info!(column = *name, "added column to jobs table");
        }
        Ok(())
    }

    fn columns(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(jobs)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='jobs'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(anyhow!("Database not initialized. Run 'jobfeed init' first."));
        }
        Ok(())
    }

    // --- Write path ---

    /// Inserts every job whose id is not already stored, in one transaction.
    /// Returns how many rows were new.
    pub fn insert_batch(&self, jobs: &[NormalizedJob]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO jobs ({JOB_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
                 ON CONFLICT(id) DO NOTHING"
            ))?;
            for job in jobs {
                let changed = stmt
                    .execute(params![
                        job.id,
                        job.title,
                        job.company,
                        job.apply_url,
                        job.source,
                        job.category.as_str(),
                        job.location,
                        job.country,
                        job.state,
                        job.city,
                        job.is_remote,
                        job.is_india,
                        job.salary_min,
                        job.salary_max,
                        job.salary_currency,
                        job.visa_sponsored,
                        job.has_equity,
                        job.match_score,
                        job.posted_date,
                        job.created_at,
                        job.saved,
                        job.is_notable_employer,
                    ])
                    .with_context(|| format!("Failed to insert job {}", job.id))?;
                inserted += changed;
            }
        }
        tx.commit().context("Failed to commit job batch")?;
        debug!(attempted = jobs.len(), inserted, "batch committed");
        Ok(inserted)
    }

    /// Deletes unsaved rows created more than `max_age_days` ago.
    pub fn sweep(&self, max_age_days: u32) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(i64::from(max_age_days)))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let deleted = self.conn.execute(
            "DELETE FROM jobs WHERE created_at < ?1 AND saved = 0",
            [&cutoff],
        )?;
        info!(deleted, max_age_days, "retention sweep");
        Ok(deleted)
    }

    /// Returns false when no row has the id.
    pub fn set_saved(&self, id: &str, saved: bool) -> Result<bool> {
        let changed = self
            .conn
            .execute("UPDATE jobs SET saved = ?1 WHERE id = ?2", params![saved, id])?;
        Ok(changed > 0)
    }

    // --- Read path ---

    pub fn get(&self, id: &str) -> Result<Option<NormalizedJob>> {
        let result = self.conn.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            [id],
            Self::row_to_job,
        );
        match result {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Full id for an unambiguous prefix. Ids are lowercase hex; anything
    /// else resolves to nothing.
    pub fn resolve_id(&self, prefix: &str) -> Result<Option<String>> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM jobs WHERE id LIKE ?1 || '%' LIMIT 2")?;
        let ids = stmt
            .query_map([&prefix], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        match ids.as_slice() {
            [only] => Ok(Some(only.clone())),
            [] => Ok(None),
            _ => bail!("Id prefix '{}' matches more than one job", prefix),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// One page of matching rows, newest first, plus the total match count.
    pub fn query(&self, q: &JobQuery) -> Result<(Vec<NormalizedJob>, usize)> {
        let mut clause = String::from(" WHERE match_score >= ?");
        let mut values: Vec<Value> = vec![Value::Integer(i64::from(q.min_score))];

        if q.remote_only {
            clause.push_str(" AND remote = 1");
        }
        if let Some(kw) = q.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            clause.push_str(
                " AND (LOWER(title) LIKE ? ESCAPE '\\' OR LOWER(company) LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", escape_like(&kw.trim().to_lowercase()));
            values.push(Value::Text(pattern.clone()));
            values.push(Value::Text(pattern));
        }
        if let Some(country) = q.country.as_deref().filter(|c| !c.trim().is_empty()) {
            clause.push_str(" AND country = ?");
            values.push(Value::Text(country.trim().to_uppercase()));
        }
        if q.india_only {
            clause.push_str(" AND is_india = 1");
        }
        if q.notable_only {
            clause.push_str(" AND is_notable = 1");
        }
        if let Some(min) = q.min_salary {
            clause.push_str(" AND salary_min >= ?");
            values.push(Value::Real(min));
        }
        if let Some(max) = q.max_salary {
            clause.push_str(" AND salary_max <= ?");
            values.push(Value::Real(max));
        }
        if let Some(source) = q.source.as_deref().filter(|s| !s.trim().is_empty()) {
            clause.push_str(" AND source LIKE ? ESCAPE '\\'");
            values.push(Value::Text(format!("%{}%", escape_like(source.trim()))));
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs{clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs{clause}
             ORDER BY created_at DESC, match_score DESC LIMIT ? OFFSET ?"
        );
        values.push(Value::Integer(q.limit as i64));
        values.push(Value::Integer(q.offset as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query jobs")?;

        Ok((rows, total as usize))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };

        let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
        let today_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE created_at LIKE ?1",
            [format!("{today}%")],
            |row| row.get(0),
        )?;

        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM jobs GROUP BY source")?;
        let by_source = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<_, _>>()?;

        Ok(StoreStats {
            total: count("SELECT COUNT(*) FROM jobs")?,
            today: today_count as usize,
            by_source,
            india: count("SELECT COUNT(*) FROM jobs WHERE is_india = 1")?,
            remote: count("SELECT COUNT(*) FROM jobs WHERE remote = 1")?,
            with_salary: count(
                "SELECT COUNT(*) FROM jobs WHERE salary_min IS NOT NULL AND salary_min > 0",
            )?,
            notable: count("SELECT COUNT(*) FROM jobs WHERE is_notable = 1")?,
        })
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<NormalizedJob> {
        let category: String = row.get(5)?;
        let score: i64 = row.get(17)?;
        Ok(NormalizedJob {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            apply_url: row.get(3)?,
            source: row.get(4)?,
            category: SourceCategory::parse(&category).unwrap_or(SourceCategory::Ats),
            location: row.get(6)?,
            country: row.get(7)?,
            state: row.get(8)?,
            city: row.get(9)?,
            is_remote: row.get(10)?,
            is_india: row.get(11)?,
            salary_min: row.get(12)?,
            salary_max: row.get(13)?,
            salary_currency: row.get(14)?,
            visa_sponsored: row.get(15)?,
            has_equity: row.get(16)?,
            match_score: score.clamp(0, 100) as u8,
            posted_date: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
            created_at: row.get(19)?,
            saved: row.get(20)?,
            is_notable_employer: row.get(21)?,
        })
    }
}

/// Make `%`, `_` and `\` match literally in a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
