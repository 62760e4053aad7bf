use crate::error::SinkError;
use crate::sink::{RunStatus, UrlSink};
use rusqlite::{Connection, OptionalExtension, Result, params};
use serde::{Deserialize, Serialize};
use sitemapwalk_scanner::UrlRecord;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub input: String,
    pub status: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub url_count: i64,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl Database {
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- One row per sitemapwalk run
            CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    input TEXT NOT NULL,      -- path of the root document
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'failed', 'cancelled')),
    url_count INTEGER NOT NULL DEFAULT 0
);

-- Page URLs in the order the run delivered them
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    location TEXT NOT NULL,
    lastmod TEXT,
    discovered_at INTEGER NOT NULL,

    FOREIGN KEY(run_id) REFERENCES runs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_urls_run ON urls(run_id, position);
CREATE INDEX IF NOT EXISTS idx_urls_location ON urls(location);
            ",
        )?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // Run management
    pub fn create_run(&self, input: &str) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let timestamp = current_timestamp();

        self.conn.execute(
            "INSERT INTO runs (id, input, start_time, status) VALUES (?1, ?2, ?3, ?4)",
            params![&run_id, input, timestamp, RunStatus::Running.as_str()],
        )?;

        Ok(run_id)
    }

    pub fn finish_run(&self, run_id: &str, status: RunStatus, url_count: usize) -> Result<()> {
        let timestamp = current_timestamp();
        self.conn.execute(
            "UPDATE runs SET status = ?1, end_time = ?2, url_count = ?3 WHERE id = ?4",
            params![status.as_str(), timestamp, url_count as i64, run_id],
        )?;
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        self.conn
            .query_row(
                "SELECT id, input, status, start_time, end_time, url_count FROM runs WHERE id = ?1",
                params![run_id],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        input: row.get(1)?,
                        status: row.get(2)?,
                        start_time: row.get(3)?,
                        end_time: row.get(4)?,
                        url_count: row.get(5)?,
                    })
                },
            )
            .optional()
    }

    pub fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, input, status, start_time, end_time, url_count FROM runs
             ORDER BY start_time DESC, rowid DESC",
        )?;
        let runs = stmt
            .query_map([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    input: row.get(1)?,
                    status: row.get(2)?,
                    start_time: row.get(3)?,
                    end_time: row.get(4)?,
                    url_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(runs)
    }

    // URL storage
    pub fn insert_url(&self, run_id: &str, position: usize, record: &UrlRecord) -> Result<i64> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO urls (run_id, position, location, lastmod, discovered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            run_id,
            position as i64,
            &record.location,
            &record.lastmod,
            current_timestamp()
        ])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_urls(&self, run_id: &str) -> Result<Vec<UrlRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT location, lastmod FROM urls WHERE run_id = ?1 ORDER BY position")?;
        let urls = stmt
            .query_map(params![run_id], |row| {
                Ok(UrlRecord {
                    location: row.get(0)?,
                    lastmod: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(urls)
    }

    pub fn count_urls(&self, run_id: &str) -> Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM urls WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
    }
}

enum Target {
    /// Rows go to the built-in `runs`/`urls` tables.
    Schema { run_id: String },
    /// A user statement runs once per record with `?1` = location and,
    /// when it takes two parameters, `?2` = lastmod.
    Statement { sql: String, param_count: usize },
}

pub struct SqliteSink {
    db: Database,
    target: Target,
    written: usize,
}

impl SqliteSink {
    /// Store records in the built-in schema under a fresh run id.
    pub fn new(db: Database, input: &str) -> Result<Self> {
        let run_id = db.create_run(input)?;
        info!("Recording run {} in the database", run_id);
        Ok(Self {
            db,
            target: Target::Schema { run_id },
            written: 0,
        })
    }

    /// Execute `sql` once per record instead of using the built-in schema.
    /// The statement must take one or two positional parameters.
    pub fn with_statement(db: Database, sql: &str) -> std::result::Result<Self, SinkError> {
        let sql = sql.trim().trim_end_matches(';').trim().to_string();
        let param_count = db.connection().prepare(&sql)?.parameter_count();
        if !(1..=2).contains(&param_count) {
            return Err(SinkError::Statement(format!(
                "expected 1 or 2 parameters (?1 = loc, ?2 = lastmod), found {}",
                param_count
            )));
        }
        debug!("Prepared custom statement with {} parameter(s)", param_count);
        Ok(Self {
            db,
            target: Target::Statement { sql, param_count },
            written: 0,
        })
    }

    /// The run id, when writing to the built-in schema.
    pub fn run_id(&self) -> Option<&str> {
        match &self.target {
            Target::Schema { run_id } => Some(run_id),
            Target::Statement { .. } => None,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl UrlSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn write(&mut self, record: &UrlRecord) -> std::result::Result<(), SinkError> {
        match &self.target {
            Target::Schema { run_id } => {
                self.db.insert_url(run_id, self.written, record)?;
            }
            Target::Statement { sql, param_count } => {
                let mut stmt = self.db.connection().prepare_cached(sql)?;
                if *param_count == 2 {
                    stmt.execute(params![&record.location, &record.lastmod])?;
                } else {
                    stmt.execute(params![&record.location])?;
                }
            }
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> std::result::Result<(), SinkError> {
        if let Target::Schema { run_id } = &self.target {
            self.db.finish_run(run_id, status, self.written)?;
        }
        info!("SQLite sink stored {} URLs ({})", self.written, status.as_str());
        Ok(())
    }
}
