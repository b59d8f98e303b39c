use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::StoreError;
use crate::geo::Coordinate;
use crate::session::SessionRecord;

/// Append-only list of finished walk tests
pub trait ResultStore {
    /// All stored records in the order they were appended. Empty if none.
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError>;

    fn append_and_save(&mut self, record: &SessionRecord) -> Result<(), StoreError>;
}

impl<S: ResultStore + ?Sized> ResultStore for Box<S> {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        (**self).load_all()
    }

    fn append_and_save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        (**self).append_and_save(record)
    }
}

impl<S: ResultStore + ?Sized> ResultStore for &mut S {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        (**self).load_all()
    }

    fn append_and_save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        (**self).append_and_save(record)
    }
}

/// The whole result list as one JSON array in a single file
#[derive(Debug, Clone)]
pub struct JsonResultStore {
    path: PathBuf,
}

impl JsonResultStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultStore for JsonResultStore {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn append_and_save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self.load_all()?;
        records.push(record.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        replace_file(&self.path, &serde_json::to_vec(&records)?)?;

        debug!(path = %self.path.display(), count = records.len(), "saved result list");
        Ok(())
    }
}

/// Writes `bytes` next to `path` and renames it into place, so a crash never
/// leaves half a list. The temp file is removed if either step fails.
fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let result = fs::write(&tmp, bytes).and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// SQLite backend, one row per record
#[derive(Debug)]
pub struct SqliteResultStore {
    conn: Connection,
}

impl SqliteResultStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS walk_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                distance_meters INTEGER NOT NULL,
                duration_seconds INTEGER NOT NULL,
                coordinates TEXT NOT NULL
            )
            "#,
            [],
        )?;

        Ok(SqliteResultStore { conn })
    }

    /// Clear all results (for testing or reset purposes)
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM walk_results", [])?;
        Ok(())
    }
}

impl ResultStore for SqliteResultStore {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT started_at, distance_meters, duration_seconds, coordinates
            FROM walk_results
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (started_at, distance_meters, duration_seconds, coordinates) = row?;
            let started_at = DateTime::parse_from_rfc3339(&started_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        0,
                        "started_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Utc);
            let samples: Vec<Coordinate> = serde_json::from_str(&coordinates)?;

            records.push(SessionRecord {
                started_at,
                distance_meters,
                duration_seconds,
                samples,
            });
        }

        Ok(records)
    }

    fn append_and_save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO walk_results
            (started_at, distance_meters, duration_seconds, coordinates)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                record.started_at.to_rfc3339(),
                record.distance_meters,
                record.duration_seconds,
                serde_json::to_string(&record.samples)?,
            ],
        )?;

        Ok(())
    }
}

/// In-memory store that can be told to reject writes
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    records: Vec<SessionRecord>,
    fail_writes: bool,
    append_calls: usize,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SessionRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls
    }

    pub fn records(&self) -> &[SessionRecord] {
        &self.records
    }
}

impl ResultStore for MemoryResultStore {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.records.clone())
    }

    fn append_and_save(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        self.append_calls += 1;
        if self.fail_writes {
            return Err(StoreError::Rejected("storage is read-only".to_string()));
        }
        self.records.push(record.clone());
        Ok(())
    }
}
