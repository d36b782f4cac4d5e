//! SQLite-backed catalog.
//!
//! One file holds samples, instruments, datasets, memberships, and data
//! directories. Each accession batch maps to one SQLite transaction, which
//! is what makes mid-batch crashes leave no partial samples behind.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use crate::error::StoreError;

use super::records::{DataDirectory, Dataset, Instrument, Sample, SampleSeed};
use super::repository::{Store, StoreTx};
use super::BinMetrics;

const SAMPLE_COLUMNS: &str = "pid, timestamp, sample_time, latitude, longitude, depth, \
     instrument, qc_bad, qc_no_rois, skip, size, temperature, humidity, run_time, look_time, \
     ml_analyzed, n_triggers, n_images, concentration, metadata";

/// Catalog store over a SQLite database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a catalog at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened catalog");
        Self::init(conn)
    }

    /// Open an in-memory catalog. Used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

             CREATE TABLE IF NOT EXISTS datasets (
                 id      INTEGER PRIMARY KEY AUTOINCREMENT,
                 name    TEXT NOT NULL UNIQUE,
                 title   TEXT NOT NULL DEFAULT ''
             );

             CREATE TABLE IF NOT EXISTS data_directories (
                 id         INTEGER PRIMARY KEY AUTOINCREMENT,
                 dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                 path       TEXT NOT NULL,
                 kind       TEXT NOT NULL DEFAULT 'raw',
                 priority   INTEGER NOT NULL DEFAULT 1,
                 whitelist  TEXT NOT NULL DEFAULT '',
                 blacklist  TEXT NOT NULL DEFAULT 'skip,bad'
             );

             CREATE TABLE IF NOT EXISTS instruments (
                 number  INTEGER PRIMARY KEY,
                 version INTEGER NOT NULL
             );

             CREATE TABLE IF NOT EXISTS samples (
                 pid           TEXT PRIMARY KEY,
                 timestamp     TEXT NOT NULL,
                 sample_time   TEXT NOT NULL,
                 latitude      REAL,
                 longitude     REAL,
                 depth         REAL,
                 instrument    INTEGER NOT NULL,
                 qc_bad        INTEGER NOT NULL DEFAULT 0,
                 qc_no_rois    INTEGER NOT NULL DEFAULT 0,
                 skip          INTEGER NOT NULL DEFAULT 1,
                 size          INTEGER NOT NULL DEFAULT 0,
                 temperature   REAL,
                 humidity      REAL,
                 run_time      REAL,
                 look_time     REAL,
                 ml_analyzed   REAL,
                 n_triggers    INTEGER NOT NULL DEFAULT 0,
                 n_images      INTEGER NOT NULL DEFAULT 0,
                 concentration REAL,
                 metadata      TEXT NOT NULL DEFAULT '{}'
             );

             CREATE TABLE IF NOT EXISTS dataset_members (
                 dataset_id INTEGER NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                 pid        TEXT NOT NULL REFERENCES samples(pid) ON DELETE CASCADE,
                 PRIMARY KEY (dataset_id, pid)
             );

             CREATE INDEX IF NOT EXISTS idx_samples_sample_time ON samples(sample_time);
             CREATE INDEX IF NOT EXISTS idx_members_pid ON dataset_members(pid);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dataset_id(conn: &Connection, name: &str) -> Result<i64, StoreError> {
        conn.query_row("SELECT id FROM datasets WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| StoreError::UnknownDataset(name.to_string()))
    }
}

impl Store for SqliteStore {
    fn in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTx) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let mut ops = SqliteTx { tx: &tx };
        f(&mut ops)?;
        tx.commit()?;
        Ok(())
    }

    fn get_sample(&self, pid: &str) -> Result<Option<Sample>, StoreError> {
        let conn = self.conn();
        let sql = format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE pid = ?1");
        Ok(conn
            .query_row(&sql, [pid], sample_from_row)
            .optional()?)
    }

    fn sample_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn();
        Ok(conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?)
    }

    fn dataset_members(&self, dataset: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn();
        let id = Self::dataset_id(&conn, dataset)?;
        let mut stmt =
            conn.prepare("SELECT pid FROM dataset_members WHERE dataset_id = ?1 ORDER BY pid")?;
        let rows = stmt.query_map([id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    fn latest_sample_time(&self, dataset: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let conn = self.conn();
        let id = Self::dataset_id(&conn, dataset)?;
        let newest: Option<String> = conn.query_row(
            "SELECT MAX(s.timestamp) FROM samples s \
             JOIN dataset_members m ON m.pid = s.pid \
             WHERE m.dataset_id = ?1 AND s.skip = 0",
            [id],
            |row| row.get(0),
        )?;
        newest.map(|s| parse_timestamp(&s)).transpose()
    }

    fn directories(&self, dataset: &str) -> Result<Vec<DataDirectory>, StoreError> {
        let conn = self.conn();
        let id = Self::dataset_id(&conn, dataset)?;
        let mut stmt = conn.prepare(
            "SELECT path, kind, priority, whitelist, blacklist FROM data_directories \
             WHERE dataset_id = ?1 ORDER BY priority ASC, id ASC",
        )?;
        let rows = stmt.query_map([id], |row| {
            Ok(DataDirectory {
                path: PathBuf::from(row.get::<_, String>(0)?),
                kind: row.get(1)?,
                priority: row.get(2)?,
                whitelist: split_names(&row.get::<_, String>(3)?),
                blacklist: split_names(&row.get::<_, String>(4)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn create_dataset(&self, name: &str, title: &str) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO datasets (name, title) VALUES (?1, ?2)",
            params![name, title],
        )?;
        Ok(())
    }

    fn add_directory(&self, dataset: &str, directory: &DataDirectory) -> Result<(), StoreError> {
        let conn = self.conn();
        let id = Self::dataset_id(&conn, dataset)?;
        conn.execute(
            "INSERT INTO data_directories (dataset_id, path, kind, priority, whitelist, blacklist) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                directory.path.to_string_lossy().into_owned(),
                directory.kind,
                directory.priority,
                directory.whitelist.join(","),
                directory.blacklist.join(","),
            ],
        )?;
        Ok(())
    }

    fn get_dataset(&self, name: &str) -> Result<Option<Dataset>, StoreError> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT id, name, title FROM datasets WHERE name = ?1",
                [name],
                |row| {
                    Ok(Dataset {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        title: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn get_instrument(&self, number: u32) -> Result<Option<Instrument>, StoreError> {
        let conn = self.conn();
        Ok(conn
            .query_row(
                "SELECT number, version FROM instruments WHERE number = ?1",
                [number],
                |row| {
                    Ok(Instrument {
                        number: row.get(0)?,
                        version: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }
}

// =============================================================================
// Transaction Operations
// =============================================================================

struct SqliteTx<'a> {
    tx: &'a Transaction<'a>,
}

impl StoreTx for SqliteTx<'_> {
    fn get_or_create_sample(&mut self, seed: &SampleSeed) -> Result<(Sample, bool), StoreError> {
        let sql = format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE pid = ?1");
        if let Some(existing) = self
            .tx
            .query_row(&sql, [&seed.pid], sample_from_row)
            .optional()?
        {
            return Ok((existing, false));
        }
        self.tx.execute(
            "INSERT INTO samples (pid, timestamp, sample_time, latitude, longitude, depth, \
             instrument, skip) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
            params![
                seed.pid,
                seed.timestamp.to_rfc3339(),
                seed.sample_time.to_rfc3339(),
                seed.latitude,
                seed.longitude,
                seed.depth,
                seed.instrument,
            ],
        )?;
        let created = self
            .tx
            .query_row(&sql, [&seed.pid], sample_from_row)?;
        Ok((created, true))
    }

    fn ensure_instrument(&mut self, number: u32, version: u32) -> Result<bool, StoreError> {
        let changed = self.tx.execute(
            "INSERT OR IGNORE INTO instruments (number, version) VALUES (?1, ?2)",
            params![number, version],
        )?;
        Ok(changed > 0)
    }

    fn commit_sample(
        &mut self,
        pid: &str,
        metrics: &BinMetrics,
        no_rois: bool,
    ) -> Result<(), StoreError> {
        let changed = self.tx.execute(
            "UPDATE samples SET skip = 0, qc_no_rois = ?2, size = ?3, temperature = ?4, \
             humidity = ?5, run_time = ?6, look_time = ?7, ml_analyzed = ?8, n_triggers = ?9, \
             n_images = ?10, concentration = ?11, metadata = ?12 WHERE pid = ?1",
            params![
                pid,
                no_rois,
                metrics.size,
                metrics.temperature,
                metrics.humidity,
                metrics.run_time,
                metrics.look_time,
                metrics.ml_analyzed,
                metrics.n_triggers,
                metrics.n_images,
                metrics.concentration,
                metrics.metadata,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownSample(pid.to_string()));
        }
        Ok(())
    }

    fn add_to_dataset(&mut self, dataset: &str, pid: &str) -> Result<(), StoreError> {
        let id: i64 = self
            .tx
            .query_row("SELECT id FROM datasets WHERE name = ?1", [dataset], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| StoreError::UnknownDataset(dataset.to_string()))?;
        self.tx.execute(
            "INSERT OR IGNORE INTO dataset_members (dataset_id, pid) VALUES (?1, ?2)",
            params![id, pid],
        )?;
        Ok(())
    }

    fn delete_sample(&mut self, pid: &str) -> Result<(), StoreError> {
        self.tx
            .execute("DELETE FROM samples WHERE pid = ?1", [pid])?;
        Ok(())
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

fn sample_from_row(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let timestamp: String = row.get(1)?;
    let sample_time: String = row.get(2)?;
    Ok(Sample {
        pid: row.get(0)?,
        timestamp: parse_timestamp(&timestamp)
            .map_err(|e| rusqlite::Error::InvalidColumnType(1, e.to_string(), rusqlite::types::Type::Text))?,
        sample_time: parse_timestamp(&sample_time)
            .map_err(|e| rusqlite::Error::InvalidColumnType(2, e.to_string(), rusqlite::types::Type::Text))?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        depth: row.get(5)?,
        instrument: row.get(6)?,
        qc_bad: row.get(7)?,
        qc_no_rois: row.get(8)?,
        skip: row.get(9)?,
        size: row.get(10)?,
        temperature: row.get(11)?,
        humidity: row.get(12)?,
        run_time: row.get(13)?,
        look_time: row.get(14)?,
        ml_analyzed: row.get(15)?,
        n_triggers: row.get(16)?,
        n_images: row.get(17)?,
        concentration: row.get(18)?,
        metadata: row.get(19)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("bad stored timestamp {s:?}: {e}")))
}

fn split_names(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
