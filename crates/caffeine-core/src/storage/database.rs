//! SQLite-backed key-value storage and intake log.
//!
//! Provides persistent storage for:
//! - The collapsed decay state (initial mg + last dose time)
//! - The source history list (JSON under one key)
//! - The first-launch flag
//! - The append-only intake log
//!
//! Reads never fail: unreadable or malformed values are treated as absent
//! and logged. Writes run inside a transaction and propagate errors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::config::{Config, StorageConfig};
use super::data_dir;
use crate::decay::DecayState;
use crate::error::{DatabaseError, Result};
use crate::history::{CaffeineSource, HistoryStore};
use crate::intake::CaffeineIntake;

/// SQLite database holding the key-value table and intake log.
pub struct Database {
    conn: Connection,
    keys: StorageConfig,
}

impl Database {
    /// Open the database file named in `config` inside the data directory.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: &Config) -> Result<Self> {
        let path = data_dir()?.join(&config.storage.database_file);
        Self::open_at(&path, config.storage.clone())
    }

    pub fn open_at(path: &Path, keys: StorageConfig) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: PathBuf::from(path),
            source,
        })?;
        let db = Self { conn, keys };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            keys: StorageConfig::default(),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS intakes (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    source_name TEXT NOT NULL,
                    amount_mg   INTEGER NOT NULL,
                    taken_at_ms INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_intakes_taken_at ON intakes(taken_at_ms);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    // ── Raw key-value access ─────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Ok(kv_get(&self.conn, key)?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        kv_set(&self.conn, key, value)?;
        Ok(())
    }

    /// Read-modify-write under one transaction.
    ///
    /// The closure sees the connection inside the transaction; returning an
    /// error rolls everything back.
    pub fn edit<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    // ── Decay state ──────────────────────────────────────────────────

    /// Persisted decay state, cleared if missing or unreadable.
    pub fn load_decay_state(&self) -> DecayState {
        let initial_mg = self.read_or_default(&self.keys.initial_mg_key, 0.0_f64);
        let last_dose_ms = self.read_or_default(&self.keys.last_dose_key, 0_i64);
        DecayState::from_parts(initial_mg, last_dose_ms)
    }

    /// Persist the decay state. A cleared state removes both keys.
    pub fn save_decay_state(&self, state: &DecayState) -> Result<()> {
        self.edit(|conn| self.write_decay_state(conn, state))
    }

    fn write_decay_state(&self, conn: &Connection, state: &DecayState) -> Result<()> {
        if state.is_cleared() {
            kv_delete(conn, &self.keys.initial_mg_key)?;
            kv_delete(conn, &self.keys.last_dose_key)?;
        } else {
            let (initial_mg, last_dose_ms) = state.to_parts();
            kv_set(conn, &self.keys.initial_mg_key, &initial_mg.to_string())?;
            kv_set(conn, &self.keys.last_dose_key, &last_dose_ms.to_string())?;
        }
        Ok(())
    }

    /// Save the new decay state and log the intake atomically.
    pub fn record_dose(&self, state: &DecayState, intake: &CaffeineIntake) -> Result<()> {
        self.edit(|conn| {
            self.write_decay_state(conn, state)?;
            insert_intake(conn, intake)?;
            Ok(())
        })
    }

    // ── History list ─────────────────────────────────────────────────

    /// Persisted source list, empty if missing or unreadable.
    pub fn load_history(&self) -> Vec<CaffeineSource> {
        match kv_get(&self.conn, &self.keys.history_key) {
            Ok(Some(json)) => decode_history(&self.keys.history_key, &json),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.keys.history_key, error = %e, "history unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    /// Replace the whole source list.
    pub fn set_history(&self, sources: &[CaffeineSource]) -> Result<()> {
        let json = serde_json::to_string(sources)?;
        self.kv_set(&self.keys.history_key, &json)
    }

    /// Apply `f` to the persisted history inside one transaction.
    ///
    /// The list is written back only if `f` changed it. Returns what `f`
    /// returned along with the resulting list.
    pub fn edit_history<T>(
        &self,
        f: impl FnOnce(&mut HistoryStore) -> T,
    ) -> Result<(T, Vec<CaffeineSource>)> {
        self.edit(|conn| {
            let key = &self.keys.history_key;
            let current = match kv_get(conn, key)? {
                Some(json) => decode_history(key, &json),
                None => Vec::new(),
            };
            let original = HistoryStore::from_sources(current);
            let mut store = original.clone();
            let value = f(&mut store);
            if store != original {
                kv_set(conn, key, &serde_json::to_string(store.sources())?)?;
            }
            Ok((value, store.into_sources()))
        })
    }

    // ── First launch ─────────────────────────────────────────────────

    pub fn has_been_launched_before(&self) -> bool {
        self.read_or_default(&self.keys.launched_key, false)
    }

    pub fn set_launched_before(&self) -> Result<()> {
        self.kv_set(&self.keys.launched_key, "true")
    }

    // ── Intake log ───────────────────────────────────────────────────

    /// Intakes taken at or after `since`, oldest first. Empty on read errors.
    pub fn intakes_since(&self, since: Option<DateTime<Utc>>) -> Vec<CaffeineIntake> {
        let since_ms = since.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN);
        match self.query_intakes(since_ms) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "intake log unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    fn query_intakes(&self, since_ms: i64) -> rusqlite::Result<Vec<CaffeineIntake>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_name, amount_mg, taken_at_ms
             FROM intakes
             WHERE taken_at_ms >= ?1
             ORDER BY taken_at_ms ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![since_ms], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut intakes = Vec::new();
        for row in rows {
            let (source_name, amount_mg, taken_at_ms) = row?;
            match Utc.timestamp_millis_opt(taken_at_ms).single() {
                Some(timestamp) => intakes.push(CaffeineIntake {
                    source_name,
                    amount_mg,
                    timestamp,
                }),
                None => tracing::warn!(taken_at_ms, "skipping intake with invalid timestamp"),
            }
        }
        Ok(intakes)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn read_or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match kv_get(&self.conn, key) {
            Ok(Some(raw)) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "unparsable stored value, using default");
                default
            }),
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed, using default");
                default
            }
        }
    }
}

fn kv_get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
    })
    .optional()
}

fn kv_set(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn kv_delete(conn: &Connection, key: &str) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
}

fn insert_intake(conn: &Connection, intake: &CaffeineIntake) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO intakes (source_name, amount_mg, taken_at_ms) VALUES (?1, ?2, ?3)",
        params![
            intake.source_name,
            intake.amount_mg,
            intake.timestamp.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn decode_history(key: &str, json: &str) -> Vec<CaffeineSource> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "malformed history list, treating as empty");
        Vec::new()
    })
}
