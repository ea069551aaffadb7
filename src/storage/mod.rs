//! SQLite storage for scanned parts.
//!
//! The `parts` table is append-only: rows are inserted, never updated or
//! deleted. A `PartsStore` holds the only connection and is not shared
//! between threads.

mod row;

pub use row::{StoredRow, FEATURE_NAMES};

use log::{info, warn};
use rusqlite::{params, Connection, Transaction};
use std::path::Path;

use crate::error::ScanResult;
use crate::extract::ScanRecord;

const CREATE_PARTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS parts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    name TEXT,
    category TEXT,
    powerscore INTEGER,
    vehicle_durability INTEGER,
    durability INTEGER,
    mass INTEGER,
    feature_bullet INTEGER,
    feature_explosion INTEGER,
    feature_fire INTEGER,
    feature_cold INTEGER,
    feature_contact INTEGER,
    feature_electric INTEGER,
    feature_passthru INTEGER,
    feature_ram INTEGER
)";

const INSERT_PART: &str = "
INSERT INTO parts (
    timestamp, name, category, powerscore, vehicle_durability, durability, mass,
    feature_bullet, feature_explosion, feature_fire, feature_cold,
    feature_contact, feature_electric, feature_passthru, feature_ram
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

pub struct PartsStore {
    conn: Connection,
}

impl PartsStore {
    /// Opens (or creates) the database and makes sure the table exists.
    pub fn open(path: &Path) -> ScanResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {err}");
        }
        conn.execute_batch(CREATE_PARTS_TABLE)?;

        info!("Database ready at {}", path.display());
        Ok(Self { conn })
    }

    /// Writes one record in its own transaction and returns the new row id.
    ///
    /// On failure the transaction is rolled back and the error returned; the
    /// store stays usable for the next record.
    pub fn save(&mut self, record: &ScanRecord) -> ScanResult<i64> {
        let row = StoredRow::try_from(record)?;
        for name in record.features.keys() {
            if !FEATURE_NAMES.contains(&name.as_str()) {
                warn!("Dropping feature '{}': no column for it", name);
            }
        }

        let tx = self.conn.transaction()?;
        match insert_row(&tx, &row) {
            Ok(id) => {
                tx.commit()?;
                Ok(id)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

fn insert_row(tx: &Transaction<'_>, row: &StoredRow) -> ScanResult<i64> {
    let f = &row.features;
    tx.execute(
        INSERT_PART,
        params![
            row.timestamp,
            row.name,
            row.category,
            row.powerscore,
            row.vehicle_durability,
            row.durability,
            row.mass,
            f[0],
            f[1],
            f[2],
            f[3],
            f[4],
            f[5],
            f[6],
            f[7],
        ],
    )?;
    Ok(tx.last_insert_rowid())
}
