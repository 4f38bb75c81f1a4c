//! Completion ledger: which grid points are done, which were abandoned.
//!
//! Kept in SQLite next to the snapshot so resumability does not depend on
//! the table format. A key is complete once its rows were merged and the
//! snapshot was written. Abandoned points are informational only and are
//! retried on the next run.

use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::types::{CompositeKey, OpacityResult};

/// A grid point given up on during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonedPoint {
    pub key: CompositeKey,
    pub attempts: u32,
    pub last_error: String,
    pub abandoned_at: String,
}

/// Persistent set of completed composite keys backed by SQLite.
pub struct CompletionLedger {
    db: Connection,
}

impl CompletionLedger {
    /// Open or create a ledger database.
    pub fn open(path: &Path) -> OpacityResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Connection::open(path)?;
        Self::init(db)
    }

    /// Ledger that lives only as long as the process.
    pub fn open_in_memory() -> OpacityResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> OpacityResult<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS completed (
                nuclear_charge INTEGER NOT NULL,
                mass_density REAL NOT NULL,
                temperature REAL NOT NULL,
                rows INTEGER NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (nuclear_charge, mass_density, temperature)
            );
            CREATE TABLE IF NOT EXISTS abandoned (
                nuclear_charge INTEGER NOT NULL,
                mass_density REAL NOT NULL,
                temperature REAL NOT NULL,
                attempts INTEGER NOT NULL,
                last_error TEXT NOT NULL,
                abandoned_at TEXT NOT NULL,
                PRIMARY KEY (nuclear_charge, mass_density, temperature)
            );",
        )?;
        Ok(Self { db })
    }

    /// Whether `key` has been completed.
    pub fn contains(&self, key: &CompositeKey) -> OpacityResult<bool> {
        let found = self
            .db
            .query_row(
                "SELECT 1 FROM completed
                 WHERE nuclear_charge = ?1 AND mass_density = ?2 AND temperature = ?3",
                params![key.nuclear_charge, key.mass_density, key.temperature],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record `key` as complete with `rows` rows, clearing any abandonment.
    pub fn mark_completed(&self, key: &CompositeKey, rows: usize) -> OpacityResult<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO completed
                 (nuclear_charge, mass_density, temperature, rows, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.nuclear_charge,
                key.mass_density,
                key.temperature,
                rows as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        self.clear_abandoned(key)
    }

    /// Record that `key` was given up on after `attempts` attempts.
    pub fn mark_abandoned(
        &self,
        key: &CompositeKey,
        attempts: u32,
        last_error: &str,
    ) -> OpacityResult<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO abandoned
                 (nuclear_charge, mass_density, temperature, attempts, last_error, abandoned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.nuclear_charge,
                key.mass_density,
                key.temperature,
                attempts,
                last_error,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn clear_abandoned(&self, key: &CompositeKey) -> OpacityResult<()> {
        self.db.execute(
            "DELETE FROM abandoned
             WHERE nuclear_charge = ?1 AND mass_density = ?2 AND temperature = ?3",
            params![key.nuclear_charge, key.mass_density, key.temperature],
        )?;
        Ok(())
    }

    /// Mark every key already present in the table as complete.
    ///
    /// Returns how many keys were newly added. Row counts for reconciled
    /// keys are taken from `keys` as given.
    pub fn reconcile<I>(&mut self, keys: I) -> OpacityResult<usize>
    where
        I: IntoIterator<Item = (CompositeKey, usize)>,
    {
        let tx = self.db.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut added = 0;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO completed
                     (nuclear_charge, mass_density, temperature, rows, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut clear = tx.prepare(
                "DELETE FROM abandoned
                 WHERE nuclear_charge = ?1 AND mass_density = ?2 AND temperature = ?3",
            )?;
            for (key, rows) in keys {
                added += insert.execute(params![
                    key.nuclear_charge,
                    key.mass_density,
                    key.temperature,
                    rows as i64,
                    now
                ])?;
                clear.execute(params![key.nuclear_charge, key.mass_density, key.temperature])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    /// Remove completed keys for which `present` returns false.
    ///
    /// Keeps the ledger from vouching for rows the table no longer holds,
    /// e.g. after the snapshot was deleted or replaced by an older copy.
    /// Returns how many keys were removed.
    pub fn forget_missing<F>(&mut self, present: F) -> OpacityResult<usize>
    where
        F: Fn(&CompositeKey) -> bool,
    {
        let tx = self.db.transaction()?;
        let stale = {
            let mut select =
                tx.prepare("SELECT nuclear_charge, mass_density, temperature FROM completed")?;
            let keys = select.query_map([], |row| {
                Ok(CompositeKey::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            let mut stale = Vec::new();
            for key in keys {
                let key = key?;
                if !present(&key) {
                    stale.push(key);
                }
            }
            stale
        };
        {
            let mut delete = tx.prepare(
                "DELETE FROM completed
                 WHERE nuclear_charge = ?1 AND mass_density = ?2 AND temperature = ?3",
            )?;
            for key in &stale {
                delete.execute(params![key.nuclear_charge, key.mass_density, key.temperature])?;
            }
        }
        tx.commit()?;
        Ok(stale.len())
    }

    /// Number of completed keys.
    pub fn completed_count(&self) -> OpacityResult<usize> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM completed", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Abandoned points, most recent first.
    pub fn abandoned(&self) -> OpacityResult<Vec<AbandonedPoint>> {
        let mut stmt = self.db.prepare(
            "SELECT nuclear_charge, mass_density, temperature, attempts, last_error, abandoned_at
             FROM abandoned
             ORDER BY abandoned_at DESC, nuclear_charge, mass_density, temperature",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AbandonedPoint {
                key: CompositeKey::new(row.get(0)?, row.get(1)?, row.get(2)?),
                attempts: row.get(3)?,
                last_error: row.get(4)?,
                abandoned_at: row.get(5)?,
            })
        })?;
        let mut points = Vec::new();
        for point in rows {
            points.push(point?);
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(z: u32) -> CompositeKey {
        CompositeKey::new(z, 1e-4, 0.01)
    }

    #[test]
    fn test_mark_and_contains() {
        let ledger = CompletionLedger::open_in_memory().unwrap();
        assert!(!ledger.contains(&key(57)).unwrap());

        ledger.mark_completed(&key(57), 12).unwrap();
        assert!(ledger.contains(&key(57)).unwrap());
        assert!(!ledger.contains(&CompositeKey::new(57, 1e-5, 0.01)).unwrap());
        assert_eq!(ledger.completed_count().unwrap(), 1);

        ledger.mark_completed(&key(57), 12).unwrap();
        assert_eq!(ledger.completed_count().unwrap(), 1);
    }

    #[test]
    fn test_exact_float_matching() {
        let ledger = CompletionLedger::open_in_memory().unwrap();
        let k = CompositeKey::new(92, 1e-20, 0.07);
        ledger.mark_completed(&k, 1).unwrap();
        assert!(ledger.contains(&CompositeKey::new(92, 1e-20, 0.07)).unwrap());
        assert!(!ledger.contains(&CompositeKey::new(92, 1e-20, 0.07000001)).unwrap());
    }

    #[test]
    fn test_abandoned_cleared_on_completion() {
        let ledger = CompletionLedger::open_in_memory().unwrap();
        ledger.mark_abandoned(&key(60), 3, "Transport error: refused").unwrap();

        let abandoned = ledger.abandoned().unwrap();
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].key, key(60));
        assert_eq!(abandoned[0].attempts, 3);
        assert!(abandoned[0].last_error.contains("refused"));
        assert!(!ledger.contains(&key(60)).unwrap());

        ledger.mark_completed(&key(60), 4).unwrap();
        assert!(ledger.abandoned().unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_counts_new_keys() {
        let mut ledger = CompletionLedger::open_in_memory().unwrap();
        ledger.mark_completed(&key(57), 1).unwrap();
        ledger.mark_abandoned(&key(58), 3, "boom").unwrap();

        let added = ledger
            .reconcile(vec![(key(57), 1), (key(58), 2), (key(59), 3)])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(ledger.completed_count().unwrap(), 3);
        assert!(ledger.abandoned().unwrap().is_empty());
    }

    #[test]
    fn test_forget_missing_drops_keys_absent_from_table() {
        let mut ledger = CompletionLedger::open_in_memory().unwrap();
        ledger.mark_completed(&key(57), 2).unwrap();
        ledger.mark_completed(&key(58), 2).unwrap();
        ledger.mark_abandoned(&key(59), 3, "HTTP status 503").unwrap();

        let removed = ledger.forget_missing(|k| *k == key(57)).unwrap();
        assert_eq!(removed, 1);
        assert!(ledger.contains(&key(57)).unwrap());
        assert!(!ledger.contains(&key(58)).unwrap());
        assert_eq!(ledger.completed_count().unwrap(), 1);
        assert_eq!(ledger.abandoned().unwrap().len(), 1);

        assert_eq!(ledger.forget_missing(|_| false).unwrap(), 1);
        assert_eq!(ledger.completed_count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.sqlite");
        {
            let ledger = CompletionLedger::open(&path).unwrap();
            ledger.mark_completed(&key(70), 5).unwrap();
            ledger.mark_abandoned(&key(71), 1, "HTTP status 404").unwrap();
        }
        let ledger = CompletionLedger::open(&path).unwrap();
        assert!(ledger.contains(&key(70)).unwrap());
        assert_eq!(ledger.abandoned().unwrap().len(), 1);
    }
}
