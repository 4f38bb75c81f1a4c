//! Core data types for opacity records and the indexed opacity table.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Index column holding the nuclear charge Z.
pub const NUCLEAR_CHARGE_COLUMN: &str = "nuclear_charge";

/// Index column holding the mass density in g/cm³.
pub const MASS_DENSITY_COLUMN: &str = "mass_density_rho(g/cm3)";

/// Index column holding the electron temperature in eV.
pub const TEMPERATURE_COLUMN: &str = "electron_temperature(eV)";

/// The three index columns, in index order.
pub const INDEX_COLUMNS: [&str; 3] = [
    NUCLEAR_CHARGE_COLUMN,
    MASS_DENSITY_COLUMN,
    TEMPERATURE_COLUMN,
];

/// Composite key `(nuclear_charge, mass_density, temperature)`.
///
/// Floats compare by IEEE total order, so equality is bit equality and the
/// key can be sorted, hashed and binary-searched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompositeKey {
    pub nuclear_charge: u32,
    pub mass_density: f64,
    pub temperature: f64,
}

impl CompositeKey {
    pub fn new(nuclear_charge: u32, mass_density: f64, temperature: f64) -> Self {
        Self {
            nuclear_charge,
            mass_density,
            temperature,
        }
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CompositeKey {}

impl PartialOrd for CompositeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompositeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nuclear_charge
            .cmp(&other.nuclear_charge)
            .then_with(|| self.mass_density.total_cmp(&other.mass_density))
            .then_with(|| self.temperature.total_cmp(&other.temperature))
    }
}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nuclear_charge.hash(state);
        self.mass_density.to_bits().hash(state);
        self.temperature.to_bits().hash(state);
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(Z={}, rho={:e} g/cm3, T={} eV)",
            self.nuclear_charge, self.mass_density, self.temperature
        )
    }
}

/// One row of opacity data.
///
/// `values` is aligned with the owning table's columns; positions past the
/// end of `values` read as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpacityRecord {
    pub key: CompositeKey,
    pub values: Vec<Option<f64>>,
}

impl OpacityRecord {
    /// Value at a column position, `None` when missing.
    pub fn value(&self, column: usize) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }
}

/// Accumulated opacity records indexed by [`CompositeKey`].
///
/// Keys are not unique: one grid point usually yields several rows. The
/// table is append-only; [`OpacityTable::merge`] concatenates and
/// [`OpacityTable::sort_index`] restores key order for membership tests.
#[derive(Debug, Clone, PartialEq)]
pub struct OpacityTable {
    columns: Vec<String>,
    records: Vec<OpacityRecord>,
    sorted: bool,
}

impl OpacityTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            records: Vec::new(),
            sorted: true,
        }
    }

    /// Build a table from one grid point's rows.
    ///
    /// Every row must have one value per column.
    pub fn from_rows(key: CompositeKey, columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        let records = rows
            .into_iter()
            .map(|row| OpacityRecord {
                key,
                values: row.into_iter().map(Some).collect(),
            })
            .collect();
        Self {
            columns,
            records,
            sorted: true,
        }
    }

    /// Reassemble a table from stored parts.
    pub fn from_parts(columns: Vec<String>, records: Vec<OpacityRecord>, sorted: bool) -> Self {
        Self {
            columns,
            records,
            sorted,
        }
    }

    /// Value column names, in first-seen order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a value column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn records(&self) -> &[OpacityRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether records are currently in key order.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Stable sort of the records by key.
    pub fn sort_index(&mut self) {
        if !self.sorted {
            self.records.sort_by(|a, b| a.key.cmp(&b.key));
            self.sorted = true;
        }
    }

    /// Whether any record carries `key`.
    ///
    /// Binary search when the index is sorted, linear scan otherwise.
    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        if self.sorted {
            self.records
                .binary_search_by(|r| r.key.cmp(key))
                .is_ok()
        } else {
            self.records.iter().any(|r| r.key == *key)
        }
    }

    /// All records carrying `key`.
    pub fn rows_for(&self, key: &CompositeKey) -> Vec<&OpacityRecord> {
        self.records.iter().filter(|r| r.key == *key).collect()
    }

    /// Distinct keys, in key order.
    pub fn keys(&self) -> Vec<CompositeKey> {
        let mut keys: Vec<CompositeKey> = self.records.iter().map(|r| r.key).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Distinct keys with their row counts, in key order.
    pub fn key_counts(&self) -> Vec<(CompositeKey, usize)> {
        let mut keys: Vec<CompositeKey> = self.records.iter().map(|r| r.key).collect();
        keys.sort();
        let mut counts: Vec<(CompositeKey, usize)> = Vec::new();
        for key in keys {
            if let Some((last, n)) = counts.last_mut() {
                if *last == key {
                    *n += 1;
                    continue;
                }
            }
            counts.push((key, 1));
        }
        counts
    }

    /// Append another table's records.
    ///
    /// Columns are matched by name; columns unknown to this table are
    /// appended to the column list. No deduplication is performed.
    pub fn merge(&mut self, other: OpacityTable) {
        let mut lookup: HashMap<String, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|name| {
                *lookup.entry(name.clone()).or_insert_with(|| {
                    self.columns.push(name.clone());
                    self.columns.len() - 1
                })
            })
            .collect();

        let width = self.columns.len();
        for record in &mut self.records {
            if record.values.len() < width {
                record.values.resize(width, None);
            }
        }
        for record in other.records {
            if let Some(last) = self.records.last() {
                if last.key > record.key {
                    self.sorted = false;
                }
            }
            let mut values = vec![None; width];
            for (src, value) in record.values.into_iter().enumerate() {
                if let Some(&dst) = mapping.get(src) {
                    values[dst] = value;
                }
            }
            self.records.push(OpacityRecord {
                key: record.key,
                values,
            });
        }
    }
}

impl Default for OpacityTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur in the opacity library.
#[derive(thiserror::Error, Debug)]
pub enum OpacityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type OpacityResult<T> = Result<T, OpacityError>;
