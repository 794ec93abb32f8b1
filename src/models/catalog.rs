//! CCI catalog entries and the immutable lookup table built from them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::control_family;

/// One CCI catalog record with the NIST 800-53 controls it implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CciEntry {
    pub cci_id: String,
    pub nist_controls: BTreeSet<String>,
}

impl CciEntry {
    pub fn new(cci_id: impl Into<String>, nist_controls: impl IntoIterator<Item = String>) -> Self {
        Self {
            cci_id: cci_id.into(),
            nist_controls: nist_controls.into_iter().collect(),
        }
    }

    /// Control families derived from `nist_controls`, sorted and deduplicated.
    pub fn families(&self) -> Vec<String> {
        control_family::families_of(self.nist_controls.iter())
    }
}

/// Row shape of the `cci_entries` table.
#[derive(Debug, Clone, FromRow)]
pub struct CciEntryRow {
    pub cci_id: String,
    pub nist_controls: Vec<String>,
}

impl From<CciEntryRow> for CciEntry {
    fn from(row: CciEntryRow) -> Self {
        CciEntry::new(row.cci_id, row.nist_controls)
    }
}

/// Read-only CCI lookup table.
///
/// A catalog is never mutated after construction. Re-importing builds a new
/// `Catalog` that replaces the previous one wholesale.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<String, CciEntry>,
}

impl Catalog {
    /// Build a catalog from entries.
    ///
    /// Entries with no controls are dropped. Repeated CCI ids union their controls.
    pub fn from_entries(entries: impl IntoIterator<Item = CciEntry>) -> Self {
        let mut map: HashMap<String, CciEntry> = HashMap::new();
        for entry in entries {
            if entry.nist_controls.is_empty() {
                continue;
            }
            match map.get_mut(&entry.cci_id) {
                Some(existing) => existing.nist_controls.extend(entry.nist_controls),
                None => {
                    map.insert(entry.cci_id.clone(), entry);
                }
            }
        }
        Self { entries: map }
    }

    pub fn lookup(&self, cci_id: &str) -> Option<&CciEntry> {
        self.entries.get(cci_id.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries sorted by CCI id.
    pub fn entries(&self) -> Vec<&CciEntry> {
        let mut entries: Vec<&CciEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.cci_id.cmp(&b.cci_id));
        entries
    }

    /// Number of distinct NIST controls referenced across the catalog.
    pub fn distinct_control_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(|e| e.nist_controls.iter())
            .collect::<BTreeSet<_>>()
            .len()
    }
}
