//! CCI -> NIST control resolution for checklist findings.
//!
//! Resolution is a pure function of the finding and the catalog snapshot:
//! CCIs missing from the catalog contribute nothing and are not an error.

use std::collections::BTreeSet;

use crate::models::catalog::Catalog;
use crate::models::finding::{RawFinding, ResolvedFinding};
use crate::services::control_family;

/// Resolve a finding's CCI references into sorted NIST controls and families.
pub fn resolve(raw: &RawFinding, catalog: &Catalog) -> ResolvedFinding {
    let mut controls: BTreeSet<String> = BTreeSet::new();
    for cci in &raw.cci_references {
        if let Some(entry) = catalog.lookup(cci) {
            controls.extend(entry.nist_controls.iter().cloned());
        }
    }

    let nist_controls: Vec<String> = controls.into_iter().collect();
    let families = control_family::families_of(&nist_controls);

    ResolvedFinding {
        finding: raw.clone(),
        nist_controls,
        families,
    }
}

/// CCI ids referenced by the finding that have no catalog entry, deduplicated.
pub fn unmapped_ccis<'a>(raw: &'a RawFinding, catalog: &Catalog) -> Vec<&'a str> {
    let mut seen = BTreeSet::new();
    raw.cci_references
        .iter()
        .map(|c| c.trim())
        .filter(|c| catalog.lookup(c).is_none() && seen.insert(*c))
        .collect()
}

/// Output of resolving a batch of findings.
#[derive(Debug, Default)]
pub struct BatchResolution {
    pub findings: Vec<ResolvedFinding>,
    /// Distinct CCI ids that had no catalog entry, sorted.
    pub unmapped_ccis: Vec<String>,
}

/// Resolve a batch and collect the distinct CCIs the catalog could not map.
pub fn resolve_batch(raws: &[RawFinding], catalog: &Catalog) -> BatchResolution {
    let mut unmapped: BTreeSet<String> = BTreeSet::new();
    let findings = raws
        .iter()
        .map(|raw| {
            unmapped.extend(unmapped_ccis(raw, catalog).into_iter().map(String::from));
            resolve(raw, catalog)
        })
        .collect();

    BatchResolution {
        findings,
        unmapped_ccis: unmapped.into_iter().collect(),
    }
}
