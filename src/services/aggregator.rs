//! Compliance aggregation over resolved findings.
//!
//! Status buckets:
//! - `Open` -> open
//! - `NotAFinding` / `Not_A_Finding` -> compliant
//! - `Not_Reviewed` -> not_reviewed
//! - anything else counts toward `total` only, unless
//!   `include_not_applicable_as_compliant` moves `Not_Applicable` into compliant.
//!
//! Per-family aggregation counts a finding once for every family it maps to.

use std::collections::BTreeMap;

use crate::models::compliance::{
    AggregationOptions, ComplianceScope, ComplianceStat, FamilyComplianceStat,
    SystemComplianceStat,
};
use crate::models::finding::{ResolvedFinding, SeverityClass, StatusClass};

/// Whether a finding falls inside the scope.
pub fn in_scope(finding: &ResolvedFinding, scope: &ComplianceScope) -> bool {
    if let Some(family) = &scope.family {
        if !finding.has_family(family) {
            return false;
        }
    }
    if let Some(system) = &scope.system {
        if finding.finding.system.as_deref() != Some(system.as_str()) {
            return false;
        }
    }
    if let Some(file) = &scope.source_file {
        if &finding.finding.source_file != file {
            return false;
        }
    }
    true
}

/// Aggregate the findings that fall inside `scope`.
pub fn aggregate(
    findings: &[ResolvedFinding],
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> ComplianceStat {
    let mut acc = Accumulator::default();
    for finding in findings.iter().filter(|f| in_scope(f, scope)) {
        acc.add(finding, options);
    }
    acc.finish()
}

/// Aggregate per control family, sorted by family code.
///
/// Findings outside `scope` are ignored; findings without families appear in
/// no family aggregate.
pub fn aggregate_by_family(
    findings: &[ResolvedFinding],
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Vec<FamilyComplianceStat> {
    let mut by_family: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for finding in findings.iter().filter(|f| in_scope(f, scope)) {
        for family in &finding.families {
            by_family.entry(family.as_str()).or_default().add(finding, options);
        }
    }

    by_family
        .into_iter()
        .map(|(family, acc)| FamilyComplianceStat {
            family: family.to_string(),
            stat: acc.finish(),
        })
        .collect()
}

/// Aggregate per system, sorted by system name.
///
/// Findings not attributed to a system are grouped under an empty name.
pub fn aggregate_by_system(
    findings: &[ResolvedFinding],
    scope: &ComplianceScope,
    options: &AggregationOptions,
) -> Vec<SystemComplianceStat> {
    let mut by_system: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for finding in findings.iter().filter(|f| in_scope(f, scope)) {
        let system = finding.finding.system.as_deref().unwrap_or("");
        by_system.entry(system).or_default().add(finding, options);
    }

    by_system
        .into_iter()
        .map(|(system, acc)| SystemComplianceStat {
            system: system.to_string(),
            stat: acc.finish(),
        })
        .collect()
}

/// `compliant / total * 100` rounded half-up to two decimals, 0 for an empty set.
///
/// Rounds in integer hundredths-of-a-percent so ties are exact.
pub fn compliance_percentage(compliant: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let scaled = u128::from(compliant) * 10_000;
    let total = u128::from(total);
    let hundredths = (scaled * 2 + total) / (total * 2);
    hundredths as f64 / 100.0
}

#[derive(Debug, Default)]
struct Accumulator {
    total: u64,
    open: u64,
    compliant: u64,
    not_reviewed: u64,
    high: u64,
    medium: u64,
    low: u64,
}

impl Accumulator {
    fn add(&mut self, finding: &ResolvedFinding, options: &AggregationOptions) {
        self.total += 1;

        match finding.status_class() {
            StatusClass::Open => self.open += 1,
            StatusClass::NotAFinding => self.compliant += 1,
            StatusClass::NotReviewed => self.not_reviewed += 1,
            StatusClass::NotApplicable if options.include_not_applicable_as_compliant => {
                self.compliant += 1
            }
            StatusClass::NotApplicable | StatusClass::Other => {}
        }

        match finding.severity_class() {
            SeverityClass::High => self.high += 1,
            SeverityClass::Medium => self.medium += 1,
            SeverityClass::Low => self.low += 1,
            SeverityClass::Unknown => {}
        }
    }

    fn finish(self) -> ComplianceStat {
        ComplianceStat {
            total: self.total,
            open: self.open,
            compliant: self.compliant,
            not_reviewed: self.not_reviewed,
            high: self.high,
            medium: self.medium,
            low: self.low,
            compliance_percentage: compliance_percentage(self.compliant, self.total),
        }
    }
}
