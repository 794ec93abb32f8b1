//! Checklist finding models: raw extraction output, resolved findings, and
//! the normalized status/severity classes used by aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// -- Classification --

/// Normalized checklist status.
///
/// Checklist tools disagree on spelling (`NotAFinding`, `Not_A_Finding`,
/// `not_a_finding`), so classification ignores case and separators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusClass {
    Open,
    NotAFinding,
    NotReviewed,
    NotApplicable,
    Other,
}

impl StatusClass {
    pub fn classify(status: &str) -> Self {
        match Self::key(status).as_str() {
            "open" => Self::Open,
            "notafinding" => Self::NotAFinding,
            "notreviewed" => Self::NotReviewed,
            "notapplicable" => Self::NotApplicable,
            _ => Self::Other,
        }
    }

    /// Comparison key: lowercase with `_`, space and `-` removed.
    pub fn key(status: &str) -> String {
        status
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | ' ' | '-'))
            .collect::<String>()
            .to_ascii_lowercase()
    }

    /// Canonical spelling stored and displayed for this class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::NotAFinding => "NotAFinding",
            Self::NotReviewed => "Not_Reviewed",
            Self::NotApplicable => "Not_Applicable",
            Self::Other => "Other",
        }
    }
}

/// Severity bucket. `critical` folds into `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeverityClass {
    High,
    Medium,
    Low,
    Unknown,
}

impl SeverityClass {
    pub fn classify(severity: &str) -> Self {
        match severity.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

// -- Extraction / resolution --

/// One checklist entry as extracted from a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFinding {
    pub group_id: String,
    pub rule_id: String,
    pub rule_version: Option<String>,
    pub title: String,
    /// Severity as written in the source file (not normalized).
    pub severity: String,
    /// Status as written in the source file (not normalized).
    pub status: String,
    pub discussion: Option<String>,
    pub check_content: Option<String>,
    pub fix_text: Option<String>,
    pub finding_details: Option<String>,
    pub comments: Option<String>,
    /// CCI ids in source order; may contain duplicates.
    pub cci_references: Vec<String>,
    pub source_file: String,
    pub stig_name: String,
    /// System the containing file was imported under, when known.
    pub system: Option<String>,
}

impl RawFinding {
    pub fn status_class(&self) -> StatusClass {
        StatusClass::classify(&self.status)
    }

    pub fn severity_class(&self) -> SeverityClass {
        SeverityClass::classify(&self.severity)
    }
}

/// A raw finding plus the NIST controls and families its CCIs resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFinding {
    #[serde(flatten)]
    pub finding: RawFinding,
    /// Sorted, deduplicated.
    pub nist_controls: Vec<String>,
    /// Sorted, deduplicated; always derived from `nist_controls`.
    pub families: Vec<String>,
}

impl ResolvedFinding {
    pub fn status_class(&self) -> StatusClass {
        self.finding.status_class()
    }

    pub fn severity_class(&self) -> SeverityClass {
        self.finding.severity_class()
    }

    pub fn has_family(&self, family: &str) -> bool {
        self.families.iter().any(|f| f == family)
    }
}

// -- Persistence --

/// Row in the `findings` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Finding {
    pub id: Uuid,
    pub checklist_file_id: Uuid,
    pub system_id: Uuid,
    pub group_id: String,
    pub rule_id: String,
    pub rule_version: Option<String>,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub discussion: Option<String>,
    pub check_content: Option<String>,
    pub fix_text: Option<String>,
    pub finding_details: Option<String>,
    pub comments: Option<String>,
    pub cci_references: Vec<String>,
    pub nist_controls: Vec<String>,
    pub families: Vec<String>,
    pub source_file: String,
    pub stig_name: String,
    pub created_at: DateTime<Utc>,
}

/// Lightweight finding row for list views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FindingSummary {
    pub id: Uuid,
    pub system_name: String,
    pub group_id: String,
    pub rule_id: String,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub nist_controls: Vec<String>,
    pub families: Vec<String>,
    pub source_file: String,
    pub stig_name: String,
}

/// Finding row joined with its system name, as fed to aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct AggregationRow {
    pub system_name: String,
    pub group_id: String,
    pub rule_id: String,
    pub rule_version: Option<String>,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub cci_references: Vec<String>,
    pub nist_controls: Vec<String>,
    pub families: Vec<String>,
    pub source_file: String,
    pub stig_name: String,
}

impl From<AggregationRow> for ResolvedFinding {
    fn from(row: AggregationRow) -> Self {
        ResolvedFinding {
            finding: RawFinding {
                group_id: row.group_id,
                rule_id: row.rule_id,
                rule_version: row.rule_version,
                title: row.title,
                severity: row.severity,
                status: row.status,
                cci_references: row.cci_references,
                source_file: row.source_file,
                stig_name: row.stig_name,
                system: Some(row.system_name),
                ..RawFinding::default()
            },
            nist_controls: row.nist_controls,
            families: row.families,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_spellings_are_equivalent() {
        assert_eq!(StatusClass::classify("NotAFinding"), StatusClass::NotAFinding);
        assert_eq!(StatusClass::classify("Not_A_Finding"), StatusClass::NotAFinding);
        assert_eq!(StatusClass::classify("not_a_finding"), StatusClass::NotAFinding);
        assert_eq!(StatusClass::classify("Not_Reviewed"), StatusClass::NotReviewed);
        assert_eq!(StatusClass::classify("NotReviewed"), StatusClass::NotReviewed);
        assert_eq!(StatusClass::classify("not_applicable"), StatusClass::NotApplicable);
        assert_eq!(StatusClass::classify("OPEN"), StatusClass::Open);
    }

    #[test]
    fn unknown_status_is_other() {
        assert_eq!(StatusClass::classify(""), StatusClass::Other);
        assert_eq!(StatusClass::classify("Pending"), StatusClass::Other);
    }

    #[test]
    fn severity_buckets() {
        assert_eq!(SeverityClass::classify("high"), SeverityClass::High);
        assert_eq!(SeverityClass::classify("CRITICAL"), SeverityClass::High);
        assert_eq!(SeverityClass::classify(" Medium "), SeverityClass::Medium);
        assert_eq!(SeverityClass::classify("low"), SeverityClass::Low);
        assert_eq!(SeverityClass::classify("cat i"), SeverityClass::Unknown);
    }

    #[test]
    fn resolved_finding_serializes_flat() {
        let resolved = ResolvedFinding {
            finding: RawFinding {
                group_id: "V-1".to_string(),
                status: "Open".to_string(),
                ..RawFinding::default()
            },
            nist_controls: vec!["AC-2".to_string()],
            families: vec!["AC".to_string()],
        };
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["group_id"], "V-1");
        assert_eq!(json["status"], "Open");
        assert_eq!(json["families"][0], "AC");
    }

    #[test]
    fn aggregation_row_carries_system() {
        let row = AggregationRow {
            system_name: "web-01".to_string(),
            group_id: "V-2".to_string(),
            rule_id: "SV-2r1_rule".to_string(),
            rule_version: None,
            title: "t".to_string(),
            severity: "high".to_string(),
            status: "Open".to_string(),
            cci_references: vec!["CCI-1".to_string()],
            nist_controls: vec!["AC-2".to_string()],
            families: vec!["AC".to_string()],
            source_file: "a.ckl".to_string(),
            stig_name: "Test STIG".to_string(),
        };
        let resolved: ResolvedFinding = row.into();
        assert_eq!(resolved.finding.system.as_deref(), Some("web-01"));
        assert!(resolved.has_family("AC"));
        assert_eq!(resolved.severity_class(), SeverityClass::High);
    }
}
