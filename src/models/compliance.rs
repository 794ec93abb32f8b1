//! Compliance statistics, aggregation scope, and remediation recommendations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Optional restrictions applied before aggregating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceScope {
    /// Control family code, e.g. `AC`.
    pub family: Option<String>,
    /// System name the findings were imported under.
    pub system: Option<String>,
    /// Checklist file name.
    pub source_file: Option<String>,
}

impl ComplianceScope {
    pub fn for_family(family: impl Into<String>) -> Self {
        Self {
            family: Some(family.into()),
            ..Self::default()
        }
    }

    pub fn for_system(system: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            ..Self::default()
        }
    }

    /// Trim every field and treat blank ones as unset (`?family=` means no filter).
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            family: keep(self.family),
            system: keep(self.system),
            source_file: keep(self.source_file),
        }
    }
}

/// Knobs that change how statuses count toward compliance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationOptions {
    /// Count `Not_Applicable` in the compliant numerator. Off by default.
    pub include_not_applicable_as_compliant: bool,
}

/// Count-based compliance statistics over a set of findings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceStat {
    pub total: u64,
    pub open: u64,
    pub compliant: u64,
    pub not_reviewed: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    /// Percent compliant, rounded half-up to two decimals; 0 when `total == 0`.
    pub compliance_percentage: f64,
}

/// Compliance statistics for a single control family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyComplianceStat {
    pub family: String,
    #[serde(flatten)]
    pub stat: ComplianceStat,
}

/// Compliance statistics for a single system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemComplianceStat {
    pub system: String,
    #[serde(flatten)]
    pub stat: ComplianceStat,
}

/// Kind of remediation advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationType {
    LowCompliance,
    HighSeverity,
    NotReviewed,
}

/// Recommendation urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationPriority {
    Critical,
    High,
    Medium,
}

/// Advisory derived from aggregated statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub priority: RecommendationPriority,
    pub message: String,
    /// Family the advice is about (LowCompliance only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Number of findings behind the advice.
    pub count: u64,
}

/// Cached snapshot row in `compliance_snapshots`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ComplianceSnapshot {
    pub id: Uuid,
    pub system_id: Option<Uuid>,
    pub family: Option<String>,
    pub total: i64,
    pub open: i64,
    pub compliant: i64,
    pub not_reviewed: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
    pub compliance_percentage: f64,
    pub computed_at: DateTime<Utc>,
}
