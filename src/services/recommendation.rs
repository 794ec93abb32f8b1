//! Remediation recommendations derived from compliance statistics.
//!
//! Output order: low-compliance families (worst first, ties by family code),
//! then one open high/critical advisory, then one not-reviewed advisory.

use crate::models::compliance::{
    FamilyComplianceStat, Recommendation, RecommendationPriority, RecommendationType,
};
use crate::models::finding::{ResolvedFinding, SeverityClass, StatusClass};

/// Families below this percentage get a LowCompliance recommendation.
pub const LOW_COMPLIANCE_THRESHOLD: f64 = 80.0;

/// LowCompliance families below this percentage are High priority.
pub const HIGH_PRIORITY_THRESHOLD: f64 = 50.0;

/// Build recommendations from per-family statistics and the findings behind them.
pub fn recommend(
    family_stats: &[FamilyComplianceStat],
    findings: &[ResolvedFinding],
) -> Vec<Recommendation> {
    let mut low: Vec<&FamilyComplianceStat> = family_stats
        .iter()
        .filter(|f| f.stat.total > 0 && f.stat.compliance_percentage < LOW_COMPLIANCE_THRESHOLD)
        .collect();
    low.sort_by(|a, b| {
        a.stat
            .compliance_percentage
            .total_cmp(&b.stat.compliance_percentage)
            .then_with(|| a.family.cmp(&b.family))
    });

    let mut recommendations: Vec<Recommendation> = low
        .into_iter()
        .map(|f| {
            let priority = if f.stat.compliance_percentage < HIGH_PRIORITY_THRESHOLD {
                RecommendationPriority::High
            } else {
                RecommendationPriority::Medium
            };
            let non_compliant = f.stat.total - f.stat.compliant;
            Recommendation {
                kind: RecommendationType::LowCompliance,
                priority,
                message: format!(
                    "{} control family is {:.2}% compliant ({} of {} findings); remediate the {} non-compliant findings in this family",
                    f.family, f.stat.compliance_percentage, f.stat.compliant, f.stat.total, non_compliant
                ),
                family: Some(f.family.clone()),
                count: non_compliant,
            }
        })
        .collect();

    let open_high = findings
        .iter()
        .filter(|f| f.severity_class() == SeverityClass::High && f.status_class() == StatusClass::Open)
        .count() as u64;
    if open_high > 0 {
        recommendations.push(Recommendation {
            kind: RecommendationType::HighSeverity,
            priority: RecommendationPriority::Critical,
            message: format!(
                "{open_high} high or critical severity findings are open; remediate these first"
            ),
            family: None,
            count: open_high,
        });
    }

    let not_reviewed = findings
        .iter()
        .filter(|f| f.status_class() == StatusClass::NotReviewed)
        .count() as u64;
    if not_reviewed > 0 {
        recommendations.push(Recommendation {
            kind: RecommendationType::NotReviewed,
            priority: RecommendationPriority::Medium,
            message: format!("{not_reviewed} findings have not been reviewed; complete the assessment"),
            family: None,
            count: not_reviewed,
        });
    }

    recommendations
}
