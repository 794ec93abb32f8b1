//! CSV export of compliance statistics.

use crate::errors::AppError;
use crate::models::compliance::{ComplianceStat, FamilyComplianceStat, SystemComplianceStat};

const STAT_HEADERS: [&str; 8] = [
    "Total",
    "Open",
    "Compliant",
    "NotReviewed",
    "High",
    "Medium",
    "Low",
    "CompliancePercentage",
];

fn stat_fields(stat: &ComplianceStat) -> [String; 8] {
    [
        stat.total.to_string(),
        stat.open.to_string(),
        stat.compliant.to_string(),
        stat.not_reviewed.to_string(),
        stat.high.to_string(),
        stat.medium.to_string(),
        stat.low.to_string(),
        format!("{:.2}", stat.compliance_percentage),
    ]
}

/// Write labelled statistic rows as CSV with a leading `label_header` column.
fn write_rows<'a>(
    label_header: &str,
    rows: impl Iterator<Item = (&'a str, &'a ComplianceStat)>,
) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![label_header];
    header.extend(STAT_HEADERS);
    writer.write_record(&header).map_err(csv_error)?;

    for (label, stat) in rows {
        let fields = stat_fields(stat);
        let mut record = vec![label];
        record.extend(fields.iter().map(String::as_str));
        writer.write_record(&record).map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV flush failed: {e}")))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV encoding failed: {e}")))
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Internal(format!("CSV write failed: {e}"))
}

/// Per-family compliance table.
pub fn family_csv(families: &[FamilyComplianceStat]) -> Result<String, AppError> {
    write_rows("Family", families.iter().map(|f| (f.family.as_str(), &f.stat)))
}

/// Per-system compliance table.
pub fn system_csv(systems: &[SystemComplianceStat]) -> Result<String, AppError> {
    write_rows("System", systems.iter().map(|s| (s.system.as_str(), &s.stat)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(total: u64, compliant: u64, pct: f64) -> ComplianceStat {
        ComplianceStat {
            total,
            compliant,
            open: total - compliant,
            compliance_percentage: pct,
            ..ComplianceStat::default()
        }
    }

    #[test]
    fn family_table() {
        let families = vec![
            FamilyComplianceStat {
                family: "AC".to_string(),
                stat: stat(3, 1, 33.33),
            },
            FamilyComplianceStat {
                family: "SC".to_string(),
                stat: stat(2, 2, 100.0),
            },
        ];
        let csv = family_csv(&families).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Family,Total,Open,Compliant,NotReviewed,High,Medium,Low,CompliancePercentage"
        );
        assert_eq!(lines[1], "AC,3,2,1,0,0,0,0,33.33");
        assert_eq!(lines[2], "SC,2,0,2,0,0,0,0,100.00");
    }

    #[test]
    fn system_names_are_quoted_when_needed() {
        let systems = vec![SystemComplianceStat {
            system: "web, tier 1".to_string(),
            stat: stat(1, 0, 0.0),
        }];
        let csv = system_csv(&systems).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("\"web, tier 1\",1,1,0"));
    }

    #[test]
    fn empty_table_has_header_only() {
        let csv = family_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
