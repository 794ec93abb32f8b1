//! STIG Viewer 3 JSON checklist (`.cklb`) parser.
//!
//! Rules are decoded one at a time: a rule with mistyped fields is salvaged
//! field by field and reported as a warning instead of failing the file.

use serde::Deserialize;
use serde_json::Value;

use crate::models::finding::RawFinding;
use crate::parsers::{
    as_text, clean, ChecklistFormat, ChecklistParser, ParseError, ParseResult, RecordWarning,
};

/// CKLB parser instance.
#[derive(Debug, Default)]
pub struct CklbParser;

impl CklbParser {
    pub fn new() -> Self {
        Self
    }
}

impl ChecklistParser for CklbParser {
    fn parse(&self, data: &[u8], source_file: &str) -> Result<ParseResult, ParseError> {
        let text = as_text(data)?;
        let document: CklbDocument = serde_json::from_str(text)?;
        let stigs = document.stigs.ok_or(ParseError::MissingElement("stigs"))?;

        let fallback_title = clean(document.title.as_deref()).unwrap_or_else(|| source_file.to_string());
        let host_name = document.target_data.and_then(|t| clean(t.host_name.as_deref()));

        let mut findings = Vec::new();
        let mut warnings = Vec::new();
        let mut first_title: Option<String> = None;

        for stig in stigs {
            let stig_name = clean(stig.display_name.as_deref())
                .or_else(|| clean(stig.stig_name.as_deref()))
                .unwrap_or_else(|| fallback_title.clone());
            first_title.get_or_insert_with(|| stig_name.clone());

            for value in stig.rules {
                let index = findings.len();
                let rule = decode_rule(value, index, &mut warnings);
                findings.push(convert_rule(rule, index, source_file, &stig_name, &mut warnings));
            }
        }

        Ok(ParseResult {
            stig_name: first_title.unwrap_or(fallback_title),
            host_name,
            findings,
            warnings,
        })
    }

    fn format(&self) -> ChecklistFormat {
        ChecklistFormat::Cklb
    }
}

// -- CKLB schema (subset) --

#[derive(Debug, Deserialize)]
struct CklbDocument {
    title: Option<String>,
    target_data: Option<CklbTarget>,
    stigs: Option<Vec<CklbStig>>,
}

#[derive(Debug, Deserialize)]
struct CklbTarget {
    host_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CklbStig {
    display_name: Option<String>,
    stig_name: Option<String>,
    #[serde(default)]
    rules: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CklbRule {
    group_id: Option<String>,
    rule_id: Option<String>,
    rule_version: Option<String>,
    rule_title: Option<String>,
    severity: Option<String>,
    status: Option<String>,
    discussion: Option<String>,
    check_content: Option<String>,
    fix_text: Option<String>,
    finding_details: Option<String>,
    comments: Option<String>,
    ccis: Option<OneOrMany>,
    cci_refs: Option<OneOrMany>,
    cci_ref: Option<OneOrMany>,
}

/// A CCI field that may hold a single string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn values(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

/// Decode one rule; on a type mismatch keep every field that is readable.
fn decode_rule(value: Value, index: usize, warnings: &mut Vec<RecordWarning>) -> CklbRule {
    match CklbRule::deserialize(&value) {
        Ok(rule) => rule,
        Err(e) => {
            warnings.push(RecordWarning::new(index, "rule", format!("malformed rule: {e}")));
            salvage_rule(&value)
        }
    }
}

fn salvage_rule(value: &Value) -> CklbRule {
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);
    let ccis = |key: &str| match value.get(key)? {
        Value::String(s) => Some(OneOrMany::One(s.clone())),
        Value::Array(items) => Some(OneOrMany::Many(
            items.iter().filter_map(Value::as_str).map(String::from).collect(),
        )),
        _ => None,
    };

    CklbRule {
        group_id: text("group_id"),
        rule_id: text("rule_id"),
        rule_version: text("rule_version"),
        rule_title: text("rule_title"),
        severity: text("severity"),
        status: text("status"),
        discussion: text("discussion"),
        check_content: text("check_content"),
        fix_text: text("fix_text"),
        finding_details: text("finding_details"),
        comments: text("comments"),
        ccis: ccis("ccis"),
        cci_refs: ccis("cci_refs"),
        cci_ref: ccis("cci_ref"),
    }
}

/// Union of every CCI field on a rule, first-seen order, no duplicates.
fn collect_ccis(rule: &CklbRule) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let fields = [&rule.ccis, &rule.cci_refs, &rule.cci_ref];
    for value in fields.into_iter().flatten().flat_map(OneOrMany::values) {
        if let Some(cci) = clean(Some(value.as_str())) {
            if !out.contains(&cci) {
                out.push(cci);
            }
        }
    }
    out
}

fn convert_rule(
    rule: CklbRule,
    index: usize,
    source_file: &str,
    stig_name: &str,
    warnings: &mut Vec<RecordWarning>,
) -> RawFinding {
    let cci_references = collect_ccis(&rule);

    let group_id = clean(rule.group_id.as_deref()).unwrap_or_default();
    let rule_id = clean(rule.rule_id.as_deref()).unwrap_or_default();
    if group_id.is_empty() && rule_id.is_empty() {
        warnings.push(RecordWarning::new(index, "group_id", "rule has neither group_id nor rule_id"));
    }

    let severity = clean(rule.severity.as_deref()).unwrap_or_default();
    if severity.is_empty() {
        warnings.push(RecordWarning::new(index, "severity", "missing severity"));
    }

    let status = clean(rule.status.as_deref()).unwrap_or_default();
    if status.is_empty() {
        warnings.push(RecordWarning::new(index, "status", "missing status"));
    }

    RawFinding {
        group_id,
        rule_id,
        rule_version: clean(rule.rule_version.as_deref()),
        title: clean(rule.rule_title.as_deref()).unwrap_or_default(),
        severity,
        status,
        discussion: clean(rule.discussion.as_deref()),
        check_content: clean(rule.check_content.as_deref()),
        fix_text: clean(rule.fix_text.as_deref()),
        finding_details: clean(rule.finding_details.as_deref()),
        comments: clean(rule.comments.as_deref()),
        cci_references,
        source_file: source_file.to_string(),
        stig_name: stig_name.to_string(),
        system: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::finding::StatusClass;

    fn parse_sample() -> ParseResult {
        let data = include_bytes!("../../tests/fixtures/sample.cklb");
        CklbParser::new().parse(data, "db-01.cklb").unwrap()
    }

    #[test]
    fn parses_rules_across_stigs() {
        let result = parse_sample();
        assert_eq!(result.findings.len(), 4);
        assert_eq!(result.host_name.as_deref(), Some("db-01"));
        assert_eq!(result.stig_name, "PostgreSQL 9.x STIG");
    }

    #[test]
    fn each_rule_carries_its_own_stig_name() {
        let result = parse_sample();
        assert_eq!(result.findings[0].stig_name, "PostgreSQL 9.x STIG");
        // second STIG has no display_name
        assert_eq!(result.findings[3].stig_name, "Red_Hat_Enterprise_Linux_8_STIG");
    }

    #[test]
    fn maps_rule_fields() {
        let result = parse_sample();
        let first = &result.findings[0];
        assert_eq!(first.group_id, "V-214048");
        assert_eq!(first.rule_id, "SV-214048r508027_rule");
        assert_eq!(first.rule_version.as_deref(), Some("PGS9-00-000100"));
        assert_eq!(first.severity, "medium");
        assert_eq!(first.status, "not_a_finding");
        assert_eq!(first.status_class(), StatusClass::NotAFinding);
        assert_eq!(first.comments, None);
        assert_eq!(first.source_file, "db-01.cklb");
    }

    #[test]
    fn cci_fields_are_unioned_without_duplicates() {
        let result = parse_sample();
        assert_eq!(
            result.findings[1].cci_references,
            vec!["CCI-000130", "CCI-000015", "CCI-002418"]
        );
        // single string form
        assert_eq!(result.findings[2].cci_references, vec!["CCI-000366"]);
    }

    #[test]
    fn missing_fields_become_warnings() {
        let result = parse_sample();
        let broken = &result.findings[3];
        assert!(broken.status.is_empty());
        let fields: Vec<&str> = result
            .warnings
            .iter()
            .filter(|w| w.record_index == 3)
            .map(|w| w.field.as_str())
            .collect();
        assert_eq!(fields, vec!["severity", "status"]);
    }

    #[test]
    fn missing_stigs_is_an_error() {
        let err = CklbParser::new()
            .parse(br#"{"title": "empty"}"#, "x.cklb")
            .unwrap_err();
        assert!(matches!(err, ParseError::MissingElement("stigs")));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = CklbParser::new().parse(b"{\"stigs\": [", "x.cklb").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn mistyped_rule_is_salvaged_with_warning() {
        let json = br#"{"stigs": [{"display_name": "Mixed", "rules": [
            {"group_id": "V-1", "status": "open", "severity": "high", "ccis": ["CCI-000015"]},
            {"group_id": "V-2", "status": 5, "severity": "low", "ccis": ["CCI-000130"]},
            {"group_id": "V-3", "status": "open", "severity": "medium", "ccis": ["CCI-000366", null]}
        ]}]}"#;
        let result = CklbParser::new().parse(json, "mixed.cklb").unwrap();
        assert_eq!(result.findings.len(), 3);
        assert_eq!(result.findings[0].cci_references, vec!["CCI-000015"]);
        assert_eq!(result.findings[0].status, "open");

        let mistyped = &result.findings[1];
        assert_eq!(mistyped.group_id, "V-2");
        assert_eq!(mistyped.severity, "low");
        assert!(mistyped.status.is_empty());
        assert_eq!(mistyped.cci_references, vec!["CCI-000130"]);

        assert_eq!(result.findings[2].cci_references, vec!["CCI-000366"]);

        let fields: Vec<(usize, &str)> = result
            .warnings
            .iter()
            .map(|w| (w.record_index, w.field.as_str()))
            .collect();
        assert_eq!(fields, vec![(1, "rule"), (1, "status"), (2, "rule")]);
    }

    #[test]
    fn non_object_rule_still_yields_a_finding() {
        let json = br#"{"stigs": [{"rules": [42]}]}"#;
        let result = CklbParser::new().parse(json, "odd.cklb").unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.warnings[0].field, "rule");
    }

    #[test]
    fn untitled_document_falls_back_to_file_name() {
        let json = br#"{"stigs": [{"rules": [{"group_id": "V-1", "status": "open", "severity": "low"}]}]}"#;
        let result = CklbParser::new().parse(json, "bare.cklb").unwrap();
        assert_eq!(result.stig_name, "bare.cklb");
        assert!(result.warnings.is_empty());
    }
}
