//! STIG Viewer XML checklist (`.ckl`) parser.
//!
//! Each `VULN` carries its fields as `STIG_DATA` attribute/value pairs, so
//! every field is a linear scan by `VULN_ATTRIBUTE` name. Repeated attribute
//! names resolve last-match-wins, except `CCI_REF` where every occurrence is
//! kept in document order.

use serde::Deserialize;

use crate::models::finding::RawFinding;
use crate::parsers::{
    as_text, clean, non_empty, ChecklistFormat, ChecklistParser, ParseError, ParseResult,
    RecordWarning,
};

/// CKL parser instance.
#[derive(Debug, Default)]
pub struct CklParser;

impl CklParser {
    pub fn new() -> Self {
        Self
    }
}

impl ChecklistParser for CklParser {
    fn parse(&self, data: &[u8], source_file: &str) -> Result<ParseResult, ParseError> {
        let text = as_text(data)?;
        let document: CklDocument = quick_xml::de::from_str(text)?;
        let stigs = document.stigs.ok_or(ParseError::MissingElement("STIGS"))?;

        let host_name = document.asset.and_then(|a| clean(a.host_name.as_deref()));
        let mut findings = Vec::new();
        let mut warnings = Vec::new();
        let mut first_title: Option<String> = None;

        for istig in &stigs.istigs {
            let stig_name = istig_title(istig).unwrap_or_else(|| source_file.to_string());
            first_title.get_or_insert_with(|| stig_name.clone());

            for vuln in &istig.vulns {
                let index = findings.len();
                findings.push(convert_vuln(vuln, index, source_file, &stig_name, &mut warnings));
            }
        }

        Ok(ParseResult {
            stig_name: first_title.unwrap_or_else(|| source_file.to_string()),
            host_name,
            findings,
            warnings,
        })
    }

    fn format(&self) -> ChecklistFormat {
        ChecklistFormat::Ckl
    }
}

// -- CKL schema (subset) --

#[derive(Debug, Deserialize)]
struct CklDocument {
    #[serde(rename = "ASSET")]
    asset: Option<CklAsset>,
    #[serde(rename = "STIGS")]
    stigs: Option<CklStigs>,
}

#[derive(Debug, Deserialize)]
struct CklAsset {
    #[serde(rename = "HOST_NAME", default)]
    host_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CklStigs {
    #[serde(rename = "iSTIG", default)]
    istigs: Vec<CklIStig>,
}

#[derive(Debug, Deserialize)]
struct CklIStig {
    #[serde(rename = "STIG_INFO")]
    stig_info: Option<CklStigInfo>,
    #[serde(rename = "VULN", default)]
    vulns: Vec<CklVuln>,
}

#[derive(Debug, Deserialize)]
struct CklStigInfo {
    #[serde(rename = "SI_DATA", default)]
    si_data: Vec<CklSiData>,
}

#[derive(Debug, Deserialize)]
struct CklSiData {
    #[serde(rename = "SID_NAME", default)]
    name: String,
    #[serde(rename = "SID_DATA", default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CklVuln {
    #[serde(rename = "STIG_DATA", default)]
    stig_data: Vec<CklStigData>,
    #[serde(rename = "STATUS", default)]
    status: Option<String>,
    #[serde(rename = "FINDING_DETAILS", default)]
    finding_details: Option<String>,
    #[serde(rename = "COMMENTS", default)]
    comments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CklStigData {
    #[serde(rename = "VULN_ATTRIBUTE", default)]
    attribute: String,
    #[serde(rename = "ATTRIBUTE_DATA", default)]
    data: Option<String>,
}

/// STIG title from `STIG_INFO`, falling back to the STIG id.
fn istig_title(istig: &CklIStig) -> Option<String> {
    let info = istig.stig_info.as_ref()?;
    let lookup = |name: &str| {
        info.si_data
            .iter()
            .rev()
            .find(|d| d.name.trim() == name)
            .and_then(|d| clean(d.data.as_deref()))
    };
    lookup("title").or_else(|| lookup("stigid"))
}

/// Value of the last `STIG_DATA` entry named `name`.
fn attribute<'a>(stig_data: &'a [CklStigData], name: &str) -> Option<&'a str> {
    stig_data
        .iter()
        .rev()
        .find(|d| d.attribute.trim() == name)
        .and_then(|d| d.data.as_deref())
        .and_then(non_empty)
}

/// Convert one `VULN` into a raw finding, recording non-fatal gaps as warnings.
fn convert_vuln(
    vuln: &CklVuln,
    index: usize,
    source_file: &str,
    stig_name: &str,
    warnings: &mut Vec<RecordWarning>,
) -> RawFinding {
    let data = &vuln.stig_data;
    let text = |name: &str| attribute(data, name).map(String::from);

    let group_id = text("Vuln_Num").unwrap_or_default();
    let rule_id = text("Rule_ID").unwrap_or_default();
    if group_id.is_empty() && rule_id.is_empty() {
        warnings.push(RecordWarning::new(index, "Vuln_Num", "VULN has neither Vuln_Num nor Rule_ID"));
    }

    let severity = text("Severity").unwrap_or_default();
    if severity.is_empty() {
        warnings.push(RecordWarning::new(index, "Severity", "missing severity"));
    }

    let status = clean(vuln.status.as_deref()).unwrap_or_default();
    if status.is_empty() {
        warnings.push(RecordWarning::new(index, "STATUS", "missing status"));
    }

    let cci_references: Vec<String> = data
        .iter()
        .filter(|d| d.attribute.trim() == "CCI_REF")
        .filter_map(|d| clean(d.data.as_deref()))
        .collect();

    RawFinding {
        group_id,
        rule_id,
        rule_version: text("Rule_Ver"),
        title: text("Rule_Title").unwrap_or_default(),
        severity,
        status,
        discussion: text("Vuln_Discuss"),
        check_content: text("Check_Content"),
        fix_text: text("Fix_Text"),
        finding_details: clean(vuln.finding_details.as_deref()),
        comments: clean(vuln.comments.as_deref()),
        cci_references,
        source_file: source_file.to_string(),
        stig_name: stig_name.to_string(),
        system: None,
    }
}
