//! Checklist and catalog parsers.
//!
//! Each checklist format implements the `ChecklistParser` trait, producing
//! normalized `RawFinding` records. Format detection lives here as a thin
//! dispatch over file extension and content.

pub mod cci_list;
pub mod ckl;
pub mod cklb;

use serde::{Deserialize, Serialize};

use crate::models::finding::RawFinding;

/// Document-level parse failure. Aborts the whole import.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required element `{0}` is missing")]
    MissingElement(&'static str),

    #[error("unsupported checklist format: {0}")]
    UnsupportedFormat(String),

    #[error("document is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
}

/// Non-fatal problem with a single record.
#[derive(Debug, Clone, Serialize)]
pub struct RecordWarning {
    pub record_index: usize,
    pub field: String,
    pub message: String,
}

impl RecordWarning {
    pub fn new(record_index: usize, field: &str, message: impl Into<String>) -> Self {
        Self {
            record_index,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Result of parsing one checklist file.
#[derive(Debug)]
pub struct ParseResult {
    /// Title of the (first) STIG in the file.
    pub stig_name: String,
    /// Asset host name recorded in the checklist, if any.
    pub host_name: Option<String>,
    pub findings: Vec<RawFinding>,
    pub warnings: Vec<RecordWarning>,
}

impl ParseResult {
    /// Stamp the owning system onto every finding.
    pub fn assign_system(&mut self, system: &str) {
        for finding in &mut self.findings {
            finding.system = Some(system.to_string());
        }
    }
}

/// Checklist input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistFormat {
    /// STIG Viewer 2 XML checklist (`.ckl`).
    Ckl,
    /// STIG Viewer 3 JSON checklist (`.cklb`).
    Cklb,
}

impl std::fmt::Display for ChecklistFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ckl => write!(f, "ckl"),
            Self::Cklb => write!(f, "cklb"),
        }
    }
}

impl ChecklistFormat {
    /// Detect the format from the file extension, falling back to content sniffing.
    pub fn detect(file_name: &str, data: &[u8]) -> Result<Self, ParseError> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".ckl") || lower.ends_with(".xml") {
            return Ok(Self::Ckl);
        }
        if lower.ends_with(".cklb") || lower.ends_with(".json") {
            return Ok(Self::Cklb);
        }

        let first = strip_bom(data).iter().find(|b| !b.is_ascii_whitespace());
        match first {
            Some(b'<') => Ok(Self::Ckl),
            Some(b'{') => Ok(Self::Cklb),
            _ => Err(ParseError::UnsupportedFormat(file_name.to_string())),
        }
    }

    /// Parser implementation for this format.
    pub fn parser(&self) -> Box<dyn ChecklistParser> {
        match self {
            Self::Ckl => Box::new(ckl::CklParser::new()),
            Self::Cklb => Box::new(cklb::CklbParser::new()),
        }
    }
}

/// Trait for checklist format adapters.
pub trait ChecklistParser: Send + Sync {
    /// Parse a checklist document into raw findings.
    ///
    /// `source_file` is copied onto every finding as provenance.
    fn parse(&self, data: &[u8], source_file: &str) -> Result<ParseResult, ParseError>;

    /// The format this parser handles.
    fn format(&self) -> ChecklistFormat;
}

/// Drop a leading UTF-8 byte order mark.
pub(crate) fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data)
}

/// Decode a document as UTF-8 text, ignoring a leading BOM.
pub(crate) fn as_text(data: &[u8]) -> Result<&str, ParseError> {
    Ok(std::str::from_utf8(strip_bom(data))?)
}

/// Return Some(trimmed) if non-empty, None otherwise.
pub(crate) fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Trimmed owned copy of an optional field, dropping blanks.
pub(crate) fn clean(value: Option<&str>) -> Option<String> {
    value.and_then(non_empty).map(String::from)
}
