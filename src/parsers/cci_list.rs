//! DISA CCI list (`U_CCI_List.xml`) parser.
//!
//! Builds a `Catalog` from `cci_item` records. A reference contributes a NIST
//! control only when its `title` contains the configured standard name and it
//! carries a non-empty `index`. Items that end up with no controls are dropped.

use serde::Deserialize;

use crate::models::catalog::{Catalog, CciEntry};
use crate::parsers::{as_text, non_empty, ParseError};

/// Default reference title selecting NIST 800-53 mappings.
pub const DEFAULT_REFERENCE_TITLE: &str = "NIST SP 800-53 Revision 4";

/// Catalog selection options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Substring a reference title must contain to be accepted.
    pub reference_title: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            reference_title: DEFAULT_REFERENCE_TITLE.to_string(),
        }
    }
}

/// Result of parsing a CCI list.
#[derive(Debug)]
pub struct CatalogParseResult {
    pub catalog: Catalog,
    /// `cci_item` elements seen in the document.
    pub item_count: usize,
    /// Items without an `id` attribute.
    pub skipped_items: usize,
    /// Items with an id but no accepted NIST reference.
    pub unmapped_items: usize,
}

// -- CCI list schema (subset) --

#[derive(Debug, Deserialize)]
struct CciListDocument {
    cci_items: Option<CciItems>,
}

#[derive(Debug, Deserialize)]
struct CciItems {
    #[serde(rename = "cci_item", default)]
    items: Vec<CciItem>,
}

#[derive(Debug, Deserialize)]
struct CciItem {
    #[serde(rename = "@id", default)]
    id: Option<String>,
    references: Option<CciReferences>,
}

#[derive(Debug, Deserialize)]
struct CciReferences {
    #[serde(rename = "reference", default)]
    items: Vec<CciReference>,
}

#[derive(Debug, Deserialize)]
struct CciReference {
    #[serde(rename = "@title", default)]
    title: Option<String>,
    #[serde(rename = "@index", default)]
    index: Option<String>,
}

/// Parse a CCI list document into a catalog.
pub fn parse(data: &[u8], options: &CatalogOptions) -> Result<CatalogParseResult, ParseError> {
    let text = as_text(data)?;
    let document: CciListDocument = quick_xml::de::from_str(text)?;
    let items = document
        .cci_items
        .ok_or(ParseError::MissingElement("cci_items"))?
        .items;

    let item_count = items.len();
    let mut skipped_items = 0usize;
    let mut unmapped_items = 0usize;
    let mut entries = Vec::with_capacity(item_count);

    for item in items {
        let Some(id) = item.id.as_deref().and_then(non_empty) else {
            skipped_items += 1;
            continue;
        };

        let controls: Vec<String> = item
            .references
            .map(|r| r.items)
            .unwrap_or_default()
            .into_iter()
            .filter(|r| {
                r.title
                    .as_deref()
                    .is_some_and(|t| t.contains(options.reference_title.as_str()))
            })
            .filter_map(|r| r.index.as_deref().and_then(non_empty).map(String::from))
            .collect();

        if controls.is_empty() {
            unmapped_items += 1;
            continue;
        }
        entries.push(CciEntry::new(id, controls));
    }

    Ok(CatalogParseResult {
        catalog: Catalog::from_entries(entries),
        item_count,
        skipped_items,
        unmapped_items,
    })
}
