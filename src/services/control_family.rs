//! NIST 800-53 control family derivation.
//!
//! A family is the leading run of 2-3 uppercase letters immediately before
//! the first hyphen of a control identifier: `AC-2(1)` -> `AC`,
//! `PM-16` -> `PM`. Identifiers without that shape have no family.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static FAMILY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{2,3})-").expect("family prefix regex is valid"));

/// Derive the control family for a single control identifier.
pub fn family_of(control_id: &str) -> Option<String> {
    FAMILY_PREFIX
        .captures(control_id.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Derive the sorted, deduplicated family set for a list of controls.
pub fn families_of<'a, I>(controls: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    controls
        .into_iter()
        .filter_map(|c| family_of(c))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
