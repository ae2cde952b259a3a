//! Field resolution: which fields are comparable across a set of items.
//!
//! A field is a candidate when at least two of the supplied items carry it.
//! `price` and `rating` are always carried; each specification entry
//! contributes the synthetic path `specifications.<key>`.

use crate::types::Item;
use std::collections::{BTreeSet, HashMap};

/// Root fields every item carries.
pub const ROOT_FIELDS: [&str; 2] = ["price", "rating"];

/// Prefix of nested specification field paths.
pub const SPEC_PREFIX: &str = "specifications.";

/// Minimum number of items that must carry a field for it to be comparable.
pub const MIN_CARRIERS: usize = 2;

/// Build the specification field path for `key`.
pub fn spec_path(key: &str) -> String {
    format!("{SPEC_PREFIX}{key}")
}

/// Resolve the ordered set of comparable fields.
///
/// With a non-empty `requested` list the result is the intersection of the
/// requested fields and the candidates; otherwise all candidates. The result
/// is always alphabetically sorted and free of duplicates.
pub fn resolve_fields(items: &[Item], requested: Option<&[String]>) -> Vec<String> {
    if items.is_empty() {
        return Vec::new();
    }

    let mut carriers: HashMap<String, usize> = HashMap::new();
    for item in items {
        for root in ROOT_FIELDS {
            *carriers.entry(root.to_string()).or_default() += 1;
        }
        for key in item.specifications.keys() {
            *carriers.entry(spec_path(key)).or_default() += 1;
        }
    }

    let candidates: BTreeSet<String> = carriers
        .into_iter()
        .filter(|(_, count)| *count >= MIN_CARRIERS)
        .map(|(field, _)| field)
        .collect();

    match requested.filter(|r| !r.is_empty()) {
        Some(requested) => requested
            .iter()
            .filter(|field| candidates.contains(*field))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        None => candidates.into_iter().collect(),
    }
}
