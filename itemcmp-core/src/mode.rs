//! Comparison modes.
//!
//! Only one mode exists today, so modes are a closed enum rather than a
//! plugin trait.

use crate::diff;
use crate::error::DiffError;
use crate::resolver;
use crate::types::{DiffField, Item};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Compare every field carried by at least two of the items.
    #[default]
    AtLeastTwo,
}

impl CompareMode {
    pub fn name(&self) -> &'static str {
        match self {
            CompareMode::AtLeastTwo => "at_least_two",
        }
    }

    pub fn resolve_fields(&self, items: &[Item], requested: Option<&[String]>) -> Vec<String> {
        match self {
            CompareMode::AtLeastTwo => resolver::resolve_fields(items, requested),
        }
    }

    pub fn compute_diff(
        &self,
        items: &[Item],
        resolved: &[String],
    ) -> Result<BTreeMap<String, DiffField>, DiffError> {
        match self {
            CompareMode::AtLeastTwo => diff::compute_diff(items, resolved),
        }
    }
}

impl std::fmt::Display for CompareMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
