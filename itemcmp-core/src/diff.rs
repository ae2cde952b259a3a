//! Per-field value extraction, metric classification, and winner selection.

use crate::error::DiffError;
use crate::resolver::SPEC_PREFIX;
use crate::types::{DiffField, Item, Metric, SpecValue};
use std::collections::BTreeMap;

/// Known field paths and how their winners are chosen.
const FIELD_METRICS: &[(&str, Metric)] = &[
    ("price", Metric::LowerIsBetter),
    ("rating", Metric::HigherIsBetter),
    ("specifications.weight", Metric::LowerIsBetter),
    ("specifications.sensor_dpi", Metric::HigherIsBetter),
    ("specifications.buttons", Metric::HigherIsBetter),
    ("specifications.battery_life", Metric::HigherIsBetter),
    ("specifications.screen_size", Metric::HigherIsBetter),
    ("specifications.refresh_rate", Metric::HigherIsBetter),
    ("specifications.wireless", Metric::TrueIsBetter),
    ("specifications.noise_cancelling", Metric::TrueIsBetter),
    ("specifications.backlit", Metric::TrueIsBetter),
];

/// Metric for a field path, if one is registered.
pub fn metric_for_field(path: &str) -> Option<Metric> {
    let normalized = path.trim().to_lowercase();
    FIELD_METRICS
        .iter()
        .find(|(field, _)| *field == normalized)
        .map(|(_, metric)| *metric)
}

/// Extract the value of `path` from `item`.
///
/// Root fields come from a fixed table. For `specifications.<key>`, a stored
/// mapping with a `value` key is unwrapped to that inner value; a null inner
/// value counts as absent.
pub fn extract_field_value(item: &Item, path: &str) -> Option<SpecValue> {
    if let Some(key) = path.strip_prefix(SPEC_PREFIX) {
        return match item.specifications.get(key)? {
            SpecValue::Nested(map) => match map.get("value") {
                Some(SpecValue::Null) => None,
                Some(inner) => Some(inner.clone()),
                None => Some(SpecValue::Nested(map.clone())),
            },
            other => Some(other.clone()),
        };
    }

    match path {
        "price" => SpecValue::from_f64(item.price),
        "rating" => SpecValue::from_f64(item.rating),
        "name" => Some(SpecValue::Text(item.name.clone())),
        "description" => Some(SpecValue::Text(item.description.clone())),
        "image_url" => Some(SpecValue::Text(item.image_url.clone())),
        _ => None,
    }
}

/// Compute the diff for every resolved field.
pub fn compute_diff(
    items: &[Item],
    resolved: &[String],
) -> Result<BTreeMap<String, DiffField>, DiffError> {
    let mut diff = BTreeMap::new();

    for path in resolved {
        validate_path(path)?;

        let values: BTreeMap<String, Option<SpecValue>> = items
            .iter()
            .map(|item| (item.id.clone(), extract_field_value(item, path)))
            .collect();

        let metric = metric_for_field(path);
        let best = match metric {
            Some(metric) => find_best(&values, metric),
            None => Vec::new(),
        };

        diff.insert(
            path.clone(),
            DiffField {
                values,
                metric,
                best,
            },
        );
    }

    Ok(diff)
}

fn validate_path(path: &str) -> Result<(), DiffError> {
    let valid = match path.strip_prefix(SPEC_PREFIX) {
        Some(key) => !key.is_empty(),
        None => matches!(
            path,
            "price" | "rating" | "name" | "description" | "image_url"
        ),
    };
    if valid {
        Ok(())
    } else {
        Err(DiffError::UnsupportedPath {
            path: path.to_string(),
        })
    }
}

/// Winning ids under `metric`, alphabetically sorted. Absent values and values
/// that do not coerce to the metric's type never win.
fn find_best(values: &BTreeMap<String, Option<SpecValue>>, metric: Metric) -> Vec<String> {
    let present = values
        .iter()
        .filter_map(|(id, value)| value.as_ref().map(|v| (id, v)));

    // BTreeMap iteration is already ordered by id.
    match metric {
        Metric::TrueIsBetter => present
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(id, _)| id.clone())
            .collect(),
        Metric::LowerIsBetter | Metric::HigherIsBetter => {
            let numeric: Vec<(&String, f64)> = present
                .filter_map(|(id, v)| v.as_f64().map(|n| (id, n)))
                .collect();

            let target = numeric.iter().map(|(_, n)| *n).reduce(|a, b| {
                if metric == Metric::LowerIsBetter {
                    a.min(b)
                } else {
                    a.max(b)
                }
            });

            match target {
                Some(target) => numeric
                    .into_iter()
                    .filter(|(_, n)| *n == target)
                    .map(|(id, _)| id.clone())
                    .collect(),
                None => Vec::new(),
            }
        }
    }
}
