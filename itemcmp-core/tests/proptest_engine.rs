//! Property-based tests for cache keys, field resolution, and winner selection

#![allow(clippy::expect_used, clippy::unwrap_used)]

use itemcmp_core::diff::compute_diff;
use itemcmp_core::engine::{CompareEngine, generate_cache_key, unique_ids};
use itemcmp_core::error::CompareError;
use itemcmp_core::resolver::resolve_fields;
use itemcmp_core::types::{CompareRequest, Item};
use itemcmp_core::FileCatalog;
use proptest::prelude::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn id_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-e]{0,3}", 0..12)
}

/// Items whose specification keys are drawn from a small alphabet so that
/// overlaps are common.
fn item_set() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(
        (
            0.0..1000.0f64,
            0.0..5.0f64,
            prop::collection::btree_set("[a-f]", 0..5),
        ),
        0..6,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (price, rating, keys))| {
                keys.into_iter().fold(
                    Item::new(format!("item{i}"))
                        .with_price(price)
                        .with_rating(rating),
                    |item, key| item.with_spec(key, 1i64),
                )
            })
            .collect()
    })
}

proptest! {
    /// Cache key ignores order, duplicates, and empty ids
    #[test]
    fn cache_key_set_invariant(
        (ids, shuffled) in id_list().prop_flat_map(|ids| (Just(ids.clone()), Just(ids).prop_shuffle())),
        dup_index in any::<prop::sample::Index>(),
    ) {
        let mut noisy = shuffled.clone();
        noisy.push(String::new());
        if !shuffled.is_empty() {
            noisy.push(dup_index.get(&shuffled).clone());
        }
        let key = generate_cache_key(&ids);
        prop_assert_eq!(&key, &generate_cache_key(&shuffled));
        prop_assert_eq!(&key, &generate_cache_key(&noisy));
        prop_assert_eq!(key.len(), 64);
    }

    /// Deduplication keeps first occurrences and drops empties
    #[test]
    fn unique_ids_no_duplicates_or_empties(ids in id_list()) {
        let unique = unique_ids(&ids);
        let mut sorted = unique.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), unique.len());
        prop_assert!(unique.iter().all(|id| !id.is_empty()));
        for id in &ids {
            if !id.is_empty() {
                prop_assert!(unique.contains(id));
            }
        }
    }

    /// Resolved fields are sorted, unique, and carried by at least two items
    #[test]
    fn resolved_fields_sorted_and_shared(items in item_set()) {
        let fields = resolve_fields(&items, None);
        prop_assert!(fields.windows(2).all(|w| w[0] < w[1]));
        for field in &fields {
            let carriers = items
                .iter()
                .filter(|item| match field.strip_prefix("specifications.") {
                    Some(key) => item.specifications.contains_key(key),
                    None => true,
                })
                .count();
            prop_assert!(carriers >= 2);
        }
    }

    /// A requested list narrows the candidates without reordering the output
    #[test]
    fn requested_fields_are_intersected(
        items in item_set(),
        requested in prop::collection::vec(
            prop_oneof![
                Just("price".to_string()),
                Just("rating".to_string()),
                "specifications\\.[a-h]",
            ],
            1..8,
        ),
    ) {
        let all = resolve_fields(&items, None);
        let filtered = resolve_fields(&items, Some(requested.as_slice()));
        prop_assert!(filtered.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(filtered.iter().all(|f| all.contains(f) && requested.contains(f)));
    }

    /// Price winners are every item tied at the minimum, in id order
    #[test]
    fn price_winners_are_minimal(items in item_set()) {
        prop_assume!(items.len() >= 2);
        let diff = compute_diff(&items, &["price".to_string()]).unwrap();
        let best = &diff["price"].best;
        let min = items.iter().map(|i| i.price).fold(f64::INFINITY, f64::min);
        let expected: Vec<String> = {
            let mut ids: Vec<String> = items
                .iter()
                .filter(|i| i.price == min)
                .map(|i| i.id.clone())
                .collect();
            ids.sort();
            ids
        };
        prop_assert_eq!(best, &expected);
    }

    /// Fewer than two unique non-empty ids always fails validation
    #[test]
    fn too_few_ids_rejected(id in "[a-c]{0,2}", copies in 1usize..5) {
        let catalog = FileCatalog::from_items(Vec::new()).unwrap();
        let engine = CompareEngine::new(Arc::new(catalog));
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let request = CompareRequest::new(std::iter::repeat_n(id, copies));
        let err = runtime
            .block_on(engine.compare(&request, &CancellationToken::new()))
            .unwrap_err();
        prop_assert_eq!(err, CompareError::AtLeastTwoIds);
    }
}
