//! Property-based tests for vocabulary normalization
//!
//! This module uses the proptest crate to verify that alias resolution is
//! correct across a wide range of randomly mutated legacy spellings.
//! Property tests are particularly valuable here because the historical
//! data contains every casing and separator variation a clerk ever typed.

use proptest::prelude::*;
use uniform_inventory::vocab::{Category, NormalizedItem, normalize};

/// The known legacy (category, type) spellings and what they must resolve to
const LEGACY_PAIRS: &[(&str, &str, Category, &str)] = &[
    ("Uniform No 3", "Cloth No 3", Category::UniformNo3, "Baju No 3"),
    ("Uniform No 3", "BAJU_NO_3_LELAKI", Category::UniformNo3, "Baju No 3"),
    ("Uniform No 3", "BAJU_NO_3_PEREMPUAN", Category::UniformNo3, "Baju No 3"),
    ("Uniform No 3", "Boots", Category::UniformNo3, "Boot"),
    ("Uniform No 3", "Beret", Category::UniformNo3, "Beret"),
    ("Uniform No 4", "Cloth No 4", Category::UniformNo4, "Baju No 4"),
    ("Uniform No 4", "Camouflage No 4", Category::UniformNo4, "Baju No 4"),
    ("Uniform No 4", "Shoes", Category::UniformNo4, "PVC Shoes"),
    ("Uniform No 4", "Seluar No 4", Category::UniformNo4, "Trousers No 4"),
    ("T-Shirt", "Digital", Category::Shirt, "Digital Shirt"),
    ("T Shirt", "Corporate", Category::Shirt, "Corporate Shirt"),
    ("TShirt", "Digital Shirt", Category::Shirt, "Digital Shirt"),
    ("Uniform No 3", "Beret Pin", Category::AccessoriesNo3, "Beret Pin"),
    ("Uniform No 4", "Name Tag", Category::AccessoriesNo4, "Name Tag"),
    ("Uniform No 4", "Belt", Category::AccessoriesNo4, "Belt No 4"),
    ("Uniform No 3", "Belt No 4", Category::AccessoriesNo4, "Belt No 4"),
    ("Accessories No 3", "Socks", Category::AccessoriesNo3, "Socks No 3"),
];

// PROPERTY TEST STRATEGIES

/// Strategy picking one known legacy pair
fn legacy_pair_strategy() -> impl Strategy<Value = (&'static str, &'static str, Category, &'static str)>
{
    (0..LEGACY_PAIRS.len()).prop_map(|i| LEGACY_PAIRS[i])
}

/// Strategy producing per-character case flips and separator swaps for a
/// spelling, without changing what it folds to
fn mutate_spelling(raw: &str, flips: &[bool], separators: &[bool]) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        let flip = flips.get(i).copied().unwrap_or(false);
        let swap = separators.get(i).copied().unwrap_or(false);
        if c.is_ascii_alphanumeric() {
            if flip {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
        } else if swap {
            out.push('-');
        } else {
            out.push(' ');
        }
    }
    out
}

fn mutation_strategy() -> impl Strategy<Value = (Vec<bool>, Vec<bool>)> {
    (
        prop::collection::vec(any::<bool>(), 0..32),
        prop::collection::vec(any::<bool>(), 0..32),
    )
}

// PROPERTY TESTS
proptest! {
    /// Property: every legacy spelling resolves to its canonical pair, no
    /// matter how case and separators drifted
    #[test]
    fn prop_legacy_spellings_resolve_under_drift(
        (raw_category, raw_type, category, item_type) in legacy_pair_strategy(),
        (flips, separators) in mutation_strategy()
    ) {
        let drifted_category = mutate_spelling(raw_category, &flips, &separators);
        let drifted_type = mutate_spelling(raw_type, &flips, &separators);

        let item = normalize(&drifted_category, &drifted_type).unwrap();
        prop_assert_eq!(item.category, category);
        prop_assert_eq!(
            item.item_type.as_str(), item_type,
            "drifted spelling ({}, {}) resolved wrong",
            drifted_category, drifted_type
        );
    }

    /// Property: normalization is idempotent - feeding a canonical result
    /// back in returns it unchanged
    #[test]
    fn prop_normalization_is_idempotent(
        (raw_category, raw_type, _, _) in legacy_pair_strategy()
    ) {
        let first: NormalizedItem = normalize(raw_category, raw_type).unwrap();
        let second = normalize(first.category.canonical_name(), &first.item_type).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: a category no alias table knows is always rejected, never
    /// guessed at
    #[test]
    fn prop_unknown_categories_never_pass(suffix in "[a-z]{4,12}") {
        let raw = format!("ceremonial {suffix}");
        prop_assert!(normalize(&raw, "Beret").is_err());
    }
}
