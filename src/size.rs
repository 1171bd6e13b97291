//! Type-aware size requirement and matching strategies
//!
//! Historical inventory carries sizes in whatever format the clerk of the
//! day typed: "UK 7" next to "7", "m" next to "M ", "6 3/4" where the
//! fraction is significant. Matching strategy depends on the item type, so
//! every comparison dispatches through [`SizeClass`] here rather than
//! ad-hoc string checks at call sites.

use crate::vocab::{NormalizedItem, fold};

/// Matching strategy for one item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// Verbatim comparison after trimming; internal whitespace and case are
    /// significant (fractional beret sizes like "6 3/4").
    ExactPreserve,
    /// Footwear: strip a leading "UK" unit prefix, then fall back to the
    /// first numeric token.
    NumericPrefix,
    /// Case-folded, whitespace-collapsed comparison with a numeric-token
    /// fallback.
    Flexible,
    /// Accessories and anything else that never carries a size.
    NoSize,
}

const FOOTWEAR_KEYWORDS: &[&str] = &["boot", "shoe"];
const HEADWEAR_KEYWORDS: &[&str] = &["beret", "hat", "cap"];
const GARMENT_KEYWORDS: &[&str] = &["baju", "shirt", "trousers", "pants", "seluar", "jacket"];

// the static per-category table: every canonical main item carries a size
const SIZED_MAIN_ITEMS: &[&str] = &[
    "bajuno3",
    "trousersno3",
    "beret",
    "boot",
    "bajuno4",
    "trousersno4",
    "hat",
    "pvcshoes",
    "digitalshirt",
    "corporateshirt",
];

fn keyword_hit(folded_type: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| folded_type.contains(k))
}

/// Whether this item carries a size at all. Accessories never do, even when
/// their name contains a size-looking keyword ("Boot Lace").
pub fn requires_size(item: &NormalizedItem) -> bool {
    if item.accessory {
        return false;
    }
    let folded = fold(&item.item_type);
    if SIZED_MAIN_ITEMS.contains(&folded.as_str()) {
        return true;
    }
    // free-form custom types fall back to the keyword heuristic
    keyword_hit(&folded, FOOTWEAR_KEYWORDS)
        || keyword_hit(&folded, HEADWEAR_KEYWORDS)
        || keyword_hit(&folded, GARMENT_KEYWORDS)
}

/// Matching strategy for a normalized item.
pub fn size_class(item: &NormalizedItem) -> SizeClass {
    if !requires_size(item) {
        return SizeClass::NoSize;
    }
    let folded = fold(&item.item_type);
    if folded == "beret" {
        SizeClass::ExactPreserve
    } else if keyword_hit(&folded, FOOTWEAR_KEYWORDS) {
        SizeClass::NumericPrefix
    } else {
        SizeClass::Flexible
    }
}

/// Empty, absent and the historical "N/A" spellings all mean "no size".
pub fn is_no_size(size: Option<&str>) -> bool {
    match size {
        None => true,
        Some(s) => {
            let folded = fold(s);
            folded.is_empty() || folded == "na" || folded == "nosize"
        }
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

// "UK 7" and "uk7" both strip to "7"; anything else passes through
fn strip_unit_prefix(s: &str) -> &str {
    let trimmed = s.trim();
    let rest = trimmed
        .strip_prefix("UK")
        .or_else(|| trimmed.strip_prefix("uk"))
        .or_else(|| trimmed.strip_prefix("Uk"))
        .or_else(|| trimmed.strip_prefix("uK"));
    match rest {
        Some(r) => r.trim_start(),
        None => trimmed,
    }
}

/// First numeric token ("7" out of "UK 7", "7.5" out of "size 7.5").
fn numeric_token(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let start = bytes.iter().position(|b| b.is_ascii_digit())?;
    let mut end = start;
    let mut seen_dot = false;
    while end < bytes.len() {
        let b = bytes[end];
        if b.is_ascii_digit() {
            end += 1;
        } else if b == b'.' && !seen_dot {
            seen_dot = true;
            end += 1;
        } else {
            break;
        }
    }
    s[start..end].trim_end_matches('.').parse().ok()
}

fn numeric_match(candidate: &str, query: &str) -> bool {
    match (numeric_token(candidate), numeric_token(query)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether an inventory record's size satisfies a queried size under the
/// given strategy.
pub fn matches(candidate: Option<&str>, query: Option<&str>, class: SizeClass) -> bool {
    if let SizeClass::NoSize = class {
        // a size-less query matches only a size-less record
        return is_no_size(query) && is_no_size(candidate);
    }
    if is_no_size(query) || is_no_size(candidate) {
        return false;
    }
    let candidate = candidate.unwrap_or_default();
    let query = query.unwrap_or_default();

    match class {
        SizeClass::ExactPreserve => candidate.trim() == query.trim(),
        SizeClass::NumericPrefix => {
            let c = strip_unit_prefix(candidate);
            let q = strip_unit_prefix(query);
            c.eq_ignore_ascii_case(q) || numeric_match(candidate, query)
        }
        SizeClass::Flexible => {
            collapse(candidate) == collapse(query) || numeric_match(candidate, query)
        }
        SizeClass::NoSize => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::normalize;

    fn item(category: &str, item_type: &str) -> NormalizedItem {
        normalize(category, item_type).unwrap()
    }

    #[test]
    fn beret_sizes_match_verbatim_only() {
        let beret = item("Uniform No 3", "Beret");
        let class = size_class(&beret);
        assert_eq!(class, SizeClass::ExactPreserve);
        assert!(matches(Some("6 3/4"), Some("6 3/4"), class));
        assert!(!matches(Some("6 5/8"), Some("6 3/4"), class));
        // internal whitespace is significant
        assert!(!matches(Some("63/4"), Some("6 3/4"), class));
    }

    #[test]
    fn boot_sizes_strip_the_uk_prefix() {
        let boot = item("Uniform No 3", "Boot");
        let class = size_class(&boot);
        assert_eq!(class, SizeClass::NumericPrefix);
        assert!(matches(Some("7"), Some("UK 7"), class));
        assert!(matches(Some("UK 7"), Some("7"), class));
        assert!(matches(Some("uk7"), Some("UK 7"), class));
        assert!(!matches(Some("8"), Some("UK 7"), class));
    }

    #[test]
    fn garment_sizes_fold_case_and_whitespace() {
        let baju = item("Uniform No 3", "Baju No 3");
        let class = size_class(&baju);
        assert_eq!(class, SizeClass::Flexible);
        assert!(matches(Some(" m "), Some("M"), class));
        assert!(!matches(Some("L"), Some("M"), class));
    }

    #[test]
    fn accessories_never_require_a_size() {
        // name contains "boot" but accessories stay size-less
        let lace = item("Accessories No 4", "Boot Lace");
        assert!(!requires_size(&lace));
        let class = size_class(&lace);
        assert!(matches(None, None, class));
        assert!(matches(Some(""), Some("N/A"), class));
        assert!(!matches(Some("7"), None, class));
    }

    #[test]
    fn custom_types_use_the_keyword_heuristic() {
        let jacket = item("Uniform No 4", "Rain Jacket");
        assert!(requires_size(&jacket));
        let misc = item("Uniform No 4", "Water Bottle");
        assert!(!requires_size(&misc));
    }
}
