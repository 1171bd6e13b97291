//! Canonical uniform vocabulary and normalization of legacy category/type names
//!
//! Years of schema drift left the portal with renamed categories, merged and
//! split item types and free-form spellings. Everything entering the engine
//! passes through [`normalize`] first, so the rest of the crate only ever
//! sees the canonical vocabulary defined here. The tables are compiled in;
//! changing them is a code change, not runtime data.

use crate::error::EngineError;

/// The five canonical inventory categories.
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
pub enum Category {
    #[n(0)]
    UniformNo3,
    #[n(1)]
    UniformNo4,
    #[n(2)]
    AccessoriesNo3,
    #[n(3)]
    AccessoriesNo4,
    #[n(4)]
    Shirt,
}

/// Uniform generation an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    No3,
    No4,
}

impl Category {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Category::UniformNo3 => "Uniform No 3",
            Category::UniformNo4 => "Uniform No 4",
            Category::AccessoriesNo3 => "Accessories No 3",
            Category::AccessoriesNo4 => "Accessories No 4",
            Category::Shirt => "Shirt",
        }
    }

    /// Stable prefix used for storage keys, so one category scans as one
    /// key range.
    pub fn key_tag(&self) -> &'static str {
        match self {
            Category::UniformNo3 => "uniformno3",
            Category::UniformNo4 => "uniformno4",
            Category::AccessoriesNo3 => "accessoriesno3",
            Category::AccessoriesNo4 => "accessoriesno4",
            Category::Shirt => "shirt",
        }
    }

    pub fn is_main_uniform(&self) -> bool {
        matches!(self, Category::UniformNo3 | Category::UniformNo4)
    }

    pub fn generation(&self) -> Option<Generation> {
        match self {
            Category::UniformNo3 | Category::AccessoriesNo3 => Some(Generation::No3),
            Category::UniformNo4 | Category::AccessoriesNo4 => Some(Generation::No4),
            Category::Shirt => None,
        }
    }

    fn accessory_category(generation: Generation) -> Category {
        match generation {
            Generation::No3 => Category::AccessoriesNo3,
            Generation::No4 => Category::AccessoriesNo4,
        }
    }
}

/// A line item after alias resolution: canonical category, canonical type
/// and the accessory/main-item classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedItem {
    pub category: Category,
    pub item_type: String,
    pub accessory: bool,
}

/// Case/whitespace/punctuation-insensitive folding used by every alias
/// lookup. "T-Shirt", "t shirt" and "TSHIRT" all fold to "tshirt";
/// "BAJU_NO_3_LELAKI" folds to "bajuno3lelaki".
pub fn fold(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

struct MainItemDef {
    canonical: &'static str,
    category: Category,
    // folded legacy spellings that must resolve to this type
    aliases: &'static [&'static str],
}

// Exact-match main-item list. This is evaluated before the accessory
// containment scan: "Beret" is a strict prefix of the accessory "Beret Pin",
// and a containment-only match would swallow the main item.
const MAIN_ITEMS: &[MainItemDef] = &[
    MainItemDef {
        canonical: "Baju No 3",
        category: Category::UniformNo3,
        // the gendered legacy split collapses to one stock type
        aliases: &["clothno3", "bajuno3lelaki", "bajuno3perempuan"],
    },
    MainItemDef {
        canonical: "Trousers No 3",
        category: Category::UniformNo3,
        aliases: &["seluarno3", "pantsno3"],
    },
    MainItemDef {
        canonical: "Beret",
        category: Category::UniformNo3,
        aliases: &[],
    },
    MainItemDef {
        canonical: "Boot",
        category: Category::UniformNo3,
        aliases: &["boots"],
    },
    MainItemDef {
        canonical: "Baju No 4",
        category: Category::UniformNo4,
        // two legacy names merged into the one No 4 type
        aliases: &["clothno4", "camouflageno4"],
    },
    MainItemDef {
        canonical: "Trousers No 4",
        category: Category::UniformNo4,
        aliases: &["seluarno4", "pantsno4"],
    },
    MainItemDef {
        canonical: "Hat",
        category: Category::UniformNo4,
        aliases: &[],
    },
    MainItemDef {
        canonical: "PVC Shoes",
        category: Category::UniformNo4,
        // stock was renamed from plain "Shoes" wholesale
        aliases: &["shoes"],
    },
    MainItemDef {
        canonical: "Digital Shirt",
        category: Category::Shirt,
        aliases: &["digital"],
    },
    MainItemDef {
        canonical: "Corporate Shirt",
        category: Category::Shirt,
        aliases: &["corporate"],
    },
];

struct AccessoryDef {
    canonical: &'static str,
    // None marks a dual-context accessory usable under either generation
    generation: Option<Generation>,
}

const ACCESSORIES: &[AccessoryDef] = &[
    AccessoryDef {
        canonical: "Beret Pin",
        generation: Some(Generation::No3),
    },
    AccessoryDef {
        canonical: "Lanyard",
        generation: Some(Generation::No3),
    },
    AccessoryDef {
        canonical: "Whistle",
        generation: Some(Generation::No3),
    },
    AccessoryDef {
        canonical: "Name Tag",
        generation: Some(Generation::No4),
    },
    AccessoryDef {
        canonical: "Boot Lace",
        generation: Some(Generation::No4),
    },
    AccessoryDef {
        canonical: "Apulet",
        generation: Some(Generation::No4),
    },
    AccessoryDef {
        canonical: "Belt",
        generation: None,
    },
    AccessoryDef {
        canonical: "Socks",
        generation: None,
    },
];

fn category_from_alias(folded: &str) -> Option<Category> {
    match folded {
        "uniformno3" | "no3uniform" | "uniform3" => Some(Category::UniformNo3),
        "uniformno4" | "no4uniform" | "uniform4" => Some(Category::UniformNo4),
        "accessoriesno3" | "accessoryno3" | "no3accessories" => Some(Category::AccessoriesNo3),
        "accessoriesno4" | "accessoryno4" | "no4accessories" => Some(Category::AccessoriesNo4),
        // "tshirt" is the legacy spelling of the current Shirt category
        "shirt" | "tshirt" => Some(Category::Shirt),
        _ => None,
    }
}

fn main_item_from_alias(folded_type: &str) -> Option<&'static MainItemDef> {
    MAIN_ITEMS
        .iter()
        .find(|def| fold(def.canonical) == folded_type || def.aliases.contains(&folded_type))
}

/// Generation named inside the type itself ("Belt No 3") wins over any
/// category-implied context.
fn generation_from_type(folded_type: &str) -> Option<Generation> {
    if folded_type.contains("no3") {
        Some(Generation::No3)
    } else if folded_type.contains("no4") {
        Some(Generation::No4)
    } else {
        None
    }
}

fn accessory_from_type(folded_type: &str) -> Option<&'static AccessoryDef> {
    if folded_type.is_empty() {
        return None;
    }
    // containment both ways: partial inputs like "Pin" match "Beret Pin",
    // and suffixed inputs like "Belt No 3" match "Belt"
    ACCESSORIES.iter().find(|def| {
        let known = fold(def.canonical);
        folded_type.contains(known.as_str()) || known.contains(folded_type)
    })
}

/// Resolve a raw (category, type) pair to the canonical vocabulary.
///
/// Fails with [`EngineError::InvalidCategory`] when the category matches
/// none of the five canonical categories or their historical aliases. Types
/// never fail: unknown type names pass through trimmed, classified by the
/// size resolver's keyword fallback.
pub fn normalize(raw_category: &str, raw_type: &str) -> Result<NormalizedItem, EngineError> {
    let supplied = category_from_alias(&fold(raw_category))
        .ok_or_else(|| EngineError::InvalidCategory(raw_category.trim().to_string()))?;

    let folded_type = fold(raw_type);

    // 1. exact main-item match, before any containment scan
    if let Some(def) = main_item_from_alias(&folded_type) {
        return Ok(NormalizedItem {
            // the type's home category wins over a drifted supplied one
            category: def.category,
            item_type: def.canonical.to_string(),
            accessory: false,
        });
    }

    // 2. accessory containment scan; legacy clients filed accessories under
    //    the main uniform categories, so the result always lands in an
    //    accessory category
    if let Some(def) = accessory_from_type(&folded_type) {
        let generation = generation_from_type(&folded_type)
            .or(def.generation)
            .or_else(|| supplied.generation())
            // context-less dual accessory: documented default, flagged for
            // product confirmation
            .unwrap_or(Generation::No3);

        let item_type = match def.generation {
            // dual-context accessories keep their generation in the name
            None => match generation {
                Generation::No3 => format!("{} No 3", def.canonical),
                Generation::No4 => format!("{} No 4", def.canonical),
            },
            Some(_) => def.canonical.to_string(),
        };

        return Ok(NormalizedItem {
            category: Category::accessory_category(generation),
            item_type,
            accessory: true,
        });
    }

    // 3. free-form custom type: keep the trimmed spelling under the supplied
    //    category
    Ok(NormalizedItem {
        category: supplied,
        item_type: raw_type.trim().to_string(),
        accessory: false,
    })
}

/// Folded canonical type of an already-stored record, for alias-variant
/// equality checks in the locator.
pub fn canonical_type_key(category: Category, item_type: &str) -> String {
    match normalize(category.canonical_name(), item_type) {
        Ok(item) => fold(&item.item_type),
        Err(_) => fold(item_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_tshirt_category_maps_to_shirt() {
        let item = normalize("T-Shirt", "Digital").unwrap();
        assert_eq!(item.category, Category::Shirt);
        assert_eq!(item.item_type, "Digital Shirt");
    }

    #[test]
    fn beret_is_a_main_item_not_the_pin() {
        // "Beret" is a prefix of the "Beret Pin" accessory; the exact list
        // has to win
        let item = normalize("Uniform No 3", "Beret").unwrap();
        assert!(!item.accessory);
        assert_eq!(item.item_type, "Beret");

        let pin = normalize("Uniform No 3", "Beret Pin").unwrap();
        assert!(pin.accessory);
        assert_eq!(pin.category, Category::AccessoriesNo3);
    }

    #[test]
    fn gendered_baju_variants_collapse() {
        let male = normalize("Uniform No 3", "BAJU_NO_3_LELAKI").unwrap();
        let female = normalize("Uniform No 3", "BAJU_NO_3_PEREMPUAN").unwrap();
        assert_eq!(male.item_type, "Baju No 3");
        assert_eq!(male, female);
    }

    #[test]
    fn accessory_under_uniform_category_reroutes() {
        let item = normalize("Uniform No 4", "Name Tag").unwrap();
        assert_eq!(item.category, Category::AccessoriesNo4);
    }

    #[test]
    fn dual_accessory_takes_suffix_over_category() {
        let item = normalize("Uniform No 4", "Belt No 3").unwrap();
        assert_eq!(item.category, Category::AccessoriesNo3);
        assert_eq!(item.item_type, "Belt No 3");
    }

    #[test]
    fn dual_accessory_defaults_to_category_generation() {
        let item = normalize("Uniform No 4", "Belt").unwrap();
        assert_eq!(item.category, Category::AccessoriesNo4);
        assert_eq!(item.item_type, "Belt No 4");
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = normalize("Formal Wear", "Baju No 3").unwrap_err();
        assert!(matches!(err, EngineError::InvalidCategory(_)));
    }
}
