//! Display names and descriptive tags for chemotypes. Naming only; nothing
//! here feeds scoring.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::chemotype::{Chemotype, ChemotypeId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayTag {
    pub display_name: String,
    pub tags: Vec<String>,
}

pub trait TagResolver {
    fn resolve(&self, id: &ChemotypeId) -> Option<DisplayTag>;

    /// Table entry when present, otherwise the chemotype's own name untagged.
    fn display_for(&self, chemotype: &Chemotype) -> DisplayTag {
        self.resolve(&chemotype.id)
            .unwrap_or_else(|| DisplayTag { display_name: chemotype.name.clone(), tags: Vec::new() })
    }
}

struct TagSeed {
    id: &'static str,
    display_name: &'static str,
    tags: &'static [&'static str],
}

const TAG_SEEDS: &[TagSeed] = &[
    TagSeed { id: "acdc", display_name: "ACDC", tags: &["cbd-rich", "clear-headed", "daytime"] },
    TagSeed { id: "blue-dream", display_name: "Blue Dream", tags: &["balanced", "mellow"] },
    TagSeed {
        id: "granddaddy-purple",
        display_name: "Granddaddy Purple",
        tags: &["sedating", "evening"],
    },
    TagSeed { id: "harlequin", display_name: "Harlequin", tags: &["cbd-rich", "gentle"] },
    TagSeed { id: "jack-herer", display_name: "Jack Herer", tags: &["uplifting", "creative"] },
    TagSeed { id: "lemon-haze", display_name: "Lemon Haze", tags: &["uplifting", "daytime"] },
    TagSeed { id: "og-kush", display_name: "OG Kush", tags: &["heavy", "evening"] },
];

#[derive(Clone, Debug, Default)]
pub struct StaticTagTable {
    entries: BTreeMap<ChemotypeId, DisplayTag>,
}

impl StaticTagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering the demo inventory.
    pub fn demo() -> Self {
        TAG_SEEDS.iter().fold(Self::new(), |table, seed| {
            table.with_entry(seed.id, seed.display_name, seed.tags)
        })
    }

    pub fn with_entry(mut self, id: &str, display_name: &str, tags: &[&str]) -> Self {
        self.entries.insert(
            ChemotypeId::new(id),
            DisplayTag {
                display_name: display_name.to_string(),
                tags: tags.iter().map(|tag| tag.to_string()).collect(),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TagResolver for StaticTagTable {
    fn resolve(&self, id: &ChemotypeId) -> Option<DisplayTag> {
        self.entries.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::{StaticTagTable, TagResolver};
    use crate::domain::chemotype::{Chemotype, ChemotypeId};

    #[test]
    fn demo_table_resolves_known_ids() {
        let table = StaticTagTable::demo();
        let tag = table.resolve(&ChemotypeId::new("lemon-haze")).unwrap();

        assert_eq!(tag.display_name, "Lemon Haze");
        assert!(tag.tags.contains(&"uplifting".to_string()));
    }

    #[test]
    fn unknown_chemotype_falls_back_to_its_own_name() {
        let table = StaticTagTable::demo();
        let tag = table.display_for(&Chemotype::new("house-blend", "House Blend"));

        assert_eq!(tag.display_name, "House Blend");
        assert!(tag.tags.is_empty());
    }
}
