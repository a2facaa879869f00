//! Demo inventory used by the CLI and the test suites.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::chemotype::{Chemotype, Inventory};

struct ChemotypeSeed {
    id: &'static str,
    name: &'static str,
    thc: f64,
    cbd: f64,
    terpenes: &'static [(&'static str, f64)],
}

const CHEMOTYPE_SEEDS: &[ChemotypeSeed] = &[
    ChemotypeSeed {
        id: "acdc",
        name: "ACDC",
        thc: 1.0,
        cbd: 16.0,
        terpenes: &[("myrcene", 0.5), ("pinene", 0.2), ("bisabolol", 0.2)],
    },
    ChemotypeSeed {
        id: "blue-dream",
        name: "Blue Dream",
        thc: 19.0,
        cbd: 0.2,
        terpenes: &[("myrcene", 0.6), ("pinene", 0.4), ("caryophyllene", 0.3), ("limonene", 0.2)],
    },
    ChemotypeSeed {
        id: "granddaddy-purple",
        name: "Granddaddy Purple",
        thc: 22.0,
        cbd: 0.1,
        terpenes: &[("myrcene", 1.4), ("linalool", 0.4), ("caryophyllene", 0.3)],
    },
    ChemotypeSeed {
        id: "harlequin",
        name: "Harlequin",
        thc: 5.0,
        cbd: 9.0,
        terpenes: &[("myrcene", 0.6), ("pinene", 0.3), ("caryophyllene", 0.3)],
    },
    ChemotypeSeed {
        id: "jack-herer",
        name: "Jack Herer",
        thc: 18.0,
        cbd: 0.1,
        terpenes: &[("terpinolene", 0.9), ("pinene", 0.4), ("ocimene", 0.3), ("caryophyllene", 0.2)],
    },
    ChemotypeSeed {
        id: "lemon-haze",
        name: "Lemon Haze",
        thc: 16.0,
        cbd: 0.2,
        terpenes: &[("limonene", 1.1), ("pinene", 0.5), ("ocimene", 0.2)],
    },
    ChemotypeSeed {
        id: "og-kush",
        name: "OG Kush",
        thc: 24.0,
        cbd: 0.2,
        terpenes: &[
            ("myrcene", 0.8),
            ("caryophyllene", 0.6),
            ("limonene", 0.5),
            ("humulene", 0.2),
        ],
    },
];

/// Fixed capture time so fixture output is reproducible.
pub fn demo_taken_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).single().unwrap_or_default()
}

pub fn demo_chemotypes() -> Vec<Chemotype> {
    CHEMOTYPE_SEEDS
        .iter()
        .map(|seed| {
            seed.terpenes.iter().fold(
                Chemotype::new(seed.id, seed.name).with_thc(seed.thc).with_cbd(seed.cbd),
                |chemotype, (terpene, concentration)| chemotype.with_terpene(terpene, *concentration),
            )
        })
        .collect()
}

pub fn demo_inventory() -> Inventory {
    Inventory::new(demo_taken_at(), demo_chemotypes())
}

#[cfg(test)]
mod tests {
    use super::{demo_chemotypes, demo_inventory};

    #[test]
    fn demo_inventory_is_fully_available_and_complete() {
        let inventory = demo_inventory();
        assert_eq!(inventory.available_count(), 7);
        assert!(demo_chemotypes().iter().all(|chemotype| chemotype.data_completeness() > 0.99));
    }

    #[test]
    fn demo_ids_are_sorted_and_unique() {
        let ids: Vec<String> =
            demo_chemotypes().into_iter().map(|chemotype| chemotype.id.0).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }
}
