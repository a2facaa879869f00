use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ApplicationError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChemotypeId(pub String);

impl ChemotypeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChemotypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CannabinoidKind {
    Thc,
    Cbd,
    Cbg,
    Cbn,
}

impl CannabinoidKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Thc => "THC",
            Self::Cbd => "CBD",
            Self::Cbg => "CBG",
            Self::Cbn => "CBN",
        }
    }
}

/// Cannabinoid content in percent by weight. `None` means the lab value was
/// not reported, which is distinct from a measured zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cannabinoids {
    pub thc: Option<f64>,
    pub cbd: Option<f64>,
    pub cbg: Option<f64>,
    pub cbn: Option<f64>,
}

impl Cannabinoids {
    pub fn get(&self, kind: CannabinoidKind) -> Option<f64> {
        match kind {
            CannabinoidKind::Thc => self.thc,
            CannabinoidKind::Cbd => self.cbd,
            CannabinoidKind::Cbg => self.cbg,
            CannabinoidKind::Cbn => self.cbn,
        }
    }

    pub fn thc_or_zero(&self) -> f64 {
        self.thc.unwrap_or(0.0)
    }

    pub fn cbd_or_zero(&self) -> f64 {
        self.cbd.unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chemotype {
    pub id: ChemotypeId,
    pub name: String,
    #[serde(default)]
    pub cannabinoids: Cannabinoids,
    /// Terpene name to concentration in percent by weight. An empty map means
    /// no terpene panel was reported.
    #[serde(default)]
    pub terpenes: BTreeMap<String, f64>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Lower-cased, trimmed terpene key used for every table lookup.
pub fn normalize_terpene(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl Chemotype {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ChemotypeId::new(id),
            name: name.into(),
            cannabinoids: Cannabinoids::default(),
            terpenes: BTreeMap::new(),
            available: true,
        }
    }

    pub fn with_thc(mut self, percent: f64) -> Self {
        self.cannabinoids.thc = Some(percent);
        self
    }

    pub fn with_cbd(mut self, percent: f64) -> Self {
        self.cannabinoids.cbd = Some(percent);
        self
    }

    pub fn with_terpene(mut self, name: &str, concentration: f64) -> Self {
        self.terpenes.insert(normalize_terpene(name), concentration);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn has_terpene_data(&self) -> bool {
        !self.terpenes.is_empty()
    }

    /// Concentration of a terpene, zero when absent or not a usable number.
    pub fn terpene(&self, name: &str) -> f64 {
        let key = normalize_terpene(name);
        self.terpenes
            .iter()
            .find(|(terpene, _)| normalize_terpene(terpene) == key)
            .map(|(_, concentration)| sanitize_amount(*concentration))
            .unwrap_or(0.0)
    }

    /// Normalized names of terpenes measured above zero.
    pub fn present_terpenes(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .terpenes
            .iter()
            .filter(|(_, concentration)| sanitize_amount(**concentration) > 0.0)
            .map(|(name, _)| normalize_terpene(name))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Share of the chemical panel that was actually reported, in [0, 1].
    pub fn data_completeness(&self) -> f64 {
        let mut completeness = 0.0;
        if self.cannabinoids.thc.is_some() {
            completeness += 0.2;
        }
        if self.cannabinoids.cbd.is_some() {
            completeness += 0.2;
        }
        if self.has_terpene_data() {
            completeness += 0.6;
        }
        completeness
    }
}

/// Clamp lab amounts to non-negative finite values.
pub(crate) fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Immutable inventory snapshot supplied with every engine call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub taken_at: DateTime<Utc>,
    pub chemotypes: Vec<Chemotype>,
}

impl Inventory {
    pub fn new(taken_at: DateTime<Utc>, chemotypes: Vec<Chemotype>) -> Self {
        Self { taken_at, chemotypes }
    }

    pub fn from_json(raw: &str) -> Result<Self, ApplicationError> {
        let inventory: Self = serde_json::from_str(raw)
            .map_err(|error| ApplicationError::Inventory(error.to_string()))?;
        inventory.validate()?;
        Ok(inventory)
    }

    /// Chemotype ids must be unique within a snapshot.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let mut seen = BTreeSet::new();
        for chemotype in &self.chemotypes {
            if !seen.insert(&chemotype.id) {
                return Err(ApplicationError::Inventory(format!(
                    "duplicate chemotype id `{}`",
                    chemotype.id
                )));
            }
        }
        Ok(())
    }

    pub fn available(&self) -> impl Iterator<Item = &Chemotype> {
        self.chemotypes.iter().filter(|chemotype| chemotype.available)
    }

    pub fn available_count(&self) -> usize {
        self.available().count()
    }

    /// Content identity of the snapshot. The capture time is excluded so two
    /// snapshots with the same chemotypes share cached results.
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(&self.chemotypes).unwrap_or_default();
        blake3::hash(&canonical).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Chemotype, Inventory};

    fn sample() -> Chemotype {
        Chemotype::new("lemon-haze", "Lemon Haze")
            .with_thc(16.0)
            .with_cbd(0.2)
            .with_terpene("Limonene", 1.1)
            .with_terpene("pinene", 0.5)
            .with_terpene("ocimene", 0.0)
    }

    #[test]
    fn terpene_lookup_is_case_insensitive() {
        let chemotype = sample();
        assert_eq!(chemotype.terpene("LIMONENE"), 1.1);
        assert_eq!(chemotype.terpene("myrcene"), 0.0);
    }

    #[test]
    fn present_terpenes_skip_zero_concentrations() {
        assert_eq!(sample().present_terpenes(), vec!["limonene".to_string(), "pinene".to_string()]);
    }

    #[test]
    fn completeness_reflects_missing_panels() {
        assert!((sample().data_completeness() - 1.0).abs() < 1e-12);

        let no_terpenes = Chemotype::new("mystery", "Mystery").with_thc(20.0);
        assert!((no_terpenes.data_completeness() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn inventory_json_defaults_availability_to_true() {
        let raw = r#"{
            "taken_at": "2026-01-05T10:00:00Z",
            "chemotypes": [
                {"id": "acdc", "name": "ACDC", "cannabinoids": {"thc": 1.0, "cbd": 16.0}},
                {"id": "gone", "name": "Gone", "available": false}
            ]
        }"#;

        let inventory = Inventory::from_json(raw).unwrap();
        assert_eq!(inventory.chemotypes.len(), 2);
        assert_eq!(inventory.available_count(), 1);
        assert!(inventory.chemotypes[0].available);
    }

    #[test]
    fn inventory_json_rejects_duplicate_ids() {
        let raw = r#"{
            "taken_at": "2026-01-05T10:00:00Z",
            "chemotypes": [
                {"id": "acdc", "name": "ACDC", "cannabinoids": {"thc": 1.0, "cbd": 16.0}},
                {"id": "acdc", "name": "ACDC (rerun)", "cannabinoids": {"thc": 22.0}}
            ]
        }"#;

        let error = Inventory::from_json(raw).unwrap_err();
        assert!(error.to_string().contains("duplicate chemotype id `acdc`"), "{error}");
    }

    #[test]
    fn fingerprint_ignores_capture_time() {
        let first = Inventory::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), vec![sample()]);
        let second = Inventory::new(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(), vec![sample()]);
        let third = Inventory::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            vec![sample().unavailable()],
        );

        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_ne!(first.fingerprint(), third.fingerprint());
    }
}
