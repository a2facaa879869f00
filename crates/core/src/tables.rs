//! Calibration tables: terpene effect weights, cannabinoid modifiers, the
//! terpene interaction table, risk mitigators and potency limits.
//!
//! The built-in values are a documented starting calibration. A deployment can
//! swap the whole set by loading a TOML file with the same shape; any section
//! left out of the file keeps its built-in default.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::blend::{InteractionKind, Magnitude, RiskKind};
use crate::domain::chemotype::{normalize_terpene, CannabinoidKind, Chemotype};
use crate::domain::effect::EffectVector;
use crate::domain::profile::{ExperienceLevel, ToleranceLevel};
use crate::errors::{ApplicationError, DomainError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerpeneWeights {
    /// Raw effect contribution per 1% w/w, per dimension. Non-negative.
    pub effects: EffectVector,
    /// Anxiety-risk contribution per 1% w/w. Negative values calm.
    #[serde(default)]
    pub anxiety: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannabinoidModifiers {
    /// Intensity multiplier gained per THC percent.
    pub thc_intensity: f64,
    /// Anxiety risk added per THC percent.
    pub thc_anxiety: f64,
    /// Anxiety risk removed per CBD percent.
    pub cbd_anxiety: f64,
    pub thc_effects: EffectVector,
    pub cbd_effects: EffectVector,
    /// Gain of the saturating transform from raw contribution to [0, 1).
    pub saturation_gain: f64,
}

impl Default for CannabinoidModifiers {
    fn default() -> Self {
        Self {
            thc_intensity: 0.02,
            thc_anxiety: 0.03,
            cbd_anxiety: 0.04,
            thc_effects: EffectVector::from_values([0.0, 0.0, 0.015, 0.02, 0.01, 0.0]),
            cbd_effects: EffectVector::from_values([0.0, 0.0, 0.0, 0.03, 0.0, 0.04]),
            saturation_gain: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRule {
    pub terpenes: [String; 2],
    pub kind: InteractionKind,
    pub magnitude: Magnitude,
    pub effect: String,
}

impl InteractionRule {
    fn matches(&self, a: &str, b: &str) -> bool {
        let first = normalize_terpene(&self.terpenes[0]);
        let second = normalize_terpene(&self.terpenes[1]);
        (first == a && second == b) || (first == b && second == a)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MitigatorCondition {
    CannabinoidAtLeast { cannabinoid: CannabinoidKind, percent: f64 },
    TerpeneAtLeast { terpene: String, concentration: f64 },
}

impl MitigatorCondition {
    pub fn holds_for(&self, chemotype: &Chemotype) -> bool {
        match self {
            Self::CannabinoidAtLeast { cannabinoid, percent } => chemotype
                .cannabinoids
                .get(*cannabinoid)
                .map(|value| value >= *percent)
                .unwrap_or(false),
            Self::TerpeneAtLeast { terpene, concentration } => {
                chemotype.terpene(terpene) >= *concentration
            }
        }
    }
}

/// A chemotype profile documented to offset one kind of risk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MitigatorRule {
    pub risk: RiskKind,
    pub condition: MitigatorCondition,
    pub factor: String,
    pub strategy: String,
}

/// Blended THC percent above which potency counts as a risk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotencyLimits {
    pub low_tolerance: f64,
    pub medium_tolerance: f64,
    pub high_tolerance: f64,
    pub novice: f64,
}

impl Default for PotencyLimits {
    fn default() -> Self {
        Self { low_tolerance: 15.0, medium_tolerance: 22.0, high_tolerance: 30.0, novice: 12.0 }
    }
}

impl PotencyLimits {
    pub fn limit_for(&self, tolerance: ToleranceLevel, experience: ExperienceLevel) -> f64 {
        let by_tolerance = match tolerance {
            ToleranceLevel::Low => self.low_tolerance,
            ToleranceLevel::Medium => self.medium_tolerance,
            ToleranceLevel::High => self.high_tolerance,
        };
        match experience {
            ExperienceLevel::Novice => by_tolerance.min(self.novice),
            ExperienceLevel::Regular | ExperienceLevel::Experienced => by_tolerance,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTables {
    pub terpenes: BTreeMap<String, TerpeneWeights>,
    pub cannabinoids: CannabinoidModifiers,
    pub interactions: Vec<InteractionRule>,
    pub mitigators: Vec<MitigatorRule>,
    pub potency: PotencyLimits,
    /// Aggregate body or relaxation level treated as sedating during the day.
    pub sedation_threshold: f64,
}

#[derive(Debug, Clone, Copy)]
struct TerpeneSeed {
    name: &'static str,
    effects: [f64; 6],
    anxiety: f64,
}

// energy, focus, mood, body, creativity, relaxation
const TERPENE_SEEDS: &[TerpeneSeed] = &[
    TerpeneSeed { name: "myrcene", effects: [0.0, 0.0, 0.2, 0.9, 0.0, 1.0], anxiety: -0.05 },
    TerpeneSeed { name: "limonene", effects: [0.6, 0.4, 1.0, 0.1, 0.5, 0.1], anxiety: -0.05 },
    TerpeneSeed { name: "pinene", effects: [0.5, 1.0, 0.3, 0.0, 0.3, 0.0], anxiety: -0.02 },
    TerpeneSeed { name: "caryophyllene", effects: [0.0, 0.1, 0.3, 0.7, 0.0, 0.5], anxiety: -0.08 },
    TerpeneSeed { name: "linalool", effects: [0.0, 0.0, 0.4, 0.4, 0.1, 1.0], anxiety: -0.15 },
    TerpeneSeed { name: "terpinolene", effects: [0.8, 0.3, 0.5, 0.0, 0.8, 0.1], anxiety: 0.05 },
    TerpeneSeed { name: "humulene", effects: [0.1, 0.3, 0.1, 0.4, 0.0, 0.3], anxiety: 0.0 },
    TerpeneSeed { name: "ocimene", effects: [0.7, 0.2, 0.6, 0.0, 0.4, 0.0], anxiety: 0.02 },
    TerpeneSeed { name: "bisabolol", effects: [0.0, 0.0, 0.3, 0.3, 0.0, 0.6], anxiety: -0.10 },
];

#[derive(Debug, Clone, Copy)]
struct InteractionSeed {
    a: &'static str,
    b: &'static str,
    kind: InteractionKind,
    magnitude: Magnitude,
    effect: &'static str,
}

const INTERACTION_SEEDS: &[InteractionSeed] = &[
    InteractionSeed {
        a: "limonene",
        b: "pinene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Medium,
        effect: "Pinene sharpens the alert, uplifted lift from limonene",
    },
    InteractionSeed {
        a: "limonene",
        b: "terpinolene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Medium,
        effect: "Bright, creative head lift",
    },
    InteractionSeed {
        a: "myrcene",
        b: "linalool",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::High,
        effect: "Stacked sedation and deep body calm",
    },
    InteractionSeed {
        a: "caryophyllene",
        b: "linalool",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Medium,
        effect: "Combined easing of body tension and nerves",
    },
    InteractionSeed {
        a: "caryophyllene",
        b: "humulene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Low,
        effect: "Shared soothing body relief",
    },
    InteractionSeed {
        a: "ocimene",
        b: "terpinolene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Low,
        effect: "Light, energetic lift",
    },
    InteractionSeed {
        a: "myrcene",
        b: "myrcene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Medium,
        effect: "Compounding myrcene deepens body relaxation",
    },
    InteractionSeed {
        a: "pinene",
        b: "pinene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Low,
        effect: "Shared pinene reinforces clear-headed focus",
    },
    InteractionSeed {
        a: "limonene",
        b: "limonene",
        kind: InteractionKind::Synergy,
        magnitude: Magnitude::Low,
        effect: "Shared limonene reinforces the mood lift",
    },
    InteractionSeed {
        a: "pinene",
        b: "myrcene",
        kind: InteractionKind::Antagonism,
        magnitude: Magnitude::Medium,
        effect: "Pinene counters myrcene-driven mental fog",
    },
    InteractionSeed {
        a: "terpinolene",
        b: "myrcene",
        kind: InteractionKind::Antagonism,
        magnitude: Magnitude::Medium,
        effect: "Terpinolene stimulation competes with myrcene sedation",
    },
    InteractionSeed {
        a: "limonene",
        b: "myrcene",
        kind: InteractionKind::Antagonism,
        magnitude: Magnitude::Low,
        effect: "Limonene lift partially offsets myrcene heaviness",
    },
    InteractionSeed {
        a: "limonene",
        b: "linalool",
        kind: InteractionKind::Neutral,
        magnitude: Magnitude::Low,
        effect: "Mood lift and calm coexist without reinforcing each other",
    },
    InteractionSeed {
        a: "caryophyllene",
        b: "caryophyllene",
        kind: InteractionKind::Neutral,
        magnitude: Magnitude::Low,
        effect: "Shared caryophyllene adds steady background body ease",
    },
];

fn default_mitigators() -> Vec<MitigatorRule> {
    vec![
        MitigatorRule {
            risk: RiskKind::Anxiety,
            condition: MitigatorCondition::CannabinoidAtLeast {
                cannabinoid: CannabinoidKind::Cbd,
                percent: 4.0,
            },
            factor: "CBD-rich component".to_string(),
            strategy: "CBD buffers THC-driven anxiety; keep its share of the blend".to_string(),
        },
        MitigatorRule {
            risk: RiskKind::Anxiety,
            condition: MitigatorCondition::TerpeneAtLeast {
                terpene: "linalool".to_string(),
                concentration: 0.3,
            },
            factor: "linalool-forward component".to_string(),
            strategy: "Linalool's calming profile softens a racy onset".to_string(),
        },
        MitigatorRule {
            risk: RiskKind::Potency,
            condition: MitigatorCondition::CannabinoidAtLeast {
                cannabinoid: CannabinoidKind::Cbd,
                percent: 4.0,
            },
            factor: "CBD-rich component".to_string(),
            strategy: "CBD tempers overall THC intensity; start with a small amount".to_string(),
        },
        MitigatorRule {
            risk: RiskKind::Sedation,
            condition: MitigatorCondition::TerpeneAtLeast {
                terpene: "pinene".to_string(),
                concentration: 0.4,
            },
            factor: "pinene-forward component".to_string(),
            strategy: "Pinene keeps the head clear against body heaviness".to_string(),
        },
        MitigatorRule {
            risk: RiskKind::Sedation,
            condition: MitigatorCondition::TerpeneAtLeast {
                terpene: "limonene".to_string(),
                concentration: 0.5,
            },
            factor: "limonene-forward component".to_string(),
            strategy: "Limonene lift counterweights the heavier body effect".to_string(),
        },
    ]
}

impl Default for EngineTables {
    fn default() -> Self {
        let terpenes = TERPENE_SEEDS
            .iter()
            .map(|seed| {
                (
                    seed.name.to_string(),
                    TerpeneWeights {
                        effects: EffectVector::from_values(seed.effects),
                        anxiety: seed.anxiety,
                    },
                )
            })
            .collect();

        let interactions = INTERACTION_SEEDS
            .iter()
            .map(|seed| InteractionRule {
                terpenes: [seed.a.to_string(), seed.b.to_string()],
                kind: seed.kind,
                magnitude: seed.magnitude,
                effect: seed.effect.to_string(),
            })
            .collect();

        Self {
            terpenes,
            cannabinoids: CannabinoidModifiers::default(),
            interactions,
            mitigators: default_mitigators(),
            potency: PotencyLimits::default(),
            sedation_threshold: 0.75,
        }
    }
}

impl EngineTables {
    pub fn from_toml_str(raw: &str) -> Result<Self, ApplicationError> {
        let tables: Self =
            toml::from_str(raw).map_err(|error| ApplicationError::Tables(error.to_string()))?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = fs::read_to_string(path).map_err(|error| {
            ApplicationError::Tables(format!("could not read `{}`: {error}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, weights) in &self.terpenes {
            let usable = weights
                .effects
                .values()
                .iter()
                .all(|value| value.is_finite() && *value >= 0.0);
            if !usable || !weights.anxiety.is_finite() {
                return Err(DomainError::InvalidTable(format!(
                    "terpene `{name}` needs finite, non-negative effect weights"
                )));
            }
        }

        let modifiers = &self.cannabinoids;
        let scalars = [
            modifiers.thc_intensity,
            modifiers.thc_anxiety,
            modifiers.cbd_anxiety,
            modifiers.saturation_gain,
        ];
        let vectors_ok = modifiers
            .thc_effects
            .values()
            .iter()
            .chain(modifiers.cbd_effects.values().iter())
            .all(|value| value.is_finite() && *value >= 0.0);
        if !vectors_ok || scalars.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return Err(DomainError::InvalidTable(
                "cannabinoid modifiers must be finite and non-negative".to_string(),
            ));
        }
        if modifiers.saturation_gain <= 0.0 {
            return Err(DomainError::InvalidTable(
                "cannabinoids.saturation_gain must be greater than zero".to_string(),
            ));
        }

        for rule in &self.interactions {
            if rule.terpenes.iter().any(|terpene| terpene.trim().is_empty()) {
                return Err(DomainError::InvalidTable(
                    "interaction rules need two named terpenes".to_string(),
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.sedation_threshold) {
            return Err(DomainError::InvalidTable(
                "sedation_threshold must be in range 0..=1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn terpene(&self, name: &str) -> Option<&TerpeneWeights> {
        let key = normalize_terpene(name);
        self.terpenes.get(&key).or_else(|| {
            self.terpenes
                .iter()
                .find(|(candidate, _)| normalize_terpene(candidate) == key)
                .map(|(_, weights)| weights)
        })
    }

    /// Interaction for an unordered terpene pair, first table match wins.
    pub fn interaction(&self, a: &str, b: &str) -> Option<&InteractionRule> {
        let (a, b) = (normalize_terpene(a), normalize_terpene(b));
        self.interactions.iter().find(|rule| rule.matches(&a, &b))
    }

    pub fn mitigators_for(&self, risk: RiskKind) -> impl Iterator<Item = &MitigatorRule> {
        self.mitigators.iter().filter(move |rule| rule.risk == risk)
    }

    /// First mitigator of `risk` that the chemotype satisfies.
    pub fn mitigator_of(&self, risk: RiskKind, chemotype: &Chemotype) -> Option<&MitigatorRule> {
        self.mitigators_for(risk).find(|rule| rule.condition.holds_for(chemotype))
    }

    pub fn known_terpenes(&self) -> Vec<String> {
        self.terpenes.keys().map(|name| normalize_terpene(name)).collect()
    }
}
