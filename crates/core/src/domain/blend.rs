//! Candidate blends and their evaluations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::chemotype::{Cannabinoids, ChemotypeId};
use super::effect::EffectVector;
use crate::errors::DomainError;

/// Allowed drift of a blend's ratio sum away from exactly 1.
pub const RATIO_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlendComponent {
    pub chemotype_id: ChemotypeId,
    pub name: String,
    pub ratio: f64,
}

/// A weighted set of chemotypes. Construction rejects ratio sets that are
/// negative, out of range, or do not sum to 1.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CandidateBlend {
    components: Vec<BlendComponent>,
}

impl CandidateBlend {
    pub fn new(components: Vec<BlendComponent>) -> Result<Self, DomainError> {
        if components.is_empty() {
            return Err(DomainError::InvariantViolation(
                "a blend must reference at least one chemotype".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for component in &components {
            if !seen.insert(component.chemotype_id.clone()) {
                return Err(DomainError::InvariantViolation(format!(
                    "chemotype `{}` appears twice in one blend",
                    component.chemotype_id
                )));
            }
        }

        let sum: f64 = components.iter().map(|component| component.ratio).sum();
        let ratios_in_range = components
            .iter()
            .all(|component| component.ratio.is_finite() && (0.0..=1.0).contains(&component.ratio));
        if !ratios_in_range || (sum - 1.0).abs() > RATIO_EPSILON {
            return Err(DomainError::InvalidRatios { sum });
        }

        Ok(Self { components })
    }

    pub fn components(&self) -> &[BlendComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn ratio_sum(&self) -> f64 {
        self.components.iter().map(|component| component.ratio).sum()
    }

    pub fn ratio_of(&self, id: &ChemotypeId) -> Option<f64> {
        self.components
            .iter()
            .find(|component| &component.chemotype_id == id)
            .map(|component| component.ratio)
    }

    pub fn contains(&self, id: &ChemotypeId) -> bool {
        self.ratio_of(id).is_some()
    }

    /// Component with the largest share; ties go to the lower id.
    pub fn dominant(&self) -> Option<&BlendComponent> {
        self.components.iter().max_by(|a, b| {
            a.ratio.total_cmp(&b.ratio).then_with(|| b.chemotype_id.cmp(&a.chemotype_id))
        })
    }

    /// Comma-joined ids, used as the final ranking tiebreak.
    pub fn signature(&self) -> String {
        self.components
            .iter()
            .map(|component| component.chemotype_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Ratio-weighted chemical and effect profile of a blend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateProfile {
    pub cannabinoids: Cannabinoids,
    pub terpenes: BTreeMap<String, f64>,
    pub effects: EffectVector,
    pub anxiety_risk: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Synergy,
    Antagonism,
    Neutral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Bucket a relative overshoot (0.1 = 10% above the limit).
    pub fn from_overshoot(overshoot: f64) -> Self {
        if overshoot < 0.15 {
            Self::Low
        } else if overshoot < 0.40 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    Anxiety,
    Potency,
    Sedation,
}

impl RiskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Anxiety => "anxiety",
            Self::Potency => "potency",
            Self::Sedation => "sedation",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DominantContributor {
    pub terpene: String,
    pub contribution: f64,
    pub percent_share: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Interaction {
    pub terpenes: [String; 2],
    pub chemotypes: [ChemotypeId; 2],
    pub kind: InteractionKind,
    pub magnitude: Magnitude,
    pub effect: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskIncurred {
    pub kind: RiskKind,
    pub reason: String,
    pub severity: Severity,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskManaged {
    pub kind: RiskKind,
    pub mitigating_factor: String,
    pub severity: Severity,
    pub strategy: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlendEvaluation {
    pub aggregate: AggregateProfile,
    /// Raw aggregate-to-target similarity in [0, 1].
    pub similarity: f64,
    pub blend_score: f64,
    pub confidence: f64,
    pub data_completeness: f64,
    pub dominant_contributors: Vec<DominantContributor>,
    pub interactions: Vec<Interaction>,
    pub risks_incurred: Vec<RiskIncurred>,
    pub risks_managed: Vec<RiskManaged>,
}

#[cfg(test)]
mod tests {
    use super::{BlendComponent, CandidateBlend, Severity};
    use crate::domain::chemotype::ChemotypeId;
    use crate::errors::DomainError;

    fn component(id: &str, ratio: f64) -> BlendComponent {
        BlendComponent { chemotype_id: ChemotypeId::new(id), name: id.to_uppercase(), ratio }
    }

    #[test]
    fn accepts_ratios_that_sum_to_one() {
        let blend = CandidateBlend::new(vec![component("a", 0.65), component("b", 0.35)]).unwrap();
        assert_eq!(blend.len(), 2);
        assert_eq!(blend.dominant().map(|c| c.chemotype_id.as_str()), Some("a"));
        assert_eq!(blend.signature(), "a,b");
    }

    #[test]
    fn rejects_ratio_sum_drift() {
        let error = CandidateBlend::new(vec![component("a", 0.6), component("b", 0.3)]).unwrap_err();
        assert!(matches!(error, DomainError::InvalidRatios { .. }));
    }

    #[test]
    fn rejects_negative_ratio_even_when_sum_is_one() {
        let error =
            CandidateBlend::new(vec![component("a", 1.2), component("b", -0.2)]).unwrap_err();
        assert!(matches!(error, DomainError::InvalidRatios { .. }));
    }

    #[test]
    fn rejects_duplicate_and_empty_blends() {
        assert!(CandidateBlend::new(Vec::new()).is_err());
        assert!(CandidateBlend::new(vec![component("a", 0.5), component("a", 0.5)]).is_err());
    }

    #[test]
    fn severity_buckets_overshoot() {
        assert_eq!(Severity::from_overshoot(0.05), Severity::Low);
        assert_eq!(Severity::from_overshoot(0.2), Severity::Medium);
        assert_eq!(Severity::from_overshoot(0.9), Severity::High);
    }
}
