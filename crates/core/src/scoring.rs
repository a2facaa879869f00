//! Per-chemotype scoring against a target profile.

use serde::Serialize;

use crate::domain::chemotype::{sanitize_amount, Chemotype, ChemotypeId};
use crate::domain::effect::EffectVector;
use crate::domain::profile::TargetProfile;
use crate::tables::EngineTables;

/// A chemotype's own position in effect space.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DerivedEffects {
    pub effects: EffectVector,
    pub anxiety_risk: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChemotypeScore {
    pub chemotype_id: ChemotypeId,
    pub derived: DerivedEffects,
    pub similarity: f64,
    /// Similarity after the constraint cap, in [0, 1].
    pub score: f64,
    pub violates_constraints: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChemotypeScorer<'a> {
    tables: &'a EngineTables,
    violation_score_cap: f64,
}

impl<'a> ChemotypeScorer<'a> {
    pub fn new(tables: &'a EngineTables, violation_score_cap: f64) -> Self {
        Self { tables, violation_score_cap }
    }

    /// Concentration-weighted terpene contributions plus cannabinoid effects,
    /// passed through a saturating transform so every value stays below 1.
    /// Terpenes missing from the weight table contribute nothing.
    pub fn derive_effects(&self, chemotype: &Chemotype) -> DerivedEffects {
        let modifiers = &self.tables.cannabinoids;
        let thc = sanitize_amount(chemotype.cannabinoids.thc_or_zero());
        let cbd = sanitize_amount(chemotype.cannabinoids.cbd_or_zero());

        let mut raw = modifiers.thc_effects.scaled(thc).added(&modifiers.cbd_effects.scaled(cbd));
        let mut anxiety = thc * modifiers.thc_anxiety - cbd * modifiers.cbd_anxiety;

        for (name, concentration) in &chemotype.terpenes {
            let concentration = sanitize_amount(*concentration);
            if concentration == 0.0 {
                continue;
            }
            if let Some(weights) = self.tables.terpene(name) {
                raw = raw.added(&weights.effects.scaled(concentration));
                anxiety += concentration * weights.anxiety;
            }
        }

        let intensity = 1.0 + thc * modifiers.thc_intensity;
        let gain = modifiers.saturation_gain;
        let effects = raw.map(|value| 1.0 - (-gain * value * intensity).exp()).clamped_unit();

        DerivedEffects { effects, anxiety_risk: anxiety.clamp(0.0, 1.0) }
    }

    pub fn score(&self, chemotype: &Chemotype, profile: &TargetProfile) -> ChemotypeScore {
        let derived = self.derive_effects(chemotype);
        let similarity = profile_similarity(&derived.effects, &profile.targets);

        let over_risk = derived.anxiety_risk > profile.constraints.max_anxiety_risk;
        let over_thc = profile
            .constraints
            .max_thc_percent
            .map(|limit| chemotype.cannabinoids.thc_or_zero() > limit)
            .unwrap_or(false);
        let violates_constraints = over_risk || over_thc;

        let score =
            if violates_constraints { similarity.min(self.violation_score_cap) } else { similarity };

        ChemotypeScore {
            chemotype_id: chemotype.id.clone(),
            derived,
            similarity,
            score,
            violates_constraints,
        }
    }
}

/// Equal mix of cosine similarity and distance-based closeness, in [0, 1].
pub fn profile_similarity(actual: &EffectVector, target: &EffectVector) -> f64 {
    let actual_norm = actual.norm();
    let target_norm = target.norm();

    let cosine = if actual_norm == 0.0 && target_norm == 0.0 {
        1.0
    } else if actual_norm == 0.0 || target_norm == 0.0 {
        0.0
    } else {
        actual.dot(target) / (actual_norm * target_norm)
    };

    let closeness = if target_norm == 0.0 {
        (1.0 - actual_norm).max(0.0)
    } else {
        (1.0 - actual.distance(target) / target_norm).max(0.0)
    };

    let similarity = 0.5 * cosine.clamp(0.0, 1.0) + 0.5 * closeness;
    if similarity.is_finite() {
        similarity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{profile_similarity, ChemotypeScorer};
    use crate::domain::chemotype::Chemotype;
    use crate::domain::effect::EffectVector;
    use crate::intent::{Intent, IntentInterpreter};
    use crate::tables::EngineTables;

    fn focus_profile() -> crate::domain::profile::TargetProfile {
        IntentInterpreter::new()
            .interpret(&Intent::new("focus work ignore distractions clear mind no anxiety"))
    }

    #[test]
    fn identical_vectors_are_fully_similar() {
        let vector = EffectVector::from_values([0.2, 0.9, 0.5, 0.3, 0.3, 0.2]);
        assert!((profile_similarity(&vector, &vector) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_against_target_scores_low() {
        let target = EffectVector::from_values([0.2, 0.9, 0.5, 0.3, 0.3, 0.2]);
        assert_eq!(profile_similarity(&EffectVector::default(), &target), 0.0);
    }

    #[test]
    fn derived_effects_rise_with_concentration() {
        let tables = EngineTables::default();
        let scorer = ChemotypeScorer::new(&tables, 0.6);
        let light = Chemotype::new("a", "A").with_thc(10.0).with_terpene("pinene", 0.3);
        let heavy = Chemotype::new("b", "B").with_thc(10.0).with_terpene("pinene", 0.9);

        let light = scorer.derive_effects(&light).effects;
        let heavy = scorer.derive_effects(&heavy).effects;
        for ((_, low), (_, high)) in light.iter().zip(heavy.iter()) {
            assert!(high >= low);
        }
        assert!(heavy.focus > light.focus);
        assert!(heavy.values().iter().all(|value| (0.0..1.0).contains(value)));
    }

    #[test]
    fn missing_terpene_data_is_zero_contribution() {
        let tables = EngineTables::default();
        let scorer = ChemotypeScorer::new(&tables, 0.6);
        let bare = Chemotype::new("bare", "Bare");
        let derived = scorer.derive_effects(&bare);

        assert_eq!(derived.effects, EffectVector::default());
        assert_eq!(derived.anxiety_risk, 0.0);
    }

    #[test]
    fn thc_raises_and_cbd_lowers_anxiety_risk() {
        let tables = EngineTables::default();
        let scorer = ChemotypeScorer::new(&tables, 0.6);
        let racy = scorer.derive_effects(&Chemotype::new("r", "R").with_thc(24.0));
        let buffered =
            scorer.derive_effects(&Chemotype::new("b", "B").with_thc(24.0).with_cbd(8.0));

        assert!((racy.anxiety_risk - 0.72).abs() < 1e-9);
        assert!(buffered.anxiety_risk < racy.anxiety_risk);
    }

    #[test]
    fn constraint_violation_caps_score_without_disqualifying() {
        let tables = EngineTables::default();
        let scorer = ChemotypeScorer::new(&tables, 0.6);
        let profile = focus_profile();
        let couch_lock = Chemotype::new("couch-lock", "Couch Lock")
            .with_thc(26.0)
            .with_cbd(0.1)
            .with_terpene("myrcene", 1.5)
            .with_terpene("caryophyllene", 0.4);

        let scored = scorer.score(&couch_lock, &profile);
        assert!(scored.violates_constraints);
        assert!(scored.score <= 0.6);
        assert!(scored.score > 0.0);
    }

    #[test]
    fn max_thc_constraint_counts_as_violation() {
        let tables = EngineTables::default();
        let scorer = ChemotypeScorer::new(&tables, 0.6);
        let mut profile = IntentInterpreter::new().interpret(&Intent::new("mild"));
        profile.constraints.max_anxiety_risk = 1.0;

        let strong = Chemotype::new("s", "S").with_thc(18.0).with_terpene("limonene", 0.8);
        assert!(scorer.score(&strong, &profile).violates_constraints);
    }
}
