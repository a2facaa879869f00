//! Blend evaluation: score, confidence, interactions, risks and dominant
//! contributors for every composed blend, then the final ranking.

use std::collections::BTreeSet;

use crate::composer::{ComposedBlend, ScoredChemotype};
use crate::domain::blend::{
    BlendEvaluation, CandidateBlend, DominantContributor, Interaction, RiskIncurred, RiskKind,
    RiskManaged, Severity,
};
use crate::domain::output::{recommendation_order, Recommendation};
use crate::domain::profile::TargetProfile;
use crate::scoring::profile_similarity;
use crate::tables::EngineTables;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatorSettings {
    pub max_blend_size: usize,
    pub simplicity_bonus: f64,
    pub unmitigated_risk_penalty: f64,
    pub confidence_floor: f64,
    pub confidence_margin_points: f64,
    pub dominant_contributors: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BlendEvaluator<'a> {
    tables: &'a EngineTables,
    settings: EvaluatorSettings,
}

#[derive(Debug, Default)]
struct RiskAssessment {
    incurred: Vec<RiskIncurred>,
    managed: Vec<RiskManaged>,
}

impl RiskAssessment {
    fn flag(
        &mut self,
        kind: RiskKind,
        severity: Severity,
        reason: String,
        mitigator: Option<(String, String)>,
    ) {
        match mitigator {
            Some((mitigating_factor, strategy)) => {
                self.managed.push(RiskManaged { kind, mitigating_factor, severity, strategy })
            }
            None => self.incurred.push(RiskIncurred { kind, reason, severity }),
        }
    }
}

/// Relative overshoot of `value` past `limit`, floored at zero.
fn overshoot(value: f64, limit: f64) -> f64 {
    ((value - limit) / limit.max(f64::EPSILON)).max(0.0)
}

impl<'a> BlendEvaluator<'a> {
    pub fn new(tables: &'a EngineTables, settings: EvaluatorSettings) -> Self {
        Self { tables, settings }
    }

    /// Full evaluation of one blend. Confidence assumes an uncontested
    /// result until [`Self::apply_margins`] sees the other candidates.
    pub fn evaluate(&self, candidate: &ComposedBlend<'_>, profile: &TargetProfile) -> BlendEvaluation {
        let aggregate = candidate.aggregate.clone();
        let similarity = profile_similarity(&aggregate.effects, &profile.targets);
        let risks = self.assess_risks(candidate, profile);

        let unused_slots = self.settings.max_blend_size.saturating_sub(candidate.blend.len());
        let raw_score = 100.0 * similarity + self.settings.simplicity_bonus * unused_slots as f64
            - self.settings.unmitigated_risk_penalty * risks.incurred.len() as f64;
        let blend_score = if raw_score.is_finite() { raw_score.clamp(0.0, 100.0) } else { 0.0 };

        let data_completeness = candidate
            .members
            .iter()
            .zip(candidate.blend.components())
            .map(|(member, component)| component.ratio * member.chemotype.data_completeness())
            .sum::<f64>()
            .clamp(0.0, 1.0);

        BlendEvaluation {
            dominant_contributors: self.dominant_contributors(candidate),
            interactions: self.interactions(&candidate.members),
            aggregate,
            similarity,
            blend_score,
            confidence: data_completeness,
            data_completeness,
            risks_incurred: risks.incurred,
            risks_managed: risks.managed,
        }
    }

    /// Scale each confidence by how far its score leads the best other
    /// candidate.
    pub fn apply_margins(&self, evaluations: &mut [BlendEvaluation]) {
        if evaluations.len() < 2 {
            return;
        }

        let mut leader = 0;
        for (index, evaluation) in evaluations.iter().enumerate() {
            if evaluation.blend_score > evaluations[leader].blend_score {
                leader = index;
            }
        }
        let leader_score = evaluations[leader].blend_score;
        let runner_up = evaluations
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != leader)
            .map(|(_, evaluation)| evaluation.blend_score)
            .fold(f64::NEG_INFINITY, f64::max);

        let floor = self.settings.confidence_floor;
        for (index, evaluation) in evaluations.iter_mut().enumerate() {
            let best_other = if index == leader { runner_up } else { leader_score };
            let margin = (evaluation.blend_score - best_other).max(0.0);
            let competitive = (margin / self.settings.confidence_margin_points).min(1.0);
            let term = floor + (1.0 - floor) * competitive;
            evaluation.confidence = (evaluation.data_completeness * term).clamp(0.0, 1.0);
        }
    }

    fn assess_risks(&self, candidate: &ComposedBlend<'_>, profile: &TargetProfile) -> RiskAssessment {
        let mut risks = RiskAssessment::default();
        let aggregate = &candidate.aggregate;
        let members = &candidate.members;

        let anxiety_limit = profile.constraints.max_anxiety_risk;
        if aggregate.anxiety_risk > anxiety_limit {
            risks.flag(
                RiskKind::Anxiety,
                Severity::from_overshoot(overshoot(aggregate.anxiety_risk, anxiety_limit)),
                format!(
                    "Projected anxiety risk {:.2} is above the {:.2} limit for this intent",
                    aggregate.anxiety_risk, anxiety_limit
                ),
                self.mitigator(RiskKind::Anxiety, members),
            );
        } else if let Some(riskiest) = members
            .iter()
            .filter(|member| member.score.derived.anxiety_risk > anxiety_limit)
            .max_by(|a, b| a.score.derived.anxiety_risk.total_cmp(&b.score.derived.anxiety_risk))
        {
            let share = candidate.blend.ratio_of(&riskiest.chemotype.id).unwrap_or(0.0);
            risks.managed.push(RiskManaged {
                kind: RiskKind::Anxiety,
                mitigating_factor: "ratio dilution".to_string(),
                severity: Severity::from_overshoot(overshoot(
                    riskiest.score.derived.anxiety_risk,
                    anxiety_limit,
                )),
                strategy: format!(
                    "{} is held to {:.0}% of the blend so combined anxiety risk stays at {:.2}",
                    riskiest.chemotype.name,
                    share * 100.0,
                    aggregate.anxiety_risk
                ),
            });
        }

        let potency_limit =
            self.tables.potency.limit_for(profile.context.tolerance, profile.context.experience);
        let blended_thc = aggregate.cannabinoids.thc_or_zero();
        if blended_thc > potency_limit {
            risks.flag(
                RiskKind::Potency,
                Severity::from_overshoot(overshoot(blended_thc, potency_limit)),
                format!(
                    "Blended THC {blended_thc:.1}% is above the {potency_limit:.1}% comfort limit"
                ),
                self.mitigator(RiskKind::Potency, members),
            );
        }

        let sedation_applies =
            profile.context.time_of_day.is_daytime() || profile.targets.energy >= 0.6;
        let heaviness = aggregate.effects.relaxation.max(aggregate.effects.body);
        let threshold = self.tables.sedation_threshold;
        if sedation_applies && heaviness >= threshold {
            risks.flag(
                RiskKind::Sedation,
                Severity::from_overshoot(overshoot(heaviness, threshold)),
                format!(
                    "Body and relaxation effects reach {heaviness:.2}, likely sedating for an active intent"
                ),
                self.mitigator(RiskKind::Sedation, members),
            );
        }

        risks
    }

    /// First member satisfying a mitigator rule, as (factor, strategy).
    fn mitigator(&self, risk: RiskKind, members: &[ScoredChemotype<'_>]) -> Option<(String, String)> {
        members.iter().find_map(|member| {
            self.tables.mitigator_of(risk, member.chemotype).map(|rule| {
                (format!("{} ({})", rule.factor, member.chemotype.name), rule.strategy.clone())
            })
        })
    }

    /// Table interactions between terpenes present in two different members,
    /// one entry per terpene pair.
    fn interactions(&self, members: &[ScoredChemotype<'_>]) -> Vec<Interaction> {
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut found = Vec::new();

        for (left_index, left) in members.iter().enumerate() {
            for right in &members[left_index + 1..] {
                let right_terpenes = right.chemotype.present_terpenes();
                for a in left.chemotype.present_terpenes() {
                    for b in &right_terpenes {
                        let key =
                            if a.as_str() <= b.as_str() { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };
                        if seen.contains(&key) {
                            continue;
                        }
                        if let Some(rule) = self.tables.interaction(&a, b) {
                            seen.insert(key);
                            found.push(Interaction {
                                terpenes: [a.clone(), b.clone()],
                                chemotypes: [left.chemotype.id.clone(), right.chemotype.id.clone()],
                                kind: rule.kind,
                                magnitude: rule.magnitude,
                                effect: rule.effect.clone(),
                            });
                        }
                    }
                }
            }
        }

        found
    }

    fn dominant_contributors(&self, candidate: &ComposedBlend<'_>) -> Vec<DominantContributor> {
        let mut contributions: Vec<(String, f64)> = candidate
            .aggregate
            .terpenes
            .iter()
            .filter_map(|(name, concentration)| {
                let weights = self.tables.terpene(name)?;
                let contribution = concentration * weights.effects.total();
                (contribution > 0.0).then(|| (name.clone(), contribution))
            })
            .collect();

        let total: f64 = contributions.iter().map(|(_, contribution)| contribution).sum();
        if total <= 0.0 {
            return Vec::new();
        }

        contributions.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        contributions
            .into_iter()
            .take(self.settings.dominant_contributors)
            .map(|(terpene, contribution)| DominantContributor {
                terpene,
                contribution,
                percent_share: contribution / total * 100.0,
            })
            .collect()
    }
}

/// Orders evaluated blends and keeps the top `limit`, ranked from 1.
pub fn rank(mut evaluated: Vec<(CandidateBlend, BlendEvaluation)>, limit: usize) -> Vec<Recommendation> {
    evaluated.sort_by(|(a_blend, a_eval), (b_blend, b_eval)| {
        recommendation_order(a_blend, a_eval, b_blend, b_eval)
    });
    evaluated
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(index, (blend, evaluation))| Recommendation { rank: index + 1, blend, evaluation })
        .collect()
}
