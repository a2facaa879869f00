//! Blend composition: bounded combination search plus a ratio solver.
//!
//! Candidates are the top-M chemotypes by individual score, combined into
//! every subset of size 1..=K. For each subset the solver walks a grid of
//! positive ratios (multiples of 1/steps) and keeps the feasible point whose
//! aggregate effect vector lies closest to the target.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::domain::blend::{AggregateProfile, BlendComponent, CandidateBlend, RiskKind};
use crate::domain::chemotype::{sanitize_amount, Cannabinoids, Chemotype};
use crate::domain::effect::EffectVector;
use crate::domain::profile::TargetProfile;
use crate::errors::DomainError;
use crate::scoring::{ChemotypeScore, DerivedEffects};
use crate::tables::EngineTables;

const DISTANCE_TIE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposerSettings {
    pub max_blend_size: usize,
    pub prefilter_top_m: usize,
    pub ratio_steps: usize,
    pub mitigation_margin: f64,
}

/// One available chemotype with its precomputed individual score.
#[derive(Debug, Clone, Copy)]
pub struct ScoredChemotype<'a> {
    pub chemotype: &'a Chemotype,
    pub score: &'a ChemotypeScore,
}

impl ScoredChemotype<'_> {
    fn derived(&self) -> &DerivedEffects {
        &self.score.derived
    }
}

/// A combination that survived the hard constraints, with solved ratios.
#[derive(Debug, Clone)]
pub struct ComposedBlend<'a> {
    pub members: Vec<ScoredChemotype<'a>>,
    pub blend: CandidateBlend,
    pub aggregate: AggregateProfile,
    pub distance: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Composition<'a> {
    pub candidates: Vec<ComposedBlend<'a>>,
    pub combinations_evaluated: usize,
    pub chemotypes_considered: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct BlendComposer<'a> {
    tables: &'a EngineTables,
    settings: ComposerSettings,
}

impl<'a> BlendComposer<'a> {
    pub fn new(tables: &'a EngineTables, settings: ComposerSettings) -> Self {
        Self { tables, settings }
    }

    pub fn compose<'c>(
        &self,
        scored: &[ScoredChemotype<'c>],
        profile: &TargetProfile,
    ) -> Result<Composition<'c>, DomainError> {
        let pool = prefilter(scored, self.settings.prefilter_top_m);
        let max_size = self.settings.max_blend_size.min(pool.len());
        let mut composition = Composition { chemotypes_considered: pool.len(), ..Composition::default() };

        for size in 1..=max_size {
            for indices in combinations(pool.len(), size) {
                composition.combinations_evaluated += 1;
                let members: Vec<ScoredChemotype<'c>> = indices.iter().map(|&i| pool[i]).collect();
                if let Some(solved) = self.solve(&members, profile) {
                    let blend = build_blend(&members, &solved.ratios)?;
                    let aggregate = aggregate_profile(&members, &solved.ratios);
                    composition.candidates.push(ComposedBlend {
                        members,
                        blend,
                        aggregate,
                        distance: solved.distance,
                    });
                }
            }
        }

        Ok(composition)
    }

    /// Best feasible ratio point for one combination, `None` when every grid
    /// point breaks a hard constraint.
    pub fn solve(
        &self,
        members: &[ScoredChemotype<'_>],
        profile: &TargetProfile,
    ) -> Option<SolvedRatios> {
        let steps = self.settings.ratio_steps;
        let mitigated = members.iter().any(|member| {
            self.tables.mitigator_of(RiskKind::Anxiety, member.chemotype).is_some()
        });
        let risk_ceiling = if mitigated {
            profile.constraints.max_anxiety_risk + self.settings.mitigation_margin
        } else {
            profile.constraints.max_anxiety_risk
        };
        let thc_ceiling = profile.constraints.max_thc_percent;

        let mut best: Option<SolvedRatios> = None;
        for parts in compositions(steps, members.len()) {
            let ratios: Vec<f64> = parts.iter().map(|&part| part as f64 / steps as f64).collect();

            let risk: f64 = members
                .iter()
                .zip(&ratios)
                .map(|(member, ratio)| ratio * member.derived().anxiety_risk)
                .sum();
            if risk > risk_ceiling + DISTANCE_TIE_EPSILON {
                continue;
            }
            if let Some(limit) = thc_ceiling {
                let thc: f64 = members
                    .iter()
                    .zip(&ratios)
                    .map(|(member, ratio)| {
                        ratio * sanitize_amount(member.chemotype.cannabinoids.thc_or_zero())
                    })
                    .sum();
                if thc > limit + DISTANCE_TIE_EPSILON {
                    continue;
                }
            }

            let effects = mix_effects(members, &ratios);
            let distance = effects.distance(&profile.targets);
            let balance: f64 = ratios.iter().map(|ratio| ratio * ratio).sum();
            let candidate = SolvedRatios { ratios, distance, balance };

            let better = match &best {
                None => true,
                Some(current) => candidate.cmp_quality(current) == Ordering::Less,
            };
            if better {
                best = Some(candidate);
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedRatios {
    pub ratios: Vec<f64>,
    pub distance: f64,
    /// Sum of squared ratios; lower means a more even mix.
    pub balance: f64,
}

impl SolvedRatios {
    /// Closer first, then more balanced. Grid order settles the rest, since
    /// only a strictly better point replaces the incumbent.
    fn cmp_quality(&self, other: &Self) -> Ordering {
        if (self.distance - other.distance).abs() > DISTANCE_TIE_EPSILON {
            return self.distance.total_cmp(&other.distance);
        }
        if (self.balance - other.balance).abs() > DISTANCE_TIE_EPSILON {
            return self.balance.total_cmp(&other.balance);
        }
        Ordering::Equal
    }
}

/// Top `top_m` by individual score (ties by id), returned in id order so
/// combinations are enumerated canonically.
pub fn prefilter<'c>(scored: &[ScoredChemotype<'c>], top_m: usize) -> Vec<ScoredChemotype<'c>> {
    let mut ranked: Vec<ScoredChemotype<'c>> = scored
        .iter()
        .copied()
        .filter(|entry| entry.chemotype.available)
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .score
            .total_cmp(&a.score.score)
            .then_with(|| a.chemotype.id.cmp(&b.chemotype.id))
    });
    ranked.truncate(top_m);
    ranked.sort_by(|a, b| a.chemotype.id.cmp(&b.chemotype.id));
    ranked
}

/// All `k`-element index subsets of `0..n`, in lexicographic order.
pub fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k == 0 || k > n {
        return out;
    }

    let mut current: Vec<usize> = (0..k).collect();
    loop {
        out.push(current.clone());

        let mut position = k;
        while position > 0 && current[position - 1] == n - k + position - 1 {
            position -= 1;
        }
        if position == 0 {
            return out;
        }
        current[position - 1] += 1;
        for next in position..k {
            current[next] = current[next - 1] + 1;
        }
    }
}

/// Every way to write `total` as `parts` positive integers, in lexicographic
/// order.
pub fn compositions(total: usize, parts: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if parts == 0 || total < parts {
        return out;
    }
    let mut prefix = Vec::with_capacity(parts);
    extend_compositions(total, parts, &mut prefix, &mut out);
    out
}

fn extend_compositions(
    remaining: usize,
    parts: usize,
    prefix: &mut Vec<usize>,
    out: &mut Vec<Vec<usize>>,
) {
    if parts == 1 {
        prefix.push(remaining);
        out.push(prefix.clone());
        prefix.pop();
        return;
    }
    for first in 1..=(remaining - (parts - 1)) {
        prefix.push(first);
        extend_compositions(remaining - first, parts - 1, prefix, out);
        prefix.pop();
    }
}

fn mix_effects(members: &[ScoredChemotype<'_>], ratios: &[f64]) -> EffectVector {
    members
        .iter()
        .zip(ratios)
        .fold(EffectVector::default(), |acc, (member, ratio)| {
            acc.added(&member.derived().effects.scaled(*ratio))
        })
}

fn build_blend(
    members: &[ScoredChemotype<'_>],
    ratios: &[f64],
) -> Result<CandidateBlend, DomainError> {
    let components = members
        .iter()
        .zip(ratios)
        .map(|(member, ratio)| BlendComponent {
            chemotype_id: member.chemotype.id.clone(),
            name: member.chemotype.name.clone(),
            ratio: *ratio,
        })
        .collect();
    CandidateBlend::new(components)
}

/// Ratio-weighted chemistry and effects of a mix. A cannabinoid stays
/// unreported only when no member reported it.
pub fn aggregate_profile(members: &[ScoredChemotype<'_>], ratios: &[f64]) -> AggregateProfile {
    let weighted = |pick: fn(&Cannabinoids) -> Option<f64>| -> Option<f64> {
        let reported = members.iter().any(|member| pick(&member.chemotype.cannabinoids).is_some());
        reported.then(|| {
            members
                .iter()
                .zip(ratios)
                .map(|(member, ratio)| {
                    ratio * sanitize_amount(pick(&member.chemotype.cannabinoids).unwrap_or(0.0))
                })
                .sum()
        })
    };
    let cannabinoids = Cannabinoids {
        thc: weighted(|c| c.thc),
        cbd: weighted(|c| c.cbd),
        cbg: weighted(|c| c.cbg),
        cbn: weighted(|c| c.cbn),
    };

    let mut terpenes: BTreeMap<String, f64> = BTreeMap::new();
    for (member, ratio) in members.iter().zip(ratios) {
        for name in member.chemotype.present_terpenes() {
            let concentration = member.chemotype.terpene(&name);
            *terpenes.entry(name).or_insert(0.0) += ratio * concentration;
        }
    }

    let anxiety_risk = members
        .iter()
        .zip(ratios)
        .map(|(member, ratio)| ratio * member.derived().anxiety_risk)
        .sum::<f64>()
        .clamp(0.0, 1.0);

    AggregateProfile {
        cannabinoids,
        terpenes,
        effects: mix_effects(members, ratios).clamped_unit(),
        anxiety_risk,
    }
}

#[cfg(test)]
mod tests {
    use super::{combinations, compositions, prefilter, BlendComposer, ComposerSettings, ScoredChemotype};
    use crate::domain::chemotype::Chemotype;
    use crate::intent::{Intent, IntentInterpreter};
    use crate::scoring::{ChemotypeScore, ChemotypeScorer};
    use crate::tables::EngineTables;

    fn settings() -> ComposerSettings {
        ComposerSettings {
            max_blend_size: 3,
            prefilter_top_m: 12,
            ratio_steps: 20,
            mitigation_margin: 0.2,
        }
    }

    fn score_all(
        tables: &EngineTables,
        chemotypes: &[Chemotype],
        intent: &str,
    ) -> (crate::domain::profile::TargetProfile, Vec<ChemotypeScore>) {
        let profile = IntentInterpreter::new().interpret(&Intent::new(intent));
        let scorer = ChemotypeScorer::new(tables, 0.6);
        let scores = chemotypes.iter().map(|chemotype| scorer.score(chemotype, &profile)).collect();
        (profile, scores)
    }

    fn pair<'a>(chemotypes: &'a [Chemotype], scores: &'a [ChemotypeScore]) -> Vec<ScoredChemotype<'a>> {
        chemotypes
            .iter()
            .zip(scores)
            .map(|(chemotype, score)| ScoredChemotype { chemotype, score })
            .collect()
    }

    #[test]
    fn combinations_are_lexicographic_and_complete() {
        assert_eq!(
            combinations(4, 2),
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        assert_eq!(combinations(12, 3).len(), 220);
        assert!(combinations(2, 3).is_empty());
    }

    #[test]
    fn compositions_are_positive_and_sum_to_total() {
        let grid = compositions(20, 3);
        assert_eq!(grid.len(), 171);
        assert!(grid.iter().all(|parts| parts.iter().sum::<usize>() == 20));
        assert!(grid.iter().all(|parts| parts.iter().all(|&part| part >= 1)));
        assert_eq!(grid.first(), Some(&vec![1, 1, 18]));
        assert_eq!(compositions(20, 1), vec![vec![20]]);
    }

    #[test]
    fn prefilter_keeps_best_and_returns_id_order() {
        let tables = EngineTables::default();
        let chemotypes = vec![
            Chemotype::new("c-sleepy", "Sleepy").with_thc(20.0).with_terpene("myrcene", 1.2),
            Chemotype::new("a-focus", "Focus").with_thc(8.0).with_terpene("pinene", 1.0),
            Chemotype::new("b-citrus", "Citrus").with_thc(9.0).with_terpene("limonene", 1.0),
        ];
        let (_, scores) = score_all(&tables, &chemotypes, "focus");
        let scored = pair(&chemotypes, &scores);

        let kept = prefilter(&scored, 2);
        let ids: Vec<&str> = kept.iter().map(|entry| entry.chemotype.id.as_str()).collect();
        assert_eq!(ids, vec!["a-focus", "b-citrus"]);
    }

    #[test]
    fn prefilter_drops_unavailable_chemotypes() {
        let tables = EngineTables::default();
        let chemotypes = vec![
            Chemotype::new("a", "A").with_thc(8.0).with_terpene("pinene", 1.0).unavailable(),
            Chemotype::new("b", "B").with_thc(9.0).with_terpene("limonene", 1.0),
        ];
        let (_, scores) = score_all(&tables, &chemotypes, "focus");
        let kept = prefilter(&pair(&chemotypes, &scores), 12);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chemotype.id.as_str(), "b");
    }

    #[test]
    fn composed_ratios_sum_to_one_and_respect_risk_ceiling() {
        let tables = EngineTables::default();
        let chemotypes = vec![
            Chemotype::new("citrus-focus", "Citrus Focus")
                .with_thc(8.0)
                .with_cbd(0.5)
                .with_terpene("limonene", 1.2)
                .with_terpene("pinene", 0.9)
                .with_terpene("caryophyllene", 0.3),
            Chemotype::new("couch-lock", "Couch Lock")
                .with_thc(26.0)
                .with_cbd(0.1)
                .with_terpene("myrcene", 1.5)
                .with_terpene("caryophyllene", 0.4),
        ];
        let (profile, scores) =
            score_all(&tables, &chemotypes, "focus work ignore distractions clear mind no anxiety");
        let composer = BlendComposer::new(&tables, settings());
        let composition = composer.compose(&pair(&chemotypes, &scores), &profile).unwrap();

        assert_eq!(composition.combinations_evaluated, 3);
        assert!(!composition.candidates.is_empty());
        for candidate in &composition.candidates {
            assert!((candidate.blend.ratio_sum() - 1.0).abs() < 1e-9);
            assert!(candidate.aggregate.anxiety_risk <= profile.constraints.max_anxiety_risk + 1e-9);
        }
        assert!(
            composition
                .candidates
                .iter()
                .all(|candidate| candidate.blend.signature() != "couch-lock"),
            "the high-risk singleton has no feasible ratio"
        );
    }

    #[test]
    fn thc_ceiling_bounds_every_composed_candidate() {
        let tables = EngineTables::default();
        let chemotypes = vec![
            Chemotype::new("acdc", "ACDC").with_thc(1.0).with_cbd(16.0).with_terpene("myrcene", 0.4),
            Chemotype::new("sour", "Sour").with_thc(24.0).with_cbd(0.1).with_terpene("limonene", 0.9),
        ];
        let (mut profile, scores) = score_all(&tables, &chemotypes, "something mild");
        assert_eq!(profile.constraints.max_thc_percent, Some(12.0));
        profile.constraints.max_anxiety_risk = 1.0;

        let composer = BlendComposer::new(&tables, settings());
        let composition = composer.compose(&pair(&chemotypes, &scores), &profile).unwrap();

        assert!(!composition.candidates.is_empty());
        for candidate in &composition.candidates {
            let thc = candidate.aggregate.cannabinoids.thc.unwrap_or(0.0);
            assert!(thc <= 12.0 + 1e-9, "{} blends to {thc}% THC", candidate.blend.signature());
        }
        assert!(
            composition.candidates.iter().all(|candidate| candidate.blend.signature() != "sour"),
            "the potent singleton has no ratio under the ceiling"
        );
    }

    #[test]
    fn cbd_mitigator_widens_the_feasible_region() {
        let tables = EngineTables::default();
        let chemotypes = vec![
            Chemotype::new("acdc", "ACDC").with_thc(1.0).with_cbd(16.0).with_terpene("myrcene", 0.4),
            Chemotype::new("sour", "Sour").with_thc(24.0).with_cbd(0.1).with_terpene("limonene", 0.9),
        ];
        let (mut profile, scores) = score_all(&tables, &chemotypes, "happy");
        profile.constraints.max_anxiety_risk = 0.3;

        let composer = BlendComposer::new(&tables, settings());
        let members = pair(&chemotypes, &scores);
        let solved = composer.solve(&members, &profile).unwrap();

        let risk: f64 = members
            .iter()
            .zip(&solved.ratios)
            .map(|(member, ratio)| ratio * member.score.derived.anxiety_risk)
            .sum();
        assert!(risk <= 0.5 + 1e-9);
        assert!(solved.ratios.iter().all(|ratio| *ratio > 0.0));
    }
}
