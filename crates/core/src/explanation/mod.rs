//! Explanation payloads for downstream narration.
//!
//! Every number a narrator may quote is computed and formatted here. The
//! narration collaborator only phrases these fields; [`NarrationGuard`]
//! rejects prose that quotes numbers or names terpenes the payload does not
//! carry.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::warn;

use crate::domain::blend::{InteractionKind, Magnitude, RiskKind, Severity};
use crate::domain::output::{BlendOutput, EngineOutput, PhaseKind, Recommendation};
use crate::intent::normalize_text;
use crate::tags::{DisplayTag, TagResolver};

pub const NARRATION_CONTRACT: &str = "Phrase only the fields in this payload. \
Quote numbers exactly as formatted here and never derive new ones. \
Do not name terpenes, cannabinoids or effects the payload does not list. \
Do not add, drop or soften any interaction or risk claim. \
Treat an error entry as the whole answer.";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExplanationPayload {
    pub contract: String,
    /// `blend` or `stack`.
    pub mode: String,
    pub sections: Vec<SectionExplanation>,
}

/// One flat result, or one phase of a stack.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionExplanation {
    pub phase: Option<PhaseKind>,
    pub intent_text: Option<String>,
    pub error: Option<ErrorExplanation>,
    pub candidates_evaluated: usize,
    pub recommendations: Vec<BlendExplanation>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorExplanation {
    pub code: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlendExplanation {
    pub rank: usize,
    pub score: String,
    pub confidence: String,
    pub components: Vec<ComponentLine>,
    pub effects: Vec<EffectLine>,
    pub thc_percent: Option<String>,
    pub cbd_percent: Option<String>,
    pub terpenes: Vec<String>,
    pub dominant_contributors: Vec<ContributorLine>,
    pub interactions: Vec<InteractionLine>,
    pub risks_incurred: Vec<RiskLine>,
    pub risks_managed: Vec<ManagedRiskLine>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComponentLine {
    pub chemotype_id: String,
    pub display_name: String,
    pub tags: Vec<String>,
    pub share: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EffectLine {
    pub dimension: String,
    pub level: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContributorLine {
    pub terpene: String,
    pub share: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InteractionLine {
    pub terpenes: [String; 2],
    pub kind: InteractionKind,
    pub magnitude: Magnitude,
    pub effect: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiskLine {
    pub kind: RiskKind,
    pub severity: Severity,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ManagedRiskLine {
    pub kind: RiskKind,
    pub severity: Severity,
    pub mitigating_factor: String,
    pub strategy: String,
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

pub struct ExplanationBuilder<'a> {
    resolver: &'a dyn TagResolver,
}

impl<'a> ExplanationBuilder<'a> {
    pub fn new(resolver: &'a dyn TagResolver) -> Self {
        Self { resolver }
    }

    pub fn build(&self, output: &EngineOutput) -> ExplanationPayload {
        let (mode, sections) = match output {
            EngineOutput::Blend(blend) => ("blend", vec![self.section(None, None, blend)]),
            EngineOutput::Stack(stack) => (
                "stack",
                stack
                    .phases()
                    .iter()
                    .map(|phase| {
                        self.section(Some(phase.phase), Some(phase.intent_text.clone()), &phase.output)
                    })
                    .collect(),
            ),
        };

        ExplanationPayload {
            contract: NARRATION_CONTRACT.to_string(),
            mode: mode.to_string(),
            sections,
        }
    }

    fn section(
        &self,
        phase: Option<PhaseKind>,
        intent_text: Option<String>,
        output: &BlendOutput,
    ) -> SectionExplanation {
        SectionExplanation {
            phase,
            intent_text,
            error: output.error().map(|code| ErrorExplanation {
                code: code.as_str().to_string(),
                message: code.message().to_string(),
            }),
            candidates_evaluated: output.audit().candidates_evaluated,
            recommendations: output
                .recommendations()
                .iter()
                .map(|recommendation| self.blend(recommendation))
                .collect(),
        }
    }

    fn blend(&self, recommendation: &Recommendation) -> BlendExplanation {
        let evaluation = &recommendation.evaluation;
        let aggregate = &evaluation.aggregate;

        let components = recommendation
            .blend
            .components()
            .iter()
            .map(|component| {
                let tag = self.resolver.resolve(&component.chemotype_id).unwrap_or_else(|| {
                    DisplayTag { display_name: component.name.clone(), tags: Vec::new() }
                });
                ComponentLine {
                    chemotype_id: component.chemotype_id.to_string(),
                    display_name: tag.display_name,
                    tags: tag.tags,
                    share: percent(component.ratio),
                }
            })
            .collect();

        BlendExplanation {
            rank: recommendation.rank,
            score: format!("{:.1}", evaluation.blend_score),
            confidence: percent(evaluation.confidence),
            components,
            effects: aggregate
                .effects
                .iter()
                .map(|(dimension, level)| EffectLine {
                    dimension: dimension.as_str().to_string(),
                    level: format!("{level:.2}"),
                })
                .collect(),
            thc_percent: aggregate.cannabinoids.thc.map(|value| format!("{value:.1}%")),
            cbd_percent: aggregate.cannabinoids.cbd.map(|value| format!("{value:.1}%")),
            terpenes: aggregate.terpenes.keys().cloned().collect(),
            dominant_contributors: evaluation
                .dominant_contributors
                .iter()
                .map(|entry| ContributorLine {
                    terpene: entry.terpene.clone(),
                    share: format!("{:.0}%", entry.percent_share),
                })
                .collect(),
            interactions: evaluation
                .interactions
                .iter()
                .map(|interaction| InteractionLine {
                    terpenes: interaction.terpenes.clone(),
                    kind: interaction.kind,
                    magnitude: interaction.magnitude,
                    effect: interaction.effect.clone(),
                })
                .collect(),
            risks_incurred: evaluation
                .risks_incurred
                .iter()
                .map(|risk| RiskLine { kind: risk.kind, severity: risk.severity, reason: risk.reason.clone() })
                .collect(),
            risks_managed: evaluation
                .risks_managed
                .iter()
                .map(|risk| ManagedRiskLine {
                    kind: risk.kind,
                    severity: risk.severity,
                    mitigating_factor: risk.mitigating_factor.clone(),
                    strategy: risk.strategy.clone(),
                })
                .collect(),
        }
    }
}

impl ExplanationPayload {
    /// Every numeric token appearing anywhere in the payload.
    pub fn quoted_numbers(&self) -> BTreeSet<String> {
        let mut numbers = BTreeSet::new();
        if let Ok(value) = serde_json::to_value(self) {
            collect_numbers(&value, &mut numbers);
        }
        numbers
    }

    /// Terpene names the payload mentions in any recommendation.
    pub fn terpene_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for blend in self.sections.iter().flat_map(|section| &section.recommendations) {
            names.extend(blend.terpenes.iter().cloned());
            names.extend(blend.dominant_contributors.iter().map(|entry| entry.terpene.clone()));
            for interaction in &blend.interactions {
                names.extend(interaction.terpenes.iter().cloned());
            }
        }
        names
    }
}

fn collect_numbers(value: &serde_json::Value, out: &mut BTreeSet<String>) {
    match value {
        serde_json::Value::String(text) => out.extend(numeric_tokens(text)),
        serde_json::Value::Number(number) => {
            out.insert(number.to_string());
        }
        serde_json::Value::Array(items) => items.iter().for_each(|item| collect_numbers(item, out)),
        serde_json::Value::Object(map) => map.values().for_each(|item| collect_numbers(item, out)),
        serde_json::Value::Bool(_) | serde_json::Value::Null => {}
    }
}

/// Digit runs, with one inner decimal point, e.g. `41`, `0.62`, `12.5`.
pub fn numeric_tokens(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        if !chars[index].is_ascii_digit() {
            index += 1;
            continue;
        }
        let start = index;
        let mut seen_point = false;
        while index < chars.len() {
            let ch = chars[index];
            let inner_point = ch == '.'
                && !seen_point
                && chars.get(index + 1).is_some_and(|next| next.is_ascii_digit());
            if ch.is_ascii_digit() {
                index += 1;
            } else if inner_point {
                seen_point = true;
                index += 1;
            } else {
                break;
            }
        }
        tokens.push(chars[start..index].iter().collect());
    }

    tokens
}

pub trait Narrator {
    fn narrate(&self, payload: &ExplanationPayload) -> String;
}

/// Deterministic narrator that only stitches payload fields together.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl TemplateNarrator {
    fn narrate_section(section: &SectionExplanation) -> String {
        let heading = match (&section.phase, &section.intent_text) {
            (Some(phase), Some(text)) => format!("{} phase ({text}): ", capitalize(phase.as_str())),
            (Some(phase), None) => format!("{} phase: ", capitalize(phase.as_str())),
            _ => String::new(),
        };

        if let Some(error) = &section.error {
            return format!("{heading}{}", error.message);
        }
        let Some(best) = section.recommendations.first() else {
            return format!("{heading}No recommendation is available.");
        };

        let mix = best
            .components
            .iter()
            .map(|component| format!("{} {}", component.share, component.display_name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sentences = vec![format!(
            "{heading}The top blend is {mix}, scoring {} with {} confidence.",
            best.score, best.confidence
        )];

        if !best.dominant_contributors.is_empty() {
            let leaders = best
                .dominant_contributors
                .iter()
                .map(|entry| format!("{} ({})", entry.terpene, entry.share))
                .collect::<Vec<_>>()
                .join(", ");
            sentences.push(format!("Its effect profile is led by {leaders}."));
        }
        for interaction in &best.interactions {
            sentences.push(format!(
                "{} and {} show {} {}: {}.",
                interaction.terpenes[0],
                interaction.terpenes[1],
                magnitude_label(interaction.magnitude),
                kind_label(interaction.kind),
                interaction.effect
            ));
        }
        for risk in &best.risks_managed {
            sentences.push(format!(
                "Managed {} risk via {}: {}.",
                risk.kind.label(),
                risk.mitigating_factor,
                risk.strategy
            ));
        }
        for risk in &best.risks_incurred {
            sentences.push(format!("Watch for {} risk: {}.", risk.kind.label(), risk.reason));
        }

        sentences.join(" ")
    }
}

impl Narrator for TemplateNarrator {
    fn narrate(&self, payload: &ExplanationPayload) -> String {
        payload.sections.iter().map(Self::narrate_section).collect::<Vec<_>>().join("\n")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn kind_label(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Synergy => "synergy",
        InteractionKind::Antagonism => "antagonism",
        InteractionKind::Neutral => "a neutral interaction",
    }
}

fn magnitude_label(magnitude: Magnitude) -> &'static str {
    match magnitude {
        Magnitude::Low => "low",
        Magnitude::Medium => "medium",
        Magnitude::High => "high",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum NarrationDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

impl NarrationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Checks narrated prose against the payload it was produced from.
#[derive(Clone, Debug, Default)]
pub struct NarrationGuard {
    known_terpenes: BTreeSet<String>,
}

impl NarrationGuard {
    /// `known_terpenes` is every terpene name the guard should police,
    /// normally the calibration table's keys.
    pub fn new(known_terpenes: impl IntoIterator<Item = String>) -> Self {
        Self { known_terpenes: known_terpenes.into_iter().map(|name| guard_key(&name)).collect() }
    }

    pub fn review(&self, payload: &ExplanationPayload, prose: &str) -> NarrationDecision {
        let allowed_numbers = payload.quoted_numbers();
        if let Some(number) =
            numeric_tokens(prose).into_iter().find(|number| !allowed_numbers.contains(number))
        {
            warn!(
                event_name = "narration.guard.denied",
                reason_code = "unsupported_number",
                number = %number,
                "narration quoted a number absent from the payload"
            );
            return NarrationDecision::Deny {
                reason_code: "unsupported_number",
                user_message: format!(
                    "The narration quoted `{number}`, which the engine did not compute."
                ),
                fallback_path: "template_narration",
            };
        }

        let padded = format!(" {} ", normalize_text(prose));
        let allowed_terpenes: BTreeSet<String> =
            payload.terpene_names().iter().map(|name| guard_key(name)).collect();
        if let Some(terpene) = self.known_terpenes.iter().find(|terpene| {
            padded.contains(&format!(" {terpene} ")) && !allowed_terpenes.contains(*terpene)
        }) {
            warn!(
                event_name = "narration.guard.denied",
                reason_code = "unsupported_terpene",
                terpene = %terpene,
                "narration named a terpene absent from the payload"
            );
            return NarrationDecision::Deny {
                reason_code: "unsupported_terpene",
                user_message: format!(
                    "The narration mentions {terpene}, which is not part of the recommended blend."
                ),
                fallback_path: "template_narration",
            };
        }

        NarrationDecision::Allow
    }
}

/// Terpene names and prose are compared in the same normalized form.
fn guard_key(name: &str) -> String {
    normalize_text(name)
}

#[cfg(test)]
mod tests {
    use super::{
        numeric_tokens, BlendExplanation, ExplanationBuilder, ExplanationPayload,
        NarrationDecision, NarrationGuard, Narrator, SectionExplanation, TemplateNarrator,
        NARRATION_CONTRACT,
    };
    use crate::engine::RecommendationEngine;
    use crate::fixtures::demo_inventory;
    use crate::intent::Intent;
    use crate::tags::StaticTagTable;

    fn payload_for(text: &str) -> super::ExplanationPayload {
        let engine = RecommendationEngine::default();
        let output = engine.recommend(&Intent::new(text), &demo_inventory()).unwrap();
        let tags = StaticTagTable::demo();
        ExplanationBuilder::new(&tags).build(&output)
    }

    fn guard() -> NarrationGuard {
        NarrationGuard::new(crate::tables::EngineTables::default().known_terpenes())
    }

    #[test]
    fn numeric_tokens_keep_inner_decimal_points() {
        assert_eq!(
            numeric_tokens("scored 73.3, shares 65% and 35%. Done 4."),
            vec!["73.3", "65", "35", "4"]
        );
    }

    #[test]
    fn payload_carries_contract_and_formatted_numbers() {
        let payload = payload_for("creative afternoon");
        assert_eq!(payload.mode, "blend");
        assert!(payload.contract.contains("never derive new ones"));

        let best = &payload.sections[0].recommendations[0];
        assert!(best.score.contains('.'));
        assert!(best.confidence.ends_with('%'));
        assert!(best.components.iter().all(|component| component.share.ends_with('%')));
    }

    #[test]
    fn template_narration_passes_the_guard() {
        for text in ["creative afternoon", "energize me then help me wind down", "sleep"] {
            let payload = payload_for(text);
            let prose = TemplateNarrator.narrate(&payload);
            assert_eq!(guard().review(&payload, &prose), NarrationDecision::Allow, "{prose}");
        }
    }

    #[test]
    fn stack_payload_narrates_both_phases() {
        let payload = payload_for("energize me then help me wind down");
        assert_eq!(payload.mode, "stack");
        let prose = TemplateNarrator.narrate(&payload);
        assert!(prose.contains("Onset phase (energize me)"));
        assert!(prose.contains("Sustain phase (help me wind down)"));
    }

    #[test]
    fn guard_denies_invented_numbers() {
        let payload = payload_for("creative afternoon");
        let decision = guard().review(&payload, "This blend is 98765.4321% perfect.");
        assert!(matches!(
            decision,
            NarrationDecision::Deny { reason_code: "unsupported_number", .. }
        ));
    }

    #[test]
    fn guard_denies_terpenes_outside_the_payload() {
        let payload = payload_for("creative afternoon");
        let names = payload.terpene_names();
        let absent = guard()
            .known_terpenes
            .iter()
            .find(|terpene| !names.contains(*terpene))
            .cloned()
            .unwrap();

        let decision = guard().review(&payload, &format!("Expect plenty of {absent}."));
        assert!(matches!(
            decision,
            NarrationDecision::Deny { reason_code: "unsupported_terpene", .. }
        ));
    }

    #[test]
    fn guard_accepts_hyphenated_terpenes_the_payload_lists() {
        let payload = ExplanationPayload {
            contract: NARRATION_CONTRACT.to_string(),
            mode: "blend".to_string(),
            sections: vec![SectionExplanation {
                phase: None,
                intent_text: None,
                error: None,
                candidates_evaluated: 1,
                recommendations: vec![BlendExplanation {
                    rank: 1,
                    score: "0.8".to_string(),
                    confidence: "70%".to_string(),
                    components: Vec::new(),
                    effects: Vec::new(),
                    thc_percent: None,
                    cbd_percent: None,
                    terpenes: vec!["beta-caryophyllene".to_string()],
                    dominant_contributors: Vec::new(),
                    interactions: Vec::new(),
                    risks_incurred: Vec::new(),
                    risks_managed: Vec::new(),
                }],
            }],
        };
        let guard =
            NarrationGuard::new(["beta-caryophyllene".to_string(), "linalool".to_string()]);

        assert_eq!(
            guard.review(&payload, "Expect a peppery beta-caryophyllene finish."),
            NarrationDecision::Allow
        );
        assert!(matches!(
            guard.review(&payload, "Linalool rounds it out."),
            NarrationDecision::Deny { reason_code: "unsupported_terpene", .. }
        ));
    }
}
