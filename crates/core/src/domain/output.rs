//! Engine results. A result is either a flat blend or a multi-phase stack;
//! each shape is checked when it is built so consumers never see a mixed one.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::blend::{BlendEvaluation, CandidateBlend};
use super::profile::TargetProfile;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorCode {
    /// No chemotype in the snapshot is available.
    InsufficientInventory,
    /// Combinations existed but every one violated a hard constraint.
    NoFeasibleBlend,
}

impl EngineErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientInventory => "insufficient_inventory",
            Self::NoFeasibleBlend => "no_feasible_blend",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InsufficientInventory => "No available chemotypes in the supplied inventory.",
            Self::NoFeasibleBlend => {
                "Every candidate blend exceeded a hard risk constraint for this intent."
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Audit {
    pub candidates_evaluated: usize,
    pub candidates_feasible: usize,
    pub chemotypes_available: usize,
    pub chemotypes_considered: usize,
    pub inventory_fingerprint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Recommendation {
    pub rank: usize,
    pub blend: CandidateBlend,
    pub evaluation: BlendEvaluation,
}

/// Ranking order: score desc, confidence desc, fewer chemotypes, then ids.
pub fn recommendation_order(
    a_blend: &CandidateBlend,
    a_eval: &BlendEvaluation,
    b_blend: &CandidateBlend,
    b_eval: &BlendEvaluation,
) -> Ordering {
    b_eval
        .blend_score
        .total_cmp(&a_eval.blend_score)
        .then_with(|| b_eval.confidence.total_cmp(&a_eval.confidence))
        .then_with(|| a_blend.len().cmp(&b_blend.len()))
        .then_with(|| a_blend.signature().cmp(&b_blend.signature()))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlendOutput {
    profile: TargetProfile,
    recommendations: Vec<Recommendation>,
    audit: Audit,
    error: Option<EngineErrorCode>,
}

impl BlendOutput {
    /// A successful result. Recommendations must be non-empty, ranked 1..n
    /// and already in ranking order.
    pub fn ranked(
        profile: TargetProfile,
        recommendations: Vec<Recommendation>,
        audit: Audit,
    ) -> Result<Self, DomainError> {
        if recommendations.is_empty() {
            return Err(DomainError::AmbiguousResult(
                "a ranked blend result needs at least one recommendation".to_string(),
            ));
        }

        for (index, recommendation) in recommendations.iter().enumerate() {
            if recommendation.rank != index + 1 {
                return Err(DomainError::AmbiguousResult(format!(
                    "recommendation at position {} carries rank {}",
                    index + 1,
                    recommendation.rank
                )));
            }
        }

        let ordered = recommendations.windows(2).all(|pair| {
            recommendation_order(
                &pair[0].blend,
                &pair[0].evaluation,
                &pair[1].blend,
                &pair[1].evaluation,
            ) != Ordering::Greater
        });
        if !ordered {
            return Err(DomainError::AmbiguousResult(
                "recommendations are not in ranking order".to_string(),
            ));
        }

        Ok(Self { profile, recommendations, audit, error: None })
    }

    /// A first-class empty result tagged with why nothing was recommended.
    pub fn empty(profile: TargetProfile, error: EngineErrorCode, audit: Audit) -> Self {
        Self { profile, recommendations: Vec::new(), audit, error: Some(error) }
    }

    pub fn profile(&self) -> &TargetProfile {
        &self.profile
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn audit(&self) -> &Audit {
        &self.audit
    }

    pub fn error(&self) -> Option<EngineErrorCode> {
        self.error
    }

    pub fn best(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Onset,
    Sustain,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onset => "onset",
            Self::Sustain => "sustain",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StackPhase {
    pub phase: PhaseKind,
    pub intent_text: String,
    pub output: BlendOutput,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StackOutput {
    phases: Vec<StackPhase>,
}

impl StackOutput {
    /// Exactly one onset phase followed by one sustain phase, each with at
    /// least one recommendation. A failed phase fails the whole result.
    pub fn new(phases: Vec<StackPhase>) -> Result<Self, DomainError> {
        let kinds: Vec<PhaseKind> = phases.iter().map(|phase| phase.phase).collect();
        if kinds != [PhaseKind::Onset, PhaseKind::Sustain] {
            return Err(DomainError::AmbiguousResult(format!(
                "a stack needs ordered onset and sustain phases, got {kinds:?}"
            )));
        }
        if let Some(failed) = phases.iter().find(|phase| phase.output.error().is_some()) {
            return Err(DomainError::AmbiguousResult(format!(
                "stack phase `{}` carries no recommendations",
                failed.phase.as_str()
            )));
        }
        Ok(Self { phases })
    }

    pub fn phases(&self) -> &[StackPhase] {
        &self.phases
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EngineOutput {
    Blend(BlendOutput),
    Stack(StackOutput),
}

impl EngineOutput {
    pub fn is_stack(&self) -> bool {
        matches!(self, Self::Stack(_))
    }

    pub fn as_blend(&self) -> Option<&BlendOutput> {
        match self {
            Self::Blend(output) => Some(output),
            Self::Stack(_) => None,
        }
    }

    pub fn as_stack(&self) -> Option<&StackOutput> {
        match self {
            Self::Stack(output) => Some(output),
            Self::Blend(_) => None,
        }
    }

    /// Every per-phase output, in order. A flat blend has one.
    pub fn outputs(&self) -> Vec<&BlendOutput> {
        match self {
            Self::Blend(output) => vec![output],
            Self::Stack(stack) => stack.phases.iter().map(|phase| &phase.output).collect(),
        }
    }

    /// First error across phases, if any phase came back empty.
    pub fn error(&self) -> Option<EngineErrorCode> {
        self.outputs().into_iter().find_map(BlendOutput::error)
    }

    pub fn candidates_evaluated(&self) -> usize {
        self.outputs().iter().map(|output| output.audit().candidates_evaluated).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{Audit, BlendOutput, EngineErrorCode, EngineOutput, PhaseKind, StackOutput, StackPhase};
    use crate::engine::RecommendationEngine;
    use crate::errors::DomainError;
    use crate::fixtures::demo_inventory;
    use crate::intent::IntentInterpreter;

    fn empty(error: EngineErrorCode) -> BlendOutput {
        BlendOutput::empty(IntentInterpreter::default_profile(), error, Audit::default())
    }

    fn ranked() -> BlendOutput {
        RecommendationEngine::default()
            .recommend_profile(&IntentInterpreter::default_profile(), &demo_inventory())
            .unwrap()
    }

    fn phase(phase: PhaseKind, output: BlendOutput) -> StackPhase {
        StackPhase { phase, intent_text: phase.as_str().to_string(), output }
    }

    #[test]
    fn ranked_output_needs_recommendations() {
        let error =
            BlendOutput::ranked(IntentInterpreter::default_profile(), Vec::new(), Audit::default())
                .unwrap_err();
        assert!(matches!(error, DomainError::AmbiguousResult(_)));
    }

    #[test]
    fn stack_rejects_missing_or_reordered_phases() {
        assert!(StackOutput::new(vec![phase(PhaseKind::Onset, ranked())]).is_err());
        assert!(StackOutput::new(vec![
            phase(PhaseKind::Sustain, ranked()),
            phase(PhaseKind::Onset, ranked())
        ])
        .is_err());
        assert!(StackOutput::new(vec![
            phase(PhaseKind::Onset, ranked()),
            phase(PhaseKind::Sustain, ranked())
        ])
        .is_ok());
    }

    #[test]
    fn stack_rejects_a_partly_failed_phase_set() {
        let error = StackOutput::new(vec![
            phase(PhaseKind::Onset, ranked()),
            phase(PhaseKind::Sustain, empty(EngineErrorCode::NoFeasibleBlend)),
        ])
        .unwrap_err();
        assert!(matches!(error, DomainError::AmbiguousResult(message) if message.contains("sustain")));
    }

    #[test]
    fn engine_output_is_tagged_by_mode() {
        let flat = EngineOutput::Blend(empty(EngineErrorCode::InsufficientInventory));
        let json = serde_json::to_value(&flat).unwrap();
        assert_eq!(json["mode"], "blend");
        assert_eq!(json["error"], "insufficient_inventory");
        assert_eq!(flat.error(), Some(EngineErrorCode::InsufficientInventory));

        let stack = StackOutput::new(vec![
            phase(PhaseKind::Onset, ranked()),
            phase(PhaseKind::Sustain, ranked()),
        ])
        .map(EngineOutput::Stack)
        .unwrap();
        let json = serde_json::to_value(&stack).unwrap();
        assert_eq!(json["mode"], "stack");
        assert_eq!(json["phases"][1]["phase"], "sustain");
        assert_eq!(stack.outputs().len(), 2);
        assert_eq!(stack.error(), None);
    }
}
