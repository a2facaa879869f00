//! Intent interpretation: free text plus optional explicit overrides in, a
//! normalized [`TargetProfile`] out. Purely lexical and deterministic.

pub mod lexicon;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::effect::{EffectDimension, EffectVector};
use crate::domain::profile::{
    Constraints, ExperienceLevel, IntentContext, TargetProfile, TimeOfDay, ToleranceLevel,
};
pub use lexicon::{LexiconRule, RuleEffect, LEXICON};

/// Targets used for dimensions no rule mentions: neutral energy, moderate
/// focus and mood, light body, creativity and relaxation.
pub const DEFAULT_TARGETS: EffectVector = EffectVector {
    energy: 0.4,
    focus: 0.5,
    mood: 0.5,
    body: 0.3,
    creativity: 0.3,
    relaxation: 0.3,
};

/// Anxiety-risk ceiling when the intent says nothing about tolerance.
pub const DEFAULT_MAX_ANXIETY_RISK: f64 = 0.45;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentOverrides {
    pub targets: BTreeMap<EffectDimension, f64>,
    pub max_anxiety_risk: Option<f64>,
    pub max_thc_percent: Option<f64>,
    pub time_of_day: Option<TimeOfDay>,
    pub tolerance: Option<ToleranceLevel>,
    pub experience: Option<ExperienceLevel>,
}

impl IntentOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Drops explicit effect targets, keeping constraints and context.
    pub fn constraints_and_context(&self) -> Self {
        Self { targets: BTreeMap::new(), ..self.clone() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub text: String,
    #[serde(default)]
    pub overrides: IntentOverrides,
}

impl Intent {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), overrides: IntentOverrides::default() }
    }

    pub fn with_overrides(mut self, overrides: IntentOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Lower-case the text and turn every non-alphanumeric run into one space.
pub fn normalize_text(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy)]
pub struct IntentInterpreter {
    rules: &'static [LexiconRule],
}

impl Default for IntentInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentInterpreter {
    pub fn new() -> Self {
        Self { rules: LEXICON }
    }

    pub fn with_rules(rules: &'static [LexiconRule]) -> Self {
        Self { rules }
    }

    pub fn default_profile() -> TargetProfile {
        TargetProfile {
            targets: DEFAULT_TARGETS,
            constraints: Constraints {
                max_anxiety_risk: DEFAULT_MAX_ANXIETY_RISK,
                max_thc_percent: None,
            },
            context: IntentContext::default(),
            matched_rules: Vec::new(),
        }
    }

    pub fn interpret(&self, intent: &Intent) -> TargetProfile {
        let mut profile = self.interpret_text(&intent.text);
        apply_overrides(&mut profile, &intent.overrides);

        debug!(
            event_name = "intent.interpreted",
            matched_rules = ?profile.matched_rules,
            max_anxiety_risk = profile.constraints.max_anxiety_risk,
            overrides = !intent.overrides.is_empty(),
            "intent interpreted"
        );
        profile
    }

    /// Profile for one phase of a sequenced intent. Effect targets come from
    /// the phase text alone. Constraints take the tighter of the phase and
    /// the whole intent; tolerance and experience follow the whole intent.
    pub fn interpret_phase(&self, phase: &Intent, whole: &TargetProfile) -> TargetProfile {
        let mut profile = self.interpret(phase);

        let constraints = &mut profile.constraints;
        constraints.max_anxiety_risk =
            constraints.max_anxiety_risk.min(whole.constraints.max_anxiety_risk);
        constraints.max_thc_percent =
            match (constraints.max_thc_percent, whole.constraints.max_thc_percent) {
                (Some(own), Some(shared)) => Some(own.min(shared)),
                (own, shared) => own.or(shared),
            };

        profile.context.tolerance = whole.context.tolerance;
        profile.context.experience = whole.context.experience;
        if profile.context.time_of_day == TimeOfDay::Unspecified {
            profile.context.time_of_day = whole.context.time_of_day;
        }
        profile
    }

    /// Lexicon pass only. Empty or unmatched text yields the default profile.
    pub fn interpret_text(&self, text: &str) -> TargetProfile {
        let mut profile = Self::default_profile();
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return profile;
        }

        let padded = format!(" {normalized} ");
        for rule in self.rules.iter().filter(|rule| rule.matches(&padded)) {
            for effect in rule.effects {
                apply_effect(&mut profile, *effect);
            }
            profile.matched_rules.push(rule.id.to_string());
        }
        profile
    }
}

fn apply_effect(profile: &mut TargetProfile, effect: RuleEffect) {
    match effect {
        RuleEffect::Target(dimension, value) => profile.targets.set(dimension, value),
        RuleEffect::MaxAnxietyRisk(value) => profile.constraints.max_anxiety_risk = value,
        RuleEffect::MaxThcPercent(value) => profile.constraints.max_thc_percent = Some(value),
        RuleEffect::TimeOfDay(value) => profile.context.time_of_day = value,
        RuleEffect::Tolerance(value) => profile.context.tolerance = value,
        RuleEffect::Experience(value) => profile.context.experience = value,
    }
}

fn apply_overrides(profile: &mut TargetProfile, overrides: &IntentOverrides) {
    for (dimension, value) in &overrides.targets {
        if value.is_finite() {
            profile.targets.set(*dimension, value.clamp(0.0, 1.0));
        }
    }
    if let Some(value) = overrides.max_anxiety_risk.filter(|value| value.is_finite()) {
        profile.constraints.max_anxiety_risk = value.clamp(0.0, 1.0);
    }
    if let Some(value) = overrides.max_thc_percent.filter(|value| value.is_finite()) {
        profile.constraints.max_thc_percent = Some(value.max(0.0));
    }
    if let Some(value) = overrides.time_of_day {
        profile.context.time_of_day = value;
    }
    if let Some(value) = overrides.tolerance {
        profile.context.tolerance = value;
    }
    if let Some(value) = overrides.experience {
        profile.context.experience = value;
    }
}
