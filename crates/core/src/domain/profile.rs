use serde::{Deserialize, Serialize};

use super::effect::EffectVector;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    #[default]
    Unspecified,
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn is_daytime(&self) -> bool {
        matches!(self, Self::Morning | Self::Afternoon)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceLevel {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Novice,
    #[default]
    Regular,
    Experienced,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Highest acceptable projected anxiety risk, in [0, 1].
    pub max_anxiety_risk: f64,
    /// Optional ceiling on blended THC percent.
    pub max_thc_percent: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentContext {
    pub time_of_day: TimeOfDay,
    pub tolerance: ToleranceLevel,
    pub experience: ExperienceLevel,
}

/// Normalized desired experience produced by the intent interpreter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub targets: EffectVector,
    pub constraints: Constraints,
    pub context: IntentContext,
    /// Lexicon rule ids that fired, in application order.
    pub matched_rules: Vec<String>,
}

impl TargetProfile {
    /// Stable identity used as half of the memoization key.
    pub fn cache_key(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&canonical).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::TimeOfDay;
    use crate::intent::IntentInterpreter;

    #[test]
    fn cache_key_tracks_profile_content() {
        let base = IntentInterpreter::default_profile();
        assert_eq!(base.cache_key(), IntentInterpreter::default_profile().cache_key());

        let mut evening = base.clone();
        evening.context.time_of_day = TimeOfDay::Evening;
        assert_ne!(base.cache_key(), evening.cache_key());
    }

    #[test]
    fn only_morning_and_afternoon_count_as_daytime() {
        assert!(TimeOfDay::Morning.is_daytime());
        assert!(TimeOfDay::Afternoon.is_daytime());
        assert!(!TimeOfDay::Night.is_daytime());
        assert!(!TimeOfDay::Unspecified.is_daytime());
    }
}
