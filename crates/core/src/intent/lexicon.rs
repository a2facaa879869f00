//! Ordered keyword rules for the intent interpreter.
//!
//! Rules are applied top to bottom. Each effect sets an absolute value, so a
//! later rule overrides an earlier one for the same dimension or constraint.

use crate::domain::effect::EffectDimension;
use crate::domain::profile::{ExperienceLevel, TimeOfDay, ToleranceLevel};

use EffectDimension::{Body, Creativity, Energy, Focus, Mood, Relaxation};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleEffect {
    Target(EffectDimension, f64),
    MaxAnxietyRisk(f64),
    MaxThcPercent(f64),
    TimeOfDay(TimeOfDay),
    Tolerance(ToleranceLevel),
    Experience(ExperienceLevel),
}

#[derive(Debug, Clone, Copy)]
pub struct LexiconRule {
    pub id: &'static str,
    /// Whole-word phrases, already lower case.
    pub phrases: &'static [&'static str],
    pub effects: &'static [RuleEffect],
}

impl LexiconRule {
    /// `padded` is normalized text wrapped in single spaces.
    pub fn matches(&self, padded: &str) -> bool {
        self.phrases.iter().any(|phrase| padded.contains(&format!(" {phrase} ")))
    }
}

pub const LEXICON: &[LexiconRule] = &[
    LexiconRule {
        id: "energy",
        phrases: &[
            "energy", "energize", "energized", "energetic", "awake", "wake up", "active",
            "uplifting", "boost",
        ],
        effects: &[RuleEffect::Target(Energy, 0.85), RuleEffect::Target(Relaxation, 0.15)],
    },
    LexiconRule {
        id: "focus",
        phrases: &[
            "focus", "focused", "concentrate", "concentration", "productive", "work", "study",
            "ignore distractions",
        ],
        effects: &[
            RuleEffect::Target(Focus, 0.9),
            RuleEffect::Target(Energy, 0.55),
            RuleEffect::Target(Relaxation, 0.2),
        ],
    },
    LexiconRule {
        id: "creativity",
        phrases: &[
            "creative", "creativity", "inspired", "inspiration", "art", "writing", "brainstorm",
            "ideas",
        ],
        effects: &[RuleEffect::Target(Creativity, 0.85), RuleEffect::Target(Mood, 0.6)],
    },
    LexiconRule {
        id: "mood",
        phrases: &["happy", "mood", "cheerful", "euphoric", "joy", "giggly"],
        effects: &[RuleEffect::Target(Mood, 0.85)],
    },
    LexiconRule {
        id: "social",
        phrases: &["social", "party", "friends", "talkative", "chatty"],
        effects: &[
            RuleEffect::Target(Mood, 0.8),
            RuleEffect::Target(Energy, 0.65),
            RuleEffect::Target(Relaxation, 0.25),
        ],
    },
    LexiconRule {
        id: "body",
        phrases: &["pain", "sore", "ache", "aches", "body", "tension", "muscle", "muscles"],
        effects: &[RuleEffect::Target(Body, 0.8)],
    },
    LexiconRule {
        id: "relax",
        phrases: &[
            "relax", "relaxed", "relaxing", "calm", "chill", "unwind", "wind down", "destress",
            "de stress", "stress",
        ],
        effects: &[
            RuleEffect::Target(Relaxation, 0.85),
            RuleEffect::Target(Energy, 0.15),
            RuleEffect::Target(Body, 0.5),
        ],
    },
    LexiconRule {
        id: "sleep",
        phrases: &["sleep", "sleepy", "insomnia", "bed", "bedtime"],
        effects: &[
            RuleEffect::Target(Relaxation, 0.95),
            RuleEffect::Target(Body, 0.75),
            RuleEffect::Target(Energy, 0.05),
            RuleEffect::Target(Focus, 0.15),
            RuleEffect::TimeOfDay(TimeOfDay::Night),
        ],
    },
    LexiconRule {
        id: "clear-mind",
        phrases: &["clear mind", "clear headed", "clearheaded", "sharp", "no fog"],
        effects: &[RuleEffect::Target(Focus, 0.95), RuleEffect::Target(Relaxation, 0.2)],
    },
    LexiconRule {
        id: "no-couch-lock",
        phrases: &["no couch lock", "without couch lock", "functional", "not sleepy", "stay awake"],
        effects: &[RuleEffect::Target(Body, 0.2), RuleEffect::Target(Relaxation, 0.2)],
    },
    LexiconRule {
        id: "morning",
        phrases: &["morning", "breakfast", "sunrise"],
        effects: &[RuleEffect::TimeOfDay(TimeOfDay::Morning)],
    },
    LexiconRule {
        id: "afternoon",
        phrases: &["afternoon", "daytime", "midday", "lunch"],
        effects: &[RuleEffect::TimeOfDay(TimeOfDay::Afternoon)],
    },
    LexiconRule {
        id: "evening",
        phrases: &["evening", "dinner", "sunset", "tonight"],
        effects: &[RuleEffect::TimeOfDay(TimeOfDay::Evening)],
    },
    LexiconRule {
        id: "night",
        phrases: &["night", "late night", "midnight"],
        effects: &[RuleEffect::TimeOfDay(TimeOfDay::Night)],
    },
    LexiconRule {
        id: "low-tolerance",
        phrases: &["low tolerance", "lightweight", "sensitive"],
        effects: &[
            RuleEffect::Tolerance(ToleranceLevel::Low),
            RuleEffect::MaxAnxietyRisk(0.35),
        ],
    },
    LexiconRule {
        id: "high-tolerance",
        phrases: &["high tolerance", "heavy user", "daily user", "strong", "potent"],
        effects: &[
            RuleEffect::Tolerance(ToleranceLevel::High),
            RuleEffect::MaxAnxietyRisk(0.55),
        ],
    },
    LexiconRule {
        id: "novice",
        phrases: &["first time", "beginner", "new to", "novice", "newbie", "never tried"],
        effects: &[
            RuleEffect::Experience(ExperienceLevel::Novice),
            RuleEffect::Tolerance(ToleranceLevel::Low),
            RuleEffect::MaxAnxietyRisk(0.3),
        ],
    },
    LexiconRule {
        id: "experienced",
        phrases: &["experienced", "veteran", "seasoned"],
        effects: &[RuleEffect::Experience(ExperienceLevel::Experienced)],
    },
    LexiconRule {
        id: "mild",
        phrases: &["mild", "gentle", "microdose", "micro dose", "subtle"],
        effects: &[RuleEffect::MaxThcPercent(12.0)],
    },
    // Anxiety wording is last so it tightens any tolerance-based threshold.
    LexiconRule {
        id: "anxiety",
        phrases: &[
            "anxiety", "no anxiety", "anxious", "paranoia", "paranoid", "nervous", "not anxious",
        ],
        effects: &[RuleEffect::MaxAnxietyRisk(0.25)],
    },
];

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::LEXICON;

    #[test]
    fn rule_ids_are_unique() {
        let ids: BTreeSet<&str> = LEXICON.iter().map(|rule| rule.id).collect();
        assert_eq!(ids.len(), LEXICON.len());
    }

    #[test]
    fn phrases_are_already_normalized() {
        for rule in LEXICON {
            for phrase in rule.phrases {
                assert_eq!(
                    *phrase,
                    crate::intent::normalize_text(phrase),
                    "rule `{}` phrase `{phrase}` would never match",
                    rule.id
                );
            }
        }
    }

    #[test]
    fn phrases_match_on_word_boundaries() {
        let focus = LEXICON.iter().find(|rule| rule.id == "focus").unwrap();
        assert!(focus.matches(" need to work now "));
        assert!(!focus.matches(" after my workout "));
    }
}
