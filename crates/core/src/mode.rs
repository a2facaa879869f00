//! Blend-or-stack decision from temporal sequencing language.

use crate::intent::normalize_text;

/// Sequencing markers. Multi-word markers are listed before the single words
/// they contain so the longer one wins at the same position.
pub const SEQUENCE_MARKERS: &[&str] =
    &["and then", "followed by", "afterwards", "then", "after", "later"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Blend,
    Stack { onset: String, sustain: String },
}

impl GateDecision {
    pub fn is_stack(&self) -> bool {
        matches!(self, Self::Stack { .. })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModeGate {
    markers: &'static [&'static str],
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeGate {
    pub fn new() -> Self {
        Self { markers: SEQUENCE_MARKERS }
    }

    /// Splits the intent at its first sequencing marker. A stack needs words
    /// on both sides of the marker; anything else stays a flat blend.
    pub fn decide(&self, text: &str) -> GateDecision {
        let normalized = normalize_text(text);
        let tokens: Vec<&str> = normalized.split(' ').filter(|token| !token.is_empty()).collect();

        let Some((position, width)) = self.first_marker(&tokens) else {
            return GateDecision::Blend;
        };

        let onset = tokens[..position].join(" ");
        let sustain = tokens[position + width..].join(" ");
        if onset.is_empty() || sustain.is_empty() {
            return GateDecision::Blend;
        }
        GateDecision::Stack { onset, sustain }
    }

    /// Earliest (token index, token width) of any marker.
    fn first_marker(&self, tokens: &[&str]) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for marker in self.markers {
            let words: Vec<&str> = marker.split(' ').collect();
            let found = tokens.windows(words.len()).position(|window| window == words.as_slice());
            if let Some(position) = found {
                let earlier = match best {
                    None => true,
                    Some((current, width)) => {
                        position < current || (position == current && words.len() > width)
                    }
                };
                if earlier {
                    best = Some((position, words.len()));
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::{GateDecision, ModeGate};

    #[test]
    fn plain_intent_is_a_blend() {
        assert_eq!(ModeGate::new().decide("relaxed evening, no anxiety"), GateDecision::Blend);
        assert_eq!(ModeGate::new().decide(""), GateDecision::Blend);
    }

    #[test]
    fn then_splits_into_onset_and_sustain() {
        assert_eq!(
            ModeGate::new().decide("Energize me, then help me wind down."),
            GateDecision::Stack {
                onset: "energize me".to_string(),
                sustain: "help me wind down".to_string(),
            }
        );
    }

    #[test]
    fn and_then_is_consumed_as_one_marker() {
        assert_eq!(
            ModeGate::new().decide("creative session and then sleep"),
            GateDecision::Stack {
                onset: "creative session".to_string(),
                sustain: "sleep".to_string(),
            }
        );
    }

    #[test]
    fn splits_at_first_marker_only() {
        let decision = ModeGate::new().decide("focus first then relax later");
        assert_eq!(
            decision,
            GateDecision::Stack {
                onset: "focus first".to_string(),
                sustain: "relax later".to_string(),
            }
        );
    }

    #[test]
    fn marker_without_both_sides_stays_a_blend() {
        let gate = ModeGate::new();
        assert!(!gate.decide("after dinner, something calm").is_stack());
        assert!(!gate.decide("something to enjoy later").is_stack());
    }

    #[test]
    fn markers_match_whole_words() {
        assert!(!ModeGate::new().decide("an afternoon of thenar massage").is_stack());
    }
}
