use serde::{Deserialize, Serialize};

/// Number of effect dimensions tracked by the engine.
pub const DIMENSION_COUNT: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectDimension {
    Energy,
    Focus,
    Mood,
    Body,
    Creativity,
    Relaxation,
}

impl EffectDimension {
    pub const ALL: [EffectDimension; DIMENSION_COUNT] = [
        EffectDimension::Energy,
        EffectDimension::Focus,
        EffectDimension::Mood,
        EffectDimension::Body,
        EffectDimension::Creativity,
        EffectDimension::Relaxation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::Focus => "focus",
            Self::Mood => "mood",
            Self::Body => "body",
            Self::Creativity => "creativity",
            Self::Relaxation => "relaxation",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Energy => 0,
            Self::Focus => 1,
            Self::Mood => 2,
            Self::Body => 3,
            Self::Creativity => 4,
            Self::Relaxation => 5,
        }
    }
}

impl std::fmt::Display for EffectDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EffectDimension {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown effect dimension `{normalized}` (expected energy|focus|mood|body|creativity|relaxation)"
                )
            })
    }
}

/// Intensity per effect dimension. Serialized as an ordered mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectVector {
    pub energy: f64,
    pub focus: f64,
    pub mood: f64,
    pub body: f64,
    pub creativity: f64,
    pub relaxation: f64,
}

impl EffectVector {
    pub fn from_values(values: [f64; DIMENSION_COUNT]) -> Self {
        Self {
            energy: values[0],
            focus: values[1],
            mood: values[2],
            body: values[3],
            creativity: values[4],
            relaxation: values[5],
        }
    }

    pub fn values(&self) -> [f64; DIMENSION_COUNT] {
        [self.energy, self.focus, self.mood, self.body, self.creativity, self.relaxation]
    }

    pub fn get(&self, dimension: EffectDimension) -> f64 {
        self.values()[dimension.index()]
    }

    pub fn set(&mut self, dimension: EffectDimension, value: f64) {
        let mut values = self.values();
        values[dimension.index()] = value;
        *self = Self::from_values(values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (EffectDimension, f64)> + '_ {
        EffectDimension::ALL.into_iter().map(move |dimension| (dimension, self.get(dimension)))
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::from_values(self.values().map(f))
    }

    pub fn scaled(&self, factor: f64) -> Self {
        self.map(|value| value * factor)
    }

    pub fn added(&self, other: &Self) -> Self {
        let (a, b) = (self.values(), other.values());
        Self::from_values(std::array::from_fn(|i| a[i] + b[i]))
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.values().iter().zip(other.values().iter()).map(|(a, b)| a * b).sum()
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn distance(&self, other: &Self) -> f64 {
        self.values()
            .iter()
            .zip(other.values().iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }

    /// Component sum, used to rank terpene weight rows by overall pull.
    pub fn total(&self) -> f64 {
        self.values().iter().sum()
    }

    pub fn clamped_unit(&self) -> Self {
        self.map(|value| if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::{EffectDimension, EffectVector};

    #[test]
    fn set_and_get_address_the_same_dimension() {
        let mut vector = EffectVector::default();
        vector.set(EffectDimension::Creativity, 0.7);

        assert_eq!(vector.creativity, 0.7);
        assert_eq!(vector.get(EffectDimension::Creativity), 0.7);
        assert_eq!(vector.get(EffectDimension::Focus), 0.0);
    }

    #[test]
    fn iteration_follows_declared_dimension_order() {
        let vector = EffectVector::from_values([0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let order: Vec<_> = vector.iter().map(|(dimension, _)| dimension.as_str()).collect();

        assert_eq!(order, vec!["energy", "focus", "mood", "body", "creativity", "relaxation"]);
    }

    #[test]
    fn distance_and_norm_agree_for_zero_origin() {
        let vector = EffectVector::from_values([0.3, 0.4, 0.0, 0.0, 0.0, 0.0]);
        assert!((vector.norm() - 0.5).abs() < 1e-12);
        assert!((vector.distance(&EffectVector::default()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn dimension_parses_case_insensitively() {
        assert_eq!("Focus".parse::<EffectDimension>(), Ok(EffectDimension::Focus));
        assert!("sleepiness".parse::<EffectDimension>().is_err());
    }

    #[test]
    fn clamped_unit_drops_non_finite_values() {
        let vector = EffectVector::from_values([1.4, -0.2, f64::NAN, 0.5, 0.0, 1.0]).clamped_unit();
        assert_eq!(vector.values(), [1.0, 0.0, 0.0, 0.5, 0.0, 1.0]);
    }
}
