use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ApplicationError;
use crate::tables::EngineTables;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineSettings {
    pub engine: EngineConfig,
    pub scoring: ScoringConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub tables: TablesConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineConfig {
    /// Largest number of chemotypes in one blend (K).
    pub max_blend_size: usize,
    /// Chemotypes kept by individual score before combining (M).
    pub prefilter_top_m: usize,
    /// Resolution of the ratio grid; ratios are multiples of 1/steps.
    pub ratio_steps: usize,
    pub max_recommendations: usize,
    pub dominant_contributors: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoringConfig {
    /// Points added per unused blend slot.
    pub simplicity_bonus: f64,
    /// Points removed per unmitigated risk.
    pub unmitigated_risk_penalty: f64,
    /// Extra anxiety-risk headroom granted when a mitigator is in the blend.
    pub mitigation_margin: f64,
    /// Score ceiling for a chemotype that violates a constraint on its own.
    pub violation_score_cap: f64,
    pub confidence_floor: f64,
    /// Score margin at which the competitive part of confidence saturates.
    pub confidence_margin_points: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TablesConfig {
    /// TOML calibration file replacing the built-in tables.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub max_blend_size: Option<usize>,
    pub prefilter_top_m: Option<usize>,
    pub max_recommendations: Option<usize>,
    pub cache_enabled: Option<bool>,
    pub tables_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for ApplicationError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                max_blend_size: 3,
                prefilter_top_m: 12,
                ratio_steps: 20,
                max_recommendations: 5,
                dominant_contributors: 3,
            },
            scoring: ScoringConfig {
                simplicity_bonus: 1.5,
                unmitigated_risk_penalty: 5.0,
                mitigation_margin: 0.20,
                violation_score_cap: 0.60,
                confidence_floor: 0.6,
                confidence_margin_points: 10.0,
            },
            cache: CacheConfig { enabled: true, capacity: 64 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            tables: TablesConfig::default(),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl EngineSettings {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            settings.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("blendwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        settings.apply_env_overrides()?;
        settings.apply_overrides(options.overrides);
        settings.validate()?;

        Ok(settings)
    }

    /// Calibration tables named by `[tables].path`, or the built-in set.
    pub fn load_tables(&self) -> Result<EngineTables, ApplicationError> {
        match &self.tables.path {
            Some(path) => EngineTables::from_toml_file(path),
            None => Ok(EngineTables::default()),
        }
    }

    fn apply_patch(&mut self, patch: SettingsPatch) {
        if let Some(engine) = patch.engine {
            if let Some(max_blend_size) = engine.max_blend_size {
                self.engine.max_blend_size = max_blend_size;
            }
            if let Some(prefilter_top_m) = engine.prefilter_top_m {
                self.engine.prefilter_top_m = prefilter_top_m;
            }
            if let Some(ratio_steps) = engine.ratio_steps {
                self.engine.ratio_steps = ratio_steps;
            }
            if let Some(max_recommendations) = engine.max_recommendations {
                self.engine.max_recommendations = max_recommendations;
            }
            if let Some(dominant_contributors) = engine.dominant_contributors {
                self.engine.dominant_contributors = dominant_contributors;
            }
        }

        if let Some(scoring) = patch.scoring {
            if let Some(simplicity_bonus) = scoring.simplicity_bonus {
                self.scoring.simplicity_bonus = simplicity_bonus;
            }
            if let Some(unmitigated_risk_penalty) = scoring.unmitigated_risk_penalty {
                self.scoring.unmitigated_risk_penalty = unmitigated_risk_penalty;
            }
            if let Some(mitigation_margin) = scoring.mitigation_margin {
                self.scoring.mitigation_margin = mitigation_margin;
            }
            if let Some(violation_score_cap) = scoring.violation_score_cap {
                self.scoring.violation_score_cap = violation_score_cap;
            }
            if let Some(confidence_floor) = scoring.confidence_floor {
                self.scoring.confidence_floor = confidence_floor;
            }
            if let Some(confidence_margin_points) = scoring.confidence_margin_points {
                self.scoring.confidence_margin_points = confidence_margin_points;
            }
        }

        if let Some(cache) = patch.cache {
            if let Some(enabled) = cache.enabled {
                self.cache.enabled = enabled;
            }
            if let Some(capacity) = cache.capacity {
                self.cache.capacity = capacity;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        if let Some(tables) = patch.tables {
            if let Some(path) = tables.path {
                self.tables.path = Some(path);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some((key, value)) =
            read_env_alias("BLENDWISE_ENGINE_MAX_BLEND_SIZE", "BLENDWISE_MAX_BLEND_SIZE")
        {
            self.engine.max_blend_size = parse_usize(key, &value)?;
        }
        if let Some((key, value)) =
            read_env_alias("BLENDWISE_ENGINE_PREFILTER_TOP_M", "BLENDWISE_PREFILTER_TOP_M")
        {
            self.engine.prefilter_top_m = parse_usize(key, &value)?;
        }
        if let Some((key, value)) =
            read_env_alias("BLENDWISE_ENGINE_RATIO_STEPS", "BLENDWISE_RATIO_STEPS")
        {
            self.engine.ratio_steps = parse_usize(key, &value)?;
        }
        if let Some((key, value)) = read_env_alias(
            "BLENDWISE_ENGINE_MAX_RECOMMENDATIONS",
            "BLENDWISE_MAX_RECOMMENDATIONS",
        ) {
            self.engine.max_recommendations = parse_usize(key, &value)?;
        }

        if let Some(value) = read_env("BLENDWISE_SCORING_SIMPLICITY_BONUS") {
            self.scoring.simplicity_bonus =
                parse_f64("BLENDWISE_SCORING_SIMPLICITY_BONUS", &value)?;
        }
        if let Some(value) = read_env("BLENDWISE_SCORING_UNMITIGATED_RISK_PENALTY") {
            self.scoring.unmitigated_risk_penalty =
                parse_f64("BLENDWISE_SCORING_UNMITIGATED_RISK_PENALTY", &value)?;
        }
        if let Some(value) = read_env("BLENDWISE_SCORING_MITIGATION_MARGIN") {
            self.scoring.mitigation_margin =
                parse_f64("BLENDWISE_SCORING_MITIGATION_MARGIN", &value)?;
        }

        if let Some(value) = read_env("BLENDWISE_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("BLENDWISE_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("BLENDWISE_CACHE_CAPACITY") {
            self.cache.capacity = parse_usize("BLENDWISE_CACHE_CAPACITY", &value)?;
        }

        if let Some(value) = read_env("BLENDWISE_TABLES_PATH") {
            self.tables.path = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("BLENDWISE_LOGGING_LEVEL").or_else(|| read_env("BLENDWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BLENDWISE_LOGGING_FORMAT").or_else(|| read_env("BLENDWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(max_blend_size) = overrides.max_blend_size {
            self.engine.max_blend_size = max_blend_size;
        }
        if let Some(prefilter_top_m) = overrides.prefilter_top_m {
            self.engine.prefilter_top_m = prefilter_top_m;
        }
        if let Some(max_recommendations) = overrides.max_recommendations {
            self.engine.max_recommendations = max_recommendations;
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = enabled;
        }
        if let Some(path) = overrides.tables_path {
            self.tables.path = Some(path);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine(&self.engine)?;
        validate_scoring(&self.scoring)?;
        validate_cache(&self.cache)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("blendwise.toml"), PathBuf::from("config/blendwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<SettingsPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<SettingsPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

/// Upper bound on ratio evaluations the composer may run for one request.
pub const MAX_SOLVER_GRID_POINTS: u64 = 2_000_000;

/// Ratio grid points across every combination: the sum over blend sizes k of
/// C(M, k) * C(steps - 1, k - 1).
pub fn solver_grid_points(engine: &EngineConfig) -> u64 {
    let top_m = engine.prefilter_top_m as u64;
    let steps = engine.ratio_steps as u64;
    (1..=engine.max_blend_size as u64)
        .map(|size| {
            binomial(top_m, size).saturating_mul(binomial(steps.saturating_sub(1), size - 1))
        })
        .fold(0u64, u64::saturating_add)
}

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut value: u128 = 1;
    for i in 0..k {
        value = value * u128::from(n - i) / u128::from(i + 1);
    }
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if !(1..=4).contains(&engine.max_blend_size) {
        return Err(ConfigError::Validation(
            "engine.max_blend_size must be in range 1..=4".to_string(),
        ));
    }

    if !(1..=32).contains(&engine.prefilter_top_m) {
        return Err(ConfigError::Validation(
            "engine.prefilter_top_m must be in range 1..=32".to_string(),
        ));
    }

    if engine.ratio_steps < engine.max_blend_size || engine.ratio_steps > 100 {
        return Err(ConfigError::Validation(format!(
            "engine.ratio_steps must be in range {}..=100 (at least engine.max_blend_size)",
            engine.max_blend_size
        )));
    }

    let grid_points = solver_grid_points(engine);
    if grid_points > MAX_SOLVER_GRID_POINTS {
        return Err(ConfigError::Validation(format!(
            "engine.max_blend_size, engine.prefilter_top_m and engine.ratio_steps together \
             need {grid_points} ratio evaluations per request (limit {MAX_SOLVER_GRID_POINTS})"
        )));
    }

    if engine.max_recommendations == 0 {
        return Err(ConfigError::Validation(
            "engine.max_recommendations must be greater than zero".to_string(),
        ));
    }

    if engine.dominant_contributors == 0 {
        return Err(ConfigError::Validation(
            "engine.dominant_contributors must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_scoring(scoring: &ScoringConfig) -> Result<(), ConfigError> {
    let points = [
        ("scoring.simplicity_bonus", scoring.simplicity_bonus),
        ("scoring.unmitigated_risk_penalty", scoring.unmitigated_risk_penalty),
    ];
    for (key, value) in points {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0..=100")));
        }
    }

    let fractions = [
        ("scoring.mitigation_margin", scoring.mitigation_margin),
        ("scoring.violation_score_cap", scoring.violation_score_cap),
        ("scoring.confidence_floor", scoring.confidence_floor),
    ];
    for (key, value) in fractions {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Validation(format!("{key} must be in range 0..=1")));
        }
    }

    if !scoring.confidence_margin_points.is_finite() || scoring.confidence_margin_points <= 0.0 {
        return Err(ConfigError::Validation(
            "scoring.confidence_margin_points must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_cache(cache: &CacheConfig) -> Result<(), ConfigError> {
    if cache.enabled && cache.capacity == 0 {
        return Err(ConfigError::Validation(
            "cache.capacity must be greater than zero when the cache is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_alias(
    primary: &'static str,
    alias: &'static str,
) -> Option<(&'static str, String)> {
    read_env(primary)
        .map(|value| (primary, value))
        .or_else(|| read_env(alias).map(|value| (alias, value)))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct SettingsPatch {
    engine: Option<EnginePatch>,
    scoring: Option<ScoringPatch>,
    cache: Option<CachePatch>,
    logging: Option<LoggingPatch>,
    tables: Option<TablesPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    max_blend_size: Option<usize>,
    prefilter_top_m: Option<usize>,
    ratio_steps: Option<usize>,
    max_recommendations: Option<usize>,
    dominant_contributors: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ScoringPatch {
    simplicity_bonus: Option<f64>,
    unmitigated_risk_penalty: Option<f64>,
    mitigation_margin: Option<f64>,
    violation_score_cap: Option<f64>,
    confidence_floor: Option<f64>,
    confidence_margin_points: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CachePatch {
    enabled: Option<bool>,
    capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct TablesPatch {
    path: Option<PathBuf>,
}
