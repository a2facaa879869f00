use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use blendwise_core::config::{EngineSettings, LoadOptions};
use serde::Serialize;
use toml::Value;

use super::{CommandResult, EXIT_CONFIG};

const COMMAND: &str = "config";

#[derive(Debug, Serialize)]
struct ConfigReport {
    config_file: Option<String>,
    precedence: &'static str,
    settings: EngineSettings,
    fields: Vec<FieldReport>,
}

#[derive(Debug, Serialize)]
struct FieldReport {
    key: &'static str,
    value: String,
    source: String,
}

struct FieldSpec {
    key: &'static str,
    env_keys: &'static [&'static str],
}

const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        key: "engine.max_blend_size",
        env_keys: &["BLENDWISE_ENGINE_MAX_BLEND_SIZE", "BLENDWISE_MAX_BLEND_SIZE"],
    },
    FieldSpec {
        key: "engine.prefilter_top_m",
        env_keys: &["BLENDWISE_ENGINE_PREFILTER_TOP_M", "BLENDWISE_PREFILTER_TOP_M"],
    },
    FieldSpec {
        key: "engine.ratio_steps",
        env_keys: &["BLENDWISE_ENGINE_RATIO_STEPS", "BLENDWISE_RATIO_STEPS"],
    },
    FieldSpec {
        key: "engine.max_recommendations",
        env_keys: &["BLENDWISE_ENGINE_MAX_RECOMMENDATIONS", "BLENDWISE_MAX_RECOMMENDATIONS"],
    },
    FieldSpec { key: "engine.dominant_contributors", env_keys: &[] },
    FieldSpec { key: "scoring.simplicity_bonus", env_keys: &["BLENDWISE_SCORING_SIMPLICITY_BONUS"] },
    FieldSpec {
        key: "scoring.unmitigated_risk_penalty",
        env_keys: &["BLENDWISE_SCORING_UNMITIGATED_RISK_PENALTY"],
    },
    FieldSpec {
        key: "scoring.mitigation_margin",
        env_keys: &["BLENDWISE_SCORING_MITIGATION_MARGIN"],
    },
    FieldSpec { key: "scoring.violation_score_cap", env_keys: &[] },
    FieldSpec { key: "scoring.confidence_floor", env_keys: &[] },
    FieldSpec { key: "scoring.confidence_margin_points", env_keys: &[] },
    FieldSpec { key: "cache.enabled", env_keys: &["BLENDWISE_CACHE_ENABLED"] },
    FieldSpec { key: "cache.capacity", env_keys: &["BLENDWISE_CACHE_CAPACITY"] },
    FieldSpec { key: "logging.level", env_keys: &["BLENDWISE_LOGGING_LEVEL", "BLENDWISE_LOG_LEVEL"] },
    FieldSpec {
        key: "logging.format",
        env_keys: &["BLENDWISE_LOGGING_FORMAT", "BLENDWISE_LOG_FORMAT"],
    },
    FieldSpec { key: "tables.path", env_keys: &["BLENDWISE_TABLES_PATH"] },
];

pub fn run(options: &LoadOptions) -> CommandResult {
    let settings = match EngineSettings::load(options.clone()) {
        Ok(settings) => settings,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let effective = toml::Value::try_from(&settings).ok();

    let fields = FIELDS
        .iter()
        .map(|field| FieldReport {
            key: field.key,
            value: effective
                .as_ref()
                .and_then(|doc| lookup(doc, field.key))
                .map(render_value)
                .unwrap_or_else(|| "<unset>".to_string()),
            source: field_source(
                field,
                overridden_by_flag(options, field.key),
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        })
        .collect();

    CommandResult::success(
        COMMAND,
        ConfigReport {
            config_file: config_file_path.map(|path| path.display().to_string()),
            precedence: "flag > env > file > default",
            settings,
            fields,
        },
    )
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let root = PathBuf::from("blendwise.toml");
    if root.exists() {
        return Some(root);
    }
    let nested = PathBuf::from("config/blendwise.toml");
    if nested.exists() {
        return Some(nested);
    }
    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn overridden_by_flag(options: &LoadOptions, key: &str) -> bool {
    let overrides = &options.overrides;
    match key {
        "engine.max_blend_size" => overrides.max_blend_size.is_some(),
        "engine.prefilter_top_m" => overrides.prefilter_top_m.is_some(),
        "engine.max_recommendations" => overrides.max_recommendations.is_some(),
        "cache.enabled" => overrides.cache_enabled.is_some(),
        "tables.path" => overrides.tables_path.is_some(),
        "logging.level" => overrides.log_level.is_some(),
        "logging.format" => overrides.log_format.is_some(),
        _ => false,
    }
}

fn field_source(
    field: &FieldSpec,
    flag: bool,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if flag {
        return "flag".to_string();
    }
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }
    if let Some(doc) = config_file_doc {
        if lookup(doc, field.key).is_some() {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }
    "default".to_string()
}

fn lookup<'a>(root: &'a Value, key_path: &str) -> Option<&'a Value> {
    let mut current = root;
    for key in key_path.split('.') {
        current = current.get(key)?;
    }
    Some(current)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
