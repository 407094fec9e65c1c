use super::types::{ConfigError, Environment};
use crate::services::classification::criteria::{Criterion, Weights};

const DEFAULT_CORS_ORIGINS: &[&str] =
    &["http://localhost:5173", "http://localhost:3000", "http://localhost:8000"];

/// Source of raw configuration values, keyed by variable name.
pub(super) type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(super) fn env_optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(lookup: Lookup<'_>, key: &str, default: &str) -> String {
    env_optional(lookup, key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

/// Parses a strictly positive, finite real.
pub(super) fn parse_positive_f64(field: &'static str, value: String) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() && parsed > 0.0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim_start().starts_with('[') {
        let parsed: Vec<String> =
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?;
        if parsed.is_empty() {
            return Ok(default_cors_origins());
        }
        return Ok(parsed);
    }

    let items: Vec<String> = raw
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        return Ok(default_cors_origins());
    }

    Ok(items)
}

/// Reads criterion weight overrides either as a JSON object
/// (`{"coding_time": 0.2}`) or as `name=value` pairs separated by commas.
/// Criteria not mentioned keep their default weight.
pub(super) fn parse_weights(
    field: &'static str,
    value: Option<String>,
    criteria: &[Criterion],
) -> Result<Weights, ConfigError> {
    let Some(raw) = value else {
        return Ok(Weights::defaults(criteria));
    };

    let invalid = |raw: &str| ConfigError::InvalidValue { field, value: raw.to_string() };

    let overrides: Vec<(String, f64)> = if raw.trim_start().starts_with('{') {
        let parsed: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|_| invalid(&raw))?;
        parsed
            .into_iter()
            .map(|(name, weight)| weight.as_f64().map(|weight| (name, weight)).ok_or(()))
            .collect::<Result<Vec<_>, ()>>()
            .map_err(|_| invalid(&raw))?
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| -> Result<(String, f64), ()> {
                let (name, weight) = item.split_once('=').ok_or(())?;
                let weight = weight.trim().parse::<f64>().map_err(|_| ())?;
                Ok((name.trim().to_string(), weight))
            })
            .collect::<Result<Vec<_>, ()>>()
            .map_err(|_| invalid(&raw))?
    };

    Weights::with_overrides(criteria, &overrides)
        .map_err(|err| ConfigError::InvalidValue { field, value: err.to_string() })
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::classification::criteria::{COURSE_CRITERIA, MATERIAL_CRITERIA};

    #[test]
    fn parse_cors_origins_json() {
        let raw = "[\"http://a\",\"http://b\"]".to_string();
        let parsed = parse_cors_origins(Some(raw)).expect("cors json");
        assert_eq!(parsed, vec!["http://a".to_string(), "http://b".to_string()]);
    }

    #[test]
    fn parse_cors_origins_defaults_on_blank_list() {
        let parsed = parse_cors_origins(Some(" , ".to_string())).expect("cors blank");
        assert_eq!(parsed, default_cors_origins());
    }

    #[test]
    fn parse_weights_defaults_when_unset() {
        let weights = parse_weights("W", None, &MATERIAL_CRITERIA).expect("defaults");
        assert_eq!(weights, Weights::defaults(&MATERIAL_CRITERIA));
    }

    #[test]
    fn parse_weights_csv_overrides_named_criteria() {
        let raw = "coding_time=0.5, function_count = 0".to_string();
        let weights = parse_weights("W", Some(raw), &MATERIAL_CRITERIA).expect("csv");
        let defaults = Weights::defaults(&MATERIAL_CRITERIA);

        assert_eq!(weights.as_slice()[0], defaults.as_slice()[0]);
        assert_eq!(weights.as_slice()[1], 0.5);
        assert_eq!(weights.as_slice()[5], 0.0);
    }

    #[test]
    fn parse_weights_json_object() {
        let raw = r#"{"material_score": 1.0, "completion_ratio": 0.0}"#.to_string();
        let weights = parse_weights("W", Some(raw), &COURSE_CRITERIA).expect("json");
        assert_eq!(weights.as_slice()[0], 1.0);
        assert_eq!(weights.as_slice()[2], 0.0);
    }

    #[test]
    fn parse_weights_rejects_unknown_and_negative() {
        let unknown = parse_weights("W", Some("speed=1".to_string()), &MATERIAL_CRITERIA);
        assert!(matches!(unknown, Err(ConfigError::InvalidValue { field: "W", .. })));

        let negative = parse_weights("W", Some("coding_time=-1".to_string()), &MATERIAL_CRITERIA);
        assert!(negative.is_err());

        let malformed = parse_weights("W", Some("coding_time".to_string()), &MATERIAL_CRITERIA);
        assert!(malformed.is_err());
    }

    #[test]
    fn parse_positive_f64_rejects_zero_and_nan() {
        assert_eq!(parse_positive_f64("X", "2.5".to_string()).expect("valid"), 2.5);
        assert!(parse_positive_f64("X", "0".to_string()).is_err());
        assert!(parse_positive_f64("X", "NaN".to_string()).is_err());
    }

    #[test]
    fn parse_bool_variants() {
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_environment_variants() {
        assert_eq!(parse_environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(parse_environment(Some("staging".to_string())), Environment::Staging);
        assert_eq!(parse_environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(parse_environment(None), Environment::Development);
    }
}
