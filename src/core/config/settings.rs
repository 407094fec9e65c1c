use std::time::Duration;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment,
    parse_positive_f64, parse_u16, parse_u32, parse_u64, parse_weights, Lookup,
};
use super::types::{
    ApiSettings, ClassificationSettings, ConfigError, CorsSettings, DatabaseSettings,
    RuntimeSettings, ServerHost, ServerPort, ServerSettings, Settings, TelemetrySettings,
};
use crate::services::classification::criteria::{COURSE_CRITERIA, MATERIAL_CRITERIA};
use crate::services::classification::matrix::AnchorBounds;

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        Self::load_with(&|key| std::env::var(key).ok())
    }

    pub(crate) fn load_with(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let host = env_or_default(lookup, "CLASSIFIER_HOST", "0.0.0.0");
        let port = env_or_default(lookup, "CLASSIFIER_PORT", "8000");

        let environment = parse_environment(
            env_optional(lookup, "CLASSIFIER_ENV").or_else(|| env_optional(lookup, "ENVIRONMENT")),
        );
        let strict_config = env_optional(lookup, "CLASSIFIER_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let project_name = env_or_default(lookup, "PROJECT_NAME", "Cognitive Classifier API");
        let version = env_or_default(lookup, "VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default(lookup, "API_V1_STR", "/api/v1");

        let cors_origins = parse_cors_origins(env_optional(lookup, "BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default(lookup, "POSTGRES_SERVER", "localhost");
        let postgres_port =
            parse_u16("POSTGRES_PORT", env_or_default(lookup, "POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default(lookup, "POSTGRES_USER", "classifier");
        let postgres_password = env_or_default(lookup, "POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default(lookup, "POSTGRES_DB", "classifier_db");
        let database_url = env_optional(lookup, "DATABASE_URL");
        let max_connections = parse_u32(
            "DATABASE_MAX_CONNECTIONS",
            env_or_default(lookup, "DATABASE_MAX_CONNECTIONS", "20"),
        )?;

        let log_level = env_or_default(lookup, "LOG_LEVEL", "info");
        let log_json =
            env_optional(lookup, "LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled = env_optional(lookup, "PROMETHEUS_ENABLED")
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        let material_weights = parse_weights(
            "MATERIAL_CRITERIA_WEIGHTS",
            env_optional(lookup, "MATERIAL_CRITERIA_WEIGHTS"),
            &MATERIAL_CRITERIA,
        )?;
        let course_weights = parse_weights(
            "COURSE_CRITERIA_WEIGHTS",
            env_optional(lookup, "COURSE_CRITERIA_WEIGHTS"),
            &COURSE_CRITERIA,
        )?;

        let default_anchors = AnchorBounds::default();
        let anchors = AnchorBounds {
            compile_count_ceiling: parse_positive_f64(
                "COMPILE_COUNT_CEILING",
                env_or_default(
                    lookup,
                    "COMPILE_COUNT_CEILING",
                    &default_anchors.compile_count_ceiling.to_string(),
                ),
            )?,
            coding_time_ceiling: parse_positive_f64(
                "CODING_TIME_CEILING_SECONDS",
                env_or_default(
                    lookup,
                    "CODING_TIME_CEILING_SECONDS",
                    &default_anchors.coding_time_ceiling.to_string(),
                ),
            )?,
            variable_count_target: parse_positive_f64(
                "VARIABLE_COUNT_TARGET",
                env_or_default(
                    lookup,
                    "VARIABLE_COUNT_TARGET",
                    &default_anchors.variable_count_target.to_string(),
                ),
            )?,
            function_count_target: parse_positive_f64(
                "FUNCTION_COUNT_TARGET",
                env_or_default(
                    lookup,
                    "FUNCTION_COUNT_TARGET",
                    &default_anchors.function_count_target.to_string(),
                ),
            )?,
        };

        let upstream_timeout_ms =
            parse_u64("UPSTREAM_TIMEOUT_MS", env_or_default(lookup, "UPSTREAM_TIMEOUT_MS", "5000"))?;
        let store_timeout_ms =
            parse_u64("STORE_TIMEOUT_MS", env_or_default(lookup, "STORE_TIMEOUT_MS", "5000"))?;
        let batch_max_retries =
            parse_u32("BATCH_MAX_RETRIES", env_or_default(lookup, "BATCH_MAX_RETRIES", "2"))?;
        let batch_retry_backoff_ms = parse_u64(
            "BATCH_RETRY_BACKOFF_MS",
            env_or_default(lookup, "BATCH_RETRY_BACKOFF_MS", "200"),
        )?;

        let settings = Self {
            server: ServerSettings { host: ServerHost::parse(host)?, port: ServerPort::parse(port)? },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            telemetry: TelemetrySettings { log_level, json: log_json, prometheus_enabled },
            classification: ClassificationSettings {
                material_weights,
                course_weights,
                anchors,
                upstream_timeout: Duration::from_millis(upstream_timeout_ms),
                store_timeout: Duration::from_millis(store_timeout_ms),
                batch_max_retries,
                batch_retry_backoff: Duration::from_millis(batch_retry_backoff_ms),
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_host(&self) -> &str {
        self.server.host.as_str()
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.get()
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host(), self.server_port())
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn classification(&self) -> &ClassificationSettings {
        &self.classification
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.api_v1_str.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "API_V1_STR",
                value: self.api.api_v1_str.clone(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        if self.classification.upstream_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "UPSTREAM_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        if self.classification.store_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "STORE_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        Ok(())
    }
}
