use std::{env, fs, path::PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:8080",
    "https://codular.ru",
    "https://www.codular.ru",
];

const DEFAULT_AI_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_AI_MODEL: &str = "meta-llama/llama-4-scout:free";

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    server: ServerSettings,
    runtime: RuntimeSettings,
    api: ApiSettings,
    security: SecuritySettings,
    cors: CorsSettings,
    database: DatabaseSettings,
    redis: RedisSettings,
    ai: AiSettings,
    generation: GenerationSettings,
    jobs: JobSettings,
    status: StatusSettings,
    submissions: SubmissionSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    host: ServerHost,
    port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) refresh_token_expire_days: u64,
    pub(crate) algorithm: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) db: u16,
    pub(crate) password: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AiSettings {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) model: String,
    pub(crate) temperature: f64,
    pub(crate) request_timeout: u64,
}

/// Limits applied when a task is requested and when its alias is allocated.
#[derive(Debug, Clone)]
pub(crate) struct GenerationSettings {
    pub(crate) alias_length: usize,
    pub(crate) alias_max_attempts: u32,
    pub(crate) max_source_code_bytes: usize,
    pub(crate) max_skips: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct JobSettings {
    pub(crate) max_concurrent: usize,
    pub(crate) max_queued: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct StatusSettings {
    pub(crate) ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct SubmissionSettings {
    pub(crate) stale_after_minutes: u64,
    pub(crate) sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
        }
    }

    fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(String);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(u16);

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid server host: {0}")]
    InvalidHost(String),
    #[error("invalid server port: {0}")]
    InvalidPort(String),
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
}

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("CODULAR_HOST", "0.0.0.0");
        let port = env_or_default("CODULAR_PORT", "8082");

        let environment =
            parse_environment(env_optional("CODULAR_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("CODULAR_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Codular API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let refresh_token_expire_days = parse_u64(
            "REFRESH_TOKEN_EXPIRE_DAYS",
            env_or_default("REFRESH_TOKEN_EXPIRE_DAYS", "30"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "codular");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "codular_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let ai_api_key = env_or_default("OPENROUTER_API_KEY", "");
        let ai_base_url = env_or_default("AI_BASE_URL", DEFAULT_AI_BASE_URL);
        let ai_model = env_or_default("AI_MODEL", DEFAULT_AI_MODEL);
        let ai_temperature =
            parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.7"))?;
        let ai_request_timeout =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "120"))?;

        let alias_length = parse_usize("ALIAS_LENGTH", env_or_default("ALIAS_LENGTH", "8"))?;
        let alias_max_attempts =
            parse_u32("ALIAS_MAX_ATTEMPTS", env_or_default("ALIAS_MAX_ATTEMPTS", "16"))?;
        let max_source_code_bytes = parse_usize(
            "MAX_SOURCE_CODE_BYTES",
            env_or_default("MAX_SOURCE_CODE_BYTES", "65536"),
        )?;
        let max_skips = parse_u32("MAX_SKIPS", env_or_default("MAX_SKIPS", "50"))?;

        let max_concurrent_jobs =
            parse_usize("MAX_CONCURRENT_JOBS", env_or_default("MAX_CONCURRENT_JOBS", "8"))?;
        let max_queued_jobs =
            parse_usize("MAX_QUEUED_JOBS", env_or_default("MAX_QUEUED_JOBS", "256"))?;

        let status_ttl_seconds = parse_u64(
            "TASK_STATUS_TTL_SECONDS",
            env_or_default("TASK_STATUS_TTL_SECONDS", "86400"),
        )?;

        let stale_after_minutes = parse_u64(
            "STALE_SUBMISSION_MINUTES",
            env_or_default("STALE_SUBMISSION_MINUTES", "90"),
        )?;
        let sweep_interval_seconds = parse_u64(
            "STALE_SWEEP_INTERVAL_SECONDS",
            env_or_default("STALE_SWEEP_INTERVAL_SECONDS", "300"),
        )?;

        let log_level = env_or_default("CODULAR_LOG_LEVEL", "info");
        let json = env_optional("CODULAR_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                access_token_expire_minutes,
                refresh_token_expire_days,
                algorithm,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            ai: AiSettings {
                api_key: ai_api_key,
                base_url: ai_base_url,
                model: ai_model,
                temperature: ai_temperature,
                request_timeout: ai_request_timeout,
            },
            generation: GenerationSettings {
                alias_length,
                alias_max_attempts,
                max_source_code_bytes,
                max_skips,
            },
            jobs: JobSettings { max_concurrent: max_concurrent_jobs, max_queued: max_queued_jobs },
            status: StatusSettings { ttl_seconds: status_ttl_seconds },
            submissions: SubmissionSettings { stale_after_minutes, sweep_interval_seconds },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn ai(&self) -> &AiSettings {
        &self.ai
    }

    pub(crate) fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    pub(crate) fn jobs(&self) -> &JobSettings {
        &self.jobs
    }

    pub(crate) fn status(&self) -> &StatusSettings {
        &self.status
    }

    pub(crate) fn submissions(&self) -> &SubmissionSettings {
        &self.submissions
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    /// Longest a job admitted last can take to finish when every job ahead of
    /// it runs into the AI request timeout.
    pub(crate) fn worst_queue_wait_seconds(&self) -> u64 {
        let rounds = self.jobs.max_queued.div_ceil(self.jobs.max_concurrent.max(1));
        (rounds as u64).saturating_mul(self.ai.request_timeout)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.alias_length < 4 {
            return Err(ConfigError::InvalidValue {
                field: "ALIAS_LENGTH",
                value: self.generation.alias_length.to_string(),
            });
        }
        if self.generation.alias_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ALIAS_MAX_ATTEMPTS",
                value: String::from("0"),
            });
        }
        if self.jobs.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MAX_CONCURRENT_JOBS",
                value: String::from("0"),
            });
        }
        if self.jobs.max_queued < self.jobs.max_concurrent {
            return Err(ConfigError::InvalidValue {
                field: "MAX_QUEUED_JOBS",
                value: self.jobs.max_queued.to_string(),
            });
        }
        let stale_after_seconds = self.submissions.stale_after_minutes.saturating_mul(60);
        if stale_after_seconds <= self.worst_queue_wait_seconds() {
            return Err(ConfigError::InvalidValue {
                field: "STALE_SUBMISSION_MINUTES",
                value: self.submissions.stale_after_minutes.to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.ai.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "AI_TEMPERATURE",
                value: self.ai.temperature.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.ai.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("OPENROUTER_API_KEY"));
        }

        Ok(())
    }
}

impl DatabaseSettings {
    pub(crate) fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.postgres_user,
            self.postgres_password,
            self.postgres_server,
            self.postgres_port,
            self.postgres_db
        )
    }
}

impl RedisSettings {
    pub(crate) fn redis_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

impl ServerHost {
    fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

impl ServerPort {
    fn parse(value: String) -> Result<Self, ConfigError> {
        let parsed: u16 = value.parse().map_err(|_| ConfigError::InvalidPort(value.clone()))?;
        if parsed == 0 {
            return Err(ConfigError::InvalidPort(value));
        }
        Ok(Self(parsed))
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_usize(field: &'static str, value: String) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_f64(field: &'static str, value: String) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let Some(raw) = value else {
        return Ok(default_cors_origins());
    };

    if raw.trim().is_empty() {
        return Ok(default_cors_origins());
    }

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

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|val| val.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn load_or_create_secret_key() -> String {
    let path = secret_file_path();

    if let Ok(value) = fs::read_to_string(&path) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let new_key = generate_secret_key();

    match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(mut file) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                    tracing::warn!(error = %err, path = %path.display(), "Failed to set secret key file permissions");
                }
            }
            if let Err(err) = std::io::Write::write_all(&mut file, new_key.as_bytes()) {
                tracing::warn!(error = %err, path = %path.display(), "Failed to write secret key file");
            }
            return new_key;
        }
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            if let Ok(value) = fs::read_to_string(&path) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "Failed to create secret key file");
        }
    }

    new_key
}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn secret_file_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key")
}
