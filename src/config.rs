use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_URL: &str = "sqlite://storefront.db?mode=rwc";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_WHATSAPP_SEND_URL: &str = "https://api.whatsapp.com/send";
const CONFIG_DIR: &str = "config";

/// Phone numbers: optional `+`, optional country `1`, 9-15 digits.
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("phone regex is valid"));

/// WhatsApp deep-link settings. The owner phone is the store's inbound
/// number for the manual order flow; it is threaded into the notification
/// service at construction, never read from ambient globals.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_send_url")]
    pub send_base_url: String,

    #[validate(regex = "PHONE_RE")]
    #[serde(default)]
    pub owner_phone: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            send_base_url: default_whatsapp_send_url(),
            owner_phone: None,
        }
    }
}

/// Application configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// Currency code recorded on new payments
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Comma-separated list of allowed CORS origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default)]
    #[validate]
    pub whatsapp: WhatsAppConfig,
}

impl AppConfig {
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level().to_string(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            currency: default_currency(),
            cors_allowed_origins: None,
            whatsapp: WhatsAppConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/default`, `config/<environment>` and
/// `APP__`-prefixed environment variables, in that order of precedence.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    cfg.validate()?;
    Ok(cfg)
}

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_env() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_whatsapp_send_url() -> String {
    DEFAULT_WHATSAPP_SEND_URL.to_string()
}
