use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    pub mtn: Option<MtnConfig>,
    pub airtel: Option<AirtelConfig>,
    pub flutterwave: Option<FlutterwaveConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL of the site, used to build the card redirect link.
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    pub currency: String,
    pub country: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    pub initial_delay_secs: u64,
    pub interval_secs: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MtnConfig {
    pub subscription_key: String,
    pub api_user: String,
    pub api_key: String,
    #[serde(default = "default_mtn_base_url")]
    pub base_url: String,
    #[serde(default = "default_mtn_environment")]
    pub target_environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AirtelConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_airtel_base_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlutterwaveConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default = "default_flutterwave_base_url")]
    pub base_url: String,
}

fn default_mtn_base_url() -> String {
    "https://sandbox.momodeveloper.mtn.com".to_string()
}

fn default_mtn_environment() -> String {
    "sandbox".to_string()
}

fn default_airtel_base_url() -> String {
    "https://openapiuat.airtel.africa".to_string()
}

fn default_flutterwave_base_url() -> String {
    "https://api.flutterwave.com/v3".to_string()
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            currency: "UGX".to_string(),
            country: "UG".to_string(),
            request_timeout_secs: 30,
            polling: PollingConfig::default(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5,
            interval_secs: 10,
            max_attempts: 12,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://benefactor.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("payments.currency", "UGX")?
            .set_default("payments.country", "UG")?
            .set_default("payments.request_timeout_secs", 30)?
            .set_default("payments.polling.initial_delay_secs", 5)?
            .set_default("payments.polling.interval_secs", 10)?
            .set_default("payments.polling.max_attempts", 12)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with BENEFACTOR__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BENEFACTOR").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://benefactor.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            payments: PaymentsConfig::default(),
            mtn: None,
            airtel: None,
            flutterwave: None,
        }
    }
}
