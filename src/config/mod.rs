use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

use crate::{domain::CopyPolicy, service::fine_policy::{FineAnchor, FinePolicy}};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub fines: FineConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub payments: PaymentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub environment: String,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    /// Registration fee charged to new members.
    pub member_fee: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FineConfig {
    pub grace_days: i64,
    pub per_day: i64,
    pub anchor: FineAnchor,
    /// Seconds between background refreshes; 0 leaves refresh to the dashboard.
    pub refresh_interval_secs: u64,
}

impl Default for FineConfig {
    fn default() -> Self {
        Self {
            grace_days: 10,
            per_day: 10,
            anchor: FineAnchor::IssueDate,
            refresh_interval_secs: 0,
        }
    }
}

impl FineConfig {
    pub fn policy(&self) -> FinePolicy {
        FinePolicy::new(self.grace_days, self.per_day, self.anchor)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub copy_policy: CopyPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Probability that a simulated upi/card payment settles immediately.
    pub success_rate: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self { success_rate: 0.8 }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("server.frontend_url", "http://localhost:5173")?
            .set_default("server.environment", "development")?
            .set_default("database.url", "sqlite://bibliotheca.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_ttl_days", 30)?
            .set_default("auth.member_fee", 200)?
            .set_default("fines.grace_days", 10)?
            .set_default("fines.per_day", 10)?
            .set_default("fines.anchor", "issue_date")?
            .set_default("fines.refresh_interval_secs", 0)?
            .set_default("catalog.copy_policy", "unlimited")?
            .set_default("payments.success_rate", 0.8)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with BIBLIOTHECA__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("BIBLIOTHECA").separator("__"))

            // Conventional flat variables win over everything else
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("server.frontend_url", std::env::var("FRONTEND_URL").ok())?
            .set_override_option("server.port", std::env::var("PORT").ok())?
            .set_override_option("server.environment", std::env::var("APP_ENV").ok())?

            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects settings the server must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "auth.jwt_secret is empty; set JWT_SECRET".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                frontend_url: "http://localhost:5173".to_string(),
                environment: "development".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://bibliotheca.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                // Never signs anything until a real secret is configured
                jwt_secret: String::new(),
                token_ttl_days: 30,
                member_fee: 200,
            },
            fines: FineConfig::default(),
            catalog: CatalogConfig::default(),
            payments: PaymentConfig::default(),
        }
    }
}
