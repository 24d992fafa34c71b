//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Upload directory path (the `documents` store)
    pub upload_dir: String,
    /// Frontend assets directory
    pub frontend_dir: String,
    /// Session expiration in hours
    pub session_expiry_hours: i64,
    /// Maximum upload file size in bytes
    pub max_upload_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Designated system-owner email; permanently a lead admin, never
    /// revocable or deletable
    pub owner_email: String,
    /// Outbound email settings
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

/// Notification dispatcher settings.
///
/// The transport settings are optional: the portal runs without them and the
/// dispatcher degrades to logging, but the public notify/contact endpoints
/// fail closed naming what is missing.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub smtp: Option<SmtpSettings>,
    /// From address for transactional mail
    pub from_email: Option<String>,
    /// Display name on the from address
    pub from_name: String,
    /// Admin alias that receives broadcast notifications and contact mail
    pub admin_email: Option<String>,
    /// Portal URL used in the email template button
    pub portal_url: String,
    /// Timeout for lifecycle notification sends, in seconds
    pub send_timeout_secs: u64,
    /// Timeout for the contact-form send, in seconds
    pub contact_timeout_secs: u64,
    /// Send an acknowledgement email to contact-form submitters
    pub send_ack: bool,
    /// Test the SMTP connection before the first send
    pub verify_connection: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl NotifyConfig {
    fn from_env() -> Self {
        fn get(key: &str) -> Option<String> {
            env::var(key).ok().filter(|s| !s.trim().is_empty())
        }

        let smtp = match (get("SMTP_HOST"), get("SMTP_USER"), get("SMTP_PASS")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpSettings {
                host,
                port: get("SMTP_PORT").and_then(|p| p.parse().ok()).unwrap_or(465),
                username,
                password,
            }),
            _ => None,
        };

        Self {
            smtp,
            from_email: get("EMAIL_FROM"),
            from_name: get("EMAIL_FROM_NAME").unwrap_or_else(|| "TaxDesk Support".to_string()),
            admin_email: get("EMAIL_TO"),
            portal_url: get("PORTAL_URL").unwrap_or_else(|| "https://portal.taxdesk.tax".to_string()),
            send_timeout_secs: get("NOTIFY_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            contact_timeout_secs: get("CONTACT_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(25),
            send_ack: get("CONTACT_SEND_ACK")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            verify_connection: get("SMTP_VERIFY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Env vars still needed before `/api/notify` can send
    pub fn missing_for_notify(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.smtp.is_none() {
            missing.extend(["SMTP_HOST", "SMTP_USER", "SMTP_PASS"]);
        }
        if self.from_email.is_none() {
            missing.push("EMAIL_FROM");
        }
        missing
    }

    /// Env vars still needed before the contact form can send
    pub fn missing_for_contact(&self) -> Vec<&'static str> {
        let mut missing = self.missing_for_notify();
        if self.admin_email.is_none() {
            missing.push("EMAIL_TO");
        }
        missing
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // Build DATABASE_URL from either the standard var or individual
        // components (DATABASE_HOST, DATABASE_PORT, DATABASE_USER,
        // DATABASE_PASSWORD, DATABASE_DB)
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| {
                let host = env::var("DATABASE_HOST").map_err(|_| env::VarError::NotPresent)?;
                let port = env::var("DATABASE_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_USER").map_err(|_| env::VarError::NotPresent)?;
                let password =
                    env::var("DATABASE_PASSWORD").map_err(|_| env::VarError::NotPresent)?;
                let db = env::var("DATABASE_DB").map_err(|_| env::VarError::NotPresent)?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_: env::VarError| {
                ConfigError::Missing(
                    "DATABASE_URL or DATABASE_HOST + DATABASE_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url,
            upload_dir: env::var("UPLOAD_DIR")
                .or_else(|_| {
                    env::var("DATA_PATH").map(|p| format!("{}/documents", p.trim_end_matches('/')))
                })
                .unwrap_or_else(|_| "/app/documents".to_string()),
            frontend_dir: env::var("FRONTEND_DIR").unwrap_or_else(|_| "./frontend".to_string()),
            session_expiry_hours: env::var("SESSION_EXPIRY_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(24),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25 * 1024 * 1024), // 25MB default
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["http://localhost:8080".to_string()]),
            environment,
            owner_email: env::var("OWNER_EMAIL")
                .unwrap_or_else(|_| "info@taxdesk.tax".to_string())
                .to_lowercase(),
            notify: NotifyConfig::from_env(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
