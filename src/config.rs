use std::env;

use crate::errors::AppError;

/// Typed view of the environment. Loaded once at startup; shared via
/// `web::Data`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,

    // Payment gateway (Razorpay-compatible REST API).
    pub gateway_base_url: String,
    pub gateway_key_id: String,
    pub gateway_key_secret: String,

    // Design-file storage (download-by-id HTTP API).
    pub storage_base_url: String,
    pub storage_token: String,

    // Transactional mail (HTTP API).
    pub mail_base_url: String,
    pub mail_api_key: String,
    pub mail_sender: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let require = |name: &str| {
            env::var(name)
                .map_err(|_| AppError::Internal(format!("missing environment variable '{name}'")))
        };

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| AppError::Internal(format!("invalid PORT: {e}")))?;

        Ok(Self {
            host,
            port,
            database_url: require("DATABASE_URL")?,
            jwt_secret: require("JWT_SECRET")?,
            gateway_base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".to_string()),
            gateway_key_id: require("RAZORPAY_KEY_ID")?,
            gateway_key_secret: require("RAZORPAY_KEY_SECRET")?,
            storage_base_url: require("FILE_STORAGE_BASE_URL")?,
            storage_token: require("FILE_STORAGE_TOKEN")?,
            mail_base_url: env::var("MAIL_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.brevo.com/v3".to_string()),
            mail_api_key: require("MAIL_API_KEY")?,
            mail_sender: env::var("MAIL_SENDER")
                .unwrap_or_else(|_| "orders@stitchstore.example".to_string()),
        })
    }
}
