use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // JWT
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,

    // Server
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,

    // Outbound requests
    pub request_timeout: Option<Duration>,
    /// Replace `127.0.0.1` in target URLs with the caller's address
    pub rewrite_loopback_host: bool,
}

/// Output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if exists

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            // JWT
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("JWT_EXPIRATION_HOURS"))?,

            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT"))?,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                Ok("text") | Err(_) => LogFormat::Text,
                Ok(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
            },

            // Outbound requests
            request_timeout: match env::var("REQUEST_TIMEOUT_SECONDS") {
                Ok(raw) => Some(Duration::from_secs(
                    raw.parse()
                        .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"))?,
                )),
                Err(_) => None,
            },
            rewrite_loopback_host: env::var("REWRITE_LOOPBACK_HOST")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("REWRITE_LOOPBACK_HOST"))?,
        })
    }

    /// Get server address as "host:port"
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable: {0}")]
    Invalid(&'static str),
}
