use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub realtime: RealtimeConfig,
    pub delivery: DeliveryConfig,
    pub email: EmailConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Interval (seconds) between heartbeat writes on each live connection.
    pub heartbeat_interval_seconds: u64,
    /// How many currently-unread notifications are replayed to a fresh connection.
    pub replay_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Upper bound (seconds) on a single channel's send; a channel that hangs
    /// past this is reported as failed instead of stalling its fan-out branch.
    pub channel_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Whether the email channel is registered at all.
    pub enabled: bool,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for the stream connect endpoint.
    pub stream_per_second: u32,
    /// Burst size for the stream connect endpoint.
    pub stream_burst: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
            },
            realtime: RealtimeConfig {
                heartbeat_interval_seconds: env::var("REALTIME_HEARTBEAT_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30u64),
                replay_limit: env::var("REALTIME_REPLAY_LIMIT")
                    .unwrap_or_else(|_| "50".to_string())
                    .parse()
                    .unwrap_or(50i64),
            },
            delivery: DeliveryConfig {
                channel_timeout_seconds: env::var("DELIVERY_CHANNEL_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10u64),
            },
            email: EmailConfig {
                enabled: match env::var("EMAIL_ENABLED") {
                    Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
                    Err(_) => false,
                },
                from_address: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "no-reply@localhost".to_string()),
            },
            rate_limit: RateLimitConfig {
                stream_per_second: env::var("RATE_LIMIT_STREAM_PER_SECOND")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                stream_burst: env::var("RATE_LIMIT_STREAM_BURST")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
            },
            realtime: RealtimeConfig {
                heartbeat_interval_seconds: 30,
                replay_limit: 50,
            },
            delivery: DeliveryConfig {
                channel_timeout_seconds: 10,
            },
            email: EmailConfig {
                enabled: false,
                from_address: "no-reply@localhost".to_string(),
            },
            rate_limit: RateLimitConfig {
                stream_per_second: 2,
                stream_burst: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_realtime_settings() {
        let cfg = Config::default();
        assert_eq!(cfg.realtime.heartbeat_interval_seconds, 30);
        assert!(cfg.realtime.replay_limit > 0);
        assert!(cfg.delivery.channel_timeout_seconds > 0);
    }
}
