use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;

use crate::workflows::scoring::UnknownScorePolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub fulfillment: FulfillmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let score_policy = match env::var("FULFILLMENT_SCORE_POLICY") {
            Ok(raw) => UnknownScorePolicy::parse(&raw)
                .ok_or(ConfigError::InvalidScorePolicy { value: raw })?,
            Err(_) => UnknownScorePolicy::default(),
        };

        let invite_window_hours = env::var("FULFILLMENT_INVITE_WINDOW_HOURS")
            .unwrap_or_else(|_| DEFAULT_INVITE_WINDOW_HOURS.to_string())
            .parse::<u32>()
            .ok()
            .filter(|hours| *hours > 0)
            .ok_or(ConfigError::InvalidInviteWindow)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            fulfillment: FulfillmentConfig {
                score_policy,
                invite_window_hours,
            },
        })
    }
}

const DEFAULT_INVITE_WINDOW_HOURS: u32 = 48;

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for ranking and invite-chain pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillmentConfig {
    pub score_policy: UnknownScorePolicy,
    pub invite_window_hours: u32,
}

impl FulfillmentConfig {
    /// How long an invitee may sit on a friend-ask before the chain moves on.
    pub fn invite_window(&self) -> Duration {
        Duration::hours(i64::from(self.invite_window_hours))
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            score_policy: UnknownScorePolicy::default(),
            invite_window_hours: DEFAULT_INVITE_WINDOW_HOURS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidScorePolicy { value: String },
    InvalidInviteWindow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidScorePolicy { value } => write!(
                f,
                "FULFILLMENT_SCORE_POLICY must be 'zero' or 'renormalize' (got '{}')",
                value
            ),
            ConfigError::InvalidInviteWindow => write!(
                f,
                "FULFILLMENT_INVITE_WINDOW_HOURS must be a positive whole number of hours"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidScorePolicy { .. }
            | ConfigError::InvalidInviteWindow => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("FULFILLMENT_SCORE_POLICY");
        env::remove_var("FULFILLMENT_INVITE_WINDOW_HOURS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.fulfillment, FulfillmentConfig::default());
        assert_eq!(config.fulfillment.invite_window(), Duration::hours(48));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_renormalize_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FULFILLMENT_SCORE_POLICY", "Renormalize");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.fulfillment.score_policy,
            UnknownScorePolicy::Renormalize
        );
        reset_env();
    }

    #[test]
    fn rejects_unknown_policy_and_zero_window() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("FULFILLMENT_SCORE_POLICY", "average");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidScorePolicy { .. })
        ));

        reset_env();
        env::set_var("FULFILLMENT_INVITE_WINDOW_HOURS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidInviteWindow)
        ));
        reset_env();
    }
}
