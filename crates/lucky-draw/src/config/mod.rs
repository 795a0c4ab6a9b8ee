use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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
    pub draws: DrawConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            draws: DrawConfig::from_env()?,
        })
    }
}

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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Product rules applied when enrolling properties and accepting registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawPolicy {
    /// Accept windows whose opening instant is already in the past (immediate-start draws).
    pub allow_past_open: bool,
    /// Exact number of ASCII digits a contact phone must contain.
    pub contact_digits: usize,
}

impl Default for DrawPolicy {
    fn default() -> Self {
        Self {
            allow_past_open: true,
            contact_digits: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrawConfig {
    pub policy: DrawPolicy,
    /// Fixed seed for the winner picker; unset means an entropy-seeded generator.
    pub winner_seed: Option<u64>,
}

impl DrawConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = DrawPolicy::default();

        let allow_past_open = match env::var("LUCKY_DRAW_ALLOW_PAST_OPEN") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "LUCKY_DRAW_ALLOW_PAST_OPEN",
            })?,
            Err(_) => defaults.allow_past_open,
        };

        let contact_digits = match env::var("LUCKY_DRAW_CONTACT_DIGITS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|digits| *digits > 0)
                .ok_or(ConfigError::InvalidNumber {
                    key: "LUCKY_DRAW_CONTACT_DIGITS",
                })?,
            Err(_) => defaults.contact_digits,
        };

        let winner_seed = match env::var("LUCKY_DRAW_WINNER_SEED") {
            Ok(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidNumber {
                    key: "LUCKY_DRAW_WINNER_SEED",
                }
            })?),
            Err(_) => None,
        };

        Ok(Self {
            policy: DrawPolicy {
                allow_past_open,
                contact_digits,
            },
            winner_seed,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { key: &'static str },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { key } => {
                write!(f, "{key} must be one of true/false/1/0/yes/no/on/off")
            }
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a positive integer"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvalidNumber { .. } => None,
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
        env::remove_var("LUCKY_DRAW_ALLOW_PAST_OPEN");
        env::remove_var("LUCKY_DRAW_CONTACT_DIGITS");
        env::remove_var("LUCKY_DRAW_WINNER_SEED");
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
        assert_eq!(config.draws.policy, DrawPolicy::default());
        assert!(config.draws.winner_seed.is_none());
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
    fn reads_draw_policy_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LUCKY_DRAW_ALLOW_PAST_OPEN", "off");
        env::set_var("LUCKY_DRAW_CONTACT_DIGITS", "11");
        env::set_var("LUCKY_DRAW_WINNER_SEED", "42");
        let config = AppConfig::load().expect("config loads");
        assert!(!config.draws.policy.allow_past_open);
        assert_eq!(config.draws.policy.contact_digits, 11);
        assert_eq!(config.draws.winner_seed, Some(42));
        reset_env();
    }

    #[test]
    fn rejects_malformed_flag() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("LUCKY_DRAW_ALLOW_PAST_OPEN", "maybe");
        match AppConfig::load() {
            Err(ConfigError::InvalidFlag { key }) => {
                assert_eq!(key, "LUCKY_DRAW_ALLOW_PAST_OPEN")
            }
            other => panic!("expected invalid flag, got {other:?}"),
        }
        reset_env();
    }
}
