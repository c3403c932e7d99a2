use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::enrollment::{Credits, EnrollmentPolicy};

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
    pub enrollment: EnrollmentPolicy,
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
            enrollment: load_policy()?,
        })
    }
}

fn load_policy() -> Result<EnrollmentPolicy, ConfigError> {
    let defaults = EnrollmentPolicy::default();

    let max_credits = credits_var("REGISTRAR_MAX_CREDITS")?.unwrap_or(defaults.max_credits);
    let min_credits = match env::var("REGISTRAR_MIN_CREDITS") {
        Ok(raw) if raw.trim().eq_ignore_ascii_case("none") => None,
        Ok(_) => credits_var("REGISTRAR_MIN_CREDITS")?,
        Err(_) => defaults.min_credits,
    };
    if let Some(minimum) = min_credits {
        if minimum > max_credits {
            return Err(ConfigError::InvertedCreditBounds {
                minimum,
                maximum: max_credits,
            });
        }
    }

    Ok(EnrollmentPolicy {
        max_credits,
        min_credits,
        min_on_admission: flag_var("REGISTRAR_MIN_ON_ADMISSION")?
            .unwrap_or(defaults.min_on_admission),
        min_on_drop: flag_var("REGISTRAR_MIN_ON_DROP")?.unwrap_or(defaults.min_on_drop),
        retake_guard: flag_var("REGISTRAR_RETAKE_GUARD")?.unwrap_or(defaults.retake_guard),
    })
}

fn credits_var(name: &'static str) -> Result<Option<Credits>, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<Credits>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidCredits { variable: name, value: raw })
}

fn flag_var(name: &'static str) -> Result<Option<bool>, ConfigError> {
    let Ok(raw) = env::var(name) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidFlag { variable: name, value: raw }),
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

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCredits { variable: &'static str, value: String },
    InvalidFlag { variable: &'static str, value: String },
    InvertedCreditBounds { minimum: Credits, maximum: Credits },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCredits { variable, value } => write!(
                f,
                "{variable} must be a non-negative credit amount, got '{value}'"
            ),
            ConfigError::InvalidFlag { variable, value } => {
                write!(f, "{variable} must be true or false, got '{value}'")
            }
            ConfigError::InvertedCreditBounds { minimum, maximum } => write!(
                f,
                "REGISTRAR_MIN_CREDITS ({minimum}) exceeds REGISTRAR_MAX_CREDITS ({maximum})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCredits { .. }
            | ConfigError::InvalidFlag { .. }
            | ConfigError::InvertedCreditBounds { .. } => None,
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
        for name in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "REGISTRAR_MAX_CREDITS",
            "REGISTRAR_MIN_CREDITS",
            "REGISTRAR_MIN_ON_ADMISSION",
            "REGISTRAR_MIN_ON_DROP",
            "REGISTRAR_RETAKE_GUARD",
        ] {
            env::remove_var(name);
        }
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
        assert_eq!(config.enrollment, EnrollmentPolicy::default());
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
    fn reads_enrollment_policy_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REGISTRAR_MAX_CREDITS", "45.5");
        env::set_var("REGISTRAR_MIN_CREDITS", "none");
        env::set_var("REGISTRAR_MIN_ON_DROP", "yes");
        env::set_var("REGISTRAR_RETAKE_GUARD", "off");

        let policy = AppConfig::load().expect("config loads").enrollment;
        reset_env();

        assert_eq!(policy.max_credits, Credits::from_tenths(455));
        assert_eq!(policy.min_credits, None);
        assert!(policy.min_on_drop);
        assert!(!policy.min_on_admission);
        assert!(!policy.retake_guard);
    }

    #[test]
    fn rejects_malformed_policy_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();

        env::set_var("REGISTRAR_MAX_CREDITS", "lots");
        match AppConfig::load() {
            Err(ConfigError::InvalidCredits { variable, .. }) => {
                assert_eq!(variable, "REGISTRAR_MAX_CREDITS")
            }
            other => panic!("expected invalid credits, got {other:?}"),
        }

        reset_env();
        env::set_var("REGISTRAR_MIN_ON_ADMISSION", "maybe");
        match AppConfig::load() {
            Err(ConfigError::InvalidFlag { .. }) => {}
            other => panic!("expected invalid flag, got {other:?}"),
        }

        reset_env();
        env::set_var("REGISTRAR_MAX_CREDITS", "12");
        env::set_var("REGISTRAR_MIN_CREDITS", "15");
        match AppConfig::load() {
            Err(ConfigError::InvertedCreditBounds { .. }) => {}
            other => panic!("expected inverted bounds, got {other:?}"),
        }
        reset_env();
    }
}
