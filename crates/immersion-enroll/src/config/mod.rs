use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

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
    pub wizard: WizardConfig,
    pub roster: RosterConfig,
    pub store: StoreConfig,
    pub admin: AdminConfig,
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

        let debounce_ms = env::var("VERIFY_DEBOUNCE_MS")
            .unwrap_or_else(|_| "800".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidDebounce)?;
        let track_capacity = env::var("TRACK_CAPACITY")
            .unwrap_or_else(|_| "40".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidCapacity)?;
        let roster_cache_ttl_secs = env::var("ROSTER_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidRosterTtl)?;

        let roster_url = env::var("ROSTER_URL").ok().filter(|url| !url.is_empty());

        let supabase_url = env::var("SUPABASE_URL").ok().filter(|url| !url.is_empty());
        let supabase_anon_key = env::var("SUPABASE_ANON_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let supabase = match (supabase_url, supabase_anon_key) {
            (Some(url), Some(anon_key)) => Some(SupabaseConfig { url, anon_key }),
            (Some(_), None) => return Err(ConfigError::MissingSupabaseKey),
            (None, _) => None,
        };

        let admin_username = env::var("ADMIN_USERNAME").ok().filter(|v| !v.is_empty());
        let admin_password = env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty());
        let credentials = match (admin_username, admin_password) {
            (Some(username), Some(password)) => Some(AdminCredentialConfig { username, password }),
            _ => None,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            wizard: WizardConfig {
                debounce_ms,
                track_capacity,
                roster_cache_ttl_secs,
            },
            roster: RosterConfig { url: roster_url },
            store: StoreConfig { supabase },
            admin: AdminConfig { credentials },
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

/// Knobs for the wizard core: debounce window, uniform track ceiling, and
/// roster cache lifetime.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub debounce_ms: u64,
    pub track_capacity: u32,
    pub roster_cache_ttl_secs: u64,
}

impl WizardConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn roster_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.roster_cache_ttl_secs)
    }
}

/// Location of the hosted roster sheet. Absent in development, where the
/// in-memory fixture roster is used instead.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    pub url: Option<String>,
}

/// Hosted enrollment store settings. Absent in development.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub supabase: Option<SupabaseConfig>,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// Admin console credentials. When unset, every login attempt is rejected.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub credentials: Option<AdminCredentialConfig>,
}

#[derive(Debug, Clone)]
pub struct AdminCredentialConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDebounce,
    InvalidCapacity,
    InvalidRosterTtl,
    MissingSupabaseKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDebounce => {
                write!(f, "VERIFY_DEBOUNCE_MS must be a non-negative integer")
            }
            ConfigError::InvalidCapacity => {
                write!(f, "TRACK_CAPACITY must be a non-negative integer")
            }
            ConfigError::InvalidRosterTtl => {
                write!(f, "ROSTER_CACHE_TTL_SECS must be a non-negative integer")
            }
            ConfigError::MissingSupabaseKey => {
                write!(f, "SUPABASE_ANON_KEY is required when SUPABASE_URL is set")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
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
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "VERIFY_DEBOUNCE_MS",
            "TRACK_CAPACITY",
            "ROSTER_CACHE_TTL_SECS",
            "ROSTER_URL",
            "SUPABASE_URL",
            "SUPABASE_ANON_KEY",
            "ADMIN_USERNAME",
            "ADMIN_PASSWORD",
        ] {
            env::remove_var(key);
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
        assert_eq!(config.wizard.debounce(), Duration::from_millis(800));
        assert_eq!(config.wizard.track_capacity, 40);
        assert_eq!(config.wizard.roster_cache_ttl(), Duration::from_secs(300));
        assert!(config.roster.url.is_none());
        assert!(config.store.supabase.is_none());
        assert!(config.admin.credentials.is_none());
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
    fn rejects_supabase_url_without_key() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SUPABASE_URL", "https://example.supabase.co");
        let result = AppConfig::load();
        assert!(matches!(result, Err(ConfigError::MissingSupabaseKey)));
        reset_env();
    }

    #[test]
    fn rejects_malformed_capacity() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("TRACK_CAPACITY", "forty");
        let result = AppConfig::load();
        assert!(matches!(result, Err(ConfigError::InvalidCapacity)));
        reset_env();
    }
}
