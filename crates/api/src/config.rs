//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `FRONTEND_BASE_URL` - Public URL of the web client (checkout return pages)
//! - `JWT_ACCESS_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - Refresh token signing secret (min 32 chars, high
//!   entropy, different from the access secret)
//! - `STRIPE_SECRET_KEY` - Payment provider API key
//! - `STRIPE_WEBHOOK_SIGNING_SECRET` - Webhook endpoint signing secret
//!
//! ## Optional
//! - `APP_HOST` - Bind address (default: 127.0.0.1)
//! - `APP_PORT` - Listen port (default: 3000)
//! - `APP_ENV` - `production` marks the refresh cookie `Secure` (default: development)
//! - `STRIPE_API_BASE` - Provider API base URL (default: <https://api.stripe.com>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("production") {
            Self::Production
        } else {
            Self::Development
        }
    }
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    pub environment: Environment,
    /// Web client base URL; checkout return pages hang off it
    pub frontend_base_url: Url,
    pub auth: AuthConfig,
    pub stripe: StripeConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Token signing secrets.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
}

/// Payment provider configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_signing_secret: SecretString,
    pub api_base: Url,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Same as [`ApiConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };

        let database_url = env.required_secret("DATABASE_URL")?;
        let host = env.parse_or_default::<IpAddr>("APP_HOST", "127.0.0.1")?;
        let port = env.parse_or_default::<u16>("APP_PORT", "3000")?;
        let environment = Environment::parse(&env.or_default("APP_ENV", "development"));
        let frontend_base_url = env.url("FRONTEND_BASE_URL", None)?;

        let auth = AuthConfig {
            access_token_secret: env.token_secret("JWT_ACCESS_SECRET")?,
            refresh_token_secret: env.token_secret("JWT_REFRESH_SECRET")?,
        };
        if auth.access_token_secret.expose_secret() == auth.refresh_token_secret.expose_secret() {
            return Err(ConfigError::InsecureSecret(
                "JWT_REFRESH_SECRET".to_string(),
                "must differ from JWT_ACCESS_SECRET".to_string(),
            ));
        }

        let stripe = StripeConfig {
            secret_key: env.required_secret("STRIPE_SECRET_KEY")?,
            webhook_signing_secret: env.required_secret("STRIPE_WEBHOOK_SIGNING_SECRET")?,
            api_base: env.url("STRIPE_API_BASE", Some(DEFAULT_STRIPE_API_BASE))?,
        };

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            frontend_base_url,
            auth,
            stripe,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or_default<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn url(&self, key: &str, default: Option<&str>) -> Result<Url, ConfigError> {
        let raw = match default {
            Some(default) => self.or_default(key, default),
            None => self.required(key)?,
        };
        Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    fn required_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        self.required(key).map(SecretString::from)
    }

    /// Load a token signing secret and check length, placeholders and entropy.
    fn token_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let secret = self.required_secret(key)?;
        validate_secret_length(&secret, key)?;
        validate_secret_strength(secret.expose_secret(), key)?;
        Ok(secret)
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let length = secret.expose_secret().chars().count();
    if length < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must be at least {MIN_TOKEN_SECRET_LENGTH} characters (got {length})"),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // Secret length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ACCESS: &str = "a7Kp2xQ9mZ4vR8tY1wE6uI3oP5sD0fGh";
    const REFRESH: &str = "Zx8Cv2Bn6Mq4Wr1Ty9Ui3Op7As5Df0Gh";

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgres://app:pw@localhost/cartline".to_string()),
            ("FRONTEND_BASE_URL", "https://shop.test".to_string()),
            ("JWT_ACCESS_SECRET", ACCESS.to_string()),
            ("JWT_REFRESH_SECRET", REFRESH.to_string()),
            ("STRIPE_SECRET_KEY", "sk_test_4eC39HqLyjWDarjtT1zdp7dc".to_string()),
            ("STRIPE_WEBHOOK_SIGNING_SECRET", "whsec_9f8e7d6c5b4a".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<ApiConfig, ConfigError> {
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_loads_with_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.secure_cookies());
        assert_eq!(config.stripe.api_base.as_str(), "https://api.stripe.com/");
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_production_enables_secure_cookies() {
        let mut vars = base_vars();
        vars.insert("APP_ENV", "Production".to_string());
        assert!(load(&vars).unwrap().secure_cookies());
    }

    #[test]
    fn test_missing_required() {
        let mut vars = base_vars();
        vars.remove("STRIPE_WEBHOOK_SIGNING_SECRET");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::MissingEnvVar(key)) if key == "STRIPE_WEBHOOK_SIGNING_SECRET"
        ));
    }

    #[test]
    fn test_invalid_port_and_url() {
        let mut vars = base_vars();
        vars.insert("APP_PORT", "http".to_string());
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(..))));

        let mut vars = base_vars();
        vars.insert("FRONTEND_BASE_URL", "not a url".to_string());
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(..))));
    }

    #[test]
    fn test_token_secrets_must_differ() {
        let mut vars = base_vars();
        vars.insert("JWT_REFRESH_SECRET", ACCESS.to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InsecureSecret(key, _)) if key == "JWT_REFRESH_SECRET"
        ));
    }

    #[test]
    fn test_short_token_secret() {
        let mut vars = base_vars();
        vars.insert("JWT_ACCESS_SECRET", "aB3$xY9!mK2@".to_string());
        assert!(matches!(
            load(&vars),
            Err(ConfigError::InsecureSecret(..))
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", load(&base_vars()).unwrap());
        assert!(!debug.contains(ACCESS));
        assert!(!debug.contains("sk_test_"));
        assert!(!debug.contains("app:pw"));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(matches!(
            validate_secret_strength("your-api-key-here", "TEST_VAR"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
        assert!(
            validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err()
        );
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }
}
