use std::env;

use thiserror::Error;

/// Minimum key material accepted for signing session cookies.
pub const MIN_SECRET_LEN: usize = 64;

/// Longest accepted session lifetime (ten years). Anything larger overflows the
/// cookie expiry date and no cookie is ever issued.
pub const MAX_SESSION_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

const LOCAL_SESSION_SECRET: &str =
    "local-only-session-secret-do-not-use-in-production-0123456789abcdef";

/// AppConfig
///
/// Holds the application's entire configuration state. It is built once in `main`,
/// handed to `AppState`, and pulled into handlers and middleware via `FromRef`.
/// Nothing reads the environment after startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format, cookie `Secure` flag and secret strictness.
    pub env: Env,
    // Interface to bind the HTTP listener to.
    pub host: String,
    // Port to bind the HTTP listener to.
    pub port: u16,
    // Memcached (or Couchbase memcached bucket) endpoint, e.g. `memcache://127.0.0.1:11211`.
    pub memcached_url: String,
    // Prefix applied to every session key written to memcached.
    pub session_namespace: String,
    // Key material used to sign the session cookie.
    pub session_secret: String,
    // Name of the cookie carrying the session id.
    pub cookie_name: String,
    // Inactivity expiry for the session cookie and the stored record, in seconds.
    pub session_ttl_secs: i64,
}

/// Env
///
/// Defines the runtime context.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SESSION_SECRET must be set in production")]
    MissingSecret,

    #[error("SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe values for test setup, so no environment variables are needed to build state.
    fn default() -> Self {
        Self {
            env: Env::Local,
            host: "127.0.0.1".to_string(),
            port: 3000,
            memcached_url: "memcache://127.0.0.1:11211".to_string(),
            session_namespace: "sessions:".to_string(),
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            cookie_name: "sid".to_string(),
            session_ttl_secs: 86_400,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables. Production refuses to start
    /// without an explicit `SESSION_SECRET`; local falls back to a development secret.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let session_secret = match (env, env::var("SESSION_SECRET")) {
            (_, Ok(secret)) => secret,
            (Env::Production, Err(_)) => return Err(ConfigError::MissingSecret),
            (Env::Local, Err(_)) => LOCAL_SESSION_SECRET.to_string(),
        };
        if session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::SecretTooShort(session_secret.len()));
        }

        let defaults = Self::default();

        Ok(Self {
            env,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", defaults.port)?,
            memcached_url: env::var("MEMCACHED_URL").unwrap_or(defaults.memcached_url),
            session_namespace: env::var("SESSION_NAMESPACE")
                .unwrap_or(defaults.session_namespace),
            session_secret,
            cookie_name: env::var("SESSION_COOKIE_NAME").unwrap_or(defaults.cookie_name),
            session_ttl_secs: parse_ttl(defaults.session_ttl_secs)?,
        })
    }

    /// Combines host and port into the form `TcpListener::bind` expects.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cookies are only marked `Secure` outside local development.
    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn parse_ttl(default: i64) -> Result<i64, ConfigError> {
    let ttl = parse_var("SESSION_TTL_SECS", default)?;
    if (1..=MAX_SESSION_TTL_SECS).contains(&ttl) {
        Ok(ttl)
    } else {
        Err(ConfigError::Invalid {
            name: "SESSION_TTL_SECS",
            value: ttl.to_string(),
        })
    }
}
