use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const DEFAULT_REFRESH_COOKIE: &str = "RefreshingFactors";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8000, worker_threads: Some(4) }
    }
}

/// Database settings. An empty `url` runs the server on the in-memory user directory.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }

/// Token and cookie settings for the session subsystem.
#[derive(Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub access_secret: String,
    #[serde(default)]
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_refresh_ttl")]
    pub cookie_max_age_secs: u64,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
}

fn default_access_ttl() -> u64 { 3600 }
fn default_refresh_ttl() -> u64 { 24 * 3600 }
fn default_cookie_name() -> String { DEFAULT_REFRESH_COOKIE.to_string() }
fn default_cookie_path() -> String { "/".to_string() }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
            cookie_name: default_cookie_name(),
            cookie_max_age_secs: default_refresh_ttl(),
            cookie_secure: false,
            cookie_path: default_cookie_path(),
        }
    }
}

// Secrets stay out of Debug output.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .field("cookie_max_age_secs", &self.cookie_max_age_secs)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_path", &self.cookie_path)
            .finish()
    }
}

/// Global request throttle applied ahead of the auth guard.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bucket size: requests admitted per window.
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

fn default_true() -> bool { true }
fn default_limit() -> u64 { 10 }
fn default_window() -> u64 { 60 }

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { enabled: true, limit: default_limit(), window_secs: default_window() }
    }
}

/// Load from `CONFIG_PATH` (default `config.toml`).
pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_or_default(&path)
}

/// A missing file yields defaults. Unreadable or invalid files are errors.
pub fn load_or_default(path: &str) -> Result<AppConfig> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse(&content).with_context(|| format!("invalid config file {path}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(anyhow!(e).context(format!("cannot read config file {path}"))),
    }
}

pub fn parse(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or defaults when it is absent), apply environment overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Overlay values taken from the environment. `lookup` is injected so tests avoid process env.
    /// Numeric variables that are set but do not parse are errors.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("SERVER_PORT must be a port number, got {port:?}"))?;
        }
        if self.database.url.trim().is_empty() {
            if let Some(url) = lookup("DATABASE_URL") {
                self.database.url = url;
            }
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.access_secret = secret;
        }
        if let Some(secret) = lookup("JWT_REFRESH_SECRET") {
            self.auth.refresh_secret = secret;
        }
        if let Some(ttl) = lookup("JWT_EXPIRATION") {
            self.auth.access_ttl_secs = ttl
                .trim()
                .parse::<u64>()
                .with_context(|| format!("JWT_EXPIRATION must be a number of seconds, got {ttl:?}"))?;
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.validate()?;
        self.auth.validate()?;
        self.throttle.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_configured() {
            return Ok(());
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://")) {
            return Err(anyhow!("database.url must start with postgresql:// or postgres://"));
        }
        if self.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be >= 1"));
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.access_secret.is_empty() || self.refresh_secret.is_empty() {
            return Err(anyhow!("auth.access_secret and auth.refresh_secret are required (JWT_SECRET / JWT_REFRESH_SECRET)"));
        }
        if self.access_secret == self.refresh_secret {
            return Err(anyhow!("auth.access_secret and auth.refresh_secret must differ"));
        }
        if self.access_ttl_secs == 0 || self.refresh_ttl_secs == 0 || self.cookie_max_age_secs == 0 {
            return Err(anyhow!("auth token and cookie lifetimes must be positive"));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(anyhow!("auth.cookie_name must not be empty"));
        }
        Ok(())
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && (self.limit == 0 || self.window_secs == 0) {
            return Err(anyhow!("throttle.limit and throttle.window_secs must be positive"));
        }
        Ok(())
    }
}
