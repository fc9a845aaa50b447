//! Client configuration: per-backend transport settings, signature key
//! material, and the process-wide default API key.
//!
//! Defaults point at the public Random.org endpoints. A JSON file named by
//! `RANDOM_ORG_CONFIG` may override any field; `RANDOM_ORG_API_KEY` supplies
//! the default key and is read once per process.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::request::BackendKind;

pub const DEFAULT_GET_URL: &str = "https://www.random.org/integers/";
pub const DEFAULT_RPC_URL: &str = "https://api.random.org/json-rpc/4/invoke";

/// Environment variable holding the default API key.
pub const API_KEY_ENV: &str = "RANDOM_ORG_API_KEY";
/// Environment variable naming an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "RANDOM_ORG_CONFIG";

const DEFAULT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

static DEFAULT_API_KEY: LazyLock<Option<String>> =
    LazyLock::new(|| non_blank(std::env::var(API_KEY_ENV).ok()));

/// The API key from `RANDOM_ORG_API_KEY`, read on first use and kept for the
/// life of the process.
pub fn default_api_key() -> Option<&'static str> {
    DEFAULT_API_KEY.as_deref()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// How a backend authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No credentials (the plain GET interface).
    #[default]
    Anonymous,
    /// An API key travels in the request parameters.
    ApiKey,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::ApiKey => write!(f, "api_key"),
        }
    }
}

/// Connection parameters for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    pub base_url: String,
    /// Credentials mode. Unset means the backend's own mode; a mode the
    /// backend cannot speak fails [`ClientConfig::validate`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthMode>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>, auth: AuthMode) -> Self {
        Self {
            base_url: base_url.into(),
            auth: Some(auth),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// This config with per-call overrides applied.
    pub fn apply(&self, overrides: &Overrides) -> Self {
        Self {
            base_url: overrides
                .base_url
                .clone()
                .unwrap_or_else(|| self.base_url.clone()),
            auth: self.auth,
            timeout_ms: overrides
                .timeout
                .map(|t| t.as_millis() as u64)
                .unwrap_or(self.timeout_ms),
        }
    }
}

/// Per-call overrides of the process-wide transport defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

/// Knobs specific to the plain-text GET interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetOptions {
    /// Number base of the returned integers: 2, 8, 10 or 16.
    pub base: u32,
    /// Columns in the plain-text layout.
    pub columns: u32,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            base: 10,
            columns: 1,
        }
    }
}

/// Where signature verification gets its public key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Inline PEM. Takes priority over `public_key_url`.
    pub public_key_pem: Option<String>,
    /// URL serving the service's PEM public key; fetched once per process.
    pub public_key_url: Option<String>,
}

/// Full client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub http_get: TransportConfig,
    pub json_rpc: TransportConfig,
    pub vendor: TransportConfig,
    pub convenience: TransportConfig,
    pub get_options: GetOptions,
    pub signature: SignatureConfig,
    /// Fixed pause before the single retry of a failed network call.
    pub retry_delay_ms: u64,
    /// Overrides the environment default key when set.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_get: TransportConfig::new(DEFAULT_GET_URL, AuthMode::Anonymous),
            json_rpc: TransportConfig::new(DEFAULT_RPC_URL, AuthMode::ApiKey),
            vendor: TransportConfig::new(DEFAULT_RPC_URL, AuthMode::ApiKey),
            convenience: TransportConfig::new(DEFAULT_RPC_URL, AuthMode::ApiKey),
            get_options: GetOptions::default(),
            signature: SignatureConfig::default(),
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            api_key: None,
            user_agent: format!("randomorg-core/{}", crate::VERSION),
        }
    }
}

impl ClientConfig {
    /// Defaults, then the file named by `RANDOM_ORG_CONFIG`, then the
    /// process-wide API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        if config.api_key.is_none() {
            config.api_key = default_api_key().map(str::to_string);
        }
        Ok(config)
    }

    /// Same as [`from_env`](Self::from_env) but reading variables through
    /// `lookup` instead of the process environment. The key read here is not
    /// cached.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match non_blank(lookup(CONFIG_PATH_ENV)) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if config.api_key.is_none() {
            config.api_key = non_blank(lookup(API_KEY_ENV));
        }
        Ok(config)
    }

    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        log::debug!("loaded client config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if ![2, 8, 10, 16].contains(&self.get_options.base) {
            return Err(ConfigError::Invalid(format!(
                "get_options.base must be 2, 8, 10 or 16 (got {})",
                self.get_options.base
            )));
        }
        if self.get_options.columns == 0 {
            return Err(ConfigError::Invalid(
                "get_options.columns must be at least 1".into(),
            ));
        }
        for kind in BackendKind::ALL {
            let t = self.transport(kind);
            if t.base_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{kind}.base_url is empty")));
            }
            if t.timeout_ms == 0 {
                return Err(ConfigError::Invalid(format!("{kind}.timeout_ms is zero")));
            }
            let info = crate::transports::info(kind);
            if let Some(mode) = t.auth.filter(|m| *m != info.auth) {
                return Err(ConfigError::Invalid(format!(
                    "{kind}.auth is {mode}, but {kind} ({}) supports only {}",
                    info.description, info.auth
                )));
            }
        }
        Ok(())
    }

    pub fn transport(&self, kind: BackendKind) -> &TransportConfig {
        match kind {
            BackendKind::HttpGet => &self.http_get,
            BackendKind::JsonRpc => &self.json_rpc,
            BackendKind::Vendor => &self.vendor,
            BackendKind::Convenience => &self.convenience,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Point every backend at a single host, e.g. a local stub service.
    pub fn with_service_root(mut self, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        self.http_get.base_url = format!("{root}/integers/");
        let rpc = format!("{root}/json-rpc/4/invoke");
        self.json_rpc.base_url = rpc.clone();
        self.vendor.base_url = rpc.clone();
        self.convenience.base_url = rpc;
        self
    }
}
