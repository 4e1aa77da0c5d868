use std::time::Duration;

use crate::ConfigError;

pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub const ENGINE_URL_ENV: &str = "ATC_ENGINE_URL";
pub const ENGINE_TIMEOUT_ENV: &str = "ATC_ENGINE_TIMEOUT_MS";
pub const ENGINE_ROUTES_ENV: &str = "ATC_ENGINE_ROUTES";

/// Engine endpoint paths, relative to the base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    pub reset: String,
    pub step: String,
    pub state: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self::under("simulation", "state")
    }
}

impl Routes {
    /// Paths served by engines predating the English route names.
    pub fn legacy() -> Self {
        Self::under("simulacion", "estado")
    }

    pub fn under(prefix: &str, state: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            reset: format!("{prefix}/reset"),
            step: format!("{prefix}/step"),
            state: format!("{prefix}/{state}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Per-request timeout applied by the HTTP transport.
    pub timeout: Duration,
    pub routes: Routes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ENGINE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            routes: Routes::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_routes(mut self, routes: Routes) -> Self {
        self.routes = routes;
        self
    }

    /// Defaults overridden by `ATC_ENGINE_URL`, `ATC_ENGINE_TIMEOUT_MS` and
    /// `ATC_ENGINE_ROUTES` (`default` or `legacy`). Blank values are ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = value(ENGINE_URL_ENV) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = value(ENGINE_TIMEOUT_ENV) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|millis| *millis > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    name: ENGINE_TIMEOUT_ENV,
                    value: raw.clone(),
                })?;
            config.timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = value(ENGINE_ROUTES_ENV) {
            config.routes = match raw.trim().to_lowercase().as_str() {
                "default" | "simulation" => Routes::default(),
                "legacy" | "simulacion" => Routes::legacy(),
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENGINE_ROUTES_ENV,
                        value: raw,
                    })
                }
            };
        }

        Ok(config)
    }
}
