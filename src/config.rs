//! Server configuration: listen address, default-header behavior, and
//! shutdown drain timing. Loaded from a TOML/JSON file (falling back to
//! built-in defaults) with `RELIC_*` environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_powered_by() -> Option<String> {
    Some("Relic".to_string())
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_apply_default_headers() -> bool {
    true
}

fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelicConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Value for the `X-Powered-By` header. `None` suppresses the header.
    #[serde(default = "default_powered_by")]
    pub powered_by: Option<String>,

    /// Whether `Date`/`X-Powered-By` are stamped on responses at all.
    #[serde(default = "default_apply_default_headers")]
    pub apply_default_headers: bool,

    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Requests whose `Content-Length` exceeds this are rejected at the
    /// header layer, before the body is ever read.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,
}

impl Default for RelicConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            powered_by: default_powered_by(),
            apply_default_headers: default_apply_default_headers(),
            drain_timeout_secs: default_drain_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl RelicConfig {
    /// Load from `path` if it exists (format dispatched by extension), or
    /// fall back to defaults, then apply `RELIC_*` env var overrides and
    /// validate the result.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config: RelicConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => anyhow::bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            tracing::info!("config file not found at {}, using defaults", path.display());
            RelicConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!("server: configuration loaded, listen={}", config.listen);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELIC_LISTEN") {
            self.listen = v;
        }
        if let Ok(v) = std::env::var("RELIC_POWERED_BY") {
            self.powered_by = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("RELIC_APPLY_DEFAULT_HEADERS") {
            self.apply_default_headers = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("RELIC_DRAIN_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                self.drain_timeout_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("RELIC_MAX_BODY_BYTES") {
            if let Ok(bytes) = v.parse() {
                self.max_body_bytes = bytes;
            }
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            anyhow::bail!("invalid listen address: '{}'", self.listen);
        }
        if self.drain_timeout_secs == 0 {
            anyhow::bail!("drain_timeout_secs must be greater than zero");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than zero");
        }
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
