//! Configuration management for TokenDesk
//!
//! Loads from optional config files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub poller: PollerConfig,
    pub providers: ProvidersConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL applied to merged listings, in seconds
    pub ttl_secs: u64,
    /// External shared store connection string; absence selects the
    /// in-process store for the lifetime of the process
    pub store_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Delay between the end of one broadcast tick and the start of the next
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub dexscreener: ProviderConfig,
    pub geckoterminal: ProviderConfig,
    pub jupiter: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Requests-per-minute budget granted by the provider. Informational
    /// for operators; not enforced in-process.
    pub rpm: u32,
    /// Maximum attempts per call (first try included)
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Volume spike threshold in percent (reserved for future use)
    pub volume_spike_pct: f64,
    /// Price delta threshold in percent (reserved for future use)
    pub price_delta_pct: f64,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Server defaults
            .set_default("server.port", 8080)?
            // Cache defaults
            .set_default("cache.ttl_secs", 30)?
            // Poller defaults
            .set_default("poller.interval_ms", 5000)?
            // DexScreener defaults
            .set_default("providers.dexscreener.enabled", true)?
            .set_default(
                "providers.dexscreener.base_url",
                "https://api.dexscreener.com/latest/dex",
            )?
            .set_default("providers.dexscreener.timeout_ms", 8000)?
            .set_default("providers.dexscreener.rpm", 280)?
            .set_default("providers.dexscreener.max_attempts", 5)?
            .set_default("providers.dexscreener.base_delay_ms", 250)?
            // GeckoTerminal defaults
            .set_default("providers.geckoterminal.enabled", true)?
            .set_default(
                "providers.geckoterminal.base_url",
                "https://api.geckoterminal.com/api/v2",
            )?
            .set_default("providers.geckoterminal.timeout_ms", 8000)?
            .set_default("providers.geckoterminal.rpm", 120)?
            .set_default("providers.geckoterminal.max_attempts", 5)?
            .set_default("providers.geckoterminal.base_delay_ms", 250)?
            // Jupiter defaults
            .set_default("providers.jupiter.enabled", true)?
            .set_default("providers.jupiter.base_url", "https://price.jup.ag/v4")?
            .set_default("providers.jupiter.timeout_ms", 7000)?
            .set_default("providers.jupiter.rpm", 200)?
            .set_default("providers.jupiter.max_attempts", 5)?
            .set_default("providers.jupiter.base_delay_ms", 250)?
            // Alert defaults
            .set_default("alerts.volume_spike_pct", 30.0)?
            .set_default("alerts.price_delta_pct", 1.0)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (TOKENDESK_*)
            .add_source(Environment::with_prefix("TOKENDESK").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Generate a digest of the config for startup logging
    pub fn digest(&self) -> String {
        format!(
            "port={} ttl={}s poll={}ms store={} providers=[ds:{} gt:{} jup:{}]",
            self.server.port,
            self.cache.ttl_secs,
            self.poller.interval_ms,
            if self.cache.store_url.is_some() {
                "external"
            } else {
                "memory"
            },
            self.providers.dexscreener.enabled,
            self.providers.geckoterminal.enabled,
            self.providers.jupiter.enabled,
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
