use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Remote booking backend. Paths are joined onto `base_url`.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub tickets_path: String,
    pub proofs_path: String,
    pub holds_path: String,
    /// Contains `{booking_ref}`
    pub status_path: String,
    pub media_base_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_timeout() -> u64 { 15 }

/// Service credential used by the background refresh. Request-scoped calls
/// forward the caller's own bearer token instead.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub service_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_threshold")]
    pub full_vehicle_threshold: f64,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_concurrency")]
    pub availability_concurrency: usize,
    #[serde(default = "default_capacity")]
    pub default_vehicle_capacity: u32,
}

fn default_threshold() -> f64 { 10_000.0 }
fn default_refresh_interval() -> u64 { 60 }
fn default_concurrency() -> usize { 8 }
fn default_capacity() -> u32 { 40 }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            full_vehicle_threshold: default_threshold(),
            refresh_interval_seconds: default_refresh_interval(),
            availability_concurrency: default_concurrency(),
            default_vehicle_capacity: default_capacity(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. FLEETBOOK__AUTH__SERVICE_TOKEN=...
            .add_source(config::Environment::with_prefix("FLEETBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(raw: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

impl BackendConfig {
    /// Path segments of the status endpoint with the reference slotted in
    /// whole. Encoding is left to the URL builder, so a `/` in a reference
    /// stays inside its segment.
    pub fn status_segments(&self, booking_ref: &str) -> Vec<String> {
        self.status_path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| segment.replace("{booking_ref}", booking_ref))
            .collect()
    }
}
