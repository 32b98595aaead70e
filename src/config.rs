use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Default bucket when a request does not name one.
    pub bucket: Option<String>,
    /// Lifetime of generated access URLs, in seconds.
    #[serde(default = "default_url_ttl")]
    pub url_ttl_secs: u64,
    /// Per-partition listing deadline during a refresh, in milliseconds.
    #[serde(default = "default_list_timeout")]
    pub list_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// Input device name; host default when unset.
    pub input_device: Option<String>,
    /// Channel count requested from the capture engine (1 = mono).
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_url_ttl() -> u64 {
    3600
}
fn default_list_timeout() -> u64 {
    10_000
}
fn default_channels() -> u16 {
    1
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
