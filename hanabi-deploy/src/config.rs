//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` but can be specified via
//! the `-f` flag or the `HANABI_CONFIG` environment variable. Variables
//! prefixed with `HANABI_` override YAML values; nested values use double
//! underscores, e.g. `HANABI_PLATFORM__API_BASE_URL`.

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "HANABI_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Cloudflare API client settings
    pub platform: PlatformConfig,
}

/// Settings for the Cloudflare API client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    /// Base URL of the Cloudflare v4 API. Overridable for testing against a
    /// local stand-in.
    pub api_base_url: Url,
    /// Per-request timeout for Cloudflare API calls
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// Production base URL of the Cloudflare v4 API.
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            platform: PlatformConfig::default(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(CLOUDFLARE_API_BASE).expect("default API base URL is valid"),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Build the figment for configuration loading
    fn figment(args: &Args) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("HANABI_").split("__"))
    }

    /// Load configuration from the YAML file and environment
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), figment::Error> {
        match self.platform.api_base_url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(figment::Error::from(format!(
                "platform.api_base_url must be http or https, got {other}"
            ))),
        }
    }

    /// The address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
