//! Application configuration.
//!
//! Loaded from a YAML file merged with environment variables. Environment
//! variables use the `UPICTL_` prefix with `__` as a nesting separator, e.g.
//! `UPICTL_GATEWAY__PHONEPE__SALT_KEY` overrides `gateway.phonepe.salt_key`.
//!
//! ```no_run
//! use clap::Parser;
//! use upictl::config::{Args, Config};
//!
//! let args = Args::parse();
//! let config = Config::load(&args).unwrap();
//! ```

use std::fmt;
use std::time::Duration;

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "UPICTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have sensible defaults defined in the `Default` implementation;
/// a gateway must be configured before payments can be initiated.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Base URL where this service is reachable from the outside.
    /// Used to build redirect and server-to-server callback URLs.
    pub public_url: Url,
    /// Payment gateway configuration. When absent, payment endpoints
    /// respond with 501.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            public_url: Url::parse("http://localhost:3001").unwrap(),
            gateway: None,
            cors: CorsConfig::default(),
        }
    }
}

/// Payment gateway selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayConfig {
    /// PhonePe pay-page gateway
    Phonepe(PhonePeConfig),
    /// Local gateway that accepts every payment, for development
    Dummy(DummyConfig),
}

/// PhonePe merchant credentials and endpoint settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhonePeConfig {
    /// Merchant identifier issued by PhonePe
    pub merchant_id: String,
    /// Salt key used for X-VERIFY signing. Never logged.
    pub salt_key: String,
    /// Salt key index, sent as the `###<n>` suffix of X-VERIFY
    pub salt_index: u8,
    /// API base URL (defaults to the pre-production sandbox)
    pub base_url: Url,
    /// HTTP timeout for gateway calls
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for PhonePeConfig {
    fn default() -> Self {
        Self {
            merchant_id: String::new(),
            salt_key: String::new(),
            salt_index: 1,
            base_url: Url::parse("https://api-preprod.phonepe.com/apis/pg-sandbox").unwrap(),
            timeout: Duration::from_secs(30),
        }
    }
}

// Manual Debug so the salt key cannot leak through logs or error chains.
impl fmt::Debug for PhonePeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhonePeConfig")
            .field("merchant_id", &self.merchant_id)
            .field("salt_key", &"[REDACTED]")
            .field("salt_index", &self.salt_index)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Settings for the dummy gateway.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyConfig {}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                CorsOrigin::Url(Url::parse("http://localhost:3000").unwrap()), // Development frontend
            ],
            allow_credentials: true,
            max_age: Some(3600), // Cache preflight for 1 hour
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("UPICTL_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(GatewayConfig::Phonepe(phonepe)) = &self.gateway {
            if phonepe.merchant_id.trim().is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: gateway.phonepe.merchant_id must not be empty"
                        .to_string(),
                });
            }
            if phonepe.salt_key.trim().is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: gateway.phonepe.salt_key must not be empty"
                        .to_string(),
                });
            }
            if phonepe.salt_index == 0 {
                return Err(Error::Internal {
                    operation: "Config validation: gateway.phonepe.salt_index must be at least 1"
                        .to_string(),
                });
            }
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: cors.allowed_origins must not be empty".to_string(),
            });
        }

        // Wildcard origins cannot be combined with credentials
        let has_wildcard = self
            .cors
            .allowed_origins
            .iter()
            .any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins.".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
