use crate::types::ConverterKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Converter used when the caller does not override it.
    #[serde(default = "default_converter")]
    pub converter: ConverterKind,
    /// Output currencies used when no output currency is requested.
    /// Absent means every currency in the registry.
    #[serde(default)]
    pub override_currencies: Option<Vec<String>>,
    /// Minutes before the cached currency list is refreshed.
    #[serde(default = "default_currencies_expiration")]
    pub currencies_expiration: u64,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Usage log file; absent disables logging of conversions.
    #[serde(default)]
    pub log_filename: Option<PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub oer: OerConfig,
    #[serde(default)]
    pub xe: XeConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OerConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    /// Minutes before cached exchange rates are refreshed.
    #[serde(default = "default_rates_expiration")]
    pub rates_expiration: u64,
}

impl Default for OerConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            rates_expiration: default_rates_expiration(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct XeConfig {
    /// Upper bound on XE page requests in flight for one conversion.
    #[serde(default = "default_xe_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for XeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_xe_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_converter() -> ConverterKind {
    ConverterKind::Oer
}

fn default_currencies_expiration() -> u64 {
    1440
}

fn default_rates_expiration() -> u64 {
    60
}

fn default_xe_max_concurrency() -> usize {
    4
}

fn default_decimal_places() -> u32 {
    2
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(contents)?;
        config.apply_env();
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// `OER_APP_ID` takes precedence over the file so the key can stay out of it.
    fn apply_env(&mut self) {
        if let Ok(app_id) = std::env::var("OER_APP_ID") {
            if !app_id.trim().is_empty() {
                self.oer.app_id = Some(app_id);
            }
        }
    }

    fn normalize(&mut self) {
        if let Some(codes) = self.override_currencies.as_mut() {
            for code in codes.iter_mut() {
                *code = code.trim().to_ascii_uppercase();
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.currencies_expiration == 0 {
            anyhow::bail!("currencies_expiration must be greater than 0 minutes");
        }
        if self.oer.rates_expiration == 0 {
            anyhow::bail!("oer.rates_expiration must be greater than 0 minutes");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }
        if self.xe.max_concurrency == 0 {
            anyhow::bail!("xe.max_concurrency must be greater than 0");
        }
        if self.decimal_places > 10 {
            anyhow::bail!(
                "decimal_places must be at most 10, got {}",
                self.decimal_places
            );
        }

        if let Some(codes) = &self.override_currencies {
            if codes.is_empty() {
                anyhow::bail!("override_currencies must not be empty; omit it to use all currencies");
            }
            let mut seen: HashSet<&str> = HashSet::new();
            for code in codes {
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    anyhow::bail!(
                        "override_currencies entry '{}' is not a 3-letter currency code",
                        code
                    );
                }
                if !seen.insert(code.as_str()) {
                    anyhow::bail!("duplicate override_currencies entry '{}'", code);
                }
            }
        }
        Ok(())
    }

    pub fn currencies_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.currencies_expiration as i64)
    }

    pub fn rates_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.oer.rates_expiration as i64)
    }
}
