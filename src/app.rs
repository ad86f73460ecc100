use crate::cache::{FileStore, RateCache};
use crate::config::Config;
use crate::converters::ConverterSet;
use crate::error::ConvertResult;
use crate::orchestrator::ConversionOrchestrator;
use crate::output::{build_report, ConversionReport};
use crate::registry::CurrencyRegistry;
use crate::types::{ConversionRequest, Currency};
use crate::usage_log::UsageLog;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything a surface (CLI or web) needs: the orchestrator plus the
/// presentation settings and usage log applied to its results.
pub struct App {
    orchestrator: ConversionOrchestrator,
    usage_log: UsageLog,
    decimal_places: u32,
}

impl App {
    pub fn new(orchestrator: ConversionOrchestrator, usage_log: UsageLog, decimal_places: u32) -> Self {
        Self {
            orchestrator,
            usage_log,
            decimal_places,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("currency-converter/0.1")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("building HTTP client")?;

        let cache = Arc::new(RateCache::new(Arc::new(FileStore::new(&config.cache_dir))));
        info!("Caching currency data in {}", config.cache_dir.display());

        let converters = ConverterSet::from_config(client, cache.clone(), config);
        let registry = CurrencyRegistry::new(
            cache,
            converters.get(config.converter),
            config.currencies_ttl(),
        );
        let orchestrator = ConversionOrchestrator::new(
            registry,
            converters,
            config.converter,
            config.override_currencies.clone(),
        );
        info!("Default conversion method: {}", config.converter);

        Ok(Self::new(
            orchestrator,
            UsageLog::new(config.log_filename.clone()),
            config.decimal_places,
        ))
    }

    /// Convert, round for presentation and append the result to the usage log.
    pub async fn convert(&self, request: &ConversionRequest) -> ConvertResult<ConversionReport> {
        let result = self.orchestrator.convert(request).await?;
        let report = build_report(&result, self.decimal_places);
        self.usage_log.record(&report).await;
        Ok(report)
    }

    pub async fn list_currencies(&self) -> ConvertResult<Vec<Currency>> {
        self.orchestrator.list_currencies().await
    }
}
