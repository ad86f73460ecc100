pub mod oer;
pub mod xe;

use crate::cache::RateCache;
use crate::config::Config;
use crate::error::ConvertResult;
use crate::types::ConverterKind;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One way of turning an amount in `from` into amounts in each `to` currency.
#[async_trait]
pub trait Converter: Send + Sync {
    fn kind(&self) -> ConverterKind;

    /// Convert `amount` into every currency of `to`. Either every target is
    /// converted or the whole call fails.
    async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &BTreeSet<String>,
    ) -> ConvertResult<BTreeMap<String, Decimal>>;

    /// Currency codes this converter's upstream knows about, with display names.
    async fn fetch_currency_names(&self) -> ConvertResult<BTreeMap<String, String>>;
}

/// Both converters, addressable by kind.
#[derive(Clone)]
pub struct ConverterSet {
    oer: Arc<dyn Converter>,
    xe: Arc<dyn Converter>,
}

impl ConverterSet {
    pub fn new(oer: Arc<dyn Converter>, xe: Arc<dyn Converter>) -> Self {
        Self { oer, xe }
    }

    pub fn from_config(client: reqwest::Client, cache: Arc<RateCache>, config: &Config) -> Self {
        if config.oer.app_id.is_none() {
            tracing::warn!("OER_APP_ID not set; OER conversions will fail over to XE");
        }
        let oer = oer::OpenExchangeRates::new(
            client.clone(),
            config.oer.app_id.clone(),
            cache,
            config.rates_ttl(),
        );
        let xe = xe::XeConverter::new(client, config.xe.max_concurrency);
        Self::new(Arc::new(oer), Arc::new(xe))
    }

    pub fn get(&self, kind: ConverterKind) -> Arc<dyn Converter> {
        match kind {
            ConverterKind::Oer => self.oer.clone(),
            ConverterKind::Xe => self.xe.clone(),
        }
    }
}
