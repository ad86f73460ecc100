use super::Converter;
use crate::cache::{CacheKind, RateCache};
use crate::error::{ConvertError, ConvertResult};
use crate::types::{ConverterKind, ExchangeRateTable};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

const LATEST_URL: &str = "https://openexchangerates.org/api/latest.json";
const CURRENCIES_URL: &str = "https://openexchangerates.org/api/currencies.json";

/// openexchangerates.org: one rate table per refresh, conversions computed locally.
pub struct OpenExchangeRates {
    client: reqwest::Client,
    app_id: Option<String>,
    cache: Arc<RateCache>,
    rates_ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    timestamp: i64,
    base: String,
    rates: BTreeMap<String, Decimal>,
}

impl OpenExchangeRates {
    pub fn new(
        client: reqwest::Client,
        app_id: Option<String>,
        cache: Arc<RateCache>,
        rates_ttl: Duration,
    ) -> Self {
        Self {
            client,
            app_id,
            cache,
            rates_ttl,
        }
    }

    /// The cached table, refreshed from the API when older than the rates TTL.
    pub async fn rate_table(&self) -> ConvertResult<ExchangeRateTable> {
        self.cache
            .get_or_refresh(CacheKind::RateTable, self.rates_ttl, || self.fetch_table())
            .await
    }

    async fn fetch_table(&self) -> ConvertResult<ExchangeRateTable> {
        let app_id = self.app_id.as_deref().ok_or_else(|| {
            ConvertError::RateFetchFailed("OER app id is not configured (set OER_APP_ID)".into())
        })?;

        info!("Requesting exchange rates from {}", LATEST_URL);
        let resp = self
            .client
            .get(LATEST_URL)
            .query(&[("app_id", app_id)])
            .send()
            .await
            .map_err(|e| ConvertError::RateFetchFailed(format!("request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ConvertError::RateFetchFailed(format!("reading response: {}", e)))?;
        if !status.is_success() {
            return Err(ConvertError::RateFetchFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        parse_latest(&body)
    }
}

fn parse_latest(body: &str) -> ConvertResult<ExchangeRateTable> {
    let latest: LatestResponse = serde_json::from_str(body)
        .map_err(|e| ConvertError::RateFetchFailed(format!("malformed rates payload: {}", e)))?;
    let fetched_at = DateTime::<Utc>::from_timestamp(latest.timestamp, 0).unwrap_or_else(Utc::now);
    ExchangeRateTable::new(latest.base, latest.rates, fetched_at)
}

/// `amount * rates[to] / rates[from]` for every target. Any code missing from
/// the table fails the whole call.
pub fn convert_with_table(
    table: &ExchangeRateTable,
    amount: Decimal,
    from: &str,
    to: &BTreeSet<String>,
) -> ConvertResult<BTreeMap<String, Decimal>> {
    let unsupported = |code: &str| ConvertError::UnsupportedCurrency {
        converter: ConverterKind::Oer,
        code: code.to_string(),
    };

    let from_rate = table.rate(from).ok_or_else(|| unsupported(from))?;
    let mut converted = BTreeMap::new();
    for code in to {
        let to_rate = table.rate(code).ok_or_else(|| unsupported(code))?;
        let value = if code == from {
            amount
        } else {
            amount * to_rate / from_rate
        };
        converted.insert(code.clone(), value);
    }
    Ok(converted)
}

#[async_trait]
impl Converter for OpenExchangeRates {
    fn kind(&self) -> ConverterKind {
        ConverterKind::Oer
    }

    async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &BTreeSet<String>,
    ) -> ConvertResult<BTreeMap<String, Decimal>> {
        let table = self.rate_table().await?;
        convert_with_table(&table, amount, from, to)
    }

    async fn fetch_currency_names(&self) -> ConvertResult<BTreeMap<String, String>> {
        info!("Getting currencies data from {}", CURRENCIES_URL);
        let resp = self
            .client
            .get(CURRENCIES_URL)
            .send()
            .await
            .map_err(|e| ConvertError::RateFetchFailed(format!("currencies request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConvertError::RateFetchFailed(format!(
                "currencies HTTP {}: {}",
                status, body
            )));
        }

        resp.json::<BTreeMap<String, String>>()
            .await
            .map_err(|e| ConvertError::RateFetchFailed(format!("malformed currencies payload: {}", e)))
    }
}
