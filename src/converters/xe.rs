use super::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::types::ConverterKind;
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::{debug, info};

const CONVERT_URL: &str = "https://www.xe.com/currencyconverter/convert/";
const CURRENCY_MAP_URL: &str = "http://www.localeplanet.com/api/auto/currencymap.json";

lazy_static! {
    static ref RESULT_AMOUNT: Regex =
        Regex::new(r#"class="uccResultAmount"[^>]*>\s*([0-9][0-9,]*(?:\.[0-9]+)?)"#)
            .expect("Invalid regex pattern");
    static ref FROM_CODE: Regex =
        Regex::new(r#"class="uccFromResultAmount"[^>]*>[^<]*?([A-Z]{3})\s*=?\s*<"#)
            .expect("Invalid regex pattern");
    static ref TO_CODE: Regex =
        Regex::new(r#"class="uccToCurrencyCode"[^>]*>\s*([A-Z]{3})"#)
            .expect("Invalid regex pattern");
}

/// xe.com converter page, one request per target currency with at most
/// `max_concurrency` of them in flight.
pub struct XeConverter {
    client: reqwest::Client,
    convert_url: String,
    max_concurrency: usize,
}

#[derive(Debug, Deserialize)]
struct CurrencyMapEntry {
    name: String,
}

impl XeConverter {
    pub fn new(client: reqwest::Client, max_concurrency: usize) -> Self {
        Self {
            client,
            convert_url: CONVERT_URL.to_string(),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Point conversions at another converter page.
    pub fn with_convert_url(mut self, url: impl Into<String>) -> Self {
        self.convert_url = url.into();
        self
    }

    async fn convert_one(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
    ) -> ConvertResult<(String, Decimal)> {
        if from == to {
            return Ok((to.to_string(), amount));
        }

        debug!("XE lookup {} {} -> {}", amount, from, to);
        let amount_param = amount.to_string();
        let resp = self
            .client
            .get(&self.convert_url)
            .query(&[("Amount", amount_param.as_str()), ("From", from), ("To", to)])
            .send()
            .await
            .map_err(|e| ConvertError::ScrapeFailed(format!("{} -> {}: {}", from, to, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ConvertError::ScrapeFailed(format!(
                "{} -> {}: HTTP {}",
                from, to, status
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ConvertError::ScrapeFailed(format!("{} -> {}: {}", from, to, e)))?;

        let value = parse_conversion(&body, from, to)?;
        Ok((to.to_string(), value))
    }
}

/// Pull the converted amount out of an XE result page.
///
/// XE answers unknown codes with a USD conversion instead of an error, so the
/// echoed codes must match the requested ones.
pub fn parse_conversion(body: &str, from: &str, to: &str) -> ConvertResult<Decimal> {
    let raw = RESULT_AMOUNT
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            ConvertError::ParseFailed(format!("no result amount for {} -> {}", from, to))
        })?
        .as_str()
        .replace(',', "");
    let value = Decimal::from_str(&raw).map_err(|e| {
        ConvertError::ParseFailed(format!("invalid result amount '{}': {}", raw, e))
    })?;

    let echoed_from = FROM_CODE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    let echoed_to = TO_CODE.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str());

    for (requested, echoed) in [(from, echoed_from), (to, echoed_to)] {
        match echoed {
            Some(code) if code == requested => {}
            Some(_) => {
                return Err(ConvertError::UnsupportedCurrency {
                    converter: ConverterKind::Xe,
                    code: requested.to_string(),
                })
            }
            None => {
                return Err(ConvertError::ParseFailed(format!(
                    "result page does not echo currency {}",
                    requested
                )))
            }
        }
    }

    Ok(value)
}

#[async_trait]
impl Converter for XeConverter {
    fn kind(&self) -> ConverterKind {
        ConverterKind::Xe
    }

    async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &BTreeSet<String>,
    ) -> ConvertResult<BTreeMap<String, Decimal>> {
        if to.len() > 1 {
            info!(
                "XE conversion into {} currencies ({} requests at a time)",
                to.len(),
                self.max_concurrency.min(to.len())
            );
        }
        // The first failure drops the in-flight requests and never starts the rest.
        let lookups: Vec<_> = to
            .iter()
            .map(|code| self.convert_one(amount, from, code))
            .collect();
        stream::iter(lookups)
            .buffer_unordered(self.max_concurrency)
            .try_collect::<BTreeMap<String, Decimal>>()
            .await
    }

    async fn fetch_currency_names(&self) -> ConvertResult<BTreeMap<String, String>> {
        info!("Getting currencies data from {}", CURRENCY_MAP_URL);
        let resp = self
            .client
            .get(CURRENCY_MAP_URL)
            .query(&[("name", "Y")])
            .send()
            .await
            .map_err(|e| ConvertError::ScrapeFailed(format!("currency map request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ConvertError::ScrapeFailed(format!(
                "currency map HTTP {}",
                status
            )));
        }

        let map: BTreeMap<String, CurrencyMapEntry> = resp
            .json()
            .await
            .map_err(|e| ConvertError::ParseFailed(format!("malformed currency map: {}", e)))?;
        Ok(map.into_iter().map(|(code, entry)| (code, entry.name)).collect())
    }
}
