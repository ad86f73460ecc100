//! Currency reference data and token resolution.
//!
//! Codes and names come from the default converter's upstream and are cached
//! as [`CacheKind::CurrencyList`]. Symbols come from the curated table below.
//! A symbol shared by several currencies resolves to the first candidate in
//! its list that the registry knows; the caller is never asked to choose.

use crate::cache::{CacheKind, RateCache};
use crate::converters::Converter;
use crate::error::{ConvertError, ConvertResult};
use crate::types::Currency;
use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Symbol to candidate codes, most likely meaning first.
const SYMBOLS: &[(&str, &[&str])] = &[
    ("$", &["USD", "CAD", "AUD", "NZD", "SGD", "HKD", "MXN"]),
    ("US$", &["USD"]),
    ("C$", &["CAD"]),
    ("A$", &["AUD"]),
    ("NZ$", &["NZD"]),
    ("HK$", &["HKD"]),
    ("S$", &["SGD"]),
    ("R$", &["BRL"]),
    ("€", &["EUR"]),
    ("£", &["GBP", "EGP", "GIP", "FKP", "SHP"]),
    ("¥", &["JPY", "CNY"]),
    ("元", &["CNY"]),
    ("₹", &["INR"]),
    ("₽", &["RUB"]),
    ("₩", &["KRW"]),
    ("₺", &["TRY"]),
    ("₪", &["ILS"]),
    ("₫", &["VND"]),
    ("₴", &["UAH"]),
    ("₦", &["NGN"]),
    ("₱", &["PHP"]),
    ("฿", &["THB"]),
    ("₸", &["KZT"]),
    ("₾", &["GEL"]),
    ("₡", &["CRC"]),
    ("₲", &["PYG"]),
    ("₭", &["LAK"]),
    ("₮", &["MNT"]),
    ("৳", &["BDT"]),
    ("₨", &["PKR", "LKR", "NPR", "MUR"]),
    ("₿", &["BTC"]),
    ("zł", &["PLN"]),
    ("Kč", &["CZK"]),
    ("Ft", &["HUF"]),
    ("kr", &["SEK", "NOK", "DKK", "ISK"]),
    ("Fr.", &["CHF"]),
    ("lei", &["RON"]),
    ("Rp", &["IDR"]),
    ("RM", &["MYR"]),
    ("R", &["ZAR"]),
];

/// Candidate codes for `symbol`, in priority order.
pub fn symbol_candidates(symbol: &str) -> Option<&'static [&'static str]> {
    SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, codes)| *codes)
}

/// Every curated symbol that may stand for `code`.
pub fn symbols_for(code: &str) -> BTreeSet<String> {
    SYMBOLS
        .iter()
        .filter(|(_, codes)| codes.contains(&code))
        .map(|(symbol, _)| symbol.to_string())
        .collect()
}

/// One loaded currency list; every token of a request is resolved against the
/// same snapshot.
#[derive(Debug, Clone)]
pub struct CurrencySet {
    currencies: BTreeMap<String, Currency>,
}

impl CurrencySet {
    pub fn from_names(names: BTreeMap<String, String>) -> Self {
        let currencies = names
            .into_iter()
            .filter_map(|(code, name)| {
                let code = code.trim().to_ascii_uppercase();
                if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return None;
                }
                let symbols = symbols_for(&code);
                Some((code.clone(), Currency { code, name, symbols }))
            })
            .collect();
        Self { currencies }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.currencies.contains_key(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.currencies.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.currencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currencies.is_empty()
    }

    /// Known code (any case), then curated symbol, else `UnknownCurrency`.
    pub fn resolve(&self, token: &str) -> ConvertResult<String> {
        let token = token.trim();

        let upper = token.to_ascii_uppercase();
        if self.currencies.contains_key(&upper) {
            return Ok(upper);
        }

        if let Some(candidates) = symbol_candidates(token) {
            if let Some(code) = candidates.iter().find(|code| self.contains(code)) {
                return Ok(code.to_string());
            }
        }

        Err(ConvertError::UnknownCurrency(token.to_string()))
    }

    pub fn into_list(self) -> Vec<Currency> {
        self.currencies.into_values().collect()
    }
}

pub struct CurrencyRegistry {
    cache: Arc<RateCache>,
    source: Arc<dyn Converter>,
    ttl: Duration,
}

impl CurrencyRegistry {
    /// `source` is the converter whose upstream provides the currency list.
    pub fn new(cache: Arc<RateCache>, source: Arc<dyn Converter>, ttl: Duration) -> Self {
        Self { cache, source, ttl }
    }

    /// The cached currency list, refreshed when stale. An outdated list is
    /// preferred over none when the refresh fails.
    pub async fn snapshot(&self) -> ConvertResult<CurrencySet> {
        let source = self.source.clone();
        let fetched = self
            .cache
            .get_or_refresh(CacheKind::CurrencyList, self.ttl, || async move {
                info!("Fetching currency list via {}", source.kind());
                let names = source.fetch_currency_names().await?;
                if names.is_empty() {
                    return Err(ConvertError::CurrencyDataUnavailable(format!(
                        "{} returned an empty currency list",
                        source.kind()
                    )));
                }
                Ok(names)
            })
            .await;

        let names: BTreeMap<String, String> = match fetched {
            Ok(names) => names,
            Err(e) => match self.cache.peek(CacheKind::CurrencyList).await {
                Some((names, fetched_at)) => {
                    warn!(
                        "Currency list refresh failed ({}); using data from {} despite being outdated",
                        e, fetched_at
                    );
                    names
                }
                None => return Err(ConvertError::CurrencyDataUnavailable(e.to_string())),
            },
        };

        let set = CurrencySet::from_names(names);
        if set.is_empty() {
            return Err(ConvertError::CurrencyDataUnavailable(
                "currency list contains no valid codes".into(),
            ));
        }
        Ok(set)
    }

    pub async fn resolve(&self, token: &str) -> ConvertResult<String> {
        self.snapshot().await?.resolve(token)
    }

    /// All currencies ordered by code.
    pub async fn list_all(&self) -> ConvertResult<Vec<Currency>> {
        Ok(self.snapshot().await?.into_list())
    }
}
