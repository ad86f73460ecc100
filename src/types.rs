use crate::error::ConvertError;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// The two interchangeable conversion methods.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConverterKind {
    /// Local arithmetic over openexchangerates.org rate tables.
    Oer,
    /// One xe.com converter lookup per target currency.
    Xe,
}

impl ConverterKind {
    pub fn other(self) -> Self {
        match self {
            Self::Oer => Self::Xe,
            Self::Xe => Self::Oer,
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oer => f.write_str("OER"),
            Self::Xe => f.write_str("XE"),
        }
    }
}

impl FromStr for ConverterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oer" => Ok(Self::Oer),
            "xe" => Ok(Self::Xe),
            other => Err(format!(
                "unknown converter '{}', expected \"xe\" or \"oer\"",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub name: String,
    pub symbols: BTreeSet<String>,
}

/// Rates relative to `base`, rebuilt wholesale on every refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRateTable {
    pub base: String,
    pub rates: BTreeMap<String, Decimal>,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRateTable {
    /// Build a table, rejecting payloads where the base is missing or not 1,
    /// or where any rate is not positive.
    pub fn new(
        base: String,
        rates: BTreeMap<String, Decimal>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, ConvertError> {
        match rates.get(&base) {
            Some(rate) if *rate == Decimal::ONE => {}
            Some(rate) => {
                return Err(ConvertError::RateFetchFailed(format!(
                    "base currency {} has rate {} instead of 1",
                    base, rate
                )))
            }
            None => {
                return Err(ConvertError::RateFetchFailed(format!(
                    "base currency {} missing from rate table",
                    base
                )))
            }
        }
        if let Some((code, rate)) = rates.iter().find(|(_, rate)| **rate <= Decimal::ZERO) {
            return Err(ConvertError::RateFetchFailed(format!(
                "non-positive rate {} for {}",
                rate, code
            )));
        }
        Ok(Self {
            base,
            rates,
            fetched_at,
        })
    }

    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates.get(code).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub amount: Decimal,
    pub input_token: String,
    pub output_token: Option<String>,
    pub strategy_override: Option<ConverterKind>,
}

impl ConversionRequest {
    pub fn new(amount: Decimal, input_token: impl Into<String>) -> Self {
        Self {
            amount,
            input_token: input_token.into(),
            output_token: None,
            strategy_override: None,
        }
    }

    pub fn with_output(mut self, token: impl Into<String>) -> Self {
        self.output_token = Some(token.into());
        self
    }

    pub fn with_converter(mut self, kind: ConverterKind) -> Self {
        self.strategy_override = Some(kind);
        self
    }
}

/// Outcome of one conversion; amounts are unrounded until [`rounded`](Self::rounded).
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub converter: ConverterKind,
    pub amount: Decimal,
    pub input_currency: String,
    pub outputs: BTreeMap<String, Decimal>,
}

impl ConversionResult {
    pub fn output(&self, code: &str) -> Option<Decimal> {
        self.outputs.get(code).copied()
    }

    pub fn rounded(&self, decimal_places: u32) -> Self {
        Self {
            outputs: self
                .outputs
                .iter()
                .map(|(code, value)| (code.clone(), round_amount(*value, decimal_places)))
                .collect(),
            ..self.clone()
        }
    }
}

/// Round half away from zero and pin the scale so `92` renders as `92.00`.
pub fn round_amount(value: Decimal, decimal_places: u32) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimal_places);
    rounded
}
