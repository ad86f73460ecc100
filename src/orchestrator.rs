//! Strategy selection and the single cross-converter retry.
//!
//! Every call runs the same two-phase machine:
//!
//! ```text
//! select -> execute(primary) -> done
//!                 \-> strategy failure -> execute(other) -> done | ConversionFailed
//! ```
//!
//! Token resolution happens before the first phase; its errors are returned
//! as they are and never trigger the retry.

use crate::converters::ConverterSet;
use crate::error::{ConvertError, ConvertResult};
use crate::registry::{CurrencyRegistry, CurrencySet};
use crate::types::{ConversionRequest, ConversionResult, ConverterKind, Currency};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{info, warn};

enum Phase {
    Execute(ConverterKind),
    RetryOther {
        kind: ConverterKind,
        primary_kind: ConverterKind,
        primary: ConvertError,
    },
}

pub struct ConversionOrchestrator {
    registry: CurrencyRegistry,
    converters: ConverterSet,
    default_converter: ConverterKind,
    override_currencies: Option<Vec<String>>,
}

impl ConversionOrchestrator {
    pub fn new(
        registry: CurrencyRegistry,
        converters: ConverterSet,
        default_converter: ConverterKind,
        override_currencies: Option<Vec<String>>,
    ) -> Self {
        Self {
            registry,
            converters,
            default_converter,
            override_currencies,
        }
    }

    pub async fn list_currencies(&self) -> ConvertResult<Vec<Currency>> {
        self.registry.list_all().await
    }

    pub async fn convert(&self, request: &ConversionRequest) -> ConvertResult<ConversionResult> {
        if request.amount <= Decimal::ZERO {
            return Err(ConvertError::InvalidAmount(format!(
                "{} is not a positive amount",
                request.amount
            )));
        }

        let currencies = self.registry.snapshot().await?;
        let from = currencies.resolve(&request.input_token)?;
        let to = match &request.output_token {
            Some(token) => BTreeSet::from([currencies.resolve(token)?]),
            None => self.enabled_currencies(&currencies)?,
        };

        let mut phase = Phase::Execute(self.select(request));
        loop {
            phase = match phase {
                Phase::Execute(kind) => match self.execute(kind, request.amount, &from, &to).await {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_strategy_failure() => {
                        warn!(
                            "{} conversion method failed: {}. Retrying with {} method.",
                            kind,
                            e,
                            kind.other()
                        );
                        Phase::RetryOther {
                            kind: kind.other(),
                            primary_kind: kind,
                            primary: e,
                        }
                    }
                    Err(e) => return Err(e),
                },
                Phase::RetryOther {
                    kind,
                    primary_kind,
                    primary,
                } => {
                    return self
                        .execute(kind, request.amount, &from, &to)
                        .await
                        .map_err(|fallback| ConvertError::ConversionFailed {
                            primary_kind,
                            primary: Box::new(primary),
                            fallback_kind: kind,
                            fallback: Box::new(fallback),
                        });
                }
            };
        }
    }

    /// The caller's override, else the configured default. A conversion into
    /// every enabled currency never starts with XE unless asked to, since XE
    /// costs one request per currency.
    fn select(&self, request: &ConversionRequest) -> ConverterKind {
        if let Some(kind) = request.strategy_override {
            return kind;
        }
        if request.output_token.is_none() && self.default_converter == ConverterKind::Xe {
            info!("Converting into all currencies; using OER instead of the default XE");
            return ConverterKind::Oer;
        }
        self.default_converter
    }

    /// Configured entries the currency list does not know are skipped; they
    /// are a configuration problem, not a bad request.
    fn enabled_currencies(&self, currencies: &CurrencySet) -> ConvertResult<BTreeSet<String>> {
        let Some(codes) = &self.override_currencies else {
            return Ok(currencies.codes().map(str::to_string).collect());
        };

        let mut enabled = BTreeSet::new();
        for code in codes {
            if currencies.contains(code) {
                enabled.insert(code.clone());
            } else {
                warn!("Ignoring override currency {}: not in the currency list", code);
            }
        }
        if enabled.is_empty() {
            return Err(ConvertError::CurrencyDataUnavailable(
                "none of the override currencies are in the currency list".into(),
            ));
        }
        Ok(enabled)
    }

    async fn execute(
        &self,
        kind: ConverterKind,
        amount: Decimal,
        from: &str,
        to: &BTreeSet<String>,
    ) -> ConvertResult<ConversionResult> {
        info!("Using {} conversion method.", kind);
        let outputs = self.converters.get(kind).convert(amount, from, to).await?;
        Ok(ConversionResult {
            converter: kind,
            amount,
            input_currency: from.to_string(),
            outputs,
        })
    }
}
