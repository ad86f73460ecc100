//! Error types for the conversion core.
//!
//! Each variant is classified by [`ConvertError::is_strategy_failure`], which
//! decides whether the orchestrator may retry the call with the other
//! converter, and by [`ConvertError::is_client_error`], which decides how the
//! CLI and web surfaces report it.

use crate::types::ConverterKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    /// The token is neither a known currency code nor a known symbol.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The converter has no data for a currency that the registry knows.
    #[error("{converter} does not support currency {code}")]
    UnsupportedCurrency {
        converter: ConverterKind,
        code: String,
    },

    #[error("Exchange rate fetch failed: {0}")]
    RateFetchFailed(String),

    #[error("XE request failed: {0}")]
    ScrapeFailed(String),

    /// The XE page came back without the expected value in it.
    #[error("Could not parse XE response: {0}")]
    ParseFailed(String),

    /// No currency list is cached and none could be fetched.
    #[error("No currencies data available: {0}")]
    CurrencyDataUnavailable(String),

    /// Both converters failed for the same request.
    #[error("Both conversion methods failed ({primary_kind}: {primary}; {fallback_kind}: {fallback})")]
    ConversionFailed {
        primary_kind: ConverterKind,
        primary: Box<ConvertError>,
        fallback_kind: ConverterKind,
        fallback: Box<ConvertError>,
    },
}

impl ConvertError {
    /// Whether the failure depends on the converter that produced it, so the
    /// same request may succeed with the other one.
    pub fn is_strategy_failure(&self) -> bool {
        match self {
            Self::RateFetchFailed(_)
            | Self::ScrapeFailed(_)
            | Self::ParseFailed(_)
            | Self::UnsupportedCurrency { .. } => true,

            Self::UnknownCurrency(_)
            | Self::InvalidAmount(_)
            | Self::CurrencyDataUnavailable(_)
            | Self::ConversionFailed { .. } => false,
        }
    }

    /// Whether the caller supplied bad input (CLI exit 1, HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownCurrency(_) | Self::InvalidAmount(_))
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;
