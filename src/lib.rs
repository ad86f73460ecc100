//! Currency conversion through two interchangeable converters: local
//! arithmetic over openexchangerates.org (OER) rate tables, or per-pair
//! lookups on the xe.com converter page (XE). Whichever runs first, a
//! converter failure is retried once with the other.

pub mod app;
pub mod cache;
pub mod config;
pub mod converters;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod registry;
pub mod types;
pub mod usage_log;
pub mod web;

pub use app::App;
pub use error::{ConvertError, ConvertResult};
pub use types::{ConversionRequest, ConversionResult, ConverterKind, Currency};
