use crate::types::{ConversionResult, ConverterKind, Currency};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// What the CLI prints and the usage log records for one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub input: ReportInput,
    pub output: BTreeMap<String, Decimal>,
    pub converter: ConverterKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportInput {
    pub amount: Decimal,
    pub currency: String,
}

/// Round every output to `decimal_places`; the input amount is kept as given.
pub fn build_report(result: &ConversionResult, decimal_places: u32) -> ConversionReport {
    let rounded = result.rounded(decimal_places);
    ConversionReport {
        input: ReportInput {
            amount: rounded.amount,
            currency: rounded.input_currency,
        },
        output: rounded.outputs,
        converter: rounded.converter,
    }
}

pub fn format_currency_table(currencies: &[Currency]) -> String {
    let mut table = format!("\n{:<7}{:<8}{}\n", "Code", "Symbol", "Name");
    for currency in currencies {
        let symbols = currency
            .symbols
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        table.push_str(&format!("{:<7}{:<8}{}\n", currency.code, symbols, currency.name));
    }
    table
}

pub fn print_currency_table(currencies: &[Currency]) {
    println!("{}", format_currency_table(currencies));
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{}", json);
    Ok(())
}
