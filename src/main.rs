use anyhow::{Context, Result};
use clap::Parser;
use currency_converter::{config, output, App, ConversionRequest, ConvertError, ConverterKind};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "currency-converter",
    about = "Convert an amount between currencies using OER exchange rates or XE lookups"
)]
struct Args {
    /// Path to config YAML file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Amount to convert
    #[arg(short, long, value_parser = parse_amount, required_unless_present = "currencies")]
    amount: Option<Decimal>,

    /// Currency to convert from: code or symbol
    #[arg(short = 'i', long = "input_currency", required_unless_present = "currencies")]
    input_currency: Option<String>,

    /// Currency to convert to: code or symbol. Omit to convert to all enabled currencies
    #[arg(short = 'o', long = "output_currency")]
    output_currency: Option<String>,

    /// Override the configured conversion method
    #[arg(short, long, value_enum, ignore_case = true)]
    converter: Option<ConverterKind>,

    /// Print the list of currencies; no conversion is done
    #[arg(long)]
    currencies: bool,
}

fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .map_err(|_| format!("'{}' is not a valid number", raw))?;
    if amount <= Decimal::ZERO {
        return Err(format!("amount must be positive, got {}", amount));
    }
    Ok(amount)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            exit_code(&e)
        }
    }
}

/// 1 for bad input, 2 for configuration or conversion failures.
fn exit_code(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<ConvertError>() {
        Some(err) if err.is_client_error() => ExitCode::from(1),
        _ => ExitCode::from(2),
    }
}

async fn run(args: Args) -> Result<()> {
    let cfg = config::Config::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let app = App::from_config(&cfg)?;

    if args.currencies {
        let currencies = app.list_currencies().await?;
        info!("Loaded {} currencies", currencies.len());
        output::print_currency_table(&currencies);
        return Ok(());
    }

    let (Some(amount), Some(input_currency)) = (args.amount, args.input_currency) else {
        anyhow::bail!("--amount and --input_currency are required unless --currencies is given");
    };

    let request = ConversionRequest {
        amount,
        input_token: input_currency,
        output_token: args.output_currency,
        strategy_override: args.converter,
    };
    let report = app.convert(&request).await?;
    output::print_json(&report)?;

    Ok(())
}
