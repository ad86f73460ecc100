//! HTTP surface: a JSON conversion endpoint plus a few HTML pages.

pub mod error;
pub mod pages;

use crate::app::App;
use crate::types::{ConversionRequest, ConverterKind, Currency};
use axum::{
    extract::{Form, Query, RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use error::{ApiError, ApiResult};
use pages::FormValues;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

pub fn router(app: Arc<App>) -> Router {
    Router::new()
        .route("/", get(convert))
        .route("/currency_converter", get(convert))
        .route("/currencies", get(currencies_page))
        .route("/api/currencies", get(list_currencies))
        .route("/converter", get(converter_form).post(submit_converter_form))
        .route("/about", get(about))
        .with_state(app)
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    pub amount: Option<String>,
    pub input_currency: Option<String>,
    pub output_currency: Option<String>,
    pub converter: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_amount(raw: &str) -> ApiResult<Decimal> {
    let raw = raw.trim();
    let amount = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| ApiError::BadRequest("Given amount is not a valid number.".into()))?;
    if amount <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Given amount must be positive.".into()));
    }
    Ok(amount)
}

impl ConvertQuery {
    pub fn into_request(self) -> ApiResult<ConversionRequest> {
        let amount = non_empty(self.amount).ok_or_else(|| {
            ApiError::BadRequest("Missing required argument: \"amount\".".into())
        })?;
        let amount = parse_amount(&amount)?;

        let input = non_empty(self.input_currency).ok_or_else(|| {
            ApiError::BadRequest("Missing required argument: \"input_currency\".".into())
        })?;

        let converter = non_empty(self.converter)
            .map(|raw| ConverterKind::from_str(&raw))
            .transpose()
            .map_err(ApiError::BadRequest)?;

        Ok(ConversionRequest {
            amount,
            input_token: input,
            output_token: non_empty(self.output_currency),
            strategy_override: converter,
        })
    }
}

/// `{code: amount}` for the requested conversion; no parameters at all sends
/// the browser to the form instead.
async fn convert(
    State(app): State<Arc<App>>,
    RawQuery(raw): RawQuery,
    Query(query): Query<ConvertQuery>,
) -> ApiResult<Response> {
    if raw.as_deref().map_or(true, str::is_empty) {
        return Ok(Redirect::to("/converter").into_response());
    }

    let request = query.into_request()?;
    let report = app.convert(&request).await?;
    Ok(Json(report.output).into_response())
}

async fn list_currencies(State(app): State<Arc<App>>) -> ApiResult<Json<Vec<Currency>>> {
    Ok(Json(app.list_currencies().await?))
}

async fn currencies_page(State(app): State<Arc<App>>) -> Response {
    match app.list_currencies().await {
        Ok(list) => Html(pages::currencies(&list)).into_response(),
        Err(e) => {
            tracing::error!("currency list unavailable: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::message("Currencies", &e.to_string())),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConverterForm {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub in_currency: String,
    #[serde(default)]
    pub out_currency: String,
}

async fn converter_form() -> Html<String> {
    Html(pages::converter(&FormValues::default(), None, None))
}

async fn submit_converter_form(
    State(app): State<Arc<App>>,
    Form(form): Form<ConverterForm>,
) -> Html<String> {
    let values = FormValues {
        amount: form.amount.clone(),
        in_currency: form.in_currency.clone(),
        out_currency: form.out_currency.clone(),
    };

    let amount = match parse_amount(&form.amount) {
        Ok(amount) if !form.in_currency.trim().is_empty() => amount,
        _ => {
            return Html(pages::converter(
                &values,
                None,
                Some("Please enter a valid amount and input currency."),
            ))
        }
    };

    let request = ConversionRequest {
        amount,
        input_token: form.in_currency,
        output_token: non_empty(Some(form.out_currency)),
        strategy_override: None,
    };

    match app.convert(&request).await {
        Ok(report) => Html(pages::converter(&values, Some(&report), None)),
        Err(e) => Html(pages::converter(&values, None, Some(&e.to_string()))),
    }
}

async fn about() -> Html<String> {
    Html(pages::about())
}
