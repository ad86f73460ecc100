use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use currency_converter::cache::{MemoryStore, RateCache};
use currency_converter::converters::{Converter, ConverterSet};
use currency_converter::orchestrator::ConversionOrchestrator;
use currency_converter::registry::CurrencyRegistry;
use currency_converter::usage_log::UsageLog;
use currency_converter::{web, App, ConvertError, ConvertResult, ConverterKind};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

struct StaticRates {
    kind: ConverterKind,
    rates: BTreeMap<String, Decimal>,
    up: bool,
    calls: AtomicUsize,
}

impl StaticRates {
    fn new(kind: ConverterKind, up: bool) -> Self {
        let rates = [
            ("USD", dec!(1)),
            ("EUR", dec!(0.92)),
            ("GBP", dec!(0.79)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();
        Self {
            kind,
            rates,
            up,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Converter for StaticRates {
    fn kind(&self) -> ConverterKind {
        self.kind
    }

    async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &BTreeSet<String>,
    ) -> ConvertResult<BTreeMap<String, Decimal>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.up {
            return Err(ConvertError::RateFetchFailed("service unavailable".into()));
        }
        let from_rate = self.rates[from];
        Ok(to
            .iter()
            .map(|code| (code.clone(), amount * self.rates[code] / from_rate))
            .collect())
    }

    async fn fetch_currency_names(&self) -> ConvertResult<BTreeMap<String, String>> {
        Ok(BTreeMap::from([
            ("USD".to_string(), "United States Dollar".to_string()),
            ("EUR".to_string(), "Euro".to_string()),
            ("GBP".to_string(), "British Pound Sterling".to_string()),
        ]))
    }
}

struct TestApp {
    router: Router,
    oer: Arc<StaticRates>,
    xe: Arc<StaticRates>,
}

fn build_test_router(oer_up: bool, xe_up: bool) -> TestApp {
    let oer = Arc::new(StaticRates::new(ConverterKind::Oer, oer_up));
    let xe = Arc::new(StaticRates::new(ConverterKind::Xe, xe_up));
    let names: Arc<dyn Converter> = Arc::new(StaticRates::new(ConverterKind::Oer, true));

    let cache = Arc::new(RateCache::new(Arc::new(MemoryStore::new())));
    let registry = CurrencyRegistry::new(cache, names, Duration::hours(24));
    let orchestrator = ConversionOrchestrator::new(
        registry,
        ConverterSet::new(oer.clone(), xe.clone()),
        ConverterKind::Oer,
        None,
    );
    let app = App::new(orchestrator, UsageLog::disabled(), 2);

    TestApp {
        router: web::router(Arc::new(app)),
        oer,
        xe,
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn converts_to_requested_currency() {
    let app = build_test_router(true, true);

    let (status, body) = get(
        &app.router,
        "/currency_converter?amount=100&input_currency=usd&output_currency=EUR",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, serde_json::json!({"EUR": "92.00"}));
}

#[tokio::test]
async fn converts_to_all_currencies_without_output() {
    let app = build_test_router(true, true);

    let (status, body) = get(&app.router, "/?amount=10&input_currency=EUR").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["EUR"], "10.00");
    assert_eq!(json["USD"], "10.87");
    assert_eq!(json["GBP"], "8.59");
}

#[tokio::test]
async fn falls_back_to_other_converter() {
    let app = build_test_router(false, true);

    let (status, body) = get(
        &app.router,
        "/currency_converter?amount=100&input_currency=USD&output_currency=GBP",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("79.00"));
    assert_eq!(app.oer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.xe.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn both_converters_down_is_server_error() {
    let app = build_test_router(false, false);

    let (status, body) = get(
        &app.router,
        "/currency_converter?amount=1&input_currency=USD&output_currency=EUR",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], 500);
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Both conversion methods failed"));
}

#[tokio::test]
async fn unknown_currency_is_bad_request() {
    let app = build_test_router(true, true);

    let (status, body) = get(
        &app.router,
        "/currency_converter?amount=1&input_currency=XYZ123&output_currency=EUR",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["message"], "Unknown currency: XYZ123");
    assert_eq!(app.oer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(app.xe.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_amount_is_bad_request() {
    let app = build_test_router(true, true);

    let (status, _) = get(&app.router, "/?amount=abc&input_currency=USD").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app.router, "/?input_currency=USD").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("amount"));
}

#[tokio::test]
async fn bare_request_redirects_to_form() {
    let app = build_test_router(true, true);

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(response.headers()[header::LOCATION], "/converter");
}

#[tokio::test]
async fn currencies_json_includes_symbols() {
    let app = build_test_router(true, true);

    let (status, body) = get(&app.router, "/api/currencies").await;

    assert_eq!(status, StatusCode::OK);
    let list: Vec<serde_json::Value> = serde_json::from_str(&body).unwrap();
    let usd = list.iter().find(|c| c["code"] == "USD").unwrap();
    assert!(usd["symbols"].as_array().unwrap().contains(&"$".into()));
    let eur = list.iter().find(|c| c["code"] == "EUR").unwrap();
    assert!(eur["symbols"].as_array().unwrap().contains(&"€".into()));
}

#[tokio::test]
async fn currencies_page_renders_table() {
    let app = build_test_router(true, true);

    let (status, body) = get(&app.router, "/currencies").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<td>EUR</td><td>€</td><td>Euro</td>"));
}

#[tokio::test]
async fn converter_form_round_trip() {
    let app = build_test_router(true, true);

    let (status, body) = get(&app.router, "/converter").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<form method=\"post\""));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/converter")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("amount=50&in_currency=%E2%82%AC&out_currency=usd"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("<tr><td>USD</td><td>54.35</td></tr>"));
}

#[tokio::test]
async fn converter_form_rejects_bad_amount() {
    let app = build_test_router(true, true);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/converter")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("amount=many&in_currency=USD&out_currency="))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("Please enter a valid amount and input currency."));
    assert_eq!(app.oer.calls.load(Ordering::SeqCst), 0);
}
