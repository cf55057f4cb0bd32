mod support;

use support::{voucher, MockConnector};

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use voucher_service::api;
use voucher_service::connector::{ChainEvent, VoucherCall};
use voucher_service::types::{UNITS_PER_VARA, DEFAULT_VOUCHER_AMOUNT};

fn spender_hex() -> String {
    format!("0x{}", "aa".repeat(32))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn issue_rejects_malformed_accounts_before_any_chain_call() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector.clone()));

    let unprefixed = "aa".repeat(33);
    for account in ["not-hex", "0x1234", unprefixed.as_str()] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/issue",
                json!({"account": account, "amount": 1000, "durationInSec": 3600}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "account {account}");
    }
    assert!(connector.submitted().is_empty());
}

#[tokio::test]
async fn issue_returns_the_raw_voucher_identifier() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector.clone()));
    connector.push_events(vec![ChainEvent::VoucherIssued {
        voucher_id: voucher(0xcc),
    }]);

    let response = app
        .oneshot(post_json(
            "/issue",
            json!({"account": spender_hex(), "amount": 1000, "durationInSec": 3600}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body, format!("0x{}", "cc".repeat(32)));
}

#[tokio::test]
async fn request_endpoint_applies_documented_defaults() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector.clone()));
    connector.push_events(vec![ChainEvent::VoucherIssued {
        voucher_id: voucher(0xcc),
    }]);

    let response = app
        .oneshot(post_json(
            "/gasless/voucher/request",
            json!({"account": spender_hex()}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        payload["voucherId"].as_str(),
        Some(format!("0x{}", "cc".repeat(32)).as_str())
    );

    match connector.submitted().as_slice() {
        [VoucherCall::Issue {
            balance,
            duration_blocks,
            ..
        }] => {
            assert_eq!(*balance, DEFAULT_VOUCHER_AMOUNT);
            assert_eq!(*duration_blocks, 1200);
        }
        other => panic!("unexpected submissions: {other:?}"),
    }
}

#[tokio::test]
async fn status_endpoint_accepts_identifiers_without_prefix() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector.clone()));
    connector.set_balance(voucher(0xcc).as_address(), 1000);

    let response = app
        .oneshot(get(&format!("/gasless/voucher/{}/status", "cc".repeat(32))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(payload["exists"].as_bool(), Some(true));
    assert_eq!(payload["enabled"].as_bool(), Some(true));
    assert_eq!(payload["rawBalance"].as_str(), Some("1,000"));
}

#[tokio::test]
async fn status_endpoint_never_fails_on_garbage_identifiers() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector));

    let response = app
        .oneshot(get("/gasless/voucher/garbage/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(payload["exists"].as_bool(), Some(false));
    assert_eq!(payload["enabled"].as_bool(), Some(false));
    assert!(payload.get("rawBalance").is_none());
}

#[tokio::test]
async fn prolong_and_revoke_answer_with_empty_bodies() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector.clone()));
    connector.set_balance(voucher(0xcc).as_address(), 600 * UNITS_PER_VARA);
    connector.push_events(vec![ChainEvent::VoucherUpdated {
        voucher_id: voucher(0xcc),
    }]);
    connector.push_events(vec![ChainEvent::VoucherRevoked {
        voucher_id: voucher(0xcc),
    }]);

    let voucher_hex = format!("0x{}", "cc".repeat(32));
    let response = app
        .clone()
        .oneshot(post_json(
            "/prolong",
            json!({
                "voucherId": voucher_hex,
                "account": spender_hex(),
                "balance": 500,
                "durationInSec": 0
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());

    let response = app
        .oneshot(post_json(
            "/revoke",
            json!({"voucherId": voucher_hex, "account": spender_hex()}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn details_endpoint_maps_missing_vouchers_to_404() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector));

    let response = app
        .oneshot(get(&format!(
            "/gasless/voucher/details/{}/0x{}",
            spender_hex(),
            "bb".repeat(32)
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(payload["error"].as_str().unwrap().contains("no voucher"));
}

#[tokio::test]
async fn health_reports_the_voucher_account_address() {
    let connector = MockConnector::new();
    let app = api::router(support::manager_with(connector));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(payload["status"].as_str(), Some("ok"));
    assert_eq!(
        payload["address"].as_str(),
        Some(support::test_identity().address().to_string().as_str())
    );
}
