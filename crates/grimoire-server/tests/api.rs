use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`

use grimoire_core::{
    CatalogProduct, LogDispatcher, MemoryStore, MockFileStore, NewPurchase, ProductKind,
    PurchaseRecord, PurchaseStore,
};
use grimoire_payments::{MockPaymentProvider, WebhookVerifier};
use grimoire_server::{AppState, Backends, PaymentGateway, router};

const SECRET: &str = "whsec_api_test";

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    provider: Arc<MockPaymentProvider>,
}

async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    store
        .add_product(CatalogProduct {
            id: "s1".into(),
            kind: ProductKind::Scenario,
            title: "The Sunken Crypt".into(),
            file_path: "scenarios/sunken-crypt.pdf".into(),
            file_name: "The Sunken Crypt.pdf".into(),
        })
        .await;
    let provider = Arc::new(MockPaymentProvider::new());

    let state = AppState::new(
        Backends {
            store: store.clone(),
            catalog: store.clone(),
            files: Arc::new(MockFileStore::new()),
            notifier: Arc::new(LogDispatcher),
        },
        Some(PaymentGateway {
            provider: provider.clone(),
            verifier: WebhookVerifier::new(SECRET),
        }),
        "https://shop.example",
    );

    TestApp {
        app: router(state),
        store,
        provider,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn webhook(payload: &[u8], signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(payload.to_vec())).unwrap()
}

fn completed_event(session_id: &str) -> Vec<u8> {
    json!({
        "id": "evt_api_1",
        "type": "checkout.session.completed",
        "data": {"object": {
            "id": session_id,
            "payment_status": "paid",
            "customer_details": {"email": "buyer@example.com", "name": "Buyer"}
        }}
    })
    .to_string()
    .into_bytes()
}

fn sign(payload: &[u8]) -> String {
    WebhookVerifier::new(SECRET)
        .sign(payload, Utc::now().timestamp())
        .unwrap()
}

fn scenario_cart() -> Value {
    json!({
        "cartItems": [
            {"type": "scenario", "item": {"id": "s1", "price": 4.5, "displayName": "X"}}
        ],
        "customerEmail": "buyer@example.com"
    })
}

#[tokio::test]
async fn test_health() {
    let t = test_app().await;
    let (status, body) = send(&t.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["stripeConfigured"], true);
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_purchase_to_download_flow() {
    let t = test_app().await;

    // Checkout
    let (status, body) = send(&t.app, post_json("/api/checkout", &scenario_cart())).await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    assert!(body["url"].as_str().unwrap().contains(&session_id));

    // Not paid yet
    let (status, body) = send(
        &t.app,
        post_json("/api/checkout/verify", &json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paid"], false);

    // Buyer pays; provider notifies us
    t.provider
        .mark_paid(&session_id, "buyer@example.com", Some("Buyer"))
        .await
        .unwrap();
    let payload = completed_event(&session_id);
    let (status, body) = send(&t.app, webhook(&payload, Some(sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["minted"], 1);

    let (_, body) = send(
        &t.app,
        post_json("/api/checkout/verify", &json!({"sessionId": session_id})),
    )
    .await;
    assert_eq!(body["paid"], true);
    assert_eq!(body["amount"], json!(4.5));
    assert_eq!(body["currency"], "eur");
    assert_eq!(body["customerEmail"], "buyer@example.com");
    assert_eq!(body["purchasesRecorded"], 1);

    // Redeem until the quota runs out
    let records = t.store.find_by_payment_ref(&session_id).await.unwrap();
    assert_eq!(records.len(), 1);
    let uri = format!("/download/{}", records[0].download_token);

    for expected_remaining in [2, 1, 0] {
        let (status, body) = send(&t.app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["remainingDownloads"], expected_remaining);
        assert_eq!(body["fileName"], "The Sunken Crypt.pdf");
        assert!(body["downloadUrl"]
            .as_str()
            .unwrap()
            .contains("scenarios/sunken-crypt.pdf"));
    }

    let (status, body) = send(&t.app, get(&uri)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "LIMIT_REACHED");
}

#[tokio::test]
async fn test_webhook_redelivery_mints_once() {
    let t = test_app().await;
    let (_, body) = send(&t.app, post_json("/api/checkout", &scenario_cart())).await;
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    t.provider
        .mark_paid(&session_id, "buyer@example.com", None)
        .await
        .unwrap();

    let payload = completed_event(&session_id);
    send(&t.app, webhook(&payload, Some(sign(&payload)))).await;
    let (status, body) = send(&t.app, webhook(&payload, Some(sign(&payload)))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["minted"], 0);
    assert_eq!(body["duplicates"], 1);
    assert_eq!(t.store.len().await, 1);
}

#[tokio::test]
async fn test_webhook_signature_failures() {
    let t = test_app().await;
    let payload = completed_event("cs_test_forged");

    let forged = WebhookVerifier::new("whsec_attacker")
        .sign(&payload, Utc::now().timestamp())
        .unwrap();
    let (status, body) = send(&t.app, webhook(&payload, Some(forged))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let (status, body) = send(&t.app, webhook(&payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    assert!(t.store.is_empty().await);
}

#[tokio::test]
async fn test_unknown_events_are_acknowledged() {
    let t = test_app().await;
    let payload = json!({
        "id": "evt_api_2",
        "type": "payment_intent.succeeded",
        "data": {"object": {"id": "pi_1"}}
    })
    .to_string()
    .into_bytes();

    let (status, body) = send(&t.app, webhook(&payload, Some(sign(&payload)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
    assert_eq!(body["minted"], 0);
}

#[tokio::test]
async fn test_download_errors() {
    let t = test_app().await;

    let (status, body) = send(&t.app, get("/download/not-a-real-token")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "LINK_INVALID");

    let (status, body) = send(&t.app, get("/download")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let expired = PurchaseRecord::mint(
        NewPurchase {
            external_payment_ref: "cs_test_old".into(),
            product_kind: ProductKind::Scenario,
            product_id: "s1".into(),
            customer_email: Some("buyer@example.com".into()),
            customer_name: None,
        },
        Utc::now() - Duration::hours(72),
    );
    t.store.insert(&expired).await.unwrap();

    let (status, body) = send(&t.app, get(&format!("/download/{}", expired.download_token))).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "LINK_EXPIRED");
}

#[tokio::test]
async fn test_checkout_validation() {
    let t = test_app().await;

    let (status, body) = send(&t.app, post_json("/api/checkout", &json!({"cartItems": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CART");

    let (status, body) = send(&t.app, post_json("/api/checkout", &json!({"nope": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CART");

    let (status, body) = send(&t.app, post_json("/api/checkout/verify", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, _) = send(&t.app, get("/api/checkout")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_payments_disabled_without_provider() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        Backends {
            store: store.clone(),
            catalog: store,
            files: Arc::new(MockFileStore::new()),
            notifier: Arc::new(LogDispatcher),
        },
        None,
        "https://shop.example",
    );
    let app = router(state);

    let (status, body) = send(&app, post_json("/api/checkout", &scenario_cart())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PAYMENTS_DISABLED");

    let (_, body) = send(&app, get("/health")).await;
    assert_eq!(body["stripeConfigured"], false);
}
