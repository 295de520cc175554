//! End-to-end tests for the HTTP surface.
//!
//! Each test owns an in-memory database and drives the router directly.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use stockline_api::{build_router, AppState};
use stockline_db::{Database, DbConfig};
use tower::ServiceExt;

const ACTOR: &str = "clerk-1";

struct TestApp {
    router: Router,
    db: Database,
}

impl TestApp {
    async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let router = build_router(AppState::new(db.clone()));
        TestApp { router, db }
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    async fn create(&self, uri: &str, body: Value) -> String {
        let (status, value) = self.post(uri, body).await;
        assert_eq!(status, StatusCode::CREATED, "{uri}: {value}");
        value["id"].as_str().unwrap().to_string()
    }

    async fn store(&self, code: &str) -> String {
        self.create("/api/stores", json!({ "code": code, "name": format!("Store {code}") }))
            .await
    }

    async fn product(&self, code: &str) -> String {
        self.create(
            "/api/products",
            json!({
                "code": code,
                "name": format!("Product {code}"),
                "unitOfMeasure": "bag",
                "costPriceCents": 1000,
                "sellingPriceCents": 1500
            }),
        )
        .await
    }

    async fn party(&self, kind: &str, name: &str) -> String {
        self.create(&format!("/api/{kind}"), json!({ "name": name })).await
    }

    async fn on_hand(&self, store_id: &str, product_id: &str) -> i64 {
        self.db.inventory().read(store_id, product_id).await.unwrap()
    }

    async fn adjust(&self, store_id: &str, product_id: &str, delta: i64) {
        let (status, body) = self
            .post(
                "/api/inventory/adjust",
                json!({
                    "storeId": store_id,
                    "productId": product_id,
                    "delta": delta,
                    "actorId": ACTOR
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

#[tokio::test]
async fn test_health_reports_database_up() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn test_unknown_product_is_404() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/products/does-not-exist").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_opening_quantities_reject_duplicates() {
    let app = TestApp::new().await;
    let store = app.store("NBO").await;
    let sugar = app.product("SUG").await;
    let rice = app.product("RIC").await;

    let (status, body) = app
        .post(
            "/api/opening-quantities",
            json!({
                "items": [{ "storeId": store, "productId": sugar, "openingQuantity": 40 }],
                "actorId": ACTOR
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(app.on_hand(&store, &sugar).await, 40);

    // A batch touching an existing pair is rejected whole
    let (status, body) = app
        .post(
            "/api/opening-quantities",
            json!({
                "items": [
                    { "storeId": store, "productId": rice, "openingQuantity": 10 },
                    { "storeId": store, "productId": sugar, "openingQuantity": 5 }
                ],
                "actorId": ACTOR
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "DUPLICATE_OPENING_BALANCE");
    assert_eq!(
        body["duplicateItems"],
        json!([{ "storeId": store, "productId": sugar }])
    );
    assert_eq!(app.on_hand(&store, &rice).await, 0);
    assert_eq!(app.on_hand(&store, &sugar).await, 40);
}

#[tokio::test]
async fn test_receive_items_flow() {
    let app = TestApp::new().await;
    let store = app.store("NBO").await;
    let sugar = app.product("SUG").await;
    let supplier = app.party("suppliers", "Mills Ltd").await;

    let (status, po) = app
        .post(
            "/api/purchase-orders",
            json!({
                "supplierId": supplier,
                "orderDate": today(),
                "lines": [{ "productId": sugar, "quantity": 10, "unitPriceCents": 1000 }],
                "actorId": ACTOR
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{po}");
    assert_eq!(po["order"]["status"], "draft");
    let po_id = po["order"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(&format!("/api/purchase-orders/{po_id}/send"), json!({ "actorId": ACTOR }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let receive = |quantity: i64| {
        json!({
            "purchaseOrderId": po_id,
            "storeId": store,
            "items": [{ "productId": sugar, "receivedQuantity": quantity }],
            "actorId": ACTOR
        })
    };

    let (status, body) = app.post("/api/receive-items", receive(4)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["poStatus"], "sent");
    assert_eq!(body["receipts"].as_array().unwrap().len(), 1);

    let (status, body) = app.post("/api/receive-items", receive(7)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_RECEIVING_QUANTITY");
    assert_eq!(body["details"]["remaining"], 6);

    let (status, body) = app.post("/api/receive-items", receive(6)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["poStatus"], "received");
    assert_eq!(app.on_hand(&store, &sugar).await, 10);

    let (_, receipts) = app.get(&format!("/api/purchase-orders/{po_id}/receipts")).await;
    assert_eq!(receipts.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_oversized_unit_price_is_400() {
    let app = TestApp::new().await;
    let sugar = app.product("SUG").await;
    let supplier = app.party("suppliers", "Mills Ltd").await;

    let (status, body) = app
        .post(
            "/api/purchase-orders",
            json!({
                "supplierId": supplier,
                "orderDate": today(),
                "lines": [{ "productId": sugar, "quantity": 1000, "unitPriceCents": i64::MAX / 10 }],
                "actorId": ACTOR
            }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_stock_take_reports_differences() {
    let app = TestApp::new().await;
    let store = app.store("NBO").await;
    let sugar = app.product("SUG").await;
    let rice = app.product("RIC").await;
    app.adjust(&store, &sugar, 50).await;
    app.adjust(&store, &rice, 8).await;

    let (status, body) = app
        .post(
            "/api/stock-take",
            json!({
                "storeId": store,
                "items": [
                    { "productId": sugar, "countedQuantity": 45 },
                    { "productId": rice, "countedQuantity": 8 }
                ],
                "staffId": ACTOR
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(
        body["adjustments"],
        json!([{ "productId": sugar, "systemQuantity": 50, "countedQuantity": 45, "diff": -5 }])
    );
    assert_eq!(app.on_hand(&store, &sugar).await, 45);

    let stock_take_id = body["stockTakeId"].as_str().unwrap();
    let (status, stored) = app.get(&format!("/api/stock-takes/{stock_take_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["adjustments"], body["adjustments"]);
}

#[tokio::test]
async fn test_mark_delivered_without_stock_is_422() {
    let app = TestApp::new().await;
    let store = app.store("NBO").await;
    let sugar = app.product("SUG").await;
    let customer = app.party("customers", "Corner Shop").await;
    app.adjust(&store, &sugar, 3).await;

    let (status, order) = app
        .post(
            "/api/sales-orders",
            json!({
                "customerId": customer,
                "storeId": store,
                "orderDate": today(),
                "lines": [{ "productId": sugar, "quantity": 5, "unitPriceCents": 1500 }],
                "actorId": ACTOR
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    let order_id = order["order"]["id"].as_str().unwrap().to_string();
    let item_id = order["items"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(&format!("/api/sales-orders/{order_id}/approve"), json!({ "actorId": ACTOR }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, note) = app
        .post(
            "/api/delivery-notes",
            json!({
                "salesOrderId": order_id,
                "deliveryDate": today(),
                "lines": [{ "salesOrderItemId": item_id, "quantity": 5 }],
                "actorId": ACTOR
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{note}");
    let note_id = note["note"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/api/mark-delivered",
            json!({ "deliveryNoteId": note_id, "actorId": ACTOR }),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "NEGATIVE_INVENTORY");
    assert_eq!(body["details"]["onHand"], 3);
    assert_eq!(app.on_hand(&store, &sugar).await, 3);

    let (_, order) = app.get(&format!("/api/sales-orders/{order_id}")).await;
    assert_eq!(order["items"][0]["shippedQuantity"], 0);
}

#[tokio::test]
async fn test_assign_rider_requires_one_target() {
    let app = TestApp::new().await;
    let rider = app.party("riders", "Otieno").await;

    let (status, body) = app
        .post(
            "/api/assign-rider",
            json!({ "riderId": rider, "actorId": ACTOR }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}
