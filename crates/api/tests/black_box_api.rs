use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build the same router as prod, bound to an ephemeral port.
        let app = stockledger_api::app::build_app(stockledger_api::app::AppConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_store(client: &reqwest::Client, base: &str, name: &str) -> String {
    let res = client
        .post(format!("{base}/api/admin/stores"))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn create_product(
    client: &reqwest::Client,
    base: &str,
    sku: &str,
    reorder_point: i64,
) -> String {
    let res = client
        .post(format!("{base}/api/admin/products"))
        .json(&json!({
            "sku": sku,
            "name": format!("Product {sku}"),
            "reorder_point": reorder_point,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json::<Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/healthz", srv.base_url))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn adjust_then_read_back() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    let res = client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .header("x-actor", "alice")
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "change": 10,
            "kind": "purchase",
            "note": "initial receipt",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["new_quantity"], 10);
    assert!(body["reference"].as_str().unwrap().starts_with("TXN-"));

    let res = client
        .get(format!(
            "{}/api/inventory/{store_id}/{product_id}",
            srv.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["quantity"], 10);
}

#[tokio::test]
async fn add_stock_allocates_receipt_references() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    let res = client
        .post(format!("{}/api/inventory/add-stock", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "quantity": 12,
            "note": "pallet from supplier",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["new_quantity"], 12);
    assert!(body["reference"].as_str().unwrap().starts_with("ADD-"));

    // A caller-supplied document number comes back untouched.
    let res = client
        .post(format!("{}/api/inventory/add-stock", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "quantity": 3,
            "reference": "PO-2026-0042",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["new_quantity"], 15);
    assert_eq!(body["reference"], "PO-2026-0042");

    // Receipts only move stock in.
    let res = client
        .post(format!("{}/api/inventory/add-stock", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "quantity": -1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transaction_window_rejects_out_of_range_days() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    for days in ["9223372036854775807", "-1"] {
        let res = client
            .get(format!("{}/api/transactions?days={days}", srv.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "invalid_quantity");
    }

    let res = client
        .get(format!("{}/api/transactions?days=30", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn insufficient_stock_is_422_with_current_quantity() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    let res = client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "change": -5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["current_quantity"], 0);
}

#[tokio::test]
async fn unknown_ids_are_404() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .json(&json!({
            "store_id": uuid::Uuid::now_v7(),
            "product_id": uuid::Uuid::now_v7(),
            "change": 1,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_moves_stock_between_stores() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let from_id = create_store(&client, &srv.base_url, "Downtown").await;
    let to_id = create_store(&client, &srv.base_url, "Harbor").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .json(&json!({
            "store_id": from_id,
            "product_id": product_id,
            "change": 10,
            "kind": "purchase",
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .post(format!("{}/api/inventory/transfer", srv.base_url))
        .json(&json!({
            "from_store_id": from_id,
            "to_store_id": to_id,
            "product_id": product_id,
            "quantity": 4,
            "note": "rebalance",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["from_quantity"], 6);
    assert_eq!(body["to_quantity"], 4);
    assert!(body["reference"].as_str().unwrap().starts_with("TRANSFER-"));

    // Both legs are listed under the shared reference.
    let rows: Value = client
        .get(format!("{}/api/transactions", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let shared = body["reference"].as_str().unwrap();
    let linked: Vec<&Value> = rows
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r["reference"] == shared)
        .collect();
    assert_eq!(linked.len(), 2);
}

#[tokio::test]
async fn set_level_reports_the_delta() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    let res = client
        .post(format!("{}/api/inventory/set-level", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "quantity": 12,
            "note": "recount",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["old_quantity"], 0);
    assert_eq!(body["new_quantity"], 12);
    assert_eq!(body["change"], 12);

    // A second identical set is a no-op with no reference.
    let res = client
        .post(format!("{}/api/inventory/set-level", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "quantity": 12,
        }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["change"], 0);
    assert!(body["reference"].is_null());
}

#[tokio::test]
async fn delete_transaction_reverses_its_effect() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "change": 10,
            "kind": "purchase",
        }))
        .send()
        .await
        .unwrap();

    let rows: Value = client
        .get(format!("{}/api/transactions", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = rows[0]["id"].as_str().unwrap().to_string();

    let res = client
        .delete(format!("{}/api/transactions/{id}", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap()["new_quantity"], 0);

    // Hard mode removed the row outright.
    let res = client
        .get(format!("{}/api/transactions/{id}", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn low_stock_alerts_and_suggestions() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 5).await;

    client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "change": 4,
            "kind": "purchase",
        }))
        .send()
        .await
        .unwrap();

    let body: Value = client
        .get(format!("{}/api/alerts/low-stock", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerts"][0]["level"], "low_stock");

    let body: Value = client
        .get(format!("{}/api/alerts/reorder-suggestions", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // 2 * 5 - 4 on hand.
    assert_eq!(body["suggestions"][0]["suggested_quantity"], 6);
}

#[tokio::test]
async fn deleting_a_store_removes_its_history() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let store_id = create_store(&client, &srv.base_url, "Main").await;
    let product_id = create_product(&client, &srv.base_url, "SKU-1", 0).await;

    client
        .post(format!("{}/api/inventory/adjust", srv.base_url))
        .json(&json!({
            "store_id": store_id,
            "product_id": product_id,
            "change": 5,
            "kind": "purchase",
        }))
        .send()
        .await
        .unwrap();

    let res = client
        .delete(format!("{}/api/admin/stores/{store_id}", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["records_removed"], 1);
    assert_eq!(report["transactions_removed"], 1);

    let rows: Value = client
        .get(format!(
            "{}/api/transactions?store_id={store_id}",
            srv.base_url
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(rows.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn audit_endpoint_reports_consistency() {
    let srv = TestServer::spawn().await;
    let body: Value = reqwest::get(format!("{}/api/admin/audit", srv.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["consistent"], true);
}
