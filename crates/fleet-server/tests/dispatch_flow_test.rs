//! End-to-end dispatch and tracking flow against a live server.
//!
//! Run with: cargo test --test dispatch_flow_test -- --ignored
//!
//! Note: Requires a running fleet server at http://localhost:3000
//! or set FLEET_TEST_URL environment variable.

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("FLEET_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn put(client: &Client, url: String, body: Value) {
    let resp = client.put(url).json(&body).send().await.expect("put");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore] // Run only when server is running
async fn test_dispatch_depart_and_arrive() {
    let client = Client::new();
    let base = base_url();
    let vehicle_id = unique("VEH");
    let driver_id = unique("DRV");
    let order_id = unique("ORD");

    put(
        &client,
        format!("{base}/v1/vehicles/{vehicle_id}"),
        json!({ "plate_number": "IT-1", "vehicle_type": "TRUCK", "max_load": 1000.0, "max_volume": 30.0 }),
    )
    .await;
    put(
        &client,
        format!("{base}/v1/drivers/{driver_id}"),
        json!({ "name": "Integration Driver" }),
    )
    .await;
    put(
        &client,
        format!("{base}/v1/orders/{order_id}"),
        json!({
            "order_number": order_id,
            "origin": { "lat": 52.52, "lon": 13.405 },
            "destination": { "lat": 52.40, "lon": 13.06 },
            "cargo_weight": 400.0,
            "cargo_volume": 5.0,
            "status": "CONFIRMED"
        }),
    )
    .await;

    let resp = client
        .post(format!("{base}/v1/dispatches"))
        .json(&json!({
            "order_ids": [order_id],
            "vehicle_id": vehicle_id,
            "driver_id": driver_id,
            "planned_departure": Utc::now().to_rfc3339()
        }))
        .send()
        .await
        .expect("create dispatch");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let dispatch_id = created["dispatch"]["id"].as_str().unwrap().to_string();
    let shipment_id = created["shipments"][0]["id"].as_str().unwrap().to_string();

    let resp = client
        .put(format!("{base}/v1/dispatches/{dispatch_id}/status"))
        .json(&json!({ "status": "IN_TRANSIT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base}/v1/shipments/{shipment_id}/locations"))
        .json(&json!({ "latitude": 52.46, "longitude": 13.23, "speed": 60.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let point: Value = resp.json().await.unwrap();
    assert!(point["progress"].as_f64().unwrap() > 0.0);

    let resp = client
        .post(format!("{base}/v1/shipments/{shipment_id}/events"))
        .json(&json!({ "event": { "type": "ARRIVAL" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let receipt: Value = resp.json().await.unwrap();
    assert_eq!(receipt["shipment_status"], "UNLOADING");

    let location: Value = client
        .get(format!("{base}/v1/vehicles/{vehicle_id}/location"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(location["vehicle_id"], vehicle_id.as_str());
}
