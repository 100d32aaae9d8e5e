//! Pharmacy catalog and order endpoints.

mod common;

use common::{start, start_with, test_config};
use serde_json::{Value, json};

const CATALOG: &str = r#"[
  {"product_name": "Vicks VapoRub (Pack of 1)", "brand": "Vicks", "category": "Cold Care",
   "sub_category": "Balms", "sale_price": 90.0, "market_price": 120.0},
  {"product_name": "Dolo 650 Tablet", "brand": "Micro Labs", "category": "Pain Relief",
   "sub_category": "Tablets", "sale_price": 30.0, "market_price": 30.0, "stock": 3},
  {"product_name": "Volini Spray", "brand": "Sun Pharma", "category": "Pain Relief",
   "sub_category": "Sprays", "sale_price": 150.0, "market_price": 200.0}
]"#;

async fn with_catalog() -> (common::TestServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("medicines.json");
    std::fs::write(&path, CATALOG).unwrap();
    let mut cfg = test_config();
    cfg.pharmacy.catalog_path = path.to_string_lossy().into_owned();
    (start_with(cfg, |_| {}).await, dir)
}

async fn get_json(server: &common::TestServer, path: &str) -> Value {
    let resp = server.client.get(server.url(path)).send().await.unwrap();
    assert_eq!(resp.status(), 200, "GET {path}");
    resp.json().await.unwrap()
}

#[tokio::test]
async fn catalog_browsing() {
    let (server, _dir) = with_catalog().await;

    let all = get_json(&server, "/pharmacy/medicines").await;
    assert_eq!(all.as_array().unwrap().len(), 3);
    let vicks = &all[0];
    assert_eq!(vicks["id"], 1);
    assert_eq!(vicks["baseName"], "Vicks VapoRub");
    assert_eq!(vicks["packSize"], "Pack of 1");
    assert_eq!(vicks["discount"], 25);
    assert_eq!(all[1]["stock"], 3);
    assert_eq!(all[1]["selectedWeight"], "Std");

    let pain = get_json(&server, "/pharmacy/medicines?category=pain%20relief").await;
    assert_eq!(pain.as_array().unwrap().len(), 2);

    let search = get_json(&server, "/pharmacy/medicines?search=sun%20spray").await;
    let names: Vec<&str> = search
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Volini Spray"]);

    let limited = get_json(&server, "/pharmacy/medicines?limit=1").await;
    assert_eq!(limited.as_array().unwrap().len(), 1);

    let categories = get_json(&server, "/pharmacy/categories").await;
    assert_eq!(categories, json!(["Cold Care", "Pain Relief"]));

    let subs = get_json(&server, "/pharmacy/subcategories?category=Pain%20Relief").await;
    assert_eq!(subs, json!(["Sprays", "Tablets"]));
    let every_sub = get_json(&server, "/pharmacy/subcategories").await;
    assert_eq!(every_sub.as_array().unwrap().len(), 3);

    server.shutdown().await;
}

#[tokio::test]
async fn missing_catalog_serves_empty_lists() {
    let server = start().await;
    assert_eq!(get_json(&server, "/pharmacy/medicines").await, json!([]));
    assert_eq!(get_json(&server, "/pharmacy/categories").await, json!([]));
    server.shutdown().await;
}

#[tokio::test]
async fn orders_are_listed_per_user() {
    let server = start().await;

    let resp = server
        .client
        .post(server.url("/pharmacy/orders"))
        .json(&json!({"user_id": 7, "items": [{"id": 1, "qty": 2}], "total": 180.0, "status": "delivered"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let first: Value = resp.json().await.unwrap();
    assert_eq!(first["id"], 1001);
    assert_eq!(first["status"], "processing");
    assert_eq!(first["total"], 180.0);

    let second: Value = server
        .client
        .post(server.url("/pharmacy/orders"))
        .json(&json!({"user_id": "7", "items": []}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["id"], 1002);

    server
        .client
        .post(server.url("/pharmacy/orders"))
        .json(&json!({"user_id": 8, "items": []}))
        .send()
        .await
        .unwrap();

    let mine = get_json(&server, "/pharmacy/orders/7").await;
    let ids: Vec<i64> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, [1001, 1002]);
    assert_eq!(get_json(&server, "/pharmacy/orders/99").await, json!([]));

    server.shutdown().await;
}
