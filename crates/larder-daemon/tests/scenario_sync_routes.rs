//! Sync trigger and menu sync over HTTP, driven end to end against the mock
//! POS backend and an in-memory store.

mod common;

use axum::http::StatusCode;
use common::{call, get, make_state, post_json, router, seed_watermark, MockPos};
use serde_json::json;

fn burger_order(guid: &str, quantity: f64) -> serde_json::Value {
    json!({
        "guid": guid,
        "orderNumber": "88",
        "closedDate": "2026-08-01T12:45:00.000+0000",
        "totalAmount": 13.0,
        "paymentStatus": "PAID",
        "checks": [{"selections": [
            {"item": {"guid": "item-burger", "name": "Burger"}, "quantity": quantity}
        ]}]
    })
}

async fn seed_burger_fixtures(state: &std::sync::Arc<larder_daemon::state::AppState>) {
    for name in ["Bun", "Patty"] {
        call(
            router(state),
            post_json("/v1/ingredients", json!({"name": name, "unit": "pcs"})),
        )
        .await;
        call(
            router(state),
            common::put_json(
                &format!("/v1/ingredients/{}", name.to_lowercase()),
                json!({"current_stock": 10.0}),
            ),
        )
        .await;
    }
    call(
        router(state),
        post_json(
            "/v1/recipes",
            json!({"menu_item_guid": "item-burger", "components": [
                {"ingredient_id": "bun", "quantity": 1.0},
                {"ingredient_id": "patty", "quantity": 1.0}
            ]}),
        ),
    )
    .await;
}

#[tokio::test]
async fn preview_then_commit_over_http() {
    let (state, pool, _dir) =
        make_state(MockPos::new().with_orders(vec![burger_order("ord-1", 2.0)])).await;
    seed_burger_fixtures(&state).await;
    seed_watermark(&pool).await;

    let (status, preview) = call(router(&state), post_json("/v1/sync/preview", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["status"], "success");
    assert_eq!(preview["preview"], true);
    assert_eq!(preview["new_orders"], 1);
    assert_eq!(preview["orders"][0]["items"][0]["name"], "Burger");
    assert_eq!(preview["deductions"].as_array().unwrap().len(), 2);

    // Preview mutated nothing.
    let (_, stock) = call(router(&state), get("/v1/stock")).await;
    assert!(stock
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["current_stock"] == 10.0));
    let (_, orders) = call(router(&state), get("/v1/orders")).await;
    assert!(orders.as_array().unwrap().is_empty());

    // The caller confirms. The mock serves its references once per instance,
    // so the commit leg runs against a fresh state over its own store.
    let (commit_state, commit_pool, _dir2) =
        make_state(MockPos::new().with_orders(vec![burger_order("ord-1", 2.0)])).await;
    seed_burger_fixtures(&commit_state).await;
    seed_watermark(&commit_pool).await;

    let (status, body) = call(
        router(&commit_state),
        post_json("/v1/sync/commit", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("1 new order(s)"));

    let (_, stock) = call(router(&commit_state), get("/v1/stock")).await;
    assert!(stock
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["current_stock"] == 8.0));

    let (_, orders) = call(router(&commit_state), get("/v1/orders")).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
    let order_id = orders[0]["id"].as_i64().unwrap();

    let (_, detail) = call(router(&commit_state), get(&format!("/v1/orders/{order_id}"))).await;
    assert_eq!(detail["items"].as_array().unwrap().len(), 1);
    assert_eq!(detail["deductions"].as_array().unwrap().len(), 2);

    let (_, stats) = call(router(&commit_state), get("/v1/orders/stats")).await;
    assert_eq!(stats["total_count"], 1);
}

#[tokio::test]
async fn commit_with_no_orders_reports_success() {
    let (state, pool, _dir) = make_state(MockPos::new()).await;
    seed_watermark(&pool).await;

    let (status, body) = call(router(&state), post_json("/v1/sync/commit", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No new orders found");
}

#[tokio::test]
async fn sync_failure_surfaces_as_500_with_message() {
    // No tenant id on file → config error.
    let (state, pool, dir) = make_state(MockPos::new()).await;
    seed_watermark(&pool).await;
    let store = larder_config::CredentialStore::new(dir.path().join("pos_credentials.txt"));
    store
        .save(&larder_config::Credentials {
            client_id: "cid".to_string(),
            client_secret: "sec".to_string(),
            restaurant_id: String::new(),
            management_group_id: None,
            access_token: Some("tok".to_string()),
        })
        .unwrap();

    let (status, body) = call(router(&state), post_json("/v1/sync/commit", json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("restaurant id"));
}

#[tokio::test]
async fn menu_sync_mirrors_the_catalog() {
    let menu = json!({
        "menus": [{
            "name": "Food",
            "menuGroups": [{
                "name": "Mains",
                "menuItems": [
                    {"guid": "item-burger", "name": "Burger"},
                    {"guid": "item-salad", "name": "Salad"}
                ]
            }]
        }]
    });
    let (state, _pool, _dir) = make_state(MockPos::new().with_menu(menu)).await;

    let (status, body) = call(router(&state), post_json("/v1/menu/sync", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items_synced"], 2);

    let (_, local) = call(router(&state), get("/v1/menu/local")).await;
    let items = local.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().any(|i| i["item_name"] == "Burger"));

    // Re-syncing refreshes instead of duplicating.
    let (_, body) = call(router(&state), post_json("/v1/menu/sync", json!({}))).await;
    assert_eq!(body["items_synced"], 2);
    let (_, local) = call(router(&state), get("/v1/menu/local")).await;
    assert_eq!(local.as_array().unwrap().len(), 2);
}
