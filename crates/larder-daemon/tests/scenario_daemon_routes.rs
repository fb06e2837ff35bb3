//! In-process scenario tests for the record-keeping HTTP endpoints.

mod common;

use axum::http::StatusCode;
use common::{call, delete, get, make_state, post_json, put_json, router, MockPos};
use serde_json::json;

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;

    let (status, body) = call(router(&state), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "larder-daemon");
}

#[tokio::test]
async fn ingredient_create_update_delete_round_trip() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;

    let (status, created) = call(
        router(&state),
        post_json(
            "/v1/ingredients",
            json!({"name": "Cheddar", "category": "Dairy", "unit": "kg", "cost_per_unit": 7.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["id"], "cheddar");
    assert_eq!(created["current_stock"], 0.0);

    let (status, _) = call(
        router(&state),
        put_json("/v1/ingredients/cheddar", json!({"current_stock": 12.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stock) = call(router(&state), get("/v1/stock")).await;
    assert_eq!(stock.as_array().unwrap().len(), 1);
    assert_eq!(stock[0]["current_stock"], 12.0);

    let (status, _) = call(router(&state), delete("/v1/ingredients/cheddar")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(router(&state), delete("/v1/ingredients/cheddar")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_ingredient_requires_a_name() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;

    let (status, body) = call(
        router(&state),
        post_json("/v1/ingredients", json!({"name": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn receipts_move_stock_and_show_in_history() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;

    call(
        router(&state),
        post_json("/v1/ingredients", json!({"name": "Flour", "unit": "kg"})),
    )
    .await;

    let (status, receipt) = call(
        router(&state),
        post_json(
            "/v1/receipts",
            json!({"ingredient_id": "flour", "quantity": 20.0, "supplier": "Mill & Co", "unit_cost": 1.1}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["new_stock"], 20.0);

    // Unknown ingredient is a caller error, not a 500.
    let (status, _) = call(
        router(&state),
        post_json("/v1/receipts", json!({"ingredient_id": "ghost", "quantity": 1.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, history) = call(router(&state), get("/v1/history")).await;
    assert_eq!(history["deliveries"].as_array().unwrap().len(), 1);
    assert_eq!(history["deliveries"][0]["supplier"], "Mill & Co");
}

#[tokio::test]
async fn bulk_receipt_continues_past_bad_lines() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;
    call(
        router(&state),
        post_json("/v1/ingredients", json!({"name": "Flour"})),
    )
    .await;

    let (status, body) = call(
        router(&state),
        post_json(
            "/v1/receipts/bulk",
            json!({"items": [
                {"ingredient_id": "flour", "quantity": 5.0},
                {"ingredient_id": "ghost", "quantity": 2.0},
                {"ingredient_id": "flour", "quantity": 3.0}
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["status"], "partial");

    let (_, stock) = call(router(&state), get("/v1/stock")).await;
    assert_eq!(stock[0]["current_stock"], 8.0);
}

#[tokio::test]
async fn adjustments_default_to_deduction() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;
    call(
        router(&state),
        post_json("/v1/ingredients", json!({"name": "Milk", "unit": "l"})),
    )
    .await;
    call(
        router(&state),
        put_json("/v1/ingredients/milk", json!({"current_stock": 10.0})),
    )
    .await;

    let (status, row) = call(
        router(&state),
        post_json(
            "/v1/adjustments",
            json!({"ingredient_id": "milk", "quantity": 2.5, "reason": "Spoilage"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["kind"], "Deduction");
    assert_eq!(row["new_stock"], 7.5);

    let (status, _) = call(
        router(&state),
        post_json(
            "/v1/adjustments",
            json!({"ingredient_id": "milk", "quantity": 1.0, "reason": "Recount", "kind": "Nonsense"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recipes_replace_and_list() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;
    call(
        router(&state),
        post_json("/v1/ingredients", json!({"name": "Bun"})),
    )
    .await;

    let (status, _) = call(
        router(&state),
        post_json(
            "/v1/recipes",
            json!({"menu_item_guid": "item-burger", "components": [{"ingredient_id": "bun", "quantity": 1.0}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, recipes) = call(router(&state), get("/v1/recipes")).await;
    assert_eq!(recipes["item-burger"][0]["ingredient_id"], "bun");

    let (status, _) = call(router(&state), delete("/v1/recipes/item-burger")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(router(&state), delete("/v1/recipes/item-burger")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_order_detail_is_404() {
    let (state, _pool, _dir) = make_state(MockPos::new()).await;
    let (status, body) = call(router(&state), get("/v1/orders/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}
