//! Axum router and all HTTP handlers for larder-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)` but the router itself is
//! what the scenario tests in `tests/` drive, without binding a socket.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::{error, info};

use larder_db::inventory::{self, IngredientPatch, NewIngredient};
use larder_db::ledger::{self, AdjustmentKind, NewAdjustment, NewReceipt};
use larder_db::orders;

use crate::api_types::{
    AdjustmentRequest, BulkReceiptRequest, BulkReceiptResponse, CreateIngredientRequest,
    ErrorResponse, HealthResponse, HistoryResponse, MenuSyncResponse, MessageResponse,
    PreviewResponse, ReceiptRequest, SaveRecipeRequest,
};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stock", get(stock))
        .route("/v1/stock/low", get(low_stock))
        .route("/v1/ingredients", post(create_ingredient))
        .route("/v1/ingredients/:id", put(update_ingredient))
        .route("/v1/ingredients/:id", delete(delete_ingredient))
        .route("/v1/recipes", get(recipes))
        .route("/v1/recipes", post(save_recipe))
        .route("/v1/recipes/:guid", delete(delete_recipe))
        .route("/v1/menu/local", get(local_menu))
        .route("/v1/menu/sync", post(menu_sync))
        .route("/v1/receipts", post(receive))
        .route("/v1/receipts/bulk", post(receive_bulk))
        .route("/v1/adjustments", post(adjust))
        .route("/v1/history", get(history))
        .route("/v1/waste/summary", get(waste_summary))
        .route("/v1/orders", get(orders_list))
        .route("/v1/orders/stats", get(order_stats))
        .route("/v1/orders/:id", get(order_detail))
        .route("/v1/sync/preview", post(sync_preview))
        .route("/v1/sync/commit", post(sync_commit))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn internal(err: impl std::fmt::Display) -> Response {
    error!(%err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new(err)),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// Stock & ingredients
// ---------------------------------------------------------------------------

pub(crate) async fn stock(State(st): State<Arc<AppState>>) -> Response {
    match inventory::list_ingredients(&st.pool).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn low_stock(State(st): State<Arc<AppState>>) -> Response {
    match ledger::low_stock(&st.pool).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn create_ingredient(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateIngredientRequest>,
) -> Response {
    if req.name.trim().is_empty() {
        return bad_request("name is required");
    }
    let new = NewIngredient {
        name: req.name,
        category: req.category.or_else(|| Some("Other".to_string())),
        unit: req.unit.or_else(|| Some("unit".to_string())),
        cost_per_unit: req.cost_per_unit.unwrap_or(0.0),
        threshold: req.threshold.unwrap_or(5.0),
    };
    match inventory::create_ingredient(&st.pool, &new).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn update_ingredient(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<IngredientPatch>,
) -> Response {
    match inventory::update_ingredient(&st.pool, &id, &patch).await {
        Ok(true) => (StatusCode::OK, Json(MessageResponse::success("ingredient updated")))
            .into_response(),
        Ok(false) => not_found("ingredient not found"),
        Err(e) => internal(e),
    }
}

pub(crate) async fn delete_ingredient(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match inventory::delete_ingredient(&st.pool, &id).await {
        Ok(true) => (StatusCode::OK, Json(MessageResponse::success("ingredient deleted")))
            .into_response(),
        Ok(false) => not_found("ingredient not found"),
        Err(e) => internal(e),
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

pub(crate) async fn recipes(State(st): State<Arc<AppState>>) -> Response {
    match inventory::all_recipes(&st.pool).await {
        Ok(map) => (StatusCode::OK, Json(map)).into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn save_recipe(
    State(st): State<Arc<AppState>>,
    Json(req): Json<SaveRecipeRequest>,
) -> Response {
    if req.menu_item_guid.trim().is_empty() {
        return bad_request("menu_item_guid is required");
    }
    match inventory::replace_recipe(&st.pool, &req.menu_item_guid, &req.components).await {
        Ok(()) => (StatusCode::OK, Json(MessageResponse::success("recipe saved")))
            .into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn delete_recipe(
    State(st): State<Arc<AppState>>,
    Path(guid): Path<String>,
) -> Response {
    match inventory::delete_recipe(&st.pool, &guid).await {
        Ok(true) => (StatusCode::OK, Json(MessageResponse::success("recipe deleted")))
            .into_response(),
        Ok(false) => not_found("recipe not found"),
        Err(e) => internal(e),
    }
}

// ---------------------------------------------------------------------------
// Menu catalog
// ---------------------------------------------------------------------------

pub(crate) async fn local_menu(State(st): State<Arc<AppState>>) -> Response {
    match inventory::list_menu_items(&st.pool).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => internal(e),
    }
}

/// Pull the upstream catalog and refresh the local mirror.
pub(crate) async fn menu_sync(State(st): State<Arc<AppState>>) -> Response {
    let session = match st.sync.establish_session().await {
        Ok(session) => session,
        Err(e) => return internal(e),
    };
    let doc = match st.pos.menu_catalog(&session).await {
        Ok(doc) => doc,
        Err(e) => return internal(e),
    };

    let items = doc.flatten();
    let mut conn = match st.pool.acquire().await {
        Ok(conn) => conn,
        Err(e) => return internal(e),
    };
    for item in &items {
        let row = inventory::MenuItem {
            item_guid: item.guid.clone(),
            item_name: item.name.clone(),
            menu: item.menu.clone(),
            group_path: Some(item.group_path.clone()),
        };
        if let Err(e) = inventory::upsert_menu_item(&mut conn, &row).await {
            return internal(e);
        }
    }

    info!(items = items.len(), "menu catalog synced");
    (
        StatusCode::OK,
        Json(MenuSyncResponse {
            status: "success",
            items_synced: items.len(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Receipts & adjustments
// ---------------------------------------------------------------------------

fn receipt_from_request(req: ReceiptRequest) -> NewReceipt {
    NewReceipt {
        ingredient_id: req.ingredient_id,
        quantity: req.quantity,
        supplier: req.supplier,
        invoice_number: req.invoice_number,
        notes: req.notes,
        unit_cost: req.unit_cost,
    }
}

pub(crate) async fn receive(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ReceiptRequest>,
) -> Response {
    match ledger::receive_delivery(&st.pool, &receipt_from_request(req)).await {
        Ok(row) => (StatusCode::OK, Json(row)).into_response(),
        Err(e) => bad_request(&e.to_string()),
    }
}

/// Bulk receipt: each line is its own transaction; a bad line does not block
/// the rest of the delivery.
pub(crate) async fn receive_bulk(
    State(st): State<Arc<AppState>>,
    Json(req): Json<BulkReceiptRequest>,
) -> Response {
    if req.items.is_empty() {
        return bad_request("no items provided");
    }

    let mut received = 0usize;
    let mut failed = 0usize;
    for item in req.items {
        match ledger::receive_delivery(&st.pool, &receipt_from_request(item)).await {
            Ok(_) => received += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(error = %e, "bulk receipt line failed");
            }
        }
    }

    (
        StatusCode::OK,
        Json(BulkReceiptResponse {
            status: if failed == 0 { "success" } else { "partial" },
            received,
            failed,
        }),
    )
        .into_response()
}

pub(crate) async fn adjust(
    State(st): State<Arc<AppState>>,
    Json(req): Json<AdjustmentRequest>,
) -> Response {
    let kind = match req.kind.as_deref() {
        None => AdjustmentKind::Deduction,
        Some(raw) => match AdjustmentKind::parse(raw) {
            Ok(kind) => kind,
            Err(e) => return bad_request(&e.to_string()),
        },
    };
    let adj = NewAdjustment {
        ingredient_id: req.ingredient_id,
        quantity: req.quantity,
        kind,
        reason: req.reason,
        staff_member: req.staff_member,
        notes: req.notes,
    };
    match ledger::log_adjustment(&st.pool, &adj).await {
        Ok(row) => (StatusCode::OK, Json(row)).into_response(),
        Err(e) => bad_request(&e.to_string()),
    }
}

pub(crate) async fn history(State(st): State<Arc<AppState>>) -> Response {
    let deliveries = match ledger::recent_receipts(&st.pool, 10).await {
        Ok(rows) => rows,
        Err(e) => return internal(e),
    };
    let adjustments = match ledger::recent_adjustments(&st.pool, 10).await {
        Ok(rows) => rows,
        Err(e) => return internal(e),
    };
    (
        StatusCode::OK,
        Json(HistoryResponse {
            deliveries,
            adjustments,
        }),
    )
        .into_response()
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct WasteQuery {
    days: Option<i64>,
}

pub(crate) async fn waste_summary(
    State(st): State<Arc<AppState>>,
    Query(q): Query<WasteQuery>,
) -> Response {
    match ledger::waste_summary(&st.pool, q.days.unwrap_or(30)).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => internal(e),
    }
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

pub(crate) async fn orders_list(State(st): State<Arc<AppState>>) -> Response {
    match orders::recent_orders(&st.pool, 50).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn order_stats(State(st): State<Arc<AppState>>) -> Response {
    match orders::order_stats(&st.pool).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn order_detail(
    State(st): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    match orders::get_order(&st.pool, id).await {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => not_found("order not found"),
        Err(e) => internal(e),
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

pub(crate) async fn sync_preview(State(st): State<Arc<AppState>>) -> Response {
    info!("sync preview requested");
    match st.sync.preview().await {
        Ok(preview) => (
            StatusCode::OK,
            Json(PreviewResponse {
                status: "success",
                preview: true,
                new_orders: preview.orders.len(),
                orders: preview.orders,
                deductions: preview.deductions,
            }),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}

pub(crate) async fn sync_commit(State(st): State<Arc<AppState>>) -> Response {
    info!("sync commit requested");
    match st.sync.commit().await {
        Ok(summary) => (
            StatusCode::OK,
            Json(MessageResponse::success(summary.message())),
        )
            .into_response(),
        Err(e) => internal(e),
    }
}
