//! JSON request and response shapes for the larder-daemon API.

use larder_db::inventory::RecipeComponent;
use larder_db::ledger::{AdjustmentRow, ReceiptRow};
use larder_sync::{DeductionLine, PreviewOrder};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generic envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// `{"status": "success", "message": ...}` — the envelope every simple
/// mutation returns.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl ToString) -> Self {
        Self {
            status: "error",
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Ingredients & recipes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub cost_per_unit: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SaveRecipeRequest {
    pub menu_item_guid: String,
    #[serde(default)]
    pub components: Vec<RecipeComponent>,
}

// ---------------------------------------------------------------------------
// Receipts & adjustments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub ingredient_id: String,
    pub quantity: f64,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub unit_cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkReceiptRequest {
    pub items: Vec<ReceiptRequest>,
}

#[derive(Debug, Serialize)]
pub struct BulkReceiptResponse {
    pub status: &'static str,
    pub received: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub ingredient_id: String,
    pub quantity: f64,
    pub reason: String,
    /// "Deduction" (default) or "Addition".
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub staff_member: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub deliveries: Vec<ReceiptRow>,
    pub adjustments: Vec<AdjustmentRow>,
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub status: &'static str,
    pub preview: bool,
    pub new_orders: usize,
    pub orders: Vec<PreviewOrder>,
    pub deductions: Vec<DeductionLine>,
}

#[derive(Debug, Serialize)]
pub struct MenuSyncResponse {
    pub status: &'static str,
    pub items_synced: usize,
}
