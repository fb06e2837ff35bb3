//! Goods-inward receipts and manual stock adjustments.
//!
//! Every mutation here is a read-modify-write on shared ingredient stock, so
//! the stock update and its audit row always share one transaction.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::inventory::Ingredient;

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub ingredient_id: String,
    pub quantity: f64,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    /// Overrides the ingredient's stored cost per unit when set.
    pub unit_cost: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceiptRow {
    pub id: i64,
    pub recorded_at: String,
    pub ingredient_id: Option<String>,
    pub ingredient_name: Option<String>,
    pub quantity_received: f64,
    pub unit: Option<String>,
    pub old_stock: f64,
    pub new_stock: f64,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
    pub unit_cost: f64,
    pub total_cost: f64,
}

/// Receive one delivery: bump stock, refresh the stored cost per unit, and
/// append the receipt audit row.
pub async fn receive_delivery(pool: &SqlitePool, receipt: &NewReceipt) -> Result<ReceiptRow> {
    let ingredient = crate::inventory::get_ingredient(pool, &receipt.ingredient_id)
        .await?
        .ok_or_else(|| anyhow!("ingredient '{}' not found", receipt.ingredient_id))?;

    let old_stock = ingredient.current_stock;
    let new_stock = old_stock + receipt.quantity;
    let unit_cost = receipt.unit_cost.unwrap_or(ingredient.cost_per_unit);
    let total_cost = unit_cost * receipt.quantity;
    let recorded_at = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await.context("receive_delivery begin failed")?;

    sqlx::query("update ingredients set current_stock = ?1, cost_per_unit = ?2 where id = ?3")
        .bind(new_stock)
        .bind(unit_cost)
        .bind(&receipt.ingredient_id)
        .execute(&mut *tx)
        .await
        .context("receive_delivery stock update failed")?;

    let res = sqlx::query(
        r#"
        insert into goods_inward (
          recorded_at, ingredient_id, ingredient_name, quantity_received, unit,
          old_stock, new_stock, supplier, invoice_number, notes, received_by,
          unit_cost, total_cost
        ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&recorded_at)
    .bind(&receipt.ingredient_id)
    .bind(&ingredient.name)
    .bind(receipt.quantity)
    .bind(&ingredient.unit)
    .bind(old_stock)
    .bind(new_stock)
    .bind(&receipt.supplier)
    .bind(&receipt.invoice_number)
    .bind(&receipt.notes)
    .bind("System")
    .bind(unit_cost)
    .bind(total_cost)
    .execute(&mut *tx)
    .await
    .context("receive_delivery insert failed")?;

    tx.commit().await.context("receive_delivery commit failed")?;

    tracing::info!(
        ingredient = %ingredient.name,
        quantity = receipt.quantity,
        old_stock,
        new_stock,
        "delivery received"
    );

    Ok(ReceiptRow {
        id: res.last_insert_rowid(),
        recorded_at,
        ingredient_id: Some(receipt.ingredient_id.clone()),
        ingredient_name: Some(ingredient.name),
        quantity_received: receipt.quantity,
        unit: ingredient.unit,
        old_stock,
        new_stock,
        supplier: receipt.supplier.clone(),
        invoice_number: receipt.invoice_number.clone(),
        notes: receipt.notes.clone(),
        unit_cost,
        total_cost,
    })
}

/// Most recent receipts, newest first.
pub async fn recent_receipts(pool: &SqlitePool, limit: i64) -> Result<Vec<ReceiptRow>> {
    let rows = sqlx::query(
        "select * from goods_inward order by recorded_at desc, id desc limit ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("recent_receipts failed")?;

    rows.iter()
        .map(|row| {
            Ok(ReceiptRow {
                id: row.try_get("id")?,
                recorded_at: row.try_get("recorded_at")?,
                ingredient_id: row.try_get("ingredient_id")?,
                ingredient_name: row.try_get("ingredient_name")?,
                quantity_received: row.try_get("quantity_received")?,
                unit: row.try_get("unit")?,
                old_stock: row.try_get("old_stock")?,
                new_stock: row.try_get("new_stock")?,
                supplier: row.try_get("supplier")?,
                invoice_number: row.try_get("invoice_number")?,
                notes: row.try_get("notes")?,
                unit_cost: row.try_get("unit_cost")?,
                total_cost: row.try_get("total_cost")?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Adjustments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    Deduction,
    Addition,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Deduction => "Deduction",
            AdjustmentKind::Addition => "Addition",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Deduction" => Ok(AdjustmentKind::Deduction),
            "Addition" => Ok(AdjustmentKind::Addition),
            other => Err(anyhow!("invalid adjustment kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAdjustment {
    pub ingredient_id: String,
    pub quantity: f64,
    pub kind: AdjustmentKind,
    pub reason: String,
    pub staff_member: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AdjustmentRow {
    pub id: i64,
    pub recorded_at: String,
    pub ingredient_id: Option<String>,
    pub ingredient_name: Option<String>,
    pub quantity: f64,
    pub kind: String,
    pub unit: Option<String>,
    pub reason: Option<String>,
    pub staff_member: Option<String>,
    pub notes: Option<String>,
    pub old_stock: f64,
    pub new_stock: f64,
    pub cost_per_unit: f64,
    pub total_waste_cost: f64,
}

/// Log one manual adjustment: move stock and append the audit row.
///
/// Deductions carry a positive waste cost; additions record it negated so a
/// correction cancels out in the waste summary.
pub async fn log_adjustment(pool: &SqlitePool, adj: &NewAdjustment) -> Result<AdjustmentRow> {
    let ingredient = crate::inventory::get_ingredient(pool, &adj.ingredient_id)
        .await?
        .ok_or_else(|| anyhow!("ingredient '{}' not found", adj.ingredient_id))?;

    let old_stock = ingredient.current_stock;
    let new_stock = match adj.kind {
        AdjustmentKind::Addition => old_stock + adj.quantity,
        AdjustmentKind::Deduction => old_stock - adj.quantity,
    };
    let cost_per_unit = ingredient.cost_per_unit;
    let signed_cost = match adj.kind {
        AdjustmentKind::Deduction => cost_per_unit * adj.quantity,
        AdjustmentKind::Addition => -(cost_per_unit * adj.quantity),
    };
    let recorded_at = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await.context("log_adjustment begin failed")?;

    sqlx::query("update ingredients set current_stock = ?1 where id = ?2")
        .bind(new_stock)
        .bind(&adj.ingredient_id)
        .execute(&mut *tx)
        .await
        .context("log_adjustment stock update failed")?;

    let res = sqlx::query(
        r#"
        insert into inventory_adjustments (
          recorded_at, ingredient_id, ingredient_name, quantity, kind, unit,
          reason, staff_member, notes, old_stock, new_stock, cost_per_unit,
          total_waste_cost
        ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&recorded_at)
    .bind(&adj.ingredient_id)
    .bind(&ingredient.name)
    .bind(adj.quantity)
    .bind(adj.kind.as_str())
    .bind(&ingredient.unit)
    .bind(&adj.reason)
    .bind(&adj.staff_member)
    .bind(&adj.notes)
    .bind(old_stock)
    .bind(new_stock)
    .bind(cost_per_unit)
    .bind(signed_cost)
    .execute(&mut *tx)
    .await
    .context("log_adjustment insert failed")?;

    tx.commit().await.context("log_adjustment commit failed")?;

    tracing::info!(
        kind = adj.kind.as_str(),
        ingredient = %ingredient.name,
        quantity = adj.quantity,
        reason = %adj.reason,
        old_stock,
        new_stock,
        "adjustment logged"
    );

    Ok(AdjustmentRow {
        id: res.last_insert_rowid(),
        recorded_at,
        ingredient_id: Some(adj.ingredient_id.clone()),
        ingredient_name: Some(ingredient.name),
        quantity: adj.quantity,
        kind: adj.kind.as_str().to_string(),
        unit: ingredient.unit,
        reason: Some(adj.reason.clone()),
        staff_member: adj.staff_member.clone(),
        notes: adj.notes.clone(),
        old_stock,
        new_stock,
        cost_per_unit,
        total_waste_cost: signed_cost,
    })
}

/// Most recent adjustments, newest first.
pub async fn recent_adjustments(pool: &SqlitePool, limit: i64) -> Result<Vec<AdjustmentRow>> {
    let rows = sqlx::query(
        "select * from inventory_adjustments order by recorded_at desc, id desc limit ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("recent_adjustments failed")?;

    rows.iter()
        .map(|row| {
            Ok(AdjustmentRow {
                id: row.try_get("id")?,
                recorded_at: row.try_get("recorded_at")?,
                ingredient_id: row.try_get("ingredient_id")?,
                ingredient_name: row.try_get("ingredient_name")?,
                quantity: row.try_get("quantity")?,
                kind: row.try_get("kind")?,
                unit: row.try_get("unit")?,
                reason: row.try_get("reason")?,
                staff_member: row.try_get("staff_member")?,
                notes: row.try_get("notes")?,
                old_stock: row.try_get("old_stock")?,
                new_stock: row.try_get("new_stock")?,
                cost_per_unit: row.try_get("cost_per_unit")?,
                total_waste_cost: row.try_get("total_waste_cost")?,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Waste summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WasteByIngredient {
    pub quantity: f64,
    pub unit: Option<String>,
    pub cost: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WasteByReason {
    pub count: u32,
    pub cost: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WasteSummary {
    pub by_ingredient: HashMap<String, WasteByIngredient>,
    pub by_reason: HashMap<String, WasteByReason>,
    pub total_cost: f64,
    pub period_days: i64,
}

/// Deduction-type adjustments over the trailing period, grouped by
/// ingredient and by reason.
pub async fn waste_summary(pool: &SqlitePool, days: i64) -> Result<WasteSummary> {
    let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();

    let rows = sqlx::query(
        r#"
        select ingredient_name, quantity, unit, reason, total_waste_cost
        from inventory_adjustments
        where recorded_at >= ?1 and kind = 'Deduction'
        "#,
    )
    .bind(&cutoff)
    .fetch_all(pool)
    .await
    .context("waste_summary failed")?;

    let mut summary = WasteSummary {
        by_ingredient: HashMap::new(),
        by_reason: HashMap::new(),
        total_cost: 0.0,
        period_days: days,
    };

    for row in rows {
        let name: Option<String> = row.try_get("ingredient_name")?;
        let quantity: f64 = row.try_get("quantity")?;
        let unit: Option<String> = row.try_get("unit")?;
        let reason: Option<String> = row.try_get("reason")?;
        let cost: f64 = row.try_get("total_waste_cost")?;

        let entry = summary
            .by_ingredient
            .entry(name.unwrap_or_else(|| "unknown".to_string()))
            .or_default();
        entry.quantity += quantity;
        entry.cost += cost;
        entry.count += 1;
        if entry.unit.is_none() {
            entry.unit = unit;
        }

        let reason_entry = summary
            .by_reason
            .entry(reason.unwrap_or_else(|| "unspecified".to_string()))
            .or_default();
        reason_entry.count += 1;
        reason_entry.cost += cost;

        summary.total_cost += cost;
    }

    Ok(summary)
}

/// Ingredients at or below their reorder threshold, plus any negative stock.
pub async fn low_stock(pool: &SqlitePool) -> Result<Vec<Ingredient>> {
    let rows = sqlx::query(
        "select * from ingredients where current_stock <= threshold order by name asc",
    )
    .fetch_all(pool)
    .await
    .context("low_stock failed")?;

    rows.iter()
        .map(|row| {
            Ok(Ingredient {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                category: row.try_get("category")?,
                unit: row.try_get("unit")?,
                current_stock: row.try_get("current_stock")?,
                threshold: row.try_get("threshold")?,
                cost_per_unit: row.try_get("cost_per_unit")?,
            })
        })
        .collect()
}
