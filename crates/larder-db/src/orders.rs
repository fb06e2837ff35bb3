//! Synced orders, their items, the deduction audit trail, and the sync
//! watermark.
//!
//! The insert functions take `&mut SqliteConnection` so the orchestrator can
//! stage an entire sync batch inside one transaction; a failure anywhere
//! rolls back every order, item, deduction, stock change, and the watermark
//! advance together.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::{Row, SqlitePool};

pub const WATERMARK_KEY: &str = "orders_watermark";

// ---------------------------------------------------------------------------
// Inserts (transaction-scoped)
// ---------------------------------------------------------------------------

/// One order as staged for insert. Timestamps are kept verbatim as the
/// upstream wire strings; `raw_json` preserves the full payload.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub external_id: String,
    pub order_number: Option<String>,
    pub opened_at: Option<String>,
    pub closed_at: Option<String>,
    pub modified_at: Option<String>,
    pub deleted: bool,
    pub total_amount: Option<f64>,
    pub tax_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub payment_status: Option<String>,
    pub source: Option<String>,
    pub raw_json: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub menu_item_guid: Option<String>,
    pub menu_item_name: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
    pub modifiers: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewDeduction {
    pub order_id: i64,
    pub order_item_id: i64,
    pub ingredient_id: String,
    pub quantity_deducted: f64,
}

/// `true` when an order with this external id is already stored. This is the
/// idempotency gate: the sync engine consults it before fetching detail.
pub async fn order_exists(pool: &SqlitePool, external_id: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("select id from orders where external_id = ?1")
        .bind(external_id)
        .fetch_optional(pool)
        .await
        .context("order_exists failed")?;
    Ok(row.is_some())
}

/// Insert one order row and return its local id.
///
/// A unique violation on `external_id` means another sync committed this
/// order first; callers surface it via [`crate::is_unique_violation`].
pub async fn insert_order(conn: &mut SqliteConnection, order: &NewOrder) -> Result<i64> {
    let res = sqlx::query(
        r#"
        insert into orders (
          external_id, order_number, opened_at, closed_at, modified_at,
          deleted, total_amount, tax_amount, tip_amount, payment_status,
          source, raw_json, synced_at
        ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&order.external_id)
    .bind(&order.order_number)
    .bind(&order.opened_at)
    .bind(&order.closed_at)
    .bind(&order.modified_at)
    .bind(order.deleted)
    .bind(order.total_amount)
    .bind(order.tax_amount)
    .bind(order.tip_amount)
    .bind(&order.payment_status)
    .bind(&order.source)
    .bind(&order.raw_json)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await?;

    Ok(res.last_insert_rowid())
}

pub async fn insert_order_item(
    conn: &mut SqliteConnection,
    order_id: i64,
    item: &NewOrderItem,
) -> Result<i64> {
    let res = sqlx::query(
        r#"
        insert into order_items (
          order_id, menu_item_guid, menu_item_name, quantity, unit_price,
          total_price, modifiers
        ) values (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(order_id)
    .bind(&item.menu_item_guid)
    .bind(&item.menu_item_name)
    .bind(item.quantity)
    .bind(item.unit_price)
    .bind(item.total_price)
    .bind(&item.modifiers)
    .execute(conn)
    .await
    .context("insert_order_item failed")?;

    Ok(res.last_insert_rowid())
}

/// Append one deduction audit row.
pub async fn insert_deduction(conn: &mut SqliteConnection, d: &NewDeduction) -> Result<()> {
    sqlx::query(
        r#"
        insert into order_deductions (
          order_id, order_item_id, ingredient_id, quantity_deducted, recorded_at
        ) values (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(d.order_id)
    .bind(d.order_item_id)
    .bind(&d.ingredient_id)
    .bind(d.quantity_deducted)
    .bind(Utc::now().to_rfc3339())
    .execute(conn)
    .await
    .context("insert_deduction failed")?;
    Ok(())
}

/// Decrement one ingredient's stock in place.
pub async fn deduct_stock(
    conn: &mut SqliteConnection,
    ingredient_id: &str,
    quantity: f64,
) -> Result<()> {
    sqlx::query("update ingredients set current_stock = current_stock - ?1 where id = ?2")
        .bind(quantity)
        .bind(ingredient_id)
        .execute(conn)
        .await
        .context("deduct_stock failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Upper bound of the last successfully committed sync, if any.
pub async fn get_watermark(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(String,)> = sqlx::query_as("select value from sync_meta where key = ?1")
        .bind(WATERMARK_KEY)
        .fetch_optional(pool)
        .await
        .context("get_watermark failed")?;

    match row {
        Some((raw,)) => {
            let parsed = DateTime::parse_from_rfc3339(&raw)
                .with_context(|| format!("stored watermark is not a timestamp: {raw}"))?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        None => Ok(None),
    }
}

/// Advance the watermark. Runs on the caller's connection so commit mode can
/// include it in the batch transaction.
pub async fn set_watermark(conn: &mut SqliteConnection, at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r#"
        insert into sync_meta (key, value) values (?1, ?2)
        on conflict(key) do update set value = excluded.value
        "#,
    )
    .bind(WATERMARK_KEY)
    .bind(at.to_rfc3339())
    .execute(conn)
    .await
    .context("set_watermark failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Browsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderSummary {
    pub id: i64,
    pub external_id: String,
    pub order_number: Option<String>,
    pub closed_at: Option<String>,
    pub total_amount: Option<f64>,
    pub payment_status: Option<String>,
    pub source: Option<String>,
}

/// Most recent orders by close time.
pub async fn recent_orders(pool: &SqlitePool, limit: i64) -> Result<Vec<OrderSummary>> {
    let rows = sqlx::query(
        r#"
        select id, external_id, order_number, closed_at, total_amount,
               payment_status, source
        from orders
        order by closed_at desc
        limit ?1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("recent_orders failed")?;

    rows.iter()
        .map(|row| {
            Ok(OrderSummary {
                id: row.try_get("id")?,
                external_id: row.try_get("external_id")?,
                order_number: row.try_get("order_number")?,
                closed_at: row.try_get("closed_at")?,
                total_amount: row.try_get("total_amount")?,
                payment_status: row.try_get("payment_status")?,
                source: row.try_get("source")?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderItemRow {
    pub id: i64,
    pub menu_item_guid: Option<String>,
    pub menu_item_name: Option<String>,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderDeductionRow {
    pub id: i64,
    pub order_item_id: i64,
    pub ingredient_id: String,
    pub ingredient_name: Option<String>,
    pub unit: Option<String>,
    pub quantity_deducted: f64,
    pub recorded_at: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderDetailRow {
    pub summary: OrderSummary,
    pub opened_at: Option<String>,
    pub modified_at: Option<String>,
    pub tax_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub items: Vec<OrderItemRow>,
    pub deductions: Vec<OrderDeductionRow>,
}

/// One stored order with its items and deduction rows (ingredient names
/// joined in), or `None` if unknown.
pub async fn get_order(pool: &SqlitePool, id: i64) -> Result<Option<OrderDetailRow>> {
    let Some(row) = sqlx::query("select * from orders where id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("get_order failed")?
    else {
        return Ok(None);
    };

    let summary = OrderSummary {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        order_number: row.try_get("order_number")?,
        closed_at: row.try_get("closed_at")?,
        total_amount: row.try_get("total_amount")?,
        payment_status: row.try_get("payment_status")?,
        source: row.try_get("source")?,
    };
    let opened_at: Option<String> = row.try_get("opened_at")?;
    let modified_at: Option<String> = row.try_get("modified_at")?;
    let tax_amount: Option<f64> = row.try_get("tax_amount")?;
    let tip_amount: Option<f64> = row.try_get("tip_amount")?;

    let item_rows = sqlx::query("select * from order_items where order_id = ?1")
        .bind(id)
        .fetch_all(pool)
        .await
        .context("get_order items failed")?;
    let items = item_rows
        .iter()
        .map(|r| {
            Ok(OrderItemRow {
                id: r.try_get("id")?,
                menu_item_guid: r.try_get("menu_item_guid")?,
                menu_item_name: r.try_get("menu_item_name")?,
                quantity: r.try_get("quantity")?,
                unit_price: r.try_get("unit_price")?,
                total_price: r.try_get("total_price")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let deduction_rows = sqlx::query(
        r#"
        select od.id, od.order_item_id, od.ingredient_id, od.quantity_deducted,
               od.recorded_at, i.name as ingredient_name, i.unit
        from order_deductions od
        join ingredients i on od.ingredient_id = i.id
        where od.order_id = ?1
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .context("get_order deductions failed")?;
    let deductions = deduction_rows
        .iter()
        .map(|r| {
            Ok(OrderDeductionRow {
                id: r.try_get("id")?,
                order_item_id: r.try_get("order_item_id")?,
                ingredient_id: r.try_get("ingredient_id")?,
                ingredient_name: r.try_get("ingredient_name")?,
                unit: r.try_get("unit")?,
                quantity_deducted: r.try_get("quantity_deducted")?,
                recorded_at: r.try_get("recorded_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(OrderDetailRow {
        summary,
        opened_at,
        modified_at,
        tax_amount,
        tip_amount,
        items,
        deductions,
    }))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderStats {
    pub total_count: i64,
    pub revenue: f64,
    pub today_count: i64,
}

/// Aggregate order counts and revenue; soft-deleted orders are excluded.
pub async fn order_stats(pool: &SqlitePool) -> Result<OrderStats> {
    let (total_count, revenue): (i64, Option<f64>) = sqlx::query_as(
        "select count(*), sum(total_amount) from orders where deleted = 0",
    )
    .fetch_one(pool)
    .await
    .context("order_stats totals failed")?;

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let (today_count,): (i64,) = sqlx::query_as(
        "select count(*) from orders where date(closed_at) = ?1 and deleted = 0",
    )
    .bind(&today)
    .fetch_one(pool)
    .await
    .context("order_stats today failed")?;

    Ok(OrderStats {
        total_count,
        revenue: revenue.unwrap_or(0.0),
        today_count,
    })
}

/// Total deduction quantity per ingredient for one sync batch, summed from
/// the audit rows. Tests use this to prove the batch totals reconcile with
/// the accumulator.
pub async fn deduction_totals(pool: &SqlitePool) -> Result<Vec<(String, f64)>> {
    let rows = sqlx::query(
        r#"
        select ingredient_id, sum(quantity_deducted) as total
        from order_deductions
        group by ingredient_id
        order by ingredient_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("deduction_totals failed")?;

    rows.iter()
        .map(|row| Ok((row.try_get("ingredient_id")?, row.try_get("total")?)))
        .collect()
}
