//! Sync orchestrator: the state machine that drives fetch → resolve →
//! accumulate and either reports a preview or commits the batch.

use chrono::{DateTime, NaiveTime, Utc};
use larder_config::{CredentialStore, Credentials};
use larder_db::orders::{NewDeduction, NewOrder, NewOrderItem};
use larder_db::{inventory, is_unique_violation, orders as order_store};
use larder_pos::types::OrderDetail;
use larder_pos::{PosApi, PosSession};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::accumulator::DeductionAccumulator;
use crate::error::{SyncError, SyncPhase};
use crate::fetcher::OrderFetcher;
use crate::resolver::RecipeBook;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct PreviewItem {
    pub name: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PreviewOrder {
    pub external_id: String,
    pub order_number: Option<String>,
    pub closed_at: Option<String>,
    pub total_amount: Option<f64>,
    pub items: Vec<PreviewItem>,
}

/// One line of the preview's deduction report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DeductionLine {
    pub ingredient_id: String,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
}

/// What a dry run would deduct, with nothing persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncPreview {
    pub orders: Vec<PreviewOrder>,
    pub deductions: Vec<DeductionLine>,
    pub window_end: DateTime<Utc>,
}

/// Outcome of a committed sync.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CommitSummary {
    pub orders_stored: usize,
    pub deductions_logged: usize,
    pub window_end: DateTime<Utc>,
}

impl CommitSummary {
    pub fn message(&self) -> String {
        if self.orders_stored == 0 {
            "No new orders found".to_string()
        } else {
            format!(
                "Synced {} new order(s); {} inventory deduction(s) logged",
                self.orders_stored, self.deductions_logged
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Batch plan (shared by preview and commit)
// ---------------------------------------------------------------------------

struct PendingItem {
    item_guid: Option<String>,
    name: String,
    quantity: f64,
    unit_price: f64,
    total_price: f64,
    modifiers: serde_json::Value,
}

/// One new order with its detail payload cached, so commit never re-fetches
/// what this invocation already pulled.
struct PendingOrder {
    detail: OrderDetail,
    items: Vec<PendingItem>,
}

struct BatchPlan {
    window_end: DateTime<Utc>,
    /// References the upstream returned, including already-stored ones.
    fetched: usize,
    pending: Vec<PendingOrder>,
    book: RecipeBook,
    deductions: DeductionAccumulator,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives one sync attempt at a time against a single POS backend and store.
///
/// All state is passed explicitly: pool, API handle, credential store. No
/// ambient globals, no background tasks — callers trigger [`preview`] /
/// [`commit`] and overlapping triggers are serialized by the external-id
/// uniqueness constraint, not by this type.
pub struct SyncEngine {
    pool: SqlitePool,
    api: Arc<dyn PosApi>,
    credentials: CredentialStore,
}

impl SyncEngine {
    pub fn new(pool: SqlitePool, api: Arc<dyn PosApi>, credentials: CredentialStore) -> Self {
        Self {
            pool,
            api,
            credentials,
        }
    }

    /// Dry run: compute what a commit over the current window would do.
    ///
    /// Touches no stock, no audit tables, and never the watermark.
    pub async fn preview(&self) -> Result<SyncPreview, SyncError> {
        let plan = self.plan().await?;
        let deductions = self.deduction_lines(&plan).await?;

        info!(
            phase = SyncPhase::PreviewReady.as_str(),
            orders = plan.pending.len(),
            ingredients = deductions.len(),
            "sync preview ready"
        );

        Ok(SyncPreview {
            orders: plan.pending.iter().map(preview_order).collect(),
            deductions,
            window_end: plan.window_end,
        })
    }

    /// Commit the current window: persist orders, items, and deduction rows,
    /// decrement stock, and advance the watermark — all inside one
    /// transaction per batch.
    pub async fn commit(&self) -> Result<CommitSummary, SyncError> {
        let plan = self.plan().await?;

        if plan.fetched == 0 {
            // Confirmed-empty range: nothing to stage, but the range is done,
            // so the watermark still advances.
            let mut conn = self
                .pool
                .acquire()
                .await
                .map_err(|e| SyncError::Persistence(e.to_string()))?;
            order_store::set_watermark(&mut conn, plan.window_end)
                .await
                .map_err(|e| SyncError::Persistence(e.to_string()))?;
            info!(watermark = %plan.window_end, "no orders in range; watermark advanced");
            return Ok(CommitSummary {
                orders_stored: 0,
                deductions_logged: 0,
                window_end: plan.window_end,
            });
        }

        if plan.pending.is_empty() {
            // Every fetched reference is already stored. Nothing commits, so
            // the watermark stays put; the idempotency gate makes the
            // inevitable re-fetch of this range harmless.
            info!("all fetched orders already stored; nothing to commit");
            return Ok(CommitSummary {
                orders_stored: 0,
                deductions_logged: 0,
                window_end: plan.window_end,
            });
        }

        info!(
            phase = SyncPhase::Committing.as_str(),
            orders = plan.pending.len(),
            "committing sync batch"
        );
        self.commit_batch(plan).await
    }

    /// Load credentials and return a usable session, refreshing and
    /// persisting the token when none is on file.
    ///
    /// Also used by collaborators (menu sync) that talk to the same upstream
    /// with the same credential lifecycle.
    pub async fn establish_session(&self) -> Result<PosSession, SyncError> {
        let (_, session) = self.load_session().await?;
        Ok(session)
    }

    async fn load_session(&self) -> Result<(Credentials, PosSession), SyncError> {
        let mut creds = self
            .credentials
            .load()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let tenant = creds
            .tenant_id()
            .ok_or_else(|| SyncError::Config("missing restaurant id in credentials".to_string()))?
            .to_string();

        // Proactive refresh: a credential set without a token is usable, it
        // just needs one login first.
        if creds.access_token.is_none() {
            self.refresh_token(&mut creds).await?;
        }
        let token = creds
            .access_token
            .clone()
            .ok_or_else(|| SyncError::Auth("token refresh produced no token".to_string()))?;
        Ok((creds, PosSession::new(token, tenant)))
    }

    // -- shared pipeline ----------------------------------------------------

    /// Fetch and resolve the current window into a staged batch.
    async fn plan(&self) -> Result<BatchPlan, SyncError> {
        info!(phase = SyncPhase::Idle.as_str(), "sync starting");

        let (mut creds, mut session) = self.load_session().await?;

        let window_start = order_store::get_watermark(&self.pool)
            .await
            .map_err(|e| SyncError::Persistence(e.to_string()))?
            .unwrap_or_else(start_of_today);
        let window_end = Utc::now();

        info!(
            phase = SyncPhase::Fetching.as_str(),
            start = %window_start,
            end = %window_end,
            "fetching order references"
        );

        let fetcher = OrderFetcher::new(self.api.as_ref());

        let refs = match fetcher.fetch_all(&session, window_start, window_end).await {
            Ok(refs) => refs,
            Err(first_err) => {
                // Exactly one reactive refresh, then one retry. A second
                // consecutive failure is terminal for this attempt.
                warn!(error = %first_err, "order fetch failed; refreshing token and retrying once");
                self.refresh_token(&mut creds).await?;
                let token = creds
                    .access_token
                    .clone()
                    .ok_or_else(|| SyncError::Auth("token refresh produced no token".to_string()))?;
                session = PosSession::new(token, session.tenant_id.clone());

                match fetcher.fetch_all(&session, window_start, window_end).await {
                    Ok(refs) => refs,
                    Err(second_err) => {
                        info!(phase = SyncPhase::Failed.as_str(), "sync attempt failed");
                        return Err(SyncError::Fetch(format!(
                            "order fetch failed after token refresh: {second_err}"
                        )));
                    }
                }
            }
        };

        info!(
            phase = SyncPhase::Resolving.as_str(),
            fetched = refs.len(),
            "resolving new orders"
        );

        let book = RecipeBook::from_lines(
            inventory::all_recipe_lines(&self.pool)
                .await
                .map_err(|e| SyncError::Persistence(e.to_string()))?,
        );

        let mut pending = Vec::new();
        let mut deductions = DeductionAccumulator::new();

        for order_ref in &refs {
            // Idempotency gate: the external id is the sole dedup key.
            if order_store::order_exists(&self.pool, &order_ref.guid)
                .await
                .map_err(|e| SyncError::Persistence(e.to_string()))?
            {
                debug!(order = %order_ref.guid, "already stored; skipping");
                continue;
            }

            let detail = match self.api.order_detail(&session, &order_ref.guid).await {
                Ok(detail) => detail,
                Err(e) => {
                    // One bad order must not abort the batch.
                    warn!(order = %order_ref.guid, error = %e, "detail fetch failed; skipping this order");
                    continue;
                }
            };

            let mut items = Vec::new();
            for selection in detail.all_selections() {
                let Some(item_guid) = selection.item_guid() else {
                    warn!(
                        order = %order_ref.guid,
                        "selection without item id; contributes zero deductions"
                    );
                    items.push(PendingItem {
                        item_guid: None,
                        name: selection.item_name().unwrap_or("Unknown").to_string(),
                        quantity: selection.quantity,
                        unit_price: selection.unit_price.unwrap_or(0.0),
                        total_price: selection.total_price.unwrap_or(0.0),
                        modifiers: selection.modifiers.clone(),
                    });
                    continue;
                };

                let name = match inventory::menu_item_name(&self.pool, item_guid)
                    .await
                    .map_err(|e| SyncError::Persistence(e.to_string()))?
                {
                    Some(catalog_name) => catalog_name,
                    None => selection.item_name().unwrap_or("Unknown").to_string(),
                };

                deductions.record_sale(&book, item_guid, selection.quantity);
                items.push(PendingItem {
                    item_guid: Some(item_guid.to_string()),
                    name,
                    quantity: selection.quantity,
                    unit_price: selection.unit_price.unwrap_or(0.0),
                    total_price: selection.total_price.unwrap_or(0.0),
                    modifiers: selection.modifiers.clone(),
                });
            }

            pending.push(PendingOrder { detail, items });
        }

        Ok(BatchPlan {
            window_end,
            fetched: refs.len(),
            pending,
            book,
            deductions,
        })
    }

    /// Refresh the bearer token and persist it immediately so concurrent and
    /// subsequent processes see it.
    async fn refresh_token(&self, creds: &mut Credentials) -> Result<(), SyncError> {
        if !creds.can_refresh() {
            return Err(SyncError::Config(
                "cannot refresh token: missing client id or secret".to_string(),
            ));
        }

        info!("refreshing upstream access token");
        let grant = self
            .api
            .login(&creds.client_id, &creds.client_secret)
            .await
            .map_err(|e| SyncError::Auth(format!("token refresh failed: {e}")))?;

        creds.access_token = Some(grant.access_token);
        self.credentials
            .save(creds)
            .map_err(|e| SyncError::Auth(format!("failed to persist refreshed token: {e}")))?;
        Ok(())
    }

    /// Resolve accumulator totals into named lines for the preview report.
    async fn deduction_lines(&self, plan: &BatchPlan) -> Result<Vec<DeductionLine>, SyncError> {
        let mut lines = Vec::new();
        for (ingredient_id, quantity) in plan.deductions.totals() {
            let Some(ingredient) = inventory::get_ingredient(&self.pool, ingredient_id)
                .await
                .map_err(|e| SyncError::Persistence(e.to_string()))?
            else {
                continue;
            };
            lines.push(DeductionLine {
                ingredient_id: ingredient_id.clone(),
                name: ingredient.name,
                quantity: round4(*quantity),
                unit: ingredient.unit,
            });
        }
        Ok(lines)
    }

    /// Stage and commit the whole batch in one transaction.
    ///
    /// An error anywhere returns early; dropping the open transaction rolls
    /// back every order, item, deduction, stock change, and the watermark
    /// advance together.
    async fn commit_batch(&self, plan: BatchPlan) -> Result<CommitSummary, SyncError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SyncError::Persistence(e.to_string()))?;

        let mut orders_stored = 0usize;
        let mut deductions_logged = 0usize;

        for order in &plan.pending {
            let order_id = match order_store::insert_order(&mut tx, &new_order_row(&order.detail))
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    let msg = match err.downcast_ref::<sqlx::Error>() {
                        Some(sql_err) if is_unique_violation(sql_err) => format!(
                            "order {} was committed by another sync; batch rolled back",
                            order.detail.guid
                        ),
                        _ => format!("order insert failed: {err}"),
                    };
                    return Err(SyncError::Persistence(msg));
                }
            };
            orders_stored += 1;

            for item in &order.items {
                let item_id = order_store::insert_order_item(
                    &mut tx,
                    order_id,
                    &NewOrderItem {
                        menu_item_guid: item.item_guid.clone(),
                        menu_item_name: Some(item.name.clone()),
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                        total_price: item.total_price,
                        modifiers: item.modifiers.clone(),
                    },
                )
                .await
                .map_err(|e| SyncError::Persistence(e.to_string()))?;

                let Some(item_guid) = &item.item_guid else {
                    continue;
                };
                for line in plan.book.resolve(item_guid) {
                    let quantity = line.quantity_per_unit * item.quantity;
                    order_store::deduct_stock(&mut tx, &line.ingredient_id, quantity)
                        .await
                        .map_err(|e| SyncError::Persistence(e.to_string()))?;
                    order_store::insert_deduction(
                        &mut tx,
                        &NewDeduction {
                            order_id,
                            order_item_id: item_id,
                            ingredient_id: line.ingredient_id.clone(),
                            quantity_deducted: quantity,
                        },
                    )
                    .await
                    .map_err(|e| SyncError::Persistence(e.to_string()))?;
                    deductions_logged += 1;
                }
            }
        }

        order_store::set_watermark(&mut tx, plan.window_end)
            .await
            .map_err(|e| SyncError::Persistence(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| SyncError::Persistence(format!("batch commit failed: {e}")))?;

        info!(
            orders = orders_stored,
            deductions = deductions_logged,
            watermark = %plan.window_end,
            "sync committed"
        );

        Ok(CommitSummary {
            orders_stored,
            deductions_logged,
            window_end: plan.window_end,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn start_of_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn preview_order(order: &PendingOrder) -> PreviewOrder {
    PreviewOrder {
        external_id: order.detail.guid.clone(),
        order_number: order.detail.order_number.clone(),
        closed_at: order.detail.closed_date.clone(),
        total_amount: order.detail.total_amount,
        items: order
            .items
            .iter()
            .map(|i| PreviewItem {
                name: i.name.clone(),
                quantity: i.quantity,
            })
            .collect(),
    }
}

fn new_order_row(detail: &OrderDetail) -> NewOrder {
    NewOrder {
        external_id: detail.guid.clone(),
        order_number: detail.order_number.clone(),
        opened_at: detail.opened_date.clone(),
        closed_at: detail.closed_date.clone(),
        modified_at: detail.modified_date.clone(),
        deleted: detail.deleted,
        total_amount: detail.total_amount,
        tax_amount: detail.tax_amount,
        tip_amount: detail.tip_amount,
        payment_status: detail.payment_status.clone(),
        source: detail.source.clone(),
        raw_json: detail.raw.clone(),
    }
}
