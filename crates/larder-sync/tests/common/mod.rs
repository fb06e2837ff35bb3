//! Shared fixtures for the sync scenario tests: an in-memory store seeded
//! with the burger fixtures and a scriptable in-process POS backend.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use larder_config::{CredentialStore, Credentials};
use larder_db::inventory::{self, IngredientPatch, MenuItem, NewIngredient, RecipeComponent};
use larder_db::{connect_memory, migrate};
use larder_pos::types::{MenuDocument, OrderDetail, OrderRef, TokenGrant};
use larder_pos::{PosApi, PosError, PosSession, TimeWindow};
use larder_sync::SyncEngine;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Scriptable POS backend
// ---------------------------------------------------------------------------

/// In-process [`PosApi`] with failure injection.
///
/// Order references are served on the first successful listing call and
/// empty afterwards, so windowed fetching never duplicates them.
pub struct MockPos {
    refs: Vec<OrderRef>,
    details: HashMap<String, serde_json::Value>,
    failing_details: HashSet<String>,
    failing_listings: AtomicUsize,
    fail_login: bool,
    refs_served: AtomicBool,
    pub login_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
    pub detail_calls: AtomicUsize,
}

impl MockPos {
    pub fn new() -> Self {
        Self {
            refs: Vec::new(),
            details: HashMap::new(),
            failing_details: HashSet::new(),
            failing_listings: AtomicUsize::new(0),
            fail_login: false,
            refs_served: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    /// Serve these order bodies; each must carry a `guid` field.
    pub fn with_orders(mut self, orders: Vec<serde_json::Value>) -> Self {
        for order in orders {
            let guid = order["guid"].as_str().expect("order fixture needs a guid").to_string();
            self.refs.push(OrderRef { guid: guid.clone() });
            self.details.insert(guid, order);
        }
        self
    }

    /// Repeat an already-configured reference in the same listing, as a
    /// misbehaving upstream would.
    pub fn with_duplicate_ref(mut self, guid: &str) -> Self {
        self.refs.push(OrderRef {
            guid: guid.to_string(),
        });
        self
    }

    pub fn with_failing_detail(mut self, guid: &str) -> Self {
        self.failing_details.insert(guid.to_string());
        self
    }

    /// Fail the first `n` listing calls with a 500.
    pub fn with_failing_listings(self, n: usize) -> Self {
        self.failing_listings.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }
}

#[async_trait::async_trait]
impl PosApi for MockPos {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn login(&self, _client_id: &str, _client_secret: &str) -> Result<TokenGrant, PosError> {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_login {
            return Err(PosError::Api {
                status: 401,
                message: "invalid client credentials".to_string(),
            });
        }
        Ok(TokenGrant {
            access_token: format!("mock-token-{n}"),
            expires_in: Some(86400),
        })
    }

    async fn list_orders(
        &self,
        _session: &PosSession,
        _window: TimeWindow,
    ) -> Result<Vec<OrderRef>, PosError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failing_listings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_listings.store(remaining - 1, Ordering::SeqCst);
            return Err(PosError::Api {
                status: 500,
                message: "upstream listing unavailable".to_string(),
            });
        }

        if self.refs_served.swap(true, Ordering::SeqCst) {
            Ok(Vec::new())
        } else {
            Ok(self.refs.clone())
        }
    }

    async fn order_detail(
        &self,
        _session: &PosSession,
        external_id: &str,
    ) -> Result<OrderDetail, PosError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_details.contains(external_id) {
            return Err(PosError::Transport("connection reset".to_string()));
        }
        let raw = self.details.get(external_id).ok_or_else(|| PosError::Api {
            status: 404,
            message: format!("unknown order {external_id}"),
        })?;
        let mut detail: OrderDetail = serde_json::from_value(raw.clone())
            .map_err(|e| PosError::Decode(e.to_string()))?;
        detail.raw = raw.clone();
        Ok(detail)
    }

    async fn menu_catalog(&self, _session: &PosSession) -> Result<MenuDocument, PosError> {
        Ok(MenuDocument::default())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const BURGER_GUID: &str = "item-burger";

/// In-memory store with bun + patty (10 in stock each), the burger recipe
/// (1 bun, 1 patty per unit), and a catalog row naming the burger.
pub async fn pool_with_burger_fixtures() -> SqlitePool {
    let pool = connect_memory().await.unwrap();
    migrate(&pool).await.unwrap();

    for name in ["Bun", "Patty"] {
        inventory::create_ingredient(
            &pool,
            &NewIngredient {
                name: name.to_string(),
                category: Some("Food".to_string()),
                unit: Some("pcs".to_string()),
                cost_per_unit: 0.5,
                threshold: 4.0,
            },
        )
        .await
        .unwrap();
        inventory::update_ingredient(
            &pool,
            &name.to_lowercase(),
            &IngredientPatch {
                current_stock: Some(10.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    inventory::replace_recipe(
        &pool,
        BURGER_GUID,
        &[
            RecipeComponent {
                ingredient_id: "bun".to_string(),
                quantity: 1.0,
            },
            RecipeComponent {
                ingredient_id: "patty".to_string(),
                quantity: 1.0,
            },
        ],
    )
    .await
    .unwrap();

    let mut conn = pool.acquire().await.unwrap();
    inventory::upsert_menu_item(
        &mut conn,
        &MenuItem {
            item_guid: BURGER_GUID.to_string(),
            item_name: "Burger".to_string(),
            menu: Some("Food".to_string()),
            group_path: Some("Mains".to_string()),
        },
    )
    .await
    .unwrap();

    pool
}

/// Credential file in a temp dir, with or without a pre-existing token.
pub fn credential_store(dir: &tempfile::TempDir, with_token: bool) -> CredentialStore {
    let store = CredentialStore::new(dir.path().join("pos_credentials.txt"));
    store
        .save(&Credentials {
            client_id: "cid".to_string(),
            client_secret: "sec".to_string(),
            restaurant_id: "rest-1".to_string(),
            management_group_id: None,
            access_token: with_token.then(|| "tok-preexisting".to_string()),
        })
        .unwrap();
    store
}

/// Pin the watermark a fixed distance in the past so the fetch range is
/// deterministic regardless of wall-clock time.
pub async fn seed_watermark(pool: &SqlitePool, minutes_ago: i64) {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    let mut conn = pool.acquire().await.unwrap();
    larder_db::orders::set_watermark(&mut conn, at).await.unwrap();
}

pub fn engine(pool: SqlitePool, api: Arc<MockPos>, store: CredentialStore) -> SyncEngine {
    SyncEngine::new(pool, api, store)
}

/// One closed order with the given sold lines.
pub fn order_json(guid: &str, items: &[(&str, &str, f64)]) -> serde_json::Value {
    let selections: Vec<serde_json::Value> = items
        .iter()
        .map(|(item_guid, name, quantity)| {
            json!({
                "item": {"guid": item_guid, "name": name},
                "quantity": quantity,
                "unitPrice": 6.5,
                "totalPrice": 6.5 * quantity,
                "modifiers": []
            })
        })
        .collect();

    json!({
        "guid": guid,
        "orderNumber": "417",
        "openedDate": "2026-08-01T00:40:00.000+0000",
        "closedDate": "2026-08-01T00:45:00.000+0000",
        "modifiedDate": "2026-08-01T00:45:00.000+0000",
        "totalAmount": 21.0,
        "taxAmount": 1.0,
        "tipAmount": 2.0,
        "paymentStatus": "PAID",
        "source": "In Store",
        "checks": [{"selections": selections}]
    })
}
