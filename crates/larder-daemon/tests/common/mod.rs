//! In-process router fixtures for the daemon scenario tests.
//!
//! The router is driven via `tower::ServiceExt::oneshot` — no TCP socket,
//! no network. The POS backend is an in-process mock.

#![allow(dead_code)]

use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use larder_config::{CredentialStore, Credentials};
use larder_daemon::{routes, state::AppState};
use larder_pos::types::{MenuDocument, OrderDetail, OrderRef, TokenGrant};
use larder_pos::{PosApi, PosError, PosSession, TimeWindow};
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Mock POS backend
// ---------------------------------------------------------------------------

pub struct MockPos {
    refs: Vec<OrderRef>,
    details: HashMap<String, serde_json::Value>,
    menu: serde_json::Value,
    refs_served: AtomicBool,
}

impl MockPos {
    pub fn new() -> Self {
        Self {
            refs: Vec::new(),
            details: HashMap::new(),
            menu: json!({"menus": []}),
            refs_served: AtomicBool::new(false),
        }
    }

    pub fn with_orders(mut self, orders: Vec<serde_json::Value>) -> Self {
        for order in orders {
            let guid = order["guid"].as_str().expect("fixture needs guid").to_string();
            self.refs.push(OrderRef { guid: guid.clone() });
            self.details.insert(guid, order);
        }
        self
    }

    pub fn with_menu(mut self, menu: serde_json::Value) -> Self {
        self.menu = menu;
        self
    }
}

#[async_trait::async_trait]
impl PosApi for MockPos {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn login(&self, _: &str, _: &str) -> Result<TokenGrant, PosError> {
        Ok(TokenGrant {
            access_token: "mock-token".to_string(),
            expires_in: Some(86400),
        })
    }

    async fn list_orders(
        &self,
        _session: &PosSession,
        _window: TimeWindow,
    ) -> Result<Vec<OrderRef>, PosError> {
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
        let raw = self.details.get(external_id).ok_or_else(|| PosError::Api {
            status: 404,
            message: format!("unknown order {external_id}"),
        })?;
        let mut detail: OrderDetail =
            serde_json::from_value(raw.clone()).map_err(|e| PosError::Decode(e.to_string()))?;
        detail.raw = raw.clone();
        Ok(detail)
    }

    async fn menu_catalog(&self, _session: &PosSession) -> Result<MenuDocument, PosError> {
        serde_json::from_value(self.menu.clone()).map_err(|e| PosError::Decode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// State / router fixtures
// ---------------------------------------------------------------------------

/// Fresh app state over an in-memory store and the given mock backend.
/// Returns the temp dir holding the credential file; keep it alive.
pub async fn make_state(pos: MockPos) -> (Arc<AppState>, SqlitePool, TempDir) {
    let pool = larder_db::connect_memory().await.unwrap();
    larder_db::migrate(&pool).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(dir.path().join("pos_credentials.txt"));
    store
        .save(&Credentials {
            client_id: "cid".to_string(),
            client_secret: "sec".to_string(),
            restaurant_id: "rest-1".to_string(),
            management_group_id: None,
            access_token: Some("tok".to_string()),
        })
        .unwrap();

    let state = Arc::new(AppState::new(pool.clone(), Arc::new(pos), store));
    (state, pool, dir)
}

pub fn router(state: &Arc<AppState>) -> axum::Router {
    routes::build_router(Arc::clone(state))
}

/// Drive the router with a single request and return (status, json body).
pub async fn call(
    router: axum::Router,
    req: Request<axum::body::Body>,
) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("body is not valid JSON")
    };
    (status, json)
}

pub fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn put_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn delete(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

/// Seed the watermark close to now so the sync window stays small.
pub async fn seed_watermark(pool: &SqlitePool) {
    let at = chrono::Utc::now() - chrono::Duration::minutes(30);
    let mut conn = pool.acquire().await.unwrap();
    larder_db::orders::set_watermark(&mut conn, at).await.unwrap();
}
