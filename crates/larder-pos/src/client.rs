//! Reqwest-backed [`PosApi`] implementation.

use crate::types::{
    LoginRequest, LoginResponse, MenuDocument, OrderDetail, OrderRef, OrdersResponse, TokenGrant,
};
use crate::{format_wire_timestamp, PosApi, PosError, PosSession, TimeWindow};
use std::time::Duration;
use tracing::debug;

/// Tenant header sent on every order/menu request.
pub const TENANT_HEADER: &str = "Restaurant-External-ID";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 100;

/// HTTP client for the upstream POS API.
///
/// Blocking-style call pattern: one request at a time, a bounded timeout per
/// request, and no retry policy — the sync engine owns retries.
#[derive(Debug, Clone)]
pub struct HttpPosClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPosClient {
    pub fn new(base_url: String) -> Result<Self, PosError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PosError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Read a non-success response's body into an [`PosError::Api`].
async fn api_error(resp: reqwest::Response) -> PosError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = if body.chars().count() > 300 {
        let truncated: String = body.chars().take(300).collect();
        format!("{truncated}…")
    } else {
        body
    };
    PosError::Api { status, message }
}

#[async_trait::async_trait]
impl PosApi for HttpPosClient {
    fn name(&self) -> &'static str {
        "pos-http"
    }

    async fn login(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenGrant, PosError> {
        let url = self.url("/authentication/v1/authentication/login");
        let body = LoginRequest::machine_client(client_id, client_secret);

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PosError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let parsed: LoginResponse = resp
            .json()
            .await
            .map_err(|e| PosError::Decode(format!("login response: {e}")))?;

        let token = parsed.token.ok_or_else(|| PosError::Api {
            status: 200,
            message: "no token envelope in login response".to_string(),
        })?;
        let access_token = token.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            PosError::Api {
                status: 200,
                message: "no access token in login response".to_string(),
            }
        })?;

        Ok(TokenGrant {
            access_token,
            expires_in: token.expires_in,
        })
    }

    async fn list_orders(
        &self,
        session: &PosSession,
        window: TimeWindow,
    ) -> Result<Vec<OrderRef>, PosError> {
        let url = self.url("/orders/v2/orders");
        let start = format_wire_timestamp(window.start);
        let end = format_wire_timestamp(window.end);
        let page_size = PAGE_SIZE.to_string();
        debug!(%start, %end, "listing orders");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&session.access_token)
            .header(TENANT_HEADER, &session.tenant_id)
            .query(&[
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PosError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let parsed: OrdersResponse = resp
            .json()
            .await
            .map_err(|e| PosError::Decode(format!("order listing: {e}")))?;
        Ok(parsed.into_refs())
    }

    async fn order_detail(
        &self,
        session: &PosSession,
        external_id: &str,
    ) -> Result<OrderDetail, PosError> {
        let url = self.url(&format!("/orders/v2/orders/{external_id}"));

        let resp = self
            .http
            .get(url)
            .bearer_auth(&session.access_token)
            .header(TENANT_HEADER, &session.tenant_id)
            .send()
            .await
            .map_err(|e| PosError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        // Keep the raw payload alongside the typed view; the store persists
        // it verbatim.
        let raw: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PosError::Decode(format!("order detail: {e}")))?;
        let mut detail: OrderDetail = serde_json::from_value(raw.clone())
            .map_err(|e| PosError::Decode(format!("order detail shape: {e}")))?;
        detail.raw = raw;
        Ok(detail)
    }

    async fn menu_catalog(&self, session: &PosSession) -> Result<MenuDocument, PosError> {
        let url = self.url("/menus/v2/menus");

        let resp = self
            .http
            .get(url)
            .bearer_auth(&session.access_token)
            .header(TENANT_HEADER, &session.tenant_id)
            .send()
            .await
            .map_err(|e| PosError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        resp.json()
            .await
            .map_err(|e| PosError::Decode(format!("menu catalog: {e}")))
    }
}
