//! Upstream point-of-sale API boundary.
//!
//! This crate owns the wire types, the [`PosApi`] trait, and the concrete
//! reqwest-backed client. It does **not** touch the database or decide sync
//! policy; callers (the sync engine, the menu-sync collaborator) fetch data
//! here and decide what to do with it.
//!
//! Implementations must be object-safe so callers can hold a
//! `Box<dyn PosApi>` / `Arc<dyn PosApi>` and tests can substitute a mock.

pub mod client;
pub mod types;

pub use client::HttpPosClient;
pub use types::{MenuDocument, OrderDetail, OrderRef, Selection, TokenGrant};

use chrono::{DateTime, Utc};
use std::fmt;

// ---------------------------------------------------------------------------
// Wire timestamp format
// ---------------------------------------------------------------------------

/// The upstream API speaks ISO-8601 with an explicit `+0000` offset and
/// millisecond precision, e.g. `2026-08-01T14:30:00.000+0000`.
pub const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Render a UTC instant in the upstream wire format.
pub fn format_wire_timestamp(at: DateTime<Utc>) -> String {
    at.format(WIRE_TIME_FORMAT).to_string()
}

/// Parse an upstream wire timestamp.
///
/// A trailing `Z` is normalized to `+0000` first; the upstream is
/// inconsistent about which form it emits.
pub fn parse_wire_timestamp(raw: &str) -> Result<DateTime<Utc>, PosError> {
    let normalized = if let Some(stripped) = raw.strip_suffix('Z') {
        format!("{stripped}+0000")
    } else {
        raw.to_string()
    };
    DateTime::parse_from_str(&normalized, WIRE_TIME_FORMAT)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PosError::Decode(format!("bad wire timestamp '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-call authentication context: bearer token plus the tenant id sent in
/// the restaurant header. Threaded explicitly through every request — there
/// is no ambient credential state.
#[derive(Clone)]
pub struct PosSession {
    pub access_token: String,
    pub tenant_id: String,
}

impl PosSession {
    pub fn new(access_token: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

impl fmt::Debug for PosSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The token is a credential; never print it.
        f.debug_struct("PosSession")
            .field("access_token", &"<REDACTED>")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// A half-open `[start, end)` slice of time to list orders over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`PosApi`] implementation may return.
#[derive(Debug)]
pub enum PosError {
    /// Network or transport failure.
    Transport(String),
    /// The upstream API answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// A required configuration value is missing or invalid.
    Config(String),
}

impl fmt::Display for PosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PosError::Transport(msg) => write!(f, "transport error: {msg}"),
            PosError::Api { status, message } => {
                write!(f, "pos api error status={status}: {message}")
            }
            PosError::Decode(msg) => write!(f, "decode error: {msg}"),
            PosError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for PosError {}

// ---------------------------------------------------------------------------
// PosApi trait
// ---------------------------------------------------------------------------

/// Upstream POS API contract.
///
/// One method per upstream endpoint; no windowing or retry policy here —
/// that belongs to the sync engine.
#[async_trait::async_trait]
pub trait PosApi: Send + Sync {
    /// Human-readable name identifying this backend.
    fn name(&self) -> &'static str;

    /// Exchange client credentials for a bearer token.
    async fn login(&self, client_id: &str, client_secret: &str)
        -> Result<TokenGrant, PosError>;

    /// List order references closed inside one time window.
    ///
    /// Returns references only; full bodies come from
    /// [`order_detail`][Self::order_detail].
    async fn list_orders(
        &self,
        session: &PosSession,
        window: TimeWindow,
    ) -> Result<Vec<OrderRef>, PosError>;

    /// Fetch one order's full body by external id.
    async fn order_detail(
        &self,
        session: &PosSession,
        external_id: &str,
    ) -> Result<OrderDetail, PosError>;

    /// Fetch the full menu catalog.
    async fn menu_catalog(&self, session: &PosSession) -> Result<MenuDocument, PosError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
