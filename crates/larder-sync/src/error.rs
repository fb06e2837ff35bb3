//! Sync error taxonomy and state-machine phases.

use std::fmt;

/// Phases of one sync attempt, logged on every transition.
///
/// `Idle → Fetching → Resolving → (PreviewReady | Committing) → Idle`,
/// with `Failed` reachable from `Fetching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Resolving,
    PreviewReady,
    Committing,
    Failed,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "IDLE",
            SyncPhase::Fetching => "FETCHING",
            SyncPhase::Resolving => "RESOLVING",
            SyncPhase::PreviewReady => "PREVIEW_READY",
            SyncPhase::Committing => "COMMITTING",
            SyncPhase::Failed => "FAILED",
        }
    }
}

/// Fatal outcomes for one sync attempt.
///
/// Every variant is returned as a value to the caller — nothing panics past
/// the sync boundary, and none of these advance the watermark. Per-order
/// detail failures and unresolvable selections are *not* errors; they are
/// skipped with a warning and the batch continues.
#[derive(Debug)]
pub enum SyncError {
    /// Missing tenant id or client credentials. No retry.
    Config(String),
    /// The token refresh call itself failed.
    Auth(String),
    /// A time-window request failed even after the single refresh-and-retry.
    Fetch(String),
    /// The commit transaction failed; the whole batch was rolled back.
    Persistence(String),
}

impl SyncError {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::Auth(_) => "auth",
            SyncError::Fetch(_) => "fetch",
            SyncError::Persistence(_) => "persistence",
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Config(msg) => write!(f, "sync config error: {msg}"),
            SyncError::Auth(msg) => write!(f, "sync auth error: {msg}"),
            SyncError::Fetch(msg) => write!(f, "sync fetch error: {msg}"),
            SyncError::Persistence(msg) => write!(f, "sync persistence error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_render_like_the_state_machine() {
        assert_eq!(SyncPhase::PreviewReady.as_str(), "PREVIEW_READY");
        assert_eq!(SyncPhase::Failed.as_str(), "FAILED");
    }

    #[test]
    fn error_display_carries_kind_and_message() {
        let err = SyncError::Fetch("window [a,b) failed".to_string());
        assert_eq!(err.kind(), "fetch");
        assert_eq!(err.to_string(), "sync fetch error: window [a,b) failed");
    }
}
