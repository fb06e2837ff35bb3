//! larder-sync
//!
//! Order-sync reconciliation engine.
//!
//! Architectural decisions:
//! - Watermark-bounded windowed polling; the watermark advances only after a
//!   successful commit
//! - The external order id is the sole idempotency key; the database UNIQUE
//!   constraint is the serialization point under overlapping syncs
//! - One transaction per sync batch: orders, items, stock decrements,
//!   deduction audit rows, and the watermark advance commit or roll back
//!   together
//! - Exactly one token refresh per attempt: proactive when no token exists,
//!   reactive once after a failed fetch
//! - Preview computes the same deductions as commit and mutates nothing

mod accumulator;
mod error;
mod fetcher;
mod orchestrator;
mod resolver;

pub use accumulator::DeductionAccumulator;
pub use error::{SyncError, SyncPhase};
pub use fetcher::{split_windows, OrderFetcher, SUB_WINDOW_SECS};
pub use orchestrator::{
    CommitSummary, DeductionLine, PreviewItem, PreviewOrder, SyncEngine, SyncPreview,
};
pub use resolver::{RecipeBook, RecipeLine};
