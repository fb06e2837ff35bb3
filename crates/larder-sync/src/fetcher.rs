//! Windowed order fetching.

use chrono::{DateTime, Duration, Utc};
use larder_pos::types::OrderRef;
use larder_pos::{PosApi, PosError, PosSession, TimeWindow};
use tracing::debug;

/// Sub-window width for upstream order listing.
pub const SUB_WINDOW_SECS: i64 = 3600;

/// Split `[start, end)` into consecutive half-open sub-windows of at most one
/// hour; the final window is clamped to `end`. An empty or inverted range
/// yields no windows.
pub fn split_windows(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimeWindow> {
    let mut windows = Vec::new();
    let step = Duration::seconds(SUB_WINDOW_SECS);
    let mut cursor = start;
    while cursor < end {
        let mut window_end = cursor + step;
        if window_end > end {
            window_end = end;
        }
        windows.push(TimeWindow {
            start: cursor,
            end: window_end,
        });
        cursor = window_end;
    }
    windows
}

/// Fetches order references across a time range in bounded sub-windows.
///
/// # Contract
/// Windows are requested sequentially and the results concatenated. If any
/// sub-window request fails the whole fetch fails — the caller cannot tell
/// "no orders in range" apart from "window N failed" any other way, so:
/// `Ok(vec![])` means confirmed empty, `Err` means nothing about the range
/// is known.
pub struct OrderFetcher<'a> {
    api: &'a dyn PosApi,
}

impl<'a> OrderFetcher<'a> {
    pub fn new(api: &'a dyn PosApi) -> Self {
        Self { api }
    }

    pub async fn fetch_all(
        &self,
        session: &PosSession,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderRef>, PosError> {
        let windows = split_windows(start, end);
        let mut all = Vec::new();
        for window in windows {
            debug!(start = %window.start, end = %window.end, "fetching sub-window");
            let mut refs = self.api.list_orders(session, window).await?;
            all.append(&mut refs);
        }
        Ok(all)
    }
}
