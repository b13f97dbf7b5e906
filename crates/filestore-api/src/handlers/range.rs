//! Lenient Range header parsing.
//!
//! Only the exact form `bytes=<start>-<end>` with `start <= end` is
//! honored. Anything else (other units, open-ended, inverted or multi-part
//! ranges, garbage) means "no range applied" and the full object is
//! served; malformed ranges are never an error. Kept for compatibility
//! with existing clients.

use axum::http::HeaderMap;

/// Inclusive byte offsets, or `None` when no usable range was supplied.
pub fn parse_range(headers: &HeaderMap) -> Option<(u64, u64)> {
    let value = headers.get(http::header::RANGE)?.to_str().ok()?;
    let spec = value.strip_prefix("bytes=")?;

    let (start, end) = spec.split_once('-')?;
    let start = start.parse::<u64>().ok()?;
    let end = end.parse::<u64>().ok()?;
    if start > end {
        return None;
    }

    Some((start, end))
}
