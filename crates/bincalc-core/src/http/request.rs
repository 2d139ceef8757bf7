//! Request line parsing
//!
//! Only the request target is consumed; method and version are not checked.

use crate::app_state::AppError;

/// Extract the request target: the second whitespace-delimited token of the
/// first line.
pub fn request_target(raw: &[u8]) -> Result<&str, AppError> {
    let line_end = raw.iter().position(|&b| b == b'\n').unwrap_or(raw.len());
    let line = core::str::from_utf8(&raw[..line_end]).map_err(|_| AppError::MalformedRequest)?;

    line.split_ascii_whitespace()
        .nth(1)
        .ok_or(AppError::MalformedRequest)
}
