use thiserror::Error;

use crate::models::Message;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("limit must be positive, got {0}")]
    InvalidLimit(i64),

    #[error("offset must not be negative, got {0}")]
    InvalidOffset(i64),
}

/// Most recent `limit` messages, ending `offset` messages before the newest.
///
/// Selects `[len - limit - offset, len - offset)` clamped to `[0, len)`.
/// `limit <= 0` and `offset < 0` are rejected rather than clamped.
pub fn window(history: &[Message], limit: i64, offset: i64) -> Result<Vec<Message>, WindowError> {
    if limit <= 0 {
        return Err(WindowError::InvalidLimit(limit));
    }
    if offset < 0 {
        return Err(WindowError::InvalidOffset(offset));
    }

    let len = history.len();
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);

    let end = len.saturating_sub(offset);
    let start = len.saturating_sub(limit.saturating_add(offset));
    Ok(history[start..end].to_vec())
}
