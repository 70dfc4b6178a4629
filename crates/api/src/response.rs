//! Shared response envelope for API handlers.
//!
//! Every success body carries `"success": true` next to its payload;
//! error bodies carry `"success": false` (see `error.rs`). Handlers
//! use [`ApiResponse`] instead of ad-hoc `json!` blocks.

use serde::Serialize;

/// Standard `{ "success": true, ...data }` response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
