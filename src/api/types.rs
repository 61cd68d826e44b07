//! Request and response bodies for the API.

use serde::{Deserialize, Serialize};

use crate::network::EquipmentId;

/// Optional range query parameters for the notifications endpoint.
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// First sequence number (inclusive).
    pub from: Option<u64>,
    /// Last sequence number (inclusive).
    pub to: Option<u64>,
}

/// Body of `POST /breakers/{id}`.
#[derive(Debug, Deserialize)]
pub struct BreakerRequest {
    /// Target position: `true` closes, `false` opens.
    pub closed: bool,
}

/// Acknowledgement that a breaker command was queued.
#[derive(Debug, Serialize)]
pub struct BreakerAccepted {
    pub equipment_id: EquipmentId,
    pub closed: bool,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
