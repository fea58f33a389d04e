//! JSON messages exchanged over the WebSocket channel.
//!
//! ```text
//! server -> client   {"requestId": 4, "direction": 1, "distance": 317}
//! client -> server   {"requestId": 4, "status": 1}
//! ```

use serde::{Deserialize, Serialize};

use crate::error_handling::types::ProtocolError;
use crate::gesture::Gesture;
use crate::storage::types::RequestStatus;

/// Server to client: perform this gesture and report back under `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    pub request_id: i64,
    pub direction: u8,
    pub distance: i64,
}

impl Instruction {
    pub fn new(request_id: i64, gesture: Gesture) -> Self {
        Self {
            request_id,
            direction: gesture.direction,
            distance: gesture.distance,
        }
    }

    pub fn to_json(&self) -> String {
        // A struct of plain integers always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Client to server: outcome of a previously sent instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Acknowledgment {
    pub request_id: i64,
    pub status: i64,
}

impl Acknowledgment {
    /// Parses a text frame into a request id and a known status.
    pub fn parse(text: &str) -> Result<(i64, RequestStatus), ProtocolError> {
        let ack: Acknowledgment =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let status =
            RequestStatus::from_code(ack.status).ok_or(ProtocolError::UnknownStatus(ack.status))?;
        Ok((ack.request_id, status))
    }
}
