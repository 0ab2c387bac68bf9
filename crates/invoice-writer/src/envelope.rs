//! Push delivery envelope.
//!
//! The bus delivers messages as an HTTP POST whose JSON body wraps the
//! payload in base64:
//!
//! ```json
//! {"message": {"data": "<base64>", "messageId": "1", "attributes": {}},
//!  "subscription": "projects/p/subscriptions/invoices"}
//! ```

use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;
use std::collections::HashMap;

use crate::error::{
    DecodeError, InvalidBase64Snafu, InvalidEnvelopeSnafu, InvalidPayloadSnafu, MissingDataSnafu,
};

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: Option<PushMessage>,
    #[serde(default)]
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushMessage {
    data: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

/// A delivery unwrapped from its envelope. The payload is still raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: Option<String>,
    pub subscription: Option<String>,
    pub attributes: HashMap<String, String>,
    pub data: Vec<u8>,
}

impl Delivery {
    /// Decode the payload as JSON.
    pub fn payload(&self) -> Result<Value, DecodeError> {
        decode_payload(&self.data)
    }
}

/// Unwrap a push envelope, base64-decoding its data.
pub fn unwrap_push(body: &[u8]) -> Result<Delivery, DecodeError> {
    let envelope: PushEnvelope = serde_json::from_slice(body).context(InvalidEnvelopeSnafu)?;
    let message = envelope.message.context(MissingDataSnafu)?;
    let data = message.data.context(MissingDataSnafu)?;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .context(InvalidBase64Snafu)?;

    Ok(Delivery {
        message_id: message.message_id,
        subscription: envelope.subscription,
        attributes: message.attributes,
        data: bytes,
    })
}

/// Decode raw payload bytes as JSON.
pub fn decode_payload(bytes: &[u8]) -> Result<Value, DecodeError> {
    serde_json::from_slice(bytes).context(InvalidPayloadSnafu)
}
