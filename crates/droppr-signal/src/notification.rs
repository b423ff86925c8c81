//! Status notifications sent by the relay to its own clients
//!
//! These are the only frames the relay ever originates. Clients rely on the
//! exact shapes:
//!
//! - `{"status":"busy"}` when the requested role is already connected
//! - `{"status":"failed","data":<payload>}` when a text frame could not be
//!   delivered to the peer
//! - `{"status":"failed"}` when a binary frame could not be delivered

use serde::Serialize;
use serde_json::value::RawValue;

use droppr_core::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Busy,
    Failed,
}

/// A status frame addressed to the client that caused it
#[derive(Debug, Serialize)]
pub struct Notification {
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Box<RawValue>>,
}

impl Notification {
    pub fn busy() -> Self {
        Self {
            status: Status::Busy,
            data: None,
        }
    }

    /// Report a frame that did not reach the peer
    ///
    /// Text payloads are echoed back so the client knows which message was
    /// lost. Payloads that are JSON are embedded as-is; anything else is
    /// embedded as a JSON string.
    pub fn failed(frame: &Frame) -> Self {
        let data = match frame {
            Frame::Text(text) => echo_payload(text).ok(),
            Frame::Binary(_) => None,
        };
        Self {
            status: Status::Failed,
            data,
        }
    }

    #[cfg(test)]
    pub(crate) fn status(&self) -> Status {
        self.status
    }

    /// Echoed payload, as it appears in the encoded notification
    #[cfg(test)]
    pub(crate) fn data(&self) -> Option<&str> {
        self.data.as_deref().map(RawValue::get)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        self.to_json().map(Frame::Text)
    }
}

fn echo_payload(text: &str) -> Result<Box<RawValue>, serde_json::Error> {
    match RawValue::from_string(text.to_owned()) {
        Ok(raw) => Ok(raw),
        Err(_) => RawValue::from_string(serde_json::to_string(text)?),
    }
}
