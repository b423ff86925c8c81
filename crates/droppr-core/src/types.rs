//! Core type definitions for droppr
//!
//! These types are shared by the relay and the server and describe the
//! participants of a transfer and the frames they exchange.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one transfer's signal channel (a drop id)
///
/// Generated outside the relay; the relay only compares and hashes it.
#[derive(Clone, Hash, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two participants of a channel
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum Role {
    /// The peer offering the files (the "dropper")
    #[serde(rename = "dropper", alias = "sender")]
    Sender,
    /// The peer collecting the files
    #[serde(rename = "receiver")]
    Receiver,
}

impl Role {
    /// The role on the other end of the channel
    pub const fn other(self) -> Self {
        match self {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        }
    }

    /// Wire name, as stored in the `drop_role` session cookie
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Sender => "dropper",
            Role::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dropper" | "sender" => Ok(Role::Sender),
            "receiver" => Ok(Role::Receiver),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// Returned when a role name is neither a sender nor a receiver
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid drop role")]
pub struct RoleParseError(pub String);

/// Kind of a frame, without its payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
}

/// One message exchanged over a duplex connection
///
/// Payloads are opaque to the relay and forwarded unmodified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Text(_) => FrameKind::Text,
            Frame::Binary(_) => FrameKind::Binary,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An authorized participant: which channel, in which role
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub channel_id: ChannelId,
    pub role: Role,
}

impl Session {
    pub fn new(channel_id: impl Into<ChannelId>, role: Role) -> Self {
        Self {
            channel_id: channel_id.into(),
            role,
        }
    }
}

/// Random identifier for one accepted connection, used in logs
#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct ConnId(pub [u8; 8]);

impl ConnId {
    /// Generate a random connection ID
    ///
    /// # Panics
    /// Panics if the system random number generator fails (extremely rare).
    /// Use `try_generate` if you need to handle this case.
    pub fn generate() -> Self {
        Self::try_generate().expect("RNG failed - system entropy source unavailable")
    }

    /// Try to generate a random connection ID, returning an error if RNG fails
    pub fn try_generate() -> Result<Self, getrandom::Error> {
        let mut bytes = [0u8; 8];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
