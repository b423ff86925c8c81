//! droppr Signal Relay
//!
//! Pairs the two browsers of a file drop over WebSocket and relays their
//! signaling messages (and, when no direct link can be made, their data)
//! between them.
//!
//! # Protocol
//!
//! 1. A client upgrades `/sc` carrying its `drop_id` and `drop_role` cookies
//! 2. The relay claims the role's slot in the drop's channel, or answers
//!    `{"status":"busy"}` if that role is already connected
//! 3. Every frame is forwarded unmodified to the other role
//! 4. Frames that cannot be delivered come back as `{"status":"failed"}`,
//!    with the original text under `data`
//! 5. When both sides have left, the channel is forgotten

pub mod channel;
pub mod connection;
pub mod notification;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::{Claim, SignalChannel};
pub use connection::{Connection, FrameSink, FrameSource, SharedSink};
pub use notification::{Notification, Status};
pub use registry::ChannelRegistry;
pub use relay::{run_session, RelayStats};
pub use server::SignalServer;
pub use session::{CookieSessionResolver, SessionResolver};
