//! Signal channel: the pairing point for one transfer
//!
//! A channel has one slot per role. Each slot is either empty or holds the
//! write half of exactly one connection. A single lock guards both slots and
//! every forward through the channel, so a disconnect can never interleave
//! with a write to the connection being torn down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use droppr_core::{ChannelId, ForwardError, Frame, Role};

use crate::connection::{send_with_deadline, SharedSink};
use crate::registry::ChannelRegistry;

/// Result of trying to claim a role slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// The slot was empty and now holds the connection
    Accepted,
    /// Another connection already holds the slot
    Busy,
    /// The channel was torn down and removed from its registry; look the id
    /// up again
    Retired,
}

impl Claim {
    pub fn is_accepted(self) -> bool {
        self == Claim::Accepted
    }
}

#[derive(Default)]
struct Slots {
    sender: Option<SharedSink>,
    receiver: Option<SharedSink>,
    /// Set once the channel has been removed from the registry
    retired: bool,
}

impl Slots {
    fn get(&self, role: Role) -> Option<&SharedSink> {
        match role {
            Role::Sender => self.sender.as_ref(),
            Role::Receiver => self.receiver.as_ref(),
        }
    }

    fn get_mut(&mut self, role: Role) -> &mut Option<SharedSink> {
        match role {
            Role::Sender => &mut self.sender,
            Role::Receiver => &mut self.receiver,
        }
    }

    fn is_empty(&self) -> bool {
        self.sender.is_none() && self.receiver.is_none()
    }
}

/// Per-transfer channel holding at most one connection per role
pub struct SignalChannel {
    id: ChannelId,
    slots: Mutex<Slots>,
    write_timeout: Duration,
}

impl SignalChannel {
    pub fn new(id: ChannelId, write_timeout: Duration) -> Self {
        Self {
            id,
            slots: Mutex::new(Slots::default()),
            write_timeout,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// Deadline for a single write to a connection in this channel
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Claim the slot for `role`
    ///
    /// An occupied slot is never overwritten: of several concurrent claims
    /// for the same role, exactly one is accepted.
    pub async fn try_claim(&self, role: Role, sink: SharedSink) -> Claim {
        let mut slots = self.slots.lock().await;

        if slots.retired {
            return Claim::Retired;
        }

        let slot = slots.get_mut(role);
        if slot.is_some() {
            return Claim::Busy;
        }
        *slot = Some(sink);

        info!("{} connected to channel {}", role, self.id);
        Claim::Accepted
    }

    /// Empty the slot for `role`
    ///
    /// When this leaves the channel with no connections, the channel is
    /// removed from `registry` and retired; a later connection for the same id
    /// gets a fresh channel. Releasing an empty slot does nothing.
    ///
    /// Returns true if the channel was removed.
    pub async fn release(&self, role: Role, registry: &ChannelRegistry) -> bool {
        let mut slots = self.slots.lock().await;

        if slots.get_mut(role).take().is_none() {
            return false;
        }
        debug!("{} disconnected from channel {}", role, self.id);

        if !slots.is_empty() {
            return false;
        }

        // Lock order is always channel then registry.
        slots.retired = true;
        let removed = registry.remove_if_empty(self);
        if removed {
            info!("Channel {} removed (empty)", self.id);
        }
        removed
    }

    /// Write half of the connection in the other role's slot
    pub async fn peer_of(&self, role: Role) -> Option<SharedSink> {
        self.slots.lock().await.get(role.other()).map(Arc::clone)
    }

    /// Forward a frame from `from` to the other role
    ///
    /// Holds the channel lock for the whole write, bounded by the channel's
    /// write timeout. A failed write leaves the peer's slot untouched; the
    /// peer's own session notices the broken connection on its next read.
    pub async fn forward(&self, from: Role, frame: &Frame) -> Result<(), ForwardError> {
        let slots = self.slots.lock().await;

        let peer = slots.get(from.other()).ok_or(ForwardError::PeerAbsent)?;

        send_with_deadline(peer, frame, self.write_timeout)
            .await
            .map_err(|e| {
                warn!("Forward {} -> {} on channel {} failed: {}", from, from.other(), self.id, e);
                ForwardError::PeerWriteFailed(e)
            })
    }

    /// Whether a connection currently holds the slot for `role`
    pub async fn is_claimed(&self, role: Role) -> bool {
        self.slots.lock().await.get(role).is_some()
    }

    /// Check if both slots are empty
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }

    /// Number of occupied slots (0, 1 or 2)
    pub async fn connection_count(&self) -> usize {
        let slots = self.slots.lock().await;
        usize::from(slots.sender.is_some()) + usize::from(slots.receiver.is_some())
    }
}
