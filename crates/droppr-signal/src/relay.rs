//! Relay session: one connection's life in one channel
//!
//! 1. Look up (or create) the channel for the session's id
//! 2. Claim the session's role slot; if it is taken, send `busy` and stop
//! 3. Read frames and forward each to the other role; report frames that
//!    could not be delivered with a `failed` notification
//! 4. Release the slot and close the connection, however the loop ended

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use droppr_core::{ConnId, RelayError, Role, Session};

use crate::channel::{Claim, SignalChannel};
use crate::connection::{send_with_deadline, Connection, FrameSource, SharedSink};
use crate::notification::Notification;
use crate::registry::ChannelRegistry;

/// Counters for a finished relay session
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Frames delivered to the peer
    pub relayed: u64,
    /// Frames reported back as failed
    pub failed: u64,
}

/// Run a relay session to completion
///
/// Returns `Err(RelayError::SlotBusy)` if the role was already connected, and
/// a local transport error if a notification could not be written back to
/// this connection. The peer's connection is never closed from here.
pub async fn run_session(
    registry: &ChannelRegistry,
    session: &Session,
    conn: Connection,
    conn_id: ConnId,
) -> Result<RelayStats, RelayError> {
    let Connection { mut source, sink } = conn;
    let role = session.role;

    let channel = match claim(registry, session, &sink).await {
        Some(channel) => channel,
        None => {
            warn!("[{}] {} already connected to channel {}", conn_id, role, session.channel_id);
            let notified = notify(&sink, &Notification::busy(), registry).await;
            close(&sink, registry.write_timeout(), conn_id).await;
            notified?;
            return Err(RelayError::SlotBusy(role));
        }
    };

    debug!("[{}] Relaying as {} on channel {}", conn_id, role, session.channel_id);

    let result = AssertUnwindSafe(forward_frames(&channel, role, source.as_mut(), &sink))
        .catch_unwind()
        .await
        .unwrap_or(Err(RelayError::Panicked));

    channel.release(role, registry).await;
    close(&sink, registry.write_timeout(), conn_id).await;

    match &result {
        Ok(stats) => debug!(
            "[{}] {} left channel {} ({} relayed, {} failed)",
            conn_id, role, session.channel_id, stats.relayed, stats.failed
        ),
        Err(e) => warn!("[{}] {} left channel {}: {}", conn_id, role, session.channel_id, e),
    }
    result
}

/// Claim the role slot, or `None` if it is taken
async fn claim(
    registry: &ChannelRegistry,
    session: &Session,
    sink: &SharedSink,
) -> Option<Arc<SignalChannel>> {
    loop {
        let channel = registry.get_or_create(&session.channel_id);
        match channel.try_claim(session.role, Arc::clone(sink)).await {
            Claim::Accepted => return Some(channel),
            Claim::Busy => return None,
            // Lost a race with the channel's teardown; the registry no
            // longer holds it, so the next lookup creates a fresh one.
            Claim::Retired => continue,
        }
    }
}

async fn forward_frames(
    channel: &SignalChannel,
    role: Role,
    source: &mut dyn FrameSource,
    sink: &SharedSink,
) -> Result<RelayStats, RelayError> {
    let mut stats = RelayStats::default();

    while let Some(next) = source.recv().await {
        let frame = match next {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Read from {} on channel {} failed: {}", role, channel.id(), e);
                break;
            }
        };

        match channel.forward(role, &frame).await {
            Ok(()) => stats.relayed += 1,
            Err(e) => {
                debug!(
                    "{:?} frame from {} on channel {} not delivered: {}",
                    frame.kind(),
                    role,
                    channel.id(),
                    e
                );
                stats.failed += 1;
                let frame = Notification::failed(&frame).to_frame()?;
                send_with_deadline(sink, &frame, channel.write_timeout()).await?;
            }
        }
    }

    Ok(stats)
}

async fn notify(
    sink: &SharedSink,
    notification: &Notification,
    registry: &ChannelRegistry,
) -> Result<(), RelayError> {
    let frame = notification.to_frame()?;
    send_with_deadline(sink, &frame, registry.write_timeout()).await?;
    Ok(())
}

/// Close the connection; closing writes a close frame, so it gets the same
/// deadline as any other write
async fn close(sink: &SharedSink, deadline: Duration, conn_id: ConnId) {
    match timeout(deadline, async { sink.lock().await.close().await }).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("[{}] Close failed: {}", conn_id, e),
        Err(_) => debug!("[{}] Close timed out after {:?}", conn_id, deadline),
    }
}
