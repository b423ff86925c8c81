//! Duplex connection capability
//!
//! A relay session owns its connection. The write half is shared with the
//! signal channel so the peer's session can forward frames into it; the read
//! half never leaves the owning session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use droppr_core::{Frame, TransportError};

/// Write half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one frame, waiting out transport backpressure
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError>;

    /// Close the connection. Closing twice is not an error.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a connection
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the remote end has closed
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>>;
}

/// Write half shared between a session and its channel slot
pub type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

/// Wrap a sink so it can be placed in a channel slot
pub fn shared_sink(sink: impl FrameSink + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}

/// Write a frame, giving up after `deadline`
///
/// The deadline covers waiting for the sink itself, which may be busy with a
/// frame from another session.
pub async fn send_with_deadline(
    sink: &SharedSink,
    frame: &Frame,
    deadline: Duration,
) -> Result<(), TransportError> {
    let write = async {
        let mut sink = sink.lock().await;
        sink.send(frame).await
    };

    match tokio::time::timeout(deadline, write).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::WriteTimeout(deadline.as_millis() as u64)),
    }
}

/// An upgraded, message-framed duplex connection
pub struct Connection {
    pub source: Box<dyn FrameSource>,
    pub sink: SharedSink,
}

impl Connection {
    pub fn new(source: impl FrameSource + 'static, sink: impl FrameSink + 'static) -> Self {
        Self {
            source: Box::new(source),
            sink: shared_sink(sink),
        }
    }
}
