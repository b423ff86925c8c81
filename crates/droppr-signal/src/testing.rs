//! In-memory connections for driving relay sessions in tests

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use droppr_core::{Frame, TransportError};

use crate::connection::{Connection, FrameSink, FrameSource};

pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Frame>>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        match &self.tx {
            Some(tx) => tx.send(frame.clone()).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Sink whose writes never complete
pub struct StalledSink;

#[async_trait]
impl FrameSink for StalledSink {
    async fn send(&mut self, _frame: &Frame) -> Result<(), TransportError> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Sink whose writes always fail
pub struct BrokenSink;

#[async_trait]
impl FrameSink for BrokenSink {
    async fn send(&mut self, _frame: &Frame) -> Result<(), TransportError> {
        Err(TransportError::WebSocket("broken pipe".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// The remote end of an in-memory connection
pub struct Client {
    tx: Option<mpsc::UnboundedSender<Frame>>,
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl Client {
    pub fn send(&self, frame: Frame) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(frame);
        }
    }

    pub fn send_text(&self, text: &str) {
        self.send(Frame::Text(text.to_owned()));
    }

    /// Next frame from the relay; `None` if the relay closed the connection
    pub async fn recv(&mut self) -> Option<Frame> {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
    }

    /// Next frame, asserting it is text
    pub async fn recv_text(&mut self) -> String {
        match self.recv().await {
            Some(Frame::Text(text)) => text,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    /// Assert nothing arrives for a short while
    pub async fn assert_silent(&mut self) {
        let res = tokio::time::timeout(Duration::from_millis(50), self.rx.recv()).await;
        assert!(res.is_err(), "unexpected frame: {:?}", res);
    }

    /// Close the client's end, ending the relay session's read loop
    pub fn disconnect(&mut self) {
        self.tx = None;
    }
}

/// A connection for the relay plus the client end that drives it
pub fn pair() -> (Connection, Client) {
    let (to_relay, from_client) = mpsc::unbounded_channel();
    let (to_client, from_relay) = mpsc::unbounded_channel();

    let conn = Connection::new(
        MemorySource { rx: from_client },
        MemorySink { tx: Some(to_client) },
    );
    let client = Client {
        tx: Some(to_relay),
        rx: from_relay,
    };
    (conn, client)
}

/// A sink for filling a channel slot directly
pub fn sink() -> (MemorySink, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MemorySink { tx: Some(tx) }, rx)
}
