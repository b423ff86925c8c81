//! WebSocket transport for relay connections

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

use droppr_core::{Frame, TransportError};

use crate::connection::{Connection, FrameSink, FrameSource};

pub struct WsSink<S> {
    inner: SplitSink<WebSocketStream<S>, Message>,
}

pub struct WsSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Split an accepted WebSocket into a relay connection
pub fn connection<S>(ws: WebSocketStream<S>) -> Connection
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, source) = ws.split();
    Connection::new(WsSource { inner: source }, WsSink { inner: sink })
}

fn ws_error(e: tungstenite::Error) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            TransportError::Closed
        }
        e => TransportError::WebSocket(e.to_string()),
    }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.clone()),
            Frame::Binary(data) => Message::Binary(data.clone()),
        };
        self.inner.send(msg).await.map_err(ws_error)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.inner.close().await.map_err(ws_error) {
            Err(TransportError::Closed) => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn recv(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                Ok(Message::Binary(data)) => return Some(Ok(Frame::Binary(data))),
                // Pongs to pings are queued by tungstenite itself
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => return None,
                Err(e) => {
                    return match ws_error(e) {
                        TransportError::Closed => None,
                        e => Some(Err(e)),
                    }
                }
            }
        }
    }
}
