//! WebSocket transport backed by tokio-tungstenite
//!
//! Each `open` spawns one task that owns the socket. The task reads frames
//! and forwards writes from an unbounded channel; dropping the channel
//! sender closes the socket with a normal close frame.

use super::{CloseInfo, Transport, TransportError, TransportEvents};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// WebSocket client transport
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    /// Writer for the current handle
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

impl WebSocketTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for WebSocketTransport {
    fn open(&mut self, address: &str, events: TransportEvents) {
        self.close();

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        tokio::spawn(run_socket(address.to_string(), events, rx));
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotOpen)?;
        outbound
            .send(Message::Text(frame))
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&mut self) {
        // Dropping the sender ends the socket task
        self.outbound = None;
    }
}

/// Socket task for a single handle
async fn run_socket(
    address: String,
    events: TransportEvents,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    let generation = events.generation();

    let connected = tokio::select! {
        result = tokio_tungstenite::connect_async(address.as_str()) => result,
        _ = outbound.recv() => {
            tracing::trace!(generation, "Handle closed before connecting");
            return;
        }
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::debug!(generation, address = %crate::address::redact(&address), error = %e, "WebSocket connect failed");
            events.errored(TransportError::Connect(e.to_string()));
            return;
        }
    };

    events.opened();
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        events.errored(TransportError::Send(e.to_string()));
                        return;
                    }
                }
                None => {
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: super::CLOSE_NORMAL.into(),
                            reason: "client closed".into(),
                        })))
                        .await;
                    let _ = sink.close().await;
                    tracing::trace!(generation, "WebSocket closed by client");
                    return;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.frame(text);
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        events.frame(text);
                    }
                    Err(e) => {
                        events.malformed(e.to_string());
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map_or_else(CloseInfo::abnormal, |frame| {
                        CloseInfo::new(u16::from(frame.code), frame.reason.into_owned())
                    });
                    events.closed(info);
                    return;
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite
                }
                Some(Err(e)) => {
                    events.errored(TransportError::Protocol(e.to_string()));
                    return;
                }
                None => {
                    events.closed(CloseInfo::abnormal());
                    return;
                }
            }
        }
    }
}
