//! `tokio-tungstenite` client transport.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::domain::connection::CloseCode;
use crate::ports::{LinkDriver, Transport, TransportError, TransportEvent, TransportLink};

/// Close code reported when the peer sent a close frame without a status.
const NO_STATUS: u16 = 1005;

/// WebSocket transport. Each link gets a socket task translating frames to
/// `TransportEvent`s and close requests to close frames.
pub struct TungsteniteTransport {
    channel_capacity: usize,
}

impl TungsteniteTransport {
    pub fn new(channel_capacity: usize) -> Self {
        Self { channel_capacity }
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (link, driver) = TransportLink::channel(self.channel_capacity);
        tokio::spawn(drive_socket(stream, driver));
        Ok(link)
    }
}

async fn drive_socket(stream: WebSocketStream<MaybeTlsStream<TcpStream>>, driver: LinkDriver) {
    let (mut sink, mut source) = stream.split();
    let LinkDriver {
        events,
        mut close_requested,
    } = driver;

    loop {
        tokio::select! {
            requested = &mut close_requested => {
                let code = requested.unwrap_or(CloseCode::NORMAL);
                let frame = CloseFrame {
                    code: WsCloseCode::from(code.0),
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                break;
            }
            incoming = source.next() => {
                let event = match incoming {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text.to_string()),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(_) => {
                            tracing::warn!("Dropped non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(e) = sink.send(Message::Pong(payload)).await {
                            tracing::debug!(error = %e, "Pong not delivered");
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(NO_STATUS, |f| u16::from(f.code));
                        let _ = events.send(TransportEvent::Closed(CloseCode(code))).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => TransportEvent::Error(e.to_string()),
                    None => TransportEvent::Closed(CloseCode::ABNORMAL),
                };
                let terminal = !matches!(event, TransportEvent::Frame(_));
                // A closed receiver means the worker let go of the link
                if events.send(event).await.is_err() || terminal {
                    break;
                }
            }
        }
    }
}
