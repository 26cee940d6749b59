use std::io::Read;
use std::time::Duration;

use flate2::read::ZlibDecoder;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{trace, warn};
use url::Url;

use super::GatewayError;
use crate::internal::prelude::*;

/// How long to wait for a frame before yielding control back to the caller's loop.
const TIMEOUT: Duration = Duration::from_millis(500);
const DECOMPRESSION_MULTIPLIER: usize = 3;

/// A websocket connection to a gateway, exchanging JSON frames.
pub struct WsClient(WebSocketStream<MaybeTlsStream<TcpStream>>);

impl WsClient {
    pub(crate) async fn connect(url: Url) -> Result<Self> {
        let config = WebSocketConfig {
            max_message_size: None,
            max_frame_size: None,
            ..Default::default()
        };

        let (stream, _) = connect_async_with_config(url, Some(config), false).await?;

        Ok(Self(stream))
    }

    /// Receives the next frame, if one arrives within the polling window.
    ///
    /// Returns `Ok(None)` when no frame arrived in time, so the caller can service its other
    /// work (heartbeats, queued messages) and poll again.
    pub(crate) async fn recv_json(&mut self) -> Result<Option<Value>> {
        let message = match timeout(TIMEOUT, self.0.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(why))) => return Err(why.into()),
            Ok(None) => return Err(Error::Gateway(GatewayError::Closed(None))),
            Err(_) => return Ok(None),
        };

        let value = match message {
            Message::Binary(bytes) => {
                let mut decompressed = Vec::with_capacity(bytes.len() * DECOMPRESSION_MULTIPLIER);

                ZlibDecoder::new(&bytes[..]).read_to_end(&mut decompressed).map_err(|why| {
                    warn!("Err decompressing bytes: {why:?}");
                    trace!("Failing bytes: {bytes:?}");

                    why
                })?;

                serde_json::from_slice(&decompressed)?
            },
            Message::Text(payload) => serde_json::from_str(&payload)?,
            Message::Close(frame) => return Err(Error::Gateway(GatewayError::Closed(frame))),
            _ => return Ok(None),
        };

        Ok(Some(value))
    }

    pub(crate) async fn send_json(&mut self, value: &Value) -> Result<()> {
        let message = serde_json::to_string(value).map(Message::Text)?;

        self.0.send(message).await?;
        Ok(())
    }

    pub(crate) async fn close(&mut self, close_frame: Option<CloseFrame<'static>>) -> Result<()> {
        self.0.close(close_frame).await?;
        Ok(())
    }
}
