//! WebSocket transport
//!
//! Speaks the normalized JSON protocol: each text frame from the server is
//! one [`FeedMessage`], each frame we send is one [`ClientFrame`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use terminal_core::{
    ClientFrame, FeedMessage, LocalOrderId, OrderRequest, Outcome, TerminalError, TerminalResult,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::transport::Transport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Parse one text frame; keepalive frames yield `None`
pub fn parse_frame(text: &str) -> TerminalResult<Option<FeedMessage>> {
    let text = text.trim();
    if text.is_empty() || text == "PONG" {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(text)?))
}

pub struct WebSocketTransport {
    url: Url,
    stream: Option<WsStream>,
}

impl WebSocketTransport {
    pub fn new(url: &str) -> TerminalResult<Self> {
        let url = Url::parse(url).map_err(|e| TerminalError::config(format!("{}: {}", url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TerminalError::config(format!(
                "unsupported scheme {} in {}",
                url.scheme(),
                url
            )));
        }
        Ok(Self { url, stream: None })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> TerminalResult<&mut WsStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| TerminalError::disconnected("not connected"))
    }

    async fn send_frame(&mut self, frame: &ClientFrame) -> TerminalResult<()> {
        let json = serde_json::to_string(frame)?;
        debug!("[Sync WS] -> {}", json);
        let result = self.stream()?.send(Message::Text(json.into())).await;
        if let Err(e) = result {
            self.stream = None;
            return Err(TerminalError::disconnected(e.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self) -> TerminalResult<()> {
        info!("[Sync WS] Connecting to {}", self.url);
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TerminalError::disconnected(e.to_string()))?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn subscribe(&mut self, market_id: &str) -> TerminalResult<()> {
        self.send_frame(&ClientFrame::Subscribe {
            market_id: market_id.to_string(),
        })
        .await
    }

    async fn unsubscribe(&mut self, market_id: &str) -> TerminalResult<()> {
        self.send_frame(&ClientFrame::Unsubscribe {
            market_id: market_id.to_string(),
        })
        .await
    }

    async fn request_snapshot(&mut self, market_id: &str, outcome: Outcome) -> TerminalResult<()> {
        self.send_frame(&ClientFrame::SnapshotRequest {
            market_id: market_id.to_string(),
            outcome,
        })
        .await
    }

    async fn next_message(&mut self) -> TerminalResult<Option<FeedMessage>> {
        loop {
            let frame = self.stream()?.next().await;
            let text = match frame {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => text.to_owned(),
                    Err(e) => {
                        warn!("[Sync WS] Dropping non-UTF-8 binary frame: {}", e);
                        continue;
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.stream()?.send(Message::Pong(data)).await {
                        self.stream = None;
                        return Err(TerminalError::disconnected(e.to_string()));
                    }
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("[Sync WS] Connection closed by server");
                    self.stream = None;
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.stream = None;
                    return Err(TerminalError::disconnected(e.to_string()));
                }
            };

            match parse_frame(&text) {
                Ok(Some(message)) => return Ok(Some(message)),
                Ok(None) => continue,
                Err(e) => warn!("[Sync WS] Dropping undecodable frame: {}", e),
            }
        }
    }

    async fn send_order(&mut self, request: &OrderRequest) -> TerminalResult<LocalOrderId> {
        self.send_frame(&ClientFrame::PlaceOrder(request.clone()))
            .await?;
        Ok(request.local_id.clone())
    }

    async fn send_cancel(
        &mut self,
        local_id: &LocalOrderId,
        exchange_id: &str,
    ) -> TerminalResult<()> {
        self.send_frame(&ClientFrame::CancelOrder {
            local_id: local_id.clone(),
            exchange_id: exchange_id.to_string(),
        })
        .await
    }

    async fn close(&mut self) -> TerminalResult<()> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TerminalError::disconnected(e.to_string()))?;
        }
        Ok(())
    }
}
