// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent channel: one WebSocket connection per command.
//
// The agent protocol is strictly request/response: connect, send one text
// message, read one text message, close.  There is no pooling and no
// multiplexing; every logical call pays for its own handshake, which is
// negligible on loopback at till-printing volumes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use printgate_core::error::{GatewayError, Result};

/// One open connection to the agent.
#[async_trait]
pub trait AgentConnection: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next text message.
    async fn receive(&mut self) -> Result<String>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens connections to an agent endpoint.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn AgentConnection>>;
}

/// `AgentConnector` speaking WebSocket text frames.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl AgentConnector for WebSocketConnector {
    #[instrument(skip(self))]
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn AgentConnection>> {
        let (stream, _response) =
            tokio::time::timeout(self.connect_timeout, tokio_tungstenite::connect_async(endpoint))
                .await
                .map_err(|_| {
                    GatewayError::Channel(format!(
                        "connect to {endpoint} timed out after {}s",
                        self.connect_timeout.as_secs()
                    ))
                })?
                .map_err(|e| GatewayError::Channel(format!("connect to {endpoint}: {e}")))?;

        debug!("agent connection open");
        Ok(Box::new(WebSocketConnection { stream }))
    }
}

struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl AgentConnection for WebSocketConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| GatewayError::Channel(format!("send: {e}")))
    }

    async fn receive(&mut self) -> Result<String> {
        loop {
            let message = self
                .stream
                .next()
                .await
                .ok_or_else(|| {
                    GatewayError::Channel("connection closed before a response arrived".into())
                })?
                .map_err(|e| GatewayError::Channel(format!("receive: {e}")))?;

            match message {
                Message::Text(text) => return Ok(text),
                Message::Binary(bytes) => {
                    return String::from_utf8(bytes).map_err(|_| {
                        GatewayError::Protocol("binary response is not UTF-8 text".into())
                    });
                }
                Message::Close(frame) => {
                    return Err(GatewayError::Channel(format!(
                        "connection closed by agent ({frame:?})"
                    )));
                }
                // Control frames; tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| GatewayError::Channel(format!("close: {e}")))
    }
}

/// Request/response calls over fresh connections.
///
/// Cheap to clone; clones share the connector.
#[derive(Clone)]
pub struct AgentChannel {
    connector: Arc<dyn AgentConnector>,
    response_timeout: Duration,
}

impl AgentChannel {
    pub fn new(connector: Arc<dyn AgentConnector>, response_timeout: Duration) -> Self {
        Self {
            connector,
            response_timeout,
        }
    }

    /// Send `message` and return the agent's single reply.
    ///
    /// A fired `cancel` token abandons the call with `Cancelled`; the
    /// connection is dropped without a close handshake.
    pub async fn request(
        &self,
        endpoint: &str,
        message: String,
        cancel: &CancellationToken,
    ) -> Result<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            reply = self.round_trip(endpoint, message) => reply,
        }
    }

    /// Open and close a connection without sending anything.
    pub async fn probe(&self, endpoint: &str, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            connection = self.connector.connect(endpoint) => {
                let connection = connection?;
                if let Err(e) = connection.close().await {
                    debug!(error = %e, "close after probe failed");
                }
                Ok(())
            }
        }
    }

    async fn round_trip(&self, endpoint: &str, message: String) -> Result<String> {
        let mut connection = self.connector.connect(endpoint).await?;

        let reply = async {
            connection.send(message).await?;
            tokio::time::timeout(self.response_timeout, connection.receive())
                .await
                .map_err(|_| {
                    GatewayError::Channel(format!(
                        "response timed out after {}s",
                        self.response_timeout.as_secs()
                    ))
                })?
        }
        .await;

        // The reply is what matters; a failed close is only noise.
        if let Err(e) = connection.close().await {
            debug!(error = %e, "agent connection close failed");
        }
        reply
    }
}
