//! Control-surface host connection
//!
//! The host launches the bridge with a local WebSocket port and a
//! registration token. After registering, inbound events are translated
//! and forwarded to the bridge; outbound key states are queued by
//! [`HostOutput`] and written by the connection loop.

pub mod protocol;
pub mod translate;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

pub use protocol::HostEvent;
pub use translate::{HostTranslator, Routed};

use crate::bridge::{BridgeHandle, SurfaceOutput, TransportError};

/// Registration parameters passed by the host on launch
#[derive(Debug, Clone)]
pub struct Registration {
    pub port: u16,
    pub plugin_uuid: String,
    pub register_event: String,
}

/// Surface output writing to the host connection
#[derive(Clone)]
pub struct HostOutput {
    tx: mpsc::UnboundedSender<String>,
}

impl HostOutput {
    /// Output plus the queue the connection loop drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SurfaceOutput for HostOutput {
    async fn set_visual_state(&self, context_id: &str, active: bool) -> Result<(), TransportError> {
        self.tx
            .send(protocol::set_state(context_id, active).to_string())
            .map_err(|_| TransportError::Closed)
    }
}

/// Parse one inbound text frame and forward it
fn handle_text(text: &str, translator: &HostTranslator, bridge: &BridgeHandle) {
    let event: HostEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to parse host message: {}", e);
            return;
        }
    };
    trace!(?event, "Host event");

    if let Some(routed) = translator.translate(event) {
        translate::dispatch(routed, bridge);
    }
}

/// Connect, register and pump messages until the host closes the socket
pub async fn run(
    registration: Registration,
    translator: HostTranslator,
    bridge: BridgeHandle,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let url = format!("ws://127.0.0.1:{}", registration.port);
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to host at {}", url))?;
    info!("Connected to host at {}", url);

    let (mut ws_tx, mut ws_rx) = ws.split();

    let register = protocol::registration(&registration.register_event, &registration.plugin_uuid);
    ws_tx
        .send(Message::Text(register.to_string().into()))
        .await
        .context("Failed to register with host")?;
    info!("✅ Registered with host");

    loop {
        tokio::select! {
            Some(msg) = outgoing.recv() => {
                ws_tx
                    .send(Message::Text(msg.into()))
                    .await
                    .context("Failed to send to host")?;
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_text(&text, &translator, &bridge),
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws_tx.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Host closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Host connection error"),
            },
        }
    }

    debug!("Host loop finished");
    Ok(())
}
