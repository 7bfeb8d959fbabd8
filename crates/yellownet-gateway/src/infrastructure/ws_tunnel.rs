//! WebSocket tunnel to a YellowNet server.
//!
//! Each tunnel runs in its own Tokio task:
//!
//! 1. Connects to the server with `connect_async`.
//! 2. Reports [`TunnelEventKind::Opened`].
//! 3. Forwards queued outbound text as WebSocket text frames, and reports
//!    every inbound text frame as [`TunnelEventKind::Message`].
//! 4. Reports exactly one terminal event, `Error` or `Closed`, and exits.
//!
//! The task never touches gateway state.  Everything it learns goes through
//! the event channel, tagged with the generation it was started for, and the
//! poll loop applies it.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::application::ports::{TunnelConnector, TunnelHandle};
use crate::domain::{TunnelEvent, TunnelEventKind};

/// Scheme prepended to addresses that carry none.
pub const DEFAULT_SCHEME: &str = "ws://";

/// Ways a tunnel ends abnormally.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("failed to send to server: {0}")]
    Send(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("failed to receive from server: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),
}

/// Builds the WebSocket URL for a device-supplied address.
///
/// An address that already names a scheme (`ws://…`, `wss://…`) is used as
/// is; a bare `host[:port][/path]` gets `ws://` prepended.
///
/// ```rust
/// use yellownet_gateway::infrastructure::ws_tunnel::tunnel_url;
///
/// assert_eq!(tunnel_url("10.0.0.5:8080"), "ws://10.0.0.5:8080");
/// assert_eq!(tunnel_url("wss://yellow.example/net"), "wss://yellow.example/net");
/// ```
pub fn tunnel_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("{DEFAULT_SCHEME}{address}")
    }
}

// ── Connector ─────────────────────────────────────────────────────────────────

/// Opens real WebSocket tunnels.  Must be used inside a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTunnelConnector;

impl WsTunnelConnector {
    pub fn new() -> Self {
        Self
    }
}

impl TunnelConnector for WsTunnelConnector {
    fn connect(
        &self,
        address: &str,
        generation: u64,
        events: UnboundedSender<TunnelEvent>,
    ) -> Box<dyn TunnelHandle> {
        let url = tunnel_url(address);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let kind = match run_tunnel(&url, generation, outbound_rx, &events).await {
                Ok(()) => TunnelEventKind::Closed,
                Err(e) => {
                    warn!("tunnel #{generation}: {e}");
                    TunnelEventKind::Error(e.to_string())
                }
            };
            // The receiver is gone only when the gateway itself is.
            let _ = events.send(TunnelEvent::new(generation, kind));
        });
        Box::new(WsTunnelHandle {
            outbound: outbound_tx,
            task,
        })
    }
}

/// Handle to a running tunnel task.
///
/// Closing (or dropping) the handle aborts the task, so no further events
/// are raised for it.
pub struct WsTunnelHandle {
    outbound: UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl TunnelHandle for WsTunnelHandle {
    fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for WsTunnelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Tunnel task ───────────────────────────────────────────────────────────────

/// Runs one tunnel until the server closes it (`Ok`) or it fails (`Err`).
///
/// Emits `Opened` and `Message` events itself; the terminal event is left to
/// the caller.
async fn run_tunnel(
    url: &str,
    generation: u64,
    mut outbound: UnboundedReceiver<String>,
    events: &UnboundedSender<TunnelEvent>,
) -> Result<(), TunnelError> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|source| TunnelError::Connect {
            url: url.to_string(),
            source,
        })?;
    info!("tunnel #{generation}: connected to {url}");
    let _ = events.send(TunnelEvent::new(generation, TunnelEventKind::Opened));

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            text = outbound.recv() => {
                let Some(text) = text else {
                    // Handle dropped without an abort; treat as a local close.
                    let _ = ws_tx.close().await;
                    return Ok(());
                };
                ws_tx
                    .send(WsMessage::Text(text))
                    .await
                    .map_err(TunnelError::Send)?;
            }
            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = events.send(TunnelEvent::new(
                            generation,
                            TunnelEventKind::Message(text),
                        ));
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        debug!("tunnel #{generation}: binary frame ({} bytes) ignored", data.len());
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!("tunnel #{generation}: close frame {frame:?}");
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(TunnelError::Receive(e)),
                    None => return Ok(()),
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
