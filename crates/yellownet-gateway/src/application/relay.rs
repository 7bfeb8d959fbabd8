//! Relay session state machine.
//!
//! Owns at most one tunnel at a time and tracks its lifecycle:
//!
//! ```text
//! Closed ──connect──▶ Connecting ──Opened──▶ Open
//!    ▲                    │                   │
//!    └──── Error / Closed event, reconnect ───┘
//! ```
//!
//! Transport callbacks arrive as [`TunnelEvent`]s and are fed in through
//! [`RelaySession::apply`], which returns what the controller must do next.
//! Each connect bumps a generation counter; events from a replaced tunnel
//! carry an older generation and are ignored.

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::application::ports::{TunnelConnector, TunnelHandle};
use crate::domain::{SessionState, TunnelEvent, TunnelEventKind};

/// The controller's follow-up for an applied tunnel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Nothing to do: stale generation, or the session is not in a state
    /// where the event means anything.
    Ignored,
    /// The tunnel is now open.
    Opened,
    /// A server message to deliver to the device.
    Inbound(String),
    /// The tunnel failed; the user must be told.
    Failed(String),
    /// The server hung up.
    Closed,
}

/// The single relay session owned by the gateway controller.
pub struct RelaySession {
    state: SessionState,
    generation: u64,
    address: Option<String>,
    handle: Option<Box<dyn TunnelHandle>>,
}

impl RelaySession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Closed,
            generation: 0,
            address: None,
            handle: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Generation of the most recent connect; `0` before the first one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Address of the current (or last) tunnel.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Replaces any existing tunnel with a new one to `address`.
    ///
    /// The old tunnel is closed before the new one is requested, so two
    /// tunnels never both count as current.
    pub fn connect(
        &mut self,
        address: &str,
        connector: &dyn TunnelConnector,
        events: &UnboundedSender<TunnelEvent>,
    ) {
        if self.handle.is_some() {
            info!(
                "replacing {} tunnel to {}",
                self.state,
                self.address.as_deref().unwrap_or("?")
            );
        }
        self.close();

        self.generation += 1;
        info!("connecting tunnel #{} to {address}", self.generation);
        self.handle = Some(connector.connect(address, self.generation, events.clone()));
        self.address = Some(address.to_string());
        self.state = SessionState::Connecting;
    }

    /// Sends text over the tunnel if the session is open.
    ///
    /// Returns `false` (and drops the text) otherwise.
    pub fn send(&self, text: String) -> bool {
        match (&self.handle, self.state) {
            (Some(handle), SessionState::Open) => handle.send(text),
            _ => false,
        }
    }

    /// Closes the current tunnel, if any.  The session ends up `Closed`.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.close();
        }
        self.state = SessionState::Closed;
    }

    /// Applies one tunnel event to the state machine.
    pub fn apply(&mut self, event: TunnelEvent) -> RelayOutcome {
        if event.generation != self.generation {
            debug!(
                "ignoring event from replaced tunnel #{} (current #{})",
                event.generation, self.generation
            );
            return RelayOutcome::Ignored;
        }

        match (self.state, event.kind) {
            (SessionState::Closed, kind) => {
                debug!("ignoring {kind:?} for closed tunnel #{}", event.generation);
                RelayOutcome::Ignored
            }
            (SessionState::Connecting, TunnelEventKind::Opened) => {
                self.state = SessionState::Open;
                info!("tunnel #{} open", self.generation);
                RelayOutcome::Opened
            }
            (SessionState::Open, TunnelEventKind::Opened) => RelayOutcome::Ignored,
            (SessionState::Open, TunnelEventKind::Message(text)) => RelayOutcome::Inbound(text),
            (SessionState::Connecting, TunnelEventKind::Message(_)) => {
                warn!("message on tunnel #{} before it opened; dropped", self.generation);
                RelayOutcome::Ignored
            }
            (_, TunnelEventKind::Error(reason)) => {
                self.close();
                RelayOutcome::Failed(reason)
            }
            (_, TunnelEventKind::Closed) => {
                self.close();
                info!("tunnel #{} closed by server", self.generation);
                RelayOutcome::Closed
            }
        }
    }
}

impl Default for RelaySession {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
