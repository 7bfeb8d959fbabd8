//! Collaborator traits the gateway core depends on.
//!
//! The application layer never touches a serial port, a socket or a terminal
//! directly.  Infrastructure implementations are injected at construction
//! time; tests use the doubles in [`crate::application::mock`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::TunnelEvent;

/// Errors raised by a [`SerialLink`].
#[derive(Debug, Error)]
pub enum LinkError {
    /// The device node could not be opened.
    #[error("failed to open serial device {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on the open link.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The device went away (end of stream) or the link was never opened.
    #[error("serial link closed")]
    Closed,
}

/// A line-oriented serial console.
///
/// Reads are bounded: [`read_lines_until_timeout`] returns every complete
/// line received since the previous call, or an empty batch once its
/// timeout elapses.
///
/// [`read_lines_until_timeout`]: SerialLink::read_lines_until_timeout
#[async_trait]
pub trait SerialLink: Send {
    /// Opens the link.  Opening an already open link is a no-op.
    async fn open(&mut self) -> Result<(), LinkError>;

    /// Returns `true` while the link can carry traffic.
    fn is_open(&self) -> bool;

    /// Returns `true` while another write is still in progress.
    fn is_busy(&self) -> bool;

    /// Writes one line of text; `line` includes its terminating newline.
    async fn write_ascii(&mut self, line: &str) -> Result<(), LinkError>;

    /// Returns all complete lines received since the last call, in arrival
    /// order, waiting at most the link's timeout for the first one.
    async fn read_lines_until_timeout(&mut self) -> Result<Vec<String>, LinkError>;
}

/// An established (or establishing) tunnel to a YellowNet server.
pub trait TunnelHandle: Send {
    /// Queues a text message for the server.  Returns `false` if the tunnel
    /// can no longer accept messages.
    fn send(&self, text: String) -> bool;

    /// Tears the tunnel down.  No further events are raised for it.
    fn close(&mut self);
}

/// Opens tunnels.
pub trait TunnelConnector: Send + Sync {
    /// Starts connecting to `address` and returns immediately.
    ///
    /// Progress is reported on `events`, every event tagged with
    /// `generation`.
    fn connect(
        &self,
        address: &str,
        generation: u64,
        events: UnboundedSender<TunnelEvent>,
    ) -> Box<dyn TunnelHandle>;
}

/// Asks the user whether the device may open a tunnel to an address.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressApprover: Send + Sync {
    async fn approve(&self, address: &str) -> bool;
}

/// Shows user-facing failure notifications.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}
