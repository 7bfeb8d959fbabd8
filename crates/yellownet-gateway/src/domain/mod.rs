//! Domain layer for yellownet-gateway.
//!
//! Pure types with no dependencies on I/O, async runtimes, or sockets:
//!
//! - Configuration structures
//! - Relay session states and tunnel events
//! - The console lines the gateway writes to the device

pub mod config;
pub mod console;
pub mod session;

pub use config::GatewayConfig;
pub use session::{SessionState, TunnelEvent, TunnelEventKind};
