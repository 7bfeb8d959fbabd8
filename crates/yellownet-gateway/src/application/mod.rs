//! Application layer for yellownet-gateway.
//!
//! Knows *what* the gateway does with a packet, but delegates *how* bytes
//! move to the infrastructure layer through the traits in [`ports`].
//!
//! # Responsibilities
//!
//! - Routing decoded device packets to the control handler or the tunnel
//! - The relay session state machine (one tunnel at a time)
//! - The gateway controller that owns the session context
//! - The cooperative poll loop
//!
//! # What does NOT belong here?
//!
//! - Opening device nodes or sockets (that is infrastructure)
//! - Terminal prompts (infrastructure, behind [`ports::AddressApprover`])
//! - Packet syntax (that is `yellownet-core`)

pub mod dispatcher;
pub mod gateway;
pub mod mock;
pub mod poll;
pub mod ports;
pub mod relay;

pub use dispatcher::{route, ControlCommand, Route};
pub use gateway::{Delivery, Gateway, TUNNEL_FAILURE_ALERT};
pub use poll::PollReport;
pub use ports::{AddressApprover, LinkError, Notifier, SerialLink, TunnelConnector, TunnelHandle};
pub use relay::{RelayOutcome, RelaySession};
