//! Infrastructure layer for yellownet-gateway.
//!
//! Handles all I/O: the serial device node, the WebSocket tunnel, the
//! terminal prompt and the configuration file.
//!
//! # Responsibilities
//!
//! - Opening the serial port and framing its byte stream into lines
//! - Connecting to YellowNet servers and running one task per tunnel
//! - Asking the user before the device may choose a server
//! - Reading the optional TOML configuration file
//!
//! # What does NOT belong here?
//!
//! - Routing decisions and session state (that is the application layer)
//! - Packet syntax (that is `yellownet-core`)

pub mod config_file;
pub mod prompt;
pub mod serial_link;
pub mod ws_tunnel;

pub use config_file::{load_config_file, ConfigError, ConfigFile};
pub use prompt::{AutoApprover, LogNotifier, PromptApprover};
pub use serial_link::{available_ports, SerialPortLink, StreamSerialLink};
pub use ws_tunnel::{tunnel_url, TunnelError, WsTunnelConnector};
