//! Gateway configuration types.
//!
//! [`GatewayConfig`] is the single source of truth for all runtime settings.
//! It can be built from CLI arguments, from a TOML file, or from sensible
//! defaults (useful for local development and tests).
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! variable reads inside the domain) makes the gateway easy to embed in
//! tests.  The infrastructure layer and `main.rs` are responsible for
//! populating it.

use std::path::PathBuf;
use std::time::Duration;

/// Default serial device node of a handheld attached over USB CDC-ACM.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/ttyACM0";

/// Default line speed.  CDC-ACM consoles ignore it; real UARTs on the
/// handheld's debug header run at this rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default bounded wait of one serial read.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// All runtime configuration for the gateway.
///
/// # Example
///
/// ```rust
/// use yellownet_gateway::domain::GatewayConfig;
///
/// let cfg = GatewayConfig::default();
/// assert_eq!(cfg.device_path.to_str(), Some("/dev/ttyACM0"));
/// assert!(!cfg.auto_approve);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Serial device node the handheld is attached to.
    pub device_path: PathBuf,

    /// Line speed the serial port is opened with.
    pub baud_rate: u32,

    /// How long one serial read waits for complete lines before the poll
    /// step gives control back to the scheduler.
    ///
    /// Tunnel events are handled between poll steps, so this is also the
    /// worst-case latency of an inbound tunnel message.
    pub poll_timeout: Duration,

    /// Tunnel address to connect to at startup, without asking.
    ///
    /// `None` waits for the device to send `GTW;set_address`.
    pub initial_address: Option<String>,

    /// Accept every `set_address` request without prompting the user.
    pub auto_approve: bool,

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for GatewayConfig {
    /// | Field           | Default          |
    /// |-----------------|------------------|
    /// | device_path     | `/dev/ttyACM0`   |
    /// | baud_rate       | 115200           |
    /// | poll_timeout    | 50 ms            |
    /// | initial_address | none             |
    /// | auto_approve    | `false`          |
    /// | log_level       | `info`           |
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            baud_rate: DEFAULT_BAUD_RATE,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            initial_address: None,
            auto_approve: false,
            log_level: "info".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
