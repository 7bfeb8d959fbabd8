//! YellowNet Gateway — entry point.
//!
//! Attaches to a handheld's serial console, announces itself, and relays
//! YellowNet packets between the device and the server the device asks for.
//!
//! # Usage
//!
//! ```text
//! yellownet-gateway [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML configuration file
//!   --device <PATH>            Serial device node [default: /dev/ttyACM0]
//!   --baud-rate <BAUD>         Serial line speed [default: 115200]
//!   --poll-timeout-ms <MS>     Serial read timeout per poll step [default: 50]
//!   --address <ADDR>           Connect to this server at startup
//!   --auto-approve             Accept every set_address without asking
//!   --log-level <FILTER>       Log filter when RUST_LOG is unset [default: info]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then command-line flags and
//! environment variables.
//!
//! | Variable                    | Flag                |
//! |-----------------------------|---------------------|
//! | `YELLOWNET_DEVICE`          | `--device`          |
//! | `YELLOWNET_BAUD_RATE`       | `--baud-rate`       |
//! | `YELLOWNET_POLL_TIMEOUT_MS` | `--poll-timeout-ms` |
//! | `YELLOWNET_ADDRESS`         | `--address`         |
//! | `YELLOWNET_AUTO_APPROVE`    | `--auto-approve`    |
//!
//! # Architecture overview
//!
//! ```text
//! Handheld (serial console, /dev/ttyACM*)
//!       ↕  lines: "id.METHOD;resource|body", "msg <packet>"
//! yellownet-gateway  ← this process
//!   domain/          GatewayConfig, session state, console commands
//!   application/     dispatcher, relay session, Gateway controller, poll loop
//!   infrastructure/  serial link, WebSocket tunnel, prompt, config file
//!       ↕  WebSocket text frames, one packet each
//! YellowNet server
//! ```

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yellownet_gateway::application::{AddressApprover, Gateway};
use yellownet_gateway::domain::GatewayConfig;
use yellownet_gateway::infrastructure::{
    available_ports, load_config_file, AutoApprover, LogNotifier, PromptApprover,
    SerialPortLink, WsTunnelConnector,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// YellowNet serial-to-WebSocket gateway.
///
/// Every option is optional; unset options fall back to the configuration
/// file, then to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "yellownet-gateway",
    about = "Relay YellowNet packets between a serial handheld and a YellowNet server",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serial device node the handheld is attached to.
    #[arg(long, value_name = "PATH", env = "YELLOWNET_DEVICE")]
    device: Option<PathBuf>,

    /// Serial line speed in baud.
    #[arg(long, value_name = "BAUD", env = "YELLOWNET_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// How long one serial read waits for complete lines, in milliseconds.
    ///
    /// Inbound server messages are handled between reads, so this is also
    /// their worst-case delivery delay.
    #[arg(long, value_name = "MS", env = "YELLOWNET_POLL_TIMEOUT_MS")]
    poll_timeout_ms: Option<u64>,

    /// Server address to connect to at startup, without asking.
    #[arg(long, value_name = "ADDR", env = "YELLOWNET_ADDRESS")]
    address: Option<String>,

    /// Accept every address the device asks for without prompting.
    #[arg(long, env = "YELLOWNET_AUTO_APPROVE")]
    auto_approve: bool,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

impl Cli {
    /// Merges defaults, the configuration file and the CLI flags into a
    /// [`GatewayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// resulting poll timeout or baud rate is zero.
    fn into_gateway_config(self) -> anyhow::Result<GatewayConfig> {
        let mut config = GatewayConfig::default();

        if let Some(path) = &self.config {
            let file = load_config_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            file.apply_to(&mut config);
        }

        if let Some(device) = self.device {
            config.device_path = device;
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(address) = self.address {
            config.initial_address = Some(address);
        }
        if self.auto_approve {
            config.auto_approve = true;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        anyhow::ensure!(
            !config.poll_timeout.is_zero(),
            "poll timeout must be at least 1 ms"
        );
        anyhow::ensure!(config.baud_rate > 0, "baud rate must be positive");
        Ok(config)
    }
}

/// Error context for a device that cannot be opened, naming the serial
/// ports that do exist.
fn device_hint(path: &Path) -> String {
    let found = available_ports();
    if found.is_empty() {
        format!(
            "cannot open serial device {}; is the handheld plugged in?",
            path.display()
        )
    } else {
        format!(
            "cannot open serial device {}; available: {}",
            path.display(),
            found.join(", ")
        )
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// The gateway is strictly sequential, so it runs on Tokio's single-threaded
/// runtime.  Tunnel tasks and the Ctrl+C listener share that thread with the
/// poll loop and get their turn whenever it yields.
///
/// # What happens at startup
///
/// 1. CLI arguments and the optional configuration file are merged into a
///    [`GatewayConfig`].
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` overrides the
///    configured log level.
/// 3. A Ctrl+C handler is spawned that clears the shared running flag.
/// 4. The serial device is opened and the handshake is sent.
/// 5. The configured startup address, if any, is connected.
/// 6. The poll loop runs until Ctrl+C.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_gateway_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "YellowNet gateway starting — device={} at {} baud, poll timeout={:?}",
        config.device_path.display(),
        config.baud_rate,
        config.poll_timeout
    );

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — shutting down");
                running_clone.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Collaborators ─────────────────────────────────────────────────────────
    let approver: Arc<dyn AddressApprover> = if config.auto_approve {
        Arc::new(AutoApprover)
    } else {
        Arc::new(PromptApprover::stdio())
    };
    let mut gateway = Gateway::new(
        Arc::new(WsTunnelConnector::new()),
        approver,
        Arc::new(LogNotifier),
    );

    // ── Device ────────────────────────────────────────────────────────────────
    let link = SerialPortLink::new(&config.device_path, config.baud_rate, config.poll_timeout);
    gateway
        .attach_device(Box::new(link))
        .await
        .with_context(|| device_hint(&config.device_path))?;
    gateway.set_idle_wait(config.poll_timeout);

    if let Some(address) = &config.initial_address {
        gateway.connect(address);
    }

    // ── Poll loop ─────────────────────────────────────────────────────────────
    gateway.run(running).await;

    info!("YellowNet gateway stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
