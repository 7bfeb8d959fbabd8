//! Terminal-facing user interaction: address approval and alerts.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::application::ports::{AddressApprover, Notifier};

/// Builds the approval question shown for `address`.
pub fn approval_question(address: &str) -> String {
    format!("Allow the device to connect to {address}? [y/N] ")
}

/// Returns `true` for an affirmative answer (`y` / `yes`, any case).
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// ── Interactive prompt ────────────────────────────────────────────────────────

struct PromptIo<R, W> {
    input: BufReader<R>,
    output: W,
}

/// Asks on a terminal before letting the device choose a server.
///
/// Anything but an explicit yes, including end of input, declines.
pub struct PromptApprover<R, W> {
    io: Mutex<PromptIo<R, W>>,
}

impl<R, W> PromptApprover<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Mutex::new(PromptIo {
                input: BufReader::new(input),
                output,
            }),
        }
    }
}

impl PromptApprover<Stdin, Stdout> {
    /// A prompt on the process's own terminal.
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> AddressApprover for PromptApprover<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn approve(&self, address: &str) -> bool {
        let mut io = self.io.lock().await;

        let question = approval_question(address);
        if let Err(e) = io.output.write_all(question.as_bytes()).await {
            warn!("cannot show approval prompt: {e}");
            return false;
        }
        let _ = io.output.flush().await;

        let mut answer = String::new();
        let approved = match io.input.read_line(&mut answer).await {
            Ok(0) => false,
            Ok(_) => is_affirmative(&answer),
            Err(e) => {
                warn!("cannot read approval answer: {e}");
                false
            }
        };
        info!(
            "connection to {address} {}",
            if approved { "approved" } else { "declined" }
        );
        approved
    }
}

/// Approves every address without asking (`--auto-approve`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprover;

#[async_trait]
impl AddressApprover for AutoApprover {
    async fn approve(&self, address: &str) -> bool {
        info!("auto-approving connection to {address}");
        true
    }
}

// ── Alerts ────────────────────────────────────────────────────────────────────

/// Logs alerts and repeats them on stderr so they show even with logging
/// filtered off.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        error!("{message}");
        eprintln!("{message}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
