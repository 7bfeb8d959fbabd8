//! The cooperative poll loop.
//!
//! One step reads whatever the device printed (bounded by the link's read
//! timeout), dispatches each line in arrival order and then handles the
//! tunnel events that queued up meanwhile.  Steps repeat until the running
//! flag is cleared.  After a step that read from the device the task just
//! yields so the tunnel tasks get to run; after a step that could not read
//! (no device, closed link, failed read) it sleeps on the tunnel channel for
//! up to the idle wait instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::application::gateway::Gateway;
use crate::application::ports::LinkError;

/// What one poll step did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Non-empty serial lines read and dispatched.
    pub lines: usize,
    /// Tunnel events handled.
    pub events: usize,
    /// No serial read was performed, or it failed; the read did not block.
    pub idle: bool,
}

impl Gateway {
    /// Runs one poll step.
    ///
    /// Without an open device only the tunnel events are handled.  A device
    /// that disappears mid-read is detached; nothing reopens it.
    pub async fn poll_step(&mut self) -> PollReport {
        let (mut lines, idle) = match self.read_device().await {
            Some(lines) => (lines, false),
            None => (Vec::new(), true),
        };
        // Blank lines are console noise (prompts, CRLF echoes).
        lines.retain(|line| !line.is_empty());
        for line in &lines {
            self.handle_line(line).await;
        }
        let events = self.drain_tunnel_events().await;
        PollReport {
            lines: lines.len(),
            events,
            idle,
        }
    }

    /// `None` when no read could be performed.
    async fn read_device(&mut self) -> Option<Vec<String>> {
        let link = self.link_mut()?;
        if !link.is_open() {
            return None;
        }
        match link.read_lines_until_timeout().await {
            Ok(lines) => Some(lines),
            Err(LinkError::Closed) => {
                warn!("device disconnected");
                self.detach_device();
                None
            }
            Err(e) => {
                warn!("serial read failed: {e}");
                None
            }
        }
    }

    /// Polls until `running` is cleared, then closes the tunnel.
    ///
    /// Returns the number of poll steps taken.
    pub async fn run(&mut self, running: Arc<AtomicBool>) -> u64 {
        info!("poll loop started");
        let mut steps = 0u64;
        while running.load(Ordering::SeqCst) {
            let report = self.poll_step().await;
            steps += 1;
            if report.lines > 0 || report.events > 0 {
                debug!(
                    "poll step: {} line(s), {} event(s)",
                    report.lines, report.events
                );
            }
            if report.idle {
                let wait = self.idle_wait();
                self.idle_step(wait).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
        self.shutdown();
        info!("poll loop stopped after {steps} step(s)");
        steps
    }

    async fn idle_step(&mut self, wait: Duration) {
        if self.wait_for_tunnel_event(wait).await {
            self.drain_tunnel_events().await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
