//! Recording test doubles for the collaborator ports.
//!
//! Allow unit and integration tests to drive the gateway without a serial
//! device, a network, or a terminal.  Every double is a cheap `Clone` over
//! shared state, so a test can hand one copy to the gateway and keep another
//! to inspect what happened.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use super::ports::{
    AddressApprover, LinkError, Notifier, SerialLink, TunnelConnector, TunnelHandle,
};
use crate::domain::{TunnelEvent, TunnelEventKind};

// ── Serial link ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LinkState {
    open: bool,
    busy: bool,
    fail_open: bool,
    open_calls: u32,
    reads: VecDeque<Result<Vec<String>, ()>>,
    written: Vec<String>,
}

/// A scripted [`SerialLink`].
///
/// Queue read batches with [`push_lines`](Self::push_lines); each
/// `read_lines_until_timeout` call returns the next batch, or nothing.
#[derive(Debug, Clone, Default)]
pub struct MockSerialLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockSerialLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `open()` fail.
    pub fn fail_open(&self) {
        self.state.lock().expect("lock poisoned").fail_open = true;
    }

    /// Queues one read batch.
    pub fn push_lines(&self, lines: &[&str]) {
        let batch = lines.iter().map(|l| l.to_string()).collect();
        self.state
            .lock()
            .expect("lock poisoned")
            .reads
            .push_back(Ok(batch));
    }

    /// Queues a read that fails because the device went away.
    pub fn push_disconnect(&self) {
        self.state
            .lock()
            .expect("lock poisoned")
            .reads
            .push_back(Err(()));
    }

    pub fn set_busy(&self, busy: bool) {
        self.state.lock().expect("lock poisoned").busy = busy;
    }

    pub fn set_open(&self, open: bool) {
        self.state.lock().expect("lock poisoned").open = open;
    }

    /// Every line written so far, in order.
    pub fn written(&self) -> Vec<String> {
        self.state.lock().expect("lock poisoned").written.clone()
    }

    pub fn open_calls(&self) -> u32 {
        self.state.lock().expect("lock poisoned").open_calls
    }

    /// Number of queued read batches not yet consumed.
    pub fn pending_reads(&self) -> usize {
        self.state.lock().expect("lock poisoned").reads.len()
    }
}

#[async_trait]
impl SerialLink for MockSerialLink {
    async fn open(&mut self) -> Result<(), LinkError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.open_calls += 1;
        if state.fail_open {
            return Err(LinkError::Closed);
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().expect("lock poisoned").open
    }

    fn is_busy(&self) -> bool {
        self.state.lock().expect("lock poisoned").busy
    }

    async fn write_ascii(&mut self, line: &str) -> Result<(), LinkError> {
        let mut state = self.state.lock().expect("lock poisoned");
        if !state.open {
            return Err(LinkError::Closed);
        }
        state.written.push(line.to_string());
        Ok(())
    }

    async fn read_lines_until_timeout(&mut self) -> Result<Vec<String>, LinkError> {
        let mut state = self.state.lock().expect("lock poisoned");
        match state.reads.pop_front() {
            Some(Ok(lines)) => Ok(lines),
            Some(Err(())) => {
                state.open = false;
                Err(LinkError::Closed)
            }
            None => Ok(Vec::new()),
        }
    }
}

// ── Tunnel connector ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ConnectorLog {
    connects: Vec<(String, u64)>,
    sent: Vec<(u64, String)>,
    closed: Vec<u64>,
    senders: Vec<(u64, UnboundedSender<TunnelEvent>)>,
}

/// A [`TunnelConnector`] that records every call and lets the test play the
/// transport's part by emitting events.
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    log: Arc<Mutex<ConnectorLog>>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(address, generation)` of every connect, in order.
    pub fn connects(&self) -> Vec<(String, u64)> {
        self.log.lock().expect("lock poisoned").connects.clone()
    }

    /// `(generation, text)` of every message sent, in order.
    pub fn sent(&self) -> Vec<(u64, String)> {
        self.log.lock().expect("lock poisoned").sent.clone()
    }

    /// Generations of the tunnels that were closed, in order.
    pub fn closed(&self) -> Vec<u64> {
        self.log.lock().expect("lock poisoned").closed.clone()
    }

    /// Emits an event as if raised by the tunnel of `generation`.
    pub fn emit(&self, generation: u64, kind: TunnelEventKind) {
        let log = self.log.lock().expect("lock poisoned");
        if let Some((_, tx)) = log.senders.iter().find(|(g, _)| *g == generation) {
            let _ = tx.send(TunnelEvent::new(generation, kind));
        }
    }

    /// Emits an event from the most recently connected tunnel.
    pub fn emit_latest(&self, kind: TunnelEventKind) {
        let latest = self
            .log
            .lock()
            .expect("lock poisoned")
            .connects
            .last()
            .map(|(_, g)| *g);
        if let Some(generation) = latest {
            self.emit(generation, kind);
        }
    }
}

impl TunnelConnector for RecordingConnector {
    fn connect(
        &self,
        address: &str,
        generation: u64,
        events: UnboundedSender<TunnelEvent>,
    ) -> Box<dyn TunnelHandle> {
        let mut log = self.log.lock().expect("lock poisoned");
        log.connects.push((address.to_string(), generation));
        log.senders.push((generation, events));
        Box::new(RecordingHandle {
            generation,
            log: Arc::clone(&self.log),
        })
    }
}

struct RecordingHandle {
    generation: u64,
    log: Arc<Mutex<ConnectorLog>>,
}

impl TunnelHandle for RecordingHandle {
    fn send(&self, text: String) -> bool {
        self.log
            .lock()
            .expect("lock poisoned")
            .sent
            .push((self.generation, text));
        true
    }

    fn close(&mut self) {
        self.log
            .lock()
            .expect("lock poisoned")
            .closed
            .push(self.generation);
    }
}

// ── Approver ──────────────────────────────────────────────────────────────────

/// An [`AddressApprover`] with a fixed answer that records every request.
#[derive(Debug, Clone)]
pub struct RecordingApprover {
    answer: bool,
    requests: Arc<Mutex<Vec<String>>>,
}

impl RecordingApprover {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            requests: Arc::default(),
        }
    }

    /// Every address the user was asked about, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl AddressApprover for RecordingApprover {
    async fn approve(&self, address: &str) -> bool {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(address.to_string());
        self.answer
    }
}

// ── Notifier ──────────────────────────────────────────────────────────────────

/// A [`Notifier`] that keeps every alert.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().expect("lock poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .expect("lock poisoned")
            .push(message.to_string());
    }
}
