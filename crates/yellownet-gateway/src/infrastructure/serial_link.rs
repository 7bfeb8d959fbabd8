//! Serial console links.
//!
//! The handheld exposes its console as a serial port (a CDC-ACM node such as
//! `/dev/ttyACM0`, or a UART on its debug header).  [`SerialPortLink`] drives
//! a real port through the `serialport` crate; [`StreamSerialLink`] speaks the
//! same line protocol over any pair of async byte streams (pipes, sockets,
//! in-memory duplexes).
//!
//! # Line framing
//!
//! A serial read may return part of a line, or several lines at once.  Bytes
//! are accumulated in a buffer and split on `\n`; a trailing `\r` is
//! stripped.  Incomplete tails stay buffered for the next read.

use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{spawn_blocking, JoinError};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, trace, warn};

use crate::application::ports::{LinkError, SerialLink};

/// Size of each individual read from the device.
const READ_CHUNK: usize = 1024;

/// Replaces every non-ASCII character with `?`.
pub fn to_ascii_lossy(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

// ── Line framing ──────────────────────────────────────────────────────────────

/// Accumulates raw bytes and hands out complete lines.
#[derive(Debug, Default)]
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Moves every complete line out of the buffer.
    fn take_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.bytes.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.bytes.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

// ── Generic stream link ───────────────────────────────────────────────────────

/// A [`SerialLink`] over any pair of async byte streams.
pub struct StreamSerialLink<R, W> {
    reader: R,
    writer: W,
    read_timeout: Duration,
    lines: LineBuffer,
    open: bool,
}

impl<R, W> StreamSerialLink<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps already-connected streams.  The link starts closed; call
    /// [`SerialLink::open`] before use.
    pub fn new(reader: R, writer: W, read_timeout: Duration) -> Self {
        Self {
            reader,
            writer,
            read_timeout,
            lines: LineBuffer::default(),
            open: false,
        }
    }
}

#[async_trait]
impl<R, W> SerialLink for StreamSerialLink<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn open(&mut self) -> Result<(), LinkError> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_busy(&self) -> bool {
        // Writes complete before `write_ascii` returns.
        false
    }

    async fn write_ascii(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.open {
            return Err(LinkError::Closed);
        }
        let ascii = to_ascii_lossy(line);
        trace!("serial tx: {:?}", ascii);
        self.writer.write_all(ascii.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_lines_until_timeout(&mut self) -> Result<Vec<String>, LinkError> {
        if !self.open {
            return Err(LinkError::Closed);
        }

        let buffered = self.lines.take_lines();
        if !buffered.is_empty() {
            return Ok(buffered);
        }

        let deadline = Instant::now() + self.read_timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = match timeout_at(deadline, self.reader.read(&mut chunk)).await {
                Err(_) => return Ok(Vec::new()),
                Ok(Ok(0)) => {
                    debug!("serial stream ended");
                    self.open = false;
                    return Err(LinkError::Closed);
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(LinkError::Io(e)),
            };
            self.lines.push(&chunk[..n]);

            let lines = self.lines.take_lines();
            if !lines.is_empty() {
                trace!("serial rx: {} line(s)", lines.len());
                return Ok(lines);
            }
        }
    }
}

// ── Serial port link ──────────────────────────────────────────────────────────

/// A [`SerialLink`] on a real serial port.
///
/// The port is opened raw at the configured baud rate.  Every blocking read
/// carries the port's own timeout, bounded by the poll deadline, and runs on
/// Tokio's blocking pool; a read therefore never outlives its poll step by
/// more than that timeout, which also bounds shutdown.  Reads and writes use
/// separate handles to the same port.
pub struct SerialPortLink {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
    reader: Option<Box<dyn SerialPort>>,
    writer: Option<Box<dyn SerialPort>>,
    lines: LineBuffer,
    open: bool,
}

impl SerialPortLink {
    /// A link to the port at `path`.  Nothing is opened until
    /// [`SerialLink::open`].
    pub fn new(path: &Path, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.display().to_string(),
            baud_rate,
            read_timeout,
            reader: None,
            writer: None,
            lines: LineBuffer::default(),
            open: false,
        }
    }

    /// Wraps a port that is already open.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Io`] if the port cannot be cloned into a
    /// separate write handle.
    pub fn from_port(port: Box<dyn SerialPort>, read_timeout: Duration) -> Result<Self, LinkError> {
        let path = port.name().unwrap_or_else(|| "<serial port>".to_string());
        let baud_rate = port.baud_rate().unwrap_or_default();
        let mut link = Self {
            path,
            baud_rate,
            read_timeout,
            reader: None,
            writer: None,
            lines: LineBuffer::default(),
            open: false,
        };
        link.attach(port)?;
        Ok(link)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn attach(&mut self, port: Box<dyn SerialPort>) -> Result<(), LinkError> {
        let writer = port.try_clone().map_err(io::Error::from)?;
        self.reader = Some(port);
        self.writer = Some(writer);
        self.open = true;
        Ok(())
    }

    fn mark_closed(&mut self) {
        self.open = false;
        self.reader = None;
        self.writer = None;
    }

    fn lost(&mut self, e: JoinError) -> LinkError {
        warn!("serial I/O task on {} failed: {e}", self.path);
        self.mark_closed();
        LinkError::Io(io::Error::other(e))
    }
}

#[async_trait]
impl SerialLink for SerialPortLink {
    async fn open(&mut self) -> Result<(), LinkError> {
        if self.open {
            return Ok(());
        }
        let path = self.path.clone();
        let baud_rate = self.baud_rate;
        let read_timeout = self.read_timeout;
        let opened = spawn_blocking(move || {
            serialport::new(path, baud_rate)
                .timeout(read_timeout)
                .open()
        })
        .await;

        let port = match opened {
            Ok(Ok(port)) => port,
            Ok(Err(e)) => {
                return Err(LinkError::OpenFailed {
                    path: self.path.clone(),
                    source: e.into(),
                })
            }
            Err(e) => return Err(self.lost(e)),
        };
        self.attach(port)?;
        debug!("opened serial port {} at {} baud", self.path, self.baud_rate);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_busy(&self) -> bool {
        // Writes complete before `write_ascii` returns.
        false
    }

    async fn write_ascii(&mut self, line: &str) -> Result<(), LinkError> {
        if !self.open {
            return Err(LinkError::Closed);
        }
        let Some(mut port) = self.writer.take() else {
            return Err(LinkError::Closed);
        };
        let bytes = to_ascii_lossy(line).into_bytes();
        trace!("serial tx: {} byte(s)", bytes.len());

        let joined = spawn_blocking(move || {
            let result = port.write_all(&bytes).and_then(|()| port.flush());
            (port, result)
        })
        .await;

        match joined {
            Ok((port, result)) => {
                self.writer = Some(port);
                result.map_err(LinkError::Io)
            }
            Err(e) => Err(self.lost(e)),
        }
    }

    async fn read_lines_until_timeout(&mut self) -> Result<Vec<String>, LinkError> {
        if !self.open {
            return Err(LinkError::Closed);
        }

        let buffered = self.lines.take_lines();
        if !buffered.is_empty() {
            return Ok(buffered);
        }

        let deadline = Instant::now() + self.read_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            let Some(mut port) = self.reader.take() else {
                return Err(LinkError::Closed);
            };

            let joined = spawn_blocking(move || {
                let mut chunk = vec![0u8; READ_CHUNK];
                let result = port
                    .set_timeout(remaining)
                    .map_err(io::Error::from)
                    .and_then(|()| port.read(&mut chunk))
                    .map(|n| {
                        chunk.truncate(n);
                        chunk
                    });
                (port, result)
            })
            .await;

            let (port, result) = match joined {
                Ok(done) => done,
                Err(e) => return Err(self.lost(e)),
            };
            self.reader = Some(port);

            match result {
                Ok(chunk) if chunk.is_empty() => {
                    debug!("serial port {} hung up", self.path);
                    self.mark_closed();
                    return Err(LinkError::Closed);
                }
                Ok(chunk) => {
                    self.lines.push(&chunk);
                    let lines = self.lines.take_lines();
                    if !lines.is_empty() {
                        trace!("serial rx: {} line(s)", lines.len());
                        return Ok(lines);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(Vec::new()),
                Err(e) => {
                    debug!("serial port {} read failed: {e}", self.path);
                    self.mark_closed();
                    return Err(LinkError::Io(e));
                }
            }
        }
    }
}

/// Names of the serial ports present on this machine, sorted.
///
/// Used to suggest a `--device` value when the configured one is missing.
/// Enumeration failures yield an empty list.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => {
            let mut names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
            names.sort();
            names
        }
        Err(e) => {
            debug!("cannot enumerate serial ports: {e}");
            Vec::new()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
