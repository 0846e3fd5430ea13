//! Byte transport to the inverter bus.
//!
//! Two variants behind one interface: a local serial device (direct
//! RS-232) or a TCP socket to a serial-to-Ethernet bridge. The bus is a
//! half-duplex shared medium at 1200 baud, so reads are bounded by a
//! long first-byte deadline and a short between-bytes quiet window
//! rather than by any length prefix.

use crate::datalog_writer::{DatalogWriter, Direction};
use crate::error::SwrError;
use crate::prelude::*;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream, StopBits};

/// No bytes at all for this long means the bus is not answering.
pub const TIMEOUT_LONG: Duration = Duration::from_secs(5);
/// Silence this long after at least one byte ends the read.
pub const TIMEOUT_SHORT: Duration = Duration::from_millis(500);

const BAUD_RATE: u32 = 1200;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_CHUNK: usize = 256;

/// Where the bus is reached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port` of a serial-to-Ethernet bridge.
    Tcp(String),
    /// Path of a local serial device.
    Serial(String),
}

impl Endpoint {
    pub fn parse(s: &str) -> Self {
        if s.contains(':') {
            Endpoint::Tcp(s.to_string())
        } else {
            Endpoint::Serial(s.to_string())
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{}", addr),
            Endpoint::Serial(path) => write!(f, "{}", path),
        }
    }
}

enum Stream {
    Tcp(TcpStream),
    Serial(SerialStream),
}

pub struct Transport {
    endpoint: Endpoint,
    stream: Option<Stream>,
    datalog: Option<DatalogWriter>,
}

impl Transport {
    pub fn new(endpoint: Endpoint, datalog: Option<DatalogWriter>) -> Self {
        Self {
            endpoint,
            stream: None,
            datalog,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Acquires the endpoint. A no-op when already open.
    pub async fn open(&mut self) -> Result<(), SwrError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = match &self.endpoint {
            Endpoint::Tcp(addr) => {
                debug!("connecting to {}", addr);
                let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr.as_str()))
                    .await
                    .map_err(|_| {
                        SwrError::TransportUnavailable(format!(
                            "{}: connect timed out after {:?}",
                            addr, CONNECT_TIMEOUT
                        ))
                    })?
                    .map_err(|e| SwrError::TransportUnavailable(format!("{}: {}", addr, e)))?;
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("failed to set TCP_NODELAY: {}", e);
                }
                Stream::Tcp(stream)
            }
            Endpoint::Serial(path) => {
                debug!("opening {} at {} baud 8-N-1", path, BAUD_RATE);
                let mut port = tokio_serial::new(path, BAUD_RATE)
                    .data_bits(DataBits::Eight)
                    .stop_bits(StopBits::One)
                    .parity(Parity::None)
                    .flow_control(FlowControl::None)
                    .open_native_async()
                    .map_err(|e| SwrError::TransportUnavailable(format!("{}: {}", path, e)))?;
                // no modem-control signals on the inverter side
                if let Err(e) = port.write_data_terminal_ready(false) {
                    debug!("could not drop DTR on {}: {}", path, e);
                }
                if let Err(e) = port.write_request_to_send(false) {
                    debug!("could not drop RTS on {}: {}", path, e);
                }
                Stream::Serial(port)
            }
        };

        info!("transport {} open", self.endpoint);
        self.stream = Some(stream);
        Ok(())
    }

    /// Writes all bytes and flushes; a partial write is an error.
    ///
    /// A failed write detaches the stream so the scheduler re-opens it
    /// before the next cycle.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), SwrError> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| SwrError::TransportIo("transport is closed".into()))?;

        let result = match &mut stream {
            Stream::Tcp(s) => async {
                s.write_all(bytes).await?;
                s.flush().await
            }
            .await,
            Stream::Serial(s) => async {
                s.write_all(bytes).await?;
                s.flush().await
            }
            .await,
        };
        result.map_err(|e| SwrError::TransportIo(e.to_string()))?;
        self.stream = Some(stream);

        if let Some(datalog) = &self.datalog {
            if let Err(e) = datalog.write(Direction::To, bytes) {
                warn!("frame log write failed: {}", e);
            }
        }
        trace!("wrote {} bytes", bytes.len());
        Ok(())
    }

    /// Reads until the link has been silent for `quiet_short` after at
    /// least one byte arrived, or until `deadline_long` elapses with no
    /// bytes at all. An empty result signals a hard timeout.
    pub async fn read_until_quiet(
        &mut self,
        deadline_long: Duration,
        quiet_short: Duration,
    ) -> Result<Vec<u8>, SwrError> {
        let mut stream = self
            .stream
            .take()
            .ok_or_else(|| SwrError::TransportIo("transport is closed".into()))?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let wait = if buf.is_empty() { deadline_long } else { quiet_short };
            let read = match &mut stream {
                Stream::Tcp(s) => timeout(wait, s.read(&mut chunk)).await,
                Stream::Serial(s) => timeout(wait, s.read(&mut chunk)).await,
            };
            match read {
                Ok(Ok(0)) => {
                    return Err(SwrError::TransportIo("connection closed by peer".into()));
                }
                Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    return Err(SwrError::TransportIo(e.to_string()));
                }
                Err(_) => break,
            }
        }
        self.stream = Some(stream);

        if !buf.is_empty() {
            if let Some(datalog) = &self.datalog {
                if let Err(e) = datalog.write(Direction::From, &buf) {
                    warn!("frame log write failed: {}", e);
                }
            }
        }
        trace!("read {} bytes", buf.len());
        Ok(buf)
    }

    /// Releases the endpoint. Idempotent.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            info!("transport {} closed", self.endpoint);
        }
    }
}
