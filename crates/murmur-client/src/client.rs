//! Resilient relay client: send a line, survive broken connections.

use std::io;

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf,
    WriteHalf,
};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use murmur_core::constants::SEND_ATTEMPTS;

/// Terminal failure of a send.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Every attempt failed; the line was dropped, not queued.
    #[error("line abandoned after {attempts} attempts")]
    Abandoned {
        /// How many attempts were made, first try included.
        attempts: u32,
    },
}

/// Produces fresh connections to the relay.
///
/// The trait seam lets tests script a sequence of good and broken
/// connections; production dials TCP.
#[async_trait]
pub trait Dialer: Send {
    /// Connection type this dialer produces.
    type Conn: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a fresh connection.
    async fn dial(&mut self) -> io::Result<Self::Conn>;
}

/// Dials the relay's session listener over TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    addr: String,
}

impl TcpDialer {
    /// Dialer for the session listener at `addr`.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    type Conn = TcpStream;

    async fn dial(&mut self) -> io::Result<Self::Conn> {
        TcpStream::connect(&self.addr).await
    }
}

/// A connected writer session over whatever the dialer produces.
pub struct RelayClient<D: Dialer> {
    dialer: D,
    reader: BufReader<ReadHalf<D::Conn>>,
    writer: BufWriter<WriteHalf<D::Conn>>,
}

impl<D: Dialer> RelayClient<D> {
    /// Dial once and wrap the connection.
    pub async fn connect(mut dialer: D) -> io::Result<Self> {
        let conn = dialer.dial().await?;
        let (read_half, write_half) = tokio::io::split(conn);
        Ok(Self {
            dialer,
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        })
    }

    /// Replace the current connection with a fresh one.
    async fn reconnect(&mut self) -> io::Result<()> {
        let conn = self.dialer.dial().await?;
        let (read_half, write_half) = tokio::io::split(conn);
        self.reader = BufReader::new(read_half);
        self.writer = BufWriter::new(write_half);
        Ok(())
    }

    /// Write one framed line on the current connection.
    async fn send(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Send `line`, re-dialing between attempts.
    ///
    /// At most one copy of the line ever reaches the relay: a new attempt
    /// starts only after the previous one failed to write. Returns the
    /// number of reconnects it took; the line is abandoned, never queued,
    /// once the attempt budget runs out.
    pub async fn send_with_retry(&mut self, line: &str) -> Result<u32, SendError> {
        let mut reconnects = 0;
        for attempt in 1..=SEND_ATTEMPTS {
            if attempt > 1 {
                if let Err(error) = self.reconnect().await {
                    warn!(%error, attempt, "reconnect failed");
                    continue;
                }
                reconnects += 1;
            }
            match self.send(line).await {
                Ok(()) => {
                    debug!(attempt, reconnects, "line sent");
                    return Ok(reconnects);
                }
                Err(error) => {
                    warn!(%error, attempt, "send failed");
                }
            }
        }
        Err(SendError::Abandoned {
            attempts: SEND_ATTEMPTS,
        })
    }

    /// Read the next non-blank reply line, trimmed.
    ///
    /// Blank lines are tolerated and skipped; `None` means the relay
    /// closed the connection.
    pub async fn recv_reply(&mut self) -> io::Result<Option<String>> {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_owned()));
        }
    }
}
