//! Listener and stream abstractions for the session surface.
//!
//! Sessions are transport-agnostic: anything that is a bidirectional byte
//! stream with a printable peer identity can carry one. Production binds
//! TCP; tests drive sessions over in-memory duplex pipes.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use murmur_core::ids::PeerId;

/// A bidirectional byte stream carrying one session.
pub trait SessionStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Stable printable identity for the peer, used as the sender name
    /// on relayed frames and in logs.
    fn peer_identifier(&self) -> PeerId;
}

/// Accepts session streams one at a time.
#[async_trait]
pub trait SessionListener: Send {
    /// Stream type produced by this listener.
    type Stream: SessionStream;

    /// Wait for the next inbound session.
    async fn accept(&mut self) -> io::Result<Self::Stream>;
}

/// TCP listener for the session surface.
#[derive(Debug)]
pub struct TcpSessionListener {
    inner: TcpListener,
}

impl TcpSessionListener {
    /// Bind the session listener on `addr`.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    /// The bound local address, useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }
}

#[async_trait]
impl SessionListener for TcpSessionListener {
    type Stream = TcpSessionStream;

    async fn accept(&mut self) -> io::Result<Self::Stream> {
        let (stream, addr) = self.inner.accept().await?;
        Ok(TcpSessionStream {
            inner: stream,
            peer: PeerId::from(addr.to_string()),
        })
    }
}

/// One accepted TCP session.
#[derive(Debug)]
pub struct TcpSessionStream {
    inner: TcpStream,
    peer: PeerId,
}

impl SessionStream for TcpSessionStream {
    fn peer_identifier(&self) -> PeerId {
        self.peer.clone()
    }
}

impl AsyncRead for TcpSessionStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpSessionStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
