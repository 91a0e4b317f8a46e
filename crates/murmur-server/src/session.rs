//! Per-connection session handling: read a line, moderate it, publish it,
//! answer the sender.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use murmur_broadcast::Broadcaster;
use murmur_core::constants::EVENT_FRAME;
use murmur_core::text::{display_name, sanitize_line};
use murmur_moderation::{ModerationPipeline, Notifier};

use crate::transport::{SessionListener, SessionStream};

/// Everything a session needs, cloned once per connection.
#[derive(Debug, Clone)]
pub struct SessionDeps {
    /// Fan-out target for accepted lines.
    pub broadcaster: Broadcaster<String>,
    /// Moderation gates applied to every line.
    pub pipeline: Arc<ModerationPipeline>,
    /// Operator notice sink.
    pub notifier: Notifier,
    /// Per-read silence budget before the session is closed.
    pub idle_timeout: Duration,
    /// Line-length cap; longer input is split at the cap.
    pub max_line_bytes: usize,
}

/// Accept sessions forever, one task per connection.
///
/// Accept errors are transient on most platforms (fd exhaustion, aborted
/// handshakes), so they are logged and the loop keeps going.
pub async fn serve<L: SessionListener>(mut listener: L, deps: SessionDeps) {
    loop {
        match listener.accept().await {
            Ok(stream) => {
                let deps = deps.clone();
                let _ = tokio::spawn(async move {
                    handle_session(stream, deps).await;
                });
            }
            Err(error) => {
                warn!(%error, "session accept failed");
            }
        }
    }
}

/// What one capped, timed read produced.
enum ReadEvent {
    /// A complete line, framing newline included (synthesized when the
    /// cap split the input or the peer closed mid-line).
    Line(String),
    /// Clean end of stream.
    Eof,
    /// The peer stayed silent past the idle budget.
    Idle,
}

/// Run one session to completion.
pub async fn handle_session<S: SessionStream>(stream: S, deps: SessionDeps) {
    let peer = stream.peer_identifier();
    let sender = display_name(peer.as_str()).to_owned();
    info!(%peer, "session opened");

    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);

    loop {
        let line = match read_line(&mut reader, deps.max_line_bytes, deps.idle_timeout).await {
            Ok(ReadEvent::Line(line)) => line,
            Ok(ReadEvent::Eof) => {
                debug!(%peer, "peer closed the session");
                break;
            }
            Ok(ReadEvent::Idle) => {
                info!(%peer, "session idle, closing");
                break;
            }
            Err(error) => {
                warn!(%peer, %error, "session read failed");
                break;
            }
        };

        let trimmed = line.trim();
        let outcome = deps.pipeline.moderate(&sender, trimmed).await;
        debug!(%peer, relay = outcome.relay, "line moderated");

        if outcome.relay {
            deps.broadcaster.publish(EVENT_FRAME.to_owned()).await;
            deps.broadcaster
                .publish(format!("data: {}:{}\n\n", sender, sanitize_line(trimmed)))
                .await;
        }

        // Notices ride their own task; replies never wait on the sink.
        let notifier = deps.notifier.clone();
        let notice = outcome.notice;
        let _ = tokio::spawn(async move {
            notifier.send(notice).await;
        });

        if let Err(error) = write_reply(&mut writer, &outcome.reply).await {
            warn!(%peer, %error, "session write failed");
            break;
        }
    }

    info!(%peer, "session closed");
}

async fn write_reply<W: AsyncWriteExt + Unpin>(writer: &mut W, reply: &str) -> io::Result<()> {
    writer.write_all(reply.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Read one newline-terminated line, giving up after `idle`.
///
/// The read is capped at `max_bytes`; input longer than the cap comes
/// back as multiple lines, each with a synthesized newline. A timeout
/// discards any partial read, which is acceptable because the session is
/// closed immediately afterwards.
async fn read_line<R>(reader: &mut R, max_bytes: usize, idle: Duration) -> io::Result<ReadEvent>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(128);
    let mut capped = (&mut *reader).take(max_bytes as u64);
    match timeout(idle, capped.read_until(b'\n', &mut buf)).await {
        Err(_elapsed) => Ok(ReadEvent::Idle),
        Ok(Ok(0)) => Ok(ReadEvent::Eof),
        Ok(Ok(_n)) => {
            if !buf.ends_with(b"\n") {
                buf.push(b'\n');
            }
            Ok(ReadEvent::Line(String::from_utf8_lossy(&buf).into_owned()))
        }
        Ok(Err(error)) => Err(error),
    }
}
