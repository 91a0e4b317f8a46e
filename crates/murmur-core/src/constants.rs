//! Protocol limits and wire-format constants shared across the workspace.

/// Maximum bytes read for a single session line before the framing newline
/// is synthesized.
pub const MAX_LINE_BYTES: usize = 1024;

/// Idle-read timeout per session read, in seconds. A session that stays
/// silent longer than this is closed.
pub const IDLE_READ_TIMEOUT_SECS: u64 = 60;

/// Capacity of each subscriber inbox. Publishing into a full inbox blocks
/// the broadcaster worker (backpressure, never dropped).
pub const INBOX_CAPACITY: usize = 16;

/// Capacity of the broadcaster action queue.
pub const ACTION_QUEUE_CAPACITY: usize = 16;

/// Total attempts (first try included) for a client line send before the
/// line is abandoned.
pub const SEND_ATTEMPTS: u32 = 3;

/// Length of the random token used for stream subscriber identifiers.
pub const SUBSCRIBER_TOKEN_LEN: usize = 10;

/// Classifier label that causes a line to be rejected.
pub const OFFENSIVE_LABEL: &str = "Offensive";

/// The push-stream event marker frame, published ahead of every data frame.
pub const EVENT_FRAME: &str = "event: notify\n";
