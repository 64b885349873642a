//! Per-transaction log buffering.
//!
//! Lines produced while one query is in flight are buffered and emitted as a
//! single contiguous block when the transaction closes, so the diagnostics
//! of concurrent queries never interleave in the sink.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use tracing::{error, info, warn};

/// Severity of one buffered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// Token identifying one in-flight transaction's buffer.
///
/// Two clients can legitimately reuse the same 16-bit wire ID at the same
/// time, so the wire ID cannot key the buffer; a fresh token is handed out
/// per `open` and the wire ID only tags the flushed lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

struct Entry {
    message: String,
    level: Level,
}

struct Buffer {
    wire_id: u16,
    entries: Vec<Entry>,
}

/// Buffered per-transaction logger in front of the `tracing` sink.
pub struct TransactionLog {
    next_token: AtomicU64,
    buffers: Mutex<FxHashMap<u64, Buffer>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            next_token: AtomicU64::new(0),
            buffers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Open the buffer for one transaction with a synthetic "started" entry.
    pub fn open(&self, wire_id: u16) -> Token {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));

        let Ok(mut buffers) = self.buffers.lock() else {
            return token;
        };
        buffers.insert(
            token.0,
            Buffer {
                wire_id,
                entries: vec![Entry {
                    message: "transaction started".to_string(),
                    level: Level::Info,
                }],
            },
        );

        token
    }

    /// Append one entry to an open transaction. Ignored after `close`.
    pub fn append(&self, token: Token, message: impl Into<String>, level: Level) {
        let Ok(mut buffers) = self.buffers.lock() else {
            return;
        };
        if let Some(buffer) = buffers.get_mut(&token.0) {
            buffer.entries.push(Entry {
                message: message.into(),
                level,
            });
        }
    }

    /// Append a synthetic "finished" entry, emit the whole buffer in
    /// insertion order, and discard it.
    pub fn close(&self, token: Token) {
        let Ok(mut buffers) = self.buffers.lock() else {
            return;
        };
        let Some(mut buffer) = buffers.remove(&token.0) else {
            return;
        };
        buffer.entries.push(Entry {
            message: "transaction finished".to_string(),
            level: Level::Info,
        });

        // Emission happens under the lock: each transaction's block stays
        // contiguous in the sink.
        for entry in &buffer.entries {
            match entry.level {
                Level::Info => info!(id = buffer.wire_id, "{}", entry.message),
                Level::Warning => warn!(id = buffer.wire_id, "{}", entry.message),
                Level::Error => error!(id = buffer.wire_id, "{}", entry.message),
            }
        }
    }

    /// Number of transactions currently buffered.
    pub fn pending(&self) -> usize {
        self.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_assigns_distinct_tokens_for_the_same_wire_id() {
        let log = TransactionLog::new();

        let a = log.open(0x1234);
        let b = log.open(0x1234);

        assert_ne!(a, b);
        assert_eq!(log.pending(), 2);
    }

    #[test]
    fn close_flushes_and_drops_the_buffer() {
        let log = TransactionLog::new();

        let token = log.open(7);
        log.append(token, "forwarding upstream", Level::Info);
        log.close(token);

        assert_eq!(log.pending(), 0);
    }

    #[test]
    fn append_after_close_is_ignored() {
        let log = TransactionLog::new();

        let token = log.open(7);
        log.close(token);
        log.append(token, "late entry", Level::Warning);

        assert_eq!(log.pending(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let log = TransactionLog::new();

        let token = log.open(7);
        log.close(token);
        log.close(token);

        assert_eq!(log.pending(), 0);
    }

    #[test]
    fn closing_one_transaction_leaves_others_buffered() {
        let log = TransactionLog::new();

        let a = log.open(1);
        let b = log.open(2);
        log.append(b, "still in flight", Level::Info);
        log.close(a);

        assert_eq!(log.pending(), 1);
        log.close(b);
        assert_eq!(log.pending(), 0);
    }
}
