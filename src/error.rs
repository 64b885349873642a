//! Classified errors for relay transactions.
//!
//! Every fallible pipeline stage returns [`RelayError`], so the single
//! failure-handling branch can pick the outbound response shape from the
//! variant alone: `Refused` becomes a client-visible REFUSED response,
//! `Infra` becomes SERVFAIL.

use std::fmt::Display;
use std::io;

use thiserror::Error;

/// Classified failure for one relay transaction.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Policy or structural rejection. The client should not retry.
    #[error("refused: {reason}")]
    Refused { reason: String },

    /// Infrastructure fault (decode, upstream I/O, deadline, send). The
    /// client may retry on its own; the relay never does.
    #[error("{cause}")]
    Infra { cause: String },
}

impl RelayError {
    /// Classify a fresh message as a policy refusal.
    pub fn refused(reason: impl Into<String>) -> Self {
        Self::Refused {
            reason: reason.into(),
        }
    }

    /// Classify a fresh message or rewrap an existing error as an
    /// infrastructure fault.
    pub fn infra(cause: impl Display) -> Self {
        Self::Infra {
            cause: cause.to_string(),
        }
    }

    /// True when the transaction should end in a REFUSED response rather
    /// than SERVFAIL.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }
}

impl From<io::Error> for RelayError {
    fn from(err: io::Error) -> Self {
        Self::infra(err)
    }
}
