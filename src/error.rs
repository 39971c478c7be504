//! Error kinds for the Chord core (spec.md §7).

use thiserror::Error;

/// The four failure modes a node can produce.
///
/// `InvalidArgument` is raised synchronously and never retried.
/// `TransientPeerFailure` and `NodeDeparted` are absorbed by the retry
/// harness and by routing/maintenance self-healing; only `NetworkHosed`
/// is ever surfaced to a client of `get`/`put`/`delete`.
#[derive(Debug, Clone, Error)]
pub enum ChordError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transient peer failure: {0}")]
    TransientPeerFailure(String),

    #[error("node has left the ring")]
    NodeDeparted,

    #[error("network hosed after {attempts} attempt(s): {source}")]
    NetworkHosed {
        attempts: usize,
        source: Box<ChordError>,
    },
}

impl ChordError {
    /// True for the two failure kinds the retry harness treats as
    /// "peer unreachable" and retries rather than surfacing immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChordError::TransientPeerFailure(_) | ChordError::NodeDeparted)
    }
}

pub type ChordResult<T> = Result<T, ChordError>;
