//! Error taxonomy for session-engine and store operations.

use crate::session::SessionState;
use crate::store::StoreError;
use derive_more::{Display, Error, From};

/// Error raised by session-engine operations.
///
/// Every variant is local to a single request: a rejected or failed
/// operation leaves store state unchanged and the caller re-renders from
/// the last known-good snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error, From)]
pub enum EngineError {
    /// Challenger and opponent ids must be non-empty and distinct.
    #[display("player identifiers must be non-empty and distinct")]
    InvalidPlayers,

    /// Operation attempted from a state that does not permit it.
    #[display("'{action}' is not allowed while the session is {state}")]
    InvalidTransition {
        /// State the session was in when the operation was attempted.
        #[error(not(source))]
        state: SessionState,
        /// Name of the rejected operation.
        action: &'static str,
    },

    /// A move by a player who does not hold the current turn, or by a
    /// player who is not part of the session.
    #[display("it is not {player}'s turn")]
    NotYourTurn {
        /// The player whose move was rejected.
        #[error(not(source))]
        player: String,
    },

    /// Out-of-range or already-occupied cell index.
    #[display("cell {cell} is out of range or already taken")]
    InvalidCell {
        /// The rejected cell index.
        #[error(not(source))]
        cell: usize,
    },

    /// The session changed between read and conditional write-back.
    #[display("session '{session}' was modified concurrently; re-read and retry")]
    StaleSession {
        /// The contested session id.
        #[error(not(source))]
        session: String,
    },

    /// No session document exists under the given id.
    #[display("session '{session}' not found")]
    SessionNotFound {
        /// The missing session id.
        #[error(not(source))]
        session: String,
    },

    /// No player document exists under the given id.
    #[display("player '{player}' not found")]
    PlayerNotFound {
        /// The missing player id.
        #[error(not(source))]
        player: String,
    },

    /// A persistence call failed.
    #[display("store failure: {_0}")]
    #[from]
    Store(StoreError),

    /// A stored document did not deserialize into its record type.
    #[display("malformed document: {message}")]
    Codec {
        /// Description of the decode failure.
        #[error(not(source))]
        message: String,
    },
}

impl EngineError {
    /// Wraps a serde decode failure as a [`EngineError::Codec`] error.
    pub(crate) fn codec(err: serde_json::Error) -> Self {
        Self::Codec {
            message: err.to_string(),
        }
    }
}
