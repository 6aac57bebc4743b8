//! Gridmatch - two-player networked tic-tac-toe core.
//!
//! The crate owns the game-session state machine and turn-resolution
//! logic for a tic-tac-toe match played from two devices against a
//! shared document store.
//!
//! # Architecture
//!
//! - **Session engine**: validated intents (invite, accept/decline,
//!   move, resign, rematch) applied as read-modify-write transactions
//!   with optimistic concurrency.
//! - **Stats aggregator**: exactly-once win/loss/draw accounting per
//!   finished match, guarded by the session's `stats_applied` flag.
//! - **Document store**: external collaborator trait with an in-memory
//!   reference implementation for tests and demos.
//! - **Collection cache / lobby**: client-side mirrors fed by the
//!   store's snapshot stream.
//!
//! # Example
//!
//! ```no_run
//! use gridmatch::{MemoryStore, SessionEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), gridmatch::EngineError> {
//! let engine = SessionEngine::new(Arc::new(MemoryStore::new()));
//!
//! let alice = engine.create_player("Alice").await?;
//! let bob = engine.create_player("Bob").await?;
//!
//! let game = engine.create_invite(&alice, &bob).await?;
//! engine.accept_invite(&game).await?;
//! engine.apply_move(&game, &alice, 4).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod board;
mod cache;
mod engine;
mod error;
mod identity;
mod lobby;
mod session;
mod stats;
mod store;

// Crate-level exports - Board and outcome evaluation
pub use board::{BOARD_CELLS, Board, Cell, Mark, Verdict};

// Crate-level exports - Collection cache
pub use cache::CollectionCache;

// Crate-level exports - Session engine
pub use engine::SessionEngine;

// Crate-level exports - Errors
pub use error::EngineError;

// Crate-level exports - Local identity
pub use identity::{IdentityError, IdentityFile};

// Crate-level exports - Lobby queries
pub use lobby::LobbyView;

// Crate-level exports - Session records and state machine
pub use session::{Player, PlayerId, Session, SessionId, SessionState};

// Crate-level exports - Stats aggregation
pub use stats::{Outcome, PlayerStats, StatsAggregator};

// Crate-level exports - Document store
pub use store::{
    Collection, DocumentId, DocumentStore, MemoryStore, Snapshot, StoreError, Versioned,
};
