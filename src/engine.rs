//! Session engine: validated operations against the document store.
//!
//! Every operation follows the same shape: read the current versioned
//! session document, apply a pure transition from
//! [`Session`], and write back conditionally on the version that was
//! read. Two clients racing on the same session cannot silently
//! interleave; the loser of the race gets
//! [`EngineError::StaleSession`] and re-reads.

use crate::error::EngineError;
use crate::session::{Player, PlayerId, Session, SessionId};
use crate::stats::{PlayerStats, StatsAggregator};
use crate::store::{Collection, DocumentStore, StoreError, Versioned};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Validated intents (join, move, resign, rematch) against sessions in
/// the document store, plus outcome settlement on terminal transitions.
#[derive(Debug, Clone)]
pub struct SessionEngine {
    store: Arc<dyn DocumentStore>,
    stats: StatsAggregator,
}

impl SessionEngine {
    /// Creates an engine over the given store.
    #[instrument(skip(store))]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        info!("Creating session engine");
        let stats = StatsAggregator::new(Arc::clone(&store));
        Self { store, stats }
    }

    /// Returns the stats aggregator sharing this engine's store.
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Registers a new player and returns its store-generated id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPlayers`] for a blank name.
    #[instrument(skip(self))]
    pub async fn create_player(&self, name: &str) -> Result<PlayerId, EngineError> {
        if name.trim().is_empty() {
            warn!("Rejecting blank player name");
            return Err(EngineError::InvalidPlayers);
        }
        let player = Player::new(name.trim().to_string(), Utc::now());
        let doc = serde_json::to_value(&player).map_err(EngineError::codec)?;
        let id = self.store.add(Collection::Players, doc).await?;
        info!(%id, name, "Player registered");
        Ok(id)
    }

    /// Looks up a player record.
    #[instrument(skip(self))]
    pub async fn player(&self, id: &str) -> Result<Player, EngineError> {
        let doc = self
            .store
            .get(Collection::Players, id)
            .await?
            .ok_or_else(|| EngineError::PlayerNotFound {
                player: id.to_string(),
            })?;
        decode(doc.value())
    }

    /// Issues a challenge from `challenger` to `opponent` and returns
    /// the new session id.
    #[instrument(skip(self))]
    pub async fn create_invite(
        &self,
        challenger: &str,
        opponent: &str,
    ) -> Result<SessionId, EngineError> {
        let session = Session::invite(challenger, opponent)?;
        let doc = serde_json::to_value(&session).map_err(EngineError::codec)?;
        let id = self.store.add(Collection::Games, doc).await?;
        info!(session_id = %id, challenger, opponent, "Invite created");
        Ok(id)
    }

    /// Reads the current session record.
    #[instrument(skip(self))]
    pub async fn session(&self, id: &str) -> Result<Session, EngineError> {
        Ok(self.load(id).await?.into_value())
    }

    /// Accepts a pending invite, moving the session to player X's turn.
    #[instrument(skip(self))]
    pub async fn accept_invite(&self, id: &str) -> Result<Session, EngineError> {
        let versioned = self.load(id).await?;
        let version = versioned.version();
        let mut session = versioned.into_value();
        session.accept()?;
        self.write_back(id, &session, version).await?;
        Ok(session)
    }

    /// Declines a pending invite, removing the session entirely.
    ///
    /// A failed delete leaves the invite outstanding; the caller may
    /// retry.
    #[instrument(skip(self))]
    pub async fn decline_invite(&self, id: &str) -> Result<(), EngineError> {
        let versioned = self.load(id).await?;
        versioned.value().ensure_declinable()?;
        self.store.delete(Collection::Games, id).await?;
        info!(session_id = id, "Invite declined and removed");
        Ok(())
    }

    /// Applies a move by `player` into `cell`.
    ///
    /// On a terminal transition the outcome is settled into the
    /// players' counters before returning. Returns the session after
    /// the move.
    #[instrument(skip(self))]
    pub async fn apply_move(
        &self,
        id: &str,
        player: &str,
        cell: usize,
    ) -> Result<Session, EngineError> {
        let versioned = self.load(id).await?;
        let version = versioned.version();
        let mut session = versioned.into_value();
        let state = session.apply_move(player, cell)?;
        let new_version = self.write_back(id, &session, version).await?;

        if state.is_terminal() {
            self.settle(id, &session, new_version).await?;
        }
        Ok(session)
    }

    /// Resigns the match on behalf of `player`; the other participant
    /// wins and the outcome is settled.
    #[instrument(skip(self))]
    pub async fn resign(&self, id: &str, player: &str) -> Result<Session, EngineError> {
        let versioned = self.load(id).await?;
        let version = versioned.version();
        let mut session = versioned.into_value();
        session.resign(player)?;
        let new_version = self.write_back(id, &session, version).await?;

        self.settle(id, &session, new_version).await?;
        Ok(session)
    }

    /// Restarts a finished match between the same players.
    #[instrument(skip(self))]
    pub async fn rematch(&self, id: &str) -> Result<Session, EngineError> {
        let versioned = self.load(id).await?;
        let version = versioned.version();
        let mut session = versioned.into_value();
        session.rematch()?;
        self.write_back(id, &session, version).await?;
        Ok(session)
    }

    /// Reads a player's settled counters, zeroed if never settled.
    #[instrument(skip(self))]
    pub async fn player_stats(&self, player: &str) -> Result<PlayerStats, EngineError> {
        self.stats.stats_for(player).await
    }

    /// Returns every player's counters, sorted by wins descending.
    #[instrument(skip(self))]
    pub async fn leaderboard(&self) -> Result<Vec<(PlayerId, PlayerStats)>, EngineError> {
        let documents = self.store.list(Collection::PlayerStats).await?;
        let mut board = Vec::with_capacity(documents.len());
        for (id, doc) in documents {
            board.push((id, decode::<PlayerStats>(doc.value())?));
        }
        board.sort_by(|(a_id, a), (b_id, b)| {
            b.wins().cmp(&a.wins()).then_with(|| a_id.cmp(b_id))
        });
        debug!(entries = board.len(), "Leaderboard assembled");
        Ok(board)
    }

    /// Reads the session with its version, for read-modify-write.
    async fn load(&self, id: &str) -> Result<Versioned<Session>, EngineError> {
        let doc = self
            .store
            .get(Collection::Games, id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound {
                session: id.to_string(),
            })?;
        let session = decode(doc.value())?;
        Ok(Versioned::new(doc.version(), session))
    }

    /// Writes the session back conditionally on the version read.
    async fn write_back(
        &self,
        id: &str,
        session: &Session,
        expected: u64,
    ) -> Result<u64, EngineError> {
        let doc = serde_json::to_value(session).map_err(EngineError::codec)?;
        match self
            .store
            .put_if(Collection::Games, id, doc, Some(expected))
            .await
        {
            Ok(version) => Ok(version),
            Err(StoreError::VersionConflict { .. }) => {
                warn!(session_id = id, "Concurrent write detected");
                Err(EngineError::StaleSession {
                    session: id.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Runs outcome settlement for a freshly terminal session.
    async fn settle(
        &self,
        id: &str,
        session: &Session,
        version: u64,
    ) -> Result<(), EngineError> {
        let settled = self
            .stats
            .settle_outcome(id, session, version)
            .await?;
        debug!(session_id = id, settled, state = %session.state(), "Settlement finished");
        Ok(())
    }
}

/// Decodes a store document into a typed record.
fn decode<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, EngineError> {
    serde_json::from_value(value.clone()).map_err(EngineError::codec)
}
