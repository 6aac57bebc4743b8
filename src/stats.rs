//! Per-player outcome accounting with exactly-once settlement.
//!
//! The aggregator consumes terminal sessions and bumps each
//! participant's win/loss/draw counters. The session's `stats_applied`
//! flag is the idempotency guard: settlement first claims the flag with
//! a conditional write, then applies the counter updates, so a retried
//! or duplicated terminal-state write never double-counts a match.

use crate::board::Mark;
use crate::error::EngineError;
use crate::session::{PlayerId, Session, SessionState};
use crate::store::{Collection, DocumentStore, StoreError};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Attempts per counter document before giving up on a contended write.
const BUMP_ATTEMPTS: usize = 4;

/// A match result from one player's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The player won the match.
    Win,
    /// The player lost the match.
    Loss,
    /// The match was drawn.
    Draw,
}

/// Aggregated win/loss/draw counters for one player.
///
/// Created lazily at the first settlement affecting the player; mutated
/// only by [`StatsAggregator`]; never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct PlayerStats {
    /// Matches won.
    #[getter(copy)]
    wins: u32,
    /// Matches lost.
    #[getter(copy)]
    losses: u32,
    /// Matches drawn.
    #[getter(copy)]
    draws: u32,
}

impl PlayerStats {
    /// Total number of settled matches.
    pub fn total(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Win rate as a percentage (0.0-100.0).
    pub fn win_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.wins as f64 / self.total() as f64) * 100.0
        }
    }

    /// Records one outcome.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Draw => self.draws += 1,
        }
    }
}

/// Applies exactly-once outcome accounting for finished sessions.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    store: Arc<dyn DocumentStore>,
}

impl StatsAggregator {
    /// Creates an aggregator writing through the given store.
    #[instrument(skip(store))]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Settles the outcome of a terminal session.
    ///
    /// `version` must be the store version of the session as last read
    /// or written by the caller. Returns `true` if accounting ran, or
    /// `false` if it had already been applied (by this call racing
    /// another settler, or by an earlier one).
    ///
    /// The settlement is claimed before the counters are bumped: a
    /// version conflict on the claim means another writer touched the
    /// session, and if that writer already applied the stats this call
    /// backs off without counting.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidTransition`] if the session is not in a
    ///   terminal state.
    /// - [`EngineError::StaleSession`] if the session changed
    ///   concurrently for a reason other than settlement.
    /// - [`EngineError::Store`] if a counter write stays contended.
    #[instrument(skip(self, session), fields(state = %session.state()))]
    pub async fn settle_outcome(
        &self,
        session_id: &str,
        session: &Session,
        version: u64,
    ) -> Result<bool, EngineError> {
        if session.stats_applied() {
            debug!(%session_id, "Outcome already settled, skipping");
            return Ok(false);
        }

        let outcomes = match session.state() {
            SessionState::Won(winner) => [
                (session.player_for(winner).clone(), Outcome::Win),
                (session.player_for(winner.opponent()).clone(), Outcome::Loss),
            ],
            SessionState::Draw => [
                (session.player_for(Mark::X).clone(), Outcome::Draw),
                (session.player_for(Mark::O).clone(), Outcome::Draw),
            ],
            state => {
                return Err(EngineError::InvalidTransition {
                    state,
                    action: "settle_outcome",
                });
            }
        };

        if !self.claim(session_id, session, version).await? {
            return Ok(false);
        }

        for (player, outcome) in outcomes {
            self.bump(&player, outcome).await?;
        }

        info!(%session_id, "Outcome settled");
        Ok(true)
    }

    /// Flips `stats_applied` on the session with a conditional write.
    ///
    /// Returns `false` if another settler already claimed it.
    #[instrument(skip(self, session))]
    async fn claim(
        &self,
        session_id: &str,
        session: &Session,
        version: u64,
    ) -> Result<bool, EngineError> {
        let mut claimed = session.clone();
        claimed.mark_stats_applied();
        let doc = serde_json::to_value(&claimed).map_err(EngineError::codec)?;

        match self
            .store
            .put_if(Collection::Games, session_id, doc, Some(version))
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::VersionConflict { .. }) => {
                // Lost the race; find out whether the winner settled.
                let current = self
                    .store
                    .get(Collection::Games, session_id)
                    .await?
                    .ok_or_else(|| EngineError::SessionNotFound {
                        session: session_id.to_string(),
                    })?;
                let current: Session =
                    serde_json::from_value(current.value().clone()).map_err(EngineError::codec)?;
                if current.stats_applied() {
                    debug!(%session_id, "Another settler won the claim");
                    Ok(false)
                } else {
                    warn!(%session_id, "Session changed mid-settlement");
                    Err(EngineError::StaleSession {
                        session: session_id.to_string(),
                    })
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Bumps one player's counters with a bounded compare-and-swap loop.
    ///
    /// The counter document is created zeroed if absent.
    #[instrument(skip(self))]
    async fn bump(&self, player: &PlayerId, outcome: Outcome) -> Result<(), EngineError> {
        let mut last_conflict = None;

        for attempt in 0..BUMP_ATTEMPTS {
            let current = self.store.get(Collection::PlayerStats, player).await?;
            let (mut stats, expected) = match &current {
                Some(doc) => (
                    serde_json::from_value::<PlayerStats>(doc.value().clone())
                        .map_err(EngineError::codec)?,
                    Some(doc.version()),
                ),
                None => (PlayerStats::default(), None),
            };
            stats.record(outcome);

            let doc = serde_json::to_value(&stats).map_err(EngineError::codec)?;
            match self
                .store
                .put_if(Collection::PlayerStats, player, doc, expected)
                .await
            {
                Ok(_) => {
                    debug!(%player, ?outcome, wins = stats.wins(), "Counter bumped");
                    return Ok(());
                }
                Err(err @ StoreError::VersionConflict { .. }) => {
                    debug!(%player, attempt, "Counter contended, retrying");
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(%player, "Counter stayed contended, giving up");
        Err(last_conflict
            .unwrap_or(StoreError::Backend {
                message: "counter update exhausted retries".to_string(),
            })
            .into())
    }

    /// Reads a player's counters, zeroed if never settled.
    #[instrument(skip(self))]
    pub async fn stats_for(&self, player: &str) -> Result<PlayerStats, EngineError> {
        let stats = match self.store.get(Collection::PlayerStats, player).await? {
            Some(doc) => serde_json::from_value(doc.value().clone()).map_err(EngineError::codec)?,
            None => PlayerStats::default(),
        };
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_routes_to_the_right_counter() {
        let mut stats = PlayerStats::default();
        stats.record(Outcome::Win);
        stats.record(Outcome::Win);
        stats.record(Outcome::Loss);
        stats.record(Outcome::Draw);
        assert_eq!(stats.wins(), 2);
        assert_eq!(stats.losses(), 1);
        assert_eq!(stats.draws(), 1);
        assert_eq!(stats.total(), 4);
    }

    #[test]
    fn win_rate_handles_zero_games() {
        assert_eq!(PlayerStats::default().win_rate(), 0.0);

        let mut stats = PlayerStats::default();
        stats.record(Outcome::Win);
        stats.record(Outcome::Loss);
        assert!((stats.win_rate() - 50.0).abs() < f64::EPSILON);
    }
}
