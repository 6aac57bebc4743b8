//! Lobby queries over cached player and game collections.
//!
//! The lobby answers the questions a client screen asks between
//! matches: who can I challenge, who has challenged me, and is there a
//! live match I should be in. All answers come synchronously from the
//! local mirrors; the store is only touched once, at construction.

use crate::cache::CollectionCache;
use crate::error::EngineError;
use crate::session::{Player, PlayerId, Session, SessionId, SessionState};
use crate::store::{Collection, DocumentStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Client-side lobby state for one local player.
#[derive(Debug, Clone)]
pub struct LobbyView {
    local: PlayerId,
    players: CollectionCache<Player>,
    games: CollectionCache<Session>,
}

impl LobbyView {
    /// Builds a lobby view for `local`, seeding both mirrors.
    #[instrument(skip(store))]
    pub async fn new(store: &Arc<dyn DocumentStore>, local: PlayerId) -> Result<Self, EngineError> {
        let players = CollectionCache::new(store, Collection::Players).await?;
        let games = CollectionCache::new(store, Collection::Games).await?;
        debug!(local = %local, "Lobby view ready");
        Ok(Self {
            local,
            players,
            games,
        })
    }

    /// The local player's id.
    pub fn local(&self) -> &PlayerId {
        &self.local
    }

    /// The cached player mirror.
    pub fn players(&self) -> &CollectionCache<Player> {
        &self.players
    }

    /// The cached game mirror.
    pub fn games(&self) -> &CollectionCache<Session> {
        &self.games
    }

    /// The local player's display name, if already mirrored.
    pub fn player_name(&self, id: &str) -> Option<String> {
        self.players.get(id).map(|p| p.name().clone())
    }

    /// Challenges sent to the local player that still await an answer.
    pub fn incoming_invites(&self) -> Vec<(SessionId, Session)> {
        self.invites(|session, local| session.player_o() == local)
    }

    /// Challenges the local player has sent that still await an answer.
    pub fn outgoing_invites(&self) -> Vec<(SessionId, Session)> {
        self.invites(|session, local| session.player_x() == local)
    }

    fn invites(&self, side: impl Fn(&Session, &str) -> bool) -> Vec<(SessionId, Session)> {
        let mut invites: Vec<_> = self
            .games
            .snapshot()
            .into_iter()
            .filter(|(_, session)| {
                session.state() == SessionState::Invite && side(session, &self.local)
            })
            .collect();
        invites.sort_by(|(a, _), (b, _)| a.cmp(b));
        invites
    }

    /// A live match involving the local player, if one exists.
    ///
    /// A session counts as live once a turn is in progress; pending
    /// invites and finished matches do not.
    pub fn active_session(&self) -> Option<SessionId> {
        self.games
            .snapshot()
            .into_iter()
            .filter(|(_, session)| {
                matches!(session.state(), SessionState::Turn(_))
                    && session.is_participant(&self.local)
            })
            .map(|(id, _)| id)
            .min()
    }

    /// Every other player, challengers of the local player first, then
    /// by registration time.
    pub fn roster(&self) -> Vec<(PlayerId, Player)> {
        let challengers: Vec<PlayerId> = self
            .incoming_invites()
            .into_iter()
            .map(|(_, session)| session.player_x().clone())
            .collect();

        let mut roster: Vec<_> = self
            .players
            .snapshot()
            .into_iter()
            .filter(|(id, _)| *id != self.local)
            .collect();
        roster.sort_by(|(a_id, a), (b_id, b)| {
            let a_invited = challengers.contains(a_id);
            let b_invited = challengers.contains(b_id);
            b_invited
                .cmp(&a_invited)
                .then_with(|| a.created_at().cmp(b.created_at()))
                .then_with(|| a_id.cmp(b_id))
        });
        roster
    }
}
