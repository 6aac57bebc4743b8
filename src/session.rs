//! Game session records and the pure match state machine.
//!
//! A [`Session`] is one match between two players: board, turn state, and
//! outcome. All transitions here are pure (input state to output state);
//! persistence and settlement side effects live in
//! [`SessionEngine`](crate::SessionEngine).

use crate::board::{Board, Mark, Verdict};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Unique identifier for a player.
pub type PlayerId = String;

/// A player identity record.
///
/// Created once when a device first registers; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize, Getters, new)]
pub struct Player {
    /// Display name chosen at registration.
    name: String,
    /// Registration time, used for lobby ordering.
    created_at: DateTime<Utc>,
}

/// Turn/outcome state of a session.
///
/// A closed enum: the store serializes it as one of the six strings
/// `invite`, `turn_x`, `turn_o`, `won_x`, `won_o`, `draw`, and any other
/// string is rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Challenge issued, waiting for the opponent to accept or decline.
    Invite,
    /// The given mark holds the turn.
    Turn(Mark),
    /// The given mark has won. Terminal.
    Won(Mark),
    /// Board full with no winner. Terminal.
    Draw,
}

impl SessionState {
    /// The string stored in the database for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Invite => "invite",
            SessionState::Turn(Mark::X) => "turn_x",
            SessionState::Turn(Mark::O) => "turn_o",
            SessionState::Won(Mark::X) => "won_x",
            SessionState::Won(Mark::O) => "won_o",
            SessionState::Draw => "draw",
        }
    }

    /// Parses a stored state string. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invite" => Some(SessionState::Invite),
            "turn_x" => Some(SessionState::Turn(Mark::X)),
            "turn_o" => Some(SessionState::Turn(Mark::O)),
            "won_x" => Some(SessionState::Won(Mark::X)),
            "won_o" => Some(SessionState::Won(Mark::O)),
            "draw" => Some(SessionState::Draw),
            _ => None,
        }
    }

    /// Whether the match has ended: no further moves are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Won(_) | SessionState::Draw)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SessionState::parse(&s).ok_or_else(|| {
            de::Error::unknown_variant(&s, &["invite", "turn_x", "turn_o", "won_x", "won_o", "draw"])
        })
    }
}

/// One match between two players.
///
/// Player X is the challenger and always moves first; player O is the
/// invited opponent. The record stores only player identifiers, not
/// player data. `stats_applied` guards outcome accounting: it stays false
/// until the session reaches a terminal state and flips to true at most
/// once per match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize, Getters)]
pub struct Session {
    /// The 9-cell board.
    board: Board,
    /// Turn/outcome state.
    #[getter(copy)]
    state: SessionState,
    /// Challenger id (mark X).
    player_x: PlayerId,
    /// Opponent id (mark O).
    player_o: PlayerId,
    /// True once outcome accounting has run for this match.
    #[getter(copy)]
    stats_applied: bool,
    /// Challenge creation time.
    created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new challenge from `challenger` to `opponent`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPlayers`] if either id is empty or
    /// the ids are identical.
    #[instrument]
    pub fn invite(challenger: &str, opponent: &str) -> Result<Self, EngineError> {
        if challenger.is_empty() || opponent.is_empty() || challenger == opponent {
            warn!(challenger, opponent, "Rejecting invite with bad player ids");
            return Err(EngineError::InvalidPlayers);
        }
        info!(challenger, opponent, "Creating invite");
        Ok(Self {
            board: Board::new(),
            state: SessionState::Invite,
            player_x: challenger.to_string(),
            player_o: opponent.to_string(),
            stats_applied: false,
            created_at: Utc::now(),
        })
    }

    /// Returns the mark held by the given player, if they participate.
    pub fn mark_of(&self, player: &str) -> Option<Mark> {
        if self.player_x == player {
            Some(Mark::X)
        } else if self.player_o == player {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// Returns the id of the player holding the given mark.
    pub fn player_for(&self, mark: Mark) -> &PlayerId {
        match mark {
            Mark::X => &self.player_x,
            Mark::O => &self.player_o,
        }
    }

    /// Whether the given player is one of the two participants.
    pub fn is_participant(&self, player: &str) -> bool {
        self.mark_of(player).is_some()
    }

    /// Whether the match has ended.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Accepts a pending challenge, handing the first turn to player X.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTransition`] unless the session is
    /// in the invite state.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn accept(&mut self) -> Result<(), EngineError> {
        if self.state != SessionState::Invite {
            return Err(EngineError::InvalidTransition {
                state: self.state,
                action: "accept_invite",
            });
        }
        self.state = SessionState::Turn(Mark::X);
        info!("Invite accepted, X to move");
        Ok(())
    }

    /// Checks that the session may be declined (and deleted by the
    /// caller). Legal only while still in the invite state.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn ensure_declinable(&self) -> Result<(), EngineError> {
        if self.state != SessionState::Invite {
            return Err(EngineError::InvalidTransition {
                state: self.state,
                action: "decline_invite",
            });
        }
        Ok(())
    }

    /// Places the acting player's mark in `cell` and advances the state.
    ///
    /// The turn passes to the opponent unless the move completes a line
    /// (the acting mark wins) or fills the board (draw). Returns the
    /// state after the move.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotYourTurn`] if the session is not on a turn
    ///   state or `player` does not hold the current turn.
    /// - [`EngineError::InvalidCell`] if `cell` is out of range or taken.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn apply_move(&mut self, player: &str, cell: usize) -> Result<SessionState, EngineError> {
        let mark = match self.state {
            SessionState::Turn(mark) => mark,
            _ => {
                warn!(player, "Move attempted outside a turn state");
                return Err(EngineError::NotYourTurn {
                    player: player.to_string(),
                });
            }
        };
        if self.mark_of(player) != Some(mark) {
            warn!(player, expected = %self.player_for(mark), "Move out of turn");
            return Err(EngineError::NotYourTurn {
                player: player.to_string(),
            });
        }

        self.board.place(cell, mark)?;

        self.state = match self.board.verdict() {
            Verdict::Won(winner) => SessionState::Won(winner),
            Verdict::Draw => SessionState::Draw,
            Verdict::InProgress => SessionState::Turn(mark.opponent()),
        };

        info!(player, cell, state = %self.state, "Move applied");
        Ok(self.state)
    }

    /// Concedes the match: the other participant is declared winner.
    ///
    /// Legal in any non-terminal state, including a pending invite.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidTransition`] if the match already ended.
    /// - [`EngineError::NotYourTurn`] if `player` is not a participant.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn resign(&mut self, player: &str) -> Result<(), EngineError> {
        if self.is_terminal() {
            return Err(EngineError::InvalidTransition {
                state: self.state,
                action: "resign",
            });
        }
        let mark = self.mark_of(player).ok_or_else(|| {
            warn!(player, "Resignation by non-participant");
            EngineError::NotYourTurn {
                player: player.to_string(),
            }
        })?;

        self.state = SessionState::Won(mark.opponent());
        info!(player, state = %self.state, "Player resigned");
        Ok(())
    }

    /// Starts a fresh match between the same players.
    ///
    /// Clears the board, hands the first turn back to player X, and
    /// re-arms outcome accounting. Legal only from a terminal state.
    #[instrument(skip(self), fields(state = %self.state))]
    pub fn rematch(&mut self) -> Result<(), EngineError> {
        if !self.is_terminal() {
            return Err(EngineError::InvalidTransition {
                state: self.state,
                action: "rematch",
            });
        }
        self.board = Board::new();
        self.state = SessionState::Turn(Mark::X);
        self.stats_applied = false;
        info!("Rematch started, X to move");
        Ok(())
    }

    /// Marks outcome accounting as done for this match.
    #[instrument(skip(self))]
    pub(crate) fn mark_stats_applied(&mut self) {
        debug!("Stats settlement claimed");
        self.stats_applied = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Cell;

    fn session() -> Session {
        Session::invite("alice", "bob").unwrap()
    }

    fn active_session() -> Session {
        let mut s = session();
        s.accept().unwrap();
        s
    }

    #[test]
    fn invite_rejects_empty_or_identical_ids() {
        assert_eq!(
            Session::invite("", "bob").unwrap_err(),
            EngineError::InvalidPlayers
        );
        assert_eq!(
            Session::invite("alice", "").unwrap_err(),
            EngineError::InvalidPlayers
        );
        assert_eq!(
            Session::invite("alice", "alice").unwrap_err(),
            EngineError::InvalidPlayers
        );
    }

    #[test]
    fn invite_starts_with_empty_board() {
        let s = session();
        assert_eq!(s.state(), SessionState::Invite);
        assert!(!s.stats_applied());
        assert!(s.board().cells().iter().all(|c| *c == Cell::Empty));
    }

    #[test]
    fn accept_hands_turn_to_challenger() {
        let mut s = session();
        s.accept().unwrap();
        assert_eq!(s.state(), SessionState::Turn(Mark::X));
    }

    #[test]
    fn accept_outside_invite_is_invalid_transition() {
        let mut s = active_session();
        let err = s.accept().unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn decline_only_legal_while_invite() {
        let s = session();
        assert!(s.ensure_declinable().is_ok());

        let s = active_session();
        assert!(matches!(
            s.ensure_declinable().unwrap_err(),
            EngineError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn move_passes_turn_to_opponent() {
        let mut s = active_session();
        let state = s.apply_move("alice", 4).unwrap();
        assert_eq!(state, SessionState::Turn(Mark::O));
        assert_eq!(s.board().get(4), Some(Cell::Taken(Mark::X)));
    }

    #[test]
    fn move_by_inactive_player_is_rejected_without_change() {
        let mut s = active_session();
        s.apply_move("alice", 4).unwrap();
        let before = s.clone();

        // Alice moves again while it is Bob's turn.
        let err = s.apply_move("alice", 0).unwrap_err();
        assert!(matches!(err, EngineError::NotYourTurn { .. }));
        assert_eq!(s, before);
    }

    #[test]
    fn move_in_occupied_cell_is_rejected() {
        let mut s = active_session();
        s.apply_move("alice", 4).unwrap();
        let err = s.apply_move("bob", 4).unwrap_err();
        assert_eq!(err, EngineError::InvalidCell { cell: 4 });
        assert_eq!(s.board().get(4), Some(Cell::Taken(Mark::X)));
    }

    #[test]
    fn completing_a_line_wins() {
        let mut s = active_session();
        s.apply_move("alice", 0).unwrap();
        s.apply_move("bob", 3).unwrap();
        s.apply_move("alice", 1).unwrap();
        s.apply_move("bob", 4).unwrap();
        let state = s.apply_move("alice", 2).unwrap();
        assert_eq!(state, SessionState::Won(Mark::X));
        assert!(s.is_terminal());
    }

    #[test]
    fn filling_the_board_without_line_draws() {
        let mut s = active_session();
        for (player, cell) in [
            ("alice", 0),
            ("bob", 1),
            ("alice", 2),
            ("bob", 4),
            ("alice", 3),
            ("bob", 5),
            ("alice", 7),
            ("bob", 6),
            ("alice", 8),
        ] {
            s.apply_move(player, cell).unwrap();
        }
        assert_eq!(s.state(), SessionState::Draw);
    }

    #[test]
    fn no_moves_accepted_after_terminal_state() {
        let mut s = active_session();
        s.resign("bob").unwrap();
        let err = s.apply_move("alice", 0).unwrap_err();
        assert!(matches!(err, EngineError::NotYourTurn { .. }));
    }

    #[test]
    fn resignation_awards_the_other_player() {
        let mut s = active_session();
        s.resign("bob").unwrap();
        assert_eq!(s.state(), SessionState::Won(Mark::X));

        let mut s = active_session();
        s.resign("alice").unwrap();
        assert_eq!(s.state(), SessionState::Won(Mark::O));
    }

    #[test]
    fn resignation_by_stranger_is_rejected() {
        let mut s = active_session();
        let err = s.resign("mallory").unwrap_err();
        assert!(matches!(err, EngineError::NotYourTurn { .. }));
        assert_eq!(s.state(), SessionState::Turn(Mark::X));
    }

    #[test]
    fn rematch_resets_board_turn_and_settlement_flag() {
        let mut s = active_session();
        s.resign("bob").unwrap();
        s.mark_stats_applied();

        s.rematch().unwrap();
        assert_eq!(s.state(), SessionState::Turn(Mark::X));
        assert!(!s.stats_applied());
        assert!(s.board().cells().iter().all(|c| *c == Cell::Empty));
        assert_eq!(s.player_for(Mark::X), "alice");
    }

    #[test]
    fn rematch_from_live_match_is_rejected() {
        let mut s = active_session();
        let err = s.rematch().unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn state_round_trips_through_store_strings() {
        for state in [
            SessionState::Invite,
            SessionState::Turn(Mark::X),
            SessionState::Turn(Mark::O),
            SessionState::Won(Mark::X),
            SessionState::Won(Mark::O),
            SessionState::Draw,
        ] {
            assert_eq!(SessionState::parse(state.as_str()), Some(state));
        }
        assert_eq!(SessionState::parse("player1_turn"), None);
    }

    #[test]
    fn unknown_state_string_fails_to_decode() {
        let result: Result<SessionState, _> = serde_json::from_str("\"limbo\"");
        assert!(result.is_err());
    }
}
