//! Roster and identity of the room the client is sitting in.
//!
//! [`RoomState`] is written only by the [`PhaseMachine`](crate::machine::PhaseMachine)
//! in response to server events. Everything else reads it through a shared
//! reference or a clone.

use std::collections::BTreeSet;

use crate::protocol::{Player, PlayerId, RoomCode};

/// Side of the table a player sits on.
///
/// Seats alternate by arrival order: index 0 on the left, 1 on the right, and
/// so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    Left,
    Right,
}

impl Seat {
    fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Left
        } else {
            Self::Right
        }
    }
}

/// Local mirror of the room as the server last described it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    room_id: RoomCode,
    self_id: PlayerId,
    players: Vec<Player>,
    is_spy: bool,
    spy_id: Option<PlayerId>,
    ready_for_rematch: BTreeSet<PlayerId>,
}

impl RoomState {
    /// Establish the room after `room_created`, `join_room_success` or a
    /// rejoin. `self_id` is fixed for the lifetime of the value.
    pub fn new(room_id: impl Into<RoomCode>, self_id: impl Into<PlayerId>, players: Vec<Player>) -> Self {
        Self {
            room_id: room_id.into(),
            self_id: self_id.into(),
            players,
            is_spy: false,
            spy_id: None,
            ready_for_rematch: BTreeSet::new(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Players in arrival order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.player(id).is_some()
    }

    /// This client's own roster entry.
    pub fn me(&self) -> Option<&Player> {
        self.player(&self.self_id)
    }

    /// Whether this client is the room host.
    pub fn is_host(&self) -> bool {
        self.me().is_some_and(|p| p.is_host)
    }

    /// Display name of a player, falling back to the id.
    pub fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.player(id).map_or(id, |p| p.name.as_str())
    }

    /// Seat of a player, derived from arrival order.
    pub fn seat_of(&self, id: &str) -> Option<Seat> {
        self.players
            .iter()
            .position(|p| p.id == id)
            .map(Seat::for_index)
    }

    /// Every player with their seat, in arrival order.
    pub fn seating(&self) -> impl Iterator<Item = (&Player, Seat)> {
        self.players
            .iter()
            .enumerate()
            .map(|(i, p)| (p, Seat::for_index(i)))
    }

    /// Whether this client may start a round: it hosts the room and at least
    /// `min_players` are present.
    pub fn can_start_game(&self, min_players: usize) -> bool {
        self.is_host() && self.players.len() >= min_players
    }

    // ── Roster reducers ─────────────────────────────────────────────

    /// Replace the roster wholesale.
    pub fn sync_roster(&mut self, players: Vec<Player>) {
        self.ready_for_rematch
            .retain(|id| players.iter().any(|p| &p.id == id));
        self.players = players;
    }

    /// Apply `player_joined`. A non-empty `players` list replaces the roster;
    /// otherwise `player` is appended, or updated in place if already seated.
    pub fn apply_joined(&mut self, player: Option<Player>, players: Vec<Player>) {
        if !players.is_empty() {
            self.sync_roster(players);
            return;
        }
        let Some(player) = player else {
            return;
        };
        match self.players.iter_mut().find(|p| p.id == player.id) {
            Some(existing) => *existing = player,
            None => self.players.push(player),
        }
    }

    /// Apply `player_left`. A non-empty `players` list replaces the roster;
    /// otherwise the player with `player_id` is removed.
    pub fn apply_left(&mut self, player_id: Option<&str>, players: Vec<Player>) {
        if !players.is_empty() {
            self.sync_roster(players);
            return;
        }
        if let Some(id) = player_id {
            self.players.retain(|p| p.id != id);
            self.ready_for_rematch.remove(id);
        }
    }

    /// Single-field avatar patch. Returns `false` for an unknown player.
    pub fn patch_avatar(&mut self, player_id: &str, avatar_id: u32) -> bool {
        match self.players.iter_mut().find(|p| p.id == player_id) {
            Some(p) => {
                p.avatar_id = avatar_id;
                true
            }
            None => false,
        }
    }

    // ── Round state ─────────────────────────────────────────────────

    pub fn is_spy(&self) -> bool {
        self.is_spy
    }

    pub(crate) fn set_spy_flag(&mut self, is_spy: bool) {
        self.is_spy = is_spy;
    }

    /// The true spy, known only after the vote result arrives.
    pub fn spy_id(&self) -> Option<&str> {
        self.spy_id.as_deref()
    }

    /// Record the spy named by `voting_spy_result`. The only writer of
    /// [`spy_id`](Self::spy_id).
    pub(crate) fn reveal_spy(&mut self, spy_id: PlayerId) {
        self.spy_id = Some(spy_id);
    }

    /// Mark a player ready for a rematch. Returns `false` if already marked.
    pub(crate) fn mark_ready(&mut self, player_id: &str) -> bool {
        self.ready_for_rematch.insert(player_id.to_string())
    }

    pub fn is_ready_for_rematch(&self, player_id: &str) -> bool {
        self.ready_for_rematch.contains(player_id)
    }

    /// Forget everything learned during the previous round.
    pub(crate) fn reset_round(&mut self) {
        self.is_spy = false;
        self.spy_id = None;
        self.ready_for_rematch.clear();
    }
}
