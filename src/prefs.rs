//! Flat key-value session cache.
//!
//! Everything stored here is a non-authoritative hint: it may be discarded at
//! any time and the server's next event always wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::protocol::{Player, RoomCode};

pub const CURRENT_ROOM: &str = "currentRoom";
pub const CURRENT_PLAYER: &str = "currentPlayer";
pub const GAME_PHASE: &str = "gamePhase";
pub const AUDIO_ENABLED: &str = "audioEnabled";
pub const AUDIO_VOLUME: &str = "audioVolume";

/// JSON-valued key-value store.
pub trait Preferences: Send {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str);
}

/// Typed helpers over any [`Preferences`].
pub trait PreferencesExt: Preferences {
    /// Read `key`, falling back to `default` when absent or of the wrong shape.
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(key, "ignoring malformed preference: {e}");
                default
            }),
            None => default,
        }
    }

    fn set_value<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(v) => self.set(key, v),
            Err(e) => warn!(key, "cannot store preference: {e}"),
        }
    }
}

impl<P: Preferences + ?Sized> PreferencesExt for P {}

/// In-memory [`Preferences`]. Clones share storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryPreferences {
    values: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// What is needed to ask the server for our seat back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSession {
    pub room_id: RoomCode,
    pub player: Player,
    pub phase: Option<String>,
}

/// Session keys on top of a [`Preferences`] store.
pub struct SessionCache {
    prefs: Box<dyn Preferences>,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").finish_non_exhaustive()
    }
}

impl SessionCache {
    pub fn new(prefs: Box<dyn Preferences>) -> Self {
        Self { prefs }
    }

    pub fn save_room(&mut self, room_id: &str, player: &Player) {
        self.prefs.set_value(CURRENT_ROOM, &room_id);
        self.prefs.set_value(CURRENT_PLAYER, player);
    }

    pub fn save_phase(&mut self, phase: &str) {
        self.prefs.set_value(GAME_PHASE, &phase);
    }

    /// The saved session, if both room and player are present.
    pub fn load(&self) -> Option<SavedSession> {
        let room_id: Option<RoomCode> = self.prefs.get_or(CURRENT_ROOM, None);
        let player: Option<Player> = self.prefs.get_or(CURRENT_PLAYER, None);
        Some(SavedSession {
            room_id: room_id?,
            player: player?,
            phase: self.prefs.get_or(GAME_PHASE, None),
        })
    }

    pub fn clear(&mut self) {
        for key in [CURRENT_ROOM, CURRENT_PLAYER, GAME_PHASE] {
            self.prefs.remove(key);
        }
    }

    pub fn audio_enabled(&self) -> bool {
        self.prefs.get_or(AUDIO_ENABLED, true)
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.prefs.set_value(AUDIO_ENABLED, &enabled);
    }

    /// Volume in `0.0..=1.0`.
    pub fn audio_volume(&self) -> f64 {
        self.prefs.get_or(AUDIO_VOLUME, 0.7_f64).clamp(0.0, 1.0)
    }

    pub fn set_audio_volume(&mut self, volume: f64) {
        self.prefs.set_value(AUDIO_VOLUME, &volume.clamp(0.0, 1.0));
    }
}
