//! Local input checks run before anything is sent.

use thiserror::Error;

/// Length of a room code.
pub const ROOM_CODE_LEN: usize = 8;

/// Maximum number of characters in a player name.
pub const MAX_NAME_CHARS: usize = 12;

/// Why a piece of local input was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("player name must not be empty")]
    EmptyName,

    #[error("player name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("room code must be 8 uppercase letters or digits")]
    InvalidRoomCode,

    #[error("drawing prompt must not be empty")]
    EmptyPrompt,

    #[error("keyword guess must not be empty")]
    EmptyGuess,

    #[error("unknown option {index} (have {available})")]
    OptionOutOfRange { index: usize, available: usize },

    #[error("no such player: {0}")]
    UnknownPlayer(String),

    #[error("you cannot vote for yourself")]
    SelfVote,

    #[error("it is not your turn to show artwork")]
    NotYourTurn,

    #[error("only the spy can guess the keyword")]
    NotSpy,

    #[error("only the host can start the game")]
    NotHost,

    #[error("at least {min} players are needed to start (have {have})")]
    NotEnoughPlayers { min: usize, have: usize },

    #[error("the room is full ({max} players)")]
    RoomFull { max: usize },

    #[error("you are not in a room")]
    NotInRoom,

    #[error("that action is not available right now")]
    WrongPhase,

    #[error("no saved session to resume")]
    NoSession,
}

/// Input format checks.
pub trait Validator: Send {
    /// Check a display name.
    fn player_name(&self, name: &str) -> Result<(), ValidationError>;

    /// Check a room code.
    fn room_code(&self, code: &str) -> Result<(), ValidationError>;
}

/// Name of 1–12 non-blank characters; room code of exactly eight `[A-Z0-9]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl Validator for DefaultValidator {
    fn player_name(&self, name: &str) -> Result<(), ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if trimmed.chars().count() > MAX_NAME_CHARS {
            return Err(ValidationError::NameTooLong {
                max: MAX_NAME_CHARS,
            });
        }
        Ok(())
    }

    fn room_code(&self, code: &str) -> Result<(), ValidationError> {
        let valid = code.len() == ROOM_CODE_LEN
            && code
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidRoomCode)
        }
    }
}
