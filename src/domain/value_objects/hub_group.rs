//! Hub group addressing.
//!
//! A hub group is a named subscription scope on the real-time layer. Every
//! authenticated connection of a user is in `user_{id}`; connections opt into
//! `room_{name}` explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum room name length in characters.
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Why a room name was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomNameError {
    #[error("Room name must not be empty")]
    Empty,

    #[error("Room name must be at most {MAX_ROOM_NAME_LEN} characters")]
    TooLong,

    #[error("Room name may only contain letters, digits, '_', ':' and '-'")]
    InvalidCharacter,
}

/// A validated room name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(name: impl Into<String>) -> Result<Self, RoomNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RoomNameError::Empty);
        }
        if name.chars().count() > MAX_ROOM_NAME_LEN {
            return Err(RoomNameError::TooLong);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-'))
        {
            return Err(RoomNameError::InvalidCharacter);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = RoomNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(room: RoomName) -> Self {
        room.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target of a hub broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HubGroup {
    /// All connections of one user.
    User(i64),
    /// All connections that joined a room.
    Room(RoomName),
}

impl HubGroup {
    pub fn user(user_id: i64) -> Self {
        Self::User(user_id)
    }

    pub fn room(name: RoomName) -> Self {
        Self::Room(name)
    }

    /// Group key used by the hub's membership maps.
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("user_{}", id),
            Self::Room(name) => format!("room_{}", name),
        }
    }
}

impl fmt::Display for HubGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
