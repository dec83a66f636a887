use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RoomCode, UserId};

/// Maximum participants in a private room
pub const ROOM_CAPACITY: usize = 2;

/// A participant inside a private room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub username: String,
}

impl RoomPlayer {
    pub fn new(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
        }
    }
}

/// Private room pairing record, keyed by a short shareable code.
///
/// Becomes eligible for match start exactly when two players are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateRoomRecord {
    pub room_code: RoomCode,
    pub players: Vec<RoomPlayer>,
    pub created_at: DateTime<Utc>,
}

impl PrivateRoomRecord {
    pub fn is_full(&self) -> bool {
        self.players.len() >= ROOM_CAPACITY
    }
}

/// Result of creating or joining a private room
#[derive(Debug, Clone)]
pub struct RoomJoinOutcome {
    pub record: PrivateRoomRecord,
    pub is_creator: bool,
}
