use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MatchId, RoomId, UserId};

/// A single-use token asserting that a participant has been assigned to a
/// specific match and room. Created by the matchmaking coordinator, consumed
/// at most once during session handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub owner_id: UserId,
    pub match_id: MatchId,
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl Reservation {
    pub fn new(owner_id: &str, match_id: &str, room_id: &str, ttl_secs: u64) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            match_id: match_id.to_string(),
            room_id: room_id.to_string(),
            created_at: Utc::now(),
            ttl_secs,
        }
    }
}

/// Client-held match assignment for anonymous guests.
///
/// Guests have no durable reservation round-trip, so this payload travels
/// with the client and is validated again at join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestMatchData {
    pub guest_id: String,
    pub match_id: MatchId,
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
}
