//! Private room directory keyed by short shareable codes

use std::collections::HashMap;

use arena_models::{
    ArenaError, ArenaResult, PrivateRoomRecord, RoomJoinOutcome, RoomPlayer, ROOM_CAPACITY,
};
use chrono::Utc;
use rand::Rng;
use tracing::{debug, info};

/// Unambiguous alphabet for room codes (no 0/O, 1/I)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

/// Directory of live private rooms.
///
/// All mutations go through the directory write lock, so a join is atomic
/// per room code and a third player can never squeeze into a two-player
/// room.
pub struct RoomDirectory {
    rooms: tokio::sync::RwLock<HashMap<String, PrivateRoomRecord>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Create a room with a freshly generated unique code. Collisions are
    /// resolved by regeneration, never by overwrite.
    pub async fn create(&self, host: RoomPlayer) -> RoomJoinOutcome {
        let mut rooms = self.rooms.write().await;
        let mut code = generate_code();
        while rooms.contains_key(&code) {
            code = generate_code();
        }

        let record = PrivateRoomRecord {
            room_code: code.clone(),
            players: vec![host],
            created_at: Utc::now(),
        };
        rooms.insert(code.clone(), record.clone());
        info!(room_code = %code, "private room created");

        RoomJoinOutcome {
            record,
            is_creator: true,
        }
    }

    /// Join an existing room by code.
    ///
    /// Re-joining by a player already in the room is idempotent and reports
    /// their original creator flag, which keeps client-side polling simple.
    pub async fn join(&self, code: &str, player: RoomPlayer) -> ArenaResult<RoomJoinOutcome> {
        let mut rooms = self.rooms.write().await;
        let record = rooms.get_mut(code).ok_or_else(|| ArenaError::RoomNotFound {
            code: code.to_string(),
        })?;

        if let Some(position) = record
            .players
            .iter()
            .position(|p| p.user_id == player.user_id)
        {
            return Ok(RoomJoinOutcome {
                record: record.clone(),
                is_creator: position == 0,
            });
        }

        if record.players.len() >= ROOM_CAPACITY {
            return Err(ArenaError::RoomFull {
                code: code.to_string(),
            });
        }

        record.players.push(player);
        info!(
            room_code = %code,
            players = record.players.len(),
            "player joined private room"
        );

        Ok(RoomJoinOutcome {
            record: record.clone(),
            is_creator: false,
        })
    }

    /// Read a room record for client-driven polling.
    pub async fn get(&self, code: &str) -> Option<PrivateRoomRecord> {
        let rooms = self.rooms.read().await;
        rooms.get(code).cloned()
    }

    /// Remove a player; an emptied room is dropped from the directory.
    pub async fn leave(&self, code: &str, user_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(record) = rooms.get_mut(code) else {
            return false;
        };
        let before = record.players.len();
        record.players.retain(|p| p.user_id != user_id);
        let removed = record.players.len() < before;
        if record.players.is_empty() {
            rooms.remove(code);
            debug!(room_code = %code, "empty private room removed");
        }
        removed
    }

    /// Remove a room outright, used once a match has started from it.
    pub async fn remove(&self, code: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        rooms.remove(code).is_some()
    }

    /// Drop rooms older than `max_age_secs`. Polling clients observe the
    /// disappearance as `RoomNotFound`.
    pub async fn purge_older_than(&self, max_age_secs: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_secs);
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, record| record.created_at > cutoff);
        let purged = before - rooms.len();
        if purged > 0 {
            info!(purged = purged, "purged expired private rooms");
        }
        purged
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}
