//! Matchmaking coordination across the three pairing modes

use std::collections::HashSet;
use std::sync::Arc;

use arena_models::{
    ArenaError, ArenaResult, GuestMatchData, PrivateRoomRecord, Reservation, RoomPlayer,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::reservations::{ActiveMatchRegistry, ReservationBackend};
use crate::rooms::RoomDirectory;

/// A player waiting in the public queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub user_id: String,
    pub username: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Pairing selection over the public queue.
///
/// The selection criteria (rating proximity, wait-time expansion and so on)
/// are deliberately external to this core; implementations return the
/// indices of the two players to pair, or `None` to keep waiting.
pub trait PairingPolicy: Send + Sync {
    fn select_pair(&self, pool: &[QueuedPlayer]) -> Option<(usize, usize)>;
}

/// Trivial first-come-first-paired policy for wiring and tests.
pub struct FifoPairing;

impl PairingPolicy for FifoPairing {
    fn select_pair(&self, pool: &[QueuedPlayer]) -> Option<(usize, usize)> {
        if pool.len() >= 2 {
            Some((0, 1))
        } else {
            None
        }
    }
}

/// Outcome of entering the public queue
#[derive(Debug, Clone)]
pub enum QueueOutcome {
    /// Still waiting for an opponent; poll `poll_reservation`.
    Waiting,
    /// Paired (or reconnected to a still-active match).
    Matched { reservation: Reservation },
}

/// Outcome of a private room operation
#[derive(Debug, Clone)]
pub enum RoomEntry {
    /// The caller already holds a reservation for a still-active match.
    Reconnect { reservation: Reservation },
    /// In the room, waiting for the second player.
    Waiting {
        room: PrivateRoomRecord,
        is_creator: bool,
    },
    /// Second player arrived: reservations exist for both participants.
    Ready {
        room: PrivateRoomRecord,
        is_creator: bool,
        reservation: Reservation,
    },
}

/// Orchestrates public-queue, private-room and guest pairing, writing one
/// reservation per participant and policing reservation staleness.
pub struct MatchmakingCoordinator {
    reservations: Arc<dyn ReservationBackend>,
    active_matches: Arc<ActiveMatchRegistry>,
    rooms: Arc<RoomDirectory>,
    policy: Arc<dyn PairingPolicy>,
    queue: tokio::sync::Mutex<Vec<QueuedPlayer>>,
    guests_played: tokio::sync::RwLock<HashSet<String>>,
    reservation_ttl_secs: u64,
}

impl MatchmakingCoordinator {
    pub fn new(
        reservations: Arc<dyn ReservationBackend>,
        active_matches: Arc<ActiveMatchRegistry>,
        rooms: Arc<RoomDirectory>,
        policy: Arc<dyn PairingPolicy>,
        reservation_ttl_secs: u64,
    ) -> Self {
        Self {
            reservations,
            active_matches,
            rooms,
            policy,
            queue: tokio::sync::Mutex::new(Vec::new()),
            guests_played: tokio::sync::RwLock::new(HashSet::new()),
            reservation_ttl_secs,
        }
    }

    /// Enter the public matchmaking queue.
    ///
    /// A player holding a reservation for a still-active match reconnects to
    /// it instead of being paired again. A stale reservation is deleted and
    /// the request proceeds fresh.
    pub async fn enqueue_public(&self, user_id: &str, username: &str) -> ArenaResult<QueueOutcome> {
        if let Some(existing) = self.reconnectable(user_id).await? {
            return Ok(QueueOutcome::Matched {
                reservation: existing,
            });
        }

        let mut queue = self.queue.lock().await;
        if !queue.iter().any(|p| p.user_id == user_id) {
            queue.push(QueuedPlayer {
                user_id: user_id.to_string(),
                username: username.to_string(),
                enqueued_at: Utc::now(),
            });
            debug!(user_id = user_id, pool = queue.len(), "entered public queue");
        }

        let Some((first, second)) = self.policy.select_pair(&queue) else {
            return Ok(QueueOutcome::Waiting);
        };

        // Remove the higher index first so the lower one stays valid.
        let (hi, lo) = if first > second {
            (first, second)
        } else {
            (second, first)
        };
        let player_a = queue.remove(hi);
        let player_b = queue.remove(lo);
        drop(queue);

        let (res_a, res_b) = self
            .create_match(&player_a.user_id, &player_b.user_id)
            .await?;
        info!(
            match_id = %res_a.match_id,
            first = %player_a.user_id,
            second = %player_b.user_id,
            "public queue pair matched"
        );

        if player_a.user_id == user_id {
            Ok(QueueOutcome::Matched { reservation: res_a })
        } else if player_b.user_id == user_id {
            Ok(QueueOutcome::Matched { reservation: res_b })
        } else {
            // The policy paired two other players; the caller keeps waiting.
            Ok(QueueOutcome::Waiting)
        }
    }

    /// Re-run pairing selection over the waiting pool until the policy
    /// declines. Lets a time-sensitive policy (wait-based expansion) make
    /// progress without a new entrant; matched players pick their
    /// reservations up via `poll_reservation`.
    pub async fn run_pairing(&self) -> ArenaResult<usize> {
        let mut paired = 0;
        loop {
            let mut queue = self.queue.lock().await;
            let Some((first, second)) = self.policy.select_pair(&queue) else {
                return Ok(paired);
            };
            let (hi, lo) = if first > second {
                (first, second)
            } else {
                (second, first)
            };
            let player_a = queue.remove(hi);
            let player_b = queue.remove(lo);
            drop(queue);

            let (res_a, _) = self
                .create_match(&player_a.user_id, &player_b.user_id)
                .await?;
            info!(
                match_id = %res_a.match_id,
                first = %player_a.user_id,
                second = %player_b.user_id,
                "pairing tick matched players"
            );
            paired += 1;
        }
    }

    /// Remove a player from the public queue.
    pub async fn leave_public_queue(&self, user_id: &str) -> bool {
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|p| p.user_id != user_id);
        queue.len() < before
    }

    /// Poll for a reservation produced after a `Waiting` outcome.
    pub async fn poll_reservation(&self, user_id: &str) -> ArenaResult<Option<Reservation>> {
        Ok(self.reservations.get(user_id).await?)
    }

    /// Create a private room and enter it as its creator.
    pub async fn create_private_room(
        &self,
        user_id: &str,
        username: &str,
    ) -> ArenaResult<RoomEntry> {
        if let Some(existing) = self.reconnectable(user_id).await? {
            return Ok(RoomEntry::Reconnect {
                reservation: existing,
            });
        }

        let outcome = self.rooms.create(RoomPlayer::new(user_id, username)).await;
        Ok(RoomEntry::Waiting {
            room: outcome.record,
            is_creator: outcome.is_creator,
        })
    }

    /// Join a private room by code. The second distinct joiner triggers
    /// reservation creation for both participants.
    pub async fn join_private_room(
        &self,
        code: &str,
        user_id: &str,
        username: &str,
    ) -> ArenaResult<RoomEntry> {
        if let Some(existing) = self.reconnectable(user_id).await? {
            return Ok(RoomEntry::Reconnect {
                reservation: existing,
            });
        }

        let outcome = self
            .rooms
            .join(code, RoomPlayer::new(user_id, username))
            .await?;

        if !outcome.record.is_full() {
            return Ok(RoomEntry::Waiting {
                room: outcome.record,
                is_creator: outcome.is_creator,
            });
        }

        let creator_id = outcome.record.players[0].user_id.clone();
        let (res_creator, res_joiner) = self.create_match(&creator_id, user_id).await?;
        // The room is consumed by match start: pollers observe RoomNotFound
        // and pick their reservation up instead.
        self.rooms.remove(code).await;
        info!(
            room_code = %code,
            match_id = %res_creator.match_id,
            "private room filled, match created"
        );

        let reservation = if outcome.is_creator {
            res_creator
        } else {
            res_joiner
        };
        Ok(RoomEntry::Ready {
            room: outcome.record,
            is_creator: outcome.is_creator,
            reservation,
        })
    }

    /// Read a private room for client-driven polling. Once a match has
    /// started from the room (or it expired) this is `RoomNotFound` and the
    /// caller falls back to `poll_reservation`.
    pub async fn poll_private_room(&self, code: &str) -> ArenaResult<PrivateRoomRecord> {
        self.rooms
            .get(code)
            .await
            .ok_or_else(|| ArenaError::RoomNotFound {
                code: code.to_string(),
            })
    }

    /// Request a one-shot guest match.
    ///
    /// A guest identity that already completed a match is routed to the
    /// terminal "already played" state instead of a new assignment. The
    /// returned payload stays client-side; guests have no durable
    /// reservation round-trip.
    pub async fn request_guest_match(&self, guest_id: &str) -> ArenaResult<GuestMatchData> {
        {
            let played = self.guests_played.read().await;
            if played.contains(guest_id) {
                return Err(ArenaError::AlreadyPlayed {
                    guest_id: guest_id.to_string(),
                });
            }
        }

        let match_id = Uuid::new_v4().to_string();
        let room_id = Uuid::new_v4().to_string();
        self.active_matches.register(&match_id).await;
        info!(guest_id = guest_id, match_id = %match_id, "guest match assigned");

        Ok(GuestMatchData {
            guest_id: guest_id.to_string(),
            match_id,
            room_id,
            created_at: Utc::now(),
        })
    }

    /// Record a completed guest match; later requests for this identity
    /// short-circuit into `AlreadyPlayed`.
    pub async fn complete_guest_match(&self, guest_id: &str, match_id: &str) {
        let mut played = self.guests_played.write().await;
        played.insert(guest_id.to_string());
        drop(played);
        self.active_matches.unregister(match_id).await;
        info!(guest_id = guest_id, match_id = match_id, "guest match completed");
    }

    /// Mark a match finished: it leaves the live registry, so any leftover
    /// reservation pointing at it is stale from now on.
    pub async fn end_match(&self, match_id: &str) {
        self.active_matches.unregister(match_id).await;
        debug!(
            match_id = match_id,
            active = self.active_matches.len().await,
            "match ended"
        );
    }

    /// Existing-reservation check.
    ///
    /// Returns the reservation when its match is still live (reconnect).
    /// A stale one is deleted here; the check-then-act is not atomic against
    /// concurrent coordinators, which is tolerated because consume-once on
    /// the reservation record absorbs any duplicate.
    async fn reconnectable(&self, user_id: &str) -> ArenaResult<Option<Reservation>> {
        let Some(existing) = self.reservations.get(user_id).await? else {
            return Ok(None);
        };

        if self.active_matches.contains(&existing.match_id).await {
            info!(
                user_id = user_id,
                match_id = %existing.match_id,
                "existing active reservation reused"
            );
            return Ok(Some(existing));
        }

        warn!(
            user_id = user_id,
            match_id = %existing.match_id,
            "deleting stale reservation"
        );
        self.reservations.delete(user_id).await?;
        Ok(None)
    }

    /// Create one match and a reservation for each participant.
    async fn create_match(
        &self,
        first_id: &str,
        second_id: &str,
    ) -> ArenaResult<(Reservation, Reservation)> {
        let match_id = Uuid::new_v4().to_string();
        let room_id = Uuid::new_v4().to_string();

        let res_first = Reservation::new(first_id, &match_id, &room_id, self.reservation_ttl_secs);
        let res_second =
            Reservation::new(second_id, &match_id, &room_id, self.reservation_ttl_secs);

        self.reservations.put(res_first.clone()).await?;
        self.reservations.put(res_second.clone()).await?;
        self.active_matches.register(&match_id).await;

        Ok((res_first, res_second))
    }
}
