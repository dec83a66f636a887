//! Player-side reservation consumption and session join

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arena_models::{ArenaError, ArenaResult, GuestMatchData, MatchId, RoomId, UserId};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::reservations::ReservationBackend;

/// Caller identity presented to the session transport
#[derive(Debug, Clone)]
pub struct JoinIdentity {
    pub user_id: UserId,
    pub match_id: MatchId,
}

/// Live session membership returned by a successful join.
///
/// Carries the match id so submission routing and result display correlate
/// without a second lookup.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub room_id: RoomId,
    pub match_id: MatchId,
    pub joined_at: DateTime<Utc>,
}

/// Seam to the real-time transport that owns match sessions. The transport
/// itself is out of scope; the core only depends on this join operation and
/// its typed failures.
#[async_trait::async_trait]
pub trait SessionGateway: Send + Sync {
    async fn join(&self, room_id: &str, identity: JoinIdentity) -> ArenaResult<SessionHandle>;
}

/// Converts a consumed reservation into live session membership.
pub struct RoomHandoffClient {
    reservations: Arc<dyn ReservationBackend>,
    gateway: Arc<dyn SessionGateway>,
    cleanup_failures: AtomicU64,
}

impl RoomHandoffClient {
    pub fn new(reservations: Arc<dyn ReservationBackend>, gateway: Arc<dyn SessionGateway>) -> Self {
        Self {
            reservations,
            gateway,
            cleanup_failures: AtomicU64::new(0),
        }
    }

    /// Authenticated flow: consume the caller's reservation, then join.
    ///
    /// An empty consume is `ReservationExpired` and must not be retried
    /// against the same reservation. "Room full" and "room not found" are
    /// terminal: the reservation is abandoned and the caller returns to
    /// matchmaking. Any other join failure triggers best-effort reservation
    /// cleanup before the original error propagates.
    pub async fn join_authenticated(&self, owner_id: &str) -> ArenaResult<SessionHandle> {
        let reservation = self
            .reservations
            .consume(owner_id)
            .await?
            .ok_or(ArenaError::ReservationExpired)?;

        let identity = JoinIdentity {
            user_id: owner_id.to_string(),
            match_id: reservation.match_id.clone(),
        };

        match self.gateway.join(&reservation.room_id, identity).await {
            Ok(handle) => {
                info!(
                    owner_id = owner_id,
                    match_id = %handle.match_id,
                    "joined match session"
                );
                Ok(handle)
            }
            Err(err @ ArenaError::RoomFull { .. }) | Err(err @ ArenaError::RoomNotFound { .. }) => {
                Err(err)
            }
            Err(err) => {
                self.cleanup_reservation(owner_id).await;
                Err(err)
            }
        }
    }

    /// Guest flow: the match assignment is held client-side. Missing or
    /// malformed data is fatal; the caller restarts matchmaking from
    /// scratch rather than retrying the join.
    pub async fn join_guest(&self, data: Option<GuestMatchData>) -> ArenaResult<SessionHandle> {
        let data = data.ok_or_else(|| ArenaError::InvalidMatchData {
            reason: "missing guest match data".to_string(),
        })?;
        if data.match_id.is_empty() || data.room_id.is_empty() {
            return Err(ArenaError::InvalidMatchData {
                reason: "guest match data missing match or room id".to_string(),
            });
        }

        let identity = JoinIdentity {
            user_id: data.guest_id.clone(),
            match_id: data.match_id.clone(),
        };
        let handle = self.gateway.join(&data.room_id, identity).await?;
        info!(
            guest_id = %data.guest_id,
            match_id = %handle.match_id,
            "guest joined match session"
        );
        Ok(handle)
    }

    /// Best-effort, non-fatal reservation cleanup. Its own failure is logged
    /// and counted but never masks the error that led here.
    async fn cleanup_reservation(&self, owner_id: &str) {
        if let Err(err) = self.reservations.delete(owner_id).await {
            self.cleanup_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                owner_id = owner_id,
                error = %err,
                "best-effort reservation cleanup failed"
            );
        }
    }

    /// Lifetime count of failed best-effort cleanups, for observability.
    pub fn cleanup_failures(&self) -> u64 {
        self.cleanup_failures.load(Ordering::Relaxed)
    }
}
