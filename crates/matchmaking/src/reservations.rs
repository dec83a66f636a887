//! Reservation storage and the live-match registry

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Result;
use arena_models::Reservation;
use tokio::time::Instant;
use tracing::debug;

/// Reservation storage backend: a TTL'd key/value store keyed by owner
/// identity, with an atomic get-and-delete for consume-once semantics.
#[async_trait::async_trait]
pub trait ReservationBackend: Send + Sync {
    async fn put(&self, reservation: Reservation) -> Result<()>;
    async fn get(&self, owner_id: &str) -> Result<Option<Reservation>>;
    /// Atomic get-and-delete. Exactly one caller observes the record; all
    /// concurrent callers racing on the same owner read `None`.
    async fn consume(&self, owner_id: &str) -> Result<Option<Reservation>>;
    async fn delete(&self, owner_id: &str) -> Result<bool>;
}

struct StoredReservation {
    reservation: Reservation,
    expires_at: Instant,
}

impl StoredReservation {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory reservation store.
///
/// Per-key atomicity comes from the single write lock; a production
/// deployment would back this trait with a store offering TTL and atomic
/// get-and-delete natively.
pub struct MemoryReservationStore {
    entries: tokio::sync::RwLock<HashMap<String, StoredReservation>>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self {
            entries: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Drop every expired record. Expiry is otherwise lazy: expired entries
    /// read as absent and are removed on the next write touching their key.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, stored| !stored.expired());
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged = purged, "purged expired reservations");
        }
        purged
    }
}

impl Default for MemoryReservationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReservationBackend for MemoryReservationStore {
    async fn put(&self, reservation: Reservation) -> Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(reservation.ttl_secs);
        let mut entries = self.entries.write().await;
        entries.insert(
            reservation.owner_id.clone(),
            StoredReservation {
                reservation,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, owner_id: &str) -> Result<Option<Reservation>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(owner_id)
            .filter(|stored| !stored.expired())
            .map(|stored| stored.reservation.clone()))
    }

    async fn consume(&self, owner_id: &str) -> Result<Option<Reservation>> {
        let mut entries = self.entries.write().await;
        match entries.remove(owner_id) {
            Some(stored) if !stored.expired() => Ok(Some(stored.reservation)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, owner_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(owner_id).is_some())
    }
}

/// Set of currently active match identifiers, queried by the coordinator to
/// decide whether an existing reservation is stale.
pub struct ActiveMatchRegistry {
    matches: tokio::sync::RwLock<HashSet<String>>,
}

impl ActiveMatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: tokio::sync::RwLock::new(HashSet::new()),
        }
    }

    pub async fn register(&self, match_id: &str) {
        let mut matches = self.matches.write().await;
        matches.insert(match_id.to_string());
    }

    pub async fn unregister(&self, match_id: &str) -> bool {
        let mut matches = self.matches.write().await;
        matches.remove(match_id)
    }

    pub async fn contains(&self, match_id: &str) -> bool {
        let matches = self.matches.read().await;
        matches.contains(match_id)
    }

    pub async fn len(&self) -> usize {
        let matches = self.matches.read().await;
        matches.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ActiveMatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
