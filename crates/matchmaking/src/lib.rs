//! Matchmaking reservation and handoff protocol.
//!
//! Players enter through one of three pairing modes (public queue, private
//! room code, anonymous guest); each pairing writes exactly one TTL'd
//! [`Reservation`](arena_models::Reservation) per participant, which the
//! [`RoomHandoffClient`] consumes at most once to join the live session.

pub mod coordinator;
pub mod handoff;
pub mod reservations;
pub mod rooms;

pub use coordinator::{
    FifoPairing, MatchmakingCoordinator, PairingPolicy, QueueOutcome, QueuedPlayer, RoomEntry,
};
pub use handoff::{JoinIdentity, RoomHandoffClient, SessionGateway, SessionHandle};
pub use reservations::{ActiveMatchRegistry, MemoryReservationStore, ReservationBackend};
pub use rooms::RoomDirectory;
