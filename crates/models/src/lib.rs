pub mod errors;
pub mod reservation;
pub mod room;
pub mod testcase;

pub use errors::*;
pub use reservation::*;
pub use room::*;
pub use testcase::*;

/// User identity as issued by the session layer
pub type UserId = String;

/// Match identifier shared by both participants of a pairing
pub type MatchId = String;

/// Room identifier of a live match session
pub type RoomId = String;

/// Short human-shareable private room code
pub type RoomCode = String;
