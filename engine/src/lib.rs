pub mod board;
pub mod rules;
pub mod session;

pub use board::Board;
pub use rules::{attacked, legal_destinations, Capture, CaptureKind, Destinations};
pub use session::{MoveOutcome, ParticipantId, Session};
