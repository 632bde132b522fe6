use common::{Phase, PieceColour, PieceId, RejectReason, SeatRequest, Square};
use log::info;

use crate::board::Board;
use crate::rules::{self, CaptureKind};

/// Connection-scoped identity handed out by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub usize);

/// What an accepted move did, for logging and broadcast decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub mover: PieceColour,
    pub to: Square,
    pub captured: Option<PieceId>,
    pub en_passant: bool,
}

#[derive(Debug, Clone, Default)]
struct Seats {
    white: Option<ParticipantId>,
    black: Option<ParticipantId>,
    spectators: Vec<ParticipantId>,
}

/// The authoritative state for one table: board, seats, readiness and turn.
/// Every transition validates its preconditions before mutating anything, so
/// a rejected intent leaves the session exactly as it was.
#[derive(Debug, Clone)]
pub struct Session {
    board: Board,
    seats: Seats,
    turn: PieceColour,
    white_ready: bool,
    black_ready: bool,
    phase: Phase,
}

impl Session {
    pub fn new() -> Session {
        Session::with_board(Board::initial())
    }

    pub fn with_board(board: Board) -> Session {
        Session {
            board,
            seats: Seats::default(),
            turn: PieceColour::White,
            white_ready: false,
            black_ready: false,
            phase: Phase::Lobby,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> PieceColour {
        self.turn
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ready(&self, colour: PieceColour) -> bool {
        match colour {
            PieceColour::White => self.white_ready,
            PieceColour::Black => self.black_ready,
        }
    }

    pub fn seat(&self, colour: PieceColour) -> Option<ParticipantId> {
        match colour {
            PieceColour::White => self.seats.white,
            PieceColour::Black => self.seats.black,
        }
    }

    pub fn spectators(&self) -> &[ParticipantId] {
        &self.seats.spectators
    }

    /// The seat colour held by `participant`, if any.
    pub fn colour_of(&self, participant: ParticipantId) -> Option<PieceColour> {
        if self.seats.white == Some(participant) {
            Some(PieceColour::White)
        } else if self.seats.black == Some(participant) {
            Some(PieceColour::Black)
        } else {
            None
        }
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.colour_of(participant).is_some() || self.seats.spectators.contains(&participant)
    }

    /// New participants start out spectating. No-op for anyone already here.
    pub fn join(&mut self, participant: ParticipantId) {
        if !self.contains(participant) {
            self.seats.spectators.push(participant);
        }
    }

    pub fn choose_seat(
        &mut self,
        participant: ParticipantId,
        request: SeatRequest,
    ) -> Result<(), RejectReason> {
        if !self.contains(participant) {
            return Err(RejectReason::InvalidIntent);
        }
        match request {
            SeatRequest::White => self.take_seat(participant, PieceColour::White),
            SeatRequest::Black => self.take_seat(participant, PieceColour::Black),
            SeatRequest::LeaveWhite => self.leave_seat(participant, PieceColour::White),
            SeatRequest::LeaveBlack => self.leave_seat(participant, PieceColour::Black),
        }
    }

    /// Ready-up from a seated player. Both seats ready flips the phase to
    /// Playing, once; the return value says whether this call did it.
    pub fn mark_ready(&mut self, participant: ParticipantId) -> Result<bool, RejectReason> {
        let colour = self
            .colour_of(participant)
            .ok_or(RejectReason::InvalidIntent)?;
        match colour {
            PieceColour::White => self.white_ready = true,
            PieceColour::Black => self.black_ready = true,
        }
        if self.phase == Phase::Lobby && self.white_ready && self.black_ready {
            self.phase = Phase::Playing;
            self.turn = PieceColour::White;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn submit_move(
        &mut self,
        participant: ParticipantId,
        piece_id: PieceId,
        to: Square,
    ) -> Result<MoveOutcome, RejectReason> {
        if self.phase != Phase::Playing {
            info!("move rejected: game has not started");
            return Err(RejectReason::NotYourTurn);
        }
        let colour = self.colour_of(participant).ok_or(RejectReason::NotYourTurn)?;
        if colour != self.turn {
            info!("move rejected: it is {:?}'s turn, not {:?}'s", self.turn, colour);
            return Err(RejectReason::NotYourTurn);
        }
        if !to.on_board() {
            info!("move rejected: destination ({},{}) is off the board", to.file, to.rank);
            return Err(RejectReason::InvalidIntent);
        }

        let piece = self
            .board
            .piece(piece_id)
            .copied()
            .ok_or(RejectReason::InvalidIntent)?;
        if piece.colour != colour {
            info!("move rejected: {:?} does not own that {:?}", colour, piece.kind);
            return Err(RejectReason::IllegalMove);
        }

        let destinations = rules::legal_destinations(&piece, &self.board);
        let (captured, en_passant) = if destinations.moves.contains(&to) {
            (None, false)
        } else if let Some(capture) = destinations.capture_at(to) {
            (
                Some(capture.victim),
                matches!(capture.kind, CaptureKind::EnPassant { .. }),
            )
        } else {
            info!(
                "move rejected: {:?} at {} cannot reach {}",
                piece.kind, piece.position, to
            );
            return Err(RejectReason::IllegalMove);
        };

        self.board = self.board.apply_move(piece_id, to, captured);
        self.turn = self.turn.opponent();
        Ok(MoveOutcome {
            mover: colour,
            to,
            captured,
            en_passant,
        })
    }

    /// Drops the participant from whichever spot they occupy. A vacated
    /// seat's ready flag resets so the next occupant starts unready.
    pub fn disconnect(&mut self, participant: ParticipantId) {
        self.vacate(participant);
    }

    fn take_seat(
        &mut self,
        participant: ParticipantId,
        colour: PieceColour,
    ) -> Result<(), RejectReason> {
        match self.seat(colour) {
            Some(holder) if holder == participant => return Ok(()),
            Some(_) => {
                info!("seat request rejected: {:?} is already taken", colour);
                return Err(RejectReason::SeatConflict);
            }
            None => (),
        }
        self.vacate(participant);
        self.set_seat(colour, Some(participant));
        Ok(())
    }

    fn leave_seat(
        &mut self,
        participant: ParticipantId,
        colour: PieceColour,
    ) -> Result<(), RejectReason> {
        if self.seat(colour) != Some(participant) {
            info!("seat request rejected: not the {:?} player", colour);
            return Err(RejectReason::SeatConflict);
        }
        self.set_seat(colour, None);
        self.seats.spectators.push(participant);
        Ok(())
    }

    fn vacate(&mut self, participant: ParticipantId) {
        if self.seats.white == Some(participant) {
            self.set_seat(PieceColour::White, None);
        }
        if self.seats.black == Some(participant) {
            self.set_seat(PieceColour::Black, None);
        }
        self.seats.spectators.retain(|&p| p != participant);
    }

    // every occupant change runs through here so readiness cannot go stale
    fn set_seat(&mut self, colour: PieceColour, occupant: Option<ParticipantId>) {
        match colour {
            PieceColour::White => {
                self.seats.white = occupant;
                self.white_ready = false;
            }
            PieceColour::Black => {
                self.seats.black = occupant;
                self.black_ready = false;
            }
        }
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}
