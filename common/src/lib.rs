use std::fmt;

use serde::{Deserialize, Serialize};

/// A board coordinate. Files and ranks both run 0-7; rank 0 is Black's back
/// rank and rank 7 is White's.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub file: u8,
    pub rank: u8,
}

impl Square {
    pub fn new(file: u8, rank: u8) -> Option<Square> {
        let square = Square { file, rank };
        if square.on_board() {
            Some(square)
        } else {
            None
        }
    }

    /// Whether the coordinates fall inside the 8x8 board. Wire input is not
    /// validated at decode time, so lookups must check this first.
    pub fn on_board(self) -> bool {
        self.file < 8 && self.rank < 8
    }

    /// The square `df` files and `dr` ranks away, or None if that leaves the
    /// board.
    pub fn offset(self, df: i8, dr: i8) -> Option<Square> {
        let file = self.file as i8 + df;
        let rank = self.rank as i8 + dr;
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Some(Square {
                file: file as u8,
                rank: rank as u8,
            })
        } else {
            None
        }
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.file, self.rank)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PieceColour {
    White,
    Black,
}

impl PieceColour {
    pub fn opponent(self) -> PieceColour {
        match self {
            PieceColour::White => PieceColour::Black,
            PieceColour::Black => PieceColour::White,
        }
    }

    /// Rank direction this colour's pawns advance in. White starts on ranks
    /// 6-7 and pushes toward rank 0, Black the other way.
    pub fn forward(self) -> i8 {
        match self {
            PieceColour::White => -1,
            PieceColour::Black => 1,
        }
    }

    pub fn pawn_rank(self) -> u8 {
        match self {
            PieceColour::White => 6,
            PieceColour::Black => 1,
        }
    }

    pub fn back_rank(self) -> u8 {
        match self {
            PieceColour::White => 7,
            PieceColour::Black => 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PieceKind {
    King,
    Queen,
    Rook,
    Bishop,
    Knight,
    Pawn,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PieceId(pub u32);

/// One piece on the board. `prev_position` and `has_moved` exist solely so
/// the rules engine can tell whether a pawn just made a two-square advance.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    pub id: PieceId,
    pub kind: PieceKind,
    pub colour: PieceColour,
    pub position: Square,
    pub prev_position: Square,
    pub has_moved: bool,
}

impl Piece {
    pub fn new(id: PieceId, kind: PieceKind, colour: PieceColour, position: Square) -> Piece {
        Piece {
            id,
            kind,
            colour,
            position,
            prev_position: position,
            has_moved: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeatRequest {
    White,
    Black,
    LeaveWhite,
    LeaveBlack,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Playing,
}

/// Why an intent was refused. Sent back to the submitting client so it can
/// tell "wait your turn" apart from "that square is unreachable".
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidIntent,
    IllegalMove,
    NotYourTurn,
    SeatConflict,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            RejectReason::InvalidIntent => "invalid request",
            RejectReason::IllegalMove => "illegal move",
            RejectReason::NotYourTurn => "it's not your turn",
            RejectReason::SeatConflict => "seat unavailable",
        };
        write!(f, "{}", text)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub id: u64,
    pub name: String,
}

/// Seat, readiness and turn state as broadcast to every participant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionView {
    pub white: Option<UserEntry>,
    pub black: Option<UserEntry>,
    pub spectators: Vec<UserEntry>,
    pub turn: PieceColour,
    pub white_ready: bool,
    pub black_ready: bool,
    pub phase: Phase,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub from: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SetIdentity { name: String },
    ChooseSeat { seat: SeatRequest },
    MarkReady,
    SubmitMove { piece: PieceId, to: Square, en_passant: bool },
    RequestSnapshot,
    Chat { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RosterChanged { users: Vec<UserEntry> },
    SessionStateChanged { session: SessionView },
    BoardChanged { pieces: Vec<Piece> },
    MoveRejected { reason: RejectReason },
    Snapshot { pieces: Vec<Piece>, session: SessionView },
    Chat { line: ChatLine },
    ChatHistory { lines: Vec<ChatLine> },
}
