use common::{Piece, PieceColour, PieceId, PieceKind, Square};

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

/// The authoritative piece collection for one session. `last_moved` records
/// the piece moved on the immediately preceding ply, which is what makes a
/// pawn en-passant-capturable for exactly one reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pieces: Vec<Piece>,
    last_moved: Option<PieceId>,
}

impl Board {
    /// The standard starting position.
    pub fn initial() -> Board {
        let mut pieces = Vec::with_capacity(32);
        let mut next = 0;
        for colour in [PieceColour::Black, PieceColour::White] {
            for (file, &kind) in BACK_RANK.iter().enumerate() {
                let position = Square {
                    file: file as u8,
                    rank: colour.back_rank(),
                };
                pieces.push(Piece::new(PieceId(next), kind, colour, position));
                next += 1;
            }
            for file in 0..8 {
                let position = Square {
                    file,
                    rank: colour.pawn_rank(),
                };
                pieces.push(Piece::new(PieceId(next), PieceKind::Pawn, colour, position));
                next += 1;
            }
        }
        Board {
            pieces,
            last_moved: None,
        }
    }

    /// An arbitrary position, for scenario setup.
    pub fn from_pieces(pieces: Vec<Piece>) -> Board {
        Board {
            pieces,
            last_moved: None,
        }
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|piece| piece.id == id)
    }

    pub fn piece_at(&self, square: Square) -> Option<&Piece> {
        self.pieces.iter().find(|piece| piece.position == square)
    }

    pub fn is_occupied(&self, square: Square) -> bool {
        self.piece_at(square).is_some()
    }

    pub fn find<F>(&self, predicate: F) -> Option<&Piece>
    where
        F: Fn(&Piece) -> bool,
    {
        self.pieces.iter().find(|piece| predicate(piece))
    }

    pub fn last_moved(&self) -> Option<PieceId> {
        self.last_moved
    }

    /// A fresh snapshot with `id` moved to `to`, the captured piece (if any)
    /// removed, and the mover's bookkeeping updated. The input board is left
    /// untouched, so callers can simulate candidate moves on scratch copies.
    pub fn apply_move(&self, id: PieceId, to: Square, captured: Option<PieceId>) -> Board {
        let pieces = self
            .pieces
            .iter()
            .filter(|piece| Some(piece.id) != captured)
            .map(|piece| {
                if piece.id == id {
                    Piece {
                        position: to,
                        prev_position: piece.position,
                        has_moved: true,
                        ..*piece
                    }
                } else {
                    *piece
                }
            })
            .collect();
        Board {
            pieces,
            last_moved: Some(id),
        }
    }
}
