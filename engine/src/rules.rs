use common::{Piece, PieceColour, PieceId, PieceKind, Square};
use itertools::Itertools;
use log::debug;

use crate::board::Board;

const ORTHOGONAL: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const KNIGHT: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Ordinary,
    /// The victim is not on the destination square but on `victim_square`,
    /// one rank behind it.
    EnPassant { victim_square: Square },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub square: Square,
    pub victim: PieceId,
    pub kind: CaptureKind,
}

/// Everywhere one piece may go: plain moves onto empty squares, and captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Destinations {
    pub moves: Vec<Square>,
    pub captures: Vec<Capture>,
}

impl Destinations {
    pub fn capture_at(&self, square: Square) -> Option<&Capture> {
        self.captures.iter().find(|capture| capture.square == square)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.captures.is_empty()
    }
}

/// The full legal destination set for `piece`: raw generation filtered so
/// that no accepted candidate leaves the mover's own king capturable.
pub fn legal_destinations(piece: &Piece, board: &Board) -> Destinations {
    let raw = raw_destinations(piece, board);
    let mut out = Destinations::default();

    for &square in &raw.moves {
        if king_safe_after(board, piece, square, None) {
            out.moves.push(square);
        } else {
            debug!("{:?} {} -> {} exposes own king", piece.kind, piece.position, square);
        }
    }
    for &capture in &raw.captures {
        if king_safe_after(board, piece, capture.square, Some(capture.victim)) {
            out.captures.push(capture);
        } else {
            debug!(
                "{:?} {} x {} exposes own king",
                piece.kind, piece.position, capture.square
            );
        }
    }
    out
}

/// True if any piece of `colour` could capture onto `square`. Raw geometry
/// only: pawns count with their two forward diagonals, and rays stop at the
/// first blocker.
pub fn attacked(board: &Board, square: Square, colour: PieceColour) -> bool {
    board
        .pieces()
        .iter()
        .filter(|piece| piece.colour == colour)
        .any(|piece| {
            raw_destinations(piece, board)
                .captures
                .iter()
                .any(|capture| capture.square == square)
        })
}

fn king_safe_after(board: &Board, piece: &Piece, to: Square, captured: Option<PieceId>) -> bool {
    let scratch = board.apply_move(piece.id, to, captured);
    match scratch.find(|p| p.kind == PieceKind::King && p.colour == piece.colour) {
        Some(king) => !attacked(&scratch, king.position, piece.colour.opponent()),
        // no king on the board, nothing to defend
        None => true,
    }
}

fn raw_destinations(piece: &Piece, board: &Board) -> Destinations {
    let mut out = Destinations::default();
    match piece.kind {
        PieceKind::King => {
            for (df, dr) in (-1i8..=1).cartesian_product(-1i8..=1) {
                if df == 0 && dr == 0 {
                    continue;
                }
                step_to(piece, board, df, dr, &mut out);
            }
        }
        PieceKind::Knight => {
            for &(df, dr) in &KNIGHT {
                step_to(piece, board, df, dr, &mut out);
            }
        }
        PieceKind::Rook => rays(piece, board, &ORTHOGONAL, &mut out),
        PieceKind::Bishop => rays(piece, board, &DIAGONAL, &mut out),
        PieceKind::Queen => {
            rays(piece, board, &ORTHOGONAL, &mut out);
            rays(piece, board, &DIAGONAL, &mut out);
        }
        PieceKind::Pawn => pawn_destinations(piece, board, &mut out),
    }
    out
}

/// Single-square candidate for kings and knights.
fn step_to(piece: &Piece, board: &Board, df: i8, dr: i8, out: &mut Destinations) {
    let Some(square) = piece.position.offset(df, dr) else {
        return;
    };
    match board.piece_at(square) {
        None => out.moves.push(square),
        Some(other) if other.colour != piece.colour => out.captures.push(Capture {
            square,
            victim: other.id,
            kind: CaptureKind::Ordinary,
        }),
        Some(_) => (),
    }
}

fn rays(piece: &Piece, board: &Board, directions: &[(i8, i8)], out: &mut Destinations) {
    for &(df, dr) in directions {
        let mut square = piece.position;
        while let Some(next) = square.offset(df, dr) {
            match board.piece_at(next) {
                None => {
                    out.moves.push(next);
                    square = next;
                }
                Some(other) => {
                    // the ray stops here; the blocker is a capture only if
                    // it belongs to the other side
                    if other.colour != piece.colour {
                        out.captures.push(Capture {
                            square: next,
                            victim: other.id,
                            kind: CaptureKind::Ordinary,
                        });
                    }
                    break;
                }
            }
        }
    }
}

fn pawn_destinations(piece: &Piece, board: &Board, out: &mut Destinations) {
    let forward = piece.colour.forward();

    if let Some(one) = piece.position.offset(0, forward) {
        if !board.is_occupied(one) {
            out.moves.push(one);
            if piece.position.rank == piece.colour.pawn_rank() {
                if let Some(two) = piece.position.offset(0, 2 * forward) {
                    if !board.is_occupied(two) {
                        out.moves.push(two);
                    }
                }
            }
        }
    }

    for df in [-1i8, 1] {
        let Some(target) = piece.position.offset(df, forward) else {
            continue;
        };
        match board.piece_at(target) {
            Some(other) if other.colour != piece.colour => out.captures.push(Capture {
                square: target,
                victim: other.id,
                kind: CaptureKind::Ordinary,
            }),
            Some(_) => (),
            None => {
                // en passant: an enemy pawn alongside us that double-advanced
                // on the immediately preceding ply
                let Some(beside) = piece.position.offset(df, 0) else {
                    continue;
                };
                if let Some(victim) = board.piece_at(beside) {
                    let just_double_advanced = board.last_moved() == Some(victim.id)
                        && (victim.prev_position.rank as i8 - victim.position.rank as i8).abs() == 2;
                    if victim.kind == PieceKind::Pawn
                        && victim.colour != piece.colour
                        && just_double_advanced
                    {
                        out.captures.push(Capture {
                            square: target,
                            victim: victim.id,
                            kind: CaptureKind::EnPassant {
                                victim_square: beside,
                            },
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn piece(id: u32, kind: PieceKind, colour: PieceColour, file: u8, rank: u8) -> Piece {
        Piece::new(PieceId(id), kind, colour, Square { file, rank })
    }

    fn sq(file: u8, rank: u8) -> Square {
        Square { file, rank }
    }

    #[test]
    fn rook_rays_stop_at_the_first_occupied_square() {
        let rook = piece(0, PieceKind::Rook, PieceColour::White, 3, 3);
        let friendly = piece(1, PieceKind::Pawn, PieceColour::White, 3, 5);
        let enemy = piece(2, PieceKind::Pawn, PieceColour::Black, 3, 1);
        let board = Board::from_pieces(vec![rook, friendly, enemy]);

        let dests = legal_destinations(&rook, &board);

        assert!(dests.moves.contains(&sq(3, 4)));
        assert!(!dests.moves.contains(&sq(3, 5)), "friendly blocker included");
        assert!(!dests.moves.contains(&sq(3, 6)), "ray continued past blocker");
        assert!(dests.moves.contains(&sq(3, 2)));
        assert!(!dests.moves.contains(&sq(3, 1)));
        assert!(dests.capture_at(sq(3, 1)).is_some());
        assert!(dests.capture_at(sq(3, 5)).is_none(), "own piece captured");
        assert!(
            !dests.moves.contains(&sq(3, 0)),
            "ray continued past a capture"
        );
    }

    #[test]
    fn bishop_moves_diagonally_until_blocked() {
        let bishop = piece(0, PieceKind::Bishop, PieceColour::Black, 2, 2);
        let enemy = piece(1, PieceKind::Knight, PieceColour::White, 4, 4);
        let board = Board::from_pieces(vec![bishop, enemy]);

        let dests = legal_destinations(&bishop, &board);

        assert!(dests.moves.contains(&sq(3, 3)));
        assert!(dests.capture_at(sq(4, 4)).is_some());
        assert!(!dests.moves.contains(&sq(5, 5)));
        assert!(!dests.moves.contains(&sq(2, 4)), "bishop moved straight");
    }

    #[test]
    fn knight_jumps_and_captures() {
        let knight = piece(0, PieceKind::Knight, PieceColour::White, 4, 4);
        let friendly = piece(1, PieceKind::Pawn, PieceColour::White, 5, 6);
        let enemy = piece(2, PieceKind::Pawn, PieceColour::Black, 3, 6);
        let board = Board::from_pieces(vec![knight, friendly, enemy]);

        let dests = legal_destinations(&knight, &board);

        assert_eq!(dests.moves.len(), 6);
        assert!(!dests.moves.contains(&sq(5, 6)));
        assert_eq!(dests.captures.len(), 1);
        assert!(dests.capture_at(sq(3, 6)).is_some());
    }

    #[test]
    fn king_in_a_corner_has_three_squares() {
        let king = piece(0, PieceKind::King, PieceColour::White, 0, 0);
        let board = Board::from_pieces(vec![king]);

        let dests = legal_destinations(&king, &board);

        assert_eq!(dests.moves.len(), 3);
        assert!(dests.captures.is_empty());
    }

    #[test]
    fn pawn_advances_one_or_two_from_its_starting_rank() {
        let pawn = piece(0, PieceKind::Pawn, PieceColour::White, 4, 6);
        let board = Board::from_pieces(vec![pawn]);

        let dests = legal_destinations(&pawn, &board);
        assert!(dests.moves.contains(&sq(4, 5)));
        assert!(dests.moves.contains(&sq(4, 4)));

        let advanced = piece(0, PieceKind::Pawn, PieceColour::White, 4, 5);
        let board = Board::from_pieces(vec![advanced]);
        let dests = legal_destinations(&advanced, &board);
        assert_eq!(dests.moves, vec![sq(4, 4)]);
    }

    #[test]
    fn blocked_pawn_cannot_advance_or_capture_forward() {
        let pawn = piece(0, PieceKind::Pawn, PieceColour::White, 4, 6);
        let blocker = piece(1, PieceKind::Rook, PieceColour::Black, 4, 5);
        let board = Board::from_pieces(vec![pawn, blocker]);

        let dests = legal_destinations(&pawn, &board);
        assert!(dests.is_empty(), "pawn pushed into or through a blocker");
    }

    #[test]
    fn pawn_double_advance_needs_both_squares_empty() {
        let pawn = piece(0, PieceKind::Pawn, PieceColour::Black, 2, 1);
        let blocker = piece(1, PieceKind::Knight, PieceColour::White, 2, 3);
        let board = Board::from_pieces(vec![pawn, blocker]);

        let dests = legal_destinations(&pawn, &board);
        assert_eq!(dests.moves, vec![sq(2, 2)]);
    }

    #[test]
    fn pawn_captures_diagonally_only_against_the_other_colour() {
        let pawn = piece(0, PieceKind::Pawn, PieceColour::White, 4, 6);
        let enemy = piece(1, PieceKind::Knight, PieceColour::Black, 3, 5);
        let friendly = piece(2, PieceKind::Knight, PieceColour::White, 5, 5);
        let board = Board::from_pieces(vec![pawn, enemy, friendly]);

        let dests = legal_destinations(&pawn, &board);
        assert_eq!(dests.captures.len(), 1);
        assert!(dests.capture_at(sq(3, 5)).is_some());
    }

    #[test]
    fn en_passant_is_offered_the_ply_after_a_double_advance() {
        let white_pawn = piece(0, PieceKind::Pawn, PieceColour::White, 4, 3);
        let black_pawn = piece(1, PieceKind::Pawn, PieceColour::Black, 3, 1);
        let board = Board::from_pieces(vec![white_pawn, black_pawn]);

        // black double-advances alongside the white pawn
        let board = board.apply_move(PieceId(1), sq(3, 3), None);

        let white_pawn = *board.piece(PieceId(0)).unwrap();
        let dests = legal_destinations(&white_pawn, &board);
        let capture = dests.capture_at(sq(3, 2)).expect("en passant not offered");
        assert_eq!(capture.victim, PieceId(1));
        assert_eq!(
            capture.kind,
            CaptureKind::EnPassant {
                victim_square: sq(3, 3)
            }
        );
    }

    #[test]
    fn en_passant_expires_once_another_piece_moves() {
        let white_pawn = piece(0, PieceKind::Pawn, PieceColour::White, 4, 3);
        let black_pawn = piece(1, PieceKind::Pawn, PieceColour::Black, 3, 1);
        let bystander = piece(2, PieceKind::Rook, PieceColour::White, 7, 7);
        let board = Board::from_pieces(vec![white_pawn, black_pawn, bystander]);

        let board = board.apply_move(PieceId(1), sq(3, 3), None);
        // an unrelated move burns the window
        let board = board.apply_move(PieceId(2), sq(7, 6), None);

        let white_pawn = *board.piece(PieceId(0)).unwrap();
        let dests = legal_destinations(&white_pawn, &board);
        assert!(dests.capture_at(sq(3, 2)).is_none());
    }

    #[test]
    fn en_passant_requires_a_double_advance_not_just_adjacency() {
        let white_pawn = piece(0, PieceKind::Pawn, PieceColour::White, 4, 3);
        let black_pawn = piece(1, PieceKind::Pawn, PieceColour::Black, 3, 2);
        let board = Board::from_pieces(vec![white_pawn, black_pawn]);

        // single step to the same rank as the white pawn
        let board = board.apply_move(PieceId(1), sq(3, 3), None);

        let white_pawn = *board.piece(PieceId(0)).unwrap();
        let dests = legal_destinations(&white_pawn, &board);
        assert!(dests.capture_at(sq(3, 2)).is_none());
    }

    #[test]
    fn pinned_piece_may_only_move_along_the_pin() {
        let king = piece(0, PieceKind::King, PieceColour::White, 4, 7);
        let shield = piece(1, PieceKind::Rook, PieceColour::White, 4, 5);
        let attacker = piece(2, PieceKind::Rook, PieceColour::Black, 4, 0);
        let board = Board::from_pieces(vec![king, shield, attacker]);

        let dests = legal_destinations(&shield, &board);

        assert!(!dests.moves.contains(&sq(3, 5)));
        assert!(!dests.moves.contains(&sq(7, 5)));
        assert!(dests.moves.contains(&sq(4, 6)));
        assert!(dests.moves.contains(&sq(4, 1)));
        assert!(dests.capture_at(sq(4, 0)).is_some());
    }

    #[test]
    fn king_may_not_step_into_an_attacked_square() {
        let king = piece(0, PieceKind::King, PieceColour::White, 4, 7);
        let attacker = piece(1, PieceKind::Rook, PieceColour::Black, 0, 6);
        let board = Board::from_pieces(vec![king, attacker]);

        let dests = legal_destinations(&king, &board);

        assert!(!dests.moves.contains(&sq(3, 6)));
        assert!(!dests.moves.contains(&sq(4, 6)));
        assert!(!dests.moves.contains(&sq(5, 6)));
        assert!(dests.moves.contains(&sq(3, 7)));
        assert!(dests.moves.contains(&sq(5, 7)));
    }

    #[test]
    fn every_legal_destination_survives_its_own_simulation() {
        let board = Board::initial();
        for piece in board.pieces() {
            let dests = legal_destinations(piece, &board);
            for &square in &dests.moves {
                assert!(square.on_board());
                assert!(!board.is_occupied(square));
                let scratch = board.apply_move(piece.id, square, None);
                let king = scratch
                    .find(|p| p.kind == PieceKind::King && p.colour == piece.colour)
                    .unwrap();
                assert!(!attacked(&scratch, king.position, piece.colour.opponent()));
            }
            for capture in &dests.captures {
                let victim = board.piece(capture.victim).unwrap();
                assert_ne!(victim.colour, piece.colour);
            }
        }
    }

    #[test]
    fn attack_coverage_sees_through_nothing() {
        let rook = piece(0, PieceKind::Rook, PieceColour::Black, 4, 0);
        let blocker = piece(1, PieceKind::Pawn, PieceColour::Black, 4, 4);
        let target = piece(2, PieceKind::King, PieceColour::White, 4, 7);
        let board = Board::from_pieces(vec![rook, blocker, target]);

        assert!(!attacked(&board, sq(4, 7), PieceColour::Black));

        let open = Board::from_pieces(vec![rook, target]);
        assert!(attacked(&open, sq(4, 7), PieceColour::Black));
    }
}
