/// Position state and move execution.
///
/// A position is the board plus side to move, castling rights, en passant
/// square, move clocks and the Zobrist key. Moves are made and unmade in
/// place; irreversible state (castling, ep, half-move clock, key) is saved on
/// a history stack so unmake can restore it exactly. The key is maintained
/// incrementally by XORing contributions out and in; `compute_hash` rebuilds
/// it from scratch and backs a debug assertion after every make/unmake.

use crate::bitboard::*;
use crate::board::Board;
use crate::movegen;
use crate::moves::Move;
use crate::zobrist::ZOBRIST;

use thiserror::Error;

// ============================================================
// Castling rights
// ============================================================

pub const WK_CASTLE: u8 = 0b0001;
pub const WQ_CASTLE: u8 = 0b0010;
pub const BK_CASTLE: u8 = 0b0100;
pub const BQ_CASTLE: u8 = 0b1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const fn none() -> CastlingRights {
        CastlingRights(0)
    }

    pub const fn all() -> CastlingRights {
        CastlingRights(0b1111)
    }

    #[inline]
    pub fn has(self, right: u8) -> bool {
        self.0 & right != 0
    }

    #[inline]
    pub fn add(&mut self, right: u8) {
        self.0 |= right;
    }

    #[inline]
    pub fn remove(&mut self, right: u8) {
        self.0 &= !right;
    }

    pub fn remove_for_color(&mut self, color: Color) {
        match color {
            Color::White => self.remove(WK_CASTLE | WQ_CASTLE),
            Color::Black => self.remove(BK_CASTLE | BQ_CASTLE),
        }
    }

    /// Strip the right tied to a rook home square. Must only be called with
    /// a corner square.
    pub fn remove_for_corner_square(&mut self, square: u8) {
        match square {
            sq::A1 => self.remove(WQ_CASTLE),
            sq::H1 => self.remove(WK_CASTLE),
            sq::A8 => self.remove(BQ_CASTLE),
            sq::H8 => self.remove(BK_CASTLE),
            _ => debug_assert!(false, "not a corner square: {}", square_name(square)),
        }
    }

    /// The raw 4-bit mask, used to index the Zobrist castling table.
    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn to_fen(self) -> String {
        if self.0 == 0 {
            return "-".to_string();
        }
        let mut out = String::new();
        if self.has(WK_CASTLE) {
            out.push('K');
        }
        if self.has(WQ_CASTLE) {
            out.push('Q');
        }
        if self.has(BK_CASTLE) {
            out.push('k');
        }
        if self.has(BQ_CASTLE) {
            out.push('q');
        }
        out
    }
}

// ============================================================
// FEN errors
// ============================================================

#[derive(Debug, Error)]
pub enum FenError {
    #[error("FEN must contain 6 fields, got {0}")]
    FieldCount(usize),
    #[error("board must contain 8 rows, got {0}")]
    RowCount(usize),
    #[error("board must contain 64 squares")]
    SquareCount,
    #[error("invalid piece '{0}'")]
    InvalidPiece(char),
    #[error("invalid colour to move '{0}'")]
    InvalidSideToMove(String),
    #[error("invalid castling rights")]
    InvalidCastlingRights,
    #[error("invalid en passant square")]
    InvalidEnPassant,
    #[error("invalid move counters")]
    InvalidCounters,
}

// ============================================================
// Position
// ============================================================

/// Saved on make-move so unmake can restore state the move alone cannot.
#[derive(Clone, Copy, PartialEq, Eq)]
struct HistoryEntry {
    castling: CastlingRights,
    ep_square: Option<u8>,
    halfmove: u8,
    hash: u64,
}

pub const MAX_HISTORY: usize = 256;

pub const START_POS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, PartialEq, Eq)]
pub struct Position {
    pub board: Board,
    pub side: Color,
    pub castling: CastlingRights,
    pub ep_square: Option<u8>,
    pub halfmove: u8,
    pub fullmove: u8,
    pub hash: u64,
    history: Vec<HistoryEntry>,
}

impl Position {
    pub fn startpos() -> Position {
        Position::from_fen(START_POS_FEN).expect("start position FEN is valid")
    }

    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 6 {
            return Err(FenError::FieldCount(parts.len()));
        }

        let board = parse_board(parts[0])?;

        let side = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidSideToMove(other.to_string())),
        };

        let mut castling = CastlingRights::none();
        if parts[2] != "-" {
            for c in parts[2].chars() {
                match c {
                    'K' => castling.add(WK_CASTLE),
                    'Q' => castling.add(WQ_CASTLE),
                    'k' => castling.add(BK_CASTLE),
                    'q' => castling.add(BQ_CASTLE),
                    _ => return Err(FenError::InvalidCastlingRights),
                }
            }
        }

        let ep_square = if parts[3] == "-" {
            None
        } else {
            let square = parse_square(parts[3]).ok_or(FenError::InvalidEnPassant)?;
            // Only rank 3 or rank 6 can be an en passant target
            if rank_of(square) != 2 && rank_of(square) != 5 {
                return Err(FenError::InvalidEnPassant);
            }
            Some(square)
        };

        let halfmove: u8 = parts[4].parse().map_err(|_| FenError::InvalidCounters)?;
        let fullmove: u8 = parts[5].parse().map_err(|_| FenError::InvalidCounters)?;

        let mut pos = Position {
            board,
            side,
            castling,
            ep_square,
            halfmove,
            fullmove,
            hash: 0,
            history: Vec::with_capacity(MAX_HISTORY),
        };
        pos.hash = pos.compute_hash();
        Ok(pos)
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                let square = make_square(file, rank);
                if let Some(piece) = self.board.piece_at(square) {
                    if empty > 0 {
                        fen.push(char::from_digit(empty, 10).unwrap());
                        empty = 0;
                    }
                    fen.push(piece.to_char());
                } else {
                    empty += 1;
                }
            }
            if empty > 0 {
                fen.push(char::from_digit(empty, 10).unwrap());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.side {
            Color::White => 'w',
            Color::Black => 'b',
        });

        fen.push(' ');
        fen.push_str(&self.castling.to_fen());

        fen.push(' ');
        match self.ep_square {
            Some(square) => fen.push_str(square_name(square)),
            None => fen.push('-'),
        }

        fen.push_str(&format!(" {} {}", self.halfmove, self.fullmove));

        fen
    }

    #[inline]
    pub fn opponent(&self) -> Color {
        self.side.flip()
    }

    /// Rebuild the Zobrist key from scratch. Incremental maintenance must
    /// always agree with this.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0u64;

        for piece in ALL_PIECES {
            let mut bb = self.board.pieces(piece);
            while bb != 0 {
                let square = pop_lsb(&mut bb);
                hash ^= ZOBRIST.piece_square[piece.index()][square as usize];
            }
        }

        if self.side == Color::Black {
            hash ^= ZOBRIST.side_to_move;
        }

        hash ^= ZOBRIST.castling[self.castling.value() as usize];

        // The en passant file enters the key only when a capture is actually
        // possible; positions differing only in phantom ep squares hash equal.
        if let Some(ep) = self.ep_square {
            if movegen::en_passant_sources(ep, self.side, &self.board) != 0 {
                hash ^= ZOBRIST.en_passant_files[file_of(ep) as usize];
            }
        }

        hash
    }

    pub fn make_move(&mut self, mv: Move) {
        let entry = HistoryEntry {
            castling: self.castling,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            hash: self.hash,
        };
        self.history.push(entry);
        debug_assert!(self.history.len() <= MAX_HISTORY);

        if let Some(ep) = self.ep_square {
            if movegen::en_passant_sources(ep, self.side, &self.board) != 0 {
                self.hash ^= ZOBRIST.en_passant_files[file_of(ep) as usize];
            }
        }

        self.ep_square = None;
        self.halfmove += 1;

        if let Some(capture_square) = mv.capture_square() {
            let captured = mv.captured_piece().unwrap();
            self.halfmove = 0;
            self.board.remove_piece(capture_square);
            self.hash ^= ZOBRIST.piece_square[captured.index()][capture_square as usize];
        }

        let piece = mv.piece();

        if piece.is_pawn() {
            self.halfmove = 0;

            if mv.rank_diff() == 2 {
                let square = forward(mv.from_sq(), self.side);
                self.ep_square = Some(square);

                if movegen::en_passant_sources(square, self.opponent(), &self.board) != 0 {
                    self.hash ^= ZOBRIST.en_passant_files[file_of(square) as usize];
                }
            }
        }

        if piece.is_king() {
            self.castling.remove_for_color(self.side);

            if mv.is_castling() {
                let rook = Piece::rook(self.side);
                let rank = rank_of(mv.to_sq());
                let (rook_from, rook_to) = match file_of(mv.to_sq()) {
                    2 => (make_square(0, rank), make_square(3, rank)),
                    6 => (make_square(7, rank), make_square(5, rank)),
                    _ => unreachable!("castle destination must be the c- or g-file"),
                };

                self.board.put_piece(rook, rook_to);
                self.board.remove_piece(rook_from);

                self.hash ^= ZOBRIST.piece_square[rook.index()][rook_to as usize];
                self.hash ^= ZOBRIST.piece_square[rook.index()][rook_from as usize];
            }
        }

        if get_bit(CORNERS, mv.from_sq()) {
            self.castling.remove_for_corner_square(mv.from_sq());
        }
        if get_bit(CORNERS, mv.to_sq()) {
            self.castling.remove_for_corner_square(mv.to_sq());
        }

        self.hash ^= ZOBRIST.castling[self.castling.value() as usize];
        self.hash ^= ZOBRIST.castling[entry.castling.value() as usize];

        let to_piece = mv.promotion_piece().unwrap_or(piece);
        self.board.put_piece(to_piece, mv.to_sq());
        self.board.remove_piece(mv.from_sq());

        self.hash ^= ZOBRIST.piece_square[to_piece.index()][mv.to_sq() as usize];
        self.hash ^= ZOBRIST.piece_square[piece.index()][mv.from_sq() as usize];

        if self.side == Color::Black {
            self.fullmove += 1;
        }

        self.side = self.opponent();
        self.hash ^= ZOBRIST.side_to_move;

        debug_assert_eq!(self.hash, self.compute_hash());
    }

    pub fn unmake_move(&mut self, mv: Move) {
        let entry = self.history.pop().expect("no history entry to unmake");

        self.castling = entry.castling;
        self.ep_square = entry.ep_square;
        self.halfmove = entry.halfmove;
        self.hash = entry.hash;

        if mv.is_castling() {
            // The mover is the side that is NOT to move right now.
            let rook = Piece::rook(self.opponent());
            let rank = rank_of(mv.to_sq());
            let (rook_home, rook_castled) = match file_of(mv.to_sq()) {
                2 => (make_square(0, rank), make_square(3, rank)),
                6 => (make_square(7, rank), make_square(5, rank)),
                _ => unreachable!("castle destination must be the c- or g-file"),
            };

            self.board.put_piece(rook, rook_home);
            self.board.remove_piece(rook_castled);
        }

        self.board.remove_piece(mv.to_sq());
        self.board.put_piece(mv.piece(), mv.from_sq());

        if let Some(capture_square) = mv.capture_square() {
            self.board.put_piece(mv.captured_piece().unwrap(), capture_square);
        }

        self.side = self.opponent();

        if self.side == Color::Black {
            self.fullmove -= 1;
        }

        debug_assert_eq!(self.hash, self.compute_hash());
    }

    /// Pass the turn without moving a piece. Only used by null-move pruning.
    pub fn make_null_move(&mut self) {
        let entry = HistoryEntry {
            castling: self.castling,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            hash: self.hash,
        };
        self.history.push(entry);
        debug_assert!(self.history.len() <= MAX_HISTORY);

        if let Some(ep) = self.ep_square {
            if movegen::en_passant_sources(ep, self.side, &self.board) != 0 {
                self.hash ^= ZOBRIST.en_passant_files[file_of(ep) as usize];
            }
        }

        self.ep_square = None;
        self.halfmove += 1;

        if self.side == Color::Black {
            self.fullmove += 1;
        }

        self.side = self.opponent();
        self.hash ^= ZOBRIST.side_to_move;

        debug_assert_eq!(self.hash, self.compute_hash());
    }

    pub fn unmake_null_move(&mut self) {
        let entry = self.history.pop().expect("no history entry to unmake");

        self.castling = entry.castling;
        self.ep_square = entry.ep_square;
        self.halfmove = entry.halfmove;
        self.hash = entry.hash;

        self.side = self.opponent();

        if self.side == Color::Black {
            self.fullmove -= 1;
        }

        debug_assert_eq!(self.hash, self.compute_hash());
    }

    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove >= 100
    }

    /// Repetition detection over the history stack.
    ///
    /// Only entries at odd distance (same side to move) and distance >= 3
    /// can match. Inside the current search window a single match counts as
    /// a draw, which stops the searcher from cycling; outside it a true
    /// threefold needs two matches.
    pub fn is_repetition_draw(&self, search_ply: u8) -> bool {
        let limit = (self.halfmove as usize).min(self.history.len());
        let mut matches = 0;

        for distance in 0..limit {
            if distance < 3 || distance % 2 == 0 {
                continue;
            }

            let entry = &self.history[self.history.len() - 1 - distance];
            if entry.hash != self.hash {
                continue;
            }

            if distance < search_ply as usize {
                return true;
            }

            matches += 1;
            if matches == 2 {
                return true;
            }
        }

        false
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history.len()
    }
}

fn parse_board(field: &str) -> Result<Board, FenError> {
    let rows = field.split('/').count();
    if rows != 8 {
        return Err(FenError::RowCount(rows));
    }

    let mut board = Board::empty();
    let mut rank: i8 = 7;
    let mut file: i8 = 0;

    for c in field.chars() {
        match c {
            '/' => {
                if file != 8 {
                    return Err(FenError::SquareCount);
                }
                rank -= 1;
                file = 0;
            }
            '1'..='8' => {
                file += c.to_digit(10).unwrap() as i8;
            }
            _ => {
                let piece = Piece::from_char(c).ok_or(FenError::InvalidPiece(c))?;
                if file >= 8 {
                    return Err(FenError::SquareCount);
                }
                board.put_piece(piece, make_square(file as u8, rank as u8));
                file += 1;
            }
        }
        if file > 8 {
            return Err(FenError::SquareCount);
        }
    }

    if rank != 0 || file != 8 {
        return Err(FenError::SquareCount);
    }

    Ok(board)
}
