/// Static evaluation: material + piece-square tables + king safety.
/// Returns a centipawn score from the perspective of the side to move.

use crate::bitboard::*;
use crate::board::Board;
use crate::position::Position;

// ============================================================
// Centipawn scale
// ============================================================

pub const CENTIPAWN_MAX: i32 = 10_000;
pub const CENTIPAWN_MIN: i32 = -CENTIPAWN_MAX;
pub const CENTIPAWN_DRAW: i32 = 0;

/// Checkmate is CENTIPAWN_MATE minus the plies until mate, so faster mates
/// score higher. Anything at or above the threshold is a forced mate.
pub const CENTIPAWN_MATE: i32 = CENTIPAWN_MAX;
pub const CENTIPAWN_MATE_THRESHOLD: i32 = CENTIPAWN_MATE - 255;

/// Material values per piece variant (king carries no material value).
#[rustfmt::skip]
pub const PIECE_VALUES: [i32; PIECE_COUNT] = [
    100, 300, 350, 500, 900, 0, // white: P, N, B, R, Q, K
    100, 300, 350, 500, 900, 0, // black: P, N, B, R, Q, K
];

// ============================================================
// Piece-square tables
// ============================================================
// One 64-entry table per piece kind, written from White's point of view
// with rank 8 as the first row. White pieces read through a vertical
// mirror (sq ^ 56); black pieces read directly.

#[rustfmt::skip]
const PIECE_SQUARE_BASE: [[i32; 64]; KIND_COUNT] = [
    // Pawn: advancement, centre control, penalty for blocking d2/e2
    [
         0,   0,   0,   0,   0,   0,   0,   0,
        60,  60,  60,  60,  70,  60,  60,  60,
        40,  40,  40,  50,  60,  40,  40,  40,
        20,  20,  20,  40,  50,  20,  20,  20,
         5,   5,  15,  30,  40,  10,   5,   5,
         5,   5,  10,  20,  30,   5,   5,   5,
         5,   5,   5, -30, -30,   5,   5,   5,
         0,   0,   0,   0,   0,   0,   0,   0,
    ],
    // Knight: strong in the centre, dim on the rim
    [
        -20, -10, -10, -10, -10, -10, -10, -20,
        -10,  -5,  -5,  -5,  -5,  -5,  -5, -10,
        -10,  -5,  15,  15,  15,  15,  -5, -10,
        -10,  -5,  15,  15,  15,  15,  -5, -10,
        -10,  -5,  15,  15,  15,  15,  -5, -10,
        -10,  -5,  10,  15,  15,  15,  -5, -10,
        -10,  -5,  -5,  -5,  -5,  -5,  -5, -10,
        -20, -10, -10, -10, -10, -10, -10, -20,
    ],
    // Bishop: long diagonals, avoid the edges
    [
        -20,   0,   0,   0,   0,   0,   0, -20,
        -15,   0,   0,   0,   0,   0,   0, -15,
        -10,   0,   0,   5,   5,   0,   0, -10,
        -10,  10,  10,  30,  30,  10,  10, -10,
          5,   5,  10,  25,  25,  10,   5,   5,
          5,   5,   5,  10,  10,   5,   5,   5,
        -10,   5,   5,  10,  10,   5,   5, -10,
        -20, -10, -10, -10, -10, -10, -10, -20,
    ],
    // Rook: seventh rank and central files
    [
         0,   0,   0,   0,   0,   0,   0,   0,
        15,  15,  15,  20,  20,  15,  15,  15,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,  10,  10,  10,   0,   0,
    ],
    // Queen: moderate centre bonuses, no early adventures
    [
        -30, -20, -10, -10, -10, -10, -20, -30,
        -20, -10,  -5,  -5,  -5,  -5, -10, -20,
        -10,  -5,  10,  10,  10,  10,  -5, -10,
        -10,  -5,  10,  20,  20,  10,  -5, -10,
        -10,  -5,  10,  20,  20,  10,  -5, -10,
        -10,  -5,  -5,  -5,  -5,  -5,  -5, -10,
        -20, -10,  -5,  -5,  -5,  -5, -10, -20,
        -30, -20, -10, -10, -10, -10, -20, -30,
    ],
    // King: stay castled; the centre is dangerous while queens are on
    [
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0,  20,  20,   0,   0,   0,
         0,   0,   0,  20,  20,   0,   0,   0,
         0,   0,   0,   0,   0,   0,   0,   0,
         0,   0,   0, -10, -10,   0,   0,   0,
         0,   0,  20, -10, -10,   0,  20,   0,
    ],
];

const fn build_psqt() -> [[i32; 64]; PIECE_COUNT] {
    let mut psqt = [[0i32; 64]; PIECE_COUNT];
    let mut piece = 0;
    while piece < PIECE_COUNT {
        let kind = piece % KIND_COUNT;
        let white = piece < KIND_COUNT;
        let mut square = 0;
        while square < 64 {
            let mapped = if white { square ^ 56 } else { square };
            psqt[piece][square] = PIECE_SQUARE_BASE[kind][mapped];
            square += 1;
        }
        piece += 1;
    }
    psqt
}

static PIECE_SQUARE_TABLES: [[i32; 64]; PIECE_COUNT] = build_psqt();

// ============================================================
// Game phase
// ============================================================

const PHASE_KNIGHT: i32 = 1;
const PHASE_BISHOP: i32 = 1;
const PHASE_ROOK: i32 = 2;
const PHASE_QUEEN: i32 = 4;
const PHASE_TOTAL: i32 = 4 * PHASE_KNIGHT + 4 * PHASE_BISHOP + 4 * PHASE_ROOK + 2 * PHASE_QUEEN;

/// Non-pawn material, normalised to 0..=256 (256 = full middlegame).
fn calculate_game_phase(board: &Board) -> i32 {
    let mut phase = 0;
    for color in [Color::White, Color::Black] {
        phase += PHASE_KNIGHT * board.count_pieces(Piece::knight(color)) as i32;
        phase += PHASE_BISHOP * board.count_pieces(Piece::bishop(color)) as i32;
        phase += PHASE_ROOK * board.count_pieces(Piece::rook(color)) as i32;
        phase += PHASE_QUEEN * board.count_pieces(Piece::queen(color)) as i32;
    }
    (phase * 256 + PHASE_TOTAL / 2) / PHASE_TOTAL
}

// ============================================================
// King safety
// ============================================================

// Pawn shield bonuses for a pawn one, two or three ranks ahead of the king's
// home rank
const PAWN_SHIELD_BONUS: [i32; 3] = [12, 8, 4];

// Penalties for missing critical shield pawns; the f-pawn guards the key
// diagonals around a castled king (mirrored to the c-pawn queenside)
const MISSING_F_PAWN_PENALTY: i32 = -25;
const MISSING_G_PAWN_PENALTY: i32 = -15;
const MISSING_H_PAWN_PENALTY: i32 = -8;

const OPEN_FILE_PENALTY: i32 = -20;
const SEMI_OPEN_FILE_PENALTY: i32 = -10;

// Attack-zone weights by attacking piece kind
const ATTACK_WEIGHT_KNIGHT: i32 = 2;
const ATTACK_WEIGHT_BISHOP: i32 = 2;
const ATTACK_WEIGHT_ROOK: i32 = 3;
const ATTACK_WEIGHT_QUEEN: i32 = 5;

// Tropism weights by enemy piece kind
const TROPISM_KNIGHT: i32 = 1;
const TROPISM_BISHOP: i32 = 1;
const TROPISM_ROOK: i32 = 2;
const TROPISM_QUEEN: i32 = 3;

// Attacks are far less dangerous without a queen on the board
const NO_QUEEN_SAFETY_DIVISOR: i32 = 4;

/// The king file and its neighbours; -1 marks off-board files.
fn shield_files(king_sq: u8) -> [i32; 3] {
    let file = file_of(king_sq) as i32;
    [
        if file > 0 { file - 1 } else { -1 },
        file,
        if file < 7 { file + 1 } else { -1 },
    ]
}

fn is_kingside(king_sq: u8) -> bool {
    file_of(king_sq) >= 4
}

fn manhattan_distance(a: u8, b: u8) -> i32 {
    let file_diff = file_of(a).abs_diff(file_of(b)) as i32;
    let rank_diff = rank_of(a).abs_diff(rank_of(b)) as i32;
    file_diff + rank_diff
}

fn chebyshev_distance(a: u8, b: u8) -> i32 {
    let file_diff = file_of(a).abs_diff(file_of(b)) as i32;
    let rank_diff = rank_of(a).abs_diff(rank_of(b)) as i32;
    file_diff.max(rank_diff)
}

fn eval_pawn_shield(color: Color, king_sq: u8, board: &Board) -> i32 {
    let own_pawns = board.pieces(Piece::pawn(color));
    let files = shield_files(king_sq);

    let base_rank: i32 = if color == Color::White { 1 } else { 6 };
    let direction: i32 = if color == Color::White { 1 } else { -1 };

    let mut score = 0;

    for file in files {
        if file < 0 {
            continue;
        }

        let mut found_pawn = false;
        for rank_offset in 0..3 {
            let rank = base_rank + direction * rank_offset;
            if !(0..8).contains(&rank) {
                continue;
            }

            let square = make_square(file as u8, rank as u8);
            if own_pawns & square_bb(square) != 0 {
                score += PAWN_SHIELD_BONUS[rank_offset as usize];
                found_pawn = true;
                break;
            }
        }

        if !found_pawn {
            if is_kingside(king_sq) {
                match file {
                    5 => score += MISSING_F_PAWN_PENALTY,
                    6 => score += MISSING_G_PAWN_PENALTY,
                    7 => score += MISSING_H_PAWN_PENALTY,
                    _ => {}
                }
            } else {
                // Queenside mirror: c-pawn plays the f-pawn's role
                match file {
                    2 => score += MISSING_F_PAWN_PENALTY,
                    1 => score += MISSING_G_PAWN_PENALTY,
                    0 => score += MISSING_H_PAWN_PENALTY,
                    _ => {}
                }
            }
        }
    }

    score
}

fn eval_open_files(color: Color, king_sq: u8, board: &Board) -> i32 {
    let own_pawns = board.pieces(Piece::pawn(color));
    let enemy_pawns = board.pieces(Piece::pawn(color.flip()));

    let mut score = 0;

    for file in shield_files(king_sq) {
        if file < 0 {
            continue;
        }

        let file_mask = FILES[file as usize];
        let has_own_pawn = own_pawns & file_mask != 0;
        let has_enemy_pawn = enemy_pawns & file_mask != 0;

        if !has_own_pawn && !has_enemy_pawn {
            score += OPEN_FILE_PENALTY;
        } else if !has_own_pawn && has_enemy_pawn {
            score += SEMI_OPEN_FILE_PENALTY;
        }
    }

    score
}

fn eval_attack_zone(color: Color, king_sq: u8, board: &Board) -> i32 {
    let enemy = color.flip();

    let mut attacker_count = 0;
    let mut attack_weight = 0;

    let mut count_zone = |pieces: Bitboard, range: i32, weight: i32| {
        let mut bb = pieces;
        while bb != 0 {
            let square = pop_lsb(&mut bb);
            if chebyshev_distance(square, king_sq) <= range {
                attacker_count += 1;
                attack_weight += weight;
            }
        }
    };

    count_zone(board.pieces(Piece::knight(enemy)), 2, ATTACK_WEIGHT_KNIGHT);
    count_zone(board.pieces(Piece::bishop(enemy)), 3, ATTACK_WEIGHT_BISHOP);
    count_zone(board.pieces(Piece::rook(enemy)), 3, ATTACK_WEIGHT_ROOK);
    count_zone(board.pieces(Piece::queen(enemy)), 4, ATTACK_WEIGHT_QUEEN);

    if attacker_count == 0 {
        return 0;
    }

    // More attackers compound: scale by the attacker count
    -attack_weight * attacker_count * 3
}

fn eval_tropism(color: Color, king_sq: u8, board: &Board) -> i32 {
    let enemy = color.flip();
    let mut score = 0;

    let mut proximity = |pieces: Bitboard, weight: i32| {
        let mut bb = pieces;
        while bb != 0 {
            let square = pop_lsb(&mut bb);
            // Manhattan distance tops out at 14
            score -= weight * (14 - manhattan_distance(square, king_sq)) / 2;
        }
    };

    proximity(board.pieces(Piece::knight(enemy)), TROPISM_KNIGHT);
    proximity(board.pieces(Piece::bishop(enemy)), TROPISM_BISHOP);
    proximity(board.pieces(Piece::rook(enemy)), TROPISM_ROOK);
    proximity(board.pieces(Piece::queen(enemy)), TROPISM_QUEEN);

    score
}

// ============================================================
// Public evaluation terms
// ============================================================

pub fn eval_material(color: Color, board: &Board) -> i32 {
    let mut total = 0;
    for &piece in pieces_for(color) {
        total += PIECE_VALUES[piece.index()] * board.count_pieces(piece) as i32;
    }
    total
}

pub fn eval_psqt(color: Color, board: &Board) -> i32 {
    let mut total = 0;
    for &piece in pieces_for(color) {
        let mut bb = board.pieces(piece);
        while bb != 0 {
            let square = pop_lsb(&mut bb);
            total += PIECE_SQUARE_TABLES[piece.index()][square as usize];
        }
    }
    total
}

pub fn eval_king_safety(color: Color, board: &Board) -> i32 {
    if board.pieces(Piece::king(color)) == 0 {
        return 0;
    }

    let king_sq = board.king_square(color);
    let phase = calculate_game_phase(board);
    let enemy_has_queen = board.pieces(Piece::queen(color.flip())) != 0;

    let mut score = 0;
    score += eval_pawn_shield(color, king_sq, board);
    score += eval_open_files(color, king_sq, board);
    score += eval_attack_zone(color, king_sq, board);
    score += eval_tropism(color, king_sq, board);

    // King safety matters most in the middlegame
    score = score * phase / 256;

    if !enemy_has_queen {
        score /= NO_QUEEN_SAFETY_DIVISOR;
    }

    score
}

/// Full evaluation from the side to move's perspective.
pub fn evaluate(pos: &Position) -> i32 {
    let material =
        eval_material(Color::White, &pos.board) - eval_material(Color::Black, &pos.board);
    let psqt = eval_psqt(Color::White, &pos.board) - eval_psqt(Color::Black, &pos.board);
    let king_safety =
        eval_king_safety(Color::White, &pos.board) - eval_king_safety(Color::Black, &pos.board);

    let score = material + psqt + king_safety;

    match pos.side {
        Color::White => score,
        Color::Black => -score,
    }
}
