/// Zobrist hashing for transposition table keys.
/// Each (piece, square) pair gets a random 64-bit value; additional values
/// cover side to move, the 16 castling-rights combinations, and the en
/// passant file. XOR is self-inverse and order-independent, which is what
/// makes incremental updates and transposition detection work.
///
/// The table is generated at compile time from the fixed xorshift64 seed, so
/// every build of the engine agrees on every position's key.

use crate::bitboard::PIECE_COUNT;
use crate::rng::{HashRng, HASH_SEED};

pub struct ZobristKeys {
    /// 12 piece variants x 64 squares
    pub piece_square: [[u64; 64]; PIECE_COUNT],
    /// XORed into the key when black is to move
    pub side_to_move: u64,
    /// Indexed by the 4-bit castling rights mask
    pub castling: [u64; 16],
    /// One value per file; only XORed in when a capture is actually possible
    pub en_passant_files: [u64; 8],
}

const fn generate() -> ZobristKeys {
    let mut rng = HashRng::new(HASH_SEED);

    let mut keys = ZobristKeys {
        piece_square: [[0; 64]; PIECE_COUNT],
        side_to_move: 0,
        castling: [0; 16],
        en_passant_files: [0; 8],
    };

    // Drawing order is fixed: pieces by index, squares by index, then the
    // side key, castling keys, and en passant keys.
    let mut piece = 0;
    while piece < PIECE_COUNT {
        let mut square = 0;
        while square < 64 {
            keys.piece_square[piece][square] = rng.next();
            square += 1;
        }
        piece += 1;
    }

    keys.side_to_move = rng.next();

    let mut i = 0;
    while i < 16 {
        keys.castling[i] = rng.next();
        i += 1;
    }

    let mut file = 0;
    while file < 8 {
        keys.en_passant_files[file] = rng.next();
        file += 1;
    }

    keys
}

/// Process-wide constant table; all hashing references this.
pub static ZOBRIST: ZobristKeys = generate();
