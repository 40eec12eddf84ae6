mod bitboard;
mod board;
mod eval;
mod movegen;
mod moves;
mod position;
mod rng;
mod search;
mod tablebase;
mod uci;
mod zobrist;

fn main() {
    movegen::init();
    uci::run_loop();
}
