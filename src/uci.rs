/// UCI (Universal Chess Interface) protocol front-end.
///
/// The loop reads commands from stdin on the current thread and runs each
/// `go` on a dedicated worker thread. The worker owns its own copy of the
/// position and takes ownership of the transposition table for the duration
/// of the search; `stop` (or the next state-changing command) joins the
/// worker and recovers the table. The stop flag is a shared atomic.

use crate::bitboard::{parse_square, rank_of, Color, Piece};
use crate::eval;
use crate::movegen;
use crate::moves::Move;
use crate::position::{FenError, Position, START_POS_FEN};
use crate::search::{
    self, Limits, Report, Reporter, TranspositionTable, TT_DEFAULT_SIZE_MB, TT_MAX_SIZE_MB,
    TT_MIN_SIZE_MB,
};
use crate::tablebase;
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

const ENGINE_NAME: &str = "Mutsu";
const ENGINE_AUTHOR: &str = "the Mutsu authors";

#[derive(Debug, Error)]
pub enum UciError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("missing value for '{0}' attribute")]
    MissingValue(String),
    #[error("invalid value for '{0}' attribute")]
    InvalidValue(String),
    #[error("invalid UCI move: {0}")]
    InvalidMove(String),
    #[error("illegal move: {0}")]
    IllegalMove(String),
    #[error("no piece on the from-square of '{0}'")]
    NoPieceAtFromSquare(String),
    #[error("missing FEN in position command")]
    MissingFen,
    #[error("missing option name")]
    MissingOptionName,
    #[error("unknown option '{0}'")]
    UnknownOption(String),
    #[error("missing value for '{0}' option")]
    MissingOptionValue(String),
    #[error("invalid value for '{0}' option")]
    InvalidOptionValue(String),
    #[error(transparent)]
    Fen(#[from] FenError),
}

// ============================================================
// UCI moves
// ============================================================

/// A move as it appears on the wire: squares plus an optional promotion.
/// The promotion is resolved against the mover when the move is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UciMove {
    pub from: u8,
    pub to: u8,
    pub promotion: Option<Piece>,
}

/// Parse `[a-h][1-8][a-h][1-8]` with an optional promotion character.
pub fn parse_uci_move(text: &str) -> Option<UciMove> {
    if text.len() != 4 && text.len() != 5 {
        return None;
    }

    let from = parse_square(&text[0..2])?;
    let to = parse_square(&text[2..4])?;

    let promotion = if text.len() == 5 {
        // Colour follows the destination: rank 1 promotions are black's
        let color = if rank_of(to) == 0 {
            Color::Black
        } else {
            Color::White
        };
        let piece = match text.as_bytes()[4].to_ascii_lowercase() {
            b'n' => Piece::knight(color),
            b'b' => Piece::bishop(color),
            b'r' => Piece::rook(color),
            b'q' => Piece::queen(color),
            _ => return None,
        };
        Some(piece)
    } else {
        None
    };

    Some(UciMove {
        from,
        to,
        promotion,
    })
}

pub fn to_uci_string(mv: &UciMove) -> String {
    let mut out = String::with_capacity(5);
    out.push_str(crate::bitboard::square_name(mv.from));
    out.push_str(crate::bitboard::square_name(mv.to));
    if let Some(promo) = mv.promotion {
        out.push(promo.to_char().to_ascii_lowercase());
    }
    out
}

// ============================================================
// Commands
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionCommand {
    pub fen: String,
    pub moves: Vec<UciMove>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoParams {
    pub depth: Option<u8>,
    pub nodes: Option<u64>,
    pub movetime: Option<Duration>,
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Option<Duration>,
    pub binc: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOption {
    Hash(usize),
    SyzygyPath(Option<String>),
    SyzygyProbeDepth(u8),
    Syzygy50MoveRule(bool),
    SyzygyProbeLimit(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Init,
    IsReady,
    NewGame,
    PrintFen,
    Eval,
    Zobrist,
    Perft(u8),
    DoMove(UciMove),
    Position(PositionCommand),
    Go(GoParams),
    SetOption(EngineOption),
    Stop,
    Quit,
}

fn parse_u8_attr(attr: &str, value: &str) -> Result<u8, UciError> {
    value
        .parse()
        .map_err(|_| UciError::InvalidValue(attr.to_string()))
}

fn parse_u64_attr(attr: &str, value: &str) -> Result<u64, UciError> {
    value
        .parse()
        .map_err(|_| UciError::InvalidValue(attr.to_string()))
}

fn parse_duration_attr(attr: &str, value: &str) -> Result<Duration, UciError> {
    // Some GUIs send negative clocks near flag fall; clamp to zero
    let ms: i64 = value
        .parse()
        .map_err(|_| UciError::InvalidValue(attr.to_string()))?;
    Ok(Duration::from_millis(ms.max(0) as u64))
}

fn parse_position(args: &[&str]) -> Result<PositionCommand, UciError> {
    enum Token {
        None,
        Fen,
        Move,
    }

    let mut token = Token::None;
    let mut fen = String::new();
    let mut moves = Vec::new();

    for &arg in args {
        match arg {
            "fen" => {
                token = Token::Fen;
                continue;
            }
            "moves" => {
                token = Token::Move;
                continue;
            }
            "startpos" => {
                fen = START_POS_FEN.to_string();
                continue;
            }
            _ => {}
        }

        match token {
            Token::Fen => {
                if !fen.is_empty() {
                    fen.push(' ');
                }
                fen.push_str(arg);
            }
            Token::Move => {
                let mv =
                    parse_uci_move(arg).ok_or_else(|| UciError::InvalidMove(arg.to_string()))?;
                moves.push(mv);
            }
            Token::None => {}
        }
    }

    if fen.is_empty() {
        return Err(UciError::MissingFen);
    }

    // Validate the FEN up front so a bad position never replaces the old one
    Position::from_fen(&fen)?;

    Ok(PositionCommand { fen, moves })
}

fn parse_go(args: &[&str]) -> Result<GoParams, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < args.len() {
        let attr = args[i];

        if attr == "infinite" {
            return Ok(params);
        }

        if i + 1 >= args.len() {
            return Err(UciError::MissingValue(attr.to_string()));
        }
        let value = args[i + 1];

        match attr {
            "depth" => params.depth = Some(parse_u8_attr(attr, value)?),
            "nodes" => params.nodes = Some(parse_u64_attr(attr, value)?),
            "movetime" => params.movetime = Some(parse_duration_attr(attr, value)?),
            "wtime" => params.wtime = Some(parse_duration_attr(attr, value)?),
            "btime" => params.btime = Some(parse_duration_attr(attr, value)?),
            "winc" => params.winc = Some(parse_duration_attr(attr, value)?),
            "binc" => params.binc = Some(parse_duration_attr(attr, value)?),
            _ => return Err(UciError::UnknownAttribute(attr.to_string())),
        }

        i += 2;
    }

    Ok(params)
}

fn parse_setoption(args: &[&str]) -> Result<EngineOption, UciError> {
    if args.first() != Some(&"name") {
        return Err(UciError::MissingOptionName);
    }

    let mut name_parts = Vec::new();
    let mut value_parts = Vec::new();
    let mut in_value = false;

    for &arg in &args[1..] {
        if arg == "value" && !in_value {
            in_value = true;
            continue;
        }
        if in_value {
            value_parts.push(arg);
        } else {
            name_parts.push(arg);
        }
    }

    if name_parts.is_empty() {
        return Err(UciError::MissingOptionName);
    }

    let name = name_parts.join(" ").to_lowercase();
    // Paths keep their original case; everything else compares lowercased
    let raw_value = value_parts.join(" ");
    let value = raw_value.to_lowercase();

    match name.as_str() {
        "hash" => {
            if value.is_empty() {
                return Err(UciError::MissingOptionValue(name));
            }
            let size_mb: usize = value
                .parse()
                .map_err(|_| UciError::InvalidOptionValue(name.clone()))?;
            if !(TT_MIN_SIZE_MB..=TT_MAX_SIZE_MB).contains(&size_mb) {
                return Err(UciError::InvalidOptionValue(name));
            }
            Ok(EngineOption::Hash(size_mb))
        }
        "syzygypath" => {
            let path = if raw_value.is_empty() {
                None
            } else {
                Some(raw_value)
            };
            Ok(EngineOption::SyzygyPath(path))
        }
        "syzygyprobedepth" => {
            if value.is_empty() {
                return Err(UciError::MissingOptionValue(name));
            }
            let depth: u8 = value
                .parse()
                .map_err(|_| UciError::InvalidOptionValue(name.clone()))?;
            Ok(EngineOption::SyzygyProbeDepth(depth))
        }
        "syzygy50moverule" => match value.as_str() {
            "true" => Ok(EngineOption::Syzygy50MoveRule(true)),
            "false" => Ok(EngineOption::Syzygy50MoveRule(false)),
            "" => Err(UciError::MissingOptionValue(name)),
            _ => Err(UciError::InvalidOptionValue(name)),
        },
        "syzygyprobelimit" => {
            if value.is_empty() {
                return Err(UciError::MissingOptionValue(name));
            }
            let limit: u8 = value
                .parse()
                .map_err(|_| UciError::InvalidOptionValue(name.clone()))?;
            if limit > 7 {
                return Err(UciError::InvalidOptionValue(name));
            }
            Ok(EngineOption::SyzygyProbeLimit(limit))
        }
        _ => Err(UciError::UnknownOption(name)),
    }
}

pub fn parse_command(line: &str) -> Result<UciCommand, UciError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = parts.split_first() else {
        return Err(UciError::UnknownCommand(String::new()));
    };

    match head {
        "uci" => Ok(UciCommand::Init),
        "isready" => Ok(UciCommand::IsReady),
        "ucinewgame" => Ok(UciCommand::NewGame),
        "printfen" => Ok(UciCommand::PrintFen),
        "eval" => Ok(UciCommand::Eval),
        "zobrist" => Ok(UciCommand::Zobrist),
        "perft" => {
            let depth = args
                .first()
                .ok_or_else(|| UciError::MissingValue("depth".to_string()))?;
            Ok(UciCommand::Perft(parse_u8_attr("depth", depth)?))
        }
        "domove" => {
            let text = args
                .first()
                .ok_or_else(|| UciError::MissingValue("move".to_string()))?;
            let mv =
                parse_uci_move(text).ok_or_else(|| UciError::InvalidMove(text.to_string()))?;
            Ok(UciCommand::DoMove(mv))
        }
        "position" => Ok(UciCommand::Position(parse_position(args)?)),
        "go" => Ok(UciCommand::Go(parse_go(args)?)),
        "setoption" => Ok(UciCommand::SetOption(parse_setoption(args)?)),
        "stop" => Ok(UciCommand::Stop),
        "quit" => Ok(UciCommand::Quit),
        _ => Err(UciError::UnknownCommand(head.to_string())),
    }
}

// ============================================================
// Time management
// ============================================================

/// Budget for one move from the remaining clock and increment. A slice of
/// the remaining time plus half the increment, capped so a reserve always
/// stays on the clock.
pub fn calculate_allocated_time(time_left: Duration, increment: Option<Duration>) -> Duration {
    if time_left.is_zero() {
        return time_left;
    }

    let reserve = (time_left / 20).max(Duration::from_millis(50));
    let max_time = time_left.saturating_sub(reserve);

    (time_left / 30 + increment.unwrap_or_default() / 2).min(max_time)
}

// ============================================================
// Applying moves
// ============================================================

/// Resolve a wire move against the position: find the moved piece, detect
/// en passant, reconstruct the captured piece.
pub fn to_engine_move(uci_move: &UciMove, pos: &Position) -> Result<Move, UciError> {
    let piece = pos
        .board
        .piece_at(uci_move.from)
        .ok_or_else(|| UciError::NoPieceAtFromSquare(to_uci_string(uci_move)))?;

    let is_en_passant = piece.is_pawn() && pos.ep_square == Some(uci_move.to);

    let captured = if is_en_passant {
        Some(Piece::pawn(piece.color().flip()))
    } else {
        pos.board.piece_at(uci_move.to)
    };

    // Recolour the promotion to the mover; a mismatched colour means the
    // move is illegal and the generator check below will reject it
    let promotion = uci_move
        .promotion
        .map(|p| Piece::from_kind(p.kind_index(), piece.color()));

    Ok(Move::new(
        piece,
        uci_move.from,
        uci_move.to,
        captured,
        promotion,
        is_en_passant,
    ))
}

/// Apply one user move, rejecting anything the generator would not emit or
/// that leaves the mover's king in check. The position is unchanged on error.
pub fn apply_uci_move(pos: &mut Position, uci_move: &UciMove) -> Result<(), UciError> {
    let mv = to_engine_move(uci_move, pos)?;

    if !movegen::pseudo_legal_moves(pos).contains(mv) {
        return Err(UciError::IllegalMove(to_uci_string(uci_move)));
    }

    let mover = pos.side;
    pos.make_move(mv);
    if movegen::is_in_check(mover, &pos.board) {
        pos.unmake_move(mv);
        return Err(UciError::IllegalMove(to_uci_string(uci_move)));
    }

    Ok(())
}

/// Build the commanded position. Any invalid move rejects the whole command
/// and the previous position stays in place.
pub fn apply_position_command(
    command: &PositionCommand,
    pos: &mut Position,
) -> Result<(), UciError> {
    let mut next = Position::from_fen(&command.fen)?;

    for uci_move in &command.moves {
        apply_uci_move(&mut next, uci_move)?;
    }

    *pos = next;
    Ok(())
}

// ============================================================
// Reporter
// ============================================================

/// Serialises per-iteration reports as UCI `info` lines and remembers the
/// first move of the latest PV as the best move.
pub struct UciReporter {
    best_move: Option<Move>,
}

impl UciReporter {
    pub fn new() -> UciReporter {
        UciReporter { best_move: None }
    }

    pub fn best_move(&self) -> Option<Move> {
        self.best_move
    }
}

impl Default for UciReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for UciReporter {
    fn send(&mut self, report: &Report) {
        let elapsed_ms = (report.elapsed().as_millis() as u64).max(1);
        let nps = report.nodes * 1000 / elapsed_ms;
        let (usage, capacity) = report.tt_stats;
        let hashfull = if capacity == 0 {
            0
        } else {
            usage * 1000 / capacity
        };

        let mut info = vec![
            format!("depth {}", report.depth),
            format!("nodes {}", report.nodes),
            format!("nps {}", nps),
            format!("hashfull {}", hashfull),
            format!("time {}", report.elapsed().as_millis()),
        ];

        if let Some((moves, score)) = &report.pv {
            if let Some(plies) = report.moves_until_mate() {
                // Mate distance is reported in full moves
                let full_moves = (plies as u32).div_ceil(2) as i32;
                let signed = if *score >= 0 { full_moves } else { -full_moves };
                info.push(format!("score mate {}", signed));
            } else {
                info.push(format!("score cp {}", score));
            }

            if !moves.is_empty() {
                let line: Vec<String> = moves.iter().map(|mv| mv.to_uci()).collect();
                info.push(format!("pv {}", line.join(" ")));
                self.best_move = Some(moves[0]);
            }
        }

        println!("info {}", info.join(" "));
    }
}

// ============================================================
// Search worker handle
// ============================================================

/// One running search. The worker owns the transposition table; joining the
/// thread hands it back, which is what makes "resize only between searches"
/// impossible to get wrong.
struct SearchHandle {
    thread: Option<JoinHandle<TranspositionTable>>,
    stop_signal: Option<Arc<AtomicBool>>,
}

impl SearchHandle {
    fn new() -> SearchHandle {
        SearchHandle {
            thread: None,
            stop_signal: None,
        }
    }

    /// Signal the worker, wait for it to finish, and recover its table.
    fn stop(&mut self) -> Option<TranspositionTable> {
        if let Some(signal) = self.stop_signal.take() {
            signal.store(true, Ordering::Release);
        }
        self.thread
            .take()
            .map(|thread| thread.join().expect("search worker panicked"))
    }
}

// ============================================================
// Main loop
// ============================================================

pub fn run_loop() {
    let stdin = io::stdin();
    let mut pos = Position::startpos();
    let mut hash_mb = TT_DEFAULT_SIZE_MB;
    let mut tt = Some(TranspositionTable::new(hash_mb));
    let mut handle = SearchHandle::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(UciCommand::Init) => {
                println!("id name {}", ENGINE_NAME);
                println!("id author {}", ENGINE_AUTHOR);
                println!(
                    "option name Hash type spin default {} min {} max {}",
                    TT_DEFAULT_SIZE_MB, TT_MIN_SIZE_MB, TT_MAX_SIZE_MB
                );
                println!("option name SyzygyPath type string default <empty>");
                println!("option name SyzygyProbeDepth type spin default 1 min 1 max 100");
                println!("option name Syzygy50MoveRule type check default true");
                println!("option name SyzygyProbeLimit type spin default 6 min 0 max 7");
                println!("uciok");
            }
            Ok(UciCommand::IsReady) => {
                println!("readyok");
            }
            Ok(UciCommand::NewGame) => {
                if let Some(recovered) = handle.stop() {
                    tt = Some(recovered);
                }
                pos = Position::startpos();
                if let Some(tt) = tt.as_mut() {
                    tt.clear();
                }
            }
            Ok(UciCommand::PrintFen) => {
                println!("{}", pos.to_fen());
            }
            Ok(UciCommand::Eval) => {
                println!("eval: {}", eval::evaluate(&pos));
            }
            Ok(UciCommand::Zobrist) => {
                println!("zobrist: {:#018x}", pos.hash);
            }
            Ok(UciCommand::Perft(depth)) => {
                let mut copy = pos.clone();
                let started = Instant::now();
                let nodes = movegen::perft_divide(&mut copy, depth);
                let ms = (started.elapsed().as_millis() as u64).max(1);
                println!("nodes: {}", nodes);
                println!("time: {} ms", ms);
                println!("nps: {}", nodes * 1000 / ms);
            }
            Ok(UciCommand::DoMove(uci_move)) => {
                if let Err(e) = apply_uci_move(&mut pos, &uci_move) {
                    println!("error: {}", e);
                }
            }
            Ok(UciCommand::Position(command)) => {
                if let Some(recovered) = handle.stop() {
                    tt = Some(recovered);
                }
                if let Err(e) = apply_position_command(&command, &mut pos) {
                    println!("error: {}", e);
                }
            }
            Ok(UciCommand::Go(params)) => {
                if let Some(recovered) = handle.stop() {
                    tt = Some(recovered);
                }

                let mut limits = Limits {
                    depth: params.depth,
                    nodes: params.nodes,
                    time: None,
                };
                limits.time = match params.movetime {
                    Some(movetime) => Some(movetime),
                    None => {
                        let white = pos.side == Color::White;
                        let time_left = if white { params.wtime } else { params.btime };
                        let increment = if white { params.winc } else { params.binc };
                        time_left.map(|left| calculate_allocated_time(left, increment))
                    }
                };

                // A probeable endgame plays straight from the tablebase
                if tablebase::should_probe(&pos, limits.depth.unwrap_or(search::MAX_DEPTH)) {
                    if let Some((best, result)) = tablebase::probe_root(&pos) {
                        println!("info string tablebase {}", result);
                        println!("bestmove {}", best);
                        continue;
                    }
                }

                let stop_signal = Arc::new(AtomicBool::new(false));
                let worker_signal = Arc::clone(&stop_signal);
                let mut worker_pos = pos.clone();
                let worker_tt = tt
                    .take()
                    .unwrap_or_else(|| TranspositionTable::new(hash_mb));

                let thread = std::thread::spawn(move || {
                    let mut tt = worker_tt;
                    let mut reporter = UciReporter::new();
                    search::search_with_tt(
                        &mut worker_pos,
                        &limits,
                        &mut reporter,
                        &mut tt,
                        Some(worker_signal),
                    );

                    match reporter.best_move() {
                        Some(mv) => println!("bestmove {}", mv.to_uci()),
                        None => println!("bestmove (none)"),
                    }

                    tt
                });

                handle.thread = Some(thread);
                handle.stop_signal = Some(stop_signal);
            }
            Ok(UciCommand::SetOption(option)) => match option {
                EngineOption::Hash(size_mb) => {
                    if let Some(recovered) = handle.stop() {
                        tt = Some(recovered);
                    }
                    hash_mb = size_mb;
                    tt = Some(TranspositionTable::new(hash_mb));
                }
                EngineOption::SyzygyPath(path) => {
                    let path = path.unwrap_or_default();
                    tablebase::Config::set_path(&path);
                    tablebase::init(&path);
                }
                EngineOption::SyzygyProbeDepth(depth) => {
                    tablebase::Config::set_probe_depth(depth);
                }
                EngineOption::Syzygy50MoveRule(enabled) => {
                    tablebase::Config::set_50_move_rule(enabled);
                }
                EngineOption::SyzygyProbeLimit(limit) => {
                    tablebase::Config::set_probe_limit(limit);
                }
            },
            Ok(UciCommand::Stop) => {
                if let Some(recovered) = handle.stop() {
                    tt = Some(recovered);
                }
            }
            Ok(UciCommand::Quit) => {
                handle.stop();
                return;
            }
            Err(e) => {
                println!("error: {}", e);
            }
        }
    }

    handle.stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::sq;

    fn setup() {
        movegen::init();
    }

    #[test]
    fn test_parse_uci_move() {
        let mv = parse_uci_move("e2e4").unwrap();
        assert_eq!(mv.from, sq::E2);
        assert_eq!(mv.to, sq::E4);
        assert_eq!(mv.promotion, None);

        let promo = parse_uci_move("e7e8q").unwrap();
        assert_eq!(promo.promotion, Some(Piece::WQ));
        let promo = parse_uci_move("a2a1N").unwrap();
        assert_eq!(promo.promotion, Some(Piece::BN));

        assert!(parse_uci_move("e2").is_none());
        assert!(parse_uci_move("e2e9").is_none());
        assert!(parse_uci_move("e7e8x").is_none());
        assert!(parse_uci_move("e2e4e5").is_none());
    }

    #[test]
    fn test_uci_move_roundtrip() {
        for text in ["e2e4", "e1g1", "a7a8q", "h2h1r"] {
            let mv = parse_uci_move(text).unwrap();
            assert_eq!(to_uci_string(&mv), text);
        }
    }

    #[test]
    fn test_parse_position_startpos() {
        let cmd = parse_command("position startpos").unwrap();
        let UciCommand::Position(position) = cmd else {
            panic!("expected a position command");
        };
        assert_eq!(position.fen, START_POS_FEN);
        assert!(position.moves.is_empty());
    }

    #[test]
    fn test_parse_position_fen_and_moves() {
        let cmd = parse_command(
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1 moves a1a2",
        )
        .unwrap();
        let UciCommand::Position(position) = cmd else {
            panic!("expected a position command");
        };
        assert_eq!(position.fen, "8/8/8/8/8/8/8/K6k w - - 0 1");
        assert_eq!(position.moves.len(), 1);
        assert_eq!(position.moves[0].from, sq::A1);
    }

    #[test]
    fn test_parse_position_rejects_bad_input() {
        assert!(parse_command("position").is_err());
        assert!(parse_command("position fen not a fen").is_err());
        assert!(parse_command("position startpos moves e2e9").is_err());
    }

    #[test]
    fn test_parse_go() {
        let UciCommand::Go(params) = parse_command("go depth 6 nodes 100000").unwrap() else {
            panic!("expected a go command");
        };
        assert_eq!(params.depth, Some(6));
        assert_eq!(params.nodes, Some(100_000));
        assert_eq!(params.movetime, None);

        let UciCommand::Go(params) =
            parse_command("go wtime 60000 btime 60000 winc 1000 binc 1000").unwrap()
        else {
            panic!("expected a go command");
        };
        assert_eq!(params.wtime, Some(Duration::from_secs(60)));
        assert_eq!(params.winc, Some(Duration::from_secs(1)));

        let UciCommand::Go(params) = parse_command("go infinite").unwrap() else {
            panic!("expected a go command");
        };
        assert_eq!(params, GoParams::default());

        assert!(parse_command("go depth").is_err());
        assert!(parse_command("go depth 300").is_err());
        assert!(parse_command("go sideways 3").is_err());
    }

    #[test]
    fn test_parse_setoption() {
        assert_eq!(
            parse_command("setoption name Hash value 128").unwrap(),
            UciCommand::SetOption(EngineOption::Hash(128))
        );
        assert_eq!(
            parse_command("setoption name Syzygy50MoveRule value false").unwrap(),
            UciCommand::SetOption(EngineOption::Syzygy50MoveRule(false))
        );
        assert_eq!(
            parse_command("setoption name SyzygyProbeLimit value 5").unwrap(),
            UciCommand::SetOption(EngineOption::SyzygyProbeLimit(5))
        );
        assert_eq!(
            parse_command("setoption name SyzygyPath value /tb/wdl:/tb/dtz").unwrap(),
            UciCommand::SetOption(EngineOption::SyzygyPath(Some("/tb/wdl:/tb/dtz".to_string())))
        );

        assert!(parse_command("setoption name Hash value 0").is_err());
        assert!(parse_command("setoption name Hash value 8192").is_err());
        assert!(parse_command("setoption name Hash").is_err());
        assert!(parse_command("setoption name SyzygyProbeLimit value 9").is_err());
        assert!(parse_command("setoption name MultiPV value 2").is_err());
        assert!(parse_command("setoption Hash value 16").is_err());
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(parse_command("xyzzy").is_err());
    }

    #[test]
    fn test_calculate_allocated_time() {
        // Never allocates the whole clock
        let left = Duration::from_secs(60);
        let allocated = calculate_allocated_time(left, Some(Duration::from_secs(1)));
        assert!(allocated < left);
        assert_eq!(allocated, Duration::from_millis(2500));

        // A dead clock allocates nothing
        assert_eq!(
            calculate_allocated_time(Duration::ZERO, None),
            Duration::ZERO
        );

        // Tiny clocks leave the reserve behind
        let left = Duration::from_millis(80);
        let allocated = calculate_allocated_time(left, None);
        assert!(allocated <= Duration::from_millis(30));
    }

    #[test]
    fn test_to_engine_move_detects_en_passant() {
        setup();
        let pos =
            Position::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PP1/RNBQKBNR b KQkq e3 0 3")
                .unwrap();
        let uci_move = parse_uci_move("d4e3").unwrap();
        let mv = to_engine_move(&uci_move, &pos).unwrap();
        assert!(mv.is_en_passant());
        assert_eq!(mv.captured_piece(), Some(Piece::WP));
        assert_eq!(mv.capture_square(), Some(sq::E4));
    }

    #[test]
    fn test_apply_position_command() {
        setup();
        let command = PositionCommand {
            fen: START_POS_FEN.to_string(),
            moves: vec![
                parse_uci_move("e2e4").unwrap(),
                parse_uci_move("e7e5").unwrap(),
            ],
        };

        let mut pos = Position::startpos();
        apply_position_command(&command, &mut pos).unwrap();
        assert_eq!(
            pos.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2"
        );
    }

    #[test]
    fn test_apply_position_rejects_illegal_move() {
        setup();
        // e2e5 is not a pawn move; the whole command is rejected and the
        // previous position survives
        let command = PositionCommand {
            fen: START_POS_FEN.to_string(),
            moves: vec![parse_uci_move("e2e5").unwrap()],
        };

        let mut pos = Position::from_fen("8/8/8/8/8/8/8/K6k w - - 0 1").unwrap();
        let before = pos.to_fen();
        assert!(apply_position_command(&command, &mut pos).is_err());
        assert_eq!(pos.to_fen(), before);
    }

    #[test]
    fn test_apply_castling_move() {
        setup();
        let command = PositionCommand {
            fen: "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1"
                .to_string(),
            moves: vec![parse_uci_move("e1g1").unwrap()],
        };

        let mut pos = Position::startpos();
        apply_position_command(&command, &mut pos).unwrap();
        assert_eq!(pos.board.piece_at(sq::G1), Some(Piece::WK));
        assert_eq!(pos.board.piece_at(sq::F1), Some(Piece::WR));
    }

    #[test]
    fn test_apply_promotion_move() {
        setup();
        let command = PositionCommand {
            fen: "8/4P1k1/8/8/8/8/8/4K3 w - - 0 1".to_string(),
            moves: vec![parse_uci_move("e7e8q").unwrap()],
        };

        let mut pos = Position::startpos();
        apply_position_command(&command, &mut pos).unwrap();
        assert_eq!(pos.board.piece_at(sq::E8), Some(Piece::WQ));
    }

    #[test]
    fn test_reporter_tracks_best_move() {
        let mut reporter = UciReporter::new();
        assert!(reporter.best_move().is_none());

        let mut report = Report::new();
        let mv = Move::new(Piece::WP, sq::E2, sq::E4, None, None, false);
        report.depth = 1;
        report.pv = Some((vec![mv], 25));
        reporter.send(&report);

        assert_eq!(reporter.best_move(), Some(mv));

        // A report with an empty PV keeps the previous best move
        report.pv = Some((Vec::new(), 0));
        reporter.send(&report);
        assert_eq!(reporter.best_move(), Some(mv));
    }
}
