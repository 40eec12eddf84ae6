/// Syzygy endgame tablebase probing.
///
/// WDL tables give the game-theoretic outcome for positions within the
/// piece limit; DTZ tables give the distance to a zeroing move, which picks
/// the optimal root move under the fifty-move rule. Probing is configured
/// entirely through UCI options and fails soft: without loaded tables every
/// probe reports `Failed` and the search proceeds normally.

use crate::position::Position;

use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};
use shakmaty_syzygy::{AmbiguousWdl, MaybeRounded, Tablebase as SyzygyTablebase};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;

// ============================================================
// Configuration (set via UCI options)
// ============================================================

static PATH: Mutex<String> = Mutex::new(String::new());
static PROBE_DEPTH: AtomicU8 = AtomicU8::new(1);
static USE_50_MOVE_RULE: AtomicBool = AtomicBool::new(true);
static PROBE_LIMIT: AtomicU8 = AtomicU8::new(6);

pub struct Config;

impl Config {
    pub fn set_path(path: &str) {
        *PATH.lock().unwrap() = path.to_string();
    }

    pub fn get_path() -> String {
        PATH.lock().unwrap().clone()
    }

    pub fn set_probe_depth(depth: u8) {
        PROBE_DEPTH.store(depth, Ordering::Relaxed);
    }

    pub fn get_probe_depth() -> u8 {
        PROBE_DEPTH.load(Ordering::Relaxed)
    }

    pub fn set_50_move_rule(enabled: bool) {
        USE_50_MOVE_RULE.store(enabled, Ordering::Relaxed);
    }

    pub fn get_50_move_rule() -> bool {
        USE_50_MOVE_RULE.load(Ordering::Relaxed)
    }

    pub fn set_probe_limit(limit: u8) {
        PROBE_LIMIT.store(limit, Ordering::Relaxed);
    }

    pub fn get_probe_limit() -> u8 {
        PROBE_LIMIT.load(Ordering::Relaxed)
    }
}

// ============================================================
// Global tablebase instance
// ============================================================

static SYZYGY: Mutex<Option<SyzygyTablebase<Chess>>> = Mutex::new(None);
static MAX_PIECES: AtomicU32 = AtomicU32::new(0);

/// (Re)initialize the tablebase from a list of directories separated by
/// `:` (Unix) or `;` (Windows). An empty path unloads everything.
pub fn init(paths: &str) {
    let mut tb = SyzygyTablebase::new();
    let mut total = 0usize;

    for path in paths.split([':', ';']) {
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        if !Path::new(path).exists() {
            eprintln!("info string syzygy path not found: {}", path);
            continue;
        }
        match tb.add_directory(path) {
            Ok(count) => {
                total += count;
                eprintln!("info string loaded {} tablebase files from {}", count, path);
            }
            Err(e) => {
                eprintln!("info string error loading tablebases from {}: {}", path, e);
            }
        }
    }

    if total > 0 {
        let max = tb.max_pieces();
        eprintln!(
            "info string syzygy: {} tablebase files, up to {} pieces",
            total, max
        );
        MAX_PIECES.store(max as u32, Ordering::Relaxed);
        *SYZYGY.lock().unwrap() = Some(tb);
    } else {
        MAX_PIECES.store(0, Ordering::Relaxed);
        *SYZYGY.lock().unwrap() = None;
    }
}

pub fn available() -> bool {
    MAX_PIECES.load(Ordering::Relaxed) > 0
}

pub fn max_pieces() -> u32 {
    MAX_PIECES.load(Ordering::Relaxed)
}

// ============================================================
// Probe results
// ============================================================

/// Outcome from the perspective of the side to move, with the distance to
/// the next zeroing move when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TbResult {
    Win(i32),
    Draw,
    Loss(i32),
    /// Position not probeable (no tables, too many pieces, castling rights)
    Failed,
}

impl std::fmt::Display for TbResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TbResult::Win(dtz) => write!(f, "win dtz {}", dtz),
            TbResult::Draw => write!(f, "draw"),
            TbResult::Loss(dtz) => write!(f, "loss dtz {}", dtz),
            TbResult::Failed => write!(f, "failed"),
        }
    }
}

/// Tables cannot represent castling rights, and only cover positions within
/// the configured piece limit.
pub fn is_probeable(pos: &Position) -> bool {
    if !available() {
        return false;
    }

    if pos.castling.value() != 0 {
        return false;
    }

    let piece_count = pos.board.total_pieces();
    piece_count <= max_pieces() && piece_count <= Config::get_probe_limit() as u32
}

/// Gate on the remaining search depth so shallow searches skip the probe.
pub fn should_probe(pos: &Position, remaining_depth: u8) -> bool {
    is_probeable(pos) && remaining_depth >= Config::get_probe_depth()
}

fn position_to_shakmaty(pos: &Position) -> Option<Chess> {
    // FEN is the simplest faithful interchange format
    let fen: Fen = pos.to_fen().parse().ok()?;
    fen.into_position(CastlingMode::Standard).ok()
}

/// Probe WDL for the side to move. Cursed wins and blessed losses collapse
/// to draws while the fifty-move rule is being honoured.
pub fn probe_wdl(pos: &Position) -> TbResult {
    if !is_probeable(pos) {
        return TbResult::Failed;
    }

    let Some(shakmaty_pos) = position_to_shakmaty(pos) else {
        return TbResult::Failed;
    };

    let guard = SYZYGY.lock().unwrap();
    let Some(tb) = guard.as_ref() else {
        return TbResult::Failed;
    };

    let rule50 = Config::get_50_move_rule();

    match tb.probe_wdl(&shakmaty_pos) {
        Ok(wdl) => match wdl {
            AmbiguousWdl::Win | AmbiguousWdl::MaybeWin => TbResult::Win(0),
            AmbiguousWdl::CursedWin => {
                if rule50 {
                    TbResult::Draw
                } else {
                    TbResult::Win(0)
                }
            }
            AmbiguousWdl::Draw => TbResult::Draw,
            AmbiguousWdl::BlessedLoss => {
                if rule50 {
                    TbResult::Draw
                } else {
                    TbResult::Loss(0)
                }
            }
            AmbiguousWdl::MaybeLoss | AmbiguousWdl::Loss => TbResult::Loss(0),
        },
        Err(_) => TbResult::Failed,
    }
}

/// Probe DTZ for the side to move.
pub fn probe_dtz(pos: &Position) -> TbResult {
    if !is_probeable(pos) {
        return TbResult::Failed;
    }

    let Some(shakmaty_pos) = position_to_shakmaty(pos) else {
        return TbResult::Failed;
    };

    let guard = SYZYGY.lock().unwrap();
    let Some(tb) = guard.as_ref() else {
        return TbResult::Failed;
    };

    match tb.probe_dtz(&shakmaty_pos) {
        Ok(MaybeRounded::Precise(dtz)) | Ok(MaybeRounded::Rounded(dtz)) => {
            let plies = dtz.0;
            if plies > 0 {
                TbResult::Win(plies)
            } else if plies < 0 {
                TbResult::Loss(plies)
            } else {
                TbResult::Draw
            }
        }
        Err(_) => TbResult::Failed,
    }
}

/// Best root move by DTZ, as a UCI move string. None when the position is
/// not probeable or has no legal moves.
pub fn probe_root(pos: &Position) -> Option<(String, TbResult)> {
    if !is_probeable(pos) {
        return None;
    }

    let shakmaty_pos = position_to_shakmaty(pos)?;

    let guard = SYZYGY.lock().unwrap();
    let tb = guard.as_ref()?;

    match tb.best_move(&shakmaty_pos) {
        Ok(Some((mv, dtz))) => {
            let uci = mv.to_uci(CastlingMode::Standard).to_string();
            let plies = dtz.ignore_rounding().0;
            let result = if plies > 0 {
                TbResult::Win(plies)
            } else if plies < 0 {
                TbResult::Loss(plies)
            } else {
                TbResult::Draw
            };
            Some((uci, result))
        }
        Ok(None) => None,
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_converts_to_shakmaty() {
        let pos = Position::startpos();
        assert!(position_to_shakmaty(&pos).is_some());

        let endgame = Position::from_fen("8/8/3k4/8/8/4K3/8/Q7 w - - 0 1").unwrap();
        assert!(position_to_shakmaty(&endgame).is_some());
    }

    #[test]
    fn test_probes_fail_without_tables() {
        let pos = Position::from_fen("8/8/3k4/8/8/4K3/8/Q7 w - - 0 1").unwrap();
        assert_eq!(probe_wdl(&pos), TbResult::Failed);
        assert_eq!(probe_dtz(&pos), TbResult::Failed);
        assert!(probe_root(&pos).is_none());
        assert!(!is_probeable(&pos));
    }

    #[test]
    fn test_config_roundtrip() {
        Config::set_probe_depth(3);
        assert_eq!(Config::get_probe_depth(), 3);
        Config::set_probe_depth(1);

        Config::set_probe_limit(5);
        assert_eq!(Config::get_probe_limit(), 5);
        Config::set_probe_limit(6);

        Config::set_50_move_rule(false);
        assert!(!Config::get_50_move_rule());
        Config::set_50_move_rule(true);

        Config::set_path("/nonexistent");
        assert_eq!(Config::get_path(), "/nonexistent");
        Config::set_path("");
    }

    #[test]
    fn test_init_with_missing_directory() {
        // A bogus path must leave the tablebase unavailable, not panic
        init("/definitely/not/a/real/path");
        assert!(!available());
        assert_eq!(max_pieces(), 0);
    }

    #[test]
    fn test_result_formatting() {
        assert_eq!(TbResult::Win(12).to_string(), "win dtz 12");
        assert_eq!(TbResult::Draw.to_string(), "draw");
        assert_eq!(TbResult::Loss(-3).to_string(), "loss dtz -3");
    }
}
