//! Black-box UCI tests driving the engine binary over stdin/stdout.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Engine process wrapper with threaded output reading.
struct EngineProcess {
    child: Child,
    output_rx: Receiver<String>,
    _reader_thread: thread::JoinHandle<()>,
}

impl EngineProcess {
    fn new() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_mutsu"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to start engine");

        let stdout = child.stdout.take().expect("failed to take stdout");
        let (tx, rx): (Sender<String>, Receiver<String>) = mpsc::channel();

        let reader_thread = thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        EngineProcess {
            child,
            output_rx: rx,
            _reader_thread: reader_thread,
        }
    }

    fn send(&mut self, cmd: &str) {
        let stdin = self.child.stdin.as_mut().expect("stdin closed");
        writeln!(stdin, "{}", cmd).expect("failed to write to engine");
        stdin.flush().expect("failed to flush stdin");
    }

    /// Read lines until one contains `pattern` or the timeout elapses.
    fn read_until(&mut self, pattern: &str, timeout: Duration) -> (Vec<String>, bool) {
        let start = Instant::now();
        let mut lines = Vec::new();

        while start.elapsed() < timeout {
            match self.output_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(line) => {
                    let found = line.contains(pattern);
                    lines.push(line);
                    if found {
                        return (lines, true);
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        (lines, false)
    }

    fn init_uci(&mut self) -> Vec<String> {
        self.send("uci");
        let (lines, found) = self.read_until("uciok", Duration::from_secs(5));
        assert!(found, "engine never sent uciok");

        self.send("isready");
        let (_, found) = self.read_until("readyok", Duration::from_secs(5));
        assert!(found, "engine never sent readyok");

        lines
    }

    /// Run a position + go pair and return the bestmove token.
    fn best_move(&mut self, position: &str, go: &str, timeout: Duration) -> Option<String> {
        self.send(position);
        self.send(go);

        let (lines, found) = self.read_until("bestmove", timeout);
        if !found {
            return None;
        }

        lines.iter().rev().find_map(|line| parse_bestmove(line))
    }

    fn terminate(&mut self) {
        if let Some(stdin) = self.child.stdin.as_mut() {
            let _ = writeln!(stdin, "quit");
            let _ = stdin.flush();
        }
        thread::sleep(Duration::from_millis(100));
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn parse_bestmove(line: &str) -> Option<String> {
    if !line.starts_with("bestmove") {
        return None;
    }
    line.split_whitespace().nth(1).map(|s| s.to_string())
}

// ============================================================
// Tests
// ============================================================

#[test]
fn handshake_advertises_options() {
    let mut engine = EngineProcess::new();
    let lines = engine.init_uci();

    assert!(lines.iter().any(|l| l.starts_with("id name")));
    assert!(lines.iter().any(|l| l.starts_with("id author")));
    assert!(lines
        .iter()
        .any(|l| l.contains("option name Hash type spin default 64 min 1 max 4096")));
    assert!(lines.iter().any(|l| l.contains("option name SyzygyPath type string")));
    assert!(lines.iter().any(|l| l.contains("option name SyzygyProbeDepth")));
    assert!(lines.iter().any(|l| l.contains("option name Syzygy50MoveRule type check")));
    assert!(lines.iter().any(|l| l.contains("option name SyzygyProbeLimit")));
}

#[test]
fn startpos_depth_2_plays_e2e4() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    let best = engine
        .best_move("position startpos", "go depth 2", Duration::from_secs(30))
        .expect("no bestmove");
    assert_eq!(best, "e2e4");
}

#[test]
fn go_emits_info_lines_per_iteration() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position startpos");
    engine.send("go depth 3");
    let (lines, found) = engine.read_until("bestmove", Duration::from_secs(30));
    assert!(found);

    let info_lines: Vec<&String> = lines.iter().filter(|l| l.starts_with("info depth")).collect();
    assert!(info_lines.len() >= 3, "expected one info line per depth");

    for line in &info_lines {
        for token in ["nodes", "nps", "hashfull", "time", "score"] {
            assert!(line.contains(token), "info line missing {}: {}", token, line);
        }
    }
}

#[test]
fn finds_back_rank_mate() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position fen 6k1/5ppp/8/8/8/8/8/4R1K1 w - - 0 1");
    engine.send("go depth 2");
    let (lines, found) = engine.read_until("bestmove", Duration::from_secs(30));
    assert!(found);

    let best = lines.iter().rev().find_map(|l| parse_bestmove(l)).unwrap();
    assert_eq!(best, "e1e8");
    assert!(
        lines.iter().any(|l| l.contains("score mate 1")),
        "expected a mate score in: {:?}",
        lines
    );
}

#[test]
fn mated_position_reports_none() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    let best = engine
        .best_move(
            "position fen 5R1k/6pp/8/8/8/8/8/6K1 b - - 0 1",
            "go depth 1",
            Duration::from_secs(10),
        )
        .expect("no bestmove");
    assert_eq!(best, "(none)");
}

#[test]
fn stop_during_deep_search_still_reports_bestmove() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position startpos");
    engine.send("go depth 100");
    thread::sleep(Duration::from_millis(50));
    engine.send("stop");

    let (lines, found) = engine.read_until("bestmove", Duration::from_secs(10));
    assert!(found, "no bestmove after stop");

    let best = lines.iter().rev().find_map(|l| parse_bestmove(l)).unwrap();
    assert_ne!(best, "(none)");
    // At least one completed iteration must have been reported
    assert!(lines.iter().any(|l| l.starts_with("info depth")));
}

#[test]
fn position_with_moves_is_applied() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position startpos moves e2e4 e7e5 g1f3");
    engine.send("printfen");
    let (lines, found) = engine.read_until("b KQkq", Duration::from_secs(5));
    assert!(found, "printfen did not echo the position: {:?}", lines);
    assert!(lines
        .iter()
        .any(|l| l == "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"));
}

#[test]
fn invalid_position_command_keeps_state() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position startpos moves e2e4");
    // e2e5 is illegal from the start position: whole command rejected
    engine.send("position startpos moves e2e5");
    let (_, found) = engine.read_until("error:", Duration::from_secs(5));
    assert!(found, "illegal move did not produce an error line");

    engine.send("printfen");
    let (lines, found) = engine.read_until("0 1", Duration::from_secs(5));
    assert!(found);
    assert!(lines
        .iter()
        .any(|l| l == "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"));
}

#[test]
fn rejects_malformed_commands_and_options() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("flibbertigibbet");
    let (_, found) = engine.read_until("error: unknown command", Duration::from_secs(5));
    assert!(found);

    engine.send("setoption name Hash value 100000");
    let (_, found) = engine.read_until("error:", Duration::from_secs(5));
    assert!(found);

    engine.send("setoption name NoSuchOption value 1");
    let (_, found) = engine.read_until("error: unknown option", Duration::from_secs(5));
    assert!(found);

    // The engine still works afterwards
    let best = engine
        .best_move("position startpos", "go depth 1", Duration::from_secs(10))
        .expect("engine broke after error input");
    assert!(!best.is_empty());
}

#[test]
fn hash_option_resizes_between_searches() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("setoption name Hash value 16");
    engine.send("isready");
    let (_, found) = engine.read_until("readyok", Duration::from_secs(5));
    assert!(found);

    let best = engine
        .best_move("position startpos", "go depth 3", Duration::from_secs(30))
        .expect("no bestmove after resize");
    assert!(!best.is_empty());
}

#[test]
fn ucinewgame_resets_position() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position startpos moves e2e4");
    engine.send("ucinewgame");
    engine.send("printfen");
    let (lines, found) = engine.read_until("w KQkq", Duration::from_secs(5));
    assert!(found);
    assert!(lines
        .iter()
        .any(|l| l == "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"));
}

#[test]
fn go_movetime_terminates() {
    let mut engine = EngineProcess::new();
    engine.init_uci();

    engine.send("position startpos");
    engine.send("go movetime 200");
    let (lines, found) = engine.read_until("bestmove", Duration::from_secs(10));
    assert!(found, "movetime search never finished: {:?}", lines);
}
