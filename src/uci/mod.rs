//! Universal Chess Interface front end.
//!
//! A thin translation layer: parse commands from the GUI, delegate to the
//! engine controller, and format its callbacks back onto stdout.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use crate::board::{Board, START_FEN};
use crate::engine::{options, Engine};
use crate::search::{InfoCallback, SearchInfo, SearchLimits};

/// A parsed command from the GUI.
#[derive(Clone, Debug, PartialEq)]
pub enum UciCommand {
    Uci,
    IsReady,
    NewGame,
    Position {
        fen: String,
        moves: Vec<String>,
    },
    Go(GoCommand),
    Stop,
    PonderHit,
    SetOption {
        name: String,
        value: String,
    },
    Display,
    Quit,
    Unknown(String),
}

/// Parameters of a `go` command; `searchmoves` stays textual until the
/// position is known.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GoCommand {
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: u64,
    pub binc: u64,
    pub movestogo: Option<u32>,
    pub movetime: Option<u64>,
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub mate: Option<u32>,
    pub infinite: bool,
    pub ponder: bool,
    pub searchmoves: Vec<String>,
    pub perft: Option<usize>,
}

impl UciCommand {
    /// Parse one line of GUI input.
    #[must_use]
    pub fn parse(line: &str) -> UciCommand {
        let mut tokens = line.split_whitespace();
        let Some(head) = tokens.next() else {
            return UciCommand::Unknown(String::new());
        };

        match head {
            "uci" => UciCommand::Uci,
            "isready" => UciCommand::IsReady,
            "ucinewgame" => UciCommand::NewGame,
            "stop" => UciCommand::Stop,
            "ponderhit" => UciCommand::PonderHit,
            "quit" => UciCommand::Quit,
            "d" => UciCommand::Display,
            "position" => Self::parse_position(&mut tokens),
            "go" => UciCommand::Go(Self::parse_go(&mut tokens)),
            "setoption" => Self::parse_setoption(&mut tokens),
            _ => UciCommand::Unknown(line.to_string()),
        }
    }

    fn parse_position<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> UciCommand {
        let fen = match tokens.next() {
            Some("startpos") => START_FEN.to_string(),
            Some("fen") => {
                let mut fields = Vec::new();
                loop {
                    match tokens.next() {
                        Some("moves") => {
                            let moves = tokens.map(str::to_string).collect();
                            return UciCommand::Position {
                                fen: fields.join(" "),
                                moves,
                            };
                        }
                        Some(token) => fields.push(token.to_string()),
                        None => {
                            return UciCommand::Position {
                                fen: fields.join(" "),
                                moves: Vec::new(),
                            }
                        }
                    }
                }
            }
            _ => return UciCommand::Unknown("position".to_string()),
        };

        let moves = match tokens.next() {
            Some("moves") => tokens.map(str::to_string).collect(),
            _ => Vec::new(),
        };
        UciCommand::Position { fen, moves }
    }

    fn parse_go<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> GoCommand {
        let mut go = GoCommand::default();
        let mut tokens = tokens.peekable();

        while let Some(token) = tokens.next() {
            match token {
                "wtime" => go.wtime = tokens.next().and_then(|t| t.parse().ok()),
                "btime" => go.btime = tokens.next().and_then(|t| t.parse().ok()),
                "winc" => go.winc = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0),
                "binc" => go.binc = tokens.next().and_then(|t| t.parse().ok()).unwrap_or(0),
                "movestogo" => go.movestogo = tokens.next().and_then(|t| t.parse().ok()),
                "movetime" => go.movetime = tokens.next().and_then(|t| t.parse().ok()),
                "depth" => go.depth = tokens.next().and_then(|t| t.parse().ok()),
                "nodes" => go.nodes = tokens.next().and_then(|t| t.parse().ok()),
                "mate" => go.mate = tokens.next().and_then(|t| t.parse().ok()),
                "perft" => go.perft = tokens.next().and_then(|t| t.parse().ok()),
                "infinite" => go.infinite = true,
                "ponder" => go.ponder = true,
                "searchmoves" => {
                    while let Some(candidate) = tokens.peek() {
                        // Move strings are the only tokens of this shape
                        if candidate.len() >= 4
                            && candidate.as_bytes()[0].is_ascii_lowercase()
                            && candidate.as_bytes()[1].is_ascii_digit()
                        {
                            go.searchmoves.push((*tokens.next().unwrap()).to_string());
                        } else {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
        go
    }

    fn parse_setoption<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> UciCommand {
        // setoption name <name tokens> [value <value tokens>]
        let mut name_parts = Vec::new();
        let mut value_parts = Vec::new();
        let mut in_value = false;

        for token in tokens {
            match token {
                "name" if name_parts.is_empty() && !in_value => {}
                "value" if !in_value => in_value = true,
                _ if in_value => value_parts.push(token),
                _ => name_parts.push(token),
            }
        }

        UciCommand::SetOption {
            name: name_parts.join(" "),
            value: value_parts.join(" "),
        }
    }
}

impl GoCommand {
    /// Resolve the textual parameters against the current position.
    #[must_use]
    pub fn to_limits(&self, board: &Board) -> SearchLimits {
        let searchmoves = self
            .searchmoves
            .iter()
            .filter_map(|s| board.parse_uci_move(s).ok())
            .collect();

        SearchLimits {
            wtime: self.wtime,
            btime: self.btime,
            winc: self.winc,
            binc: self.binc,
            movestogo: self.movestogo,
            movetime: self.movetime,
            depth: self.depth,
            nodes: self.nodes,
            mate: self.mate,
            infinite: self.infinite,
            ponder: self.ponder,
            searchmoves,
            ..SearchLimits::default()
        }
    }
}

/// Format an info line per the UCI protocol.
#[must_use]
pub fn format_info(info: &SearchInfo) -> String {
    let mut line = format!(
        "info depth {} seldepth {} multipv {}",
        info.depth, info.seldepth, info.multipv
    );

    match info.mate_in {
        Some(mate) => line.push_str(&format!(" score mate {mate}")),
        None => line.push_str(&format!(" score cp {}", info.score)),
    }
    if let Some(bound) = info.bound {
        line.push_str(match bound {
            crate::tt::Bound::Lower => " lowerbound",
            crate::tt::Bound::Upper => " upperbound",
            _ => "",
        });
    }

    line.push_str(&format!(
        " nodes {} nps {} hashfull {} time {}",
        info.nodes, info.nps, info.hashfull, info.time_ms
    ));

    if !info.pv.is_empty() {
        line.push_str(" pv ");
        line.push_str(&info.pv.join(" "));
    }
    line
}

fn print_id_and_options() {
    println!("id name Riptide {}", env!("CARGO_PKG_VERSION"));
    println!("id author the Riptide authors");
    println!(
        "option name Hash type spin default 16 min {} max {}",
        options::HASH_MIN,
        options::HASH_MAX
    );
    println!(
        "option name Threads type spin default 1 min {} max {}",
        options::THREADS_MIN,
        options::THREADS_MAX
    );
    println!(
        "option name MultiPV type spin default 1 min {} max {}",
        options::MULTI_PV_MIN,
        options::MULTI_PV_MAX
    );
    println!(
        "option name Move Overhead type spin default 30 min 0 max {}",
        options::MOVE_OVERHEAD_MAX
    );
    println!(
        "option name Minimum Thinking Time type spin default 0 min 0 max {}",
        options::MIN_THINKING_MAX
    );
    println!("option name UCI_Chess960 type check default false");
    println!("option name Clear Hash type button");
    println!("uciok");
}

fn run_perft(board: &Board, depth: usize) {
    let mut board = board.clone();
    let start = Instant::now();
    let nodes = board.perft(depth);
    let elapsed = start.elapsed().as_millis().max(1) as u64;
    println!(
        "info nodes {nodes} nps {} time {elapsed}",
        nodes * 1000 / elapsed
    );
}

fn start_go(engine: &mut Engine, go: &GoCommand) {
    if let Some(depth) = go.perft {
        run_perft(engine.board(), depth);
        return;
    }

    let limits = go.to_limits(engine.board());
    let board = engine.board().clone();

    let info: InfoCallback = Arc::new(|info: &SearchInfo| {
        println!("{}", format_info(info));
    });

    let started = engine.start_search(limits, Some(info), move |result| {
        match result.best_move {
            Some(best) => {
                let mut line = format!("bestmove {}", board.move_to_uci(best));
                if let Some(ponder) = result.ponder_move {
                    let mut after = board.clone();
                    after.do_move(best);
                    line.push_str(&format!(" ponder {}", after.move_to_uci(ponder)));
                }
                println!("{line}");
            }
            None => println!("bestmove 0000"),
        }
    });

    if let Err(e) = started {
        eprintln!("info string {e}");
    }
}

/// The blocking stdin command loop.
pub fn run_loop() {
    let mut engine = Engine::new();
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };

        match UciCommand::parse(&line) {
            UciCommand::Uci => print_id_and_options(),
            UciCommand::IsReady => println!("readyok"),
            UciCommand::NewGame => engine.new_game(),
            UciCommand::Position { fen, moves } => {
                let moves: Vec<&str> = moves.iter().map(String::as_str).collect();
                if let Err(e) = engine.set_position(&fen, &moves) {
                    eprintln!("info string {e}");
                }
            }
            UciCommand::Go(go) => start_go(&mut engine, &go),
            UciCommand::Stop => engine.stop_search(),
            UciCommand::PonderHit => engine.ponderhit(),
            UciCommand::SetOption { name, value } => engine.set_option(&name, &value),
            UciCommand::Display => print!("{:?}", engine.board()),
            UciCommand::Quit => break,
            UciCommand::Unknown(cmd) => {
                if !cmd.is_empty() {
                    log::warn!("unknown command: {cmd}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(UciCommand::parse("uci"), UciCommand::Uci);
        assert_eq!(UciCommand::parse("isready"), UciCommand::IsReady);
        assert_eq!(UciCommand::parse("ucinewgame"), UciCommand::NewGame);
        assert_eq!(UciCommand::parse("stop"), UciCommand::Stop);
        assert_eq!(UciCommand::parse("quit"), UciCommand::Quit);
    }

    #[test]
    fn test_parse_position_startpos() {
        let cmd = UciCommand::parse("position startpos moves e2e4 e7e5");
        assert_eq!(
            cmd,
            UciCommand::Position {
                fen: START_FEN.to_string(),
                moves: vec!["e2e4".to_string(), "e7e5".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_position_fen() {
        let fen = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
        let cmd = UciCommand::parse(&format!("position fen {fen} moves b4b1"));
        assert_eq!(
            cmd,
            UciCommand::Position {
                fen: fen.to_string(),
                moves: vec!["b4b1".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_go_clock() {
        let cmd = UciCommand::parse("go wtime 300000 btime 300000 winc 2000 binc 2000 movestogo 40");
        let UciCommand::Go(go) = cmd else { panic!() };
        assert_eq!(go.wtime, Some(300_000));
        assert_eq!(go.binc, 2000);
        assert_eq!(go.movestogo, Some(40));
        assert!(!go.infinite);
    }

    #[test]
    fn test_parse_go_searchmoves() {
        let cmd = UciCommand::parse("go depth 8 searchmoves e2e4 d2d4");
        let UciCommand::Go(go) = cmd else { panic!() };
        assert_eq!(go.depth, Some(8));
        assert_eq!(go.searchmoves, vec!["e2e4", "d2d4"]);
    }

    #[test]
    fn test_parse_setoption() {
        let cmd = UciCommand::parse("setoption name Move Overhead value 100");
        assert_eq!(
            cmd,
            UciCommand::SetOption {
                name: "Move Overhead".to_string(),
                value: "100".to_string(),
            }
        );

        let cmd = UciCommand::parse("setoption name Clear Hash");
        assert_eq!(
            cmd,
            UciCommand::SetOption {
                name: "Clear Hash".to_string(),
                value: String::new(),
            }
        );
    }

    #[test]
    fn test_format_info_line() {
        let info = SearchInfo {
            depth: 12,
            seldepth: 20,
            multipv: 1,
            score: 35,
            mate_in: None,
            bound: None,
            nodes: 123_456,
            nps: 1_000_000,
            time_ms: 123,
            hashfull: 42,
            pv: vec!["e2e4".to_string(), "e7e5".to_string()],
        };
        assert_eq!(
            format_info(&info),
            "info depth 12 seldepth 20 multipv 1 score cp 35 nodes 123456 \
             nps 1000000 hashfull 42 time 123 pv e2e4 e7e5"
        );

        let mate = SearchInfo {
            mate_in: Some(3),
            ..info
        };
        assert!(format_info(&mate).contains("score mate 3"));
    }
}
