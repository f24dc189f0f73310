//! Engine controller lifecycle tests.

use std::sync::mpsc;
use std::time::Duration;

use riptide::board::START_FEN;
use riptide::engine::Engine;
use riptide::search::SearchLimits;

#[test]
fn position_with_moves_and_search() {
    let mut engine = Engine::new();
    engine
        .set_position(START_FEN, &["e2e4", "e7e5", "g1f3"])
        .unwrap();

    let (tx, rx) = mpsc::channel();
    engine
        .start_search(
            SearchLimits {
                depth: Some(4),
                ..SearchLimits::default()
            },
            None,
            move |result| tx.send(result).unwrap(),
        )
        .unwrap();
    engine.wait_search();

    let result = rx.recv_timeout(Duration::from_secs(60)).unwrap();
    let best = result.best_move.unwrap();
    assert!(engine.board().generate_legal().contains(best));
}

#[test]
fn new_search_replaces_running_search() {
    let mut engine = Engine::new();
    engine.set_position(START_FEN, &[]).unwrap();

    let (tx1, rx1) = mpsc::channel();
    engine
        .start_search(
            SearchLimits {
                infinite: true,
                ..SearchLimits::default()
            },
            None,
            move |result| tx1.send(result).unwrap(),
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(20));

    // Starting another search implicitly stops the first
    let (tx2, rx2) = mpsc::channel();
    engine
        .start_search(
            SearchLimits {
                depth: Some(2),
                ..SearchLimits::default()
            },
            None,
            move |result| tx2.send(result).unwrap(),
        )
        .unwrap();
    engine.wait_search();

    assert!(rx1.recv_timeout(Duration::from_secs(10)).unwrap().best_move.is_some());
    assert!(rx2.recv_timeout(Duration::from_secs(10)).unwrap().best_move.is_some());
}

#[test]
fn clear_hash_empties_the_table() {
    let mut engine = Engine::new();
    engine.set_position(START_FEN, &[]).unwrap();

    let (tx, rx) = mpsc::channel();
    engine
        .start_search(
            SearchLimits {
                depth: Some(5),
                ..SearchLimits::default()
            },
            None,
            move |result| tx.send(result).unwrap(),
        )
        .unwrap();
    engine.wait_search();
    rx.recv().unwrap();

    // The search filled some of the table...
    let key = engine.board().key();
    engine.set_option("clear hash", "");

    // ...and clearing wipes every probe, including the root
    assert!(engine.tt().probe(key).is_none());
    assert_eq!(engine.tt().hashfull(), 0);
}

#[test]
fn hash_resize_option() {
    let mut engine = Engine::new();
    engine.set_option("hash", "4");
    assert_eq!(engine.options().hash_mb, 4);
    // Out-of-range values clamp instead of failing
    engine.set_option("hash", "0");
    assert_eq!(engine.options().hash_mb, 1);
}

#[test]
fn ponder_search_waits_for_ponderhit() {
    let mut engine = Engine::new();
    engine.set_position(START_FEN, &["e2e4"]).unwrap();

    let (tx, rx) = mpsc::channel();
    engine
        .start_search(
            SearchLimits {
                ponder: true,
                wtime: Some(1000),
                btime: Some(1000),
                depth: Some(4),
                ..SearchLimits::default()
            },
            None,
            move |result| tx.send(result).unwrap(),
        )
        .unwrap();

    // No bestmove while pondering
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

    engine.ponderhit();
    let result = rx.recv_timeout(Duration::from_secs(30)).unwrap();
    assert!(result.best_move.is_some());
    engine.wait_search();
}

#[test]
fn chess960_option_affects_castling_notation() {
    let mut engine = Engine::new();
    engine.set_option("uci_chess960", "true");
    engine
        .set_position("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1", &[])
        .unwrap();

    let board = engine.board();
    let legal = board.generate_legal();
    let castles: Vec<String> = legal
        .iter()
        .filter(|m| m.is_castling())
        .map(|m| board.move_to_uci(m))
        .collect();
    // King-takes-rook notation in 960 mode
    assert!(castles.contains(&"e1h1".to_string()));
    assert!(castles.contains(&"e1a1".to_string()));
}
