//! UCI command grammar and formatting tests.

use riptide::board::{Board, START_FEN};
use riptide::uci::{GoCommand, UciCommand};

#[test]
fn go_limits_resolve_searchmoves() {
    let board = Board::startpos();
    let go = GoCommand {
        depth: Some(6),
        searchmoves: vec!["e2e4".to_string(), "d2d4".to_string(), "e2e5".to_string()],
        ..GoCommand::default()
    };
    let limits = go.to_limits(&board);

    // The illegal e2e5 is dropped; the legal two survive
    assert_eq!(limits.searchmoves.len(), 2);
    assert_eq!(limits.depth, Some(6));
}

#[test]
fn position_command_with_ep_fen() {
    let fen = "rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3";
    let cmd = UciCommand::parse(&format!("position fen {fen}"));
    let UciCommand::Position { fen: parsed, moves } = cmd else {
        panic!("not a position command");
    };
    assert_eq!(parsed, fen);
    assert!(moves.is_empty());
    assert!(Board::from_fen(&parsed).is_ok());
}

#[test]
fn go_perft_is_recognized() {
    let UciCommand::Go(go) = UciCommand::parse("go perft 4") else {
        panic!("not a go command");
    };
    assert_eq!(go.perft, Some(4));
}

#[test]
fn go_infinite_and_ponder_flags() {
    let UciCommand::Go(go) = UciCommand::parse("go ponder wtime 1000 btime 1000") else {
        panic!("not a go command");
    };
    assert!(go.ponder);
    assert!(!go.infinite);

    let UciCommand::Go(go) = UciCommand::parse("go infinite") else {
        panic!("not a go command");
    };
    assert!(go.infinite);
}

#[test]
fn startpos_with_move_list_applies() {
    let cmd = UciCommand::parse("position startpos moves e2e4 c7c5 g1f3");
    let UciCommand::Position { fen, moves } = cmd else {
        panic!("not a position command");
    };
    assert_eq!(fen, START_FEN);

    let mut board = Board::from_fen(&fen).unwrap();
    for m in &moves {
        let mv = board.parse_uci_move(m).unwrap();
        board.do_move(mv);
    }
    assert_eq!(
        board.fen(),
        "rnbqkbnr/pp1ppppp/8/2p5/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
    );
}

#[test]
fn unknown_commands_are_tolerated() {
    assert!(matches!(
        UciCommand::parse("xyzzy plugh"),
        UciCommand::Unknown(_)
    ));
}
