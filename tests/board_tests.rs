//! Board-level integration tests: FEN handling, make/unmake integrity,
//! and randomized state-restoration properties.

use proptest::prelude::*;

use riptide::board::{Board, GenType, MoveList, START_FEN};

#[test]
fn startpos_roundtrip() {
    let board = Board::startpos();
    assert_eq!(board.fen(), START_FEN);
    assert_eq!(board.generate_legal().len(), 20);
}

#[test]
fn keys_match_scratch_recomputation_along_a_game() {
    let mut board = Board::startpos();
    let moves = [
        "e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4", "f3d4", "g8f6", "b1c3", "a7a6", "c1g5",
        "e7e6", "f2f4", "f8e7", "d1f3", "d8c7", "e1c1", "b8d7",
    ];

    for uci in moves {
        let mv = board.parse_uci_move(uci).unwrap();
        board.do_move(mv);
        // The incremental keys always agree with a from-scratch parse of
        // the same position (which recomputes everything).
        let reparsed = Board::from_fen(&board.fen()).unwrap();
        assert_eq!(board.key(), reparsed.key(), "after {uci}");
        assert_eq!(board.king_pawn_key(), reparsed.king_pawn_key());
        assert_eq!(board.material_key(), reparsed.material_key());
    }
}

#[test]
fn legal_moves_are_a_subset_of_pseudo_legal() {
    let fens = [
        START_FEN,
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    ];

    for fen in fens {
        let board = Board::from_fen(fen).unwrap();
        let mut pseudo = MoveList::new();
        if board.in_check() {
            board.generate(&mut pseudo, GenType::Evasions);
        } else {
            board.generate(&mut pseudo, GenType::All);
        }
        let legal = board.generate_legal();

        for mv in legal.iter() {
            assert!(pseudo.contains(mv), "{mv:?} legal but not pseudo-legal");
            assert!(board.is_pseudo_legal(mv), "{mv:?} fails the predicate");
        }
        for mv in pseudo.iter() {
            assert_eq!(
                board.is_legal(mv),
                legal.contains(mv),
                "legality filter mismatch for {mv:?} in {fen}"
            );
        }
    }
}

#[test]
fn fifty_move_counter_parses_and_counts() {
    let board = Board::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 99 80").unwrap();
    assert_eq!(board.rule50(), 99);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Playing random legal moves and undoing them all must restore the
    /// starting position bit for bit.
    #[test]
    fn random_walk_restores_position(choices in prop::collection::vec(0usize..256, 1..40)) {
        let mut board = Board::startpos();
        let original_fen = board.fen();
        let original_key = board.key();
        let mut played = Vec::new();

        for choice in choices {
            let moves = board.generate_legal();
            if moves.is_empty() {
                break;
            }
            let mv = moves[choice % moves.len()].mv;
            board.do_move(mv);
            played.push(mv);
        }

        for mv in played.into_iter().rev() {
            board.undo_move(mv);
        }

        prop_assert_eq!(board.fen(), original_fen);
        prop_assert_eq!(board.key(), original_key);
    }

    /// gives_check agrees with reality on random positions reached from
    /// the start position.
    #[test]
    fn gives_check_is_exact(choices in prop::collection::vec(0usize..256, 1..25)) {
        let mut board = Board::startpos();

        for choice in choices {
            let moves = board.generate_legal();
            if moves.is_empty() {
                break;
            }
            let mv = moves[choice % moves.len()].mv;
            let predicted = board.gives_check(mv);
            board.do_move_gc(mv, predicted);
            prop_assert_eq!(board.in_check(), predicted);
        }
    }
}
