use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use riptide::board::Board;
use riptide::eval::{evaluate, PawnTable};
use riptide::search::{run_search, SearchLimits, SearchShared};
use riptide::tt::TranspositionTable;

fn bench_perft(c: &mut Criterion) {
    riptide::board::attack_tables::init();
    let mut board = Board::startpos();

    c.bench_function("perft_4_startpos", |b| {
        b.iter(|| {
            let nodes = board.perft(4);
            assert_eq!(nodes, 197_281);
        });
    });

    let mut kiwipete =
        Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .unwrap();
    c.bench_function("perft_3_kiwipete", |b| {
        b.iter(|| {
            let nodes = kiwipete.perft(3);
            assert_eq!(nodes, 97_862);
        });
    });
}

fn bench_evaluate(c: &mut Criterion) {
    riptide::eval::init();
    let board =
        Board::from_fen("r2q1rk1/1pp2ppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP2PPP/R2Q1RK1 w - - 0 1")
            .unwrap();
    let mut pawn_table = PawnTable::new();

    c.bench_function("evaluate_middlegame", |b| {
        b.iter(|| evaluate(&board, &mut pawn_table));
    });
}

fn bench_search(c: &mut Criterion) {
    let board = Board::startpos();

    c.bench_function("search_depth_6_startpos", |b| {
        b.iter(|| {
            let tt = Arc::new(TranspositionTable::new(16));
            let shared = Arc::new(SearchShared::new(tt, false));
            let result = run_search(
                &board,
                SearchLimits {
                    depth: Some(6),
                    ..SearchLimits::default()
                },
                shared,
                None,
            );
            assert!(result.best_move.is_some());
        });
    });
}

criterion_group!(benches, bench_perft, bench_evaluate, bench_search);
criterion_main!(benches);
