//! Chess board representation and rules.
//!
//! Bitboard-based position with an incremental state stack, magic-table
//! move generation, and the exchange/legality predicates the search
//! relies on.
//!
//! # Example
//! ```
//! use riptide::board::Board;
//!
//! let board = Board::startpos();
//! assert_eq!(board.generate_legal().len(), 20);
//! ```

pub mod attack_tables;
mod cuckoo;
mod error;
mod fen;
mod make_unmake;
pub mod movegen;
mod perft;
mod see;
mod state;
pub mod types;
pub(crate) mod zobrist;

pub use error::{FenError, MoveParseError, SquareError};
pub use fen::START_FEN;
pub use movegen::GenType;
pub use state::{Board, StateInfo};
pub use types::{
    Bitboard, CastlingRights, Color, ExtMove, Move, MoveKind, MoveList, Piece, Score, ScorePair,
    Square, MAX_PLY,
};
