//! Error types for board construction and move parsing.

use std::error::Error;
use std::fmt;

/// Error parsing a square from algebraic notation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SquareError {
    InvalidNotation { notation: String },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::InvalidNotation { notation } => {
                write!(f, "invalid square notation '{notation}'")
            }
        }
    }
}

impl Error for SquareError {}

/// Error parsing or validating a FEN string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FenError {
    /// Not enough whitespace-separated fields
    MissingField(&'static str),
    /// Bad character or geometry in the piece placement field
    InvalidPiecePlacement(String),
    /// Side-to-move field is not "w" or "b"
    InvalidSideToMove(String),
    /// Unrecognized castling field
    InvalidCastling(String),
    /// Unrecognized en passant field
    InvalidEnPassant(String),
    /// Halfmove or fullmove counter did not parse
    InvalidCounter(String),
    /// The position violates a board invariant (king counts, pawns on
    /// back ranks, side not to move in check, material bounds)
    IllegalPosition(&'static str),
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::MissingField(field) => write!(f, "missing FEN field: {field}"),
            FenError::InvalidPiecePlacement(s) => write!(f, "invalid piece placement '{s}'"),
            FenError::InvalidSideToMove(s) => write!(f, "invalid side to move '{s}'"),
            FenError::InvalidCastling(s) => write!(f, "invalid castling field '{s}'"),
            FenError::InvalidEnPassant(s) => write!(f, "invalid en passant field '{s}'"),
            FenError::InvalidCounter(s) => write!(f, "invalid move counter '{s}'"),
            FenError::IllegalPosition(why) => write!(f, "illegal position: {why}"),
        }
    }
}

impl Error for FenError {}

/// Error parsing a move in UCI coordinate notation against a position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveParseError {
    /// String is not of the form `<from><to>[promo]`
    BadFormat(String),
    /// Well-formed but not a legal move in the position
    IllegalMove(String),
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveParseError::BadFormat(s) => write!(f, "malformed move string '{s}'"),
            MoveParseError::IllegalMove(s) => write!(f, "illegal move '{s}'"),
        }
    }
}

impl Error for MoveParseError {}
