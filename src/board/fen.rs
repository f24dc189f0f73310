//! FEN parsing, validation, and formatting.
//!
//! Accepts standard FEN plus Shredder/X-FEN castling letters (file
//! letters instead of KQkq), which Chess960 positions require.

use super::error::{FenError, MoveParseError};
use super::state::Board;
use super::types::{Bitboard, CastlingRights, Color, Move, Piece, Square};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

impl Board {
    /// The standard starting position.
    #[must_use]
    pub fn startpos() -> Board {
        Board::from_fen(START_FEN).expect("start FEN is valid")
    }

    /// Parse a FEN string into a board, validating the position
    /// invariants. Returns an error instead of a partially-built board.
    pub fn from_fen(fen: &str) -> Result<Board, FenError> {
        Board::from_fen_960(fen, false)
    }

    /// Parse a FEN string with an explicit Chess960 flag (affects castling
    /// move formatting, not parsing).
    pub fn from_fen_960(fen: &str, chess960: bool) -> Result<Board, FenError> {
        let mut fields = fen.split_whitespace();

        let pieces = fields.next().ok_or(FenError::MissingField("pieces"))?;
        let stm = fields.next().ok_or(FenError::MissingField("side to move"))?;
        let castling = fields.next().unwrap_or("-");
        let ep = fields.next().unwrap_or("-");
        let rule50 = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut board = Board::empty();
        board.set_chess960(chess960);

        board.parse_pieces(pieces)?;
        board.parse_side_to_move(stm)?;
        board.parse_castling(castling)?;
        board.parse_en_passant(ep)?;

        let rule50: u16 = rule50
            .parse()
            .map_err(|_| FenError::InvalidCounter(rule50.to_string()))?;
        let fullmove: u16 = fullmove
            .parse()
            .map_err(|_| FenError::InvalidCounter(fullmove.to_string()))?;

        board.state_mut().rule50 = rule50;
        board.state_mut().plies_from_null = rule50;
        let ply = 2 * fullmove.saturating_sub(1)
            + u16::from(board.side_to_move() == Color::Black);
        board.set_ply(ply);

        board.validate()?;
        board.finish_setup();
        Ok(board)
    }

    fn parse_pieces(&mut self, field: &str) -> Result<(), FenError> {
        let mut rank = 7usize;
        let mut file = 0usize;

        for c in field.chars() {
            match c {
                '/' => {
                    if file != 8 || rank == 0 {
                        return Err(FenError::InvalidPiecePlacement(field.to_string()));
                    }
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => {
                    file += c as usize - '0' as usize;
                    if file > 8 {
                        return Err(FenError::InvalidPiecePlacement(field.to_string()));
                    }
                }
                _ => {
                    let piece = Piece::from_char(c)
                        .ok_or_else(|| FenError::InvalidPiecePlacement(field.to_string()))?;
                    let color = if c.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    if file >= 8 {
                        return Err(FenError::InvalidPiecePlacement(field.to_string()));
                    }
                    self.put_piece(color, piece, Square::new(rank, file));
                    file += 1;
                }
            }
        }

        if rank != 0 || file != 8 {
            return Err(FenError::InvalidPiecePlacement(field.to_string()));
        }
        Ok(())
    }

    fn parse_side_to_move(&mut self, field: &str) -> Result<(), FenError> {
        match field {
            "w" => Ok(()),
            "b" => {
                self.flip_side_to_move();
                Ok(())
            }
            _ => Err(FenError::InvalidSideToMove(field.to_string())),
        }
    }

    /// Register one castling right given the rook's square, filling the
    /// per-square masks and the empty-path bitboard.
    fn set_castling_right(&mut self, color: Color, rook_sq: Square) {
        let king_sq = self.king_square(color);
        let kingside = rook_sq > king_sq;
        let right = CastlingRights::single(color, kingside);

        let king_to = if kingside { Square::G1 } else { Square::C1 }.relative(color);
        let rook_to = if kingside { Square::F1 } else { Square::D1 }.relative(color);

        let idx = right.index();
        self.castling_rook[idx] = Some(rook_sq);
        self.castling_path[idx] = (super::attack_tables::between(king_sq, king_to)
            | super::attack_tables::between(rook_sq, rook_to)
            | Bitboard::from_square(king_to)
            | Bitboard::from_square(rook_to))
            & !(Bitboard::from_square(king_sq) | Bitboard::from_square(rook_sq));

        self.castling_mask[king_sq.index()] |= right.bits() as u8;
        self.castling_mask[rook_sq.index()] |= right.bits() as u8;

        let rights = self.state().castling_rights | right;
        self.state_mut().castling_rights = rights;
    }

    fn parse_castling(&mut self, field: &str) -> Result<(), FenError> {
        if field == "-" {
            return Ok(());
        }

        for c in field.chars() {
            let color = if c.is_ascii_uppercase() {
                Color::White
            } else {
                Color::Black
            };
            if self.count(color, Piece::King) != 1 {
                return Err(FenError::IllegalPosition("castling rights without a king"));
            }
            let king_sq = self.king_square(color);
            let home_rank = king_sq.rank();
            let rooks = self.pieces(color, Piece::Rook) & Bitboard::rank_mask(home_rank);

            let rook_sq = match c.to_ascii_lowercase() {
                // Conventional letters: the outermost rook on that side
                'k' => rooks.iter().filter(|sq| *sq > king_sq).last(),
                'q' => rooks.iter().find(|sq| *sq < king_sq),
                // Shredder/X-FEN file letter
                'a'..='h' => {
                    let file = c.to_ascii_lowercase() as usize - 'a' as usize;
                    let sq = Square::new(home_rank, file);
                    rooks.contains(sq).then_some(sq)
                }
                _ => return Err(FenError::InvalidCastling(field.to_string())),
            };

            match rook_sq {
                Some(rook_sq) => self.set_castling_right(color, rook_sq),
                None => return Err(FenError::InvalidCastling(field.to_string())),
            }
        }
        Ok(())
    }

    fn parse_en_passant(&mut self, field: &str) -> Result<(), FenError> {
        if field == "-" {
            return Ok(());
        }

        let ep: Square = field
            .parse()
            .map_err(|_| FenError::InvalidEnPassant(field.to_string()))?;

        let us = self.side_to_move();
        let them = !us;

        // Only publish the square when a capture is actually possible:
        // the double-pushed enemy pawn must be present and one of our
        // pawns must attack the target square.
        let expected_rank = if us == Color::White { 5 } else { 2 };
        if ep.rank() != expected_rank {
            return Err(FenError::InvalidEnPassant(field.to_string()));
        }

        let their_pawn = ep.offset(them.pawn_direction());
        let capturable = self.pieces(them, Piece::Pawn).contains(their_pawn)
            && self.piece_at(ep).is_none()
            && (super::attack_tables::pawn_attacks(them, ep) & self.pieces(us, Piece::Pawn)).any();

        if capturable {
            self.state_mut().ep_square = Some(ep);
        }
        Ok(())
    }

    /// Position invariants from the data model: exactly one king each, no
    /// pawns on the back ranks, the side not to move not in check, and
    /// per-side piece counts within promotion-feasible bounds.
    fn validate(&self) -> Result<(), FenError> {
        for color in [Color::White, Color::Black] {
            if self.count(color, Piece::King) != 1 {
                return Err(FenError::IllegalPosition("king count is not one"));
            }

            let pawns = self.count(color, Piece::Pawn) as i32;
            if pawns > 8 {
                return Err(FenError::IllegalPosition("more than eight pawns"));
            }
            if self.by_color(color).popcount() > 16 {
                return Err(FenError::IllegalPosition("more than sixteen pieces"));
            }

            let extra = (self.count(color, Piece::Knight) as i32 - 2).max(0)
                + (self.count(color, Piece::Bishop) as i32 - 2).max(0)
                + (self.count(color, Piece::Rook) as i32 - 2).max(0)
                + (self.count(color, Piece::Queen) as i32 - 1).max(0);
            if extra > 8 - pawns {
                return Err(FenError::IllegalPosition("implausible promoted material"));
            }
        }

        if (self.by_type(Piece::Pawn) & (Bitboard::RANK_1 | Bitboard::RANK_8)).any() {
            return Err(FenError::IllegalPosition("pawn on back rank"));
        }

        let them = !self.side_to_move();
        if self.is_attacked_by(self.king_square(them), self.side_to_move()) {
            return Err(FenError::IllegalPosition("side not to move is in check"));
        }

        Ok(())
    }

    /// Fill in the derived state: keys, material, checkers, pins.
    fn finish_setup(&mut self) {
        self.recompute_psq();

        let key = self.compute_key();
        let king_pawn_key = self.compute_king_pawn_key();
        let material_key = self.compute_material_key();
        let white_mat = self.compute_non_pawn_material(Color::White);
        let black_mat = self.compute_non_pawn_material(Color::Black);

        let st = self.state_mut();
        st.key = key;
        st.king_pawn_key = king_pawn_key;
        st.material_key = material_key;
        st.material = [white_mat, black_mat];

        self.compute_checkers();
        self.set_check_info();
    }

    // ------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------

    /// Emit the position as a FEN string.
    #[must_use]
    pub fn fen(&self) -> String {
        let mut out = String::new();

        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            out.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        out.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push((b'0' + empty) as char);
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(if self.side_to_move() == Color::White {
            'w'
        } else {
            'b'
        });

        out.push(' ');
        out.push_str(&self.castling_field());

        out.push(' ');
        match self.ep_square() {
            Some(ep) => out.push_str(&ep.to_string()),
            None => out.push('-'),
        }

        let fullmove = 1 + self.ply() / 2;
        out.push_str(&format!(" {} {}", self.rule50(), fullmove));
        out
    }

    fn castling_field(&self) -> String {
        let rights = self.castling_rights();
        if rights.is_empty() {
            return "-".to_string();
        }

        let mut out = String::new();
        for (right, conventional) in [
            (CastlingRights::WHITE_KINGSIDE, 'K'),
            (CastlingRights::WHITE_QUEENSIDE, 'Q'),
            (CastlingRights::BLACK_KINGSIDE, 'k'),
            (CastlingRights::BLACK_QUEENSIDE, 'q'),
        ] {
            if !rights.has(right) {
                continue;
            }
            if self.is_chess960() {
                // Shredder style: emit the rook's file letter
                if let Some(rook) = self.castling_rook[right.index()] {
                    let file = (b'a' + rook.file() as u8) as char;
                    out.push(if conventional.is_ascii_uppercase() {
                        file.to_ascii_uppercase()
                    } else {
                        file
                    });
                }
            } else {
                out.push(conventional);
            }
        }
        out
    }

    // ------------------------------------------------------------------
    // UCI move strings
    // ------------------------------------------------------------------

    /// Format a move in UCI coordinate notation. Castling is printed as a
    /// two-square king move in standard chess and as king-takes-rook in
    /// Chess960 mode.
    #[must_use]
    pub fn move_to_uci(&self, mv: Move) -> String {
        if mv == Move::NONE {
            return "0000".to_string();
        }

        let mut to = mv.to();
        if mv.is_castling() && !self.is_chess960() {
            let kingside = mv.to() > mv.from();
            let us = self.piece_at(mv.from()).map_or(self.side_to_move(), |(c, _)| c);
            to = if kingside { Square::G1 } else { Square::C1 }.relative(us);
        }

        let mut out = format!("{}{}", mv.from(), to);
        if mv.is_promotion() {
            out.push(mv.promotion_piece().to_char());
        }
        out
    }

    /// Parse a UCI move string against the current position, accepting
    /// both castling notations.
    pub fn parse_uci_move(&self, s: &str) -> Result<Move, MoveParseError> {
        if s.len() < 4 || s.len() > 5 {
            return Err(MoveParseError::BadFormat(s.to_string()));
        }

        let legal = self.generate_legal();
        for mv in legal.iter() {
            if self.move_to_uci(mv) == s {
                return Ok(mv);
            }
            // King-takes-rook castling input is also accepted outside 960
            if mv.is_castling() && format!("{}{}", mv.from(), mv.to()) == s {
                return Ok(mv);
            }
        }

        Err(MoveParseError::IllegalMove(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_roundtrip() {
        let board = Board::startpos();
        assert_eq!(board.fen(), START_FEN);
    }

    #[test]
    fn test_fen_roundtrip_misc() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        ];
        for fen in fens {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.fen(), fen);
        }
    }

    #[test]
    fn test_rejects_bad_positions() {
        // No black king
        assert!(Board::from_fen("8/8/8/8/8/8/8/K7 w - - 0 1").is_err());
        // Two white kings
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/KK6 w - - 0 1").is_err());
        // Pawn on rank 8
        assert!(Board::from_fen("P3k3/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
        // Side not to move in check
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1").is_ok());
        assert!(Board::from_fen("4k3/4R3/8/8/8/8/8/4K3 b - - 0 1").is_ok());
        assert!(Board::from_fen("4k3/4R3/8/8/8/8/8/4K3 w - - 0 1").is_err());
        // Nine pawns
        assert!(Board::from_fen("4k3/8/8/8/8/8/PPPPPPPPP/4K3 w - - 0 1").is_err());
        // Garbage fields
        assert!(Board::from_fen("not a fen").is_err());
    }

    #[test]
    fn test_ep_square_only_when_capturable() {
        // Black pawn on d5 can take e.p. on e3? No - white just pushed e2e4
        // and black has a pawn on d4, so e3 is published.
        let board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 3")
                .unwrap();
        assert_eq!(board.ep_square(), Some("e3".parse().unwrap()));

        // Same square but no black pawn can capture: square is dropped.
        let board =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
                .unwrap();
        assert_eq!(board.ep_square(), None);
    }

    #[test]
    fn test_shredder_castling_letters() {
        let board =
            Board::from_fen_960("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w HAha - 0 1", true)
                .unwrap();
        assert_eq!(board.castling_rights(), CastlingRights::ALL);
        assert_eq!(
            board.castling_rook[CastlingRights::WHITE_KINGSIDE.index()],
            Some(Square::H1)
        );
    }

    #[test]
    fn test_parse_uci_move() {
        let board = Board::startpos();
        let mv = board.parse_uci_move("e2e4").unwrap();
        assert_eq!(mv.from(), "e2".parse().unwrap());
        assert_eq!(mv.to(), "e4".parse().unwrap());
        assert!(board.parse_uci_move("e2e5").is_err());
        assert!(board.parse_uci_move("xyzzy").is_err());
    }

    #[test]
    fn test_castling_move_strings() {
        let board =
            Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mv = board.parse_uci_move("e1g1").unwrap();
        assert!(mv.is_castling());
        assert_eq!(board.move_to_uci(mv), "e1g1");
    }
}
