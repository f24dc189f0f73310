//! Board representation and reversible state stack.

use super::attack_tables::{
    bishop_attacks, king_attacks, knight_attacks, pawn_attacks, rook_attacks,
};
use super::types::{
    Bitboard, CastlingRights, Color, Piece, Score, ScorePair, Square, ALL_PIECES,
};
use super::zobrist::ZOBRIST;
use crate::eval::psq;

/// Reversible per-move state. A frame is pushed before a move is applied
/// and popped when it is undone; only the top frame is ever mutated.
#[derive(Clone, Debug)]
pub struct StateInfo {
    pub castling_rights: CastlingRights,
    /// Halfmove clock for the 50-move rule
    pub rule50: u16,
    /// Plies since the last null move (bounds repetition scans)
    pub plies_from_null: u16,
    pub ep_square: Option<Square>,
    /// Zobrist key of the full position
    pub key: u64,
    /// Zobrist key over kings and pawns only, for the pawn cache
    pub king_pawn_key: u64,
    /// Material-signature key, for endgame recognition
    pub material_key: u64,
    /// Non-pawn material per side, in midgame centipawns
    pub material: [Score; 2],
    /// Piece captured by the move leading to this state (for undo)
    pub captured: Option<Piece>,
    /// Enemy pieces currently giving check to the side to move
    pub checkers: Bitboard,
    /// Per side: own or enemy pieces shielding that side's king from a slider
    pub king_blockers: [Bitboard; 2],
    /// Per side: sliders of that side pinning something to the enemy king
    pub pinners: [Bitboard; 2],
    /// Per piece type: squares from which that type would check the enemy king
    pub check_squares: [Bitboard; 6],
    /// 0 if no repetition; else the ply distance to the previous occurrence,
    /// negative when that occurrence was itself a repetition
    pub repetition: i16,
}

impl StateInfo {
    pub(crate) fn empty() -> Self {
        StateInfo {
            castling_rights: CastlingRights::NONE,
            rule50: 0,
            plies_from_null: 0,
            ep_square: None,
            key: 0,
            king_pawn_key: 0,
            material_key: 0,
            material: [0; 2],
            captured: None,
            checkers: Bitboard::EMPTY,
            king_blockers: [Bitboard::EMPTY; 2],
            pinners: [Bitboard::EMPTY; 2],
            check_squares: [Bitboard::EMPTY; 6],
            repetition: 0,
        }
    }
}

/// A chess position with its full reversible history.
///
/// Cloning a board deep-copies the state chain, which is how helper
/// search threads get their private copies.
#[derive(Clone)]
pub struct Board {
    mailbox: [Option<(Color, Piece)>; 64],
    by_type: [Bitboard; 6],
    by_color: [Bitboard; 2],
    occupied: Bitboard,
    piece_count: [[u8; 6]; 2],
    side_to_move: Color,
    /// Game ply since the root position
    ply: u16,
    chess960: bool,
    /// Per square: castling rights lost when a piece leaves or lands there
    pub(crate) castling_mask: [u8; 64],
    /// Per right (indexed by `CastlingRights::index`): the rook's square
    pub(crate) castling_rook: [Option<Square>; 4],
    /// Per right: squares that must be empty for the castling
    pub(crate) castling_path: [Bitboard; 4],
    /// Running material + piece-square accumulator, white positive
    pub(crate) psq: ScorePair,
    states: Vec<StateInfo>,
}

impl Board {
    /// An empty board with a single root state frame.
    pub(crate) fn empty() -> Self {
        Board {
            mailbox: [None; 64],
            by_type: [Bitboard::EMPTY; 6],
            by_color: [Bitboard::EMPTY; 2],
            occupied: Bitboard::EMPTY,
            piece_count: [[0; 6]; 2],
            side_to_move: Color::White,
            ply: 0,
            chess960: false,
            castling_mask: [0; 64],
            castling_rook: [None; 4],
            castling_path: [Bitboard::EMPTY; 4],
            psq: ScorePair::ZERO,
            states: vec![StateInfo::empty()],
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        self.mailbox[sq.index()]
    }

    #[inline]
    #[must_use]
    pub fn by_type(&self, piece: Piece) -> Bitboard {
        self.by_type[piece.index()]
    }

    #[inline]
    #[must_use]
    pub fn by_types(&self, a: Piece, b: Piece) -> Bitboard {
        self.by_type[a.index()] | self.by_type[b.index()]
    }

    #[inline]
    #[must_use]
    pub fn by_color(&self, color: Color) -> Bitboard {
        self.by_color[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.by_color[color.index()] & self.by_type[piece.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.occupied
    }

    #[inline]
    #[must_use]
    pub fn count(&self, color: Color, piece: Piece) -> u8 {
        self.piece_count[color.index()][piece.index()]
    }

    /// The king square of a color. Panics if the king is missing, which
    /// only a broken position can cause.
    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Square {
        self.pieces(color, Piece::King).first_square()
    }

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    #[must_use]
    pub fn ply(&self) -> u16 {
        self.ply
    }

    #[inline]
    #[must_use]
    pub fn is_chess960(&self) -> bool {
        self.chess960
    }

    pub(crate) fn set_chess960(&mut self, chess960: bool) {
        self.chess960 = chess960;
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &StateInfo {
        self.states.last().expect("state stack is never empty")
    }

    #[inline]
    pub(crate) fn state_mut(&mut self) -> &mut StateInfo {
        self.states.last_mut().expect("state stack is never empty")
    }

    #[inline]
    pub(crate) fn push_state(&mut self, st: StateInfo) {
        self.states.push(st);
    }

    #[inline]
    pub(crate) fn pop_state(&mut self) {
        self.states.pop();
        debug_assert!(!self.states.is_empty());
    }

    #[inline]
    pub(crate) fn state_at(&self, idx_back: usize) -> &StateInfo {
        &self.states[self.states.len() - 1 - idx_back]
    }

    #[inline]
    pub(crate) fn state_count(&self) -> usize {
        self.states.len()
    }

    #[inline]
    #[must_use]
    pub fn checkers(&self) -> Bitboard {
        self.state().checkers
    }

    #[inline]
    #[must_use]
    pub fn in_check(&self) -> bool {
        self.state().checkers.any()
    }

    #[inline]
    #[must_use]
    pub fn ep_square(&self) -> Option<Square> {
        self.state().ep_square
    }

    #[inline]
    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.state().castling_rights
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> u64 {
        self.state().key
    }

    #[inline]
    #[must_use]
    pub fn king_pawn_key(&self) -> u64 {
        self.state().king_pawn_key
    }

    #[inline]
    #[must_use]
    pub fn material_key(&self) -> u64 {
        self.state().material_key
    }

    #[inline]
    #[must_use]
    pub fn rule50(&self) -> u16 {
        self.state().rule50
    }

    /// Non-pawn material of a side, in midgame centipawns.
    #[inline]
    #[must_use]
    pub fn non_pawn_material(&self, color: Color) -> Score {
        self.state().material[color.index()]
    }

    #[inline]
    pub(crate) fn set_ply(&mut self, ply: u16) {
        self.ply = ply;
    }

    pub(crate) fn bump_ply(&mut self) {
        self.ply += 1;
    }

    pub(crate) fn unbump_ply(&mut self) {
        self.ply -= 1;
    }

    pub(crate) fn flip_side_to_move(&mut self) {
        self.side_to_move = !self.side_to_move;
    }

    // ------------------------------------------------------------------
    // Piece bookkeeping
    // ------------------------------------------------------------------

    pub(crate) fn put_piece(&mut self, color: Color, piece: Piece, sq: Square) {
        debug_assert!(self.mailbox[sq.index()].is_none());
        let bb = Bitboard::from_square(sq);
        self.mailbox[sq.index()] = Some((color, piece));
        self.by_type[piece.index()] |= bb;
        self.by_color[color.index()] |= bb;
        self.occupied |= bb;
        self.piece_count[color.index()][piece.index()] += 1;
        self.psq += psq::psq_score(color, piece, sq);
    }

    pub(crate) fn remove_piece(&mut self, sq: Square) {
        let (color, piece) = self.mailbox[sq.index()].expect("remove_piece on empty square");
        let bb = Bitboard::from_square(sq);
        self.mailbox[sq.index()] = None;
        self.by_type[piece.index()] ^= bb;
        self.by_color[color.index()] ^= bb;
        self.occupied ^= bb;
        self.piece_count[color.index()][piece.index()] -= 1;
        self.psq -= psq::psq_score(color, piece, sq);
    }

    pub(crate) fn move_piece(&mut self, from: Square, to: Square) {
        let (color, piece) = self.mailbox[from.index()].expect("move_piece from empty square");
        let move_bb = Bitboard::from_square(from) | Bitboard::from_square(to);
        self.mailbox[from.index()] = None;
        self.mailbox[to.index()] = Some((color, piece));
        self.by_type[piece.index()] ^= move_bb;
        self.by_color[color.index()] ^= move_bb;
        self.occupied ^= move_bb;
        self.psq += psq::psq_score(color, piece, to) - psq::psq_score(color, piece, from);
    }

    // ------------------------------------------------------------------
    // Attack queries
    // ------------------------------------------------------------------

    /// All pieces of both colors attacking `sq`, given an explicit
    /// occupancy (used by SEE and evasion generation).
    #[must_use]
    pub fn attackers_to_occ(&self, sq: Square, occupancy: Bitboard) -> Bitboard {
        (pawn_attacks(Color::Black, sq) & self.pieces(Color::White, Piece::Pawn))
            | (pawn_attacks(Color::White, sq) & self.pieces(Color::Black, Piece::Pawn))
            | (knight_attacks(sq) & self.by_type(Piece::Knight))
            | (bishop_attacks(sq, occupancy) & self.by_types(Piece::Bishop, Piece::Queen))
            | (rook_attacks(sq, occupancy) & self.by_types(Piece::Rook, Piece::Queen))
            | (king_attacks(sq) & self.by_type(Piece::King))
    }

    /// All pieces of both colors attacking `sq` on the current occupancy.
    #[inline]
    #[must_use]
    pub fn attackers_to(&self, sq: Square) -> Bitboard {
        self.attackers_to_occ(sq, self.occupied)
    }

    /// Is `sq` attacked by any piece of `color`?
    #[inline]
    #[must_use]
    pub fn is_attacked_by(&self, sq: Square, color: Color) -> bool {
        (self.attackers_to(sq) & self.by_color(color)).any()
    }

    /// Pieces of either color blocking a slider attack from `sliders`
    /// toward `sq`, along with the pinning sliders themselves.
    #[must_use]
    pub(crate) fn slider_blockers(&self, sliders: Bitboard, sq: Square) -> (Bitboard, Bitboard) {
        let mut blockers = Bitboard::EMPTY;
        let mut pinners = Bitboard::EMPTY;

        let snipers = sliders
            & ((rook_attacks(sq, Bitboard::EMPTY) & self.by_types(Piece::Rook, Piece::Queen))
                | (bishop_attacks(sq, Bitboard::EMPTY)
                    & self.by_types(Piece::Bishop, Piece::Queen)));

        for sniper in snipers {
            let blocking = super::attack_tables::between(sq, sniper) & self.occupied;
            if blocking.any() && !blocking.more_than_one() {
                blockers |= blocking;
                pinners |= Bitboard::from_square(sniper);
            }
        }

        (blockers, pinners)
    }

    /// Recompute checkers, king blockers, pinners, and the per-piecetype
    /// check squares for the top state frame.
    pub(crate) fn set_check_info(&mut self) {
        let them = !self.side_to_move;
        let their_king = self.king_square(them);

        let (w_blockers, b_pinners) = self.slider_blockers(
            self.by_color(Color::Black),
            self.king_square(Color::White),
        );
        let (b_blockers, w_pinners) = self.slider_blockers(
            self.by_color(Color::White),
            self.king_square(Color::Black),
        );

        let occupied = self.occupied;
        let st = self.state_mut();
        st.king_blockers[Color::White.index()] = w_blockers;
        st.king_blockers[Color::Black.index()] = b_blockers;
        st.pinners[Color::White.index()] = w_pinners;
        st.pinners[Color::Black.index()] = b_pinners;

        st.check_squares[Piece::Pawn.index()] = pawn_attacks(them, their_king);
        st.check_squares[Piece::Knight.index()] = knight_attacks(their_king);
        st.check_squares[Piece::Bishop.index()] = bishop_attacks(their_king, occupied);
        st.check_squares[Piece::Rook.index()] = rook_attacks(their_king, occupied);
        st.check_squares[Piece::Queen.index()] = st.check_squares[Piece::Bishop.index()]
            | st.check_squares[Piece::Rook.index()];
        st.check_squares[Piece::King.index()] = Bitboard::EMPTY;
    }

    /// Recompute the checkers of the side to move (used after FEN parsing;
    /// `do_move` derives them incrementally).
    pub(crate) fn compute_checkers(&mut self) {
        let us = self.side_to_move;
        let king = self.king_square(us);
        let checkers = self.attackers_to(king) & self.by_color(!us);
        self.state_mut().checkers = checkers;
    }

    // ------------------------------------------------------------------
    // Keys from scratch (initialization and debug validation)
    // ------------------------------------------------------------------

    #[must_use]
    pub(crate) fn compute_key(&self) -> u64 {
        let z = &*ZOBRIST;
        let mut key = 0u64;
        for sq in Square::all() {
            if let Some((color, piece)) = self.piece_at(sq) {
                key ^= z.piece(color, piece, sq);
            }
        }
        key ^= z.castling_rights(self.castling_rights());
        if let Some(ep) = self.ep_square() {
            key ^= z.ep_file(ep.file());
        }
        if self.side_to_move == Color::Black {
            key ^= z.side_to_move;
        }
        key
    }

    #[must_use]
    pub(crate) fn compute_king_pawn_key(&self) -> u64 {
        let z = &*ZOBRIST;
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            for piece in [Piece::Pawn, Piece::King] {
                for sq in self.pieces(color, piece) {
                    key ^= z.piece(color, piece, sq);
                }
            }
        }
        key
    }

    #[must_use]
    pub(crate) fn compute_material_key(&self) -> u64 {
        let z = &*ZOBRIST;
        let mut key = 0u64;
        for color in [Color::White, Color::Black] {
            for piece in ALL_PIECES {
                for n in 0..self.count(color, piece) as usize {
                    key ^= z.material(color, piece, n);
                }
            }
        }
        key
    }

    #[must_use]
    pub(crate) fn compute_non_pawn_material(&self, color: Color) -> Score {
        let mut total = 0;
        for piece in [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen] {
            total += psq::piece_mg(piece) * self.count(color, piece) as Score;
        }
        total
    }

    pub(crate) fn recompute_psq(&mut self) {
        let mut acc = ScorePair::ZERO;
        for sq in Square::all() {
            if let Some((color, piece)) = self.piece_at(sq) {
                acc += psq::psq_score(color, piece, sq);
            }
        }
        self.psq = acc;
    }

    // ------------------------------------------------------------------
    // Draw detection
    // ------------------------------------------------------------------

    /// Is the game drawn at search ply `ply` by the 50-move rule or by a
    /// repetition inside the search tree?
    #[must_use]
    pub fn is_draw(&self, ply: usize) -> bool {
        let st = self.state();
        if st.rule50 > 99 && (st.checkers.is_empty() || self.has_legal_moves()) {
            return true;
        }

        // A repetition within the search tree is scored as a draw
        // immediately; older repetitions require the position to occur
        // twice (encoded by the sign of the marker).
        st.repetition != 0 && (st.repetition as i32) < ply as i32
    }

    /// Insufficient mating material for both sides (bare kings, a lone
    /// minor, or same-colored bishops only).
    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        if (self.by_type(Piece::Pawn) | self.by_types(Piece::Rook, Piece::Queen)).any() {
            return false;
        }

        let minors = self.by_types(Piece::Knight, Piece::Bishop);
        if minors.popcount() <= 1 {
            return true;
        }

        let bishops = self.by_type(Piece::Bishop);
        self.by_type(Piece::Knight).is_empty()
            && ((bishops & Bitboard::LIGHT_SQUARES).is_empty()
                || (bishops & Bitboard::DARK_SQUARES).is_empty())
    }

    /// True if the side to move has at least one legal move.
    #[must_use]
    pub fn has_legal_moves(&self) -> bool {
        !self.generate_legal().is_empty()
    }

    /// Does the move capture a piece (including en passant)? Castling is
    /// encoded as king-takes-own-rook and is not a capture.
    #[inline]
    #[must_use]
    pub fn is_capture(&self, mv: super::types::Move) -> bool {
        (!mv.is_castling() && self.piece_at(mv.to()).is_some()) || mv.is_en_passant()
    }

    /// Captures and promotions: the moves quiescence cares about.
    #[inline]
    #[must_use]
    pub fn is_tactical(&self, mv: super::types::Move) -> bool {
        self.is_capture(mv) || mv.is_promotion()
    }

    /// Debug validation of the redundant board representations and the
    /// incrementally maintained keys.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_consistent(&self) {
        let union: u64 = ALL_PIECES
            .iter()
            .fold(0, |acc, p| acc | self.by_type(*p).0);
        debug_assert_eq!(union, self.occupied.0);
        debug_assert_eq!(
            self.by_color(Color::White).0 | self.by_color(Color::Black).0,
            self.occupied.0
        );
        debug_assert_eq!(self.count(Color::White, Piece::King), 1);
        debug_assert_eq!(self.count(Color::Black, Piece::King), 1);
        debug_assert!(
            (self.by_type(Piece::Pawn) & (Bitboard::RANK_1 | Bitboard::RANK_8)).is_empty()
        );
        debug_assert_eq!(self.state().key, self.compute_key());
        debug_assert_eq!(self.state().king_pawn_key, self.compute_king_pawn_key());
        debug_assert_eq!(self.state().material_key, self.compute_material_key());
        debug_assert!(!self.is_attacked_by(self.king_square(!self.side_to_move), self.side_to_move));
    }

    /// Set the repetition marker on the top frame by scanning earlier
    /// frames with the same side to move.
    pub(crate) fn update_repetition(&mut self) {
        let len = self.states.len();
        let top_key = self.state().key;
        let bound = self
            .state()
            .rule50
            .min(self.state().plies_from_null) as usize;

        self.state_mut().repetition = 0;
        if bound >= 4 {
            let mut i = 4;
            while i <= bound && i < len {
                let earlier_key = self.states[len - 1 - i].key;
                let earlier_repetition = self.states[len - 1 - i].repetition;
                if earlier_key == top_key {
                    self.state_mut().repetition = if earlier_repetition != 0 {
                        -(i as i16)
                    } else {
                        i as i16
                    };
                    break;
                }
                i += 2;
            }
        }
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for rank in (0..8).rev() {
            for file in 0..8 {
                let c = match self.piece_at(Square::new(rank, file)) {
                    Some((color, piece)) => piece.to_fen_char(color),
                    None => '.',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "{} to move, key {:#018x}", self.side_to_move, self.key())
    }
}
