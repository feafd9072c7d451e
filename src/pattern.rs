use serde::{Serialize, Serializer, ser::SerializeStruct};

use crate::types::Length;

/// Tolerance for deciding whether a piece fits exactly into a remaining length.
pub const FIT_EPSILON: f64 = 1e-8;

/// Quantizes to 5 decimals to keep float noise out of offcut sums.
pub fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

pub fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= FIT_EPSILON
}

/// True when a piece of `piece` length can still be cut from `available`.
pub fn fits(available: f64, piece: f64) -> bool {
    available > piece || almost_equal(available, piece)
}

/// One stock pipe and the pieces cut from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    stock: Length,
    pieces: Vec<Length>,
}

impl Pattern {
    pub fn new(stock: Length) -> Self {
        Self {
            stock,
            pieces: Vec::new(),
        }
    }

    /// Opens a pattern on `stock` with `piece` as its first cut.
    pub fn open(stock: Length, piece: Length) -> Self {
        let mut pattern = Self::new(stock);
        pattern.cut(piece);
        pattern
    }

    pub fn stock(&self) -> Length {
        self.stock
    }

    pub fn pieces(&self) -> &[Length] {
        &self.pieces
    }

    pub fn used_length(&self) -> f64 {
        self.pieces.iter().map(|p| p.get()).sum()
    }

    pub fn can_cut(&self, piece: Length) -> bool {
        fits(self.stock.get() - self.used_length(), piece.get())
    }

    /// Panics if `piece` does not fit into what is left of the stock pipe.
    pub fn cut(&mut self, piece: Length) {
        assert!(
            self.can_cut(piece),
            "piece {piece} does not fit into remaining length of stock {}",
            self.stock
        );
        self.pieces.push(piece);
    }

    pub fn offcut(&self) -> f64 {
        round5(self.stock.get() - self.used_length())
    }

    /// Number of cuts needed for this pattern: an exact fit saves the last cut.
    pub fn piece_count(&self) -> usize {
        if self.offcut() > 0.0 {
            self.pieces.len()
        } else {
            self.pieces.len().saturating_sub(1)
        }
    }

    pub fn sort_pieces(&mut self) {
        self.pieces.sort_by(|a, b| b.get().total_cmp(&a.get()));
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Pattern", 4)?;
        state.serialize_field("stock", &self.stock)?;
        state.serialize_field("pieces", &self.pieces)?;
        state.serialize_field("offcut", &self.offcut())?;
        state.serialize_field("piece_count", &self.piece_count())?;
        state.end()
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> ", self.stock)?;
        if self.pieces.is_empty() {
            write!(f, "No cuts")?;
        } else {
            for (i, piece) in self.pieces.iter().enumerate() {
                if i > 0 {
                    write!(f, "; ")?;
                }
                write!(f, "{piece}")?;
            }
        }
        write!(f, " Offcuts: {:.2}", self.offcut())
    }
}

/// Offcut of all patterns, rounded after summing.
pub fn sum_offcuts(patterns: &[Pattern]) -> f64 {
    round5(patterns.iter().map(Pattern::offcut).sum())
}

pub fn sum_piece_counts(patterns: &[Pattern]) -> usize {
    patterns.iter().map(Pattern::piece_count).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn len(v: f64) -> Length {
        Length::new(v)
    }

    #[test]
    fn test_round5() {
        assert_eq!(round5(0.1 + 0.2), 0.3);
        assert_eq!(round5(1.234_564_9), 1.23456);
        assert_eq!(round5(-0.000_001), 0.0);
    }

    #[test]
    fn test_fits_with_tolerance() {
        assert!(fits(2.0, 1.5));
        assert!(fits(1.0, 1.0 + 1e-9));
        assert!(!fits(1.0, 1.0 + 1e-6));
    }

    #[test]
    fn test_offcut_and_count_with_leftover() {
        let mut pattern = Pattern::open(len(5.0), len(2.0));
        pattern.cut(len(1.5));
        assert_eq!(pattern.offcut(), 1.5);
        assert_eq!(pattern.piece_count(), 2);
    }

    #[test]
    fn test_exact_fit_saves_a_cut() {
        let mut pattern = Pattern::open(len(4.0), len(2.5));
        pattern.cut(len(1.5));
        assert_eq!(pattern.offcut(), 0.0);
        assert_eq!(pattern.piece_count(), 1);

        let single = Pattern::open(len(3.0), len(3.0));
        assert_eq!(single.piece_count(), 0);
        assert_eq!(Pattern::new(len(3.0)).piece_count(), 0);
    }

    #[test]
    fn test_float_noise_is_rounded_away() {
        let mut pattern = Pattern::open(len(3.0), len(0.1));
        for _ in 0..9 {
            pattern.cut(len(0.1));
        }
        for _ in 0..2 {
            pattern.cut(len(1.0));
        }
        assert_eq!(pattern.offcut(), 0.0);
        assert_eq!(pattern.piece_count(), 11);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_cut_beyond_stock_panics() {
        let mut pattern = Pattern::open(len(2.0), len(1.5));
        pattern.cut(len(1.0));
    }

    #[test]
    fn test_display_and_sums() {
        let mut a = Pattern::open(len(4.0), len(1.5));
        a.cut(len(2.5));
        a.sort_pieces();
        assert_eq!(a.to_string(), "4.00 -> 2.50; 1.50 Offcuts: 0.00");
        assert_eq!(Pattern::new(len(2.0)).to_string(), "2.00 -> No cuts Offcuts: 2.00");

        let b = Pattern::open(len(2.0), len(1.5));
        let patterns = vec![a, b];
        assert_eq!(sum_offcuts(&patterns), 0.5);
        assert_eq!(sum_piece_counts(&patterns), 2);
    }
}
