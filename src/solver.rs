use std::time::Instant;

use crate::pattern::{Pattern, fits, sum_offcuts, sum_piece_counts};
use crate::types::{Catalog, Length, Order, Solution};

/// Offcut totals closer than this are treated as a tie, decided by piece count.
pub const OFFCUT_TIE_TOLERANCE: f64 = 1e-4;
/// Open slack below this counts as an exactly closed pattern while pruning.
pub const CLOSED_SLACK_TOLERANCE: f64 = 1e-7;
/// Offcut window around the incumbent in which fewer pieces keep a branch alive.
pub const PRUNE_OFFCUT_WINDOW: f64 = 0.1;

/// The two quantities a set of patterns is judged by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub offcut: f64,
    pub pieces: usize,
}

impl Score {
    pub fn of(patterns: &[Pattern]) -> Self {
        Self {
            offcut: sum_offcuts(patterns),
            pieces: sum_piece_counts(patterns),
        }
    }
}

/// Whether a complete candidate should replace the incumbent: strictly less
/// offcut wins, otherwise an offcut tie with strictly fewer pieces.
pub fn is_better(best: Option<Score>, candidate: Score) -> bool {
    let Some(best) = best else {
        return true;
    };
    let tie_with_fewer_pieces = (candidate.offcut - best.offcut).abs() <= OFFCUT_TIE_TOLERANCE
        && candidate.pieces < best.pieces;
    tie_with_fewer_pieces || candidate.offcut < best.offcut
}

/// Pruning gate evaluated before descending into a partial assignment.
///
/// `open_slack` is the length still free on the most recently opened pattern.
/// The thresholds are empirical; this is not an admissible bound.
pub fn potential_better(best: Option<Score>, partial: &[Pattern], open_slack: Option<f64>) -> bool {
    let (Some(best), Some(slack)) = (best, open_slack) else {
        return true;
    };
    if partial.is_empty() {
        return true;
    }
    let partial = Score::of(partial);
    let closed_with_fewer_pieces = partial.pieces < best.pieces
        && slack.abs() < CLOSED_SLACK_TOLERANCE
        && (partial.offcut - best.offcut).abs() <= PRUNE_OFFCUT_WINDOW;
    closed_with_fewer_pieces || partial.offcut - best.offcut < slack
}

/// Best complete assignment seen so far in one search.
#[derive(Debug, Default)]
struct Incumbent {
    best: Option<(Vec<Pattern>, Score)>,
}

impl Incumbent {
    fn score(&self) -> Option<Score> {
        self.best.as_ref().map(|(_, score)| *score)
    }

    fn offer(&mut self, patterns: Vec<Pattern>) -> bool {
        let score = Score::of(&patterns);
        if is_better(self.score(), score) {
            self.best = Some((patterns, score));
            true
        } else {
            false
        }
    }

    fn into_patterns(self) -> Option<Vec<Pattern>> {
        self.best.map(|(patterns, _)| patterns)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SearchStats {
    nodes: u64,
    pruned: u64,
    improvements: u64,
}

/// Exhaustive branch-and-bound search for the cutting plan with the least
/// offcut, then the fewest cuts.
pub struct Solver {
    catalog: Catalog,
}

impl Solver {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns `None` when some demanded piece is longer than every stock
    /// length. An order without demand yields an empty solution.
    pub fn solve(&self, order: &Order) -> Option<Solution> {
        let start = Instant::now();
        let pieces = order.expand_to_pieces();
        tracing::info!(
            customer = %order.customer(),
            pieces = pieces.len(),
            "started cutting optimization"
        );

        let longest = self.catalog.longest();
        if let Some(piece) = pieces.iter().find(|p| !fits(longest.get(), p.get())) {
            tracing::info!(
                piece = %piece,
                longest = %longest,
                "piece is longer than every stock length"
            );
            return None;
        }

        let mut best = Incumbent::default();
        let mut stats = SearchStats::default();
        self.compute(&pieces, Vec::new(), None, &mut best, &mut stats);

        let solution = best
            .into_patterns()
            .map(|patterns| Solution::new(order.clone(), patterns));
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &solution {
            Some(s) => tracing::info!(
                elapsed_ms,
                nodes = stats.nodes,
                pruned = stats.pruned,
                improvements = stats.improvements,
                offcut = s.total_offcut(),
                cuttings = s.total_pieces(),
                "finished cutting optimization"
            ),
            None => tracing::info!(
                elapsed_ms,
                nodes = stats.nodes,
                "no cutting plan can hold the order"
            ),
        }
        solution
    }

    fn compute(
        &self,
        remaining: &[Length],
        patterns: Vec<Pattern>,
        open_slack: Option<f64>,
        best: &mut Incumbent,
        stats: &mut SearchStats,
    ) {
        stats.nodes += 1;
        if remaining.is_empty() {
            if best.offer(patterns) {
                stats.improvements += 1;
            }
            return;
        }

        if potential_better(best.score(), &patterns, open_slack) {
            self.explore(remaining, &patterns, open_slack, best, stats);
        } else {
            stats.pruned += 1;
        }
    }

    fn explore(
        &self,
        remaining: &[Length],
        patterns: &[Pattern],
        open_slack: Option<f64>,
        best: &mut Incumbent,
        stats: &mut SearchStats,
    ) {
        for (idx, &piece) in remaining.iter().enumerate() {
            // Equal lengths are adjacent and would produce identical subtrees.
            if idx > 0 && remaining[idx - 1] == piece {
                continue;
            }
            let rest = without(remaining, idx);

            // Continue the open pattern
            if let Some(slack) = open_slack
                && fits(slack, piece.get())
            {
                let mut next = patterns.to_vec();
                if let Some(open) = next.last_mut() {
                    open.cut(piece);
                }
                self.compute(&rest, next, Some(slack - piece.get()), best, stats);
            }

            // Open a new pattern from each stock length that can hold the piece
            for &stock in self.catalog.stock_lengths() {
                if fits(stock.get(), piece.get()) {
                    let mut next = patterns.to_vec();
                    next.push(Pattern::open(stock, piece));
                    self.compute(&rest, next, Some(stock.get() - piece.get()), best, stats);
                }
            }
        }
    }
}

fn without(pieces: &[Length], idx: usize) -> Vec<Length> {
    let mut rest = Vec::with_capacity(pieces.len() - 1);
    rest.extend_from_slice(&pieces[..idx]);
    rest.extend_from_slice(&pieces[idx + 1..]);
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Customer;

    fn order_of(items: &[(u32, f64)]) -> Order {
        let mut order = Order::new(Customer::new(1, "Test"));
        for &(qty, length) in items {
            order.add_item(Length::new(length), qty);
        }
        order
    }

    fn solve(items: &[(u32, f64)]) -> Option<Solution> {
        Solver::new(Catalog::default()).solve(&order_of(items))
    }

    /// Validates a complete solution:
    /// 1. Every demanded piece is cut exactly once
    /// 2. Pieces plus offcut add up to the stock length of each pattern
    /// 3. No offcut is negative
    fn assert_solution_valid(sol: &Solution, catalog: &Catalog) {
        let mut cut: Vec<f64> = sol
            .patterns()
            .iter()
            .flat_map(|p| p.pieces())
            .map(|l| l.get())
            .collect();
        cut.sort_by(|a, b| b.total_cmp(a));
        let expected: Vec<f64> = sol.order().expand_to_pieces().into_iter().map(Length::get).collect();
        assert_eq!(cut, expected, "cut pieces do not match the demand");

        for (i, p) in sol.patterns().iter().enumerate() {
            assert!(
                catalog.stock_lengths().contains(&p.stock()),
                "pattern {i} uses stock {} outside the catalog",
                p.stock()
            );
            assert!(
                (p.used_length() + p.offcut() - p.stock().get()).abs() <= 1e-5,
                "pattern {i} ({p}) does not conserve length"
            );
            assert!(p.offcut() >= -1e-8, "pattern {i} ({p}) has negative offcut");
        }
        assert!(sol.total_offcut() >= -1e-8);
    }

    #[test]
    fn test_is_better_without_incumbent() {
        assert!(is_better(None, Score { offcut: 9.0, pieces: 9 }));
    }

    #[test]
    fn test_is_better_rules() {
        let best = Some(Score { offcut: 1.0, pieces: 3 });
        assert!(is_better(best, Score { offcut: 0.5, pieces: 10 }));
        assert!(is_better(best, Score { offcut: 1.00005, pieces: 2 }));
        assert!(!is_better(best, Score { offcut: 1.0, pieces: 3 }));
        assert!(!is_better(best, Score { offcut: 1.001, pieces: 1 }));
        assert!(!is_better(best, Score { offcut: 1.5, pieces: 0 }));
    }

    #[test]
    fn test_potential_better_passes_without_state() {
        let best = Some(Score { offcut: 0.0, pieces: 0 });
        assert!(potential_better(None, &[Pattern::open(Length::new(5.0), Length::new(1.0))], Some(4.0)));
        assert!(potential_better(best, &[], None));
    }

    #[test]
    fn test_potential_better_rules() {
        let best = Some(Score { offcut: 0.5, pieces: 2 });

        // 0.5 already wasted plus an open pattern on 5 holding 1.0
        let open = vec![
            Pattern::open(Length::new(2.0), Length::new(1.5)),
            Pattern::open(Length::new(5.0), Length::new(1.0)),
        ];
        assert!(!potential_better(best, &open, Some(4.0)));
        // The same partial plan with more slack left passes the gate
        assert!(potential_better(best, &open, Some(4.1)));

        // Exactly closed pattern with fewer pieces inside the window
        let closed = vec![
            Pattern::open(Length::new(2.0), Length::new(1.5)),
            Pattern::open(Length::new(3.0), Length::new(3.0)),
        ];
        assert!(potential_better(best, &closed, Some(0.0)));
        // A closed pattern without a piece advantage is pruned
        let worse = Some(Score { offcut: 0.5, pieces: 1 });
        assert!(!potential_better(worse, &closed, Some(0.0)));
    }

    #[test]
    fn test_potential_better_thresholds() {
        let best = Some(Score { offcut: 0.5, pieces: 2 });

        // Fewer pieces but 0.2 more offcut than the incumbent
        let outside_window = vec![
            Pattern::open(Length::new(2.0), Length::new(1.3)),
            Pattern::open(Length::new(3.0), Length::new(3.0)),
        ];
        assert!(!potential_better(best, &outside_window, Some(0.0)));

        // Fewer pieces, 0.05 more offcut: only an exactly closed pattern passes
        let inside_window = vec![
            Pattern::open(Length::new(2.0), Length::new(1.45)),
            Pattern::open(Length::new(3.0), Length::new(3.0)),
        ];
        assert!(!potential_better(best, &inside_window, Some(1e-6)));
        assert!(potential_better(best, &inside_window, Some(9e-8)));
    }

    #[test]
    fn test_unsatisfiable_piece() {
        assert!(solve(&[(1, 7.0)]).is_none());
        assert!(solve(&[(2, 1.0), (1, 5.5)]).is_none());
    }

    #[test]
    fn test_oversized_piece_fails_fast() {
        let start = Instant::now();
        let items = [
            (3, 0.7),
            (2, 1.1),
            (2, 1.3),
            (2, 1.7),
            (3, 2.2),
            (2, 2.9),
            (1, 3.4),
            (1, 7.0),
        ];
        assert!(solve(&items).is_none());
        assert!(start.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_empty_order() {
        let sol = solve(&[]).unwrap();
        assert!(sol.patterns().is_empty());
        assert_eq!(sol.total_offcut(), 0.0);
        assert_eq!(sol.total_pieces(), 0);
    }

    #[test]
    fn test_exact_fit_each_piece_own_stock() {
        let sol = solve(&[(2, 3.0)]).unwrap();
        assert_solution_valid(&sol, &Catalog::default());
        assert_eq!(sol.patterns().len(), 2);
        for p in sol.patterns() {
            assert_eq!(p.stock().get(), 3.0);
            assert_eq!(p.pieces().len(), 1);
            assert_eq!(p.offcut(), 0.0);
        }
        assert_eq!(sol.total_offcut(), 0.0);
    }

    #[test]
    fn test_mixed_lengths() {
        let sol = solve(&[(2, 1.5), (1, 2.5)]).unwrap();
        assert_solution_valid(&sol, &Catalog::default());
        assert_eq!(sol.total_offcut(), 0.5);
        assert_eq!(sol.total_pieces(), 2);

        let patterns = sol.patterns();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].stock().get(), 4.0);
        assert_eq!(patterns[0].pieces(), &[Length::new(2.5), Length::new(1.5)]);
        assert_eq!(patterns[0].offcut(), 0.0);
        assert_eq!(patterns[1].stock().get(), 2.0);
        assert_eq!(patterns[1].pieces(), &[Length::new(1.5)]);
        assert_eq!(patterns[1].offcut(), 0.5);
    }

    #[test]
    fn test_single_piece_picks_tightest_stock() {
        let sol = solve(&[(1, 1.8)]).unwrap();
        assert_solution_valid(&sol, &Catalog::default());
        assert_eq!(sol.patterns().len(), 1);
        assert_eq!(sol.patterns()[0].stock().get(), 2.0);
        assert_eq!(sol.total_offcut(), 0.2);
    }

    #[test]
    fn test_exploring_later_pieces_finds_fewer_cuts() {
        let sol = solve(&[(1, 2.2), (1, 1.8), (1, 1.3), (1, 1.0), (1, 0.7), (1, 0.5)]).unwrap();
        assert_solution_valid(&sol, &Catalog::default());
        assert_eq!(sol.total_offcut(), 0.5);
        assert_eq!(sol.total_pieces(), 4);
    }

    #[test]
    fn test_many_equal_pieces() {
        let sol = solve(&[(8, 1.5)]).unwrap();
        assert_solution_valid(&sol, &Catalog::default());
        assert_eq!(sol.total_offcut(), 0.0);
        assert_eq!(sol.total_pieces(), 4);
    }

    #[test]
    fn test_coverage_on_mixed_orders() {
        let orders: [&[(u32, f64)]; 4] = [
            &[(1, 5.0), (1, 4.5), (1, 2.9), (2, 1.2), (1, 0.5)],
            &[(1, 4.0), (1, 3.5), (2, 2.0), (1, 1.0)],
            &[(3, 2.5), (2, 1.25)],
            &[(6, 1.0)],
        ];
        let catalog = Catalog::default();
        for items in orders {
            let sol = solve(items).unwrap_or_else(|| panic!("no solution for {items:?}"));
            assert_solution_valid(&sol, &catalog);
        }
    }

    #[test]
    fn test_known_optima() {
        assert_eq!(solve(&[(1, 5.0), (1, 4.5), (1, 2.9), (2, 1.2), (1, 0.5)]).unwrap().total_offcut(), 0.7);
        assert_eq!(solve(&[(3, 2.5), (2, 1.25)]).unwrap().total_offcut(), 0.0);
        assert_eq!(solve(&[(1, 4.0), (1, 3.5), (2, 2.0), (1, 1.0)]).unwrap().total_offcut(), 0.5);
    }

    #[test]
    fn test_deterministic() {
        let items = [(2, 1.5), (1, 2.5), (3, 0.75)];
        let a = solve(&items).unwrap();
        let b = solve(&items).unwrap();
        assert_eq!(a.patterns(), b.patterns());
        assert_eq!(a.total_offcut(), b.total_offcut());
        assert_eq!(a.total_pieces(), b.total_pieces());
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = Catalog::new([Length::new(6.0)]);
        let solver = Solver::new(catalog.clone());
        let sol = solver.solve(&order_of(&[(2, 3.0), (1, 2.0)])).unwrap();
        assert_solution_valid(&sol, &catalog);
        assert_eq!(sol.patterns().len(), 2);
        assert_eq!(sol.total_offcut(), 4.0);
        assert!(solver.solve(&order_of(&[(1, 6.5)])).is_none());
    }
}
