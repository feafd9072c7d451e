use crate::pattern::Pattern;
use crate::types::{Length, Order, Solution};

const MAX_WIDTH: f64 = 60.0;
const ITEMS_PER_LINE: usize = 10;

pub fn render_order(order: &Order) -> String {
    let mut out = format!("{}\n", order.customer());
    if order.is_empty() {
        out.push_str("No Items ordered!\n");
        return out;
    }
    for line in order.items().chunks(ITEMS_PER_LINE) {
        for item in line {
            out.push_str(&format!("{}*{};", item.quantity, item.length));
        }
        out.push('\n');
    }
    out
}

/// Full text report: the order, one line per pattern, then the totals.
pub fn render_solution(solution: &Solution) -> String {
    let mut out = render_order(solution.order());
    out.push('\n');
    for pattern in solution.patterns() {
        out.push_str(&format!("{pattern}\n"));
    }
    out.push_str(&format!("Offcuts: {:.2}\n", solution.total_offcut()));
    out.push_str(&format!("Number of Cuttings: {}\n", solution.total_pieces()));
    out
}

/// ASCII bar of one stock pipe, scaled so `longest` spans the full width.
/// Pieces are drawn with `-`, the offcut with `.`.
pub fn render_bar(pattern: &Pattern, longest: Length) -> String {
    let scale = MAX_WIDTH / longest.get();
    let mut bar = String::from("|");
    for piece in pattern.pieces() {
        let width = ((piece.get() * scale).round() as usize).max(1);
        bar.push_str(&segment(&piece.to_string(), width, '-'));
        bar.push('|');
    }
    let offcut_width = (pattern.offcut() * scale).round() as usize;
    if offcut_width > 0 {
        bar.push_str(&".".repeat(offcut_width));
        bar.push('|');
    }
    bar
}

fn segment(label: &str, width: usize, fill: char) -> String {
    if label.len() + 2 > width {
        return fill.to_string().repeat(width);
    }
    let left = (width - label.len()) / 2;
    let right = width - label.len() - left;
    format!(
        "{}{}{}",
        fill.to_string().repeat(left),
        label,
        fill.to_string().repeat(right)
    )
}
