use serde::Serialize;

use crate::analysis::PositionView;
use crate::utils::format_usd;

/// Position with one of the largest balances in a capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopPosition {
    pub pair: String,
    pub balance: f64,
}

/// Aggregate figures over one capture or the canonical set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub position_count: usize,
    pub total_usd: f64,
    pub in_range: usize,
    pub out_of_range: usize,
    pub range_unknown: usize,
    pub missing_breakdown: usize,
    pub top_positions: Vec<TopPosition>,
}

impl Summary {
    /// Multi-line text form for terminal reports
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("Positions:          {}", self.position_count),
            format!("Total value:        {}", format_usd(self.total_usd)),
            format!(
                "In / out of range:  {} / {} ({} unknown)",
                self.in_range, self.out_of_range, self.range_unknown
            ),
            format!("Missing breakdown:  {}", self.missing_breakdown),
        ];

        if !self.top_positions.is_empty() {
            lines.push("Largest positions:".to_string());
            for (rank, top) in self.top_positions.iter().enumerate() {
                lines.push(format!("  {}. {:<16} {}", rank + 1, top.pair, format_usd(top.balance)));
            }
        }

        lines.join("\n")
    }
}

/// Summarize a position list. Missing balances count as zero.
pub fn summarize<P: PositionView>(positions: &[P], top_n: usize) -> Summary {
    let total_usd = positions.iter().map(|p| p.balance().unwrap_or(0.0)).sum();
    let in_range = positions.iter().filter(|p| p.in_range() == Some(true)).count();
    let out_of_range = positions.iter().filter(|p| p.in_range() == Some(false)).count();
    let missing_breakdown = positions.iter().filter(|p| !p.has_breakdown()).count();

    // stable: equal balances keep capture order
    let mut ranked: Vec<&P> = positions.iter().collect();
    ranked.sort_by(|a, b| {
        let a = a.balance().unwrap_or(0.0);
        let b = b.balance().unwrap_or(0.0);
        b.total_cmp(&a)
    });

    let top_positions = ranked
        .into_iter()
        .take(top_n)
        .map(|p| TopPosition {
            pair: p.pair().to_string(),
            balance: p.balance().unwrap_or(0.0),
        })
        .collect();

    Summary {
        position_count: positions.len(),
        total_usd,
        in_range,
        out_of_range,
        range_unknown: positions.len() - in_range - out_of_range,
        missing_breakdown,
        top_positions,
    }
}
