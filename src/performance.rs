use crate::models::{round2, PerformanceMetrics, Trade};
use statrs::statistics::Statistics;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Reduces a trade ledger to aggregate statistics. Pure: evaluating the
    /// same ledger twice yields identical metrics. An empty ledger produces
    /// all-zero metrics rather than dividing by zero.
    ///
    /// The ledger must be in chronological order: max drawdown walks the
    /// trade-ordinal running P&L sum, so it is a trade-count-indexed figure,
    /// not a time-series equity drawdown.
    pub fn evaluate(trades: &[Trade]) -> PerformanceMetrics {
        if trades.is_empty() {
            return PerformanceMetrics {
                total_trades: 0,
                winning_trades: 0,
                losing_trades: 0,
                win_rate: 0.0,
                total_pnl: 0.0,
                average_pnl: 0.0,
                best_trade: 0.0,
                worst_trade: 0.0,
                max_drawdown: 0.0,
            };
        }

        let total_trades = trades.len() as i32;
        let mut winning_trades = 0;
        let mut losing_trades = 0;
        let mut best_trade = trades[0].pnl;
        let mut worst_trade = trades[0].pnl;
        let trade_pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();

        for pnl in trade_pnls.iter().copied() {
            // Zero-P&L trades count as neither a win nor a loss.
            if pnl > 0.0 {
                winning_trades += 1;
            } else if pnl < 0.0 {
                losing_trades += 1;
            }
            // Strict comparisons keep ties on the first occurrence.
            if pnl > best_trade {
                best_trade = pnl;
            }
            if pnl < worst_trade {
                worst_trade = pnl;
            }
        }

        let win_rate = winning_trades as f64 / total_trades as f64 * 100.0;
        let total_pnl: f64 = trade_pnls.iter().sum();
        let average_pnl = trade_pnls.clone().mean();
        let max_drawdown = Self::max_drawdown(&trade_pnls);

        PerformanceMetrics {
            total_trades,
            winning_trades,
            losing_trades,
            win_rate: round2(win_rate),
            total_pnl: round2(total_pnl),
            average_pnl: round2(average_pnl),
            best_trade: round2(best_trade),
            worst_trade: round2(worst_trade),
            max_drawdown: round2(max_drawdown),
        }
    }

    /// Largest decline of the running P&L sum from its peak, walked in
    /// ledger order. Never negative; zero when the running sum never falls
    /// below a previous peak.
    fn max_drawdown(trade_pnls: &[f64]) -> f64 {
        let mut running_pnl = 0.0;
        let mut peak = 0.0;
        let mut max_drawdown = 0.0;

        for pnl in trade_pnls.iter().copied() {
            running_pnl += pnl;
            if running_pnl > peak {
                peak = running_pnl;
            }
            let drawdown = peak - running_pnl;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown
    }
}
