use crate::models::{
    round2, Candle, DailySummary, ExitReason, StrategyParameters, Trade, TradeType,
};
use chrono::NaiveDateTime;
use log::debug;

/// Result of simulating one trading day: zero or one trade, and the capital
/// the next day starts from.
#[derive(Debug)]
pub struct DaySimulation {
    pub trade: Option<Trade>,
    pub capital_out: f64,
}

struct OpenPosition {
    security_id: String,
    trade_type: TradeType,
    entry_price: f64,
    entry_time: NaiveDateTime,
    quantity: i64,
    target: f64,
    stop_loss: f64,
}

/// Runs the per-day breakout state machine over one day's minute candles.
///
/// States: waiting-for-signal -> in-position -> closed. One entry per day;
/// once closed no further candles are evaluated. Tie-break order is part of
/// the contract: BUY is checked before SELL on the entry candle, and target
/// before stop-loss on every in-position candle. The entry candle itself is
/// eligible for exit.
///
/// `candles` must be the day's bars in ascending timestamp order.
pub fn simulate_day(
    candles: &[Candle],
    levels: &DailySummary,
    params: &StrategyParameters,
    capital_in: f64,
) -> DaySimulation {
    let mut position: Option<OpenPosition> = None;

    for candle in candles {
        if position.is_none() {
            position = check_entry(candle, levels, params, capital_in);
            if position.is_none() {
                continue;
            }
        }
        // Exit is evaluated on the entry candle as well.
        if let Some(open) = position.as_ref() {
            if let Some(trade) = check_exit(candle, open) {
                return close_day(trade, capital_in);
            }
        }
    }

    // Candles exhausted while still holding: liquidate at the last close.
    if let Some(open) = position {
        let last = &candles[candles.len() - 1];
        let trade = build_trade(&open, last.close, last.timestamp, ExitReason::EndOfDay);
        return close_day(trade, capital_in);
    }

    DaySimulation {
        trade: None,
        capital_out: capital_in,
    }
}

fn check_entry(
    candle: &Candle,
    levels: &DailySummary,
    params: &StrategyParameters,
    capital_in: f64,
) -> Option<OpenPosition> {
    // BUY before SELL when one candle pierces both levels.
    let (trade_type, entry_price) = if candle.high > levels.daily_high {
        (TradeType::Buy, levels.daily_high)
    } else if candle.low < levels.daily_low {
        (TradeType::Sell, levels.daily_low)
    } else {
        return None;
    };

    // Entry is modeled at the breakout level, not the traded price. A signal
    // the capital cannot fund still opens a zero-quantity position so the
    // ledger stays complete.
    let quantity = (capital_in / entry_price).floor().max(0.0) as i64;
    let (target, stop_loss) = match trade_type {
        TradeType::Buy => (
            entry_price * (1.0 + params.target_percent / 100.0),
            entry_price * (1.0 - params.stop_loss_percent / 100.0),
        ),
        TradeType::Sell => (
            entry_price * (1.0 - params.target_percent / 100.0),
            entry_price * (1.0 + params.stop_loss_percent / 100.0),
        ),
    };

    debug!(
        "{} {} breakout at {:.2} ({} units, target {:.2}, stop {:.2})",
        candle.security_id,
        trade_type.as_str(),
        entry_price,
        quantity,
        target,
        stop_loss
    );

    Some(OpenPosition {
        security_id: candle.security_id.clone(),
        trade_type,
        entry_price,
        entry_time: candle.timestamp,
        quantity,
        target,
        stop_loss,
    })
}

fn check_exit(candle: &Candle, open: &OpenPosition) -> Option<Trade> {
    // Target before stop-loss when one candle reaches both.
    let (exit_price, reason) = match open.trade_type {
        TradeType::Buy => {
            if candle.high >= open.target {
                (open.target, ExitReason::Target)
            } else if candle.low <= open.stop_loss {
                (open.stop_loss, ExitReason::StopLoss)
            } else {
                return None;
            }
        }
        TradeType::Sell => {
            if candle.low <= open.target {
                (open.target, ExitReason::Target)
            } else if candle.high >= open.stop_loss {
                (open.stop_loss, ExitReason::StopLoss)
            } else {
                return None;
            }
        }
    };

    Some(build_trade(open, exit_price, candle.timestamp, reason))
}

fn build_trade(
    open: &OpenPosition,
    exit_price: f64,
    exit_time: NaiveDateTime,
    reason: ExitReason,
) -> Trade {
    let per_unit = match open.trade_type {
        TradeType::Buy => exit_price - open.entry_price,
        TradeType::Sell => open.entry_price - exit_price,
    };
    let pnl = round2(per_unit * open.quantity as f64);
    let pnl_percent = round2(per_unit / open.entry_price * 100.0);

    Trade {
        security_id: open.security_id.clone(),
        trade_type: open.trade_type,
        entry_price: open.entry_price,
        entry_time: open.entry_time,
        exit_price,
        exit_time,
        exit_reason: reason,
        quantity: open.quantity,
        pnl,
        pnl_percent,
    }
}

fn close_day(trade: Trade, capital_in: f64) -> DaySimulation {
    let capital_out = capital_in + trade.pnl;
    debug!(
        "{} exit at {:.2} ({}): pnl {:.2}",
        trade.trade_type.as_str(),
        trade.exit_price,
        trade.exit_reason.as_str(),
        trade.pnl
    );
    DaySimulation {
        trade: Some(trade),
        capital_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn levels(high: f64, low: f64) -> DailySummary {
        DailySummary {
            security_id: "AAA".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
            open: (high + low) / 2.0,
            close: (high + low) / 2.0,
            daily_high: high,
            daily_low: low,
            total_volume: 10_000,
        }
    }

    fn params(target: f64, stop: f64) -> StrategyParameters {
        StrategyParameters {
            target_percent: target,
            stop_loss_percent: stop,
            capital: 100_000.0,
        }
    }

    fn candle(minute: u32, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            security_id: "AAA".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 5, 8)
                .unwrap()
                .and_hms_opt(9, 15 + minute, 0)
                .unwrap(),
            open: (high + low) / 2.0,
            high,
            low,
            close,
            volume: 500,
        }
    }

    #[test]
    fn buy_breakout_hits_target_on_later_candle() {
        // Prior day 100/90; breakout bar stays under the target so the exit
        // comes from the 100.25 bar at exactly the target level.
        let candles = vec![
            candle(0, 99.8, 99.0, 99.5),
            candle(1, 100.05, 99.85, 100.0),
            candle(2, 100.15, 99.9, 100.1),
            candle(3, 100.25, 100.0, 100.2),
        ];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.2, 0.2), 100_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.trade_type, TradeType::Buy);
        assert!((trade.entry_price - 100.0).abs() < 1e-9);
        assert_eq!(trade.entry_time, candles[1].timestamp);
        assert_eq!(trade.exit_reason, ExitReason::Target);
        assert!((trade.exit_price - 100.2).abs() < 1e-9);
        assert_eq!(trade.exit_time, candles[3].timestamp);
        assert_eq!(trade.quantity, 1_000);
        assert!((trade.pnl - 200.0).abs() < 1e-9);
        assert!((trade.pnl_percent - 0.2).abs() < 1e-9);
        assert!((result.capital_out - 100_200.0).abs() < 1e-9);
    }

    #[test]
    fn buy_breakout_stops_out_before_target() {
        let candles = vec![
            candle(0, 100.05, 99.85, 100.0),
            candle(1, 100.1, 99.7, 99.8),
            candle(2, 100.3, 100.0, 100.2),
        ];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.2, 0.2), 100_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.exit_price - 99.8).abs() < 1e-9);
        assert_eq!(trade.exit_time, candles[1].timestamp);
        assert!((trade.pnl - -200.0).abs() < 1e-9);
        assert!((result.capital_out - 99_800.0).abs() < 1e-9);
    }

    #[test]
    fn breakout_on_final_candle_closes_end_of_day() {
        let candles = vec![
            candle(0, 99.5, 99.0, 99.2),
            candle(1, 100.1, 99.8, 100.05),
        ];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.5, 0.5), 100_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.exit_reason, ExitReason::EndOfDay);
        assert!((trade.exit_price - 100.05).abs() < 1e-9);
        assert_eq!(trade.exit_time, candles[1].timestamp);
    }

    #[test]
    fn exit_can_fire_on_the_entry_candle() {
        // One bar pierces the prior high and runs through the target.
        let candles = vec![candle(0, 100.5, 99.9, 100.4)];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.2, 0.2), 100_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.exit_reason, ExitReason::Target);
        assert_eq!(trade.entry_time, trade.exit_time);
        assert!((trade.exit_price - 100.2).abs() < 1e-9);
    }

    #[test]
    fn target_outranks_stop_loss_on_the_same_candle() {
        // Wide bar satisfies both exits; the documented order pays the target.
        let candles = vec![
            candle(0, 100.05, 99.9, 100.0),
            candle(1, 100.5, 99.5, 100.0),
        ];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.2, 0.2), 100_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.exit_reason, ExitReason::Target);
    }

    #[test]
    fn buy_outranks_sell_on_the_same_candle() {
        // The bar pierces both the prior high and the prior low.
        let candles = vec![candle(0, 100.4, 89.5, 100.0)];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(5.0, 5.0), 100_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.trade_type, TradeType::Buy);
        assert!((trade.entry_price - 100.0).abs() < 1e-9);
    }

    #[test]
    fn sell_breakout_hits_target() {
        let candles = vec![
            candle(0, 90.1, 89.9, 90.0),
            candle(1, 90.0, 89.85, 89.9),
            candle(2, 89.9, 89.8, 89.85),
        ];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.2, 0.2), 90_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.trade_type, TradeType::Sell);
        assert!((trade.entry_price - 90.0).abs() < 1e-9);
        assert_eq!(trade.entry_time, candles[0].timestamp);
        assert_eq!(trade.exit_reason, ExitReason::Target);
        // target = 90 * (1 - 0.002) = 89.82; candle 2's low reaches it.
        assert_eq!(trade.exit_time, candles[2].timestamp);
        assert!((trade.exit_price - 89.82).abs() < 1e-9);
        assert_eq!(trade.quantity, 1_000);
        assert!((trade.pnl - 180.0).abs() < 1e-9);
        assert!((trade.pnl_percent - 0.2).abs() < 1e-9);
    }

    #[test]
    fn whole_unit_quantity_from_capital() {
        let candles = vec![
            candle(0, 600.5, 599.0, 600.2),
            candle(1, 601.5, 600.0, 601.2),
        ];
        let result = simulate_day(&candles, &levels(600.0, 590.0), &params(0.2, 0.2), 1_000.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.quantity, 1);
        assert_eq!(trade.exit_reason, ExitReason::Target);
        // One unit moving 0.2% from 600: 1.20 per unit.
        assert!((trade.pnl - 1.2).abs() < 1e-9);
        assert!((result.capital_out - 1_001.2).abs() < 1e-9);
    }

    #[test]
    fn zero_quantity_signal_is_still_recorded() {
        let candles = vec![
            candle(0, 600.5, 599.0, 600.2),
            candle(1, 601.5, 600.0, 601.2),
        ];
        let result = simulate_day(&candles, &levels(600.0, 590.0), &params(0.2, 0.2), 500.0);

        let trade = result.trade.expect("trade missing");
        assert_eq!(trade.quantity, 0);
        assert!((trade.pnl - 0.0).abs() < 1e-9);
        assert!((trade.pnl_percent - 0.2).abs() < 1e-9);
        assert!((result.capital_out - 500.0).abs() < 1e-9);
    }

    #[test]
    fn quiet_day_produces_no_trade_and_keeps_capital() {
        let candles = vec![
            candle(0, 99.5, 95.0, 97.0),
            candle(1, 99.9, 94.5, 95.0),
        ];
        let result = simulate_day(&candles, &levels(100.0, 90.0), &params(0.2, 0.2), 100_000.0);

        assert!(result.trade.is_none());
        assert!((result.capital_out - 100_000.0).abs() < 1e-9);
    }
}
