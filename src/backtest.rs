//! Drives a [`Strategy`] against a historical order-flow replay and scores
//! its execution.

use rust_decimal::Decimal;
use tracing::debug;

use crate::event::EventType;
use crate::order::{OrderType, Side};
use crate::replay::{ReplayMsgType, ReplayRecord};
use crate::strategy::{Strategy, StrategyBook, StrategyMeta};

/// Outcome of running a strategy across a historical replay window.
#[derive(Debug, Clone, Copy)]
pub struct BacktestResult {
    /// Total quantity the strategy's own orders filled.
    pub filled_quantity: Decimal,
    /// Volume-weighted average price of the strategy's own fills.
    pub avg_fill_price: Option<Decimal>,
    /// Number of individual fills the strategy's orders received.
    pub trade_count: u64,
    /// Realised-plus-mark-to-market PnL, if the strategy reports one.
    pub pnl: Option<Decimal>,
    /// Execution slippage relative to the volume-weighted mid price
    /// observed during the run, signed so that positive is adverse to the
    /// executing side and negative is favourable. `None` for strategies
    /// with no directional side (e.g. market making).
    pub slippage: Option<Decimal>,
}

/// Replays historical order flow through a book, interleaving a strategy's
/// own orders, and scores the result.
pub struct BacktestEngine {
    start_ts: f64,
    end_ts: f64,
}

impl BacktestEngine {
    /// Creates an engine bounded to `[start_ts, end_ts]`; the strategy is
    /// given one extra chance to finish after `end_ts` is reached but is
    /// not driven further once the window closes.
    pub fn new(start_ts: f64, end_ts: f64) -> Self {
        BacktestEngine { start_ts, end_ts }
    }

    /// Runs `strategy` against `records` (historical market orders, NOT the
    /// strategy's own) on `book`, which should be empty on entry.
    pub fn run(
        &self,
        book: &StrategyBook,
        strategy: &mut dyn Strategy,
        records: impl IntoIterator<Item = ReplayRecord>,
    ) -> BacktestResult {
        let mut records: Vec<ReplayRecord> = records
            .into_iter()
            .filter(|r| r.timestamp >= self.start_ts && r.timestamp <= self.end_ts)
            .collect();
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let mut mid_sum = Decimal::ZERO;
        let mut mid_count: u64 = 0;

        for record in &records {
            self.submit_historical(book, record);
            if record.msg_type == ReplayMsgType::New {
                self.tick(book, strategy, record.timestamp, &mut mid_sum, &mut mid_count);
                if strategy.is_done() {
                    break;
                }
            }
        }

        if !strategy.is_done() {
            self.tick(book, strategy, self.end_ts, &mut mid_sum, &mut mid_count);
        }

        let avg_mid = if mid_count > 0 {
            Some(mid_sum / Decimal::from(mid_count))
        } else {
            None
        };
        self.score(strategy, avg_mid)
    }

    fn submit_historical(&self, book: &StrategyBook, record: &ReplayRecord) {
        match record.msg_type {
            ReplayMsgType::New => {
                let (Some(side), Some(price), Some(qty)) = (record.side, record.price, record.qty)
                else {
                    return;
                };
                let order = crate::order::Order {
                    order_id: record.order_id.clone(),
                    client_id: None,
                    side,
                    order_type: OrderType::Limit,
                    price: Some(price),
                    quantity: qty,
                    remaining_quantity: qty,
                    time_in_force: crate::order::TimeInForce::Gtc,
                    flags: crate::order::OrderFlags::empty(),
                    timestamp: record.timestamp,
                    user_data: StrategyMeta::default(),
                };
                book.add_order(order);
            }
            ReplayMsgType::Cancel => {
                book.cancel_order(&record.order_id, record.timestamp);
            }
        }
    }

    fn tick(
        &self,
        book: &StrategyBook,
        strategy: &mut dyn Strategy,
        t: f64,
        mid_sum: &mut Decimal,
        mid_count: &mut u64,
    ) {
        let mid = book.get_mid_price();
        if let Some(mid) = mid {
            *mid_sum += mid;
            *mid_count += 1;
        }

        let orders = strategy.on_market_data(t, mid, book);
        for order in orders {
            let is_cancel = order.user_data.action == Some(crate::strategy::StrategyAction::Cancel);
            if is_cancel {
                let Some(target) = order.user_data.cancel_target.clone() else {
                    continue;
                };
                let events = book.cancel_order(&target, t);
                strategy.on_fill(&events);
                continue;
            }
            let events = book.add_order(order);
            let fills = events.iter().filter(|e| e.event_type == EventType::Trade).count();
            if fills > 0 {
                debug!(fills, "strategy order produced fills");
            }
            strategy.on_fill(&events);
        }
    }

    fn score(&self, strategy: &dyn Strategy, avg_mid: Option<Decimal>) -> BacktestResult {
        let filled_quantity = strategy.executed_quantity();
        let avg_fill_price = strategy.avg_fill_price();
        let trade_count = strategy.num_trades();
        let pnl = strategy.pnl(avg_mid);
        let slippage = match (strategy.side(), avg_fill_price, avg_mid) {
            (Some(Side::Buy), Some(fill), Some(mid)) => Some(fill - mid),
            (Some(Side::Sell), Some(fill), Some(mid)) => Some(mid - fill),
            _ => None,
        };
        BacktestResult {
            filled_quantity,
            avg_fill_price,
            trade_count,
            pnl,
            slippage,
        }
    }
}
