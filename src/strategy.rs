//! Execution strategies that observe the book and submit child orders.

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::event::{Event, EventType};
use crate::order::{ClientId, Order, OrderFlags, OrderId, OrderType, Side, TimeInForce};
use crate::orderbook::OrderBook;

/// Tag carried on the market maker's cancel-intent orders, replacing the
/// original implementation's untyped `user_data={"action": "cancel"}`
/// sentinel with a typed equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyAction {
    /// This order is not a real submission; `cancel_target` names the
    /// resting order to cancel instead.
    Cancel,
}

/// Opaque metadata attached to every order a [`Strategy`] emits, and to the
/// historical orders a [`crate::backtest::BacktestEngine`] replays
/// alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyMeta {
    /// Name of the strategy that produced this order, or `None` for
    /// historical replay orders.
    pub strategy: Option<&'static str>,
    /// Which slice of a TWAP/VWAP schedule this order belongs to.
    pub slice_index: Option<u64>,
    /// See [`StrategyAction`].
    pub action: Option<StrategyAction>,
    /// The order id to cancel, when `action == Some(StrategyAction::Cancel)`.
    pub cancel_target: Option<OrderId>,
}

/// An order tagged with [`StrategyMeta`].
pub type StrategyOrder = Order<StrategyMeta>;
/// A book whose resting orders carry [`StrategyMeta`].
pub type StrategyBook = OrderBook<StrategyMeta>;

/// Shared fill-tracking bookkeeping, composed into each concrete strategy
/// (Rust has no implementation inheritance, so this replaces a common base
/// class).
#[derive(Debug, Default)]
pub struct ExecutionState {
    executed_quantity: Decimal,
    notional: Decimal,
    num_trades: u64,
    own_orders: HashSet<OrderId>,
}

impl ExecutionState {
    /// Quantity filled so far across all orders this strategy emitted.
    pub fn executed_quantity(&self) -> Decimal {
        self.executed_quantity
    }

    /// Volume-weighted average fill price, if anything has filled yet.
    pub fn avg_fill_price(&self) -> Option<Decimal> {
        if self.executed_quantity > Decimal::ZERO {
            Some(self.notional / self.executed_quantity)
        } else {
            None
        }
    }

    /// Number of individual fills recorded.
    pub fn num_trades(&self) -> u64 {
        self.num_trades
    }

    fn record_emitted(&mut self, id: OrderId) {
        self.own_orders.insert(id);
    }

    fn on_fill(&mut self, events: &[Event]) {
        for event in events {
            if event.event_type != EventType::Trade {
                continue;
            }
            if !self.own_orders.contains(&event.order_id) {
                continue;
            }
            if let (Some(price), Some(qty)) = (event.price, event.quantity) {
                self.executed_quantity += qty;
                self.notional += price * qty;
                self.num_trades += 1;
            }
        }
    }
}

/// The common capability set every strategy implements, dispatched through
/// a trait object so [`crate::backtest::BacktestEngine`] can drive any of
/// them without being generic over the concrete strategy.
pub trait Strategy: Send {
    /// Called once per tick with the current time, mid price (if one
    /// exists) and a read-only view of the book. Returns orders to submit
    /// this tick; may be empty.
    fn on_market_data(
        &mut self,
        t: f64,
        mid_price: Option<Decimal>,
        book: &StrategyBook,
    ) -> Vec<StrategyOrder>;

    /// Called with every event produced by orders this strategy submitted
    /// this tick. Implementations must ignore events for orders they do
    /// not recognise as their own.
    fn on_fill(&mut self, events: &[Event]);

    /// Whether the strategy considers its work complete.
    fn is_done(&self) -> bool;

    /// Directional side this strategy executes, if any. Used to orient
    /// slippage reporting; market making (which quotes both sides) returns
    /// `None`.
    fn side(&self) -> Option<Side> {
        None
    }

    /// Realised-plus-mark-to-market PnL, for strategies that carry
    /// inventory. `None` for purely execution-targeted strategies.
    fn pnl(&self, _last_mid: Option<Decimal>) -> Option<Decimal> {
        None
    }

    /// Quantity filled so far by this strategy's own orders. `0` for
    /// strategies that do not track execution (e.g. market making).
    fn executed_quantity(&self) -> Decimal {
        Decimal::ZERO
    }

    /// Volume-weighted average fill price of this strategy's own orders.
    fn avg_fill_price(&self) -> Option<Decimal> {
        None
    }

    /// Number of individual fills this strategy's own orders received.
    fn num_trades(&self) -> u64 {
        0
    }

    /// Strategy name, used for metadata tagging and reporting.
    fn name(&self) -> &'static str;
}

fn slice_index(t: f64, start_ts: f64, end_ts: f64, num_slices: u64) -> Option<u64> {
    if t < start_ts || t > end_ts || num_slices == 0 {
        return None;
    }
    let span = end_ts - start_ts;
    if span <= 0.0 {
        return Some(0);
    }
    let progress = (t - start_ts) / span;
    let idx = (progress * num_slices as f64).floor() as u64;
    Some(idx.min(num_slices - 1))
}

fn slice_price(mid: Decimal, side: Side, spread_bps: Decimal) -> Decimal {
    let factor = spread_bps / Decimal::from(10_000);
    match side {
        Side::Buy => mid * (Decimal::ONE - factor),
        Side::Sell => mid * (Decimal::ONE + factor),
    }
}

/// Time-weighted average price execution: divides the window into equal
/// slices and submits one IOC slice order per boundary crossed.
pub struct TwapStrategy {
    side: Side,
    total_quantity: Decimal,
    start_ts: f64,
    end_ts: f64,
    num_slices: u64,
    spread_bps: Decimal,
    last_slice: Option<u64>,
    state: ExecutionState,
}

impl TwapStrategy {
    /// Creates a TWAP execution of `total_quantity` on `side`, spread over
    /// `num_slices` equal slices of `[start_ts, end_ts]`.
    pub fn new(
        side: Side,
        total_quantity: Decimal,
        start_ts: f64,
        end_ts: f64,
        num_slices: u64,
        spread_bps: Decimal,
    ) -> Self {
        TwapStrategy {
            side,
            total_quantity,
            start_ts,
            end_ts,
            num_slices,
            spread_bps,
            last_slice: None,
            state: ExecutionState::default(),
        }
    }

    /// Read-only access to fill bookkeeping.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    fn remaining_quantity(&self) -> Decimal {
        self.total_quantity - self.state.executed_quantity
    }

    fn build_slice_order(&mut self, idx: u64, mid: Decimal, t: f64) -> StrategyOrder {
        let remaining_slices = self.num_slices - idx;
        let qty = self.remaining_quantity() / Decimal::from(remaining_slices);
        let price = slice_price(mid, self.side, self.spread_bps);
        let order_id = OrderId::generate();
        self.state.record_emitted(order_id.clone());
        Order {
            order_id,
            client_id: Some(ClientId::from(self.name())),
            side: self.side,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity: qty,
            remaining_quantity: qty,
            time_in_force: TimeInForce::Ioc,
            flags: OrderFlags::empty(),
            timestamp: t,
            user_data: StrategyMeta {
                strategy: Some(self.name()),
                slice_index: Some(idx),
                action: None,
                cancel_target: None,
            },
        }
    }
}

impl Strategy for TwapStrategy {
    fn on_market_data(
        &mut self,
        t: f64,
        mid_price: Option<Decimal>,
        _book: &StrategyBook,
    ) -> Vec<StrategyOrder> {
        if self.is_done() {
            return Vec::new();
        }
        let Some(mid) = mid_price else { return Vec::new() };
        let Some(idx) = slice_index(t, self.start_ts, self.end_ts, self.num_slices) else {
            return Vec::new();
        };
        if self.last_slice == Some(idx) {
            return Vec::new();
        }
        self.last_slice = Some(idx);
        vec![self.build_slice_order(idx, mid, t)]
    }

    fn on_fill(&mut self, events: &[Event]) {
        self.state.on_fill(events);
    }

    fn is_done(&self) -> bool {
        self.state.executed_quantity >= self.total_quantity
    }

    fn side(&self) -> Option<Side> {
        Some(self.side)
    }

    fn executed_quantity(&self) -> Decimal {
        self.state.executed_quantity()
    }

    fn avg_fill_price(&self) -> Option<Decimal> {
        self.state.avg_fill_price()
    }

    fn num_trades(&self) -> u64 {
        self.state.num_trades()
    }

    fn name(&self) -> &'static str {
        "twap"
    }
}

/// Volume-weighted average price execution: TWAP plus a schedule
/// catch-up heuristic that tightens the spread when behind schedule.
pub struct VwapStrategy {
    inner: TwapStrategy,
}

impl VwapStrategy {
    /// Creates a VWAP execution with the same parameters as
    /// [`TwapStrategy::new`].
    pub fn new(
        side: Side,
        total_quantity: Decimal,
        start_ts: f64,
        end_ts: f64,
        num_slices: u64,
        spread_bps: Decimal,
    ) -> Self {
        VwapStrategy {
            inner: TwapStrategy::new(side, total_quantity, start_ts, end_ts, num_slices, spread_bps),
        }
    }

    /// Read-only access to fill bookkeeping.
    pub fn state(&self) -> &ExecutionState {
        self.inner.state()
    }
}

impl Strategy for VwapStrategy {
    fn on_market_data(
        &mut self,
        t: f64,
        mid_price: Option<Decimal>,
        _book: &StrategyBook,
    ) -> Vec<StrategyOrder> {
        if self.inner.is_done() {
            return Vec::new();
        }
        let Some(mid) = mid_price else { return Vec::new() };
        let Some(idx) = slice_index(t, self.inner.start_ts, self.inner.end_ts, self.inner.num_slices)
        else {
            return Vec::new();
        };
        if self.inner.last_slice == Some(idx) {
            return Vec::new();
        }
        self.inner.last_slice = Some(idx);

        let span = self.inner.end_ts - self.inner.start_ts;
        let expected = if span > 0.0 { (t - self.inner.start_ts) / span } else { 1.0 };
        let progress = (self.inner.state.executed_quantity / self.inner.total_quantity)
            .to_f64()
            .unwrap_or(0.0);
        let behind_schedule = progress < expected;

        let saved_spread = self.inner.spread_bps;
        if behind_schedule {
            self.inner.spread_bps = saved_spread / Decimal::from(2);
        }
        let order = self.inner.build_slice_order(idx, mid, t);
        self.inner.spread_bps = saved_spread;
        vec![order]
    }

    fn on_fill(&mut self, events: &[Event]) {
        self.inner.on_fill(events);
    }

    fn is_done(&self) -> bool {
        self.inner.is_done()
    }

    fn side(&self) -> Option<Side> {
        self.inner.side()
    }

    fn executed_quantity(&self) -> Decimal {
        self.inner.executed_quantity()
    }

    fn avg_fill_price(&self) -> Option<Decimal> {
        self.inner.avg_fill_price()
    }

    fn num_trades(&self) -> u64 {
        self.inner.num_trades()
    }

    fn name(&self) -> &'static str {
        "vwap"
    }
}

/// Inventory-managed market maker: quotes both sides around the mid price,
/// skewing quotes away from its inventory and re-quoting only when the mid
/// price has moved meaningfully.
pub struct MarketMakerStrategy {
    base_spread: Decimal,
    skew: Decimal,
    max_inventory: Decimal,
    quote_size: Decimal,
    requote_threshold: Decimal,
    inventory: Decimal,
    cash: Decimal,
    last_mid: Option<Decimal>,
    bid_order_id: Option<OrderId>,
    ask_order_id: Option<OrderId>,
}

impl MarketMakerStrategy {
    /// Creates a market maker quoting `quote_size` on each side, bounded
    /// to `[-max_inventory, max_inventory]`.
    pub fn new(base_spread: Decimal, skew: Decimal, max_inventory: Decimal, quote_size: Decimal) -> Self {
        MarketMakerStrategy {
            base_spread,
            skew,
            max_inventory,
            quote_size,
            requote_threshold: Decimal::new(1, 3), // 0.001
            inventory: Decimal::ZERO,
            cash: Decimal::ZERO,
            last_mid: None,
            bid_order_id: None,
            ask_order_id: None,
        }
    }

    /// Current signed inventory (positive = long).
    pub fn inventory(&self) -> Decimal {
        self.inventory
    }

    fn skew_ratio(&self) -> Decimal {
        (self.inventory / self.max_inventory).clamp(-Decimal::ONE, Decimal::ONE)
    }

    fn cancel_order_for(&self, id: OrderId, t: f64) -> StrategyOrder {
        Order {
            order_id: OrderId::generate(),
            client_id: Some(ClientId::from(self.name())),
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: None,
            quantity: Decimal::ONE,
            remaining_quantity: Decimal::ONE,
            time_in_force: TimeInForce::Ioc,
            flags: OrderFlags::empty(),
            timestamp: t,
            user_data: StrategyMeta {
                strategy: Some(self.name()),
                slice_index: None,
                action: Some(StrategyAction::Cancel),
                cancel_target: Some(id),
            },
        }
    }

    fn quote(&mut self, side: Side, price: Decimal, t: f64) -> StrategyOrder {
        let order_id = OrderId::generate();
        match side {
            Side::Buy => self.bid_order_id = Some(order_id.clone()),
            Side::Sell => self.ask_order_id = Some(order_id.clone()),
        }
        Order {
            order_id,
            client_id: Some(ClientId::from(self.name())),
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity: self.quote_size,
            remaining_quantity: self.quote_size,
            time_in_force: TimeInForce::Gtc,
            flags: OrderFlags::POST_ONLY,
            timestamp: t,
            user_data: StrategyMeta {
                strategy: Some(self.name()),
                slice_index: None,
                action: None,
                cancel_target: None,
            },
        }
    }
}

impl Strategy for MarketMakerStrategy {
    fn on_market_data(
        &mut self,
        t: f64,
        mid_price: Option<Decimal>,
        _book: &StrategyBook,
    ) -> Vec<StrategyOrder> {
        let Some(mid) = mid_price else { return Vec::new() };
        let mut orders = Vec::new();

        let moved = match self.last_mid {
            Some(last) if last > Decimal::ZERO => ((mid - last) / last).abs() > self.requote_threshold,
            _ => false,
        };
        if moved {
            if let Some(id) = self.bid_order_id.take() {
                orders.push(self.cancel_order_for(id, t));
            }
            if let Some(id) = self.ask_order_id.take() {
                orders.push(self.cancel_order_for(id, t));
            }
        }

        let r = self.skew_ratio();
        let adj_bid = self.base_spread * (Decimal::ONE + r * self.skew);
        let adj_ask = self.base_spread * (Decimal::ONE - r * self.skew);

        if self.inventory < self.max_inventory {
            let price = mid * (Decimal::ONE - adj_bid);
            orders.push(self.quote(Side::Buy, price, t));
        }
        if self.inventory > -self.max_inventory {
            let price = mid * (Decimal::ONE + adj_ask);
            orders.push(self.quote(Side::Sell, price, t));
        }

        self.last_mid = Some(mid);
        orders
    }

    fn on_fill(&mut self, events: &[Event]) {
        // The market maker's quotes rest on the book, so they are always
        // the maker side of a trade: the event's `order_id` is the taker
        // that crossed into them, and `matched_order_id` names the quote.
        for event in events {
            if event.event_type != EventType::Trade {
                continue;
            }
            let Some(matched) = &event.matched_order_id else {
                continue;
            };
            let is_bid = self.bid_order_id.as_ref() == Some(matched);
            let is_ask = self.ask_order_id.as_ref() == Some(matched);
            if !is_bid && !is_ask {
                continue;
            }
            let (Some(price), Some(qty)) = (event.price, event.quantity) else {
                continue;
            };
            if is_bid {
                self.inventory += qty;
                self.cash -= price * qty;
            } else {
                self.inventory -= qty;
                self.cash += price * qty;
            }
        }
    }

    fn is_done(&self) -> bool {
        false
    }

    fn pnl(&self, last_mid: Option<Decimal>) -> Option<Decimal> {
        let mark = last_mid.or(self.last_mid)?;
        Some(self.cash + self.inventory * mark)
    }

    fn name(&self) -> &'static str {
        "market_maker"
    }
}
