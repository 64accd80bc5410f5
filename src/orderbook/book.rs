//! The order book: price-time priority matching over a bid and an ask
//! [`PriceLevels`] side, with an id index and admission/matching policy.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex};
use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use crate::event::{Event, RejectReason};
use crate::order::{ClientId, Order, OrderFlags, OrderId, OrderType, Side, TimeInForce};
use crate::price_levels::{OrderRef, PriceLevels};

/// Cumulative counters maintained by an [`OrderBook`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BookStats {
    /// Number of orders admitted (not rejected) over the book's lifetime.
    pub order_count: u64,
    /// Number of individual trade fills produced over the book's lifetime.
    pub trade_count: u64,
    /// Sum of all trade quantities over the book's lifetime.
    pub cumulative_volume: Decimal,
    /// Caller-supplied timestamp of the most recent mutating call.
    pub last_update: f64,
}

/// A single-symbol limit order book with price-time priority matching.
///
/// `T` is opaque caller metadata carried on every [`Order`]; use `()` when
/// no extra data is needed, or see [`crate::strategy::StrategyMeta`] for
/// the strategy-driven use case.
///
/// All mutating operations (`add_order`, `cancel_order`, `amend_order`)
/// serialise through a single reentrant mutex and run to completion before
/// returning their event sequence; see the crate's concurrency notes in
/// [`crate::orderbook`] for the full discipline.
pub struct OrderBook<T = ()> {
    symbol: String,
    bids: PriceLevels<T>,
    asks: PriceLevels<T>,
    index: DashMap<OrderId, OrderRef<T>>,
    lock: ReentrantMutex<()>,
    stats: Mutex<BookStats>,
}

impl<T> OrderBook<T> {
    /// Creates an empty book for `symbol`.
    pub fn new(symbol: impl Into<String>) -> Self {
        OrderBook {
            symbol: symbol.into(),
            bids: PriceLevels::new(false),
            asks: PriceLevels::new(true),
            index: DashMap::new(),
            lock: ReentrantMutex::new(()),
            stats: Mutex::new(BookStats::default()),
        }
    }

    /// The symbol this book was constructed for.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn touch(&self, timestamp: f64) {
        self.stats.lock().last_update = timestamp;
    }

    fn record_admission(&self, timestamp: f64) {
        let mut stats = self.stats.lock();
        stats.order_count += 1;
        stats.last_update = timestamp;
    }

    fn record_trade(&self, quantity: Decimal, timestamp: f64) {
        let mut stats = self.stats.lock();
        stats.trade_count += 1;
        stats.cumulative_volume += quantity;
        stats.last_update = timestamp;
    }

    fn side_levels(&self, side: Side) -> &PriceLevels<T> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn opposite_levels(&self, side: Side) -> &PriceLevels<T> {
        self.side_levels(side.opposite())
    }

    /// Sums resting quantity across opposite-side levels eligible for
    /// `taker_side`/`taker_price`, used for the FOK pre-match dry run. Does
    /// not account for self-trade prevention (see the crate's design notes
    /// on the FOK/STP interaction).
    fn available_liquidity(&self, taker_side: Side, taker_price: Option<Decimal>) -> Decimal {
        let opposite = self.opposite_levels(taker_side);
        let mut total = Decimal::ZERO;
        for (level_price, size) in opposite.levels(usize::MAX) {
            let eligible = match taker_price {
                None => true,
                Some(p) => match taker_side {
                    Side::Buy => level_price <= p,
                    Side::Sell => level_price >= p,
                },
            };
            if !eligible {
                break;
            }
            total += size;
        }
        total
    }

    /// Submits `order` for admission and matching. Returns the complete,
    /// ordered sequence of events the submission produced.
    pub fn add_order(&self, mut order: Order<T>) -> Vec<Event> {
        let _guard = self.lock.lock();
        let ts = order.timestamp;
        self.touch(ts);
        let mut events = Vec::new();

        if order.quantity <= Decimal::ZERO {
            warn!(order_id = %order.order_id, "rejecting order with non-positive quantity");
            events.push(Event::reject(order.order_id, RejectReason::InvalidQuantity, ts));
            return events;
        }
        if order.order_type == OrderType::Limit {
            match order.price {
                None => {
                    events.push(Event::reject(
                        order.order_id,
                        RejectReason::LimitOrderMustHavePrice,
                        ts,
                    ));
                    return events;
                }
                Some(p) if p <= Decimal::ZERO => {
                    events.push(Event::reject(order.order_id, RejectReason::InvalidPrice, ts));
                    return events;
                }
                _ => {}
            }
        }
        order.remaining_quantity = order.quantity;

        if order.has_flag(OrderFlags::POST_ONLY) {
            let would_cross = match order.side {
                Side::Buy => self
                    .asks
                    .best_price()
                    .is_some_and(|ask| order.price.map_or(true, |p| p >= ask)),
                Side::Sell => self
                    .bids
                    .best_price()
                    .is_some_and(|bid| order.price.map_or(true, |p| p <= bid)),
            };
            if would_cross {
                debug!(order_id = %order.order_id, "post-only order would cross, rejecting");
                events.push(Event::reject(
                    order.order_id,
                    RejectReason::PostOnlyWouldMatch,
                    ts,
                ));
                return events;
            }
        }

        if order.time_in_force == TimeInForce::Fok {
            let available = self.available_liquidity(order.side, order.price);
            if available < order.quantity {
                trace!(order_id = %order.order_id, %available, "fok dry run found insufficient liquidity");
                events.push(Event::reject(order.order_id, RejectReason::FokNotFilled, ts));
                return events;
            }
        }

        self.record_admission(ts);

        let mut filled_any = false;
        loop {
            if order.remaining_quantity <= Decimal::ZERO {
                break;
            }
            let opposite = self.opposite_levels(order.side);
            let Some((level_price, maker_ref)) = opposite.front_of_best() else {
                break;
            };

            let eligible = match order.price {
                None => true,
                Some(taker_price) => match order.side {
                    Side::Buy => level_price <= taker_price,
                    Side::Sell => level_price >= taker_price,
                },
            };
            if !eligible {
                break;
            }

            let maker_client = maker_ref.lock().client_id.clone();
            if order.has_flag(OrderFlags::STP) && order.client_id.is_some() && maker_client == order.client_id {
                let maker_id = maker_ref.lock().order_id.clone();
                trace!(taker = %order.order_id, maker = %maker_id, "self-trade prevented, skipping maker");
                opposite.pop_front_of_best();
                self.index.remove(&maker_id);
                continue;
            }

            let fill_qty = {
                let maker = maker_ref.lock();
                order.remaining_quantity.min(maker.remaining_quantity)
            };
            maker_ref.lock().remaining_quantity -= fill_qty;
            order.remaining_quantity -= fill_qty;
            filled_any = true;

            let maker_id = maker_ref.lock().order_id.clone();
            trace!(taker = %order.order_id, maker = %maker_id, price = %level_price, qty = %fill_qty, "trade");
            events.push(Event::trade(
                order.order_id.clone(),
                maker_id.clone(),
                level_price,
                fill_qty,
                ts,
            ));
            self.record_trade(fill_qty, ts);

            let maker_remaining = maker_ref.lock().remaining_quantity;
            if maker_remaining <= Decimal::ZERO {
                opposite.pop_front_of_best();
                self.index.remove(&maker_id);
                events.push(Event::done(maker_id, ts));
            } else {
                opposite.invalidate_cache();
            }
        }

        if order.remaining_quantity <= Decimal::ZERO {
            events.push(Event::done(order.order_id.clone(), ts));
            return events;
        }

        let rests = order.time_in_force == TimeInForce::Gtc && order.order_type == OrderType::Limit;
        if rests {
            let id = order.order_id.clone();
            let side = order.side;
            debug!(order_id = %id, remaining = %order.remaining_quantity, "resting residual on book");
            let order_ref: OrderRef<T> = Arc::new(Mutex::new(order));
            self.index.insert(id.clone(), order_ref.clone());
            self.side_levels(side).add_order(order_ref);
            events.push(Event::new_resting(id, ts));
        } else {
            let reason = if filled_any {
                RejectReason::IocRemaining
            } else {
                RejectReason::IocNoMatch
            };
            debug!(order_id = %order.order_id, ?reason, "cancelling unfilled residual");
            events.push(Event::cancel(order.order_id, Some(reason), ts));
        }
        events
    }

    /// Cancels a resting order by id. `timestamp` is attached to the
    /// resulting event(s) and is not otherwise consulted.
    pub fn cancel_order(&self, id: &OrderId, timestamp: f64) -> Vec<Event> {
        let _guard = self.lock.lock();
        self.touch(timestamp);

        let Some(entry) = self.index.get(id) else {
            return vec![Event::reject(id.clone(), RejectReason::OrderNotFound, timestamp)];
        };
        let order_ref = entry.clone();
        drop(entry);

        let (price, side) = {
            let order = order_ref.lock();
            (order.price, order.side)
        };
        self.index.remove(id);

        match price {
            None => vec![Event::cancel(
                id.clone(),
                Some(RejectReason::MarketOrderCancel),
                timestamp,
            )],
            Some(p) => {
                let removed = self.side_levels(side).remove_order(p, id);
                if removed {
                    vec![Event::cancel(id.clone(), None, timestamp)]
                } else {
                    vec![Event::reject(
                        id.clone(),
                        RejectReason::OrderNotFoundInBook,
                        timestamp,
                    )]
                }
            }
        }
    }

    /// Returns the current best bid `(price, aggregate_size)`, if any.
    pub fn get_best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.best()
    }

    /// Returns the current best ask `(price, aggregate_size)`, if any.
    pub fn get_best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.best()
    }

    /// Arithmetic mean of best bid and best ask, when both exist.
    pub fn get_mid_price(&self) -> Option<Decimal> {
        let (bid, _) = self.get_best_bid()?;
        let (ask, _) = self.get_best_ask()?;
        Some((bid + ask) / Decimal::from(2))
    }

    /// Top `k` price levels on each side, in priority order.
    pub fn get_depth(&self, k: usize) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>) {
        (self.bids.levels(k), self.asks.levels(k))
    }

    /// Current resting order count.
    pub fn resting_order_count(&self) -> usize {
        self.index.len()
    }

    /// Cumulative book statistics.
    pub fn get_stats(&self) -> BookStats {
        *self.stats.lock()
    }
}

impl<T: Clone> OrderBook<T> {
    /// Returns a clone of the current order record, if `id` is resting.
    pub fn get_order(&self, id: &OrderId) -> Option<Order<T>> {
        self.index.get(id).map(|r| r.lock().clone())
    }

    /// Amends a resting order.
    ///
    /// When only `new_quantity` is supplied and it is strictly smaller than
    /// the order's current `remaining_quantity`, the order is mutated in
    /// place, preserving its queue position (time priority). Any other
    /// combination is modelled as a cancel of the original order followed
    /// by a fresh submission under the same `order_id`, which loses time
    /// priority; both the cancel and the resubmission's events are
    /// returned in order.
    pub fn amend_order(
        &self,
        id: &OrderId,
        new_price: Option<Decimal>,
        new_quantity: Option<Decimal>,
        timestamp: f64,
    ) -> Vec<Event> {
        let _guard = self.lock.lock();
        self.touch(timestamp);

        let Some(entry) = self.index.get(id) else {
            return vec![Event::reject(id.clone(), RejectReason::OrderNotFound, timestamp)];
        };
        let order_ref = entry.clone();
        drop(entry);

        if new_price.is_none() {
            if let Some(new_qty) = new_quantity {
                let mut order = order_ref.lock();
                if new_qty > Decimal::ZERO && new_qty < order.remaining_quantity {
                    order.remaining_quantity = new_qty;
                    let price = order.price;
                    let side = order.side;
                    drop(order);
                    self.side_levels(side).invalidate_cache();
                    debug!(order_id = %id, new_qty = %new_qty, "amended in place");
                    let price = price.expect("resting orders always carry a price");
                    return vec![Event::amend(id.clone(), price, new_qty, timestamp)];
                }
            } else {
                // Neither field supplied: nothing to do.
                return Vec::new();
            }
        }

        // General case: cancel then resubmit, losing time priority.
        let (side, order_type, time_in_force, flags, client_id, cur_price, cur_qty, user_data) = {
            let order = order_ref.lock();
            (
                order.side,
                order.order_type,
                order.time_in_force,
                order.flags,
                order.client_id.clone(),
                order.price,
                order.remaining_quantity,
                order.user_data.clone(),
            )
        };
        let mut events = self.cancel_order(id, timestamp);
        let resubmitted = Order {
            order_id: id.clone(),
            client_id,
            side,
            order_type,
            price: new_price.or(cur_price),
            quantity: new_quantity.unwrap_or(cur_qty),
            remaining_quantity: new_quantity.unwrap_or(cur_qty),
            time_in_force,
            flags,
            timestamp,
            user_data,
        };
        events.extend(self.add_order(resubmitted));
        events
    }
}
