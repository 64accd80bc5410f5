//! Ordered, price-indexed FIFO queues for one side of an order book.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use rust_decimal::Decimal;

use crate::order::{Order, OrderId};

/// A resting order shared between a [`PriceLevels`] queue and the owning
/// book's id index. The id index owns the order; the queue holds a
/// reference keyed back into it, so mutating either view is visible
/// through the other.
pub type OrderRef<T> = Arc<Mutex<Order<T>>>;

struct Inner<T> {
    /// Price points in matching priority order (ascending for asks,
    /// descending for bids).
    prices: Vec<Decimal>,
    queues: HashMap<Decimal, VecDeque<OrderRef<T>>>,
    /// Cached `(best_price, best_size)`, invalidated whenever the best
    /// level's queue composition changes.
    cache: Option<(Decimal, Decimal)>,
}

impl<T> Inner<T> {
    fn new() -> Self {
        Inner {
            prices: Vec::new(),
            queues: HashMap::new(),
            cache: None,
        }
    }

    fn insertion_point(&self, price: Decimal, ascending: bool) -> usize {
        if ascending {
            self.prices.partition_point(|&p| p < price)
        } else {
            self.prices.partition_point(|&p| p > price)
        }
    }

    fn queue_size(queue: &VecDeque<OrderRef<T>>) -> Decimal {
        queue
            .iter()
            .map(|o| o.lock().remaining_quantity)
            .sum()
    }
}

/// Ordered collection of price levels for one side of the book.
///
/// Holds its own reentrant lock so it can be consulted directly (e.g. for
/// introspection or metrics) without routing through the owning book, per
/// the single-writer-per-book concurrency discipline.
pub struct PriceLevels<T> {
    ascending: bool,
    inner: ReentrantMutex<RefCell<Inner<T>>>,
}

impl<T> PriceLevels<T> {
    /// Creates an empty side. `ascending = true` for asks (lowest price
    /// first), `false` for bids (highest price first).
    pub fn new(ascending: bool) -> Self {
        PriceLevels {
            ascending,
            inner: ReentrantMutex::new(RefCell::new(Inner::new())),
        }
    }

    /// Inserts `order` at the tail of the queue for its price, creating
    /// the level if absent.
    pub fn add_order(&self, order: OrderRef<T>) {
        let price = order
            .lock()
            .price
            .expect("only priced (LIMIT) orders rest in PriceLevels");
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        if !inner.queues.contains_key(&price) {
            let pos = inner.insertion_point(price, self.ascending);
            inner.prices.insert(pos, price);
            inner.queues.insert(price, VecDeque::new());
        }
        inner.queues.get_mut(&price).unwrap().push_back(order);
        if inner.prices.first() == Some(&price) {
            inner.cache = None;
        }
    }

    /// Removes the specific order with `order_id` from the queue at
    /// `price`. Returns whether removal occurred.
    pub fn remove_order(&self, price: Decimal, order_id: &OrderId) -> bool {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let Some(queue) = inner.queues.get_mut(&price) else {
            return false;
        };
        let Some(idx) = queue.iter().position(|o| &o.lock().order_id == order_id) else {
            return false;
        };
        queue.remove(idx);
        let now_empty = queue.is_empty();
        if now_empty {
            inner.queues.remove(&price);
            if let Ok(pos) = inner
                .prices
                .binary_search_by(|p| Self::cmp(*p, price, self.ascending))
            {
                inner.prices.remove(pos);
            }
        }
        if inner.prices.first() == Some(&price) || now_empty {
            inner.cache = None;
        }
        true
    }

    fn cmp(a: Decimal, b: Decimal, ascending: bool) -> std::cmp::Ordering {
        if ascending { a.cmp(&b) } else { b.cmp(&a) }
    }

    /// The best (highest-priority) price, if any level exists.
    pub fn best_price(&self) -> Option<Decimal> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner.prices.first().copied()
    }

    /// Aggregate remaining quantity at the best price, using the cache
    /// when valid.
    pub fn best_size(&self) -> Option<Decimal> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let price = *inner.prices.first()?;
        if let Some((cached_price, cached_size)) = inner.cache {
            if cached_price == price {
                return Some(cached_size);
            }
        }
        let size = Inner::queue_size(inner.queues.get(&price)?);
        inner.cache = Some((price, size));
        Some(size)
    }

    /// `(price, aggregate_size)` of the best level, if any.
    pub fn best(&self) -> Option<(Decimal, Decimal)> {
        let price = self.best_price()?;
        let size = self.best_size()?;
        Some((price, size))
    }

    /// Top `k` price levels with their aggregate sizes, in priority order.
    pub fn levels(&self, k: usize) -> Vec<(Decimal, Decimal)> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        inner
            .prices
            .iter()
            .take(k)
            .map(|p| (*p, Inner::queue_size(&inner.queues[p])))
            .collect()
    }

    /// Clones a reference to the order at the head of the best queue,
    /// without removing it.
    pub fn front_of_best(&self) -> Option<(Decimal, OrderRef<T>)> {
        let guard = self.inner.lock();
        let inner = guard.borrow();
        let price = *inner.prices.first()?;
        let front = inner.queues.get(&price)?.front()?.clone();
        Some((price, front))
    }

    /// Removes and returns the order at the head of the best queue. Used
    /// both for fully-consumed makers and for the self-trade-prevention
    /// skip, which never reinserts the skipped order.
    pub fn pop_front_of_best(&self) -> Option<(Decimal, OrderRef<T>)> {
        let guard = self.inner.lock();
        let mut inner = guard.borrow_mut();
        let price = *inner.prices.first()?;
        let queue = inner.queues.get_mut(&price)?;
        let order = queue.pop_front()?;
        let now_empty = queue.is_empty();
        if now_empty {
            inner.queues.remove(&price);
            inner.prices.remove(0);
        }
        inner.cache = None;
        Some((price, order))
    }

    /// Invalidates the best-level cache. Callers mutate a resting order's
    /// `remaining_quantity` in place (through the shared [`OrderRef`])
    /// during a partial fill; this must be called afterwards when the
    /// mutated order sits at the current best price.
    pub fn invalidate_cache(&self) {
        let guard = self.inner.lock();
        guard.borrow_mut().cache = None;
    }

    /// True when no price levels remain.
    pub fn is_empty(&self) -> bool {
        let guard = self.inner.lock();
        guard.borrow().prices.is_empty()
    }

    /// Number of distinct price levels.
    pub fn level_count(&self) -> usize {
        let guard = self.inner.lock();
        guard.borrow().prices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderFlags, OrderType, Side, TimeInForce};
    use rust_decimal_macros::dec;

    fn order(id: &str, price: Decimal, qty: Decimal, ts: f64) -> OrderRef<()> {
        Arc::new(Mutex::new(Order {
            order_id: OrderId::from(id),
            client_id: None,
            side: Side::Sell,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity: qty,
            remaining_quantity: qty,
            time_in_force: TimeInForce::Gtc,
            flags: OrderFlags::empty(),
            timestamp: ts,
            user_data: (),
        }))
    }

    #[test]
    fn ascending_insertion_orders_prices_low_to_high() {
        let levels: PriceLevels<()> = PriceLevels::new(true);
        levels.add_order(order("a", dec!(101), dec!(1), 0.0));
        levels.add_order(order("b", dec!(99), dec!(1), 1.0));
        levels.add_order(order("c", dec!(100), dec!(1), 2.0));
        assert_eq!(levels.best_price(), Some(dec!(99)));
        assert_eq!(
            levels.levels(3).into_iter().map(|(p, _)| p).collect::<Vec<_>>(),
            vec![dec!(99), dec!(100), dec!(101)]
        );
    }

    #[test]
    fn descending_insertion_orders_prices_high_to_low() {
        let levels: PriceLevels<()> = PriceLevels::new(false);
        levels.add_order(order("a", dec!(99), dec!(1), 0.0));
        levels.add_order(order("b", dec!(101), dec!(1), 1.0));
        levels.add_order(order("c", dec!(100), dec!(1), 2.0));
        assert_eq!(levels.best_price(), Some(dec!(101)));
    }

    #[test]
    fn fifo_within_a_level() {
        let levels: PriceLevels<()> = PriceLevels::new(true);
        levels.add_order(order("first", dec!(100), dec!(1), 0.0));
        levels.add_order(order("second", dec!(100), dec!(1), 1.0));
        let (_, front) = levels.front_of_best().unwrap();
        assert_eq!(front.lock().order_id, OrderId::from("first"));
    }

    #[test]
    fn removing_last_order_at_a_level_drops_the_level() {
        let levels: PriceLevels<()> = PriceLevels::new(true);
        levels.add_order(order("only", dec!(100), dec!(1), 0.0));
        assert!(levels.remove_order(dec!(100), &OrderId::from("only")));
        assert!(levels.is_empty());
        assert_eq!(levels.best_price(), None);
    }

    #[test]
    fn best_size_sums_the_whole_queue() {
        let levels: PriceLevels<()> = PriceLevels::new(true);
        levels.add_order(order("a", dec!(100), dec!(1), 0.0));
        levels.add_order(order("b", dec!(100), dec!(2), 1.0));
        assert_eq!(levels.best_size(), Some(dec!(3)));
    }

    #[test]
    fn pop_front_does_not_reinsert() {
        let levels: PriceLevels<()> = PriceLevels::new(true);
        levels.add_order(order("a", dec!(100), dec!(1), 0.0));
        levels.add_order(order("b", dec!(100), dec!(1), 1.0));
        let (_, popped) = levels.pop_front_of_best().unwrap();
        assert_eq!(popped.lock().order_id, OrderId::from("a"));
        let (_, front) = levels.front_of_best().unwrap();
        assert_eq!(front.lock().order_id, OrderId::from("b"));
    }
}
