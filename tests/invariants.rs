//! Property-based checks of the universal invariants from the book's
//! testable-properties section, run over randomly generated admissible
//! order sequences.

use std::collections::HashSet;

use lob_core::{DefaultOrderBook, EventType, Order, OrderFlags, OrderId, OrderType, Side, TimeInForce};
use proptest::prelude::*;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
enum Action {
    New {
        side: Side,
        price: i64,
        qty: i64,
        tif: TimeInForce,
    },
    Cancel {
        /// Index into the sequence of ids actually generated by prior `New`
        /// actions, modulo the count so far (so cancels mostly target real
        /// orders while occasionally missing, exercising `ORDER_NOT_FOUND`).
        target: u32,
    },
}

fn action_strategy() -> impl Strategy<Value = Action> {
    let new = (prop_oneof![Just(Side::Buy), Just(Side::Sell)], 90i64..110, 1i64..20, tif_strategy())
        .prop_map(|(side, price, qty, tif)| Action::New { side, price, qty, tif });
    let cancel = (0u32..20).prop_map(|target| Action::Cancel { target });
    prop_oneof![3 => new, 1 => cancel]
}

fn tif_strategy() -> impl Strategy<Value = TimeInForce> {
    prop_oneof![
        Just(TimeInForce::Gtc),
        Just(TimeInForce::Ioc),
        Just(TimeInForce::Fok),
    ]
}

fn to_order(order_id: OrderId, side: Side, price: i64, qty: i64, tif: TimeInForce, ts: f64) -> Order<()> {
    let price = Decimal::from(price);
    let qty = Decimal::from(qty);
    Order {
        order_id,
        client_id: None,
        side,
        order_type: OrderType::Limit,
        price: Some(price),
        quantity: qty,
        remaining_quantity: qty,
        time_in_force: tif,
        flags: OrderFlags::empty(),
        timestamp: ts,
        user_data: (),
    }
}

/// Checks the invariants that must hold after any operation:
/// `0 <= remaining <= quantity` for every still-resting order, best bid <
/// best ask, and the best-level cache (observed indirectly through
/// `get_best_*`) agreeing with a fresh aggregate computed from `get_depth`.
fn check_invariants(book: &DefaultOrderBook, known_ids: &HashSet<OrderId>) {
    for id in known_ids {
        if let Some(order) = book.get_order(id) {
            assert!(order.remaining_quantity >= Decimal::ZERO);
            assert!(order.remaining_quantity <= order.quantity);
        }
    }

    let (bid, ask) = (book.get_best_bid(), book.get_best_ask());
    if let (Some((bid_price, _)), Some((ask_price, _))) = (bid, ask) {
        assert!(bid_price < ask_price, "crossed book: bid {bid_price} >= ask {ask_price}");
    }

    let (bids, asks) = book.get_depth(1);
    match (bid, bids.first()) {
        (Some((p, s)), Some((dp, ds))) => {
            assert_eq!(p, *dp);
            assert_eq!(s, *ds);
        }
        (None, None) => {}
        _ => panic!("best_bid and get_depth(1) disagree on bid presence"),
    }
    match (ask, asks.first()) {
        (Some((p, s)), Some((dp, ds))) => {
            assert_eq!(p, *dp);
            assert_eq!(s, *ds);
        }
        (None, None) => {}
        _ => panic!("best_ask and get_depth(1) disagree on ask presence"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn invariants_hold_after_every_admissible_action(actions in prop::collection::vec(action_strategy(), 0..40)) {
        let book = DefaultOrderBook::new("TEST");
        let mut known_ids: HashSet<OrderId> = HashSet::new();
        let mut generated_ids: Vec<OrderId> = Vec::new();

        for (ts, action) in actions.into_iter().enumerate() {
            match action {
                Action::New { side, price, qty, tif } => {
                    // Each `New` mints a fresh, globally unique id: `order_id`
                    // is contractually unique within one book's lifetime, a
                    // caller obligation rather than something the book itself
                    // enforces.
                    let order_id = OrderId::from(generated_ids.len() as u64);
                    known_ids.insert(order_id.clone());
                    generated_ids.push(order_id.clone());
                    let order = to_order(order_id, side, price, qty, tif, ts as f64);
                    let submitted_qty = order.quantity;
                    let events = book.add_order(order);

                    let traded: Decimal = events
                        .iter()
                        .filter(|e| e.event_type == EventType::Trade)
                        .filter_map(|e| e.quantity)
                        .sum();
                    prop_assert!(traded <= submitted_qty);
                }
                Action::Cancel { target } => {
                    if !generated_ids.is_empty() {
                        let id = generated_ids[target as usize % generated_ids.len()].clone();
                        book.cancel_order(&id, ts as f64);
                    }
                }
            }
            check_invariants(&book, &known_ids);
        }
    }

    #[test]
    fn submit_then_cancel_restores_book_state(
        price in 90i64..110,
        qty in 1i64..20,
    ) {
        let book = DefaultOrderBook::new("TEST");
        book.add_order(to_order(OrderId::from(1u64), Side::Sell, price + 5, qty, TimeInForce::Gtc, 0.0));
        let before_bid = book.get_best_bid();
        let before_ask = book.get_best_ask();
        let before_depth = book.get_depth(5);

        book.add_order(to_order(OrderId::from(2u64), Side::Buy, price, qty, TimeInForce::Gtc, 1.0));
        book.cancel_order(&OrderId::from(2u64), 2.0);

        prop_assert_eq!(book.get_best_bid(), before_bid);
        prop_assert_eq!(book.get_best_ask(), before_ask);
        prop_assert_eq!(book.get_depth(5), before_depth);
        prop_assert_eq!(book.get_order(&OrderId::from(2u64)), None);
    }
}
