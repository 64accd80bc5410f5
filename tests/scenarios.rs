//! Integration tests reproducing the literal scenarios from the book's
//! testable-properties section, end to end against the public API.

use lob_core::{ClientId, DefaultOrderBook, Event, EventType, Order, OrderFlags, OrderId, OrderType, RejectReason, Side, TimeInForce};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn limit(id: &str, side: Side, price: Decimal, qty: Decimal, ts: f64) -> Order<()> {
    Order {
        order_id: OrderId::from(id),
        client_id: None,
        side,
        order_type: OrderType::Limit,
        price: Some(price),
        quantity: qty,
        remaining_quantity: qty,
        time_in_force: TimeInForce::Gtc,
        flags: OrderFlags::empty(),
        timestamp: ts,
        user_data: (),
    }
}

fn event_types(events: &[Event]) -> Vec<EventType> {
    events.iter().map(|e| e.event_type).collect()
}

#[test]
fn scenario_1_basic_match() {
    let book = DefaultOrderBook::new("TEST");
    let events = book.add_order(limit("1", Side::Buy, dec!(100), dec!(1), 0.0));
    assert_eq!(event_types(&events), vec![EventType::New]);

    let events = book.add_order(limit("2", Side::Sell, dec!(99.5), dec!(0.5), 1.0));
    assert_eq!(event_types(&events), vec![EventType::Trade, EventType::Done]);
    assert_eq!(events[0].matched_order_id, Some(OrderId::from("1")));
    assert_eq!(events[0].price, Some(dec!(100)));
    assert_eq!(events[0].quantity, Some(dec!(0.5)));
    assert_eq!(events[1].order_id, OrderId::from("2"));

    assert_eq!(book.get_best_bid(), Some((dec!(100), dec!(0.5))));
    assert_eq!(book.get_best_ask(), None);
    assert_eq!(
        book.get_order(&OrderId::from("1")).unwrap().remaining_quantity,
        dec!(0.5)
    );
}

#[test]
fn scenario_2_price_priority() {
    let book = DefaultOrderBook::new("TEST");
    book.add_order(limit("sell1", Side::Sell, dec!(101), dec!(1), 0.0));
    book.add_order(limit("sell2", Side::Sell, dec!(100), dec!(1), 1.0));
    let events = book.add_order(limit("buy1", Side::Buy, dec!(102), dec!(1), 2.0));

    assert_eq!(
        event_types(&events),
        vec![EventType::Trade, EventType::Done, EventType::Done]
    );
    assert_eq!(events[0].matched_order_id, Some(OrderId::from("sell2")));
    assert_eq!(events[0].price, Some(dec!(100)));
    assert_eq!(events[0].quantity, Some(dec!(1)));
    assert_eq!(events[1].order_id, OrderId::from("sell2"));
    assert_eq!(events[2].order_id, OrderId::from("buy1"));
}

#[test]
fn scenario_3_time_priority_fifo() {
    let book = DefaultOrderBook::new("TEST");
    book.add_order(limit("sell1", Side::Sell, dec!(100), dec!(0.5), 0.0));
    book.add_order(limit("sell2", Side::Sell, dec!(100), dec!(0.5), 1.0));
    let events = book.add_order(limit("buy1", Side::Buy, dec!(100), dec!(1), 2.0));

    assert_eq!(events[0].matched_order_id, Some(OrderId::from("sell1")));
    assert_eq!(events[0].quantity, Some(dec!(0.5)));
    assert_eq!(events[2].matched_order_id, Some(OrderId::from("sell2")));
    assert_eq!(events[2].quantity, Some(dec!(0.5)));
}

#[test]
fn scenario_4_ioc_partial() {
    let book = DefaultOrderBook::new("TEST");
    book.add_order(limit("sell1", Side::Sell, dec!(100), dec!(0.5), 0.0));
    let mut buy = limit("buy1", Side::Buy, dec!(100), dec!(1), 1.0);
    buy.time_in_force = TimeInForce::Ioc;
    let events = book.add_order(buy);

    assert_eq!(event_types(&events), vec![EventType::Trade, EventType::Cancel]);
    assert_eq!(events[0].quantity, Some(dec!(0.5)));
    assert_eq!(events[1].reason, Some(RejectReason::IocRemaining));
}

#[test]
fn scenario_5_fok_insufficient() {
    let book = DefaultOrderBook::new("TEST");
    book.add_order(limit("sell1", Side::Sell, dec!(100), dec!(0.5), 0.0));
    let mut buy = limit("buy1", Side::Buy, dec!(100), dec!(1), 1.0);
    buy.time_in_force = TimeInForce::Fok;
    let events = book.add_order(buy);

    assert_eq!(event_types(&events), vec![EventType::Reject]);
    assert_eq!(events[0].reason, Some(RejectReason::FokNotFilled));
    // Book is unchanged.
    assert_eq!(book.get_best_ask(), Some((dec!(100), dec!(0.5))));
    assert_eq!(book.get_order(&OrderId::from("buy1")), None);
}

#[test]
fn scenario_6_post_only_reject() {
    let book = DefaultOrderBook::new("TEST");
    book.add_order(limit("sell1", Side::Sell, dec!(100), dec!(1), 0.0));
    let mut buy = limit("buy1", Side::Buy, dec!(100), dec!(1), 1.0);
    buy.flags = OrderFlags::POST_ONLY;
    let events = book.add_order(buy);

    assert_eq!(event_types(&events), vec![EventType::Reject]);
    assert_eq!(events[0].reason, Some(RejectReason::PostOnlyWouldMatch));
    assert_eq!(book.get_best_bid(), None);
}

#[test]
fn scenario_7_stp_skip_admits_taker_as_resting() {
    let book = DefaultOrderBook::new("TEST");
    let mut sell1 = limit("sell1", Side::Sell, dec!(100), dec!(1), 0.0);
    sell1.client_id = Some(ClientId::from("alice"));
    book.add_order(sell1);

    let mut buy1 = limit("buy1", Side::Buy, dec!(100), dec!(1), 1.0);
    buy1.client_id = Some(ClientId::from("alice"));
    buy1.flags = OrderFlags::STP;
    let events = book.add_order(buy1);

    assert!(events.iter().all(|e| e.event_type != EventType::Trade));
    assert_eq!(event_types(&events), vec![EventType::New]);
    assert_eq!(book.get_best_bid(), Some((dec!(100), dec!(1))));
    // The skipped maker is popped, not preserved.
    assert_eq!(book.get_order(&OrderId::from("sell1")), None);
    assert_eq!(book.get_best_ask(), None);
}

/// The FOK dry run does not account for self-trade prevention (§9 open
/// question, resolved as "does not honor STP"): a FOK order can under-fill
/// relative to its dry-run estimate when the only eligible liquidity
/// belongs to the same client and STP is set.
#[test]
fn fok_dry_run_ignores_stp_and_can_under_fill() {
    let book = DefaultOrderBook::new("TEST");
    let mut sell1 = limit("sell1", Side::Sell, dec!(100), dec!(1), 0.0);
    sell1.client_id = Some(ClientId::from("alice"));
    book.add_order(sell1);

    let mut buy1 = limit("buy1", Side::Buy, dec!(100), dec!(1), 1.0);
    buy1.client_id = Some(ClientId::from("alice"));
    buy1.flags = OrderFlags::STP;
    buy1.time_in_force = TimeInForce::Fok;
    let events = book.add_order(buy1);

    // The dry run sees 1.0 available and admits the FOK past its check, but
    // the real match then skips the same-client maker (popping it off the
    // book), leaving the taker with nothing to trade against: it is
    // cancelled with IOC_NO_MATCH rather than FOK_NOT_FILLED, and the
    // skipped maker is gone too.
    assert!(events.iter().all(|e| e.event_type != EventType::Trade));
    assert_eq!(event_types(&events), vec![EventType::Cancel]);
    assert_eq!(events[0].reason, Some(RejectReason::IocNoMatch));
    assert_eq!(book.get_order(&OrderId::from("sell1")), None);
    assert_eq!(book.get_order(&OrderId::from("buy1")), None);
    assert_eq!(book.get_best_bid(), None);
    assert_eq!(book.get_best_ask(), None);
}

#[test]
fn cancel_round_trip_restores_prior_book_state() {
    let book = DefaultOrderBook::new("TEST");
    book.add_order(limit("a", Side::Sell, dec!(101), dec!(2), 0.0));
    let before_bid = book.get_best_bid();
    let before_ask = book.get_best_ask();
    let before_depth = book.get_depth(5);

    book.add_order(limit("1", Side::Buy, dec!(100), dec!(1), 1.0));
    book.cancel_order(&OrderId::from("1"), 2.0);

    assert_eq!(book.get_best_bid(), before_bid);
    assert_eq!(book.get_best_ask(), before_ask);
    assert_eq!(book.get_depth(5), before_depth);
    assert_eq!(book.get_order(&OrderId::from("1")), None);
}
