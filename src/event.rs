//! The event vocabulary emitted by [`crate::orderbook::OrderBook`] mutations.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::OrderId;

/// The kind of state transition an [`Event`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A new order was admitted and now rests on the book (wholly or in part).
    New,
    /// Two orders matched; one event is emitted per fill.
    Trade,
    /// An order was cancelled on request or by policy.
    Cancel,
    /// An order reached zero remaining quantity.
    Done,
    /// An order was rejected during admission and never entered the book.
    Reject,
    /// A resting order had its price and/or quantity amended.
    Amend,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::New => "NEW",
            EventType::Trade => "TRADE",
            EventType::Cancel => "CANCEL",
            EventType::Done => "DONE",
            EventType::Reject => "REJECT",
            EventType::Amend => "AMEND",
        };
        write!(f, "{s}")
    }
}

/// The fixed reason-code vocabulary for `REJECT` and policy-driven `CANCEL`
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// `quantity <= 0` on admission.
    InvalidQuantity,
    /// Non-positive LIMIT price.
    InvalidPrice,
    /// LIMIT order submitted without a price.
    LimitOrderMustHavePrice,
    /// `POST_ONLY` order would have crossed the book.
    PostOnlyWouldMatch,
    /// IOC order produced no fills at all.
    IocNoMatch,
    /// IOC order's unfilled residual was cancelled.
    IocRemaining,
    /// FOK order could not be filled completely and immediately.
    FokNotFilled,
    /// Referenced order id is not known to the book.
    OrderNotFound,
    /// Order id was known but removal from its resting side failed.
    OrderNotFoundInBook,
    /// Defensive cancel of an order that was never resident in the book.
    MarketOrderCancel,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::InvalidQuantity => "INVALID_QUANTITY",
            RejectReason::InvalidPrice => "INVALID_PRICE",
            RejectReason::LimitOrderMustHavePrice => "LIMIT_ORDER_MUST_HAVE_PRICE",
            RejectReason::PostOnlyWouldMatch => "POST_ONLY_WOULD_MATCH",
            RejectReason::IocNoMatch => "IOC_NO_MATCH",
            RejectReason::IocRemaining => "IOC_REMAINING",
            RejectReason::FokNotFilled => "FOK_NOT_FILLED",
            RejectReason::OrderNotFound => "ORDER_NOT_FOUND",
            RejectReason::OrderNotFoundInBook => "ORDER_NOT_FOUND_IN_BOOK",
            RejectReason::MarketOrderCancel => "MARKET_ORDER_CANCEL",
        };
        write!(f, "{s}")
    }
}

/// A single state-transition record emitted by the order book.
///
/// Exactly one `Event` is produced per trade leg, per admission outcome and
/// per terminal state change, so the sequence returned from one call to
/// `add_order`/`cancel_order`/`amend_order` fully describes its effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// What kind of transition this is.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// The order this event is primarily about.
    pub order_id: OrderId,
    /// For `Trade` events, the order on the other side of the fill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_order_id: Option<OrderId>,
    /// Execution price (`Trade`) or the order's limit price (`Amend`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Quantity filled (`Trade`) or the new quantity (`Amend`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// Present on `Reject` and on policy-driven `Cancel`/`Done` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Caller-supplied timestamp this event is associated with.
    pub timestamp: f64,
}

impl Event {
    pub(crate) fn new(event_type: EventType, order_id: OrderId, timestamp: f64) -> Self {
        Event {
            event_type,
            order_id,
            matched_order_id: None,
            price: None,
            quantity: None,
            reason: None,
            timestamp,
        }
    }

    pub(crate) fn reject(order_id: OrderId, reason: RejectReason, timestamp: f64) -> Self {
        Event {
            reason: Some(reason),
            ..Event::new(EventType::Reject, order_id, timestamp)
        }
    }

    pub(crate) fn cancel(order_id: OrderId, reason: Option<RejectReason>, timestamp: f64) -> Self {
        Event {
            reason,
            ..Event::new(EventType::Cancel, order_id, timestamp)
        }
    }

    pub(crate) fn done(order_id: OrderId, timestamp: f64) -> Self {
        Event::new(EventType::Done, order_id, timestamp)
    }

    pub(crate) fn new_resting(order_id: OrderId, timestamp: f64) -> Self {
        Event::new(EventType::New, order_id, timestamp)
    }

    pub(crate) fn trade(
        taker_id: OrderId,
        maker_id: OrderId,
        price: Decimal,
        quantity: Decimal,
        timestamp: f64,
    ) -> Self {
        Event {
            matched_order_id: Some(maker_id),
            price: Some(price),
            quantity: Some(quantity),
            ..Event::new(EventType::Trade, taker_id, timestamp)
        }
    }

    pub(crate) fn amend(
        order_id: OrderId,
        price: Decimal,
        quantity: Decimal,
        timestamp: f64,
    ) -> Self {
        Event {
            price: Some(price),
            quantity: Some(quantity),
            ..Event::new(EventType::Amend, order_id, timestamp)
        }
    }
}
