//! Order identifiers, enums and the resting-order record.

use serde::{Deserialize, Serialize};
use std::fmt;

use bitflags::bitflags;
use rust_decimal::Decimal;

/// Identifier for an order. Accepts either an integer or a short text form,
/// matching the flexible `order_id` representation used by exchange feeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Mints a fresh, process-unique order id, used by strategies that
    /// generate their own orders rather than replaying externally-assigned
    /// ids.
    pub fn generate() -> Self {
        OrderId(uuid::Uuid::new_v4().to_string())
    }

    /// Borrows the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for OrderId {
    fn from(value: u64) -> Self {
        OrderId(value.to_string())
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        OrderId(value.to_string())
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        OrderId(value)
    }
}

/// Identifier for the originating client/account of an order, used for
/// self-trade prevention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        ClientId(value.to_string())
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        ClientId(value)
    }
}

/// Which book side an order rests on or targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

impl Side {
    /// The opposite side.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// LIMIT orders rest on the book when unfilled; MARKET orders never rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// A priced order that may post to the book.
    Limit,
    /// An unpriced order that consumes resting liquidity only.
    Market,
}

/// Admission policy controlling how much of an order must fill immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-till-cancel: the unfilled remainder rests on the book.
    Gtc,
    /// Immediate-or-cancel: fill what is immediately available, cancel the rest.
    Ioc,
    /// Fill-or-kill: fill completely and immediately, or reject entirely.
    Fok,
}

bitflags! {
    /// Per-order admission flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct OrderFlags: u8 {
        /// Reject the order instead of allowing it to take liquidity.
        const POST_ONLY = 0b0000_0001;
        /// Skip matches against resting orders from the same client.
        const STP = 0b0000_0010;
    }
}

impl Default for OrderFlags {
    fn default() -> Self {
        OrderFlags::empty()
    }
}

/// A single order, either newly submitted or resting on the book.
///
/// `T` carries caller-defined metadata alongside the order (for example
/// [`crate::strategy::StrategyMeta`] when the order originates from a
/// strategy); it is otherwise opaque to the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Order<T = ()> {
    /// Unique id for this order.
    pub order_id: OrderId,
    /// Originating client, used for self-trade prevention.
    pub client_id: Option<ClientId>,
    /// Buy or sell.
    pub side: Side,
    /// Limit or market.
    pub order_type: OrderType,
    /// Limit price. Always present for `LIMIT` orders; absent for `MARKET`.
    pub price: Option<Decimal>,
    /// Original order quantity.
    pub quantity: Decimal,
    /// Quantity not yet filled or cancelled.
    pub remaining_quantity: Decimal,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Admission flags.
    pub flags: OrderFlags,
    /// Caller-supplied timestamp (seconds), used for pacing and bookkeeping.
    /// Never consulted against a wall clock by the matching engine.
    pub timestamp: f64,
    /// Opaque caller metadata.
    pub user_data: T,
}

impl<T> Order<T> {
    /// True once `remaining_quantity` has reached zero.
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity <= Decimal::ZERO
    }

    /// True when the order carries the given flag.
    pub fn has_flag(&self, flag: OrderFlags) -> bool {
        self.flags.contains(flag)
    }
}
