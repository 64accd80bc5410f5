//! # lob-core
//!
//! A single-symbol limit order book with price-time priority matching, built
//! around a sorted-vector price ladder and an id-indexed order table rather
//! than a balanced tree or a lock-free skip list.
//!
//! ## Architecture
//!
//! - [`order`] — order identifiers, admission flags (`POST_ONLY`, `STP`) and
//!   the resting-order record, generic over a caller-supplied metadata type.
//! - [`event`] — the event-sourcing vocabulary: every admission outcome,
//!   trade leg and terminal transition is exactly one [`event::Event`], never
//!   a return-value special case.
//! - [`price_levels`] — a single book side (bids or asks): a sorted vector of
//!   price levels, each a FIFO queue of orders, with a cached best price.
//! - [`orderbook`] — [`orderbook::OrderBook`], the matching engine: admission
//!   policy (time-in-force, `POST_ONLY`, self-trade prevention), matching,
//!   cancellation and amendment.
//! - [`strategy`] — execution strategies (TWAP, VWAP, an inventory-managed
//!   market maker) that observe the book and submit child orders.
//! - [`replay`] — replays a recorded or CSV-sourced historical order-flow
//!   stream into an `OrderBook`.
//! - [`backtest`] — drives a [`strategy::Strategy`] against a historical
//!   replay and scores its execution (fill rate, slippage, PnL).
//!
//! ## Concurrency
//!
//! Each [`orderbook::OrderBook`] serialises its mutating operations through a
//! single reentrant mutex, so `amend_order`'s cancel-then-resubmit path can
//! safely re-enter `add_order`/`cancel_order` without deadlocking. Each
//! [`price_levels::PriceLevels`] side carries its own reentrant mutex for
//! direct introspection. Numerics use [`rust_decimal::Decimal`] throughout;
//! no floating point ever represents a price or a quantity.

pub mod backtest;
pub mod event;
pub mod order;
pub mod orderbook;
pub mod prelude;
pub mod price_levels;
pub mod replay;
pub mod strategy;

pub use event::{Event, EventType, RejectReason};
pub use order::{ClientId, Order, OrderFlags, OrderId, OrderType, Side, TimeInForce};
pub use orderbook::{BookStats, OrderBook};

/// `OrderBook<()>`, the common case where orders carry no caller metadata.
pub type DefaultOrderBook = OrderBook<()>;
