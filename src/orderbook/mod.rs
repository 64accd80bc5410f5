//! The order book: matching engine and admission policy.
//!
//! Concurrency discipline: every mutating call (`add_order`, `cancel_order`,
//! `amend_order`) takes [`OrderBook`]'s reentrant mutex for its full
//! duration and runs to completion before returning its event sequence —
//! no suspension point exists anywhere in that critical section. Readers
//! (`get_best_bid`, `get_depth`, `get_order`, `get_stats`) either consult
//! the lock-free id index directly or briefly take a [`crate::price_levels::PriceLevels`]'s
//! own reentrant lock, and always observe a consistent snapshot because
//! cache invalidation happens on the same write path that mutates the
//! underlying queue.
//!
//! All admission and policy outcomes (rejected orders, cancels, unfilled
//! FOKs, ...) are reported as [`crate::event::Event`] values, never as an
//! out-of-band error type — see §7 of the design notes.

mod book;

pub use book::{BookStats, OrderBook};
