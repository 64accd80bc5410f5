//! Re-exports the most commonly used types for working with this crate.
//!
//! ```rust
//! use lob_core::prelude::*;
//! ```

pub use crate::backtest::{BacktestEngine, BacktestResult};
pub use crate::event::{Event, EventType, RejectReason};
pub use crate::order::{ClientId, Order, OrderFlags, OrderId, OrderType, Side, TimeInForce};
pub use crate::orderbook::{BookStats, OrderBook};
pub use crate::price_levels::PriceLevels;
pub use crate::replay::{ReplayEngine, ReplayMsgType, ReplayRecord, ReplayStats};
pub use crate::strategy::{
    MarketMakerStrategy, Strategy, StrategyAction, StrategyBook, StrategyMeta, StrategyOrder,
    TwapStrategy, VwapStrategy,
};

pub use crate::DefaultOrderBook;
