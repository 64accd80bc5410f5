//! Historical-data replay: feeds a recorded event stream into an
//! [`OrderBook`], optionally paced to wall-clock time.

use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use crate::order::{Order, OrderFlags, OrderId, OrderType, Side, TimeInForce};
use crate::orderbook::OrderBook;

/// The kind of historical record replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMsgType {
    /// A new limit order entering the book.
    New,
    /// A cancellation of a previously-submitted order.
    Cancel,
}

/// One row of a historical order-flow recording.
#[derive(Debug, Clone)]
pub struct ReplayRecord {
    /// Event time, in seconds.
    pub timestamp: f64,
    /// NEW or CANCEL.
    pub msg_type: ReplayMsgType,
    /// Present for NEW rows.
    pub side: Option<Side>,
    /// Present for NEW rows.
    pub price: Option<Decimal>,
    /// Present for NEW rows.
    pub qty: Option<Decimal>,
    /// Always present.
    pub order_id: OrderId,
}

/// Aggregate counters produced by a replay run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayStats {
    /// Total number of records submitted to the book (NEW + CANCEL).
    pub total_events: u64,
    /// Number of trade fills observed across the replay.
    pub trades: u64,
    /// Cumulative traded quantity.
    pub volume: Decimal,
    /// Smallest trade execution price observed, if any trade occurred.
    pub min_trade_price: Option<Decimal>,
    /// Largest trade execution price observed, if any trade occurred.
    pub max_trade_price: Option<Decimal>,
    sum_trade_price: Decimal,
}

impl ReplayStats {
    /// Arithmetic mean of trade execution prices, weighted by event count
    /// (not by volume).
    pub fn avg_trade_price(&self) -> Option<Decimal> {
        if self.trades == 0 {
            None
        } else {
            Some(self.sum_trade_price / Decimal::from(self.trades))
        }
    }

    fn record_trade(&mut self, price: Decimal, qty: Decimal) {
        self.trades += 1;
        self.volume += qty;
        self.sum_trade_price += price;
        self.min_trade_price = Some(self.min_trade_price.map_or(price, |m| m.min(price)));
        self.max_trade_price = Some(self.max_trade_price.map_or(price, |m| m.max(price)));
    }
}

/// Drives a historical record stream into an [`OrderBook`].
pub struct ReplayEngine {
    /// Wall-clock replay speed multiplier. `0` (or negative) runs as fast
    /// as possible with no pacing; `1.0` paces to real time; values above
    /// `1.0` replay faster than real time.
    pub speed: f64,
}

impl ReplayEngine {
    /// Creates an engine with the given pacing speed.
    pub fn new(speed: f64) -> Self {
        ReplayEngine { speed }
    }

    /// Runs an already-parsed record stream against `book`, sorting by
    /// timestamp first. `T` must implement [`Default`] since NEW rows do
    /// not carry caller metadata.
    pub fn run<T: Default>(
        &self,
        book: &OrderBook<T>,
        records: impl IntoIterator<Item = ReplayRecord>,
    ) -> ReplayStats {
        let mut records: Vec<ReplayRecord> = records.into_iter().collect();
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let mut stats = ReplayStats::default();
        let mut last_ts: Option<f64> = None;
        for record in records {
            if self.speed > 0.0 {
                if let Some(prev) = last_ts {
                    let dt = (record.timestamp - prev).max(0.0);
                    if dt > 0.0 {
                        thread::sleep(Duration::from_secs_f64(dt / self.speed));
                    }
                }
            }
            last_ts = Some(record.timestamp);
            stats.total_events += 1;

            match record.msg_type {
                ReplayMsgType::New => {
                    let (Some(side), Some(price), Some(qty)) = (record.side, record.price, record.qty)
                    else {
                        continue;
                    };
                    let order = Order {
                        order_id: record.order_id,
                        client_id: None,
                        side,
                        order_type: OrderType::Limit,
                        price: Some(price),
                        quantity: qty,
                        remaining_quantity: qty,
                        time_in_force: TimeInForce::Gtc,
                        flags: OrderFlags::empty(),
                        timestamp: record.timestamp,
                        user_data: T::default(),
                    };
                    for event in book.add_order(order) {
                        if event.event_type == crate::event::EventType::Trade {
                            if let (Some(price), Some(qty)) = (event.price, event.quantity) {
                                stats.record_trade(price, qty);
                            }
                        }
                    }
                }
                ReplayMsgType::Cancel => {
                    book.cancel_order(&record.order_id, record.timestamp);
                }
            }
        }
        stats
    }

    /// Parses a CSV file into [`ReplayRecord`]s and runs it. Rows missing
    /// `order_id`, with an unrecognised `msg_type`, or with unparseable
    /// numeric fields on a NEW row are skipped.
    pub fn run_from_csv<T: Default>(
        &self,
        book: &OrderBook<T>,
        path: impl AsRef<std::path::Path>,
    ) -> csv::Result<ReplayStats> {
        let records = parse_csv(path)?;
        Ok(self.run(book, records))
    }
}

fn parse_csv(path: impl AsRef<std::path::Path>) -> csv::Result<Vec<ReplayRecord>> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        match parse_row(&row, reader.headers()?) {
            Some(record) => records.push(record),
            None => warn!(row = ?row, "skipping malformed replay row"),
        }
    }
    Ok(records)
}

fn parse_row(row: &csv::StringRecord, headers: &csv::StringRecord) -> Option<ReplayRecord> {
    let get = |key: &str| headers.iter().position(|h| h == key).and_then(|i| row.get(i));

    let order_id = get("order_id").filter(|s| !s.is_empty())?;
    let msg_type = match get("msg_type")?.to_ascii_uppercase().as_str() {
        "NEW" => ReplayMsgType::New,
        "CANCEL" => ReplayMsgType::Cancel,
        _ => return None,
    };
    let timestamp = parse_timestamp(get("ts")?)?;

    if msg_type == ReplayMsgType::Cancel {
        return Some(ReplayRecord {
            timestamp,
            msg_type,
            side: None,
            price: None,
            qty: None,
            order_id: OrderId::from(order_id),
        });
    }

    let side = match get("side")?.to_ascii_uppercase().as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        _ => return None,
    };
    let price: Decimal = get("price")?.parse().ok()?;
    let qty: Decimal = get("qty")?.parse().ok()?;

    Some(ReplayRecord {
        timestamp,
        msg_type,
        side: Some(side),
        price: Some(price),
        qty: Some(qty),
        order_id: OrderId::from(order_id),
    })
}

fn parse_timestamp(raw: &str) -> Option<f64> {
    if let Ok(seconds) = raw.parse::<f64>() {
        return Some(seconds);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
}
