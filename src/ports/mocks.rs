//! In-memory port implementations that record calls and return scripted
//! responses. Used by unit and integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::balance::{BalanceError, BalancePort};
use super::execution::{ExecutionError, ExecutionPort, OrderRejected};
use super::market_data::{MarketDataError, MarketDataPort};
use super::notifier::NotificationPort;
use super::text_source::{SourceError, TextEvent, TextEventSource};
use crate::domain::trade::{OrderId, OrderRequest, OrderSide};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock market data with fixed (bid, average) quotes per pair
#[derive(Debug, Default, Clone)]
pub struct MockMarketData {
    calls: Arc<Mutex<Vec<String>>>,
    quotes: Arc<Mutex<HashMap<String, (f64, f64)>>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set best bid and average price for a pair
    pub fn with_quote(self, pair: &str, best_bid: f64, average_price: f64) -> Self {
        lock(&self.quotes).insert(pair.to_string(), (best_bid, average_price));
        self
    }

    /// Recorded calls as "method:PAIR"
    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn quote(&self, method: &str, pair: &str) -> Result<(f64, f64), MarketDataError> {
        lock(&self.calls).push(format!("{}:{}", method, pair));
        lock(&self.quotes)
            .get(pair)
            .copied()
            .ok_or_else(|| MarketDataError::UnknownPair(pair.to_string()))
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn best_bid(&self, pair: &str) -> Result<f64, MarketDataError> {
        self.quote("best_bid", pair).map(|(bid, _)| bid)
    }

    async fn average_price(&self, pair: &str) -> Result<f64, MarketDataError> {
        self.quote("average_price", pair).map(|(_, avg)| avg)
    }
}

/// Mock execution port.
///
/// Orders are accepted with sequential ids (`order-1`, `order-2`, ...) unless a
/// rejection is scripted for that side. `open_orders` answers from a script of
/// snapshots, one per poll; once the script is exhausted it reports no open
/// orders.
#[derive(Debug, Default, Clone)]
pub struct MockExecution {
    placed: Arc<Mutex<Vec<OrderRequest>>>,
    rejections: Arc<Mutex<HashMap<&'static str, String>>>,
    open_snapshots: Arc<Mutex<VecDeque<Vec<String>>>>,
    polls: Arc<Mutex<usize>>,
    next_id: Arc<Mutex<u64>>,
    stuck: Arc<Mutex<bool>>,
    failing_polls: Arc<Mutex<usize>>,
}

impl MockExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every order of `side` with `reason`
    pub fn rejecting(self, side: OrderSide, reason: &str) -> Self {
        lock(&self.rejections).insert(side.as_str(), reason.to_string());
        self
    }

    /// Queue an open-orders snapshot returned by the next poll
    pub fn with_open_orders(self, ids: &[&str]) -> Self {
        lock(&self.open_snapshots).push_back(ids.iter().map(|s| s.to_string()).collect());
        self
    }

    /// The next `count` polls fail with an API error
    pub fn failing_polls(self, count: usize) -> Self {
        *lock(&self.failing_polls) = count;
        self
    }

    /// Every placed order stays open forever
    pub fn never_filling(self) -> Self {
        *lock(&self.stuck) = true;
        self
    }

    /// Orders accepted or rejected, in submission order
    pub fn get_placed(&self) -> Vec<OrderRequest> {
        lock(&self.placed).clone()
    }

    pub fn get_poll_count(&self) -> usize {
        *lock(&self.polls)
    }
}

#[async_trait]
impl ExecutionPort for MockExecution {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, OrderRejected> {
        lock(&self.placed).push(request.clone());
        if let Some(reason) = lock(&self.rejections).get(request.side.as_str()) {
            return Err(OrderRejected::new(reason.clone()));
        }
        let mut next = lock(&self.next_id);
        *next += 1;
        Ok(OrderId::new(format!("order-{}", *next)))
    }

    async fn open_orders(&self, _pair: &str) -> Result<Vec<OrderId>, ExecutionError> {
        *lock(&self.polls) += 1;
        {
            let mut failing = lock(&self.failing_polls);
            if *failing > 0 {
                *failing -= 1;
                return Err(ExecutionError::ApiError("503 Service Unavailable".into()));
            }
        }
        if *lock(&self.stuck) {
            let placed = lock(&self.placed).len() as u64;
            return Ok((1..=placed).map(|n| OrderId::new(format!("order-{}", n))).collect());
        }
        let snapshot = lock(&self.open_snapshots).pop_front().unwrap_or_default();
        Ok(snapshot.into_iter().map(OrderId::new).collect())
    }
}

/// Mock balance port
#[derive(Debug, Default, Clone)]
pub struct MockBalance {
    calls: Arc<Mutex<Vec<String>>>,
    balances: Arc<Mutex<HashMap<String, f64>>>,
}

impl MockBalance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, asset: &str, amount: f64) -> Self {
        lock(&self.balances).insert(asset.to_string(), amount);
        self
    }

    pub fn get_calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BalancePort for MockBalance {
    async fn balance(&self, asset: &str) -> Result<f64, BalanceError> {
        lock(&self.calls).push(asset.to_string());
        lock(&self.balances)
            .get(asset)
            .copied()
            .ok_or_else(|| BalanceError::UnknownAsset(asset.to_string()))
    }
}

/// Notifier that keeps every message
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn send(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}

/// Source that replays a fixed list of events then closes
#[derive(Debug, Default, Clone)]
pub struct MockTextSource {
    events: Vec<TextEvent>,
}

impl MockTextSource {
    pub fn new(events: Vec<TextEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl TextEventSource for MockTextSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<TextEvent>, SourceError> {
        let (tx, rx) = mpsc::channel(self.events.len().max(1));
        for event in self.events.iter().cloned() {
            // capacity covers every event
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }
}
