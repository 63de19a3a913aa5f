//! Paper Exchange
//!
//! In-memory execution and balance ports for dry runs. Limit orders fill
//! immediately at their limit price, so they never show up as open.
//! Balances are debited and credited in the quote asset and the pair's base asset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::trade::{OrderId, OrderRequest, OrderSide};
use crate::ports::{BalanceError, BalancePort, ExecutionError, ExecutionPort, OrderRejected};

/// A simulated fill
#[derive(Debug, Clone, PartialEq)]
pub struct PaperFill {
    pub order_id: OrderId,
    pub pair: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub filled_at: DateTime<Utc>,
}

impl PaperFill {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<String, f64>,
    fills: Vec<PaperFill>,
}

#[derive(Debug)]
pub struct PaperExchange {
    quote_asset: String,
    ledger: Mutex<Ledger>,
    next_id: AtomicU64,
}

impl PaperExchange {
    pub fn new(quote_asset: impl Into<String>, starting_quote: f64) -> Self {
        let quote_asset = quote_asset.into().to_uppercase();
        let mut balances = HashMap::new();
        balances.insert(quote_asset.clone(), starting_quote);
        Self {
            quote_asset,
            ledger: Mutex::new(Ledger {
                balances,
                fills: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn quote_asset(&self) -> &str {
        &self.quote_asset
    }

    /// "DOGEUSDT" with quote "USDT" -> "DOGE"
    pub fn base_asset<'a>(&self, pair: &'a str) -> Option<&'a str> {
        let quote_len = self.quote_asset.len();
        if pair.len() <= quote_len || !pair.is_char_boundary(pair.len() - quote_len) {
            return None;
        }
        let (base, quote) = pair.split_at(pair.len() - quote_len);
        quote.eq_ignore_ascii_case(&self.quote_asset).then_some(base)
    }

    pub async fn fills(&self) -> Vec<PaperFill> {
        self.ledger.lock().await.fills.clone()
    }

    pub async fn balances(&self) -> HashMap<String, f64> {
        self.ledger.lock().await.balances.clone()
    }

    fn next_order_id(&self) -> OrderId {
        OrderId::new(format!("paper-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
    }
}

#[async_trait]
impl ExecutionPort for PaperExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, OrderRejected> {
        if request.quantity <= 0.0 || !request.quantity.is_finite() {
            return Err(OrderRejected::new(format!(
                "Invalid quantity {}",
                request.quantity
            )));
        }
        if request.price <= 0.0 || !request.price.is_finite() {
            return Err(OrderRejected::new(format!("Invalid price {}", request.price)));
        }
        let base = self.base_asset(&request.pair).ok_or_else(|| {
            OrderRejected::new(format!(
                "{} is not quoted in {}",
                request.pair, self.quote_asset
            ))
        })?;
        let base = base.to_uppercase();
        let notional = request.quantity * request.price;

        let mut ledger = self.ledger.lock().await;
        let (debit_asset, debit, credit_asset, credit) = match request.side {
            OrderSide::Buy => (self.quote_asset.clone(), notional, base, request.quantity),
            OrderSide::Sell => (base, request.quantity, self.quote_asset.clone(), notional),
        };

        let available = ledger.balances.get(&debit_asset).copied().unwrap_or(0.0);
        if available < debit {
            return Err(OrderRejected::new(format!(
                "Account has insufficient balance for requested action ({} {} < {})",
                debit_asset, available, debit
            )));
        }

        *ledger.balances.entry(debit_asset).or_insert(0.0) -= debit;
        *ledger.balances.entry(credit_asset).or_insert(0.0) += credit;

        let order_id = self.next_order_id();
        info!(
            "[PAPER] {} {} {} @ {} filled ({})",
            request.side.as_str(),
            request.quantity,
            request.pair,
            request.price,
            order_id
        );
        ledger.fills.push(PaperFill {
            order_id: order_id.clone(),
            pair: request.pair.clone(),
            side: request.side,
            quantity: request.quantity,
            price: request.price,
            filled_at: Utc::now(),
        });

        Ok(order_id)
    }

    async fn open_orders(&self, _pair: &str) -> Result<Vec<OrderId>, ExecutionError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl BalancePort for PaperExchange {
    async fn balance(&self, asset: &str) -> Result<f64, BalanceError> {
        self.ledger
            .lock()
            .await
            .balances
            .get(&asset.to_uppercase())
            .copied()
            .ok_or_else(|| BalanceError::UnknownAsset(asset.to_string()))
    }
}
