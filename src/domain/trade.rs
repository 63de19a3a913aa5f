//! Trade intents and order lifecycle states

use std::fmt;

/// Default sell markup over the buy price (+15%)
pub const DEFAULT_SELL_MARKUP: f64 = 1.15;

/// Exchange-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit order request handed to the execution port
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub pair: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
}

impl OrderRequest {
    pub fn buy(pair: &str, quantity: f64, price: f64) -> Self {
        Self {
            pair: pair.to_string(),
            side: OrderSide::Buy,
            quantity,
            price,
        }
    }

    pub fn sell(pair: &str, quantity: f64, price: f64) -> Self {
        Self {
            pair: pair.to_string(),
            side: OrderSide::Sell,
            quantity,
            price,
        }
    }
}

/// A trade that passed every gate, consumed once by a lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub pair: String,
    /// Buy limit price (best bid at decision time)
    pub reference_price: f64,
    pub quantity: f64,
    /// Sell limit price placed after the buy fills
    pub sell_price: f64,
}

impl TradeIntent {
    pub fn new(pair: &str, reference_price: f64, quantity: f64, sell_markup: f64) -> Self {
        Self {
            pair: pair.to_string(),
            reference_price,
            quantity,
            sell_price: reference_price * sell_markup,
        }
    }

    pub fn buy_request(&self) -> OrderRequest {
        OrderRequest::buy(&self.pair, self.quantity, self.reference_price)
    }

    pub fn sell_request(&self) -> OrderRequest {
        OrderRequest::sell(&self.pair, self.quantity, self.sell_price)
    }
}

/// Why a lifecycle ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    BuyRejected(String),
    SellRejected(String),
    /// Buy never left the open orders before the fill timeout
    Timeout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::BuyRejected(reason) => write!(f, "buy rejected: {}", reason),
            FailureReason::SellRejected(reason) => write!(f, "sell rejected: {}", reason),
            FailureReason::Timeout => write!(f, "buy order not filled before timeout"),
        }
    }
}

/// Per-trade order lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    BuyPlaced,
    AwaitingFill,
    SellPlaced,
    Failed(FailureReason),
    Completed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Failed(_) | LifecycleState::Completed)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: &LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Pending, BuyPlaced)
                | (Pending, Failed(FailureReason::BuyRejected(_)))
                | (BuyPlaced, AwaitingFill)
                | (AwaitingFill, SellPlaced)
                | (AwaitingFill, Failed(FailureReason::Timeout))
                | (AwaitingFill, Failed(FailureReason::SellRejected(_)))
                | (SellPlaced, Completed)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Pending => write!(f, "Pending"),
            LifecycleState::BuyPlaced => write!(f, "BuyPlaced"),
            LifecycleState::AwaitingFill => write!(f, "AwaitingFill"),
            LifecycleState::SellPlaced => write!(f, "SellPlaced"),
            LifecycleState::Failed(reason) => write!(f, "Failed({})", reason),
            LifecycleState::Completed => write!(f, "Completed"),
        }
    }
}

/// Outcome of a finished lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleReport {
    pub intent: TradeIntent,
    pub buy_order: Option<OrderId>,
    pub sell_order: Option<OrderId>,
    /// Every state visited, `Pending` first, terminal state last
    pub history: Vec<LifecycleState>,
}

impl LifecycleReport {
    pub fn final_state(&self) -> &LifecycleState {
        self.history.last().unwrap_or(&LifecycleState::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.final_state(), LifecycleState::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_intent_sell_price_uses_markup() {
        let intent = TradeIntent::new("DOGEUSDT", 0.2, 100.0, DEFAULT_SELL_MARKUP);
        assert_relative_eq!(intent.sell_price, 0.23, epsilon = 1e-12);
        assert_eq!(intent.buy_request().side, OrderSide::Buy);
        assert_eq!(intent.sell_request().price, intent.sell_price);
    }

    #[test]
    fn test_transitions() {
        use LifecycleState::*;
        assert!(Pending.can_transition_to(&BuyPlaced));
        assert!(Pending.can_transition_to(&Failed(FailureReason::BuyRejected("x".into()))));
        assert!(!Pending.can_transition_to(&SellPlaced));
        assert!(AwaitingFill.can_transition_to(&Failed(FailureReason::Timeout)));
        assert!(!Completed.can_transition_to(&Pending));
        assert!(Completed.is_terminal());
        assert!(!AwaitingFill.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
        assert_eq!(
            LifecycleState::Failed(FailureReason::SellRejected("LOT_SIZE".into())).to_string(),
            "Failed(sell rejected: LOT_SIZE)"
        );
    }
}
