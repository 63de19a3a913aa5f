//! Order Lifecycle
//!
//! Drives one trade intent through buy -> wait for fill -> sell:
//!
//! ```text
//! Pending -> BuyPlaced -> AwaitingFill -> SellPlaced -> Completed
//!    |                         |
//!    +-> Failed(BuyRejected)   +-> Failed(SellRejected | Timeout)
//! ```
//!
//! There is no cancel path. Without a fill timeout the wait is unbounded.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::trade::{
    FailureReason, LifecycleReport, LifecycleState, OrderId, TradeIntent,
};
use crate::ports::{ExecutionPort, NotificationPort};

/// Default open-orders poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Delay between open-orders polls while awaiting the buy fill
    pub poll_interval: Duration,
    /// Give up on the fill after this long (`None` waits forever)
    pub fill_timeout: Option<Duration>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            fill_timeout: None,
        }
    }
}

pub struct OrderLifecycleManager {
    intent: TradeIntent,
    execution: Arc<dyn ExecutionPort>,
    notifier: Arc<dyn NotificationPort>,
    config: LifecycleConfig,
    state: LifecycleState,
    history: Vec<LifecycleState>,
    buy_order: Option<OrderId>,
    sell_order: Option<OrderId>,
}

impl OrderLifecycleManager {
    pub fn new(
        intent: TradeIntent,
        execution: Arc<dyn ExecutionPort>,
        notifier: Arc<dyn NotificationPort>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            intent,
            execution,
            notifier,
            config,
            state: LifecycleState::Pending,
            history: vec![LifecycleState::Pending],
            buy_order: None,
            sell_order: None,
        }
    }

    /// Run to a terminal state
    pub async fn run(mut self) -> LifecycleReport {
        if let Some(buy_id) = self.place_buy().await {
            self.await_fill_and_sell(buy_id).await;
        }
        self.into_report()
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(pair = %self.intent.pair, "Lifecycle {} -> {}", self.state, next);
        self.history.push(next.clone());
        self.state = next;
    }

    /// Pending -> BuyPlaced -> AwaitingFill, or Pending -> Failed(BuyRejected)
    async fn place_buy(&mut self) -> Option<OrderId> {
        let request = self.intent.buy_request();

        match self.execution.place_order(&request).await {
            Ok(id) => {
                tracing::info!(
                    "Buy order placed: {} qty {} @ {} (id {})",
                    request.pair, request.quantity, request.price, id
                );
                self.buy_order = Some(id.clone());
                self.transition(LifecycleState::BuyPlaced);
                self.notifier
                    .send(&format!(
                        "Buy order successfully placed: {} quantity {} price {}",
                        request.pair, request.quantity, request.price
                    ))
                    .await;
                self.transition(LifecycleState::AwaitingFill);
                Some(id)
            }
            Err(rejected) => {
                tracing::warn!("Buy order rejected for {}: {}", request.pair, rejected);
                self.transition(LifecycleState::Failed(FailureReason::BuyRejected(
                    rejected.reason.clone(),
                )));
                self.notifier
                    .send(&format!(
                        "Cannot place buy order for {} (quantity {}, price {}): {}",
                        request.pair, request.quantity, request.price, rejected
                    ))
                    .await;
                None
            }
        }
    }

    /// AwaitingFill -> SellPlaced -> Completed, or a Failed state
    async fn await_fill_and_sell(&mut self, buy_id: OrderId) {
        let filled = match self.config.fill_timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_for_fill(&buy_id))
                .await
                .is_ok(),
            None => {
                self.wait_for_fill(&buy_id).await;
                true
            }
        };

        if !filled {
            tracing::error!(
                "Buy order {} on {} not filled within {:?}",
                buy_id, self.intent.pair, self.config.fill_timeout
            );
            self.transition(LifecycleState::Failed(FailureReason::Timeout));
            self.notifier
                .send(&format!(
                    "Buy order {} on {} was not filled in time, sell order not placed",
                    buy_id, self.intent.pair
                ))
                .await;
            return;
        }

        let request = self.intent.sell_request();
        match self.execution.place_order(&request).await {
            Ok(id) => {
                tracing::info!(
                    "Sell order placed: {} qty {} @ {} (id {})",
                    request.pair, request.quantity, request.price, id
                );
                self.sell_order = Some(id);
                self.transition(LifecycleState::SellPlaced);
                self.notifier
                    .send(&format!(
                        "Sell order successfully placed: {} quantity {} sell price {}",
                        request.pair, request.quantity, request.price
                    ))
                    .await;
                self.transition(LifecycleState::Completed);
            }
            Err(rejected) => {
                tracing::error!("Sell order rejected for {}: {}", request.pair, rejected);
                self.transition(LifecycleState::Failed(FailureReason::SellRejected(
                    rejected.reason.clone(),
                )));
                self.notifier
                    .send(&format!(
                        "Cannot place sell order for {} (quantity {}, price {}): {}",
                        request.pair, request.quantity, request.price, rejected
                    ))
                    .await;
            }
        }
    }

    /// Poll until `buy_id` is no longer among the pair's open orders.
    ///
    /// Other open orders on the same pair are ignored. Query errors are
    /// logged and the poll is retried on the next tick.
    async fn wait_for_fill(&self, buy_id: &OrderId) {
        let pair = &self.intent.pair;
        loop {
            match self.execution.open_orders(pair).await {
                Ok(open) if !open.contains(buy_id) => {
                    tracing::info!("Buy order {} on {} filled", buy_id, pair);
                    return;
                }
                Ok(open) => {
                    tracing::debug!(
                        "Buy order {} on {} still open ({} open orders)",
                        buy_id, pair, open.len()
                    );
                }
                Err(e) => {
                    tracing::warn!("Open orders query failed for {}: {}", pair, e);
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    fn into_report(self) -> LifecycleReport {
        LifecycleReport {
            intent: self.intent,
            buy_order: self.buy_order,
            sell_order: self.sell_order,
            history: self.history,
        }
    }
}
