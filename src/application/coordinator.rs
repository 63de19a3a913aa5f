//! Trade Coordinator
//!
//! Turns followed posts into trades. Each event goes through a chain of gates
//! and either stops quietly or hands a `TradeIntent` to a background
//! lifecycle:
//!
//! 1. coin keyword match
//! 2. sentiment
//! 3. market volatility (best bid vs average price)
//! 4. sizing from the quote balance
//! 5. spawn the buy -> sell lifecycle, return immediately

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::domain::{
    CoinMatcher, MarketGuard, OrderSizer, SentimentClassifier, TradeIntent, DEFAULT_SELL_MARKUP,
};
use crate::ports::{
    BalancePort, ExecutionPort, MarketDataPort, NotificationPort, SourceError, TextEvent,
    TextEventSource,
};

use super::lifecycle::{LifecycleConfig, OrderLifecycleManager};
use super::pair_guard::PairGuard;
use super::supervisor::LifecycleSupervisor;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Text source error: {0}")]
    SourceError(#[from] SourceError),
}

/// What happened to a single event
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// No tracked keyword in the text
    NoMatch,
    /// Text classified negative
    NegativeSentiment { pair: String },
    /// Another lifecycle holds the pair
    PairBusy { pair: String },
    /// Best bid too far from the average price
    VolatilityRejected { pair: String, deviation: f64 },
    /// Bid/average unavailable or malformed
    MarketDataFailed { pair: String, reason: String },
    /// Balance lookup failed
    BalanceFailed { pair: String, reason: String },
    /// Lifecycle spawned for this intent
    Dispatched(TradeIntent),
}

/// Trading parameters the coordinator applies to every event
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Asset whose free balance funds buys (e.g. "USDT")
    pub quote_asset: String,
    pub allocation_fraction: f64,
    pub sell_markup: f64,
    pub acceptance_threshold: f64,
    pub one_lifecycle_per_pair: bool,
    pub lifecycle: LifecycleConfig,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            quote_asset: "USDT".to_string(),
            allocation_fraction: crate::domain::DEFAULT_ALLOCATION_FRACTION,
            sell_markup: DEFAULT_SELL_MARKUP,
            acceptance_threshold: crate::domain::DEFAULT_ACCEPTANCE_THRESHOLD,
            one_lifecycle_per_pair: false,
            lifecycle: LifecycleConfig::default(),
        }
    }
}

/// Exchange and notification collaborators
#[derive(Clone)]
pub struct TradingPorts {
    pub market: Arc<dyn MarketDataPort>,
    pub execution: Arc<dyn ExecutionPort>,
    pub balance: Arc<dyn BalancePort>,
    pub notifier: Arc<dyn NotificationPort>,
}

#[derive(Clone)]
pub struct TradeCoordinator {
    matcher: Arc<CoinMatcher>,
    classifier: SentimentClassifier,
    guard: MarketGuard,
    sizer: OrderSizer,
    ports: TradingPorts,
    settings: CoordinatorSettings,
    supervisor: LifecycleSupervisor,
    pair_guard: Option<PairGuard>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl TradeCoordinator {
    pub fn new(
        matcher: CoinMatcher,
        classifier: SentimentClassifier,
        ports: TradingPorts,
        settings: CoordinatorSettings,
    ) -> Self {
        let guard =
            MarketGuard::with_threshold(Arc::clone(&ports.market), settings.acceptance_threshold);
        let sizer = OrderSizer::new(settings.allocation_fraction);
        let pair_guard = settings.one_lifecycle_per_pair.then(PairGuard::new);
        let (shutdown, _) = watch::channel(false);

        Self {
            matcher: Arc::new(matcher),
            classifier,
            guard,
            sizer,
            ports,
            settings,
            supervisor: LifecycleSupervisor::new(),
            pair_guard,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn supervisor(&self) -> &LifecycleSupervisor {
        &self.supervisor
    }

    /// Run the gates for one event; spawns a lifecycle when all pass.
    pub async fn on_text_event(&self, event: &TextEvent) -> EventOutcome {
        // 1. coin
        let Some(pair) = self.matcher.find_pair(&event.text) else {
            tracing::debug!("No tracked coin in post from {}", event.author_id);
            return EventOutcome::NoMatch;
        };
        let pair = pair.to_string();
        tracing::info!("Post from {} mentions {}: {}", event.author_id, pair, event.text);

        // 2. sentiment
        let score = self.classifier.score(&event.text);
        if !score.sentiment().is_positive() {
            tracing::info!(
                "Negative sentiment for {} (base {:.3}, penalty {}), skipping",
                pair, score.base, score.penalty
            );
            return EventOutcome::NegativeSentiment { pair };
        }
        tracing::info!(
            "Positive sentiment for {} (base {:.3}, penalty {})",
            pair, score.base, score.penalty
        );

        let lease = match &self.pair_guard {
            Some(guard) => match guard.try_acquire(&pair) {
                Some(lease) => Some(lease),
                None => {
                    tracing::warn!("Lifecycle already running for {}, skipping", pair);
                    return EventOutcome::PairBusy { pair };
                }
            },
            None => None,
        };

        // 3. volatility
        let snapshot = match self.guard.evaluate(&pair).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!("Market data unavailable for {}: {}", pair, e);
                self.ports
                    .notifier
                    .send(&format!("No trade on {}: market data error: {}", pair, e))
                    .await;
                return EventOutcome::MarketDataFailed {
                    pair,
                    reason: e.to_string(),
                };
            }
        };
        if !snapshot.safe {
            tracing::warn!(
                "Volatility too high on {}: bid {} vs average {} ({:.3}% >= {:.3}%)",
                pair,
                snapshot.best_bid,
                snapshot.average_price,
                snapshot.deviation * 100.0,
                self.guard.threshold() * 100.0
            );
            self.ports
                .notifier
                .send(&format!(
                    "No trade on {}: best bid {} is {:.2}% away from average price {}",
                    pair,
                    snapshot.best_bid,
                    snapshot.deviation * 100.0,
                    snapshot.average_price
                ))
                .await;
            return EventOutcome::VolatilityRejected {
                pair,
                deviation: snapshot.deviation,
            };
        }

        // 4. sizing
        let balance = match self.ports.balance.balance(&self.settings.quote_asset).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::error!("Balance lookup failed for {}: {}", self.settings.quote_asset, e);
                self.ports
                    .notifier
                    .send(&format!("No trade on {}: balance unavailable: {}", pair, e))
                    .await;
                return EventOutcome::BalanceFailed {
                    pair,
                    reason: e.to_string(),
                };
            }
        };
        let quantity = self.sizer.quantity(balance, snapshot.best_bid);
        let intent = TradeIntent::new(&pair, snapshot.best_bid, quantity, self.settings.sell_markup);

        tracing::info!(
            "Trading {}: qty {} @ {} -> sell @ {} ({} {} available)",
            pair, intent.quantity, intent.reference_price, intent.sell_price,
            balance, self.settings.quote_asset
        );

        // 5. hand off
        let lifecycle = OrderLifecycleManager::new(
            intent.clone(),
            Arc::clone(&self.ports.execution),
            Arc::clone(&self.ports.notifier),
            self.settings.lifecycle,
        );
        self.supervisor
            .spawn(async move {
                let _lease = lease;
                lifecycle.run().await
            })
            .await;

        EventOutcome::Dispatched(intent)
    }

    /// Consume `source` until it closes or `stop` is called
    pub async fn run(&self, source: &dyn TextEventSource) -> Result<(), CoordinatorError> {
        let mut events = source.subscribe().await?;
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Ok(());
        }

        tracing::info!(
            "Listening for posts - {} keyword(s), quote asset {}",
            self.matcher.tracked().len(),
            self.settings.quote_asset
        );

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => {
                            let outcome = self.on_text_event(&event).await;
                            tracing::debug!("Event outcome: {:?}", outcome);
                        }
                        None => {
                            tracing::info!("Text source closed");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Stop consuming events. Running lifecycles are unaffected.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("Stop signal sent to coordinator");
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait for in-flight lifecycles, bounded by `grace` if given
    pub async fn shutdown(&self, grace: Option<Duration>) {
        self.shutdown_until(grace, std::future::pending()).await
    }

    /// `shutdown` that gives up on running lifecycles as soon as `interrupt`
    /// resolves (e.g. a second Ctrl+C)
    pub async fn shutdown_until<F>(&self, grace: Option<Duration>, interrupt: F)
    where
        F: Future<Output = ()>,
    {
        let active = self.supervisor.active().await;
        if active > 0 {
            tracing::info!("Waiting for {} lifecycle(s) to finish", active);
        }
        let reports = self.supervisor.drain_until(grace, interrupt).await;
        let stats = self.supervisor.stats();
        tracing::info!(
            "Drained {} lifecycle(s): {} completed, {} failed, {} panicked, {} aborted",
            reports.len(),
            stats.completed,
            stats.failed,
            stats.panicked,
            stats.aborted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LifecycleState, NegativeLexicon, OrderSide, TrackedPairs};
    use crate::domain::trade::OrderId;
    use crate::ports::mocks::{MockBalance, MockExecution, MockMarketData, MockTextSource, RecordingNotifier};
    use crate::ports::{BalanceError, ExecutionError, MarketDataError, OrderRejected};
    use crate::domain::trade::OrderRequest;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        Market {}
        #[async_trait]
        impl MarketDataPort for Market {
            async fn best_bid(&self, pair: &str) -> Result<f64, MarketDataError>;
            async fn average_price(&self, pair: &str) -> Result<f64, MarketDataError>;
        }
    }

    mock! {
        Exchange {}
        #[async_trait]
        impl ExecutionPort for Exchange {
            async fn place_order(&self, request: &OrderRequest) -> Result<OrderId, OrderRejected>;
            async fn open_orders(&self, pair: &str) -> Result<Vec<OrderId>, ExecutionError>;
        }
    }

    mock! {
        Wallet {}
        #[async_trait]
        impl BalancePort for Wallet {
            async fn balance(&self, asset: &str) -> Result<f64, BalanceError>;
        }
    }

    mock! {
        Notifier {}
        #[async_trait]
        impl NotificationPort for Notifier {
            async fn send(&self, message: &str);
        }
    }

    fn matcher() -> CoinMatcher {
        CoinMatcher::new(TrackedPairs::from_config_rows([("DOGEUSDT", "doge, dogecoin")]))
    }

    fn classifier() -> SentimentClassifier {
        SentimentClassifier::new(Arc::new(NegativeLexicon::new().with_word("dump", 2)))
    }

    struct Harness {
        coordinator: TradeCoordinator,
        market: MockMarketData,
        execution: MockExecution,
        balance: MockBalance,
        notifier: RecordingNotifier,
    }

    fn harness(bid: f64, avg: f64, settings: CoordinatorSettings) -> Harness {
        let market = MockMarketData::new().with_quote("DOGEUSDT", bid, avg);
        let execution = MockExecution::new();
        let balance = MockBalance::new().with_balance("USDT", 1000.0);
        let notifier = RecordingNotifier::new();
        let ports = TradingPorts {
            market: Arc::new(market.clone()),
            execution: Arc::new(execution.clone()),
            balance: Arc::new(balance.clone()),
            notifier: Arc::new(notifier.clone()),
        };
        Harness {
            coordinator: TradeCoordinator::new(matcher(), classifier(), ports, settings),
            market,
            execution,
            balance,
            notifier,
        }
    }

    #[tokio::test]
    async fn test_no_keyword_touches_no_provider() {
        // mocks without expectations panic on any call
        let ports = TradingPorts {
            market: Arc::new(MockMarket::new()),
            execution: Arc::new(MockExchange::new()),
            balance: Arc::new(MockWallet::new()),
            notifier: Arc::new(MockNotifier::new()),
        };
        let coordinator =
            TradeCoordinator::new(matcher(), classifier(), ports, CoordinatorSettings::default());

        let outcome = coordinator
            .on_text_event(&TextEvent::new("44196397", "Great day for a rocket launch"))
            .await;

        assert_eq!(outcome, EventOutcome::NoMatch);
        assert_eq!(coordinator.supervisor().stats().spawned, 0);
    }

    #[tokio::test]
    async fn test_negative_sentiment_stops_before_market_data() {
        let h = harness(50.0, 50.0, CoordinatorSettings::default());

        let outcome = h
            .coordinator
            .on_text_event(&TextEvent::new("1", "doge is a terrible scam"))
            .await;

        assert!(matches!(outcome, EventOutcome::NegativeSentiment { .. }));
        assert!(h.market.get_calls().is_empty());
        assert!(h.notifier.get_messages().is_empty());
    }

    #[tokio::test]
    async fn test_lexicon_word_blocks_trade() {
        let h = harness(50.0, 50.0, CoordinatorSettings::default());

        let outcome = h
            .coordinator
            .on_text_event(&TextEvent::new("1", "great doge dump"))
            .await;

        assert!(matches!(outcome, EventOutcome::NegativeSentiment { .. }));
    }

    #[tokio::test]
    async fn test_volatility_rejected_places_no_order() {
        let h = harness(98.0, 100.0, CoordinatorSettings::default());

        let outcome = h
            .coordinator
            .on_text_event(&TextEvent::new("1", "I love doge"))
            .await;

        match outcome {
            EventOutcome::VolatilityRejected { deviation, .. } => {
                assert_relative_eq!(deviation, 0.02, epsilon = 1e-12)
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(h.balance.get_calls().is_empty());
        h.coordinator.shutdown(None).await;
        assert!(h.execution.get_placed().is_empty());
        assert_eq!(h.notifier.get_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_market_data_error_is_reported() {
        let h = harness(1.0, 0.0, CoordinatorSettings::default());

        let outcome = h
            .coordinator
            .on_text_event(&TextEvent::new("1", "doge"))
            .await;

        assert!(matches!(outcome, EventOutcome::MarketDataFailed { .. }));
        assert_eq!(h.notifier.get_messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_trade() {
        let h = harness(50.0, 50.1, CoordinatorSettings::default());

        let outcome = h
            .coordinator
            .on_text_event(&TextEvent::new("1", "Dogecoin is great"))
            .await;

        let EventOutcome::Dispatched(intent) = outcome else {
            panic!("expected dispatch");
        };
        assert_eq!(intent.quantity, 2.0);
        assert_relative_eq!(intent.sell_price, 57.5, epsilon = 1e-9);
        assert_eq!(h.balance.get_calls(), vec!["USDT".to_string()]);

        let reports = h.coordinator.supervisor().drain().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].final_state(), &LifecycleState::Completed);

        let placed = h.execution.get_placed();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].side, OrderSide::Buy);
        assert_eq!(placed[0].price, 50.0);
        assert_eq!(placed[1].side, OrderSide::Sell);
        assert_relative_eq!(placed[1].price, 57.5, epsilon = 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_guard_skips_busy_pair() {
        let settings = CoordinatorSettings {
            one_lifecycle_per_pair: true,
            ..Default::default()
        };
        let market = MockMarketData::new().with_quote("DOGEUSDT", 50.0, 50.0);
        // buy stays open for two polls
        let execution = MockExecution::new()
            .with_open_orders(&["order-1"])
            .with_open_orders(&["order-1"]);
        let ports = TradingPorts {
            market: Arc::new(market),
            execution: Arc::new(execution.clone()),
            balance: Arc::new(MockBalance::new().with_balance("USDT", 1000.0)),
            notifier: Arc::new(RecordingNotifier::new()),
        };
        let coordinator = TradeCoordinator::new(matcher(), classifier(), ports, settings);

        let first = coordinator.on_text_event(&TextEvent::new("1", "doge!")).await;
        let second = coordinator.on_text_event(&TextEvent::new("1", "doge again")).await;

        assert!(matches!(first, EventOutcome::Dispatched(_)));
        assert_eq!(second, EventOutcome::PairBusy { pair: "DOGEUSDT".into() });

        coordinator.supervisor().drain().await;
        let third = coordinator.on_text_event(&TextEvent::new("1", "doge")).await;
        assert!(matches!(third, EventOutcome::Dispatched(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_consumes_source_until_closed() {
        let h = harness(50.0, 50.0, CoordinatorSettings::default());
        let source = MockTextSource::new(vec![
            TextEvent::new("1", "nothing to see"),
            TextEvent::new("1", "doge to the moon"),
            TextEvent::new("1", "doge is a terrible scam"),
        ]);

        h.coordinator.run(&source).await.unwrap();
        h.coordinator.shutdown(None).await;

        assert_eq!(h.coordinator.supervisor().stats().spawned, 1);
        assert_eq!(h.execution.get_placed().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupt_abandons_stuck_lifecycle() {
        let execution = MockExecution::new().never_filling();
        let ports = TradingPorts {
            market: Arc::new(MockMarketData::new().with_quote("DOGEUSDT", 50.0, 50.0)),
            execution: Arc::new(execution.clone()),
            balance: Arc::new(MockBalance::new().with_balance("USDT", 1000.0)),
            notifier: Arc::new(RecordingNotifier::new()),
        };
        // no fill timeout and no grace: only the interrupt can end the drain
        let coordinator =
            TradeCoordinator::new(matcher(), classifier(), ports, CoordinatorSettings::default());

        let outcome = coordinator.on_text_event(&TextEvent::new("1", "doge!")).await;
        assert!(matches!(outcome, EventOutcome::Dispatched(_)));

        coordinator.stop();
        coordinator
            .shutdown_until(None, tokio::time::sleep(Duration::from_secs(60)))
            .await;

        let stats = coordinator.supervisor().stats();
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.completed, 0);
        assert!(execution.get_poll_count() > 1);
        assert_eq!(execution.get_placed().len(), 1);
        assert_eq!(coordinator.supervisor().active().await, 0);
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let h = harness(50.0, 50.0, CoordinatorSettings::default());
        h.coordinator.stop();
        assert!(h.coordinator.is_stopped());

        let source = MockTextSource::new(vec![TextEvent::new("1", "doge")]);
        h.coordinator.run(&source).await.unwrap();
        assert_eq!(h.coordinator.supervisor().stats().spawned, 0);
    }
}
