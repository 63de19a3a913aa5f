pub mod coordinator;
pub mod lifecycle;
pub mod pair_guard;
pub mod supervisor;

pub use coordinator::{
    CoordinatorError, CoordinatorSettings, EventOutcome, TradeCoordinator, TradingPorts,
};
pub use lifecycle::{LifecycleConfig, OrderLifecycleManager, DEFAULT_POLL_INTERVAL};
pub use pair_guard::{PairGuard, PairLease};
pub use supervisor::{LifecycleSupervisor, SupervisorStats};
