//! # Resilience Module
//!
//! Fault isolation for calls to unreliable remote providers: a circuit breaker
//! and bulkhead per named resource, with live, versioned configuration.
//!
//! ## Architecture
//!
//! - **Registry**: concurrent map of resource name to a mutex-guarded circuit and bulkhead
//! - **Circuit Breakers**: stop calling a resource once it looks unhealthy, probing recovery with single trials
//! - **Bulkheads**: bound in-flight calls per resource with a FIFO wait queue
//! - **Configuration**: validated partial updates, profiles, history and rollback
//! - **Metrics**: snapshots and a dashboard that flags resources needing attention
//!
//! ## Usage
//!
//! ```rust,no_run
//! use llm_resilience::resilience::{ConfigUpdate, ResilienceEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ResilienceEngine::default();
//!
//! // Tighter thresholds for a provider that is known to be flaky
//! engine
//!     .configs()
//!     .update_config("anthropic", &ConfigUpdate::new().failure_threshold(3))?;
//!
//! let completion = engine
//!     .execute("anthropic", || async {
//!         // Provider request here
//!         Ok::<&str, std::io::Error>("completion")
//!     })
//!     .await?;
//! # let _ = completion;
//! # Ok(())
//! # }
//! ```

pub mod bulkhead;
pub mod circuit_breaker;
pub mod config;
pub mod engine;
pub mod manager;
pub mod metrics;
pub mod profiles;
pub mod registry;

pub use bulkhead::{AcquireDecision, BulkheadPermit, BulkheadRejection, BulkheadState};
pub use circuit_breaker::{
    Admission, CallCounters, CallOutcome, CircuitRecord, CircuitState, StateTransition,
};
pub use config::{BulkheadConfig, BulkheadUpdate, CircuitConfig, ConfigUpdate};
pub use engine::ResilienceEngine;
pub use manager::{ConfigManager, ConfigVersion, DynamicConfigFn};
pub use metrics::{
    AlertReason, BulkheadSnapshot, CircuitBreakerMetrics, CircuitSnapshot, Dashboard,
    DashboardEntry,
};
pub use profiles::ProfileRegistry;
pub use registry::{CircuitRegistry, ResourceGuard, ResourceState};
