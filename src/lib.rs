#![allow(clippy::doc_markdown)] // Allow technical terms like OpenAI, JSON in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # LLM Resilience
//!
//! Runtime fault isolation for calls to unreliable remote services such as LLM
//! provider APIs.
//!
//! ## Overview
//!
//! Every protected call goes through a per-resource **circuit breaker** (stop
//! calling a provider that looks unhealthy), then a **bulkhead** (bound in-flight
//! calls, queueing a limited number of extra callers in FIFO order), then runs
//! under a call deadline. Operators retune thresholds at runtime through a
//! versioned **configuration manager** with profiles and rollback, and every
//! decision is published on a **telemetry** event bus.
//!
//! State is local to one process; nothing is persisted or shared across hosts.
//!
//! ## Module Organization
//!
//! - [`resilience`] - Circuit breakers, bulkheads, configuration manager and the engine
//! - [`events`] - Telemetry event bus and event-derived aggregation
//! - [`config`] - Engine settings loaded from defaults, files and environment
//! - [`error`] - Structured error handling
//! - [`constants`] - Event names, defaults and profile names
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_resilience::config::SettingsLoader;
//! use llm_resilience::{ExecuteError, RejectionKind, ResilienceEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! llm_resilience::logging::init_structured_logging();
//!
//! let engine = ResilienceEngine::new(SettingsLoader::load(None)?);
//! engine.configs().apply_profile("openai", "conservative")?;
//!
//! match engine
//!     .execute("openai", || async { Ok::<_, std::io::Error>("completion") })
//!     .await
//! {
//!     Ok(completion) => println!("{completion}"),
//!     Err(e) if e.kind() == Some(RejectionKind::CircuitOpen) => {
//!         // Fall back to another provider
//!     }
//!     Err(ExecuteError::OperationFailed(e)) => return Err(e.into()),
//!     Err(e) => return Err(e.to_string().into()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod resilience;

pub use config::{ResilienceSettings, SettingsLoader};
pub use error::{ConfigViolation, ExecuteError, ManagerError, ManagerResult, RejectionKind};
pub use events::{EventAggregator, EventPublisher, PublishedEvent};
pub use resilience::{
    CircuitConfig, CircuitSnapshot, CircuitState, ConfigManager, ConfigUpdate, ConfigVersion,
    Dashboard, ResilienceEngine,
};
