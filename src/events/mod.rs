//! # Telemetry Events
//!
//! Process-wide event bus for resilience telemetry and an aggregator that turns
//! the event stream back into per-resource metrics.

pub mod aggregator;
pub mod publisher;

pub use aggregator::EventAggregator;
pub use publisher::{EventPublisher, PublishedEvent};
