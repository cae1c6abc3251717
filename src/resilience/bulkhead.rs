//! # Bulkhead
//!
//! Per-resource concurrency limiter with a bounded FIFO wait queue. A call only
//! reaches the bulkhead after the circuit breaker has admitted it.
//!
//! Waiters block on a oneshot channel with a deadline, not by polling. A release
//! hands its slot straight to the head of the queue while the resource lock is
//! held, so `active_count` never dips in between and no third caller can grab
//! the slot during the handoff.

use crate::error::RejectionKind;
use crate::resilience::{BulkheadConfig, ResourceGuard};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
struct Waiter {
    id: u64,
    sender: oneshot::Sender<()>,
}

/// Outcome of a non-blocking acquisition attempt
#[derive(Debug)]
pub enum AcquireDecision {
    /// A slot was free and is now held
    Acquired,
    /// Caller is queued and must wait on the receiver
    Queued {
        waiter_id: u64,
        receiver: oneshot::Receiver<()>,
    },
    /// No slot and no usable queue position
    Rejected(RejectionKind),
}

/// Bulkhead bookkeeping for one resource
#[derive(Debug)]
pub struct BulkheadState {
    config: BulkheadConfig,
    active_count: u32,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
    total_accepted: u64,
    total_rejected: u64,
}

impl BulkheadState {
    pub fn new(config: BulkheadConfig) -> Self {
        Self {
            config,
            active_count: 0,
            waiters: VecDeque::new(),
            next_waiter_id: 1,
            total_accepted: 0,
            total_rejected: 0,
        }
    }

    pub fn config(&self) -> &BulkheadConfig {
        &self.config
    }

    pub fn active_count(&self) -> u32 {
        self.active_count
    }

    pub fn queued_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn total_accepted(&self) -> u64 {
        self.total_accepted
    }

    pub fn total_rejected(&self) -> u64 {
        self.total_rejected
    }

    /// Take a slot, join the queue, or reject
    pub fn try_acquire(&mut self) -> AcquireDecision {
        if self.active_count < self.config.max_concurrent {
            self.active_count += 1;
            self.total_accepted += 1;
            return AcquireDecision::Acquired;
        }

        if self.config.max_queued == 0 {
            self.total_rejected += 1;
            return AcquireDecision::Rejected(RejectionKind::BulkheadFull);
        }

        if self.waiters.len() >= self.config.max_queued as usize {
            self.total_rejected += 1;
            return AcquireDecision::Rejected(RejectionKind::BulkheadQueueFull);
        }

        let (sender, receiver) = oneshot::channel();
        let waiter_id = self.next_waiter_id;
        self.next_waiter_id += 1;
        self.waiters.push_back(Waiter {
            id: waiter_id,
            sender,
        });

        AcquireDecision::Queued {
            waiter_id,
            receiver,
        }
    }

    /// Give a slot back, handing it to the oldest live waiter if there is one
    pub fn release(&mut self) {
        if self.active_count == 0 {
            warn!("Bulkhead release with no active slots");
            return;
        }

        // After a shrink, excess slots retire instead of being handed on
        if self.active_count <= self.config.max_concurrent && self.hand_off_to_next_waiter() {
            return;
        }

        self.active_count -= 1;
    }

    fn hand_off_to_next_waiter(&mut self) -> bool {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.sender.send(()).is_ok() {
                self.total_accepted += 1;
                debug!(waiter = waiter.id, "Bulkhead slot handed to queued caller");
                return true;
            }
        }
        false
    }

    /// Remove a waiter from the queue; false when it was already handed a slot
    pub fn abandon_waiter(&mut self, waiter_id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == waiter_id) {
            Some(index) => {
                self.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    fn record_rejection(&mut self) {
        self.total_rejected += 1;
    }

    /// Replace limits; if capacity grew, queued callers are promoted at once
    pub fn apply_config(&mut self, config: BulkheadConfig) {
        self.config = config;
        while self.active_count < self.config.max_concurrent {
            if !self.hand_off_to_next_waiter() {
                break;
            }
            self.active_count += 1;
        }
    }
}

/// Why a call did not get a bulkhead slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkheadRejection {
    pub kind: RejectionKind,
    pub waited: Duration,
}

/// A held bulkhead slot; dropping it releases the slot
#[derive(Debug)]
pub struct BulkheadPermit {
    guard: Arc<ResourceGuard>,
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        self.guard.lock().bulkhead.release();
    }
}

/// A queue position owned by a waiting caller. If the caller's future is dropped
/// while queued, the position is withdrawn; if a slot was already handed over,
/// it is released again.
struct PendingWaiter {
    guard: Arc<ResourceGuard>,
    waiter_id: u64,
    receiver: oneshot::Receiver<()>,
    armed: bool,
}

impl PendingWaiter {
    /// Resolve after the deadline passed. Runs under the resource lock so the
    /// queue and the receiver are observed consistently.
    fn resolve_timeout(&mut self) -> bool {
        self.armed = false;
        let mut state = self.guard.lock();
        if state.bulkhead.abandon_waiter(self.waiter_id) {
            state.bulkhead.record_rejection();
            return false;
        }
        // Handed a slot just as the deadline hit; any handoff already sent under the lock
        if self.receiver.try_recv().is_ok() {
            true
        } else {
            state.bulkhead.record_rejection();
            false
        }
    }
}

impl Drop for PendingWaiter {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.guard.lock();
        if !state.bulkhead.abandon_waiter(self.waiter_id) && self.receiver.try_recv().is_ok() {
            state.bulkhead.release();
        }
    }
}

impl ResourceGuard {
    /// Acquire a bulkhead slot, waiting in the queue up to `queue_timeout`
    pub async fn acquire_slot(self: &Arc<Self>) -> Result<BulkheadPermit, BulkheadRejection> {
        let started = Instant::now();
        let (decision, queue_timeout) = {
            let mut state = self.lock();
            let queue_timeout = state.bulkhead.config().queue_timeout;
            (state.bulkhead.try_acquire(), queue_timeout)
        };

        let (waiter_id, receiver) = match decision {
            AcquireDecision::Acquired => {
                return Ok(BulkheadPermit {
                    guard: Arc::clone(self),
                })
            }
            AcquireDecision::Rejected(kind) => {
                debug!(resource = %self.name(), reason = %kind, "Bulkhead rejected call");
                return Err(BulkheadRejection {
                    kind,
                    waited: Duration::ZERO,
                });
            }
            AcquireDecision::Queued {
                waiter_id,
                receiver,
            } => (waiter_id, receiver),
        };

        debug!(resource = %self.name(), waiter = waiter_id, "Call queued for bulkhead slot");

        let mut pending = PendingWaiter {
            guard: Arc::clone(self),
            waiter_id,
            receiver,
            armed: true,
        };

        let waited = tokio::time::timeout(queue_timeout, &mut pending.receiver).await;
        let granted = match waited {
            Ok(Ok(())) => {
                pending.armed = false;
                true
            }
            // Deadline passed, or the sender vanished without a handoff
            Ok(Err(_)) | Err(_) => pending.resolve_timeout(),
        };

        if granted {
            Ok(BulkheadPermit {
                guard: Arc::clone(self),
            })
        } else {
            let waited = started.elapsed();
            debug!(
                resource = %self.name(),
                waited_ms = waited.as_millis() as u64,
                "Queued call timed out waiting for bulkhead slot"
            );
            Err(BulkheadRejection {
                kind: RejectionKind::BulkheadTimeout,
                waited,
            })
        }
    }
}
