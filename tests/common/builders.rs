use llm_resilience::config::ResilienceSettings;
use llm_resilience::events::PublishedEvent;
use llm_resilience::{ConfigUpdate, ExecuteError, ResilienceEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};

/// Engine with short timeouts, logging initialized once per test binary
pub fn test_engine() -> ResilienceEngine {
    llm_resilience::logging::init_structured_logging();
    ResilienceEngine::new(ResilienceSettings::for_test())
}

pub fn shared_engine() -> Arc<ResilienceEngine> {
    Arc::new(test_engine())
}

/// Bulkhead limits for tests that exercise queuing
pub fn bulkhead(max_concurrent: i64, max_queued: i64, queue_timeout_ms: i64) -> ConfigUpdate {
    ConfigUpdate::new()
        .max_concurrent(max_concurrent)
        .max_queued(max_queued)
        .queue_timeout_ms(queue_timeout_ms)
        .call_timeout_ms(10_000)
}

/// Run one failing call against `name`
pub async fn fail_once(engine: &ResilienceEngine, name: &str) -> ExecuteError<String> {
    match engine
        .execute(name, || async { Err::<(), _>("upstream error".to_string()) })
        .await
    {
        Err(e) => e,
        Ok(()) => panic!("failing work unexpectedly succeeded"),
    }
}

pub async fn succeed_once(engine: &ResilienceEngine, name: &str) -> Result<(), ExecuteError<String>> {
    engine.execute(name, || async { Ok::<_, String>(()) }).await
}

/// Hold a bulkhead slot on `name` until `gate` gets a permit
pub fn spawn_blocked_call(
    engine: &Arc<ResilienceEngine>,
    name: &str,
    gate: &Arc<Semaphore>,
) -> tokio::task::JoinHandle<Result<(), ExecuteError<String>>> {
    let engine = Arc::clone(engine);
    let gate = Arc::clone(gate);
    let name = name.to_string();
    tokio::spawn(async move {
        engine
            .execute(&name, || async move {
                let _permit = gate.acquire().await.map_err(|e| e.to_string())?;
                Ok::<_, String>(())
            })
            .await
    })
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn eventually<F>(description: &str, condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held: {description}");
}

/// Drain every event currently buffered on `receiver`
pub fn drain_events(receiver: &mut broadcast::Receiver<PublishedEvent>) -> Vec<PublishedEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn event_names(events: &[PublishedEvent]) -> Vec<&str> {
    events.iter().map(|e| e.name.as_str()).collect()
}
