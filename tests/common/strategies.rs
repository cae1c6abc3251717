use llm_resilience::resilience::{BulkheadUpdate, ConfigUpdate};
use proptest::prelude::*;

/// Raw field values spanning valid, zero and negative inputs
pub fn raw_field_strategy() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(prop_oneof![
        -1_000i64..=-1,
        Just(0i64),
        1i64..=100_000,
    ])
}

/// Partial updates with arbitrary, possibly invalid, fields
pub fn config_update_strategy() -> impl Strategy<Value = ConfigUpdate> {
    (
        raw_field_strategy(),
        raw_field_strategy(),
        raw_field_strategy(),
        raw_field_strategy(),
        raw_field_strategy(),
        raw_field_strategy(),
        raw_field_strategy(),
    )
        .prop_map(
            |(
                failure_threshold,
                success_threshold,
                reset_timeout_ms,
                call_timeout_ms,
                max_concurrent,
                max_queued,
                queue_timeout_ms,
            )| ConfigUpdate {
                failure_threshold,
                success_threshold,
                reset_timeout_ms,
                call_timeout_ms,
                bulkhead: BulkheadUpdate {
                    max_concurrent,
                    max_queued,
                    queue_timeout_ms,
                },
            },
        )
}

/// Partial updates whose present fields are all valid
pub fn valid_update_strategy() -> impl Strategy<Value = ConfigUpdate> {
    let positive = || prop::option::of(1i64..=100_000);
    (
        positive(),
        positive(),
        positive(),
        positive(),
        positive(),
        prop::option::of(0i64..=1_000),
        positive(),
    )
        .prop_map(
            |(
                failure_threshold,
                success_threshold,
                reset_timeout_ms,
                call_timeout_ms,
                max_concurrent,
                max_queued,
                queue_timeout_ms,
            )| ConfigUpdate {
                failure_threshold,
                success_threshold,
                reset_timeout_ms,
                call_timeout_ms,
                bulkhead: BulkheadUpdate {
                    max_concurrent,
                    max_queued,
                    queue_timeout_ms,
                },
            },
        )
}
