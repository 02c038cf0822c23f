//! Metrics collection for archive operations.
//!
//! Thin wrappers over the `metrics` macros so call sites stay terse and the
//! metric names live in one place. Without an installed recorder the macros
//! are no-ops, so these are safe to call unconditionally.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};

const MESSAGES_ARCHIVED: &str = "mlarchive_messages_archived_total";
const MESSAGES_REMOVED: &str = "mlarchive_messages_removed_total";
const MESSAGES_MARKED: &str = "mlarchive_messages_marked_total";
const ARCHIVE_DURATION: &str = "mlarchive_archive_duration_seconds";
const EXPORT_OPERATIONS: &str = "mlarchive_membership_exports_total";
const ERRORS: &str = "mlarchive_errors_total";

/// Register descriptions for every metric this crate emits.
pub fn describe() {
    describe_counter!(
        MESSAGES_ARCHIVED,
        "Archive operations by outcome (archived, duplicate, failed)"
    );
    describe_counter!(MESSAGES_REMOVED, "Messages removed from the archive");
    describe_counter!(MESSAGES_MARKED, "Messages marked with a spam/error flag");
    describe_histogram!(ARCHIVE_DURATION, "Wall-clock duration of archive operations");
    describe_counter!(EXPORT_OPERATIONS, "Membership export runs by outcome");
    describe_counter!(ERRORS, "Errors by component");
}

/// Record one archive operation with its outcome and duration.
pub fn record_archive(outcome: &'static str, duration: Duration) {
    counter!(MESSAGES_ARCHIVED, "outcome" => outcome).increment(1);
    histogram!(ARCHIVE_DURATION, "outcome" => outcome).record(duration.as_secs_f64());
}

/// Record one message removal.
pub fn record_remove() {
    counter!(MESSAGES_REMOVED).increment(1);
}

/// Record one message mark operation.
pub fn record_mark() {
    counter!(MESSAGES_MARKED).increment(1);
}

/// Record one membership export run.
pub fn record_export(outcome: &'static str) {
    counter!(EXPORT_OPERATIONS, "outcome" => outcome).increment(1);
}

/// Record an error attributed to a component.
pub fn record_error(component: &'static str) {
    counter!(ERRORS, "component" => component).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // No global recorder installed in tests; calls must not panic
        describe();
        record_archive("archived", Duration::from_millis(5));
        record_remove();
        record_mark();
        record_export("ok");
        record_error("store");
    }
}
