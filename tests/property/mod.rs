//! Property-based tests for structured-output recovery

mod repair_recovery;
