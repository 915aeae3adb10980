// Test Helpers Module
//
// Deterministic clock, recording handlers and breaker fixtures shared by unit
// tests and the integration suites under tests/.

pub mod test_utils;

pub use test_utils::{
    breaker_with_clock, FailingHandler, ManualClock, RecordingHandler, MANUAL_CLOCK_START,
};
