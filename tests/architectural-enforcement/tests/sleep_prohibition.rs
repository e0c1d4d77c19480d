//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code in the chat crates MUST NOT call sleep methods.
//! Turn progress is driven by the answer stream and the disposal signal;
//! nothing needs to wait on a timer.

use architectural_enforcement::scan;

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan("Sleep call", |code| {
        code.contains("::sleep(") || code.contains(".sleep(")
    });

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Wait on the stream, a channel or `Liveness::disposed()` instead.");

        panic!(
            "\nFound {} sleep violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
