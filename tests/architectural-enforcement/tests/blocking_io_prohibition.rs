//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code in the chat crates MUST NOT use blocking
//! network, HTTP or channel calls. The controller runs on the async runtime
//! and a blocked read would also block disposal.

use architectural_enforcement::scan;

/// Test that production code does not use blocking I/O
#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = scan("Blocking HTTP client", |code| {
        code.contains("reqwest::blocking")
    });
    violations.extend(scan("Blocking network I/O", |code| {
        code.contains("std::net::") || code.contains("use std::net")
    }));
    violations.extend(scan("Blocking process I/O", |code| {
        code.contains("std::process::Command")
    }));
    violations.extend(scan("Blocking channel call", |code| {
        code.contains(".blocking_recv(")
            || code.contains(".blocking_send(")
            || code.contains(".blocking_lock(")
    }));

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking I/O calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ REQUIRED async I/O:");
        eprintln!("  - reqwest::Client with .await");
        eprintln!("  - tokio::sync channels with .recv().await");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}
