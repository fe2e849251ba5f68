//! Real OS signal delivery. Kept in its own test binary so the process-wide
//! handler cannot interfere with other tests.

#![cfg(unix)]

use std::time::Duration;

use blog_server::lifecycle::{startup::Lifecycle, wait_for_signal, OsSignal, ShutdownOutcome, ShutdownTrigger};

mod common;

#[tokio::test]
async fn test_sigterm_triggers_graceful_shutdown() {
    let lifecycle = Lifecycle::start(common::test_config(2));
    lifecycle.local_addr().await.expect("server should bind");

    let run = tokio::spawn(lifecycle.run_until_stopped(wait_for_signal()));

    // Give the handler time to install before raising.
    tokio::time::sleep(Duration::from_millis(200)).await;
    unsafe {
        libc::raise(libc::SIGTERM);
    }

    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown should finish")
        .unwrap();
    assert_eq!(report.trigger, ShutdownTrigger::Signal(OsSignal::Terminate));
    assert_eq!(report.outcome, ShutdownOutcome::Graceful);
}
