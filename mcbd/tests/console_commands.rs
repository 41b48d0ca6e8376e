mod common;

use common::{Harness, QUICK_CONFIG};
use mcb_common::types::BenchmarkState;
use mcbd::commands::CommandDispatcher;
use tracing::info;

fn dispatcher(h: &Harness) -> CommandDispatcher {
    CommandDispatcher::new(h.dir.path().join("mcbench.toml"))
}

#[test]
fn test_start_checks_ram_unless_bypassed() {
    let mut h = Harness::new(QUICK_CONFIG);
    info!(test = "test_start_checks_ram_unless_bypassed", phase = "setup");
    h.metrics.borrow_mut().max_mb = 512;
    let d = dispatcher(&h);

    let reply = d.handle_line(&mut h.orch, "start quick").unwrap();
    assert!(reply.starts_with("Error:"), "{reply}");
    assert!(reply.contains("--bypass"));
    assert!(!h.orch.is_pending());

    let reply = d.handle_line(&mut h.orch, "start quick --bypass").unwrap();
    assert!(reply.contains("waiting for confirmation"), "{reply}");
    assert!(h.orch.is_pending());
    assert!(h.run_log().contains(
        "action=bypass_used | profile=quick | initiator=Console | ram_required=1024 | ram_current=512 | reason=RAM_requirements_bypassed"
    ));
    info!(test = "test_start_checks_ram_unless_bypassed", phase = "complete", status = "passed");
}

#[test]
fn test_unknown_profile_lists_available() {
    let mut h = Harness::new(QUICK_CONFIG);
    let d = dispatcher(&h);
    let reply = d.handle_line(&mut h.orch, "start turbo").unwrap();
    assert_eq!(reply, "Error: unknown profile 'turbo' (available: long, quick)");
    assert!(!h.orch.is_busy());
}

#[test]
fn test_console_drives_a_run() {
    let mut h = Harness::new(QUICK_CONFIG);
    let d = dispatcher(&h);

    assert!(d.handle_line(&mut h.orch, "   ").is_none());
    d.handle_line(&mut h.orch, "start quick safe").unwrap();
    assert_eq!(
        d.handle_line(&mut h.orch, "confirm").as_deref(),
        Some("Benchmark confirmed.")
    );
    assert!(
        d.handle_line(&mut h.orch, "confirm")
            .unwrap()
            .starts_with("Error:")
    );

    h.run(60);
    assert_eq!(h.state(), BenchmarkState::Workload);
    let check = d.handle_line(&mut h.orch, "check").unwrap();
    assert!(check.contains("State:   workload"), "{check}");
    assert!(check.contains("Load:"));

    assert_eq!(
        d.handle_line(&mut h.orch, "stop").as_deref(),
        Some("Benchmark stopped.")
    );
    assert_eq!(h.state(), BenchmarkState::Idle);
    assert!(h.run_log().contains("safe=true | initiator=Console | result=aborted | reason=stopped"));
}

#[test]
fn test_check_reports_ram_verdicts() {
    let mut h = Harness::new(QUICK_CONFIG);
    h.metrics.borrow_mut().max_mb = 512;
    let d = dispatcher(&h);
    let check = d.handle_line(&mut h.orch, "check").unwrap();
    assert!(check.contains("State:   idle"));
    assert!(check.contains("512 MB available"));
    assert!(check.contains("insufficient"));
    assert!(check.contains("TestOS"));
    assert!(check.ends_with("Worlds:  0 world(s), 0 chunks, 0 entities"));
}

#[test]
fn test_reload_swaps_profiles() {
    let mut h = Harness::new(QUICK_CONFIG);
    let path = h.dir.path().join("mcbench.toml");
    std::fs::write(
        &path,
        "[profiles.tiny]\ndurationSeconds = 1\nloopCountPerTick = 16\n",
    )
    .unwrap();
    let d = dispatcher(&h);

    let reply = d.handle_line(&mut h.orch, "reload").unwrap();
    assert_eq!(reply, "Configuration reloaded (1 profiles).");
    assert_eq!(h.orch.config().profile_names(), vec!["tiny".to_string()]);
    assert!(
        d.handle_line(&mut h.orch, "start quick")
            .unwrap()
            .contains("unknown profile")
    );

    std::fs::write(&path, "[profiles.tiny]\ndurationSeconds = 0\n").unwrap();
    let reply = d.handle_line(&mut h.orch, "reload").unwrap();
    assert!(reply.starts_with("Error:"), "{reply}");
    assert_eq!(h.orch.config().profile_names(), vec!["tiny".to_string()]);
}

#[test]
fn test_help_and_unknown() {
    let mut h = Harness::new(QUICK_CONFIG);
    let d = dispatcher(&h);
    let help = d.handle_line(&mut h.orch, "help").unwrap();
    assert!(help.contains("start <profile> [safe] [--bypass]"));
    assert_eq!(
        d.handle_line(&mut h.orch, "launch").as_deref(),
        Some("Error: unknown command 'launch', type 'help' for the list")
    );
}
