mod common;

use common::{fixture, init_test_logging};
use mcb_telemetry::collect::cpu::{CpuStats, ProcCpuLoad, ProcessCpuTime};
use mcb_telemetry::collect::memory::{MemoryInfo, parse_rss_kb};
use tracing::info;

#[test]
fn test_system_load_between_fixtures() {
    init_test_logging();
    info!(test = "test_system_load_between_fixtures", phase = "setup");

    let idle = CpuStats::parse(fixture("proc_stat_idle.txt")).expect("idle parse");
    let busy = CpuStats::parse(fixture("proc_stat_busy.txt")).expect("busy parse");

    let pct = CpuStats::calculate_percent(&idle, &busy);
    info!(
        test = "test_system_load_between_fixtures",
        phase = "assert",
        pct = pct
    );
    // 1000 active of 1100 elapsed jiffies
    assert!((pct - 90.909).abs() < 0.01);

    info!(
        test = "test_system_load_between_fixtures",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_process_load_normalized_by_system_delta() {
    init_test_logging();
    info!(test = "test_process_load_normalized_by_system_delta", phase = "setup");

    let proc_now = ProcessCpuTime::parse(fixture("proc_self_stat.txt")).expect("stat parse");
    assert_eq!(proc_now.utime, 1800);
    assert_eq!(proc_now.stime, 200);

    let mut load = ProcCpuLoad::new();
    let before = ProcessCpuTime {
        utime: 1500,
        stime: 170,
    };
    load.observe(Some(CpuStats::parse(fixture("proc_stat_idle.txt")).unwrap()), Some(before));
    let reading = load.observe(
        Some(CpuStats::parse(fixture("proc_stat_busy.txt")).unwrap()),
        Some(proc_now),
    );

    info!(
        test = "test_process_load_normalized_by_system_delta",
        phase = "assert",
        system = reading.system_pct,
        process = reading.process_pct
    );
    // 330 process jiffies of 1100 elapsed
    assert!((reading.process_pct - 30.0).abs() < 1e-9);

    info!(
        test = "test_process_load_normalized_by_system_delta",
        phase = "complete",
        status = "passed"
    );
}

#[test]
fn test_memory_fixtures() {
    init_test_logging();
    info!(test = "test_memory_fixtures", phase = "setup");

    let info = MemoryInfo::parse(fixture("proc_meminfo_sample.txt")).expect("meminfo parse");
    let rss_kb = parse_rss_kb(fixture("proc_self_status.txt")).expect("status parse");

    info!(
        test = "test_memory_fixtures",
        phase = "assert",
        total_mb = info.total_mb(),
        rss_kb = rss_kb
    );
    assert_eq!(info.total_mb(), 32_000);
    assert_eq!(rss_kb / 1024, 2048);

    info!(test = "test_memory_fixtures", phase = "complete", status = "passed");
}
