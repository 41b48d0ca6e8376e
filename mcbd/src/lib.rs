//! MCBench daemon: drives a stress-and-recovery benchmark on a cooperative
//! tick host.
//!
//! A run is opt-in ([`confirmation`]), applies synthetic CPU load for the
//! profile's duration ([`workload`]), then measures how long the host takes
//! to return to healthy TPS/MSPT and scores that recovery ([`scoring`]). The
//! [`orchestrator`] owns the session and every scheduled monitor; [`host`]
//! provides the seams to the host and a reference fixed-rate tick loop.

pub mod commands;
pub mod confirmation;
pub mod host;
pub mod orchestrator;
pub mod recommend;
pub mod report;
pub mod scheduler;
pub mod scoring;
pub mod workload;

pub use commands::{Command, CommandDispatcher, CommandError};
pub use confirmation::{ConfirmationGate, StartRequest};
pub use host::{HostEvent, HostHooks, MAX_TICK_RATE, TickLoop, WorldIntrospector};
pub use orchestrator::{BenchTask, BenchmarkOrchestrator, Collaborators, Timing};
pub use recommend::{Recommender, ThresholdRecommender};
pub use report::{ConsoleReport, JsonFileExporter, ReportSink, ResultExporter};
pub use scheduler::{Scheduler, TaskHandle, TickScheduler};
pub use workload::{MixedWork, TickOutcome, WorkFactory, WorkUnit, WorkloadGenerator};
