//! Opt-in countdown in front of every benchmark run.
//!
//! `request` opens a window of `window` units. Each unit the countdown
//! decrements; at zero the request expires without creating a session.
//! `confirm` closes the window and arms a delayed start after the grace
//! period; `cancel` closes it with no start. While a start is armed, new
//! requests are rejected until the session has begun.

use crate::orchestrator::BenchTask;
use crate::scheduler::{Scheduler, TaskHandle};
use mcb_common::errors::StateError;
use mcb_common::types::BenchmarkProfile;
use tracing::{debug, info};

pub const DEFAULT_WINDOW: u32 = 60;
pub const ANNOUNCE_EVERY: u32 = 10;
pub const FINAL_COUNTDOWN: u32 = 5;

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub profile: BenchmarkProfile,
    pub safe_mode: bool,
    pub initiator: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CountdownStep {
    Waiting { remaining: u32, announce: bool },
    Expired(StartRequest),
}

#[derive(Debug)]
struct Pending {
    request: StartRequest,
    remaining: u32,
    countdown: TaskHandle,
}

#[derive(Debug)]
struct Armed {
    request: StartRequest,
    start: TaskHandle,
}

#[derive(Debug)]
pub struct ConfirmationGate {
    window: u32,
    unit_ticks: u64,
    grace_ticks: u64,
    pending: Option<Pending>,
    armed: Option<Armed>,
}

impl ConfirmationGate {
    pub fn new(window: u32, unit_ticks: u64, grace_ticks: u64) -> Self {
        Self {
            window: window.max(1),
            unit_ticks: unit_ticks.max(1),
            grace_ticks,
            pending: None,
            armed: None,
        }
    }

    /// Apply new timing. An in-flight request keeps its countdown and start.
    pub fn reconfigure(&mut self, window: u32, unit_ticks: u64, grace_ticks: u64) {
        self.window = window.max(1);
        self.unit_ticks = unit_ticks.max(1);
        self.grace_ticks = grace_ticks;
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    pub fn pending_request(&self) -> Option<&StartRequest> {
        self.pending.as_ref().map(|p| &p.request)
    }

    pub fn remaining(&self) -> Option<u32> {
        self.pending.as_ref().map(|p| p.remaining)
    }

    pub fn request<S: Scheduler<BenchTask>>(
        &mut self,
        scheduler: &mut S,
        request: StartRequest,
        session_active: bool,
    ) -> Result<(), StateError> {
        if session_active {
            return Err(StateError::SessionActive);
        }
        if self.pending.is_some() {
            return Err(StateError::ConfirmationPending);
        }
        if self.armed.is_some() {
            return Err(StateError::StartArmed);
        }
        let countdown = scheduler.every(0, self.unit_ticks, BenchTask::ConfirmationCountdown);
        info!(
            profile = %request.profile.name,
            safe_mode = request.safe_mode,
            initiator = %request.initiator,
            window = self.window,
            "Benchmark awaiting confirmation"
        );
        self.pending = Some(Pending {
            request,
            remaining: self.window,
            countdown,
        });
        Ok(())
    }

    /// Advance the countdown by one unit. `None` if nothing is pending.
    pub fn on_countdown<S: Scheduler<BenchTask>>(&mut self, scheduler: &mut S) -> Option<CountdownStep> {
        let pending = self.pending.as_mut()?;
        pending.remaining = pending.remaining.saturating_sub(1);
        let remaining = pending.remaining;
        if remaining == 0 {
            let expired = self.pending.take()?;
            scheduler.cancel(expired.countdown);
            info!(profile = %expired.request.profile.name, "Confirmation window expired");
            return Some(CountdownStep::Expired(expired.request));
        }
        let announce = remaining % ANNOUNCE_EVERY == 0 || remaining <= FINAL_COUNTDOWN;
        debug!(remaining, announce, "Confirmation countdown");
        Some(CountdownStep::Waiting { remaining, announce })
    }

    /// Accept the pending request and arm the delayed start.
    pub fn confirm<S: Scheduler<BenchTask>>(&mut self, scheduler: &mut S) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        scheduler.cancel(pending.countdown);
        let start = scheduler.after(self.grace_ticks, BenchTask::StartSession);
        info!(
            profile = %pending.request.profile.name,
            grace_ticks = self.grace_ticks,
            "Benchmark confirmed"
        );
        self.armed = Some(Armed {
            request: pending.request,
            start,
        });
        true
    }

    pub fn cancel<S: Scheduler<BenchTask>>(&mut self, scheduler: &mut S) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        scheduler.cancel(pending.countdown);
        info!(profile = %pending.request.profile.name, "Benchmark request cancelled");
        true
    }

    /// Hand over the armed request when its start task fires.
    pub fn take_armed(&mut self) -> Option<StartRequest> {
        self.armed.take().map(|armed| armed.request)
    }

    /// Drop any pending or armed request. Returns whether anything was cleared.
    pub fn clear<S: Scheduler<BenchTask>>(&mut self, scheduler: &mut S) -> bool {
        let mut cleared = false;
        if let Some(pending) = self.pending.take() {
            scheduler.cancel(pending.countdown);
            cleared = true;
        }
        if let Some(armed) = self.armed.take() {
            scheduler.cancel(armed.start);
            cleared = true;
        }
        cleared
    }
}
