//! Tick-based task scheduling.
//!
//! The host advances one tick at a time. Tasks scheduled with `after` fire
//! once; tasks scheduled with `every` repeat until cancelled. Within a tick,
//! due tasks fire in registration order, and a task cancelled by an earlier
//! callback in the same tick does not fire.

use std::collections::BTreeMap;
use tracing::trace;

/// Opaque, idempotently cancellable reference to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

pub trait Scheduler<E> {
    /// Fire `event` once, `delay_ticks` from now. A delay of 0 means the next tick.
    fn after(&mut self, delay_ticks: u64, event: E) -> TaskHandle;

    /// Fire `event` after `initial_delay_ticks`, then every `period_ticks`.
    fn every(&mut self, initial_delay_ticks: u64, period_ticks: u64, event: E) -> TaskHandle;

    /// Returns whether the task was still scheduled. Cancelling twice is fine.
    fn cancel(&mut self, handle: TaskHandle) -> bool;

    fn is_active(&self, handle: TaskHandle) -> bool;

    /// Move to the next tick and list what is due, in registration order.
    fn advance(&mut self) -> Vec<TaskHandle>;

    /// Claim a due task's event. `None` if it was cancelled since `advance`.
    fn fire(&mut self, handle: TaskHandle) -> Option<E>;

    fn current_tick(&self) -> u64;

    /// Tasks still scheduled, one-shot or repeating.
    fn active_count(&self) -> usize;
}

#[derive(Debug)]
struct Task<E> {
    due: u64,
    period: Option<u64>,
    event: E,
}

/// Single-threaded scheduler driven by the host loop.
#[derive(Debug)]
pub struct TickScheduler<E> {
    tick: u64,
    next_id: u64,
    tasks: BTreeMap<TaskHandle, Task<E>>,
}

impl<E> Default for TickScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TickScheduler<E> {
    pub fn new() -> Self {
        Self {
            tick: 0,
            next_id: 0,
            tasks: BTreeMap::new(),
        }
    }

    fn insert(&mut self, delay: u64, period: Option<u64>, event: E) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        let due = self.tick + delay.max(1);
        trace!(handle = handle.0, due, ?period, "Task scheduled");
        self.tasks.insert(handle, Task { due, period, event });
        handle
    }
}

impl<E: Clone> Scheduler<E> for TickScheduler<E> {
    fn after(&mut self, delay_ticks: u64, event: E) -> TaskHandle {
        self.insert(delay_ticks, None, event)
    }

    fn every(&mut self, initial_delay_ticks: u64, period_ticks: u64, event: E) -> TaskHandle {
        self.insert(initial_delay_ticks, Some(period_ticks.max(1)), event)
    }

    fn cancel(&mut self, handle: TaskHandle) -> bool {
        let removed = self.tasks.remove(&handle).is_some();
        if removed {
            trace!(handle = handle.0, "Task cancelled");
        }
        removed
    }

    fn is_active(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    fn advance(&mut self) -> Vec<TaskHandle> {
        self.tick += 1;
        self.tasks
            .iter()
            .filter(|(_, task)| task.due <= self.tick)
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn fire(&mut self, handle: TaskHandle) -> Option<E> {
        let task = self.tasks.get_mut(&handle)?;
        if task.due > self.tick {
            return None;
        }
        match task.period {
            Some(period) => {
                task.due = self.tick + period;
                Some(task.event.clone())
            }
            None => self.tasks.remove(&handle).map(|task| task.event),
        }
    }

    fn current_tick(&self) -> u64 {
        self.tick
    }

    fn active_count(&self) -> usize {
        self.tasks.len()
    }
}
