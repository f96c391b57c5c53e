//! One-shot deferred actions driven by the simulation clock.

use std::time::Duration;

/// Work that can be deferred onto a later tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DeferredAction {
    /// Re-evaluate whether the wave was cleared.
    MissionCheck,
}

#[derive(Clone, Copy, Debug)]
struct Deferred {
    due: Duration,
    sequence: u64,
    action: DeferredAction,
}

/// Fire-and-forget scheduler. Entries cannot be cancelled.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    clock: Duration,
    sequence: u64,
    pending: Vec<Deferred>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues `action` to fire once `delay` of simulated time has elapsed.
    pub(crate) fn schedule_after(&mut self, delay: Duration, action: DeferredAction) {
        self.pending.push(Deferred {
            due: self.clock.saturating_add(delay),
            sequence: self.sequence,
            action,
        });
        self.sequence = self.sequence.wrapping_add(1);
    }

    /// Advances the clock and drains every action that became due, ordered by
    /// due time and then by scheduling order.
    pub(crate) fn advance(&mut self, dt: Duration) -> Vec<DeferredAction> {
        self.clock = self.clock.saturating_add(dt);
        let clock = self.clock;

        let mut due: Vec<Deferred> = Vec::new();
        self.pending.retain(|entry| {
            if entry.due <= clock {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|entry| (entry.due, entry.sequence));
        due.into_iter().map(|entry| entry.action).collect()
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }
}
