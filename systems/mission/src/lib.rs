#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that decides when a wave has been cleared.
//!
//! The world schedules a deferred check after every creep death. When that
//! check fires, this system inspects the creep population as it is at that
//! moment and requests completion once per wave.

use bastion_core::{Command, CreepView, Event};

/// Mission completion monitor.
#[derive(Debug, Default)]
pub struct MissionMonitor {
    signalled: bool,
}

impl MissionMonitor {
    /// Creates a new monitor armed for the first wave.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether completion was already requested for the current wave.
    #[must_use]
    pub const fn signalled(&self) -> bool {
        self.signalled
    }

    /// Consumes world events and emits `CompleteMission` when a due check
    /// finds no creeps left.
    pub fn handle(&mut self, events: &[Event], creeps: &CreepView, out: &mut Vec<Command>) {
        for event in events {
            match event {
                Event::CreepSpawned { .. } => self.signalled = false,
                Event::MissionCheckDue => {
                    if !self.signalled && creeps.is_empty() {
                        self.signalled = true;
                        out.push(Command::CompleteMission);
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_without_creeps_signals_once() {
        let mut monitor = MissionMonitor::new();
        let mut out = Vec::new();

        monitor.handle(
            &[Event::MissionCheckDue, Event::MissionCheckDue],
            &CreepView::default(),
            &mut out,
        );
        monitor.handle(&[Event::MissionCheckDue], &CreepView::default(), &mut out);

        assert_eq!(out, vec![Command::CompleteMission]);
        assert!(monitor.signalled());
    }

    #[test]
    fn unrelated_events_do_not_signal() {
        let mut monitor = MissionMonitor::new();
        let mut out = Vec::new();
        monitor.handle(&[Event::MissionCompleted], &CreepView::default(), &mut out);
        assert!(out.is_empty());
    }
}
