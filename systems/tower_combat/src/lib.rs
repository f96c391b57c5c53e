#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that turns engagements into firing and strike commands.

use std::time::Duration;

use bastion_core::{Command, CreepView, Engagement, EntityId, Event, TowerSnapshot, TowerView};

const DEFAULT_STRIKE_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration parameters required to construct the combat system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    strike_interval: Duration,
}

impl Config {
    /// Creates a new configuration using the provided melee cadence.
    #[must_use]
    pub const fn new(strike_interval: Duration) -> Self {
        Self { strike_interval }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_STRIKE_INTERVAL)
    }
}

/// Tower combat system that queues firing commands for ready towers and
/// melee strikes between troops and the creeps they hold.
#[derive(Debug)]
pub struct TowerCombat {
    strike_interval: Duration,
    accumulator: Duration,
    scratch: Vec<Command>,
}

impl TowerCombat {
    /// Creates a new combat system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            strike_interval: config.strike_interval,
            accumulator: Duration::ZERO,
            scratch: Vec::new(),
        }
    }

    /// Emits `FireProjectile` for every engagement of a ready tower and one
    /// round of `Strike` commands per elapsed strike interval.
    pub fn handle(
        &mut self,
        events: &[Event],
        towers: &TowerView,
        creeps: &CreepView,
        engagements: &[Engagement],
        out: &mut Vec<Command>,
    ) {
        self.scratch.clear();

        let towers: Vec<&TowerSnapshot> = towers.iter().collect();
        for engagement in engagements {
            if let Engagement::Tower { tower, target } = *engagement {
                if find_tower(&towers, tower).is_some_and(|snapshot| snapshot.ready_in.is_zero()) {
                    self.scratch.push(Command::FireProjectile { tower, target });
                }
            }
        }

        let elapsed: Duration = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add);
        self.accumulator = self.accumulator.saturating_add(elapsed);

        for _ in 0..self.resolve_strike_rounds() {
            for engagement in engagements {
                if let Engagement::Troop { troop, target } = *engagement {
                    self.scratch.push(Command::Strike {
                        attacker: troop,
                        defender: target,
                    });
                }
            }
            for creep in creeps.iter() {
                if let Some(troop) = creep.suspended_by {
                    self.scratch.push(Command::Strike {
                        attacker: creep.id,
                        defender: troop,
                    });
                }
            }
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }

    fn resolve_strike_rounds(&mut self) -> usize {
        if self.strike_interval.is_zero() {
            self.accumulator = Duration::ZERO;
            return 0;
        }

        let mut rounds = 0;
        while self.accumulator >= self.strike_interval {
            self.accumulator -= self.strike_interval;
            rounds += 1;
        }
        rounds
    }
}

impl Default for TowerCombat {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

fn find_tower<'a>(towers: &[&'a TowerSnapshot], tower: EntityId) -> Option<&'a TowerSnapshot> {
    towers
        .binary_search_by_key(&tower, |snapshot| snapshot.id)
        .ok()
        .map(|index| towers[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::{CreepKind, CreepSnapshot, TowerKind, TowerLevel, UnitState};
    use glam::Vec3;

    fn tower(id: u64, ready_in: Duration) -> TowerSnapshot {
        TowerSnapshot {
            id: EntityId::new(id),
            kind: TowerKind::Turret,
            level: TowerLevel::One,
            position: Vec3::ZERO,
            tracked: Vec::new(),
            ready_in,
        }
    }

    fn tick(millis: u64) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_millis(millis),
        }
    }

    #[test]
    fn firing_respects_cooldown_readiness() {
        let mut system = TowerCombat::default();
        let towers = TowerView::from_snapshots(vec![
            tower(3, Duration::from_millis(250)),
            tower(8, Duration::ZERO),
        ]);
        let engagements = [
            Engagement::Tower {
                tower: EntityId::new(3),
                target: EntityId::new(9),
            },
            Engagement::Tower {
                tower: EntityId::new(8),
                target: EntityId::new(2),
            },
            Engagement::Tower {
                tower: EntityId::new(42),
                target: EntityId::new(3),
            },
        ];
        let mut out = Vec::new();

        system.handle(&[], &towers, &CreepView::default(), &engagements, &mut out);

        assert_eq!(
            out,
            vec![Command::FireProjectile {
                tower: EntityId::new(8),
                target: EntityId::new(2),
            }],
        );
    }

    #[test]
    fn ready_tower_fires_at_its_whole_window() {
        let mut system = TowerCombat::default();
        let towers = TowerView::from_snapshots(vec![tower(1, Duration::ZERO)]);
        let engagements = [
            Engagement::Tower {
                tower: EntityId::new(1),
                target: EntityId::new(4),
            },
            Engagement::Tower {
                tower: EntityId::new(1),
                target: EntityId::new(5),
            },
        ];
        let mut out = Vec::new();

        system.handle(&[], &towers, &CreepView::default(), &engagements, &mut out);

        assert_eq!(out.len(), 2);
    }

    #[test]
    fn melee_waits_for_a_full_strike_interval() {
        let mut system = TowerCombat::new(Config::new(Duration::from_millis(500)));
        let creeps = CreepView::from_snapshots(vec![CreepSnapshot {
            id: EntityId::new(7),
            kind: CreepKind::Grunt,
            unit: UnitState::new(50.0, None),
            suspended_by: Some(EntityId::new(6)),
            incoming: None,
        }]);
        let engagements = [Engagement::Troop {
            troop: EntityId::new(6),
            target: EntityId::new(7),
        }];
        let mut out = Vec::new();

        system.handle(&[tick(300)], &TowerView::default(), &creeps, &engagements, &mut out);
        assert!(out.is_empty());

        system.handle(&[tick(300)], &TowerView::default(), &creeps, &engagements, &mut out);
        assert_eq!(
            out,
            vec![
                Command::Strike {
                    attacker: EntityId::new(6),
                    defender: EntityId::new(7),
                },
                Command::Strike {
                    attacker: EntityId::new(7),
                    defender: EntityId::new(6),
                },
            ]
        );
    }

    #[test]
    fn zero_interval_never_strikes() {
        let mut system = TowerCombat::new(Config::new(Duration::ZERO));
        system.accumulator = Duration::from_secs(10);
        assert_eq!(system.resolve_strike_rounds(), 0);
    }
}
