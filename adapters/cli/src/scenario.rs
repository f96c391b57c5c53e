//! Seeded match scripts.

use std::time::Duration;

use bastion_core::{CreepKind, TowerKind};
use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SPAWN_SPACING_MS: u64 = 400;
const SPAWN_JITTER_MS: u64 = 200;

/// Creep entering the field at a fixed point in simulated time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ScheduledSpawn {
    pub(crate) at: Duration,
    pub(crate) kind: CreepKind,
    pub(crate) position: Vec3,
}

/// Tower layout and creep wave for a single match.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Scenario {
    pub(crate) towers: Vec<(TowerKind, Vec3)>,
    pub(crate) spawns: Vec<ScheduledSpawn>,
}

impl Scenario {
    /// Builds the wave from `seed`; equal seeds yield equal scenarios.
    pub(crate) fn generate(seed: u64, creeps: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let towers = vec![
            (TowerKind::Turret, Vec3::new(-2.0, 0.0, 0.0)),
            (TowerKind::Cannon, Vec3::new(2.0, 0.0, 0.0)),
            (TowerKind::Barracks, Vec3::new(0.0, 0.0, 2.0)),
        ];

        let mut spawns: Vec<ScheduledSpawn> = (0..creeps)
            .map(|index| {
                let base = SPAWN_SPACING_MS.saturating_mul(index as u64);
                ScheduledSpawn {
                    at: Duration::from_millis(base + rng.gen_range(0..SPAWN_JITTER_MS)),
                    kind: CreepKind::ALL[rng.gen_range(0..CreepKind::ALL.len())],
                    position: Vec3::new(rng.gen_range(-3.0..3.0), 0.0, rng.gen_range(-1.0..3.0)),
                }
            })
            .collect();
        spawns.sort_by_key(|spawn| spawn.at);

        Self { towers, spawns }
    }
}
