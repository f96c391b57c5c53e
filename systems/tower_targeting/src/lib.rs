#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that derives engagements from tracked-enemy lists.
//!
//! Each tower and troop may only engage the front of its tracked-enemy list,
//! capped by its capacity. Entries in that window that no longer refer to a
//! live creep are skipped.

use bastion_core::{CreepView, Engagement, EntityId, TowerView, TroopView};

/// Tower targeting system that reuses scratch buffers to avoid repeated allocations.
#[derive(Debug, Default)]
pub struct TowerTargeting {
    live_creeps: Vec<EntityId>,
}

impl TowerTargeting {
    /// Creates a new tower targeting system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes engagements for the provided views.
    ///
    /// The output buffer is cleared before populating it. Tower engagements
    /// precede troop engagements; both follow identifier order and then
    /// tracked-list order.
    pub fn handle(
        &mut self,
        towers: &TowerView,
        troops: &TroopView,
        creeps: &CreepView,
        out: &mut Vec<Engagement>,
    ) {
        out.clear();

        if creeps.is_empty() {
            return;
        }

        self.live_creeps.clear();
        self.live_creeps
            .extend(creeps.iter().map(|snapshot| snapshot.id));
        self.live_creeps.sort_unstable();

        for tower in towers.iter() {
            for target in tower.eligible() {
                if self.is_live(*target) {
                    out.push(Engagement::Tower {
                        tower: tower.id,
                        target: *target,
                    });
                }
            }
        }

        for troop in troops.iter() {
            for target in troop.eligible() {
                if self.is_live(*target) {
                    out.push(Engagement::Troop {
                        troop: troop.id,
                        target: *target,
                    });
                }
            }
        }
    }

    fn is_live(&self, creep: EntityId) -> bool {
        self.live_creeps.binary_search(&creep).is_ok()
    }
}
