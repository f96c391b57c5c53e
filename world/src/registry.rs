//! Entity registry that exclusively owns every combat record.

use std::{collections::BTreeMap, time::Duration};

use bastion_core::{
    CreepKind, Damageable, EntityId, SubscriptionId, TowerKind, TowerLevel, UnitState,
};
use glam::Vec3;

use crate::projectiles::Projectile;

/// Tower stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct Tower {
    pub(crate) kind: TowerKind,
    pub(crate) level: TowerLevel,
    pub(crate) position: Vec3,
    /// Enemies in insertion order. May exceed capacity; only the front is eligible.
    pub(crate) tracked: Vec<EntityId>,
    pub(crate) collision_subscriptions: Vec<SubscriptionId>,
    pub(crate) ready_in: Duration,
}

impl Tower {
    pub(crate) fn new(kind: TowerKind, position: Vec3, sensor: SubscriptionId) -> Self {
        Self {
            kind,
            level: TowerLevel::default(),
            position,
            tracked: Vec::new(),
            collision_subscriptions: vec![sensor],
            ready_in: Duration::ZERO,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.kind.capacity(self.level)
    }
}

/// Troop deployed by a barracks.
#[derive(Clone, Debug)]
pub(crate) struct Troop {
    /// Owning tower, cleared when the tower is removed.
    pub(crate) tower: Option<EntityId>,
    pub(crate) unit: UnitState,
    pub(crate) attack: f32,
    pub(crate) tracked: Vec<EntityId>,
}

/// Hostile creep.
#[derive(Clone, Debug)]
pub(crate) struct Creep {
    pub(crate) kind: CreepKind,
    pub(crate) unit: UnitState,
    pub(crate) position: Vec3,
    pub(crate) incoming: Option<EntityId>,
    pub(crate) suspended_by: Option<EntityId>,
}

impl Damageable for Troop {
    fn unit(&self) -> &UnitState {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut UnitState {
        &mut self.unit
    }
}

impl Damageable for Creep {
    fn unit(&self) -> &UnitState {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut UnitState {
        &mut self.unit
    }
}

/// Every record kind the registry can hold.
#[derive(Clone, Debug)]
pub(crate) enum Combatant {
    Tower(Tower),
    Troop(Troop),
    Creep(Creep),
    Projectile(Projectile),
}

impl Combatant {
    /// Damage capability of the record, if it can be damaged.
    pub(crate) fn as_damageable_mut(&mut self) -> Option<&mut dyn Damageable> {
        match self {
            Self::Troop(troop) => Some(troop),
            Self::Creep(creep) => Some(creep),
            Self::Tower(_) | Self::Projectile(_) => None,
        }
    }

    /// Tracked-enemy list of towers and troops.
    pub(crate) fn tracked_mut(&mut self) -> Option<&mut Vec<EntityId>> {
        match self {
            Self::Tower(tower) => Some(&mut tower.tracked),
            Self::Troop(troop) => Some(&mut troop.tracked),
            Self::Creep(_) | Self::Projectile(_) => None,
        }
    }

    /// Melee damage dealt by troops and creeps.
    pub(crate) fn melee_attack(&self) -> Option<f32> {
        match self {
            Self::Troop(troop) => Some(troop.attack),
            Self::Creep(creep) => Some(creep.kind.attack()),
            Self::Tower(_) | Self::Projectile(_) => None,
        }
    }
}

/// Ordered map from identifier to record.
///
/// Mutations are single-writer. Removing an id never cascades into the
/// back-references other records hold; `get` returning `None` means "already
/// gone", never an error.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: BTreeMap<EntityId, Combatant>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: EntityId, record: Combatant) {
        if self.entries.insert(id, record).is_some() {
            log::warn!("entity {} was inserted twice; previous record replaced", id.get());
        }
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&Combatant> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Combatant> {
        self.entries.remove(&id)
    }

    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Visits every record in identifier order.
    pub(crate) fn for_each(&self, mut visitor: impl FnMut(EntityId, &Combatant)) {
        for (id, record) in &self.entries {
            visitor(*id, record);
        }
    }

    /// Visits every record mutably in identifier order.
    pub(crate) fn for_each_mut(&mut self, mut visitor: impl FnMut(EntityId, &mut Combatant)) {
        for (id, record) in &mut self.entries {
            visitor(*id, record);
        }
    }

    pub(crate) fn tower(&self, id: EntityId) -> Option<&Tower> {
        match self.get(id)? {
            Combatant::Tower(tower) => Some(tower),
            _ => None,
        }
    }

    pub(crate) fn tower_mut(&mut self, id: EntityId) -> Option<&mut Tower> {
        match self.get_mut(id)? {
            Combatant::Tower(tower) => Some(tower),
            _ => None,
        }
    }

    pub(crate) fn troop(&self, id: EntityId) -> Option<&Troop> {
        match self.get(id)? {
            Combatant::Troop(troop) => Some(troop),
            _ => None,
        }
    }

    pub(crate) fn creep(&self, id: EntityId) -> Option<&Creep> {
        match self.get(id)? {
            Combatant::Creep(creep) => Some(creep),
            _ => None,
        }
    }

    pub(crate) fn creep_mut(&mut self, id: EntityId) -> Option<&mut Creep> {
        match self.get_mut(id)? {
            Combatant::Creep(creep) => Some(creep),
            _ => None,
        }
    }

    pub(crate) fn projectile_mut(&mut self, id: EntityId) -> Option<&mut Projectile> {
        match self.get_mut(id)? {
            Combatant::Projectile(projectile) => Some(projectile),
            _ => None,
        }
    }

    pub(crate) fn towers(&self) -> impl Iterator<Item = (EntityId, &Tower)> {
        self.entries.iter().filter_map(|(id, record)| match record {
            Combatant::Tower(tower) => Some((*id, tower)),
            _ => None,
        })
    }

    pub(crate) fn troops(&self) -> impl Iterator<Item = (EntityId, &Troop)> {
        self.entries.iter().filter_map(|(id, record)| match record {
            Combatant::Troop(troop) => Some((*id, troop)),
            _ => None,
        })
    }

    pub(crate) fn creeps(&self) -> impl Iterator<Item = (EntityId, &Creep)> {
        self.entries.iter().filter_map(|(id, record)| match record {
            Combatant::Creep(creep) => Some((*id, creep)),
            _ => None,
        })
    }

    pub(crate) fn projectiles(&self) -> impl Iterator<Item = (EntityId, &Projectile)> {
        self.entries.iter().filter_map(|(id, record)| match record {
            Combatant::Projectile(projectile) => Some((*id, projectile)),
            _ => None,
        })
    }
}
