#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Bastion combat engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! views, and respond exclusively with new command batches.

mod health;

use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub use health::{DamageOutcome, Damageable, HealthBarBucket, HealthBarThresholds, UnitState};

/// Canonical banner emitted when a match boots.
pub const WELCOME_BANNER: &str = "Welcome to Bastion.";

/// Number of enemies a single troop may engage at once.
pub const TROOP_CAPACITY: usize = 1;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Places a tower at the provided anchor position.
    PlaceTower {
        /// Type of tower to construct.
        kind: TowerKind,
        /// Scene position the tower is anchored to.
        position: Vec3,
    },
    /// Removes a tower, orphaning any troops it deployed.
    RemoveTower {
        /// Identifier of the tower targeted for removal.
        tower: EntityId,
    },
    /// Spends currency to raise a tower to its next level.
    UpgradeTower {
        /// Identifier of the tower to upgrade.
        tower: EntityId,
    },
    /// Deploys a troop from a barracks tower.
    DeployTroop {
        /// Tower that owns the new troop.
        tower: EntityId,
        /// Scene position where the troop is stationed.
        position: Vec3,
    },
    /// Spawns a hostile creep.
    SpawnCreep {
        /// Type of creep to spawn.
        kind: CreepKind,
        /// Scene position where the creep enters the field.
        position: Vec3,
    },
    /// Appends an enemy to a tower's or troop's tracked-enemy list.
    TrackEnemy {
        /// Tower or troop that detected the enemy.
        attacker: EntityId,
        /// Creep that entered the attacker's reach.
        enemy: EntityId,
    },
    /// Removes an enemy from a tower's or troop's tracked-enemy list.
    ReleaseEnemy {
        /// Tower or troop that lost sight of the enemy.
        attacker: EntityId,
        /// Creep that left the attacker's reach.
        enemy: EntityId,
    },
    /// Suspends a creep because a troop blocked its path.
    EngageTroop {
        /// Creep being stopped.
        creep: EntityId,
        /// Troop holding the creep in place.
        troop: EntityId,
    },
    /// Requests that a tower fires a projectile at a tracked enemy.
    FireProjectile {
        /// Tower that fires.
        tower: EntityId,
        /// Creep the projectile flies towards.
        target: EntityId,
    },
    /// Notifies the world that the flight animation behind a handle finished.
    CompleteFlight {
        /// Handle identifying the completed flight.
        flight: FlightHandle,
    },
    /// Resolves a melee hit using the attacker's attack value.
    Strike {
        /// Troop or creep dealing the hit.
        attacker: EntityId,
        /// Creep or troop receiving the hit.
        defender: EntityId,
    },
    /// Resolves an explicit amount of damage against a defender.
    ResolveDamage {
        /// Combatant receiving the damage.
        defender: EntityId,
        /// Combatant credited with the damage.
        attacker: EntityId,
        /// Hit points removed from the defender.
        amount: f32,
    },
    /// Declares the current wave cleared.
    CompleteMission,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a tower was placed into the world.
    TowerPlaced {
        /// Identifier assigned to the tower.
        tower: EntityId,
        /// Type of tower that was placed.
        kind: TowerKind,
        /// Scene position the tower is anchored to.
        position: Vec3,
        /// Collision subscription registered for the tower's reach sensor.
        sensor: SubscriptionId,
    },
    /// Confirms that a tower was removed from the world.
    TowerRemoved {
        /// Identifier of the removed tower.
        tower: EntityId,
        /// Troops that lost their owning tower.
        orphaned: Vec<EntityId>,
    },
    /// Confirms that a collision subscription was cancelled.
    CollisionCancelled {
        /// Tower that held the subscription.
        tower: EntityId,
        /// Subscription that was cancelled.
        subscription: SubscriptionId,
    },
    /// Confirms that a tower advanced to a new level.
    TowerUpgraded {
        /// Identifier of the upgraded tower.
        tower: EntityId,
        /// Level the tower reached.
        level: TowerLevel,
    },
    /// Reports that an upgrade request was rejected.
    UpgradeRejected {
        /// Identifier of the tower targeted by the request.
        tower: EntityId,
        /// Specific reason the upgrade failed.
        reason: UpgradeError,
    },
    /// Confirms that a troop was deployed.
    TroopDeployed {
        /// Identifier assigned to the troop.
        troop: EntityId,
        /// Tower that owns the troop.
        tower: EntityId,
        /// Health-bar child attached to the troop.
        health_bar: HealthBarId,
        /// Scene position of the troop.
        position: Vec3,
    },
    /// Confirms that a creep entered the field.
    CreepSpawned {
        /// Identifier assigned to the creep.
        creep: EntityId,
        /// Type of the creep.
        kind: CreepKind,
        /// Health-bar child attached to the creep.
        health_bar: HealthBarId,
        /// Scene position of the creep.
        position: Vec3,
    },
    /// Confirms that an enemy was appended to a tracked-enemy list.
    EnemyTracked {
        /// Tower or troop tracking the enemy.
        attacker: EntityId,
        /// Tracked creep.
        enemy: EntityId,
    },
    /// Confirms that an enemy left a tracked-enemy list.
    EnemyReleased {
        /// Tower or troop that stopped tracking the enemy.
        attacker: EntityId,
        /// Released creep.
        enemy: EntityId,
    },
    /// Reports that a creep was stopped by a troop.
    CreepSuspended {
        /// Suspended creep.
        creep: EntityId,
        /// Troop holding the creep.
        troop: EntityId,
    },
    /// Reports that a suspended creep resumed its advance.
    CreepResumed {
        /// Creep that resumed.
        creep: EntityId,
    },
    /// Confirms that a projectile left its tower.
    ProjectileLaunched {
        /// Identifier assigned to the projectile.
        projectile: EntityId,
        /// Tower that fired.
        tower: EntityId,
        /// Creep the projectile is flying towards.
        target: EntityId,
        /// Handle correlating the flight with its completion notification.
        flight: FlightHandle,
        /// Launch position.
        from: Vec3,
        /// Destination position.
        to: Vec3,
        /// Duration of the flight animation.
        duration: Duration,
    },
    /// Confirms that a projectile's flight subscription was cancelled.
    FlightCancelled {
        /// Projectile that held the subscription.
        projectile: EntityId,
        /// Flight handle whose subscription was cancelled.
        flight: FlightHandle,
    },
    /// Confirms that a projectile was permanently retired.
    ProjectileRetired {
        /// Retired projectile.
        projectile: EntityId,
    },
    /// Reports that damage was applied to a combatant.
    DamageApplied {
        /// Combatant that received the damage.
        defender: EntityId,
        /// Combatant credited with the damage.
        attacker: EntityId,
        /// Hit points removed.
        amount: f32,
        /// Hit points left afterwards, possibly negative.
        remaining: f32,
    },
    /// Reports that a health-bar child was swapped for a new visual state.
    HealthBarReplaced {
        /// Combatant owning the health bar.
        unit: EntityId,
        /// Child that was detached.
        previous: HealthBarId,
        /// Child attached in its place.
        replacement: HealthBarId,
        /// Visual bucket selected for the new fraction.
        bucket: HealthBarBucket,
    },
    /// Reports that a creep was killed.
    CreepKilled {
        /// Killed creep.
        creep: EntityId,
        /// Combatant credited with the kill.
        killer: EntityId,
        /// Currency granted for the kill.
        reward: u32,
    },
    /// Reports that a troop died.
    TroopDied {
        /// Troop that died.
        troop: EntityId,
    },
    /// Reports the treasury balance after it changed.
    CurrencyChanged {
        /// Currency available after the change.
        balance: u32,
    },
    /// Requests that the visual model of an entity is detached from the scene.
    ModelDetached {
        /// Entity whose model was detached.
        entity: EntityId,
    },
    /// Signals that a deferred mission-completion check is due.
    MissionCheckDue,
    /// Signals that the current wave was cleared.
    MissionCompleted,
}

/// Unique identifier assigned to a combat entity for the lifetime of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier of a health-bar child attached to a unit's model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HealthBarId(u64);

impl HealthBarId {
    /// Creates a new health-bar identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Opaque token identifying one in-flight projectile's animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlightHandle(u64);

impl FlightHandle {
    /// Creates a new flight handle.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Identifier of a collision subscription held by a tower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Types of towers that can be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TowerKind {
    /// Fast-firing tower with light projectiles.
    Turret,
    /// Slow tower with heavy projectiles.
    Cannon,
    /// Tower that deploys troops and fires light projectiles.
    Barracks,
}

impl TowerKind {
    /// Every tower kind in declaration order.
    pub const ALL: [Self; 3] = [Self::Turret, Self::Cannon, Self::Barracks];

    /// Number of tracked enemies eligible for firing at the provided level.
    #[must_use]
    pub const fn capacity(self, level: TowerLevel) -> usize {
        match (self, level) {
            (Self::Turret, TowerLevel::One) => 1,
            (Self::Turret, TowerLevel::Two) => 2,
            (Self::Turret, TowerLevel::Three) => 3,
            (Self::Cannon, TowerLevel::One) => 1,
            (Self::Cannon, TowerLevel::Two) => 1,
            (Self::Cannon, TowerLevel::Three) => 2,
            (Self::Barracks, TowerLevel::One) => 2,
            (Self::Barracks, TowerLevel::Two) => 3,
            (Self::Barracks, TowerLevel::Three) => 4,
        }
    }

    /// Damage carried by each projectile fired at the provided level.
    #[must_use]
    pub const fn attack(self, level: TowerLevel) -> f32 {
        match (self, level) {
            (Self::Turret, TowerLevel::One) => 20.0,
            (Self::Turret, TowerLevel::Two) => 30.0,
            (Self::Turret, TowerLevel::Three) => 45.0,
            (Self::Cannon, TowerLevel::One) => 60.0,
            (Self::Cannon, TowerLevel::Two) => 90.0,
            (Self::Cannon, TowerLevel::Three) => 140.0,
            (Self::Barracks, TowerLevel::One) => 10.0,
            (Self::Barracks, TowerLevel::Two) => 15.0,
            (Self::Barracks, TowerLevel::Three) => 20.0,
        }
    }

    /// Minimum simulated time between two shots of the same tower.
    #[must_use]
    pub const fn fire_interval(self) -> Duration {
        match self {
            Self::Turret => Duration::from_millis(500),
            Self::Cannon => Duration::from_millis(1_500),
            Self::Barracks => Duration::from_millis(1_000),
        }
    }

    /// Currency required to raise the tower from `level` to the next level.
    ///
    /// Returns `None` once the tower reached its final level.
    #[must_use]
    pub const fn upgrade_cost(self, level: TowerLevel) -> Option<u32> {
        match (self, level) {
            (_, TowerLevel::Three) => None,
            (Self::Turret, TowerLevel::One) => Some(50),
            (Self::Turret, TowerLevel::Two) => Some(100),
            (Self::Cannon, TowerLevel::One) => Some(80),
            (Self::Cannon, TowerLevel::Two) => Some(160),
            (Self::Barracks, TowerLevel::One) => Some(60),
            (Self::Barracks, TowerLevel::Two) => Some(120),
        }
    }

    /// Reports whether the tower kind can deploy troops.
    #[must_use]
    pub const fn deploys_troops(self) -> bool {
        matches!(self, Self::Barracks)
    }
}

/// Upgrade level of a tower.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TowerLevel {
    /// Initial level of every placed tower.
    #[default]
    One,
    /// Level reached after the first upgrade.
    Two,
    /// Final level.
    Three,
}

impl TowerLevel {
    /// Level following this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::One => Some(Self::Two),
            Self::Two => Some(Self::Three),
            Self::Three => None,
        }
    }

    /// Maximum hit points of troops deployed by a tower at this level.
    #[must_use]
    pub const fn troop_health(self) -> f32 {
        match self {
            Self::One => 10.0,
            Self::Two => 20.0,
            Self::Three => 35.0,
        }
    }

    /// Melee damage dealt by troops deployed by a tower at this level.
    #[must_use]
    pub const fn troop_attack(self) -> f32 {
        match self {
            Self::One => 4.0,
            Self::Two => 6.0,
            Self::Three => 9.0,
        }
    }
}

/// Types of hostile creeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CreepKind {
    /// Baseline infantry.
    Grunt,
    /// Fragile but quick.
    Runner,
    /// Slow and heavily armoured.
    Brute,
}

impl CreepKind {
    /// Every creep kind in declaration order.
    pub const ALL: [Self; 3] = [Self::Grunt, Self::Runner, Self::Brute];

    /// Hit points the creep spawns with.
    #[must_use]
    pub const fn max_health(self) -> f32 {
        match self {
            Self::Grunt => 50.0,
            Self::Runner => 30.0,
            Self::Brute => 150.0,
        }
    }

    /// Melee damage dealt to troops.
    #[must_use]
    pub const fn attack(self) -> f32 {
        match self {
            Self::Grunt => 5.0,
            Self::Runner => 3.0,
            Self::Brute => 12.0,
        }
    }

    /// Currency granted when the creep is killed.
    #[must_use]
    pub const fn reward(self) -> u32 {
        match self {
            Self::Grunt => 10,
            Self::Runner => 8,
            Self::Brute => 25,
        }
    }
}

/// Reasons a tower upgrade may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeError {
    /// No tower with the provided identifier exists.
    MissingTower,
    /// The tower already reached its final level.
    MaximumLevel,
    /// The treasury cannot cover the upgrade cost.
    InsufficientFunds,
}

/// Returns the slice of tracked enemies eligible for engagement.
///
/// Only the first `min(tracked.len(), capacity)` entries qualify, in
/// insertion order.
#[must_use]
pub fn eligible_targets(tracked: &[EntityId], capacity: usize) -> &[EntityId] {
    &tracked[..tracked.len().min(capacity)]
}

/// Attacker-target pair selected from an eligible window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Engagement {
    /// Tower ready to fire projectiles at the target.
    Tower {
        /// Engaging tower.
        tower: EntityId,
        /// Live creep inside the tower's eligible window.
        target: EntityId,
    },
    /// Troop fighting the target in melee.
    Troop {
        /// Engaging troop.
        troop: EntityId,
        /// Live creep inside the troop's eligible window.
        target: EntityId,
    },
}

/// Immutable representation of a single tower's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct TowerSnapshot {
    /// Identifier allocated to the tower by the world.
    pub id: EntityId,
    /// Kind of tower that was constructed.
    pub kind: TowerKind,
    /// Current upgrade level.
    pub level: TowerLevel,
    /// Scene position the tower is anchored to.
    pub position: Vec3,
    /// Tracked enemies in insertion order.
    pub tracked: Vec<EntityId>,
    /// Time left before the tower may fire again.
    pub ready_in: Duration,
}

impl TowerSnapshot {
    /// Enemies the tower may currently fire at.
    #[must_use]
    pub fn eligible(&self) -> &[EntityId] {
        eligible_targets(&self.tracked, self.kind.capacity(self.level))
    }
}

/// Read-only snapshot describing all towers.
#[derive(Clone, Debug, Default)]
pub struct TowerView {
    snapshots: Vec<TowerSnapshot>,
}

impl TowerView {
    /// Creates a new tower view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TowerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured tower snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TowerSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TowerSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single troop's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct TroopSnapshot {
    /// Identifier allocated to the troop by the world.
    pub id: EntityId,
    /// Owning tower, `None` once orphaned.
    pub tower: Option<EntityId>,
    /// Hit-point bookkeeping of the troop.
    pub unit: UnitState,
    /// Tracked enemies in insertion order.
    pub tracked: Vec<EntityId>,
}

impl TroopSnapshot {
    /// Enemies the troop may currently strike.
    #[must_use]
    pub fn eligible(&self) -> &[EntityId] {
        eligible_targets(&self.tracked, TROOP_CAPACITY)
    }
}

/// Read-only snapshot describing all troops.
#[derive(Clone, Debug, Default)]
pub struct TroopView {
    snapshots: Vec<TroopSnapshot>,
}

impl TroopView {
    /// Creates a new troop view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TroopSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured troop snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TroopSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TroopSnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single creep's state used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct CreepSnapshot {
    /// Identifier allocated to the creep by the world.
    pub id: EntityId,
    /// Type of the creep.
    pub kind: CreepKind,
    /// Hit-point bookkeeping of the creep.
    pub unit: UnitState,
    /// Troop currently holding the creep, if any.
    pub suspended_by: Option<EntityId>,
    /// Most recent projectile fired at the creep that is still in flight.
    pub incoming: Option<EntityId>,
}

/// Read-only snapshot describing all creeps.
#[derive(Clone, Debug, Default)]
pub struct CreepView {
    snapshots: Vec<CreepSnapshot>,
}

impl CreepView {
    /// Creates a new creep view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<CreepSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured creep snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &CreepSnapshot> {
        self.snapshots.iter()
    }

    /// Number of creeps captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no creeps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        eligible_targets, Command, CreepKind, EntityId, FlightHandle, TowerKind, TowerLevel,
        UpgradeError,
    };
    use glam::Vec3;
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn commands_survive_binary_encoding() {
        assert_round_trip(&Command::PlaceTower {
            kind: TowerKind::Cannon,
            position: Vec3::new(1.0, 0.0, -2.5),
        });
        assert_round_trip(&Command::CompleteFlight {
            flight: FlightHandle::new(9),
        });
        assert_round_trip(&UpgradeError::InsufficientFunds);
    }

    #[test]
    fn capacity_never_shrinks_with_level() {
        for kind in [TowerKind::Turret, TowerKind::Cannon, TowerKind::Barracks] {
            let one = kind.capacity(TowerLevel::One);
            let two = kind.capacity(TowerLevel::Two);
            let three = kind.capacity(TowerLevel::Three);
            assert!(one >= 1, "{kind:?} must engage at least one enemy");
            assert!(one <= two && two <= three, "{kind:?} capacity regressed");
        }
    }

    #[test]
    fn final_level_has_no_upgrade_cost() {
        assert_eq!(TowerLevel::Three.next(), None);
        assert_eq!(TowerKind::Turret.upgrade_cost(TowerLevel::Three), None);
        assert_eq!(TowerKind::Turret.upgrade_cost(TowerLevel::One), Some(50));
    }

    #[test]
    fn eligible_window_keeps_insertion_order() {
        let tracked = [EntityId::new(7), EntityId::new(3), EntityId::new(5)];
        assert_eq!(
            eligible_targets(&tracked, 2),
            &[EntityId::new(7), EntityId::new(3)]
        );
        assert_eq!(eligible_targets(&tracked, 10), &tracked);
        assert!(eligible_targets(&[], 2).is_empty());
    }

    #[test]
    fn grunt_dies_to_a_single_cannon_shot() {
        let attack = TowerKind::Cannon.attack(TowerLevel::One);
        assert!(CreepKind::Grunt.max_health() - attack < 0.0);
    }
}
