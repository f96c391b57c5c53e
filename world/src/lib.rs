#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative combat state for Bastion.
//!
//! The world exclusively owns towers, troops, creeps and projectiles. All
//! mutations flow through [`apply`], which runs on a single logical thread and
//! reports what happened as [`Event`] values.

mod combat;
mod economy;
mod projectiles;
mod registry;
mod schedule;

use std::time::Duration;

use bastion_core::{
    Command, EntityId, Event, FlightHandle, HealthBarId, HealthBarThresholds, SubscriptionId,
    UnitState, UpgradeError, WELCOME_BANNER,
};
use serde::{Deserialize, Serialize};

use self::{
    economy::Treasury,
    registry::{Combatant, Creep, Registry, Tower, Troop},
    schedule::{DeferredAction, Scheduler},
};

const DEFAULT_STARTING_CURRENCY: u32 = 100;
const DEFAULT_FLIGHT_DURATION_MS: u64 = 400;
const DEFAULT_MISSION_CHECK_DELAY_MS: u64 = 500;

/// Match configuration consumed by the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    starting_currency: u32,
    flight_duration_ms: u64,
    mission_check_delay_ms: u64,
    health_bars: HealthBarThresholds,
}

impl Config {
    /// Overrides the currency available when the match starts.
    #[must_use]
    pub fn with_starting_currency(mut self, starting_currency: u32) -> Self {
        self.starting_currency = starting_currency;
        self
    }

    /// Overrides the duration of every projectile flight.
    #[must_use]
    pub fn with_flight_duration(mut self, duration: Duration) -> Self {
        self.flight_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Overrides the delay between a creep death and the mission check.
    #[must_use]
    pub fn with_mission_check_delay(mut self, delay: Duration) -> Self {
        self.mission_check_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Overrides the health-bar threshold table.
    #[must_use]
    pub fn with_health_bars(mut self, health_bars: HealthBarThresholds) -> Self {
        self.health_bars = health_bars;
        self
    }

    /// Currency available when the match starts.
    #[must_use]
    pub const fn starting_currency(&self) -> u32 {
        self.starting_currency
    }

    /// Duration of every projectile flight.
    #[must_use]
    pub const fn flight_duration(&self) -> Duration {
        Duration::from_millis(self.flight_duration_ms)
    }

    /// Delay between a creep death and the deferred mission check.
    #[must_use]
    pub const fn mission_check_delay(&self) -> Duration {
        Duration::from_millis(self.mission_check_delay_ms)
    }

    /// Threshold table used to pick health-bar buckets.
    #[must_use]
    pub const fn health_bars(&self) -> &HealthBarThresholds {
        &self.health_bars
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_currency: DEFAULT_STARTING_CURRENCY,
            flight_duration_ms: DEFAULT_FLIGHT_DURATION_MS,
            mission_check_delay_ms: DEFAULT_MISSION_CHECK_DELAY_MS,
            health_bars: HealthBarThresholds::default(),
        }
    }
}

/// Monotonic identifier counters. Identifiers are never reused within a match.
#[derive(Debug, Default)]
struct Identifiers {
    entity: u64,
    health_bar: u64,
    flight: u64,
    subscription: u64,
}

impl Identifiers {
    fn entity(&mut self) -> EntityId {
        let id = EntityId::new(self.entity);
        self.entity += 1;
        id
    }

    fn health_bar(&mut self) -> HealthBarId {
        let id = HealthBarId::new(self.health_bar);
        self.health_bar += 1;
        id
    }

    fn flight(&mut self) -> FlightHandle {
        let id = FlightHandle::new(self.flight);
        self.flight += 1;
        id
    }

    fn subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId::new(self.subscription);
        self.subscription += 1;
        id
    }
}

/// Represents the authoritative Bastion combat state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    config: Config,
    registry: Registry,
    treasury: Treasury,
    scheduler: Scheduler,
    ids: Identifiers,
    tick_index: u64,
}

impl World {
    /// Creates a world using the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a world using the provided configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            banner: WELCOME_BANNER,
            treasury: Treasury::new(config.starting_currency()),
            config,
            registry: Registry::new(),
            scheduler: Scheduler::new(),
            ids: Identifiers::default(),
            tick_index: 0,
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });

            world.registry.for_each_mut(|_, record| {
                if let Combatant::Tower(tower) = record {
                    tower.ready_in = tower.ready_in.saturating_sub(dt);
                }
            });
            projectiles::advance_flights(world, dt);

            for action in world.scheduler.advance(dt) {
                match action {
                    DeferredAction::MissionCheck => out_events.push(Event::MissionCheckDue),
                }
            }
        }
        Command::PlaceTower { kind, position } => {
            let tower = world.ids.entity();
            let sensor = world.ids.subscription();
            world
                .registry
                .insert(tower, Combatant::Tower(Tower::new(kind, position, sensor)));
            out_events.push(Event::TowerPlaced {
                tower,
                kind,
                position,
                sensor,
            });
        }
        Command::RemoveTower { tower } => remove_tower(world, tower, out_events),
        Command::UpgradeTower { tower } => upgrade_tower(world, tower, out_events),
        Command::DeployTroop { tower, position } => {
            let Some(owner) = world.registry.tower(tower) else {
                log::debug!("cannot deploy from missing tower {}", tower.get());
                return;
            };
            if !owner.kind.deploys_troops() {
                log::debug!("tower {} does not deploy troops", tower.get());
                return;
            }
            let level = owner.level;

            let troop = world.ids.entity();
            let health_bar = world.ids.health_bar();
            world.registry.insert(
                troop,
                Combatant::Troop(Troop {
                    tower: Some(tower),
                    unit: UnitState::new(level.troop_health(), Some(health_bar)),
                    attack: level.troop_attack(),
                    tracked: Vec::new(),
                }),
            );
            out_events.push(Event::TroopDeployed {
                troop,
                tower,
                health_bar,
                position,
            });
        }
        Command::SpawnCreep { kind, position } => {
            let creep = world.ids.entity();
            let health_bar = world.ids.health_bar();
            world.registry.insert(
                creep,
                Combatant::Creep(Creep {
                    kind,
                    unit: UnitState::new(kind.max_health(), Some(health_bar)),
                    position,
                    incoming: None,
                    suspended_by: None,
                }),
            );
            out_events.push(Event::CreepSpawned {
                creep,
                kind,
                health_bar,
                position,
            });
        }
        Command::TrackEnemy { attacker, enemy } => {
            if world.registry.creep(enemy).is_none() {
                log::debug!("cannot track missing creep {}", enemy.get());
                return;
            }
            let Some(tracked) = world.registry.get_mut(attacker).and_then(Combatant::tracked_mut)
            else {
                log::debug!("entity {} cannot track enemies", attacker.get());
                return;
            };
            if tracked.contains(&enemy) {
                return;
            }
            tracked.push(enemy);
            out_events.push(Event::EnemyTracked { attacker, enemy });
        }
        Command::ReleaseEnemy { attacker, enemy } => {
            let Some(tracked) = world.registry.get_mut(attacker).and_then(Combatant::tracked_mut)
            else {
                return;
            };
            let before = tracked.len();
            tracked.retain(|id| *id != enemy);
            if tracked.len() != before {
                out_events.push(Event::EnemyReleased { attacker, enemy });
            }
        }
        Command::EngageTroop { creep, troop } => {
            if world.registry.troop(troop).is_none() {
                log::debug!("troop {} is gone; creep {} keeps moving", troop.get(), creep.get());
                return;
            }
            let Some(record) = world.registry.creep_mut(creep) else {
                return;
            };
            if record.suspended_by.is_some() {
                return;
            }
            record.suspended_by = Some(troop);
            out_events.push(Event::CreepSuspended { creep, troop });
        }
        Command::FireProjectile { tower, target } => {
            projectiles::launch(world, tower, target, out_events);
        }
        Command::CompleteFlight { flight } => {
            projectiles::complete_flight(world, flight, out_events);
        }
        Command::Strike { attacker, defender } => {
            combat::strike(world, attacker, defender, out_events);
        }
        Command::ResolveDamage {
            defender,
            attacker,
            amount,
        } => combat::resolve(world, defender, attacker, amount, out_events),
        Command::CompleteMission => {
            if world.registry.creeps().next().is_some() {
                log::debug!("mission completion requested while creeps remain");
                return;
            }
            out_events.push(Event::MissionCompleted);
        }
    }
}

fn remove_tower(world: &mut World, tower: EntityId, out_events: &mut Vec<Event>) {
    if world.registry.tower(tower).is_none() {
        log::debug!("tower {} already removed", tower.get());
        return;
    }
    let Some(Combatant::Tower(record)) = world.registry.remove(tower) else {
        return;
    };

    for subscription in record.collision_subscriptions {
        out_events.push(Event::CollisionCancelled {
            tower,
            subscription,
        });
    }

    let mut orphaned = Vec::new();
    world.registry.for_each_mut(|id, other| {
        if let Combatant::Troop(troop) = other {
            if troop.tower == Some(tower) {
                troop.tower = None;
                orphaned.push(id);
            }
        }
    });

    out_events.push(Event::ModelDetached { entity: tower });
    out_events.push(Event::TowerRemoved { tower, orphaned });
}

fn upgrade_tower(world: &mut World, tower: EntityId, out_events: &mut Vec<Event>) {
    let rejection = match world.registry.tower(tower) {
        None => Err(UpgradeError::MissingTower),
        Some(record) => match (record.level.next(), record.kind.upgrade_cost(record.level)) {
            (Some(level), Some(cost)) => Ok((level, cost)),
            _ => Err(UpgradeError::MaximumLevel),
        },
    };

    let (level, cost) = match rejection {
        Ok(upgrade) => upgrade,
        Err(reason) => {
            out_events.push(Event::UpgradeRejected { tower, reason });
            return;
        }
    };

    if !world.treasury.spend(cost) {
        out_events.push(Event::UpgradeRejected {
            tower,
            reason: UpgradeError::InsufficientFunds,
        });
        return;
    }

    if let Some(record) = world.registry.tower_mut(tower) {
        record.level = level;
    }
    out_events.push(Event::CurrencyChanged {
        balance: world.treasury.balance(),
    });
    out_events.push(Event::TowerUpgraded { tower, level });
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use bastion_core::{
        CreepSnapshot, CreepView, EntityId, TowerSnapshot, TowerView, TroopSnapshot, TroopView,
        UnitState,
    };

    use super::{registry::Combatant, Config, World};

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Provides read-only access to the match configuration.
    #[must_use]
    pub fn config(world: &World) -> &Config {
        &world.config
    }

    /// Currency currently held by the treasury.
    #[must_use]
    pub fn currency(world: &World) -> u32 {
        world.treasury.balance()
    }

    /// Number of ticks processed so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Reports whether any record with the provided identifier exists.
    #[must_use]
    pub fn contains(world: &World, id: EntityId) -> bool {
        world.registry.contains(id)
    }

    /// Hit-point bookkeeping of a troop or creep.
    #[must_use]
    pub fn unit(world: &World, id: EntityId) -> Option<UnitState> {
        match world.registry.get(id)? {
            Combatant::Troop(troop) => Some(troop.unit),
            Combatant::Creep(creep) => Some(creep.unit),
            Combatant::Tower(_) | Combatant::Projectile(_) => None,
        }
    }

    /// Tracked-enemy list of a tower or troop.
    #[must_use]
    pub fn tracked_enemies(world: &World, id: EntityId) -> Option<&[EntityId]> {
        match world.registry.get(id)? {
            Combatant::Tower(tower) => Some(&tower.tracked),
            Combatant::Troop(troop) => Some(&troop.tracked),
            Combatant::Creep(_) | Combatant::Projectile(_) => None,
        }
    }

    /// Captures a read-only view of every tower.
    #[must_use]
    pub fn tower_view(world: &World) -> TowerView {
        let mut snapshots = Vec::new();
        world.registry.for_each(|id, record| {
            if let Combatant::Tower(tower) = record {
                snapshots.push(TowerSnapshot {
                    id,
                    kind: tower.kind,
                    level: tower.level,
                    position: tower.position,
                    tracked: tower.tracked.clone(),
                    ready_in: tower.ready_in,
                });
            }
        });
        TowerView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of every troop.
    #[must_use]
    pub fn troop_view(world: &World) -> TroopView {
        let snapshots = world
            .registry
            .troops()
            .map(|(id, troop)| TroopSnapshot {
                id,
                tower: troop.tower,
                unit: troop.unit,
                tracked: troop.tracked.clone(),
            })
            .collect();
        TroopView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of every creep.
    #[must_use]
    pub fn creep_view(world: &World) -> CreepView {
        let snapshots = world
            .registry
            .creeps()
            .map(|(id, creep)| CreepSnapshot {
                id,
                kind: creep.kind,
                unit: creep.unit,
                suspended_by: creep.suspended_by,
                incoming: creep.incoming,
            })
            .collect();
        CreepView::from_snapshots(snapshots)
    }

    /// Number of towers currently placed.
    #[must_use]
    pub fn tower_count(world: &World) -> usize {
        world.registry.towers().count()
    }

    /// Number of creeps currently alive.
    #[must_use]
    pub fn creep_count(world: &World) -> usize {
        world.registry.creeps().count()
    }

    /// Number of projectiles that have not been retired yet.
    #[must_use]
    pub fn projectile_count(world: &World) -> usize {
        world.registry.projectiles().count()
    }

    /// Number of deferred actions waiting for their delay to elapse.
    #[must_use]
    pub fn pending_deferred(world: &World) -> usize {
        world.scheduler.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::{TowerKind, TowerLevel};
    use glam::Vec3;

    fn place(world: &mut World, kind: TowerKind) -> EntityId {
        let mut events = Vec::new();
        apply(
            world,
            Command::PlaceTower {
                kind,
                position: Vec3::ZERO,
            },
            &mut events,
        );
        match events.as_slice() {
            [Event::TowerPlaced { tower, .. }] => *tower,
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn identifiers_are_unique_across_entity_kinds() {
        let mut world = World::new();
        let tower = place(&mut world, TowerKind::Barracks);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnCreep {
                kind: bastion_core::CreepKind::Grunt,
                position: Vec3::ONE,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::DeployTroop {
                tower,
                position: Vec3::ONE,
            },
            &mut events,
        );

        let mut ids = vec![tower];
        for event in &events {
            match event {
                Event::CreepSpawned { creep, .. } => ids.push(*creep),
                Event::TroopDeployed { troop, .. } => ids.push(*troop),
                _ => {}
            }
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn upgrade_spends_currency_until_maximum_level() {
        let mut world = World::with_config(Config::default().with_starting_currency(500));
        let tower = place(&mut world, TowerKind::Turret);
        let mut events = Vec::new();

        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);

        assert_eq!(query::currency(&world), 350);
        assert!(events.contains(&Event::TowerUpgraded {
            tower,
            level: TowerLevel::Three,
        }));
        assert_eq!(
            events.last(),
            Some(&Event::UpgradeRejected {
                tower,
                reason: UpgradeError::MaximumLevel,
            })
        );
    }

    #[test]
    fn upgrade_without_funds_is_rejected() {
        let mut world = World::with_config(Config::default().with_starting_currency(10));
        let tower = place(&mut world, TowerKind::Cannon);
        let mut events = Vec::new();

        apply(&mut world, Command::UpgradeTower { tower }, &mut events);

        assert_eq!(
            events,
            vec![Event::UpgradeRejected {
                tower,
                reason: UpgradeError::InsufficientFunds,
            }]
        );
        assert_eq!(query::currency(&world), 10);
    }

    #[test]
    fn removing_a_tower_orphans_its_troops() {
        let mut world = World::new();
        let tower = place(&mut world, TowerKind::Barracks);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::DeployTroop {
                tower,
                position: Vec3::X,
            },
            &mut events,
        );
        let troop = query::troop_view(&world)
            .iter()
            .map(|snapshot| snapshot.id)
            .next()
            .expect("troop deployed");

        events.clear();
        apply(&mut world, Command::RemoveTower { tower }, &mut events);

        assert!(!query::contains(&world, tower));
        assert!(events.contains(&Event::TowerRemoved {
            tower,
            orphaned: vec![troop],
        }));
        let cancelled = events
            .iter()
            .filter(|event| matches!(event, Event::CollisionCancelled { .. }))
            .count();
        assert_eq!(cancelled, 1);
        assert_eq!(
            query::troop_view(&world).iter().next().map(|snapshot| snapshot.tower),
            Some(None)
        );

        events.clear();
        apply(&mut world, Command::RemoveTower { tower }, &mut events);
        assert!(events.is_empty(), "second removal must be a no-op");
    }

    #[test]
    fn only_barracks_deploy_troops() {
        let mut world = World::new();
        let tower = place(&mut world, TowerKind::Turret);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::DeployTroop {
                tower,
                position: Vec3::X,
            },
            &mut events,
        );
        assert!(events.is_empty());
    }

    #[test]
    fn config_reads_from_toml() {
        let config: Config = toml::from_str(
            "starting_currency = 250\nmission_check_delay_ms = 750\nhealth_bars = [0.0, 0.5]\n",
        )
        .expect("valid config");

        assert_eq!(config.starting_currency(), 250);
        assert_eq!(config.mission_check_delay(), Duration::from_millis(750));
        assert_eq!(
            config.flight_duration(),
            Duration::from_millis(DEFAULT_FLIGHT_DURATION_MS)
        );
        assert_eq!(config.health_bars().floors(), &[0.5, 0.0]);
    }
}
