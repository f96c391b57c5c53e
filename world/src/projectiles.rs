//! Projectile lifecycle: launch, flight tracking, arrival and retirement.
//!
//! A projectile lives in the registry from launch until retirement. Its
//! damage resolves at most once, either on its own completion notification or
//! in the sweep that retires it.

use std::time::Duration;

use bastion_core::{eligible_targets, EntityId, Event, FlightHandle};

use crate::{combat, registry::Combatant, World};

/// Projectile travelling from a tower towards a creep.
#[derive(Clone, Debug)]
pub(crate) struct Projectile {
    pub(crate) tower: EntityId,
    /// Weak reference; resolved through the registry on arrival.
    pub(crate) target: EntityId,
    pub(crate) damage: f32,
    pub(crate) flight: FlightHandle,
    pub(crate) elapsed: Duration,
    pub(crate) duration: Duration,
    /// Completion subscription, taken exactly once at retirement.
    pub(crate) subscription: Option<FlightHandle>,
    pub(crate) resolved: bool,
}

impl Projectile {
    pub(crate) fn flight_complete(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Fires a projectile from `tower` at `target` if the target is eligible.
///
/// Targets outside the tower's eligible window, or no longer alive, are
/// skipped without an error.
pub(crate) fn launch(world: &mut World, tower: EntityId, target: EntityId, out: &mut Vec<Event>) {
    let Some(record) = world.registry.tower(tower) else {
        log::debug!("tower {} is gone; nothing to fire", tower.get());
        return;
    };

    if !eligible_targets(&record.tracked, record.capacity()).contains(&target) {
        log::debug!(
            "creep {} is outside the eligible window of tower {}",
            target.get(),
            tower.get()
        );
        return;
    }

    let from = record.position;
    let damage = record.kind.attack(record.level);
    let interval = record.kind.fire_interval();

    let Some(creep) = world.registry.creep(target) else {
        log::debug!("creep {} is gone; holding fire", target.get());
        return;
    };
    let to = creep.position;

    let projectile = world.ids.entity();
    let flight = world.ids.flight();
    let duration = world.config.flight_duration();

    world.registry.insert(
        projectile,
        Combatant::Projectile(Projectile {
            tower,
            target,
            damage,
            flight,
            elapsed: Duration::ZERO,
            duration,
            subscription: Some(flight),
            resolved: false,
        }),
    );

    if let Some(record) = world.registry.tower_mut(tower) {
        record.ready_in = interval;
    }
    if let Some(creep) = world.registry.creep_mut(target) {
        creep.incoming = Some(projectile);
    }

    out.push(Event::ProjectileLaunched {
        projectile,
        tower,
        target,
        flight,
        from,
        to,
        duration,
    });
}

/// Advances the flight clock of every projectile.
pub(crate) fn advance_flights(world: &mut World, dt: Duration) {
    world.registry.for_each_mut(|_, record| {
        if let Combatant::Projectile(projectile) = record {
            projectile.elapsed = projectile.elapsed.saturating_add(dt).min(projectile.duration);
        }
    });
}

/// Handles the completion notification scoped to `flight`.
///
/// Notifications are matched by handle identity. Unknown or already retired
/// handles are ignored.
pub(crate) fn complete_flight(world: &mut World, flight: FlightHandle, out: &mut Vec<Event>) {
    let trigger = world
        .registry
        .projectiles()
        .find(|(_, projectile)| projectile.flight == flight)
        .map(|(id, _)| id);

    let Some(trigger) = trigger else {
        log::debug!("ignoring completion for unknown flight {}", flight.get());
        return;
    };

    if let Some(projectile) = world.registry.projectile_mut(trigger) {
        projectile.elapsed = projectile.duration;
    }

    resolve_arrival(world, trigger, out);
    let _ = sweep(world, out);
}

/// Retires every projectile whose flight reports complete.
///
/// Completed projectiles that never received their own notification resolve
/// their damage here. Returns the number of retired projectiles.
pub(crate) fn sweep(world: &mut World, out: &mut Vec<Event>) -> usize {
    let completed: Vec<EntityId> = world
        .registry
        .projectiles()
        .filter(|(_, projectile)| projectile.flight_complete())
        .map(|(id, _)| id)
        .collect();

    for projectile in &completed {
        resolve_arrival(world, *projectile, out);
        retire(world, *projectile, out);
    }

    completed.len()
}

fn resolve_arrival(world: &mut World, id: EntityId, out: &mut Vec<Event>) {
    let Some(projectile) = world.registry.projectile_mut(id) else {
        return;
    };
    if projectile.resolved {
        return;
    }
    projectile.resolved = true;

    let (target, tower, damage) = (projectile.target, projectile.tower, projectile.damage);
    combat::resolve(world, target, tower, damage, out);
}

fn retire(world: &mut World, id: EntityId, out: &mut Vec<Event>) {
    let Some(projectile) = world.registry.projectile_mut(id) else {
        return;
    };

    if let Some(flight) = projectile.subscription.take() {
        out.push(Event::FlightCancelled {
            projectile: id,
            flight,
        });
    }
    let target = projectile.target;
    let _ = world.registry.remove(id);

    if let Some(creep) = world.registry.creep_mut(target) {
        if creep.incoming == Some(id) {
            creep.incoming = None;
        }
    }

    out.push(Event::ModelDetached { entity: id });
    out.push(Event::ProjectileRetired { projectile: id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply;
    use bastion_core::{Command, CreepKind, TowerKind};
    use glam::Vec3;

    fn armed_world() -> (World, EntityId, EntityId) {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::PlaceTower {
                kind: TowerKind::Turret,
                position: Vec3::ZERO,
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::SpawnCreep {
                kind: CreepKind::Brute,
                position: Vec3::new(3.0, 0.0, 0.0),
            },
            &mut events,
        );
        let tower = world.registry.towers().map(|(id, _)| id).next().expect("tower");
        let creep = world.registry.creeps().map(|(id, _)| id).next().expect("creep");
        apply(
            &mut world,
            Command::TrackEnemy {
                attacker: tower,
                enemy: creep,
            },
            &mut events,
        );
        (world, tower, creep)
    }

    #[test]
    fn sweep_without_completed_flights_changes_nothing() {
        let (mut world, tower, creep) = armed_world();
        let mut events = Vec::new();
        launch(&mut world, tower, creep, &mut events);
        events.clear();

        assert_eq!(sweep(&mut world, &mut events), 0);
        assert_eq!(sweep(&mut world, &mut events), 0);
        assert!(events.is_empty());
        assert_eq!(world.registry.projectiles().count(), 1);
    }

    #[test]
    fn sweep_is_idempotent_after_retirement() {
        let (mut world, tower, creep) = armed_world();
        let mut events = Vec::new();
        launch(&mut world, tower, creep, &mut events);
        advance_flights(&mut world, Duration::from_secs(5));

        events.clear();
        assert_eq!(sweep(&mut world, &mut events), 1);
        let cancellations = events
            .iter()
            .filter(|event| matches!(event, Event::FlightCancelled { .. }))
            .count();
        assert_eq!(cancellations, 1);

        events.clear();
        assert_eq!(sweep(&mut world, &mut events), 0);
        assert!(events.is_empty(), "second sweep must not emit anything");
    }

    #[test]
    fn swept_projectile_still_delivers_its_damage_once() {
        let (mut world, tower, creep) = armed_world();
        let mut events = Vec::new();
        launch(&mut world, tower, creep, &mut events);
        advance_flights(&mut world, Duration::from_secs(5));
        let _ = sweep(&mut world, &mut events);

        let remaining = world.registry.creep(creep).map(|creep| creep.unit.current());
        let expected = CreepKind::Brute.max_health() - TowerKind::Turret.attack(Default::default());
        assert_eq!(remaining, Some(expected));
        assert_eq!(world.registry.creep(creep).and_then(|creep| creep.incoming), None);
    }

    #[test]
    fn repeated_completion_for_one_flight_lands_once() {
        let (mut world, tower, creep) = armed_world();
        let mut events = Vec::new();
        launch(&mut world, tower, creep, &mut events);
        let flight = events
            .iter()
            .find_map(|event| match event {
                Event::ProjectileLaunched { flight, .. } => Some(*flight),
                _ => None,
            })
            .expect("launched");
        events.clear();

        complete_flight(&mut world, flight, &mut events);
        complete_flight(&mut world, flight, &mut events);

        let hits = events
            .iter()
            .filter(|event| matches!(event, Event::DamageApplied { .. }))
            .count();
        assert_eq!(hits, 1);
        assert_eq!(world.registry.projectiles().count(), 0);
        let remaining = world.registry.creep(creep).map(|creep| creep.unit.current());
        let expected = CreepKind::Brute.max_health() - TowerKind::Turret.attack(Default::default());
        assert_eq!(remaining, Some(expected));
    }

    #[test]
    fn launch_outside_window_creates_nothing() {
        let (mut world, tower, _) = armed_world();
        let mut events = Vec::new();
        let stranger = world.ids.entity();

        launch(&mut world, tower, stranger, &mut events);

        assert!(events.is_empty());
        assert_eq!(world.registry.projectiles().count(), 0);
    }
}
