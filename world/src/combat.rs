//! Damage and reward resolution.

use bastion_core::{eligible_targets, DamageOutcome, EntityId, Event, TROOP_CAPACITY};

use crate::{registry::Combatant, schedule::DeferredAction, World};

/// Applies `amount` damage from `attacker` to `defender`.
///
/// A defender that is already gone, or that cannot be damaged, turns the call
/// into a no-op. Everything below happens within one call, so two resolutions
/// never interleave on the same defender.
pub(crate) fn resolve(
    world: &mut World,
    defender: EntityId,
    attacker: EntityId,
    amount: f32,
    out: &mut Vec<Event>,
) {
    if !amount.is_finite() || amount < 0.0 {
        log::debug!("rejecting damage {amount} against {}", defender.get());
        return;
    }
    let Some(record) = world.registry.get_mut(defender) else {
        log::debug!("defender {} already removed", defender.get());
        return;
    };
    let is_creep = matches!(record, Combatant::Creep(_));
    let Some(unit) = record.as_damageable_mut() else {
        log::debug!("entity {} cannot take damage", defender.get());
        return;
    };

    let outcome = unit.apply_damage(amount);
    out.push(Event::DamageApplied {
        defender,
        attacker,
        amount,
        remaining: unit.unit().current(),
    });

    match outcome {
        DamageOutcome::Died if is_creep => kill_creep(world, defender, attacker, out),
        DamageOutcome::Died => kill_troop(world, defender, out),
        DamageOutcome::Survived { fraction } => refresh_health_bar(world, defender, fraction, out),
    }
}

/// Resolves a melee hit, using the attacker's own attack value.
///
/// Troops may only strike enemies inside their eligible window and creeps may
/// only strike the troop holding them.
pub(crate) fn strike(world: &mut World, attacker: EntityId, defender: EntityId, out: &mut Vec<Event>) {
    let Some(record) = world.registry.get(attacker) else {
        log::debug!("attacker {} already removed", attacker.get());
        return;
    };

    let allowed = match record {
        Combatant::Troop(troop) => eligible_targets(&troop.tracked, TROOP_CAPACITY).contains(&defender),
        Combatant::Creep(creep) => creep.suspended_by == Some(defender),
        Combatant::Tower(_) | Combatant::Projectile(_) => false,
    };
    let Some(amount) = record.melee_attack().filter(|_| allowed) else {
        log::debug!(
            "entity {} is not engaged with {}",
            attacker.get(),
            defender.get()
        );
        return;
    };

    resolve(world, defender, attacker, amount, out);
}

fn kill_creep(world: &mut World, creep: EntityId, killer: EntityId, out: &mut Vec<Event>) {
    let Some(Combatant::Creep(record)) = world.registry.remove(creep) else {
        return;
    };
    let reward = record.kind.reward();

    world.registry.for_each_mut(|_, other| {
        if let Some(tracked) = other.tracked_mut() {
            tracked.retain(|enemy| *enemy != creep);
        }
    });

    world.treasury.credit(reward);
    out.push(Event::CreepKilled {
        creep,
        killer,
        reward,
    });
    out.push(Event::CurrencyChanged {
        balance: world.treasury.balance(),
    });
    out.push(Event::ModelDetached { entity: creep });

    let delay = world.config.mission_check_delay();
    world.scheduler.schedule_after(delay, DeferredAction::MissionCheck);
}

fn kill_troop(world: &mut World, troop: EntityId, out: &mut Vec<Event>) {
    let Some(Combatant::Troop(mut record)) = world.registry.remove(troop) else {
        return;
    };

    // A dying troop releases every creep it held, including its killer.
    let mut resumed = Vec::new();
    world.registry.for_each_mut(|id, other| {
        if let Combatant::Creep(creep) = other {
            if creep.suspended_by == Some(troop) {
                creep.suspended_by = None;
                resumed.push(id);
            }
        }
    });
    out.extend(resumed.into_iter().map(|creep| Event::CreepResumed { creep }));

    record.tracked.clear();
    out.push(Event::ModelDetached { entity: troop });
    out.push(Event::TroopDied { troop });
}

fn refresh_health_bar(world: &mut World, unit: EntityId, fraction: f32, out: &mut Vec<Event>) {
    let has_bar = world
        .registry
        .get_mut(unit)
        .and_then(Combatant::as_damageable_mut)
        .and_then(|damageable| damageable.unit().health_bar())
        .is_some();
    if !has_bar {
        log::debug!("unit {} has no health bar to refresh", unit.get());
        return;
    }

    let bucket = world.config.health_bars().bucket_for(fraction);
    let replacement = world.ids.health_bar();
    let previous = world
        .registry
        .get_mut(unit)
        .and_then(Combatant::as_damageable_mut)
        .and_then(|damageable| damageable.unit_mut().replace_health_bar(replacement));

    if let Some(previous) = previous {
        out.push(Event::HealthBarReplaced {
            unit,
            previous,
            replacement,
            bucket,
        });
    }
}
