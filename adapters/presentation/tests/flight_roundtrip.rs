use std::time::Duration;

use bastion_core::{Command, CreepKind, EntityId, Event, HealthBarThresholds, TowerKind};
use bastion_presentation::{HeadlessScene, Presenter, TemplateLibrary};
use bastion_world::{self as world, query, World};
use glam::Vec3;

struct Match {
    world: World,
    presenter: Presenter<HeadlessScene>,
}

impl Match {
    fn new() -> Self {
        let thresholds = HealthBarThresholds::default();
        let presenter = Presenter::new(
            HeadlessScene::new(),
            TemplateLibrary::with_defaults(&thresholds),
            &thresholds,
        )
        .expect("complete library");
        Self {
            world: World::new(),
            presenter,
        }
    }

    fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        self.presenter.handle(&events);
        events
    }

    fn frame(&mut self, dt: Duration) -> Vec<Event> {
        let mut events = self.apply(Command::Tick { dt });
        self.presenter.scene_mut().advance(dt);
        let mut commands = Vec::new();
        self.presenter.poll(&mut commands);
        for command in commands {
            events.extend(self.apply(command));
        }
        events
    }
}

fn placed_tower(events: &[Event]) -> EntityId {
    events
        .iter()
        .find_map(|event| match event {
            Event::TowerPlaced { tower, .. } => Some(*tower),
            _ => None,
        })
        .expect("tower placed")
}

fn spawned_creep(events: &[Event]) -> EntityId {
    events
        .iter()
        .find_map(|event| match event {
            Event::CreepSpawned { creep, .. } => Some(*creep),
            _ => None,
        })
        .expect("creep spawned")
}

#[test]
fn animation_completion_lands_the_hit() {
    let mut game = Match::new();
    let tower = placed_tower(&game.apply(Command::PlaceTower {
        kind: TowerKind::Turret,
        position: Vec3::ZERO,
    }));
    let creep = spawned_creep(&game.apply(Command::SpawnCreep {
        kind: CreepKind::Grunt,
        position: Vec3::new(8.0, 0.0, 0.0),
    }));
    let _ = game.apply(Command::TrackEnemy {
        attacker: tower,
        enemy: creep,
    });
    let creep_model = game.presenter.model(creep).expect("creep visible");
    let (_, original_bar) = game.presenter.health_bar(creep).expect("bar attached");

    let launched = game.apply(Command::FireProjectile {
        tower,
        target: creep,
    });
    let projectile = launched
        .iter()
        .find_map(|event| match event {
            Event::ProjectileLaunched { projectile, .. } => Some(*projectile),
            _ => None,
        })
        .expect("projectile launched");
    let bullet = game.presenter.model(projectile).expect("bullet visible");

    let early = game.frame(Duration::from_millis(200));
    assert!(!early
        .iter()
        .any(|event| matches!(event, Event::DamageApplied { .. })));

    let arrival = game.frame(Duration::from_millis(200));
    assert!(arrival.contains(&Event::DamageApplied {
        defender: creep,
        attacker: tower,
        amount: 20.0,
        remaining: 30.0,
    }));
    assert!(arrival.contains(&Event::ProjectileRetired { projectile }));

    let scene = game.presenter.scene();
    assert_eq!(scene.asset(bullet), None, "bullet detached on retirement");
    assert_eq!(scene.asset(original_bar), None, "old bar detached");
    let (_, bar) = game.presenter.health_bar(creep).expect("bar replaced");
    assert_eq!(scene.children(creep_model), vec![bar]);
    assert_eq!(scene.asset(bar), Some("HealthBar.1"));
    assert_eq!(query::projectile_count(&game.world), 0);
}

#[test]
fn lethal_hit_clears_the_creep_from_the_scene() {
    let mut game = Match::new();
    let tower = placed_tower(&game.apply(Command::PlaceTower {
        kind: TowerKind::Cannon,
        position: Vec3::ZERO,
    }));
    let creep = spawned_creep(&game.apply(Command::SpawnCreep {
        kind: CreepKind::Runner,
        position: Vec3::X,
    }));
    let _ = game.apply(Command::TrackEnemy {
        attacker: tower,
        enemy: creep,
    });
    let _ = game.apply(Command::FireProjectile {
        tower,
        target: creep,
    });

    let events = game.frame(Duration::from_millis(400));

    assert!(events.contains(&Event::CreepKilled {
        creep,
        killer: tower,
        reward: CreepKind::Runner.reward(),
    }));
    assert_eq!(game.presenter.model(creep), None);
    assert_eq!(game.presenter.scene().model_count(), 1, "only the tower remains");
}
