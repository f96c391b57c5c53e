#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Presentation contracts shared by Bastion adapters.
//!
//! The [`Presenter`] mirrors world events into a [`Scene`] and reports
//! finished projectile flights back to the world as commands.

mod headless;
mod templates;

use std::{collections::BTreeMap, time::Duration};

use bastion_core::{
    Command, EntityId, Event, FlightHandle, HealthBarBucket, HealthBarId, HealthBarThresholds,
};
use glam::Vec3;

pub use headless::HeadlessScene;
pub use templates::{Template, TemplateError, TemplateKey, TemplateLibrary};

/// Opaque handle of a visual model owned by a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelHandle(u64);

impl ModelHandle {
    /// Creates a handle from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw value of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Opaque handle of an animation started by a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationHandle(u64);

impl AnimationHandle {
    /// Creates a handle from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw value of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Scene graph the presenter drives.
pub trait Scene {
    /// Instantiates `template` at `position`.
    fn spawn_visual(&mut self, template: &Template, position: Vec3) -> ModelHandle;

    /// Makes `model` a child of `parent`.
    fn attach(&mut self, model: ModelHandle, parent: ModelHandle);

    /// Removes `model` and its children from the scene.
    fn detach(&mut self, model: ModelHandle);

    /// Moves `model` to `to` over `duration`.
    fn animate_move(&mut self, model: ModelHandle, to: Vec3, duration: Duration) -> AnimationHandle;

    /// Drains animations that finished since the previous call.
    fn completed_animations(&mut self) -> Vec<AnimationHandle>;
}

/// Offset of a fresh health bar relative to the unit it hovers over.
const HEALTH_BAR_OFFSET: Vec3 = Vec3::new(0.0, 1.0, 0.0);

#[derive(Clone, Copy, Debug)]
struct HealthBarModel {
    id: HealthBarId,
    model: ModelHandle,
    position: Vec3,
}

/// Mirrors world events into a scene.
#[derive(Debug)]
pub struct Presenter<S> {
    scene: S,
    library: TemplateLibrary,
    models: BTreeMap<EntityId, ModelHandle>,
    health_bars: BTreeMap<EntityId, HealthBarModel>,
    flights: BTreeMap<AnimationHandle, FlightHandle>,
}

impl<S: Scene> Presenter<S> {
    /// Creates a presenter, failing if `library` lacks any template the
    /// match may need.
    pub fn new(
        scene: S,
        library: TemplateLibrary,
        thresholds: &HealthBarThresholds,
    ) -> Result<Self, TemplateError> {
        library.validate(thresholds)?;
        Ok(Self {
            scene,
            library,
            models: BTreeMap::new(),
            health_bars: BTreeMap::new(),
            flights: BTreeMap::new(),
        })
    }

    /// Read-only access to the driven scene.
    #[must_use]
    pub fn scene(&self) -> &S {
        &self.scene
    }

    /// Mutable access to the driven scene.
    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    /// Model currently representing `entity`.
    #[must_use]
    pub fn model(&self, entity: EntityId) -> Option<ModelHandle> {
        self.models.get(&entity).copied()
    }

    /// Health bar currently attached to `entity`, with its model.
    #[must_use]
    pub fn health_bar(&self, entity: EntityId) -> Option<(HealthBarId, ModelHandle)> {
        self.health_bars.get(&entity).map(|bar| (bar.id, bar.model))
    }

    /// Applies the visual consequences of `events`.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::TowerPlaced {
                    tower,
                    kind,
                    position,
                    ..
                } => {
                    let _ = self.spawn(*tower, TemplateKey::Tower(*kind), *position);
                }
                Event::TroopDeployed {
                    troop,
                    health_bar,
                    position,
                    ..
                } => {
                    if let Some(model) = self.spawn(*troop, TemplateKey::Troop, *position) {
                        self.attach_health_bar(
                            *troop,
                            model,
                            *health_bar,
                            HealthBarBucket::new(0),
                            HEALTH_BAR_OFFSET,
                        );
                    }
                }
                Event::CreepSpawned {
                    creep,
                    kind,
                    health_bar,
                    position,
                } => {
                    if let Some(model) = self.spawn(*creep, TemplateKey::Creep(*kind), *position) {
                        self.attach_health_bar(
                            *creep,
                            model,
                            *health_bar,
                            HealthBarBucket::new(0),
                            HEALTH_BAR_OFFSET,
                        );
                    }
                }
                Event::ProjectileLaunched {
                    projectile,
                    flight,
                    from,
                    to,
                    duration,
                    ..
                } => {
                    if let Some(model) = self.spawn(*projectile, TemplateKey::Bullet, *from) {
                        let animation = self.scene.animate_move(model, *to, *duration);
                        let _ = self.flights.insert(animation, *flight);
                    }
                }
                Event::FlightCancelled { flight, .. } => {
                    self.flights.retain(|_, handle| handle != flight);
                }
                Event::HealthBarReplaced {
                    unit,
                    previous,
                    replacement,
                    bucket,
                } => self.replace_health_bar(*unit, *previous, *replacement, *bucket),
                Event::ModelDetached { entity } => {
                    let _ = self.health_bars.remove(entity);
                    if let Some(model) = self.models.remove(entity) {
                        self.scene.detach(model);
                    }
                }
                _ => {}
            }
        }
    }

    /// Translates finished flight animations into `CompleteFlight` commands.
    pub fn poll(&mut self, out: &mut Vec<Command>) {
        for animation in self.scene.completed_animations() {
            match self.flights.remove(&animation) {
                Some(flight) => out.push(Command::CompleteFlight { flight }),
                None => log::debug!("animation {} has no flight", animation.get()),
            }
        }
    }

    fn spawn(&mut self, entity: EntityId, key: TemplateKey, position: Vec3) -> Option<ModelHandle> {
        let Some(template) = self.library.get(key) else {
            log::warn!("no template for {key}; entity {} stays invisible", entity.get());
            return None;
        };
        let model = self.scene.spawn_visual(template, position);
        if let Some(stale) = self.models.insert(entity, model) {
            log::warn!("entity {} already had a model; replacing it", entity.get());
            self.scene.detach(stale);
        }
        Some(model)
    }

    fn attach_health_bar(
        &mut self,
        unit: EntityId,
        parent: ModelHandle,
        id: HealthBarId,
        bucket: HealthBarBucket,
        position: Vec3,
    ) {
        let Some(template) = self.library.get(TemplateKey::HealthBar(bucket)) else {
            log::warn!("no health-bar template for bucket {}", bucket.index());
            return;
        };
        let model = self.scene.spawn_visual(template, position);
        self.scene.attach(model, parent);
        let _ = self.health_bars.insert(
            unit,
            HealthBarModel {
                id,
                model,
                position,
            },
        );
    }

    fn replace_health_bar(
        &mut self,
        unit: EntityId,
        previous: HealthBarId,
        replacement: HealthBarId,
        bucket: HealthBarBucket,
    ) {
        let Some(parent) = self.models.get(&unit).copied() else {
            log::debug!("unit {} has no model; skipping health bar", unit.get());
            return;
        };

        let mut position = HEALTH_BAR_OFFSET;
        if let Some(current) = self.health_bars.remove(&unit) {
            if current.id != previous {
                log::debug!(
                    "unit {} replaced bar {} but shows {}",
                    unit.get(),
                    previous.get(),
                    current.id.get()
                );
            }
            position = current.position;
            self.scene.detach(current.model);
        }
        self.attach_health_bar(unit, parent, replacement, bucket, position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_core::{CreepKind, TowerKind};

    fn presenter() -> Presenter<HeadlessScene> {
        let thresholds = HealthBarThresholds::default();
        Presenter::new(
            HeadlessScene::new(),
            TemplateLibrary::with_defaults(&thresholds),
            &thresholds,
        )
        .expect("default library is complete")
    }

    #[test]
    fn construction_fails_fast_on_missing_template() {
        let thresholds = HealthBarThresholds::default();
        let mut library = TemplateLibrary::new();
        let _ = library.insert(TemplateKey::Bullet, Template::new("bullet"));

        let result = Presenter::new(HeadlessScene::new(), library, &thresholds);

        assert!(matches!(result, Err(TemplateError::Missing(TemplateKey::Troop))));
    }

    #[test]
    fn health_bar_is_swapped_in_place() {
        let mut presenter = presenter();
        let creep = EntityId::new(4);
        presenter.handle(&[Event::CreepSpawned {
            creep,
            kind: CreepKind::Grunt,
            health_bar: HealthBarId::new(0),
            position: Vec3::ZERO,
        }]);
        let model = presenter.model(creep).expect("creep visible");
        let (_, first_bar) = presenter.health_bar(creep).expect("bar attached");

        presenter.handle(&[Event::HealthBarReplaced {
            unit: creep,
            previous: HealthBarId::new(0),
            replacement: HealthBarId::new(1),
            bucket: HealthBarBucket::new(2),
        }]);

        let (id, bar) = presenter.health_bar(creep).expect("bar replaced");
        assert_eq!(id, HealthBarId::new(1));
        assert_eq!(presenter.scene().children(model), vec![bar]);
        assert_eq!(presenter.scene().asset(first_bar), None);
        assert_eq!(presenter.scene().asset(bar), Some("HealthBar.2"));
    }

    #[test]
    fn replacement_bar_keeps_the_previous_position() {
        let mut presenter = presenter();
        let troop = EntityId::new(3);
        presenter.handle(&[Event::TroopDeployed {
            troop,
            tower: EntityId::new(0),
            health_bar: HealthBarId::new(0),
            position: Vec3::new(4.0, 0.0, 2.0),
        }]);
        let (_, first_bar) = presenter.health_bar(troop).expect("bar attached");
        let before = presenter.scene().position(first_bar).expect("bar placed");

        for (previous, replacement, bucket) in [(0, 1, 1), (1, 2, 2)] {
            presenter.handle(&[Event::HealthBarReplaced {
                unit: troop,
                previous: HealthBarId::new(previous),
                replacement: HealthBarId::new(replacement),
                bucket: HealthBarBucket::new(bucket),
            }]);
        }

        let (_, bar) = presenter.health_bar(troop).expect("bar replaced");
        assert_ne!(bar, first_bar);
        assert_eq!(presenter.scene().position(bar), Some(before));
        assert_eq!(before, HEALTH_BAR_OFFSET);
    }

    #[test]
    fn cancelled_flight_is_not_reported() {
        let mut presenter = presenter();
        presenter.handle(&[
            Event::TowerPlaced {
                tower: EntityId::new(0),
                kind: TowerKind::Turret,
                position: Vec3::ZERO,
                sensor: bastion_core::SubscriptionId::new(0),
            },
            Event::ProjectileLaunched {
                projectile: EntityId::new(2),
                tower: EntityId::new(0),
                target: EntityId::new(1),
                flight: FlightHandle::new(7),
                from: Vec3::ZERO,
                to: Vec3::X,
                duration: Duration::from_millis(100),
            },
            Event::FlightCancelled {
                projectile: EntityId::new(2),
                flight: FlightHandle::new(7),
            },
        ]);

        presenter.scene_mut().advance(Duration::from_millis(100));
        let mut out = Vec::new();
        presenter.poll(&mut out);

        assert!(out.is_empty());
    }

    #[test]
    fn detached_model_leaves_the_scene() {
        let mut presenter = presenter();
        let creep = EntityId::new(1);
        presenter.handle(&[
            Event::CreepSpawned {
                creep,
                kind: CreepKind::Brute,
                health_bar: HealthBarId::new(0),
                position: Vec3::ZERO,
            },
            Event::ModelDetached { entity: creep },
        ]);

        assert_eq!(presenter.model(creep), None);
        assert_eq!(presenter.health_bar(creep), None);
        assert_eq!(presenter.scene().model_count(), 0);
    }
}
