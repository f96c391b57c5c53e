//! Headless match loop wiring the world, systems and presenter together.

use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use bastion_core::{Command, Engagement, EntityId, Event, HealthBarThresholds};
use bastion_presentation::{HeadlessScene, Presenter, TemplateLibrary};
use bastion_system_mission::MissionMonitor;
use bastion_system_tower_combat::TowerCombat;
use bastion_system_tower_targeting::TowerTargeting;
use bastion_transport::{LoopbackTransport, PeerSync, SignalingConfig};
use bastion_world::{self as world, query, Config, World};
use glam::Vec3;

use crate::scenario::Scenario;

/// Distance within which towers and troops notice a creep.
const SENSOR_REACH: f32 = 6.0;
const TROOP_OFFSET: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// Summary of a finished match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Outcome {
    pub(crate) ticks: u64,
    pub(crate) completed: bool,
    pub(crate) kills: usize,
    pub(crate) currency: u32,
    pub(crate) events: usize,
}

/// Second world fed exclusively through the peer link.
struct Mirror {
    host: PeerSync<LoopbackTransport>,
    guest: PeerSync<LoopbackTransport>,
    replica: World,
}

impl Mirror {
    fn connect(config: Config, signaling: SignalingConfig) -> Result<Self> {
        let (left, right) = LoopbackTransport::pair();
        let mut host = PeerSync::new(left, signaling.clone());
        let mut guest = PeerSync::new(right, signaling);
        host.connect().context("failed to connect mirror host")?;
        guest.connect().context("failed to connect mirror guest")?;
        Ok(Self {
            host,
            guest,
            replica: World::with_config(config),
        })
    }

    fn forward(&mut self, batch: &[Command]) -> Result<()> {
        self.host
            .send(batch)
            .context("failed to mirror command batch")?;

        let mut received = Vec::new();
        self.guest.poll(&mut received);
        let mut discarded = Vec::new();
        for command in received {
            world::apply(&mut self.replica, command, &mut discarded);
        }
        Ok(())
    }

    fn verify(&self, primary: &World) -> Result<()> {
        let expected = (query::creep_count(primary), query::currency(primary));
        let actual = (
            query::creep_count(&self.replica),
            query::currency(&self.replica),
        );
        if expected != actual {
            bail!("mirror diverged: primary {expected:?}, replica {actual:?}");
        }
        Ok(())
    }
}

/// Drives one match.
pub(crate) struct Session {
    world: World,
    targeting: TowerTargeting,
    combat: TowerCombat,
    mission: MissionMonitor,
    presenter: Presenter<HeadlessScene>,
    mirror: Option<Mirror>,
    engagements: Vec<Engagement>,
    troop_positions: BTreeMap<EntityId, Vec3>,
    kills: usize,
    events: usize,
    completed: bool,
}

impl Session {
    pub(crate) fn new(
        config: Config,
        library: TemplateLibrary,
        signaling: Option<SignalingConfig>,
    ) -> Result<Self> {
        let thresholds: HealthBarThresholds = config.health_bars().clone();
        let presenter = Presenter::new(HeadlessScene::new(), library, &thresholds)
            .context("template library cannot present this match")?;
        let mirror = signaling
            .map(|signaling| Mirror::connect(config.clone(), signaling))
            .transpose()?;

        Ok(Self {
            world: World::with_config(config),
            targeting: TowerTargeting::new(),
            combat: TowerCombat::default(),
            mission: MissionMonitor::new(),
            presenter,
            mirror,
            engagements: Vec::new(),
            troop_positions: BTreeMap::new(),
            kills: 0,
            events: 0,
            completed: false,
        })
    }

    pub(crate) fn banner(&self) -> &'static str {
        query::welcome_banner(&self.world)
    }

    /// Plays `scenario` until the wave is cleared or `max_ticks` elapse.
    pub(crate) fn run(&mut self, scenario: &Scenario, tick: Duration, max_ticks: u64) -> Result<Outcome> {
        self.dispatch(
            scenario
                .towers
                .iter()
                .map(|(kind, position)| Command::PlaceTower {
                    kind: *kind,
                    position: *position,
                })
                .collect(),
        )?;

        let deployments = query::tower_view(&self.world)
            .iter()
            .filter(|tower| tower.kind.deploys_troops())
            .map(|tower| Command::DeployTroop {
                tower: tower.id,
                position: tower.position + TROOP_OFFSET,
            })
            .collect();
        self.dispatch(deployments)?;

        let mut spawns = scenario.spawns.iter().peekable();
        let mut clock = Duration::ZERO;
        let mut ticks = 0;
        while ticks < max_ticks {
            let mut commands = Vec::new();
            while let Some(spawn) = spawns.next_if(|spawn| spawn.at <= clock) {
                commands.push(Command::SpawnCreep {
                    kind: spawn.kind,
                    position: spawn.position,
                });
            }
            commands.push(Command::Tick { dt: tick });
            self.dispatch(commands)?;

            clock = clock.saturating_add(tick);
            ticks += 1;
            if self.completed && spawns.peek().is_none() {
                break;
            }
        }

        if let Some(mirror) = &self.mirror {
            mirror.verify(&self.world)?;
        }

        Ok(Outcome {
            ticks,
            completed: self.completed,
            kills: self.kills,
            currency: query::currency(&self.world),
            events: self.events,
        })
    }

    fn dispatch(&mut self, commands: Vec<Command>) -> Result<()> {
        let mut pending: VecDeque<Command> = commands.into();
        let mut applied = Vec::new();
        while let Some(command) = pending.pop_front() {
            let mut events = Vec::new();
            applied.push(command.clone());
            world::apply(&mut self.world, command, &mut events);

            let mut follow_up = Vec::new();
            self.react(&events, &mut follow_up);
            pending.extend(follow_up);
        }

        match self.mirror.as_mut() {
            Some(mirror) => mirror.forward(&applied),
            None => Ok(()),
        }
    }

    fn react(&mut self, events: &[Event], out: &mut Vec<Command>) {
        self.events += events.len();
        self.presenter.handle(events);

        for event in events {
            match event {
                Event::TimeAdvanced { dt } => {
                    self.presenter.scene_mut().advance(*dt);
                    self.presenter.poll(out);
                }
                Event::TroopDeployed {
                    troop, position, ..
                } => {
                    let _ = self.troop_positions.insert(*troop, *position);
                }
                Event::TroopDied { troop } => {
                    let _ = self.troop_positions.remove(troop);
                }
                Event::CreepSpawned {
                    creep, position, ..
                } => {
                    self.completed = false;
                    self.sense(*creep, *position, out);
                }
                Event::CreepKilled { creep, reward, .. } => {
                    self.kills += 1;
                    log::debug!("creep {} killed for {reward}", creep.get());
                }
                Event::MissionCompleted => {
                    log::info!("wave cleared");
                    self.completed = true;
                }
                _ => {}
            }
        }

        let creeps = query::creep_view(&self.world);
        if events
            .iter()
            .any(|event| matches!(event, Event::TimeAdvanced { .. }))
        {
            let towers = query::tower_view(&self.world);
            self.targeting.handle(
                &towers,
                &query::troop_view(&self.world),
                &creeps,
                &mut self.engagements,
            );
            self.combat
                .handle(events, &towers, &creeps, &self.engagements, out);
        }
        self.mission.handle(events, &creeps, out);
    }

    /// Stands in for reach sensors: every tower and troop close enough to a
    /// fresh creep starts tracking it, and the first troop also holds it.
    fn sense(&self, creep: EntityId, position: Vec3, out: &mut Vec<Command>) {
        for tower in query::tower_view(&self.world).iter() {
            if tower.position.distance(position) <= SENSOR_REACH {
                out.push(Command::TrackEnemy {
                    attacker: tower.id,
                    enemy: creep,
                });
            }
        }
        for (troop, troop_position) in &self.troop_positions {
            if troop_position.distance(position) <= SENSOR_REACH {
                out.push(Command::TrackEnemy {
                    attacker: *troop,
                    enemy: creep,
                });
                out.push(Command::EngageTroop {
                    creep,
                    troop: *troop,
                });
            }
        }
    }
}
