//! The campaign session — the single context object a host embeds.
//!
//! Owns the world, every registry, the task scheduler and the RNG, and
//! exposes the scenario-facing API: spawning, labelling, group
//! management, queues, raids, artifacts, bases, factories and victory.
//!
//! Everything is single-threaded and tick-driven. [`CampaignSession::update`]
//! first drains due scheduler tasks, then runs the throttled pollers,
//! then advances unit orders. Inbound [`GameEvent`]s always run the
//! library's own bookkeeping before the host's scenario code sees them,
//! so scenario handlers can rely on registries being current.

use hecs::World;
use log::{debug, info, trace};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use warbound_logic::constants::{intervals, HUMAN_PLAYER};
use warbound_logic::geometry::Pos;
use warbound_logic::ids::{GroupId, ObjectId};
use warbound_logic::orders::GroupOrder;
use warbound_logic::templates::UnitTemplate;
use warbound_logic::terrain::Terrain;

use crate::components::{
    Ammo, Feature, FeatureKind, Health, IdAllocator, Label, Location, ObjectIndex, Structure,
    StructureKind, Unit, UnitOrder,
};
use crate::events::{push_notification, GameEvent, Notification};
use crate::research::ResearchLedger;
use crate::scheduler::{Scheduler, Task};
use crate::systems::artifacts::{self, ArtifactRegistry, ArtifactSource};
use crate::systems::bases::{self, BaseRegistry, BaseSpec, VictoryCondition, VictoryState};
use crate::systems::execution;
use crate::systems::factories::{self, FactoryManager, FactorySpec};
use crate::systems::tactics::{self, GroupRegistry};
use crate::systems::transport::{self, TransportRequest, TransportScheduler};
use crate::systems::trucks::{self, TruckManager};
use crate::systems::vtol::{self, VtolController, VtolRaid};

pub struct CampaignSession {
    pub world: World,
    pub(crate) terrain: Terrain,
    pub(crate) time_ms: u64,
    pub(crate) rng: SmallRng,
    pub(crate) rng_seed: u64,
    pub(crate) ids: IdAllocator,
    pub(crate) index: ObjectIndex,
    pub(crate) groups: GroupRegistry,
    pub(crate) trucks: TruckManager,
    pub(crate) transports: TransportScheduler,
    pub(crate) vtols: VtolController,
    pub(crate) artifacts: ArtifactRegistry,
    pub(crate) bases: BaseRegistry,
    pub(crate) factories: FactoryManager,
    pub(crate) research: ResearchLedger,
    pub(crate) scheduler: Scheduler,
    pub(crate) victory: VictoryState,
    pub(crate) notifications: Vec<Notification>,
    pub(crate) last_alert_ms: Option<u64>,
    last_tactics_ms: u64,
    last_trucks_ms: u64,
    last_vtol_recall_ms: u64,
    last_victory_ms: u64,
}

impl std::fmt::Debug for CampaignSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignSession")
            .field("time_ms", &self.time_ms)
            .field("rng_seed", &self.rng_seed)
            .finish_non_exhaustive()
    }
}

impl CampaignSession {
    pub fn new(terrain: Terrain, seed: u64) -> Self {
        Self {
            world: World::new(),
            terrain,
            time_ms: 0,
            rng: SmallRng::seed_from_u64(seed),
            rng_seed: seed,
            ids: IdAllocator::new(),
            index: ObjectIndex::new(),
            groups: GroupRegistry::new(),
            trucks: TruckManager::new(),
            transports: TransportScheduler::new(),
            vtols: VtolController::new(),
            artifacts: ArtifactRegistry::new(),
            bases: BaseRegistry::new(),
            factories: FactoryManager::new(),
            research: ResearchLedger::new(),
            scheduler: Scheduler::new(),
            victory: VictoryState::default(),
            notifications: Vec::new(),
            last_alert_ms: None,
            last_tactics_ms: 0,
            last_trucks_ms: 0,
            last_vtol_recall_ms: 0,
            last_victory_ms: 0,
        }
    }

    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    pub fn seed(&self) -> u64 {
        self.rng_seed
    }

    pub fn is_won(&self) -> bool {
        self.victory.is_won()
    }

    // ---- spawning and labels -------------------------------------------

    pub fn spawn_unit(&mut self, player: u8, template: &UnitTemplate, pos: Pos) -> ObjectId {
        let id = self.ids.alloc();
        let entity = self.world.spawn((
            Unit::from_template(id, player, template),
            Location::new(pos),
            Health::full(),
            Ammo::full(),
            UnitOrder::Idle,
        ));
        self.index.insert(id, entity);
        id
    }

    pub fn spawn_structure(&mut self, player: u8, kind: StructureKind, pos: Pos) -> ObjectId {
        let id = self.ids.alloc();
        let entity = self.world.spawn((
            Structure::new(id, player, kind),
            Location::new(pos),
            Health::full(),
        ));
        self.index.insert(id, entity);
        id
    }

    pub fn spawn_feature(&mut self, kind: FeatureKind, pos: Pos) -> ObjectId {
        let id = self.ids.alloc();
        let entity = self
            .world
            .spawn((Feature::new(id, kind), Location::new(pos)));
        self.index.insert(id, entity);
        id
    }

    /// Attach a scenario label to an object. One label per object.
    pub fn label_object(&mut self, id: ObjectId, label: impl Into<String>) {
        if let Some(&entity) = self.index.get(&id) {
            let _ = self.world.insert_one(entity, Label(label.into()));
        }
    }

    /// Look an object up by its scenario label.
    pub fn resolve(&self, label: &str) -> Option<ObjectId> {
        for (entity, l) in self.world.query::<&Label>().iter() {
            if l.0 == label {
                if let Ok(unit) = self.world.get::<&Unit>(entity) {
                    return Some(unit.id);
                }
                if let Ok(structure) = self.world.get::<&Structure>(entity) {
                    return Some(structure.id);
                }
                if let Ok(feature) = self.world.get::<&Feature>(entity) {
                    return Some(feature.id);
                }
            }
        }
        None
    }

    pub fn object_position(&self, id: ObjectId) -> Option<Pos> {
        crate::systems::object_pos(&self.world, &self.index, id)
    }

    /// The live entity behind an id, for direct component access.
    pub fn entity(&self, id: ObjectId) -> Option<hecs::Entity> {
        self.index.get(&id).copied()
    }

    pub fn object_player(&self, id: ObjectId) -> Option<u8> {
        let &entity = self.index.get(&id)?;
        if let Ok(unit) = self.world.get::<&Unit>(entity) {
            return Some(unit.player);
        }
        if let Ok(structure) = self.world.get::<&Structure>(entity) {
            return Some(structure.player);
        }
        None
    }

    /// Apply damage. Objects at zero health are destroyed on the spot.
    pub fn damage_object(&mut self, id: ObjectId, amount: u32) {
        let Some(&entity) = self.index.get(&id) else {
            return;
        };
        let dead = match self.world.get::<&mut Health>(entity) {
            Ok(mut health) => {
                health.damage(amount);
                health.percent == 0
            }
            Err(_) => false,
        };
        if dead {
            self.destroy_object(id);
        }
    }

    /// Remove an object from the world and run all destruction
    /// bookkeeping: artifacts, bases, groups, morale, truck rebuilds.
    pub fn destroy_object(&mut self, id: ObjectId) {
        let Some(&entity) = self.index.get(&id) else {
            trace!("{:?} already gone", id);
            return;
        };
        let pos = self.object_position(id);
        let unit_info = self
            .world
            .get::<&Unit>(entity)
            .map(|u| (u.player, u.is_builder(), u.template.clone(), u.body.clone()))
            .ok();

        self.index.remove(&id);
        let _ = self.world.despawn(entity);

        // Artifact drop where the carrier stood.
        if let Some(pos) = pos {
            artifacts::place_artifacts_for(
                &mut self.world,
                &mut self.index,
                &mut self.ids,
                &mut self.artifacts,
                &mut self.notifications,
                id,
                pos,
            );
        }

        // Base attrition and possible elimination.
        bases::note_structure_destroyed(
            &mut self.world,
            &mut self.index,
            &mut self.bases,
            &mut self.notifications,
            id,
        );
        self.factories.note_factory_destroyed(id);

        // Group loss: morale swing re-ticks the group immediately.
        if let Some((group, remaining)) = self.groups.remove_member(id) {
            if tactics::check_group_morale(&mut self.groups, group, remaining) {
                self.scheduler
                    .queue_task(Task::TacticsForGroup(group), 0, self.time_ms);
            }
        }

        // Best-effort truck reconstruction for managed players, on the
        // lost truck's own chassis.
        if let Some((player, is_builder, template, body)) = unit_info {
            if is_builder
                && self.trucks.is_managed(player)
                && self.factories.has_enabled_factory_for(player)
            {
                debug!("player {} lost truck {}, queueing a rebuild", player, template);
                self.factories.queue_truck_rebuild(player, body);
            }
        }
    }

    // ---- groups ---------------------------------------------------------

    pub fn make_group(&mut self, members: &[ObjectId]) -> GroupId {
        let group = self.groups.new_group();
        for &id in members {
            self.groups.add_member(group, id);
        }
        group
    }

    pub fn group_members(&self, group: GroupId) -> &[ObjectId] {
        self.groups.members(group)
    }

    pub fn group_order(&self, group: GroupId) -> Option<&GroupOrder> {
        self.groups.state(group).map(|s| &s.order)
    }

    /// Attach a management order to a group. Replaces any previous order
    /// and applies on the next tick rather than the next poll.
    pub fn manage_group(&mut self, group: GroupId, order: GroupOrder) {
        let live = self.groups.members(group).len();
        self.groups.manage(group, order, live);
        self.scheduler
            .queue_task(Task::TacticsForGroup(group), 0, self.time_ms);
    }

    pub fn stop_managing_group(&mut self, group: GroupId) {
        self.groups.stop_managing(group);
    }

    /// Keep an empty managed group's order on the books instead of
    /// dropping it, so later reinforcements pick the order back up.
    pub fn set_group_removable(&mut self, group: GroupId, removable: bool) {
        self.groups.set_removable(group, removable);
    }

    // ---- trucks ---------------------------------------------------------

    pub fn manage_trucks(&mut self, player: u8) {
        self.trucks.manage(player);
    }

    pub fn queue_building(&mut self, player: u8, kind: StructureKind, pos: Pos) {
        self.trucks.queue_building(player, kind, pos);
    }

    pub fn build_queue_len(&self, player: u8) -> usize {
        self.trucks.queue_len(player)
    }

    // ---- transports -----------------------------------------------------

    pub fn queue_transport(&mut self, player: u8, request: TransportRequest) {
        transport::queue_transport(
            &mut self.transports,
            &mut self.scheduler,
            player,
            request,
            self.time_ms,
        );
    }

    pub fn transport_in_flight(&self, player: u8) -> bool {
        self.transports.is_in_flight(player)
    }

    pub fn transports_queued(&self, player: u8) -> usize {
        self.transports.queued(player)
    }

    // ---- VTOL raids ------------------------------------------------------

    pub fn setup_vtol_raid(&mut self, player: u8, raid: VtolRaid, spawn_every_ms: Option<u64>) {
        vtol::setup_vtol_raid(
            &mut self.vtols,
            &mut self.scheduler,
            player,
            raid,
            spawn_every_ms,
            self.time_ms,
        );
    }

    pub fn vtol_raid_active(&self, player: u8) -> bool {
        self.vtols.is_active(player)
    }

    // ---- artifacts, bases, factories, victory ---------------------------

    pub fn set_artifacts(&mut self, specs: Vec<(String, Vec<String>, ArtifactSource)>) {
        artifacts::set_artifacts(
            &mut self.world,
            &mut self.index,
            &mut self.ids,
            &mut self.artifacts,
            specs,
        );
    }

    pub fn artifact_picked_up(&self, label: &str) -> bool {
        self.artifacts.is_picked_up(label)
    }

    pub fn set_enemy_bases(&mut self, specs: Vec<BaseSpec>) {
        bases::set_enemy_bases(&self.world, &mut self.bases, specs);
    }

    pub fn base_detected(&self, label: &str) -> bool {
        self.bases.is_detected(label)
    }

    pub fn base_eliminated(&self, label: &str) -> bool {
        self.bases.is_eliminated(label)
    }

    pub fn set_factories(&mut self, specs: Vec<FactorySpec>) {
        self.factories.set_factories(specs);
    }

    pub fn enable_factory(&mut self, label: &str) {
        factories::enable_factory(&mut self.factories, &mut self.scheduler, label, self.time_ms);
    }

    pub fn set_victory_condition(&mut self, condition: VictoryCondition) {
        self.victory.condition = Some(condition);
    }

    pub fn has_research(&self, player: u8, tech: &str) -> bool {
        self.research.has(player, tech)
    }

    // ---- tick -----------------------------------------------------------

    /// Advance the session by `dt_ms` of sim time.
    pub fn update(&mut self, dt_ms: u64) {
        self.time_ms += dt_ms;

        // Due tasks first; a task may queue follow-ups due this very tick
        // (instant re-ticks after order changes), which also run now.
        while let Some(task) = self.scheduler.pop_due(self.time_ms) {
            self.run_task(task);
        }

        if self.time_ms - self.last_tactics_ms >= intervals::TACTICS_MS {
            self.last_tactics_ms = self.time_ms;
            tactics::tactics_system(
                &mut self.world,
                &self.index,
                &mut self.groups,
                &self.terrain,
                &mut self.rng,
                self.time_ms,
            );
        }

        if self.time_ms - self.last_trucks_ms >= intervals::TRUCKS_MS {
            self.last_trucks_ms = self.time_ms;
            trucks::trucks_system(&mut self.world, &self.index, &mut self.trucks, &self.terrain);
        }

        if self.time_ms - self.last_vtol_recall_ms >= intervals::VTOL_RECALL_MS {
            self.last_vtol_recall_ms = self.time_ms;
            vtol::vtol_recall_system(&mut self.world, &self.index, &self.vtols);
        }

        if self.time_ms - self.last_victory_ms >= intervals::VICTORY_MS {
            self.last_victory_ms = self.time_ms;
            bases::victory_system(
                &mut self.victory,
                &self.artifacts,
                &self.bases,
                &mut self.notifications,
            );
        }

        let report = execution::execution_system(
            &mut self.world,
            &mut self.index,
            &mut self.ids,
            &mut self.groups,
            dt_ms,
        );
        for departed in report.departed {
            trace!("{:?} left the map", departed);
        }
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::TacticsForGroup(group) => {
                tactics::tactics_tick_for_group(
                    &mut self.world,
                    &self.index,
                    &mut self.groups,
                    &self.terrain,
                    &mut self.rng,
                    self.time_ms,
                    group,
                );
            }
            Task::DispatchTransport { player } => {
                transport::dispatch_transport(
                    &mut self.transports,
                    &mut self.scheduler,
                    &mut self.notifications,
                    player,
                    self.time_ms,
                );
            }
            Task::LandTransport { player } => {
                transport::land_transport(
                    &mut self.world,
                    &mut self.index,
                    &mut self.ids,
                    &mut self.groups,
                    &mut self.transports,
                    &mut self.scheduler,
                    &mut self.notifications,
                    player,
                    self.time_ms,
                );
            }
            Task::SpawnVtolWave { player } => {
                vtol::spawn_vtol_wave(
                    &mut self.world,
                    &mut self.index,
                    &mut self.ids,
                    &mut self.groups,
                    &mut self.scheduler,
                    &mut self.vtols,
                    &mut self.rng,
                    player,
                    self.time_ms,
                );
            }
            Task::VtolStopCheck { player } => {
                vtol::vtol_stop_check(&self.world, &mut self.vtols, &mut self.scheduler, player);
            }
            Task::ProduceUnit { factory } => {
                factories::produce_unit(
                    &mut self.world,
                    &mut self.index,
                    &mut self.ids,
                    &mut self.groups,
                    &mut self.factories,
                    &mut self.scheduler,
                    factory,
                    self.time_ms,
                );
            }
        }
    }

    // ---- events ---------------------------------------------------------

    /// Feed one host event through the library's bookkeeping. Scenario
    /// code should observe events only after this returns.
    pub fn handle_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::LevelStart => {
                info!("campaign level starts");
            }
            GameEvent::Attacked { victim, attacker: _ } => {
                // Managed groups remember recent hits for the regroup
                // fallback rule.
                if let Some(group) = self.groups.group_of(victim) {
                    if let Some(state) = self.groups.state_mut(group) {
                        state.last_hit_ms = self.time_ms;
                    }
                }
                // First contact with a hidden base reveals it.
                if let Some(label) = self.bases.base_for_object(victim).map(str::to_string) {
                    bases::detect_base(&mut self.bases, &mut self.notifications, &label);
                }
                // Throttled commander alert.
                if self.object_player(victim) == Some(HUMAN_PLAYER) {
                    let alert_due = match self.last_alert_ms {
                        None => true,
                        Some(last) => self.time_ms.saturating_sub(last) >= intervals::ATTACK_ALERT_MS,
                    };
                    if alert_due {
                        self.last_alert_ms = Some(self.time_ms);
                        push_notification(
                            &mut self.notifications,
                            Notification::Message {
                                player: HUMAN_PLAYER,
                                text: "Forces under attack".to_string(),
                            },
                        );
                    }
                }
            }
            GameEvent::UnitBuilt { unit, factory } => {
                trace!("{:?} built by {:?}", unit, factory);
            }
            GameEvent::ObjectDestroyed { object } => {
                self.destroy_object(object);
            }
            GameEvent::AreaEntered { unit: _, label } => {
                // Walking into a base area counts as discovering it.
                bases::detect_base(&mut self.bases, &mut self.notifications, &label);
            }
            GameEvent::Pickup { feature, unit: _ } => {
                artifacts::pickup_artifact(
                    &mut self.world,
                    &mut self.index,
                    &mut self.artifacts,
                    &mut self.research,
                    &mut self.notifications,
                    feature,
                );
            }
            GameEvent::GroupLoss {
                unit: _,
                group,
                remaining,
            } => {
                if tactics::check_group_morale(&mut self.groups, group, remaining) {
                    self.scheduler
                        .queue_task(Task::TacticsForGroup(group), 0, self.time_ms);
                }
            }
            GameEvent::TransportLanded { player } => {
                transport::land_transport(
                    &mut self.world,
                    &mut self.index,
                    &mut self.ids,
                    &mut self.groups,
                    &mut self.transports,
                    &mut self.scheduler,
                    &mut self.notifications,
                    player,
                    self.time_ms,
                );
            }
            GameEvent::ResearchCompleted { player, tech } => {
                self.research.grant(player, &tech);
            }
        }
    }

    /// Take all accumulated notifications, oldest first.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}
