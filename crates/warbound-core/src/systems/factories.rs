//! Managed factories — computer-player unit production.
//!
//! An enabled factory cycles through its template list, collecting
//! finished units at its assembly point into a group. When the group
//! reaches the configured size it is handed to the tactics dispatcher
//! under the factory's order, and a fresh group starts filling.
//!
//! Truck reconstruction rides on the same machinery: a lost builder
//! enqueues a rebuild request that jumps the template rotation at the
//! owner's next factory slot.

use std::collections::{BTreeMap, VecDeque};

use hecs::World;
use log::{debug, trace};

use warbound_logic::constants::intervals;
use warbound_logic::geometry::Pos;
use warbound_logic::ids::{GroupId, ObjectId};
use warbound_logic::orders::GroupOrder;
use warbound_logic::templates::UnitTemplate;

use crate::components::{Ammo, Health, IdAllocator, Location, ObjectIndex, Unit, UnitOrder};
use crate::scheduler::{Scheduler, Task};
use crate::systems::object_pos;
use crate::systems::tactics::GroupRegistry;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FactoryInfo {
    pub object: ObjectId,
    pub player: u8,
    /// Where finished units gather; defaults to the factory's own tile.
    pub assembly: Option<Pos>,
    /// Units per delivered group.
    pub group_size: usize,
    /// Templates cycled through in production.
    pub templates: Vec<UnitTemplate>,
    /// Order each delivered group is managed with.
    pub order: Option<GroupOrder>,
    pub build_ms: u64,
    enabled: bool,
    next_template: usize,
    group: Option<GroupId>,
}

/// One factory definition as handed in by the scenario.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FactorySpec {
    pub label: String,
    pub object: ObjectId,
    pub player: u8,
    pub assembly: Option<Pos>,
    pub group_size: usize,
    pub templates: Vec<UnitTemplate>,
    pub order: Option<GroupOrder>,
    pub build_ms: Option<u64>,
}

/// Factories by scenario label, plus pending truck rebuilds per player.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FactoryManager {
    factories: BTreeMap<String, FactoryInfo>,
    pending_rebuilds: BTreeMap<u8, VecDeque<UnitTemplate>>,
}

impl FactoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register factories. They stay dormant until enabled.
    pub fn set_factories(&mut self, specs: Vec<FactorySpec>) {
        for spec in specs {
            self.factories.insert(
                spec.label,
                FactoryInfo {
                    object: spec.object,
                    player: spec.player,
                    assembly: spec.assembly,
                    group_size: spec.group_size.max(1),
                    templates: spec.templates,
                    order: spec.order,
                    build_ms: spec.build_ms.unwrap_or(intervals::FACTORY_BUILD_MS),
                    enabled: false,
                    next_template: 0,
                    group: None,
                },
            );
        }
    }

    pub fn is_enabled(&self, label: &str) -> bool {
        self.factories.get(label).map(|f| f.enabled).unwrap_or(false)
    }

    pub fn info(&self, label: &str) -> Option<&FactoryInfo> {
        self.factories.get(label)
    }

    fn by_object(&mut self, object: ObjectId) -> Option<&mut FactoryInfo> {
        self.factories.values_mut().find(|f| f.object == object)
    }

    /// Request a replacement truck for a player whose builder died.
    /// Served ahead of the regular rotation, loadout reduced to a plain
    /// construction truck.
    pub fn queue_truck_rebuild(&mut self, player: u8, body: impl Into<String>) {
        self.pending_rebuilds
            .entry(player)
            .or_default()
            .push_back(UnitTemplate::rebuilt_truck(body));
    }

    pub fn pending_rebuilds(&self, player: u8) -> usize {
        self.pending_rebuilds
            .get(&player)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// Whether any enabled factory can serve this player's rebuilds.
    pub fn has_enabled_factory_for(&self, player: u8) -> bool {
        self.factories
            .values()
            .any(|f| f.player == player && f.enabled)
    }

    /// The factory fell; production stops for good.
    pub fn note_factory_destroyed(&mut self, object: ObjectId) {
        if let Some(factory) = self.by_object(object) {
            factory.enabled = false;
        }
    }
}

/// Start (or restart) production at a factory.
pub fn enable_factory(
    manager: &mut FactoryManager,
    scheduler: &mut Scheduler,
    label: &str,
    now_ms: u64,
) {
    let Some(factory) = manager.factories.get_mut(label) else {
        debug!("no factory labelled {}", label);
        return;
    };
    if factory.enabled {
        return;
    }
    factory.enabled = true;
    debug!("factory {} starts production", label);
    scheduler.queue_task(
        Task::ProduceUnit {
            factory: factory.object,
        },
        factory.build_ms,
        now_ms,
    );
}

/// A factory finishes one unit: spawn it, grow the assembly group, hand
/// the group off when full, and schedule the next unit.
pub fn produce_unit(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    groups: &mut GroupRegistry,
    manager: &mut FactoryManager,
    scheduler: &mut Scheduler,
    factory_object: ObjectId,
    now_ms: u64,
) {
    let Some(factory_pos) = object_pos(world, index, factory_object) else {
        // The factory died between scheduling and firing.
        manager.note_factory_destroyed(factory_object);
        return;
    };
    let Some(factory) = manager.by_object(factory_object) else {
        return;
    };
    if !factory.enabled {
        return;
    }
    let player = factory.player;

    // Truck rebuilds jump the rotation.
    let rebuild = manager
        .pending_rebuilds
        .get_mut(&player)
        .and_then(VecDeque::pop_front);
    let factory = manager.by_object(factory_object).expect("looked up above");

    let spawn_at = factory.assembly.unwrap_or(factory_pos);
    let (template, is_rebuild) = match rebuild {
        Some(t) => (t, true),
        None => {
            if factory.templates.is_empty() {
                trace!("factory at {:?} has nothing to build", factory_pos);
                return;
            }
            let t = factory.templates[factory.next_template].clone();
            factory.next_template = (factory.next_template + 1) % factory.templates.len();
            (t, false)
        }
    };

    let id = ids.alloc();
    let entity = world.spawn((
        Unit::from_template(id, factory.player, &template),
        Location::new(spawn_at),
        Health::full(),
        Ammo::full(),
        UnitOrder::Idle,
    ));
    index.insert(id, entity);

    if is_rebuild {
        // Replacement trucks go straight to the truck manager's idle
        // pool, never into a combat group.
        trace!("factory rebuilds a truck for player {}", factory.player);
    } else {
        let group = match factory.group {
            Some(g) => g,
            None => {
                let g = groups.new_group();
                factory.group = Some(g);
                g
            }
        };
        groups.add_member(group, id);
        if groups.members(group).len() >= factory.group_size {
            if let Some(order) = factory.order.clone() {
                groups.manage(group, order, factory.group_size);
                scheduler.queue_task(Task::TacticsForGroup(group), 0, now_ms);
            }
            factory.group = None;
        }
    }

    let build_ms = factory.build_ms;
    scheduler.queue_task(
        Task::ProduceUnit {
            factory: factory_object,
        },
        build_ms,
        now_ms,
    );
}
