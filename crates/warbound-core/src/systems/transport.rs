//! Transport reinforcement scheduler.
//!
//! Each player gets a FIFO queue of reinforcement requests and at most one
//! transport in the air at a time. A dispatch attempt while a flight is
//! already up re-queues itself rather than double-launching; the next
//! request launches only after the current one has landed and unloaded.

use std::collections::{BTreeMap, VecDeque};

use hecs::World;
use log::{debug, trace};

use warbound_logic::constants::{intervals, REINFORCEMENT_EXPERIENCE, HUMAN_PLAYER};
use warbound_logic::geometry::Pos;
use warbound_logic::ids::{GroupId, ObjectId};
use warbound_logic::orders::GroupOrder;
use warbound_logic::templates::{Propulsion, Turret, UnitTemplate};

use crate::components::{
    Ammo, Health, IdAllocator, Location, ObjectIndex, TransportCraft, Unit, UnitOrder,
};
use crate::events::{push_notification, Notification};
use crate::scheduler::{Scheduler, Task};
use crate::systems::issue_order;
use crate::systems::tactics::GroupRegistry;

/// One reinforcement delivery: what to bring, where to land, and what the
/// delivered group should do.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransportRequest {
    pub units: Vec<UnitTemplate>,
    /// Landing position; cargo unloads around it.
    pub entry: Pos,
    /// Where the empty transport flies off the map.
    pub exit: Pos,
    /// Order the delivered group is managed with, if any.
    pub order: Option<GroupOrder>,
    /// Announcement shown while the transport is inbound.
    pub message: Option<String>,
}

/// Per-player transport queues plus the single-flight latch.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TransportScheduler {
    queues: BTreeMap<u8, VecDeque<TransportRequest>>,
    in_flight: BTreeMap<u8, TransportRequest>,
    /// The one craft each player owns, created on first landing.
    craft: BTreeMap<u8, ObjectId>,
}

impl TransportScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self, player: u8) -> usize {
        self.queues.get(&player).map(VecDeque::len).unwrap_or(0)
    }

    pub fn is_in_flight(&self, player: u8) -> bool {
        self.in_flight.contains_key(&player)
    }

    pub fn craft(&self, player: u8) -> Option<ObjectId> {
        self.craft.get(&player).copied()
    }
}

/// Enqueue a reinforcement request and arm a dispatch attempt for the
/// next tick.
pub fn queue_transport(
    transports: &mut TransportScheduler,
    scheduler: &mut Scheduler,
    player: u8,
    request: TransportRequest,
    now_ms: u64,
) {
    transports.queues.entry(player).or_default().push_back(request);
    scheduler.queue_task(Task::DispatchTransport { player }, 0, now_ms);
}

/// Try to launch the player's next queued transport. With a flight
/// already up this defers itself; the landing handler will also arm a
/// fresh dispatch, so nothing is lost either way.
pub fn dispatch_transport(
    transports: &mut TransportScheduler,
    scheduler: &mut Scheduler,
    notifications: &mut Vec<Notification>,
    player: u8,
    now_ms: u64,
) {
    if transports.queued(player) == 0 {
        return;
    }
    if transports.in_flight.contains_key(&player) {
        trace!("player {} transport busy, retrying later", player);
        scheduler.queue_task(
            Task::DispatchTransport { player },
            intervals::TRANSPORT_RETRY_MS,
            now_ms,
        );
        return;
    }
    let Some(request) = transports
        .queues
        .get_mut(&player)
        .and_then(VecDeque::pop_front)
    else {
        return;
    };
    debug!(
        "player {} transport lifts off with {} units",
        player,
        request.units.len()
    );
    push_notification(
        notifications,
        Notification::IncomingTransport {
            player,
            message: request.message.clone(),
        },
    );
    transports.in_flight.insert(player, request);
    scheduler.queue_task(
        Task::LandTransport { player },
        intervals::TRANSPORT_FLIGHT_MS,
        now_ms,
    );
}

/// The in-flight transport touches down: unload cargo into a fresh group,
/// send the empty craft back to its exit holding point, and free the
/// flight slot.
#[allow(clippy::too_many_arguments)]
pub fn land_transport(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    groups: &mut GroupRegistry,
    transports: &mut TransportScheduler,
    scheduler: &mut Scheduler,
    notifications: &mut Vec<Notification>,
    player: u8,
    now_ms: u64,
) -> Option<GroupId> {
    let Some(request) = transports.in_flight.remove(&player) else {
        debug!("player {} has no transport to land", player);
        return None;
    };

    // Each player has one craft, created lazily and reused for every wave.
    // It touches down at the landing zone, then flies back out and waits
    // at the exit. It is never a valid target while on the map.
    match transports.craft.get(&player).copied().filter(|id| index.contains_key(id)) {
        Some(craft_id) => {
            if let Some(&entity) = index.get(&craft_id) {
                if let Ok(mut loc) = world.get::<&mut Location>(entity) {
                    *loc = Location::new(request.entry);
                }
            }
            issue_order(world, index, craft_id, UnitOrder::Move { to: request.exit });
        }
        None => {
            let craft_template =
                UnitTemplate::new("Transport", "Transport", Propulsion::Lift, Turret::MachineGun);
            let craft_id = ids.alloc();
            let craft = world.spawn((
                Unit::from_template(craft_id, player, &craft_template),
                Location::new(request.entry),
                Health::full(),
                TransportCraft,
                UnitOrder::Move { to: request.exit },
            ));
            index.insert(craft_id, craft);
            transports.craft.insert(player, craft_id);
        }
    }

    let group = groups.new_group();
    for (i, template) in request.units.iter().enumerate() {
        let offset = Pos::new(
            request.entry.x + (i % 3) as i32,
            request.entry.y + (i / 3) as i32,
        );
        let id = ids.alloc();
        let mut unit = Unit::from_template(id, player, template);
        if player != HUMAN_PLAYER {
            unit.experience = REINFORCEMENT_EXPERIENCE;
        }
        let entity = world.spawn((
            unit,
            Location::new(offset),
            Health::full(),
            Ammo::full(),
            UnitOrder::Idle,
        ));
        index.insert(id, entity);
        groups.add_member(group, id);
    }

    if let Some(order) = request.order {
        groups.manage(group, order, request.units.len());
        // New orders apply immediately, not at the next poll.
        scheduler.queue_task(Task::TacticsForGroup(group), 0, now_ms);
    }

    push_notification(notifications, Notification::TransportLanded { player, group });

    // The slot is free again; chase the next queued request.
    if transports.queued(player) > 0 {
        scheduler.queue_task(Task::DispatchTransport { player }, 0, now_ms);
    }
    Some(group)
}
