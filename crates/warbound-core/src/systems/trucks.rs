//! Truck management — per-player construction queues.
//!
//! Build requests are strictly FIFO per player. The head of the queue
//! blocks everything behind it until a truck can actually take it: an
//! unreachable site stalls the whole queue rather than being skipped, so
//! scenarios can rely on structures appearing in request order.
//!
//! Managed players also put their idle trucks to work claiming oil
//! resources with derricks, without any explicit request.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use hecs::World;
use log::trace;

use warbound_logic::geometry::Pos;
use warbound_logic::ids::ObjectId;
use warbound_logic::terrain::Terrain;

use crate::components::{FeatureKind, Location, ObjectIndex, StructureKind, Unit, UnitOrder};
use crate::systems::{collect_features, issue_order};

/// One queued construction request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TruckQueueEntry {
    pub kind: StructureKind,
    pub pos: Pos,
}

/// Per-player build queues and the set of players whose trucks are
/// managed at all.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TruckManager {
    queues: BTreeMap<u8, VecDeque<TruckQueueEntry>>,
    managed: BTreeSet<u8>,
}

impl TruckManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable truck management for a player. Idempotent.
    pub fn manage(&mut self, player: u8) {
        self.managed.insert(player);
    }

    pub fn is_managed(&self, player: u8) -> bool {
        self.managed.contains(&player)
    }

    /// Append a build request to the player's queue. Requests are served
    /// strictly in order.
    pub fn queue_building(&mut self, player: u8, kind: StructureKind, pos: Pos) {
        self.queues.entry(player).or_default().push_back(TruckQueueEntry { kind, pos });
    }

    pub fn queue_len(&self, player: u8) -> usize {
        self.queues.get(&player).map(VecDeque::len).unwrap_or(0)
    }

    pub fn peek(&self, player: u8) -> Option<&TruckQueueEntry> {
        self.queues.get(&player).and_then(VecDeque::front)
    }
}

struct IdleTruck {
    id: ObjectId,
    pos: Pos,
}

/// Idle construction-capable units of a player, in id order.
fn idle_trucks(world: &World, player: u8) -> Vec<IdleTruck> {
    let mut trucks: Vec<IdleTruck> = world
        .query::<(&Unit, &Location, &UnitOrder)>()
        .iter()
        .filter(|(_, (u, _, o))| u.player == player && u.is_builder() && o.is_idle())
        .map(|(_, (u, loc, _))| IdleTruck { id: u.id, pos: loc.pos })
        .collect();
    trucks.sort_by_key(|t| t.id);
    trucks
}

/// Sites some truck is already building at or heading to, so two trucks
/// never claim the same oil patch.
fn active_build_sites(world: &World, player: u8) -> Vec<Pos> {
    world
        .query::<(&Unit, &UnitOrder)>()
        .iter()
        .filter(|(_, (u, _))| u.player == player)
        .filter_map(|(_, (_, o))| o.build_site())
        .collect()
}

/// One pass over every managed player's trucks: drain the build queue in
/// order, then send leftover idle trucks after unclaimed oil.
pub fn trucks_system(
    world: &mut World,
    index: &ObjectIndex,
    trucks: &mut TruckManager,
    terrain: &Terrain,
) {
    let players: Vec<u8> = trucks.managed.iter().copied().collect();
    for player in players {
        let mut idle = idle_trucks(world, player);
        if idle.is_empty() {
            continue;
        }

        // Queue drain. The head blocks: an entry no truck can reach stalls
        // everything behind it until the situation changes.
        loop {
            let Some(entry) = trucks.queues.get(&player).and_then(VecDeque::front).cloned() else {
                break;
            };
            let candidate = idle
                .iter()
                .enumerate()
                .filter(|(_, t)| terrain.can_reach(t.pos, entry.pos))
                .min_by(|(_, a), (_, b)| {
                    entry
                        .pos
                        .dist(a.pos)
                        .partial_cmp(&entry.pos.dist(b.pos))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.id.cmp(&b.id))
                })
                .map(|(i, _)| i);
            let Some(i) = candidate else {
                trace!("player {} build queue blocked at {:?}", player, entry.pos);
                break;
            };
            let truck = idle.remove(i);
            issue_order(
                world,
                index,
                truck.id,
                UnitOrder::Build {
                    structure: entry.kind,
                    to: entry.pos,
                    progress_ms: 0,
                },
            );
            trucks.queues.get_mut(&player).expect("queue exists").pop_front();
            if idle.is_empty() {
                break;
            }
        }

        // Oil claim pass for whoever is still idle.
        if idle.is_empty() {
            continue;
        }
        let taken = active_build_sites(world, player);
        let oil: Vec<(ObjectId, Pos)> = collect_features(world, FeatureKind::OilResource)
            .into_iter()
            .filter(|(_, pos)| !taken.contains(pos))
            .collect();
        let mut claimed: Vec<Pos> = Vec::new();
        for truck in &idle {
            let spot = oil
                .iter()
                .filter(|(_, pos)| !claimed.contains(pos))
                .filter(|(_, pos)| terrain.can_reach(truck.pos, *pos))
                .min_by(|(ia, a), (ib, b)| {
                    truck
                        .pos
                        .dist(*a)
                        .partial_cmp(&truck.pos.dist(*b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(ia.cmp(ib))
                })
                .map(|(_, pos)| *pos);
            if let Some(pos) = spot {
                claimed.push(pos);
                issue_order(
                    world,
                    index,
                    truck.id,
                    UnitOrder::Build {
                        structure: StructureKind::OilDerrick,
                        to: pos,
                        progress_ms: 0,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warbound_logic::templates::{Propulsion, Turret, UnitTemplate};

    fn spawn_truck(
        world: &mut World,
        index: &mut ObjectIndex,
        id: u32,
        player: u8,
        pos: Pos,
    ) -> ObjectId {
        let oid = ObjectId(id);
        let template = UnitTemplate::rebuilt_truck("Viper");
        let entity = world.spawn((
            Unit::from_template(oid, player, &template),
            Location::new(pos),
            UnitOrder::Idle,
        ));
        index.insert(oid, entity);
        oid
    }

    fn spawn_oil(world: &mut World, index: &mut ObjectIndex, id: u32, pos: Pos) {
        let oid = ObjectId(id);
        let entity = world.spawn((
            crate::components::Feature::new(oid, FeatureKind::OilResource),
            Location::new(pos),
        ));
        index.insert(oid, entity);
    }

    fn order_of(world: &World, index: &ObjectIndex, id: ObjectId) -> UnitOrder {
        *world.get::<&UnitOrder>(index[&id]).unwrap()
    }

    #[test]
    fn test_queue_served_in_order() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut trucks = TruckManager::new();
        let terrain = Terrain::open(32, 32);

        let t1 = spawn_truck(&mut world, &mut index, 1, 2, Pos::new(0, 0));
        let t2 = spawn_truck(&mut world, &mut index, 2, 2, Pos::new(20, 20));
        trucks.manage(2);
        trucks.queue_building(2, StructureKind::Defense, Pos::new(2, 2));
        trucks.queue_building(2, StructureKind::Factory, Pos::new(22, 22));

        trucks_system(&mut world, &index, &mut trucks, &terrain);

        // Closest truck per entry, both entries taken.
        assert_eq!(trucks.queue_len(2), 0);
        assert!(matches!(
            order_of(&world, &index, t1),
            UnitOrder::Build { structure: StructureKind::Defense, .. }
        ));
        assert!(matches!(
            order_of(&world, &index, t2),
            UnitOrder::Build { structure: StructureKind::Factory, .. }
        ));
    }

    #[test]
    fn test_blocked_head_stalls_queue() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut trucks = TruckManager::new();
        let mut terrain = Terrain::open(32, 32);
        // Wall the right half off.
        terrain.block_column(16, 0, 31);

        let t = spawn_truck(&mut world, &mut index, 1, 2, Pos::new(0, 0));
        trucks.manage(2);
        // Head is across the wall; the second entry would be trivially
        // buildable but must wait its turn.
        trucks.queue_building(2, StructureKind::Defense, Pos::new(20, 20));
        trucks.queue_building(2, StructureKind::Factory, Pos::new(2, 2));

        trucks_system(&mut world, &index, &mut trucks, &terrain);

        assert_eq!(trucks.queue_len(2), 2);
        assert!(order_of(&world, &index, t).is_idle());
    }

    #[test]
    fn test_reachable_head_built_blocked_tail_waits() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut trucks = TruckManager::new();
        let mut terrain = Terrain::open(32, 32);
        terrain.block_column(16, 0, 31);

        let t = spawn_truck(&mut world, &mut index, 1, 2, Pos::new(0, 0));
        trucks.manage(2);
        // Head on the near side, second entry across the wall: the head
        // is served and dequeued, the rest of the queue stays put.
        trucks.queue_building(2, StructureKind::Defense, Pos::new(2, 2));
        trucks.queue_building(2, StructureKind::Factory, Pos::new(20, 20));

        trucks_system(&mut world, &index, &mut trucks, &terrain);

        assert!(matches!(
            order_of(&world, &index, t),
            UnitOrder::Build { structure: StructureKind::Defense, .. }
        ));
        assert_eq!(trucks.queue_len(2), 1);
        assert_eq!(
            trucks.peek(2),
            Some(&TruckQueueEntry {
                kind: StructureKind::Factory,
                pos: Pos::new(20, 20),
            })
        );
    }

    #[test]
    fn test_idle_trucks_claim_oil() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut trucks = TruckManager::new();
        let terrain = Terrain::open(32, 32);

        let t = spawn_truck(&mut world, &mut index, 1, 2, Pos::new(0, 0));
        spawn_oil(&mut world, &mut index, 10, Pos::new(5, 5));
        trucks.manage(2);

        trucks_system(&mut world, &index, &mut trucks, &terrain);

        assert_eq!(
            order_of(&world, &index, t),
            UnitOrder::Build {
                structure: StructureKind::OilDerrick,
                to: Pos::new(5, 5),
                progress_ms: 0,
            }
        );
    }

    #[test]
    fn test_two_trucks_do_not_claim_same_oil() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut trucks = TruckManager::new();
        let terrain = Terrain::open(32, 32);

        let a = spawn_truck(&mut world, &mut index, 1, 2, Pos::new(0, 0));
        let b = spawn_truck(&mut world, &mut index, 2, 2, Pos::new(1, 0));
        spawn_oil(&mut world, &mut index, 10, Pos::new(5, 5));
        spawn_oil(&mut world, &mut index, 11, Pos::new(8, 8));
        trucks.manage(2);

        trucks_system(&mut world, &index, &mut trucks, &terrain);

        let sa = order_of(&world, &index, a).build_site().unwrap();
        let sb = order_of(&world, &index, b).build_site().unwrap();
        assert_ne!(sa, sb);
    }

    #[test]
    fn test_unmanaged_player_untouched() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut trucks = TruckManager::new();
        let terrain = Terrain::open(32, 32);

        let t = spawn_truck(&mut world, &mut index, 1, 3, Pos::new(0, 0));
        spawn_oil(&mut world, &mut index, 10, Pos::new(5, 5));
        trucks.queue_building(3, StructureKind::Defense, Pos::new(2, 2));

        trucks_system(&mut world, &index, &mut trucks, &terrain);

        // Player 3 was never passed to manage().
        assert!(order_of(&world, &index, t).is_idle());
        assert_eq!(trucks.queue_len(3), 1);
    }
}
