//! Per-tick poller systems.
//!
//! Each system is a free function over the pieces of session state it
//! needs, in dependency order: the dispatchers (tactics, trucks,
//! transports, vtol) write [`UnitOrder`]s, and the execution system
//! advances them. Nothing here returns errors; degraded operations
//! trace-log and skip.

pub mod artifacts;
pub mod bases;
pub mod execution;
pub mod factories;
pub mod tactics;
pub mod transport;
pub mod trucks;
pub mod vtol;

use hecs::World;

use warbound_logic::geometry::Pos;
use warbound_logic::ids::ObjectId;

use crate::components::{
    Feature, FeatureKind, Location, ObjectIndex, Structure, StructureKind, TransportCraft, Unit,
    UnitOrder,
};

/// Snapshot of one enumerable object belonging to a player, used by
/// target scans.
#[derive(Debug, Clone, Copy)]
pub struct PlayerObject {
    pub id: ObjectId,
    pub pos: Pos,
    pub is_structure: bool,
    pub is_vtol: bool,
    pub is_transport: bool,
}

/// Enumerate a player's units and structures with their positions.
pub fn collect_player_objects(world: &World, player: u8) -> Vec<PlayerObject> {
    let mut objects = Vec::new();
    for (entity, (unit, loc)) in world.query::<(&Unit, &Location)>().iter() {
        if unit.player != player {
            continue;
        }
        objects.push(PlayerObject {
            id: unit.id,
            pos: loc.pos,
            is_structure: false,
            is_vtol: unit.is_vtol(),
            is_transport: world.get::<&TransportCraft>(entity).is_ok(),
        });
    }
    for (_, (structure, loc)) in world.query::<(&Structure, &Location)>().iter() {
        if structure.player != player {
            continue;
        }
        objects.push(PlayerObject {
            id: structure.id,
            pos: loc.pos,
            is_structure: true,
            is_vtol: false,
            is_transport: false,
        });
    }
    // Stable order regardless of archetype layout.
    objects.sort_by_key(|o| o.id);
    objects
}

/// Whether a player owns at least one structure of the given kind.
pub fn player_has_structure(world: &World, player: u8, kind: StructureKind) -> bool {
    world
        .query::<&Structure>()
        .iter()
        .any(|(_, s)| s.player == player && s.kind == kind)
}

/// Position of the player's structure of the given kind closest to `from`.
pub fn nearest_structure(
    world: &World,
    player: u8,
    kind: StructureKind,
    from: Pos,
) -> Option<Pos> {
    world
        .query::<(&Structure, &Location)>()
        .iter()
        .filter(|(_, (s, _))| s.player == player && s.kind == kind)
        .map(|(_, (s, loc))| (s.id, loc.pos))
        .min_by(|(ia, a), (ib, b)| {
            from.dist(*a)
                .partial_cmp(&from.dist(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(ia.cmp(ib))
        })
        .map(|(_, pos)| pos)
}

/// Features of a kind, with positions, in id order.
pub fn collect_features(world: &World, kind: FeatureKind) -> Vec<(ObjectId, Pos)> {
    let mut features: Vec<(ObjectId, Pos)> = world
        .query::<(&Feature, &Location)>()
        .iter()
        .filter(|(_, (f, _))| f.kind == kind)
        .map(|(_, (f, loc))| (f.id, loc.pos))
        .collect();
    features.sort_by_key(|(id, _)| *id);
    features
}

/// Resolve an object's position through the index. `None` once it is gone.
pub fn object_pos(world: &World, index: &ObjectIndex, id: ObjectId) -> Option<Pos> {
    let entity = *index.get(&id)?;
    world.get::<&Location>(entity).ok().map(|loc| loc.pos)
}

/// Set a unit's current order, if it still exists.
pub fn issue_order(world: &mut World, index: &ObjectIndex, id: ObjectId, order: UnitOrder) {
    if let Some(&entity) = index.get(&id) {
        if let Ok(mut current) = world.get::<&mut UnitOrder>(entity) {
            *current = order;
        }
    }
}
