//! Order execution — advances every unit's current directive each update.
//!
//! The dispatchers above decide WHAT a unit should do; this system makes
//! it happen over time: tile movement against the propulsion's speed,
//! build progress, healing and rearming at facilities, and despawning
//! units that fly off the map. Combat damage is the host's business and
//! arrives as events, not from here.
//!
//! Runs in two phases so cross-entity lookups stay cheap: an immutable
//! decision pass over the world, then an apply pass.

use hecs::World;
use log::{debug, trace};

use warbound_logic::constants::{intervals, radii};
use warbound_logic::geometry::Pos;
use warbound_logic::ids::ObjectId;

use crate::components::{
    Ammo, Feature, FeatureKind, Health, IdAllocator, Location, ObjectIndex, Structure,
    StructureKind, Unit, UnitOrder,
};
use crate::systems::tactics::GroupRegistry;
use crate::systems::{nearest_structure, object_pos};

/// What one execution pass did, for callers that need to react.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// Units that reached their exit point and left the map.
    pub departed: Vec<ObjectId>,
    /// Structures finished this pass.
    pub built: Vec<(ObjectId, StructureKind, Pos)>,
}

struct Step {
    id: ObjectId,
    pos: Pos,
    carry: f32,
    order: Option<UnitOrder>,
    heal: bool,
    rearm: bool,
    depart: bool,
    build: Option<(StructureKind, Pos)>,
}

/// March `pos` toward `to`, spending whole tiles from `budget`. Diagonal
/// steps cost one tile like the rest; this is a campaign map, not a
/// pathfinder.
fn march(mut pos: Pos, to: Pos, budget: &mut f32) -> Pos {
    while *budget >= 1.0 && pos != to {
        pos.x += (to.x - pos.x).signum();
        pos.y += (to.y - pos.y).signum();
        *budget -= 1.0;
    }
    pos
}

fn arrived(pos: Pos, to: Pos) -> bool {
    pos.dist(to) < radii::CLOSE as f32
}

/// Advance all unit orders by `dt_ms` of sim time.
pub fn execution_system(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    groups: &mut GroupRegistry,
    dt_ms: u64,
) -> ExecutionReport {
    let dt_s = dt_ms as f32 / 1_000.0;
    let mut steps: Vec<Step> = Vec::new();

    for (_, (unit, loc, order)) in world.query::<(&Unit, &Location, &UnitOrder)>().iter() {
        let mut budget = loc.carry + unit.propulsion.speed() * dt_s;
        let mut step = Step {
            id: unit.id,
            pos: loc.pos,
            carry: 0.0,
            order: None,
            heal: false,
            rearm: false,
            depart: false,
            build: None,
        };

        match *order {
            UnitOrder::Idle | UnitOrder::Hold => {
                continue;
            }
            UnitOrder::Move { to } | UnitOrder::Scout { to } => {
                step.pos = march(loc.pos, to, &mut budget);
                if arrived(step.pos, to) {
                    step.order = Some(UnitOrder::Idle);
                }
            }
            UnitOrder::Attack { target } | UnitOrder::Observe { target } => {
                match object_pos(world, index, target) {
                    Some(to) => {
                        if !arrived(loc.pos, to) {
                            step.pos = march(loc.pos, to, &mut budget);
                        }
                    }
                    None => {
                        // Target gone; back to the dispatcher.
                        step.order = Some(UnitOrder::Idle);
                    }
                }
            }
            UnitOrder::Support { commander } => match object_pos(world, index, commander) {
                Some(to) => {
                    if !arrived(loc.pos, to) {
                        step.pos = march(loc.pos, to, &mut budget);
                    }
                }
                None => {
                    step.order = Some(UnitOrder::Idle);
                }
            },
            UnitOrder::RetreatToRepair => {
                match nearest_structure(world, unit.player, StructureKind::RepairFacility, loc.pos)
                {
                    Some(to) => {
                        step.pos = march(loc.pos, to, &mut budget);
                        if arrived(step.pos, to) {
                            step.heal = true;
                            step.order = Some(UnitOrder::Idle);
                        }
                    }
                    None => {
                        step.order = Some(UnitOrder::Idle);
                    }
                }
            }
            UnitOrder::Rearm => {
                match nearest_structure(world, unit.player, StructureKind::RearmPad, loc.pos) {
                    Some(to) => {
                        step.pos = march(loc.pos, to, &mut budget);
                        if arrived(step.pos, to) {
                            step.heal = true;
                            step.rearm = true;
                            step.order = Some(UnitOrder::Idle);
                        }
                    }
                    None => {
                        step.order = Some(UnitOrder::Idle);
                    }
                }
            }
            UnitOrder::ReturnToBase => {
                match nearest_structure(world, unit.player, StructureKind::Headquarters, loc.pos) {
                    Some(to) => {
                        step.pos = march(loc.pos, to, &mut budget);
                        if arrived(step.pos, to) {
                            step.order = Some(UnitOrder::Idle);
                        }
                    }
                    None => {
                        step.order = Some(UnitOrder::Idle);
                    }
                }
            }
            UnitOrder::Build {
                structure,
                to,
                progress_ms,
            } => {
                if !arrived(loc.pos, to) {
                    step.pos = march(loc.pos, to, &mut budget);
                    // Keep zero progress while travelling.
                    step.order = Some(UnitOrder::Build {
                        structure,
                        to,
                        progress_ms: 0,
                    });
                } else {
                    let progress_ms = progress_ms + dt_ms;
                    if progress_ms >= intervals::STRUCTURE_BUILD_MS {
                        step.build = Some((structure, to));
                        step.order = Some(UnitOrder::Idle);
                    } else {
                        step.order = Some(UnitOrder::Build {
                            structure,
                            to,
                            progress_ms,
                        });
                    }
                }
            }
            UnitOrder::Leave { to } => {
                step.pos = march(loc.pos, to, &mut budget);
                if arrived(step.pos, to) {
                    step.depart = true;
                }
            }
        }

        step.carry = budget.min(1.0);
        steps.push(step);
    }

    let mut report = ExecutionReport::default();
    for step in steps {
        let Some(&entity) = index.get(&step.id) else {
            continue;
        };

        if step.depart {
            trace!("{:?} leaves the map", step.id);
            groups.remove_member(step.id);
            index.remove(&step.id);
            let _ = world.despawn(entity);
            report.departed.push(step.id);
            continue;
        }

        let player = world.get::<&Unit>(entity).map(|u| u.player).unwrap_or(0);
        if let Ok(mut loc) = world.get::<&mut Location>(entity) {
            loc.pos = step.pos;
            loc.carry = step.carry;
        }
        if let Some(order) = step.order {
            if let Ok(mut current) = world.get::<&mut UnitOrder>(entity) {
                *current = order;
            }
        }
        if step.heal {
            if let Ok(mut health) = world.get::<&mut Health>(entity) {
                *health = Health::full();
            }
        }
        if step.rearm {
            if let Ok(mut ammo) = world.get::<&mut Ammo>(entity) {
                *ammo = Ammo::full();
            }
        }

        if let Some((kind, at)) = step.build {
            let id = ids.alloc();
            debug!("player {} finishes {:?} at {:?}", player, kind, at);
            // A derrick consumes the oil patch under it.
            if kind == StructureKind::OilDerrick {
                let patch = world
                    .query::<(&Feature, &Location)>()
                    .iter()
                    .find(|(_, (f, l))| f.kind == FeatureKind::OilResource && l.pos == at)
                    .map(|(_, (f, _))| f.id);
                if let Some(patch) = patch {
                    if let Some(e) = index.remove(&patch) {
                        let _ = world.despawn(e);
                    }
                }
            }
            let built = world.spawn((
                Structure::new(id, player, kind),
                Location::new(at),
                Health::full(),
            ));
            index.insert(id, built);
            report.built.push((id, kind, at));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use warbound_logic::templates::{Propulsion, Turret, UnitTemplate};

    fn spawn_unit(
        world: &mut World,
        index: &mut ObjectIndex,
        id: u32,
        pos: Pos,
        propulsion: Propulsion,
        order: UnitOrder,
    ) -> ObjectId {
        let oid = ObjectId(id);
        let template = UnitTemplate::new("Test", "Viper", propulsion, Turret::Cannon);
        let entity = world.spawn((
            Unit::from_template(oid, 2, &template),
            Location::new(pos),
            Health::full(),
            Ammo::full(),
            order,
        ));
        index.insert(oid, entity);
        oid
    }

    #[test]
    fn test_move_and_arrive() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut ids = IdAllocator::starting_at(100);
        let mut groups = GroupRegistry::new();

        // Tracks: 1 tile/s. Ten seconds covers the 8-tile diagonal.
        let u = spawn_unit(
            &mut world,
            &mut index,
            1,
            Pos::new(0, 0),
            Propulsion::Tracks,
            UnitOrder::Move { to: Pos::new(8, 8) },
        );

        execution_system(&mut world, &mut index, &mut ids, &mut groups, 4_000);
        let mid = world.get::<&Location>(index[&u]).unwrap().pos;
        assert_eq!(mid, Pos::new(4, 4));
        assert!(!world.get::<&UnitOrder>(index[&u]).unwrap().is_idle());

        execution_system(&mut world, &mut index, &mut ids, &mut groups, 6_000);
        assert!(world.get::<&UnitOrder>(index[&u]).unwrap().is_idle());
    }

    #[test]
    fn test_slow_unit_accumulates_carry() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut ids = IdAllocator::starting_at(100);
        let mut groups = GroupRegistry::new();

        let u = spawn_unit(
            &mut world,
            &mut index,
            1,
            Pos::new(0, 0),
            Propulsion::Tracks,
            UnitOrder::Move { to: Pos::new(8, 0) },
        );

        // 600ms at 1 tile/s is under a tile; two of them must still move
        // the unit one tile.
        execution_system(&mut world, &mut index, &mut ids, &mut groups, 600);
        assert_eq!(world.get::<&Location>(index[&u]).unwrap().pos, Pos::new(0, 0));
        execution_system(&mut world, &mut index, &mut ids, &mut groups, 600);
        assert_eq!(world.get::<&Location>(index[&u]).unwrap().pos, Pos::new(1, 0));
    }

    #[test]
    fn test_build_raises_structure_and_consumes_oil() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut ids = IdAllocator::starting_at(100);
        let mut groups = GroupRegistry::new();

        let site = Pos::new(2, 2);
        let patch = ObjectId(50);
        let patch_entity = world.spawn((
            Feature::new(patch, FeatureKind::OilResource),
            Location::new(site),
        ));
        index.insert(patch, patch_entity);

        let truck = spawn_unit(
            &mut world,
            &mut index,
            1,
            site,
            Propulsion::Wheels,
            UnitOrder::Build {
                structure: StructureKind::OilDerrick,
                to: site,
                progress_ms: 0,
            },
        );

        let report = execution_system(
            &mut world,
            &mut index,
            &mut ids,
            &mut groups,
            intervals::STRUCTURE_BUILD_MS,
        );

        assert_eq!(report.built.len(), 1);
        assert_eq!(report.built[0].1, StructureKind::OilDerrick);
        assert!(!index.contains_key(&patch));
        assert!(world.get::<&UnitOrder>(index[&truck]).unwrap().is_idle());
        let derricks = world
            .query::<&Structure>()
            .iter()
            .filter(|(_, s)| s.kind == StructureKind::OilDerrick)
            .count();
        assert_eq!(derricks, 1);
    }

    #[test]
    fn test_leave_despawns_at_exit() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut ids = IdAllocator::starting_at(100);
        let mut groups = GroupRegistry::new();

        let u = spawn_unit(
            &mut world,
            &mut index,
            1,
            Pos::new(0, 0),
            Propulsion::Lift,
            UnitOrder::Leave { to: Pos::new(8, 0) },
        );
        let group = groups.new_group();
        groups.add_member(group, u);

        // Lift: 4 tiles/s; two seconds covers 8 tiles.
        let report = execution_system(&mut world, &mut index, &mut ids, &mut groups, 2_000);

        assert_eq!(report.departed, vec![u]);
        assert!(!index.contains_key(&u));
        assert!(groups.members(group).is_empty());
        assert_eq!(world.len(), 0);
    }

    #[test]
    fn test_retreat_heals_at_facility() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut ids = IdAllocator::starting_at(100);
        let mut groups = GroupRegistry::new();

        let depot = ObjectId(60);
        let depot_entity = world.spawn((
            Structure::new(depot, 2, StructureKind::RepairFacility),
            Location::new(Pos::new(1, 0)),
        ));
        index.insert(depot, depot_entity);

        let u = spawn_unit(
            &mut world,
            &mut index,
            1,
            Pos::new(0, 0),
            Propulsion::Tracks,
            UnitOrder::RetreatToRepair,
        );
        world.get::<&mut Health>(index[&u]).unwrap().percent = 20;

        execution_system(&mut world, &mut index, &mut ids, &mut groups, 1_000);

        assert_eq!(world.get::<&Health>(index[&u]).unwrap().percent, 100);
        assert!(world.get::<&UnitOrder>(index[&u]).unwrap().is_idle());
    }

    #[test]
    fn test_dead_target_clears_attack() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut ids = IdAllocator::starting_at(100);
        let mut groups = GroupRegistry::new();

        let u = spawn_unit(
            &mut world,
            &mut index,
            1,
            Pos::new(0, 0),
            Propulsion::Tracks,
            UnitOrder::Attack {
                target: ObjectId(999),
            },
        );

        execution_system(&mut world, &mut index, &mut ids, &mut groups, 100);
        assert!(world.get::<&UnitOrder>(index[&u]).unwrap().is_idle());
    }
}
