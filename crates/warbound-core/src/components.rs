//! World components — the simulation objects the campaign layer manages.
//!
//! Components are plain serde structs. Every world object carries an
//! [`ObjectId`] so registries can reference it across save/load; the
//! session maintains an id-to-entity index for resolution.

use std::collections::HashMap;

use hecs::Entity;
use serde::{Deserialize, Serialize};

use warbound_logic::geometry::Pos;
use warbound_logic::ids::ObjectId;
use warbound_logic::templates::{Propulsion, Turret, UnitTemplate};

/// Runtime index from stable id to live entity. Not serialized; rebuilt
/// after load.
pub type ObjectIndex = HashMap<ObjectId, Entity>;

/// Monotonic [`ObjectId`] source. Ids are never reused, even across
/// save/load, so stale references can only miss, never alias.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u32) -> Self {
        Self { next }
    }

    pub fn alloc(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next += 1;
        id
    }

    pub fn next_raw(&self) -> u32 {
        self.next
    }
}

/// A mobile unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: ObjectId,
    pub player: u8,
    /// Template name this unit was built from.
    pub template: String,
    /// Body name, kept so replacements can match the original chassis.
    pub body: String,
    pub propulsion: Propulsion,
    pub turret: Turret,
    /// Combat experience; transports grant some to delivered units.
    pub experience: f32,
}

impl Unit {
    pub fn from_template(id: ObjectId, player: u8, template: &UnitTemplate) -> Self {
        Self {
            id,
            player,
            template: template.name.clone(),
            body: template.body.clone(),
            propulsion: template.propulsion,
            turret: template.turret,
            experience: 0.0,
        }
    }

    pub fn is_vtol(&self) -> bool {
        self.propulsion.is_vtol()
    }

    pub fn is_builder(&self) -> bool {
        self.turret.is_builder()
    }

    /// Indirect-fire and sensor units hang back rather than charge.
    pub fn is_artillery_like(&self) -> bool {
        self.turret.is_artillery() || self.turret.is_sensor()
    }
}

/// What a placed structure is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureKind {
    Headquarters,
    Factory,
    RepairFacility,
    RearmPad,
    OilDerrick,
    PowerGenerator,
    Defense,
    ResearchLab,
}

/// A fixed structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub id: ObjectId,
    pub player: u8,
    pub kind: StructureKind,
}

impl Structure {
    pub fn new(id: ObjectId, player: u8, kind: StructureKind) -> Self {
        Self { id, player, kind }
    }
}

/// Neutral map objects: oil patches, artifact crates, base scenery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    OilResource,
    Crate,
    /// Abandoned building scenery; counts as base leftovers for cleanup.
    Building,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: ObjectId,
    pub kind: FeatureKind,
}

impl Feature {
    pub fn new(id: ObjectId, kind: FeatureKind) -> Self {
        Self { id, kind }
    }
}

/// Map location. `carry` holds fractional movement budget left over from
/// the last execution step so slow units still make progress under small
/// frame deltas.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub pos: Pos,
    pub carry: f32,
}

impl Location {
    pub fn new(pos: Pos) -> Self {
        Self { pos, carry: 0.0 }
    }
}

/// Hit points as a percentage of the object's maximum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub percent: u32,
}

impl Health {
    pub fn full() -> Self {
        Self { percent: 100 }
    }

    pub fn damage(&mut self, amount: u32) {
        self.percent = self.percent.saturating_sub(amount);
    }
}

/// Remaining ammunition as a percentage. Only meaningful for VTOLs, which
/// must rearm between sorties.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ammo {
    pub percent: u32,
}

impl Ammo {
    pub fn full() -> Self {
        Self { percent: 100 }
    }
}

/// Scenario label attached to an object, used for artifact binding and
/// base bookkeeping. Labels are stable strings, safe across save/load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label(pub String);

/// Marks the per-player persistent transport craft. Transports are never
/// valid targets and are reused across reinforcement waves.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransportCraft;

/// The low-level directive a unit is currently executing. Written by the
/// dispatch systems, advanced by the execution system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UnitOrder {
    Idle,
    /// Hold position; do not chase targets.
    Hold,
    Move {
        to: Pos,
    },
    /// Move while engaging targets of opportunity along the way.
    Scout {
        to: Pos,
    },
    Attack {
        target: ObjectId,
    },
    /// Sensor variant of attack: watch the target for indirect fire.
    Observe {
        target: ObjectId,
    },
    /// Stay with a commander unit.
    Support {
        commander: ObjectId,
    },
    /// Withdraw to the nearest repair facility, heal up, then go idle.
    RetreatToRepair,
    /// VTOL: land on a rearm pad and refill.
    Rearm,
    ReturnToBase,
    Build {
        structure: StructureKind,
        to: Pos,
        progress_ms: u64,
    },
    /// Fly to an exit point and leave the map (despawn on arrival).
    Leave {
        to: Pos,
    },
}

impl UnitOrder {
    pub fn is_idle(&self) -> bool {
        matches!(self, UnitOrder::Idle)
    }

    /// Orders that must not be interrupted by the tactics dispatcher.
    pub fn is_repairing(&self) -> bool {
        matches!(self, UnitOrder::RetreatToRepair | UnitOrder::Rearm)
    }

    pub fn is_build(&self) -> bool {
        matches!(self, UnitOrder::Build { .. })
    }

    /// The build site, when this is a build order.
    pub fn build_site(&self) -> Option<Pos> {
        match self {
            UnitOrder::Build { to, .. } => Some(*to),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_from_template() {
        let template = UnitTemplate::new("Scout", "Viper", Propulsion::Wheels, Turret::MachineGun);
        let unit = Unit::from_template(ObjectId(1), 3, &template);
        assert_eq!(unit.player, 3);
        assert_eq!(unit.template, "Scout");
        assert_eq!(unit.body, "Viper");
        assert!(!unit.is_vtol());
        assert!(!unit.is_artillery_like());
    }

    #[test]
    fn test_health_damage_saturates() {
        let mut health = Health::full();
        health.damage(30);
        assert_eq!(health.percent, 70);
        health.damage(200);
        assert_eq!(health.percent, 0);
    }

    #[test]
    fn test_order_predicates() {
        assert!(UnitOrder::Idle.is_idle());
        assert!(UnitOrder::Rearm.is_repairing());
        let build = UnitOrder::Build {
            structure: StructureKind::OilDerrick,
            to: Pos::new(4, 4),
            progress_ms: 0,
        };
        assert!(build.is_build());
        assert_eq!(build.build_site(), Some(Pos::new(4, 4)));
        assert_eq!(UnitOrder::Idle.build_site(), None);
    }
}
