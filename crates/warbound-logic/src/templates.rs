//! Unit templates — body, propulsion and turret combinations that
//! factories, transports and the VTOL controller build units from.

use serde::{Deserialize, Serialize};

/// How a unit moves. Determines reachability and whether a unit counts as
/// an air unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Propulsion {
    Wheels,
    HalfTracks,
    Tracks,
    Hover,
    /// VTOL lift propulsion. Ignores terrain, binds the unit to the
    /// rearm/recall rules.
    Lift,
}

impl Propulsion {
    pub fn is_vtol(&self) -> bool {
        matches!(self, Propulsion::Lift)
    }

    /// Movement rate in tiles per second of sim time.
    pub fn speed(&self) -> f32 {
        match self {
            Propulsion::Wheels => 2.0,
            Propulsion::HalfTracks => 1.5,
            Propulsion::Tracks => 1.0,
            Propulsion::Hover => 3.0,
            Propulsion::Lift => 4.0,
        }
    }
}

/// The single turret a template mounts. Multi-turret designs are not
/// supported by the campaign layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Turret {
    MachineGun,
    Cannon,
    Rocket,
    /// Anti-air gun.
    Flak,
    /// Indirect fire; such units scout rather than charge.
    Mortar,
    Howitzer,
    /// No weapon; observes targets for indirect fire.
    Sensor,
    /// Construction tool. Marks the unit as a truck.
    Spade,
    /// Commander turret.
    Command,
}

impl Turret {
    /// Indirect-fire turrets hang back and scout instead of charging.
    pub fn is_artillery(&self) -> bool {
        matches!(self, Turret::Mortar | Turret::Howitzer)
    }

    pub fn is_sensor(&self) -> bool {
        matches!(self, Turret::Sensor)
    }

    /// Construction-capable: can take build orders.
    pub fn is_builder(&self) -> bool {
        matches!(self, Turret::Spade)
    }

    pub fn is_commander(&self) -> bool {
        matches!(self, Turret::Command)
    }

    /// Whether this turret can shoot at air units.
    pub fn hits_air(&self) -> bool {
        matches!(self, Turret::MachineGun | Turret::Flak | Turret::Rocket)
    }
}

/// A buildable unit design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    pub name: String,
    pub body: String,
    pub propulsion: Propulsion,
    pub turret: Turret,
}

impl UnitTemplate {
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        propulsion: Propulsion,
        turret: Turret,
    ) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            propulsion,
            turret,
        }
    }

    /// The plain construction truck used for best-effort truck
    /// reconstruction. Turret loadout of the lost truck is dropped.
    pub fn rebuilt_truck(body: impl Into<String>) -> Self {
        Self::new("Rebuilt Truck", body, Propulsion::Wheels, Turret::Spade)
    }

    pub fn is_vtol(&self) -> bool {
        self.propulsion.is_vtol()
    }
}

/// One entry of a VTOL spawn rotation: a template plus an optional cap on
/// how many of it may be alive at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtolRotationEntry {
    pub template: UnitTemplate,
    /// Maximum concurrently alive units of this template. `None` is
    /// uncapped.
    pub cap: Option<u32>,
}

impl VtolRotationEntry {
    pub fn new(template: UnitTemplate) -> Self {
        Self {
            template,
            cap: None,
        }
    }

    pub fn with_cap(mut self, cap: u32) -> Self {
        self.cap = Some(cap);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turret_classes() {
        assert!(Turret::Mortar.is_artillery());
        assert!(!Turret::Cannon.is_artillery());
        assert!(Turret::Spade.is_builder());
        assert!(Turret::Flak.hits_air());
        assert!(!Turret::Howitzer.hits_air());
    }

    #[test]
    fn test_vtol_template() {
        let bomber = UnitTemplate::new("Bomber", "Retaliation", Propulsion::Lift, Turret::Rocket);
        assert!(bomber.is_vtol());
        let tank = UnitTemplate::new("Tank", "Python", Propulsion::Tracks, Turret::Cannon);
        assert!(!tank.is_vtol());
    }

    #[test]
    fn test_rebuilt_truck_drops_loadout() {
        let truck = UnitTemplate::rebuilt_truck("Viper");
        assert_eq!(truck.turret, Turret::Spade);
        assert!(!truck.is_vtol());
    }
}
