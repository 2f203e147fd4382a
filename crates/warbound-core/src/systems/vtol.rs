//! VTOL raid controller — periodic hit-and-run waves.
//!
//! Each raiding player spawns waves of VTOLs off-map on a timer, cycling
//! through a template rotation with optional per-template caps on alive
//! units. Spent or damaged VTOLs with nowhere to rearm are recalled to an
//! exit point and leave the map. Destroying the raid's stop object ends
//! wave spawning, but recall keeps running so the last wave still flies
//! home.

use std::collections::{BTreeMap, HashMap};

use hecs::World;
use log::{debug, trace};

use rand::rngs::SmallRng;
use rand::Rng;

use warbound_logic::constants::{intervals, thresholds, VTOL_WAVE_MAX, VTOL_WAVE_MIN};
use warbound_logic::geometry::Pos;
use warbound_logic::orders::{AttackOrder, GroupOrder};
use warbound_logic::templates::VtolRotationEntry;

use crate::components::{
    Ammo, Health, IdAllocator, Label, Location, ObjectIndex, StructureKind, TransportCraft, Unit,
    UnitOrder,
};
use crate::scheduler::{Scheduler, Task};
use crate::systems::tactics::GroupRegistry;
use crate::systems::{issue_order, player_has_structure};

/// Configuration for one player's VTOL raids.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VtolRaid {
    /// Templates cycled through when assembling a wave.
    pub rotation: Vec<VtolRotationEntry>,
    /// Off-map spawn position for new waves.
    pub entry: Pos,
    /// Where recalled VTOLs fly off the map.
    pub exit: Pos,
    /// Waypoints handed to each wave's attack order.
    pub targets: Vec<Pos>,
    /// Fixed wave size; `None` rolls 5 or 6 per wave.
    pub wave_limit: Option<usize>,
    /// Label of the object whose destruction ends wave spawning.
    pub stop_label: Option<String>,
    active: bool,
    next_in_rotation: usize,
}

impl VtolRaid {
    pub fn new(rotation: Vec<VtolRotationEntry>, entry: Pos, exit: Pos) -> Self {
        Self {
            rotation,
            entry,
            exit,
            targets: Vec::new(),
            wave_limit: None,
            stop_label: None,
            active: true,
            next_in_rotation: 0,
        }
    }

    pub fn with_targets(mut self, targets: Vec<Pos>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_wave_limit(mut self, limit: usize) -> Self {
        self.wave_limit = Some(limit);
        self
    }

    pub fn with_stop_label(mut self, label: impl Into<String>) -> Self {
        self.stop_label = Some(label.into());
        self
    }
}

/// Per-player raid configurations.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct VtolController {
    raids: BTreeMap<u8, VtolRaid>,
}

impl VtolController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raid(&self, player: u8) -> Option<&VtolRaid> {
        self.raids.get(&player)
    }

    pub fn is_active(&self, player: u8) -> bool {
        self.raids.get(&player).map(|r| r.active).unwrap_or(false)
    }

    pub fn raiding_players(&self) -> Vec<u8> {
        self.raids.keys().copied().collect()
    }
}

/// Install a raid and arm its timers: the wave spawner, and the stop
/// check when a stop object is configured.
pub fn setup_vtol_raid(
    controller: &mut VtolController,
    scheduler: &mut Scheduler,
    player: u8,
    raid: VtolRaid,
    spawn_every_ms: Option<u64>,
    now_ms: u64,
) {
    let has_stop = raid.stop_label.is_some();
    controller.raids.insert(player, raid);
    scheduler.set_timer(
        Task::SpawnVtolWave { player },
        spawn_every_ms.unwrap_or(intervals::VTOL_SPAWN_MS),
        now_ms,
    );
    if has_stop {
        scheduler.set_timer(
            Task::VtolStopCheck { player },
            intervals::VTOL_STOP_POLL_MS,
            now_ms,
        );
    }
}

/// Alive units per template name for a player, for rotation caps.
fn alive_by_template(world: &World, player: u8) -> HashMap<String, u32> {
    let mut alive = HashMap::new();
    for (_, unit) in world.query::<&Unit>().iter() {
        if unit.player == player && unit.is_vtol() {
            *alive.entry(unit.template.clone()).or_insert(0) += 1;
        }
    }
    alive
}

/// Spawn one raid wave: cycle the rotation, respect caps, group the wave
/// and send it hunting under a permanent attack order.
pub fn spawn_vtol_wave(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    groups: &mut GroupRegistry,
    scheduler: &mut Scheduler,
    controller: &mut VtolController,
    rng: &mut SmallRng,
    player: u8,
    now_ms: u64,
) {
    let mut alive = alive_by_template(world, player);
    let Some(raid) = controller.raids.get_mut(&player) else {
        return;
    };
    if !raid.active || raid.rotation.is_empty() {
        return;
    }
    let wave_size = raid
        .wave_limit
        .unwrap_or_else(|| rng.gen_range(VTOL_WAVE_MIN..=VTOL_WAVE_MAX));

    let mut picked = Vec::with_capacity(wave_size);
    for _ in 0..wave_size {
        let mut advanced = 0;
        // Skip capped-out entries; a full lap means nothing can spawn.
        let template = loop {
            if advanced == raid.rotation.len() {
                break None;
            }
            let entry = &raid.rotation[raid.next_in_rotation];
            raid.next_in_rotation = (raid.next_in_rotation + 1) % raid.rotation.len();
            advanced += 1;
            let count = alive.entry(entry.template.name.clone()).or_insert(0);
            match entry.cap {
                Some(cap) if *count >= cap => continue,
                _ => {
                    *count += 1;
                    break Some(entry.template.clone());
                }
            }
        };
        match template {
            Some(t) => picked.push(t),
            None => break,
        }
    }
    if picked.is_empty() {
        trace!("player {} VTOL rotation fully capped", player);
        return;
    }
    debug!("player {} spawns a VTOL wave of {}", player, picked.len());

    let entry_pos = raid.entry;
    let targets = raid.targets.clone();
    let group = groups.new_group();
    for (i, template) in picked.iter().enumerate() {
        let id = ids.alloc();
        let pos = Pos::new(entry_pos.x + i as i32, entry_pos.y);
        let entity = world.spawn((
            Unit::from_template(id, player, template),
            Location::new(pos),
            Health::full(),
            Ammo::full(),
            UnitOrder::Idle,
        ));
        index.insert(id, entity);
        groups.add_member(group, id);
    }
    groups.manage(
        group,
        GroupOrder::Attack(AttackOrder::new().with_waypoints(targets).permanent()),
        picked.len(),
    );
    scheduler.queue_task(Task::TacticsForGroup(group), 0, now_ms);
}

/// Recall scan: spent or shot-up VTOLs with no rearm pad to land on are
/// sent to the exit point and leave the map. Runs regardless of whether
/// wave spawning is still active.
pub fn vtol_recall_system(world: &mut World, index: &ObjectIndex, controller: &VtolController) {
    for player in controller.raiding_players() {
        let Some(raid) = controller.raids.get(&player) else {
            continue;
        };
        if player_has_structure(world, player, StructureKind::RearmPad) {
            // Tactics will route them to the pads instead.
            continue;
        }
        let mut recalls = Vec::new();
        for (entity, (unit, order)) in world.query::<(&Unit, &UnitOrder)>().iter() {
            if unit.player != player || !unit.is_vtol() {
                continue;
            }
            if world.get::<&TransportCraft>(entity).is_ok() {
                continue;
            }
            if matches!(order, UnitOrder::Leave { .. }) {
                continue;
            }
            let ammo = world.get::<&Ammo>(entity).map(|a| a.percent).unwrap_or(100);
            let health = world
                .get::<&Health>(entity)
                .map(|h| h.percent)
                .unwrap_or(100);
            if ammo == 0
                || health < thresholds::VTOL_RECALL_HEALTH
                || *order == UnitOrder::ReturnToBase
            {
                recalls.push(unit.id);
            }
        }
        for id in recalls {
            issue_order(world, index, id, UnitOrder::Leave { to: raid.exit });
        }
    }
}

/// Stop-object poll: once the labelled object is gone, wave spawning ends
/// and both raid timers are dismantled.
pub fn vtol_stop_check(
    world: &World,
    controller: &mut VtolController,
    scheduler: &mut Scheduler,
    player: u8,
) {
    let Some(raid) = controller.raids.get_mut(&player) else {
        return;
    };
    let Some(stop_label) = raid.stop_label.clone() else {
        return;
    };
    let still_there = world
        .query::<&Label>()
        .iter()
        .any(|(_, label)| label.0 == stop_label);
    if still_there {
        return;
    }
    debug!("player {} VTOL raids stop: {} is gone", player, stop_label);
    raid.active = false;
    scheduler.remove_timer(&Task::SpawnVtolWave { player });
    scheduler.remove_timer(&Task::VtolStopCheck { player });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use warbound_logic::templates::{Propulsion, Turret, UnitTemplate};

    fn bomber() -> UnitTemplate {
        UnitTemplate::new("Bomber", "Retaliation", Propulsion::Lift, Turret::Rocket)
    }

    fn fighter() -> UnitTemplate {
        UnitTemplate::new("Fighter", "Retribution", Propulsion::Lift, Turret::MachineGun)
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(11)
    }

    struct Rig {
        world: World,
        index: ObjectIndex,
        ids: IdAllocator,
        groups: GroupRegistry,
        scheduler: Scheduler,
        controller: VtolController,
    }

    fn rig() -> Rig {
        Rig {
            world: World::new(),
            index: ObjectIndex::new(),
            ids: IdAllocator::new(),
            groups: GroupRegistry::new(),
            scheduler: Scheduler::new(),
            controller: VtolController::new(),
        }
    }

    fn spawn_wave(rig: &mut Rig, player: u8) {
        let mut rng = rng();
        spawn_vtol_wave(
            &mut rig.world,
            &mut rig.index,
            &mut rig.ids,
            &mut rig.groups,
            &mut rig.scheduler,
            &mut rig.controller,
            &mut rng,
            player,
            0,
        );
    }

    #[test]
    fn test_wave_spawns_and_hunts() {
        let mut rig = rig();
        let raid = VtolRaid::new(vec![VtolRotationEntry::new(bomber())], Pos::new(0, 0), Pos::new(63, 0))
            .with_wave_limit(4);
        setup_vtol_raid(&mut rig.controller, &mut rig.scheduler, 2, raid, None, 0);

        spawn_wave(&mut rig, 2);

        assert_eq!(rig.world.len(), 4);
        let group = rig.groups.managed_groups()[0];
        assert_eq!(rig.groups.members(group).len(), 4);
        // Permanent hunt: the wave keeps re-engaging until it dies.
        assert_eq!(
            rig.groups.state(group).unwrap().order.count_override(),
            Some(-1)
        );
    }

    #[test]
    fn test_rotation_respects_caps() {
        let mut rig = rig();
        let raid = VtolRaid::new(
            vec![
                VtolRotationEntry::new(bomber()).with_cap(1),
                VtolRotationEntry::new(fighter()),
            ],
            Pos::new(0, 0),
            Pos::new(63, 0),
        )
        .with_wave_limit(4);
        setup_vtol_raid(&mut rig.controller, &mut rig.scheduler, 2, raid, None, 0);

        spawn_wave(&mut rig, 2);

        let mut bombers = 0;
        let mut fighters = 0;
        for (_, unit) in rig.world.query::<&Unit>().iter() {
            match unit.template.as_str() {
                "Bomber" => bombers += 1,
                "Fighter" => fighters += 1,
                _ => {}
            }
        }
        assert_eq!(bombers, 1);
        assert_eq!(fighters, 3);
    }

    #[test]
    fn test_spent_vtols_recalled() {
        let mut rig = rig();
        let exit = Pos::new(63, 0);
        let raid = VtolRaid::new(vec![VtolRotationEntry::new(bomber())], Pos::new(0, 0), exit)
            .with_wave_limit(2);
        setup_vtol_raid(&mut rig.controller, &mut rig.scheduler, 2, raid, None, 0);
        spawn_wave(&mut rig, 2);

        // First VTOL runs dry, second stays armed.
        let group = rig.groups.managed_groups()[0];
        let spent = rig.groups.members(group)[0];
        let fresh = rig.groups.members(group)[1];
        rig.world
            .get::<&mut Ammo>(rig.index[&spent])
            .unwrap()
            .percent = 0;

        vtol_recall_system(&mut rig.world, &rig.index, &rig.controller);

        assert_eq!(
            *rig.world.get::<&UnitOrder>(rig.index[&spent]).unwrap(),
            UnitOrder::Leave { to: exit }
        );
        assert_ne!(
            *rig.world.get::<&UnitOrder>(rig.index[&fresh]).unwrap(),
            UnitOrder::Leave { to: exit }
        );
    }

    #[test]
    fn test_stop_object_ends_spawning_not_recall() {
        let mut rig = rig();
        let exit = Pos::new(63, 0);
        let stop = rig.world.spawn((Label("vtol-hq".to_string()),));
        let raid = VtolRaid::new(vec![VtolRotationEntry::new(bomber())], Pos::new(0, 0), exit)
            .with_wave_limit(1)
            .with_stop_label("vtol-hq");
        setup_vtol_raid(&mut rig.controller, &mut rig.scheduler, 2, raid, None, 0);
        spawn_wave(&mut rig, 2);

        // Stop object alive: check is a no-op.
        vtol_stop_check(&rig.world, &mut rig.controller, &mut rig.scheduler, 2);
        assert!(rig.controller.is_active(2));

        rig.world.despawn(stop).unwrap();
        vtol_stop_check(&rig.world, &mut rig.controller, &mut rig.scheduler, 2);
        assert!(!rig.controller.is_active(2));

        // No further waves...
        let before = rig.world.len();
        spawn_wave(&mut rig, 2);
        assert_eq!(rig.world.len(), before);

        // ...but the survivors still get flown home.
        let group = rig.groups.managed_groups()[0];
        let survivor = rig.groups.members(group)[0];
        rig.world
            .get::<&mut Ammo>(rig.index[&survivor])
            .unwrap()
            .percent = 0;
        vtol_recall_system(&mut rig.world, &rig.index, &rig.controller);
        assert_eq!(
            *rig.world.get::<&UnitOrder>(rig.index[&survivor]).unwrap(),
            UnitOrder::Leave { to: exit }
        );
    }
}
