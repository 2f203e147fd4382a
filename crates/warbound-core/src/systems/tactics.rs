//! Group tactics dispatcher — translates declarative group orders into
//! ongoing per-tick unit directives.
//!
//! A managed group is re-examined every tactics tick: wounded units are
//! peeled off for repairs, scattered groups are pulled back together, a
//! target is chosen for the group as a whole, and each remaining unit gets
//! a concrete move/attack directive. Orders are permanent until reissued;
//! re-managing a group replaces its descriptor wholesale.

use std::collections::BTreeMap;

use hecs::World;
use log::{debug, trace};
use rand::rngs::SmallRng;
use rand::Rng;

use warbound_logic::constants::{intervals, radii};
use warbound_logic::geometry::{centroid, find_clusters, Pos};
use warbound_logic::ids::{GroupId, ObjectId};
use warbound_logic::orders::GroupOrder;
use warbound_logic::templates::{Propulsion, Turret};
use warbound_logic::terrain::Terrain;

use crate::components::{Ammo, Health, Location, ObjectIndex, StructureKind, Unit, UnitOrder};
use crate::systems::{collect_player_objects, issue_order, player_has_structure, PlayerObject};

/// Per-group management state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GroupState {
    pub order: GroupOrder,
    /// Last chosen target, sanitized to a bare position so nothing breaks
    /// when the underlying object dies.
    pub target: Option<Pos>,
    /// Group size morale and regroup are measured against. `-1` marks a
    /// permanent order.
    pub count: i32,
    /// The order this group held before morale broke, restored when the
    /// group recovers.
    pub prev_order: Option<GroupOrder>,
    /// Sim time of the last hit on a group member.
    pub last_hit_ms: u64,
    /// Keep the registry entry alive even when the group empties out.
    pub removable: bool,
    patrol_spot: usize,
    patrol_moved_at: Option<u64>,
}

impl GroupState {
    fn new(order: GroupOrder, count: i32) -> Self {
        Self {
            order,
            target: None,
            count,
            prev_order: None,
            last_hit_ms: 0,
            removable: true,
            patrol_spot: 0,
            patrol_moved_at: None,
        }
    }
}

/// Group membership and management registry. Ids come from a counter so
/// they never collide with anything the host engine allocates.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GroupRegistry {
    next_id: u32,
    members: BTreeMap<GroupId, Vec<ObjectId>>,
    managed: BTreeMap<GroupId, GroupState>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_group(&mut self) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;
        self.members.insert(id, Vec::new());
        id
    }

    /// Add a unit; a unit belongs to at most one group, so this removes it
    /// from any previous group first.
    pub fn add_member(&mut self, group: GroupId, unit: ObjectId) {
        for members in self.members.values_mut() {
            members.retain(|&m| m != unit);
        }
        if let Some(members) = self.members.get_mut(&group) {
            if !members.contains(&unit) {
                members.push(unit);
            }
        }
    }

    /// Drop a unit from whatever group holds it. Returns that group and
    /// its remaining size, for group-loss bookkeeping.
    pub fn remove_member(&mut self, unit: ObjectId) -> Option<(GroupId, usize)> {
        for (&group, members) in self.members.iter_mut() {
            let before = members.len();
            members.retain(|&m| m != unit);
            if members.len() != before {
                return Some((group, members.len()));
            }
        }
        None
    }

    pub fn members(&self, group: GroupId) -> &[ObjectId] {
        self.members.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn group_of(&self, unit: ObjectId) -> Option<GroupId> {
        self.members
            .iter()
            .find(|(_, members)| members.contains(&unit))
            .map(|(&group, _)| group)
    }

    /// Attach (or replace) a management order. Last write wins; there is
    /// no merging of descriptors. The removable flag survives re-manages.
    pub fn manage(&mut self, group: GroupId, order: GroupOrder, live_size: usize) {
        let mut removable = true;
        if let Some(state) = self.managed.get(&group) {
            if !state.order.same_kind(&order) {
                trace!(
                    "group {:?} receives a new order: {}",
                    group,
                    order.name()
                );
            }
            removable = state.removable;
        }
        let count = order.count_override().unwrap_or(live_size as i32);
        let mut state = GroupState::new(order, count);
        state.removable = removable;
        self.managed.insert(group, state);
    }

    /// Non-removable groups keep their registry entry and order while
    /// empty, resuming when reinforcements join later.
    pub fn set_removable(&mut self, group: GroupId, removable: bool) {
        if let Some(state) = self.managed.get_mut(&group) {
            state.removable = removable;
        }
    }

    pub fn stop_managing(&mut self, group: GroupId) {
        if self.managed.remove(&group).is_none() {
            trace!("not managing {:?} anyway", group);
            return;
        }
        trace!("cease managing {:?}", group);
    }

    pub fn is_managed(&self, group: GroupId) -> bool {
        self.managed.contains_key(&group)
    }

    pub fn state(&self, group: GroupId) -> Option<&GroupState> {
        self.managed.get(&group)
    }

    pub fn state_mut(&mut self, group: GroupId) -> Option<&mut GroupState> {
        self.managed.get_mut(&group)
    }

    pub fn managed_groups(&self) -> Vec<GroupId> {
        self.managed.keys().copied().collect()
    }

    /// Drop dead ids from a group's member list and return the survivors.
    fn live_members(&mut self, group: GroupId, index: &ObjectIndex) -> Vec<ObjectId> {
        if let Some(members) = self.members.get_mut(&group) {
            members.retain(|id| index.contains_key(id));
            members.clone()
        } else {
            Vec::new()
        }
    }
}

/// One managed unit's snapshot for the duration of a tick.
struct Member {
    id: ObjectId,
    pos: Pos,
    player: u8,
    propulsion: Propulsion,
    turret: Turret,
    health: u32,
    ammo: u32,
    order: UnitOrder,
}

fn collect_members(world: &World, index: &ObjectIndex, ids: &[ObjectId]) -> Vec<Member> {
    let mut members = Vec::with_capacity(ids.len());
    for &id in ids {
        let Some(&entity) = index.get(&id) else {
            continue;
        };
        let Ok(unit) = world.get::<&Unit>(entity) else {
            continue;
        };
        let Ok(loc) = world.get::<&Location>(entity) else {
            continue;
        };
        let health = world
            .get::<&Health>(entity)
            .map(|h| h.percent)
            .unwrap_or(100);
        let ammo = world.get::<&Ammo>(entity).map(|a| a.percent).unwrap_or(100);
        let order = world
            .get::<&UnitOrder>(entity)
            .map(|o| *o)
            .unwrap_or(UnitOrder::Idle);
        members.push(Member {
            id,
            pos: loc.pos,
            player: unit.player,
            propulsion: unit.propulsion,
            turret: unit.turret,
            health,
            ammo,
            order,
        });
    }
    members
}

/// Run one tactics pass over every managed group.
pub fn tactics_system(
    world: &mut World,
    index: &ObjectIndex,
    groups: &mut GroupRegistry,
    terrain: &Terrain,
    rng: &mut SmallRng,
    now_ms: u64,
) {
    for group in groups.managed_groups() {
        let live = groups.live_members(group, index);
        if live.is_empty() {
            let removable = groups
                .state(group)
                .map(|s| s.removable)
                .unwrap_or(true);
            if removable {
                groups.stop_managing(group);
            }
            continue;
        }
        tactics_tick_for_group(world, index, groups, terrain, rng, now_ms, group);
    }
}

/// Dispatch directives for a single group. Also queued as a one-shot task
/// right after `manage_group` so new orders apply without waiting for the
/// next poll.
pub fn tactics_tick_for_group(
    world: &mut World,
    index: &ObjectIndex,
    groups: &mut GroupRegistry,
    terrain: &Terrain,
    rng: &mut SmallRng,
    now_ms: u64,
    group: GroupId,
) {
    let live_ids = groups.live_members(group, index);
    if live_ids.is_empty() {
        return;
    }
    let Some(state) = groups.managed.get(&group) else {
        return;
    };
    let members = collect_members(world, index, &live_ids);
    if members.is_empty() {
        return;
    }
    let player = members[0].player;

    // A follow order has its own, much simpler tick.
    if let GroupOrder::Follow(follow) = state.order.clone() {
        if !index.contains_key(&follow.commander) {
            // The commander is dead; let the group execute his last will.
            trace!("{:?}: commander gone, executing last will", group);
            groups.manage(group, (*follow.order).clone(), members.len());
            tactics_tick_for_group(world, index, groups, terrain, rng, now_ms, group);
            return;
        }
        let mut directives = Vec::new();
        for member in &members {
            if member.turret.is_commander() {
                continue;
            }
            if member.order != (UnitOrder::Support { commander: follow.commander }) {
                directives.push((
                    member.id,
                    UnitOrder::Support { commander: follow.commander },
                ));
            }
        }
        for (id, order) in directives {
            issue_order(world, index, id, order);
        }
        return;
    }

    let mut directives: Vec<(ObjectId, UnitOrder)> = Vec::new();

    // Repair pass: wounded units leave for the repair facility, or the
    // configured repair position when there is none, and are excluded
    // from this tick's combat directives.
    let repair_threshold = state.order.repair_threshold();
    let repair_fallback = state.order.repair_fallback();
    let has_repair = player_has_structure(world, player, StructureKind::RepairFacility);
    let mut healthy: Vec<&Member> = Vec::with_capacity(members.len());
    for member in &members {
        if member.order == UnitOrder::RetreatToRepair {
            continue;
        }
        if let Some(threshold) = repair_threshold {
            if member.health < threshold {
                if has_repair {
                    directives.push((member.id, UnitOrder::RetreatToRepair));
                    continue;
                }
                if let Some(to) = repair_fallback {
                    if member.order != (UnitOrder::Move { to }) {
                        directives.push((member.id, UnitOrder::Move { to }));
                    }
                    continue;
                }
            }
        }
        healthy.push(member);
    }

    if healthy.is_empty() {
        for (id, order) in directives {
            issue_order(world, index, id, order);
        }
        return;
    }

    let positions: Vec<Pos> = healthy.iter().map(|m| m.pos).collect();
    let group_centroid = centroid(&positions).expect("healthy is non-empty");

    // Regroup pass: pull stragglers toward the biggest cluster, and hold
    // the advance until enough of the group has massed up.
    if state.order.regroup() {
        let clusters = find_clusters(&positions, radii::CLUSTER).expect("non-empty");
        let rally = clusters.biggest_centroid();
        for (i, member) in healthy.iter().enumerate() {
            if !clusters.members[clusters.biggest].contains(&i) {
                directives.push((member.id, UnitOrder::Move { to: rally }));
            }
        }
        let needed = if state.count < 0 {
            healthy.len() * 2 / 3
        } else {
            state.count as usize
        };
        if clusters.biggest_size() < needed {
            let hit_recently =
                now_ms.saturating_sub(state.last_hit_ms) < intervals::FALLBACK_AFTER_HIT_MS;
            let has_hq = player_has_structure(world, player, StructureKind::Headquarters);
            for &i in &clusters.members[clusters.biggest] {
                let member = healthy[i];
                if hit_recently && has_hq {
                    if member.order != UnitOrder::ReturnToBase {
                        directives.push((member.id, UnitOrder::ReturnToBase));
                    }
                } else if member.order != UnitOrder::Hold {
                    directives.push((member.id, UnitOrder::Hold));
                }
            }
            for (id, order) in directives {
                issue_order(world, index, id, order);
            }
            return;
        }
    }

    // Target choice for the group as a whole.
    let order = state.order.clone();
    let target = match &order {
        GroupOrder::Attack(_) | GroupOrder::Defend(_) | GroupOrder::Compromise(_) => {
            let picked = pick_target(world, groups, group, &order, group_centroid, terrain, healthy[0]);
            match picked {
                Some(pos) => Some(pos),
                None => {
                    for (id, o) in directives {
                        issue_order(world, index, id, o);
                    }
                    return;
                }
            }
        }
        GroupOrder::Patrol(patrol) => {
            if patrol.pos.is_empty() {
                debug!("{:?}: patrol order without waypoints", group);
                return;
            }
            let state = groups.managed.get_mut(&group).expect("state exists");
            match state.patrol_moved_at {
                None => {
                    state.patrol_spot = 0;
                    state.patrol_moved_at = Some(now_ms);
                }
                Some(last) if now_ms.saturating_sub(last) > patrol.interval_ms => {
                    // Pick a random waypoint other than the current one.
                    let choices: Vec<usize> =
                        (0..patrol.pos.len()).filter(|&i| i != state.patrol_spot).collect();
                    if !choices.is_empty() {
                        state.patrol_spot = choices[rng.gen_range(0..choices.len())];
                    }
                    state.patrol_moved_at = Some(now_ms);
                }
                _ => {}
            }
            Some(patrol.pos[state.patrol_spot.min(patrol.pos.len() - 1)])
        }
        GroupOrder::Follow(_) => unreachable!("handled above"),
    };

    let defending = matches!(order, GroupOrder::Defend(_));
    let enemies = collect_player_objects(world, warbound_logic::constants::HUMAN_PLAYER);

    for member in &healthy {
        // Rearm VTOLs before anything else; an empty-handed VTOL should
        // not be thrown back at the enemy.
        if member.propulsion.is_vtol() {
            let rearming = member.order == UnitOrder::Rearm;
            if member.ammo == 0 || (rearming && (member.ammo < 100 || member.health < 100)) {
                if !rearming && player_has_structure(world, player, StructureKind::RearmPad) {
                    directives.push((member.id, UnitOrder::Rearm));
                }
                continue;
            }
        }

        if let GroupOrder::Defend(defend) = &order {
            // Fall back to the defense position, ignoring fire.
            if member.pos.dist(defend.pos) > defend.radius as f32 {
                if let Some(target) = target {
                    directives.push((member.id, UnitOrder::Move { to: target }));
                }
                continue;
            }
        }

        let Some(target) = target else { continue };
        if member.pos.dist(target) < radii::CLOSE as f32 {
            continue;
        }

        // Opportunistic targets near this unit take precedence over the
        // group target.
        let scan = order.scan_range(member.turret.is_sensor());
        let close_by = enemies
            .iter()
            .filter(|e| !e.is_transport)
            .filter(|e| e.pos.within(member.pos, scan))
            .filter(|e| can_engage_air(member, e))
            .filter(|e| reachable(terrain, member, e.pos))
            .min_by(|a, b| {
                group_centroid
                    .dist(a.pos)
                    .partial_cmp(&group_centroid.dist(b.pos))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });

        let artillery_like = member.turret.is_artillery() || member.turret.is_sensor();
        let vtol_unit = member.propulsion.is_vtol();

        if let (false, Some(enemy)) = (defending, close_by) {
            if member.turret.is_sensor() {
                directives.push((member.id, UnitOrder::Observe { target: enemy.id }));
            } else {
                directives.push((member.id, UnitOrder::Attack { target: enemy.id }));
            }
        } else if defending || !(artillery_like || vtol_unit) {
            directives.push((member.id, UnitOrder::Move { to: target }));
        } else {
            directives.push((member.id, UnitOrder::Scout { to: target }));
        }
    }

    for (id, order) in directives {
        issue_order(world, index, id, order);
    }
}

/// Air units can only be engaged by other air units or anti-air turrets.
fn can_engage_air(member: &Member, enemy: &PlayerObject) -> bool {
    if !enemy.is_vtol {
        return true;
    }
    !member.propulsion.is_vtol() && member.turret.hits_air()
}

fn reachable(terrain: &Terrain, member: &Member, to: Pos) -> bool {
    member.propulsion.is_vtol() || terrain.can_reach(member.pos, to)
}

/// Choose a position for the group to act on. The fallback chain runs
/// remembered target, waypoint scans, then progressively wider sweeps of
/// everything the enemy owns.
fn pick_target(
    world: &World,
    groups: &mut GroupRegistry,
    group: GroupId,
    order: &GroupOrder,
    group_centroid: Pos,
    terrain: &Terrain,
    lead: &Member,
) -> Option<Pos> {
    let enemies = collect_player_objects(world, warbound_logic::constants::HUMAN_PLAYER);
    let remembered = groups.state(group).and_then(|s| s.target);

    let mut candidates: Vec<&PlayerObject> = Vec::new();

    match order {
        GroupOrder::Attack(attack) => {
            if let Some(tracked) = remembered {
                candidates = enemies
                    .iter()
                    .filter(|e| e.pos.within(tracked, radii::TARGET_TRACKING))
                    .filter(|e| e.is_structure || !e.is_vtol)
                    .collect();
            }
            if candidates.is_empty() {
                for wp in &attack.pos {
                    candidates = enemies
                        .iter()
                        .filter(|e| e.pos.within(*wp, attack.radius))
                        .collect();
                    if !candidates.is_empty() {
                        break;
                    }
                }
            }
        }
        GroupOrder::Compromise(compromise) => {
            for wp in &compromise.pos {
                candidates = enemies
                    .iter()
                    .filter(|e| e.pos.within(*wp, compromise.radius))
                    .collect();
                if !candidates.is_empty() {
                    break;
                }
            }
            if candidates.is_empty() {
                // Stay on the waypoint line instead of hunting.
                let Some(last) = compromise.pos.last() else {
                    debug!("{:?}: compromise order without waypoints", group);
                    return None;
                };
                let state = groups.state_mut(group)?;
                state.target = Some(*last);
                return Some(*last);
            }
        }
        GroupOrder::Defend(defend) => {
            if let Some(tracked) = remembered {
                if tracked.within(defend.pos, defend.radius) {
                    candidates = enemies
                        .iter()
                        .filter(|e| e.pos.within(tracked, radii::TARGET_TRACKING))
                        .collect();
                }
            }
            if candidates.is_empty() {
                candidates = enemies
                    .iter()
                    .filter(|e| e.pos.within(defend.pos, defend.radius))
                    .collect();
            }
            if candidates.is_empty() {
                // Nothing to fight; the hold position itself is the target.
                let state = groups.state_mut(group)?;
                state.target = Some(defend.pos);
                return Some(defend.pos);
            }
        }
        _ => {
            debug!("{:?}: order {} does not pick targets", group, order.name());
            return None;
        }
    }

    let mut candidates: Vec<&PlayerObject> = candidates
        .into_iter()
        .filter(|e| reachable(terrain, lead, e.pos))
        .collect();

    // Widening sweeps when nothing was found near the waypoints.
    if candidates.is_empty() && matches!(order, GroupOrder::Attack(_) | GroupOrder::Compromise(_)) {
        let sweeps: [fn(&&PlayerObject) -> bool; 3] = [
            |e| e.is_structure,
            |e| !e.is_structure && !e.is_vtol,
            |e| !e.is_structure,
        ];
        for sweep in sweeps {
            candidates = enemies
                .iter()
                .filter(sweep)
                .filter(|e| reachable(terrain, lead, e.pos))
                .collect();
            if !candidates.is_empty() {
                break;
            }
        }
    }

    let chosen = candidates
        .iter()
        .filter(|e| !e.is_transport)
        .min_by(|a, b| {
            group_centroid
                .dist(a.pos)
                .partial_cmp(&group_centroid.dist(b.pos))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        })?;

    let state = groups.state_mut(group)?;
    state.target = Some(chosen.pos);
    Some(chosen.pos)
}

/// Morale check, run when a managed group loses a member. A group that
/// has lost more than its morale threshold swaps to defending its
/// fallback position; reinforcements above the threshold restore the
/// original order.
pub fn check_group_morale(groups: &mut GroupRegistry, group: GroupId, live_size: usize) -> bool {
    let Some(state) = groups.managed.get_mut(&group) else {
        return false;
    };
    match &state.order {
        GroupOrder::Attack(attack) => {
            let Some(morale) = attack.morale else {
                return false;
            };
            let Some(fallback) = attack.fallback else {
                debug!("{:?}: morale set without a fallback position", group);
                return false;
            };
            let threshold = ((100 - morale.min(100)) as i64 * state.count.max(0) as i64 / 100) as usize;
            if live_size > threshold {
                return false;
            }
            trace!("{:?} falls back", group);
            let mut defend = warbound_logic::orders::DefendOrder::new(fallback);
            defend.morale = Some(morale);
            defend.count = Some(state.count);
            defend.repair = attack.repair;
            defend.repair_pos = attack.repair_pos;
            defend.regroup = attack.regroup;
            let prev = std::mem::replace(
                &mut state.order,
                GroupOrder::Defend(defend),
            );
            state.prev_order = Some(prev);
            state.target = None;
            true
        }
        GroupOrder::Defend(defend) => {
            let Some(morale) = defend.morale else {
                return false;
            };
            if state.prev_order.is_none() {
                return false;
            }
            let threshold = ((100 - morale.min(100)) as i64 * state.count.max(0) as i64 / 100) as usize;
            if live_size <= threshold {
                return false;
            }
            trace!("{:?} restores", group);
            if let Some(prev) = state.prev_order.take() {
                state.order = prev;
                state.target = None;
            }
            true
        }
        other => {
            debug!("{:?}: order {} does not support morale", group, other.name());
            false
        }
    }
}
