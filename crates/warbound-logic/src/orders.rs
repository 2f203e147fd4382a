//! Group order descriptors — the configuration records that govern how a
//! managed group behaves until the next order is issued.
//!
//! Each order kind carries only the fields it needs; defaults are applied
//! at construction time, never at read time. Re-issuing an order to a
//! group replaces the previous descriptor wholesale (last write wins).

use serde::{Deserialize, Serialize};

use crate::constants::{intervals, radii, thresholds};
use crate::geometry::Pos;
use crate::ids::ObjectId;

/// High-level order for a managed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GroupOrder {
    /// Pursue the human player, preferably around the given waypoints.
    Attack(AttackOrder),
    /// Hold a position; retreat back to it when drawn too far out.
    Defend(DefendOrder),
    /// Move between waypoints on a timer.
    Patrol(PatrolOrder),
    /// Like attack, but stay near the last waypoint instead of hunting
    /// across the whole map.
    Compromise(CompromiseOrder),
    /// Support a commander unit; inherit its order when it dies.
    Follow(FollowOrder),
}

impl GroupOrder {
    /// Order kind as a short name, for trace output.
    pub fn name(&self) -> &'static str {
        match self {
            GroupOrder::Attack(_) => "ATTACK",
            GroupOrder::Defend(_) => "DEFEND",
            GroupOrder::Patrol(_) => "PATROL",
            GroupOrder::Compromise(_) => "COMPROMISE",
            GroupOrder::Follow(_) => "FOLLOW",
        }
    }

    /// True when both orders are the same kind, regardless of fields.
    pub fn same_kind(&self, other: &GroupOrder) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The `count` override, if the order kind carries one.
    pub fn count_override(&self) -> Option<i32> {
        match self {
            GroupOrder::Attack(o) => o.count,
            GroupOrder::Defend(o) => o.count,
            GroupOrder::Patrol(o) => o.count,
            GroupOrder::Compromise(o) => o.count,
            GroupOrder::Follow(_) => None,
        }
    }

    /// The repair threshold, if the order kind carries one.
    pub fn repair_threshold(&self) -> Option<u32> {
        match self {
            GroupOrder::Attack(o) => o.repair,
            GroupOrder::Defend(o) => o.repair,
            GroupOrder::Patrol(o) => o.repair,
            GroupOrder::Compromise(o) => o.repair,
            GroupOrder::Follow(o) => o.repair,
        }
    }

    /// Where wounded units go when the owner has no repair facility.
    pub fn repair_fallback(&self) -> Option<Pos> {
        match self {
            GroupOrder::Attack(o) => o.repair_pos,
            GroupOrder::Defend(o) => o.repair_pos,
            GroupOrder::Patrol(o) => o.repair_pos,
            GroupOrder::Compromise(o) => o.repair_pos,
            GroupOrder::Follow(o) => o.repair_pos,
        }
    }

    /// Whether the group should mass up before advancing.
    pub fn regroup(&self) -> bool {
        match self {
            GroupOrder::Attack(o) => o.regroup,
            GroupOrder::Defend(o) => o.regroup,
            GroupOrder::Patrol(o) => o.regroup,
            GroupOrder::Compromise(o) => o.regroup,
            GroupOrder::Follow(_) => false,
        }
    }

    /// Scan radius for opportunistic targets near a unit, in tiles.
    pub fn scan_range(&self, sensor: bool) -> i32 {
        let base = match self {
            GroupOrder::Attack(_) | GroupOrder::Defend(_) | GroupOrder::Follow(_) => {
                radii::TARGET_TRACKING
            }
            GroupOrder::Patrol(_) => radii::PATROL_SCAN,
            GroupOrder::Compromise(_) => radii::COMPROMISE_SCAN,
        };
        // Sensors see half again as far.
        if sensor {
            base * 3 / 2
        } else {
            base
        }
    }
}

/// Pursue the enemy around a waypoint list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOrder {
    /// Waypoints, attacked front to back. Empty means "hunt anywhere".
    pub pos: Vec<Pos>,
    /// Scan radius around each waypoint.
    pub radius: i32,
    /// Where to retreat when morale breaks.
    pub fallback: Option<Pos>,
    /// Percentage of the original group that may die before the group
    /// falls back. `None` disables morale.
    pub morale: Option<u32>,
    /// Override for the group size morale/regroup are measured against.
    /// `-1` marks the order permanent: re-engage whenever idle.
    pub count: Option<i32>,
    /// Health percentage below which units leave for repairs.
    pub repair: Option<u32>,
    /// Where wounded units gather when the player owns no repair
    /// facility.
    pub repair_pos: Option<Pos>,
    /// Mass up before advancing.
    pub regroup: bool,
}

impl Default for AttackOrder {
    fn default() -> Self {
        Self {
            pos: Vec::new(),
            radius: radii::PLAYER_BASE,
            fallback: None,
            morale: None,
            count: None,
            repair: None,
            repair_pos: None,
            regroup: false,
        }
    }
}

impl AttackOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, pos: Pos) -> Self {
        self.pos.push(pos);
        self
    }

    pub fn with_waypoints(mut self, pos: Vec<Pos>) -> Self {
        self.pos = pos;
        self
    }

    pub fn with_radius(mut self, radius: i32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_fallback(mut self, fallback: Pos, morale: u32) -> Self {
        self.fallback = Some(fallback);
        self.morale = Some(morale);
        self
    }

    pub fn with_count(mut self, count: i32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_repair(mut self, percent: u32) -> Self {
        self.repair = Some(percent);
        self
    }

    /// Repair rally point for players without a facility. Applies the
    /// default threshold when none was configured.
    pub fn with_repair_at(mut self, pos: Pos) -> Self {
        self.repair_pos = Some(pos);
        if self.repair.is_none() {
            self.repair = Some(thresholds::REPAIR_PERCENT);
        }
        self
    }

    pub fn with_regroup(mut self) -> Self {
        self.regroup = true;
        self
    }

    /// Permanent order: never disbands, re-engages whenever idle.
    pub fn permanent(mut self) -> Self {
        self.count = Some(-1);
        self
    }
}

/// Hold within `radius` of `pos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefendOrder {
    pub pos: Pos,
    pub radius: i32,
    pub morale: Option<u32>,
    pub count: Option<i32>,
    pub repair: Option<u32>,
    pub repair_pos: Option<Pos>,
    pub regroup: bool,
}

impl DefendOrder {
    pub fn new(pos: Pos) -> Self {
        Self {
            pos,
            radius: radii::DEFENSE,
            morale: None,
            count: None,
            repair: None,
            repair_pos: None,
            regroup: false,
        }
    }

    pub fn with_radius(mut self, radius: i32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_repair(mut self, percent: u32) -> Self {
        self.repair = Some(percent);
        self
    }

    pub fn with_repair_at(mut self, pos: Pos) -> Self {
        self.repair_pos = Some(pos);
        if self.repair.is_none() {
            self.repair = Some(thresholds::REPAIR_PERCENT);
        }
        self
    }

    pub fn with_regroup(mut self) -> Self {
        self.regroup = true;
        self
    }
}

/// Move between waypoints on an interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolOrder {
    pub pos: Vec<Pos>,
    /// Milliseconds between waypoint changes.
    pub interval_ms: u64,
    pub count: Option<i32>,
    pub repair: Option<u32>,
    pub repair_pos: Option<Pos>,
    pub regroup: bool,
}

impl PatrolOrder {
    pub fn new(pos: Vec<Pos>) -> Self {
        Self {
            pos,
            interval_ms: intervals::PATROL_MOVE_MS,
            count: None,
            repair: None,
            repair_pos: None,
            regroup: false,
        }
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }
}

/// Attack along waypoints, but never stray far from the last one. Useful
/// for offworld maps with the landing zone as the final position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompromiseOrder {
    pub pos: Vec<Pos>,
    pub radius: i32,
    pub count: Option<i32>,
    pub repair: Option<u32>,
    pub repair_pos: Option<Pos>,
    pub regroup: bool,
}

impl CompromiseOrder {
    pub fn new(pos: Vec<Pos>) -> Self {
        Self {
            pos,
            radius: radii::PLAYER_BASE,
            count: None,
            repair: None,
            repair_pos: None,
            regroup: false,
        }
    }

    pub fn with_radius(mut self, radius: i32) -> Self {
        self.radius = radius;
        self
    }
}

/// Support a commander; execute its last will when it dies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowOrder {
    pub commander: ObjectId,
    /// Order the group inherits when the commander is lost.
    pub order: Box<GroupOrder>,
    pub repair: Option<u32>,
    pub repair_pos: Option<Pos>,
}

impl FollowOrder {
    pub fn new(commander: ObjectId, order: GroupOrder) -> Self {
        Self {
            commander,
            order: Box::new(order),
            repair: None,
            repair_pos: None,
        }
    }
}
