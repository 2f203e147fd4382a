//! Coarse terrain map with BFS reachability.
//!
//! This is deliberately not unit pathfinding: the campaign layer only needs
//! to know whether a ground unit can reach a position at all, so trucks can
//! refuse unreachable build sites and target scans can filter out islands.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::geometry::Pos;

/// Tile grid with impassable cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Terrain {
    pub width: i32,
    pub height: i32,
    blocked: HashSet<Pos>,
}

impl Terrain {
    /// An open map with no obstacles.
    pub fn open(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            blocked: HashSet::new(),
        }
    }

    pub fn block(&mut self, pos: Pos) {
        self.blocked.insert(pos);
    }

    /// Block every tile in a column range, forming a wall.
    pub fn block_column(&mut self, x: i32, y_from: i32, y_to: i32) {
        for y in y_from..=y_to {
            self.blocked.insert(Pos::new(x, y));
        }
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn passable(&self, pos: Pos) -> bool {
        self.in_bounds(pos) && !self.blocked.contains(&pos)
    }

    /// Whether a ground unit at `from` can reach `to`. Air units skip this
    /// check entirely. BFS over the 4-neighbor grid.
    pub fn can_reach(&self, from: Pos, to: Pos) -> bool {
        if !self.passable(from) || !self.passable(to) {
            return false;
        }
        if from == to {
            return true;
        }

        let mut visited = HashSet::new();
        let mut frontier = VecDeque::new();
        visited.insert(from);
        frontier.push_back(from);

        while let Some(here) = frontier.pop_front() {
            for next in [
                Pos::new(here.x + 1, here.y),
                Pos::new(here.x - 1, here.y),
                Pos::new(here.x, here.y + 1),
                Pos::new(here.x, here.y - 1),
            ] {
                if next == to {
                    return true;
                }
                if self.passable(next) && visited.insert(next) {
                    frontier.push_back(next);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_map_reachable() {
        let terrain = Terrain::open(10, 10);
        assert!(terrain.can_reach(Pos::new(0, 0), Pos::new(9, 9)));
        assert!(!terrain.can_reach(Pos::new(0, 0), Pos::new(10, 0)));
    }

    #[test]
    fn test_wall_blocks() {
        let mut terrain = Terrain::open(10, 10);
        terrain.block_column(5, 0, 9);
        assert!(!terrain.can_reach(Pos::new(0, 0), Pos::new(9, 9)));
        assert!(terrain.can_reach(Pos::new(0, 0), Pos::new(4, 9)));
    }

    #[test]
    fn test_gap_in_wall() {
        let mut terrain = Terrain::open(10, 10);
        terrain.block_column(5, 0, 8); // tile (5, 9) stays open
        assert!(terrain.can_reach(Pos::new(0, 0), Pos::new(9, 0)));
    }

    #[test]
    fn test_blocked_endpoints() {
        let mut terrain = Terrain::open(10, 10);
        terrain.block(Pos::new(3, 3));
        assert!(!terrain.can_reach(Pos::new(0, 0), Pos::new(3, 3)));
        assert!(!terrain.can_reach(Pos::new(3, 3), Pos::new(0, 0)));
    }
}
