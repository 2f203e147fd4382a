//! Tile geometry — positions, areas, centroids, cluster analysis.

use serde::{Deserialize, Serialize};

/// A tile coordinate on the campaign map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in tiles.
    pub fn dist(&self, other: Pos) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    /// True if `other` lies within `radius` tiles.
    pub fn within(&self, other: Pos, radius: i32) -> bool {
        self.dist(other) <= radius as f32
    }
}

/// A rectangular map area, inclusive of both corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub x: i32,
    pub y: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Area {
    pub const fn new(x: i32, y: i32, x2: i32, y2: i32) -> Self {
        Self { x, y, x2, y2 }
    }

    pub fn contains(&self, pos: Pos) -> bool {
        pos.x >= self.x && pos.x <= self.x2 && pos.y >= self.y && pos.y <= self.y2
    }

    pub fn center(&self) -> Pos {
        Pos::new((self.x + self.x2) / 2, (self.y + self.y2) / 2)
    }
}

/// Average coordinate of a set of positions. `None` when empty.
pub fn centroid(positions: &[Pos]) -> Option<Pos> {
    if positions.is_empty() {
        return None;
    }
    let (sx, sy) = positions
        .iter()
        .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x as i64, sy + p.y as i64));
    let len = positions.len() as i64;
    Some(Pos::new((sx / len) as i32, (sy / len) as i32))
}

/// Result of grouping positions into proximity clusters.
#[derive(Debug, Clone)]
pub struct Clusters {
    /// Member indices (into the input slice) per cluster.
    pub members: Vec<Vec<usize>>,
    /// Average coordinate per cluster.
    pub centroids: Vec<Pos>,
    /// Index of the cluster with the most members.
    pub biggest: usize,
}

impl Clusters {
    pub fn biggest_size(&self) -> usize {
        self.members[self.biggest].len()
    }

    pub fn biggest_centroid(&self) -> Pos {
        self.centroids[self.biggest]
    }
}

/// Group positions into clusters: two positions belong to the same cluster
/// when a chain of members, each within `radius` of the next, connects
/// them. Returns `None` for empty input.
pub fn find_clusters(positions: &[Pos], radius: i32) -> Option<Clusters> {
    if positions.is_empty() {
        return None;
    }

    let mut assigned = vec![false; positions.len()];
    let mut members: Vec<Vec<usize>> = Vec::new();

    for start in 0..positions.len() {
        if assigned[start] {
            continue;
        }
        // Flood out from the seed position.
        let mut cluster = vec![start];
        assigned[start] = true;
        let mut cursor = 0;
        while cursor < cluster.len() {
            let here = positions[cluster[cursor]];
            for (i, p) in positions.iter().enumerate() {
                if !assigned[i] && here.within(*p, radius) {
                    assigned[i] = true;
                    cluster.push(i);
                }
            }
            cursor += 1;
        }
        members.push(cluster);
    }

    let centroids: Vec<Pos> = members
        .iter()
        .map(|cluster| {
            let pts: Vec<Pos> = cluster.iter().map(|&i| positions[i]).collect();
            centroid(&pts).expect("cluster is never empty")
        })
        .collect();

    let biggest = members
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| c.len())
        .map(|(i, _)| i)
        .unwrap_or(0);

    Some(Clusters {
        members,
        centroids,
        biggest,
    })
}
