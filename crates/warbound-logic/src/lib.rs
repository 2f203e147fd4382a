//! Pure campaign logic for Warbound.
//!
//! This crate contains all campaign-director logic that is independent of
//! any world, engine, or runtime. Functions take plain data and return
//! results, making them unit-testable and portable between the session
//! engine, the headless simtest harness, and any future host.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Player slots, radii, cadences, thresholds |
//! | [`geometry`] | Tile positions, areas, centroids, cluster analysis |
//! | [`ids`] | Stable object and group handles |
//! | [`orders`] | Group order descriptors (attack/defend/patrol/...) |
//! | [`templates`] | Unit templates: body, propulsion, turret |
//! | [`terrain`] | Coarse tile map with BFS reachability |

pub mod constants;
pub mod geometry;
pub mod ids;
pub mod orders;
pub mod templates;
pub mod terrain;
