//! Campaign tuning constants — player slots, radii, cadences, thresholds.
//!
//! These are plain values with no world dependency. Both the session engine
//! and the native simtest use these.

/// Player slot reserved for the human commander.
pub const HUMAN_PLAYER: u8 = 0;

/// Number of player slots in a campaign map.
pub const MAX_PLAYERS: u8 = 8;

/// Scan radii, in tiles.
pub mod radii {
    /// How far a group keeps tracking a remembered target.
    pub const TARGET_TRACKING: i32 = 10;
    /// Default scan radius around an attack waypoint.
    pub const PLAYER_BASE: i32 = 20;
    /// Default radius a defending group holds around its position.
    pub const DEFENSE: i32 = 4;
    /// Units this close to their destination are considered arrived.
    pub const CLOSE: i32 = 2;
    /// Units within this distance of each other belong to one cluster.
    pub const CLUSTER: i32 = 4;
    /// Scan radius while patrolling between waypoints.
    pub const PATROL_SCAN: i32 = 5;
    /// Scan radius under a compromise order; kept very small so groups
    /// don't get pulled far off the waypoint line.
    pub const COMPROMISE_SCAN: i32 = 2;
}

/// Poller cadences and delays, in milliseconds of sim time.
pub mod intervals {
    /// Tactics dispatcher cadence.
    pub const TACTICS_MS: u64 = 1_000;
    /// Truck/production queue cadence.
    pub const TRUCKS_MS: u64 = 2_000;
    /// VTOL recall scan cadence.
    pub const VTOL_RECALL_MS: u64 = 800;
    /// VTOL stop-object poll cadence.
    pub const VTOL_STOP_POLL_MS: u64 = 5_000;
    /// Default VTOL spawn-wave cadence.
    pub const VTOL_SPAWN_MS: u64 = 60_000;
    /// Retry delay while a transport is already in flight.
    pub const TRANSPORT_RETRY_MS: u64 = 1_000;
    /// Flight time between transport dispatch and landing.
    pub const TRANSPORT_FLIGHT_MS: u64 = 10_000;
    /// Victory condition poll cadence.
    pub const VICTORY_MS: u64 = 3_000;
    /// Default interval between patrol waypoint changes.
    pub const PATROL_MOVE_MS: u64 = 60_000;
    /// Window after a hit during which a regrouping cluster retreats to
    /// base instead of holding.
    pub const FALLBACK_AFTER_HIT_MS: u64 = 5_000;
    /// Minimum spacing between "under attack" notifications.
    pub const ATTACK_ALERT_MS: u64 = 5_000;
    /// Default time a managed factory takes to produce one unit.
    pub const FACTORY_BUILD_MS: u64 = 10_000;
    /// Time a truck spends raising one structure once on site.
    pub const STRUCTURE_BUILD_MS: u64 = 5_000;
}

/// Health/ammo thresholds, in percent.
pub mod thresholds {
    /// Default health percentage below which units seek repairs.
    pub const REPAIR_PERCENT: u32 = 66;
    /// VTOLs below this health are recalled to the exit point.
    pub const VTOL_RECALL_HEALTH: u32 = 40;
}

/// Combat experience granted to computer reinforcements stepping off a
/// transport, so later waves arrive seasoned.
pub const REINFORCEMENT_EXPERIENCE: f32 = 32.0;

/// Default VTOL wave size when no explicit limit is configured.
pub const VTOL_WAVE_MIN: usize = 5;
pub const VTOL_WAVE_MAX: usize = 6;
