//! Warbound Core - Campaign-Director Session Engine
//!
//! A single-threaded, tick-driven campaign director for RTS-style
//! scenarios: it owns managed unit groups, per-player build and transport
//! queues, an air-raid controller, and artifact/base bookkeeping, and
//! issues orders into an in-process `hecs` world.
//!
//! # Architecture
//!
//! All state lives in one [`session::CampaignSession`] context object:
//! - **World**: units, structures and features as `hecs` entities
//! - **Registries**: groups, truck queues, transports, artifacts, bases,
//!   factories — serializable managers keyed by stable ids, never by live
//!   entity references
//! - **Systems**: per-tick poller functions that read the registries and
//!   write unit orders back into the world
//!
//! Nothing blocks: waiting is always expressed by re-scheduling a task for
//! a later tick, and nothing in the tick path raises a hard failure —
//! degraded operations trace-log and retry or skip.
//!
//! # Example
//!
//! ```rust,no_run
//! use warbound_core::prelude::*;
//! use warbound_logic::terrain::Terrain;
//!
//! let mut session = CampaignSession::new(Terrain::open(64, 64), 42);
//! session.handle_event(GameEvent::LevelStart);
//!
//! loop {
//!     session.update(100); // 100 ms of sim time per host frame
//!     for note in session.drain_notifications() {
//!         println!("{:?}", note);
//!     }
//! }
//! ```

pub mod components;
pub mod events;
pub mod persistence;
pub mod research;
pub mod scheduler;
pub mod session;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::events::{GameEvent, Notification};
    pub use crate::session::CampaignSession;
    pub use warbound_logic::geometry::{Area, Pos};
    pub use warbound_logic::ids::{GroupId, ObjectId};
    pub use warbound_logic::orders::*;
    pub use warbound_logic::templates::{Propulsion, Turret, UnitTemplate, VtolRotationEntry};
}
