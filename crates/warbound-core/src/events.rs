//! Inbound event hooks and the outbound notification surface.
//!
//! The host (or the session's own bookkeeping) feeds [`GameEvent`]s into
//! `CampaignSession::handle_event`; the library's handlers always run
//! before any scenario observer sees the event, mirroring the pre-hook
//! ordering guarantee scenario authors rely on.
//!
//! Outbound calls are fire-and-forget, so they are rendered as data: the
//! session accumulates [`Notification`]s for the host to drain each tick.

use serde::{Deserialize, Serialize};

use warbound_logic::geometry::Pos;
use warbound_logic::ids::{GroupId, ObjectId};

/// Events delivered to the campaign session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The scenario has started; timers may be armed.
    LevelStart,
    Attacked {
        victim: ObjectId,
        attacker: Option<ObjectId>,
    },
    UnitBuilt {
        unit: ObjectId,
        factory: Option<ObjectId>,
    },
    ObjectDestroyed {
        object: ObjectId,
    },
    AreaEntered {
        unit: ObjectId,
        label: String,
    },
    Pickup {
        feature: ObjectId,
        unit: ObjectId,
    },
    GroupLoss {
        unit: ObjectId,
        group: GroupId,
        remaining: usize,
    },
    TransportLanded {
        player: u8,
    },
    ResearchCompleted {
        player: u8,
        tech: String,
    },
}

/// Outbound requests and observable outcomes, drained by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    Message {
        player: u8,
        text: String,
    },
    Sound {
        name: String,
        pos: Option<Pos>,
    },
    Video {
        name: String,
    },
    /// A transport is en route. Only the latest per player is live: a new
    /// arrival replaces any undrained predecessor.
    IncomingTransport {
        player: u8,
        message: Option<String>,
    },
    TransportLanded {
        player: u8,
        group: GroupId,
    },
    ArtifactPlaced {
        label: String,
        pos: Pos,
    },
    ArtifactPickedUp {
        label: String,
        techs: Vec<String>,
    },
    BaseDetected {
        label: String,
    },
    BaseEliminated {
        label: String,
    },
    MissionWon,
}

/// Append a notification, enforcing the incoming-transport replacement
/// rule: only the newest announcement per player stays queued.
pub fn push_notification(out: &mut Vec<Notification>, notification: Notification) {
    if let Notification::IncomingTransport { player, .. } = &notification {
        let player = *player;
        out.retain(|n| !matches!(n, Notification::IncomingTransport { player: p, .. } if *p == player));
    }
    out.push(notification);
}
