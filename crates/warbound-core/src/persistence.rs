//! Save/load — versioned bincode snapshots of the whole session.
//!
//! Registries serialize as-is since they only hold stable ids. World
//! entities are flattened component-wise into [`SerializableEntity`]
//! records; the id-to-entity index is rebuilt on restore rather than
//! stored. The RNG is captured as its original seed, so a restored
//! session replays a fresh stream rather than resuming mid-sequence.

use std::fs;
use std::path::Path;

use hecs::{EntityBuilder, World};
use log::info;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warbound_logic::terrain::Terrain;

use crate::components::{
    Ammo, Feature, Health, IdAllocator, Label, Location, ObjectIndex, Structure, TransportCraft,
    Unit, UnitOrder,
};
use crate::events::Notification;
use crate::research::ResearchLedger;
use crate::scheduler::Scheduler;
use crate::session::CampaignSession;
use crate::systems::artifacts::ArtifactRegistry;
use crate::systems::bases::{BaseRegistry, VictoryState};
use crate::systems::factories::FactoryManager;
use crate::systems::tactics::GroupRegistry;
use crate::systems::transport::TransportScheduler;
use crate::systems::trucks::TruckManager;
use crate::systems::vtol::VtolController;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("unsupported save version {0}")]
    VersionMismatch(u32),
}

/// One world entity, flattened component by component.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializableEntity {
    unit: Option<Unit>,
    structure: Option<Structure>,
    feature: Option<Feature>,
    location: Option<Location>,
    health: Option<Health>,
    ammo: Option<Ammo>,
    label: Option<Label>,
    order: Option<UnitOrder>,
    transport: bool,
}

/// A complete session snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveData {
    version: u32,
    time_ms: u64,
    rng_seed: u64,
    next_object_id: u32,
    terrain: Terrain,
    groups: GroupRegistry,
    trucks: TruckManager,
    transports: TransportScheduler,
    vtols: VtolController,
    artifacts: ArtifactRegistry,
    bases: BaseRegistry,
    factories: FactoryManager,
    research: ResearchLedger,
    scheduler: Scheduler,
    victory: VictoryState,
    notifications: Vec<Notification>,
    last_alert_ms: Option<u64>,
    entities: Vec<SerializableEntity>,
}

impl SaveData {
    pub fn capture(session: &CampaignSession) -> Self {
        let mut entities = Vec::new();
        for entity_ref in session.world.iter() {
            entities.push(SerializableEntity {
                unit: entity_ref.get::<&Unit>().map(|c| (*c).clone()),
                structure: entity_ref.get::<&Structure>().map(|c| (*c).clone()),
                feature: entity_ref.get::<&Feature>().map(|c| (*c).clone()),
                location: entity_ref.get::<&Location>().map(|c| *c),
                health: entity_ref.get::<&Health>().map(|c| *c),
                ammo: entity_ref.get::<&Ammo>().map(|c| *c),
                label: entity_ref.get::<&Label>().map(|c| (*c).clone()),
                order: entity_ref.get::<&UnitOrder>().map(|c| *c),
                transport: entity_ref.get::<&TransportCraft>().is_some(),
            });
        }
        Self {
            version: SAVE_VERSION,
            time_ms: session.time_ms,
            rng_seed: session.rng_seed,
            next_object_id: session.ids.next_raw(),
            terrain: session.terrain.clone(),
            groups: session.groups.clone(),
            trucks: session.trucks.clone(),
            transports: session.transports.clone(),
            vtols: session.vtols.clone(),
            artifacts: session.artifacts.clone(),
            bases: session.bases.clone(),
            factories: session.factories.clone(),
            research: session.research.clone(),
            scheduler: session.scheduler.clone(),
            victory: session.victory.clone(),
            notifications: session.notifications.clone(),
            last_alert_ms: session.last_alert_ms,
            entities,
        }
    }

    /// Rebuild a live session. The object index is reconstructed from the
    /// entities' stable ids.
    pub fn restore(self) -> Result<CampaignSession, SaveError> {
        if self.version != SAVE_VERSION {
            return Err(SaveError::VersionMismatch(self.version));
        }

        let mut world = World::new();
        let mut index = ObjectIndex::new();
        for record in self.entities {
            let id = record
                .unit
                .as_ref()
                .map(|u| u.id)
                .or(record.structure.as_ref().map(|s| s.id))
                .or(record.feature.as_ref().map(|f| f.id));
            let mut builder = EntityBuilder::new();
            if let Some(c) = record.unit {
                builder.add(c);
            }
            if let Some(c) = record.structure {
                builder.add(c);
            }
            if let Some(c) = record.feature {
                builder.add(c);
            }
            if let Some(c) = record.location {
                builder.add(c);
            }
            if let Some(c) = record.health {
                builder.add(c);
            }
            if let Some(c) = record.ammo {
                builder.add(c);
            }
            if let Some(c) = record.label {
                builder.add(c);
            }
            if let Some(c) = record.order {
                builder.add(c);
            }
            if record.transport {
                builder.add(TransportCraft);
            }
            let entity = world.spawn(builder.build());
            if let Some(id) = id {
                index.insert(id, entity);
            }
        }

        let mut session = CampaignSession::new(self.terrain, self.rng_seed);
        session.world = world;
        session.index = index;
        session.time_ms = self.time_ms;
        session.rng = SmallRng::seed_from_u64(self.rng_seed);
        session.ids = IdAllocator::starting_at(self.next_object_id);
        session.groups = self.groups;
        session.trucks = self.trucks;
        session.transports = self.transports;
        session.vtols = self.vtols;
        session.artifacts = self.artifacts;
        session.bases = self.bases;
        session.factories = self.factories;
        session.research = self.research;
        session.scheduler = self.scheduler;
        session.victory = self.victory;
        session.notifications = self.notifications;
        session.last_alert_ms = self.last_alert_ms;
        info!(
            "session restored at t={}ms with {} entities",
            session.time_ms,
            session.world.len()
        );
        Ok(session)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SaveError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Snapshot a session to disk.
pub fn save_to_file(session: &CampaignSession, path: impl AsRef<Path>) -> Result<(), SaveError> {
    let bytes = SaveData::capture(session).to_bytes()?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Load a session from disk.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<CampaignSession, SaveError> {
    let bytes = fs::read(path)?;
    SaveData::from_bytes(&bytes)?.restore()
}
