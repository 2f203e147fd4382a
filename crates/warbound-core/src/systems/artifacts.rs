//! Artifact bookkeeping — research crates the scenario scatters for the
//! human player to recover.
//!
//! An artifact either sits on the map from the start or is bound to an
//! object and drops when that object dies. Both placement and pickup are
//! latched by flags, so duplicate destruction or pickup events are
//! harmless no-ops.

use std::collections::BTreeMap;

use hecs::World;
use log::debug;

use warbound_logic::constants::HUMAN_PLAYER;
use warbound_logic::geometry::Pos;
use warbound_logic::ids::ObjectId;

use crate::components::{Feature, FeatureKind, IdAllocator, Label, Location, ObjectIndex};
use crate::events::{push_notification, Notification};
use crate::research::ResearchLedger;

/// Where an artifact comes from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ArtifactSource {
    /// A crate sitting on the map from scenario start.
    AtPos(Pos),
    /// Dropped when the given object is destroyed.
    OnObject(ObjectId),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArtifactInfo {
    pub techs: Vec<String>,
    pub source: ArtifactSource,
    placed: bool,
    picked_up: bool,
    crate_id: Option<ObjectId>,
}

/// Artifacts by scenario label.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ArtifactRegistry {
    artifacts: BTreeMap<String, ArtifactInfo>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_placed(&self, label: &str) -> bool {
        self.artifacts.get(label).map(|a| a.placed).unwrap_or(false)
    }

    pub fn is_picked_up(&self, label: &str) -> bool {
        self.artifacts
            .get(label)
            .map(|a| a.picked_up)
            .unwrap_or(false)
    }

    /// Victory predicate: every registered artifact has been recovered.
    pub fn all_picked_up(&self) -> bool {
        self.artifacts.values().all(|a| a.picked_up)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn spawn_crate(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    label: &str,
    pos: Pos,
) -> ObjectId {
    let id = ids.alloc();
    let entity = world.spawn((
        Feature::new(id, FeatureKind::Crate),
        Location::new(pos),
        Label(label.to_string()),
    ));
    index.insert(id, entity);
    id
}

/// Register the scenario's artifacts. Position-based ones appear on the
/// map immediately; object-bound ones wait for their carrier to die.
pub fn set_artifacts(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    registry: &mut ArtifactRegistry,
    specs: Vec<(String, Vec<String>, ArtifactSource)>,
) {
    for (label, techs, source) in specs {
        let mut info = ArtifactInfo {
            techs,
            source: source.clone(),
            placed: false,
            picked_up: false,
            crate_id: None,
        };
        if let ArtifactSource::AtPos(pos) = source {
            info.crate_id = Some(spawn_crate(world, index, ids, &label, pos));
            info.placed = true;
        }
        registry.artifacts.insert(label, info);
    }
}

/// An object died; drop any artifact bound to it where it stood.
pub fn place_artifacts_for(
    world: &mut World,
    index: &mut ObjectIndex,
    ids: &mut IdAllocator,
    registry: &mut ArtifactRegistry,
    notifications: &mut Vec<Notification>,
    object: ObjectId,
    at: Pos,
) {
    let labels: Vec<String> = registry
        .artifacts
        .iter()
        .filter(|(_, a)| a.source == ArtifactSource::OnObject(object))
        .map(|(label, _)| label.clone())
        .collect();
    for label in labels {
        let info = registry.artifacts.get_mut(&label).expect("label exists");
        if info.placed {
            debug!("artifact {} already placed", label);
            continue;
        }
        info.crate_id = Some(spawn_crate(world, index, ids, &label, at));
        info.placed = true;
        push_notification(notifications, Notification::ArtifactPlaced { label, pos: at });
    }
}

/// A crate was picked up. Grants the techs to the human player exactly
/// once; repeated pickups of the same artifact do nothing.
pub fn pickup_artifact(
    world: &mut World,
    index: &mut ObjectIndex,
    registry: &mut ArtifactRegistry,
    research: &mut ResearchLedger,
    notifications: &mut Vec<Notification>,
    feature: ObjectId,
) {
    let Some(label) = registry
        .artifacts
        .iter()
        .find(|(_, a)| a.crate_id == Some(feature))
        .map(|(label, _)| label.clone())
    else {
        return;
    };
    let info = registry.artifacts.get_mut(&label).expect("label exists");
    if info.picked_up {
        debug!("artifact {} already recovered", label);
        return;
    }
    info.picked_up = true;
    for tech in &info.techs {
        research.grant(HUMAN_PLAYER, tech);
    }
    let techs = info.techs.clone();

    if let Some(entity) = index.remove(&feature) {
        let _ = world.despawn(entity);
    }
    push_notification(
        notifications,
        Notification::Sound {
            name: "pcv727.ogg".to_string(),
            pos: None,
        },
    );
    push_notification(notifications, Notification::ArtifactPickedUp { label, techs });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> (World, ObjectIndex, IdAllocator, ArtifactRegistry, ResearchLedger, Vec<Notification>) {
        (
            World::new(),
            ObjectIndex::new(),
            IdAllocator::new(),
            ArtifactRegistry::new(),
            ResearchLedger::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_positioned_artifact_appears_immediately() {
        let (mut world, mut index, mut ids, mut registry, _, _) = rig();
        set_artifacts(
            &mut world,
            &mut index,
            &mut ids,
            &mut registry,
            vec![(
                "cannon".to_string(),
                vec!["R-Wpn-Cannon1".to_string()],
                ArtifactSource::AtPos(Pos::new(5, 5)),
            )],
        );

        assert!(registry.is_placed("cannon"));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_bound_artifact_drops_once() {
        let (mut world, mut index, mut ids, mut registry, _, mut notifications) = rig();
        let carrier = ObjectId(99);
        set_artifacts(
            &mut world,
            &mut index,
            &mut ids,
            &mut registry,
            vec![(
                "flamer".to_string(),
                vec!["R-Wpn-Flamer".to_string()],
                ArtifactSource::OnObject(carrier),
            )],
        );
        assert!(!registry.is_placed("flamer"));

        place_artifacts_for(
            &mut world,
            &mut index,
            &mut ids,
            &mut registry,
            &mut notifications,
            carrier,
            Pos::new(7, 7),
        );
        assert!(registry.is_placed("flamer"));
        assert_eq!(world.len(), 1);

        // A duplicate destruction report must not drop a second crate.
        place_artifacts_for(
            &mut world,
            &mut index,
            &mut ids,
            &mut registry,
            &mut notifications,
            carrier,
            Pos::new(8, 8),
        );
        assert_eq!(world.len(), 1);
        let placed = notifications
            .iter()
            .filter(|n| matches!(n, Notification::ArtifactPlaced { .. }))
            .count();
        assert_eq!(placed, 1);
    }

    #[test]
    fn test_pickup_grants_once() {
        let (mut world, mut index, mut ids, mut registry, mut research, mut notifications) = rig();
        set_artifacts(
            &mut world,
            &mut index,
            &mut ids,
            &mut registry,
            vec![(
                "cannon".to_string(),
                vec!["R-Wpn-Cannon1".to_string(), "R-Wpn-Cannon2".to_string()],
                ArtifactSource::AtPos(Pos::new(5, 5)),
            )],
        );
        let crate_id = ObjectId(0);

        pickup_artifact(
            &mut world,
            &mut index,
            &mut registry,
            &mut research,
            &mut notifications,
            crate_id,
        );
        assert!(registry.is_picked_up("cannon"));
        assert!(registry.all_picked_up());
        assert!(research.has(HUMAN_PLAYER, "R-Wpn-Cannon1"));
        assert_eq!(research.count(HUMAN_PLAYER), 2);
        assert_eq!(world.len(), 0);

        // The event may arrive twice; the grant must not.
        pickup_artifact(
            &mut world,
            &mut index,
            &mut registry,
            &mut research,
            &mut notifications,
            crate_id,
        );
        assert_eq!(research.count(HUMAN_PLAYER), 2);
        let picked = notifications
            .iter()
            .filter(|n| matches!(n, Notification::ArtifactPickedUp { .. }))
            .count();
        assert_eq!(picked, 1);
    }
}
