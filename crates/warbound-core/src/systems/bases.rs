//! Enemy base bookkeeping — detection, elimination, and the victory
//! check built on top of it.
//!
//! A base is a labelled cleanup area plus the vital structures inside it.
//! Detection fires once, on the first hostile contact with the base.
//! Elimination fires once, when the last vital structure dies; leftover
//! enemy structures and abandoned scenery inside the area are swept away
//! so the player is not left hunting indestructible rubble.

use std::collections::BTreeMap;

use hecs::World;
use log::debug;

use warbound_logic::constants::HUMAN_PLAYER;
use warbound_logic::geometry::Area;
use warbound_logic::ids::ObjectId;

use crate::components::{Feature, FeatureKind, Location, ObjectIndex, Structure};
use crate::events::{push_notification, Notification};
use crate::systems::artifacts::ArtifactRegistry;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BaseInfo {
    /// Area swept clean when the base falls.
    pub cleanup: Area,
    pub detect_message: Option<String>,
    pub detect_sound: Option<String>,
    pub eliminate_sound: Option<String>,
    /// Structures that must all die for the base to count as eliminated.
    vital: Vec<ObjectId>,
    detected: bool,
    eliminated: bool,
}

/// Enemy bases by scenario label.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BaseRegistry {
    bases: BTreeMap<String, BaseInfo>,
}

impl BaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_detected(&self, label: &str) -> bool {
        self.bases.get(label).map(|b| b.detected).unwrap_or(false)
    }

    pub fn is_eliminated(&self, label: &str) -> bool {
        self.bases.get(label).map(|b| b.eliminated).unwrap_or(false)
    }

    pub fn all_eliminated(&self) -> bool {
        self.bases.values().all(|b| b.eliminated)
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// The base a vital structure belongs to.
    pub fn base_for_object(&self, object: ObjectId) -> Option<&str> {
        self.bases
            .iter()
            .find(|(_, b)| b.vital.contains(&object))
            .map(|(label, _)| label.as_str())
    }
}

/// One base definition as handed in by the scenario.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BaseSpec {
    pub label: String,
    pub cleanup: Area,
    pub detect_message: Option<String>,
    pub detect_sound: Option<String>,
    pub eliminate_sound: Option<String>,
}

/// Register bases, claiming every computer structure inside each cleanup
/// area as vital.
pub fn set_enemy_bases(world: &World, registry: &mut BaseRegistry, specs: Vec<BaseSpec>) {
    for spec in specs {
        let mut vital: Vec<ObjectId> = world
            .query::<(&Structure, &Location)>()
            .iter()
            .filter(|(_, (s, loc))| s.player != HUMAN_PLAYER && spec.cleanup.contains(loc.pos))
            .map(|(_, (s, _))| s.id)
            .collect();
        vital.sort();
        debug!("base {} claims {} structures", spec.label, vital.len());
        registry.bases.insert(
            spec.label,
            BaseInfo {
                cleanup: spec.cleanup,
                detect_message: spec.detect_message,
                detect_sound: spec.detect_sound,
                eliminate_sound: spec.eliminate_sound,
                vital,
                detected: false,
                eliminated: false,
            },
        );
    }
}

/// First hostile contact with a base: announce it once.
pub fn detect_base(registry: &mut BaseRegistry, notifications: &mut Vec<Notification>, label: &str) {
    let Some(base) = registry.bases.get_mut(label) else {
        return;
    };
    if base.detected || base.eliminated {
        return;
    }
    base.detected = true;
    if let Some(sound) = &base.detect_sound {
        push_notification(
            notifications,
            Notification::Sound {
                name: sound.clone(),
                pos: Some(base.cleanup.center()),
            },
        );
    }
    if let Some(message) = &base.detect_message {
        push_notification(
            notifications,
            Notification::Message {
                player: HUMAN_PLAYER,
                text: message.clone(),
            },
        );
    }
    push_notification(
        notifications,
        Notification::BaseDetected {
            label: label.to_string(),
        },
    );
}

/// A structure died: strike it from whichever base holds it vital, and
/// eliminate the base when it was the last one.
pub fn note_structure_destroyed(
    world: &mut World,
    index: &mut ObjectIndex,
    registry: &mut BaseRegistry,
    notifications: &mut Vec<Notification>,
    object: ObjectId,
) {
    let mut fallen: Vec<String> = Vec::new();
    for (label, base) in registry.bases.iter_mut() {
        let before = base.vital.len();
        base.vital.retain(|&v| v != object);
        if base.vital.len() != before && base.vital.is_empty() && !base.eliminated {
            fallen.push(label.clone());
        }
    }
    for label in fallen {
        eliminate_base(world, index, registry, notifications, &label);
    }
}

fn eliminate_base(
    world: &mut World,
    index: &mut ObjectIndex,
    registry: &mut BaseRegistry,
    notifications: &mut Vec<Notification>,
    label: &str,
) {
    let Some(base) = registry.bases.get_mut(label) else {
        return;
    };
    base.eliminated = true;
    let cleanup = base.cleanup;
    let eliminate_sound = base.eliminate_sound.clone();
    debug!("base {} eliminated", label);

    // Sweep leftovers: remaining computer structures and abandoned
    // scenery inside the area.
    let mut leftovers: Vec<ObjectId> = world
        .query::<(&Structure, &Location)>()
        .iter()
        .filter(|(_, (s, loc))| s.player != HUMAN_PLAYER && cleanup.contains(loc.pos))
        .map(|(_, (s, _))| s.id)
        .collect();
    leftovers.extend(
        world
            .query::<(&Feature, &Location)>()
            .iter()
            .filter(|(_, (f, loc))| f.kind == FeatureKind::Building && cleanup.contains(loc.pos))
            .map(|(_, (f, _))| f.id),
    );
    for id in leftovers {
        if let Some(entity) = index.remove(&id) {
            let _ = world.despawn(entity);
        }
    }

    if let Some(sound) = eliminate_sound {
        push_notification(
            notifications,
            Notification::Sound {
                name: sound,
                pos: Some(cleanup.center()),
            },
        );
    }
    push_notification(
        notifications,
        Notification::BaseEliminated {
            label: label.to_string(),
        },
    );
}

/// What the scenario requires for a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum VictoryCondition {
    /// All artifacts recovered and all bases eliminated.
    Standard,
    ArtifactsOnly,
    BasesOnly,
}

/// Win tracker; latches after the first success.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct VictoryState {
    pub condition: Option<VictoryCondition>,
    won: bool,
}

impl VictoryState {
    pub fn is_won(&self) -> bool {
        self.won
    }
}

/// Victory poll. Emits `MissionWon` exactly once.
pub fn victory_system(
    victory: &mut VictoryState,
    artifacts: &ArtifactRegistry,
    bases: &BaseRegistry,
    notifications: &mut Vec<Notification>,
) {
    let Some(condition) = victory.condition else {
        return;
    };
    if victory.won {
        return;
    }
    let artifacts_done = artifacts.all_picked_up();
    let bases_done = bases.all_eliminated();
    let met = match condition {
        VictoryCondition::Standard => artifacts_done && bases_done,
        VictoryCondition::ArtifactsOnly => artifacts_done,
        VictoryCondition::BasesOnly => bases_done,
    };
    if met {
        victory.won = true;
        push_notification(notifications, Notification::MissionWon);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warbound_logic::geometry::Pos;

    fn spawn_structure(
        world: &mut World,
        index: &mut ObjectIndex,
        id: u32,
        player: u8,
        pos: Pos,
    ) -> ObjectId {
        let oid = ObjectId(id);
        let entity = world.spawn((
            Structure::new(oid, player, crate::components::StructureKind::Factory),
            Location::new(pos),
        ));
        index.insert(oid, entity);
        oid
    }

    fn spec(label: &str) -> BaseSpec {
        BaseSpec {
            label: label.to_string(),
            cleanup: Area::new(0, 0, 10, 10),
            detect_message: Some("Enemy base spotted".to_string()),
            detect_sound: Some("pcv379.ogg".to_string()),
            eliminate_sound: Some("pcv394.ogg".to_string()),
        }
    }

    #[test]
    fn test_detection_fires_once() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut registry = BaseRegistry::new();
        let mut notifications = Vec::new();
        spawn_structure(&mut world, &mut index, 1, 2, Pos::new(3, 3));
        set_enemy_bases(&world, &mut registry, vec![spec("north")]);

        detect_base(&mut registry, &mut notifications, "north");
        detect_base(&mut registry, &mut notifications, "north");

        assert!(registry.is_detected("north"));
        let detections = notifications
            .iter()
            .filter(|n| matches!(n, Notification::BaseDetected { .. }))
            .count();
        assert_eq!(detections, 1);
    }

    #[test]
    fn test_elimination_sweeps_leftovers() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut registry = BaseRegistry::new();
        let mut notifications = Vec::new();

        let vital = spawn_structure(&mut world, &mut index, 1, 2, Pos::new(3, 3));
        // Scenery inside the area, counted as rubble rather than vital.
        let scenery = ObjectId(50);
        let scenery_entity = world.spawn((
            Feature::new(scenery, FeatureKind::Building),
            Location::new(Pos::new(5, 5)),
        ));
        index.insert(scenery, scenery_entity);
        // Human structure inside the area must survive the sweep.
        let own = spawn_structure(&mut world, &mut index, 2, HUMAN_PLAYER, Pos::new(7, 7));

        set_enemy_bases(&world, &mut registry, vec![spec("north")]);
        assert_eq!(registry.base_for_object(vital), Some("north"));

        // The vital structure dies (host despawns it, then reports).
        let entity = index.remove(&vital).unwrap();
        world.despawn(entity).unwrap();
        note_structure_destroyed(&mut world, &mut index, &mut registry, &mut notifications, vital);

        assert!(registry.is_eliminated("north"));
        assert!(!index.contains_key(&scenery));
        assert!(index.contains_key(&own));
        assert!(notifications
            .iter()
            .any(|n| matches!(n, Notification::BaseEliminated { .. })));
    }

    #[test]
    fn test_victory_latches_once() {
        let mut victory = VictoryState {
            condition: Some(VictoryCondition::Standard),
            won: false,
        };
        let artifacts = ArtifactRegistry::new();
        let bases = BaseRegistry::new();
        let mut notifications = Vec::new();

        // Empty registries trivially satisfy both halves.
        victory_system(&mut victory, &artifacts, &bases, &mut notifications);
        victory_system(&mut victory, &artifacts, &bases, &mut notifications);

        assert!(victory.is_won());
        let wins = notifications
            .iter()
            .filter(|n| matches!(n, Notification::MissionWon))
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_standard_victory_needs_both() {
        let mut world = World::new();
        let mut index = ObjectIndex::new();
        let mut registry = BaseRegistry::new();
        let mut notifications = Vec::new();
        spawn_structure(&mut world, &mut index, 1, 2, Pos::new(3, 3));
        set_enemy_bases(&world, &mut registry, vec![spec("north")]);

        let mut victory = VictoryState {
            condition: Some(VictoryCondition::Standard),
            won: false,
        };
        let artifacts = ArtifactRegistry::new();
        victory_system(&mut victory, &artifacts, &registry, &mut notifications);
        assert!(!victory.is_won());
    }
}
