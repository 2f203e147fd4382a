//! End-to-end scenario tests driving a whole session through its public
//! API, the way a host scenario script would.

use warbound_core::prelude::*;
use warbound_core::systems::artifacts::ArtifactSource;
use warbound_core::systems::transport::TransportRequest;
use warbound_core::systems::vtol::VtolRaid;
use warbound_logic::constants::{intervals, HUMAN_PLAYER};
use warbound_logic::terrain::Terrain;

fn tank() -> UnitTemplate {
    UnitTemplate::new("Tank", "Python", Propulsion::Tracks, Turret::Cannon)
}

fn bomber() -> UnitTemplate {
    UnitTemplate::new("Bomber", "Retaliation", Propulsion::Lift, Turret::Rocket)
}

fn order_of(session: &CampaignSession, id: ObjectId) -> UnitOrder {
    let entity = session.entity(id).expect("object alive");
    *session.world.get::<&UnitOrder>(entity).unwrap()
}

#[test]
fn blocked_build_request_stalls_the_queue_behind_it() {
    let mut terrain = Terrain::open(32, 32);
    terrain.block_column(16, 0, 31);
    let mut session = CampaignSession::new(terrain, 1);

    let truck =
        session.spawn_unit(2, &UnitTemplate::rebuilt_truck("Viper"), Pos::new(2, 2));
    session.manage_trucks(2);
    // Head of queue is across the wall; the entry behind it is next door
    // but must still wait.
    session.queue_building(2, StructureKind::Defense, Pos::new(20, 20));
    session.queue_building(2, StructureKind::Factory, Pos::new(3, 3));

    session.update(intervals::TRUCKS_MS);

    assert_eq!(session.build_queue_len(2), 2);
    assert!(order_of(&session, truck).is_idle());
}

#[test]
fn at_most_one_transport_in_flight_per_player() {
    let mut session = CampaignSession::new(Terrain::open(64, 64), 1);
    let request = TransportRequest {
        units: vec![tank(); 2],
        entry: Pos::new(10, 10),
        exit: Pos::new(0, 0),
        order: None,
        message: None,
    };
    session.queue_transport(2, request.clone());
    session.queue_transport(2, request);

    session.update(100);
    assert!(session.transport_in_flight(2));
    assert_eq!(session.transports_queued(2), 1);

    // Nothing else launches while the first flight is up.
    session.update(intervals::TRANSPORT_FLIGHT_MS / 2);
    assert_eq!(session.transports_queued(2), 1);

    // After landing, the second request launches on its own.
    session.update(intervals::TRANSPORT_FLIGHT_MS);
    let landed = session
        .drain_notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::TransportLanded { player: 2, .. }))
        .count();
    assert_eq!(landed, 1);
    assert!(session.transport_in_flight(2));
    assert_eq!(session.transports_queued(2), 0);
}

#[test]
fn artifact_pickup_grants_research_exactly_once() {
    let mut session = CampaignSession::new(Terrain::open(32, 32), 1);
    session.set_artifacts(vec![(
        "cannon".to_string(),
        vec!["R-Wpn-Cannon1".to_string()],
        ArtifactSource::AtPos(Pos::new(5, 5)),
    )]);
    let unit = session.spawn_unit(HUMAN_PLAYER, &tank(), Pos::new(5, 5));
    let crate_id = session.resolve("cannon").expect("crate on the map");

    session.handle_event(GameEvent::Pickup {
        feature: crate_id,
        unit,
    });
    session.handle_event(GameEvent::Pickup {
        feature: crate_id,
        unit,
    });

    assert!(session.artifact_picked_up("cannon"));
    assert!(session.has_research(HUMAN_PLAYER, "R-Wpn-Cannon1"));
    let pickups = session
        .drain_notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::ArtifactPickedUp { .. }))
        .count();
    assert_eq!(pickups, 1);
}

#[test]
fn reissuing_an_order_replaces_the_previous_one() {
    let mut session = CampaignSession::new(Terrain::open(32, 32), 1);
    session.spawn_structure(HUMAN_PLAYER, StructureKind::Factory, Pos::new(10, 5));
    let unit = session.spawn_unit(2, &tank(), Pos::new(5, 5));
    let group = session.make_group(&[unit]);

    session.manage_group(
        group,
        GroupOrder::Patrol(PatrolOrder::new(vec![Pos::new(1, 1), Pos::new(30, 30)])),
    );
    session.manage_group(group, GroupOrder::Attack(AttackOrder::new()));

    session.update(intervals::TACTICS_MS);

    assert!(matches!(
        session.group_order(group),
        Some(GroupOrder::Attack(_))
    ));
    // No residue of the patrol: the unit is engaging, not walking the
    // old waypoint line.
    assert!(matches!(
        order_of(&session, unit),
        UnitOrder::Attack { .. } | UnitOrder::Move { .. }
    ));
    assert_ne!(order_of(&session, unit), UnitOrder::Move { to: Pos::new(1, 1) });
}

#[test]
fn permanent_attack_group_reengages_after_target_dies() {
    let mut session = CampaignSession::new(Terrain::open(64, 64), 1);
    let near = session.spawn_structure(HUMAN_PLAYER, StructureKind::Defense, Pos::new(8, 5));
    let far = session.spawn_structure(HUMAN_PLAYER, StructureKind::Factory, Pos::new(30, 30));
    let unit = session.spawn_unit(2, &tank(), Pos::new(5, 5));
    let group = session.make_group(&[unit]);
    session.manage_group(group, GroupOrder::Attack(AttackOrder::new().permanent()));

    session.update(intervals::TACTICS_MS);
    assert_eq!(order_of(&session, unit), UnitOrder::Attack { target: near });

    session.handle_event(GameEvent::ObjectDestroyed { object: near });
    session.update(intervals::TACTICS_MS);
    session.update(intervals::TACTICS_MS);

    // The group never disbands; it picks the next target on its own.
    match order_of(&session, unit) {
        UnitOrder::Move { to } => assert_eq!(to, Pos::new(30, 30)),
        UnitOrder::Attack { target } => assert_eq!(target, far),
        other => panic!("expected re-engagement, got {:?}", other),
    }
}

#[test]
fn vtol_stop_object_ends_spawning_but_not_recall() {
    let mut session = CampaignSession::new(Terrain::open(64, 64), 1);
    let stop = session.spawn_structure(2, StructureKind::Headquarters, Pos::new(40, 40));
    session.label_object(stop, "raid-hq");

    let raid = VtolRaid::new(
        vec![VtolRotationEntry::new(bomber())],
        Pos::new(0, 0),
        Pos::new(60, 0),
    )
    .with_wave_limit(2)
    .with_stop_label("raid-hq");
    session.setup_vtol_raid(2, raid, Some(10_000));

    session.update(10_000);
    let vtols = |session: &CampaignSession| {
        session
            .world
            .query::<&Unit>()
            .iter()
            .filter(|(_, u)| u.player == 2 && u.is_vtol())
            .count()
    };
    assert_eq!(vtols(&session), 2);

    session.handle_event(GameEvent::ObjectDestroyed { object: stop });
    session.update(5_000);
    assert!(!session.vtol_raid_active(2));

    // Spawn timer dismantled: a full extra cadence passes with no wave.
    session.update(10_000);
    assert_eq!(vtols(&session), 2);

    // Recall still runs for the survivors.
    let spent = session
        .world
        .query::<&Unit>()
        .iter()
        .find(|(_, u)| u.player == 2 && u.is_vtol())
        .map(|(_, u)| u.id)
        .unwrap();
    let entity = session.entity(spent).unwrap();
    session.world.get::<&mut Ammo>(entity).unwrap().percent = 0;
    session.update(intervals::VTOL_RECALL_MS);
    assert!(matches!(order_of(&session, spent), UnitOrder::Leave { .. }));
}

#[test]
fn broken_group_falls_back_to_its_fallback_position() {
    let mut session = CampaignSession::new(Terrain::open(64, 64), 1);
    let fallback = Pos::new(5, 5);
    let mut members = Vec::new();
    for i in 0..10 {
        members.push(session.spawn_unit(2, &tank(), Pos::new(20 + i, 20)));
    }
    let group = session.make_group(&members);
    session.manage_group(
        group,
        GroupOrder::Attack(
            AttackOrder::new()
                .at(Pos::new(40, 40))
                .with_fallback(fallback, 50),
        ),
    );

    // Half the group dies; morale 50 on a group of 10 breaks at 5.
    for &id in members.iter().take(5) {
        session.handle_event(GameEvent::ObjectDestroyed { object: id });
    }

    assert!(matches!(
        session.group_order(group),
        Some(GroupOrder::Defend(d)) if d.pos == fallback
    ));

    session.update(intervals::TACTICS_MS);
    // Survivors are pulled toward the fallback position.
    let survivor = members[7];
    assert_eq!(
        order_of(&session, survivor),
        UnitOrder::Move { to: fallback }
    );
}

#[test]
fn standard_victory_requires_artifacts_and_bases() {
    let mut session = CampaignSession::new(Terrain::open(32, 32), 1);
    let bunker = session.spawn_structure(2, StructureKind::Defense, Pos::new(5, 5));
    session.set_enemy_bases(vec![warbound_core::systems::bases::BaseSpec {
        label: "outpost".to_string(),
        cleanup: Area::new(0, 0, 10, 10),
        detect_message: None,
        detect_sound: None,
        eliminate_sound: None,
    }]);
    session.set_artifacts(vec![(
        "mg".to_string(),
        vec!["R-Wpn-MG1Mk1".to_string()],
        ArtifactSource::AtPos(Pos::new(2, 2)),
    )]);
    session.set_victory_condition(warbound_core::systems::bases::VictoryCondition::Standard);

    session.update(intervals::VICTORY_MS);
    assert!(!session.is_won());

    let picker = session.spawn_unit(HUMAN_PLAYER, &tank(), Pos::new(2, 2));
    let crate_id = session.resolve("mg").unwrap();
    session.handle_event(GameEvent::Pickup {
        feature: crate_id,
        unit: picker,
    });
    session.update(intervals::VICTORY_MS);
    assert!(!session.is_won());

    session.handle_event(GameEvent::ObjectDestroyed { object: bunker });
    assert!(session.base_eliminated("outpost"));
    session.update(intervals::VICTORY_MS);
    assert!(session.is_won());

    let wins = session
        .drain_notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::MissionWon))
        .count();
    assert_eq!(wins, 1);
}
