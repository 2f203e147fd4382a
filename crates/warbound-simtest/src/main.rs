//! Warbound Headless Campaign Harness
//!
//! Drives complete campaign sessions against the real engine — no host,
//! no rendering, no toolchain beyond this binary.
//!
//! Usage:
//!   cargo run -p warbound-simtest
//!   cargo run -p warbound-simtest -- --verbose

use serde::Deserialize;

use warbound_core::prelude::*;
use warbound_core::persistence::SaveData;
use warbound_core::systems::artifacts::ArtifactSource;
use warbound_core::systems::bases::{BaseSpec, VictoryCondition};
use warbound_core::systems::transport::TransportRequest;
use warbound_core::systems::vtol::VtolRaid;
use warbound_logic::constants::{intervals, HUMAN_PLAYER};
use warbound_logic::terrain::Terrain;

// ── Template manifest (shared campaign unit roster) ─────────────────────
const MANIFEST_JSON: &str = include_str!("../../../data/templates.json");

#[derive(Debug, Deserialize)]
struct TemplateManifest {
    ground: Vec<UnitTemplate>,
    vtol: Vec<VtolRotationEntry>,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    env_logger::init();
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Warbound Campaign Harness ===\n");

    let mut results = Vec::new();

    // 1. Template manifest validation
    let manifest = match serde_json::from_str::<TemplateManifest>(MANIFEST_JSON) {
        Ok(m) => m,
        Err(e) => {
            println!("manifest parse error: {}", e);
            std::process::exit(1);
        }
    };
    results.extend(validate_manifest(&manifest, verbose));

    // 2. Full ground assault scenario
    results.extend(run_assault_scenario(&manifest, verbose));

    // 3. Reinforcement and logistics scenario
    results.extend(run_logistics_scenario(&manifest, verbose));

    // 4. VTOL raid scenario
    results.extend(run_raid_scenario(&manifest, verbose));

    // 5. Save/load mid-scenario
    results.extend(run_persistence_check(&manifest, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Template Manifest ────────────────────────────────────────────────

fn validate_manifest(manifest: &TemplateManifest, verbose: bool) -> Vec<TestResult> {
    println!("--- Template Manifest ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "manifest_not_empty".into(),
        passed: !manifest.ground.is_empty() && !manifest.vtol.is_empty(),
        detail: format!(
            "{} ground templates, {} VTOL rotation entries",
            manifest.ground.len(),
            manifest.vtol.len()
        ),
    });

    // Unique names across the whole roster
    let mut names: Vec<&str> = manifest
        .ground
        .iter()
        .map(|t| t.name.as_str())
        .chain(manifest.vtol.iter().map(|v| v.template.name.as_str()))
        .collect();
    let total = names.len();
    names.sort();
    names.dedup();
    results.push(TestResult {
        name: "manifest_unique_names".into(),
        passed: names.len() == total,
        detail: format!("{} distinct names", names.len()),
    });

    // Ground templates must not fly; raid templates must
    let grounded = manifest.ground.iter().all(|t| !t.is_vtol());
    let airborne = manifest.vtol.iter().all(|v| v.template.is_vtol());
    results.push(TestResult {
        name: "manifest_propulsion_classes".into(),
        passed: grounded && airborne,
        detail: format!("ground all grounded: {}, raid all lift: {}", grounded, airborne),
    });

    // At least one builder for truck reconstruction to make sense
    let builders = manifest
        .ground
        .iter()
        .filter(|t| t.turret.is_builder())
        .count();
    results.push(TestResult {
        name: "manifest_has_builder".into(),
        passed: builders >= 1,
        detail: format!("{} construction templates", builders),
    });

    if verbose {
        println!("  Ground roster:");
        for t in &manifest.ground {
            println!("    {:20} {:?}/{:?}", t.name, t.propulsion, t.turret);
        }
    }

    results
}

// ── 2. Ground Assault ───────────────────────────────────────────────────

fn run_assault_scenario(manifest: &TemplateManifest, verbose: bool) -> Vec<TestResult> {
    println!("--- Ground Assault ---");
    let mut results = Vec::new();

    let mut session = CampaignSession::new(Terrain::open(64, 64), 1234);

    // Human outpost guarded by one bunker, with an artifact inside.
    session.spawn_structure(HUMAN_PLAYER, StructureKind::Headquarters, Pos::new(10, 10));
    let bunker = session.spawn_structure(2, StructureKind::Defense, Pos::new(50, 50));
    session.set_enemy_bases(vec![BaseSpec {
        label: "east-fort".into(),
        cleanup: Area::new(45, 45, 55, 55),
        detect_message: Some("Fortress located".into()),
        detect_sound: None,
        eliminate_sound: None,
    }]);
    session.set_artifacts(vec![(
        "fort-plans".into(),
        vec!["R-Wpn-Cannon1".into()],
        ArtifactSource::OnObject(bunker),
    )]);
    session.set_victory_condition(VictoryCondition::Standard);

    // A computer strike group marches on the human base.
    let tank = &manifest.ground[2];
    let mut members = Vec::new();
    for i in 0..4 {
        members.push(session.spawn_unit(2, tank, Pos::new(40 + i, 40)));
    }
    let group = session.make_group(&members);
    session.manage_group(
        group,
        GroupOrder::Attack(AttackOrder::new().at(Pos::new(10, 10)).permanent()),
    );

    for _ in 0..30 {
        session.update(intervals::TACTICS_MS);
    }

    // The group closed most of the distance toward the human base.
    let lead = session.object_position(members[0]).unwrap_or(Pos::new(0, 0));
    let closed_in = lead.dist(Pos::new(10, 10)) < 30.0;
    results.push(TestResult {
        name: "assault_group_advances".into(),
        passed: closed_in,
        detail: format!("lead unit at {:?} after 30s", lead),
    });

    // Killing the bunker drops the artifact and fells the base.
    session.handle_event(GameEvent::ObjectDestroyed { object: bunker });
    let dropped = session.resolve("fort-plans").is_some();
    results.push(TestResult {
        name: "assault_artifact_drops".into(),
        passed: dropped && session.base_eliminated("east-fort"),
        detail: format!(
            "artifact on map: {}, base eliminated: {}",
            dropped,
            session.base_eliminated("east-fort")
        ),
    });

    // Recover it and win.
    let scout = session.spawn_unit(HUMAN_PLAYER, &manifest.ground[0], Pos::new(50, 50));
    if let Some(crate_id) = session.resolve("fort-plans") {
        session.handle_event(GameEvent::Pickup {
            feature: crate_id,
            unit: scout,
        });
    }
    session.update(intervals::VICTORY_MS);
    results.push(TestResult {
        name: "assault_standard_victory".into(),
        passed: session.is_won(),
        detail: format!("mission won: {}", session.is_won()),
    });

    if verbose {
        for note in session.drain_notifications() {
            println!("    note: {:?}", note);
        }
    }

    results
}

// ── 3. Reinforcements & Logistics ───────────────────────────────────────

fn run_logistics_scenario(manifest: &TemplateManifest, verbose: bool) -> Vec<TestResult> {
    println!("--- Reinforcements & Logistics ---");
    let mut results = Vec::new();

    let mut session = CampaignSession::new(Terrain::open(64, 64), 77);

    // Truck economy: one engineer, an oil patch, a queued defense line.
    let engineer = manifest
        .ground
        .iter()
        .find(|t| t.turret.is_builder())
        .expect("manifest has a builder");
    session.spawn_unit(2, engineer, Pos::new(5, 5));
    session.spawn_feature(FeatureKind::OilResource, Pos::new(8, 5));
    session.manage_trucks(2);
    session.queue_building(2, StructureKind::Defense, Pos::new(6, 6));

    for _ in 0..20 {
        session.update(intervals::TRUCKS_MS);
    }
    let defenses = session
        .world
        .query::<&Structure>()
        .iter()
        .filter(|(_, s)| s.player == 2)
        .count();
    results.push(TestResult {
        name: "logistics_truck_builds".into(),
        passed: defenses >= 1 && session.build_queue_len(2) == 0,
        detail: format!("{} structures raised, queue drained", defenses),
    });

    // Transport chain: two waves, strictly one in the air.
    let cargo = TransportRequest {
        units: vec![manifest.ground[2].clone(); 3],
        entry: Pos::new(30, 30),
        exit: Pos::new(0, 0),
        order: Some(GroupOrder::Defend(DefendOrder::new(Pos::new(30, 30)))),
        message: Some("Reinforcements inbound".into()),
    };
    session.queue_transport(3, cargo.clone());
    session.queue_transport(3, cargo);

    session.update(100);
    let single_flight = session.transport_in_flight(3) && session.transports_queued(3) == 1;
    results.push(TestResult {
        name: "logistics_single_flight".into(),
        passed: single_flight,
        detail: "second request held while first is airborne".into(),
    });

    for _ in 0..30 {
        session.update(intervals::TRANSPORT_FLIGHT_MS / 10);
    }
    let delivered = session
        .world
        .query::<&Unit>()
        .iter()
        .filter(|(_, u)| u.player == 3 && !u.is_vtol())
        .count();
    results.push(TestResult {
        name: "logistics_both_waves_land".into(),
        passed: delivered == 6 && session.transports_queued(3) == 0,
        detail: format!("{} units delivered over two waves", delivered),
    });

    if verbose {
        println!("    final sim time: {}ms", session.time_ms());
    }

    results
}

// ── 4. VTOL Raids ───────────────────────────────────────────────────────

fn run_raid_scenario(manifest: &TemplateManifest, verbose: bool) -> Vec<TestResult> {
    println!("--- VTOL Raids ---");
    let mut results = Vec::new();

    let mut session = CampaignSession::new(Terrain::open(64, 64), 9);
    session.spawn_structure(HUMAN_PLAYER, StructureKind::Headquarters, Pos::new(32, 32));
    let hq = session.spawn_structure(2, StructureKind::Headquarters, Pos::new(60, 60));
    session.label_object(hq, "raid-control");

    let raid = VtolRaid::new(manifest.vtol.clone(), Pos::new(0, 63), Pos::new(63, 0))
        .with_targets(vec![Pos::new(32, 32)])
        .with_stop_label("raid-control");
    session.setup_vtol_raid(2, raid, Some(10_000));

    for _ in 0..2 {
        session.update(10_000);
    }
    let vtols = |session: &CampaignSession| {
        session
            .world
            .query::<&Unit>()
            .iter()
            .filter(|(_, u)| u.player == 2 && u.is_vtol())
            .count()
    };
    let airborne = vtols(&session);
    results.push(TestResult {
        name: "raid_waves_spawn".into(),
        passed: airborne >= 5,
        detail: format!("{} VTOLs airborne after two cadences", airborne),
    });

    // Capped template never exceeds its cap.
    let capped = manifest.vtol.iter().find(|v| v.cap.is_some()).unwrap();
    let cap = capped.cap.unwrap() as usize;
    let capped_alive = session
        .world
        .query::<&Unit>()
        .iter()
        .filter(|(_, u)| u.player == 2 && u.template == capped.template.name)
        .count();
    results.push(TestResult {
        name: "raid_cap_respected".into(),
        passed: capped_alive <= cap,
        detail: format!("{} of capped template alive (cap {})", capped_alive, cap),
    });

    // Killing the control structure stops the waves: the stop poll fires
    // before the next spawn cadence comes due.
    session.handle_event(GameEvent::ObjectDestroyed { object: hq });
    session.update(5_000);
    let halted = !session.vtol_raid_active(2);
    session.update(10_000);
    let after = vtols(&session);
    results.push(TestResult {
        name: "raid_stop_object_halts_spawning".into(),
        passed: halted && after == airborne,
        detail: format!("{} VTOLs after stop ({} before)", after, airborne),
    });

    if verbose {
        println!("    raid active: {}", session.vtol_raid_active(2));
    }

    results
}

// ── 5. Persistence ──────────────────────────────────────────────────────

fn run_persistence_check(manifest: &TemplateManifest, _verbose: bool) -> Vec<TestResult> {
    println!("--- Persistence ---");
    let mut results = Vec::new();

    let mut session = CampaignSession::new(Terrain::open(32, 32), 5);
    session.spawn_structure(HUMAN_PLAYER, StructureKind::Factory, Pos::new(5, 5));
    let tank = session.spawn_unit(2, &manifest.ground[2], Pos::new(20, 20));
    let group = session.make_group(&[tank]);
    session.manage_group(group, GroupOrder::Attack(AttackOrder::new().permanent()));
    for _ in 0..5 {
        session.update(intervals::TACTICS_MS);
    }

    let snapshot = match SaveData::capture(&session).to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            results.push(TestResult {
                name: "persistence_capture".into(),
                passed: false,
                detail: format!("capture failed: {}", e),
            });
            return results;
        }
    };
    let mut restored = match SaveData::from_bytes(&snapshot).and_then(SaveData::restore) {
        Ok(s) => s,
        Err(e) => {
            results.push(TestResult {
                name: "persistence_restore".into(),
                passed: false,
                detail: format!("restore failed: {}", e),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "persistence_roundtrip".into(),
        passed: restored.time_ms() == session.time_ms()
            && restored.world.len() == session.world.len()
            && restored.group_members(group) == session.group_members(group),
        detail: format!(
            "t={}ms, {} entities, group intact",
            restored.time_ms(),
            restored.world.len()
        ),
    });

    // The restored session keeps running, and the permanent group keeps
    // hunting.
    for _ in 0..20 {
        restored.update(intervals::TACTICS_MS);
    }
    let pos = restored.object_position(tank);
    let advanced = pos.map(|p| p.dist(Pos::new(5, 5)) < 16.0).unwrap_or(false);
    results.push(TestResult {
        name: "persistence_resumes_live".into(),
        passed: advanced,
        detail: format!("tank at {:?} after resume", pos),
    });

    results
}
