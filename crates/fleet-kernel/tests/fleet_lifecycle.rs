//! End-to-end fleet scenarios: bootstrap seeding, gated runtime access and
//! concurrent writers, all against one shared registry.

use std::sync::Arc;
use std::thread;

use fleet_kernel::{CapabilityGate, FleetService, ResolvedSession};
use fleet_registry::{FleetRegistry, SeedOutcome, Seeder, SqliteRobotStore};
use fleet_types::{BatteryUpdate, Capability, FleetError, Pose, RobotInit, RobotStatus};

/// The service plus the host's own handle on the registry, used for seeding.
fn bootstrap() -> (FleetService, Arc<FleetRegistry>) {
    let registry = Arc::new(FleetRegistry::new(Box::new(
        SqliteRobotStore::open_in_memory().expect("in-memory store"),
    )));
    let service = FleetService::new(Arc::clone(&registry), CapabilityGate::with_default_roles());
    (service, registry)
}

fn tensrai1() -> RobotInit {
    RobotInit::new("Tensrai1", RobotStatus::Mission, Pose::new(10.0, 10.0, 0.0), 100.0)
}

#[test]
fn seeded_robot_walks_through_status_machine() {
    let (service, registry) = bootstrap();
    let report = Seeder::new(&registry).seed_all(&[tensrai1()]);
    assert_eq!(report.entries[0].outcome, SeedOutcome::Created);

    let operator = ResolvedSession::authenticated("ops", ["operator"]);

    let idle = service
        .update_status(&operator, "Tensrai1", RobotStatus::Idle)
        .expect("MISSION -> IDLE");
    assert_eq!(idle.status, RobotStatus::Idle);
    assert!(idle.updated_at > idle.created_at);

    let err = service
        .update_status(&operator, "Tensrai1", RobotStatus::Error)
        .unwrap_err();
    assert_eq!(
        err,
        FleetError::IllegalTransition {
            from: RobotStatus::Idle,
            to: RobotStatus::Error
        }
    );

    let robot = service.find_by_name(&operator, "Tensrai1").unwrap().unwrap();
    assert_eq!(robot.status, RobotStatus::Idle);
    assert_eq!(robot.updated_at, idle.updated_at);
}

#[test]
fn reseeding_reports_existing_and_keeps_first_values() {
    let (service, registry) = bootstrap();
    let seeder = Seeder::new(&registry);

    let first = seeder.seed_all(&[tensrai1()]);
    let mut again = tensrai1();
    again.battery = 20.0;
    again.status = RobotStatus::Charging;
    let second = seeder.seed_all(&[again]);

    assert_eq!(first.created(), 1);
    assert_eq!(second.already_existing(), 1);

    let admin = ResolvedSession::authenticated("root", ["admin"]);
    let robot = service.find_by_name(&admin, "Tensrai1").unwrap().unwrap();
    assert_eq!(robot.status, RobotStatus::Mission);
    assert_eq!(robot.battery, 100.0);
}

#[test]
fn viewer_reads_but_cannot_write() {
    let (service, registry) = bootstrap();
    Seeder::new(&registry).seed_all(&[tensrai1()]);
    let viewer = ResolvedSession::authenticated("watcher", ["viewer"]);

    assert_eq!(
        service.update_status(&viewer, "Tensrai1", RobotStatus::Idle),
        Err(FleetError::InsufficientRole(Capability::FleetWrite))
    );
    let robot = service.find_by_name(&viewer, "Tensrai1").unwrap().unwrap();
    assert_eq!(robot.status, RobotStatus::Mission);
    assert_eq!(service.list(&viewer).unwrap().len(), 1);
}

#[test]
fn battery_bounds_through_service() {
    let (service, registry) = bootstrap();
    Seeder::new(&registry).seed_all(&[tensrai1()]);
    let operator = ResolvedSession::authenticated("ops", ["operator"]);

    for bad in [150.0, -5.0] {
        let err = service
            .update_battery(&operator, "Tensrai1", BatteryUpdate::Absolute(bad))
            .unwrap_err();
        assert!(matches!(err, FleetError::OutOfRange { .. }));
    }
    let robot = service.find_by_name(&operator, "Tensrai1").unwrap().unwrap();
    assert_eq!(robot.battery, 100.0);

    for good in [0.0, 100.0] {
        let robot = service
            .update_battery(&operator, "Tensrai1", BatteryUpdate::Absolute(good))
            .unwrap();
        assert_eq!(robot.battery, good);
    }
}

#[test]
fn concurrent_battery_drain_loses_nothing() {
    let service = Arc::new(bootstrap().0);
    let operator = ResolvedSession::authenticated("ops", ["operator"]);
    service
        .create(
            &operator,
            RobotInit::new("Tensrai1", RobotStatus::Mission, Pose::default(), 50.0),
        )
        .unwrap();

    let n = 50;
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let service = Arc::clone(&service);
            let session = operator.clone();
            thread::spawn(move || {
                service
                    .update_battery(&session, "Tensrai1", BatteryUpdate::Delta(-1.0))
                    .expect("delta within range")
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    let robot = service.find_by_name(&operator, "Tensrai1").unwrap().unwrap();
    assert_eq!(robot.battery, 50.0 - n as f64);
}

#[test]
fn writers_on_distinct_robots_proceed_independently() {
    let service = Arc::new(bootstrap().0);
    let operator = ResolvedSession::authenticated("ops", ["operator"]);
    let names: Vec<String> = (0..8).map(|i| format!("unit-{i}")).collect();
    for name in &names {
        service
            .create(&operator, RobotInit::new(name.clone(), RobotStatus::Idle, Pose::default(), 100.0))
            .unwrap();
    }

    thread::scope(|s| {
        for name in &names {
            let service = &service;
            let operator = &operator;
            s.spawn(move || {
                for step in 0..10 {
                    service
                        .update_pose(operator, name, Pose::new(step as f64, 0.0, 0.0))
                        .unwrap();
                    service
                        .update_battery(operator, name, BatteryUpdate::Delta(-1.0))
                        .unwrap();
                }
            });
        }
    });

    for robot in service.list(&operator).unwrap() {
        assert_eq!(robot.battery, 90.0);
        assert_eq!(robot.pose.x, 9.0);
    }
}

#[test]
fn create_uniqueness_across_many_attempts() {
    let (service, _) = bootstrap();
    let operator = ResolvedSession::authenticated("ops", ["operator"]);
    let mut successes = 0;
    for attempt in 0..5 {
        match service.create(
            &operator,
            RobotInit::new("solo", RobotStatus::Idle, Pose::default(), attempt as f64),
        ) {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, FleetError::DuplicateKey("solo".into())),
        }
    }
    assert_eq!(successes, 1);
}
