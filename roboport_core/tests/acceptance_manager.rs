//! Acceptance tests for the Component Manager
//! Tests instance management, wiring by name, teardown, bootstrap and
//! cross-manager connections

mod common;

use common::{navigator_factory, probe_factory, range_sensor_factory, Counters};
use parking_lot::Mutex;
use roboport_core::manager::{
    ComponentFactory, ComponentModule, DaemonHealth, LoopbackBinding, Manager, ManagerConfig,
    ModuleManifest,
};
use roboport_core::roboport_types::{RangeData, Schema, Time};
use roboport_core::scheduling::TickPolicy;
use roboport_core::{
    ComponentConfig, ConnectionPolicy, DeploymentConfig, LifecycleState, RoboportError,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn robot() -> (Manager, Arc<Mutex<Vec<RangeData>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::new(ManagerConfig::default());
    manager
        .register_factory("RangeSensor", range_sensor_factory())
        .unwrap();
    manager
        .register_factory("Navigator", navigator_factory(seen.clone()))
        .unwrap();
    (manager, seen)
}

#[test]
fn test_scenario_1_scanner_to_nav() {
    // Scenario 1: Range data from scanner to nav
    // Given: "scanner" (RangeSensor) connected to "nav" (Navigator) on RangeData
    // When: "scanner" is activated and one scan [1.0, 2.0, 3.0] is written
    // Then: "nav" reads the same ranges, stamped inside the write's window

    let (manager, _) = robot();
    let scanner = manager
        .create_instance("RangeSensor", "scanner", ComponentConfig::new())
        .unwrap();
    let nav = manager
        .create_instance("Navigator", "nav", ComponentConfig::new())
        .unwrap();
    assert_eq!(scanner.state(), LifecycleState::Loaded);

    manager
        .connect("scanner.range", "nav.scan", ConnectionPolicy::default())
        .unwrap();
    scanner.bring_up().unwrap();
    nav.bring_up().unwrap();
    assert_eq!(manager.activate("scanner").unwrap(), LifecycleState::Active);

    let before = Time::now();
    manager
        .port("scanner.range")
        .unwrap()
        .write(RangeData::new(vec![1.0, 2.0, 3.0]).into())
        .unwrap();
    let after = Time::now();

    let record = manager.port("nav.scan").unwrap().read(None).unwrap().unwrap();
    let scan = RangeData::from_record(record).unwrap();
    assert_eq!(scan.ranges, vec![1.0, 2.0, 3.0]);
    assert!(scan.tm >= before && scan.tm <= after);
}

#[test]
fn test_scenario_2_destroy_active_instance() {
    // Scenario 2: Destroying an ACTIVE instance
    // Given: An ACTIVE instance attached to a running context
    // When: It is destroyed
    // Then: Destroy succeeds, lookup returns NotFound and its callbacks ran once

    let counters = Arc::new(Counters::default());
    let manager = Manager::new(ManagerConfig::default());
    manager
        .register_factory("Probe", probe_factory(counters.clone()))
        .unwrap();
    manager
        .create_context("fast", TickPolicy::from_rate(100.0).unwrap())
        .unwrap();

    let probe = manager
        .create_instance("Probe", "probe", ComponentConfig::new())
        .unwrap();
    probe.bring_up().unwrap();
    manager.attach("fast", "probe").unwrap();
    manager.activate("probe").unwrap();

    manager.destroy_instance("probe").unwrap();

    assert!(matches!(
        manager.lookup("probe"),
        Err(RoboportError::NotFound(_))
    ));
    assert_eq!(probe.state(), LifecycleState::Exiting);
    assert_eq!(probe.attached_context(), None);
    assert!(manager.context("fast").unwrap().participants().is_empty());
    assert_eq!(Counters::get(&counters.deactivate), 1);
    assert_eq!(Counters::get(&counters.finalize), 1);

    // the name is free again
    manager
        .create_instance("Probe", "probe", ComponentConfig::new())
        .unwrap();
}

#[test]
fn test_scenario_3_unknown_names() {
    // Scenario 3: Registry errors
    // Given: A manager with one registered type
    // When: Unknown types and instances are used
    // Then: UnknownType, UnknownInstance and NotFound are reported

    let (manager, _) = robot();
    assert!(matches!(
        manager.create_instance("Lidar", "l", ComponentConfig::new()),
        Err(RoboportError::UnknownType(t)) if t == "Lidar"
    ));
    assert!(matches!(
        manager.destroy_instance("ghost"),
        Err(RoboportError::UnknownInstance(n)) if n == "ghost"
    ));
    assert!(matches!(
        manager.activate("ghost"),
        Err(RoboportError::UnknownInstance(_))
    ));
    assert!(matches!(
        manager.lookup("ghost"),
        Err(RoboportError::NotFound(_))
    ));
    assert_eq!(manager.factory_types(), vec!["Navigator", "RangeSensor"]);
}

#[test]
fn test_scenario_4_shutdown_finalizes_every_instance_once() {
    // Scenario 4: Shutdown with instances in mixed states
    // Given: Instances in LOADED, ACTIVE (ticking) and ERROR
    // When: The manager shuts down, twice
    // Then: on_finalize ran exactly once per instance and health is ShutDown

    let loaded = Arc::new(Counters::default());
    let active = Arc::new(Counters::default());
    let faulted = Arc::new(Counters::default());
    let manager = Manager::new(ManagerConfig::default());
    manager.register_factory("Loaded", probe_factory(loaded.clone())).unwrap();
    manager.register_factory("Active", probe_factory(active.clone())).unwrap();
    manager.register_factory("Faulted", probe_factory(faulted.clone())).unwrap();
    manager
        .create_context("fast", TickPolicy::from_rate(200.0).unwrap())
        .unwrap();

    manager
        .create_instance("Loaded", "a", ComponentConfig::new())
        .unwrap();
    let b = manager
        .create_instance("Active", "b", ComponentConfig::new())
        .unwrap();
    b.bring_up().unwrap();
    manager.attach("fast", "b").unwrap();
    b.activate().unwrap();
    let c = manager
        .create_instance("Faulted", "c", ComponentConfig::new())
        .unwrap();
    faulted
        .fail_activate
        .store(true, std::sync::atomic::Ordering::SeqCst);
    c.bring_up().unwrap();
    let _ = c.activate();
    assert_eq!(c.state(), LifecycleState::Error);

    thread::sleep(Duration::from_millis(20));
    manager.shutdown();
    manager.shutdown();

    assert_eq!(manager.health(), DaemonHealth::ShutDown);
    assert!(manager.instance_names().is_empty());
    for counters in [&loaded, &active, &faulted] {
        assert_eq!(Counters::get(&counters.finalize), 1);
    }
    assert_eq!(Counters::get(&active.deactivate), 1);
}

#[test]
fn test_scenario_5_bootstrap_from_deployment_file() {
    // Scenario 5: Bootstrap from YAML
    // Given: A deployment file wiring scanner to nav on a 100 Hz context
    // When: The manager bootstraps from it
    // Then: Both instances are ACTIVE and nav receives the configured scans

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rover.yaml");
    std::fs::write(
        &path,
        r#"
manager:
  host_name: rover
contexts:
  - name: fast
    rate_hz: 100.0
instances:
  - type: RangeSensor
    name: scanner
    context: fast
    activate: true
    properties:
      ranges: [4.0, 5.0]
  - type: Navigator
    name: nav
    context: fast
    activate: true
connections:
  - from: scanner.range
    to: nav.scan
    policy:
      buffer_capacity: 16
"#,
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let config = DeploymentConfig::load(&path).unwrap();
    let factories: Vec<(String, Arc<dyn ComponentFactory>)> = vec![
        ("RangeSensor".into(), range_sensor_factory()),
        ("Navigator".into(), navigator_factory(seen.clone())),
    ];
    let manager = Manager::bootstrap(&config, factories).unwrap();

    assert_eq!(manager.health(), DaemonHealth::Running);
    assert_eq!(manager.instance_names(), vec!["scanner", "nav"]);
    assert_eq!(
        manager.lookup("nav").unwrap().state(),
        LifecycleState::Active
    );
    assert_eq!(
        manager.naming().resolve("nav").unwrap().path,
        "rover.host_cxt/nav.rtc"
    );

    let deadline = Instant::now() + Duration::from_secs(2);
    while seen.lock().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    manager.shutdown();

    let seen = seen.lock();
    assert!(!seen.is_empty(), "nav never received a scan");
    assert_eq!(seen[0].ranges, vec![4.0, 5.0]);
}

#[test]
fn test_scenario_6_bootstrap_failure_never_serves() {
    // Scenario 6: Fatal bootstrap errors
    // Given: A factory list registering the same type twice
    // When: The manager bootstraps
    // Then: DuplicateType is returned and no manager is handed out

    let counters = Arc::new(Counters::default());
    let factories: Vec<(String, Arc<dyn ComponentFactory>)> = vec![
        ("Probe".into(), probe_factory(counters.clone())),
        ("Probe".into(), probe_factory(counters.clone())),
    ];
    let err = Manager::bootstrap(&DeploymentConfig::default(), factories).unwrap_err();
    assert!(matches!(err, RoboportError::DuplicateType(t) if t == "Probe"));

    // Given: A deployment whose second instance has an unknown type
    // When: The manager bootstraps
    // Then: UnknownType is returned and the first instance was torn down
    let config = DeploymentConfig::from_yaml(
        r#"
instances:
  - type: Probe
    name: first
  - type: Missing
    name: second
"#,
    )
    .unwrap();
    let factories: Vec<(String, Arc<dyn ComponentFactory>)> =
        vec![("Probe".into(), probe_factory(counters.clone()))];
    assert!(matches!(
        Manager::bootstrap(&config, factories),
        Err(RoboportError::UnknownType(_))
    ));
    assert_eq!(Counters::get(&counters.configure), 1);
    assert_eq!(Counters::get(&counters.finalize), 1);
}

#[test]
fn test_scenario_7_connection_across_managers() {
    // Scenario 7: Remote connection over a loopback binding
    // Given: "scanner" hosted by alpha and "nav" hosted by beta
    // When: alpha connects scanner.range to beta's nav.scan and writes
    // Then: nav reads the record in beta; disconnecting clears both sides

    let (alpha, _) = robot();
    let (beta, _) = robot();
    alpha
        .create_instance("RangeSensor", "scanner", ComponentConfig::new())
        .unwrap();
    beta.create_instance("Navigator", "nav", ComponentConfig::new())
        .unwrap();
    let beta = Arc::new(beta);

    let id = alpha
        .connect_remote(
            "scanner.range",
            Arc::new(LoopbackBinding::new(&beta)),
            "nav.scan",
            ConnectionPolicy::default(),
        )
        .unwrap();
    assert!(alpha.connection(id).unwrap().is_remote());
    assert_eq!(beta.connections().len(), 1);
    assert_eq!(
        beta.connections()[0].outport_name(),
        "localhost/scanner.range"
    );

    alpha
        .port("scanner.range")
        .unwrap()
        .write(RangeData::new(vec![9.5]).into())
        .unwrap();
    let record = beta.port("nav.scan").unwrap().read(None).unwrap().unwrap();
    assert_eq!(RangeData::from_record(record).unwrap().ranges, vec![9.5]);

    alpha.disconnect(id);
    assert!(beta.connections().is_empty());
    assert!(beta.port("nav.scan").unwrap().connections().is_empty());
}

#[test]
fn test_scenario_8_remote_schema_mismatch() {
    // Scenario 8: Remote wiring checks
    // Given: A peer whose nav.scan takes RangeData
    // When: A TimedDouble source connects to it remotely
    // Then: The peer's SchemaMismatch comes back as a remote error

    let alpha = Manager::new(ManagerConfig::default());
    alpha
        .register_factory(
            "Speed",
            roboport_core::manager::factory_fn(|ports: &mut roboport_core::PortSet| {
                ports.add_outport::<roboport_core::roboport_types::TimedDouble>("speed")?;
                Ok(Box::new(common::Probe::new(Arc::new(Counters::default()))))
            }),
        )
        .unwrap();
    alpha
        .create_instance("Speed", "odo", ComponentConfig::new())
        .unwrap();
    let (beta, _) = robot();
    beta.create_instance("Navigator", "nav", ComponentConfig::new())
        .unwrap();
    let beta = Arc::new(beta);

    let err = alpha
        .connect_remote(
            "odo.speed",
            Arc::new(LoopbackBinding::new(&beta)),
            "nav.scan",
            ConnectionPolicy::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RoboportError::Remote {
            code: roboport_core::ErrorCode::SchemaMismatch,
            ..
        }
    ));
    assert!(alpha.connections().is_empty());
    assert!(beta.connections().is_empty());
}

struct DevicesModule {
    seen: Arc<Mutex<Vec<RangeData>>>,
}

impl ComponentModule for DevicesModule {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest::new("devices", "1.2.0", "*")
    }

    fn factories(&self) -> Vec<(String, Arc<dyn ComponentFactory>)> {
        vec![
            ("RangeSensor".into(), range_sensor_factory()),
            ("Navigator".into(), navigator_factory(self.seen.clone())),
        ]
    }
}

#[test]
fn test_scenario_9_modules_provide_factories() {
    // Scenario 9: Factories from a module
    // Given: A compiled-in module exporting two component types
    // When: The manager loads it, twice
    // Then: Both types become creatable and the second load changes nothing

    let manager = Manager::new(ManagerConfig::default());
    manager.register_module(Arc::new(DevicesModule {
        seen: Arc::new(Mutex::new(Vec::new())),
    }));

    let types = manager.load_module("devices").unwrap();
    assert_eq!(types, vec!["RangeSensor", "Navigator"]);
    assert_eq!(manager.factory_types(), vec!["Navigator", "RangeSensor"]);
    manager.load_module("devices").unwrap();

    manager
        .create_instance("RangeSensor", "scanner", ComponentConfig::new())
        .unwrap();
    assert!(matches!(
        manager.load_module("lidar-drivers"),
        Err(RoboportError::NotFound(_))
    ));
}

#[test]
fn test_scenario_10_remote_sink_goes_away() {
    // Scenario 10: The remote end of a connection disappears
    // Given: "scanner" in alpha feeding a local "nav" and "far" hosted by beta
    // When: beta destroys "far" and scanner writes again
    // Then: The write succeeds, local nav still receives, and the remote
    //       connection is gone from alpha

    let (alpha, _) = robot();
    let (beta, _) = robot();
    alpha
        .create_instance("RangeSensor", "scanner", ComponentConfig::new())
        .unwrap();
    alpha
        .create_instance("Navigator", "nav", ComponentConfig::new())
        .unwrap();
    beta.create_instance("Navigator", "far", ComponentConfig::new())
        .unwrap();
    let beta = Arc::new(beta);

    alpha
        .connect("scanner.range", "nav.scan", ConnectionPolicy::default())
        .unwrap();
    let remote = alpha
        .connect_remote(
            "scanner.range",
            Arc::new(LoopbackBinding::new(&beta)),
            "far.scan",
            ConnectionPolicy::default(),
        )
        .unwrap();
    let source = alpha.port("scanner.range").unwrap();
    assert_eq!(source.connections().len(), 2);

    beta.destroy_instance("far").unwrap();

    source.write(RangeData::new(vec![2.0]).into()).unwrap();
    let record = alpha.port("nav.scan").unwrap().read(None).unwrap().unwrap();
    assert_eq!(RangeData::from_record(record).unwrap().ranges, vec![2.0]);

    assert_eq!(source.connections().len(), 1);
    assert!(matches!(
        alpha.connection(remote),
        Err(RoboportError::NotFound(_))
    ));
    assert_eq!(alpha.connections().len(), 1);

    // Given: A second remote sink whose whole manager is then dropped
    // When: scanner writes
    // Then: The write still succeeds and only the local connection remains
    let gamma = {
        let (gamma, _) = robot();
        gamma
            .create_instance("Navigator", "far", ComponentConfig::new())
            .unwrap();
        Arc::new(gamma)
    };
    alpha
        .connect_remote(
            "scanner.range",
            Arc::new(LoopbackBinding::new(&gamma)),
            "far.scan",
            ConnectionPolicy::default(),
        )
        .unwrap();
    drop(gamma);

    source.write(RangeData::new(vec![3.0]).into()).unwrap();
    assert_eq!(source.connections().len(), 1);
    assert!(alpha.port("nav.scan").unwrap().read(None).unwrap().is_some());
}
