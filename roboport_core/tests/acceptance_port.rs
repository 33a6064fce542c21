//! Acceptance tests for Ports and Connections
//! Tests typed record exchange, wiring checks and buffer overflow policies

use roboport_core::communication::{ConnectionPolicy, PortSet, ReadPolicy};
use roboport_core::roboport_types::{RangeData, Time, TimedDouble, TimedLong};
use roboport_core::RoboportError;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_scenario_1_write_read_round_trip() {
    // Scenario 1: Round trip over a connection
    // Given: A RangeData source connected to a RangeData sink
    // When: The source writes one record
    // Then: The sink reads a record equal in every field

    let mut scanner = PortSet::new("scanner");
    let mut nav = PortSet::new("nav");
    let out = scanner.add_outport::<RangeData>("range").unwrap();
    let inp = nav.add_inport::<RangeData>("scan").unwrap();

    scanner
        .get("range")
        .unwrap()
        .connect(&nav.get("scan").unwrap(), ConnectionPolicy::default())
        .unwrap();

    let mut scan = RangeData::new(vec![0.5, 1.25, 7.0]);
    scan.intensities = vec![10.0, 20.0, 30.0];
    out.write(scan.clone()).unwrap();

    assert!(inp.is_new());
    assert_eq!(inp.read().unwrap(), Some(scan));
    assert_eq!(inp.read().unwrap(), None, "each record is read once");
}

#[test]
fn test_scenario_2_schema_mismatch_never_connects() {
    // Scenario 2: Schema mismatch
    // Given: A TimedDouble source and a TimedLong sink
    // When: They are connected in either order
    // Then: SchemaMismatch is returned and neither port has a connection

    let mut a = PortSet::new("a");
    let mut b = PortSet::new("b");
    a.add_outport::<TimedDouble>("value").unwrap();
    let inp = b.add_inport::<TimedLong>("value").unwrap();
    let out_ref = a.get("value").unwrap();
    let in_ref = b.get("value").unwrap();

    for (x, y) in [(&out_ref, &in_ref), (&in_ref, &out_ref)] {
        match x.connect(y, ConnectionPolicy::default()) {
            Err(RoboportError::SchemaMismatch {
                outport,
                outport_schema,
                inport,
                inport_schema,
            }) => {
                assert_eq!(outport, "a.value");
                assert_eq!(outport_schema.name, "TimedDouble");
                assert_eq!(inport, "b.value");
                assert_eq!(inport_schema.name, "TimedLong");
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }
    }

    assert!(out_ref.connections().is_empty());
    assert!(!inp.is_connected());
}

#[test]
fn test_scenario_3_direction_mismatch() {
    // Scenario 3: Two sinks, and a component wired to itself
    // Given: Two sink ports of the same schema
    // When: They are connected
    // Then: DirectionMismatch is returned

    let mut a = PortSet::new("a");
    let mut b = PortSet::new("b");
    a.add_inport::<TimedDouble>("x").unwrap();
    b.add_inport::<TimedDouble>("x").unwrap();

    let err = a
        .get("x")
        .unwrap()
        .connect(&b.get("x").unwrap(), ConnectionPolicy::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RoboportError::DirectionMismatch {
            direction: "sink",
            ..
        }
    ));

    // Given: A component with a source and a sink of the same schema
    // When: Its source is connected to its own sink
    // Then: InvalidInput names both ports and nothing is connected
    let mut looped = PortSet::new("filter");
    let out = looped.add_outport::<TimedDouble>("out").unwrap();
    let inp = looped.add_inport::<TimedDouble>("in").unwrap();
    match looped
        .get("out")
        .unwrap()
        .connect(&looped.get("in").unwrap(), ConnectionPolicy::default())
    {
        Err(RoboportError::InvalidInput(message)) => {
            assert!(message.contains("filter.out"));
            assert!(message.contains("filter.in"));
        }
        other => panic!("expected InvalidInput, got {:?}", other),
    }
    assert_eq!(out.subscriber_count(), 0);
    assert!(!inp.is_connected());
}

#[test]
fn test_scenario_4_drop_oldest_keeps_most_recent() {
    // Scenario 4: Drop-oldest overflow
    // Given: A connection with capacity N under drop-oldest
    // When: N+K records are written without reads
    // Then: Exactly the most recent N are readable, oldest first

    const N: usize = 4;
    const K: usize = 3;

    let mut src = PortSet::new("src");
    let mut dst = PortSet::new("dst");
    let out = src.add_outport::<TimedLong>("n").unwrap();
    let inp = dst.add_inport::<TimedLong>("n").unwrap();
    let connection = src
        .get("n")
        .unwrap()
        .connect(&dst.get("n").unwrap(), ConnectionPolicy::drop_oldest(N))
        .unwrap();

    for i in 0..(N + K) as i32 {
        out.write(TimedLong::new(i)).unwrap();
    }

    let mut read = Vec::new();
    while let Some(value) = inp.read().unwrap() {
        read.push(value.data);
    }
    assert_eq!(read, vec![3, 4, 5, 6]);

    let stats = connection.stats();
    assert_eq!(stats.dropped, K as u64);
    assert_eq!(stats.consumed, N as u64);
    assert_eq!(stats.pending, 0);
}

#[test]
fn test_scenario_5_drop_newest_keeps_first() {
    // Scenario 5: Drop-newest overflow
    // Given: A connection with capacity 2 under drop-newest
    // When: Four records are written
    // Then: The first two are kept

    let mut src = PortSet::new("src");
    let mut dst = PortSet::new("dst");
    let out = src.add_outport::<TimedLong>("n").unwrap();
    let inp = dst.add_inport::<TimedLong>("n").unwrap();
    src.get("n")
        .unwrap()
        .connect(&dst.get("n").unwrap(), ConnectionPolicy::drop_newest(2))
        .unwrap();

    for i in 0..4 {
        out.write(TimedLong::new(i)).unwrap();
    }
    assert_eq!(inp.read().unwrap().map(|v| v.data), Some(0));
    assert_eq!(inp.read().unwrap().map(|v| v.data), Some(1));
    assert_eq!(inp.read().unwrap(), None);
}

#[test]
fn test_scenario_6_block_reports_backpressure() {
    // Scenario 6: Blocking overflow
    // Given: A full capacity-1 connection under block with a 30ms bound
    // When: A second record is written and nobody reads
    // Then: The write fails with Backpressure after roughly the bound

    let mut src = PortSet::new("src");
    let mut dst = PortSet::new("dst");
    let out = src.add_outport::<TimedLong>("n").unwrap();
    let inp = dst.add_inport::<TimedLong>("n").unwrap();
    src.get("n")
        .unwrap()
        .connect(
            &dst.get("n").unwrap(),
            ConnectionPolicy::blocking(1, Duration::from_millis(30)),
        )
        .unwrap();

    out.write(TimedLong::new(1)).unwrap();
    let start = Instant::now();
    let err = out.write(TimedLong::new(2)).unwrap_err();
    assert!(start.elapsed() >= Duration::from_millis(25));
    assert!(err.is_retryable());
    match err {
        RoboportError::Backpressure { port, .. } => assert_eq!(port, "src.n -> dst.n"),
        other => panic!("expected Backpressure, got {:?}", other),
    }

    // the first record is still there
    assert_eq!(inp.read().unwrap().map(|v| v.data), Some(1));
}

#[test]
fn test_scenario_7_block_released_by_reader() {
    // Scenario 7: Blocked writer released
    // Given: A full capacity-1 connection under block with a generous bound
    // When: A reader drains one record while the writer waits
    // Then: The write succeeds

    let mut src = PortSet::new("src");
    let mut dst = PortSet::new("dst");
    let out = src.add_outport::<TimedLong>("n").unwrap();
    let inp = dst.add_inport::<TimedLong>("n").unwrap();
    src.get("n")
        .unwrap()
        .connect(
            &dst.get("n").unwrap(),
            ConnectionPolicy::blocking(1, Duration::from_secs(5)),
        )
        .unwrap();

    out.write(TimedLong::new(1)).unwrap();
    let reader = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        inp.read().unwrap().map(|v| v.data)
    });

    out.write(TimedLong::new(2)).unwrap();
    assert_eq!(reader.join().unwrap(), Some(1));
}

#[test]
fn test_scenario_8_blocking_read_times_out() {
    // Scenario 8: Blocking read with nothing to read
    // Given: A connection whose read policy blocks for 20ms
    // When: The sink reads with nothing buffered
    // Then: Timeout is returned, naming the sink port

    let mut src = PortSet::new("src");
    let mut dst = PortSet::new("dst");
    src.add_outport::<TimedDouble>("v").unwrap();
    let inp = dst.add_inport::<TimedDouble>("v").unwrap();
    let policy = ConnectionPolicy::default().with_read(ReadPolicy::Blocking {
        timeout: Duration::from_millis(20),
    });
    src.get("v")
        .unwrap()
        .connect(&dst.get("v").unwrap(), policy)
        .unwrap();

    match inp.read() {
        Err(RoboportError::Timeout { port, waited }) => {
            assert_eq!(port, "dst.v");
            assert!(waited >= Duration::from_millis(15));
        }
        other => panic!("expected Timeout, got {:?}", other),
    }
}

#[test]
fn test_scenario_9_disconnect_wakes_reader() {
    // Scenario 9: Disconnect during a blocking read
    // Given: A reader blocked with a long bound
    // When: The connection is removed
    // Then: The reader returns promptly with nothing

    let mut src = PortSet::new("src");
    let mut dst = PortSet::new("dst");
    let out = src.add_outport::<TimedDouble>("v").unwrap();
    let inp = dst.add_inport::<TimedDouble>("v").unwrap();
    let connection = src
        .get("v")
        .unwrap()
        .connect(&dst.get("v").unwrap(), ConnectionPolicy::default())
        .unwrap();

    let reader = thread::spawn(move || {
        let start = Instant::now();
        let value = inp.read_timeout(Duration::from_secs(5)).unwrap();
        (value, start.elapsed())
    });

    thread::sleep(Duration::from_millis(20));
    connection.disconnect();
    connection.disconnect();

    let (value, elapsed) = reader.join().unwrap();
    assert!(value.is_none());
    assert!(elapsed < Duration::from_secs(2));

    // writes after disconnect go nowhere
    out.write(TimedDouble::new(1.0)).unwrap();
    assert_eq!(out.subscriber_count(), 0);
}

#[test]
fn test_scenario_10_fan_out_and_single_source() {
    // Scenario 10: Fan-out
    // Given: One source connected to two sinks
    // When: One record is written
    // Then: Both sinks receive it, and a third source cannot take a sink

    let mut src = PortSet::new("src");
    let mut left = PortSet::new("left");
    let mut right = PortSet::new("right");
    let mut other = PortSet::new("other");
    let out = src.add_outport::<TimedDouble>("v").unwrap();
    let l = left.add_inport::<TimedDouble>("v").unwrap();
    let r = right.add_inport::<TimedDouble>("v").unwrap();
    other.add_outport::<TimedDouble>("v").unwrap();

    let source = src.get("v").unwrap();
    source
        .connect(&left.get("v").unwrap(), ConnectionPolicy::default())
        .unwrap();
    source
        .connect(&right.get("v").unwrap(), ConnectionPolicy::default())
        .unwrap();

    let before = Time::now();
    out.write(TimedDouble::new(0.75)).unwrap();

    let lv = l.read().unwrap().unwrap();
    let rv = r.read().unwrap().unwrap();
    assert_eq!(lv, rv);
    assert_eq!(lv.data, 0.75);
    assert!(lv.tm >= before);
    assert_eq!(out.latest().map(|v| v.data), Some(0.75));

    assert!(matches!(
        other
            .get("v")
            .unwrap()
            .connect(&left.get("v").unwrap(), ConnectionPolicy::default()),
        Err(RoboportError::AlreadyConnected { .. })
    ));
}
