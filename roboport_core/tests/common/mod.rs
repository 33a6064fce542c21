//! Shared components and factories for roboport_core integration tests
#![allow(dead_code)]

use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use roboport_core::manager::{factory_fn, ComponentFactory};
use roboport_core::roboport_types::RangeData;
use roboport_core::{
    clog, Component, ComponentConfig, InPort, OutPort, PortSet, RoboportError, RoboportResult,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Publishes the `ranges` property on every tick
pub struct RangeSensor {
    range: OutPort<RangeData>,
    ranges: Vec<f64>,
}

impl Component for RangeSensor {
    fn on_configure(&mut self, config: &ComponentConfig) -> RoboportResult<()> {
        self.ranges = config.get_or("ranges", vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    fn on_tick(&mut self) -> RoboportResult<()> {
        self.range.write(RangeData::new(self.ranges.clone()))
    }
}

pub fn range_sensor_factory() -> Arc<dyn ComponentFactory> {
    factory_fn(|ports: &mut PortSet| {
        let range = ports.add_outport::<RangeData>("range")?;
        Ok(Box::new(RangeSensor {
            range,
            ranges: Vec::new(),
        }))
    })
}

/// Collects every scan it reads
pub struct Navigator {
    scan: InPort<RangeData>,
    seen: Arc<Mutex<Vec<RangeData>>>,
}

impl Component for Navigator {
    fn on_tick(&mut self) -> RoboportResult<()> {
        while let Some(scan) = self.scan.read()? {
            clog!(debug, "scan with {} ranges", scan.ranges.len());
            self.seen.lock().push(scan);
        }
        Ok(())
    }
}

pub fn navigator_factory(seen: Arc<Mutex<Vec<RangeData>>>) -> Arc<dyn ComponentFactory> {
    factory_fn(move |ports: &mut PortSet| {
        let scan = ports.add_inport::<RangeData>("scan")?;
        Ok(Box::new(Navigator {
            scan,
            seen: seen.clone(),
        }))
    })
}

/// Callback counters for a [`Probe`]
#[derive(Default)]
pub struct Counters {
    pub configure: AtomicUsize,
    pub activate: AtomicUsize,
    pub tick: AtomicUsize,
    pub deactivate: AtomicUsize,
    pub error: AtomicUsize,
    pub finalize: AtomicUsize,
    pub fail_tick: AtomicBool,
    pub fail_activate: AtomicBool,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Counts its callbacks and fails on demand
pub struct Probe {
    counters: Arc<Counters>,
    /// When set, `on_activate` reports it started and waits for release
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl Probe {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self {
            counters,
            gate: None,
        }
    }

    /// `on_activate` sends on `started`, then blocks until `release` yields
    pub fn gated(counters: Arc<Counters>, started: Sender<()>, release: Receiver<()>) -> Self {
        Self {
            counters,
            gate: Some((started, release)),
        }
    }
}

impl Component for Probe {
    fn on_configure(&mut self, _config: &ComponentConfig) -> RoboportResult<()> {
        self.counters.configure.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_activate(&mut self) -> RoboportResult<()> {
        self.counters.activate.fetch_add(1, Ordering::SeqCst);
        if let Some((started, release)) = &self.gate {
            let _ = started.send(());
            let _ = release.recv();
        }
        if self.counters.fail_activate.load(Ordering::SeqCst) {
            return Err(RoboportError::invalid_input("actuator offline"));
        }
        Ok(())
    }

    fn on_tick(&mut self) -> RoboportResult<()> {
        self.counters.tick.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_tick.load(Ordering::SeqCst) {
            return Err(RoboportError::invalid_input("sensor unplugged"));
        }
        Ok(())
    }

    fn on_deactivate(&mut self) -> RoboportResult<()> {
        self.counters.deactivate.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_error(&mut self, cause: &RoboportError) -> RoboportResult<()> {
        self.counters.error.fetch_add(1, Ordering::SeqCst);
        clog!(warn, "entered ERROR: {}", cause);
        Ok(())
    }

    fn on_finalize(&mut self) -> RoboportResult<()> {
        self.counters.finalize.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn probe_factory(counters: Arc<Counters>) -> Arc<dyn ComponentFactory> {
    factory_fn(move |_: &mut PortSet| Ok(Box::new(Probe::new(counters.clone()))))
}
