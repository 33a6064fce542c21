//! Execution contexts
//!
//! An execution context drives an ordered set of participant instances.
//! Each tick offers `on_tick` to every ACTIVE participant exactly once, in
//! registration order, on a single thread. Several contexts may run at once,
//! each on its own thread.
//!
//! Cadence is soft: when a tick takes longer than the period the overrun is
//! counted and logged and the next tick starts immediately. Nothing is
//! skipped, so the cadence drifts.

use crate::core::instance::{ComponentInstance, TickOutcome};
use crate::error::{RoboportError, RoboportResult};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How a context decides when to tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPolicy {
    /// Fixed-rate on a dedicated thread
    Periodic { period: Duration },
    /// Ticks only when [`ExecutionContext::tick`] is called
    Triggered,
}

impl TickPolicy {
    pub fn from_rate(hz: f64) -> RoboportResult<Self> {
        Ok(TickPolicy::Periodic {
            period: period_from_rate(hz)?,
        })
    }
}

fn period_from_rate(hz: f64) -> RoboportResult<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        return Err(RoboportError::invalid_input(format!(
            "tick rate must be positive, got {}",
            hz
        )));
    }
    Ok(Duration::from_secs_f64(1.0 / hz))
}

/// Counters for one context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextStats {
    pub ticks: u64,
    /// Ticks that took longer than the period
    pub overruns: u64,
    /// `on_tick` failures across all participants
    pub callback_failures: u64,
    /// Duration of the most recent tick
    pub last_tick: Duration,
    /// Longest tick so far
    pub max_tick: Duration,
}

struct ContextShared {
    name: String,
    /// Held for the whole tick, so attach/detach land on tick boundaries
    participants: Mutex<Vec<Arc<ComponentInstance>>>,
    period_nanos: AtomicU64,
    stats: Mutex<ContextStats>,
}

impl ContextShared {
    fn period(&self) -> Duration {
        Duration::from_nanos(self.period_nanos.load(Ordering::Relaxed))
    }

    fn run_tick(&self) -> Duration {
        let start = Instant::now();
        let participants = self.participants.lock();
        let tick_number = self.stats.lock().ticks + 1;
        let mut failures = 0;

        for instance in participants.iter() {
            match instance.tick(tick_number) {
                Ok(TickOutcome::Ran) | Ok(TickOutcome::Skipped) => {}
                Err(e) => {
                    failures += 1;
                    log::error!("[{}] tick {}: {}", self.name, tick_number, e);
                }
            }
        }
        drop(participants);

        let elapsed = start.elapsed();
        let mut stats = self.stats.lock();
        stats.ticks = tick_number;
        stats.callback_failures += failures;
        stats.last_tick = elapsed;
        stats.max_tick = stats.max_tick.max(elapsed);
        elapsed
    }

    fn record_overrun(&self, elapsed: Duration, period: Duration) {
        let overruns = {
            let mut stats = self.stats.lock();
            stats.overruns += 1;
            stats.overruns
        };
        log::warn!(
            "[{}] tick overran its period: {:?} > {:?} ({} overruns)",
            self.name,
            elapsed,
            period,
            overruns
        );
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// A scheduler driving participant instances
pub struct ExecutionContext {
    shared: Arc<ContextShared>,
    policy: TickPolicy,
    worker: Mutex<Option<Worker>>,
}

impl ExecutionContext {
    pub fn new(name: &str, policy: TickPolicy) -> RoboportResult<Self> {
        let period = match policy {
            TickPolicy::Periodic { period } if period.is_zero() => {
                return Err(RoboportError::invalid_input(format!(
                    "execution context '{}' needs a non-zero period",
                    name
                )))
            }
            TickPolicy::Periodic { period } => period,
            TickPolicy::Triggered => Duration::ZERO,
        };

        Ok(Self {
            shared: Arc::new(ContextShared {
                name: name.to_string(),
                participants: Mutex::new(Vec::new()),
                period_nanos: AtomicU64::new(period.as_nanos() as u64),
                stats: Mutex::new(ContextStats::default()),
            }),
            policy,
            worker: Mutex::new(None),
        })
    }

    /// Periodic context at `hz`
    pub fn periodic(name: &str, hz: f64) -> RoboportResult<Self> {
        Self::new(name, TickPolicy::from_rate(hz)?)
    }

    /// Context ticked by the caller
    pub fn triggered(name: &str) -> Self {
        Self {
            shared: Arc::new(ContextShared {
                name: name.to_string(),
                participants: Mutex::new(Vec::new()),
                period_nanos: AtomicU64::new(0),
                stats: Mutex::new(ContextStats::default()),
            }),
            policy: TickPolicy::Triggered,
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn policy(&self) -> TickPolicy {
        match self.policy {
            TickPolicy::Periodic { .. } => TickPolicy::Periodic {
                period: self.shared.period(),
            },
            TickPolicy::Triggered => TickPolicy::Triggered,
        }
    }

    pub fn period(&self) -> Option<Duration> {
        match self.policy {
            TickPolicy::Periodic { .. } => Some(self.shared.period()),
            TickPolicy::Triggered => None,
        }
    }

    /// Change the period of a periodic context; applies from the next tick
    pub fn set_period(&self, period: Duration) -> RoboportResult<()> {
        if matches!(self.policy, TickPolicy::Triggered) {
            return Err(RoboportError::invalid_input(format!(
                "execution context '{}' is triggered and has no period",
                self.name()
            )));
        }
        if period.is_zero() {
            return Err(RoboportError::invalid_input("period must be non-zero"));
        }
        self.shared
            .period_nanos
            .store(period.as_nanos() as u64, Ordering::Relaxed);
        log::info!("[{}] period set to {:?}", self.name(), period);
        Ok(())
    }

    pub fn set_rate(&self, hz: f64) -> RoboportResult<()> {
        self.set_period(period_from_rate(hz)?)
    }

    pub fn stats(&self) -> ContextStats {
        *self.shared.stats.lock()
    }

    /// Participant names in tick order
    pub fn participants(&self) -> Vec<String> {
        self.shared
            .participants
            .lock()
            .iter()
            .map(|i| i.name().to_string())
            .collect()
    }

    pub fn is_participant(&self, instance: &str) -> bool {
        self.shared
            .participants
            .lock()
            .iter()
            .any(|i| i.name() == instance)
    }

    /// Add `instance` at the end of the tick order.
    ///
    /// Waits for an in-flight tick to finish. Fails with `AlreadyAttached`
    /// if the instance belongs to any context, this one included.
    pub fn attach(&self, instance: Arc<ComponentInstance>) -> RoboportResult<()> {
        let mut participants = self.shared.participants.lock();
        instance.bind_context(&self.shared.name)?;
        log::info!("[{}] attached '{}'", self.shared.name, instance.name());
        participants.push(instance);
        Ok(())
    }

    /// Remove a participant; waits for an in-flight tick to finish
    pub fn detach(&self, instance: &str) -> RoboportResult<Arc<ComponentInstance>> {
        let mut participants = self.shared.participants.lock();
        let idx = participants
            .iter()
            .position(|i| i.name() == instance)
            .ok_or_else(|| RoboportError::NotAttached {
                instance: instance.to_string(),
                context: self.shared.name.clone(),
            })?;

        let removed = participants.remove(idx);
        removed.unbind_context(&self.shared.name);
        log::info!("[{}] detached '{}'", self.shared.name, instance);
        Ok(removed)
    }

    /// Run one tick on the calling thread and return its duration.
    ///
    /// Meant for triggered contexts; on a running periodic context the call
    /// is serialized with the worker's ticks.
    pub fn tick(&self) -> Duration {
        self.shared.run_tick()
    }

    /// Start the worker thread of a periodic context. No-op for triggered
    /// contexts and for contexts already running.
    pub fn start(&self) -> RoboportResult<()> {
        if matches!(self.policy, TickPolicy::Triggered) {
            return Ok(());
        }

        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let (stop, stop_rx) = channel::bounded::<()>(1);
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(format!("ec-{}", self.shared.name))
            .spawn(move || {
                log::debug!("[{}] worker started", shared.name);
                loop {
                    let elapsed = shared.run_tick();
                    let period = shared.period();
                    let wait = if elapsed > period {
                        shared.record_overrun(elapsed, period);
                        Duration::ZERO
                    } else {
                        period - elapsed
                    };

                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("[{}] worker stopped", shared.name);
            })?;

        *worker = Some(Worker { stop, handle });
        log::info!("[{}] started at {:?}", self.shared.name, self.shared.period());
        Ok(())
    }

    /// Stop the worker thread, waiting for the current tick to finish
    pub fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            log::error!("[{}] worker thread panicked", self.shared.name);
        }
        log::info!("[{}] stopped", self.shared.name);
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Detach every participant, returning them in tick order
    pub fn detach_all(&self) -> Vec<Arc<ComponentInstance>> {
        let mut participants = self.shared.participants.lock();
        let removed: Vec<_> = participants.drain(..).collect();
        for instance in &removed {
            instance.unbind_context(&self.shared.name);
        }
        removed
    }
}

impl Drop for ExecutionContext {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("name", &self.shared.name)
            .field("policy", &self.policy())
            .field("participants", &self.participants())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::PortSet;
    use crate::core::component::Component;
    use crate::core::lifecycle::LifecycleState;
    use crate::core::properties::ComponentConfig;

    struct Recorder {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl Component for Recorder {
        fn on_tick(&mut self) -> RoboportResult<()> {
            self.log.lock().push(self.id);
            if self.fail {
                return Err(RoboportError::invalid_input("boom"));
            }
            Ok(())
        }
    }

    fn active(name: &str, id: usize, log: &Arc<Mutex<Vec<usize>>>, fail: bool) -> Arc<ComponentInstance> {
        let instance = Arc::new(ComponentInstance::new(
            name,
            "Recorder",
            Box::new(Recorder {
                id,
                log: log.clone(),
                fail,
            }),
            PortSet::new(name),
            ComponentConfig::default(),
        ));
        instance.bring_up().unwrap();
        instance.activate().unwrap();
        instance
    }

    #[test]
    fn test_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ec = ExecutionContext::triggered("main");
        for (i, name) in ["c", "a", "b"].iter().enumerate() {
            ec.attach(active(name, i, &log, false)).unwrap();
        }

        ec.tick();
        ec.tick();
        assert_eq!(*log.lock(), vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(ec.participants(), vec!["c", "a", "b"]);
        assert_eq!(ec.stats().ticks, 2);
    }

    #[test]
    fn test_inactive_participants_are_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ec = ExecutionContext::triggered("main");
        let idle = active("idle", 7, &log, false);
        idle.deactivate().unwrap();
        ec.attach(idle).unwrap();

        ec.tick();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_failure_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ec = ExecutionContext::triggered("main");
        let bad = active("bad", 0, &log, true);
        let good = active("good", 1, &log, false);
        ec.attach(bad.clone()).unwrap();
        ec.attach(good.clone()).unwrap();

        ec.tick();
        ec.tick();

        assert_eq!(*log.lock(), vec![0, 1, 1]);
        assert_eq!(bad.state(), LifecycleState::Error);
        assert_eq!(good.state(), LifecycleState::Active);
        assert_eq!(ec.stats().callback_failures, 1);
    }

    #[test]
    fn test_attach_rules() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = ExecutionContext::triggered("a");
        let b = ExecutionContext::triggered("b");
        let instance = active("x", 0, &log, false);

        a.attach(instance.clone()).unwrap();
        assert!(matches!(
            b.attach(instance.clone()),
            Err(RoboportError::AlreadyAttached { .. })
        ));
        assert!(matches!(
            b.detach("x"),
            Err(RoboportError::NotAttached { .. })
        ));

        a.detach("x").unwrap();
        b.attach(instance).unwrap();
        assert!(b.is_participant("x"));
    }

    #[test]
    fn test_periodic_runs_and_stops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ec = ExecutionContext::periodic("fast", 200.0).unwrap();
        ec.attach(active("p", 0, &log, false)).unwrap();

        ec.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        ec.stop();

        let ticks = ec.stats().ticks;
        assert!(ticks >= 2, "only {} ticks", ticks);
        assert!(!ec.is_running());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(ec.stats().ticks, ticks);
    }

    #[test]
    fn test_rate_validation() {
        assert!(ExecutionContext::periodic("x", 0.0).is_err());
        let ec = ExecutionContext::periodic("x", 10.0).unwrap();
        ec.set_rate(50.0).unwrap();
        assert_eq!(ec.period(), Some(Duration::from_millis(20)));
        assert!(ExecutionContext::triggered("t").set_rate(5.0).is_err());
    }
}
