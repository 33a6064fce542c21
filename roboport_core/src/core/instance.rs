//! Hosted component instances
//!
//! A [`ComponentInstance`] owns one component's behavior, its ports, its
//! configuration and its lifecycle state, and drives lifecycle transitions
//! by running the callbacks the transition table asks for.
//!
//! Concurrency rules:
//! - Callbacks (including `on_tick`) run under the instance's mutex, so a
//!   transition requested during a tick waits for the tick to finish.
//! - Only one externally requested transition may be in flight per
//!   instance. A second request fails with `Busy` instead of queueing.

use super::clog;
use super::component::Component;
use super::lifecycle::{self, Callback, LifecycleRequest, LifecycleState, OnFailure, Plan};
use super::properties::ComponentConfig;
use crate::communication::{PortProfile, PortRef, PortSet};
use crate::error::{RoboportError, RoboportResult};
use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::SystemTime;

/// Result of offering one tick to an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// `on_tick` ran and succeeded
    Ran,
    /// Not ACTIVE; nothing ran
    Skipped,
}

struct InstanceInner {
    component: Box<dyn Component>,
}

/// A live component hosted by this process
pub struct ComponentInstance {
    name: String,
    type_name: String,
    ports: PortSet,
    inner: Mutex<InstanceInner>,
    /// Written only while `inner` is held
    state: AtomicU8,
    transition_in_flight: AtomicBool,
    config: RwLock<ComponentConfig>,
    attached_to: Mutex<Option<String>>,
    last_error: Mutex<Option<String>>,
    created_at: SystemTime,
}

/// Clears the in-flight flag when a transition ends
struct TransitionGuard<'a>(&'a AtomicBool);

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked with unknown payload".to_string()
    }
}

impl ComponentInstance {
    pub fn new(
        name: &str,
        type_name: &str,
        component: Box<dyn Component>,
        ports: PortSet,
        config: ComponentConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            ports,
            inner: Mutex::new(InstanceInner { component }),
            state: AtomicU8::new(LifecycleState::Loaded as u8),
            transition_in_flight: AtomicBool::new(false),
            config: RwLock::new(config),
            attached_to: Mutex::new(None),
            last_error: Mutex::new(None),
            created_at: SystemTime::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn port(&self, name: &str) -> RoboportResult<PortRef> {
        self.ports
            .get(name)
            .ok_or_else(|| RoboportError::NotFound(format!("port '{}.{}'", self.name, name)))
    }

    pub fn port_profiles(&self) -> Vec<PortProfile> {
        self.ports.profiles()
    }

    pub fn config(&self) -> ComponentConfig {
        self.config.read().clone()
    }

    /// Replace the stored configuration; takes effect on the next
    /// `configure` or `reset`.
    pub fn set_config(&self, config: ComponentConfig) {
        *self.config.write() = config;
    }

    /// Name of the execution context this instance is attached to
    pub fn attached_context(&self) -> Option<String> {
        self.attached_to.lock().clone()
    }

    /// Message of the failure that last moved this instance to ERROR
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn is_transition_in_flight(&self) -> bool {
        self.transition_in_flight.load(Ordering::Acquire)
    }

    // ---- lifecycle requests ----

    /// LOADED -> CONFIGURED via `on_configure`
    pub fn configure(&self) -> RoboportResult<LifecycleState> {
        self.request(LifecycleRequest::Configure)
    }

    /// CONFIGURED -> INACTIVE
    pub fn startup(&self) -> RoboportResult<LifecycleState> {
        self.request(LifecycleRequest::Startup)
    }

    /// INACTIVE -> ACTIVE via `on_activate`; no-op when already ACTIVE
    pub fn activate(&self) -> RoboportResult<LifecycleState> {
        self.request(LifecycleRequest::Activate)
    }

    /// ACTIVE -> INACTIVE via `on_deactivate`; no-op when already INACTIVE
    pub fn deactivate(&self) -> RoboportResult<LifecycleState> {
        self.request(LifecycleRequest::Deactivate)
    }

    /// ERROR -> INACTIVE by re-running `on_configure` with the stored config
    pub fn reset(&self) -> RoboportResult<LifecycleState> {
        self.request(LifecycleRequest::Reset)
    }

    /// Drive to EXITING and tear down every connection.
    ///
    /// An ACTIVE instance is deactivated and its input buffers drained
    /// first. `on_finalize` runs exactly once; if it fails the instance
    /// still ends in EXITING and the failure is returned.
    pub fn finalize(&self) -> RoboportResult<LifecycleState> {
        let result = self.request(LifecycleRequest::Finalize);
        if self.state() == LifecycleState::Exiting {
            self.ports.disconnect_all();
        }
        result
    }

    /// Configure and start up in one step, as deployment does
    pub fn bring_up(&self) -> RoboportResult<LifecycleState> {
        self.configure()?;
        self.startup()
    }

    fn begin_transition(&self) -> RoboportResult<TransitionGuard<'_>> {
        self.transition_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RoboportError::Busy {
                instance: self.name.clone(),
            })?;
        Ok(TransitionGuard(&self.transition_in_flight))
    }

    fn request(&self, request: LifecycleRequest) -> RoboportResult<LifecycleState> {
        let _guard = self.begin_transition()?;
        let mut inner = self.inner.lock();
        self.drive(&mut inner, request)
    }

    fn drive(
        &self,
        inner: &mut InstanceInner,
        request: LifecycleRequest,
    ) -> RoboportResult<LifecycleState> {
        let from = self.state();

        match lifecycle::plan(from, request) {
            Plan::NoOp => Ok(from),
            Plan::Reject => Err(RoboportError::InvalidTransition {
                instance: self.name.clone(),
                request: request.as_str(),
                state: from,
            }),
            Plan::DeactivateFirst => {
                if let Err(e) = self.drive(inner, LifecycleRequest::Deactivate) {
                    log::warn!("{}: deactivate before {} failed: {}", self.name, request, e);
                }
                let drained = self.ports.drain_inputs();
                if drained > 0 {
                    log::debug!("{}: drained {} unread records", self.name, drained);
                }
                self.drive(inner, request)
            }
            Plan::Invoke {
                callback,
                target,
                on_failure,
            } => {
                let outcome = match callback {
                    Some(cb) => self.invoke(inner, cb, None),
                    None => Ok(()),
                };

                match outcome {
                    Ok(()) => {
                        self.set_state(target);
                        log::info!("{}: {} -> {}", self.name, from, target);
                        Ok(target)
                    }
                    Err(e) => {
                        match on_failure {
                            OnFailure::Stay => {}
                            OnFailure::EnterError => self.enter_error(inner, &e),
                            OnFailure::Complete => {
                                self.set_state(target);
                                log::info!("{}: {} -> {} (callback failed)", self.name, from, target);
                            }
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    /// Internal failure path: ACTIVE/INACTIVE -> ERROR, then `on_error`
    fn enter_error(&self, inner: &mut InstanceInner, cause: &RoboportError) {
        let from = self.state();
        if !matches!(lifecycle::plan(from, LifecycleRequest::Fail), Plan::Invoke { .. }) {
            return;
        }

        self.set_state(LifecycleState::Error);
        *self.last_error.lock() = Some(cause.to_string());
        log::error!("{}: {} -> ERROR: {}", self.name, from, cause);

        if let Err(e) = self.invoke(inner, Callback::OnError, Some(cause)) {
            log::error!("{}: {}", self.name, e);
        }
    }

    /// Run one callback with the logging context set, turning errors and
    /// panics into `CallbackFailure`
    fn invoke(
        &self,
        inner: &mut InstanceInner,
        callback: Callback,
        cause: Option<&RoboportError>,
    ) -> RoboportResult<()> {
        self.invoke_at(inner, callback, cause, 0)
    }

    fn invoke_at(
        &self,
        inner: &mut InstanceInner,
        callback: Callback,
        cause: Option<&RoboportError>,
        tick_number: u64,
    ) -> RoboportResult<()> {
        let config = if callback == Callback::OnConfigure {
            self.config()
        } else {
            ComponentConfig::default()
        };
        let component = &mut inner.component;

        let result = clog::with_component_context(&self.name, callback.as_str(), tick_number, || {
            catch_unwind(AssertUnwindSafe(|| match callback {
                Callback::OnConfigure => component.on_configure(&config),
                Callback::OnActivate => component.on_activate(),
                Callback::OnTick => component.on_tick(),
                Callback::OnDeactivate => component.on_deactivate(),
                Callback::OnError => cause.map_or(Ok(()), |c| component.on_error(c)),
                Callback::OnFinalize => component.on_finalize(),
            }))
        });

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RoboportError::callback(&self.name, callback.as_str(), e)),
            Err(payload) => Err(RoboportError::callback(
                &self.name,
                callback.as_str(),
                panic_message(payload),
            )),
        }
    }

    fn set_state(&self, state: LifecycleState) {
        self.state.store(state as u8, Ordering::Release);
    }

    // ---- execution context hooks ----

    /// Offer one tick. Only ACTIVE instances run `on_tick`; a failure
    /// moves this instance to ERROR and is returned.
    pub(crate) fn tick(&self, tick_number: u64) -> RoboportResult<TickOutcome> {
        let mut inner = self.inner.lock();
        if self.state() != LifecycleState::Active {
            return Ok(TickOutcome::Skipped);
        }

        match self.invoke_at(&mut inner, Callback::OnTick, None, tick_number) {
            Ok(()) => Ok(TickOutcome::Ran),
            Err(e) => {
                self.enter_error(&mut inner, &e);
                Err(e)
            }
        }
    }

    pub(crate) fn bind_context(&self, context: &str) -> RoboportResult<()> {
        let mut attached = self.attached_to.lock();
        if let Some(existing) = attached.as_ref() {
            return Err(RoboportError::AlreadyAttached {
                instance: self.name.clone(),
                context: existing.clone(),
            });
        }
        *attached = Some(context.to_string());
        Ok(())
    }

    pub(crate) fn unbind_context(&self, context: &str) {
        let mut attached = self.attached_to.lock();
        if attached.as_deref() == Some(context) {
            *attached = None;
        }
    }
}

impl std::fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("state", &self.state())
            .field("attached_to", &self.attached_context())
            .finish()
    }
}
