//! Thread-local component logging context.
//!
//! The lifecycle driver and execution contexts set the current component
//! context before each callback, so component code can log without carrying
//! its instance name around.
//!
//! # Example
//!
//! ```ignore
//! use roboport_core::clog;
//!
//! fn on_tick(&mut self) -> RoboportResult<()> {
//!     clog!(debug, "scan with {} ranges", scan.ranges.len());
//!     Ok(())
//! }
//! ```

use std::cell::RefCell;
use std::time::Instant;

/// Log target used for every message emitted through [`clog!`](crate::clog)
pub const COMPONENT_LOG_TARGET: &str = "roboport::component";

thread_local! {
    static CURRENT_COMPONENT: RefCell<Option<ComponentLogContext>> = const { RefCell::new(None) };
}

/// Thread-local context for component logging.
pub struct ComponentLogContext {
    /// Instance name for log attribution.
    pub name: String,
    /// Callback currently running (`on_tick`, `on_configure`, ...).
    pub callback: &'static str,
    /// When the callback started.
    pub started: Option<Instant>,
    /// Tick number within the owning execution context (0 outside ticks).
    pub tick_number: u64,
}

/// Set the current component context for this thread.
///
/// Reuses the existing allocation when possible.
pub fn set_component_context(name: &str, callback: &'static str, tick_number: u64) {
    CURRENT_COMPONENT.with(|ctx| {
        let mut slot = ctx.borrow_mut();
        if let Some(ref mut existing) = *slot {
            existing.name.clear();
            existing.name.push_str(name);
            existing.callback = callback;
            existing.started = Some(Instant::now());
            existing.tick_number = tick_number;
        } else {
            *slot = Some(ComponentLogContext {
                name: name.to_owned(),
                callback,
                started: Some(Instant::now()),
                tick_number,
            });
        }
    });
}

/// Clear the current component context for this thread.
pub fn clear_component_context() {
    CURRENT_COMPONENT.with(|ctx| {
        if let Some(ref mut existing) = *ctx.borrow_mut() {
            existing.started = None;
        }
    });
}

/// Current instance name, or "unknown" outside a callback.
pub fn current_component_name() -> String {
    CURRENT_COMPONENT.with(|ctx| {
        ctx.borrow()
            .as_ref()
            .filter(|c| c.started.is_some())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    })
}

/// Runs `f` with the component context set, clearing it afterwards.
pub(crate) fn with_component_context<R>(
    name: &str,
    callback: &'static str,
    tick_number: u64,
    f: impl FnOnce() -> R,
) -> R {
    set_component_context(name, callback, tick_number);
    let out = f();
    clear_component_context();
    out
}

/// Used by the `clog!()` macro.
pub fn log_with_context(level: log::Level, message: std::fmt::Arguments<'_>) {
    if !log::log_enabled!(target: COMPONENT_LOG_TARGET, level) {
        return;
    }

    CURRENT_COMPONENT.with(|ctx| match ctx.borrow().as_ref() {
        Some(c) if c.started.is_some() => {
            let elapsed_us = c.started.map(|s| s.elapsed().as_micros()).unwrap_or(0);
            log::log!(
                target: COMPONENT_LOG_TARGET,
                level,
                "[{}] {} #{} +{}us: {}",
                c.name,
                c.callback,
                c.tick_number,
                elapsed_us,
                message
            );
        }
        _ => log::log!(target: COMPONENT_LOG_TARGET, level, "[unknown] {}", message),
    });
}

/// Log a message from within a component callback.
///
/// ```ignore
/// clog!(info, "configured with rate {}", rate);
/// clog!(warn, "stale scan: {:?} old", age);
/// clog!(error, "actuator {} stalled", idx);
/// clog!(debug, "tick");
/// ```
#[macro_export]
macro_rules! clog {
    (info, $($arg:tt)*) => {
        $crate::core::clog::log_with_context(::log::Level::Info, format_args!($($arg)*))
    };
    (warn, $($arg:tt)*) => {
        $crate::core::clog::log_with_context(::log::Level::Warn, format_args!($($arg)*))
    };
    (error, $($arg:tt)*) => {
        $crate::core::clog::log_with_context(::log::Level::Error, format_args!($($arg)*))
    };
    (debug, $($arg:tt)*) => {
        $crate::core::clog::log_with_context(::log::Level::Debug, format_args!($($arg)*))
    };
}
