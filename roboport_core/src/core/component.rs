use super::properties::ComponentConfig;
use crate::error::{RoboportError, RoboportResult};

/// Behavior of a component, as seen by the runtime.
///
/// Every callback runs with the instance's logging context set, so
/// `clog!()` works anywhere inside them. A callback that returns an error
/// or panics is a callback failure; what happens next depends on the
/// transition (see [`lifecycle::plan`](super::lifecycle::plan)).
///
/// ```ignore
/// use roboport_core::{clog, Component, ComponentConfig, InPort, RoboportResult};
/// use roboport_core::roboport_types::RangeData;
///
/// struct Navigator {
///     scan: InPort<RangeData>,
///     stop_distance: f64,
/// }
///
/// impl Component for Navigator {
///     fn on_configure(&mut self, config: &ComponentConfig) -> RoboportResult<()> {
///         self.stop_distance = config.get_or("stop_distance", 0.5);
///         Ok(())
///     }
///
///     fn on_tick(&mut self) -> RoboportResult<()> {
///         if let Some(scan) = self.scan.read()? {
///             clog!(debug, "{} ranges", scan.ranges.len());
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Component: Send {
    /// Bind parameters. Called on `configure` and again on `reset`.
    fn on_configure(&mut self, _config: &ComponentConfig) -> RoboportResult<()> {
        Ok(())
    }

    /// Entering ACTIVE
    fn on_activate(&mut self) -> RoboportResult<()> {
        Ok(())
    }

    /// One execution context cycle. Should be short-running; it cannot be
    /// cancelled.
    fn on_tick(&mut self) -> RoboportResult<()>;

    /// Leaving ACTIVE
    fn on_deactivate(&mut self) -> RoboportResult<()> {
        Ok(())
    }

    /// Entered ERROR because `cause` happened
    fn on_error(&mut self, cause: &RoboportError) -> RoboportResult<()> {
        crate::clog!(error, "component error: {}", cause);
        Ok(())
    }

    /// Last callback before the instance is freed; runs exactly once
    fn on_finalize(&mut self) -> RoboportResult<()> {
        Ok(())
    }
}
