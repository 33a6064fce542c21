//! # Core component model
//!
//! - **Component**: the callback set every hosted unit implements
//! - **ComponentInstance**: a component plus its ports, configuration and
//!   lifecycle state
//! - **Lifecycle**: the transition table shared by every instance
//! - **clog**: per-callback logging context
//!
//! ## Instance lifecycle
//!
//! 1. **Loaded** - the factory created the component and its ports
//! 2. **Configured** - `on_configure` bound its parameters
//! 3. **Inactive / Active** - toggled by external requests; only ACTIVE
//!    instances are ticked
//! 4. **Error** - a callback failed; `reset` re-runs `on_configure`
//! 5. **Exiting** - `on_finalize` ran; connections are torn down

pub mod clog;
pub mod component;
pub mod instance;
pub mod lifecycle;
pub mod properties;

pub use component::Component;
pub use instance::{ComponentInstance, TickOutcome};
pub use lifecycle::{Callback, LifecycleRequest, LifecycleState};
pub use properties::ComponentConfig;
