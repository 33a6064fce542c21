//! Component lifecycle state machine
//!
//! ```text
//!            configure          startup          activate
//!   LOADED ────────────> CONFIGURED ────────> INACTIVE <──────────> ACTIVE
//!                                               │  ^    deactivate    │
//!                                   (failure)   v  │ reset            │ (failure)
//!                                               ERROR <───────────────┘
//!
//!   finalize: LOADED | CONFIGURED | INACTIVE | ERROR ──> EXITING
//!             ACTIVE is deactivated first
//! ```
//!
//! [`plan`] is the whole transition table and has no side effects. The
//! driver that runs callbacks and records states lives in
//! [`ComponentInstance`](super::instance::ComponentInstance).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum LifecycleState {
    /// Created by its factory, not yet configured
    Loaded = 0,
    /// Ports and parameters bound
    Configured = 1,
    /// Alive, not ticked
    Inactive = 2,
    /// Ticked on every execution context cycle
    Active = 3,
    /// A callback reported failure; needs `reset`
    Error = 4,
    /// Terminal
    Exiting = 5,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 6] = [
        LifecycleState::Loaded,
        LifecycleState::Configured,
        LifecycleState::Inactive,
        LifecycleState::Active,
        LifecycleState::Error,
        LifecycleState::Exiting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Loaded => "LOADED",
            LifecycleState::Configured => "CONFIGURED",
            LifecycleState::Inactive => "INACTIVE",
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Error => "ERROR",
            LifecycleState::Exiting => "EXITING",
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Loaded,
            1 => LifecycleState::Configured,
            2 => LifecycleState::Inactive,
            3 => LifecycleState::Active,
            4 => LifecycleState::Error,
            _ => LifecycleState::Exiting,
        }
    }

    /// Alive and able to reach ACTIVE without reconfiguration
    pub fn is_operational(&self) -> bool {
        matches!(self, LifecycleState::Inactive | LifecycleState::Active)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to move an instance through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleRequest {
    Configure,
    Startup,
    Activate,
    Deactivate,
    Reset,
    Finalize,
    /// Internal only: a callback failed
    Fail,
}

impl LifecycleRequest {
    pub const ALL: [LifecycleRequest; 7] = [
        LifecycleRequest::Configure,
        LifecycleRequest::Startup,
        LifecycleRequest::Activate,
        LifecycleRequest::Deactivate,
        LifecycleRequest::Reset,
        LifecycleRequest::Finalize,
        LifecycleRequest::Fail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleRequest::Configure => "configure",
            LifecycleRequest::Startup => "startup",
            LifecycleRequest::Activate => "activate",
            LifecycleRequest::Deactivate => "deactivate",
            LifecycleRequest::Reset => "reset",
            LifecycleRequest::Finalize => "finalize",
            LifecycleRequest::Fail => "fail",
        }
    }
}

impl fmt::Display for LifecycleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component callback run by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    OnConfigure,
    OnActivate,
    OnTick,
    OnDeactivate,
    OnError,
    OnFinalize,
}

impl Callback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Callback::OnConfigure => "on_configure",
            Callback::OnActivate => "on_activate",
            Callback::OnTick => "on_tick",
            Callback::OnDeactivate => "on_deactivate",
            Callback::OnError => "on_error",
            Callback::OnFinalize => "on_finalize",
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an instance ends up when the transition's callback fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Keep the current state
    Stay,
    /// Move to ERROR and run `on_error`
    EnterError,
    /// Reach the target anyway (teardown must complete)
    Complete,
}

/// What the driver must do for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Already there; succeed without running anything
    NoOp,
    /// Run `callback` (if any), then move to `target`
    Invoke {
        callback: Option<Callback>,
        target: LifecycleState,
        on_failure: OnFailure,
    },
    /// Deactivate first, then re-plan the same request
    DeactivateFirst,
    /// Not allowed from this state
    Reject,
}

const fn invoke(callback: Callback, target: LifecycleState, on_failure: OnFailure) -> Plan {
    Plan::Invoke {
        callback: Some(callback),
        target,
        on_failure,
    }
}

/// The transition table.
///
/// Finalize is accepted from every live state, LOADED included, so that
/// shutdown can finalize instances that were never configured. ACTIVE
/// instances are deactivated first.
pub fn plan(from: LifecycleState, request: LifecycleRequest) -> Plan {
    use LifecycleRequest as R;
    use LifecycleState as S;

    match (request, from) {
        (R::Configure, S::Loaded) => invoke(Callback::OnConfigure, S::Configured, OnFailure::Stay),
        (R::Configure, S::Configured) => Plan::NoOp,

        (R::Startup, S::Configured) => Plan::Invoke {
            callback: None,
            target: S::Inactive,
            on_failure: OnFailure::Stay,
        },
        (R::Startup, S::Inactive | S::Active) => Plan::NoOp,

        (R::Activate, S::Inactive) => invoke(Callback::OnActivate, S::Active, OnFailure::EnterError),
        (R::Activate, S::Active) => Plan::NoOp,

        (R::Deactivate, S::Active) => {
            invoke(Callback::OnDeactivate, S::Inactive, OnFailure::EnterError)
        }
        (R::Deactivate, S::Inactive) => Plan::NoOp,

        (R::Reset, S::Error) => invoke(Callback::OnConfigure, S::Inactive, OnFailure::Stay),

        (R::Finalize, S::Loaded | S::Configured | S::Inactive | S::Error) => {
            invoke(Callback::OnFinalize, S::Exiting, OnFailure::Complete)
        }
        (R::Finalize, S::Active) => Plan::DeactivateFirst,
        (R::Finalize, S::Exiting) => Plan::NoOp,

        (R::Fail, S::Active | S::Inactive) => invoke(Callback::OnError, S::Error, OnFailure::Complete),
        (R::Fail, S::Error) => Plan::NoOp,

        _ => Plan::Reject,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleRequest as R;
    use LifecycleState as S;

    fn target(p: Plan) -> Option<LifecycleState> {
        match p {
            Plan::Invoke { target, .. } => Some(target),
            _ => None,
        }
    }

    #[test]
    fn test_forward_path() {
        assert_eq!(target(plan(S::Loaded, R::Configure)), Some(S::Configured));
        assert_eq!(target(plan(S::Configured, R::Startup)), Some(S::Inactive));
        assert_eq!(target(plan(S::Inactive, R::Activate)), Some(S::Active));
        assert_eq!(target(plan(S::Active, R::Deactivate)), Some(S::Inactive));
        assert_eq!(target(plan(S::Inactive, R::Finalize)), Some(S::Exiting));
    }

    #[test]
    fn test_activation_is_idempotent() {
        assert_eq!(plan(S::Active, R::Activate), Plan::NoOp);
        assert_eq!(plan(S::Inactive, R::Deactivate), Plan::NoOp);
    }

    #[test]
    fn test_error_only_from_alive_states() {
        for from in LifecycleState::ALL {
            let p = plan(from, R::Fail);
            match from {
                S::Active | S::Inactive => assert_eq!(target(p), Some(S::Error)),
                S::Error => assert_eq!(p, Plan::NoOp),
                _ => assert_eq!(p, Plan::Reject, "fail from {}", from),
            }
        }
        // no external request lands in ERROR
        for request in LifecycleRequest::ALL {
            if request == R::Fail {
                continue;
            }
            for from in LifecycleState::ALL {
                assert_ne!(target(plan(from, request)), Some(S::Error));
            }
        }
    }

    #[test]
    fn test_reset_only_from_error() {
        assert_eq!(
            plan(S::Error, R::Reset),
            Plan::Invoke {
                callback: Some(Callback::OnConfigure),
                target: S::Inactive,
                on_failure: OnFailure::Stay,
            }
        );
        for from in [S::Loaded, S::Configured, S::Inactive, S::Active, S::Exiting] {
            assert_eq!(plan(from, R::Reset), Plan::Reject);
        }
    }

    #[test]
    fn test_finalize_table() {
        assert_eq!(plan(S::Active, R::Finalize), Plan::DeactivateFirst);
        assert_eq!(plan(S::Exiting, R::Finalize), Plan::NoOp);
        for from in [S::Loaded, S::Configured, S::Inactive, S::Error] {
            assert!(matches!(
                plan(from, R::Finalize),
                Plan::Invoke {
                    callback: Some(Callback::OnFinalize),
                    target: S::Exiting,
                    on_failure: OnFailure::Complete,
                }
            ));
        }
    }

    #[test]
    fn test_exiting_is_terminal() {
        for request in LifecycleRequest::ALL {
            let p = plan(S::Exiting, request);
            assert!(matches!(p, Plan::Reject | Plan::NoOp), "{} from EXITING", request);
        }
    }

    #[test]
    fn test_state_u8_round_trip() {
        for state in LifecycleState::ALL {
            assert_eq!(LifecycleState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_state_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&S::Inactive).unwrap(), "\"INACTIVE\"");
    }
}
