//! Callback hooks for circuit breaker state transitions

use crate::circuit::CircuitState;
use std::sync::Arc;

/// A state change that just happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'a> {
    pub circuit: &'a str,
    pub from: CircuitState,
    pub to: CircuitState,
}

type Hook = Arc<dyn Fn(&Transition<'_>) + Send + Sync>;

/// Hooks fired after a transition, outside the breaker's state lock
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<Hook>,
    pub on_close: Option<Hook>,
    pub on_half_open: Option<Hook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, transition: &Transition<'_>) {
        let hook = match transition.to {
            CircuitState::Open => &self.on_open,
            CircuitState::Closed => &self.on_close,
            CircuitState::HalfOpen => &self.on_half_open,
        };
        if let Some(callback) = hook {
            callback(transition);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
