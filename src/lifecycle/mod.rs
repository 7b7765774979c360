//! Lifecycle management for planner components
//!
//! Components move through `Unconfigured -> Inactive -> Active` and back.
//! Only the transitions in [`State::after`] are allowed; everything else is
//! reported as `InvalidState` and leaves the component where it was.

use crate::error::{PlannerError, Result};

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send {
    /// Validate parameters and allocate what the node needs
    fn on_configure(&mut self) -> Result<()>;

    /// Start accepting work
    fn on_activate(&mut self) -> Result<()>;

    /// Stop accepting work, keeping configuration
    fn on_deactivate(&mut self) -> Result<()>;

    /// Drop carried state and return to unconfigured
    fn on_cleanup(&mut self) -> Result<()>;
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
}

/// Requested state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Configure,
    Activate,
    Deactivate,
    Cleanup,
}

impl State {
    /// State reached by applying `transition`, if it is allowed from here
    pub fn after(self, transition: Transition) -> Option<State> {
        match (self, transition) {
            (State::Unconfigured, Transition::Configure) => Some(State::Inactive),
            (State::Inactive, Transition::Activate) => Some(State::Active),
            (State::Active, Transition::Deactivate) => Some(State::Inactive),
            (State::Inactive, Transition::Cleanup) => Some(State::Unconfigured),
            _ => None,
        }
    }
}

/// Named state holder shared by lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

impl LifecycleNodeBase {
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }

    /// Check that `transition` is allowed without applying it
    pub fn check(&self, transition: Transition) -> Result<State> {
        self.state.after(transition).ok_or_else(|| {
            PlannerError::InvalidState(format!(
                "cannot {:?} {} while {:?}",
                transition, self.name, self.state
            ))
        })
    }

    /// Apply `transition`, returning the new state
    pub fn transition(&mut self, transition: Transition) -> Result<State> {
        self.state = self.check(transition)?;
        Ok(self.state)
    }
}
