//! Domain lifecycle management.

use std::fmt;
use std::time::Instant;

/// A domain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    /// The domain is loaded and accepts calls.
    Active,

    /// The domain has been unloaded and is waiting for teardown.
    Unloading,

    /// The domain has been torn down.
    Unloaded,
}

impl fmt::Display for DomainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active => "active",
            Self::Unloading => "unloading",
            Self::Unloaded => "unloaded",
        };
        f.write_str(name)
    }
}

/// A domain lifecycle.
#[derive(Debug, Clone)]
pub struct DomainLifecycle {
    /// The domain state.
    state: DomainState,

    /// When the domain was created.
    created_at: Instant,

    /// When the domain last changed state.
    last_state_change: Instant,

    /// The number of calls dispatched into the domain.
    calls: u64,
}

impl DomainLifecycle {
    /// Create a new lifecycle in the `Active` state.
    pub fn new() -> Self {
        let now = Instant::now();

        Self {
            state: DomainState::Active,
            created_at: now,
            last_state_change: now,
            calls: 0,
        }
    }

    /// Get the domain state.
    pub fn state(&self) -> DomainState {
        self.state
    }

    /// Get when the domain was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get when the domain last changed state.
    pub fn last_state_change(&self) -> Instant {
        self.last_state_change
    }

    /// Get the number of calls dispatched into the domain.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Transition to a new state.
    ///
    /// States only move forward; a transition to an earlier state is
    /// ignored and reported as `false`.
    ///
    /// # Arguments
    ///
    /// * `state` - The new state.
    pub fn transition_to(&mut self, state: DomainState) -> bool {
        if Self::rank(state) < Self::rank(self.state) {
            return false;
        }
        self.state = state;
        self.last_state_change = Instant::now();
        true
    }

    /// Check if the domain can accept a call.
    pub fn can_accept_calls(&self) -> bool {
        self.state == DomainState::Active
    }

    /// Increment the call count.
    pub fn increment_calls(&mut self) {
        self.calls += 1;
    }

    fn rank(state: DomainState) -> u8 {
        match state {
            DomainState::Active => 0,
            DomainState::Unloading => 1,
            DomainState::Unloaded => 2,
        }
    }
}

impl Default for DomainLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_domain_lifecycle() {
        let mut lifecycle = DomainLifecycle::new();
        assert_eq!(lifecycle.state(), DomainState::Active);
        assert!(lifecycle.can_accept_calls());
        assert_eq!(lifecycle.calls(), 0);

        sleep(Duration::from_millis(5));

        lifecycle.increment_calls();
        lifecycle.increment_calls();
        assert_eq!(lifecycle.calls(), 2);

        assert!(lifecycle.transition_to(DomainState::Unloading));
        assert!(!lifecycle.can_accept_calls());
        assert!(lifecycle.last_state_change() > lifecycle.created_at());

        assert!(lifecycle.transition_to(DomainState::Unloaded));
        assert!(!lifecycle.transition_to(DomainState::Active));
        assert_eq!(lifecycle.state(), DomainState::Unloaded);
    }
}
