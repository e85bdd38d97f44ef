//! Session lifecycle states.

use serde::Serialize;

/// Lifecycle of one transport connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Ready,
    ShuttingDown,
    Closed,
}

impl SessionState {
    /// A transition is legal only if it moves strictly forward.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        next > self
    }

    /// The session no longer accepts new requests.
    pub fn is_terminating(&self) -> bool {
        *self >= SessionState::ShuttingDown
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::ShuttingDown => "shutting_down",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only() {
        use SessionState::*;
        assert!(Uninitialized.can_advance_to(Ready));
        assert!(Uninitialized.can_advance_to(Closed));
        assert!(Ready.can_advance_to(ShuttingDown));
        assert!(ShuttingDown.can_advance_to(Closed));

        assert!(!Ready.can_advance_to(Uninitialized));
        assert!(!Ready.can_advance_to(Ready));
        assert!(!Closed.can_advance_to(ShuttingDown));
    }

    #[test]
    fn test_terminating() {
        assert!(!SessionState::Ready.is_terminating());
        assert!(SessionState::ShuttingDown.is_terminating());
        assert!(SessionState::Closed.is_terminating());
    }
}
