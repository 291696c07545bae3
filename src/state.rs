//! Session finite-state machine types.
//!
//! ```text
//!   RECEIVING ──DATA──▶ RECEIVING
//!       │
//!       └──END (acked)──▶ TERMINATED
//! ```
//!
//! Any other opcode while receiving is a protocol violation and ends the
//! session with an error instead of a transition.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting Data frames; initial state.
    Receiving,
    /// END acknowledged and file closed; no further frames are processed.
    Terminated,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Receiving => f.write_str("receiving"),
            SessionState::Terminated => f.write_str("terminated"),
        }
    }
}
