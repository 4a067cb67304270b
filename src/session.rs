//! Session lifecycle state machine (spec §4.1).
//!
//! `Uninitialized -> Initializing -> Ready -> Stopping -> Stopped`. Any
//! inbound frame that violates the table is rejected with `-32002` before
//! it reaches dispatch.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::McpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Stopping = 3,
    Stopped = 4,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionState::Uninitialized,
            1 => SessionState::Initializing,
            2 => SessionState::Ready,
            3 => SessionState::Stopping,
            _ => SessionState::Stopped,
        }
    }
}

/// Atomically-shared session state, checked before every dispatch.
pub struct Session {
    state: AtomicU8,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(SessionState::Uninitialized as u8),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// `initialize` request received: Uninitialized -> Initializing.
    pub fn begin_initialize(&self) -> Result<(), McpError> {
        match self.state() {
            SessionState::Uninitialized => {
                self.set(SessionState::Initializing);
                Ok(())
            }
            _ => Err(McpError::NotInitialized),
        }
    }

    /// `notifications/initialized` received: Initializing -> Ready.
    pub fn mark_initialized(&self) -> Result<(), McpError> {
        match self.state() {
            SessionState::Initializing => {
                self.set(SessionState::Ready);
                Ok(())
            }
            _ => Err(McpError::NotInitialized),
        }
    }

    /// `shutdown` request received: Ready -> Stopping.
    pub fn begin_shutdown(&self) -> Result<(), McpError> {
        match self.state() {
            SessionState::Ready => {
                self.set(SessionState::Stopping);
                Ok(())
            }
            _ => Err(McpError::NotInitialized),
        }
    }

    /// In-flight requests drained: Stopping -> Stopped.
    pub fn mark_stopped(&self) {
        self.set(SessionState::Stopped);
    }

    /// Gate for every non-lifecycle operation: only `Ready` may dispatch to
    /// capability surfaces (resources/tools/prompts). `ping` is exempt by
    /// callers checking it before this gate.
    pub fn require_ready(&self) -> Result<(), McpError> {
        if self.state() == SessionState::Ready {
            Ok(())
        } else {
            Err(McpError::NotInitialized)
        }
    }

    pub fn require_not_stopped(&self) -> Result<(), McpError> {
        match self.state() {
            SessionState::Stopped | SessionState::Stopping => Err(McpError::NotInitialized),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let s = Session::new();
        assert_eq!(s.state(), SessionState::Uninitialized);
        s.begin_initialize().unwrap();
        assert_eq!(s.state(), SessionState::Initializing);
        s.mark_initialized().unwrap();
        assert_eq!(s.state(), SessionState::Ready);
        assert!(s.require_ready().is_ok());
        s.begin_shutdown().unwrap();
        assert_eq!(s.state(), SessionState::Stopping);
        s.mark_stopped();
        assert_eq!(s.state(), SessionState::Stopped);
    }

    #[test]
    fn operations_before_ready_fail_not_initialized() {
        let s = Session::new();
        assert!(s.require_ready().is_err());
        s.begin_initialize().unwrap();
        assert!(s.require_ready().is_err());
    }

    #[test]
    fn double_initialize_is_not_initialized() {
        let s = Session::new();
        s.begin_initialize().unwrap();
        let err = s.begin_initialize().unwrap_err();
        assert_eq!(err.code(), -32002);
    }

    #[test]
    fn shutdown_before_ready_is_not_initialized() {
        let s = Session::new();
        let err = s.begin_shutdown().unwrap_err();
        assert_eq!(err.code(), -32002);
    }
}
