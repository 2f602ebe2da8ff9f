//! Container lifecycle states.

/// Where a container is in its life.
///
/// `Starting` ends in exactly one of `Ready`, `TimedOut`, `ExitedBeforeReady`
/// or `Failed`; only `Ready` leads on to `Running`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Described but not yet created on the engine.
    #[default]
    Uninitialized,
    /// Created on the engine.
    Created,
    /// Started, waiting for readiness.
    Starting,
    /// Readiness observed.
    Ready,
    /// The start deadline elapsed first.
    TimedOut,
    /// The process exited before readiness was observed.
    ExitedBeforeReady,
    /// The engine refused to start the container.
    Failed,
    /// Running after a successful start.
    Running,
    /// The process exited on its own after becoming ready.
    Exited,
    /// Stop was requested.
    Stopped,
}

impl LifecycleState {
    /// Whether the container can no longer become ready.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::TimedOut | Self::ExitedBeforeReady | Self::Failed | Self::Exited | Self::Stopped
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::TimedOut => write!(f, "timed out"),
            Self::ExitedBeforeReady => write!(f, "exited before ready"),
            Self::Failed => write!(f, "failed"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display() {
        assert_eq!(LifecycleState::default().to_string(), "uninitialized");
        assert_eq!(LifecycleState::ExitedBeforeReady.to_string(), "exited before ready");
    }

    #[test]
    fn terminal_states() {
        assert!(LifecycleState::TimedOut.is_terminal());
        assert!(LifecycleState::Stopped.is_terminal());
        assert!(LifecycleState::Failed.is_terminal());
        assert!(LifecycleState::Exited.is_terminal());
        assert!(!LifecycleState::Running.is_terminal());
    }
}
