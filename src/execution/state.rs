//! Termination state machine for one execution handle.

/// Lifecycle state of a launched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationState {
    /// Process is running normally.
    #[default]
    Running,
    /// Deadline expired; graceful termination was sent to the process tree.
    GracefullyTerminating,
    /// Grace window elapsed; the process tree was force killed.
    ForceKilled,
    /// Process is gone and its result has been produced.
    Exited,
}

impl TerminationState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Running -> GracefullyTerminating
    /// - Running -> Exited
    /// - GracefullyTerminating -> ForceKilled
    /// - GracefullyTerminating -> Exited
    /// - ForceKilled -> Exited
    pub fn can_transition_to(&self, target: TerminationState) -> bool {
        use TerminationState::*;
        matches!(
            (*self, target),
            (Running, GracefullyTerminating)
                | (Running, Exited)
                | (GracefullyTerminating, ForceKilled)
                | (GracefullyTerminating, Exited)
                | (ForceKilled, Exited)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: TerminationState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::ShellExecError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TerminationState::Exited)
    }

    /// Check if the timeout governor has started terminating the process.
    pub fn is_terminating(&self) -> bool {
        matches!(
            self,
            TerminationState::GracefullyTerminating | TerminationState::ForceKilled
        )
    }
}
