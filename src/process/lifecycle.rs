/*!
 * Process Lifecycle
 *
 * Explicit state machine for one process record. Every instantiation bumps
 * the generation; lifecycle events carry the generation they belong to and
 * events from an older generation are ignored rather than applied.
 *
 * Allowed transitions:
 * - Created -> Instantiating (spawn)
 * - Instantiating -> Running (program started)
 * - Instantiating -> Halted (instantiation failed)
 * - Running -> Halted (program exited)
 * - Halted -> Instantiating (restart)
 * - Created | Halted -> TornDown (teardown)
 */

use tracing::debug;

use super::types::{ExitStatus, ProcessError, ProcessResult, ProcessState};
use crate::core::types::Generation;

/// Lifecycle of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    state: ProcessState,
    generation: Generation,
    last_exit: Option<ExitStatus>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ProcessState::Created,
            generation: 0,
            last_exit: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Generation of the current (or last) instantiation; 0 before the first
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    #[must_use]
    pub fn last_exit(&self) -> Option<&ExitStatus> {
        self.last_exit.as_ref()
    }

    /// Whether the state machine has an edge `from -> to`
    #[must_use]
    pub const fn can_transition(from: ProcessState, to: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (from, to),
            (Created, Instantiating)
                | (Instantiating, Running)
                | (Instantiating, Halted)
                | (Running, Halted)
                | (Halted, Instantiating)
                | (Created, TornDown)
                | (Halted, TornDown)
        )
    }

    fn transition(&mut self, to: ProcessState) -> ProcessResult<()> {
        if !Self::can_transition(self.state, to) {
            return Err(ProcessError::InvalidStateTransition {
                from: self.state,
                to,
            });
        }
        debug!(from = %self.state, to = %to, generation = self.generation, "Lifecycle transition");
        self.state = to;
        Ok(())
    }

    /// Enter `Instantiating` with a new generation
    pub fn begin_instantiation(&mut self) -> ProcessResult<Generation> {
        self.transition(ProcessState::Instantiating)?;
        self.generation += 1;
        Ok(self.generation)
    }

    /// Apply a `started` event; `Ok(false)` when it belongs to an older run
    pub fn mark_running(&mut self, generation: Generation) -> ProcessResult<bool> {
        if generation != self.generation {
            return Ok(false);
        }
        self.transition(ProcessState::Running)?;
        Ok(true)
    }

    /// Apply a `halted` event; `Ok(false)` when it belongs to an older run
    pub fn mark_halted(&mut self, generation: Generation, status: ExitStatus) -> ProcessResult<bool> {
        if generation != self.generation {
            return Ok(false);
        }
        self.transition(ProcessState::Halted)?;
        self.last_exit = Some(status);
        Ok(true)
    }

    /// Enter the terminal state
    pub fn tear_down(&mut self) -> ProcessResult<()> {
        self.transition(ProcessState::TornDown)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
