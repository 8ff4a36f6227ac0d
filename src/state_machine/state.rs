use std::fmt;

use serde::{Deserialize, Serialize};

use super::run::{RunContext, RunOutcome, RunStatus};

/// The phases of a single workload run.
///
/// Each run flows: INIT → RESOLVING_INPUT → RESOLVING_PARAMS →
/// EXECUTING → DONE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Init,
    ResolvingInput,
    ResolvingParams,
    Executing,
    Done,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Init => write!(f, "INIT"),
            State::ResolvingInput => write!(f, "RESOLVING_INPUT"),
            State::ResolvingParams => write!(f, "RESOLVING_PARAMS"),
            State::Executing => write!(f, "EXECUTING"),
            State::Done => write!(f, "DONE"),
        }
    }
}

/// The result of evaluating a state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Advance to the next phase.
    Next(State),
    /// The run has terminated.
    Complete(RunStatus),
}

/// Drives a `RunContext` through the state machine.
pub struct StateMachine;

impl StateMachine {
    /// Compute the next transition for the given run and apply it.
    ///
    /// A run has exactly one attempt: any failure is terminal, in every
    /// phase, and the orchestrator owns retries. `Done` is terminal and
    /// reports the recorded status.
    pub fn next(ctx: &mut RunContext, outcome: RunOutcome) -> Transition {
        let transition = match (ctx.state, &outcome) {
            (State::Done, _) => Transition::Complete(ctx.status),
            (_, RunOutcome::Failure(_)) => Transition::Complete(RunStatus::Failed),
            (State::Init, RunOutcome::Success) => Transition::Next(State::ResolvingInput),
            (State::ResolvingInput, RunOutcome::Success) => Transition::Next(State::ResolvingParams),
            (State::ResolvingParams, RunOutcome::Success) => Transition::Next(State::Executing),
            (State::Executing, RunOutcome::Success) => Transition::Next(State::Done),
        };

        match &transition {
            Transition::Next(next_state) => {
                ctx.state_history.push(ctx.state);
                ctx.state = *next_state;
                ctx.status = if *next_state == State::Done {
                    RunStatus::Succeeded
                } else {
                    RunStatus::InProgress
                };
            }
            Transition::Complete(status) => {
                ctx.state_history.push(ctx.state);
                ctx.state = State::Done;
                ctx.status = *status;
            }
        }

        transition
    }
}
