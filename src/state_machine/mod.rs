mod run;
mod state;

pub use run::{FailureClass, RunContext, RunOutcome, RunStatus};
pub use state::{State, StateMachine, Transition};
