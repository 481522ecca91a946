// Document approval workflow
//
// `gate` is the pure permission predicate, `state_machine` models the flag
// transitions and `effects` holds the project status side effects.

pub mod effects;
pub mod gate;
pub mod state_machine;

pub use gate::{
    can_perform, check, permitted_actions, reopen_stage, Action, ApprovalState, DocumentGate,
    GateError, PermittedAction,
};
pub use state_machine::{predict, ApprovalEvent, DocumentApprovalMachine};
