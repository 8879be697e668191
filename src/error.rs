//! The error taxonomy of the engine (see `SPEC_FULL.md` §7/§12).
//!
//! Fatal variants abort the owning agent after being logged through `log`;
//! `TerminateBeforeInit` is the one non-fatal variant and is handled by the
//! `crate::dispatcher::AgentDispatcher` as a re-queue signal rather than a
//! failure surfaced to callers.
use thiserror::Error;

/// Errors that can arise while driving the branch-and-bound engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine only ever minimizes; building it with a maximization
    /// problem is a programming error at setup time.
    #[error("this engine only supports minimization problems")]
    MaximizationUnsupported,

    /// A constraint space returned a negative cost. The algorithm's lower
    /// bounds are only sound under non-negative costs.
    #[error("negative cost {cost} for variable {variable} = {value}")]
    NegativeCost {
        variable: String,
        value: String,
        cost: String,
    },

    /// A TERMINATE message arrived for a variable that has not yet received
    /// both its DFS view and its heuristic. Non-fatal: the dispatcher
    /// re-enqueues the message for later retry.
    #[error("TERMINATE received before variable {variable} was initialised")]
    TerminateBeforeInit { variable: String },

    /// A message named a recipient variable that the owner map has no entry
    /// for. This indicates a wiring bug upstream (pseudo-tree/owner map
    /// inconsistency) and is always fatal.
    #[error("message addressed to unknown variable {name}")]
    UnknownVariable { name: String },

    /// The transport layer (a channel in this crate's reference transport)
    /// failed to deliver or receive a message.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl EngineError {
    /// Per §7: only `TerminateBeforeInit` is non-fatal to the owning agent.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::TerminateBeforeInit { .. })
    }
}
