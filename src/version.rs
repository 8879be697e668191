//! The `Version` extensibility point (`SPEC_FULL.md` §9 design notes): a
//! small capability object that selects *which* handler a routed algorithm
//! message is given to, in place of the source's runtime class loading.
//!
//! `AgentDispatcher` holds one `Version` per agent (boxed, since different
//! agents in the same process could in principle run different variants)
//! and calls `notify` for every VALUE/COST/TERMINATE message it routes. The
//! crate ships exactly one variant, `Original` (plain BnB-ADOPT), but the
//! trait is the seam a future variant would implement against without
//! forking `VariableEngine`.
use crate::error::EngineError;
use crate::message::{Message, MessageKind};
use crate::value::{Utility, Value};
use crate::variable::VariableEngine;

pub trait Version<V: Value, U: Utility>: Send + Sync {
    /// Hook invoked once a `VariableEngine` reaches `Ready` (DFS view and
    /// heuristic both arrived), immediately before its own `init()` runs.
    /// `Original` needs nothing here, since BnB-ADOPT's startup behaviour
    /// lives in `VariableEngine::init` itself rather than being pluggable;
    /// the hook exists for a variant that needs to seed extra state first.
    fn on_ready(&self, engine: &mut VariableEngine<V, U>);

    /// Dispatches one algorithm message, already routed to the right
    /// variable by name, to the matching handler.
    fn notify(&self, engine: &mut VariableEngine<V, U>, message: Message<V, U>) -> Result<(), EngineError>;

    /// The message kinds this variant handles. `AgentDispatcher` uses this
    /// to decide whether a `Version` is a legal choice for an agent.
    fn message_kinds(&self) -> &'static [MessageKind];
}

/// The only variant this crate implements: the BnB-ADOPT search described
/// by `SPEC_FULL.md` §4.3, unmodified.
#[derive(Debug, Clone, Copy, Default)]
pub struct Original;

impl<V: Value, U: Utility> Version<V, U> for Original {
    fn on_ready(&self, _engine: &mut VariableEngine<V, U>) {}

    fn notify(&self, engine: &mut VariableEngine<V, U>, message: Message<V, U>) -> Result<(), EngineError> {
        match message {
            Message::Value(m) => engine.on_value(&m.sender, m.value, m.stamp, Some(m.threshold)),
            Message::Cost(m) => engine.on_cost(&m.sender, m.context, m.lb, m.ub),
            Message::Terminate(m) => engine.on_terminate(&m.sender, m.context),
        }
    }

    fn message_kinds(&self) -> &'static [MessageKind] {
        &[MessageKind::Value, MessageKind::Cost, MessageKind::Terminate]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ValueMessage;

    #[test]
    fn original_routes_value_messages_to_on_value() {
        let mut x = VariableEngine::<i64, i64>::new("x", vec![0, 1]);
        x.on_dfs_view(Some("p".to_string()), vec![], vec![], vec![], vec![]).unwrap();
        x.on_heuristic(std::iter::empty()).unwrap();
        x.drain_outbox();

        let version = Original;
        version
            .notify(
                &mut x,
                Message::Value(ValueMessage {
                    sender: "p".to_string(),
                    receiver: "x".to_string(),
                    value: 1,
                    threshold: 10,
                    stamp: 2,
                }),
            )
            .unwrap();
        assert_eq!(x.threshold(), 10);
    }

    #[test]
    fn original_declares_all_three_algorithm_kinds() {
        let version = Original;
        let kinds = Version::<i64, i64>::message_kinds(&version);
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&MessageKind::Terminate));
    }
}
