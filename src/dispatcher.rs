//! The Agent Dispatcher (`SPEC_FULL.md` §4.4): routes every inbound message
//! to the right `crate::variable::VariableEngine` by recipient variable
//! name, forwards each engine's outgoing VALUE/COST/TERMINATE to the right
//! agent via a static variable→owner map, and surfaces final assignments,
//! convergence traces, and the `AGENT_FINISHED` signal.
use std::collections::{HashMap, HashSet, VecDeque};

use log::info;

use crate::error::EngineError;
use crate::message::{Message, TerminateMessage};
use crate::space::ConstraintSpace;
use crate::value::{Utility, Value};
use crate::variable::VariableEngine;
use crate::version::{Original, Version};

/// Everything the Dispatcher can be asked to route, per §4.4's
/// `{DFS-view, heuristic, VALUE, COST, TERMINATE, agent-finished, start}`.
/// `AgentFinished` is only ever produced by a Dispatcher, never consumed by
/// one, and `Start` carries no payload worth modelling beyond a log line.
pub enum Inbound<V: Value, U: Utility> {
    DfsView {
        variable: String,
        parent: Option<String>,
        pseudo_parents: Vec<String>,
        children: Vec<String>,
        pseudo_children: Vec<String>,
        spaces: Vec<Box<dyn ConstraintSpace<V, U>>>,
    },
    Heuristic {
        variable: String,
        bounds: Vec<(V, U)>,
    },
    ChildHeuristic {
        variable: String,
        child: String,
        bound: U,
    },
    Algorithm(Message<V, U>),
    Start,
}

/// What a `dispatch` call can produce: messages to forward to another
/// agent, results to report to the stats layer, or the terminal signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound<V: Value, U: Utility> {
    ToAgent { agent: String, message: Message<V, U> },
    Assignment { variable: String, value: V },
    ConvergenceTrace { variable: String, trace: Vec<(u64, V)> },
    AgentFinished,
}

/// Routes messages for every variable this agent owns. `VR` fixes the
/// `Version` this agent runs at construction time — static composition in
/// place of the source's runtime class loading (`SPEC_FULL.md` §9).
pub struct AgentDispatcher<V: Value, U: Utility, VR: Version<V, U> = Original> {
    agent_name: String,
    variables: HashMap<String, VariableEngine<V, U>>,
    owner_of: HashMap<String, String>,
    version: VR,
    pending_terminate: VecDeque<(String, TerminateMessage<V>)>,
    finished: HashSet<String>,
    agent_finished: bool,
}

impl<V: Value, U: Utility, VR: Version<V, U>> AgentDispatcher<V, U, VR> {
    pub fn new(agent_name: impl Into<String>, version: VR) -> Self {
        AgentDispatcher {
            agent_name: agent_name.into(),
            variables: HashMap::new(),
            owner_of: HashMap::new(),
            version,
            pending_terminate: VecDeque::new(),
            finished: HashSet::new(),
            agent_finished: false,
        }
    }

    /// Registers an owned variable. Its name is taken from the engine
    /// itself so the two can never drift apart.
    pub fn add_variable(&mut self, engine: VariableEngine<V, U>) {
        self.variables.insert(engine.name().to_string(), engine);
    }

    /// Populates one entry of the variable→owner map. Called only at
    /// startup; read-only thereafter (`SPEC_FULL.md` §5).
    pub fn set_owner(&mut self, variable: impl Into<String>, agent: impl Into<String>) {
        self.owner_of.insert(variable.into(), agent.into());
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn is_agent_finished(&self) -> bool {
        self.agent_finished
    }

    fn owner_of(&self, variable: &str) -> Result<String, EngineError> {
        self.owner_of
            .get(variable)
            .cloned()
            .ok_or_else(|| EngineError::UnknownVariable { name: variable.to_string() })
    }

    /// Drains `variable`'s outbox into `out`, resolving each message's
    /// receiver to its owning agent, and — the first time this variable is
    /// observed terminated — appends its `Assignment` and
    /// `ConvergenceTrace`, then `AgentFinished` once every owned variable
    /// has terminated.
    fn drain_variable(&mut self, variable: &str, out: &mut Vec<Outbound<V, U>>) -> Result<(), EngineError> {
        let (outgoing, just_terminated, value, trace) = {
            let engine = self.variables.get_mut(variable).expect("variable must be registered");
            let outgoing = engine.drain_outbox();
            let newly_done = engine.is_terminated() && !self.finished.contains(variable);
            (outgoing, newly_done, engine.final_assignment(), engine.convergence_trace().to_vec())
        };

        for message in outgoing {
            let agent = self.owner_of(message.receiver())?;
            out.push(Outbound::ToAgent { agent, message });
        }

        if just_terminated {
            self.finished.insert(variable.to_string());
            let value = value.expect("a terminated variable always has a final assignment");
            out.push(Outbound::Assignment {
                variable: variable.to_string(),
                value,
            });
            out.push(Outbound::ConvergenceTrace {
                variable: variable.to_string(),
                trace,
            });
            if self.finished.len() == self.variables.len() && !self.agent_finished {
                self.agent_finished = true;
                info!("{} AGENT_FINISHED", self.agent_name);
                out.push(Outbound::AgentFinished);
            }
        }
        Ok(())
    }

    /// Retries every TERMINATE previously re-enqueued for `variable`
    /// because it was not yet initialised; a no-op if none are pending.
    fn flush_pending_terminates(&mut self, variable: &str, out: &mut Vec<Outbound<V, U>>) -> Result<(), EngineError> {
        let mut retry = VecDeque::new();
        std::mem::swap(&mut retry, &mut self.pending_terminate);
        for (target, msg) in retry {
            if target != variable {
                self.pending_terminate.push_back((target, msg));
                continue;
            }
            self.dispatch_terminate(msg, out)?;
        }
        Ok(())
    }

    /// Redelivers a TERMINATE that was previously rejected with
    /// `TerminateBeforeInit`. By construction `variable` is now past
    /// `Ready`, so a second rejection would be a genuine bug, not a race —
    /// it is propagated rather than silently re-queued again.
    fn dispatch_terminate(&mut self, msg: TerminateMessage<V>, out: &mut Vec<Outbound<V, U>>) -> Result<(), EngineError> {
        let receiver = msg.receiver.clone();
        let engine = self
            .variables
            .get_mut(&receiver)
            .ok_or_else(|| EngineError::UnknownVariable { name: receiver.clone() })?;
        self.version.notify(engine, Message::Terminate(msg))?;
        self.drain_variable(&receiver, out)
    }

    /// Routes one inbound item and returns everything it caused: forwarded
    /// messages, stats-layer reports, and `AgentFinished` if this was the
    /// final owned variable to terminate.
    pub fn dispatch(&mut self, inbound: Inbound<V, U>) -> Result<Vec<Outbound<V, U>>, EngineError> {
        let mut out = Vec::new();
        match inbound {
            Inbound::Start => {}
            Inbound::DfsView {
                variable,
                parent,
                pseudo_parents,
                children,
                pseudo_children,
                spaces,
            } => {
                let engine = self
                    .variables
                    .get_mut(&variable)
                    .ok_or_else(|| EngineError::UnknownVariable { name: variable.clone() })?;
                engine.on_dfs_view(parent, pseudo_parents, children, pseudo_children, spaces)?;
                self.drain_variable(&variable, &mut out)?;
                self.flush_pending_terminates(&variable, &mut out)?;
            }
            Inbound::Heuristic { variable, bounds } => {
                let engine = self
                    .variables
                    .get_mut(&variable)
                    .ok_or_else(|| EngineError::UnknownVariable { name: variable.clone() })?;
                engine.on_heuristic(bounds)?;
                self.drain_variable(&variable, &mut out)?;
                self.flush_pending_terminates(&variable, &mut out)?;
            }
            Inbound::ChildHeuristic { variable, child, bound } => {
                let engine = self
                    .variables
                    .get_mut(&variable)
                    .ok_or_else(|| EngineError::UnknownVariable { name: variable.clone() })?;
                engine.on_child_heuristic(&child, bound);
                self.drain_variable(&variable, &mut out)?;
            }
            Inbound::Algorithm(message) => {
                let receiver = message.receiver().to_string();
                let is_terminate = matches!(message, Message::Terminate(_));
                let terminate_payload = if let Message::Terminate(t) = &message { Some(t.clone()) } else { None };
                let engine = self
                    .variables
                    .get_mut(&receiver)
                    .ok_or_else(|| EngineError::UnknownVariable { name: receiver.clone() })?;
                match self.version.notify(engine, message) {
                    Ok(()) => self.drain_variable(&receiver, &mut out)?,
                    Err(EngineError::TerminateBeforeInit { .. }) if is_terminate => {
                        let payload = terminate_payload.expect("terminate payload must be present for a TERMINATE message");
                        self.pending_terminate.push_back((receiver, payload));
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher_with(names: &[&str]) -> AgentDispatcher<i64, i64> {
        let mut d = AgentDispatcher::new("agent-1", Original);
        for name in names {
            d.add_variable(VariableEngine::<i64, i64>::new(*name, vec![0, 1]));
            d.set_owner(*name, "agent-1");
        }
        d
    }

    #[test]
    fn unknown_recipient_is_a_fatal_error() {
        let mut d = dispatcher_with(&["x"]);
        let err = d.dispatch(Inbound::Heuristic {
            variable: "ghost".to_string(),
            bounds: vec![],
        });
        assert!(matches!(err, Err(EngineError::UnknownVariable { .. })));
    }

    #[test]
    fn terminate_before_init_is_requeued_not_returned_as_an_error() {
        let mut d = dispatcher_with(&["x"]);
        let result = d.dispatch(Inbound::Algorithm(Message::Terminate(TerminateMessage {
            sender: "parent".to_string(),
            receiver: "x".to_string(),
            context: vec![],
        })));
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn dfs_view_then_heuristic_initialises_and_routes_the_value_message() {
        let mut d = dispatcher_with(&["x"]);
        d.set_owner("y", "agent-2");
        d.dispatch(Inbound::DfsView {
            variable: "x".to_string(),
            parent: None,
            pseudo_parents: vec![],
            children: vec!["y".to_string()],
            pseudo_children: vec![],
            spaces: vec![],
        })
        .unwrap();
        let out = d
            .dispatch(Inbound::Heuristic {
                variable: "x".to_string(),
                bounds: vec![],
            })
            .unwrap();
        let to_y = out.iter().any(|o| matches!(o, Outbound::ToAgent { agent, .. } if agent == "agent-2"));
        assert!(to_y);
    }

    #[test]
    fn singleton_variable_reports_assignment_and_agent_finished() {
        let mut d = dispatcher_with(&["solo"]);
        let out = d
            .dispatch(Inbound::DfsView {
                variable: "solo".to_string(),
                parent: None,
                pseudo_parents: vec![],
                children: vec![],
                pseudo_children: vec![],
                spaces: vec![],
            })
            .unwrap();
        let out2 = d
            .dispatch(Inbound::Heuristic {
                variable: "solo".to_string(),
                bounds: vec![],
            })
            .unwrap();
        let all: Vec<_> = out.into_iter().chain(out2).collect();
        assert!(all.iter().any(|o| matches!(o, Outbound::Assignment { .. })));
        assert!(all.iter().any(|o| matches!(o, Outbound::AgentFinished)));
        assert!(d.is_agent_finished());
    }
}
