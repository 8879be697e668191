//! Channel-based transport and per-agent thread runner (`SPEC_FULL.md` §5):
//! one OS thread per agent, each draining its own inbox to completion before
//! looking at the next message — no cross-agent shared mutable state, no
//! locking inside the search itself. Ordering is FIFO within a sender→receiver
//! pair and unspecified across pairs, exactly as `crossbeam_channel`'s MPSC
//! queues behave.
//!
//! This mirrors the teacher's parallel solver (`implementation::solver::parallel`):
//! that solver shares one `Mutex`-guarded fringe across worker threads spawned
//! with `crossbeam::thread::scope`. BnB-ADOPT has no shared fringe to guard —
//! agents only ever exchange messages — so the `Mutex`/`Condvar` pair collapses
//! to the stats-reporting channel below, and the scoped-thread idiom carries
//! over unchanged.
use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::error;

use crate::dispatcher::{AgentDispatcher, Inbound, Outbound};
use crate::message::Message;
use crate::value::{Utility, Value};
use crate::version::Version;

/// What an agent reports upward once it has something worth telling the
/// outside world: a variable's final value, its convergence trace, or the
/// fact that every variable it owns has terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsEvent<V: Value> {
    Assignment { agent: String, variable: String, value: V },
    ConvergenceTrace { agent: String, variable: String, trace: Vec<(u64, V)> },
    AgentFinished { agent: String },
}

/// The set of per-agent inboxes, addressed by agent name. Built once before
/// any agent thread starts, then shared (read-only) by every thread's
/// `Sender` clones.
pub struct Network<V: Value, U: Utility> {
    senders: HashMap<String, Sender<Message<V, U>>>,
}

impl<V: Value, U: Utility> Network<V, U> {
    /// Allocates one unbounded channel per named agent and returns the
    /// network alongside each agent's own `Receiver`, keyed the same way.
    pub fn new(agent_names: impl IntoIterator<Item = String>) -> (Self, HashMap<String, Receiver<Message<V, U>>>) {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for name in agent_names {
            let (tx, rx) = unbounded();
            senders.insert(name.clone(), tx);
            receivers.insert(name, rx);
        }
        (Network { senders }, receivers)
    }

    /// Delivers `message` to its receiver's inbox. A disconnected inbox
    /// (the receiving agent's thread has already exited) is logged and
    /// otherwise ignored: the sending agent has no way to act on it and
    /// the message concerns a now-finished part of the search.
    pub fn send(&self, message: Message<V, U>) {
        let receiver = message.receiver().to_string();
        match self.senders.get(&receiver) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    error!("transport: inbox for {receiver} is closed, dropping message");
                }
            }
            None => error!("transport: no inbox registered for {receiver}"),
        }
    }
}

/// Runs one agent to completion on the current thread: first applies every
/// startup item (DFS view, heuristic) handed to it by the problem-setup
/// layer, then drains its inbox until every owned variable has terminated
/// or the inbox disconnects.
///
/// A non-fatal error (`EngineError::TerminateBeforeInit`, surfaced only if a
/// caller bypasses `AgentDispatcher`'s own re-queueing) is logged and
/// skipped; per `SPEC_FULL.md` §12 every other error stops this agent's
/// thread.
pub fn run_agent<V, U, VR>(
    mut dispatcher: AgentDispatcher<V, U, VR>,
    startup: Vec<Inbound<V, U>>,
    inbox: Receiver<Message<V, U>>,
    network: &Network<V, U>,
    stats: &Sender<StatsEvent<V>>,
) where
    V: Value,
    U: Utility,
    VR: Version<V, U>,
{
    for item in startup {
        if !apply(&mut dispatcher, item, network, stats) {
            return;
        }
    }

    while !dispatcher.is_agent_finished() {
        match inbox.recv() {
            Ok(message) => {
                if !apply(&mut dispatcher, Inbound::Algorithm(message), network, stats) {
                    return;
                }
            }
            Err(_) => break,
        }
    }
}

/// Dispatches one inbound item and forwards everything it produced.
/// Returns `false` when the agent's thread must stop.
fn apply<V, U, VR>(
    dispatcher: &mut AgentDispatcher<V, U, VR>,
    item: Inbound<V, U>,
    network: &Network<V, U>,
    stats: &Sender<StatsEvent<V>>,
) -> bool
where
    V: Value,
    U: Utility,
    VR: Version<V, U>,
{
    match dispatcher.dispatch(item) {
        Ok(outbound) => {
            for event in outbound {
                forward(dispatcher.agent_name(), event, network, stats);
            }
            true
        }
        Err(e) => {
            if e.is_fatal() {
                error!("{}: {e}, stopping agent thread", dispatcher.agent_name());
                false
            } else {
                true
            }
        }
    }
}

fn forward<V: Value, U: Utility>(agent: &str, event: Outbound<V, U>, network: &Network<V, U>, stats: &Sender<StatsEvent<V>>) {
    match event {
        Outbound::ToAgent { message, .. } => network.send(message),
        Outbound::Assignment { variable, value } => {
            let _ = stats.send(StatsEvent::Assignment {
                agent: agent.to_string(),
                variable,
                value,
            });
        }
        Outbound::ConvergenceTrace { variable, trace } => {
            let _ = stats.send(StatsEvent::ConvergenceTrace {
                agent: agent.to_string(),
                variable,
                trace,
            });
        }
        Outbound::AgentFinished => {
            let _ = stats.send(StatsEvent::AgentFinished { agent: agent.to_string() });
        }
    }
}

/// Spawns one scoped thread per `(dispatcher, startup items)` pair, wires a
/// fresh `Network` between them from their agent names, and blocks until
/// every thread returns. This is the crate's reference multi-agent runner;
/// callers with their own threading or process topology can use
/// `run_agent`/`Network` directly instead.
pub fn run_all<V, U, VR>(agents: Vec<(AgentDispatcher<V, U, VR>, Vec<Inbound<V, U>>)>, stats: Sender<StatsEvent<V>>)
where
    V: Value,
    U: Utility,
    VR: Version<V, U>,
{
    let names = agents.iter().map(|(d, _)| d.agent_name().to_string());
    let (network, mut receivers) = Network::new(names);

    crossbeam::thread::scope(|scope| {
        for (dispatcher, startup) in agents {
            let agent_name = dispatcher.agent_name().to_string();
            let inbox = receivers.remove(&agent_name).expect("every dispatcher was given its own inbox");
            let network = &network;
            let stats = stats.clone();
            scope.spawn(move |_| {
                run_agent(dispatcher, startup, inbox, network, &stats);
            });
        }
    })
    .expect("agent thread panicked");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableEngine;
    use crate::version::Original;
    use crossbeam_channel::unbounded;

    fn leaf_dispatcher(name: &str, parent: Option<&str>) -> AgentDispatcher<i64, i64> {
        let mut d = AgentDispatcher::new(name, Original);
        d.add_variable(VariableEngine::<i64, i64>::new(name, vec![0, 1]));
        d.set_owner(name, name);
        if let Some(p) = parent {
            d.set_owner(p, p);
        }
        d
    }

    #[test]
    fn a_singleton_agent_reports_assignment_and_agent_finished_over_the_stats_channel() {
        let mut d = leaf_dispatcher("solo", None);
        d.set_owner("solo", "solo");
        let startup = vec![
            Inbound::DfsView {
                variable: "solo".to_string(),
                parent: None,
                pseudo_parents: vec![],
                children: vec![],
                pseudo_children: vec![],
                spaces: vec![],
            },
            Inbound::Heuristic {
                variable: "solo".to_string(),
                bounds: vec![],
            },
        ];
        let (network, mut receivers) = Network::new(vec!["solo".to_string()]);
        let inbox = receivers.remove("solo").unwrap();
        let (stats_tx, stats_rx) = unbounded();

        run_agent(d, startup, inbox, &network, &stats_tx);
        drop(stats_tx);

        let events: Vec<_> = stats_rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, StatsEvent::Assignment { .. })));
        assert!(events.iter().any(|e| matches!(e, StatsEvent::AgentFinished { .. })));
    }

    #[test]
    fn network_logs_and_drops_messages_addressed_to_an_unregistered_agent() {
        let (network, _receivers) = Network::<i64, i64>::new(vec!["a".to_string()]);
        network.send(Message::Terminate(crate::message::TerminateMessage {
            sender: "a".to_string(),
            receiver: "ghost".to_string(),
            context: vec![],
        }));
    }
}
