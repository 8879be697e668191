//! Shared scaffolding for the integration test suites (`SPEC_FULL.md` §13):
//! one agent per variable, wired through the real `crossbeam`-channel
//! transport — no mocked transport, matching how the engine actually runs.
use std::collections::HashMap;

use bnb_adopt::dispatcher::{AgentDispatcher, Inbound};
use bnb_adopt::pseudotree::PseudoTreeView;
use bnb_adopt::space::ConstraintSpace;
use bnb_adopt::transport::{self, StatsEvent};
use bnb_adopt::value::{Utility, Value};
use bnb_adopt::variable::VariableEngine;
use bnb_adopt::version::Original;

/// Best-effort `env_logger` init so `RUST_LOG=trace cargo test -- --nocapture`
/// reproduces a full trace without touching the crate itself.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::try_init();
}

/// Everything needed to stand up one agent for one variable: its place in
/// the pseudo-tree, its domain, and the constraint spaces assigned to it.
#[allow(dead_code)]
pub struct VarSpec<V: Value, U: Utility> {
    pub tree: PseudoTreeView,
    pub domain: Vec<V>,
    pub spaces: Vec<Box<dyn ConstraintSpace<V, U>>>,
}

/// Builds one agent per variable (agent name == variable name) and the DFS
/// view / trivial-heuristic startup items each agent applies before
/// entering its message loop.
#[allow(dead_code)]
pub fn build_agents<V: Value, U: Utility>(specs: Vec<VarSpec<V, U>>) -> Vec<(AgentDispatcher<V, U>, Vec<Inbound<V, U>>)> {
    let names: Vec<String> = specs.iter().map(|s| s.tree.name.clone()).collect();
    specs
        .into_iter()
        .map(|spec| {
            let name = spec.tree.name.clone();
            let mut dispatcher = AgentDispatcher::new(name.clone(), Original);
            dispatcher.add_variable(VariableEngine::<V, U>::new(name.clone(), spec.domain));
            for n in &names {
                dispatcher.set_owner(n.clone(), n.clone());
            }
            let startup = vec![
                Inbound::DfsView {
                    variable: name.clone(),
                    parent: spec.tree.parent.clone(),
                    pseudo_parents: spec.tree.pseudo_parents.clone(),
                    children: spec.tree.children.clone(),
                    pseudo_children: spec.tree.pseudo_children.clone(),
                    spaces: spec.spaces,
                },
                Inbound::Heuristic {
                    variable: name.clone(),
                    bounds: vec![],
                },
            ];
            (dispatcher, startup)
        })
        .collect()
}

/// Runs every agent to completion on its own thread and collects the final
/// per-variable assignment and convergence trace reported over the stats
/// channel.
#[allow(dead_code)]
pub fn run_to_completion<V: Value, U: Utility>(
    agents: Vec<(AgentDispatcher<V, U>, Vec<Inbound<V, U>>)>,
) -> (HashMap<String, V>, HashMap<String, Vec<(u64, V)>>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    transport::run_all(agents, tx);

    let mut assignments = HashMap::new();
    let mut traces = HashMap::new();
    for event in rx.try_iter() {
        match event {
            StatsEvent::Assignment { variable, value, .. } => {
                assignments.insert(variable, value);
            }
            StatsEvent::ConvergenceTrace { variable, trace, .. } => {
                traces.insert(variable, trace);
            }
            StatsEvent::AgentFinished { .. } => {}
        }
    }
    (assignments, traces)
}
