//! The Variable Engine (`SPEC_FULL.md` §4.3): the BnB-ADOPT state machine
//! run by one agent for one owned variable. This is the core of the crate;
//! everything else (`crate::bounds`, `crate::context`, `crate::message`)
//! exists to give this module somewhere to keep its bookkeeping.
use std::collections::HashMap;

use log::{debug, info, trace, warn};

use crate::bounds::BoundsTable;
use crate::context::ContextStore;
use crate::error::EngineError;
use crate::heuristic::HeuristicView;
use crate::message::{context_to_map, extract, map_entries, ContextMap, CostMessage, Message, MessageKind, TerminateMessage, ValueMessage};
use crate::pseudotree::PseudoTreeView;
use crate::space::{join, AncestorLookup, ConstraintSpace, JoinedSpace};
use crate::value::{Utility, Value};

/// `{Uninitialised, Ready, Running, Terminated}` (`SPEC_FULL.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialised,
    Ready,
    Running,
    Terminated,
}

/// One owned variable's BnB-ADOPT search state, plus everything needed to
/// run its three message handlers and the `backtrack` reselection step.
///
/// Generic over the domain type `V` and the utility type `U`; see
/// `crate::value`. Constructed once per owned variable by the (out-of-scope)
/// agent startup code, then driven exclusively by `crate::dispatcher::AgentDispatcher`.
pub struct VariableEngine<V: Value, U: Utility> {
    name: String,
    domain: Vec<V>,
    minimize: bool,
    state: State,
    tree: Option<PseudoTreeView>,
    space: Option<JoinedSpace<V, U>>,
    heuristic: HeuristicView<V, U>,
    has_dfs_view: bool,
    has_heuristic: bool,
    context: ContextStore<V>,
    bounds: Option<BoundsTable<V, U>>,
    delta: Vec<U>,
    current_assignment: Option<V>,
    stamp: u64,
    threshold: U,
    lb: U,
    ub: U,
    terminate_flag: bool,
    final_assignment: Option<V>,
    trace: Vec<(u64, V)>,
    last_incoming: HashMap<(MessageKind, String), Message<V, U>>,
    outbox: Vec<Message<V, U>>,
}

impl<V: Value, U: Utility> VariableEngine<V, U> {
    pub fn new(name: impl Into<String>, domain: Vec<V>) -> Self {
        assert!(!domain.is_empty(), "a variable must have a non-empty domain");
        VariableEngine {
            name: name.into(),
            domain,
            minimize: true,
            state: State::Uninitialised,
            tree: None,
            space: None,
            heuristic: HeuristicView::trivial(),
            has_dfs_view: false,
            has_heuristic: false,
            context: ContextStore::new(),
            bounds: None,
            delta: Vec::new(),
            current_assignment: None,
            stamp: 0,
            threshold: U::infinity(),
            lb: U::zero(),
            ub: U::infinity(),
            terminate_flag: false,
            final_assignment: None,
            trace: Vec::new(),
            last_incoming: HashMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Marks this engine as backing a maximization problem, purely so that
    /// `init` can be exercised against the `MaximizationUnsupported` error
    /// path in tests; the crate has no maximizing search of its own.
    pub fn assume_maximize(mut self) -> Self {
        self.minimize = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == State::Terminated
    }

    pub fn current_assignment(&self) -> Option<V> {
        self.current_assignment
    }

    pub fn final_assignment(&self) -> Option<V> {
        self.final_assignment
    }

    pub fn lb(&self) -> U {
        self.lb
    }

    pub fn ub(&self) -> U {
        self.ub
    }

    pub fn threshold(&self) -> U {
        self.threshold
    }

    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    pub fn convergence_trace(&self) -> &[(u64, V)] {
        &self.trace
    }

    /// Drains the messages produced by the handlers called since the last
    /// drain; this is what `crate::dispatcher::AgentDispatcher` forwards to
    /// the transport.
    pub fn drain_outbox(&mut self) -> Vec<Message<V, U>> {
        std::mem::take(&mut self.outbox)
    }

    fn domain_index(&self, value: V) -> Option<usize> {
        self.domain.iter().position(|v| *v == value)
    }

    fn children_names(&self) -> Vec<String> {
        self.tree.as_ref().map(|t| t.children.clone()).unwrap_or_default()
    }

    fn children_is_empty(&self) -> bool {
        self.tree.as_ref().map_or(true, |t| t.children.is_empty())
    }

    fn child_index(&self, name: &str) -> Option<usize> {
        self.tree.as_ref().and_then(|t| t.child_index(name))
    }

    fn parent_name(&self) -> Option<String> {
        self.tree.as_ref().and_then(|t| t.parent.clone())
    }

    fn is_root(&self) -> bool {
        self.tree.as_ref().map_or(true, |t| t.is_root())
    }

    fn is_duplicate(&self, msg: &Message<V, U>) -> bool {
        let key = (msg.kind(), msg.sender().to_string());
        self.last_incoming.get(&key).map_or(false, |prev| prev == msg)
    }

    fn remember(&mut self, msg: Message<V, U>) {
        let key = (msg.kind(), msg.sender().to_string());
        self.last_incoming.insert(key, msg);
    }

    // --- public operations, called by the Agent Dispatcher -------------

    /// `on_dfs_view(parent, pseudoParents, children, pseudoChildren, spaces)`.
    pub fn on_dfs_view(
        &mut self,
        parent: Option<String>,
        pseudo_parents: Vec<String>,
        children: Vec<String>,
        pseudo_children: Vec<String>,
        spaces: Vec<Box<dyn ConstraintSpace<V, U>>>,
    ) -> Result<(), EngineError> {
        trace!("{} received DFS view: parent={:?} children={:?}", self.name, parent, children);
        let mut tree = PseudoTreeView::new(self.name.clone());
        tree.parent = parent;
        tree.pseudo_parents = pseudo_parents;
        tree.children = children;
        tree.pseudo_children = pseudo_children;
        self.tree = Some(tree);
        self.space = Some(join(spaces));
        self.has_dfs_view = true;
        self.try_advance()
    }

    /// `on_heuristic(h_self)`: `bounds` carries `(value, h(self, value))`
    /// for every domain value this variable was given a bound for; values
    /// not present default to zero (`crate::heuristic::HeuristicView`).
    pub fn on_heuristic(&mut self, bounds: impl IntoIterator<Item = (V, U)>) -> Result<(), EngineError> {
        trace!("{} received own heuristic", self.name);
        for (value, bound) in bounds {
            self.heuristic.set_self(value, bound);
        }
        self.has_heuristic = true;
        self.try_advance()
    }

    /// `on_child_heuristic(childName, h_c)`. Does not itself move the state
    /// machine; `h_child` only matters once `init_child` reads it during
    /// `init`.
    pub fn on_child_heuristic(&mut self, child: &str, bound: U) {
        trace!("{} received child heuristic for {} = {:?}", self.name, child, bound);
        self.heuristic.set_child(child, bound);
    }

    fn try_advance(&mut self) -> Result<(), EngineError> {
        if self.state == State::Uninitialised && self.has_dfs_view && self.has_heuristic {
            self.state = State::Ready;
            debug!("{} Uninitialised -> Ready", self.name);
            self.init()?;
        }
        Ok(())
    }

    /// The six-step `init()` procedure, plus the singleton special case.
    fn init(&mut self) -> Result<(), EngineError> {
        if !self.minimize {
            return Err(EngineError::MaximizationUnsupported);
        }
        let tree = self.tree.clone().expect("init called before the DFS view arrived");

        // 1. context placeholders for every separator entry.
        for name in tree.separator().into_iter().flatten() {
            self.context.priority_merge(name, self.domain[0], 1);
        }
        // 2. stamp = 0.
        self.stamp = 0;

        // 3. bounds table + init_child for every (d, child).
        let mut bounds = BoundsTable::new(self.domain.clone(), tree.children.len());
        for d_idx in 0..self.domain.len() {
            for (child_idx, child) in tree.children.iter().enumerate() {
                bounds.init_child(d_idx, child_idx, self.heuristic.h_child(child));
            }
        }
        self.bounds = Some(bounds);

        // 4. setDelta().
        self.set_delta()?;

        // Singleton special case: no separator, no lower neighbours.
        if tree.is_singleton() {
            let (best_idx, best_cost) = self
                .delta
                .iter()
                .enumerate()
                .skip(1)
                .fold((0usize, self.delta[0]), |(bi, bv), (i, &v)| if v < bv { (i, v) } else { (bi, bv) });
            let value = self.domain[best_idx];
            self.current_assignment = Some(value);
            self.stamp += 1;
            self.trace.push((self.stamp, value));
            self.lb = best_cost;
            self.ub = best_cost;
            self.state = State::Terminated;
            self.final_assignment = Some(value);
            debug!("{} Ready -> Terminated (singleton)", self.name);
            info!("{} Assignment({}, {:?})", self.name, self.name, value);
            return Ok(());
        }

        // 5. seed h(self, ·), then initSelf() and reset threshold.
        for d_idx in 0..self.domain.len() {
            self.bounds.as_mut().unwrap().set_heuristic(d_idx, self.heuristic.h_self(self.domain[d_idx]));
        }
        self.init_self();
        self.threshold = U::infinity();
        self.state = State::Running;
        debug!("{} Ready -> Running", self.name);

        // 6. backtrack() to emit the initial VALUE/COST messages.
        self.backtrack();
        Ok(())
    }

    /// Evaluates `space(self)` at every domain value against the current
    /// Context Store, rejecting negative costs (the algorithm's lower
    /// bounds are unsound otherwise).
    fn compute_deltas(&self) -> Result<Vec<U>, EngineError> {
        let lookup: &AncestorLookup<V> = &|name: &str| self.context.value_of(name);
        let mut out = Vec::with_capacity(self.domain.len());
        for &d in &self.domain {
            let cost = match self.space.as_ref() {
                Some(space) => space.cost(d, lookup),
                None => U::zero(),
            };
            if cost < U::zero() {
                return Err(EngineError::NegativeCost {
                    variable: self.name.clone(),
                    value: format!("{:?}", d),
                    cost: format!("{:?}", cost),
                });
            }
            out.push(cost);
        }
        Ok(out)
    }

    fn set_delta(&mut self) -> Result<(), EngineError> {
        let deltas = self.compute_deltas()?;
        if let Some(bounds) = self.bounds.as_mut() {
            for (i, &d) in deltas.iter().enumerate() {
                bounds.set_delta(i, d);
            }
        }
        self.delta = deltas;
        Ok(())
    }

    /// Recomputes the aggregated `LB`/`UB`/`lbD` and reselects
    /// `currentAssignment := lbD`, bumping `stamp` only on an actual change
    /// ("reselects", per the stamp-semantics paragraph in `SPEC_FULL.md` §3).
    fn init_self(&mut self) {
        let bounds = match self.bounds.as_mut() {
            Some(b) => b,
            None => return,
        };
        bounds.recompute_aggregates();
        let lb_d = bounds.lb_d();
        if self.current_assignment != Some(lb_d) {
            let old = self.current_assignment;
            self.current_assignment = Some(lb_d);
            self.stamp += 1;
            self.trace.push((self.stamp, lb_d));
            debug!("{} reselected {:?} -> {:?} (stamp {})", self.name, old, lb_d, self.stamp);
        }
        self.lb = bounds.lb();
        self.ub = bounds.ub();
    }

    /// For every `(d, childIndex)` whose saved context disagrees with the
    /// current Context Store, resets that child's bound back to the
    /// uninformative default (`I3`). Returns whether anything was reset.
    fn reset_stale_children(&mut self) -> bool {
        let n_children = self.tree.as_ref().map_or(0, |t| t.children.len());
        if n_children == 0 {
            return false;
        }
        let current = self.context.clone();
        let mut changed = false;
        if let Some(bounds) = self.bounds.as_mut() {
            let n_values = bounds.domain().len();
            for d_idx in 0..n_values {
                for child_idx in 0..n_children {
                    let stale = match bounds.ctx_of(d_idx, child_idx) {
                        Some(saved) => !ContextStore::compatible(saved, &current),
                        None => false,
                    };
                    if stale {
                        bounds.reset(d_idx, child_idx);
                        changed = true;
                    }
                }
            }
        }
        if changed {
            debug!("{} reset stale child bounds after a context change", self.name);
        }
        changed
    }

    /// `on_value(senderName, value, stamp, threshold?)`.
    pub fn on_value(&mut self, sender: &str, value: V, stamp: u64, threshold: Option<U>) -> Result<(), EngineError> {
        trace!("{} received VALUE from {}: value={:?} stamp={} threshold={:?}", self.name, sender, value, stamp, threshold);
        let msg = Message::Value(ValueMessage {
            sender: sender.to_string(),
            receiver: self.name.clone(),
            value,
            threshold: threshold.unwrap_or_else(U::infinity),
            stamp,
        });
        if self.is_duplicate(&msg) {
            return Ok(());
        }
        self.remember(msg);

        if self.state == State::Uninitialised || self.state == State::Ready {
            self.context.priority_merge(sender, value, stamp);
            return Ok(());
        }
        if self.state == State::Terminated {
            return Ok(());
        }

        let ctx_before = self.context.clone();
        self.context.priority_merge(sender, value, stamp);

        if self.children_is_empty() {
            if !ContextStore::compatible(&ctx_before, &self.context) {
                self.set_delta()?;
                self.init_self();
            }
        } else if self.reset_stale_children() {
            self.set_delta()?;
            self.init_self();
        }

        if self.parent_name().as_deref() == Some(sender) {
            self.threshold = threshold.unwrap_or_else(U::infinity);
        }

        self.backtrack();
        Ok(())
    }

    /// `on_cost(senderName, ctxMap, lb, ub)`.
    pub fn on_cost(&mut self, sender: &str, mut ctx_map: ContextMap<V>, lb: U, ub: U) -> Result<(), EngineError> {
        trace!("{} received COST from {}: lb={:?} ub={:?}", self.name, sender, lb, ub);
        let msg = Message::Cost(CostMessage {
            sender: sender.to_string(),
            receiver: self.name.clone(),
            context: ctx_map.clone(),
            lb,
            ub,
        });
        if self.is_duplicate(&msg) {
            return Ok(());
        }
        self.remember(msg);

        // 1. split off the sender's claim about this variable's own value.
        let self_claim = extract(&mut ctx_map, &self.name);

        // 2. merge ancestor entries, excluding this variable's own children.
        if self.state != State::Terminated {
            let children = self.children_names();
            self.context.priority_merge_many(map_entries(&ctx_map), &children);
            if self.reset_stale_children() {
                self.set_delta()?;
                self.init_self();
            }
        }

        // 3. context-compatibility check against the remaining (ancestor) entries.
        let mut sender_ctx = ContextStore::new();
        sender_ctx.priority_merge_many(map_entries(&ctx_map), &[] as &[&str]);
        if !ContextStore::compatible(&sender_ctx, &self.context) {
            warn!("{} dropped COST from {}: incompatible context", self.name, sender);
            return Ok(());
        }

        // 4. apply the bound update.
        if let Some(child_idx) = self.child_index(sender) {
            match self_claim {
                Some((d_value, _stamp)) => {
                    if let Some(d_idx) = self.domain_index(d_value) {
                        if let Some(bounds) = self.bounds.as_mut() {
                            bounds.update(d_idx, child_idx, lb, ub, sender_ctx.clone());
                        }
                    }
                }
                None => {
                    if let Some(bounds) = self.bounds.as_mut() {
                        for d_idx in 0..self.domain.len() {
                            bounds.update(d_idx, child_idx, lb, ub, sender_ctx.clone());
                        }
                    }
                }
            }
        }

        // 5. backtrack().
        self.backtrack();
        Ok(())
    }

    /// `on_terminate(ctxMap)`.
    pub fn on_terminate(&mut self, sender: &str, ctx_map: ContextMap<V>) -> Result<(), EngineError> {
        trace!("{} received TERMINATE from {}", self.name, sender);
        let msg = Message::Terminate(TerminateMessage {
            sender: sender.to_string(),
            receiver: self.name.clone(),
            context: ctx_map.clone(),
        });
        if self.is_duplicate(&msg) {
            return Ok(());
        }
        self.remember(msg);

        if self.state == State::Uninitialised || self.state == State::Ready {
            return Err(EngineError::TerminateBeforeInit { variable: self.name.clone() });
        }

        self.terminate_flag = true;
        let children = self.children_names();
        // TERMINATE carries the authoritative final ancestor assignments, so
        // this adopts them outright rather than priority-merging (the verb
        // VALUE/COST use) — see `crate::context::ContextStore::adopt_many`.
        self.context.adopt_many(map_entries(&ctx_map), &children);

        if self.children_is_empty() {
            self.set_delta()?;
            self.init_self();
        } else {
            let reset_happened = self.reset_stale_children();
            self.set_delta()?;
            if reset_happened {
                self.init_self();
            }
        }

        self.backtrack();
        Ok(())
    }

    /// Value reselection, termination detection, and message emission.
    fn backtrack(&mut self) {
        if let Some(bounds) = self.bounds.as_mut() {
            bounds.recompute_aggregates();
            self.lb = bounds.lb();
            self.ub = bounds.ub();
        }

        if let (Some(bounds), Some(cur)) = (self.bounds.as_ref(), self.current_assignment) {
            if let Some(i) = self.domain_index(cur) {
                if bounds.lb_of(i) >= self.threshold || bounds.lb_of(i) >= bounds.ub() {
                    let lb_d = bounds.lb_d();
                    if lb_d != cur {
                        self.current_assignment = Some(lb_d);
                        self.stamp += 1;
                        self.trace.push((self.stamp, lb_d));
                        debug!("{} reselected {:?} -> {:?} (stamp {})", self.name, cur, lb_d, self.stamp);
                    }
                }
            }
        }

        let terminate_now = self.terminate_flag || (self.is_root() && self.ub <= self.lb);

        if terminate_now {
            if self.state != State::Terminated {
                self.state = State::Terminated;
                debug!("{} Running -> Terminated", self.name);
                let current = self.current_assignment.expect("a running variable always has an assignment");
                let mut ctx_out = context_to_map(&self.context);
                ctx_out.push((self.name.clone(), current, self.stamp));
                for child in self.children_names() {
                    trace!("{} emits TERMINATE to {}", self.name, child);
                    self.outbox.push(Message::Terminate(TerminateMessage {
                        sender: self.name.clone(),
                        receiver: child,
                        context: ctx_out.clone(),
                    }));
                }
                self.final_assignment = Some(current);
                info!("{} Assignment({}, {:?})", self.name, self.name, current);
            }
            return;
        }

        let tree = match self.tree.as_ref() {
            Some(t) => t,
            None => return,
        };
        let bounds = match self.bounds.as_ref() {
            Some(b) => b,
            None => return,
        };
        let cur = match self.current_assignment {
            Some(v) => v,
            None => return,
        };
        let i = match self.domain_index(cur) {
            Some(i) => i,
            None => return,
        };
        let n_children = tree.children.len();
        let delta_cur = self.delta[i];

        for (k, name) in tree.lower_neighbours().into_iter().enumerate() {
            let child_threshold = if k < n_children {
                let sum_others = (0..n_children).filter(|&j| j != k).fold(U::zero(), |acc, j| acc.add(bounds.lb_child(i, j)));
                self.threshold.min(bounds.ub()).sub(delta_cur).sub(sum_others)
            } else {
                U::infinity()
            };
            trace!("{} emits VALUE to {}: value={:?} threshold={:?} stamp={}", self.name, name, cur, child_threshold, self.stamp);
            self.outbox.push(Message::Value(ValueMessage {
                sender: self.name.clone(),
                receiver: name.to_string(),
                value: cur,
                threshold: child_threshold,
                stamp: self.stamp,
            }));
        }

        if let Some(parent) = tree.parent.clone() {
            trace!("{} emits COST to {}: lb={:?} ub={:?}", self.name, parent, self.lb, self.ub);
            self.outbox.push(Message::Cost(CostMessage {
                sender: self.name.clone(),
                receiver: parent,
                context: context_to_map(&self.context),
                lb: self.lb,
                ub: self.ub,
            }));
        }
    }
}
