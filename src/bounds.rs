//! The Bounds Table (`SPEC_FULL.md` §4.1): per domain value, the per-child
//! lower/upper bounds and saved contexts, their sums, and the aggregated
//! `LB`/`UB` with their argmins.
//!
//! The table is deliberately ignorant of *how* `delta(d)` and `h(self, d)`
//! are computed: the Variable Engine supplies them at the two points where
//! they can change (`set_delta`, `set_heuristic`), and the table only ever
//! recomputes the arithmetic identities in §3 from whatever was supplied
//! last. This mirrors the teacher's `Critical` struct in
//! `implementation/solver/parallel.rs`, which likewise keeps the shared
//! bookkeeping struct free of policy about *when* to update it.
use crate::context::ContextStore;
use crate::value::{Utility, Value};

struct PerValue<V: Value, U: Utility> {
    lb: Vec<U>,
    ub: Vec<U>,
    ctx: Vec<Option<ContextStore<V>>>,
    lb_sum: U,
    ub_sum: U,
    delta: U,
    h: U,
    /// `LB(d)`, refreshed by `recompute_value`.
    lb_val: U,
    /// `UB(d)`, refreshed by `recompute_value`.
    ub_val: U,
}

impl<V: Value, U: Utility> PerValue<V, U> {
    fn new(n_children: usize) -> Self {
        PerValue {
            lb: vec![U::zero(); n_children],
            ub: vec![U::infinity(); n_children],
            ctx: (0..n_children).map(|_| None).collect(),
            lb_sum: U::zero(),
            ub_sum: if n_children == 0 { U::zero() } else { U::infinity() },
            delta: U::zero(),
            h: U::zero(),
            lb_val: U::zero(),
            ub_val: if n_children == 0 { U::zero() } else { U::infinity() },
        }
    }

    fn recompute(&mut self) {
        self.lb_sum = self.lb.iter().fold(U::zero(), |acc, x| acc.add(*x));
        self.ub_sum = self.ub.iter().fold(U::zero(), |acc, x| acc.add(*x));
        self.lb_val = self.h.max(self.delta.add(self.lb_sum));
        self.ub_val = self.delta.add(self.ub_sum);
    }
}

/// The per-variable, per-value bound bookkeeping described in §4.1.
pub struct BoundsTable<V: Value, U: Utility> {
    domain: Vec<V>,
    n_children: usize,
    per_value: Vec<PerValue<V, U>>,
    lb: U,
    ub: U,
    lb_d_index: usize,
    ub_d_index: usize,
}

impl<V: Value, U: Utility> BoundsTable<V, U> {
    /// Builds a fresh table for a variable whose domain is `domain` (in the
    /// fixed iteration order used to break ties in `recompute_aggregates`)
    /// and that has `n_children` children (lower neighbours that receive
    /// bound reports; pseudo-children do not occupy a slot here).
    pub fn new(domain: Vec<V>, n_children: usize) -> Self {
        assert!(!domain.is_empty(), "a variable must have a non-empty domain");
        let per_value = (0..domain.len()).map(|_| PerValue::new(n_children)).collect();
        let mut table = BoundsTable {
            domain,
            n_children,
            per_value,
            lb: U::zero(),
            ub: U::infinity(),
            lb_d_index: 0,
            ub_d_index: 0,
        };
        table.recompute_aggregates();
        table
    }

    pub fn domain(&self) -> &[V] {
        &self.domain
    }

    pub fn index_of(&self, value: V) -> Option<usize> {
        self.domain.iter().position(|v| *v == value)
    }

    /// `init_child(d, childIndex, h_c)`. We seed `lb[childIndex] = 0` rather
    /// than `h_c` (the tighter of the two sound choices per §9's open
    /// question — see `DESIGN.md`); `h_c` is accepted for interface parity
    /// with the spec but does not otherwise affect the bookkeeping, since
    /// `h(self, d)` already dominates `LB(d)` via the `max` in
    /// `recompute`.
    pub fn init_child(&mut self, d_index: usize, child_index: usize, _h_child: U) {
        self.per_value[d_index].lb[child_index] = U::zero();
        self.per_value[d_index].ub[child_index] = U::infinity();
        self.per_value[d_index].ctx[child_index] = None;
        self.per_value[d_index].recompute();
    }

    /// `update(d, childIndex, newLb, newUb)`, additionally recording the
    /// context the child's report was computed against (folding in the
    /// Variable Engine's `ctx[d*][idx(sender)] = ctxMap` step from §4.3).
    pub fn update(&mut self, d_index: usize, child_index: usize, new_lb: U, new_ub: U, ctx: ContextStore<V>) {
        let pv = &mut self.per_value[d_index];
        pv.lb[child_index] = pv.lb[child_index].max(new_lb);
        pv.ub[child_index] = pv.ub[child_index].min(new_ub);
        pv.ctx[child_index] = Some(ctx);
        pv.recompute();
    }

    /// `reset(d, childIndex)`: drop a child's bound and saved context back
    /// to the uninformative default because its context went stale.
    pub fn reset(&mut self, d_index: usize, child_index: usize) {
        let pv = &mut self.per_value[d_index];
        pv.lb[child_index] = U::zero();
        pv.ub[child_index] = U::infinity();
        pv.ctx[child_index] = None;
        pv.recompute();
    }

    /// Records `delta(d)` and refreshes `LB(d)`/`UB(d)`.
    pub fn set_delta(&mut self, d_index: usize, delta: U) {
        self.per_value[d_index].delta = delta;
        self.per_value[d_index].recompute();
    }

    /// Records `h(self, d)` and refreshes `LB(d)`/`UB(d)`.
    pub fn set_heuristic(&mut self, d_index: usize, h: U) {
        self.per_value[d_index].h = h;
        self.per_value[d_index].recompute();
    }

    pub fn lb_sum(&self, d_index: usize) -> U {
        self.per_value[d_index].lb_sum
    }

    pub fn ub_sum(&self, d_index: usize) -> U {
        self.per_value[d_index].ub_sum
    }

    pub fn lb_of(&self, d_index: usize) -> U {
        self.per_value[d_index].lb_val
    }

    pub fn ub_of(&self, d_index: usize) -> U {
        self.per_value[d_index].ub_val
    }

    pub fn lb_child(&self, d_index: usize, child_index: usize) -> U {
        self.per_value[d_index].lb[child_index]
    }

    pub fn ub_child(&self, d_index: usize, child_index: usize) -> U {
        self.per_value[d_index].ub[child_index]
    }

    pub fn ctx_of(&self, d_index: usize, child_index: usize) -> Option<&ContextStore<V>> {
        self.per_value[d_index].ctx[child_index].as_ref()
    }

    /// Refreshes the aggregated `LB`, `UB`, `lbD`, `ubD` from the per-value
    /// `LB(d)`/`UB(d)`, breaking ties by domain iteration order (the first
    /// value encountered that achieves the minimum wins, so `lbD`/`ubD`
    /// always denote a concrete value even under ties).
    pub fn recompute_aggregates(&mut self) {
        let mut lb = self.per_value[0].lb_val;
        let mut ub = self.per_value[0].ub_val;
        let mut lb_d = 0;
        let mut ub_d = 0;
        for (i, pv) in self.per_value.iter().enumerate().skip(1) {
            if pv.lb_val < lb {
                lb = pv.lb_val;
                lb_d = i;
            }
            if pv.ub_val < ub {
                ub = pv.ub_val;
                ub_d = i;
            }
        }
        self.lb = lb;
        self.ub = ub;
        self.lb_d_index = lb_d;
        self.ub_d_index = ub_d;
    }

    pub fn lb(&self) -> U {
        self.lb
    }

    pub fn ub(&self) -> U {
        self.ub
    }

    pub fn lb_d(&self) -> V {
        self.domain[self.lb_d_index]
    }

    pub fn ub_d(&self) -> V {
        self.domain[self.ub_d_index]
    }

    /// Checks the accounting identities P1-P3 for every domain value; used
    /// by tests and debug assertions, not by the hot path.
    #[cfg(test)]
    fn check_accounting_identities(&self) {
        for pv in &self.per_value {
            let lb_sum = pv.lb.iter().fold(U::zero(), |acc, x| acc.add(*x));
            let ub_sum = pv.ub.iter().fold(U::zero(), |acc, x| acc.add(*x));
            assert_eq!(pv.lb_sum, lb_sum, "P1 violated: lbSum");
            assert_eq!(pv.ub_sum, ub_sum, "P1 violated: ubSum");
            assert_eq!(pv.lb_val, pv.h.max(pv.delta.add(lb_sum)), "P2 violated");
            assert_eq!(pv.ub_val, pv.delta.add(ub_sum), "P3 violated");
        }
    }

    pub fn n_children(&self) -> usize {
        self.n_children
    }
}
