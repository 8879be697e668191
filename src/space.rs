//! The minimal utility-space surface the Variable Engine needs at its
//! boundary (`SPEC_FULL.md` §10). The join/project/iterate algebra proper,
//! and any parsing of richer constraint formats, remain out of scope: this
//! module only supplies a concrete, testable `ConstraintSpace` plus a `join`
//! combinator so that end-to-end scenarios can be expressed without a full
//! DCOP front-end.
use std::collections::HashMap;

use crate::value::{Utility, Value};

/// A lookup from ancestor variable name to its currently believed value,
/// as handed to a `ConstraintSpace` while evaluating `delta(d)`. Backed by
/// `crate::context::ContextStore::value_of` in the engine proper, and by a
/// plain closure in tests.
pub type AncestorLookup<'a, V> = dyn Fn(&str) -> Option<V> + 'a;

/// One constraint this variable is responsible for: the join of all spaces
/// assigned to a variable by the (out-of-scope) tree constructor is what
/// `SPEC_FULL.md` §3 calls `space(self)`.
pub trait ConstraintSpace<V: Value, U: Utility>: Send + Sync {
    /// Local cost contribution of assigning `self_value` to this variable,
    /// given a way to look up what this variable currently believes its
    /// ancestors are assigned. An ancestor this space depends on but that is
    /// absent from the lookup contributes zero (`SPEC_FULL.md` §3).
    fn cost(&self, self_value: V, ancestors: &AncestorLookup<V>) -> U;
}

/// The simplest concrete `ConstraintSpace`: an explicit cost table over this
/// variable plus a fixed, small set of other (ancestor) variables. Entries
/// not present in the table fall back to a caller-chosen default (typically
/// `U::zero()`).
///
/// The table is keyed by a vector whose first element is this variable's own
/// candidate value, followed by one value per entry of `scope`, in order.
pub struct TableConstraint<V: Value, U: Utility> {
    /// The other variables (by name) this constraint depends on, in the
    /// order their values appear in table keys.
    pub scope: Vec<String>,
    table: HashMap<Vec<V>, U>,
    default: U,
}

impl<V: Value, U: Utility> TableConstraint<V, U> {
    pub fn new(scope: Vec<String>) -> Self {
        TableConstraint {
            scope,
            table: HashMap::new(),
            default: U::zero(),
        }
    }

    pub fn with_default(mut self, default: U) -> Self {
        self.default = default;
        self
    }

    /// Records the cost for one concrete assignment: `self_value` followed
    /// by one value per variable in `scope`, in order.
    pub fn set(&mut self, mut key: Vec<V>, cost: U) -> &mut Self {
        debug_assert_eq!(key.len(), self.scope.len() + 1, "key must cover self + scope");
        key.shrink_to_fit();
        self.table.insert(key, cost);
        self
    }
}

impl<V: Value, U: Utility> ConstraintSpace<V, U> for TableConstraint<V, U> {
    fn cost(&self, self_value: V, ancestors: &AncestorLookup<V>) -> U {
        let mut key = Vec::with_capacity(self.scope.len() + 1);
        key.push(self_value);
        for name in &self.scope {
            match ancestors(name) {
                Some(v) => key.push(v),
                None => return U::zero(),
            }
        }
        self.table.get(&key).copied().unwrap_or(self.default)
    }
}

/// The join of zero or more constraint spaces assigned to one variable: the
/// sum of their individual costs. An empty join is the always-zero space,
/// matching "if no space is assigned, the effective local cost is zero"
/// (`SPEC_FULL.md` §3).
pub struct JoinedSpace<V: Value, U: Utility> {
    spaces: Vec<Box<dyn ConstraintSpace<V, U>>>,
}

impl<V: Value, U: Utility> JoinedSpace<V, U> {
    pub fn new(spaces: Vec<Box<dyn ConstraintSpace<V, U>>>) -> Self {
        JoinedSpace { spaces }
    }

    pub fn empty() -> Self {
        JoinedSpace { spaces: Vec::new() }
    }
}

impl<V: Value, U: Utility> ConstraintSpace<V, U> for JoinedSpace<V, U> {
    fn cost(&self, self_value: V, ancestors: &AncestorLookup<V>) -> U {
        self.spaces
            .iter()
            .fold(U::zero(), |acc, space| acc.add(space.cost(self_value, ancestors)))
    }
}

/// Joins several constraint spaces into one, in the style of the join
/// operator over utility spaces that `SPEC_FULL.md` §3 attributes to the
/// (out-of-scope) problem layer.
pub fn join<V: Value, U: Utility>(spaces: Vec<Box<dyn ConstraintSpace<V, U>>>) -> JoinedSpace<V, U> {
    JoinedSpace::new(spaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn lookup(map: &Map<String, i64>) -> impl Fn(&str) -> Option<i64> + '_ {
        move |name| map.get(name).copied()
    }

    #[test]
    fn unary_table_ignores_scope() {
        let mut t = TableConstraint::<i64, i64>::new(vec![]);
        t.set(vec![0], 7).set(vec![1], 3).set(vec![2], 5);
        let empty = Map::new();
        assert_eq!(t.cost(0, &lookup(&empty)), 7);
        assert_eq!(t.cost(1, &lookup(&empty)), 3);
        assert_eq!(t.cost(2, &lookup(&empty)), 5);
    }

    #[test]
    fn binary_table_looks_up_named_ancestor() {
        let mut t = TableConstraint::<i64, i64>::new(vec!["x".to_string()]);
        // |self - x|
        for s in 0..2 {
            for x in 0..2 {
                t.set(vec![s, x], if s == x { 0 } else { 1 });
            }
        }
        let mut ctx = Map::new();
        ctx.insert("x".to_string(), 1);
        assert_eq!(t.cost(0, &lookup(&ctx)), 1);
        assert_eq!(t.cost(1, &lookup(&ctx)), 0);
    }

    #[test]
    fn missing_ancestor_contributes_zero() {
        let mut t = TableConstraint::<i64, i64>::new(vec!["x".to_string()]);
        t.set(vec![0, 0], 99);
        let empty = Map::new();
        assert_eq!(t.cost(0, &lookup(&empty)), 0);
    }

    #[test]
    fn join_of_spaces_sums_costs() {
        let mut a = TableConstraint::<i64, i64>::new(vec![]);
        a.set(vec![0], 2).set(vec![1], 4);
        let mut b = TableConstraint::<i64, i64>::new(vec![]);
        b.set(vec![0], 10).set(vec![1], 20);
        let j = join::<i64, i64>(vec![Box::new(a), Box::new(b)]);
        let empty = Map::new();
        assert_eq!(j.cost(0, &lookup(&empty)), 12);
        assert_eq!(j.cost(1, &lookup(&empty)), 24);
    }

    #[test]
    fn empty_join_is_always_zero() {
        let j = JoinedSpace::<i64, i64>::empty();
        let empty = Map::new();
        assert_eq!(j.cost(0, &lookup(&empty)), 0);
    }
}
