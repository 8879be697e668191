//! The pre-processing heuristic's interface with the Variable Engine
//! (`SPEC_FULL.md` §6, §10): a per-value lower bound on this variable's own
//! subtree cost, `h(self, ·)`, and a scalar lower bound per child,
//! `h_child(c)`. Computing a *good* heuristic is out of scope; this module
//! only carries the numbers and supplies the trivial all-zero heuristic
//! (always admissible, since costs are non-negative) used by default.
use std::collections::HashMap;

use crate::value::{Utility, Value};

/// The heuristic bounds handed to one Variable Engine.
#[derive(Debug, Clone)]
pub struct HeuristicView<V: Value, U: Utility> {
    h_self: HashMap<V, U>,
    h_child: HashMap<String, U>,
}

impl<V: Value, U: Utility> HeuristicView<V, U> {
    /// The trivial, always-admissible heuristic: zero for every value and
    /// every child. Sound for any non-negative-cost DCOP, if uninformative.
    pub fn trivial() -> Self {
        HeuristicView {
            h_self: HashMap::new(),
            h_child: HashMap::new(),
        }
    }

    pub fn with_self(mut self, value: V, bound: U) -> Self {
        self.h_self.insert(value, bound);
        self
    }

    pub fn with_child(mut self, child: impl Into<String>, bound: U) -> Self {
        self.h_child.insert(child.into(), bound);
        self
    }

    /// Mutating counterpart to `with_self`, for recording `h(self, ·)` bounds
    /// as they arrive one message at a time (`on_heuristic`).
    pub fn set_self(&mut self, value: V, bound: U) {
        self.h_self.insert(value, bound);
    }

    /// Mutating counterpart to `with_child`, for recording `h_child(c)` one
    /// message at a time (`on_child_heuristic`).
    pub fn set_child(&mut self, child: impl Into<String>, bound: U) {
        self.h_child.insert(child.into(), bound);
    }

    /// `h(self, d)`: zero if no explicit bound was recorded for `d`.
    pub fn h_self(&self, value: V) -> U {
        self.h_self.get(&value).copied().unwrap_or_else(U::zero)
    }

    /// `h_child(c)`: zero if no explicit bound was recorded for `c`.
    pub fn h_child(&self, child: &str) -> U {
        self.h_child.get(child).copied().unwrap_or_else(U::zero)
    }
}

impl<V: Value, U: Utility> Default for HeuristicView<V, U> {
    fn default() -> Self {
        Self::trivial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_heuristic_is_zero_everywhere() {
        let h = HeuristicView::<i64, i64>::trivial();
        assert_eq!(h.h_self(0), 0);
        assert_eq!(h.h_child("y"), 0);
    }

    #[test]
    fn recorded_bounds_are_returned() {
        let h = HeuristicView::<i64, i64>::trivial().with_self(2, 5).with_child("y", 3);
        assert_eq!(h.h_self(2), 5);
        assert_eq!(h.h_self(1), 0);
        assert_eq!(h.h_child("y"), 3);
        assert_eq!(h.h_child("z"), 0);
    }
}
