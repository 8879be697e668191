//! The Context Store (`SPEC_FULL.md` §4.2): one variable's belief about what
//! its ancestors are currently assigned, and the compatibility test that
//! governs whether a child's reported bounds may still be trusted.
use metrohash::MetroHashMap;

use crate::value::Value;

/// A single ancestor's believed assignment, versioned by `stamp` so that
/// racing VALUE messages can be ordered without relying on delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextEntry<V: Value> {
    pub value: V,
    pub stamp: u64,
}

/// `{ancestor name -> (value, stamp)}`, with last-write-wins-by-stamp merge
/// semantics (`SPEC_FULL.md` §4.2).
#[derive(Debug, Clone, Default)]
pub struct ContextStore<V: Value> {
    entries: MetroHashMap<String, ContextEntry<V>>,
}

impl<V: Value> ContextStore<V> {
    pub fn new() -> Self {
        ContextStore {
            entries: MetroHashMap::default(),
        }
    }

    /// Writes `(value, stamp)` for `sender` iff no entry exists yet or the
    /// existing entry's stamp is *strictly* less than `stamp`. Equal or
    /// lower stamps are dropped, which is what makes repeated delivery of
    /// the same VALUE message a no-op (P8).
    pub fn priority_merge(&mut self, sender: &str, value: V, stamp: u64) -> bool {
        match self.entries.get(sender) {
            Some(existing) if existing.stamp >= stamp => false,
            _ => {
                self.entries.insert(sender.to_string(), ContextEntry { value, stamp });
                true
            }
        }
    }

    /// Applies `priority_merge` for every entry of `other` whose key is not
    /// in `exclude` (used by the COST handler to avoid re-absorbing a
    /// child's own belief about itself as if it were an ancestor
    /// assignment). Returns true iff at least one entry changed.
    pub fn priority_merge_many<'a>(
        &mut self,
        other: impl IntoIterator<Item = (&'a str, ContextEntry<V>)>,
        exclude: &[impl AsRef<str>],
    ) -> bool {
        let mut changed = false;
        for (name, entry) in other {
            if exclude.iter().any(|e| e.as_ref() == name) {
                continue;
            }
            changed |= self.priority_merge(name, entry.value, entry.stamp);
        }
        changed
    }

    /// Overwrites the entry for every `(name, entry)` of `other` whose key
    /// is not in `exclude`, unconditionally — unlike `priority_merge`, an
    /// existing entry with an equal or higher stamp does not block the
    /// write. Used by the TERMINATE handler (`SPEC_FULL.md` §4.3), which
    /// carries the authoritative final ancestor assignments: the spec
    /// describes that step as *adopting* the ancestor portion of the
    /// message as the Context Store, not merging it, since nothing
    /// downstream of a TERMINATE can legitimately out-race it for the same
    /// ancestor (P7 monotonicity still holds: the stamps TERMINATE carries
    /// are each an ancestor's final one, so adopting them can only move a
    /// stamp forward, never backward).
    pub fn adopt_many<'a>(&mut self, other: impl IntoIterator<Item = (&'a str, ContextEntry<V>)>, exclude: &[impl AsRef<str>]) {
        for (name, entry) in other {
            if exclude.iter().any(|e| e.as_ref() == name) {
                continue;
            }
            self.entries.insert(name.to_string(), entry);
        }
    }

    /// Looks up the currently believed value of `name`, ignoring its stamp.
    pub fn value_of(&self, name: &str) -> Option<V> {
        self.entries.get(name).map(|e| e.value)
    }

    pub fn entry(&self, name: &str) -> Option<ContextEntry<V>> {
        self.entries.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ContextEntry<V>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `compatible(a, b)`: true iff every key present in both maps agrees on
    /// its value. Stamps are ignored (`SPEC_FULL.md` §4.2).
    pub fn compatible(a: &Self, b: &Self) -> bool {
        let (smaller, larger) = if a.entries.len() <= b.entries.len() {
            (a, b)
        } else {
            (b, a)
        };
        smaller
            .entries
            .iter()
            .all(|(k, v)| larger.entries.get(k).map_or(true, |other| other.value == v.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_merge_accepts_strictly_higher_stamp() {
        let mut ctx = ContextStore::<i64>::new();
        assert!(ctx.priority_merge("x", 0, 1));
        assert!(ctx.priority_merge("x", 1, 2));
        assert_eq!(ctx.value_of("x"), Some(1));
    }

    #[test]
    fn priority_merge_drops_equal_or_lower_stamp() {
        let mut ctx = ContextStore::<i64>::new();
        ctx.priority_merge("x", 0, 5);
        assert!(!ctx.priority_merge("x", 1, 5));
        assert!(!ctx.priority_merge("x", 1, 4));
        assert_eq!(ctx.value_of("x"), Some(0));
    }

    #[test]
    fn duplicate_delivery_is_a_no_op() {
        let mut ctx = ContextStore::<i64>::new();
        ctx.priority_merge("x", 1, 3);
        let before = ctx.clone().iter().collect::<Vec<_>>();
        ctx.priority_merge("x", 1, 3);
        let after = ctx.iter().collect::<Vec<_>>();
        assert_eq!(before, after);
    }

    #[test]
    fn compatible_ignores_stamps_and_disjoint_keys() {
        let mut a = ContextStore::<i64>::new();
        a.priority_merge("x", 1, 100);
        let mut b = ContextStore::<i64>::new();
        b.priority_merge("x", 1, 1);
        b.priority_merge("y", 9, 1);
        assert!(ContextStore::compatible(&a, &b));
    }

    #[test]
    fn incompatible_when_shared_key_disagrees() {
        let mut a = ContextStore::<i64>::new();
        a.priority_merge("x", 1, 1);
        let mut b = ContextStore::<i64>::new();
        b.priority_merge("x", 2, 1);
        assert!(!ContextStore::compatible(&a, &b));
    }

    #[test]
    fn priority_merge_many_respects_exclude_set() {
        let mut ctx = ContextStore::<i64>::new();
        let mut other = ContextStore::<i64>::new();
        other.priority_merge("x", 1, 1);
        other.priority_merge("child", 7, 1);
        let entries: Vec<(&str, ContextEntry<i64>)> = other.iter().collect();
        ctx.priority_merge_many(entries, &["child"]);
        assert_eq!(ctx.value_of("x"), Some(1));
        assert_eq!(ctx.value_of("child"), None);
    }

    #[test]
    fn adopt_many_overwrites_even_a_higher_existing_stamp() {
        let mut ctx = ContextStore::<i64>::new();
        ctx.priority_merge("x", 0, 100);
        let mut other = ContextStore::<i64>::new();
        other.priority_merge("x", 1, 1);
        other.priority_merge("child", 7, 1);
        let entries: Vec<(&str, ContextEntry<i64>)> = other.iter().collect();
        ctx.adopt_many(entries, &["child"]);
        assert_eq!(ctx.entry("x"), Some(ContextEntry { value: 1, stamp: 1 }));
        assert_eq!(ctx.value_of("child"), None);
    }
}
