//! The fixed, precomputed pseudo-tree neighbourhood that the (out-of-scope)
//! tree-construction collaborator hands each Variable Engine (see
//! `SPEC_FULL.md` §3 "Pseudo-tree relations" and §10).
//!
//! This module does not build a pseudo-tree from a constraint graph; it only
//! describes the shape a already-built one must have, plus a couple of
//! trivial hand-rolled builders (`chain`, `star`) used by the test suite.

/// The neighbour relation of one variable within a depth-first pseudo-tree.
///
/// `separator` and `lower_neighbours` are derived, not stored independently,
/// so that the invariant "`separator[0]` is `parent`" and "the first
/// `children.len()` entries of `lower_neighbours` are `children`" can never
/// drift out of sync with the fields they're derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PseudoTreeView {
    /// This variable's own name.
    pub name: String,
    /// The unique neighbour of strictly higher priority that this variable
    /// reports bounds to. `None` iff this variable is the pseudo-tree root.
    pub parent: Option<String>,
    /// Higher-priority neighbours other than `parent`; this variable tracks
    /// their assignment but does not report bounds to them.
    pub pseudo_parents: Vec<String>,
    /// Lower-priority neighbours for which this variable is `parent`. Order
    /// is significant: it fixes the child index used throughout
    /// `crate::bounds::BoundsTable`.
    pub children: Vec<String>,
    /// Additional lower-priority neighbours beyond `children`.
    pub pseudo_children: Vec<String>,
}

impl PseudoTreeView {
    pub fn new(name: impl Into<String>) -> Self {
        PseudoTreeView {
            name: name.into(),
            parent: None,
            pseudo_parents: Vec::new(),
            children: Vec::new(),
            pseudo_children: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_pseudo_parents(mut self, p: impl IntoIterator<Item = String>) -> Self {
        self.pseudo_parents = p.into_iter().collect();
        self
    }

    pub fn with_children(mut self, c: impl IntoIterator<Item = String>) -> Self {
        self.children = c.into_iter().collect();
        self
    }

    pub fn with_pseudo_children(mut self, c: impl IntoIterator<Item = String>) -> Self {
        self.pseudo_children = c.into_iter().collect();
        self
    }

    /// `separator = [parent] ++ pseudoParents`, with `separator[0]` standing
    /// for `parent` even when absent (encoded as `None`).
    pub fn separator(&self) -> Vec<Option<&str>> {
        let mut sep = vec![self.parent.as_deref()];
        sep.extend(self.pseudo_parents.iter().map(|s| Some(s.as_str())));
        sep
    }

    /// `lowerNeighbours = children ++ pseudoChildren`, with the first
    /// `children.len()` entries being children (defines the child index).
    pub fn lower_neighbours(&self) -> Vec<&str> {
        let mut lnb: Vec<&str> = self.children.iter().map(|s| s.as_str()).collect();
        lnb.extend(self.pseudo_children.iter().map(|s| s.as_str()));
        lnb
    }

    /// True iff this variable is the pseudo-tree root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// True iff this variable is a leaf (no children; it may still have
    /// pseudo-children, which do not receive bound reports).
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True iff this variable is a singleton: no separator and no lower
    /// neighbours at all (see `SPEC_FULL.md` §4.3 "Singleton special case").
    pub fn is_singleton(&self) -> bool {
        self.parent.is_none() && self.pseudo_parents.is_empty() && self.lower_neighbours().is_empty()
    }

    /// Returns the index of `child` within `children`, or `None` if it is
    /// not a child (e.g. it is a pseudo-child or an unrelated variable).
    pub fn child_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|c| c == name)
    }

    /// Returns the index of `neighbour` within `lower_neighbours()`.
    pub fn lower_neighbour_index(&self, name: &str) -> Option<usize> {
        self.lower_neighbours().iter().position(|c| *c == name)
    }
}

/// A simple chain `x1 - x2 - ... - xn`, each variable the parent of the
/// next. Used by scenario tests (S2).
pub fn chain(names: &[&str]) -> Vec<PseudoTreeView> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut view = PseudoTreeView::new(*name);
            if i > 0 {
                view = view.with_parent(names[i - 1]);
            }
            if i + 1 < names.len() {
                view = view.with_children(vec![names[i + 1].to_string()]);
            }
            view
        })
        .collect()
}

/// A star: `root` is parent of every other variable, all of which are
/// leaves. Used by scenario tests.
pub fn star(root: &str, leaves: &[&str]) -> Vec<PseudoTreeView> {
    let mut views = vec![PseudoTreeView::new(root).with_children(leaves.iter().map(|s| s.to_string()))];
    views.extend(leaves.iter().map(|leaf| PseudoTreeView::new(*leaf).with_parent(root)));
    views
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_starts_with_parent() {
        let v = PseudoTreeView::new("y")
            .with_parent("x")
            .with_pseudo_parents(vec!["z".to_string()]);
        assert_eq!(v.separator(), vec![Some("x"), Some("z")]);
    }

    #[test]
    fn root_has_none_as_first_separator_entry() {
        let v = PseudoTreeView::new("x");
        assert_eq!(v.separator(), vec![None]);
        assert!(v.is_root());
    }

    #[test]
    fn lower_neighbours_puts_children_first() {
        let v = PseudoTreeView::new("x")
            .with_children(vec!["a".to_string(), "b".to_string()])
            .with_pseudo_children(vec!["c".to_string()]);
        assert_eq!(v.lower_neighbours(), vec!["a", "b", "c"]);
        assert_eq!(v.child_index("a"), Some(0));
        assert_eq!(v.child_index("c"), None);
        assert_eq!(v.lower_neighbour_index("c"), Some(2));
    }

    #[test]
    fn chain_of_three_wires_parent_and_children() {
        let views = chain(&["x1", "x2", "x3"]);
        assert!(views[0].is_root());
        assert_eq!(views[1].parent.as_deref(), Some("x1"));
        assert_eq!(views[0].children, vec!["x2"]);
        assert_eq!(views[1].children, vec!["x3"]);
        assert!(views[2].is_leaf());
    }

    #[test]
    fn singleton_has_no_separator_and_no_lower_neighbours() {
        let v = PseudoTreeView::new("solo");
        assert!(v.is_singleton());
    }
}
