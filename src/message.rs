//! The three wire message kinds (`SPEC_FULL.md` §6): VALUE, COST, TERMINATE.
//!
//! The reference transport (`crate::transport`) moves these structs directly
//! over typed `crossbeam_channel` channels rather than through a byte codec —
//! the same choice the teacher's parallel solver makes for its own
//! work-stealing messages. A context-map's reference wire encoding (a
//! length-prefixed sequence of UTF-8 names, paired with a domain-defined
//! value encoding and a utility-defined bound encoding) only has to be
//! realised by an implementor that crosses a process boundary; this crate
//! keeps the context-map as `Vec<(String, V, u64)>`, which is exactly that
//! shape minus the byte-level framing.
use crate::context::ContextStore;
use crate::value::{Utility, Value};

/// `{variable-name -> (value, stamp)}`, flattened to a vector for transport.
pub type ContextMap<V> = Vec<(String, V, u64)>;

/// Snapshots a `ContextStore` into its wire representation.
pub fn context_to_map<V: Value>(store: &ContextStore<V>) -> ContextMap<V> {
    store.iter().map(|(name, entry)| (name.to_string(), entry.value, entry.stamp)).collect()
}

/// Borrows a wire context-map as the `(&str, ContextEntry)` iterator that
/// `ContextStore::priority_merge_many` expects.
pub fn map_entries<V: Value>(map: &ContextMap<V>) -> impl Iterator<Item = (&str, crate::context::ContextEntry<V>)> {
    map.iter().map(|(name, value, stamp)| {
        (
            name.as_str(),
            crate::context::ContextEntry {
                value: *value,
                stamp: *stamp,
            },
        )
    })
}

/// Removes and returns the entry for `name` from a wire context-map, leaving
/// the rest untouched. Used by `on_cost` to split `ctxMap[self]` (the
/// child's claim about this variable's own value) out of the ancestor
/// entries before merging.
pub fn extract<V: Value>(map: &mut ContextMap<V>, name: &str) -> Option<(V, u64)> {
    let index = map.iter().position(|(n, _, _)| n == name)?;
    let (_, value, stamp) = map.remove(index);
    Some((value, stamp))
}

/// `VALUE(sender, receiver, value, threshold, stamp)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMessage<V: Value, U: Utility> {
    pub sender: String,
    pub receiver: String,
    pub value: V,
    pub threshold: U,
    pub stamp: u64,
}

/// `COST(sender, receiver, context-map, lb, ub)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostMessage<V: Value, U: Utility> {
    pub sender: String,
    pub receiver: String,
    pub context: ContextMap<V>,
    pub lb: U,
    pub ub: U,
}

/// `TERMINATE(sender, receiver, context-map)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminateMessage<V: Value> {
    pub sender: String,
    pub receiver: String,
    pub context: ContextMap<V>,
}

/// One of the three algorithm-internal messages, addressed to a single
/// receiver variable. `Message::receiver()` is what the Agent Dispatcher
/// reads to route it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<V: Value, U: Utility> {
    Value(ValueMessage<V, U>),
    Cost(CostMessage<V, U>),
    Terminate(TerminateMessage<V>),
}

impl<V: Value, U: Utility> Message<V, U> {
    pub fn receiver(&self) -> &str {
        match self {
            Message::Value(m) => &m.receiver,
            Message::Cost(m) => &m.receiver,
            Message::Terminate(m) => &m.receiver,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Message::Value(m) => &m.sender,
            Message::Cost(m) => &m.sender,
            Message::Terminate(m) => &m.sender,
        }
    }

    /// The kind tag used to key "most recent message of this kind" for the
    /// idempotence rule (`SPEC_FULL.md` §4.3).
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Value(_) => MessageKind::Value,
            Message::Cost(_) => MessageKind::Cost,
            Message::Terminate(_) => MessageKind::Terminate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Value,
    Cost,
    Terminate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextEntry;

    #[test]
    fn context_round_trips_through_map() {
        let mut store = ContextStore::<i64>::new();
        store.priority_merge("x", 1, 3);
        let map = context_to_map(&store);
        let mut restored = ContextStore::<i64>::new();
        restored.priority_merge_many(map_entries(&map), &[] as &[&str]);
        assert_eq!(restored.entry("x"), Some(ContextEntry { value: 1, stamp: 3 }));
    }

    #[test]
    fn extract_pulls_named_entry_out_of_the_map() {
        let mut map: ContextMap<i64> = vec![("self".to_string(), 2, 5), ("x".to_string(), 1, 1)];
        let extracted = extract(&mut map, "self");
        assert_eq!(extracted, Some((2, 5)));
        assert_eq!(map, vec![("x".to_string(), 1, 1)]);
    }

    #[test]
    fn extract_is_none_when_absent() {
        let mut map: ContextMap<i64> = vec![("x".to_string(), 1, 1)];
        assert_eq!(extract(&mut map, "self"), None);
    }

    #[test]
    fn identical_messages_compare_equal_for_idempotence_checks() {
        let a = Message::<i64, i64>::Value(ValueMessage {
            sender: "x".into(),
            receiver: "y".into(),
            value: 1,
            threshold: 10,
            stamp: 1,
        });
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn messages_differing_in_stamp_are_not_equal() {
        let a = ValueMessage::<i64, i64> {
            sender: "x".into(),
            receiver: "y".into(),
            value: 1,
            threshold: 10,
            stamp: 1,
        };
        let mut b = a.clone();
        b.stamp = 2;
        assert_ne!(a, b);
    }
}
