//! Turning a flat closure result into linked nodes.
//!
//! Both functions are pure: they take the starting record and the records a
//! closure query returned, build call-scoped indexes, and hand back wrapped
//! nodes. The input rows are never modified.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::error::{ArborError, Result};
use crate::key::{Key, KeyHasher};
use crate::proxy::{Ancestor, Descendant, Subtree, WithPreloadedParent};
use crate::schema::{Model, key_at, primary_key_of};
use crate::settings::BrokenLinkPolicy;

/// Links the ancestors of `start` into a chain, nearest ancestor first.
///
/// Each entry's preloaded parent is the entry after it; the last entry is the
/// root, whose parent is `None`. `start` itself is not part of the chain.
pub fn ancestors<M: Model>(
    start: &M,
    rows: Vec<M>,
    primary_key: &str,
    foreign_key: &str,
    broken_links: BrokenLinkPolicy,
) -> Result<Vec<Ancestor<M>>> {
    let mut by_key: HashMap<Key, M, KeyHasher> =
        HashMap::with_capacity_and_hasher(rows.len(), KeyHasher::default());
    for row in rows {
        by_key.insert(primary_key_of(&row, primary_key)?, row);
    }

    let mut chain: Vec<&M> = Vec::with_capacity(by_key.len());
    let mut current_key = primary_key_of(start, primary_key)?;
    let mut next = key_at(start, foreign_key)?;
    while let Some(parent_key) = next {
        match by_key.get(&parent_key) {
            // a chain can never be longer than the rows fetched for it
            Some(_) if chain.len() == by_key.len() => break,
            Some(parent) => {
                next = key_at(parent, foreign_key)?;
                current_key = parent_key;
                chain.push(parent);
            }
            None => {
                let resolved = chain
                    .iter()
                    .map(|record| primary_key_of(*record, primary_key))
                    .collect::<Result<Vec<_>>>()?;
                match broken_links {
                    BrokenLinkPolicy::Fail => {
                        return Err(ArborError::BrokenReference {
                            from: current_key,
                            missing: parent_key,
                            resolved,
                        });
                    }
                    BrokenLinkPolicy::Truncate => {
                        warn!(
                            table = %M::table().name(),
                            from = %current_key,
                            missing = %parent_key,
                            resolved = resolved.len(),
                            "ancestor chain truncated at a dangling parent"
                        );
                        break;
                    }
                }
            }
        }
    }

    // link from the root down so every entry can point at its parent
    let mut parent: Option<Ancestor<M>> = None;
    let mut lineage = Vec::with_capacity(chain.len());
    for record in chain.into_iter().rev() {
        let entry = Ancestor::new(record.clone(), parent.take());
        parent = Some(entry.clone());
        lineage.push(entry);
    }
    lineage.reverse();
    Ok(lineage)
}

/// Lists the descendants of `start` breadth first.
///
/// Rows are grouped by parent key in the order they arrived, so an ordering
/// applied by the query decides the order of siblings, and of cousins
/// through their parents, but never moves a node to another level.
pub fn descendants<M: Model>(
    start: &M,
    rows: Vec<M>,
    primary_key: &str,
    foreign_key: &str,
) -> Result<Vec<Descendant<M>>> {
    let mut keys = Vec::with_capacity(rows.len());
    let mut children_of: HashMap<Key, Vec<usize>, KeyHasher> = HashMap::default();
    for (i, row) in rows.iter().enumerate() {
        keys.push(primary_key_of(row, primary_key)?);
        if let Some(parent) = key_at(row, foreign_key)? {
            children_of.entry(parent).or_default().push(i);
        }
    }
    let start_key = primary_key_of(start, primary_key)?;
    let no_children: Vec<usize> = Vec::new();
    let kids = |key: &Key| children_of.get(key).unwrap_or(&no_children);

    // level order of every row reachable from start, each row at most once
    let mut level_order = Vec::with_capacity(rows.len());
    let mut seen: HashSet<usize, KeyHasher> = HashSet::default();
    let mut frontier: VecDeque<&Key> = VecDeque::from([&start_key]);
    while let Some(key) = frontier.pop_front() {
        for &child in kids(key) {
            if seen.insert(child) {
                level_order.push(child);
                frontier.push_back(&keys[child]);
            }
        }
    }

    // deepest rows first, so children exist before the subtree holding them
    let mut built: HashMap<usize, Subtree<M>, KeyHasher> =
        HashMap::with_capacity_and_hasher(level_order.len(), KeyHasher::default());
    for &i in level_order.iter().rev() {
        let children = kids(&keys[i])
            .iter()
            .filter_map(|child| built.get(child).cloned())
            .collect();
        built.insert(i, Subtree::new(rows[i].clone(), children));
    }
    let root_children = kids(&start_key)
        .iter()
        .filter_map(|child| built.get(child).cloned())
        .collect();
    let root = Subtree::new(start.clone(), root_children);

    let mut listing = Vec::with_capacity(level_order.len());
    let mut queue = VecDeque::from([root]);
    while let Some(node) = queue.pop_front() {
        for child in node.preloaded_children() {
            queue.push_back(child.clone());
            listing.push(WithPreloadedParent::new(child.clone(), Some(node.clone())));
        }
    }
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::ClosureRow;
    use crate::proxy::Node;
    use crate::schema::Table;
    use rusqlite::types::Value;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: i64,
        parent_id: Option<i64>,
    }

    impl Model for Item {
        fn table() -> Table {
            Table::new("items", "id", vec!["id", "parent_id"])
        }
        fn hydrate(row: &ClosureRow) -> Result<Self> {
            Ok(Item { id: row.get("id")?, parent_id: row.get("parent_id")? })
        }
        fn value(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(Value::Integer(self.id)),
                "parent_id" => Some(self.parent_id.map_or(Value::Null, Value::Integer)),
                _ => None,
            }
        }
    }

    fn item(id: i64, parent_id: Option<i64>) -> Item {
        Item { id, parent_id }
    }

    fn ids<N: Node>(nodes: &[N]) -> Vec<Key> {
        nodes.iter().map(|n| n.key().unwrap()).collect()
    }

    #[test]
    fn chain_is_nearest_first_whatever_the_row_order() {
        let rows = vec![item(1, None), item(3, Some(2)), item(2, Some(1))];
        let chain = ancestors(&item(4, Some(3)), rows, "id", "parent_id", BrokenLinkPolicy::Fail).unwrap();
        assert_eq!(ids(&chain), vec![Key::from(3), Key::from(2), Key::from(1)]);
        for pair in chain.windows(2) {
            assert_eq!(pair[0].preloaded_parent().as_ref(), Some(&pair[1]));
        }
        assert!(chain[2].preloaded_parent().is_none());
    }

    #[test]
    fn dangling_parent_fails_with_the_partial_chain() {
        // 3 -> 2 -> 9, but 9 was never fetched
        let rows = vec![item(2, Some(9)), item(3, Some(2))];
        let err = ancestors(&item(4, Some(3)), rows, "id", "parent_id", BrokenLinkPolicy::Fail).unwrap_err();
        match err {
            ArborError::BrokenReference { from, missing, resolved } => {
                assert_eq!(from, Key::from(2));
                assert_eq!(missing, Key::from(9));
                assert_eq!(resolved, vec![Key::from(3), Key::from(2)]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dangling_parent_truncates_when_asked_to() {
        let rows = vec![item(2, Some(9)), item(3, Some(2))];
        let chain = ancestors(&item(4, Some(3)), rows, "id", "parent_id", BrokenLinkPolicy::Truncate).unwrap();
        assert_eq!(ids(&chain), vec![Key::from(3), Key::from(2)]);
        assert!(chain[1].preloaded_parent().is_none());
    }

    #[test]
    fn immediate_parent_missing_is_broken_too() {
        let err = ancestors(&item(4, Some(3)), Vec::new(), "id", "parent_id", BrokenLinkPolicy::Fail).unwrap_err();
        assert!(matches!(err, ArborError::BrokenReference { ref resolved, .. } if resolved.is_empty()));
    }

    #[test]
    fn cyclic_rows_stop_once_every_row_is_used() {
        let rows = vec![item(1, Some(2)), item(2, Some(1))];
        let chain = ancestors(&item(3, Some(1)), rows, "id", "parent_id", BrokenLinkPolicy::Fail).unwrap();
        assert_eq!(ids(&chain), vec![Key::from(1), Key::from(2)]);
    }

    #[test]
    fn cyclic_rows_list_each_row_once() {
        // 1 -> 2 -> 3 -> 1
        let rows = vec![item(2, Some(1)), item(3, Some(2)), item(1, Some(3))];
        let listing = descendants(&item(1, Some(3)), rows, "id", "parent_id").unwrap();
        assert_eq!(ids(&listing), vec![Key::from(2), Key::from(3), Key::from(1)]);
    }

    #[test]
    fn descendants_come_level_by_level() {
        // 1 -> {2, 3}, 2 -> {4}, 3 -> {5}, 4 -> {6}; rows deliberately shuffled
        let rows = vec![item(6, Some(4)), item(2, Some(1)), item(5, Some(3)), item(3, Some(1)), item(4, Some(2))];
        let listing = descendants(&item(1, None), rows, "id", "parent_id").unwrap();
        assert_eq!(
            ids(&listing),
            vec![Key::from(2), Key::from(3), Key::from(4), Key::from(5), Key::from(6)]
        );
        let parents: Vec<i64> = listing.iter().map(|d| d.preloaded_parent().as_ref().unwrap().id).collect();
        assert_eq!(parents, vec![1, 1, 2, 3, 4]);
    }

    #[test]
    fn arrival_order_decides_siblings() {
        let forward = vec![item(2, Some(1)), item(3, Some(1)), item(4, Some(2))];
        let backward = vec![item(4, Some(2)), item(3, Some(1)), item(2, Some(1))];
        let a = descendants(&item(1, None), forward, "id", "parent_id").unwrap();
        let b = descendants(&item(1, None), backward, "id", "parent_id").unwrap();
        assert_eq!(ids(&a), vec![Key::from(2), Key::from(3), Key::from(4)]);
        assert_eq!(ids(&b), vec![Key::from(3), Key::from(2), Key::from(4)]);
    }

    #[test]
    fn every_level_has_its_children_preloaded() {
        let rows = vec![item(2, Some(1)), item(3, Some(2)), item(4, Some(3))];
        let listing = descendants(&item(1, None), rows, "id", "parent_id").unwrap();
        let top = &listing[0];
        let second = &top.preloaded_children()[0];
        let third = &second.preloaded_children()[0];
        assert_eq!(third.id, 4);
        assert!(third.preloaded_children().is_empty());
    }

    #[test]
    fn leaf_has_no_descendants() {
        assert!(descendants(&item(7, Some(1)), Vec::new(), "id", "parent_id").unwrap().is_empty());
    }
}
