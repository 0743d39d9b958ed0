use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use super::node::TreeNode;

/// Ordered set of weak node references, keyed by `(depth, identity)`.
///
/// Draining hands out the live nodes in non-decreasing depth order and empties the set,
/// so nodes marked dirty while a phase runs are picked up by the next drain.
pub struct DirtySet<T: ?Sized + TreeNode> {
    nodes: BTreeMap<(u32, usize), Weak<T>>,
}

impl<T: ?Sized + TreeNode> Default for DirtySet<T> {
    fn default() -> Self {
        Self { nodes: BTreeMap::new() }
    }
}

impl<T: ?Sized + TreeNode> std::fmt::Debug for DirtySet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtySet").field("len", &self.nodes.len()).finish()
    }
}

fn identity<T: ?Sized>(node: &Arc<T>) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

impl<T: ?Sized + TreeNode> DirtySet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Returns `false` when it was already present.
    pub fn insert(&mut self, node: &Arc<T>) -> bool {
        self.nodes
            .insert((node.depth(), identity(node)), Arc::downgrade(node))
            .is_none()
    }

    pub fn remove(&mut self, node: &Arc<T>) -> bool {
        self.nodes.remove(&(node.depth(), identity(node))).is_some()
    }

    pub fn contains(&self, node: &Arc<T>) -> bool {
        self.nodes.contains_key(&(node.depth(), identity(node)))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Empties the set and returns the nodes that are still alive, shallowest first.
    pub fn drain(&mut self) -> Vec<Arc<T>> {
        std::mem::take(&mut self.nodes)
            .into_values()
            .filter_map(|weak| weak.upgrade())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node(u32);

    impl TreeNode for Node {
        fn depth(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn drain_orders_by_depth_and_empties_the_set() {
        let mut set: DirtySet<Node> = DirtySet::new();
        let deep = Arc::new(Node(5));
        let root = Arc::new(Node(0));
        let mid = Arc::new(Node(2));

        set.insert(&deep);
        set.insert(&root);
        set.insert(&mid);
        assert!(!set.insert(&mid));

        let depths: Vec<u32> = set.drain().iter().map(|n| n.0).collect();
        assert_eq!(depths, vec![0, 2, 5]);
        assert!(set.is_empty());
    }

    #[test]
    fn expired_nodes_are_skipped() {
        let mut set: DirtySet<Node> = DirtySet::new();
        let kept = Arc::new(Node(1));
        {
            let dropped = Arc::new(Node(0));
            set.insert(&dropped);
        }
        set.insert(&kept);

        let drained = set.drain();
        assert_eq!(drained.len(), 1);
        assert!(Arc::ptr_eq(&drained[0], &kept));
    }

    #[test]
    fn same_depth_nodes_are_distinct_by_identity() {
        let mut set: DirtySet<dyn TreeNode> = DirtySet::new();
        let a: Arc<dyn TreeNode> = Arc::new(Node(3));
        let b: Arc<dyn TreeNode> = Arc::new(Node(3));

        assert!(set.insert(&a));
        assert!(set.insert(&b));
        assert!(set.contains(&a));
        assert!(set.remove(&a));
        assert_eq!(set.len(), 1);
    }
}
