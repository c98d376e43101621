use std::fmt;

use crate::id::{IdSpace, Identifier};
use crate::node_info::NodeInfo;

/// Per-node routing state: the finger table and the predecessor pointer.
///
/// Entry `i` caches the successor of `local.id + 2^i` as of its last refresh.
/// Entry 0 is the immediate successor. The table is a cache; nothing here
/// guarantees the entries are current.
#[derive(Clone, Debug)]
pub struct RoutingTable {
    local: NodeInfo,
    fingers: Vec<NodeInfo>,
    predecessor: Option<NodeInfo>,
    next_finger: usize,
}

impl RoutingTable {
    /// All fingers point back at `local`, no predecessor known.
    pub fn new(local: NodeInfo, size: usize) -> Self {
        RoutingTable {
            fingers: vec![local.clone(); size.max(1)],
            local,
            predecessor: None,
            next_finger: 0,
        }
    }

    pub fn local(&self) -> &NodeInfo {
        &self.local
    }

    pub fn len(&self) -> usize {
        self.fingers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingers.is_empty()
    }

    pub fn successor(&self) -> &NodeInfo {
        &self.fingers[0]
    }

    pub fn set_successor(&mut self, node: NodeInfo) {
        self.fingers[0] = node;
    }

    /// True when this node is its own successor, i.e. it is alone in the ring.
    pub fn is_alone(&self) -> bool {
        self.fingers[0].same_node(&self.local)
    }

    pub fn finger(&self, index: usize) -> Option<&NodeInfo> {
        self.fingers.get(index)
    }

    pub fn set_finger(&mut self, index: usize, node: NodeInfo) {
        if let Some(slot) = self.fingers.get_mut(index) {
            *slot = node;
        }
    }

    pub fn fingers(&self) -> &[NodeInfo] {
        &self.fingers
    }

    pub fn predecessor(&self) -> Option<&NodeInfo> {
        self.predecessor.as_ref()
    }

    pub fn set_predecessor(&mut self, node: Option<NodeInfo>) {
        self.predecessor = node;
    }

    /// Clears the predecessor only if it is still `expected`; a pointer
    /// replaced in the meantime is left alone.
    pub fn clear_predecessor_if(&mut self, expected: &NodeInfo) -> bool {
        match &self.predecessor {
            Some(current) if current == expected => {
                self.predecessor = None;
                true
            }
            _ => false,
        }
    }

    /// Bootstrap state for the first node of a ring.
    pub fn reset_to_self(&mut self) {
        for finger in &mut self.fingers {
            *finger = self.local.clone();
        }
        self.predecessor = Some(self.local.clone());
        self.next_finger = 0;
    }

    /// Returns the finger index due for refresh and advances the cursor.
    pub fn next_finger_to_fix(&mut self) -> usize {
        let index = self.next_finger;
        self.next_finger = (self.next_finger + 1) % self.fingers.len();
        index
    }

    /// Highest finger strictly inside `(local.id, id)`, or `local` if none is.
    pub fn closest_preceding_finger(&self, space: &IdSpace, id: &Identifier) -> NodeInfo {
        self.fingers
            .iter()
            .rev()
            .find(|finger| space.excl_excl(finger.id(), self.local.id(), id))
            .cloned()
            .unwrap_or_else(|| self.local.clone())
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "node {}", self.local)?;
        match &self.predecessor {
            Some(p) => writeln!(f, "  predecessor {p}")?,
            None => writeln!(f, "  predecessor <none>")?,
        }
        for (i, finger) in self.fingers.iter().enumerate() {
            writeln!(f, "  finger[{i}] {finger}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(space: &IdSpace, id: u64) -> NodeInfo {
        NodeInfo::new(space.id(id), format!("n{id}"))
    }

    #[test]
    fn fresh_table_points_at_itself() {
        let space = IdSpace::with_modulus(100).unwrap();
        let table = RoutingTable::new(node(&space, 10), 7);
        assert_eq!(table.len(), 7);
        assert!(table.is_alone());
        assert!(table.fingers().iter().all(|f| f.same_node(table.local())));
        assert!(table.predecessor().is_none());
    }

    #[test]
    fn closest_preceding_finger_stays_inside_the_open_range() {
        let space = IdSpace::with_modulus(100).unwrap();
        let mut table = RoutingTable::new(node(&space, 10), 7);
        // starts 11 12 14 18 26 42 74
        for (i, id) in [50, 50, 50, 50, 50, 50, 90].into_iter().enumerate() {
            table.set_finger(i, node(&space, id));
        }

        assert_eq!(table.closest_preceding_finger(&space, &space.id(55)), node(&space, 50));
        assert_eq!(table.closest_preceding_finger(&space, &space.id(95)), node(&space, 90));
        assert_eq!(table.closest_preceding_finger(&space, &space.id(5)), node(&space, 90));
        // 90 is not strictly before 90
        assert_eq!(table.closest_preceding_finger(&space, &space.id(90)), node(&space, 50));
        // nothing lies in (10, 30)
        assert_eq!(table.closest_preceding_finger(&space, &space.id(30)), node(&space, 10));
        // (10, 10) is empty
        assert_eq!(table.closest_preceding_finger(&space, &space.id(10)), node(&space, 10));

        for target in 0..100 {
            let hop = table.closest_preceding_finger(&space, &space.id(target));
            assert!(
                hop.same_node(table.local())
                    || space.excl_excl(hop.id(), table.local().id(), &space.id(target)),
                "hop {hop} for target {target}"
            );
        }
    }

    #[test]
    fn refresh_cursor_is_round_robin() {
        let space = IdSpace::new(8).unwrap();
        let mut table = RoutingTable::new(node(&space, 1), 3);
        let order: Vec<usize> = (0..7).map(|_| table.next_finger_to_fix()).collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn predecessor_is_only_cleared_when_unchanged() {
        let space = IdSpace::new(8).unwrap();
        let mut table = RoutingTable::new(node(&space, 1), 3);
        table.set_predecessor(Some(node(&space, 200)));

        assert!(!table.clear_predecessor_if(&node(&space, 100)));
        assert_eq!(table.predecessor(), Some(&node(&space, 200)));
        assert!(table.clear_predecessor_if(&node(&space, 200)));
        assert!(table.predecessor().is_none());
    }

    #[test]
    fn bootstrap_sets_everything_to_self() {
        let space = IdSpace::new(8).unwrap();
        let mut table = RoutingTable::new(node(&space, 1), 3);
        table.set_finger(2, node(&space, 7));
        table.reset_to_self();
        assert!(table.fingers().iter().all(|f| f == table.local()));
        assert_eq!(table.predecessor(), Some(table.local()));
    }
}
