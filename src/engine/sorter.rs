use crate::engine::target::{Target, TargetKey};
use crate::engine::BuildError;
use std::collections::HashSet;
use std::sync::Arc;

/// Linearize the graph rooted at `root` so every predecessor appears before
/// its successors.
///
/// Depth-first post-order with two marker sets: `visited` is permanent,
/// `on_stack` tracks the active recursion path. Meeting an `on_stack` node
/// again is a cyclic dependency and fails the build before any other work
/// starts; meeting a `visited` node again is ordinary diamond sharing.
///
/// Side effect: the first touch of a node clears its `outdated` flag, giving
/// the prepare phase a clean slate.
pub fn sort(root: &Arc<dyn Target>) -> Result<Vec<Arc<dyn Target>>, BuildError> {
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut ordered = Vec::new();
    visit(root, &mut visited, &mut on_stack, &mut ordered)?;
    Ok(ordered)
}

fn visit(
    target: &Arc<dyn Target>,
    visited: &mut HashSet<TargetKey>,
    on_stack: &mut HashSet<TargetKey>,
    ordered: &mut Vec<Arc<dyn Target>>,
) -> Result<(), BuildError> {
    let key = TargetKey::of(target);
    if on_stack.contains(&key) {
        return Err(BuildError::CyclicDependency);
    }
    if !visited.insert(key) {
        return Ok(());
    }

    target.state().mark(false);

    on_stack.insert(key);
    for predecessor in target.predecessors() {
        visit(&predecessor, visited, on_stack, ordered)?;
    }
    on_stack.remove(&key);

    ordered.push(Arc::clone(target));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::target::TargetState;
    use std::sync::Mutex;

    struct Node {
        name: &'static str,
        state: TargetState,
        preds: Mutex<Vec<Arc<dyn Target>>>,
    }

    impl Node {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                state: TargetState::new(),
                preds: Mutex::new(Vec::new()),
            })
        }

        fn depends_on(self: &Arc<Self>, pred: &Arc<Node>) {
            self.preds
                .lock()
                .unwrap()
                .push(Arc::clone(pred) as Arc<dyn Target>);
        }
    }

    impl Target for Node {
        fn state(&self) -> &TargetState {
            &self.state
        }
        fn predecessors(&self) -> Vec<Arc<dyn Target>> {
            self.preds.lock().unwrap().clone()
        }
    }

    fn names(ordered: &[Arc<dyn Target>], nodes: &[&Arc<Node>]) -> Vec<&'static str> {
        ordered
            .iter()
            .map(|t| {
                nodes
                    .iter()
                    .find(|n| TargetKey::of(&((**n).clone() as Arc<dyn Target>)) == TargetKey::of(t))
                    .map(|n| n.name)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_predecessors_come_first() {
        let a = Node::new("a");
        let b = Node::new("b");
        let c = Node::new("c");
        b.depends_on(&a);
        c.depends_on(&b);

        let root: Arc<dyn Target> = c.clone();
        let ordered = sort(&root).unwrap();
        assert_eq!(names(&ordered, &[&a, &b, &c]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_diamond_visits_each_node_once() {
        let a = Node::new("a");
        let b = Node::new("b");
        let c = Node::new("c");
        let d = Node::new("d");
        b.depends_on(&a);
        c.depends_on(&a);
        d.depends_on(&b);
        d.depends_on(&c);

        let root: Arc<dyn Target> = d.clone();
        let ordered = sort(&root).unwrap();
        assert_eq!(ordered.len(), 4);
        let order = names(&ordered, &[&a, &b, &c, &d]);
        assert_eq!(order[0], "a");
        assert_eq!(order[3], "d");
    }

    #[test]
    fn test_duplicate_predecessor_tolerated() {
        let a = Node::new("a");
        let b = Node::new("b");
        b.depends_on(&a);
        b.depends_on(&a);

        let root: Arc<dyn Target> = b.clone();
        let ordered = sort(&root).unwrap();
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let a = Node::new("a");
        let b = Node::new("b");
        a.depends_on(&b);
        b.depends_on(&a);

        let root: Arc<dyn Target> = a.clone();
        assert!(matches!(sort(&root), Err(BuildError::CyclicDependency)));
    }

    #[test]
    fn test_self_cycle_is_rejected() {
        let a = Node::new("a");
        a.depends_on(&a);

        let root: Arc<dyn Target> = a.clone();
        assert!(matches!(sort(&root), Err(BuildError::CyclicDependency)));
    }

    #[test]
    fn test_sort_clears_outdated() {
        let a = Node::new("a");
        a.state.set_outdated();

        let root: Arc<dyn Target> = a.clone();
        sort(&root).unwrap();
        assert!(!a.state.is_outdated());
    }
}
