use crate::engine::target::Target;
use crate::engine::BuildError;
use rayon::prelude::*;
use std::sync::Arc;

/// Run the prepare phase over the topologically sorted target list and return
/// the outdated subset, still in dependency order.
///
/// Every target gets exactly one `prepare()` call, fanned out over a
/// work-stealing pool of up to `max_threads` workers. A `true` return marks
/// the target outdated; prepare hooks may also mark *other* targets, and the
/// pool join guarantees those cross-writes are visible before the promotion
/// sweep runs.
pub fn run(
    max_threads: usize,
    sorted: &[Arc<dyn Target>],
) -> Result<Vec<Arc<dyn Target>>, BuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build()?;

    pool.install(|| {
        sorted.par_iter().for_each(|target| {
            if target.prepare() {
                target.state().set_outdated();
            }
        });
    });

    // Transitive promotion: the list is already sorted, so one linear sweep
    // carries staleness all the way up the graph.
    for target in sorted {
        if target.state().is_outdated() {
            continue;
        }
        if target
            .predecessors()
            .iter()
            .any(|pred| pred.state().is_outdated())
        {
            target.state().set_outdated();
        }
    }

    Ok(sorted
        .iter()
        .filter(|target| target.state().is_outdated())
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sorter;
    use crate::engine::target::TargetState;
    use std::sync::Mutex;

    struct Node {
        state: TargetState,
        preds: Mutex<Vec<Arc<dyn Target>>>,
        stale: bool,
        marks: Mutex<Vec<Arc<dyn Target>>>,
    }

    impl Node {
        fn new(stale: bool) -> Arc<Self> {
            Arc::new(Self {
                state: TargetState::new(),
                preds: Mutex::new(Vec::new()),
                stale,
                marks: Mutex::new(Vec::new()),
            })
        }

        fn depends_on(self: &Arc<Self>, pred: &Arc<Node>) {
            self.preds
                .lock()
                .unwrap()
                .push(Arc::clone(pred) as Arc<dyn Target>);
        }

        fn also_marks(self: &Arc<Self>, other: &Arc<Node>) {
            self.marks
                .lock()
                .unwrap()
                .push(Arc::clone(other) as Arc<dyn Target>);
        }
    }

    impl Target for Node {
        fn state(&self) -> &TargetState {
            &self.state
        }
        fn predecessors(&self) -> Vec<Arc<dyn Target>> {
            self.preds.lock().unwrap().clone()
        }
        fn prepare(&self) -> bool {
            for other in self.marks.lock().unwrap().iter() {
                other.state().set_outdated();
            }
            self.stale
        }
    }

    fn sorted_chain(nodes: &[&Arc<Node>]) -> Vec<Arc<dyn Target>> {
        let root: Arc<dyn Target> = Arc::clone(nodes.last().unwrap()) as Arc<dyn Target>;
        sorter::sort(&root).unwrap()
    }

    #[test]
    fn test_all_clean_yields_empty() {
        let a = Node::new(false);
        let b = Node::new(false);
        b.depends_on(&a);

        let outdated = run(2, &sorted_chain(&[&a, &b])).unwrap();
        assert!(outdated.is_empty());
    }

    #[test]
    fn test_staleness_propagates_up_chain() {
        let a = Node::new(true);
        let b = Node::new(false);
        let c = Node::new(false);
        b.depends_on(&a);
        c.depends_on(&b);

        let outdated = run(2, &sorted_chain(&[&a, &b, &c])).unwrap();
        assert_eq!(outdated.len(), 3);
        assert!(c.state.is_outdated());
    }

    #[test]
    fn test_cross_target_mark_feeds_promotion() {
        // "a" is clean itself but gets marked by an unrelated target's
        // prepare; its dependents must still be promoted.
        let a = Node::new(false);
        let b = Node::new(false);
        b.depends_on(&a);
        let marker = Node::new(false);
        marker.also_marks(&a);
        b.depends_on(&marker);

        let outdated = run(2, &sorted_chain(&[&a, &marker, &b])).unwrap();
        assert_eq!(outdated.len(), 2);
        assert!(a.state.is_outdated());
        assert!(b.state.is_outdated());
        assert!(!marker.state.is_outdated());
    }
}
