use std::cmp::{max, min};
use std::marker::PhantomData;

use ahash::AHashSet;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

// Iteration cap in case the callback is not monotone and the computation
// never converges. The cube of the node count is a generous over-estimate of
// the iterations a converging traversal can need, capped so the product
// stays around a minute of work even at a nanosecond per iteration.
// 3914 = (60e9)^(1/3), rounded down.
const MAX_NODE_COUNT_FOR_ITERATION_LIMIT: usize = 3914;

/// Updates the state of the destination node when an edge is traversed.
pub trait EdgeCallback<N, E> {
    /// Only `destination` may be mutated (through interior mutability).
    /// Returns whether the destination's state changed.
    fn traverseEdge(&mut self, source: &N, e: &E, destination: &N) -> bool;
}

/// A work-set driven fixed-point computation over a directed graph: state
/// changes are pushed from each node to its successors until nothing changes
/// any more.
pub struct FixedPointGraphTraversal<N, E, C>
where
    C: EdgeCallback<N, E>,
{
    callback: C,
    _n: PhantomData<N>,
    _e: PhantomData<E>,
}

impl<N, E, C> FixedPointGraphTraversal<N, E, C>
where
    C: EdgeCallback<N, E>,
{
    /// Creates a traversal that pushes state from a node along its outgoing
    /// edges.
    pub fn newTraversal(callback: C) -> Self {
        Self {
            callback,
            _n: PhantomData,
            _e: PhantomData,
        }
    }

    pub fn computeFixedPoint(&mut self, graph: &DiGraph<N, E>) {
        let mut work_set: AHashSet<NodeIndex> = graph.node_indices().collect();
        let node_count = min(graph.node_count(), MAX_NODE_COUNT_FOR_ITERATION_LIMIT);
        let max_iterations = max(node_count * node_count * node_count, 100);

        let mut cycle_count = 0;
        while !work_set.is_empty() && cycle_count < max_iterations {
            let node = *work_set.iter().next().unwrap();
            work_set.remove(&node);
            // Any edge that changed its destination re-queues the
            // destination so its own out-edges get traversed again.
            for edge in graph.edges(node) {
                let dest = edge.target();
                if self
                    .callback
                    .traverseEdge(&graph[node], edge.weight(), &graph[dest])
                {
                    work_set.insert(dest);
                }
            }
            cycle_count += 1;
        }

        debug_assert!(
            cycle_count != max_iterations,
            "fixed point computation not halting"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MaxPropagator;

    impl EdgeCallback<Cell<u32>, ()> for MaxPropagator {
        fn traverseEdge(&mut self, source: &Cell<u32>, _e: &(), dest: &Cell<u32>) -> bool {
            if source.get() > dest.get() {
                dest.set(source.get());
                true
            } else {
                false
            }
        }
    }

    #[test]
    fn converges_on_cycles() {
        // a -> b -> c -> a, with c also feeding d.
        let mut graph = DiGraph::new();
        let a = graph.add_node(Cell::new(3));
        let b = graph.add_node(Cell::new(1));
        let c = graph.add_node(Cell::new(2));
        let d = graph.add_node(Cell::new(0));
        graph.add_edge(a, b, ());
        graph.add_edge(b, c, ());
        graph.add_edge(c, a, ());
        graph.add_edge(c, d, ());

        FixedPointGraphTraversal::newTraversal(MaxPropagator).computeFixedPoint(&graph);

        for n in [a, b, c, d] {
            assert_eq!(graph[n].get(), 3);
        }
    }
}
