// src/resolver/graph.rs

//! Dependency graph of the planned packages and install ordering
//!
//! Edges point from a package to the planned packages satisfying its
//! requirements. Strongly connected components (dependency cycles) are
//! collapsed into one unit; units come out dependencies first.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Requirement graph over plan-local package ids
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Graph with nodes `0..count`
    pub fn with_nodes(count: usize) -> Self {
        let mut graph = DiGraph::with_capacity(count, count);
        let nodes = (0..count).map(|id| graph.add_node(id)).collect();
        Self { graph, nodes }
    }

    /// `from` requires something `to` provides
    pub fn add_edge(&mut self, from: usize, to: usize) {
        let (a, b) = (self.nodes[from], self.nodes[to]);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Components in install order, dependencies first
    ///
    /// Ids inside a component are sorted; ties between independent
    /// components keep node order, so the result is deterministic.
    pub fn install_order(&self) -> Vec<Vec<usize>> {
        // tarjan_scc yields components in reverse topological order of the
        // edges, which for requirer -> provider edges is providers first
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                let mut ids: Vec<usize> = scc.into_iter().map(|n| self.graph[n]).collect();
                ids.sort_unstable();
                ids
            })
            .collect()
    }

    /// Ids reachable from `roots`, roots included
    pub fn reachable(&self, roots: impl IntoIterator<Item = usize>, allowed: impl Fn(usize) -> bool) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = roots.into_iter().filter(|&r| allowed(r)).collect();

        while let Some(id) = stack.pop() {
            if seen[id] {
                continue;
            }
            seen[id] = true;
            for next in self.graph.neighbors(self.nodes[id]) {
                let next = self.graph[next];
                if !seen[next] && allowed(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Ids that can reach a node for which `is_bad` holds
    pub fn tainted(&self, is_bad: impl Fn(usize) -> bool) -> Vec<bool> {
        let mut bad: Vec<bool> = (0..self.nodes.len()).map(&is_bad).collect();
        let mut changed = true;
        while changed {
            changed = false;
            for edge in self.graph.raw_edges() {
                let (from, to) = (self.graph[edge.source()], self.graph[edge.target()]);
                if bad[to] && !bad[from] {
                    bad[from] = true;
                    changed = true;
                }
            }
        }
        bad
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(order: &[Vec<usize>], id: usize) -> usize {
        order.iter().position(|c| c.contains(&id)).unwrap()
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        // 0 -> 1 -> 2
        let mut g = DependencyGraph::with_nodes(3);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        let order = g.install_order();
        assert_eq!(order, vec![vec![2], vec![1], vec![0]]);
    }

    #[test]
    fn test_cycle_is_one_component() {
        // 0 -> 1 <-> 2, 2 -> 3
        let mut g = DependencyGraph::with_nodes(4);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(2, 1);
        g.add_edge(2, 3);
        let order = g.install_order();
        assert_eq!(order.len(), 3);
        assert!(order.contains(&vec![1, 2]));
        assert!(position(&order, 3) < position(&order, 1));
        assert!(position(&order, 1) < position(&order, 0));
    }

    #[test]
    fn test_reachable_and_tainted() {
        // 0 -> 1 -> 2, 3 -> 2, 3 -> 4
        let mut g = DependencyGraph::with_nodes(5);
        g.add_edge(0, 1);
        g.add_edge(1, 2);
        g.add_edge(3, 2);
        g.add_edge(3, 4);

        let bad = g.tainted(|id| id == 4);
        assert_eq!(bad, vec![false, false, false, true, true]);

        let keep = g.reachable([0, 3], |id| !bad[id]);
        assert_eq!(keep, vec![true, true, true, false, false]);
    }
}
