//! Dependency graph over task indices.
//!
//! Design:
//! - Nodes are declaration indices (`0..len`), so every traversal can use the
//!   declaration order as a deterministic tie-break.
//! - Forward edges: task -> tasks it depends on (waits for)
//! - Reverse edges: task -> tasks that depend on it (waiting tasks)
//! - Invariant: edges and reverse_edges must be kept in sync

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};

/// Visit state for three-colour depth-first search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Forward edges, in the order they were added.
    edges: Vec<Vec<usize>>,

    /// Reverse edges, in the order they were added.
    /// O(1) answer to "who is waiting for this task?"
    reverse_edges: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Create a graph with `len` nodes and no edges.
    pub fn with_nodes(len: usize) -> Self {
        Self {
            edges: vec![Vec::new(); len],
            reverse_edges: vec![Vec::new(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Add a dependency: `task` depends on `depends_on`.
    ///
    /// Example: add_dependency(b, a) means "B waits for A".
    /// Adding the same edge twice is a no-op.
    pub fn add_dependency(&mut self, task: usize, depends_on: usize) {
        if self.edges[task].contains(&depends_on) {
            return;
        }
        self.edges[task].push(depends_on);
        self.reverse_edges[depends_on].push(task);
    }

    pub fn dependencies(&self, task: usize) -> &[usize] {
        &self.edges[task]
    }

    pub fn dependents(&self, task: usize) -> &[usize] {
        &self.reverse_edges[task]
    }

    /// Find a dependency cycle.
    ///
    /// Roots are tried in index order and dependencies in insertion order, so
    /// the same graph always reports the same cycle. The returned path follows
    /// "depends on" edges and starts and ends with the same node.
    pub fn detect_cycle(&self) -> Option<Vec<usize>> {
        let mut colors = vec![Color::White; self.len()];
        let mut path = Vec::new();

        for start in 0..self.len() {
            if colors[start] == Color::White
                && let Some(cycle) = self.dfs_cycle(start, &mut colors, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: usize,
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        colors[node] = Color::Gray;
        path.push(node);

        for &dep in &self.edges[node] {
            match colors[dep] {
                Color::Gray => {
                    // `dep` is on the current path: the cycle is the path suffix
                    // starting at `dep`, closed by `dep` again.
                    let start = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_cycle(dep, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        colors[node] = Color::Black;
        path.pop();
        None
    }

    /// Topological order by Kahn's algorithm.
    ///
    /// Among ready nodes the lowest index goes first. Returns `None` when the
    /// graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.edges.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &waiting in &self.reverse_edges[node] {
                in_degree[waiting] -= 1;
                if in_degree[waiting] == 0 {
                    ready.push(Reverse(waiting));
                }
            }
        }

        (order.len() == self.len()).then_some(order)
    }

    /// Every node reachable through "depended on by" edges, breadth first.
    pub fn descendants(&self, task: usize) -> Vec<usize> {
        self.bfs(task, &self.reverse_edges)
    }

    /// Every node reachable through "depends on" edges, breadth first.
    pub fn ancestors(&self, task: usize) -> Vec<usize> {
        self.bfs(task, &self.edges)
    }

    fn bfs(&self, start: usize, adjacency: &[Vec<usize>]) -> Vec<usize> {
        let mut seen = vec![false; self.len()];
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        seen[start] = true;

        while let Some(node) = queue.pop_front() {
            for &next in &adjacency[node] {
                if !seen[next] {
                    seen[next] = true;
                    out.push(next);
                    queue.push_back(next);
                }
            }
        }
        out
    }
}
