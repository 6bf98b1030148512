use crate::{Branch, NodeId, Workflow};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Arena view of a workflow: nodes indexed by `NodeIndex`, edges weighted by
/// their branch label.
///
/// Built leniently. Duplicate node ids keep their first occurrence,
/// connections naming unknown nodes are dropped and self-loops are left out.
/// The validator reports all three, so a workflow that reaches the engine
/// never has any of them.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    graph: DiGraph<NodeId, Option<Branch>>,
    index: HashMap<NodeId, NodeIndex>,
}

impl WorkflowGraph {
    pub fn new(workflow: &Workflow) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in &workflow.nodes {
            if !index.contains_key(&node.id) {
                let idx = graph.add_node(node.id.clone());
                index.insert(node.id.clone(), idx);
            }
        }

        for conn in &workflow.connections {
            if conn.source == conn.target {
                continue;
            }
            if let (Some(&from), Some(&to)) = (index.get(&conn.source), index.get(&conn.target)) {
                graph.add_edge(from, to, conn.branch);
            }
        }

        Self { graph, index }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node_id(&self, idx: NodeIndex) -> &NodeId {
        &self.graph[idx]
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Number of incoming connections
    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Nodes without incoming connections, in declaration order
    pub fn roots(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| self.in_degree(idx) == 0)
            .collect()
    }

    pub fn outgoing(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, Option<Branch>)> + '_ {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
    }

    /// Distinct predecessors, in declaration order
    pub fn predecessors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut preds: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        preds.sort();
        preds.dedup();
        preds
    }

    pub fn reachable_from(&self, start: NodeIndex) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            seen.insert(idx);
        }
        seen
    }

    /// Find a cycle by DFS colouring. The returned path starts and ends on
    /// the same node id, e.g. `[a, b, c, a]`.
    pub fn find_cycle(&self) -> Option<Vec<NodeId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.graph.node_count();
        let mut color = vec![Color::White; n];
        let mut parent: Vec<Option<NodeIndex>> = vec![None; n];

        for start in self.graph.node_indices() {
            if color[start.index()] != Color::White {
                continue;
            }
            color[start.index()] = Color::Gray;
            let mut stack = vec![(start, self.successors(start))];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                match frame.1.pop() {
                    Some(next) => match color[next.index()] {
                        Color::White => {
                            color[next.index()] = Color::Gray;
                            parent[next.index()] = Some(node);
                            stack.push((next, self.successors(next)));
                        }
                        Color::Gray => return Some(self.cycle_path(&parent, node, next)),
                        Color::Black => {}
                    },
                    None => {
                        color[node.index()] = Color::Black;
                        stack.pop();
                    }
                }
            }
        }
        None
    }

    fn successors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Outgoing).collect()
    }

    /// Walk parents from `from` back to `to`, which is still on the DFS stack.
    fn cycle_path(&self, parent: &[Option<NodeIndex>], from: NodeIndex, to: NodeIndex) -> Vec<NodeId> {
        let mut path = vec![from];
        let mut current = from;
        while current != to {
            match parent[current.index()] {
                Some(p) => {
                    path.push(p);
                    current = p;
                }
                None => break,
            }
        }
        path.reverse();
        path.push(to);
        path.into_iter().map(|idx| self.graph[idx].clone()).collect()
    }
}
