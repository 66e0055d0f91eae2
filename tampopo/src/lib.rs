// Kahn's algorithm; ties between ready nodes are broken by insertion order.
use errors::SortError;
use std::collections::{BTreeSet, HashMap};
pub mod errors;

/// A directed graph where an edge `(a, b)` means `a` must come before `b`.
#[derive(Debug, Clone)]
pub struct Graph<Node> {
    /// All nodes, in insertion order.
    pub nodes: Vec<Node>,
    /// Ordering constraints between nodes.
    pub edges: Vec<(Node, Node)>,
}

impl<Node: std::hash::Hash + Eq + Clone> Default for Graph<Node> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Node: std::hash::Hash + Eq + Clone> Graph<Node> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Adds a node unless it is already present.
    pub fn add_node(&mut self, node: Node) {
        if !self.nodes.contains(&node) {
            self.nodes.push(node);
        }
    }

    /// Records that `before` has to be emitted ahead of `after`.
    pub fn add_edge(&mut self, before: Node, after: Node) {
        self.edges.push((before, after));
    }
}

/// Orders the nodes of `graph` so every edge points forward.
///
/// Among nodes that are ready at the same time, the one added first wins.
///
/// # Example
/// ```
/// let mut graph = tampopo::Graph::new();
/// graph.add_node("app");
/// graph.add_node("jquery");
/// graph.add_edge("jquery", "app");
///
/// assert_eq!(tampopo::sort_graph(&graph), Ok(vec!["jquery", "app"]));
/// ```
pub fn sort_graph<Node: std::hash::Hash + Eq + Clone>(
    graph: &Graph<Node>,
) -> Result<Vec<Node>, SortError<Node>> {
    let position: HashMap<&Node, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node, index))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); graph.nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; graph.nodes.len()];

    for (before, after) in &graph.edges {
        let from = *position
            .get(before)
            .ok_or_else(|| SortError::UnknownNode(before.clone()))?;
        let to = *position
            .get(after)
            .ok_or_else(|| SortError::UnknownNode(after.clone()))?;

        dependents[from].push(to);
        in_degree[to] += 1;
    }

    // ordered by insertion index, so the earliest ready node is always taken first
    let mut ready: BTreeSet<usize> = (0..graph.nodes.len())
        .filter(|index| in_degree[*index] == 0)
        .collect();

    let mut sorted: Vec<Node> = Vec::with_capacity(graph.nodes.len());

    while let Some(index) = ready.pop_first() {
        sorted.push(graph.nodes[index].clone());

        for &next in &dependents[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if sorted.len() == graph.nodes.len() {
        Ok(sorted)
    } else {
        let remaining = graph
            .nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| in_degree[*index] > 0)
            .map(|(_, node)| node.clone())
            .collect();

        Err(SortError::CycleDetected(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_nodes_keep_insertion_order() {
        let mut graph = Graph::new();
        graph.add_node("c");
        graph.add_node("a");
        graph.add_node("b");

        assert_eq!(sort_graph(&graph), Ok(vec!["c", "a", "b"]));
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph = Graph::new();
        for node in ["bootstrap", "jquery", "popper", "app"] {
            graph.add_node(node);
        }
        graph.add_edge("jquery", "bootstrap");
        graph.add_edge("popper", "bootstrap");
        graph.add_edge("bootstrap", "app");

        let sorted = sort_graph(&graph).unwrap();

        assert_eq!(sorted, vec!["jquery", "popper", "bootstrap", "app"]);
    }

    #[test]
    fn duplicate_nodes_are_ignored() {
        let mut graph = Graph::new();
        graph.add_node(1);
        graph.add_node(1);

        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn cycle_reports_the_stuck_nodes() {
        let mut graph = Graph::new();
        for node in ["a", "b", "c", "d"] {
            graph.add_node(node);
        }
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "b");

        assert_eq!(
            sort_graph(&graph),
            Err(SortError::CycleDetected(vec!["b", "c"]))
        );
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let mut graph = Graph::new();
        graph.add_node("a");
        graph.add_edge("a", "z");

        assert_eq!(sort_graph(&graph), Err(SortError::UnknownNode("z")));
    }
}
