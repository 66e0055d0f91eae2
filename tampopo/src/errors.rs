#[derive(Debug, Eq, PartialEq)]
pub enum SortError<Node> {
    /// Nodes that could not be ordered because they sit on, or depend on, a cycle.
    CycleDetected(Vec<Node>),
    /// An edge names a node that was never added to the graph.
    UnknownNode(Node),
}

impl<Node: core::fmt::Display + core::fmt::Debug> std::error::Error for SortError<Node> {}

impl<Node: core::fmt::Display> core::fmt::Display for SortError<Node> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SortError::CycleDetected(remaining) => {
                write!(f, "dependency cycle between: ")?;
                for (i, node) in remaining.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", node)?;
                }
                Ok(())
            }
            SortError::UnknownNode(node) => write!(f, "unknown node in edge: {}", node),
        }
    }
}
