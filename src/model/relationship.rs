//! Internal (same-prefix) relationship model (spec §3).

use serde::{Deserialize, Serialize};

/// Relationship label for an edge between two concepts of the same prefix.
/// Stored in canonical direction — child → parent for `IsA`, deprecated →
/// successor for `ReplacedBy` (spec §9 redesign flag) — with
/// `descendants()`/`ancestors()` exposed as explicit traversal operations
/// by the graph store rather than by reversing the edge at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipLabel {
    /// Subclass relation, child → parent.
    IsA,
    PartOf,
    PrecededBy,
    /// Deprecated term → successor term.
    ReplacedBy,
    /// Fallback used when a loader does not supply a label.
    RelatedTo,
}

impl RelationshipLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipLabel::IsA => "IS_A",
            RelationshipLabel::PartOf => "PART_OF",
            RelationshipLabel::PrecededBy => "PRECEDED_BY",
            RelationshipLabel::ReplacedBy => "REPLACED_BY",
            RelationshipLabel::RelatedTo => "related_to",
        }
    }
}

impl Default for RelationshipLabel {
    fn default() -> Self {
        RelationshipLabel::RelatedTo
    }
}

/// A directed edge between two concepts of the same prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalRelationship {
    pub from_concept_id: String,
    pub to_concept_id: String,
    pub label: RelationshipLabel,
}

impl InternalRelationship {
    pub fn new(
        from_concept_id: impl Into<String>,
        to_concept_id: impl Into<String>,
        label: RelationshipLabel,
    ) -> Self {
        Self {
            from_concept_id: from_concept_id.into(),
            to_concept_id: to_concept_id.into(),
            label,
        }
    }
}

/// An in-memory graph of internal relationships for one vocabulary, as
/// produced by a loader before it is handed to the graph store.
#[derive(Debug, Clone, Default)]
pub struct InternalGraph {
    pub edges: Vec<InternalRelationship>,
}

impl InternalGraph {
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    pub fn add_edge(
        &mut self,
        from_concept_id: impl Into<String>,
        to_concept_id: impl Into<String>,
        label: RelationshipLabel,
    ) {
        self.edges
            .push(InternalRelationship::new(from_concept_id, to_concept_id, label));
    }

    /// Checks the IS_A subgraph is acyclic (spec §8 invariant). Used by
    /// loaders as a post-parse sanity check before handing the graph to the
    /// orchestrator.
    pub fn is_a_subgraph_is_acyclic(&self) -> bool {
        use std::collections::{HashMap, HashSet};

        let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in self
            .edges
            .iter()
            .filter(|e| e.label == RelationshipLabel::IsA)
        {
            children
                .entry(edge.from_concept_id.as_str())
                .or_default()
                .push(edge.to_concept_id.as_str());
        }

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut seen: HashSet<&str> = HashSet::new();

        fn visit<'a>(
            node: &'a str,
            children: &HashMap<&'a str, Vec<&'a str>>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> bool {
            match marks.get(node) {
                Some(Mark::Done) => return true,
                Some(Mark::Visiting) => return false,
                None => {}
            }
            marks.insert(node, Mark::Visiting);
            if let Some(kids) = children.get(node) {
                for kid in kids {
                    if !visit(kid, children, marks) {
                        return false;
                    }
                }
            }
            marks.insert(node, Mark::Done);
            true
        }

        for node in children.keys() {
            seen.insert(node);
        }
        for node in seen {
            if !visit(node, &children, &mut marks) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_is_a_graph_passes() {
        let mut g = InternalGraph::new();
        g.add_edge("child", "parent", RelationshipLabel::IsA);
        g.add_edge("grandchild", "child", RelationshipLabel::IsA);
        assert!(g.is_a_subgraph_is_acyclic());
    }

    #[test]
    fn cyclic_is_a_graph_fails() {
        let mut g = InternalGraph::new();
        g.add_edge("a", "b", RelationshipLabel::IsA);
        g.add_edge("b", "c", RelationshipLabel::IsA);
        g.add_edge("c", "a", RelationshipLabel::IsA);
        assert!(!g.is_a_subgraph_is_acyclic());
    }

    #[test]
    fn non_is_a_cycles_are_ignored() {
        let mut g = InternalGraph::new();
        g.add_edge("a", "b", RelationshipLabel::PartOf);
        g.add_edge("b", "a", RelationshipLabel::PartOf);
        assert!(g.is_a_subgraph_is_acyclic());
    }
}
