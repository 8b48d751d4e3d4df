use super::schema::FilterContext;
use crate::error::FilterError;
use crate::graph::{Traversal, __};
use graphsync_common::FilterInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipDirection {
    /// Edges pointing at the current vertex.
    In,
    /// Edges leaving the current vertex.
    Out,
    Both,
}

/// An edge label walked in a fixed direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub edge_label: String,
    pub direction: RelationshipDirection,
}

impl Relationship {
    pub fn new(edge_label: impl Into<String>, direction: RelationshipDirection) -> Self {
        Self {
            edge_label: edge_label.into(),
            direction,
        }
    }

    pub fn out(edge_label: impl Into<String>) -> Self {
        Self::new(edge_label, RelationshipDirection::Out)
    }

    pub fn in_(edge_label: impl Into<String>) -> Self {
        Self::new(edge_label, RelationshipDirection::In)
    }

    pub fn both(edge_label: impl Into<String>) -> Self {
        Self::new(edge_label, RelationshipDirection::Both)
    }

    /// Anonymous traversal stepping from a vertex to its related vertices.
    pub fn walk(&self) -> Traversal {
        match self.direction {
            RelationshipDirection::Out => __::out(self.edge_label.as_str()),
            RelationshipDirection::In => __::in_(self.edge_label.as_str()),
            RelationshipDirection::Both => __::both(self.edge_label.as_str()),
        }
    }
}

/// Keeps elements with at least one related vertex that matches the nested
/// filter named `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipFilter {
    relationship: Relationship,
    target: String,
}

impl RelationshipFilter {
    pub fn new(relationship: Relationship, target: impl Into<String>) -> Self {
        Self {
            relationship,
            target: target.into(),
        }
    }

    pub fn relationship(&self) -> &Relationship {
        &self.relationship
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn apply(
        &self,
        traversal: Traversal,
        input: &FilterInput,
        ctx: &FilterContext<'_>,
    ) -> Result<Traversal, FilterError> {
        let ctx = ctx.descend()?;
        let target = ctx.schema().get(&self.target)?;
        let side = target.apply(self.relationship.walk(), input, &ctx)?;
        Ok(traversal.where_(side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Step;

    #[test]
    fn test_walk_direction() {
        assert_eq!(Relationship::out("FOLLOWS").walk().steps(), &[Step::Out(vec!["FOLLOWS".into()])]);
        assert_eq!(Relationship::in_("FOLLOWS").walk().steps(), &[Step::In(vec!["FOLLOWS".into()])]);
        assert_eq!(Relationship::both("KNOWS").walk().steps(), &[Step::Both(vec!["KNOWS".into()])]);
        assert!(Relationship::out("FOLLOWS").walk().is_anonymous());
    }
}
