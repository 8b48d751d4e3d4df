// Traversal builder - a value-typed Gremlin step list
// Builders consume `self` and return the extended traversal.

use super::predicate::P;
use super::value::{GKey, GValue};

/// One Gremlin instruction. `By`, `From` and `To` are modulators of the
/// step that precedes them, as in Gremlin bytecode.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    V(Vec<GValue>),
    E(Vec<GValue>),
    AddV(String),
    AddE(String),
    Property(GKey, GValue),
    HasLabel(Vec<String>),
    Has(GKey, P),
    Out(Vec<String>),
    In(Vec<String>),
    Both(Vec<String>),
    OutE(Vec<String>),
    InE(Vec<String>),
    OutV,
    InV,
    Where(Traversal),
    ValueMap { tokens: bool, keys: Vec<String> },
    Values(Vec<String>),
    Id,
    Label,
    Fold,
    Unfold,
    Count,
    Range(i64, i64),
    Limit(i64),
    Project(Vec<String>),
    Dedup,
    Constant(GValue),
    Drop,
    By(Traversal),
    From(Traversal),
    To(Traversal),
}

impl Step {
    /// Gremlin step name, as written in scripts.
    pub fn name(&self) -> &'static str {
        match self {
            Step::V(_) => "V",
            Step::E(_) => "E",
            Step::AddV(_) => "addV",
            Step::AddE(_) => "addE",
            Step::Property(..) => "property",
            Step::HasLabel(_) => "hasLabel",
            Step::Has(..) => "has",
            Step::Out(_) => "out",
            Step::In(_) => "in",
            Step::Both(_) => "both",
            Step::OutE(_) => "outE",
            Step::InE(_) => "inE",
            Step::OutV => "outV",
            Step::InV => "inV",
            Step::Where(_) => "where",
            Step::ValueMap { .. } => "valueMap",
            Step::Values(_) => "values",
            Step::Id => "id",
            Step::Label => "label",
            Step::Fold => "fold",
            Step::Unfold => "unfold",
            Step::Count => "count",
            Step::Range(..) => "range",
            Step::Limit(_) => "limit",
            Step::Project(_) => "project",
            Step::Dedup => "dedup",
            Step::Constant(_) => "constant",
            Step::Drop => "drop",
            Step::By(_) => "by",
            Step::From(_) => "from",
            Step::To(_) => "to",
        }
    }

    pub fn is_modulator(&self) -> bool {
        matches!(self, Step::By(_) | Step::From(_) | Step::To(_))
    }

    pub fn is_mutation(&self) -> bool {
        match self {
            Step::AddV(_) | Step::AddE(_) | Step::Property(..) | Step::Drop => true,
            Step::Where(t) | Step::By(t) | Step::From(t) | Step::To(t) => t.is_mutating(),
            _ => false,
        }
    }
}

/// A partially built graph query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traversal {
    anonymous: bool,
    steps: Vec<Step>,
}

impl Traversal {
    /// A child traversal (`__`) that starts from whatever it is applied to.
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            steps: Vec::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_mutating(&self) -> bool {
        self.steps.iter().any(Step::is_mutation)
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn v<V: Into<GValue>>(self, ids: impl IntoIterator<Item = V>) -> Self {
        self.step(Step::V(ids.into_iter().map(Into::into).collect()))
    }

    pub fn add_v(self, label: impl Into<String>) -> Self {
        self.step(Step::AddV(label.into()))
    }

    pub fn add_e(self, label: impl Into<String>) -> Self {
        self.step(Step::AddE(label.into()))
    }

    pub fn property(self, key: impl Into<GKey>, value: impl Into<GValue>) -> Self {
        self.step(Step::Property(key.into(), value.into()))
    }

    pub fn has_label(self, label: impl Into<String>) -> Self {
        self.step(Step::HasLabel(vec![label.into()]))
    }

    pub fn has(self, key: impl Into<GKey>, predicate: P) -> Self {
        self.step(Step::Has(key.into(), predicate))
    }

    pub fn out(self, label: impl Into<String>) -> Self {
        self.step(Step::Out(vec![label.into()]))
    }

    pub fn in_(self, label: impl Into<String>) -> Self {
        self.step(Step::In(vec![label.into()]))
    }

    pub fn both(self, label: impl Into<String>) -> Self {
        self.step(Step::Both(vec![label.into()]))
    }

    pub fn out_e(self, label: impl Into<String>) -> Self {
        self.step(Step::OutE(vec![label.into()]))
    }

    pub fn in_e(self, label: impl Into<String>) -> Self {
        self.step(Step::InE(vec![label.into()]))
    }

    pub fn out_v(self) -> Self {
        self.step(Step::OutV)
    }

    pub fn in_v(self) -> Self {
        self.step(Step::InV)
    }

    /// Keeps traversers for which `condition` yields at least one result.
    pub fn where_(self, condition: Traversal) -> Self {
        self.step(Step::Where(condition))
    }

    /// `valueMap(tokens)`; `tokens` includes the reserved id/label keys.
    pub fn value_map(self, tokens: bool) -> Self {
        self.step(Step::ValueMap { tokens, keys: Vec::new() })
    }

    pub fn values(self, key: impl Into<String>) -> Self {
        self.step(Step::Values(vec![key.into()]))
    }

    pub fn id(self) -> Self {
        self.step(Step::Id)
    }

    pub fn label(self) -> Self {
        self.step(Step::Label)
    }

    pub fn fold(self) -> Self {
        self.step(Step::Fold)
    }

    pub fn unfold(self) -> Self {
        self.step(Step::Unfold)
    }

    pub fn count(self) -> Self {
        self.step(Step::Count)
    }

    /// Half-open window `[low, high)` of the stream; `high < 0` means unbounded.
    pub fn range(self, low: i64, high: i64) -> Self {
        self.step(Step::Range(low, high))
    }

    pub fn limit(self, n: i64) -> Self {
        self.step(Step::Limit(n))
    }

    pub fn project<K: Into<String>>(self, keys: impl IntoIterator<Item = K>) -> Self {
        self.step(Step::Project(keys.into_iter().map(Into::into).collect()))
    }

    pub fn dedup(self) -> Self {
        self.step(Step::Dedup)
    }

    pub fn constant(self, value: impl Into<GValue>) -> Self {
        self.step(Step::Constant(value.into()))
    }

    pub fn drop_(self) -> Self {
        self.step(Step::Drop)
    }

    pub fn by(self, modulator: Traversal) -> Self {
        self.step(Step::By(modulator))
    }

    pub fn from_(self, source: Traversal) -> Self {
        self.step(Step::From(source))
    }

    pub fn to(self, target: Traversal) -> Self {
        self.step(Step::To(target))
    }
}

/// Spawns root traversals; Gremlin's `g`. Holds no connection state.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphTraversalSource;

impl GraphTraversalSource {
    pub fn new() -> Self {
        Self
    }

    fn root(step: Step) -> Traversal {
        Traversal {
            anonymous: false,
            steps: vec![step],
        }
    }

    /// All vertices.
    pub fn v(&self) -> Traversal {
        Self::root(Step::V(Vec::new()))
    }

    pub fn v_ids<V: Into<GValue>>(&self, ids: impl IntoIterator<Item = V>) -> Traversal {
        Self::root(Step::V(ids.into_iter().map(Into::into).collect()))
    }

    /// All edges.
    pub fn e(&self) -> Traversal {
        Self::root(Step::E(Vec::new()))
    }

    pub fn e_ids<V: Into<GValue>>(&self, ids: impl IntoIterator<Item = V>) -> Traversal {
        Self::root(Step::E(ids.into_iter().map(Into::into).collect()))
    }

    pub fn add_v(&self, label: impl Into<String>) -> Traversal {
        Self::root(Step::AddV(label.into()))
    }

    pub fn add_e(&self, label: impl Into<String>) -> Traversal {
        Self::root(Step::AddE(label.into()))
    }
}

/// Anonymous traversal constructors, mirroring Gremlin's `__`.
#[allow(non_snake_case)]
pub mod __ {
    use super::{Traversal, P};
    use crate::graph::value::{GKey, GValue};

    pub fn start() -> Traversal {
        Traversal::anonymous()
    }

    pub fn v<V: Into<GValue>>(ids: impl IntoIterator<Item = V>) -> Traversal {
        start().v(ids)
    }

    pub fn out(label: impl Into<String>) -> Traversal {
        start().out(label)
    }

    pub fn in_(label: impl Into<String>) -> Traversal {
        start().in_(label)
    }

    pub fn both(label: impl Into<String>) -> Traversal {
        start().both(label)
    }

    pub fn out_e(label: impl Into<String>) -> Traversal {
        start().out_e(label)
    }

    pub fn in_e(label: impl Into<String>) -> Traversal {
        start().in_e(label)
    }

    pub fn has_label(label: impl Into<String>) -> Traversal {
        start().has_label(label)
    }

    pub fn has(key: impl Into<GKey>, predicate: P) -> Traversal {
        start().has(key, predicate)
    }

    pub fn values(key: impl Into<String>) -> Traversal {
        start().values(key)
    }

    pub fn unfold() -> Traversal {
        start().unfold()
    }

    pub fn fold() -> Traversal {
        start().fold()
    }

    pub fn count() -> Traversal {
        start().count()
    }

    pub fn id() -> Traversal {
        start().id()
    }

    pub fn label() -> Traversal {
        start().label()
    }

    pub fn constant(value: impl Into<GValue>) -> Traversal {
        start().constant(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::value::T;

    #[test]
    fn test_builder_appends_without_touching_original() {
        let g = GraphTraversalSource::new();
        let base = g.v().has_label("User");
        let narrowed = base.clone().has("age", P::gt(18));

        assert_eq!(base.steps().len(), 2);
        assert_eq!(narrowed.steps().len(), 3);
        assert!(!narrowed.is_anonymous());
        assert!(__::out("FOLLOWS").is_anonymous());
    }

    #[test]
    fn test_mutation_detection_descends_into_children() {
        let g = GraphTraversalSource::new();
        assert!(!g.v().has(T::Id, P::eq("u1")).is_mutating());
        assert!(g.add_v("User").property("name", "a").is_mutating());
        assert!(g.v().where_(__::start().drop_()).is_mutating());
        assert!(g.add_e("FOLLOWS").from_(__::v(vec!["a"])).to(__::v(vec!["b"])).is_mutating());
    }

    #[test]
    fn test_modulators_are_flagged() {
        let t = GraphTraversalSource::new().v().value_map(true).by(__::unfold());
        let modulators: Vec<bool> = t.steps().iter().map(Step::is_modulator).collect();
        assert_eq!(modulators, vec![false, false, true]);
    }
}
