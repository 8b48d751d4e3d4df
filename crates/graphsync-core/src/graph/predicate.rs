use super::value::GValue;
use std::cmp::Ordering;

/// Comparison predicate usable by `has(key, P)`.
#[derive(Debug, Clone, PartialEq)]
pub enum P {
    Eq(GValue),
    Neq(GValue),
    Lt(GValue),
    Lte(GValue),
    Gt(GValue),
    Gte(GValue),
    Within(Vec<GValue>),
    Without(Vec<GValue>),
    StartingWith(String),
    NotStartingWith(String),
    EndingWith(String),
    NotEndingWith(String),
    Containing(String),
    NotContaining(String),
}

impl P {
    pub fn eq(value: impl Into<GValue>) -> Self {
        P::Eq(value.into())
    }

    pub fn neq(value: impl Into<GValue>) -> Self {
        P::Neq(value.into())
    }

    pub fn lt(value: impl Into<GValue>) -> Self {
        P::Lt(value.into())
    }

    pub fn lte(value: impl Into<GValue>) -> Self {
        P::Lte(value.into())
    }

    pub fn gt(value: impl Into<GValue>) -> Self {
        P::Gt(value.into())
    }

    pub fn gte(value: impl Into<GValue>) -> Self {
        P::Gte(value.into())
    }

    pub fn within<V: Into<GValue>>(values: impl IntoIterator<Item = V>) -> Self {
        P::Within(values.into_iter().map(Into::into).collect())
    }

    pub fn without<V: Into<GValue>>(values: impl IntoIterator<Item = V>) -> Self {
        P::Without(values.into_iter().map(Into::into).collect())
    }

    /// Gremlin function name, `TextP` predicates included.
    pub fn name(&self) -> &'static str {
        match self {
            P::Eq(_) => "eq",
            P::Neq(_) => "neq",
            P::Lt(_) => "lt",
            P::Lte(_) => "lte",
            P::Gt(_) => "gt",
            P::Gte(_) => "gte",
            P::Within(_) => "within",
            P::Without(_) => "without",
            P::StartingWith(_) => "startingWith",
            P::NotStartingWith(_) => "notStartingWith",
            P::EndingWith(_) => "endingWith",
            P::NotEndingWith(_) => "notEndingWith",
            P::Containing(_) => "containing",
            P::NotContaining(_) => "notContaining",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(
            self,
            P::StartingWith(_)
                | P::NotStartingWith(_)
                | P::EndingWith(_)
                | P::NotEndingWith(_)
                | P::Containing(_)
                | P::NotContaining(_)
        )
    }

    /// Evaluates the predicate against a property value. Incomparable types never match.
    pub fn test(&self, value: &GValue) -> bool {
        match self {
            P::Eq(v) => value.loose_eq(v),
            P::Neq(v) => !value.loose_eq(v),
            P::Lt(v) => value.compare(v) == Some(Ordering::Less),
            P::Lte(v) => matches!(value.compare(v), Some(Ordering::Less | Ordering::Equal)),
            P::Gt(v) => value.compare(v) == Some(Ordering::Greater),
            P::Gte(v) => matches!(value.compare(v), Some(Ordering::Greater | Ordering::Equal)),
            P::Within(vs) => vs.iter().any(|v| value.loose_eq(v)),
            P::Without(vs) => !vs.iter().any(|v| value.loose_eq(v)),
            P::StartingWith(s) => value.as_str().is_some_and(|v| v.starts_with(s.as_str())),
            P::NotStartingWith(s) => value.as_str().is_some_and(|v| !v.starts_with(s.as_str())),
            P::EndingWith(s) => value.as_str().is_some_and(|v| v.ends_with(s.as_str())),
            P::NotEndingWith(s) => value.as_str().is_some_and(|v| !v.ends_with(s.as_str())),
            P::Containing(s) => value.as_str().is_some_and(|v| v.contains(s.as_str())),
            P::NotContaining(s) => value.as_str().is_some_and(|v| !v.contains(s.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relational_predicates() {
        assert!(P::gt(18).test(&GValue::Int(19)));
        assert!(!P::gt(18).test(&GValue::Int(18)));
        assert!(P::gte(18).test(&GValue::Int(18)));
        assert!(P::lt(30).test(&GValue::Float(29.5)));
        assert!(!P::lt(30).test(&GValue::from("29")));
    }

    #[test]
    fn test_membership_predicates() {
        let p = P::within(vec!["a", "b"]);
        assert!(p.test(&GValue::from("a")));
        assert!(!p.test(&GValue::from("c")));
        assert!(P::without(vec!["a"]).test(&GValue::from("c")));
    }

    #[test]
    fn test_text_predicates() {
        let name = GValue::from("marko");
        assert!(P::StartingWith("mar".into()).test(&name));
        assert!(P::NotStartingWith("x".into()).test(&name));
        assert!(P::EndingWith("ko".into()).test(&name));
        assert!(P::Containing("rk".into()).test(&name));
        assert!(!P::NotContaining("rk".into()).test(&name));
        assert!(!P::Containing("1".into()).test(&GValue::Int(1)));
    }
}
