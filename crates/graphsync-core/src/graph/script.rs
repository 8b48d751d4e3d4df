// Gremlin-Groovy rendering of traversals for script-based servers (Neptune, TinkerPop)

use super::predicate::P;
use super::traversal::{Step, Traversal};
use super::value::{isoformat, ElementId, GKey, GValue, T};

/// Renders a traversal as a Gremlin-Groovy script. Root traversals start at
/// `g`, anonymous ones at `__`.
pub fn render(traversal: &Traversal) -> String {
    let mut out = String::new();
    render_into(traversal, &mut out);
    out
}

fn render_into(traversal: &Traversal, out: &mut String) {
    if traversal.is_anonymous() {
        out.push_str("__");
        if traversal.is_empty() {
            out.push_str(".identity()");
            return;
        }
    } else {
        out.push('g');
    }

    for step in traversal.steps() {
        out.push('.');
        render_step(step, out);
    }
}

fn render_step(step: &Step, out: &mut String) {
    let args: Vec<String> = match step {
        Step::V(ids) | Step::E(ids) => ids.iter().map(literal).collect(),
        Step::AddV(label) | Step::AddE(label) => vec![string_literal(label)],
        Step::Property(key, value) => vec![key_literal(key), literal(value)],
        Step::HasLabel(names)
        | Step::Out(names)
        | Step::In(names)
        | Step::Both(names)
        | Step::OutE(names)
        | Step::InE(names)
        | Step::Values(names)
        | Step::Project(names) => string_literals(names),
        Step::Has(key, p) => vec![key_literal(key), predicate(p)],
        Step::Where(t) | Step::By(t) | Step::From(t) | Step::To(t) => vec![render(t)],
        Step::ValueMap { tokens, keys } => {
            let mut args = Vec::new();
            if *tokens {
                args.push("true".to_string());
            }
            args.extend(string_literals(keys));
            args
        }
        Step::Range(low, high) => vec![format!("{}L", low), format!("{}L", high)],
        Step::Limit(n) => vec![format!("{}L", n)],
        Step::Constant(value) => vec![literal(value)],
        Step::OutV
        | Step::InV
        | Step::Id
        | Step::Label
        | Step::Fold
        | Step::Unfold
        | Step::Count
        | Step::Dedup
        | Step::Drop => Vec::new(),
    };
    call(out, step.name(), args);
}

fn call(out: &mut String, name: &str, args: impl IntoIterator<Item = String>) {
    out.push_str(name);
    out.push('(');
    let args: Vec<String> = args.into_iter().collect();
    out.push_str(&args.join(", "));
    out.push(')');
}

fn predicate(p: &P) -> String {
    match p {
        P::Eq(v) | P::Neq(v) | P::Lt(v) | P::Lte(v) | P::Gt(v) | P::Gte(v) => {
            format!("{}({})", p.name(), literal(v))
        }
        P::Within(vs) | P::Without(vs) => {
            let args: Vec<String> = vs.iter().map(literal).collect();
            format!("{}({})", p.name(), args.join(", "))
        }
        P::StartingWith(s)
        | P::NotStartingWith(s)
        | P::EndingWith(s)
        | P::NotEndingWith(s)
        | P::Containing(s)
        | P::NotContaining(s) => format!("TextP.{}({})", p.name(), string_literal(s)),
    }
}

fn key_literal(key: &GKey) -> String {
    match key {
        GKey::Token(t) => token(*t),
        GKey::String(s) => string_literal(s),
    }
}

fn token(t: T) -> String {
    format!("T.{}", t.name())
}

fn string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn string_literals(items: &[String]) -> Vec<String> {
    items.iter().map(|s| string_literal(s)).collect()
}

fn element_id(id: &ElementId) -> String {
    literal(&GValue::from(id.clone()))
}

fn literal(value: &GValue) -> String {
    match value {
        GValue::Null => "null".to_string(),
        GValue::Bool(b) => b.to_string(),
        GValue::Int(i) => {
            if i32::try_from(*i).is_ok() {
                i.to_string()
            } else {
                format!("{}L", i)
            }
        }
        GValue::Float(f) => format!("{:?}d", f),
        GValue::String(s) => string_literal(s),
        GValue::Date(d) => format!("datetime('{}Z')", isoformat(d)),
        GValue::Uuid(u) => string_literal(&u.to_string()),
        GValue::List(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(", "))
        }
        GValue::Map(map) => {
            if map.is_empty() {
                return "[:]".to_string();
            }
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("({}): {}", key_literal(k), literal(v)))
                .collect();
            format!("[{}]", entries.join(", "))
        }
        GValue::Vertex(v) => element_id(&v.id),
        GValue::Edge(e) => element_id(&e.id),
        GValue::Token(t) => token(*t),
    }
}
