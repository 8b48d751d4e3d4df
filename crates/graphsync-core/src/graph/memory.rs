// In-process graph backend
// Evaluates traversals directly against a petgraph store, step by step, with the
// same result shapes a Gremlin server returns.

use super::connection::{ConnectionProvider, GraphConnection};
use super::predicate::P;
use super::traversal::{Step, Traversal};
use super::value::{Edge, ElementId, GKey, GMap, GValue, Vertex, T};
use crate::error::GraphError;
use async_trait::async_trait;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct VertexData {
    id: ElementId,
    label: String,
    properties: GMap,
}

#[derive(Debug, Clone)]
struct EdgeData {
    id: ElementId,
    label: String,
    properties: GMap,
}

/// Property graph held in memory. Vertex properties are single-valued.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    graph: StableDiGraph<VertexData, EdgeData>,
    vertices: HashMap<ElementId, NodeIndex>,
    edges: HashMap<ElementId, EdgeIndex>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn add_vertex<K, V>(
        &mut self,
        id: impl Into<ElementId>,
        label: impl Into<String>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Vertex, GraphError>
    where
        K: Into<String>,
        V: Into<GValue>,
    {
        let vertex = self.insert_vertex(id.into(), label.into())?;
        for (key, value) in properties {
            self.set_vertex_property(&vertex.id, key.into(), value.into())?;
        }
        Ok(vertex)
    }

    /// Adds an edge `out_v -[label]-> in_v` with a generated id.
    pub fn add_edge(
        &mut self,
        label: impl Into<String>,
        out_v: impl Into<ElementId>,
        in_v: impl Into<ElementId>,
    ) -> Result<Edge, GraphError> {
        self.insert_edge(ElementId::new_random(), label.into(), &out_v.into(), &in_v.into())
    }

    pub fn vertex_property(&self, id: &ElementId, key: &str) -> Option<&GValue> {
        let idx = self.vertices.get(id)?;
        self.graph.node_weight(*idx)?.properties.get_str(key)
    }

    fn insert_vertex(&mut self, id: ElementId, label: String) -> Result<Vertex, GraphError> {
        if self.vertices.contains_key(&id) {
            return Err(GraphError::Evaluation(format!("vertex with id {} already exists", id)));
        }
        let idx = self.graph.add_node(VertexData {
            id: id.clone(),
            label: label.clone(),
            properties: GMap::new(),
        });
        self.vertices.insert(id.clone(), idx);
        Ok(Vertex { id, label })
    }

    fn insert_edge(
        &mut self,
        id: ElementId,
        label: String,
        out_v: &ElementId,
        in_v: &ElementId,
    ) -> Result<Edge, GraphError> {
        let source = self.vertex_index(out_v)?;
        let target = self.vertex_index(in_v)?;
        let idx = self.graph.add_edge(
            source,
            target,
            EdgeData {
                id: id.clone(),
                label: label.clone(),
                properties: GMap::new(),
            },
        );
        self.edges.insert(id.clone(), idx);
        Ok(Edge {
            id,
            label,
            out_v: out_v.clone(),
            in_v: in_v.clone(),
        })
    }

    fn vertex_index(&self, id: &ElementId) -> Result<NodeIndex, GraphError> {
        self.vertices
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::Evaluation(format!("no vertex with id {}", id)))
    }

    fn edge_index(&self, id: &ElementId) -> Result<EdgeIndex, GraphError> {
        self.edges
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::Evaluation(format!("no edge with id {}", id)))
    }

    fn set_vertex_property(&mut self, id: &ElementId, key: String, value: GValue) -> Result<(), GraphError> {
        let idx = self.vertex_index(id)?;
        if let Some(data) = self.graph.node_weight_mut(idx) {
            data.properties.insert(key, value);
        }
        Ok(())
    }

    fn set_edge_property(&mut self, id: &ElementId, key: String, value: GValue) -> Result<(), GraphError> {
        let idx = self.edge_index(id)?;
        if let Some(data) = self.graph.edge_weight_mut(idx) {
            data.properties.insert(key, value);
        }
        Ok(())
    }

    fn rekey_vertex(&mut self, old: &ElementId, new: ElementId) -> Result<Vertex, GraphError> {
        let idx = self.vertex_index(old)?;
        if old != &new {
            if self.vertices.contains_key(&new) {
                return Err(GraphError::Evaluation(format!("vertex with id {} already exists", new)));
            }
            self.vertices.remove(old);
            self.vertices.insert(new.clone(), idx);
            if let Some(data) = self.graph.node_weight_mut(idx) {
                data.id = new;
            }
        }
        self.vertex_at(idx)
    }

    fn remove_vertex(&mut self, id: &ElementId) {
        let Some(idx) = self.vertices.remove(id) else {
            return;
        };
        let incident: Vec<ElementId> = self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|e| e.weight().id.clone())
            .collect();
        for edge_id in incident {
            self.edges.remove(&edge_id);
        }
        self.graph.remove_node(idx);
    }

    fn remove_edge(&mut self, id: &ElementId) {
        if let Some(idx) = self.edges.remove(id) {
            self.graph.remove_edge(idx);
        }
    }

    fn vertex_at(&self, idx: NodeIndex) -> Result<Vertex, GraphError> {
        self.graph
            .node_weight(idx)
            .map(|data| Vertex {
                id: data.id.clone(),
                label: data.label.clone(),
            })
            .ok_or_else(|| GraphError::Evaluation(format!("dangling vertex index {}", idx.index())))
    }

    fn edge_at(&self, idx: EdgeIndex) -> Result<Edge, GraphError> {
        let data = self.graph
            .edge_weight(idx)
            .ok_or_else(|| GraphError::Evaluation(format!("dangling edge index {}", idx.index())))?;
        let (source, target) = self.graph
            .edge_endpoints(idx)
            .ok_or_else(|| GraphError::Evaluation(format!("dangling edge index {}", idx.index())))?;
        Ok(Edge {
            id: data.id.clone(),
            label: data.label.clone(),
            out_v: self.vertex_at(source)?.id,
            in_v: self.vertex_at(target)?.id,
        })
    }

    fn find_vertex(&self, id: &GValue) -> Option<NodeIndex> {
        if let Ok(key) = ElementId::try_from(id.clone()) {
            if let Some(idx) = self.vertices.get(&key) {
                return Some(*idx);
            }
        }
        self.vertices.iter().find(|(k, _)| k.matches(id)).map(|(_, idx)| *idx)
    }

    fn find_edge(&self, id: &GValue) -> Option<EdgeIndex> {
        if let Ok(key) = ElementId::try_from(id.clone()) {
            if let Some(idx) = self.edges.get(&key) {
                return Some(*idx);
            }
        }
        self.edges.iter().find(|(k, _)| k.matches(id)).map(|(_, idx)| *idx)
    }

    fn all_vertices(&self, ids: &[GValue]) -> Result<Vec<GValue>, GraphError> {
        let indices: Vec<NodeIndex> = if ids.is_empty() {
            self.graph.node_indices().collect()
        } else {
            ids.iter().filter_map(|id| self.find_vertex(id)).collect()
        };
        indices.into_iter().map(|idx| self.vertex_at(idx).map(GValue::Vertex)).collect()
    }

    fn all_edges(&self, ids: &[GValue]) -> Result<Vec<GValue>, GraphError> {
        let indices: Vec<EdgeIndex> = if ids.is_empty() {
            self.graph.edge_indices().collect()
        } else {
            ids.iter().filter_map(|id| self.find_edge(id)).collect()
        };
        indices.into_iter().map(|idx| self.edge_at(idx).map(GValue::Edge)).collect()
    }

    /// Identity, label and properties of a live element; `None` for anything else.
    fn element(&self, value: &GValue) -> Option<(&ElementId, &str, &GMap)> {
        match value {
            GValue::Vertex(v) => {
                let data = self.graph.node_weight(*self.vertices.get(&v.id)?)?;
                Some((&data.id, data.label.as_str(), &data.properties))
            }
            GValue::Edge(e) => {
                let data = self.graph.edge_weight(*self.edges.get(&e.id)?)?;
                Some((&data.id, data.label.as_str(), &data.properties))
            }
            _ => None,
        }
    }

    fn has(&self, value: &GValue, key: &GKey, predicate: &P) -> bool {
        let Some((id, label, properties)) = self.element(value) else {
            return false;
        };
        match key {
            GKey::Token(T::Id) => predicate.test(&GValue::from(id.clone())),
            GKey::Token(T::Label) => predicate.test(&GValue::from(label)),
            GKey::Token(_) => false,
            GKey::String(k) => properties.get_str(k).is_some_and(|v| predicate.test(v)),
        }
    }

    /// Adjacent vertices (or the connecting edges) in edge-insertion order.
    fn adjacent(
        &self,
        value: &GValue,
        direction: Direction,
        labels: &[String],
        emit_edges: bool,
    ) -> Result<Vec<GValue>, GraphError> {
        let GValue::Vertex(vertex) = value else {
            return Err(GraphError::Evaluation(format!(
                "cannot walk edges from a {}",
                value.type_name()
            )));
        };
        let Some(&idx) = self.vertices.get(&vertex.id) else {
            return Ok(Vec::new());
        };

        let mut hops: Vec<EdgeIndex> = self.graph
            .edges_directed(idx, direction)
            .filter(|e| labels.is_empty() || labels.contains(&e.weight().label))
            .map(|e| e.id())
            .collect();
        hops.sort();

        let mut out = Vec::with_capacity(hops.len());
        for edge in hops {
            if emit_edges {
                out.push(GValue::Edge(self.edge_at(edge)?));
                continue;
            }
            let Some((source, target)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let node = match direction {
                Direction::Outgoing => target,
                Direction::Incoming => source,
            };
            out.push(GValue::Vertex(self.vertex_at(node)?));
        }
        Ok(out)
    }

    fn edge_endpoint(&self, value: &GValue, direction: Direction) -> Result<Option<GValue>, GraphError> {
        let GValue::Edge(edge) = value else {
            return Err(GraphError::Evaluation(format!(
                "cannot take an endpoint of a {}",
                value.type_name()
            )));
        };
        let Some(&idx) = self.edges.get(&edge.id) else {
            return Ok(None);
        };
        let Some((source, target)) = self.graph.edge_endpoints(idx) else {
            return Ok(None);
        };
        let node = match direction {
            Direction::Outgoing => source,
            Direction::Incoming => target,
        };
        self.vertex_at(node).map(|v| Some(GValue::Vertex(v)))
    }

    /// Vertex properties come back as single-element lists, edge properties as
    /// plain values, matching a Gremlin server's `valueMap`.
    fn value_map(&self, value: &GValue, tokens: bool, keys: &[String]) -> Result<GMap, GraphError> {
        let (id, label, properties) = self.element(value).ok_or_else(|| {
            GraphError::Evaluation(format!("valueMap() requires an element, got {}", value.type_name()))
        })?;
        let listed = matches!(value, GValue::Vertex(_));

        let mut map = GMap::new();
        if tokens {
            map.insert(T::Id, GValue::from(id.clone()));
            map.insert(T::Label, GValue::from(label));
        }
        for (key, v) in properties.iter() {
            let GKey::String(name) = key else { continue };
            if !keys.is_empty() && !keys.contains(name) {
                continue;
            }
            let entry = if listed { GValue::List(vec![v.clone()]) } else { v.clone() };
            map.insert(key.clone(), entry);
        }
        Ok(map)
    }
}

enum Access<'g> {
    Read(&'g MemoryGraph),
    Write(&'g mut MemoryGraph),
}

struct Evaluator<'g> {
    access: Access<'g>,
}

impl<'g> Evaluator<'g> {
    fn graph(&self) -> &MemoryGraph {
        match &self.access {
            Access::Read(graph) => graph,
            Access::Write(graph) => graph,
        }
    }

    fn graph_mut(&mut self) -> Result<&mut MemoryGraph, GraphError> {
        match &mut self.access {
            Access::Write(graph) => Ok(&mut **graph),
            Access::Read(_) => Err(GraphError::Evaluation(
                "mutation attempted through a read-only evaluation".to_string(),
            )),
        }
    }

    /// Runs `steps` over `start`; `None` means the traversal is a root (`g`) traversal.
    fn run(&mut self, steps: &[Step], start: Option<Vec<GValue>>) -> Result<Vec<GValue>, GraphError> {
        let mut current = start;
        let mut i = 0;

        while i < steps.len() {
            let step = &steps[i];
            if step.is_modulator() {
                return Err(GraphError::Evaluation(format!(
                    "{}() has no step to modulate",
                    step.name()
                )));
            }

            let mut end = i + 1;
            while end < steps.len() && steps[end].is_modulator() {
                end += 1;
            }
            let modulators = &steps[i + 1..end];
            check_modulators(step, modulators)?;

            current = Some(self.apply(step, modulators, current)?);
            i = end;
        }

        Ok(current.unwrap_or_default())
    }

    /// First result of a child traversal applied to one traverser.
    fn first(&mut self, child: &Traversal, value: GValue) -> Result<Option<GValue>, GraphError> {
        Ok(self.run(child.steps(), Some(vec![value]))?.into_iter().next())
    }

    fn apply(
        &mut self,
        step: &Step,
        modulators: &[Step],
        input: Option<Vec<GValue>>,
    ) -> Result<Vec<GValue>, GraphError> {
        match step {
            Step::V(ids) => {
                let found = self.graph().all_vertices(ids)?;
                Ok(repeat_per_traverser(found, input))
            }
            Step::E(ids) => {
                let found = self.graph().all_edges(ids)?;
                Ok(repeat_per_traverser(found, input))
            }
            Step::AddV(label) => {
                let count = input.map_or(1, |cur| cur.len());
                let mut out = Vec::with_capacity(count);
                for _ in 0..count {
                    let vertex = self.graph_mut()?.insert_vertex(ElementId::new_random(), label.clone())?;
                    out.push(GValue::Vertex(vertex));
                }
                Ok(out)
            }
            Step::AddE(label) => self.add_edges(label, modulators, input),
            _ => {
                let input = input.ok_or_else(|| {
                    GraphError::Evaluation(format!(
                        "traversal must start with V(), E(), addV() or addE(), not {}()",
                        step.name()
                    ))
                })?;
                self.apply_mid(step, modulators, input)
            }
        }
    }

    fn apply_mid(&mut self, step: &Step, modulators: &[Step], input: Vec<GValue>) -> Result<Vec<GValue>, GraphError> {
        match step {
            Step::Property(key, value) => input
                .into_iter()
                .map(|element| self.set_property(element, key, value.clone()))
                .collect(),
            Step::HasLabel(labels) => Ok(input
                .into_iter()
                .filter(|x| {
                    self.graph()
                        .element(x)
                        .is_some_and(|(_, label, _)| labels.iter().any(|l| l == label))
                })
                .collect()),
            Step::Has(key, predicate) => Ok(input
                .into_iter()
                .filter(|x| self.graph().has(x, key, predicate))
                .collect()),
            Step::Out(labels) => self.flat_map(input, |g, x| g.adjacent(x, Direction::Outgoing, labels, false)),
            Step::In(labels) => self.flat_map(input, |g, x| g.adjacent(x, Direction::Incoming, labels, false)),
            Step::Both(labels) => self.flat_map(input, |g, x| {
                let mut out = g.adjacent(x, Direction::Outgoing, labels, false)?;
                out.extend(g.adjacent(x, Direction::Incoming, labels, false)?);
                Ok(out)
            }),
            Step::OutE(labels) => self.flat_map(input, |g, x| g.adjacent(x, Direction::Outgoing, labels, true)),
            Step::InE(labels) => self.flat_map(input, |g, x| g.adjacent(x, Direction::Incoming, labels, true)),
            Step::OutV => self.flat_map(input, |g, x| Ok(g.edge_endpoint(x, Direction::Outgoing)?.into_iter().collect())),
            Step::InV => self.flat_map(input, |g, x| Ok(g.edge_endpoint(x, Direction::Incoming)?.into_iter().collect())),
            Step::Where(condition) => {
                let mut out = Vec::new();
                for x in input {
                    if !self.run(condition.steps(), Some(vec![x.clone()]))?.is_empty() {
                        out.push(x);
                    }
                }
                Ok(out)
            }
            Step::ValueMap { tokens, keys } => {
                let by = match modulators {
                    [] => None,
                    [Step::By(t)] => Some(t),
                    _ => {
                        return Err(GraphError::Evaluation(
                            "valueMap() accepts a single by() modulator".to_string(),
                        ))
                    }
                };
                let mut out = Vec::with_capacity(input.len());
                for x in input {
                    let map = self.graph().value_map(&x, *tokens, keys)?;
                    let map = match by {
                        None => map,
                        Some(t) => self.modulate_values(map, t)?,
                    };
                    out.push(GValue::Map(map));
                }
                Ok(out)
            }
            Step::Values(keys) => self.flat_map(input, |g, x| {
                let (_, _, properties) = g.element(x).ok_or_else(|| {
                    GraphError::Evaluation(format!("values() requires an element, got {}", x.type_name()))
                })?;
                Ok(properties
                    .iter()
                    .filter(|(k, _)| match k {
                        GKey::String(name) => keys.is_empty() || keys.contains(name),
                        GKey::Token(_) => false,
                    })
                    .map(|(_, v)| v.clone())
                    .collect())
            }),
            Step::Id => self.flat_map(input, |g, x| {
                let (id, _, _) = g.element(x).ok_or_else(|| {
                    GraphError::Evaluation(format!("id() requires an element, got {}", x.type_name()))
                })?;
                Ok(vec![GValue::from(id.clone())])
            }),
            Step::Label => self.flat_map(input, |g, x| {
                let (_, label, _) = g.element(x).ok_or_else(|| {
                    GraphError::Evaluation(format!("label() requires an element, got {}", x.type_name()))
                })?;
                Ok(vec![GValue::from(label)])
            }),
            Step::Fold => Ok(vec![GValue::List(input)]),
            Step::Unfold => Ok(input
                .into_iter()
                .flat_map(|x| match x {
                    GValue::List(items) => items,
                    GValue::Map(map) => map
                        .into_iter()
                        .map(|(k, v)| GValue::Map(std::iter::once((k, v)).collect()))
                        .collect(),
                    other => vec![other],
                })
                .collect()),
            Step::Count => Ok(vec![GValue::Int(input.len() as i64)]),
            Step::Range(low, high) => {
                let low = (*low).max(0);
                let skipped = input.into_iter().skip(low as usize);
                if *high < 0 {
                    Ok(skipped.collect())
                } else {
                    Ok(skipped.take((*high - low).max(0) as usize).collect())
                }
            }
            Step::Limit(n) => Ok(input.into_iter().take((*n).max(0) as usize).collect()),
            Step::Project(keys) => {
                if modulators.len() > keys.len() {
                    return Err(GraphError::Evaluation(format!(
                        "project() has {} keys but {} by() modulators",
                        keys.len(),
                        modulators.len()
                    )));
                }
                let mut out = Vec::with_capacity(input.len());
                for x in input {
                    let mut map = GMap::new();
                    for (i, key) in keys.iter().enumerate() {
                        let value = match modulators.get(i) {
                            Some(Step::By(t)) => self.first(t, x.clone())?,
                            _ => Some(x.clone()),
                        };
                        if let Some(value) = value {
                            map.insert(key.as_str(), value);
                        }
                    }
                    out.push(GValue::Map(map));
                }
                Ok(out)
            }
            Step::Dedup => {
                let mut out: Vec<GValue> = Vec::with_capacity(input.len());
                for x in input {
                    if !out.contains(&x) {
                        out.push(x);
                    }
                }
                Ok(out)
            }
            Step::Constant(value) => Ok(input.iter().map(|_| value.clone()).collect()),
            Step::Drop => {
                for x in input {
                    match &x {
                        GValue::Vertex(v) => self.graph_mut()?.remove_vertex(&v.id),
                        GValue::Edge(e) => self.graph_mut()?.remove_edge(&e.id),
                        _ => {}
                    }
                }
                Ok(Vec::new())
            }
            Step::V(_) | Step::E(_) | Step::AddV(_) | Step::AddE(_) => self.apply(step, modulators, Some(input)),
            Step::By(_) | Step::From(_) | Step::To(_) => Err(GraphError::Evaluation(format!(
                "{}() has no step to modulate",
                step.name()
            ))),
        }
    }

    fn flat_map<F>(&self, input: Vec<GValue>, f: F) -> Result<Vec<GValue>, GraphError>
    where
        F: Fn(&MemoryGraph, &GValue) -> Result<Vec<GValue>, GraphError>,
    {
        let graph = self.graph();
        let mut out = Vec::new();
        for x in &input {
            out.extend(f(graph, x)?);
        }
        Ok(out)
    }

    // Tokens are already scalar; only property values go through by().
    fn modulate_values(&mut self, map: GMap, by: &Traversal) -> Result<GMap, GraphError> {
        let mut out = GMap::new();
        for (key, value) in map {
            if let GKey::Token(_) = key {
                out.insert(key, value);
                continue;
            }
            if let Some(value) = self.first(by, value)? {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    fn set_property(&mut self, element: GValue, key: &GKey, value: GValue) -> Result<GValue, GraphError> {
        match (&element, key) {
            (GValue::Vertex(v), GKey::Token(T::Id)) => {
                let new_id = ElementId::try_from(value).map_err(|v| {
                    GraphError::Evaluation(format!("unsupported id type {}", v.type_name()))
                })?;
                let vertex = self.graph_mut()?.rekey_vertex(&v.id, new_id)?;
                Ok(GValue::Vertex(vertex))
            }
            (GValue::Vertex(v), GKey::String(name)) => {
                self.graph_mut()?.set_vertex_property(&v.id, name.clone(), value)?;
                Ok(element)
            }
            (GValue::Edge(e), GKey::String(name)) => {
                self.graph_mut()?.set_edge_property(&e.id, name.clone(), value)?;
                Ok(element)
            }
            (GValue::Vertex(_) | GValue::Edge(_), GKey::Token(t)) => Err(GraphError::Evaluation(format!(
                "property(T.{}) is not supported",
                t.name()
            ))),
            _ => Err(GraphError::Evaluation(format!(
                "property() requires an element, got {}",
                element.type_name()
            ))),
        }
    }

    fn add_edges(
        &mut self,
        label: &str,
        modulators: &[Step],
        input: Option<Vec<GValue>>,
    ) -> Result<Vec<GValue>, GraphError> {
        let from = modulators.iter().find_map(|m| match m {
            Step::From(t) => Some(t),
            _ => None,
        });
        let to = modulators.iter().find_map(|m| match m {
            Step::To(t) => Some(t),
            _ => None,
        });

        let traversers: Vec<Option<GValue>> = match input {
            None => vec![None],
            Some(cur) => cur.into_iter().map(Some).collect(),
        };

        let mut out = Vec::with_capacity(traversers.len());
        for traverser in traversers {
            let out_v = self.endpoint(from, &traversal_start(&traverser))?;
            let in_v = self.endpoint(to, &traversal_start(&traverser))?;
            let edge = self
                .graph_mut()?
                .insert_edge(ElementId::new_random(), label.to_string(), &out_v, &in_v)?;
            out.push(GValue::Edge(edge));
        }
        Ok(out)
    }

    /// Resolves one end of `addE`: the modulator's first vertex, or the current
    /// traverser when there is no modulator.
    fn endpoint(
        &mut self,
        modulator: Option<&Traversal>,
        start: &Option<Vec<GValue>>,
    ) -> Result<ElementId, GraphError> {
        let candidate = match modulator {
            Some(t) => self.run(t.steps(), start.clone())?.into_iter().next(),
            None => start.as_ref().and_then(|cur| cur.first().cloned()),
        };
        match candidate {
            Some(GValue::Vertex(v)) => Ok(v.id),
            Some(other) => Err(GraphError::Evaluation(format!(
                "addE() endpoint must be a vertex, got {}",
                other.type_name()
            ))),
            None => Err(GraphError::Evaluation("addE() endpoint matched no vertex".to_string())),
        }
    }
}

fn traversal_start(traverser: &Option<GValue>) -> Option<Vec<GValue>> {
    traverser.as_ref().map(|x| vec![x.clone()])
}

fn repeat_per_traverser(found: Vec<GValue>, input: Option<Vec<GValue>>) -> Vec<GValue> {
    match input {
        None => found,
        Some(cur) => cur.iter().flat_map(|_| found.iter().cloned()).collect(),
    }
}

fn check_modulators(step: &Step, modulators: &[Step]) -> Result<(), GraphError> {
    let accepted = |m: &Step| {
        matches!(
            (step, m),
            (Step::ValueMap { .. } | Step::Project(_), Step::By(_)) | (Step::AddE(_), Step::From(_) | Step::To(_))
        )
    };
    match modulators.iter().find(|m| !accepted(m)) {
        Some(m) => Err(GraphError::Evaluation(format!(
            "{}() cannot modulate {}()",
            m.name(),
            step.name()
        ))),
        None => Ok(()),
    }
}

/// Connection over a shared in-memory graph. Read-only traversals take a read
/// lock; anything containing a mutation step takes the write lock.
pub struct MemoryConnection {
    graph: Arc<RwLock<MemoryGraph>>,
}

#[async_trait]
impl GraphConnection for MemoryConnection {
    async fn submit(&self, traversal: &Traversal) -> Result<Vec<GValue>, GraphError> {
        if traversal.is_anonymous() {
            return Err(GraphError::Evaluation(
                "anonymous traversals cannot be submitted".to_string(),
            ));
        }
        tracing::debug!("Evaluating {} steps in memory", traversal.steps().len());

        if traversal.is_mutating() {
            let mut graph = self.graph.write().await;
            Evaluator { access: Access::Write(&mut *graph) }.run(traversal.steps(), None)
        } else {
            let graph = self.graph.read().await;
            Evaluator { access: Access::Read(&*graph) }.run(traversal.steps(), None)
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryConnectionProvider {
    graph: Arc<RwLock<MemoryGraph>>,
}

impl MemoryConnectionProvider {
    pub fn new(graph: MemoryGraph) -> Self {
        Self {
            graph: Arc::new(RwLock::new(graph)),
        }
    }

    pub fn graph(&self) -> Arc<RwLock<MemoryGraph>> {
        self.graph.clone()
    }
}

#[async_trait]
impl ConnectionProvider for MemoryConnectionProvider {
    async fn connect(&self) -> Result<Box<dyn GraphConnection>, GraphError> {
        Ok(Box::new(MemoryConnection {
            graph: self.graph.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphTraversalSource, TraversalSource, __};

    fn social() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph.add_vertex("u1", "User", [("name", GValue::from("Ann")), ("age", GValue::from(31))]).unwrap();
        graph.add_vertex("u2", "User", [("name", GValue::from("Bob")), ("age", GValue::from(17))]).unwrap();
        graph.add_vertex("u3", "User", [("name", GValue::from("Cid")), ("age", GValue::from(45))]).unwrap();
        graph.add_vertex("p1", "Post", [("title", GValue::from("hello"))]).unwrap();
        graph.add_edge("FOLLOWS", "u1", "u2").unwrap();
        graph.add_edge("FOLLOWS", "u1", "u3").unwrap();
        graph.add_edge("FOLLOWS", "u3", "u2").unwrap();
        graph.add_edge("WROTE", "u2", "p1").unwrap();
        graph
    }

    async fn run(provider: &MemoryConnectionProvider, traversal: Traversal) -> Vec<GValue> {
        let source = TraversalSource::new(provider.connect().await.unwrap());
        source.to_list(&traversal).await.unwrap()
    }

    #[tokio::test]
    async fn test_has_and_navigation() {
        let provider = MemoryConnectionProvider::new(social());
        let g = GraphTraversalSource::new();

        let adults = run(&provider, g.v().has_label("User").has("age", P::gte(18)).values("name")).await;
        assert_eq!(adults, vec![GValue::from("Ann"), GValue::from("Cid")]);

        let followed = run(&provider, g.v_ids(["u1"]).out("FOLLOWS").id()).await;
        assert_eq!(followed, vec![GValue::from("u2"), GValue::from("u3")]);

        let followers = run(&provider, g.v_ids(["u2"]).in_("FOLLOWS").id()).await;
        assert_eq!(followers, vec![GValue::from("u1"), GValue::from("u3")]);

        let authors = run(&provider, g.e().has_label("WROTE").out_v().values("name")).await;
        assert_eq!(authors, vec![GValue::from("Bob")]);
    }

    #[tokio::test]
    async fn test_where_is_existential() {
        let provider = MemoryConnectionProvider::new(social());
        let g = GraphTraversalSource::new();

        let t = g
            .v()
            .has_label("User")
            .where_(__::out("FOLLOWS").has("age", P::lt(18)))
            .id();
        assert_eq!(run(&provider, t).await, vec![GValue::from("u1"), GValue::from("u3")]);
    }

    #[tokio::test]
    async fn test_value_map_by_unfold() {
        let provider = MemoryConnectionProvider::new(social());
        let g = GraphTraversalSource::new();

        let raw = run(&provider, g.v_ids(["u1"]).value_map(true)).await;
        let GValue::Map(map) = &raw[0] else { panic!("expected a map") };
        assert_eq!(map.get_str("name"), Some(&GValue::List(vec![GValue::from("Ann")])));

        let unfolded = run(&provider, g.v_ids(["u1"]).value_map(true).by(__::unfold())).await;
        let GValue::Map(map) = &unfolded[0] else { panic!("expected a map") };
        assert_eq!(map.get(&GKey::Token(T::Id)), Some(&GValue::from("u1")));
        assert_eq!(map.get(&GKey::Token(T::Label)), Some(&GValue::from("User")));
        assert_eq!(map.get_str("name"), Some(&GValue::from("Ann")));
        assert_eq!(map.get_str("age"), Some(&GValue::Int(31)));
    }

    #[tokio::test]
    async fn test_fold_project_pagination() {
        let provider = MemoryConnectionProvider::new(social());
        let g = GraphTraversalSource::new();

        let t = g
            .v()
            .has_label("User")
            .id()
            .fold()
            .project(["data", "total"])
            .by(__::unfold().range(1, 2).fold())
            .by(__::unfold().count());
        let result = run(&provider, t).await;

        let GValue::Map(map) = &result[0] else { panic!("expected a map") };
        assert_eq!(map.get_str("data"), Some(&GValue::List(vec![GValue::from("u2")])));
        assert_eq!(map.get_str("total"), Some(&GValue::Int(3)));

        let empty = run(&provider, g.v().has_label("Nobody").fold().project(["n"]).by(__::unfold().count())).await;
        let GValue::Map(map) = &empty[0] else { panic!("expected a map") };
        assert_eq!(map.get_str("n"), Some(&GValue::Int(0)));
    }

    #[tokio::test]
    async fn test_mutations() {
        let provider = MemoryConnectionProvider::new(social());
        let g = GraphTraversalSource::new();

        let created = run(&provider, g.add_v("User").property(T::Id, "u4").property("name", "Dee").id()).await;
        assert_eq!(created, vec![GValue::from("u4")]);

        let edge = g.add_e("FOLLOWS").from_(__::v(["u4"])).to(__::v(["u1"]));
        assert_eq!(run(&provider, edge).await.len(), 1);
        assert_eq!(run(&provider, g.v_ids(["u4"]).out("FOLLOWS").id()).await, vec![GValue::from("u1")]);

        run(&provider, g.v_ids(["u4"]).drop_()).await;
        let graph = provider.graph();
        let graph = graph.read().await;
        assert_eq!(graph.vertex_count(), 4);
        assert_eq!(graph.edge_count(), 4);
    }

    #[tokio::test]
    async fn test_invalid_traversals() {
        let provider = MemoryConnectionProvider::new(social());
        let source = TraversalSource::new(provider.connect().await.unwrap());
        let g = GraphTraversalSource::new();

        let orphan = g.v().by(__::unfold());
        assert!(matches!(source.to_list(&orphan).await, Err(GraphError::Evaluation(_))));

        let anonymous = __::out("FOLLOWS");
        assert!(matches!(source.to_list(&anonymous).await, Err(GraphError::Evaluation(_))));

        let duplicate = g.add_v("User").property(T::Id, "u1");
        assert!(matches!(source.to_list(&duplicate).await, Err(GraphError::Evaluation(_))));
    }
}
