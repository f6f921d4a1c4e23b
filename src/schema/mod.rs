//! Ontology schema: the target graph and the classes synthesized into it.
//!
//! - [`OntologyModel`]: one target graph plus the bookkeeping of a single
//!   schema-build pass (which classes are materialized, sibling buckets for
//!   disjointness).
//! - [`OntologyClass`]: the derived shape of one domain type, computed once by
//!   the [`SchemaBuilder`] and shared between models.

pub mod builder;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, NamedNode, NamedNodeRef, TripleRef};

use crate::vocab::owl;

pub use builder::SchemaBuilder;

/// Whether a property links to literals or to individuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    Datatype,
    Object,
}

/// Cardinality constraint attached to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Single-valued (`owl:FunctionalProperty`).
    Functional,
    /// Ordered collection, `owl:minCardinality 0`, no upper bound.
    ZeroToMany,
}

/// A declared property of an ontology class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub iri: NamedNode,
    pub field: String,
    pub kind: PropertyKind,
    pub cardinality: Cardinality,
    /// XSD datatype, target class, or `rdf:List` for collections.
    pub range: NamedNode,
}

/// A schema node describing one domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntologyClass {
    pub(crate) iri: NamedNode,
    pub(crate) type_name: String,
    pub(crate) label: String,
    pub(crate) superclasses: Vec<NamedNode>,
    pub(crate) properties: Vec<PropertyDecl>,
}

impl OntologyClass {
    pub fn iri(&self) -> NamedNodeRef<'_> {
        self.iri.as_ref()
    }

    /// Qualified name of the domain type this class was derived from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn superclasses(&self) -> &[NamedNode] {
        &self.superclasses
    }

    pub fn properties(&self) -> &[PropertyDecl] {
        &self.properties
    }

    pub fn property(&self, field: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.field == field)
    }
}

/// The in-memory target graph of one schema-build and encode pass.
#[derive(Debug, Clone)]
pub struct OntologyModel {
    iri: NamedNode,
    graph: Graph,
    declared: HashSet<NamedNode>,
    /// Supertype → classes built under it during this pass.
    siblings: BTreeMap<NamedNode, BTreeSet<NamedNode>>,
}

impl OntologyModel {
    /// Create an empty model whose `owl:Ontology` node is `iri`.
    pub fn new(iri: NamedNode) -> Self {
        let mut graph = Graph::new();
        graph.insert(TripleRef::new(iri.as_ref(), rdf::TYPE, owl::ONTOLOGY));
        Self {
            iri,
            graph,
            declared: HashSet::new(),
            siblings: BTreeMap::new(),
        }
    }

    /// The ontology IRI (`rdfs:isDefinedBy` target for every class and property).
    pub fn iri(&self) -> NamedNodeRef<'_> {
        self.iri.as_ref()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn into_graph(self) -> Graph {
        self.graph
    }

    /// Number of triples in the model.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Whether a class has been materialized into this model.
    pub fn declares(&self, class: NamedNodeRef<'_>) -> bool {
        self.declared.contains(&class.into_owned())
    }

    pub(crate) fn insert<'a>(&mut self, triple: impl Into<TripleRef<'a>>) -> bool {
        self.graph.insert(triple)
    }

    /// Record a class as materialized; `false` if it already was.
    pub(crate) fn mark_declared(&mut self, class: &NamedNode) -> bool {
        self.declared.insert(class.clone())
    }

    pub(crate) fn add_sibling(&mut self, supertype: &NamedNode, class: &NamedNode) {
        self.siblings
            .entry(supertype.clone())
            .or_default()
            .insert(class.clone());
    }

    pub(crate) fn sibling_buckets(&self) -> &BTreeMap<NamedNode, BTreeSet<NamedNode>> {
        &self.siblings
    }
}
