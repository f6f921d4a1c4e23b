// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # owlmap
//!
//! A reflective mapper between in-memory domain object graphs and RDF/OWL
//! ontologies.
//!
//! ## Architecture
//!
//! - **Type registry** (`registry`): qualified names ⇄ class IRIs, datatype table
//! - **Schema builder** (`schema`): derives `owl:Class` declarations, properties
//!   and cardinality restrictions from type descriptors, cached per class
//! - **Codec** (`codec`): depth-bounded, cycle-safe encoder and a decoder with
//!   a per-run reference cache and override resolvers
//! - **Gateway** (`gateway`): persistence boundary for references, streaming
//!   and saves
//! - **Synchronization** (`sync`): fetch → decode → re-encode → compare
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use owlmap::catalog::{self, Vessel};
//! use owlmap::codec::Encoder;
//! use owlmap::domain::ObjectGraph;
//! use owlmap::schema::{OntologyModel, SchemaBuilder};
//! use owlmap::config::MappingPolicy;
//! use oxigraph::model::NamedNode;
//!
//! let registry = Arc::new(catalog::registry(catalog::NAMESPACE).unwrap());
//! let schema = Arc::new(SchemaBuilder::new(registry, MappingPolicy::default()));
//! let encoder = Encoder::new(schema);
//!
//! let mut objects = ObjectGraph::new();
//! let vessel = objects.add(Vessel::new(1, "Navire 1"));
//! let mut model = OntologyModel::new(NamedNode::new("https://owlmap.dev/onto").unwrap());
//! let encoded = encoder.encode(&mut model, &objects, vessel, 1);
//! assert!(encoded.node.is_some());
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod gateway;
pub mod io;
pub mod registry;
pub mod schema;
pub mod sync;
pub mod vocab;
