//! Encoder: depth-bounded walk of an object graph into RDF individuals.

use std::collections::HashMap;
use std::sync::Arc;

use oxigraph::model::vocab::rdf;
use oxigraph::model::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Term, TripleRef};

use crate::domain::{ElementKind, Entity, FieldKind, ObjectGraph, ObjectId, TypeDescriptor, Value};
use crate::error::FieldError;
use crate::registry::individual_iri;
use crate::schema::{OntologyClass, OntologyModel, PropertyDecl, SchemaBuilder};

use super::{Direction, MappingReport};

/// Result of encoding one root object.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// The individual representing the root, `None` if the root itself could
    /// not be encoded (missing slot, nested type).
    pub node: Option<NamedOrBlankNode>,
    pub report: MappingReport,
}

/// Encodes domain objects into an [`OntologyModel`], building classes on demand.
#[derive(Debug, Clone)]
pub struct Encoder {
    schema: Arc<SchemaBuilder>,
}

impl Encoder {
    pub fn new(schema: Arc<SchemaBuilder>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<SchemaBuilder> {
        &self.schema
    }

    /// Encode `root` and everything reachable from it within `max_depth`
    /// reference hops.
    pub fn encode(
        &self,
        model: &mut OntologyModel,
        objects: &ObjectGraph,
        root: ObjectId,
        max_depth: i32,
    ) -> Encoded {
        let mut pass = self.pass(model, objects, max_depth);
        let node = pass.encode(root);
        Encoded {
            node,
            report: pass.finish(),
        }
    }

    /// Start a pass that encodes several roots into one model, sharing the
    /// visited set so common objects are emitted once.
    pub fn pass<'a>(
        &'a self,
        model: &'a mut OntologyModel,
        objects: &'a ObjectGraph,
        max_depth: i32,
    ) -> EncodePass<'a> {
        EncodePass {
            schema: &self.schema,
            model,
            objects,
            max_depth,
            visited: HashMap::new(),
            owners: HashMap::new(),
            report: MappingReport::new(),
        }
    }
}

/// One encode traversal.
///
/// The visited map records, per object, its node and the depth budget it was
/// populated with. An object reached again with a larger budget is populated
/// again so the final graph does not depend on traversal order. A refresh only
/// revisits object-valued properties: scalars and already written list chains
/// are left alone.
pub struct EncodePass<'a> {
    schema: &'a SchemaBuilder,
    model: &'a mut OntologyModel,
    objects: &'a ObjectGraph,
    max_depth: i32,
    visited: HashMap<ObjectId, (NamedOrBlankNode, i32)>,
    /// Individual IRI → first object encoded under it.
    owners: HashMap<NamedNode, ObjectId>,
    report: MappingReport,
}

impl EncodePass<'_> {
    /// Encode one root object with the pass's depth budget.
    pub fn encode(&mut self, root: ObjectId) -> Option<NamedOrBlankNode> {
        self.visit(root, self.max_depth)
    }

    /// Number of distinct objects encoded so far.
    pub fn visited(&self) -> usize {
        self.visited.len()
    }

    pub fn finish(self) -> MappingReport {
        self.report
    }

    fn visit(&mut self, id: ObjectId, depth: i32) -> Option<NamedOrBlankNode> {
        let objects = self.objects;
        let Some(entity) = objects.get(id) else {
            self.report.dropped(
                Direction::Encode,
                id.to_string(),
                FieldError::DanglingReference { index: id.index() },
            );
            return None;
        };

        let existing = self.visited.get(&id).cloned();
        if let Some((node, populated)) = &existing {
            if *populated >= depth {
                return Some(node.clone());
            }
        }
        let refresh = existing.as_ref().map(|(_, d)| *d).filter(|d| *d >= 0);

        let descriptor = entity.descriptor();
        let class = match self.schema.class_for(self.model, &descriptor) {
            Ok(class) => class,
            Err(e) => {
                self.report
                    .dropped(Direction::Encode, id.to_string(), FieldError::Schema(e));
                return None;
            }
        };

        let node = match existing {
            Some((node, _)) => node,
            None => {
                let node = self.mint(&class, &descriptor, entity);
                if let NamedOrBlankNode::NamedNode(iri) = &node {
                    match self.owners.get(iri) {
                        Some(owner) if *owner != id => {
                            // Same (class, id) already emitted from another
                            // object: reuse that individual as-is.
                            tracing::debug!(individual = %iri, object = %id, owner = %owner, "individual reused");
                            self.visited.insert(id, (node.clone(), i32::MAX));
                            return Some(node);
                        }
                        _ => {
                            self.owners.insert(iri.clone(), id);
                        }
                    }
                }
                node
            }
        };

        self.visited.insert(id, (node.clone(), depth));
        self.model
            .insert(TripleRef::new(node.as_ref(), rdf::TYPE, class.iri()));
        if depth < 0 {
            return Some(node);
        }

        tracing::trace!(individual = %node, depth, "populating individual");
        for property in class.properties() {
            let Some(field) = descriptor.field(&property.field) else {
                continue;
            };
            let Some(value) = entity.get(field.name()) else {
                continue;
            };
            if let Err(e) = self.emit(&node, property, field.kind(), value, depth, refresh) {
                self.report
                    .field(Direction::Encode, node.to_string(), field.name(), e);
            }
        }
        Some(node)
    }

    fn mint(
        &mut self,
        class: &OntologyClass,
        descriptor: &TypeDescriptor,
        entity: &dyn Entity,
    ) -> NamedOrBlankNode {
        let identifier = descriptor
            .identifier_field()
            .and_then(|f| entity.get(f.name()))
            .and_then(|v| v.lexical());
        let Some(identifier) = identifier else {
            return BlankNode::default().into();
        };
        match NamedNode::new(individual_iri(class.iri().as_str(), &identifier)) {
            Ok(iri) => iri.into(),
            Err(_) => {
                tracing::warn!(class = %class.iri(), identifier = %identifier, "identifier is not IRI-safe, using a blank node");
                BlankNode::default().into()
            }
        }
    }

    /// `refresh` is the depth the node was populated with before, if any.
    fn emit(
        &mut self,
        node: &NamedOrBlankNode,
        property: &PropertyDecl,
        kind: &FieldKind,
        value: Value,
        depth: i32,
        refresh: Option<i32>,
    ) -> Result<(), FieldError> {
        let term = match (kind, value) {
            (FieldKind::Scalar(_), _) if refresh.is_some() => return Ok(()),
            (FieldKind::Scalar(ty), value) => {
                if value.scalar_type() != Some(*ty) {
                    return Err(FieldError::TypeMismatch {
                        field: property.field.clone(),
                        expected: ty.to_string(),
                        actual: value.kind_name().to_string(),
                    });
                }
                Term::from(self.literal(&value)?)
            }
            (FieldKind::Reference(_), Value::Reference(target)) => {
                if depth == 0 {
                    return Ok(());
                }
                let Some(target) = self.reference(target, depth - 1)? else {
                    return Ok(());
                };
                Term::from(target)
            }
            (FieldKind::Reference(_), other) => {
                return Err(mismatch(property, kind, other.kind_name()));
            }
            (FieldKind::Collection(element), Value::List(items)) => {
                if items.is_empty() {
                    return Ok(());
                }
                let object_valued = matches!(element, ElementKind::Reference(_));
                if object_valued && depth == 0 {
                    return Ok(());
                }
                match refresh {
                    Some(_) if !object_valued => return Ok(()),
                    Some(previous) if previous > 0 => {
                        // Chain already written; only deepen its targets.
                        for item in items {
                            if let Value::Reference(target) = item {
                                self.reference(target, depth - 1)?;
                            }
                        }
                        return Ok(());
                    }
                    _ => {}
                }
                let mut terms = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Reference(target) if object_valued => {
                            if let Some(target) = self.reference(target, depth - 1)? {
                                terms.push(Term::from(target));
                            }
                        }
                        scalar if !object_valued && scalar.scalar_type().is_some() => {
                            terms.push(Term::from(self.literal(&scalar)?));
                        }
                        other => return Err(mismatch(property, kind, other.kind_name())),
                    }
                }
                if terms.is_empty() {
                    return Ok(());
                }
                Term::from(self.list(terms))
            }
            (FieldKind::Collection(_), other) => {
                return Err(mismatch(property, kind, other.kind_name()));
            }
        };
        self.model
            .insert(TripleRef::new(node.as_ref(), property.iri.as_ref(), term.as_ref()));
        Ok(())
    }

    /// Encode a referenced object; `Ok(None)` when it is skipped silently.
    fn reference(
        &mut self,
        target: ObjectId,
        depth: i32,
    ) -> Result<Option<NamedOrBlankNode>, FieldError> {
        let objects = self.objects;
        let entity = objects
            .get(target)
            .ok_or(FieldError::DanglingReference {
                index: target.index(),
            })?;
        if entity.descriptor().is_nested() {
            tracing::debug!(object = %target, "reference to nested type skipped");
            return Ok(None);
        }
        Ok(self.visit(target, depth))
    }

    fn literal(&self, value: &Value) -> Result<Literal, FieldError> {
        let ty = value.scalar_type().ok_or(FieldError::TypeMismatch {
            field: String::new(),
            expected: "scalar".into(),
            actual: value.kind_name().into(),
        })?;
        let lexical = value.lexical().unwrap_or_default();
        let datatype = self.schema.registry().datatypes().datatype(ty);
        Ok(Literal::new_typed_literal(lexical, datatype))
    }

    /// Write an `rdf:first`/`rdf:rest` chain and return its head.
    fn list(&mut self, terms: Vec<Term>) -> NamedOrBlankNode {
        let cells: Vec<BlankNode> = terms.iter().map(|_| BlankNode::default()).collect();
        for (i, (cell, term)) in cells.iter().zip(&terms).enumerate() {
            self.model
                .insert(TripleRef::new(cell.as_ref(), rdf::FIRST, term.as_ref()));
            match cells.get(i + 1) {
                Some(next) => self.model.insert(TripleRef::new(cell.as_ref(), rdf::REST, next.as_ref())),
                None => self.model.insert(TripleRef::new(cell.as_ref(), rdf::REST, rdf::NIL)),
            };
        }
        // Non-empty by construction.
        match cells.into_iter().next() {
            Some(head) => head.into(),
            None => rdf::NIL.into_owned().into(),
        }
    }
}

fn mismatch(property: &PropertyDecl, kind: &FieldKind, actual: &str) -> FieldError {
    let expected = match kind {
        FieldKind::Scalar(ty) => ty.to_string(),
        FieldKind::Reference(target) => format!("reference to {target}"),
        FieldKind::Collection(_) => "list".to_string(),
    };
    FieldError::TypeMismatch {
        field: property.field.clone(),
        expected,
        actual: actual.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Location, Person, Trip, Vessel};
    use crate::config::MappingPolicy;
    use crate::registry::{TypeRegistry, property_iri};
    use oxigraph::model::vocab::xsd;
    use oxigraph::model::{NamedNodeRef, TermRef};

    fn encoder() -> (Encoder, Arc<TypeRegistry>) {
        let registry = Arc::new(catalog::registry(catalog::NAMESPACE).unwrap());
        let schema = SchemaBuilder::new(Arc::clone(&registry), MappingPolicy::default());
        (Encoder::new(Arc::new(schema)), registry)
    }

    fn model() -> OntologyModel {
        OntologyModel::new(NamedNode::new("https://example.org/onto").unwrap())
    }

    fn prop(registry: &TypeRegistry, type_name: &str, field: &str) -> NamedNode {
        NamedNode::new(property_iri(&registry.class_iri(type_name), field)).unwrap()
    }

    fn object_of<'g>(
        model: &'g OntologyModel,
        node: &NamedOrBlankNode,
        predicate: NamedNodeRef<'_>,
    ) -> Option<TermRef<'g>> {
        model
            .graph()
            .object_for_subject_predicate(node.as_ref(), predicate)
    }

    #[test]
    fn vessel_with_port_and_no_owner() {
        let (encoder, registry) = encoder();
        let mut objects = ObjectGraph::new();
        let port = objects.add(Location::with_id(10));
        let mut vessel = Vessel::new(1, "Navire 1");
        vessel.base_port_location = Some(port);
        let root = objects.add(vessel);

        let mut model = model();
        let encoded = encoder.encode(&mut model, &objects, root, 2);
        let node = encoded.node.unwrap();

        assert_eq!(
            node.to_string(),
            format!("<{}#1>", registry.class_iri(catalog::VESSEL))
        );
        let name = object_of(&model, &node, prop(&registry, catalog::VESSEL, "name").as_ref());
        assert!(matches!(name, Some(TermRef::Literal(l)) if l.value() == "Navire 1"));
        assert!(object_of(&model, &node, prop(&registry, catalog::VESSEL, "owner").as_ref()).is_none());

        let port_iri = format!("{}#10", registry.class_iri(catalog::LOCATION));
        let port = object_of(&model, &node, prop(&registry, catalog::VESSEL, "basePortLocation").as_ref());
        assert!(matches!(port, Some(TermRef::NamedNode(n)) if n.as_str() == port_iri));
        assert!(encoded.report.is_clean());
    }

    #[test]
    fn identifier_is_a_literal_property() {
        let (encoder, registry) = encoder();
        let mut objects = ObjectGraph::new();
        let root = objects.add(Vessel::new(7, "Ker Avel"));
        let mut model = model();
        let node = encoder.encode(&mut model, &objects, root, 1).node.unwrap();

        let id = object_of(&model, &node, prop(&registry, catalog::VESSEL, "id").as_ref());
        assert!(matches!(id, Some(TermRef::Literal(l)) if l.value() == "7" && l.datatype() == xsd::LONG));
    }

    #[test]
    fn depth_zero_has_no_object_properties() {
        let (encoder, registry) = encoder();
        let mut objects = ObjectGraph::new();
        let port = objects.add(Location::with_id(10));
        let mut vessel = Vessel::new(1, "Navire 1");
        vessel.base_port_location = Some(port);
        let root = objects.add(vessel);

        let mut model = model();
        let node = encoder.encode(&mut model, &objects, root, 0).node.unwrap();

        assert!(object_of(&model, &node, prop(&registry, catalog::VESSEL, "name").as_ref()).is_some());
        assert!(
            object_of(&model, &node, prop(&registry, catalog::VESSEL, "basePortLocation").as_ref())
                .is_none()
        );
    }

    #[test]
    fn negative_depth_gives_typed_only_node() {
        let (encoder, _) = encoder();
        let mut objects = ObjectGraph::new();
        let root = objects.add(Vessel::new(1, "Navire 1"));
        let mut model = model();
        let node = encoder.encode(&mut model, &objects, root, -1).node.unwrap();
        assert_eq!(model.graph().triples_for_subject(node.as_ref()).count(), 1);
    }

    #[test]
    fn cycle_yields_one_individual_each() {
        let (encoder, registry) = encoder();
        let mut objects = ObjectGraph::new();
        let vessel = objects.add(Vessel::new(1, "Navire 1"));
        let mut skipper = Person::new(5, "Yann");
        skipper.vessel = Some(vessel);
        let person = objects.add(skipper);
        objects
            .get_mut(vessel)
            .unwrap()
            .set("owner", Value::Reference(person))
            .unwrap();

        let mut model = model();
        let mut pass = encoder.pass(&mut model, &objects, 3);
        let a = pass.encode(vessel).unwrap();
        assert_eq!(pass.visited(), 2);
        assert!(pass.finish().is_clean());

        let owner = object_of(&model, &a, prop(&registry, catalog::VESSEL, "owner").as_ref());
        let Some(TermRef::NamedNode(b)) = owner else {
            panic!("owner should be an IRI, got {owner:?}");
        };
        let back = model
            .graph()
            .object_for_subject_predicate(b, prop(&registry, catalog::PERSON, "vessel").as_ref());
        assert_eq!(back, Some(TermRef::from(a.as_ref())));

        let typed = model
            .graph()
            .subjects_for_predicate_object(rdf::TYPE, NamedNode::new(registry.class_iri(catalog::PERSON)).unwrap().as_ref())
            .count();
        assert_eq!(typed, 1);
    }

    #[test]
    fn deeper_revisit_keeps_a_single_list_chain() {
        let (encoder, _) = encoder();
        let mut objects = ObjectGraph::new();
        let vessel = objects.add(Vessel {
            former_names: vec!["Ar Mor".into(), "Penn Ar Bed".into()],
            ..Vessel::new(1, "Navire 1")
        });
        let trip = objects.add(Trip {
            id: Some(7),
            vessel: Some(vessel),
            ..Trip::default()
        });

        let mut model = model();
        let mut pass = encoder.pass(&mut model, &objects, 2);
        pass.encode(trip);
        pass.encode(vessel);
        assert!(pass.finish().is_clean());

        let cells = model.graph().triples_for_predicate(rdf::FIRST).count();
        assert_eq!(cells, 2);
    }

    #[test]
    fn null_fields_emit_nothing() {
        let (encoder, _) = encoder();
        let mut objects = ObjectGraph::new();
        let root = objects.add(Vessel {
            id: Some(3),
            ..Vessel::default()
        });
        let mut model = model();
        let node = encoder.encode(&mut model, &objects, root, 2).node.unwrap();
        // rdf:type and id only.
        assert_eq!(model.graph().triples_for_subject(node.as_ref()).count(), 2);
    }

    #[test]
    fn collections_become_rdf_lists_and_empty_ones_vanish() {
        let (encoder, registry) = encoder();
        let mut objects = ObjectGraph::new();
        let mut vessel = Vessel::new(1, "Navire 1");
        vessel.former_names = vec!["Ar Mor".into(), "Penn Ar Bed".into()];
        let with_names = objects.add(vessel);
        let without_names = objects.add(Vessel::new(2, "Navire 2"));

        let mut model = model();
        let mut pass = encoder.pass(&mut model, &objects, 1);
        let a = pass.encode(with_names).unwrap();
        let b = pass.encode(without_names).unwrap();
        drop(pass);

        let predicate = prop(&registry, catalog::VESSEL, "formerNames");
        assert!(object_of(&model, &b, predicate.as_ref()).is_none());

        let Some(TermRef::BlankNode(head)) = object_of(&model, &a, predicate.as_ref()) else {
            panic!("list head should be a blank node");
        };
        let first = model.graph().object_for_subject_predicate(head, rdf::FIRST);
        assert!(matches!(first, Some(TermRef::Literal(l)) if l.value() == "Ar Mor"));
        let Some(TermRef::BlankNode(second)) =
            model.graph().object_for_subject_predicate(head, rdf::REST)
        else {
            panic!("second cell missing");
        };
        assert_eq!(
            model.graph().object_for_subject_predicate(second, rdf::REST),
            Some(TermRef::from(rdf::NIL))
        );
    }

    #[test]
    fn objects_without_identifier_become_blank_nodes() {
        let (encoder, _) = encoder();
        let mut objects = ObjectGraph::new();
        let root = objects.add(Location::default());
        let mut model = model();
        let node = encoder.encode(&mut model, &objects, root, 1).node.unwrap();
        assert!(matches!(node, NamedOrBlankNode::BlankNode(_)));
    }

    #[test]
    fn duplicate_identity_is_reused() {
        let (encoder, registry) = encoder();
        let mut objects = ObjectGraph::new();
        let first = objects.add(Vessel::new(1, "Navire 1"));
        let second = objects.add(Vessel::new(1, "Renamed"));

        let mut model = model();
        let mut pass = encoder.pass(&mut model, &objects, 1);
        let a = pass.encode(first).unwrap();
        let b = pass.encode(second).unwrap();
        drop(pass);

        assert_eq!(a, b);
        let names = model
            .graph()
            .objects_for_subject_predicate(a.as_ref(), prop(&registry, catalog::VESSEL, "name").as_ref())
            .count();
        assert_eq!(names, 1);
    }

    #[test]
    fn dangling_reference_is_reported_per_field() {
        let (encoder, _) = encoder();
        let mut objects = ObjectGraph::new();
        let port = objects.add(Location::with_id(10));
        let mut vessel = Vessel::new(1, "Navire 1");
        vessel.base_port_location = Some(port);
        let root = objects.add(vessel);
        objects.remove(port);

        let mut model = model();
        let encoded = encoder.encode(&mut model, &objects, root, 2);
        assert!(encoded.node.is_some());
        assert_eq!(encoded.report.len(), 1);
        assert_eq!(encoded.report.issues()[0].field.as_deref(), Some("basePortLocation"));
    }
}
