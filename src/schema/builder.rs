//! Schema builder: derives ontology classes from type descriptors.
//!
//! Classes are computed once per builder and cached in a `DashMap`, so one
//! builder can be shared by threads encoding into different models. Writing a
//! class into a model is a separate, per-model step: the first `class_for`
//! against a model materializes the class triples there, later calls only hand
//! back the cached class.

use std::sync::Arc;

use dashmap::DashMap;
use oxigraph::model::vocab::{rdf, rdfs, xsd};
use oxigraph::model::{BlankNode, Literal, NamedNode, TripleRef};

use crate::config::{MapperConfig, MappingPolicy};
use crate::domain::{ElementKind, FieldDescriptor, FieldKind, TypeDescriptor};
use crate::error::SchemaError;
use crate::registry::{TypeRegistry, property_iri};
use crate::vocab::owl;

use super::{Cardinality, OntologyClass, OntologyModel, PropertyDecl, PropertyKind};

/// Builds and caches [`OntologyClass`]es for registered domain types.
pub struct SchemaBuilder {
    registry: Arc<TypeRegistry>,
    policy: MappingPolicy,
    disjointness: bool,
    /// Class IRI → derived class.
    classes: DashMap<String, Arc<OntologyClass>>,
}

impl SchemaBuilder {
    pub fn new(registry: Arc<TypeRegistry>, policy: MappingPolicy) -> Self {
        Self {
            registry,
            policy,
            disjointness: false,
            classes: DashMap::new(),
        }
    }

    pub fn from_config(registry: Arc<TypeRegistry>, config: &MapperConfig) -> Self {
        Self::new(registry, config.policy.clone()).with_disjointness(config.disjointness)
    }

    /// Track sibling classes and emit `owl:disjointWith` on [`close`](Self::close).
    pub fn with_disjointness(mut self, enabled: bool) -> Self {
        self.disjointness = enabled;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &MappingPolicy {
        &self.policy
    }

    /// Number of classes derived so far.
    pub fn cached(&self) -> usize {
        self.classes.len()
    }

    /// The ontology class of `descriptor`, guaranteed present in `model`.
    pub fn class_for(
        &self,
        model: &mut OntologyModel,
        descriptor: &TypeDescriptor,
    ) -> Result<Arc<OntologyClass>, SchemaError> {
        if descriptor.is_nested() {
            tracing::warn!(type_name = descriptor.qualified_name(), "nested type rejected");
            return Err(SchemaError::NestedType {
                type_name: descriptor.qualified_name().to_string(),
            });
        }

        let iri = self.registry.class_node(descriptor)?;
        let class = match self.classes.get(iri.as_str()) {
            Some(existing) => Arc::clone(existing.value()),
            None => {
                // Derive outside the shard lock; if another thread won the race
                // its class is kept, so every caller sees the same Arc.
                let built = Arc::new(self.derive(descriptor, iri.clone()));
                Arc::clone(self.classes.entry(iri.as_str().to_string()).or_insert(built).value())
            }
        };

        if model.mark_declared(&class.iri) {
            self.materialize(model, &class);
            self.link_supertypes(model, descriptor, &class);
        }
        Ok(class)
    }

    /// [`class_for`](Self::class_for) by qualified type name.
    pub fn class_for_name(
        &self,
        model: &mut OntologyModel,
        type_name: &str,
    ) -> Result<Arc<OntologyClass>, SchemaError> {
        let descriptor = self
            .registry
            .by_name(type_name)
            .ok_or_else(|| SchemaError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        self.class_for(model, &descriptor)
    }

    /// Build classes for every registered concrete type, then close the pass.
    pub fn build_all(&self, model: &mut OntologyModel) -> usize {
        let descriptors: Vec<_> = self
            .registry
            .types()
            .filter(|d| !d.is_nested())
            .cloned()
            .collect();
        let mut built = 0;
        for descriptor in descriptors {
            match self.class_for(model, &descriptor) {
                Ok(_) => built += 1,
                Err(e) => tracing::warn!(error = %e, "class skipped"),
            }
        }
        self.close(model);
        built
    }

    /// Final pass: pairwise `owl:disjointWith` for every sibling bucket with at
    /// least two classes. Returns the number of axioms added.
    pub fn close(&self, model: &mut OntologyModel) -> usize {
        if !self.disjointness {
            return 0;
        }
        let pairs: Vec<(NamedNode, NamedNode)> = model
            .sibling_buckets()
            .values()
            .filter(|bucket| bucket.len() >= 2)
            .flat_map(|bucket| {
                let members: Vec<_> = bucket.iter().cloned().collect();
                let mut pairs = Vec::new();
                for (i, a) in members.iter().enumerate() {
                    for b in &members[i + 1..] {
                        pairs.push((a.clone(), b.clone()));
                    }
                }
                pairs
            })
            .collect();

        let mut added = 0;
        for (a, b) in &pairs {
            if model.insert(TripleRef::new(a.as_ref(), owl::DISJOINT_WITH, b.as_ref())) {
                added += 1;
            }
        }
        tracing::debug!(axioms = added, "disjointness pass closed");
        added
    }

    fn derive(&self, descriptor: &TypeDescriptor, iri: NamedNode) -> OntologyClass {
        let superclasses = descriptor
            .supertypes()
            .iter()
            .filter_map(|name| {
                let iri = self.registry.class_iri(name);
                NamedNode::new(iri.as_str())
                    .map_err(|_| tracing::warn!(supertype = %name, "invalid supertype IRI"))
                    .ok()
            })
            .collect();

        let mut properties = Vec::new();
        for field in descriptor.fields() {
            if !self.policy.admits(descriptor, field) {
                tracing::debug!(
                    type_name = descriptor.qualified_name(),
                    field = field.name(),
                    "field excluded from schema"
                );
                continue;
            }
            match self.property(&iri, field) {
                Ok(Some(property)) => properties.push(property),
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    type_name = descriptor.qualified_name(),
                    field = field.name(),
                    error = %e,
                    "property skipped"
                ),
            }
        }

        tracing::debug!(
            class = %iri,
            properties = properties.len(),
            "ontology class derived"
        );
        OntologyClass {
            type_name: descriptor.qualified_name().to_string(),
            label: descriptor.simple_name().to_string(),
            iri,
            superclasses,
            properties,
        }
    }

    fn property(
        &self,
        class: &NamedNode,
        field: &FieldDescriptor,
    ) -> Result<Option<PropertyDecl>, SchemaError> {
        let iri_text = property_iri(class.as_str(), field.name());
        let iri = NamedNode::new(iri_text.as_str()).map_err(|_| SchemaError::InvalidIri {
            type_name: class.as_str().to_string(),
            iri: iri_text.clone(),
        })?;
        let datatypes = self.registry.datatypes();

        let (kind, cardinality, range) = match field.kind() {
            FieldKind::Scalar(ty) => (
                PropertyKind::Datatype,
                Cardinality::Functional,
                datatypes.datatype(*ty).into_owned(),
            ),
            FieldKind::Collection(ElementKind::Scalar(_)) => (
                PropertyKind::Datatype,
                Cardinality::ZeroToMany,
                rdf::LIST.into_owned(),
            ),
            FieldKind::Collection(ElementKind::Reference(target)) => {
                if self.is_nested(target) {
                    return Ok(None);
                }
                (PropertyKind::Object, Cardinality::ZeroToMany, rdf::LIST.into_owned())
            }
            FieldKind::Reference(target) => {
                if self.is_nested(target) {
                    return Ok(None);
                }
                let range = self.registry.class_iri(target);
                let range = NamedNode::new(range.as_str()).map_err(|_| SchemaError::InvalidIri {
                    type_name: target.clone(),
                    iri: range.clone(),
                })?;
                (PropertyKind::Object, Cardinality::Functional, range)
            }
        };

        Ok(Some(PropertyDecl {
            iri,
            field: field.name().to_string(),
            kind,
            cardinality,
            range,
        }))
    }

    fn is_nested(&self, type_name: &str) -> bool {
        let nested = self
            .registry
            .by_name(type_name)
            .is_some_and(|d| d.is_nested());
        if nested {
            tracing::debug!(target_type = type_name, "reference into nested type skipped");
        }
        nested
    }

    fn materialize(&self, model: &mut OntologyModel, class: &OntologyClass) {
        let ontology = model.iri().into_owned();
        let c = class.iri.as_ref();

        model.insert(TripleRef::new(c, rdf::TYPE, owl::CLASS));
        model.insert(TripleRef::new(
            c,
            rdfs::LABEL,
            Literal::new_simple_literal(class.label.as_str()).as_ref(),
        ));
        model.insert(TripleRef::new(c, rdfs::IS_DEFINED_BY, ontology.as_ref()));
        for superclass in &class.superclasses {
            model.insert(TripleRef::new(c, rdfs::SUB_CLASS_OF, superclass.as_ref()));
        }

        for property in &class.properties {
            let p = property.iri.as_ref();
            let kind = match property.kind {
                PropertyKind::Datatype => owl::DATATYPE_PROPERTY,
                PropertyKind::Object => owl::OBJECT_PROPERTY,
            };
            model.insert(TripleRef::new(p, rdf::TYPE, kind));
            model.insert(TripleRef::new(p, rdfs::DOMAIN, c));
            model.insert(TripleRef::new(p, rdfs::RANGE, property.range.as_ref()));
            model.insert(TripleRef::new(
                p,
                rdfs::LABEL,
                Literal::new_simple_literal(property.field.as_str()).as_ref(),
            ));
            model.insert(TripleRef::new(p, rdfs::IS_DEFINED_BY, ontology.as_ref()));

            match property.cardinality {
                Cardinality::Functional => {
                    model.insert(TripleRef::new(p, rdf::TYPE, owl::FUNCTIONAL_PROPERTY));
                }
                Cardinality::ZeroToMany => {
                    let restriction = BlankNode::default();
                    let zero = Literal::new_typed_literal("0", xsd::NON_NEGATIVE_INTEGER);
                    model.insert(TripleRef::new(restriction.as_ref(), rdf::TYPE, owl::RESTRICTION));
                    model.insert(TripleRef::new(restriction.as_ref(), owl::ON_PROPERTY, p));
                    model.insert(TripleRef::new(restriction.as_ref(), owl::MIN_CARDINALITY, zero.as_ref()));
                    model.insert(TripleRef::new(c, rdfs::SUB_CLASS_OF, restriction.as_ref()));
                }
            }
        }
    }

    fn link_supertypes(
        &self,
        model: &mut OntologyModel,
        descriptor: &TypeDescriptor,
        class: &OntologyClass,
    ) {
        for name in descriptor.supertypes() {
            let iri = self.registry.class_iri(name);
            let Some(superclass) = class.superclasses.iter().find(|s| s.as_str() == iri) else {
                continue;
            };
            if self.disjointness {
                model.add_sibling(superclass, &class.iri);
            }
            // Registered supertypes become classes of their own.
            if let Some(super_descriptor) = self.registry.by_name(name) {
                if let Err(e) = self.class_for(model, &super_descriptor) {
                    tracing::warn!(supertype = %name, error = %e, "supertype class skipped");
                }
            }
        }
    }
}

impl std::fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("classes", &self.classes.len())
            .field("disjointness", &self.disjointness)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Country, Location, Person, Species, Trip, Vessel};
    use crate::domain::descriptor_of;
    use oxigraph::model::{NamedNodeRef, TermRef};

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(catalog::registry(catalog::NAMESPACE).unwrap())
    }

    fn model() -> OntologyModel {
        OntologyModel::new(NamedNode::new("https://example.org/onto").unwrap())
    }

    fn has_type(model: &OntologyModel, node: NamedNodeRef<'_>, ty: NamedNodeRef<'_>) -> bool {
        model.graph().contains(TripleRef::new(node, rdf::TYPE, ty))
    }

    #[test]
    fn class_for_is_idempotent() {
        let builder = SchemaBuilder::new(registry(), MappingPolicy::default());
        let mut model = model();

        let first = builder.class_for(&mut model, &descriptor_of::<Vessel>()).unwrap();
        let triples = model.len();
        let second = builder.class_for(&mut model, &descriptor_of::<Vessel>()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(model.len(), triples);
        assert!(model.declares(first.iri()));
    }

    #[test]
    fn scalar_reference_and_collection_properties() {
        let reg = registry();
        let builder = SchemaBuilder::new(Arc::clone(&reg), MappingPolicy::default());
        let mut model = model();
        let class = builder.class_for(&mut model, &descriptor_of::<Vessel>()).unwrap();

        let name = class.property("name").unwrap();
        assert_eq!(name.kind, PropertyKind::Datatype);
        assert_eq!(name.cardinality, Cardinality::Functional);
        assert_eq!(name.range.as_ref(), xsd::STRING);
        assert!(has_type(&model, name.iri.as_ref(), owl::FUNCTIONAL_PROPERTY));

        let port = class.property("basePortLocation").unwrap();
        assert_eq!(port.kind, PropertyKind::Object);
        assert_eq!(port.range.as_str(), reg.class_iri(catalog::LOCATION));

        let former = class.property("formerNames").unwrap();
        assert_eq!(former.cardinality, Cardinality::ZeroToMany);
        assert!(!has_type(&model, former.iri.as_ref(), owl::FUNCTIONAL_PROPERTY));
        let restriction = model
            .graph()
            .subject_for_predicate_object(owl::ON_PROPERTY, former.iri.as_ref())
            .unwrap();
        let min = model
            .graph()
            .object_for_subject_predicate(restriction, owl::MIN_CARDINALITY)
            .unwrap();
        assert!(matches!(min, TermRef::Literal(l) if l.value() == "0"));
    }

    #[test]
    fn excluded_fields_have_no_property() {
        let builder = SchemaBuilder::new(registry(), MappingPolicy::default());
        let mut model = model();
        let class = builder.class_for(&mut model, &descriptor_of::<Vessel>()).unwrap();

        // Many-to-one without allow-listing, derived accessor.
        assert!(class.property("flagCountry").is_none());
        assert!(class.property("displayName").is_none());
    }

    #[test]
    fn allow_listed_many_to_one_is_mapped() {
        let mut policy = MappingPolicy::default();
        policy
            .allow_many_to_one
            .insert(format!("{}.flagCountry", catalog::VESSEL));
        let builder = SchemaBuilder::new(registry(), policy);
        let mut model = model();
        let class = builder.class_for(&mut model, &descriptor_of::<Vessel>()).unwrap();
        assert!(class.property("flagCountry").is_some());
    }

    #[test]
    fn nested_types_are_rejected_and_references_to_them_skipped() {
        let reg = registry();
        let builder = SchemaBuilder::new(Arc::clone(&reg), MappingPolicy::default());
        let mut model = model();

        let leg = reg.by_name(catalog::TRIP_LEG).unwrap();
        let err = builder.class_for(&mut model, &leg).unwrap_err();
        assert!(matches!(err, SchemaError::NestedType { .. }));

        let trip = builder.class_for(&mut model, &descriptor_of::<Trip>()).unwrap();
        assert!(trip.property("currentLeg").is_none());
        assert!(trip.property("vessel").is_some());
    }

    #[test]
    fn supertypes_become_superclasses() {
        let reg = registry();
        let builder = SchemaBuilder::new(Arc::clone(&reg), MappingPolicy::default());
        let mut model = model();
        let class = builder.class_for(&mut model, &descriptor_of::<Country>()).unwrap();

        let referential = NamedNode::new(reg.class_iri(catalog::REFERENTIAL)).unwrap();
        assert_eq!(class.superclasses(), &[referential.clone()]);
        assert!(model.graph().contains(TripleRef::new(
            class.iri(),
            rdfs::SUB_CLASS_OF,
            &referential
        )));
        // The registered interface is materialized too.
        assert!(model.declares(referential.as_ref()));
    }

    #[test]
    fn three_siblings_give_three_disjoint_pairs() {
        let builder =
            SchemaBuilder::new(registry(), MappingPolicy::default()).with_disjointness(true);
        let mut model = model();
        let country = builder.class_for(&mut model, &descriptor_of::<Country>()).unwrap();
        let location = builder.class_for(&mut model, &descriptor_of::<Location>()).unwrap();
        let species = builder.class_for(&mut model, &descriptor_of::<Species>()).unwrap();
        // Person has no referential supertype.
        builder.class_for(&mut model, &descriptor_of::<Person>()).unwrap();

        assert_eq!(builder.close(&mut model), 3);

        let classes = [country.iri(), location.iri(), species.iri()];
        let disjoint: Vec<_> = model
            .graph()
            .triples_for_predicate(owl::DISJOINT_WITH)
            .collect();
        assert_eq!(disjoint.len(), 3);
        for t in &disjoint {
            assert_ne!(TermRef::from(t.subject), t.object);
        }
        for (i, a) in classes.iter().enumerate() {
            for b in &classes[i + 1..] {
                let forward = model.graph().contains(TripleRef::new(*a, owl::DISJOINT_WITH, *b));
                let backward = model.graph().contains(TripleRef::new(*b, owl::DISJOINT_WITH, *a));
                assert!(forward || backward);
            }
        }
    }

    #[test]
    fn disjointness_off_adds_nothing() {
        let builder = SchemaBuilder::new(registry(), MappingPolicy::default());
        let mut model = model();
        builder.class_for(&mut model, &descriptor_of::<Country>()).unwrap();
        builder.class_for(&mut model, &descriptor_of::<Location>()).unwrap();
        assert_eq!(builder.close(&mut model), 0);
    }

    #[test]
    fn classes_are_shared_between_models() {
        let builder = SchemaBuilder::new(registry(), MappingPolicy::default());
        let mut a = model();
        let mut b = model();
        let first = builder.class_for(&mut a, &descriptor_of::<Vessel>()).unwrap();
        let second = builder.class_for(&mut b, &descriptor_of::<Vessel>()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(b.declares(second.iri()));
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn concurrent_class_for_builds_once() {
        let builder = Arc::new(SchemaBuilder::new(registry(), MappingPolicy::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let builder = Arc::clone(&builder);
                std::thread::spawn(move || {
                    let mut model = model();
                    builder.class_for(&mut model, &descriptor_of::<Vessel>()).unwrap()
                })
            })
            .collect();
        let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for class in &classes[1..] {
            assert!(Arc::ptr_eq(&classes[0], class));
        }
    }
}
