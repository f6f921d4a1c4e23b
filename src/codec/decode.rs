//! Decoder: RDF individuals back into domain objects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use oxigraph::model::vocab::rdf;
use oxigraph::model::{Graph, NamedOrBlankNodeRef, TermRef};

use crate::config::{KeyResolution, MapperConfig};
use crate::domain::{
    ElementKind, Entity, FieldDescriptor, FieldKind, ObjectGraph, ObjectId, ScalarType, TypeDescriptor, Value,
};
use crate::error::{FieldError, FieldResult, GatewayError};
use crate::gateway::{EntityKey, PersistenceGateway};
use crate::registry::{TypeRegistry, split_fragment};
use crate::vocab::owl;

use super::resolver::{ResolveContext, ResolverRegistry};
use super::{Direction, MappingReport};

/// How far an individual has been materialized in the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Obtained from the gateway; upgraded in place when the individual is
    /// decoded from the source graph.
    Proxy,
    /// Produced by an override resolver; its own source triples are still
    /// applied on top when the individual is decoded.
    Resolved,
    /// Populated from the source graph.
    Decoded,
}

/// How to undo a partially decoded individual after a fatal failure.
enum Restore {
    Remove,
    Proxy(Option<Box<dyn Entity>>),
    Resolved,
}

/// Individual → materialized object, scoped to one decode pass.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    entries: HashMap<String, (ObjectId, CacheState)>,
}

impl ReferenceCache {
    pub fn get(&self, individual: &str) -> Option<(ObjectId, CacheState)> {
        self.entries.get(individual).copied()
    }

    pub fn insert(&mut self, individual: impl Into<String>, id: ObjectId, state: CacheState) {
        self.entries.insert(individual.into(), (id, state));
    }

    pub fn remove(&mut self, individual: &str) -> Option<(ObjectId, CacheState)> {
        self.entries.remove(individual)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State of one decode pass: the objects produced, the reference cache and the
/// issues met along the way.
#[derive(Debug, Default)]
pub struct DecodeSession {
    pub objects: ObjectGraph,
    pub cache: ReferenceCache,
    pub report: MappingReport,
    decoded: Vec<ObjectId>,
}

impl DecodeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects populated from the source graph, in decode order.
    pub fn decoded(&self) -> &[ObjectId] {
        &self.decoded
    }

    /// The object an individual decoded to, if any.
    pub fn object_for(&self, individual: &str) -> Option<ObjectId> {
        self.cache
            .get(individual)
            .map(|(id, _)| id)
            .filter(|id| self.objects.contains(*id))
    }
}

/// Cache key of a subject: the IRI itself, or `_:id` for blank nodes.
fn cache_key(node: NamedOrBlankNodeRef<'_>) -> String {
    match node {
        NamedOrBlankNodeRef::NamedNode(n) => n.as_str().to_string(),
        other => other.to_string(),
    }
}

/// Turns individuals of a source graph into domain objects.
pub struct Decoder {
    registry: Arc<TypeRegistry>,
    gateway: Arc<dyn PersistenceGateway>,
    resolvers: ResolverRegistry,
    key_resolution: KeyResolution,
}

impl Decoder {
    pub fn new(registry: Arc<TypeRegistry>, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            registry,
            gateway,
            resolvers: ResolverRegistry::new(),
            key_resolution: KeyResolution::default(),
        }
    }

    pub fn from_config(
        registry: Arc<TypeRegistry>,
        gateway: Arc<dyn PersistenceGateway>,
        config: &MapperConfig,
    ) -> Self {
        Self::new(registry, gateway).with_key_resolution(config.key_resolution)
    }

    pub fn with_resolvers(mut self, resolvers: ResolverRegistry) -> Self {
        self.resolvers = resolvers;
        self
    }

    pub fn with_key_resolution(mut self, key_resolution: KeyResolution) -> Self {
        self.key_resolution = key_resolution;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// Decode every individual of every class declared in `source`.
    pub fn decode_all(&self, source: &Graph) -> DecodeSession {
        let mut session = DecodeSession::new();
        let classes: Vec<_> = source
            .subjects_for_predicate_object(rdf::TYPE, owl::CLASS)
            .filter_map(|s| match s {
                NamedOrBlankNodeRef::NamedNode(n) => Some(n),
                _ => None,
            })
            .collect();

        for class in classes {
            if self.registry.resolve_iri(class.as_str()).is_none() {
                tracing::debug!(class = %class, "class not registered, individuals skipped");
                continue;
            }
            let individuals: Vec<_> = source
                .subjects_for_predicate_object(rdf::TYPE, class)
                .collect();
            for individual in individuals {
                self.decode(source, individual, &mut session);
            }
        }

        tracing::info!(
            decoded = session.decoded.len(),
            objects = session.objects.len(),
            issues = session.report.len(),
            "decode pass done"
        );
        session
    }

    /// Decode one individual. `None` when its class is unknown or abstract, or
    /// when a gateway failure dropped it.
    ///
    /// Individuals of a class with an override resolver start from the
    /// resolved object whichever way they are reached first, so the result
    /// does not depend on decode order. A dropped individual leaves any proxy
    /// or resolved object that others already point to in place.
    pub fn decode<'g>(
        &self,
        source: &'g Graph,
        individual: impl Into<NamedOrBlankNodeRef<'g>>,
        session: &mut DecodeSession,
    ) -> Option<ObjectId> {
        let individual = individual.into();
        let key = cache_key(individual);
        let prior = match session.cache.get(&key) {
            Some((id, CacheState::Decoded)) => return Some(id),
            other => other,
        };

        let Some(descriptor) = self.declared_type(source, individual) else {
            tracing::debug!(individual = %key, "no registered class for individual");
            return None;
        };
        if descriptor.is_interface() {
            tracing::debug!(individual = %key, type_name = descriptor.qualified_name(), "interface-typed individual skipped");
            return None;
        }

        let prior = match prior {
            Some(entry) => Some(entry),
            None => match self.resolve_individual(source, individual, session) {
                Ok(resolved) => resolved.map(|id| (id, CacheState::Resolved)),
                Err(e) if e.is_fatal() => {
                    session.report.dropped(Direction::Decode, key, e);
                    return None;
                }
                Err(e) => {
                    tracing::debug!(individual = %key, error = %e, "override resolver failed, decoding from source");
                    None
                }
            },
        };

        let (id, restore) = match prior {
            Some((id, CacheState::Resolved)) => (id, Restore::Resolved),
            _ => {
                let Some(instance) = descriptor.instantiate() else {
                    session.report.dropped(
                        Direction::Decode,
                        key,
                        FieldError::Gateway(GatewayError::NotInstantiable {
                            type_name: descriptor.qualified_name().to_string(),
                        }),
                    );
                    return None;
                };
                match prior {
                    Some((id, _)) => (id, Restore::Proxy(session.objects.replace(id, instance))),
                    None => (session.objects.insert(instance), Restore::Remove),
                }
            }
        };
        // Registered before any field is resolved, so cycles come back here.
        session.cache.insert(key.clone(), id, CacheState::Decoded);

        let mut values = Vec::new();
        for triple in source.triples_for_subject(individual) {
            let predicate = triple.predicate.as_str();
            if !self.registry.owns(predicate) {
                continue;
            }
            let Some((_, name)) = split_fragment(predicate) else {
                continue;
            };
            let Some(field) = locate(&descriptor, name) else {
                session.report.field(
                    Direction::Decode,
                    key.as_str(),
                    name,
                    FieldError::UnknownField {
                        type_name: descriptor.qualified_name().to_string(),
                        field: name.to_string(),
                    },
                );
                continue;
            };
            match self.value(source, field, triple.object, session) {
                Ok(value) => values.push((field.name(), value)),
                Err(e) if e.is_fatal() => {
                    undo(session, id, &key, restore);
                    session.report.dropped(Direction::Decode, key, e);
                    return None;
                }
                Err(e) => session
                    .report
                    .field(Direction::Decode, key.as_str(), field.name(), e),
            }
        }

        let mut failures = Vec::new();
        if let Some(entity) = session.objects.get_mut(id) {
            for (name, value) in values {
                if let Err(e) = entity.set(name, value) {
                    failures.push((name, e));
                }
            }
        }
        for (name, e) in failures {
            session.report.field(Direction::Decode, key.as_str(), name, e);
        }

        session.decoded.push(id);
        tracing::trace!(individual = %key, object = %id, "individual decoded");
        Some(id)
    }

    /// Run the override resolver of the individual's class, if there is one.
    fn resolve_individual(
        &self,
        source: &Graph,
        individual: NamedOrBlankNodeRef<'_>,
        session: &mut DecodeSession,
    ) -> FieldResult<Option<ObjectId>> {
        let NamedOrBlankNodeRef::NamedNode(iri) = individual else {
            return Ok(None);
        };
        let Some((class_iri, fragment)) = split_fragment(iri.as_str()) else {
            return Ok(None);
        };
        let Some(resolver) = self.resolvers.get(class_iri) else {
            return Ok(None);
        };
        let ctx = ResolveContext {
            source,
            individual: iri,
            class_iri,
            fragment,
            registry: &self.registry,
            gateway: self.gateway.as_ref(),
        };
        resolver.resolve(&ctx, session).map(Some)
    }

    /// First `rdf:type` of the individual that maps to a registered type.
    fn declared_type(
        &self,
        source: &Graph,
        individual: NamedOrBlankNodeRef<'_>,
    ) -> Option<Arc<TypeDescriptor>> {
        source
            .objects_for_subject_predicate(individual, rdf::TYPE)
            .find_map(|ty| match ty {
                TermRef::NamedNode(class) => self.registry.resolve_iri(class.as_str()),
                _ => None,
            })
    }

    fn value(
        &self,
        source: &Graph,
        field: &FieldDescriptor,
        term: TermRef<'_>,
        session: &mut DecodeSession,
    ) -> FieldResult<Value> {
        match field.kind() {
            FieldKind::Scalar(ty) => self.scalar(field.name(), *ty, term),
            FieldKind::Reference(target) => self
                .reference(source, field.name(), target, term, session)
                .map(Value::Reference),
            FieldKind::Collection(element) => {
                let items = list_items(source, term)?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = match element {
                        ElementKind::Scalar(ty) => self.scalar(field.name(), *ty, item)?,
                        ElementKind::Reference(target) => Value::Reference(
                            self.reference(source, field.name(), target, item, session)?,
                        ),
                    };
                    values.push(value);
                }
                Ok(Value::List(values))
            }
        }
    }

    fn scalar(&self, field: &str, ty: ScalarType, term: TermRef<'_>) -> FieldResult<Value> {
        let TermRef::Literal(literal) = term else {
            return Err(FieldError::UnexpectedTerm {
                field: field.to_string(),
                term: term.to_string(),
            });
        };
        if let Some(declared) = self.registry.datatypes().scalar_type(literal.datatype()) {
            if !accepts(ty, declared) {
                return Err(FieldError::TypeMismatch {
                    field: field.to_string(),
                    expected: ty.to_string(),
                    actual: declared.to_string(),
                });
            }
        }
        Value::parse(literal.value(), ty)
    }

    fn reference(
        &self,
        source: &Graph,
        field: &str,
        target: &str,
        term: TermRef<'_>,
        session: &mut DecodeSession,
    ) -> FieldResult<ObjectId> {
        let iri = match term {
            TermRef::NamedNode(iri) => iri,
            TermRef::BlankNode(blank) => {
                // Identity-less objects are inlined as blank nodes.
                return self
                    .decode(source, blank, session)
                    .ok_or_else(|| FieldError::UnknownClass {
                        class: target.to_string(),
                    });
            }
            other => {
                return Err(FieldError::UnexpectedTerm {
                    field: field.to_string(),
                    term: other.to_string(),
                });
            }
        };

        if let Some((id, _)) = session.cache.get(iri.as_str()) {
            return Ok(id);
        }
        let Some((class_iri, fragment)) = split_fragment(iri.as_str()) else {
            return Err(FieldError::UnexpectedTerm {
                field: field.to_string(),
                term: iri.to_string(),
            });
        };

        if let Some(resolver) = self.resolvers.get(class_iri) {
            let ctx = ResolveContext {
                source,
                individual: iri,
                class_iri,
                fragment,
                registry: &self.registry,
                gateway: self.gateway.as_ref(),
            };
            return resolver.resolve(&ctx, session);
        }

        let descriptor =
            self.registry
                .resolve_iri(class_iri)
                .ok_or_else(|| FieldError::UnknownClass {
                    class: class_iri.to_string(),
                })?;
        let key = EntityKey::parse(fragment, self.key_resolution)?;
        let entity = self.gateway.reference(&descriptor, &key)?;
        let id = session.objects.insert(entity);
        session.cache.insert(iri.as_str(), id, CacheState::Proxy);
        Ok(id)
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("registry", &self.registry)
            .field("resolvers", &self.resolvers)
            .field("key_resolution", &self.key_resolution)
            .finish()
    }
}

fn undo(session: &mut DecodeSession, id: ObjectId, key: &str, restore: Restore) {
    match restore {
        Restore::Remove => {
            session.objects.remove(id);
            session.cache.remove(key);
        }
        Restore::Proxy(previous) => {
            match previous {
                Some(proxy) => {
                    session.objects.replace(id, proxy);
                }
                None => {
                    session.objects.remove(id);
                }
            }
            session.cache.insert(key, id, CacheState::Proxy);
        }
        Restore::Resolved => session.cache.insert(key, id, CacheState::Resolved),
    }
}

/// The identifier field is matched first, then the generic name lookup.
fn locate<'d>(descriptor: &'d TypeDescriptor, name: &str) -> Option<&'d FieldDescriptor> {
    descriptor
        .identifier_field()
        .filter(|f| f.name() == name)
        .or_else(|| descriptor.field(name))
}

/// Plain strings and unknown datatypes are parsed lexically; integers widen
/// to floating point.
fn accepts(target: ScalarType, declared: ScalarType) -> bool {
    use ScalarType::*;
    matches!(
        (target, declared),
        (_, String) | (Int | Long, Int | Long) | (Float | Double, Int | Long | Float | Double)
    ) || target == declared
}

/// Elements of an `rdf:first`/`rdf:rest` chain.
fn list_items<'g>(source: &'g Graph, head: TermRef<'g>) -> FieldResult<Vec<TermRef<'g>>> {
    let malformed = |node: TermRef<'_>| FieldError::MalformedList {
        node: node.to_string(),
    };
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut cell = head;
    loop {
        let subject: NamedOrBlankNodeRef<'g> = match cell {
            TermRef::NamedNode(n) if n == rdf::NIL => return Ok(items),
            TermRef::NamedNode(n) => n.into(),
            TermRef::BlankNode(b) => b.into(),
            other => return Err(malformed(other)),
        };
        if !seen.insert(subject) {
            return Err(malformed(cell));
        }
        let first = source
            .object_for_subject_predicate(subject, rdf::FIRST)
            .ok_or_else(|| malformed(cell))?;
        let rest = source
            .object_for_subject_predicate(subject, rdf::REST)
            .ok_or_else(|| malformed(cell))?;
        items.push(first);
        cell = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Country, Location, Person, Vessel};
    use crate::codec::NaturalKeyResolver;
    use crate::gateway::InMemoryGateway;
    use crate::registry::{individual_iri, property_iri};
    use oxigraph::model::vocab::xsd;
    use oxigraph::model::{BlankNode, Literal, NamedNode, TripleRef};

    fn node(iri: String) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    struct Fixture {
        registry: Arc<TypeRegistry>,
        graph: Graph,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Arc::new(catalog::registry(catalog::NAMESPACE).unwrap()),
                graph: Graph::new(),
            }
        }

        fn class(&self, type_name: &str) -> NamedNode {
            node(self.registry.class_iri(type_name))
        }

        fn individual(&mut self, type_name: &str, id: &str) -> NamedNode {
            let class = self.class(type_name);
            let individual = node(individual_iri(class.as_str(), id));
            self.graph
                .insert(TripleRef::new(&class, rdf::TYPE, owl::CLASS));
            self.graph
                .insert(TripleRef::new(&individual, rdf::TYPE, &class));
            individual
        }

        fn literal(&mut self, subject: &NamedNode, type_name: &str, field: &str, literal: Literal) {
            let predicate = node(property_iri(&self.registry.class_iri(type_name), field));
            self.graph.insert(TripleRef::new(subject, &predicate, &literal));
        }

        fn link(&mut self, subject: &NamedNode, type_name: &str, field: &str, object: &NamedNode) {
            let predicate = node(property_iri(&self.registry.class_iri(type_name), field));
            self.graph.insert(TripleRef::new(subject, &predicate, object));
        }

        fn decoder(&self, gateway: InMemoryGateway) -> Decoder {
            Decoder::new(Arc::clone(&self.registry), Arc::new(gateway))
        }
    }

    fn vessel_fixture() -> (Fixture, NamedNode) {
        let mut fx = Fixture::new();
        let vessel = fx.individual(catalog::VESSEL, "1");
        let port = fx.individual(catalog::LOCATION, "10");
        fx.literal(&vessel, catalog::VESSEL, "id", Literal::new_typed_literal("1", xsd::LONG));
        fx.literal(&vessel, catalog::VESSEL, "name", Literal::new_simple_literal("Navire 1"));
        fx.literal(&vessel, catalog::VESSEL, "active", Literal::new_typed_literal("true", xsd::BOOLEAN));
        fx.link(&vessel, catalog::VESSEL, "basePortLocation", &port);
        (fx, vessel)
    }

    #[test]
    fn scalars_and_references_are_set() {
        let (fx, vessel) = vessel_fixture();
        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let mut session = DecodeSession::new();

        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let decoded = session.objects.get_as::<Vessel>(id).unwrap();
        assert_eq!(decoded.id, Some(1));
        assert_eq!(decoded.name.as_deref(), Some("Navire 1"));
        assert_eq!(decoded.active, Some(true));

        let port = decoded.base_port_location.unwrap();
        assert_eq!(session.objects.get_as::<Location>(port).unwrap().id, Some(10));
        assert!(session.report.is_clean());
    }

    #[test]
    fn unknown_reference_class_skips_only_that_field() {
        let (fx, vessel) = vessel_fixture();
        let registry = Arc::new(
            TypeRegistry::builder(catalog::NAMESPACE)
                .register::<Vessel>()
                .build()
                .unwrap(),
        );
        let decoder = Decoder::new(registry, Arc::new(InMemoryGateway::new().with_proxies()));
        let mut session = DecodeSession::new();

        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let decoded = session.objects.get_as::<Vessel>(id).unwrap();
        assert_eq!(decoded.name.as_deref(), Some("Navire 1"));
        assert_eq!(decoded.base_port_location, None);

        let issue = &session.report.issues()[0];
        assert_eq!(issue.field.as_deref(), Some("basePortLocation"));
        assert!(matches!(issue.error, FieldError::UnknownClass { .. }));
    }

    #[test]
    fn gateway_failure_drops_the_individual() {
        let (fx, vessel) = vessel_fixture();
        let decoder = fx.decoder(InMemoryGateway::new());
        let mut session = DecodeSession::new();

        assert!(decoder.decode(&fx.graph, &vessel, &mut session).is_none());
        assert!(session.objects.is_empty());
        assert_eq!(session.report.dropped_subjects().count(), 1);
    }

    #[test]
    fn bad_literal_is_skipped() {
        let (mut fx, vessel) = vessel_fixture();
        fx.literal(&vessel, catalog::VESSEL, "length", Literal::new_simple_literal("long"));
        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let mut session = DecodeSession::new();

        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let decoded = session.objects.get_as::<Vessel>(id).unwrap();
        assert_eq!(decoded.length, None);
        assert_eq!(decoded.name.as_deref(), Some("Navire 1"));
        assert!(matches!(session.report.issues()[0].error, FieldError::Coercion { .. }));
    }

    #[test]
    fn unknown_individual_class_returns_none() {
        let mut fx = Fixture::new();
        let stray = node(format!("{}/fisheries.Unknown#1", catalog::NAMESPACE));
        fx.graph.insert(TripleRef::new(
            &stray,
            rdf::TYPE,
            &node(format!("{}/fisheries.Unknown", catalog::NAMESPACE)),
        ));
        let decoder = fx.decoder(InMemoryGateway::new());
        let mut session = DecodeSession::new();
        assert!(decoder.decode(&fx.graph, &stray, &mut session).is_none());
        assert!(session.report.is_clean());
    }

    #[test]
    fn cycle_decodes_to_two_objects() {
        let mut fx = Fixture::new();
        let vessel = fx.individual(catalog::VESSEL, "1");
        let person = fx.individual(catalog::PERSON, "5");
        fx.literal(&vessel, catalog::VESSEL, "id", Literal::new_typed_literal("1", xsd::LONG));
        fx.literal(&person, catalog::PERSON, "id", Literal::new_typed_literal("5", xsd::LONG));
        fx.link(&vessel, catalog::VESSEL, "owner", &person);
        fx.link(&person, catalog::PERSON, "vessel", &vessel);

        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let session = decoder.decode_all(&fx.graph);

        assert_eq!(session.decoded().len(), 2);
        assert_eq!(session.objects.len(), 2);
        let v = session.object_for(vessel.as_str()).unwrap();
        let p = session.object_for(person.as_str()).unwrap();
        assert_eq!(session.objects.get_as::<Vessel>(v).unwrap().owner, Some(p));
        assert_eq!(session.objects.get_as::<Person>(p).unwrap().vessel, Some(v));
    }

    #[test]
    fn rdf_lists_decode_in_order() {
        let (mut fx, vessel) = vessel_fixture();
        let predicate = node(property_iri(&fx.registry.class_iri(catalog::VESSEL), "formerNames"));
        let (a, b) = (BlankNode::default(), BlankNode::default());
        fx.graph.insert(TripleRef::new(&vessel, &predicate, &a));
        fx.graph
            .insert(TripleRef::new(&a, rdf::FIRST, &Literal::new_simple_literal("Ar Mor")));
        fx.graph.insert(TripleRef::new(&a, rdf::REST, &b));
        fx.graph
            .insert(TripleRef::new(&b, rdf::FIRST, &Literal::new_simple_literal("Penn Ar Bed")));
        fx.graph.insert(TripleRef::new(&b, rdf::REST, rdf::NIL));

        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let mut session = DecodeSession::new();
        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        assert_eq!(
            session.objects.get_as::<Vessel>(id).unwrap().former_names,
            vec!["Ar Mor".to_string(), "Penn Ar Bed".to_string()]
        );
    }

    #[test]
    fn broken_list_is_reported() {
        let (mut fx, vessel) = vessel_fixture();
        let predicate = node(property_iri(&fx.registry.class_iri(catalog::VESSEL), "formerNames"));
        let cell = BlankNode::default();
        fx.graph.insert(TripleRef::new(&vessel, &predicate, &cell));
        fx.graph
            .insert(TripleRef::new(&cell, rdf::FIRST, &Literal::new_simple_literal("Ar Mor")));

        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let mut session = DecodeSession::new();
        assert!(decoder.decode(&fx.graph, &vessel, &mut session).is_some());
        assert!(matches!(
            session.report.issues()[0].error,
            FieldError::MalformedList { .. }
        ));
    }

    #[test]
    fn natural_key_resolver_registers_in_cache() {
        let mut fx = Fixture::new();
        let vessel = fx.individual(catalog::VESSEL, "1");
        let france = fx.individual(catalog::COUNTRY, "FRA");
        fx.literal(&france, catalog::COUNTRY, "code", Literal::new_simple_literal("FRA"));
        fx.link(&vessel, catalog::VESSEL, "flagCountry", &france);

        let gateway = InMemoryGateway::new();
        gateway
            .insert(&Country::new(250, "FRA", "France"), Some("FRA"))
            .unwrap();
        let mut resolvers = ResolverRegistry::new();
        resolvers.register(
            fx.registry.class_iri(catalog::COUNTRY),
            NaturalKeyResolver::new("code"),
        );
        let decoder = fx.decoder(gateway).with_resolvers(resolvers);
        let mut session = DecodeSession::new();

        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let flag = session.objects.get_as::<Vessel>(id).unwrap().flag_country.unwrap();
        assert_eq!(session.objects.get_as::<Country>(flag).unwrap().id, Some(250));
        assert_eq!(
            session.cache.get(france.as_str()),
            Some((flag, CacheState::Resolved))
        );
    }

    #[test]
    fn closure_resolvers_are_accepted() {
        let (fx, vessel) = vessel_fixture();
        let mut resolvers = ResolverRegistry::new();
        let fixed = |ctx: &ResolveContext<'_>, session: &mut DecodeSession| {
            let id = session.objects.add(Location::with_id(99));
            session.cache.insert(ctx.individual.as_str(), id, CacheState::Resolved);
            Ok::<_, FieldError>(id)
        };
        resolvers.register(fx.registry.class_iri(catalog::LOCATION), fixed);
        assert_eq!(resolvers.len(), 1);
        assert!(resolvers.get(&fx.registry.class_iri(catalog::LOCATION)).is_some());

        let decoder = fx.decoder(InMemoryGateway::new()).with_resolvers(resolvers);
        let mut session = DecodeSession::new();
        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let port = session.objects.get_as::<Vessel>(id).unwrap().base_port_location.unwrap();
        assert_eq!(session.objects.get_as::<Location>(port).unwrap().id, Some(99));
    }

    #[test]
    fn proxies_are_upgraded_in_place() {
        let (mut fx, vessel) = vessel_fixture();
        let port = node(individual_iri(&fx.registry.class_iri(catalog::LOCATION), "10"));
        fx.literal(&port, catalog::LOCATION, "label", Literal::new_simple_literal("Concarneau"));

        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let mut session = DecodeSession::new();
        let v = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let proxy = session.objects.get_as::<Vessel>(v).unwrap().base_port_location.unwrap();
        assert_eq!(session.cache.get(port.as_str()), Some((proxy, CacheState::Proxy)));

        let upgraded = decoder.decode(&fx.graph, &port, &mut session).unwrap();
        assert_eq!(upgraded, proxy);
        assert_eq!(
            session.objects.get_as::<Location>(upgraded).unwrap().label.as_deref(),
            Some("Concarneau")
        );
    }

    #[test]
    fn dropped_individual_keeps_the_proxy_others_point_to() {
        let mut fx = Fixture::new();
        let first = fx.individual(catalog::VESSEL, "1");
        let skipper = fx.individual(catalog::PERSON, "5");
        // Vessel #2 exists neither in the source nor in the gateway.
        let missing = node(individual_iri(&fx.registry.class_iri(catalog::VESSEL), "2"));
        fx.link(&first, catalog::VESSEL, "owner", &skipper);
        fx.link(&skipper, catalog::PERSON, "vessel", &missing);

        let gateway = InMemoryGateway::new();
        gateway.insert(&Person::new(5, "Yann"), None).unwrap();
        let decoder = fx.decoder(gateway);
        let mut session = DecodeSession::new();

        let v = decoder.decode(&fx.graph, &first, &mut session).unwrap();
        let owner = session.objects.get_as::<Vessel>(v).unwrap().owner.unwrap();
        assert_eq!(session.cache.get(skipper.as_str()), Some((owner, CacheState::Proxy)));

        assert!(decoder.decode(&fx.graph, &skipper, &mut session).is_none());
        assert_eq!(session.report.dropped_subjects().count(), 1);

        assert!(session.objects.contains(owner));
        assert_eq!(session.objects.get_as::<Person>(owner).unwrap().id, Some(5));
        assert_eq!(session.cache.get(skipper.as_str()), Some((owner, CacheState::Proxy)));
        assert_eq!(session.decoded(), &[v]);
    }

    #[test]
    fn resolved_individuals_decode_the_same_in_either_order() {
        let mut fx = Fixture::new();
        let vessel = fx.individual(catalog::VESSEL, "1");
        let france = fx.individual(catalog::COUNTRY, "FRA");
        fx.literal(&france, catalog::COUNTRY, "code", Literal::new_simple_literal("FRA"));
        fx.literal(&france, catalog::COUNTRY, "label", Literal::new_simple_literal("République française"));
        fx.link(&vessel, catalog::VESSEL, "flagCountry", &france);

        let run = |order: [&NamedNode; 2]| {
            let gateway = InMemoryGateway::new();
            gateway
                .insert(&Country::new(250, "FRA", "France"), Some("FRA"))
                .unwrap();
            let mut resolvers = ResolverRegistry::new();
            resolvers.register(
                fx.registry.class_iri(catalog::COUNTRY),
                NaturalKeyResolver::new("code"),
            );
            let decoder = fx.decoder(gateway).with_resolvers(resolvers);
            let mut session = DecodeSession::new();
            for individual in order {
                decoder.decode(&fx.graph, individual, &mut session).unwrap();
            }
            session
        };

        for session in [run([&vessel, &france]), run([&france, &vessel])] {
            assert_eq!(session.decoded().len(), 2);
            assert_eq!(session.objects.len(), 2);
            let flag = session.object_for(france.as_str()).unwrap();
            assert_eq!(session.cache.get(france.as_str()), Some((flag, CacheState::Decoded)));
            let country = session.objects.get_as::<Country>(flag).unwrap();
            assert_eq!(country.id, Some(250));
            assert_eq!(country.label.as_deref(), Some("République française"));

            let v = session.object_for(vessel.as_str()).unwrap();
            assert_eq!(session.objects.get_as::<Vessel>(v).unwrap().flag_country, Some(flag));
        }
    }

    #[test]
    fn literal_datatype_must_fit_the_field() {
        let (mut fx, vessel) = vessel_fixture();
        fx.literal(&vessel, catalog::VESSEL, "commissioned", Literal::new_typed_literal("12", xsd::INTEGER));
        fx.literal(&vessel, catalog::VESSEL, "length", Literal::new_typed_literal("12", xsd::INTEGER));
        let decoder = fx.decoder(InMemoryGateway::new().with_proxies());
        let mut session = DecodeSession::new();

        let id = decoder.decode(&fx.graph, &vessel, &mut session).unwrap();
        let decoded = session.objects.get_as::<Vessel>(id).unwrap();
        assert_eq!(decoded.commissioned, None);
        assert_eq!(decoded.length, Some(12.0));

        let issues = session.report.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field.as_deref(), Some("commissioned"));
        assert!(matches!(issues[0].error, FieldError::TypeMismatch { .. }));
    }
}
