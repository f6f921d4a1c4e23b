//! Override resolvers: per-class replacements for the default reference path.
//!
//! Controlled-vocabulary types are usually looked up by code rather than by
//! raw identifier. A resolver registered for their class IRI takes over the
//! whole resolution and must put its result into the session's
//! [`ReferenceCache`](super::ReferenceCache) itself, otherwise a second
//! occurrence of the same individual resolves again. Entries cached as
//! [`CacheState::Resolved`] still receive the individual's own source
//! triples when it is decoded.

use std::collections::HashMap;
use std::sync::Arc;

use oxigraph::model::{Graph, NamedNode, NamedNodeRef, TermRef};

use crate::domain::{ObjectId, TypeDescriptor};
use crate::error::{FieldError, FieldResult};
use crate::gateway::{EntityKey, PersistenceGateway};
use crate::registry::{TypeRegistry, property_iri};

use super::{CacheState, DecodeSession};

/// Everything a resolver may consult about the reference being resolved.
pub struct ResolveContext<'a> {
    pub source: &'a Graph,
    /// The referenced individual.
    pub individual: NamedNodeRef<'a>,
    /// Class half of the individual IRI.
    pub class_iri: &'a str,
    /// Identifier half of the individual IRI.
    pub fragment: &'a str,
    pub registry: &'a TypeRegistry,
    pub gateway: &'a dyn PersistenceGateway,
}

impl ResolveContext<'_> {
    /// The registered type of the referenced class.
    pub fn descriptor(&self) -> FieldResult<Arc<TypeDescriptor>> {
        self.registry
            .resolve_iri(self.class_iri)
            .ok_or_else(|| FieldError::UnknownClass {
                class: self.class_iri.to_string(),
            })
    }

    /// Lexical value of one of the individual's own literal properties.
    pub fn literal(&self, field: &str) -> Option<&str> {
        let predicate = NamedNode::new(property_iri(self.class_iri, field)).ok()?;
        match self
            .source
            .object_for_subject_predicate(self.individual, predicate.as_ref())?
        {
            TermRef::Literal(literal) => Some(literal.value()),
            _ => None,
        }
    }
}

/// A custom decode function for one class.
pub trait OverrideResolver: Send + Sync {
    fn resolve(&self, ctx: &ResolveContext<'_>, session: &mut DecodeSession) -> FieldResult<ObjectId>;
}

impl<F> OverrideResolver for F
where
    F: Fn(&ResolveContext<'_>, &mut DecodeSession) -> FieldResult<ObjectId> + Send + Sync,
{
    fn resolve(&self, ctx: &ResolveContext<'_>, session: &mut DecodeSession) -> FieldResult<ObjectId> {
        self(ctx, session)
    }
}

/// Override resolvers keyed by class IRI.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn OverrideResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for a class IRI, replacing any previous one.
    pub fn register(&mut self, class_iri: impl Into<String>, resolver: impl OverrideResolver + 'static) {
        self.resolvers.insert(class_iri.into(), Arc::new(resolver));
    }

    pub fn get(&self, class_iri: &str) -> Option<&Arc<dyn OverrideResolver>> {
        self.resolvers.get(class_iri)
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.resolvers.keys()).finish()
    }
}

/// Resolves individuals by one of their literal fields through a natural-key
/// lookup, falling back to the IRI fragment when the literal is absent.
#[derive(Debug, Clone)]
pub struct NaturalKeyResolver {
    field: String,
}

impl NaturalKeyResolver {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl OverrideResolver for NaturalKeyResolver {
    fn resolve(&self, ctx: &ResolveContext<'_>, session: &mut DecodeSession) -> FieldResult<ObjectId> {
        let descriptor = ctx.descriptor()?;
        let natural = ctx.literal(&self.field).unwrap_or(ctx.fragment);
        let entity = ctx
            .gateway
            .reference(&descriptor, &EntityKey::Natural(natural.to_string()))?;
        let id = session.objects.insert(entity);
        session
            .cache
            .insert(ctx.individual.as_str(), id, CacheState::Resolved);
        tracing::debug!(individual = %ctx.individual, key = natural, "resolved by natural key");
        Ok(id)
    }
}
