//! Persistence gateway: the codec's view of the entity store.
//!
//! The decoder dereferences identifiers through [`PersistenceGateway::reference`],
//! the schema-wide export streams whole types through
//! [`PersistenceGateway::stream_all`], and the synchronizer optionally writes
//! decoded objects back through [`PersistenceGateway::save`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::codec::{Encoder, MappingReport};
use crate::config::KeyResolution;
use crate::domain::{Entity, FieldKind, ObjectGraph, ObjectId, ScalarType, TypeDescriptor, Value};
use crate::error::{FieldError, FieldResult, GatewayError};
use crate::registry::TypeRegistry;
use crate::schema::OntologyModel;

/// Key an entity is looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// Persistence identifier.
    Id(i64),
    /// Natural key (code, label...).
    Natural(String),
}

impl EntityKey {
    /// Interpret an individual IRI's fragment according to `strategy`.
    pub fn parse(fragment: &str, strategy: KeyResolution) -> FieldResult<EntityKey> {
        let numeric = fragment.parse::<i64>().ok();
        match (strategy, numeric) {
            (KeyResolution::NaturalOnly, _) => Ok(EntityKey::Natural(fragment.to_string())),
            (_, Some(id)) => Ok(EntityKey::Id(id)),
            (KeyResolution::NumericThenNatural, None) => {
                Ok(EntityKey::Natural(fragment.to_string()))
            }
            (KeyResolution::NumericOnly, None) => Err(FieldError::UnresolvableKey {
                identifier: fragment.to_string(),
                strategy: strategy.to_string(),
            }),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Id(id) => write!(f, "#{id}"),
            EntityKey::Natural(key) => write!(f, "'{key}'"),
        }
    }
}

/// Lookup, bulk load and save of domain entities.
pub trait PersistenceGateway: Send + Sync {
    /// A reference to the entity with this key; a proxy carrying only the
    /// identifier is acceptable.
    fn reference(
        &self,
        descriptor: &TypeDescriptor,
        key: &EntityKey,
    ) -> Result<Box<dyn Entity>, GatewayError>;

    /// Load every entity of a type into `into`.
    fn stream_all(
        &self,
        descriptor: &TypeDescriptor,
        into: &mut ObjectGraph,
    ) -> Result<Vec<ObjectId>, GatewayError>;

    /// Persist one object of `objects`.
    fn save(&self, objects: &ObjectGraph, id: ObjectId) -> Result<(), GatewayError>;
}

/// Scalar fields of one stored entity.
type Snapshot = Vec<(String, Value)>;

/// `DashMap`-backed gateway keeping scalar snapshots of stored entities.
///
/// References between stored entities are not kept: a loaded entity only has
/// its scalar fields (and scalar collections) set.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    records: DashMap<(String, i64), Snapshot>,
    natural_keys: DashMap<(String, String), i64>,
    proxies: bool,
    saves: AtomicUsize,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer unknown numeric keys with identifier-only proxies instead of
    /// [`GatewayError::NotFound`].
    pub fn with_proxies(mut self) -> Self {
        self.proxies = true;
        self
    }

    /// Store a snapshot of `entity`, optionally indexed by a natural key.
    pub fn insert(&self, entity: &dyn Entity, natural_key: Option<&str>) -> Result<i64, GatewayError> {
        let descriptor = entity.descriptor();
        let id = identifier_of(&descriptor, entity)?;
        let type_name = descriptor.qualified_name().to_string();
        if let Some(key) = natural_key {
            self.natural_keys
                .insert((type_name.clone(), key.to_string()), id);
        }
        self.records.insert((type_name, id), snapshot(&descriptor, entity));
        Ok(id)
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of successful [`save`](PersistenceGateway::save) calls.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    /// Whether an entity of this type and identifier is stored.
    pub fn contains(&self, type_name: &str, id: i64) -> bool {
        self.records.contains_key(&(type_name.to_string(), id))
    }

    fn materialize(
        &self,
        descriptor: &TypeDescriptor,
        snapshot: &Snapshot,
    ) -> Result<Box<dyn Entity>, GatewayError> {
        let mut entity = descriptor
            .instantiate()
            .ok_or_else(|| GatewayError::NotInstantiable {
                type_name: descriptor.qualified_name().to_string(),
            })?;
        for (field, value) in snapshot {
            entity
                .set(field, value.clone())
                .map_err(|e| GatewayError::Backend {
                    message: e.to_string(),
                })?;
        }
        Ok(entity)
    }

    fn proxy(&self, descriptor: &TypeDescriptor, id: i64) -> Result<Box<dyn Entity>, GatewayError> {
        let mut entity = descriptor
            .instantiate()
            .ok_or_else(|| GatewayError::NotInstantiable {
                type_name: descriptor.qualified_name().to_string(),
            })?;
        if let Some(field) = descriptor.identifier_field() {
            let value = match field.kind() {
                FieldKind::Scalar(ScalarType::Int) => {
                    Value::Int(i32::try_from(id).map_err(|_| GatewayError::Backend {
                        message: format!("identifier {id} does not fit in an int"),
                    })?)
                }
                FieldKind::Scalar(ScalarType::String) => Value::String(id.to_string()),
                _ => Value::Long(id),
            };
            entity
                .set(field.name(), value)
                .map_err(|e| GatewayError::Backend {
                    message: e.to_string(),
                })?;
        }
        Ok(entity)
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn reference(
        &self,
        descriptor: &TypeDescriptor,
        key: &EntityKey,
    ) -> Result<Box<dyn Entity>, GatewayError> {
        let type_name = descriptor.qualified_name().to_string();
        let not_found = || GatewayError::NotFound {
            type_name: type_name.clone(),
            key: key.to_string(),
        };
        let id = match key {
            EntityKey::Id(id) => *id,
            EntityKey::Natural(natural) => *self
                .natural_keys
                .get(&(type_name.clone(), natural.clone()))
                .ok_or_else(not_found)?
                .value(),
        };

        // Clone the snapshot out so no shard lock is held while setters run.
        let stored = self
            .records
            .get(&(type_name.clone(), id))
            .map(|r| r.value().clone());
        match stored {
            Some(snapshot) => self.materialize(descriptor, &snapshot),
            None if self.proxies => self.proxy(descriptor, id),
            None => Err(not_found()),
        }
    }

    fn stream_all(
        &self,
        descriptor: &TypeDescriptor,
        into: &mut ObjectGraph,
    ) -> Result<Vec<ObjectId>, GatewayError> {
        let type_name = descriptor.qualified_name();
        let mut stored: Vec<(i64, Snapshot)> = self
            .records
            .iter()
            .filter(|r| r.key().0 == type_name)
            .map(|r| (r.key().1, r.value().clone()))
            .collect();
        stored.sort_by_key(|(id, _)| *id);

        let mut ids = Vec::with_capacity(stored.len());
        for (_, snapshot) in &stored {
            let entity = self.materialize(descriptor, snapshot)?;
            ids.push(into.insert(entity));
        }
        tracing::debug!(type_name, count = ids.len(), "streamed entities");
        Ok(ids)
    }

    fn save(&self, objects: &ObjectGraph, id: ObjectId) -> Result<(), GatewayError> {
        let entity = objects.get(id).ok_or_else(|| GatewayError::Backend {
            message: format!("{id} is not in the object graph"),
        })?;
        self.insert(entity, None)?;
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn identifier_of(descriptor: &TypeDescriptor, entity: &dyn Entity) -> Result<i64, GatewayError> {
    let value = descriptor
        .identifier_field()
        .and_then(|f| entity.get(f.name()));
    match value {
        Some(Value::Long(id)) => Ok(id),
        Some(Value::Int(id)) => Ok(i64::from(id)),
        Some(Value::String(s)) => s.parse().map_err(|_| GatewayError::Backend {
            message: format!("identifier `{s}` is not numeric"),
        }),
        _ => Err(GatewayError::Backend {
            message: format!("{} entity has no identifier", descriptor.qualified_name()),
        }),
    }
}

fn snapshot(descriptor: &TypeDescriptor, entity: &dyn Entity) -> Snapshot {
    descriptor
        .fields()
        .iter()
        .filter(|f| f.is_backed() && !f.kind().is_object_valued())
        .filter_map(|f| entity.get(f.name()).map(|v| (f.name().to_string(), v)))
        .collect()
}

/// Outcome of a schema-wide export.
#[derive(Debug)]
pub struct Exported {
    /// Everything streamed from the gateway.
    pub objects: ObjectGraph,
    /// Number of root objects encoded.
    pub encoded: usize,
    pub report: MappingReport,
}

/// Stream every registered concrete type from the gateway and encode all of
/// its entities into `model`, then close the schema pass.
pub fn export_all(
    registry: &TypeRegistry,
    gateway: &dyn PersistenceGateway,
    encoder: &Encoder,
    model: &mut OntologyModel,
    max_depth: i32,
) -> Result<Exported, GatewayError> {
    let mut objects = ObjectGraph::new();
    let mut roots = Vec::new();
    for descriptor in registry.types() {
        if descriptor.instantiate().is_none() {
            continue;
        }
        roots.extend(gateway.stream_all(descriptor, &mut objects)?);
    }

    let mut pass = encoder.pass(model, &objects, max_depth);
    let encoded = roots.iter().filter(|id| pass.encode(**id).is_some()).count();
    let report = pass.finish();
    let axioms = encoder.schema().close(model);

    tracing::info!(encoded, axioms, issues = report.len(), "schema-wide export done");
    Ok(Exported {
        objects,
        encoded,
        report,
    })
}
