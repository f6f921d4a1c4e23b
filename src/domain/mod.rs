//! Domain object model consumed and produced by the codec.
//!
//! Domain types expose their shape through [`DomainType::describe`] and their
//! data through the name-keyed accessors of [`Entity`]. Object graphs live in an
//! [`ObjectGraph`] arena: references between objects are [`ObjectId`] indices,
//! which is what lets cyclic graphs be walked without shared mutable pointers.

pub mod descriptor;
pub mod value;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

pub use descriptor::{
    Association, ElementKind, FieldDescriptor, FieldKind, TypeDescriptor, TypeKind, descriptor_of,
};
pub use value::{FromValue, ScalarType, Value};

/// A live domain object.
///
/// `get` returns `None` for absent values (null fields, unknown names); `set`
/// is only ever called with present values.
pub trait Entity: Any + fmt::Debug + Send + Sync {
    /// The descriptor of this object's concrete type.
    fn descriptor(&self) -> Arc<TypeDescriptor>;

    /// Read a field by name.
    fn get(&self, field: &str) -> Option<Value>;

    /// Write a field by name.
    fn set(&mut self, field: &str, value: Value) -> Result<(), FieldError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A domain type that can describe itself and be zero-initialized.
pub trait DomainType: Entity + Default {
    fn describe() -> TypeDescriptor;
}

/// Error for a setter called with a field name the type does not expose.
pub fn unknown_field(entity: &dyn Entity, field: &str) -> FieldError {
    FieldError::UnknownField {
        type_name: entity.descriptor().qualified_name().to_string(),
        field: field.to_string(),
    }
}

/// Index of an object inside an [`ObjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(usize);

impl ObjectId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Arena of domain objects.
///
/// Slots are never reused: a removed object leaves a tombstone so that
/// outstanding [`ObjectId`]s never alias a different object.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    slots: Vec<Option<Box<dyn Entity>>>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object and return its index.
    pub fn insert(&mut self, entity: Box<dyn Entity>) -> ObjectId {
        self.slots.push(Some(entity));
        ObjectId(self.slots.len() - 1)
    }

    /// Convenience for typed inserts in tests and fixtures.
    pub fn add<T: Entity>(&mut self, entity: T) -> ObjectId {
        self.insert(Box::new(entity))
    }

    pub fn get(&self, id: ObjectId) -> Option<&dyn Entity> {
        self.slots.get(id.0).and_then(|slot| slot.as_deref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut (dyn Entity + 'static)> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_deref_mut())
    }

    /// Downcast the object at `id` to its concrete type.
    pub fn get_as<T: Entity>(&self, id: ObjectId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: Entity>(&mut self, id: ObjectId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Swap the object at `id` for another one, keeping the index stable.
    pub fn replace(&mut self, id: ObjectId, entity: Box<dyn Entity>) -> Option<Box<dyn Entity>> {
        let slot = self.slots.get_mut(id.0)?;
        slot.replace(entity)
    }

    /// Remove the object at `id`, leaving a tombstone.
    pub fn remove(&mut self, id: ObjectId) -> Option<Box<dyn Entity>> {
        self.slots.get_mut(id.0)?.take()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Indices of all live objects, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| ObjectId(i))
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
