//! Type descriptors: the introspected shape of a domain type.
//!
//! A [`TypeDescriptor`] is derived once per domain type through
//! [`DomainType::describe`] and cached process-wide by [`descriptor_of`].
//! It never changes after creation, so it is shared as `Arc<TypeDescriptor>`.

use std::any::TypeId;
use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use super::value::ScalarType;
use super::{DomainType, Entity};

/// Shape of a domain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// An instantiable top-level type.
    Concrete,
    /// A supertype without a factory; decodes to nothing.
    Interface,
    /// A nested or synthetic type; rejected by the schema builder.
    Nested,
}

/// Cardinality annotation of a reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Association {
    /// The referenced object belongs to this one's graph.
    #[default]
    Owned,
    /// Many-to-one link into a bulky reference table; only mapped when
    /// allow-listed.
    ManyToOne,
}

/// Element type of an ordered collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Scalar(ScalarType),
    /// Qualified name of the referenced domain type.
    Reference(String),
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// Single reference to another domain type (qualified name).
    Reference(String),
    /// Ordered collection.
    Collection(ElementKind),
}

impl FieldKind {
    /// Whether values of this field link to other individuals.
    pub fn is_object_valued(&self) -> bool {
        matches!(
            self,
            FieldKind::Reference(_) | FieldKind::Collection(ElementKind::Reference(_))
        )
    }

    /// The referenced type name, for references and reference collections.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldKind::Reference(t) | FieldKind::Collection(ElementKind::Reference(t)) => Some(t),
            _ => None,
        }
    }
}

/// One exposed accessor/setter pair of a domain type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    association: Association,
    identifier: bool,
    backed: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            association: Association::Owned,
            identifier: false,
            backed: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn association(&self) -> Association {
        self.association
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    pub fn is_many_to_one(&self) -> bool {
        self.association == Association::ManyToOne
    }

    /// `false` for getter-style accessors with no backing field.
    pub fn is_backed(&self) -> bool {
        self.backed
    }
}

/// Factory producing a fresh, zero-initialized instance.
pub type Factory = fn() -> Box<dyn Entity>;

fn make<T: DomainType>() -> Box<dyn Entity> {
    Box::new(T::default())
}

/// The introspected shape of a domain type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    qualified_name: String,
    kind: TypeKind,
    supertypes: Vec<String>,
    fields: Vec<FieldDescriptor>,
    factory: Option<Factory>,
}

impl TypeDescriptor {
    /// Start describing a concrete domain type.
    pub fn builder<T: DomainType>(qualified_name: impl Into<String>) -> TypeDescriptorBuilder {
        let factory: Factory = make::<T>;
        TypeDescriptorBuilder::new(qualified_name.into(), TypeKind::Concrete, Some(factory))
    }

    /// Start describing an interface (no factory).
    pub fn interface(qualified_name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder::new(qualified_name.into(), TypeKind::Interface, None)
    }

    /// Qualified name with generic parameters stripped.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Last segment of the qualified name.
    pub fn simple_name(&self) -> &str {
        simple_name(&self.qualified_name)
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_nested(&self) -> bool {
        self.kind == TypeKind::Nested
    }

    /// Declared supertypes and interfaces, nearest first.
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Exposed fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The field carrying the persistence identifier, if any.
    pub fn identifier_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.identifier)
    }

    /// Create a fresh instance; `None` for interfaces and nested types.
    pub fn instantiate(&self) -> Option<Box<dyn Entity>> {
        self.factory.map(|factory| factory())
    }
}

/// Strip generic parameters (`Page<Vessel>` → `Page`).
pub fn strip_generics(name: &str) -> &str {
    match name.find('<') {
        Some(pos) => name[..pos].trim_end(),
        None => name.trim_end(),
    }
}

/// Last dot-separated segment of a qualified name.
pub fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

/// Fluent builder for [`TypeDescriptor`].
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    inner: TypeDescriptor,
}

impl TypeDescriptorBuilder {
    fn new(qualified_name: String, kind: TypeKind, factory: Option<Factory>) -> Self {
        Self {
            inner: TypeDescriptor {
                qualified_name: strip_generics(&qualified_name).to_string(),
                kind,
                supertypes: Vec::new(),
                fields: Vec::new(),
                factory,
            },
        }
    }

    /// Mark the type as nested inside another type.
    pub fn nested(mut self) -> Self {
        self.inner.kind = TypeKind::Nested;
        self.inner.factory = None;
        self
    }

    pub fn supertype(mut self, qualified_name: impl AsRef<str>) -> Self {
        self.inner
            .supertypes
            .push(strip_generics(qualified_name.as_ref()).to_string());
        self
    }

    /// The persistence identifier field.
    pub fn identifier(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        let mut field = FieldDescriptor::new(name, FieldKind::Scalar(ty));
        field.identifier = true;
        self.inner.fields.push(field);
        self
    }

    pub fn scalar(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.inner
            .fields
            .push(FieldDescriptor::new(name, FieldKind::Scalar(ty)));
        self
    }

    pub fn reference(mut self, name: impl Into<String>, target: impl AsRef<str>) -> Self {
        self.inner.fields.push(FieldDescriptor::new(
            name,
            FieldKind::Reference(strip_generics(target.as_ref()).to_string()),
        ));
        self
    }

    pub fn many_to_one(mut self, name: impl Into<String>, target: impl AsRef<str>) -> Self {
        let mut field = FieldDescriptor::new(
            name,
            FieldKind::Reference(strip_generics(target.as_ref()).to_string()),
        );
        field.association = Association::ManyToOne;
        self.inner.fields.push(field);
        self
    }

    pub fn collection(mut self, name: impl Into<String>, element: ElementKind) -> Self {
        let element = match element {
            ElementKind::Reference(t) => ElementKind::Reference(strip_generics(&t).to_string()),
            scalar => scalar,
        };
        self.inner
            .fields
            .push(FieldDescriptor::new(name, FieldKind::Collection(element)));
        self
    }

    /// A getter-style accessor with no backing field.
    pub fn derived(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        let mut field = FieldDescriptor::new(name, kind);
        field.backed = false;
        self.inner.fields.push(field);
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.inner
    }
}

static DESCRIPTORS: LazyLock<DashMap<TypeId, Arc<TypeDescriptor>>> = LazyLock::new(DashMap::new);

/// Process-wide descriptor of `T`, derived on first use.
pub fn descriptor_of<T: DomainType>() -> Arc<TypeDescriptor> {
    let key = TypeId::of::<T>();
    if let Some(existing) = DESCRIPTORS.get(&key) {
        return Arc::clone(existing.value());
    }
    // Derive outside the shard lock; a racing thread may win, and its copy is kept.
    let built = Arc::new(T::describe());
    Arc::clone(DESCRIPTORS.entry(key).or_insert(built).value())
}
