//! Type registry: bidirectional type name ↔ class IRI mapping.
//!
//! The [`TypeRegistry`] is populated once from an explicit registration list
//! and is read-only afterwards, so it is shared as `Arc<TypeRegistry>` by the
//! schema builder, the encoder and the decoder of one mapping context. It also
//! owns the [`DatatypeTable`] converting scalar types to XSD datatypes and back.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use oxigraph::model::vocab::{rdf, xsd};
use oxigraph::model::{NamedNode, NamedNodeRef};
use regex::Regex;

use crate::domain::descriptor::strip_generics;
use crate::domain::{DomainType, ScalarType, TypeDescriptor, descriptor_of};
use crate::error::{ConfigError, SchemaError};

/// Trailing generic markers on a class IRI, raw or percent-encoded.
static GENERIC_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(<|%3C).*$").expect("static regex"));

/// Class IRI for a qualified type name: `{namespace}/{QualifiedName}`.
pub fn class_iri(namespace: &str, qualified_name: &str) -> String {
    format!("{namespace}/{}", strip_generics(qualified_name))
}

/// Property IRI: `{classIRI}#{field}`.
pub fn property_iri(class_iri: &str, field: &str) -> String {
    format!("{class_iri}#{field}")
}

/// Individual IRI: `{classIRI}#{identifier}`.
pub fn individual_iri(class_iri: &str, identifier: &str) -> String {
    format!("{class_iri}#{identifier}")
}

/// Split `{classIRI}#{fragment}` into its two halves.
pub fn split_fragment(iri: &str) -> Option<(&str, &str)> {
    let (class, fragment) = iri.rsplit_once('#')?;
    if fragment.is_empty() {
        None
    } else {
        Some((class, fragment))
    }
}

/// Registered domain types of one mapping context.
pub struct TypeRegistry {
    namespace: String,
    /// Forward map: qualified name → descriptor (source of truth).
    by_name: HashMap<String, Arc<TypeDescriptor>>,
    /// Reverse map: class IRI → qualified name.
    by_iri: HashMap<String, String>,
    /// Registration order, for deterministic iteration.
    order: Vec<String>,
    datatypes: DatatypeTable,
}

impl TypeRegistry {
    /// Start a registry for the given model namespace.
    pub fn builder(namespace: impl Into<String>) -> TypeRegistryBuilder {
        TypeRegistryBuilder {
            namespace: namespace.into(),
            types: Vec::new(),
        }
    }

    /// The model namespace all class IRIs are minted under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Look up a descriptor by qualified name (generic parameters ignored).
    pub fn by_name(&self, qualified_name: &str) -> Option<Arc<TypeDescriptor>> {
        self.by_name.get(strip_generics(qualified_name)).cloned()
    }

    /// Class IRI of a registered or unregistered type name.
    pub fn class_iri(&self, qualified_name: &str) -> String {
        class_iri(&self.namespace, qualified_name)
    }

    /// Class IRI as a validated node.
    pub fn class_node(&self, descriptor: &TypeDescriptor) -> Result<NamedNode, SchemaError> {
        let iri = self.class_iri(descriptor.qualified_name());
        NamedNode::new(iri.as_str()).map_err(|_| SchemaError::InvalidIri {
            type_name: descriptor.qualified_name().to_string(),
            iri,
        })
    }

    /// Resolve a class IRI (or an individual/property IRI under it) to a
    /// descriptor.
    ///
    /// A trailing `#fragment` and generic markers are stripped before lookup.
    pub fn resolve_iri(&self, iri: &str) -> Option<Arc<TypeDescriptor>> {
        let name = self.type_name_of(iri)?;
        self.by_name.get(name).cloned()
    }

    fn type_name_of(&self, iri: &str) -> Option<&str> {
        let without_fragment = iri.split('#').next().unwrap_or(iri);
        let class = GENERIC_SUFFIX.replace(without_fragment, "");
        self.by_iri.get(class.as_ref()).map(String::as_str)
    }

    /// Whether an IRI falls under this registry's namespace.
    pub fn owns(&self, iri: &str) -> bool {
        iri.strip_prefix(self.namespace.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// All registered descriptors in registration order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDescriptor>> + '_ {
        self.order.iter().filter_map(|name| self.by_name.get(name))
    }

    pub fn datatypes(&self) -> &DatatypeTable {
        &self.datatypes
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("namespace", &self.namespace)
            .field("count", &self.len())
            .finish()
    }
}

/// Collects registrations before the registry is frozen.
#[derive(Debug)]
pub struct TypeRegistryBuilder {
    namespace: String,
    types: Vec<Arc<TypeDescriptor>>,
}

impl TypeRegistryBuilder {
    /// Register a concrete domain type.
    pub fn register<T: DomainType>(mut self) -> Self {
        self.types.push(descriptor_of::<T>());
        self
    }

    /// Register a descriptor directly (interfaces, hand-built types).
    pub fn register_descriptor(mut self, descriptor: Arc<TypeDescriptor>) -> Self {
        self.types.push(descriptor);
        self
    }

    /// Freeze the registry. A later registration of the same name replaces
    /// the earlier one.
    pub fn build(self) -> Result<TypeRegistry, ConfigError> {
        let namespace = self.namespace.trim().to_string();
        if namespace.ends_with('/')
            || namespace.ends_with('#')
            || NamedNode::new(format!("{namespace}/probe")).is_err()
        {
            return Err(ConfigError::Namespace { namespace });
        }

        let mut by_name = HashMap::new();
        let mut by_iri = HashMap::new();
        let mut order = Vec::new();
        for descriptor in self.types {
            let name = descriptor.qualified_name().to_string();
            if by_name.insert(name.clone(), descriptor).is_none() {
                order.push(name.clone());
            } else {
                tracing::debug!(type_name = %name, "type registered twice, keeping the last");
            }
            by_iri.insert(class_iri(&namespace, &name), name);
        }

        tracing::debug!(namespace = %namespace, types = order.len(), "type registry built");
        Ok(TypeRegistry {
            namespace,
            by_name,
            by_iri,
            order,
            datatypes: DatatypeTable::default(),
        })
    }
}

/// Scalar type ⇄ XSD datatype conversion tables.
#[derive(Debug, Clone)]
pub struct DatatypeTable {
    to_datatype: HashMap<ScalarType, NamedNode>,
    from_datatype: HashMap<String, ScalarType>,
}

impl DatatypeTable {
    /// Datatype used when encoding a scalar of this type.
    pub fn datatype(&self, ty: ScalarType) -> NamedNodeRef<'_> {
        // Every ScalarType is seeded in Default.
        self.to_datatype
            .get(&ty)
            .map(NamedNode::as_ref)
            .unwrap_or(xsd::STRING)
    }

    /// Scalar type a literal of this datatype decodes to.
    pub fn scalar_type(&self, datatype: NamedNodeRef<'_>) -> Option<ScalarType> {
        self.from_datatype.get(datatype.as_str()).copied()
    }
}

impl Default for DatatypeTable {
    fn default() -> Self {
        let canonical = [
            (ScalarType::String, xsd::STRING),
            (ScalarType::Int, xsd::INT),
            (ScalarType::Long, xsd::LONG),
            (ScalarType::Float, xsd::FLOAT),
            (ScalarType::Double, xsd::DOUBLE),
            (ScalarType::Boolean, xsd::BOOLEAN),
            (ScalarType::Date, xsd::DATE),
            (ScalarType::DateTime, xsd::DATE_TIME),
            (ScalarType::Time, xsd::TIME),
        ];
        // Datatypes accepted on decode that the encoder never emits.
        let aliases = [
            (xsd::INTEGER, ScalarType::Long),
            (xsd::SHORT, ScalarType::Int),
            (xsd::BYTE, ScalarType::Int),
            (xsd::DECIMAL, ScalarType::Double),
            (xsd::NORMALIZED_STRING, ScalarType::String),
            (rdf::LANG_STRING, ScalarType::String),
        ];

        let mut to_datatype = HashMap::new();
        let mut from_datatype = HashMap::new();
        for (ty, datatype) in canonical {
            to_datatype.insert(ty, datatype.into_owned());
            from_datatype.insert(datatype.as_str().to_string(), ty);
        }
        for (datatype, ty) in aliases {
            from_datatype.insert(datatype.as_str().to_string(), ty);
        }
        Self {
            to_datatype,
            from_datatype,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{self, Location, Vessel};

    const NS: &str = "https://example.org/model";

    fn registry() -> TypeRegistry {
        TypeRegistry::builder(NS)
            .register::<Vessel>()
            .register::<Location>()
            .build()
            .unwrap()
    }

    #[test]
    fn class_iri_scheme() {
        let reg = registry();
        assert_eq!(
            reg.class_iri(catalog::VESSEL),
            format!("{NS}/{}", catalog::VESSEL)
        );
        assert_eq!(
            property_iri(&reg.class_iri(catalog::VESSEL), "name"),
            format!("{NS}/{}#name", catalog::VESSEL)
        );
    }

    #[test]
    fn resolve_iri_strips_fragment_and_generics() {
        let reg = registry();
        let class = reg.class_iri(catalog::VESSEL);

        assert_eq!(
            reg.resolve_iri(&class).unwrap().qualified_name(),
            catalog::VESSEL
        );
        assert!(reg.resolve_iri(&format!("{class}#1")).is_some());
        assert!(reg.resolve_iri(&format!("{class}%3CT%3E")).is_some());
        assert!(reg.resolve_iri(&format!("{NS}/fisheries.Unknown")).is_none());
    }

    #[test]
    fn registration_order_is_kept() {
        let reg = registry();
        let names: Vec<_> = reg.types().map(|t| t.qualified_name().to_string()).collect();
        assert_eq!(names, vec![catalog::VESSEL.to_string(), catalog::LOCATION.to_string()]);
    }

    #[test]
    fn namespace_must_be_absolute_without_separator() {
        assert!(TypeRegistry::builder("https://example.org/model/").build().is_err());
        assert!(TypeRegistry::builder("not a namespace").build().is_err());
    }

    #[test]
    fn owns_only_its_namespace() {
        let reg = registry();
        assert!(reg.owns(&reg.class_iri(catalog::VESSEL)));
        assert!(!reg.owns("https://example.org/modelling/Foo"));
        assert!(!reg.owns("http://www.w3.org/2000/01/rdf-schema#label"));
    }

    #[test]
    fn datatype_table_round_trips_canonical_types() {
        let table = DatatypeTable::default();
        for ty in ScalarType::ALL {
            assert_eq!(table.scalar_type(table.datatype(ty)), Some(ty));
        }
        assert_eq!(table.scalar_type(xsd::INTEGER), Some(ScalarType::Long));
        assert_eq!(table.scalar_type(xsd::ANY_URI), None);
    }
}
