//! Rich diagnostic error types for the owlmap mapper.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Most codec errors never escape a single
//! field or individual: they are collected into a [`MappingReport`] and logged,
//! while the top-level [`MapperError`] is reserved for failures the caller has to
//! act on (unreadable documents, broken configuration, gateway outages).
//!
//! [`MappingReport`]: crate::codec::MappingReport

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the mapper.
#[derive(Debug, Error, Diagnostic)]
pub enum MapperError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum SchemaError {
    #[error("nested type `{type_name}` cannot be mapped to an ontology class")]
    #[diagnostic(
        code(owlmap::schema::nested_type),
        help(
            "Nested and synthetic types have no stable qualified name. \
             Promote the type to a top-level domain type, or blacklist the \
             field that exposes it."
        )
    )]
    NestedType { type_name: String },

    #[error("invalid IRI `{iri}` derived for `{type_name}`")]
    #[diagnostic(
        code(owlmap::schema::invalid_iri),
        help(
            "Class and property IRIs are built as `{{namespace}}/{{QualifiedName}}#{{field}}`. \
             Check the configured namespace and make sure type and field names \
             contain no whitespace."
        )
    )]
    InvalidIri { type_name: String, iri: String },

    #[error("type `{type_name}` is not registered")]
    #[diagnostic(
        code(owlmap::schema::unknown_type),
        help("Register the type with `TypeRegistry::builder().register::<T>()` before mapping it.")
    )]
    UnknownType { type_name: String },
}

// ---------------------------------------------------------------------------
// Field errors (per-property, best-effort)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, Diagnostic, PartialEq)]
pub enum FieldError {
    #[error("type `{type_name}` has no field `{field}`")]
    #[diagnostic(
        code(owlmap::field::unknown),
        help("The predicate names a field the domain type does not expose. It was skipped.")
    )]
    UnknownField { type_name: String, field: String },

    #[error("field `{field}` expects {expected}, got {actual}")]
    #[diagnostic(
        code(owlmap::field::type_mismatch),
        help("The value handed to the setter does not match the declared field kind.")
    )]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("cannot coerce literal `{lexical}` to {target}")]
    #[diagnostic(
        code(owlmap::field::coercion),
        help(
            "The literal's lexical form is not valid for the field's scalar type. \
             Dates use `%Y-%m-%d`, date-times `%Y-%m-%dT%H:%M:%S`, times `%H:%M:%S`."
        )
    )]
    Coercion { lexical: String, target: String },

    #[error("no registered domain type for class `{class}`")]
    #[diagnostic(
        code(owlmap::field::unknown_class),
        help(
            "The referenced individual's class is not in the type registry, so the \
             reference cannot be materialized. Register the type to decode it."
        )
    )]
    UnknownClass { class: String },

    #[error("identifier `{identifier}` cannot be resolved with strategy {strategy}")]
    #[diagnostic(
        code(owlmap::field::unresolvable_key),
        help("Switch `key_resolution` to `numeric-then-natural` to allow natural-key lookups.")
    )]
    UnresolvableKey { identifier: String, strategy: String },

    #[error("malformed RDF list at `{node}`")]
    #[diagnostic(
        code(owlmap::field::malformed_list),
        help("Collections are encoded as `rdf:first`/`rdf:rest` chains terminated by `rdf:nil`.")
    )]
    MalformedList { node: String },

    #[error("unexpected term `{term}` for field `{field}`")]
    #[diagnostic(
        code(owlmap::field::unexpected_term),
        help("Scalar fields need literals, reference fields need IRIs or blank nodes.")
    )]
    UnexpectedTerm { field: String, term: String },

    #[error("referenced object {index} is missing from the object graph")]
    #[diagnostic(
        code(owlmap::field::dangling_reference),
        help("An `ObjectId` points at a removed or foreign slot. Insert the referenced object first.")
    )]
    DanglingReference { index: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gateway(#[from] GatewayError),
}

impl FieldError {
    /// Whether this error aborts the whole individual rather than a single field.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FieldError::Gateway(_))
    }
}

// ---------------------------------------------------------------------------
// Gateway errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, Diagnostic, PartialEq)]
pub enum GatewayError {
    #[error("no `{type_name}` entity for key {key}")]
    #[diagnostic(
        code(owlmap::gateway::not_found),
        help("The persistence gateway has no entity with this identifier or natural key.")
    )]
    NotFound { type_name: String, key: String },

    #[error("type `{type_name}` cannot be instantiated")]
    #[diagnostic(
        code(owlmap::gateway::abstract_type),
        help("Interfaces and abstract types have no factory. Reference a concrete subtype.")
    )]
    NotInstantiable { type_name: String },

    #[error("gateway backend failure: {message}")]
    #[diagnostic(
        code(owlmap::gateway::backend),
        help("The persistence backend rejected the operation. Check its logs.")
    )]
    Backend { message: String },
}

// ---------------------------------------------------------------------------
// Synchronization errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("failed to fetch `{url}`: {message}")]
    #[diagnostic(
        code(owlmap::sync::fetch),
        help(
            "The remote ontology could not be retrieved. Check the URL, network \
             access and `fetch_timeout_secs` in the mapper configuration."
        )
    )]
    Fetch { url: String, message: String },

    #[error("invalid target graph IRI `{iri}`")]
    #[diagnostic(
        code(owlmap::sync::target_iri),
        help("The target graph must be an absolute IRI such as `https://example.org/model`.")
    )]
    TargetIri { iri: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),
}

// ---------------------------------------------------------------------------
// Wire format errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    #[error("unknown RDF format `{name}`")]
    #[diagnostic(
        code(owlmap::format::unknown),
        help("Known formats: turtle, ntriples, nquads, n3, trig, rdfxml.")
    )]
    Unknown { name: String },

    #[error("RDF format {name} is not supported by this build")]
    #[diagnostic(
        code(owlmap::format::unsupported),
        help("Convert the document to Turtle or RDF/XML first.")
    )]
    Unsupported { name: String },

    #[error("parse error: {message}")]
    #[diagnostic(
        code(owlmap::format::parse),
        help("The document is not valid for the detected RDF format.")
    )]
    Parse { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(code(owlmap::format::io))]
    Io {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    #[diagnostic(
        code(owlmap::config::read),
        help("Check that the configuration file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}")]
    #[diagnostic(code(owlmap::config::write))]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    #[diagnostic(
        code(owlmap::config::parse),
        help("The file must be TOML. See `MapperConfig` for the accepted keys.")
    )]
    Parse { path: String, message: String },

    #[error("invalid namespace `{namespace}`")]
    #[diagnostic(
        code(owlmap::config::namespace),
        help("The model namespace must be an absolute IRI without a trailing `/` or `#`.")
    )]
    Namespace { namespace: String },
}

/// Result of a single field read, write or resolution.
pub type FieldResult<T> = std::result::Result<T, FieldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_converts_to_mapper_error() {
        let err = SchemaError::NestedType {
            type_name: "fisheries.Trip.Leg".into(),
        };
        let top: MapperError = err.into();
        assert!(matches!(top, MapperError::Schema(SchemaError::NestedType { .. })));
    }

    #[test]
    fn gateway_failures_are_fatal_for_the_individual() {
        let err: FieldError = GatewayError::NotFound {
            type_name: "Location".into(),
            key: "10".into(),
        }
        .into();
        assert!(err.is_fatal());

        let err = FieldError::UnknownClass {
            class: "https://example.org/Location".into(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = FieldError::Coercion {
            lexical: "yesterday".into(),
            target: "xsd:date".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("yesterday"));
        assert!(msg.contains("xsd:date"));
    }
}
