//! Instance codec: live object graphs ⇄ RDF individuals.
//!
//! - [`Encoder`] walks an [`ObjectGraph`](crate::domain::ObjectGraph) depth-first
//!   and materializes one individual per visited object into an
//!   [`OntologyModel`](crate::schema::OntologyModel).
//! - [`Decoder`] reads individuals back into a fresh object graph, resolving
//!   references through override resolvers or the persistence gateway.
//!
//! Both directions are best-effort: a field that cannot be mapped is skipped
//! and recorded in the [`MappingReport`] returned alongside the result.

pub mod decode;
pub mod encode;
pub mod resolver;

use serde::{Deserialize, Serialize};

use crate::error::FieldError;

pub use decode::{CacheState, DecodeSession, Decoder, ReferenceCache};
pub use encode::{EncodePass, Encoded, Encoder};
pub use resolver::{NaturalKeyResolver, OverrideResolver, ResolveContext, ResolverRegistry};

/// Codec direction an issue was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Encode,
    Decode,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Encode => f.write_str("encode"),
            Direction::Decode => f.write_str("decode"),
        }
    }
}

/// One localized mapping failure.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldIssue {
    pub direction: Direction,
    /// Individual (IRI or blank node) or object the issue belongs to.
    pub subject: String,
    /// `None` when the whole individual was dropped.
    pub field: Option<String>,
    pub error: FieldError,
}

impl FieldIssue {
    /// Whether the issue dropped the whole individual.
    pub fn is_dropped(&self) -> bool {
        self.field.is_none()
    }
}

/// Per-call record of everything the codec skipped.
#[derive(Debug, Clone, Default)]
pub struct MappingReport {
    issues: Vec<FieldIssue>,
}

impl MappingReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a skipped field.
    pub fn field(
        &mut self,
        direction: Direction,
        subject: impl Into<String>,
        field: impl Into<String>,
        error: FieldError,
    ) {
        let subject = subject.into();
        let field = field.into();
        tracing::warn!(%direction, subject = %subject, field = %field, error = %error, "field skipped");
        self.issues.push(FieldIssue {
            direction,
            subject,
            field: Some(field),
            error,
        });
    }

    /// Record a dropped individual.
    pub fn dropped(&mut self, direction: Direction, subject: impl Into<String>, error: FieldError) {
        let subject = subject.into();
        tracing::warn!(%direction, subject = %subject, error = %error, "individual skipped");
        self.issues.push(FieldIssue {
            direction,
            subject,
            field: None,
            error,
        });
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    /// Issues that dropped a whole individual.
    pub fn dropped_subjects(&self) -> impl Iterator<Item = &str> + '_ {
        self.issues
            .iter()
            .filter(|i| i.is_dropped())
            .map(|i| i.subject.as_str())
    }

    /// `true` when nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Append another report's issues.
    pub fn merge(&mut self, other: MappingReport) {
        self.issues.extend(other.issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tracks_fields_and_drops() {
        let mut report = MappingReport::new();
        assert!(report.is_clean());

        report.field(
            Direction::Decode,
            "https://example.org/model/Vessel#1",
            "length",
            FieldError::Coercion {
                lexical: "long".into(),
                target: "float".into(),
            },
        );
        report.dropped(
            Direction::Decode,
            "https://example.org/model/Vessel#2",
            FieldError::UnknownClass {
                class: "Vessel".into(),
            },
        );

        assert_eq!(report.len(), 2);
        assert!(!report.is_clean());
        assert_eq!(
            report.dropped_subjects().collect::<Vec<_>>(),
            vec!["https://example.org/model/Vessel#2"]
        );
    }

    #[test]
    fn merge_appends() {
        let mut a = MappingReport::new();
        let mut b = MappingReport::new();
        b.dropped(
            Direction::Encode,
            "_:b0",
            FieldError::DanglingReference { index: 3 },
        );
        a.merge(b);
        assert_eq!(a.issues()[0].direction, Direction::Encode);
    }
}
