//! Export types for serializing mapping results.
//!
//! These types provide flat, human-readable representations of mapping
//! reports and resync outcomes suitable for JSON export.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};

use crate::codec::{Direction, FieldIssue, MappingReport};
use crate::sync::{ResyncOutcome, Verdict};

/// One recorded mapping issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueExport {
    /// Encode or decode.
    pub direction: Direction,
    /// IRI of the individual, or the object id when it had none.
    pub subject: String,
    /// Affected field; absent when the whole individual was dropped.
    pub field: Option<String>,
    /// Diagnostic code, e.g. `owlmap::field::coercion`.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Whether the individual was dropped.
    pub dropped: bool,
}

impl From<&FieldIssue> for IssueExport {
    fn from(issue: &FieldIssue) -> Self {
        Self {
            direction: issue.direction,
            subject: issue.subject.clone(),
            field: issue.field.clone(),
            code: issue.error.code().map(|code| code.to_string()),
            message: issue.error.to_string(),
            dropped: issue.is_dropped(),
        }
    }
}

/// Export every issue of a report.
pub fn issues(report: &MappingReport) -> Vec<IssueExport> {
    report.issues().iter().map(IssueExport::from).collect()
}

/// Summary of one resync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncExport {
    /// IRI of the re-encoded target model.
    pub target: String,
    pub source_triples: usize,
    pub target_triples: usize,
    /// Absent when the triple counts differ.
    pub isomorphic: Option<bool>,
    pub verdict: Verdict,
    /// Individuals decoded from the source.
    pub decoded: usize,
    /// Objects materialized, proxies included.
    pub objects: usize,
    /// Objects written through the gateway.
    pub persisted: usize,
    /// Decode issues followed by encode issues.
    pub issues: Vec<IssueExport>,
}

impl From<&ResyncOutcome> for ResyncExport {
    fn from(outcome: &ResyncOutcome) -> Self {
        let mut all = issues(&outcome.session.report);
        all.extend(issues(&outcome.encode_report));
        Self {
            target: outcome.model.iri().as_str().to_string(),
            source_triples: outcome.source_triples,
            target_triples: outcome.target_triples,
            isomorphic: outcome.isomorphic,
            verdict: outcome.verdict,
            decoded: outcome.session.decoded().len(),
            objects: outcome.session.objects.len(),
            persisted: outcome.persisted,
            issues: all,
        }
    }
}
