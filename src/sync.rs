//! Synchronization: fetch a remote ontology, decode it, re-encode it and
//! check the result against the source.
//!
//! [`Synchronizer::resync`] is a self-verification tool. Its [`Verdict`] is a
//! diagnostic signal; nothing is rolled back when the graphs differ.

use std::io::Read;
use std::time::Duration;

use oxigraph::model::dataset::CanonicalizationAlgorithm;
use oxigraph::model::{Graph, NamedNode};
use serde::{Deserialize, Serialize};

use crate::codec::{DecodeSession, Decoder, Encoder, MappingReport};
use crate::config::MapperConfig;
use crate::error::{FormatError, SyncError};
use crate::io::{self, WireFormat};
use crate::schema::OntologyModel;

/// Default upper bound on fetched document size.
pub const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;

const ACCEPT: &str = "text/turtle, application/rdf+xml;q=0.9, application/n-triples;q=0.8, \
                      text/n3;q=0.7, application/trig;q=0.6, application/n-quads;q=0.5";

/// A fetched ontology document.
#[derive(Debug, Clone)]
pub struct Document {
    pub location: String,
    pub format: WireFormat,
    pub body: Vec<u8>,
}

/// Retrieves ontology documents by location.
pub trait DocumentFetcher: Send + Sync {
    fn fetch(&self, location: &str) -> Result<Document, SyncError>;
}

/// Blocking HTTP(S) fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            max_bytes: MAX_DOCUMENT_BYTES,
        }
    }

    /// Reject documents larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn from_config(config: &MapperConfig) -> Self {
        Self::new(Duration::from_secs(config.fetch_timeout_secs))
    }
}

impl DocumentFetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> Result<Document, SyncError> {
        let fetch_error = |message: String| SyncError::Fetch {
            url: location.to_string(),
            message,
        };
        if !location.starts_with("http://") && !location.starts_with("https://") {
            return Err(fetch_error("not an http(s) URL".into()));
        }

        let response = match self.agent.get(location).set("Accept", ACCEPT).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(fetch_error(format!("HTTP {code}"))),
            Err(ureq::Error::Transport(transport)) => return Err(fetch_error(transport.to_string())),
        };
        let content_type = response.header("Content-Type").map(str::to_string);

        let body = read_limited(response.into_reader(), self.max_bytes).map_err(fetch_error)?;

        let format = WireFormat::guess(content_type.as_deref(), location).ok_or_else(|| {
            FormatError::Unknown {
                name: content_type.clone().unwrap_or_else(|| location.to_string()),
            }
        })?;
        tracing::debug!(url = location, %format, bytes = body.len(), "document fetched");
        Ok(Document {
            location: location.to_string(),
            format,
            body,
        })
    }
}

/// Read at most `limit` bytes; a longer body is an error, never a truncated
/// document.
fn read_limited(reader: impl Read, limit: u64) -> Result<Vec<u8>, String> {
    let mut body = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|e| e.to_string())?;
    if body.len() as u64 > limit {
        return Err(format!("document exceeds {limit} bytes"));
    }
    Ok(body)
}

/// Local files, as plain paths or `file://` URLs. The format comes from the
/// file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl DocumentFetcher for FileFetcher {
    fn fetch(&self, location: &str) -> Result<Document, SyncError> {
        let path = location.strip_prefix("file://").unwrap_or(location);
        let format = WireFormat::guess(None, path).ok_or_else(|| FormatError::Unknown {
            name: path.to_string(),
        })?;
        let body = std::fs::read(path).map_err(|e| SyncError::Fetch {
            url: location.to_string(),
            message: e.to_string(),
        })?;
        Ok(Document {
            location: location.to_string(),
            format,
            body,
        })
    }
}

/// Dispatches on the location scheme: HTTP(S) over the network, anything
/// else from disk.
#[derive(Debug, Clone)]
pub struct SchemeFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SchemeFetcher {
    pub fn from_config(config: &MapperConfig) -> Self {
        Self {
            http: HttpFetcher::from_config(config),
            file: FileFetcher,
        }
    }
}

impl DocumentFetcher for SchemeFetcher {
    fn fetch(&self, location: &str) -> Result<Document, SyncError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.http.fetch(location)
        } else {
            self.file.fetch(location)
        }
    }
}

/// Result of comparing the re-encoded model with its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verdict {
    /// Same triple count and isomorphic.
    Match,
    /// Same triple count, but the graphs are not isomorphic.
    CountOnly,
    /// Triple counts differ.
    Mismatch,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Match => f.write_str("match"),
            Verdict::CountOnly => f.write_str("count-only"),
            Verdict::Mismatch => f.write_str("mismatch"),
        }
    }
}

/// Everything a resync produced.
#[derive(Debug)]
pub struct ResyncOutcome {
    /// The freshly re-encoded target model.
    pub model: OntologyModel,
    /// Objects decoded from the source, with the decode report.
    pub session: DecodeSession,
    pub encode_report: MappingReport,
    pub source_triples: usize,
    pub target_triples: usize,
    /// `None` when the counts already differ.
    pub isomorphic: Option<bool>,
    pub verdict: Verdict,
    /// Objects written through the gateway.
    pub persisted: usize,
}

/// Round-trips a remote ontology through the decoder and the encoder.
pub struct Synchronizer {
    fetcher: Box<dyn DocumentFetcher>,
    decoder: Decoder,
    encoder: Encoder,
    max_depth: i32,
    persist: bool,
}

impl Synchronizer {
    pub fn new(fetcher: Box<dyn DocumentFetcher>, decoder: Decoder, encoder: Encoder) -> Self {
        Self {
            fetcher,
            decoder,
            encoder,
            max_depth: 2,
            persist: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: i32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Save every decoded object through the decoder's gateway. The caller
    /// owns the commit boundary.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Fetch `remote_url`, decode every individual, re-encode into a fresh
    /// model named `target_graph_iri` and compare.
    pub fn resync(&self, remote_url: &str, target_graph_iri: &str) -> Result<ResyncOutcome, SyncError> {
        let target = NamedNode::new(target_graph_iri).map_err(|_| SyncError::TargetIri {
            iri: target_graph_iri.to_string(),
        })?;
        let document = self.fetcher.fetch(remote_url)?;
        let base = (document.location.starts_with("http://")
            || document.location.starts_with("https://"))
        .then_some(document.location.as_str());
        let source = io::parse(document.format, document.body.as_slice(), base)?;
        tracing::info!(url = remote_url, triples = source.len(), "remote ontology loaded");
        Ok(self.resync_graph(&source, target))
    }

    /// [`resync`](Self::resync) over an already loaded source graph.
    pub fn resync_graph(&self, source: &Graph, target: NamedNode) -> ResyncOutcome {
        let session = self.decoder.decode_all(source);

        // Classes are re-derived lazily while encoding, never copied.
        let mut model = OntologyModel::new(target);
        let mut pass = self.encoder.pass(&mut model, &session.objects, self.max_depth);
        for id in session.decoded() {
            pass.encode(*id);
        }
        let encode_report = pass.finish();
        self.encoder.schema().close(&mut model);

        let source_triples = source.len();
        let target_triples = model.len();
        let isomorphic = (source_triples == target_triples).then(|| isomorphic(source, model.graph()));
        let verdict = match isomorphic {
            Some(true) => Verdict::Match,
            Some(false) => Verdict::CountOnly,
            None => Verdict::Mismatch,
        };
        match verdict {
            Verdict::Match => tracing::info!(
                source_triples,
                target_triples,
                decoded = session.decoded().len(),
                "resync matches source"
            ),
            _ => tracing::warn!(
                source_triples,
                target_triples,
                %verdict,
                "resync differs from source"
            ),
        }

        let persisted = if self.persist { self.persist_all(&session) } else { 0 };
        ResyncOutcome {
            model,
            session,
            encode_report,
            source_triples,
            target_triples,
            isomorphic,
            verdict,
            persisted,
        }
    }

    fn persist_all(&self, session: &DecodeSession) -> usize {
        let gateway = self.decoder.gateway();
        let mut saved = 0;
        for id in session.decoded() {
            match gateway.save(&session.objects, *id) {
                Ok(()) => saved += 1,
                Err(e) => tracing::warn!(object = %id, error = %e, "persist failed"),
            }
        }
        tracing::info!(saved, "decoded objects persisted");
        saved
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("decoder", &self.decoder)
            .field("max_depth", &self.max_depth)
            .field("persist", &self.persist)
            .finish()
    }
}

/// Graph isomorphism through blank-node canonicalization.
pub fn isomorphic(a: &Graph, b: &Graph) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a = a.clone();
    let mut b = b.clone();
    a.canonicalize(CanonicalizationAlgorithm::Unstable);
    b.canonicalize(CanonicalizationAlgorithm::Unstable);
    a == b
}
