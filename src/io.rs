//! RDF wire formats at the boundary of the in-memory triple model.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use oxigraph::io::{RdfFormat, RdfParser, RdfSerializer};
use oxigraph::model::{Graph, Triple};

use crate::error::FormatError;

/// Serializations the mapper knows by name.
///
/// TriX, JSON-LD and RDF/JSON are recognized so that documents in those
/// formats get a clear [`FormatError::Unsupported`] instead of a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    Turtle,
    NTriples,
    NQuads,
    N3,
    TriG,
    RdfXml,
    TriX,
    JsonLd,
    RdfJson,
}

const PREFIXES: [(&str, &str); 4] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

impl WireFormat {
    pub fn name(self) -> &'static str {
        match self {
            WireFormat::Turtle => "turtle",
            WireFormat::NTriples => "ntriples",
            WireFormat::NQuads => "nquads",
            WireFormat::N3 => "n3",
            WireFormat::TriG => "trig",
            WireFormat::RdfXml => "rdfxml",
            WireFormat::TriX => "trix",
            WireFormat::JsonLd => "jsonld",
            WireFormat::RdfJson => "rdfjson",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            WireFormat::Turtle => "text/turtle",
            WireFormat::NTriples => "application/n-triples",
            WireFormat::NQuads => "application/n-quads",
            WireFormat::N3 => "text/n3",
            WireFormat::TriG => "application/trig",
            WireFormat::RdfXml => "application/rdf+xml",
            WireFormat::TriX => "application/trix",
            WireFormat::JsonLd => "application/ld+json",
            WireFormat::RdfJson => "application/rdf+json",
        }
    }

    /// Format of a `Content-Type` value; parameters such as `charset` are ignored.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next()?.trim().to_ascii_lowercase();
        let format = match essence.as_str() {
            "text/turtle" | "application/x-turtle" => WireFormat::Turtle,
            "application/n-triples" | "text/plain" => WireFormat::NTriples,
            "application/n-quads" | "text/x-nquads" => WireFormat::NQuads,
            "text/n3" | "text/rdf+n3" => WireFormat::N3,
            "application/trig" | "application/x-trig" => WireFormat::TriG,
            "application/rdf+xml" | "application/xml" | "text/xml" => WireFormat::RdfXml,
            "application/trix" => WireFormat::TriX,
            "application/ld+json" => WireFormat::JsonLd,
            "application/rdf+json" => WireFormat::RdfJson,
            _ => return None,
        };
        Some(format)
    }

    /// Format of a file extension (without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = match extension.to_ascii_lowercase().as_str() {
            "ttl" => WireFormat::Turtle,
            "nt" => WireFormat::NTriples,
            "nq" => WireFormat::NQuads,
            "n3" => WireFormat::N3,
            "trig" => WireFormat::TriG,
            "rdf" | "owl" | "xml" => WireFormat::RdfXml,
            "trix" => WireFormat::TriX,
            "jsonld" => WireFormat::JsonLd,
            "rj" => WireFormat::RdfJson,
            _ => return None,
        };
        Some(format)
    }

    /// Guess from a media type first, then from the location's extension.
    pub fn guess(media_type: Option<&str>, location: &str) -> Option<Self> {
        media_type
            .and_then(Self::from_media_type)
            .or_else(|| {
                let path = location.split(['?', '#']).next().unwrap_or(location);
                let (_, extension) = path.rsplit_once('.')?;
                Self::from_extension(extension)
            })
    }

    /// The oxigraph format, or `Unsupported` for formats the RDF stack lacks.
    pub fn rdf_format(self) -> Result<RdfFormat, FormatError> {
        match self {
            WireFormat::Turtle => Ok(RdfFormat::Turtle),
            WireFormat::NTriples => Ok(RdfFormat::NTriples),
            WireFormat::NQuads => Ok(RdfFormat::NQuads),
            WireFormat::N3 => Ok(RdfFormat::N3),
            WireFormat::TriG => Ok(RdfFormat::TriG),
            WireFormat::RdfXml => Ok(RdfFormat::RdfXml),
            WireFormat::TriX | WireFormat::JsonLd | WireFormat::RdfJson => {
                Err(FormatError::Unsupported {
                    name: self.name().to_string(),
                })
            }
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WireFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => WireFormat::Turtle,
            "ntriples" | "n-triples" | "nt" => WireFormat::NTriples,
            "nquads" | "n-quads" | "nq" => WireFormat::NQuads,
            "n3" => WireFormat::N3,
            "trig" => WireFormat::TriG,
            "rdfxml" | "rdf/xml" | "xml" => WireFormat::RdfXml,
            "trix" => WireFormat::TriX,
            "jsonld" | "json-ld" => WireFormat::JsonLd,
            "rdfjson" | "rdf/json" => WireFormat::RdfJson,
            _ => {
                return Err(FormatError::Unknown {
                    name: s.to_string(),
                });
            }
        };
        Ok(format)
    }
}

/// Parse a document into a graph. Named graphs of quad formats are merged
/// into the default graph.
pub fn parse(format: WireFormat, reader: impl Read, base_iri: Option<&str>) -> Result<Graph, FormatError> {
    let mut parser = RdfParser::from_format(format.rdf_format()?);
    if let Some(base) = base_iri {
        parser = parser.with_base_iri(base).map_err(|e| FormatError::Parse {
            message: format!("invalid base IRI `{base}`: {e}"),
        })?;
    }

    let mut graph = Graph::new();
    for quad in parser.for_reader(reader) {
        let quad = quad.map_err(|e| FormatError::Parse {
            message: e.to_string(),
        })?;
        graph.insert(&Triple::from(quad));
    }
    tracing::debug!(%format, triples = graph.len(), "document parsed");
    Ok(graph)
}

/// Serialize a graph, with the usual vocabulary prefixes where the format
/// supports them.
pub fn serialize(format: WireFormat, graph: &Graph, writer: impl Write) -> Result<(), FormatError> {
    let mut serializer = RdfSerializer::from_format(format.rdf_format()?);
    for (name, iri) in PREFIXES {
        serializer = serializer
            .with_prefix(name, iri)
            .map_err(|e| FormatError::Parse {
                message: e.to_string(),
            })?;
    }

    let mut out = serializer.for_writer(writer);
    for triple in graph {
        out.serialize_triple(triple)
            .map_err(|source| FormatError::Io { source })?;
    }
    out.finish().map_err(|source| FormatError::Io { source })?;
    Ok(())
}

/// [`serialize`] into a string.
pub fn to_string(format: WireFormat, graph: &Graph) -> Result<String, FormatError> {
    let mut buffer = Vec::new();
    serialize(format, graph, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| FormatError::Parse {
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::vocab::rdf;
    use oxigraph::model::{Literal, NamedNode, TripleRef};

    fn sample() -> Graph {
        let subject = NamedNode::new("https://example.org/model/fisheries.Vessel#1").unwrap();
        let class = NamedNode::new("https://example.org/model/fisheries.Vessel").unwrap();
        let name = NamedNode::new("https://example.org/model/fisheries.Vessel#name").unwrap();
        let mut graph = Graph::new();
        graph.insert(TripleRef::new(&subject, rdf::TYPE, &class));
        graph.insert(TripleRef::new(&subject, &name, &Literal::new_simple_literal("Navire 1")));
        graph
    }

    #[test]
    fn names_and_guessing() {
        assert_eq!("ttl".parse::<WireFormat>().unwrap(), WireFormat::Turtle);
        assert_eq!("RDF/XML".parse::<WireFormat>().unwrap(), WireFormat::RdfXml);
        assert!(matches!(
            "yaml".parse::<WireFormat>(),
            Err(FormatError::Unknown { .. })
        ));
        assert_eq!(
            WireFormat::guess(Some("text/turtle; charset=utf-8"), "https://x.org/a.owl"),
            Some(WireFormat::Turtle)
        );
        assert_eq!(
            WireFormat::guess(None, "https://x.org/onto.owl?v=2"),
            Some(WireFormat::RdfXml)
        );
        assert_eq!(WireFormat::guess(Some("application/octet-stream"), "noext"), None);
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        for format in [WireFormat::TriX, WireFormat::JsonLd, WireFormat::RdfJson] {
            assert!(matches!(
                format.rdf_format(),
                Err(FormatError::Unsupported { .. })
            ));
        }
        assert!(matches!(
            to_string(WireFormat::JsonLd, &sample()),
            Err(FormatError::Unsupported { .. })
        ));
    }

    #[test]
    fn turtle_and_rdfxml_preserve_the_graph() {
        let graph = sample();
        for format in [WireFormat::Turtle, WireFormat::RdfXml, WireFormat::NTriples] {
            let text = to_string(format, &graph).unwrap();
            let parsed = parse(format, text.as_bytes(), None).unwrap();
            assert_eq!(parsed, graph, "{format}");
        }
    }

    #[test]
    fn nquads_named_graphs_are_merged() {
        let doc = "<https://a.org/s> <https://a.org/p> \"o\" <https://a.org/g> .\n\
                   <https://a.org/s> <https://a.org/p> \"o2\" .\n";
        let graph = parse(WireFormat::NQuads, doc.as_bytes(), None).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse(WireFormat::Turtle, "this is not turtle".as_bytes(), None).unwrap_err();
        assert!(matches!(err, FormatError::Parse { .. }));
    }
}
