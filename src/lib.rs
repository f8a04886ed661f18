//! smevx – SMEV3 XML-DSig transform (`urn://smev-gov-ru/xmldsig/transform`)
//!
//! Deterministische XML-Kanonisierung fuer die Signaturberechnung im
//! russischen SMEV3-Verbund: gleiches Informationsmodell, gleiche Bytes.
//! Synthetische Namespace-Prefixes (`ns1`, `ns2`, ...), totale
//! Attribut-Ordnung, `<a></a>` statt `<a/>`, Whitespace-only-Text wird
//! verworfen, Elemente ohne Namespace werden abgewiesen.
//!
//! # Beispiel
//!
//! ```
//! let canonical = smevx::canonicalize_str(
//!     r#"<a:X xmlns:a="urn:n1" b="2" a="1">  <a:Y/>  </a:X>"#,
//! ).unwrap();
//! assert_eq!(
//!     canonical,
//!     r#"<ns1:X xmlns:ns1="urn:n1" a="1" b="2"><ns1:Y></ns1:Y></ns1:X>"#,
//! );
//! ```

pub mod error;
pub mod event;
pub mod qname;
pub mod reader;
mod scope;
pub mod transform;
pub mod writer;

pub use error::{Error, Result};

// Public API: Events
pub use event::{AtContent, ChContent, CmContent, NsContent, PiContent, SeContent, XmlEvent};

// Public API: QNames
pub use qname::QName;

// Public API: Streaming-Bausteine
pub use reader::{read_events, read_events_from_str};
pub use writer::CanonicalXmlWriter;

// Public API: Transform
pub use transform::{canonicalize, canonicalize_str, canonicalize_to_vec, ALGORITHM_URN};
