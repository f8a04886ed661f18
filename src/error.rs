//! Central error types for the SMEV transform.
//!
//! Die Kanonisierung ist eine reine Funktion ihrer Eingabe: jeder Fehler
//! bedeutet fehlerhafte Eingabe oder einen inkonsistenten Event-Strom und
//! bricht den Durchlauf sofort ab. Keine Retries, keine stille Recovery.

use core::fmt;

/// All error conditions of one canonicalization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A start element carries no namespace URI.
    ///
    /// Elemente in unqualified form werden vom Transform-Algorithmus nicht
    /// unterstuetzt; der Durchlauf bricht ab, bevor Ausgabe fuer das Element
    /// entsteht.
    MissingNamespace {
        /// Local name of the offending element.
        local_name: String,
    },
    /// An end element's namespace URI has no binding in the active scope stack.
    ///
    /// Kann bei wohlgeformter Eingabe nicht auftreten: das Binding des
    /// zugehoerigen Start-Elements liegt noch auf dem Stack. Der Fehler zeigt
    /// einen strukturell inkonsistenten Event-Strom an (Start/End-Mismatch).
    UnresolvedEndElementNamespace {
        /// The unresolvable namespace URI.
        uri: String,
        /// Local name of the offending element.
        local_name: String,
    },
    /// The XML event source failed (malformed input).
    UpstreamXml(String),
    /// The output sink failed (write or flush).
    Io(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingNamespace { local_name } => {
                write!(f, "element '{local_name}' has no namespace URI (unqualified elements are unsupported)")
            }
            Self::UnresolvedEndElementNamespace { uri, local_name } => {
                write!(f, "end element '{local_name}': no prefix mapping for namespace '{uri}'")
            }
            Self::UpstreamXml(msg) => write!(f, "XML parse error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// A convenience `Result` type alias using [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
