//! Qualified names: (namespace URI, local name, optional prefix).
//!
//! Zwei QNames sind gleich, wenn URI und local-name uebereinstimmen — der
//! Prefix ist nur syntaktische Oberflaeche und geht nicht in `PartialEq`,
//! `Eq` oder `Hash` ein. Genau darauf beruht die Kanonisierung: die
//! Prefix-Schreibweise der Quelle ist bedeutungslos und wird komplett
//! durch synthetische Prefixe ersetzt.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// A QName value with URI, local-name, and optional prefix.
///
/// An empty `uri` means "no namespace". Elemente brauchen zwingend eine
/// nicht-leere URI (wird im Normalizer geprueft); Attribute duerfen ohne
/// Namespace auftreten.
#[derive(Clone)]
pub struct QName {
    /// The namespace URI. Empty string means no namespace.
    pub uri: Rc<str>,
    /// The local name.
    pub local_name: Rc<str>,
    /// The prefix, if one is assigned.
    pub prefix: Option<Rc<str>>,
}

impl QName {
    /// Erstellt einen QName ohne Prefix.
    pub fn new(uri: &str, local_name: &str) -> Self {
        Self {
            uri: Rc::from(uri),
            local_name: Rc::from(local_name),
            prefix: None,
        }
    }

    /// Erstellt einen QName mit Prefix.
    pub fn with_prefix(uri: &str, local_name: &str, prefix: &str) -> Self {
        Self {
            uri: Rc::from(uri),
            local_name: Rc::from(local_name),
            prefix: Some(Rc::from(prefix)),
        }
    }

    /// Kopiert URI und local-name, ersetzt den Prefix.
    ///
    /// Rc-Clone statt String-Kopie: URI und local-name werden zwischen
    /// Quell- und Ziel-Event geteilt.
    pub fn reprefixed(&self, prefix: Rc<str>) -> Self {
        Self {
            uri: Rc::clone(&self.uri),
            local_name: Rc::clone(&self.local_name),
            prefix: Some(prefix),
        }
    }

    /// Ob der QName eine (nicht-leere) Namespace-URI traegt.
    pub fn has_namespace(&self) -> bool {
        !self.uri.is_empty()
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QName")
            .field("uri", &self.uri)
            .field("local_name", &self.local_name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.local_name == other.local_name
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
        self.local_name.hash(state);
    }
}

/// Ordering konsistent mit PartialEq: nur uri und local_name, prefix ignoriert.
///
/// Sortierung: erst uri (Code-Point-Reihenfolge), dann local_name. Das ist
/// die Attribut-Sortierreihenfolge fuer namespace-tragende Attribute.
impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri
            .cmp(&other.uri)
            .then_with(|| self.local_name.cmp(&other.local_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eq_ignoriert_prefix() {
        let a = QName::with_prefix("urn:n1", "X", "a");
        let b = QName::with_prefix("urn:n1", "X", "b");
        let c = QName::new("urn:n1", "X");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn ne_bei_anderer_uri() {
        let a = QName::new("urn:n1", "X");
        let b = QName::new("urn:n2", "X");
        assert_ne!(a, b);
    }

    #[test]
    fn ordering_uri_vor_local_name() {
        let a = QName::new("urn:a", "z");
        let b = QName::new("urn:b", "a");
        assert!(a < b, "URI ist der primaere Sortierschluessel");

        let c = QName::new("urn:a", "a");
        assert!(c < a, "bei gleicher URI entscheidet der local-name");
    }

    #[test]
    fn reprefixed_teilt_uri_und_local_name() {
        let src = QName::with_prefix("urn:n1", "X", "old");
        let dst = src.reprefixed(Rc::from("ns1"));
        assert_eq!(dst.prefix.as_deref(), Some("ns1"));
        assert!(Rc::ptr_eq(&src.uri, &dst.uri));
        assert!(Rc::ptr_eq(&src.local_name, &dst.local_name));
    }

    #[test]
    fn has_namespace_leere_uri() {
        assert!(!QName::new("", "a").has_namespace());
        assert!(QName::new("urn:n1", "a").has_namespace());
    }
}
