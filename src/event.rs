//! XML event vocabulary of the transform.
//!
//! Eingangs- und Ausgangsseite sprechen dasselbe Event-Vokabular: der Reader
//! erzeugt Events aus dem Byte-Strom, der Normalizer konsumiert und emittiert
//! Events, der Writer serialisiert Events zurueck zu Bytes. Der Kern fasst
//! selbst nie Bytes an.
//!
//! Auf der Eingangsseite traegt `StartElement` die geordnete Attributliste
//! der Quelle ([`SeContent`]). Auf der Ausgangsseite emittiert der Normalizer
//! `StartElement` mit leerer Attributliste und haengt
//! [`NamespaceDeclaration`](XmlEvent::NamespaceDeclaration)- und
//! [`Attribute`](XmlEvent::Attribute)-Events einzeln an — nur so bleibt die
//! kanonische Reihenfolge bis in den Serializer erhalten.

use std::rc::Rc;

use crate::qname::QName;

/// Content for start-element events: qname plus the source attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeContent {
    /// The qualified name of the element.
    pub qname: Rc<QName>,
    /// Attribute in Quell-Reihenfolge. Namespace-Deklarationen (`xmlns`,
    /// `xmlns:*`) sind hier nie enthalten; der Reader filtert sie.
    pub attributes: Vec<AtContent>,
}

/// Content for attribute events: qname + literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtContent {
    /// The qualified name of the attribute. Empty URI = no namespace.
    pub qname: Rc<QName>,
    /// The attribute value.
    pub value: Rc<str>,
}

/// Content for character-data events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChContent {
    /// The character data.
    pub value: Rc<str>,
}

/// Content for namespace-declaration events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsContent {
    /// The prefix bound to this URI.
    pub prefix: Rc<str>,
    /// The namespace URI being declared.
    pub uri: Rc<str>,
}

/// Content for comment events (input-only; dropped by the normalizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmContent {
    /// The comment text.
    pub text: Rc<str>,
}

/// Content for processing-instruction events (input-only; dropped by the
/// normalizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiContent {
    /// The PI target name.
    pub target: Rc<str>,
    /// The PI data.
    pub data: Rc<str>,
}

/// One structured XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// Start of the document. Carries no content; dropped by the normalizer.
    StartDocument,
    /// End of the document. Carries no content; dropped by the normalizer.
    EndDocument,
    /// Start of an element, with its source attribute list.
    StartElement(SeContent),
    /// End of an element. Traegt den QName des zugehoerigen Start-Elements,
    /// damit der Normalizer den Prefix gegen den Scope-Stack aufloesen kann.
    EndElement(Rc<QName>),
    /// A standalone attribute. Nur Teil des Ausgangs-Vokabulars; im Eingang
    /// werden Attribute ausschliesslich als Teil ihres Start-Elements
    /// verarbeitet und ein freistehendes Attribut-Event wird ignoriert.
    Attribute(AtContent),
    /// Character data (including CDATA content).
    Characters(ChContent),
    /// A namespace declaration, grouped after its start element.
    NamespaceDeclaration(NsContent),
    /// An XML comment (input-only; never emitted canonically).
    Comment(CmContent),
    /// A processing instruction (input-only; never emitted canonically).
    ProcessingInstruction(PiContent),
}
