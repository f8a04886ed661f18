//! The SMEV transform: per-event normalizer and public entry points.
//!
//! Ein Durchlauf ist eine einzelne sequentielle Passage ueber den
//! Event-Strom: Events werden in strikter Reihenfolge konsumiert und
//! produziert, Scope-Stack und Prefix-Zaehler gehoeren exklusiv diesem
//! einen Durchlauf. Parallele Aufrufe teilen nichts; jeder Aufruf von
//! [`canonicalize`] konstruiert seinen Zustand frisch.
//!
//! Die Zustandsmaschine pro Event-Art:
//! - `Characters`: Whitespace-only Chunks werden verworfen, alles andere
//!   passiert unveraendert.
//! - `StartElement`: Frame pushen, Element-Prefix aufloesen oder neu
//!   vergeben, Attribute **vor** der Prefix-Vergabe sortieren, dann
//!   NS-Deklarationen (Einfuege-Reihenfolge) und Attribute (sortiert)
//!   emittieren.
//! - `EndElement`: leeres Characters-Event als Marker (erzwingt
//!   `<a></a>` statt `<a/>`), Prefix gegen den Stack aufloesen, Frame
//!   poppen.
//! - Alles andere (Kommentare, PIs, Dokument-Grenzen, freistehende
//!   Attribute): verworfen.

use std::cmp::Ordering;
use std::io::{Read, Write};
use std::rc::Rc;

use log::{debug, warn};

use crate::error::Error;
use crate::event::{AtContent, ChContent, NsContent, SeContent, XmlEvent};
use crate::reader::read_events;
use crate::scope::{PrefixAllocator, ScopeStack};
use crate::writer::CanonicalXmlWriter;
use crate::Result;

/// Algorithm identifier of this transform, as referenced from the
/// `<ds:Transform>` element of a signature.
pub const ALGORITHM_URN: &str = "urn://smev-gov-ru/xmldsig/transform";

/// Totale Ordnung ueber Attribute:
///
/// 1. Attribute ohne Namespace vor allen Attributen mit Namespace.
/// 2. Unter Namespace-Attributen: URI, dann local-name (Code-Points).
/// 3. Unter namespace-losen Attributen: local-name.
///
/// Regel 1 und 3 fallen aus dem QName-Ordering heraus, weil die leere URI
/// lexikographisch vor jeder nicht-leeren steht. Der local-name als
/// Sekundaerschluessel (statt Quell-Reihenfolge) haelt die Ordnung
/// unabhaengig von der Attribut-Reihenfolge der Eingabe.
fn attribute_order(a: &AtContent, b: &AtContent) -> Ordering {
    a.qname.cmp(&b.qname)
}

/// The per-element event normalizer. One instance per pass.
struct Normalizer {
    scopes: ScopeStack,
    prefixes: PrefixAllocator,
}

impl Normalizer {
    fn new() -> Self {
        Self {
            scopes: ScopeStack::new(),
            prefixes: PrefixAllocator::new(),
        }
    }

    /// Prefix fuer eine URI aufloesen; fehlt er, neu vergeben und als
    /// Binding im obersten Frame eintragen.
    fn resolve_or_allocate(&mut self, uri: &Rc<str>) -> Rc<str> {
        match self.scopes.resolve(uri) {
            Some(prefix) => prefix,
            None => {
                let prefix = self.prefixes.allocate();
                self.scopes.add_binding(Rc::clone(&prefix), Rc::clone(uri));
                prefix
            }
        }
    }

    fn process(
        &mut self,
        event: XmlEvent,
        emit: &mut impl FnMut(XmlEvent) -> Result<()>,
    ) -> Result<()> {
        match event {
            XmlEvent::Characters(ch) => {
                if is_insignificant_whitespace(&ch.value) {
                    return Ok(());
                }
                emit(XmlEvent::Characters(ch))
            }
            XmlEvent::StartElement(se) => self.process_start(se, emit),
            XmlEvent::EndElement(qname) => {
                // Marker: schliesst den offenen Start-Tag im Sink mit `>`,
                // damit kinderlose Elemente als <a></a> serialisieren.
                emit(XmlEvent::Characters(ChContent { value: Rc::from("") }))?;

                let prefix = self.scopes.resolve(&qname.uri).ok_or_else(|| {
                    Error::UnresolvedEndElementNamespace {
                        uri: qname.uri.to_string(),
                        local_name: qname.local_name.to_string(),
                    }
                })?;
                emit(XmlEvent::EndElement(Rc::new(qname.reprefixed(prefix))))?;

                self.scopes.pop_frame();
                Ok(())
            }
            // Freistehende Attribute werden nur als Teil ihres
            // Start-Elements verarbeitet; Kommentare, PIs und
            // Dokument-Grenzen gehoeren nicht zum signierten Inhalt.
            // NS-Deklarationen der Quelle filtert schon der Reader, alle
            // kanonischen Deklarationen entstehen hier.
            XmlEvent::Attribute(_)
            | XmlEvent::NamespaceDeclaration(_)
            | XmlEvent::Comment(_)
            | XmlEvent::ProcessingInstruction(_)
            | XmlEvent::StartDocument
            | XmlEvent::EndDocument => Ok(()),
        }
    }

    fn process_start(
        &mut self,
        se: SeContent,
        emit: &mut impl FnMut(XmlEvent) -> Result<()>,
    ) -> Result<()> {
        self.scopes.push_frame();

        if !se.qname.has_namespace() {
            return Err(Error::MissingNamespace {
                local_name: se.qname.local_name.to_string(),
            });
        }
        let prefix = self.resolve_or_allocate(&se.qname.uri);
        emit(XmlEvent::StartElement(SeContent {
            qname: Rc::new(se.qname.reprefixed(prefix)),
            attributes: Vec::new(),
        }))?;

        // Sortierung VOR der Prefix-Vergabe: die Vergabe-Reihenfolge (und
        // damit der Zaehlerstand) ist so eine reine Funktion der sortierten
        // Attributfolge, unabhaengig von der Quell-Reihenfolge.
        let mut attributes = se.attributes;
        attributes.sort_by(attribute_order);

        let mut dst_attributes = Vec::with_capacity(attributes.len());
        for at in attributes {
            if at.qname.has_namespace() {
                let attr_prefix = self.resolve_or_allocate(&at.qname.uri);
                dst_attributes.push(AtContent {
                    qname: Rc::new(at.qname.reprefixed(attr_prefix)),
                    value: at.value,
                });
            } else {
                dst_attributes.push(at);
            }
        }

        // Deklarationen des aktuellen Frames in Einfuege-Reihenfolge
        // (Element-Binding zuerst, dann Attribut-Bindings in sortierter
        // Attributfolge) — nach dem Tag-Namen, vor den Attributen.
        for binding in self.scopes.top_frame() {
            emit(XmlEvent::NamespaceDeclaration(NsContent {
                prefix: Rc::clone(&binding.prefix),
                uri: Rc::clone(&binding.uri),
            }))?;
        }
        for at in dst_attributes {
            emit(XmlEvent::Attribute(at))?;
        }

        Ok(())
    }
}

/// Ob ein Text-Chunk ausschliesslich aus XML-Whitespace besteht.
fn is_insignificant_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

/// Canonicalizes one XML fragment: reads `src`, writes the canonical UTF-8
/// byte form to `dst`.
///
/// Eine Passage, ein frischer Zustand; bei Fehlern bricht der Durchlauf
/// sofort ab und bereits geschriebene Teil-Ausgabe ist nicht als Ergebnis
/// zu werten. Ist Debug-Logging aktiv, wird die produzierte Ausgabe ueber
/// einen Tee mitgeschnitten und nach erfolgreichem Durchlauf geloggt; die
/// Bytes im Sink veraendert der Mitschnitt nicht.
pub fn canonicalize(src: impl Read, dst: impl Write) -> Result<()> {
    if log::log_enabled!(log::Level::Debug) {
        let mut tee = TeeWriter::new(dst);
        run_pass(src, &mut tee)?;
        tee.log_captured();
        Ok(())
    } else {
        run_pass(src, dst)
    }
}

/// Wie [`canonicalize`], sammelt die Ausgabe in einem `Vec<u8>`.
pub fn canonicalize_to_vec(src: impl Read) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    canonicalize(src, &mut buf)?;
    Ok(buf)
}

/// Wie [`canonicalize`], fuer String-Eingabe und -Ausgabe (Convenience).
pub fn canonicalize_str(xml: &str) -> Result<String> {
    let bytes = canonicalize_to_vec(std::io::Cursor::new(xml.as_bytes()))?;
    String::from_utf8(bytes).map_err(|_| Error::Io("canonical output is not valid UTF-8".into()))
}

fn run_pass(src: impl Read, dst: impl Write) -> Result<()> {
    let mut normalizer = Normalizer::new();
    let mut writer = CanonicalXmlWriter::new(dst);

    read_events(src, |event| {
        normalizer.process(event, &mut |out| writer.process(&out))
    })?;

    writer.finish()
}

/// Pass-through tee over the output sink: captures the produced bytes for
/// diagnostics without altering what reaches the sink.
struct TeeWriter<W: Write> {
    inner: W,
    captured: Vec<u8>,
}

impl<W: Write> TeeWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            captured: Vec::new(),
        }
    }

    fn log_captured(&self) {
        match std::str::from_utf8(&self.captured) {
            Ok(s) => debug!("canonical output ({} bytes): {s}", self.captured.len()),
            Err(e) => warn!("canonical output capture is not valid UTF-8: {e}"),
        }
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.captured.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qname::QName;

    fn at(uri: &str, local: &str, value: &str) -> AtContent {
        AtContent {
            qname: Rc::new(QName::new(uri, local)),
            value: Rc::from(value),
        }
    }

    fn normalize(events: Vec<XmlEvent>) -> Result<Vec<XmlEvent>> {
        let mut normalizer = Normalizer::new();
        let mut out = Vec::new();
        for event in events {
            normalizer.process(event, &mut |e| {
                out.push(e);
                Ok(())
            })?;
        }
        Ok(out)
    }

    fn se(uri: &str, local: &str, attributes: Vec<AtContent>) -> XmlEvent {
        XmlEvent::StartElement(SeContent {
            qname: Rc::new(QName::new(uri, local)),
            attributes,
        })
    }

    fn ee(uri: &str, local: &str) -> XmlEvent {
        XmlEvent::EndElement(Rc::new(QName::new(uri, local)))
    }

    // ==================== Attribute Orderer ====================

    #[test]
    fn namespace_lose_attribute_zuerst() {
        let a = at("urn:n2", "c", "3");
        let b = at("", "b", "2");
        assert_eq!(attribute_order(&a, &b), Ordering::Greater);
        assert_eq!(attribute_order(&b, &a), Ordering::Less);
    }

    #[test]
    fn namespace_attribute_nach_uri_dann_local_name() {
        let a = at("urn:n1", "z", "1");
        let b = at("urn:n2", "a", "2");
        assert_eq!(attribute_order(&a, &b), Ordering::Less);

        let c = at("urn:n1", "a", "3");
        assert_eq!(attribute_order(&c, &a), Ordering::Less);
    }

    #[test]
    fn namespace_lose_attribute_nach_local_name() {
        let a = at("", "b", "2");
        let b = at("", "a", "1");
        assert_eq!(attribute_order(&a, &b), Ordering::Greater);
    }

    // ==================== Normalizer ====================

    #[test]
    fn whitespace_chunks_werden_verworfen() {
        let out = normalize(vec![
            se("urn:n1", "X", vec![]),
            XmlEvent::Characters(ChContent { value: " \t\r\n ".into() }),
            ee("urn:n1", "X"),
        ])
        .unwrap();
        // SE, NS-Deklaration, Marker, EE — keine Whitespace-Characters.
        assert!(!out
            .iter()
            .any(|e| matches!(e, XmlEvent::Characters(ch) if !ch.value.is_empty())));
    }

    #[test]
    fn text_mit_inhalt_passiert_unveraendert() {
        let out = normalize(vec![
            se("urn:n1", "X", vec![]),
            XmlEvent::Characters(ChContent { value: "  a  ".into() }),
            ee("urn:n1", "X"),
        ])
        .unwrap();
        assert!(out
            .iter()
            .any(|e| matches!(e, XmlEvent::Characters(ch) if &*ch.value == "  a  ")));
    }

    #[test]
    fn element_ohne_namespace_wird_abgewiesen() {
        let err = normalize(vec![se("", "X", vec![])]).unwrap_err();
        assert_eq!(
            err,
            Error::MissingNamespace { local_name: "X".into() }
        );
    }

    #[test]
    fn element_prefix_wird_vergeben_und_deklariert() {
        let out = normalize(vec![se("urn:n1", "X", vec![]), ee("urn:n1", "X")]).unwrap();

        let XmlEvent::StartElement(se_out) = &out[0] else {
            panic!("Expected StartElement: {:?}", out[0]);
        };
        assert_eq!(se_out.qname.prefix.as_deref(), Some("ns1"));
        assert!(se_out.attributes.is_empty());

        let XmlEvent::NamespaceDeclaration(ns) = &out[1] else {
            panic!("Expected NamespaceDeclaration: {:?}", out[1]);
        };
        assert_eq!(&*ns.prefix, "ns1");
        assert_eq!(&*ns.uri, "urn:n1");
    }

    #[test]
    fn end_element_bekommt_den_start_prefix() {
        let out = normalize(vec![se("urn:n1", "X", vec![]), ee("urn:n1", "X")]).unwrap();
        let XmlEvent::EndElement(q) = out.last().unwrap() else {
            panic!("Expected EndElement");
        };
        assert_eq!(q.prefix.as_deref(), Some("ns1"));
    }

    #[test]
    fn marker_vor_end_element() {
        let out = normalize(vec![se("urn:n1", "X", vec![]), ee("urn:n1", "X")]).unwrap();
        let ee_pos = out
            .iter()
            .position(|e| matches!(e, XmlEvent::EndElement(_)))
            .unwrap();
        assert!(matches!(
            &out[ee_pos - 1],
            XmlEvent::Characters(ch) if ch.value.is_empty()
        ));
    }

    #[test]
    fn prefix_wird_ueber_verschachtelung_wiederverwendet() {
        let out = normalize(vec![
            se("urn:n1", "X", vec![]),
            se("urn:n1", "Y", vec![]),
            ee("urn:n1", "Y"),
            ee("urn:n1", "X"),
        ])
        .unwrap();

        let decl_count = out
            .iter()
            .filter(|e| matches!(e, XmlEvent::NamespaceDeclaration(_)))
            .count();
        assert_eq!(decl_count, 1, "urn:n1 wird nur einmal deklariert");

        let inner = out
            .iter()
            .filter(|e| matches!(e, XmlEvent::StartElement(_)))
            .nth(1)
            .unwrap();
        let XmlEvent::StartElement(inner) = inner else {
            panic!("Expected StartElement: {inner:?}");
        };
        assert_eq!(inner.qname.prefix.as_deref(), Some("ns1"));
    }

    #[test]
    fn attribut_bindings_landen_im_selben_frame() {
        let out = normalize(vec![
            se("urn:n1", "X", vec![at("urn:n2", "c", "3"), at("", "b", "2")]),
            ee("urn:n1", "X"),
        ])
        .unwrap();

        // Deklarationen: ns1 (Element) dann ns2 (Attribut), gruppiert vor
        // den Attribut-Events.
        let decls: Vec<(String, String)> = out
            .iter()
            .filter_map(|e| match e {
                XmlEvent::NamespaceDeclaration(ns) => {
                    Some((ns.prefix.to_string(), ns.uri.to_string()))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            decls,
            vec![
                ("ns1".to_string(), "urn:n1".to_string()),
                ("ns2".to_string(), "urn:n2".to_string()),
            ]
        );

        // Attribute: namespace-los vor namespace-tragend.
        let attrs: Vec<String> = out
            .iter()
            .filter_map(|e| match e {
                XmlEvent::Attribute(at) => Some(at.qname.local_name.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(attrs, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn unaufloesbarer_end_element_namespace() {
        let mut normalizer = Normalizer::new();
        let mut out = Vec::new();
        let err = normalizer
            .process(ee("urn:unbekannt", "X"), &mut |e| {
                out.push(e);
                Ok(())
            })
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnresolvedEndElementNamespace {
                uri: "urn:unbekannt".into(),
                local_name: "X".into(),
            }
        );
    }

    #[test]
    fn kommentare_und_pis_werden_verworfen() {
        let out = normalize(vec![
            XmlEvent::StartDocument,
            se("urn:n1", "X", vec![]),
            XmlEvent::Comment(crate::event::CmContent { text: "c".into() }),
            XmlEvent::ProcessingInstruction(crate::event::PiContent {
                target: "pi".into(),
                data: "d".into(),
            }),
            ee("urn:n1", "X"),
            XmlEvent::EndDocument,
        ])
        .unwrap();
        assert!(!out.iter().any(|e| matches!(
            e,
            XmlEvent::Comment(_)
                | XmlEvent::ProcessingInstruction(_)
                | XmlEvent::StartDocument
                | XmlEvent::EndDocument
        )));
    }

    #[test]
    fn eingehende_ns_deklaration_wird_ignoriert() {
        // Der Normalizer vergibt alle Deklarationen selbst; eine von aussen
        // eingespeiste Deklaration darf weder durchgereicht werden noch den
        // Scope-Stack beeinflussen.
        let out = normalize(vec![
            XmlEvent::NamespaceDeclaration(NsContent {
                prefix: "alt".into(),
                uri: "urn:n1".into(),
            }),
            se("urn:n1", "X", vec![]),
            ee("urn:n1", "X"),
        ])
        .unwrap();

        let XmlEvent::StartElement(se_out) = &out[0] else {
            panic!("Expected StartElement: {:?}", out[0]);
        };
        assert_eq!(se_out.qname.prefix.as_deref(), Some("ns1"));
        assert!(!out.iter().any(|e| matches!(
            e,
            XmlEvent::NamespaceDeclaration(ns) if &*ns.prefix == "alt"
        )));
    }

    #[test]
    fn freistehendes_attribut_wird_ignoriert() {
        let out = normalize(vec![
            se("urn:n1", "X", vec![]),
            XmlEvent::Attribute(at("", "a", "1")),
            ee("urn:n1", "X"),
        ])
        .unwrap();
        assert!(!out.iter().any(|e| matches!(e, XmlEvent::Attribute(_))));
    }

    // ==================== Entry points ====================

    #[test]
    fn canonicalize_str_beispiel() {
        let out = canonicalize_str(r#"<a:X xmlns:a="urn:n1" b="2" a="1"><a:Y/></a:X>"#).unwrap();
        assert_eq!(
            out,
            r#"<ns1:X xmlns:ns1="urn:n1" a="1" b="2"><ns1:Y></ns1:Y></ns1:X>"#
        );
    }

    #[test]
    fn tee_writer_veraendert_bytes_nicht() {
        let mut sink = Vec::new();
        let mut tee = TeeWriter::new(&mut sink);
        tee.write_all(b"<ns1:X></ns1:X>").unwrap();
        tee.flush().unwrap();
        assert_eq!(tee.captured, b"<ns1:X></ns1:X>");
        assert_eq!(sink, b"<ns1:X></ns1:X>");
    }
}
