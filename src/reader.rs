//! XML byte stream → event source.
//!
//! Uses quick-xml to drive a callback with structured [`XmlEvent`]s. Die
//! Eingabe wird als UTF-8 angenommen (Vorgabe des Austauschprotokolls).
//!
//! Der Reader liefert das volle Eingangs-Vokabular inklusive Kommentaren und
//! Processing Instructions — was davon in die kanonische Ausgabe gelangt,
//! entscheidet allein der Normalizer. Namespace-Deklarationen der Quelle
//! (`xmlns`, `xmlns:*`) tauchen dagegen nie als Events auf: die kanonische
//! Form synthetisiert alle Deklarationen neu, die Quell-Bindings sind nur
//! Parser-Kontext fuer die QName-Aufloesung.

use std::rc::Rc;

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName as XmlQName, ResolveResult};
use quick_xml::reader::NsReader;

use crate::error::Error;
use crate::event::{AtContent, ChContent, CmContent, PiContent, SeContent, XmlEvent};
use crate::qname::QName;
use crate::Result;

/// Parses an XML byte stream and invokes `emit` for every event.
///
/// CDATA wird wie Zeichendaten behandelt. Jeder Text-Chunk der Quelle wird
/// als eigenes `Characters`-Event geliefert, ohne Zusammenfassen benachbarter
/// Chunks — der Normalizer bewertet jeden Chunk einzeln auf insignifikanten
/// Whitespace.
pub fn read_events(
    src: impl std::io::Read,
    mut emit: impl FnMut(XmlEvent) -> Result<()>,
) -> Result<()> {
    let mut reader = NsReader::from_reader(std::io::BufReader::new(src));
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    // Element-Stack des Readers: liefert den QName fuer End-Events und
    // erkennt ueberzaehlige End-Tags.
    let mut open_elements: Vec<Rc<QName>> = Vec::new();

    emit(XmlEvent::StartDocument)?;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let se = read_start(&reader, &e)?;
                open_elements.push(Rc::clone(&se.qname));
                emit(XmlEvent::StartElement(se))?;
            }
            Ok(Event::Empty(e)) => {
                let se = read_start(&reader, &e)?;
                let qname = Rc::clone(&se.qname);
                emit(XmlEvent::StartElement(se))?;
                emit(XmlEvent::EndElement(qname))?;
            }
            Ok(Event::End(_e)) => {
                let qname = open_elements.pop().ok_or_else(|| {
                    Error::UpstreamXml("unerwartetes End-Element ohne offenes Element".to_string())
                })?;
                emit(XmlEvent::EndElement(qname))?;
            }
            Ok(Event::Text(e)) => {
                let raw = std::str::from_utf8(e.as_ref())
                    .map_err(|er| Error::UpstreamXml(er.to_string()))?;
                let text = unescape(raw).map_err(|er| Error::UpstreamXml(er.to_string()))?;
                let text = normalize_line_endings(&text);
                emit_characters(&text, open_elements.is_empty(), &mut emit)?;
            }
            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|er| Error::UpstreamXml(er.to_string()))?;
                let text = normalize_line_endings(text);
                emit_characters(&text, open_elements.is_empty(), &mut emit)?;
            }
            Ok(Event::Comment(e)) => {
                let text = std::str::from_utf8(e.as_ref())
                    .map_err(|er| Error::UpstreamXml(er.to_string()))?;
                emit(XmlEvent::Comment(CmContent { text: Rc::from(text) }))?;
            }
            Ok(Event::PI(e)) => {
                let target = std::str::from_utf8(e.target())
                    .map_err(|er| Error::UpstreamXml(er.to_string()))?
                    .to_string();
                let data = std::str::from_utf8(e.content())
                    .map_err(|er| Error::UpstreamXml(er.to_string()))?;
                // XML 1.0 Sec. 2.6: Whitespace zwischen PITarget und Daten
                // ist Separator, nicht Teil der Daten.
                let data = data.trim_start();
                emit(XmlEvent::ProcessingInstruction(PiContent {
                    target: Rc::from(target.as_str()),
                    data: Rc::from(data),
                }))?;
            }
            Ok(Event::GeneralRef(e)) => {
                let ref_name = std::str::from_utf8(e.as_ref())
                    .map_err(|er| Error::UpstreamXml(er.to_string()))?;
                let resolved = resolve_reference(ref_name).ok_or_else(|| {
                    Error::UpstreamXml(format!("unaufloesbare Entity-Referenz '&{ref_name};'"))
                })?;
                emit_characters(&resolved, open_elements.is_empty(), &mut emit)?;
            }
            // XML-Deklaration und DOCTYPE gehoeren nicht zum signierten
            // Inhalt und werden verworfen.
            Ok(Event::Decl(_)) | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::UpstreamXml(format!(
                    "parse error at {:?}: {e}",
                    reader.buffer_position()
                )));
            }
        }

        buf.clear();
    }

    emit(XmlEvent::EndDocument)?;
    Ok(())
}

/// Liest Events aus einem String (Convenience fuer Tests und Batch-API).
pub fn read_events_from_str(
    xml: &str,
    emit: impl FnMut(XmlEvent) -> Result<()>,
) -> Result<()> {
    read_events(std::io::Cursor::new(xml.as_bytes()), emit)
}

/// Characters-Event emittieren; Text ausserhalb des Root-Elements ist nur
/// als Whitespace zulaessig.
fn emit_characters(
    text: &str,
    at_document_level: bool,
    emit: &mut impl FnMut(XmlEvent) -> Result<()>,
) -> Result<()> {
    if at_document_level {
        if text.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n')) {
            return Ok(());
        }
        return Err(Error::UpstreamXml(
            "character data outside root element".to_string(),
        ));
    }
    emit(XmlEvent::Characters(ChContent { value: Rc::from(text) }))
}

/// Start-Element lesen: QName aufloesen, Attribute sammeln (ohne
/// xmlns-Deklarationen), Werte dekodieren und normalisieren.
fn read_start(
    reader: &NsReader<impl std::io::BufRead>,
    e: &BytesStart<'_>,
) -> Result<SeContent> {
    let (elem_uri, elem_local) = resolve_element_qname(reader, e.name())?;
    let qname = Rc::new(QName::new(&elem_uri, &elem_local));

    let mut attributes = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|er| Error::UpstreamXml(er.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }

        let (attr_uri, attr_local) = resolve_attribute_qname(reader, attr.key)?;
        let raw = std::str::from_utf8(attr.value.as_ref())
            .map_err(|er| Error::UpstreamXml(er.to_string()))?;
        // XML 1.0 Sec. 3.3.3: Attribut-Wert-Normalisierung — jedes
        // literale Whitespace-Zeichen wird zu einem Space (\r\n zaehlt
        // als eines). Muss VOR dem Unescape laufen: per Zeichenreferenz
        // (&#x9; &#xA; &#xD;) eingefuegter Whitespace bleibt woertlich
        // erhalten.
        let normalized = normalize_attr_value(raw);
        let value =
            unescape(&normalized).map_err(|er| Error::UpstreamXml(er.to_string()))?;

        attributes.push(AtContent {
            qname: Rc::new(QName::new(&attr_uri, &attr_local)),
            value: Rc::from(&*value),
        });
    }

    Ok(SeContent { qname, attributes })
}

fn resolve_element_qname(
    reader: &NsReader<impl std::io::BufRead>,
    name: XmlQName<'_>,
) -> Result<(String, String)> {
    let (ns, local) = reader.resolver().resolve_element(name);
    let uri = resolve_to_uri(ns)?;
    let local_name = String::from_utf8(local.as_ref().to_vec())
        .map_err(|er| Error::UpstreamXml(er.to_string()))?;
    Ok((uri, local_name))
}

fn resolve_attribute_qname(
    reader: &NsReader<impl std::io::BufRead>,
    name: XmlQName<'_>,
) -> Result<(String, String)> {
    let (ns, local) = reader.resolver().resolve_attribute(name);
    let uri = resolve_to_uri(ns)?;
    let local_name = String::from_utf8(local.as_ref().to_vec())
        .map_err(|er| Error::UpstreamXml(er.to_string()))?;
    Ok((uri, local_name))
}

fn resolve_to_uri(ns: ResolveResult<'_>) -> Result<String> {
    match ns {
        ResolveResult::Bound(ns) => String::from_utf8(ns.as_ref().to_vec())
            .map_err(|er| Error::UpstreamXml(er.to_string())),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(Error::UpstreamXml(format!(
            "unknown namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

/// XML 1.0 Sec. 2.11: \r\n -> \n, alleinstehende \r -> \n.
fn normalize_line_endings(s: &str) -> String {
    if !s.contains('\r') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            if matches!(chars.peek(), Some('\n')) {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Attribut-Wert-Normalisierung: \r\n, \r, \n und \t werden je zu einem
/// Space.
fn normalize_attr_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                out.push(' ');
            }
            '\n' | '\t' => out.push(' '),
            _ => out.push(ch),
        }
    }
    out
}

/// Loest eine Zeichenreferenz (`#49`, `#x31`) oder eine der fuenf
/// vordefinierten Entities auf. DTD-deklarierte Entities werden nicht
/// unterstuetzt.
fn resolve_reference(ref_name: &str) -> Option<String> {
    if let Some(digits) = ref_name.strip_prefix('#') {
        let code_point = if let Some(hex) = digits.strip_prefix('x') {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            digits.parse::<u32>().ok()?
        };
        return char::from_u32(code_point).map(String::from);
    }
    resolve_predefined_entity(ref_name).map(str::to_string)
}
