//! Event sink: serializes [`XmlEvent`]s to a UTF-8 byte stream.
//!
//! Der Writer puffert einen offenen Start-Tag zusammen mit seinen
//! NS-Deklarations- und Attribut-Events und schreibt ihn beim naechsten
//! Event mit `>` zu Ende — die Self-Closing-Form `<a/>` wird nie erzeugt,
//! ein kinderloses Element serialisiert immer als `<a></a>`.
//!
//! Deklarationen und Attribute werden exakt in Event-Reihenfolge
//! geschrieben; jede Umsortierung wuerde die signierte Byte-Folge brechen.

use std::io::Write;
use std::rc::Rc;

use crate::error::Error;
use crate::event::{AtContent, NsContent, XmlEvent};
use crate::qname::QName;
use crate::Result;

/// io::Error → Error Konvertierung.
fn io_err(e: std::io::Error) -> Error {
    Error::Io(e.to_string())
}

/// Schreibt einen String als Bytes in den Writer.
#[inline]
fn w(writer: &mut impl Write, s: &str) -> Result<()> {
    writer.write_all(s.as_bytes()).map_err(io_err)
}

/// QName als `prefix:local` (oder nur `local`) schreiben.
fn write_qname(writer: &mut impl Write, q: &QName) -> Result<()> {
    match &q.prefix {
        Some(pfx) if !pfx.is_empty() => {
            w(writer, pfx)?;
            w(writer, ":")?;
            w(writer, &q.local_name)
        }
        _ => w(writer, &q.local_name),
    }
}

/// XML-Escaping mit memchr3: Sucht drei Zeichen gleichzeitig, Bloecke ohne
/// Escape-Zeichen werden in einem Stueck geschrieben.
fn write_escaped_memchr3(
    w: &mut impl Write,
    s: &str,
    needle: [u8; 3],
    replacement: [&[u8]; 3],
) -> Result<()> {
    let bytes = s.as_bytes();
    let mut start = 0;
    while start < bytes.len() {
        match memchr::memchr3(needle[0], needle[1], needle[2], &bytes[start..]) {
            Some(offset) => {
                let pos = start + offset;
                if start < pos {
                    w.write_all(&bytes[start..pos]).map_err(io_err)?;
                }
                let idx = needle.iter().position(|&n| n == bytes[pos]).unwrap();
                w.write_all(replacement[idx]).map_err(io_err)?;
                start = pos + 1;
            }
            None => {
                w.write_all(&bytes[start..]).map_err(io_err)?;
                break;
            }
        }
    }
    Ok(())
}

/// Escaping fuer Text-Inhalt: & < > → &amp; &lt; &gt;
fn write_escaped_text(w: &mut impl Write, s: &str) -> Result<()> {
    write_escaped_memchr3(w, s, [b'&', b'<', b'>'], [b"&amp;", b"&lt;", b"&gt;"])
}

/// Escaping fuer Attribut-Werte: & < " → &amp; &lt; &quot;
fn write_escaped_attr(w: &mut impl Write, s: &str) -> Result<()> {
    write_escaped_memchr3(w, s, [b'&', b'<', b'"'], [b"&amp;", b"&lt;", b"&quot;"])
}

/// Streaming serializer for canonical XML — schreibt direkt in `W: Write`.
///
/// Erwartet den Event-Strom, den der Normalizer produziert: `StartElement`
/// (mit leerer Attributliste), gefolgt von `NamespaceDeclaration`- und
/// `Attribute`-Events, `Characters`, `EndElement` mit aufgeloestem Prefix.
/// `StartDocument`/`EndDocument` werden ignoriert; eine XML-Deklaration
/// wird nie geschrieben.
pub struct CanonicalXmlWriter<W: Write> {
    writer: W,
    pending_start: Option<Rc<QName>>,
    pending_ns: Vec<NsContent>,
    pending_attrs: Vec<AtContent>,
}

impl<W: Write> CanonicalXmlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending_start: None,
            pending_ns: Vec::new(),
            pending_attrs: Vec::new(),
        }
    }

    pub fn process(&mut self, event: &XmlEvent) -> Result<()> {
        match event {
            XmlEvent::StartDocument | XmlEvent::EndDocument => {}
            XmlEvent::StartElement(se) => {
                self.flush_pending_start()?;
                self.pending_start = Some(Rc::clone(&se.qname));
                self.pending_ns.clear();
                self.pending_attrs.clear();
                self.pending_attrs.extend(se.attributes.iter().cloned());
            }
            XmlEvent::NamespaceDeclaration(ns) => {
                self.pending_ns.push(ns.clone());
            }
            XmlEvent::Attribute(at) => {
                self.pending_attrs.push(at.clone());
            }
            XmlEvent::Characters(ch) => {
                self.flush_pending_start()?;
                write_escaped_text(&mut self.writer, &ch.value)?;
            }
            XmlEvent::EndElement(qname) => {
                // Der Normalizer schickt vor jedem EndElement ein leeres
                // Characters-Event, das den offenen Tag mit `>` schliesst.
                // Der Flush hier ist der Vollstaendigkeit halber fuer
                // direkt gespeiste Event-Stroeme.
                self.flush_pending_start()?;
                w(&mut self.writer, "</")?;
                write_qname(&mut self.writer, qname)?;
                w(&mut self.writer, ">")?;
            }
            XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction(_) => {
                // Nicht Teil des kanonischen Vokabulars; der Normalizer
                // emittiert sie nie.
            }
        }
        Ok(())
    }

    /// Flusht den Writer. Muss am Ende eines Durchlaufs aufgerufen werden.
    pub fn finish(mut self) -> Result<()> {
        self.flush_pending_start()?;
        self.writer.flush().map_err(io_err)
    }

    /// Schreibt den gepufferten Start-Tag. Immer mit `>`, nie `/>`.
    fn flush_pending_start(&mut self) -> Result<()> {
        let Some(qname) = self.pending_start.take() else {
            return Ok(());
        };

        w(&mut self.writer, "<")?;
        write_qname(&mut self.writer, &qname)?;
        for ns in self.pending_ns.drain(..) {
            w(&mut self.writer, " xmlns:")?;
            w(&mut self.writer, &ns.prefix)?;
            w(&mut self.writer, "=\"")?;
            write_escaped_attr(&mut self.writer, &ns.uri)?;
            w(&mut self.writer, "\"")?;
        }
        for at in self.pending_attrs.drain(..) {
            w(&mut self.writer, " ")?;
            write_qname(&mut self.writer, &at.qname)?;
            w(&mut self.writer, "=\"")?;
            write_escaped_attr(&mut self.writer, &at.value)?;
            w(&mut self.writer, "\"")?;
        }
        w(&mut self.writer, ">")
    }
}
