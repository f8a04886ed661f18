//! Namespace scope stack and synthetic prefix allocation.
//!
//! Der Stack haelt pro offenem Element einen Frame mit den Bindings, die
//! dieses Element neu eingefuehrt hat. Frames werden in strikter
//! LIFO-Reihenfolge zur Element-Verschachtelung gepusht und gepoppt; ein
//! End-Element findet den Frame seines Start-Elements immer ganz oben.
//!
//! Beides ist Zustand genau eines Durchlaufs: pro Aufruf von
//! [`canonicalize`](crate::transform::canonicalize) werden Stack und
//! Allocator frisch konstruiert, nichts davon ueberlebt den Aufruf.

use std::rc::Rc;

/// One (prefix, namespace URI) binding, alive for the subtree of the element
/// that introduced it.
#[derive(Debug, Clone)]
pub(crate) struct NsBinding {
    pub(crate) prefix: Rc<str>,
    pub(crate) uri: Rc<str>,
}

/// Stack of namespace scope frames, one frame per open element.
#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    frames: Vec<Vec<NsBinding>>,
}

impl ScopeStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Beginnt einen neuen, leeren Frame (beim Start-Element).
    pub(crate) fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Entfernt den obersten Frame (beim End-Element). Ein Pop ohne
    /// zugehoerigen Push ist ein Bug im Aufrufer, kein Laufzeitfall.
    pub(crate) fn pop_frame(&mut self) {
        debug_assert!(!self.frames.is_empty(), "pop_frame ohne offenen Frame");
        self.frames.pop();
    }

    /// Traegt ein neues Binding in den obersten Frame ein.
    pub(crate) fn add_binding(&mut self, prefix: Rc<str>, uri: Rc<str>) {
        let frame = self
            .frames
            .last_mut()
            .expect("add_binding setzt einen offenen Frame voraus");
        frame.push(NsBinding { prefix, uri });
    }

    /// Sucht den Prefix fuer eine URI, innerster Frame zuerst.
    ///
    /// Callers muessen Elemente ohne Namespace vorher abweisen; eine leere
    /// URI findet nie ein Binding, weil nur nicht-leere URIs eingetragen
    /// werden.
    pub(crate) fn resolve(&self, uri: &str) -> Option<Rc<str>> {
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|binding| &*binding.uri == uri)
            .map(|binding| Rc::clone(&binding.prefix))
    }

    /// Die Bindings, die der oberste Frame eingefuehrt hat, in
    /// Einfuege-Reihenfolge. Das sind genau die Deklarationen, die fuer das
    /// aktuelle Element emittiert werden muessen.
    pub(crate) fn top_frame(&self) -> &[NsBinding] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Allocator fuer synthetische Prefixe: `ns1`, `ns2`, ...
///
/// Der Zaehler startet bei 1 und waechst monoton ueber den gesamten
/// Durchlauf; kein Wert wird wiederverwendet oder zurueckgesetzt. Die
/// Vergabe-Reihenfolge ist damit eine reine Funktion der Traversierung
/// (Elemente und sortierte Attribute, tiefensuchend) — das macht die
/// Ausgabe ueber unabhaengige Implementierungen hinweg reproduzierbar.
#[derive(Debug)]
pub(crate) struct PrefixAllocator {
    next: u32,
}

impl PrefixAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    /// Gibt den naechsten Prefix zurueck und zaehlt weiter.
    pub(crate) fn allocate(&mut self) -> Rc<str> {
        let prefix = Rc::from(format!("ns{}", self.next));
        self.next += 1;
        prefix
    }
}
