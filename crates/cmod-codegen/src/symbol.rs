//! qstr interning.
//!
//! Every symbol written into the unit goes through a [`SymbolTable`], which
//! hands out cheap [`Symbol`] handles and knows the C spelling the runtime's
//! qstr generator assigns to each text (`MP_QSTR_<escaped>`). The table never
//! talks to the runtime: it only records which qstrs the unit references so
//! they can be listed for the build.

use std::collections::HashMap;

use crate::error::{CodegenError, CodegenResult};

/// Longest qstr the runtime accepts with one length byte.
pub const MAX_QSTR_LEN: usize = 255;

/// A handle to an interned qstr. Ordered by first use.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Symbol(u32);

impl Symbol {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// qstr interner for one unit.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    map: HashMap<String, Symbol>,
    strings: Vec<String>,
    /// Escaped identifier of each symbol, indexed like `strings`.
    idents: Vec<String>,
    /// Escaped identifier → the symbol that owns it.
    by_ident: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `text`, returning the existing handle if it was seen before.
    ///
    /// The runtime knows a qstr only by its escaped identifier, so a second
    /// text that escapes to an identifier already in use is rejected.
    pub fn intern(&mut self, text: &str) -> CodegenResult<Symbol> {
        if let Some(&sym) = self.map.get(text) {
            return Ok(sym);
        }
        let ident = qstr_escape(text)?;
        if let Some(&owner) = self.by_ident.get(&ident) {
            return Err(invalid(
                text,
                format!(
                    "spelled MP_QSTR_{ident} in C, which already stands for '{}'",
                    self.resolve(owner)
                ),
            ));
        }
        let sym = Symbol(self.strings.len() as u32);
        self.strings.push(text.to_owned());
        self.by_ident.insert(ident.clone(), sym);
        self.idents.push(ident);
        self.map.insert(text.to_owned(), sym);
        Ok(sym)
    }

    /// The interned text, if any, that `text` would collide with in C.
    pub fn clash(&self, text: &str) -> Option<&str> {
        if self.map.contains_key(text) {
            return None;
        }
        let ident = qstr_escape(text).ok()?;
        self.by_ident.get(&ident).map(|&sym| self.resolve(sym))
    }

    pub fn get(&self, text: &str) -> Option<Symbol> {
        self.map.get(text).copied()
    }

    /// Resolve a symbol back to its text.
    ///
    /// # Panics
    /// Panics if the symbol was not created by this table.
    #[inline]
    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    /// `MP_QSTR_<escaped>` for a symbol of this table.
    pub fn c_name(&self, sym: Symbol) -> String {
        format!("MP_QSTR_{}", self.idents[sym.0 as usize])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &str)> {
        self.strings
            .iter()
            .enumerate()
            .map(|(i, s)| (Symbol(i as u32), s.as_str()))
    }

    /// `Q(<text>)` lines for every interned symbol, in interning order.
    pub fn qstrdefs(&self) -> String {
        let mut out = String::new();
        for (_, text) in self.iter() {
            out.push_str("Q(");
            out.push_str(text);
            out.push_str(")\n");
        }
        out
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Escaping
// ══════════════════════════════════════════════════════════════════════════════

/// Names the qstr generator uses for ASCII punctuation.
const ASCII_NAMES: &[(char, &str)] = &[
    (' ', "space"),
    ('!', "bang"),
    ('"', "quot"),
    ('#', "hash"),
    ('$', "dollar"),
    ('%', "percent"),
    ('&', "amp"),
    ('\'', "squot"),
    ('(', "paren_open"),
    (')', "paren_close"),
    ('*', "star"),
    ('+', "plus"),
    (',', "comma"),
    ('-', "hyphen"),
    ('.', "dot"),
    ('/', "slash"),
    (':', "colon"),
    (';', "semicolon"),
    ('<', "lt"),
    ('=', "equals"),
    ('>', "gt"),
    ('?', "question"),
    ('@', "at_sign"),
    ('[', "bracket_open"),
    ('\\', "backslash"),
    (']', "bracket_close"),
    ('^', "caret"),
    ('{', "brace_open"),
    ('|', "pipe"),
    ('}', "brace_close"),
    ('~', "tilde"),
];

/// HTML 4 entity names of U+00A0..=U+00FF, which the qstr generator uses for
/// Latin-1 characters.
const LATIN1_NAMES: [&str; 96] = [
    "nbsp", "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect", "uml", "copy", "ordf",
    "laquo", "not", "shy", "reg", "macr", "deg", "plusmn", "sup2", "sup3", "acute", "micro",
    "para", "middot", "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest",
    "Agrave", "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil", "Egrave",
    "Eacute", "Ecirc", "Euml", "Igrave", "Iacute", "Icirc", "Iuml", "ETH", "Ntilde", "Ograve",
    "Oacute", "Ocirc", "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml",
    "Yacute", "THORN", "szlig", "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig",
    "ccedil", "egrave", "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml", "eth",
    "ntilde", "ograve", "oacute", "ocirc", "otilde", "ouml", "divide", "oslash", "ugrave",
    "uacute", "ucirc", "uuml", "yacute", "thorn", "yuml",
];

/// Ranges beyond Latin-1 in which HTML 4 names some characters. The runtime
/// spells those by name; this table does not carry the names.
fn has_extended_entity_name(c: char) -> bool {
    matches!(
        c as u32,
        0x152 | 0x153 | 0x160 | 0x161 | 0x178 | 0x192 | 0x2C6 | 0x2DC
            | 0x391..=0x3D2
            | 0x3D6
            | 0x2002..=0x203E
            | 0x2044
            | 0x20AC
            | 0x2111..=0x21D4
            | 0x2200..=0x22C5
            | 0x2308..=0x232A
            | 0x25CA..=0x2666
    )
}

/// Spell `text` the way the runtime's qstr generator does: characters
/// outside `[A-Za-z0-9_]` become `_<name>_`.
pub fn qstr_escape(text: &str) -> CodegenResult<String> {
    if text.len() > MAX_QSTR_LEN {
        return Err(invalid(
            text,
            format!("qstrs are limited to {MAX_QSTR_LEN} bytes"),
        ));
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            continue;
        }
        if c.is_control() {
            return Err(invalid(text, "qstrs cannot contain control characters"));
        }
        if has_extended_entity_name(c) {
            return Err(invalid(
                text,
                format!("character U+{:04X} has no supported qstr spelling", c as u32),
            ));
        }
        out.push('_');
        match c as u32 {
            0xA0..=0xFF => out.push_str(LATIN1_NAMES[(c as u32 - 0xA0) as usize]),
            _ => match ASCII_NAMES.iter().find(|(ch, _)| *ch == c) {
                Some((_, name)) => out.push_str(name),
                None => out.push_str(&format!("0x{:02x}", c as u32)),
            },
        }
        out.push('_');
    }
    Ok(out)
}

/// Whether `name` can be used verbatim as a C identifier.
pub fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fail unless `name` is a usable C identifier.
pub fn require_c_identifier(name: &str) -> CodegenResult<()> {
    if is_c_identifier(name) {
        Ok(())
    } else {
        Err(invalid(name, "not a valid C identifier"))
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> CodegenError {
    CodegenError::InvalidSymbol {
        name: name.to_string(),
        reason: reason.into(),
    }
}
