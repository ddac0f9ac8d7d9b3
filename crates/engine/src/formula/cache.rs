//! Parsed formula trees memoized by normalized text.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::parser::{parse, Expr};

pub type ParseResult = Rc<Result<Expr, String>>;

/// Formula text with case and spacing differences removed.
///
/// Outside string literals and quoted sheet names, letters are uppercased
/// and whitespace is dropped, except a single space separating two word
/// characters (so `=A1 B1` stays a parse error instead of becoming `=A1B1`).
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for ch in text.trim().chars() {
        if let Some(q) = quote {
            out.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let prev_word = out.chars().last().map_or(false, is_word);
            if prev_word && is_word(ch) {
                out.push(' ');
            }
            pending_space = false;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
        }
        out.extend(ch.to_uppercase());
    }
    out
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

/// Shared parse results. Structurally identical formulas (same normalized
/// text) get one tree, so a filled column of `=A1*2`-style copies parses
/// each distinct text only once.
#[derive(Default, Debug)]
pub struct FormulaCache {
    entries: FxHashMap<String, ParseResult>,
    hits: u64,
    misses: u64,
}

impl FormulaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, text: &str) -> ParseResult {
        let key = normalize(text);
        if let Some(found) = self.entries.get(&key) {
            self.hits += 1;
            return Rc::clone(found);
        }
        self.misses += 1;
        let parsed = Rc::new(parse(&key));
        self.entries.insert(key, Rc::clone(&parsed));
        parsed
    }

    /// Drop trees no cell holds any more.
    pub fn prune(&mut self) {
        self.entries.retain(|_, tree| Rc::strong_count(tree) > 1);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
