//! Interned symbols and their binding caches.
//!
//! Symbols are content-addressed: the table holds at most one symbol per
//! distinct name. Lookup is partitioned by content hash into sixteen ordered
//! maps keyed by the raw name bytes.
//!
//! Each symbol carries a binding stack: `(value, frame-index)` entries kept
//! sorted strictly ascending by frame index, at most one entry per frame.
//! The top entry is the symbol's visible binding under the current stack, so
//! evaluation is O(1). The entries are a cache mirroring the current stack's
//! frames and hold no counts; the frames own the authoritative references,
//! and the stack-switch protocol keeps the caches consistent.

use std::collections::BTreeMap;

use crate::interp::Interp;
use crate::strings::{content_hash, push_escaped};
use crate::value::{Ref, StrId, SymId, Traits, clone_ref};

pub const SYMBOL_PARTITIONS: usize = 16;

/// A cached binding. `value` is weak: no count is held.
#[derive(Clone, Copy)]
pub struct Binding {
    pub value: Ref,
    pub frame: usize,
}

pub struct Symbol {
    pub name: StrId,
    rc: usize,
    pub bindings: Vec<Binding>,
}

pub struct SymbolTable {
    slots: Vec<Option<Symbol>>,
    free: Vec<u32>,
    partitions: [BTreeMap<Box<[u8]>, SymId>; SYMBOL_PARTITIONS],
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            slots: Vec::new(),
            free: Vec::new(),
            partitions: std::array::from_fn(|_| BTreeMap::new()),
        }
    }

    pub fn get(&self, id: SymId) -> &Symbol {
        match self.slots[id.0 as usize].as_ref() {
            Some(sym) => sym,
            None => panic!("symbol handle {} is dead", id.0),
        }
    }

    pub fn get_mut(&mut self, id: SymId) -> &mut Symbol {
        match self.slots[id.0 as usize].as_mut() {
            Some(sym) => sym,
            None => panic!("symbol handle {} is dead", id.0),
        }
    }

    fn insert(&mut self, sym: Symbol) -> SymId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(sym);
                SymId(idx)
            }
            None => {
                self.slots.push(Some(sym));
                SymId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn remove(&mut self, id: SymId) -> Symbol {
        let sym = self.slots[id.0 as usize].take();
        self.free.push(id.0);
        match sym {
            Some(sym) => sym,
            None => panic!("symbol handle {} is dead", id.0),
        }
    }

    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Intern `name`, returning the unique symbol for it with one fresh count.
pub fn make_symbol(interp: &mut Interp, name: &[u8]) -> Ref {
    let part = (content_hash(name) as usize) % SYMBOL_PARTITIONS;
    if let Some(&id) = interp.symbols.partitions[part].get(name) {
        interp.symbols.get_mut(id).rc += 1;
        return Ref::Symbol(id);
    }
    let name_id = interp.strings.alloc(name);
    let id = interp.symbols.insert(Symbol {
        name: name_id,
        rc: 1,
        bindings: Vec::new(),
    });
    interp.symbols.partitions[part].insert(name.into(), id);
    Ref::Symbol(id)
}

/// The symbol's name bytes, lossily decoded for diagnostics.
pub fn symbol_name_lossy(interp: &Interp, id: SymId) -> String {
    let name = interp.symbols.get(id).name;
    String::from_utf8_lossy(&interp.strings.get(name).bytes).into_owned()
}

/// Index of the binding with the greatest frame index `<= start_frame`.
fn find_binding(sym: &Symbol, start_frame: usize) -> Option<usize> {
    sym.bindings.iter().rposition(|b| b.frame <= start_frame)
}

/// Insert or replace the cache entry for `frame`, preserving sort order.
pub fn symbol_let(interp: &mut Interp, symbol: Ref, value: Ref, frame: usize) {
    let Ref::Symbol(id) = symbol else {
        tracing::error!("symbol_let called with a non-symbol");
        return;
    };
    let sym = interp.symbols.get_mut(id);
    match find_binding(sym, frame) {
        Some(idx) if sym.bindings[idx].frame == frame => {
            sym.bindings[idx].value = value;
        }
        Some(idx) => {
            sym.bindings.insert(idx + 1, Binding { value, frame });
        }
        None => {
            sym.bindings.insert(0, Binding { value, frame });
        }
    }
}

/// Overwrite the binding visible from `start_frame`. Error if unbound there.
pub fn symbol_set(interp: &mut Interp, symbol: Ref, value: Ref, start_frame: usize) {
    let Ref::Symbol(id) = symbol else {
        tracing::error!("symbol_set called with a non-symbol");
        return;
    };
    let sym = interp.symbols.get_mut(id);
    match find_binding(sym, start_frame) {
        Some(idx) => sym.bindings[idx].value = value,
        None => {
            tracing::error!(
                symbol = %symbol_name_lossy(interp, id),
                "attempting to rebind an unbound symbol"
            );
        }
    }
}

/// Remove the cache entry for exactly `frame`, if present.
pub fn symbol_unset(interp: &mut Interp, symbol: Ref, frame: usize) {
    let Ref::Symbol(id) = symbol else {
        tracing::error!("symbol_unset called with a non-symbol");
        return;
    };
    let sym = interp.symbols.get_mut(id);
    if let Some(idx) = find_binding(sym, frame) {
        if sym.bindings[idx].frame == frame {
            sym.bindings.remove(idx);
        }
    }
}

// --- traits ----------------------------------------------------------------

fn symbol_eval(interp: &mut Interp, instance: Ref, _context: Ref) -> Ref {
    let Ref::Symbol(id) = instance else {
        return Ref::Nil;
    };
    interp.stats.symbol_evals += 1;
    match interp.symbols.get(id).bindings.last().map(|b| b.value) {
        Some(value) => clone_ref(interp, value),
        None => {
            tracing::error!(symbol = %symbol_name_lossy(interp, id), "unbound symbol");
            Ref::Nil
        }
    }
}

const SYMBOL_PUNCT: &[u8] = b"_-+*/%^$!&=<>?~@:;";

/// Whether the name prints unquoted: a letter or punctuation lead byte,
/// then letters, digits and punctuation.
fn is_safe_name(bytes: &[u8]) -> bool {
    let Some((&first, rest)) = bytes.split_first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || SYMBOL_PUNCT.contains(&first)) {
        return false;
    }
    rest.iter()
        .all(|&c| c.is_ascii_alphanumeric() || SYMBOL_PUNCT.contains(&c))
}

fn symbol_print(interp: &Interp, r: Ref, out: &mut String) {
    let Ref::Symbol(id) = r else { return };
    let name = interp.symbols.get(id).name;
    let bytes = &interp.strings.get(name).bytes;
    if is_safe_name(bytes) {
        // Safe names are ASCII by construction.
        out.push_str(&String::from_utf8_lossy(bytes));
    } else {
        push_escaped(out, bytes, b'|');
    }
}

fn symbol_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    make_symbol(interp, b"symbol")
}

fn symbol_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Symbol(x), Ref::Symbol(y)) if x == y)
}

fn symbol_addref(interp: &mut Interp, r: Ref) {
    if let Ref::Symbol(id) = r {
        interp.symbols.get_mut(id).rc += 1;
    }
}

fn symbol_release(interp: &mut Interp, r: Ref) {
    let Ref::Symbol(id) = r else { return };
    {
        let sym = interp.symbols.get_mut(id);
        sym.rc -= 1;
        if sym.rc != 0 {
            return;
        }
    }
    // Last count: unintern, then drop the record. The binding cache holds
    // no counts, so only the name string needs releasing.
    let sym = interp.symbols.remove(id);
    {
        let Interp {
            symbols, strings, ..
        } = interp;
        let name = strings.get(sym.name);
        let part = (name.hash as usize) % SYMBOL_PARTITIONS;
        symbols.partitions[part].remove(&name.bytes[..]);
    }
    interp.strings.release(sym.name);
}

pub static SYMBOL_TRAITS: Traits = Traits {
    eval: Some(symbol_eval),
    execute: None,
    print: Some(symbol_print),
    type_name: Some(symbol_type_name),
    eq: Some(symbol_eq),
    eql: Some(symbol_eq),
    addref: Some(symbol_addref),
    release: Some(symbol_release),
    gc_mark: None,
    gc_release_refs: None,
    gc_free_mem: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn binding_frames(sym: &Symbol) -> Vec<usize> {
        sym.bindings.iter().map(|b| b.frame).collect()
    }

    #[test]
    fn binding_stack_stays_sorted() {
        let mut interp = Interp::new();
        let s = make_symbol(&mut interp, b"probe");
        let Ref::Symbol(id) = s else { unreachable!() };

        symbol_let(&mut interp, s, Ref::Int(1), 3);
        symbol_let(&mut interp, s, Ref::Int(2), 1);
        symbol_let(&mut interp, s, Ref::Int(3), 2);
        assert_eq!(binding_frames(interp.symbols.get(id)), vec![1, 2, 3]);

        // Re-binding an existing frame replaces in place.
        symbol_let(&mut interp, s, Ref::Int(9), 2);
        assert_eq!(binding_frames(interp.symbols.get(id)), vec![1, 2, 3]);
        assert!(matches!(interp.symbols.get(id).bindings[1].value, Ref::Int(9)));
    }

    #[test]
    fn set_overwrites_deepest_applicable_frame() {
        let mut interp = Interp::new();
        let s = make_symbol(&mut interp, b"probe");
        let Ref::Symbol(id) = s else { unreachable!() };

        symbol_let(&mut interp, s, Ref::Int(1), 1);
        symbol_let(&mut interp, s, Ref::Int(2), 4);
        symbol_set(&mut interp, s, Ref::Int(7), 3);
        assert!(matches!(interp.symbols.get(id).bindings[0].value, Ref::Int(7)));
        assert!(matches!(interp.symbols.get(id).bindings[1].value, Ref::Int(2)));
    }

    #[test]
    fn unset_removes_exact_frame_only() {
        let mut interp = Interp::new();
        let s = make_symbol(&mut interp, b"probe");
        let Ref::Symbol(id) = s else { unreachable!() };

        symbol_let(&mut interp, s, Ref::Int(1), 1);
        symbol_let(&mut interp, s, Ref::Int(2), 2);
        symbol_unset(&mut interp, s, 3);
        assert_eq!(binding_frames(interp.symbols.get(id)), vec![1, 2]);
        symbol_unset(&mut interp, s, 2);
        assert_eq!(binding_frames(interp.symbols.get(id)), vec![1]);
    }

    #[test]
    fn interning_is_content_addressed() {
        let mut interp = Interp::new();
        let a = make_symbol(&mut interp, b"shared");
        let b = make_symbol(&mut interp, b"shared");
        let c = make_symbol(&mut interp, b"other");
        assert!(symbol_eq(&interp, a, b));
        assert!(!symbol_eq(&interp, a, c));
    }

    #[test]
    fn safe_names_print_bare() {
        assert!(is_safe_name(b"foo"));
        assert!(is_safe_name(b"set-car!"));
        assert!(is_safe_name(b"+"));
        assert!(!is_safe_name(b"1+"));
        assert!(!is_safe_name(b"has space"));
        assert!(!is_safe_name(b""));
    }
}
