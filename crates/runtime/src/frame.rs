//! Stack frames: the lexical unit of scope.
//!
//! A frame is a small linear map from symbol to value. Interning makes
//! symbol identity the right equality, so lookup is a scan comparing
//! handles. Frames hold counted references to both symbol and value; the
//! symbol binding caches mirror them without counts.

use std::fmt::Write;

use crate::gc::{ObjKind, gc_traits_addref, gc_traits_release};
use crate::interp::Interp;
use crate::symbol::{symbol_let, symbol_unset};
use crate::value::{ObjId, Ref, Traits, clone_ref, print_into, ref_gc_mark, release_ref};

/// One binding slot. Both references are strong.
pub struct FrameSlot {
    pub symbol: Ref,
    pub value: Ref,
}

/// Allocate an empty frame with count 1.
pub fn make_stack_frame(interp: &mut Interp) -> ObjId {
    interp.heap.alloc(ObjKind::Frame { slots: Vec::new() })
}

fn slots(interp: &Interp, frame: ObjId) -> &[FrameSlot] {
    match &interp.heap.get(frame).kind {
        ObjKind::Frame { slots } => slots,
        _ => &[],
    }
}

fn same_symbol(a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Symbol(x), Ref::Symbol(y)) if x == y)
}

/// Index of `name`'s slot. With `insert`, a missing name gets a fresh slot
/// bound to nil.
pub fn frame_find(interp: &mut Interp, frame: ObjId, name: Ref, insert: bool) -> Option<usize> {
    let found = slots(interp, frame)
        .iter()
        .position(|s| same_symbol(s.symbol, name));
    if found.is_some() || !insert {
        return found;
    }

    let symbol = clone_ref(interp, name);
    let obj = interp.heap.get_mut(frame);
    let ObjKind::Frame { slots } = &mut obj.kind else {
        return None;
    };
    slots.push(FrameSlot {
        symbol,
        value: Ref::Nil,
    });
    Some(slots.len() - 1)
}

pub fn frame_slot_value(interp: &Interp, frame: ObjId, idx: usize) -> Ref {
    slots(interp, frame)[idx].value
}

/// Store `value` into a slot, handing its previous value back to the caller
/// for release.
pub fn frame_replace_slot_value(interp: &mut Interp, frame: ObjId, idx: usize, value: Ref) -> Ref {
    let obj = interp.heap.get_mut(frame);
    match &mut obj.kind {
        ObjKind::Frame { slots } => std::mem::replace(&mut slots[idx].value, value),
        _ => Ref::Nil,
    }
}

/// Remove this frame's bindings from the symbol caches at `use_id`, deepest
/// slot first.
pub fn frame_pop_bindings(interp: &mut Interp, frame: ObjId, use_id: usize) {
    let symbols: Vec<Ref> = slots(interp, frame).iter().map(|s| s.symbol).collect();
    for symbol in symbols.into_iter().rev() {
        symbol_unset(interp, symbol, use_id);
    }
}

/// Mirror this frame's bindings into the symbol caches at `use_id`.
pub fn frame_push_bindings(interp: &mut Interp, frame: ObjId, use_id: usize) {
    let pairs: Vec<(Ref, Ref)> = slots(interp, frame)
        .iter()
        .map(|s| (s.symbol, s.value))
        .collect();
    for (symbol, value) in pairs {
        symbol_let(interp, symbol, value, use_id);
    }
}

pub fn frame_debug_print(interp: &Interp, frame: ObjId, out: &mut String) {
    let _ = writeln!(out, "### frame {}:", frame.0);
    for slot in slots(interp, frame) {
        print_into(interp, slot.symbol, out);
        out.push_str(" -> ");
        print_into(interp, slot.value, out);
        out.push('\n');
    }
}

// --- traits ----------------------------------------------------------------

fn frame_gc_mark(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let pairs: Vec<(Ref, Ref)> = slots(interp, id)
        .iter()
        .map(|s| (s.symbol, s.value))
        .collect();
    for (symbol, value) in pairs {
        ref_gc_mark(interp, symbol);
        ref_gc_mark(interp, value);
    }
}

fn frame_gc_release_refs(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let taken = {
        let obj = interp.heap.get_mut(id);
        match &mut obj.kind {
            ObjKind::Frame { slots } => std::mem::take(slots),
            _ => Vec::new(),
        }
    };
    for slot in taken {
        release_ref(interp, slot.symbol);
        release_ref(interp, slot.value);
    }
}

fn frame_gc_free_mem(interp: &mut Interp, r: Ref) {
    if let Ref::Obj(_, id) = r {
        interp.heap.free_slot(id);
    }
}

// Frames are a hidden type: no print, no name, no equality.
pub static FRAME_TRAITS: Traits = Traits {
    eval: None,
    execute: None,
    print: None,
    type_name: None,
    eq: None,
    eql: None,
    addref: Some(gc_traits_addref),
    release: Some(gc_traits_release),
    gc_mark: Some(frame_gc_mark),
    gc_release_refs: Some(frame_gc_release_refs),
    gc_free_mem: Some(frame_gc_free_mem),
};
