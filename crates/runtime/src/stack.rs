//! Environment stacks and the current-stack switching protocol.
//!
//! A stack owns an ordered vector of frame handles, leaf frame at the back,
//! plus a counted parent handle. Creating a stack from a parent shares the
//! parent's frames and appends one fresh frame, so sibling environments
//! share their common prefix.
//!
//! One stack per interpreter is *current*: its bindings are mirrored into
//! the symbol caches. Entering another stack diffs the two frame sequences,
//! pops cache entries for the old stack's unshared suffix and pushes entries
//! for the new one's, giving O(delta frames) switching and O(1) lookup.
//! Writes through a non-current stack mirror into the caches only when the
//! touched frame is visible from the current stack.

use std::fmt::Write;

use crate::frame::{
    frame_debug_print, frame_find, frame_pop_bindings, frame_push_bindings,
    frame_replace_slot_value, make_stack_frame,
};
use crate::gc::{ObjKind, gc_add_ref, gc_release_ref, gc_traits_addref, gc_traits_release};
use crate::interp::Interp;
use crate::symbol::{symbol_let, symbol_set};
use crate::value::{ObjId, ObjTag, Ref, Traits, clone_ref, ref_gc_mark, release_ref};

/// Create a stack with count 1: the parent's frames (shared, counted) plus
/// one fresh empty frame; or a single fresh frame when parent is nil.
pub fn make_stack(interp: &mut Interp, parent: Ref) -> Ref {
    let (parent, mut frames) = match parent {
        Ref::Nil => (Ref::Nil, Vec::new()),
        Ref::Obj(ObjTag::Stack, pid) => {
            let frames = stack_frames(interp, pid);
            for &f in &frames {
                gc_add_ref(interp, f);
            }
            (clone_ref(interp, parent), frames)
        }
        _ => {
            tracing::error!("make_stack: parent is not a stack");
            return Ref::Nil;
        }
    };
    frames.push(make_stack_frame(interp));
    let id = interp.heap.alloc(ObjKind::Stack { parent, frames });
    Ref::Obj(ObjTag::Stack, id)
}

pub(crate) fn stack_frames(interp: &Interp, id: ObjId) -> Vec<ObjId> {
    match &interp.heap.get(id).kind {
        ObjKind::Stack { frames, .. } => frames.clone(),
        _ => Vec::new(),
    }
}

fn top_frame(interp: &Interp, id: ObjId) -> Option<ObjId> {
    match &interp.heap.get(id).kind {
        ObjKind::Stack { frames, .. } => frames.last().copied(),
        _ => None,
    }
}

/// Frame index of `frame` as seen from the current stack, searching from
/// the leaf; `None` when the frame is not visible.
fn current_index_of(interp: &Interp, frame: ObjId) -> Option<usize> {
    let current = interp.current_stack?;
    match &interp.heap.get(current).kind {
        ObjKind::Stack { frames, .. } => frames.iter().rposition(|&f| f == frame),
        _ => None,
    }
}

/// Bind or rebind `name` in the top frame of `stack`.
pub fn stack_let(interp: &mut Interp, stack: Ref, name: Ref, val: Ref) {
    let Ref::Obj(ObjTag::Stack, sid) = stack else {
        tracing::error!("stack_let: target is not a stack");
        return;
    };
    if !matches!(name, Ref::Symbol(_)) {
        tracing::error!("stack_let: name is not a symbol");
        return;
    }
    let Some(frame) = top_frame(interp, sid) else {
        tracing::error!("stack_let: stack has no frames");
        return;
    };
    let Some(idx) = frame_find(interp, frame, name, true) else {
        return;
    };
    let newval = clone_ref(interp, val);
    let old = frame_replace_slot_value(interp, frame, idx, newval);
    release_ref(interp, old);

    let frame_id = if interp.current_stack == Some(sid) {
        Some(stack_frames(interp, sid).len() - 1)
    } else {
        current_index_of(interp, frame)
    };
    if let Some(fid) = frame_id {
        symbol_let(interp, name, val, fid);
    }
}

/// Rebind `name` wherever it is already bound in `stack`, leaf frame first.
/// Error if it is bound nowhere in the stack.
pub fn stack_set(interp: &mut Interp, stack: Ref, name: Ref, val: Ref) {
    let Ref::Obj(ObjTag::Stack, sid) = stack else {
        tracing::error!("stack_set: target is not a stack");
        return;
    };
    if !matches!(name, Ref::Symbol(_)) {
        tracing::error!("stack_set: name is not a symbol");
        return;
    }

    let frames = stack_frames(interp, sid);
    for (fi, &frame) in frames.iter().enumerate().rev() {
        let Some(idx) = frame_find(interp, frame, name, false) else {
            continue;
        };
        let newval = clone_ref(interp, val);
        let old = frame_replace_slot_value(interp, frame, idx, newval);
        release_ref(interp, old);

        let frame_id = if interp.current_stack == Some(sid) {
            Some(fi)
        } else {
            current_index_of(interp, frame)
        };
        if let Some(fid) = frame_id {
            symbol_set(interp, name, val, fid);
        }
        return;
    }

    tracing::error!("stack_set: symbol is not bound in this environment");
}

/// Make `stack` the current stack, reconciling the symbol caches.
pub fn stack_enter(interp: &mut Interp, stack: Ref) {
    match stack {
        Ref::Nil => enter(interp, None),
        Ref::Obj(ObjTag::Stack, id) => enter(interp, Some(id)),
        _ => tracing::error!("stack_enter: target is not a stack"),
    }
}

fn enter(interp: &mut Interp, new: Option<ObjId>) {
    if new == interp.current_stack {
        return;
    }

    let old_frames = interp
        .current_stack
        .map(|id| stack_frames(interp, id))
        .unwrap_or_default();
    let new_frames = new.map(|id| stack_frames(interp, id)).unwrap_or_default();

    let num_common = old_frames
        .iter()
        .zip(&new_frames)
        .take_while(|(a, b)| a == b)
        .count();

    // Wipe bindings above the shared prefix in the old stack, leaf first.
    for fid in (num_common..old_frames.len()).rev() {
        frame_pop_bindings(interp, old_frames[fid], fid);
    }
    // Expose bindings above the shared prefix in the new stack.
    for (fid, &frame) in new_frames.iter().enumerate().skip(num_common) {
        frame_push_bindings(interp, frame, fid);
    }

    if let Some(id) = new {
        gc_add_ref(interp, id);
    }
    interp.stats.stack_switches += 1;
    let old = interp.current_stack;
    interp.current_stack = new;
    if let Some(id) = old {
        gc_release_ref(interp, id);
    }
}

/// Collector hook: the current stack is always a root.
pub fn stack_gc_mark_root(interp: &mut Interp) {
    if let Some(id) = interp.current_stack {
        crate::gc::mark_object(interp, id);
    }
}

pub fn stack_debug_print(interp: &Interp, id: ObjId) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "### stack {}:", id.0);
    for frame in stack_frames(interp, id).into_iter().rev() {
        frame_debug_print(interp, frame, &mut out);
    }
    out.push_str("#################\n");
    out
}

// --- traits ----------------------------------------------------------------

fn stack_print(_interp: &Interp, r: Ref, out: &mut String) {
    if let Ref::Obj(ObjTag::Stack, id) = r {
        let _ = write!(out, "#<stack {}>", id.0);
    }
}

fn stack_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"stack")
}

fn stack_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Obj(ObjTag::Stack, x), Ref::Obj(ObjTag::Stack, y)) if x == y)
}

fn stack_gc_mark(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let (parent, frames) = match &interp.heap.get(id).kind {
        ObjKind::Stack { parent, frames } => (*parent, frames.clone()),
        _ => return,
    };
    for frame in frames {
        crate::gc::mark_object(interp, frame);
    }
    ref_gc_mark(interp, parent);
}

fn stack_gc_release_refs(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let taken = {
        let obj = interp.heap.get_mut(id);
        match &mut obj.kind {
            ObjKind::Stack { parent, frames } => Some((
                std::mem::replace(parent, Ref::Nil),
                std::mem::take(frames),
            )),
            _ => None,
        }
    };
    if let Some((parent, frames)) = taken {
        for frame in frames {
            gc_release_ref(interp, frame);
        }
        release_ref(interp, parent);
    }
}

fn stack_gc_free_mem(interp: &mut Interp, r: Ref) {
    if let Ref::Obj(_, id) = r {
        interp.heap.free_slot(id);
    }
}

pub static STACK_TRAITS: Traits = Traits {
    eval: None,
    execute: None,
    print: Some(stack_print),
    type_name: Some(stack_type_name),
    eq: Some(stack_eq),
    eql: Some(stack_eq),
    addref: Some(gc_traits_addref),
    release: Some(gc_traits_release),
    gc_mark: Some(stack_gc_mark),
    gc_release_refs: Some(stack_gc_release_refs),
    gc_free_mem: Some(stack_gc_free_mem),
};
