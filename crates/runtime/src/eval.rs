//! The evaluator's entry points.
//!
//! `eval` first enters the target environment as the current stack, then
//! dispatches through the value's `eval` capability; values without one are
//! self-evaluating. All the interesting work happens in the per-type trait
//! functions: symbols read their binding cache, pairs apply their head.

use crate::cons::{car, cdr, make_cons};
use crate::interp::Interp;
use crate::stack::{stack_enter, stack_let};
use crate::value::{ObjTag, Ref, clone_ref, release_ref};

/// Identity: the same heap object, or the same atom value.
pub fn eq(interp: &Interp, a: Ref, b: Ref) -> bool {
    if !a.same_type(b) {
        return false;
    }
    if a.is_nil() {
        return true;
    }
    match a.traits().and_then(|t| t.eq) {
        Some(f) => f(interp, a, b),
        None => false,
    }
}

/// Structural equality, recursing into compound values.
pub fn eql(interp: &Interp, a: Ref, b: Ref) -> bool {
    if !a.same_type(b) {
        return false;
    }
    if a.is_nil() {
        return true;
    }
    match a.traits().and_then(|t| t.eql) {
        Some(f) => f(interp, a, b),
        None => false,
    }
}

/// Dispatch a callable on `args` in `assoc`; nil with a diagnostic for
/// anything that does not execute.
pub fn call(interp: &mut Interp, exec: Ref, args: Ref, assoc: Ref) -> Ref {
    match exec.traits().and_then(|t| t.execute) {
        Some(f) => f(interp, exec, args, assoc),
        None => {
            tracing::error!("call: target is not callable");
            Ref::Nil
        }
    }
}

/// Evaluate each element of a list, left to right, into a fresh list.
pub fn map_eval(interp: &mut Interp, l: Ref, assoc: Ref) -> Ref {
    if l.is_nil() {
        return Ref::Nil;
    }

    let lar = car(interp, l);
    let elar = eval(interp, lar, assoc);
    release_ref(interp, lar);

    let ldr = cdr(interp, l);
    let eldr = map_eval(interp, ldr, assoc);
    release_ref(interp, ldr);

    let cons = make_cons(interp, elar, eldr);
    release_ref(interp, elar);
    release_ref(interp, eldr);
    cons
}

/// Bind parameter names to argument values in the top frame of `frame`.
/// Missing actuals bind nil; excess actuals are dropped. A dotted tail name
/// binds the remaining actuals as a list.
pub fn map_let(interp: &mut Interp, frame: Ref, names: Ref, vals: Ref) {
    if !matches!(frame, Ref::Obj(ObjTag::Stack, _)) {
        tracing::error!("map_let: target is not a stack");
        return;
    }
    if names.is_nil() {
        return;
    }
    if !names.is_cons() {
        // Dotted parameter list: the tail name takes the rest.
        stack_let(interp, frame, names, vals);
        return;
    }

    let nar = car(interp, names);
    let var = car(interp, vals);
    stack_let(interp, frame, nar, var);
    release_ref(interp, nar);
    release_ref(interp, var);

    let ndr = cdr(interp, names);
    let vdr = cdr(interp, vals);
    map_let(interp, frame, ndr, vdr);
    release_ref(interp, ndr);
    release_ref(interp, vdr);
}

/// Evaluate `e` in environment `a`. The environment becomes the current
/// stack before dispatch, so symbol lookups see exactly its bindings.
pub fn eval(interp: &mut Interp, e: Ref, a: Ref) -> Ref {
    stack_enter(interp, a);
    match e.traits().and_then(|t| t.eval) {
        Some(f) => f(interp, e, a),
        None => clone_ref(interp, e),
    }
}
