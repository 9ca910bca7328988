//! Cons cells and list plumbing.

use crate::gc::{ObjKind, gc_traits_addref, gc_traits_release};
use crate::interp::Interp;
use crate::value::{ObjId, ObjTag, Ref, add_ref, clone_ref, print_into, ref_gc_mark, release_ref};

/// Allocate a pair. A pair of two nils is the nil singleton, never a heap
/// object.
pub fn make_cons(interp: &mut Interp, car: Ref, cdr: Ref) -> Ref {
    if car.is_nil() && cdr.is_nil() {
        return Ref::Nil;
    }
    add_ref(interp, car);
    add_ref(interp, cdr);
    let id = interp.heap.alloc(ObjKind::Cons { car, cdr });
    Ref::Obj(ObjTag::Cons, id)
}

fn fields(interp: &Interp, id: ObjId) -> (Ref, Ref) {
    match &interp.heap.get(id).kind {
        ObjKind::Cons { car, cdr } => (*car, *cdr),
        _ => (Ref::Nil, Ref::Nil),
    }
}

/// Head of a pair; nil for anything that is not a pair.
pub fn car(interp: &mut Interp, val: Ref) -> Ref {
    let Ref::Obj(ObjTag::Cons, id) = val else {
        return Ref::Nil;
    };
    let (car, _) = fields(interp, id);
    clone_ref(interp, car)
}

/// Tail of a pair; nil for anything that is not a pair.
pub fn cdr(interp: &mut Interp, val: Ref) -> Ref {
    let Ref::Obj(ObjTag::Cons, id) = val else {
        return Ref::Nil;
    };
    let (_, cdr) = fields(interp, id);
    clone_ref(interp, cdr)
}

pub fn cadr(interp: &mut Interp, l: Ref) -> Ref {
    let ldr = cdr(interp, l);
    let ladr = car(interp, ldr);
    release_ref(interp, ldr);
    ladr
}

pub fn caddr(interp: &mut Interp, l: Ref) -> Ref {
    let ldr = cdr(interp, l);
    let lddr = cdr(interp, ldr);
    release_ref(interp, ldr);
    let laddr = car(interp, lddr);
    release_ref(interp, lddr);
    laddr
}

pub fn caar(interp: &mut Interp, l: Ref) -> Ref {
    let lar = car(interp, l);
    let laar = car(interp, lar);
    release_ref(interp, lar);
    laar
}

pub fn cadar(interp: &mut Interp, l: Ref) -> Ref {
    let lar = car(interp, l);
    let ladar = cadr(interp, lar);
    release_ref(interp, lar);
    ladar
}

/// `(a b)`
pub fn list2(interp: &mut Interp, a: Ref, b: Ref) -> Ref {
    let ldr = make_cons(interp, b, Ref::Nil);
    let cons = make_cons(interp, a, ldr);
    release_ref(interp, ldr);
    cons
}

/// `(a b c)`
pub fn list3(interp: &mut Interp, a: Ref, b: Ref, c: Ref) -> Ref {
    let ldr = list2(interp, b, c);
    let cons = make_cons(interp, a, ldr);
    release_ref(interp, ldr);
    cons
}

/// A proper list of the given elements.
pub fn list_from_slice(interp: &mut Interp, refs: &[Ref]) -> Ref {
    let Some((&first, rest)) = refs.split_first() else {
        return Ref::Nil;
    };
    let ldr = list_from_slice(interp, rest);
    let cons = make_cons(interp, first, ldr);
    release_ref(interp, ldr);
    cons
}

// --- traits ----------------------------------------------------------------

/// Evaluating a pair applies its head to its tail. A head that already
/// carries `execute` is applied to the unevaluated tail. A head that only
/// evaluates is evaluated once and the form retried with the result, which
/// lets the head position hold an expression computing a callable.
fn cons_eval(interp: &mut Interp, instance: Ref, context: Ref) -> Ref {
    if interp.trace_enabled() {
        tracing::trace!(form = %crate::value::print_to_string(interp, instance), "eval form");
    }

    let lar = car(interp, instance);
    let result = match lar.traits() {
        None => {
            tracing::error!("cannot evaluate a form with a nil head");
            Ref::Nil
        }
        Some(t) => {
            if let Some(exec) = t.execute {
                let args = cdr(interp, instance);
                let r = exec(interp, lar, args, context);
                release_ref(interp, args);
                r
            } else if t.eval.is_some() {
                let new_lar = crate::eval::eval(interp, lar, context);
                let ldr = cdr(interp, instance);
                let new_cons = make_cons(interp, new_lar, ldr);
                release_ref(interp, new_lar);
                release_ref(interp, ldr);
                let r = crate::eval::eval(interp, new_cons, context);
                release_ref(interp, new_cons);
                r
            } else {
                tracing::error!("head of form is neither callable nor evaluable");
                Ref::Nil
            }
        }
    };
    release_ref(interp, lar);
    result
}

fn cons_print(interp: &Interp, r: Ref, out: &mut String) {
    let Ref::Obj(ObjTag::Cons, mut id) = r else {
        return;
    };
    out.push('(');
    loop {
        let (car, cdr) = fields(interp, id);
        print_into(interp, car, out);
        match cdr {
            Ref::Nil => break,
            Ref::Obj(ObjTag::Cons, next) => {
                out.push(' ');
                id = next;
            }
            tail => {
                out.push_str(" . ");
                print_into(interp, tail, out);
                break;
            }
        }
    }
    out.push(')');
}

fn cons_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"cons")
}

fn cons_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Obj(ObjTag::Cons, x), Ref::Obj(ObjTag::Cons, y)) if x == y)
}

fn cons_eql(interp: &Interp, a: Ref, b: Ref) -> bool {
    let (Ref::Obj(ObjTag::Cons, x), Ref::Obj(ObjTag::Cons, y)) = (a, b) else {
        return false;
    };
    let (ax, dx) = fields(interp, x);
    let (ay, dy) = fields(interp, y);
    crate::eval::eql(interp, ax, ay) && crate::eval::eql(interp, dx, dy)
}

fn cons_gc_mark(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let (car, cdr) = fields(interp, id);
    ref_gc_mark(interp, car);
    ref_gc_mark(interp, cdr);
}

fn cons_gc_release_refs(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let taken = {
        let obj = interp.heap.get_mut(id);
        match &mut obj.kind {
            ObjKind::Cons { car, cdr } => Some((
                std::mem::replace(car, Ref::Nil),
                std::mem::replace(cdr, Ref::Nil),
            )),
            _ => None,
        }
    };
    if let Some((car, cdr)) = taken {
        release_ref(interp, car);
        release_ref(interp, cdr);
    }
}

fn cons_gc_free_mem(interp: &mut Interp, r: Ref) {
    if let Ref::Obj(_, id) = r {
        interp.heap.free_slot(id);
    }
}

pub static CONS_TRAITS: crate::value::Traits = crate::value::Traits {
    eval: Some(cons_eval),
    execute: None,
    print: Some(cons_print),
    type_name: Some(cons_type_name),
    eq: Some(cons_eq),
    eql: Some(cons_eql),
    addref: Some(gc_traits_addref),
    release: Some(gc_traits_release),
    gc_mark: Some(cons_gc_mark),
    gc_release_refs: Some(cons_gc_release_refs),
    gc_free_mem: Some(cons_gc_free_mem),
};
