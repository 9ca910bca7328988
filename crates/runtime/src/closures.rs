//! The three callable variants: raw closure, function, macro.
//!
//! All three share the same storage and the same `apply`: build a child
//! environment of the captured one, bind formals to actuals, evaluate the
//! body there. They differ only in their `execute` policy:
//!
//! - raw closure: arguments unevaluated, result returned as-is
//! - function: arguments evaluated in the caller's environment, result as-is
//! - macro: arguments unevaluated, result re-evaluated in the caller's
//!   environment

use crate::eval::{eval, map_eval, map_let};
use crate::gc::{ClosureVariant, ObjKind, gc_traits_addref, gc_traits_release};
use crate::interp::Interp;
use crate::stack::make_stack;
use crate::value::{ObjTag, Ref, Traits, add_ref, print_into, ref_gc_mark, release_ref};

fn make_callable(
    interp: &mut Interp,
    params: Ref,
    code: Ref,
    env: Ref,
    variant: ClosureVariant,
) -> Ref {
    if !matches!(env, Ref::Obj(ObjTag::Stack, _)) {
        tracing::error!("closure environment is not a stack");
        return Ref::Nil;
    }
    add_ref(interp, params);
    add_ref(interp, code);
    add_ref(interp, env);
    let tag = match variant {
        ClosureVariant::Raw => ObjTag::Closure,
        ClosureVariant::Function => ObjTag::Function,
        ClosureVariant::Macro => ObjTag::Macro,
    };
    let id = interp.heap.alloc(ObjKind::Closure {
        variant,
        params,
        code,
        env,
    });
    Ref::Obj(tag, id)
}

pub fn make_closure(interp: &mut Interp, params: Ref, code: Ref, env: Ref) -> Ref {
    make_callable(interp, params, code, env, ClosureVariant::Raw)
}

pub fn make_function(interp: &mut Interp, params: Ref, code: Ref, env: Ref) -> Ref {
    make_callable(interp, params, code, env, ClosureVariant::Function)
}

pub fn make_macro(interp: &mut Interp, params: Ref, code: Ref, env: Ref) -> Ref {
    make_callable(interp, params, code, env, ClosureVariant::Macro)
}

/// `(params, code, env)` of a callable; `None` for anything else. The
/// returned references borrow the callable's counts.
pub fn closure_parts(interp: &Interp, r: Ref) -> Option<(Ref, Ref, Ref)> {
    let Ref::Obj(ObjTag::Closure | ObjTag::Function | ObjTag::Macro, id) = r else {
        return None;
    };
    match &interp.heap.get(id).kind {
        ObjKind::Closure {
            params, code, env, ..
        } => Some((*params, *code, *env)),
        _ => None,
    }
}

/// Evaluate a callable's body against `args`, evaluating neither the
/// arguments nor the result. The per-variant policies live in `execute`.
pub fn apply(interp: &mut Interp, func: Ref, args: Ref) -> Ref {
    let Some((params, code, env)) = closure_parts(interp, func) else {
        tracing::error!("apply: target is not a closure, function or macro");
        return Ref::Nil;
    };

    let param_frame = make_stack(interp, env);
    map_let(interp, param_frame, params, args);
    let result = eval(interp, code, param_frame);
    release_ref(interp, param_frame);
    result
}

// --- traits ----------------------------------------------------------------

fn closure_execute(interp: &mut Interp, instance: Ref, args: Ref, _ctx: Ref) -> Ref {
    if interp.trace_enabled() {
        tracing::trace!(
            callee = %crate::value::print_to_string(interp, instance),
            args = %crate::value::print_to_string(interp, args),
            "call closure"
        );
    }
    apply(interp, instance, args)
}

fn function_execute(interp: &mut Interp, instance: Ref, args: Ref, ctx: Ref) -> Ref {
    let fn_args = map_eval(interp, args, ctx);
    if interp.trace_enabled() {
        tracing::trace!(
            callee = %crate::value::print_to_string(interp, instance),
            args = %crate::value::print_to_string(interp, fn_args),
            "call function"
        );
    }
    let result = apply(interp, instance, fn_args);
    release_ref(interp, fn_args);
    result
}

fn macro_execute(interp: &mut Interp, instance: Ref, args: Ref, ctx: Ref) -> Ref {
    if interp.trace_enabled() {
        tracing::trace!(
            callee = %crate::value::print_to_string(interp, instance),
            args = %crate::value::print_to_string(interp, args),
            "call macro"
        );
    }
    let code = apply(interp, instance, args);
    let result = eval(interp, code, ctx);
    release_ref(interp, code);
    result
}

fn print_contents(interp: &Interp, r: Ref, out: &mut String) {
    if let Some((params, code, env)) = closure_parts(interp, r) {
        print_into(interp, params, out);
        out.push(' ');
        print_into(interp, code, out);
        out.push(' ');
        print_into(interp, env, out);
    }
}

fn closure_print(interp: &Interp, r: Ref, out: &mut String) {
    out.push_str("#<closure ");
    print_contents(interp, r, out);
    out.push('>');
}

fn function_print(interp: &Interp, r: Ref, out: &mut String) {
    out.push_str("#<function ");
    print_contents(interp, r, out);
    out.push('>');
}

fn macro_print(interp: &Interp, r: Ref, out: &mut String) {
    out.push_str("#<macro ");
    print_contents(interp, r, out);
    out.push('>');
}

fn closure_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"closure")
}

fn function_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"function")
}

fn macro_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"macro")
}

fn closure_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Obj(_, x), Ref::Obj(_, y)) if x == y)
}

fn closure_eql(interp: &Interp, a: Ref, b: Ref) -> bool {
    let (Some((pa, ca, ea)), Some((pb, cb, eb))) =
        (closure_parts(interp, a), closure_parts(interp, b))
    else {
        return false;
    };
    crate::eval::eql(interp, pa, pb)
        && crate::eval::eql(interp, ca, cb)
        && crate::eval::eql(interp, ea, eb)
}

fn closure_gc_mark(interp: &mut Interp, r: Ref) {
    if let Some((params, code, env)) = closure_parts(interp, r) {
        ref_gc_mark(interp, params);
        ref_gc_mark(interp, code);
        ref_gc_mark(interp, env);
    }
}

fn closure_gc_release_refs(interp: &mut Interp, r: Ref) {
    let Ref::Obj(_, id) = r else { return };
    let taken = {
        let obj = interp.heap.get_mut(id);
        match &mut obj.kind {
            ObjKind::Closure {
                params, code, env, ..
            } => Some((
                std::mem::replace(params, Ref::Nil),
                std::mem::replace(code, Ref::Nil),
                std::mem::replace(env, Ref::Nil),
            )),
            _ => None,
        }
    };
    if let Some((params, code, env)) = taken {
        release_ref(interp, params);
        release_ref(interp, code);
        release_ref(interp, env);
    }
}

fn closure_gc_free_mem(interp: &mut Interp, r: Ref) {
    if let Ref::Obj(_, id) = r {
        interp.heap.free_slot(id);
    }
}

pub static CLOSURE_TRAITS: Traits = Traits {
    eval: None,
    execute: Some(closure_execute),
    print: Some(closure_print),
    type_name: Some(closure_type_name),
    eq: Some(closure_eq),
    eql: Some(closure_eql),
    addref: Some(gc_traits_addref),
    release: Some(gc_traits_release),
    gc_mark: Some(closure_gc_mark),
    gc_release_refs: Some(closure_gc_release_refs),
    gc_free_mem: Some(closure_gc_free_mem),
};

pub static FUNCTION_TRAITS: Traits = Traits {
    eval: None,
    execute: Some(function_execute),
    print: Some(function_print),
    type_name: Some(function_type_name),
    eq: Some(closure_eq),
    eql: Some(closure_eql),
    addref: Some(gc_traits_addref),
    release: Some(gc_traits_release),
    gc_mark: Some(closure_gc_mark),
    gc_release_refs: Some(closure_gc_release_refs),
    gc_free_mem: Some(closure_gc_free_mem),
};

pub static MACRO_TRAITS: Traits = Traits {
    eval: None,
    execute: Some(macro_execute),
    print: Some(macro_print),
    type_name: Some(macro_type_name),
    eq: Some(closure_eq),
    eql: Some(closure_eql),
    addref: Some(gc_traits_addref),
    release: Some(gc_traits_release),
    gc_mark: Some(closure_gc_mark),
    gc_release_refs: Some(closure_gc_release_refs),
    gc_free_mem: Some(closure_gc_free_mem),
};
