//! Tagged value references and the per-type capability table.
//!
//! Every value in the language is a fixed-size `Ref`. Atoms (integers,
//! reals, foreign functions) carry their payload inline; strings and symbols
//! carry a handle into their refcounted tables; everything else is a handle
//! into the garbage-collected heap, tagged with its concrete type.
//!
//! All polymorphism goes through `Traits`: a table of optional function
//! pointers, one static instance per type. Callers test capability presence
//! and dispatch; they never match on a concrete type to decide behavior.

use std::fmt::Write;

use crate::interp::Interp;

/// Handle into the string table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StrId(pub(crate) u32);

/// Handle into the symbol table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SymId(pub(crate) u32);

/// Handle into the garbage-collected heap.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ObjId(pub(crate) u32);

/// A primitive implemented in the host language: `(args, env) -> result`.
pub type ForeignFn = fn(&mut Interp, Ref, Ref) -> Ref;

/// Concrete type of a heap object, carried in the reference so dispatch
/// never needs the heap. Must agree with the object's stored kind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObjTag {
    Cons,
    Closure,
    Function,
    Macro,
    Stack,
    Frame,
}

/// A language value. `Nil` is the zero value; it is never heap-allocated.
#[derive(Clone, Copy, Debug)]
pub enum Ref {
    Nil,
    Int(i64),
    Real(f64),
    Str(StrId),
    Symbol(SymId),
    Foreign(ForeignFn),
    Obj(ObjTag, ObjId),
}

pub type EvalFn = fn(&mut Interp, Ref, Ref) -> Ref;
pub type ExecuteFn = fn(&mut Interp, Ref, Ref, Ref) -> Ref;
pub type PrintFn = fn(&Interp, Ref, &mut String);
pub type TypeNameFn = fn(&mut Interp, Ref) -> Ref;
pub type CmpFn = fn(&Interp, Ref, Ref) -> bool;
pub type RefOpFn = fn(&mut Interp, Ref);

/// Per-type capability table. An absent entry means the operation is not
/// supported for that type; callers check presence before dispatching.
pub struct Traits {
    pub eval: Option<EvalFn>,
    pub execute: Option<ExecuteFn>,
    pub print: Option<PrintFn>,
    pub type_name: Option<TypeNameFn>,
    pub eq: Option<CmpFn>,
    pub eql: Option<CmpFn>,
    pub addref: Option<RefOpFn>,
    pub release: Option<RefOpFn>,
    pub gc_mark: Option<RefOpFn>,
    pub gc_release_refs: Option<RefOpFn>,
    pub gc_free_mem: Option<RefOpFn>,
}

impl Ref {
    pub fn is_nil(self) -> bool {
        matches!(self, Ref::Nil)
    }

    pub fn is_cons(self) -> bool {
        matches!(self, Ref::Obj(ObjTag::Cons, _))
    }

    /// The capability table for this value, or `None` for nil.
    pub fn traits(self) -> Option<&'static Traits> {
        match self {
            Ref::Nil => None,
            Ref::Int(_) => Some(&INTEGER_TRAITS),
            Ref::Real(_) => Some(&REAL_TRAITS),
            Ref::Str(_) => Some(&crate::strings::STRING_TRAITS),
            Ref::Symbol(_) => Some(&crate::symbol::SYMBOL_TRAITS),
            Ref::Foreign(_) => Some(&FOREIGN_EXEC_TRAITS),
            Ref::Obj(tag, _) => Some(match tag {
                ObjTag::Cons => &crate::cons::CONS_TRAITS,
                ObjTag::Closure => &crate::closures::CLOSURE_TRAITS,
                ObjTag::Function => &crate::closures::FUNCTION_TRAITS,
                ObjTag::Macro => &crate::closures::MACRO_TRAITS,
                ObjTag::Stack => &crate::stack::STACK_TRAITS,
                ObjTag::Frame => &crate::frame::FRAME_TRAITS,
            }),
        }
    }

    /// Whether two references carry the same concrete type.
    pub fn same_type(self, other: Ref) -> bool {
        match (self, other) {
            (Ref::Obj(a, _), Ref::Obj(b, _)) => a == b,
            _ => std::mem::discriminant(&self) == std::mem::discriminant(&other),
        }
    }
}

/// Increment the reference count of a counted value. No-op for atoms.
pub fn add_ref(interp: &mut Interp, r: Ref) {
    if let Some(f) = r.traits().and_then(|t| t.addref) {
        f(interp, r);
    }
}

/// Increment and hand back the same reference; the counted analogue of a
/// copy constructor.
pub fn clone_ref(interp: &mut Interp, r: Ref) -> Ref {
    add_ref(interp, r);
    r
}

/// Release one count on a value. A count reaching zero drops the value's
/// outgoing references and frees it.
pub fn release_ref(interp: &mut Interp, r: Ref) {
    if let Some(f) = r.traits().and_then(|t| t.release) {
        f(interp, r);
    }
}

/// Mark a value for the tracing collector, if it is a traced type.
pub fn ref_gc_mark(interp: &mut Interp, r: Ref) {
    if let Ref::Obj(_, id) = r {
        if r.traits().is_some_and(|t| t.gc_mark.is_some()) {
            crate::gc::mark_object(interp, id);
        }
    }
}

/// Print a value into `out`. Values without a print capability (nil, frames)
/// render as `nil`.
pub fn print_into(interp: &Interp, val: Ref, out: &mut String) {
    match val.traits().and_then(|t| t.print) {
        Some(f) => f(interp, val, out),
        None => out.push_str("nil"),
    }
}

pub fn print_to_string(interp: &Interp, val: Ref) -> String {
    let mut out = String::new();
    print_into(interp, val, &mut out);
    out
}

// --- integer ---------------------------------------------------------------

fn integer_print(_interp: &Interp, r: Ref, out: &mut String) {
    if let Ref::Int(n) = r {
        let _ = write!(out, "{n}");
    }
}

fn integer_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"integer")
}

fn integer_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Int(x), Ref::Int(y)) if x == y)
}

pub static INTEGER_TRAITS: Traits = Traits {
    eval: None,
    execute: None,
    print: Some(integer_print),
    type_name: Some(integer_type_name),
    eq: Some(integer_eq),
    eql: Some(integer_eq),
    addref: None,
    release: None,
    gc_mark: None,
    gc_release_refs: None,
    gc_free_mem: None,
};

// --- real ------------------------------------------------------------------

fn real_print(_interp: &Interp, r: Ref, out: &mut String) {
    if let Ref::Real(x) = r {
        // Keep a fraction marker in the text so it reads back as a real.
        if x.is_finite() && x.fract() == 0.0 {
            let _ = write!(out, "{x:.1}");
        } else {
            let _ = write!(out, "{x}");
        }
    }
}

fn real_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"real")
}

fn real_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    matches!((a, b), (Ref::Real(x), Ref::Real(y)) if x == y)
}

pub static REAL_TRAITS: Traits = Traits {
    eval: None,
    execute: None,
    print: Some(real_print),
    type_name: Some(real_type_name),
    eq: Some(real_eq),
    eql: Some(real_eq),
    addref: None,
    release: None,
    gc_mark: None,
    gc_release_refs: None,
    gc_free_mem: None,
};

// --- foreign exec ----------------------------------------------------------

fn foreign_exec_execute(interp: &mut Interp, instance: Ref, args: Ref, ctx: Ref) -> Ref {
    match instance {
        Ref::Foreign(f) => f(interp, args, ctx),
        _ => Ref::Nil,
    }
}

fn foreign_exec_print(_interp: &Interp, r: Ref, out: &mut String) {
    if let Ref::Foreign(f) = r {
        let _ = write!(out, "#<foreign-exec {:#x}>", f as usize);
    }
}

fn foreign_exec_type_name(interp: &mut Interp, _r: Ref) -> Ref {
    crate::symbol::make_symbol(interp, b"foreign-exec")
}

fn foreign_exec_eq(_interp: &Interp, a: Ref, b: Ref) -> bool {
    match (a, b) {
        (Ref::Foreign(x), Ref::Foreign(y)) => std::ptr::fn_addr_eq(x, y),
        _ => false,
    }
}

pub static FOREIGN_EXEC_TRAITS: Traits = Traits {
    eval: None,
    execute: Some(foreign_exec_execute),
    print: Some(foreign_exec_print),
    type_name: Some(foreign_exec_type_name),
    eq: Some(foreign_exec_eq),
    eql: Some(foreign_exec_eq),
    addref: None,
    release: None,
    gc_mark: None,
    gc_release_refs: None,
    gc_free_mem: None,
};
