//! Numeric and bitwise primitives.
//!
//! Arithmetic requires both operands to have the same numeric type; a
//! mismatch yields nil. Integer operations use wrapping semantics so the
//! i64 boundaries are defined behavior; a zero divisor is a diagnostic and
//! nil rather than a fault.

use crate::cons::{cadr, car};
use crate::eval::eval;
use crate::interp::Interp;
use crate::value::{Ref, release_ref};

/// Evaluate the first two elements of `args`, left to right.
fn eval_two(interp: &mut Interp, args: Ref, assoc: Ref) -> (Ref, Ref) {
    let a = car(interp, args);
    let ae = eval(interp, a, assoc);
    release_ref(interp, a);
    let b = cadr(interp, args);
    let be = eval(interp, b, assoc);
    release_ref(interp, b);
    (ae, be)
}

fn eval_one(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let a = car(interp, args);
    let ae = eval(interp, a, assoc);
    release_ref(interp, a);
    ae
}

pub fn prim_add(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a.wrapping_add(b)),
        (Ref::Real(a), Ref::Real(b)) => Ref::Real(a + b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_sub(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a.wrapping_sub(b)),
        (Ref::Real(a), Ref::Real(b)) => Ref::Real(a - b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_mul(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a.wrapping_mul(b)),
        (Ref::Real(a), Ref::Real(b)) => Ref::Real(a * b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_div(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(0)) => {
            tracing::error!(dividend = a, "division by zero");
            Ref::Nil
        }
        // wrapping_div covers i64::MIN / -1.
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a.wrapping_div(b)),
        (Ref::Real(a), Ref::Real(b)) => Ref::Real(a / b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_mod(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(0)) => {
            tracing::error!(dividend = a, "modulo by zero");
            Ref::Nil
        }
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a.wrapping_rem(b)),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_bitand(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a & b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_bitor(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a | b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_bitxor(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let (ae, be) = eval_two(interp, args, assoc);
    let result = match (ae, be) {
        (Ref::Int(a), Ref::Int(b)) => Ref::Int(a ^ b),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    release_ref(interp, be);
    result
}

pub fn prim_bitnot(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let ae = eval_one(interp, args, assoc);
    let result = match ae {
        Ref::Int(a) => Ref::Int(!a),
        _ => Ref::Nil,
    };
    release_ref(interp, ae);
    result
}
