//! The core primitive library.
//!
//! Every primitive is a foreign function over `(args, env)` that decides
//! per-operation whether to evaluate its arguments. Errors follow the
//! interpreter-wide convention: diagnostic, yield nil, keep going.

use crate::arithmetic::{
    prim_add, prim_bitand, prim_bitnot, prim_bitor, prim_bitxor, prim_div, prim_mod, prim_mul,
    prim_sub,
};
use crate::closures::{apply, closure_parts, make_closure, make_function, make_macro};
use crate::cons::{caar, cadar, caddr, cadr, car, cdr, make_cons};
use crate::eval::{call, eq, eql, eval, map_eval};
use crate::interp::Interp;
use crate::reader::read_form;
use crate::stack::{make_stack, stack_let, stack_set};
use crate::symbol::make_symbol;
use crate::value::{ForeignFn, Ref, clone_ref, print_to_string, release_ref};

fn truth(interp: &mut Interp, v: bool) -> Ref {
    if v {
        make_symbol(interp, b"t")
    } else {
        Ref::Nil
    }
}

pub fn prim_quote(interp: &mut Interp, args: Ref, _assoc: Ref) -> Ref {
    car(interp, args)
}

pub fn prim_eq(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let processed = map_eval(interp, args, assoc);
    let a = car(interp, processed);
    let b = cadr(interp, processed);
    release_ref(interp, processed);
    let equal = eq(interp, a, b);
    let result = truth(interp, equal);
    release_ref(interp, a);
    release_ref(interp, b);
    result
}

pub fn prim_eql(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let processed = map_eval(interp, args, assoc);
    let a = car(interp, processed);
    let b = cadr(interp, processed);
    release_ref(interp, processed);
    let equal = eql(interp, a, b);
    let result = truth(interp, equal);
    release_ref(interp, a);
    release_ref(interp, b);
    result
}

/// `(cond (test body)...)`: evaluate tests in order until one is non-nil,
/// then evaluate and return that pair's body. Nil when nothing matches.
pub fn prim_cond(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    if args.is_nil() {
        return Ref::Nil;
    }

    let test = caar(interp, args);
    let test_result = eval(interp, test, assoc);
    release_ref(interp, test);

    let result = if !test_result.is_nil() {
        let body = cadar(interp, args);
        let r = eval(interp, body, assoc);
        release_ref(interp, body);
        r
    } else {
        let rest = cdr(interp, args);
        let r = prim_cond(interp, rest, assoc);
        release_ref(interp, rest);
        r
    };
    release_ref(interp, test_result);
    result
}

/// `(if test then else)`: the two-branch shape of `cond`.
pub fn prim_if(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let test = car(interp, args);
    let test_result = eval(interp, test, assoc);
    release_ref(interp, test);

    let branch = if !test_result.is_nil() {
        cadr(interp, args)
    } else {
        caddr(interp, args)
    };
    release_ref(interp, test_result);

    let result = eval(interp, branch, assoc);
    release_ref(interp, branch);
    result
}

pub fn prim_car(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arg = car(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);
    let result = car(interp, arge);
    release_ref(interp, arge);
    result
}

pub fn prim_cdr(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arg = car(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);
    let result = cdr(interp, arge);
    release_ref(interp, arge);
    result
}

pub fn prim_cons(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arga = car(interp, args);
    let argae = eval(interp, arga, assoc);
    release_ref(interp, arga);

    let argb = cadr(interp, args);
    let argbe = eval(interp, argb, assoc);
    release_ref(interp, argb);

    let result = make_cons(interp, argae, argbe);
    release_ref(interp, argae);
    release_ref(interp, argbe);
    result
}

pub fn prim_atom(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arg = car(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);
    let result = truth(interp, !arge.is_cons());
    release_ref(interp, arge);
    result
}

pub fn prim_macro(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let param_list = car(interp, args);
    let code = cadr(interp, args);
    let result = make_macro(interp, param_list, code, assoc);
    release_ref(interp, param_list);
    release_ref(interp, code);
    result
}

pub fn prim_fn(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let param_list = car(interp, args);
    let code = cadr(interp, args);
    let result = make_function(interp, param_list, code, assoc);
    release_ref(interp, param_list);
    release_ref(interp, code);
    result
}

pub fn prim_closure(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let param_list = car(interp, args);
    let code = cadr(interp, args);
    let result = make_closure(interp, param_list, code, assoc);
    release_ref(interp, param_list);
    release_ref(interp, code);
    result
}

/// `(set name value)`: rebind an existing binding, nearest frame first.
pub fn prim_set(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let name = car(interp, args);
    let arg = cadr(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);

    stack_set(interp, assoc, name, arge);
    release_ref(interp, name);
    arge
}

/// `(let name value)`: bind in the leaf frame of the calling environment.
pub fn prim_let(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let name = car(interp, args);
    let arg = cadr(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);

    stack_let(interp, assoc, name, arge);
    release_ref(interp, name);
    arge
}

/// `(env-set name value env)`: like `set`, but every operand is evaluated,
/// including the environment to write through.
pub fn prim_env_set(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let name = car(interp, args);
    let namee = eval(interp, name, assoc);
    release_ref(interp, name);

    let arg = cadr(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);

    let env = caddr(interp, args);
    let enve = eval(interp, env, assoc);
    release_ref(interp, env);

    stack_set(interp, enve, namee, arge);
    release_ref(interp, namee);
    release_ref(interp, enve);
    arge
}

pub fn prim_env_let(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let name = car(interp, args);
    let namee = eval(interp, name, assoc);
    release_ref(interp, name);

    let arg = cadr(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);

    let env = caddr(interp, args);
    let enve = eval(interp, env, assoc);
    release_ref(interp, env);

    stack_let(interp, enve, namee, arge);
    release_ref(interp, namee);
    release_ref(interp, enve);
    arge
}

/// `(do forms...)`: evaluate in order, return the last result.
pub fn prim_do(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let first = car(interp, args);
    let firste = eval(interp, first, assoc);
    release_ref(interp, first);

    let rest = cdr(interp, args);
    if rest.is_nil() {
        release_ref(interp, rest);
        firste
    } else {
        release_ref(interp, firste);
        let result = prim_do(interp, rest, assoc);
        release_ref(interp, rest);
        result
    }
}

/// `(scope forms...)`: `do` inside a fresh child environment.
pub fn prim_scope(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let env = make_stack(interp, assoc);
    let result = prim_do(interp, args, env);
    release_ref(interp, env);
    result
}

pub fn prim_apply(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let f = car(interp, args);
    let fe = eval(interp, f, assoc);
    release_ref(interp, f);

    let arglist = cadr(interp, args);
    let argliste = eval(interp, arglist, assoc);
    release_ref(interp, arglist);

    let result = call(interp, fe, argliste, assoc);
    release_ref(interp, fe);
    release_ref(interp, argliste);
    result
}

/// `(macro-expand m args...)`: run the macro body without re-evaluating the
/// expansion.
pub fn prim_macro_expand(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let m = car(interp, args);
    let me = eval(interp, m, assoc);
    release_ref(interp, m);

    let arglist = cdr(interp, args);
    let result = apply(interp, me, arglist);
    release_ref(interp, me);
    release_ref(interp, arglist);
    result
}

fn eval_first(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arg = car(interp, args);
    let arge = eval(interp, arg, assoc);
    release_ref(interp, arg);
    arge
}

pub fn prim_closure_code(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let fe = eval_first(interp, args, assoc);
    let result = match closure_parts(interp, fe) {
        Some((_, code, _)) => clone_ref(interp, code),
        None => {
            tracing::error!("closure-code: not a closure");
            Ref::Nil
        }
    };
    release_ref(interp, fe);
    result
}

pub fn prim_closure_env(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let fe = eval_first(interp, args, assoc);
    let result = match closure_parts(interp, fe) {
        Some((_, _, env)) => clone_ref(interp, env),
        None => {
            tracing::error!("closure-env: not a closure");
            Ref::Nil
        }
    };
    release_ref(interp, fe);
    result
}

pub fn prim_closure_param_list(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let fe = eval_first(interp, args, assoc);
    let result = match closure_parts(interp, fe) {
        Some((params, _, _)) => clone_ref(interp, params),
        None => {
            tracing::error!("closure-param-list: not a closure");
            Ref::Nil
        }
    };
    release_ref(interp, fe);
    result
}

/// `(make-closure params code env)`: a raw closure from evaluated parts.
pub fn prim_make_closure(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let plist = car(interp, args);
    let pliste = eval(interp, plist, assoc);
    release_ref(interp, plist);

    let code = cadr(interp, args);
    let codee = eval(interp, code, assoc);
    release_ref(interp, code);

    let env = caddr(interp, args);
    let enve = eval(interp, env, assoc);
    release_ref(interp, env);

    let result = make_closure(interp, pliste, codee, enve);
    release_ref(interp, pliste);
    release_ref(interp, codee);
    release_ref(interp, enve);
    result
}

pub fn prim_print(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arge = eval_first(interp, args, assoc);
    let mut text = print_to_string(interp, arge);
    text.push('\n');
    interp.write_out(&text);
    arge
}

pub fn prim_read(interp: &mut Interp, _args: Ref, _assoc: Ref) -> Ref {
    read_form(interp).unwrap_or(Ref::Nil)
}

/// `(eval expr)` or `(eval expr env)`.
pub fn prim_eval(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arge = eval_first(interp, args, assoc);

    let env = cadr(interp, args);
    let result = if !env.is_nil() {
        let enve = eval(interp, env, assoc);
        let r = eval(interp, arge, enve);
        release_ref(interp, enve);
        r
    } else {
        eval(interp, arge, assoc)
    };
    release_ref(interp, env);
    release_ref(interp, arge);
    result
}

pub fn prim_get_env(interp: &mut Interp, _args: Ref, assoc: Ref) -> Ref {
    clone_ref(interp, assoc)
}

pub fn prim_type(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arge = eval_first(interp, args, assoc);
    let result = match arge.traits().and_then(|t| t.type_name) {
        Some(f) => f(interp, arge),
        None => Ref::Nil,
    };
    release_ref(interp, arge);
    result
}

/// Request a collection. The cycle runs at the next quiescent point; the
/// collector cannot run here, inside a trait callback, without sweeping
/// values held only in host locals.
pub fn prim_gc_collect(interp: &mut Interp, _args: Ref, _assoc: Ref) -> Ref {
    interp.request_collect();
    Ref::Nil
}

fn do_quasiquote(interp: &mut Interp, v: Ref, e: Ref, unquote: Ref) -> Ref {
    if !v.is_cons() {
        return clone_ref(interp, v);
    }

    let lar = car(interp, v);
    let result = if eq(interp, lar, unquote) {
        let ladr = cadr(interp, v);
        let r = eval(interp, ladr, e);
        release_ref(interp, ladr);
        r
    } else {
        let a = do_quasiquote(interp, lar, e, unquote);
        let ldr = cdr(interp, v);
        let b = do_quasiquote(interp, ldr, e, unquote);
        release_ref(interp, ldr);
        let cons = make_cons(interp, a, b);
        release_ref(interp, a);
        release_ref(interp, b);
        cons
    };
    release_ref(interp, lar);
    result
}

/// `(quasiquote form)`: copy the form, substituting each `(unquote x)` with
/// the evaluation of `x`.
pub fn prim_quasiquote(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let unquote = make_symbol(interp, b"unquote");
    let arg = car(interp, args);
    let result = do_quasiquote(interp, arg, assoc, unquote);
    release_ref(interp, arg);
    release_ref(interp, unquote);
    result
}

/// Bind a primitive under `name` in `env`.
pub fn register_foreign(interp: &mut Interp, env: Ref, name: &str, f: ForeignFn) {
    let sym = make_symbol(interp, name.as_bytes());
    stack_let(interp, env, sym, Ref::Foreign(f));
    release_ref(interp, sym);
}

/// Install the core library into `env`.
pub fn register_core_lib(interp: &mut Interp, env: Ref) {
    register_foreign(interp, env, "quote", prim_quote);
    register_foreign(interp, env, "eq", prim_eq);
    register_foreign(interp, env, "eql", prim_eql);
    register_foreign(interp, env, "cond", prim_cond);
    register_foreign(interp, env, "if", prim_if);
    register_foreign(interp, env, "do", prim_do);
    register_foreign(interp, env, "scope", prim_scope);
    register_foreign(interp, env, "apply", prim_apply);
    register_foreign(interp, env, "car", prim_car);
    register_foreign(interp, env, "cdr", prim_cdr);
    register_foreign(interp, env, "cons", prim_cons);
    register_foreign(interp, env, "atom", prim_atom);
    register_foreign(interp, env, "closure", prim_closure);
    register_foreign(interp, env, "macro", prim_macro);
    register_foreign(interp, env, "fn", prim_fn);
    register_foreign(interp, env, "set", prim_set);
    register_foreign(interp, env, "let", prim_let);
    register_foreign(interp, env, "read", prim_read);
    register_foreign(interp, env, "eval", prim_eval);
    register_foreign(interp, env, "print", prim_print);
    register_foreign(interp, env, "type", prim_type);
    register_foreign(interp, env, "quasiquote", prim_quasiquote);
    register_foreign(interp, env, "macro-expand", prim_macro_expand);
    register_foreign(interp, env, "get-env", prim_get_env);
    register_foreign(interp, env, "env-set", prim_env_set);
    register_foreign(interp, env, "env-let", prim_env_let);
    register_foreign(interp, env, "gc-collect", prim_gc_collect);

    register_foreign(interp, env, "closure-code", prim_closure_code);
    register_foreign(interp, env, "closure-param-list", prim_closure_param_list);
    register_foreign(interp, env, "closure-env", prim_closure_env);
    register_foreign(interp, env, "make-closure", prim_make_closure);

    register_foreign(interp, env, "+", prim_add);
    register_foreign(interp, env, "-", prim_sub);
    register_foreign(interp, env, "*", prim_mul);
    register_foreign(interp, env, "/", prim_div);
    register_foreign(interp, env, "%", prim_mod);

    register_foreign(interp, env, "&", prim_bitand);
    register_foreign(interp, env, "|", prim_bitor);
    register_foreign(interp, env, "^", prim_bitxor);
    register_foreign(interp, env, "~", prim_bitnot);
}
