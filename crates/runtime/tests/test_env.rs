//! Environment model tests: frame sharing, the current-stack switching
//! protocol, and the symbol binding caches it maintains.

use sprig_runtime::{
    Interp, Ref, eval, make_stack, make_symbol, release_ref, stack_enter, stack_let, stack_set,
};

#[test]
fn bindings_are_visible_only_where_the_stack_says_so() {
    let mut interp = Interp::new();
    let genv = interp.global_env();

    let child = make_stack(&mut interp, genv);
    let sym = make_symbol(&mut interp, b"v");
    stack_let(&mut interp, child, sym, Ref::Int(5));

    // In the child environment the binding is live.
    let r = eval(&mut interp, sym, child);
    assert!(matches!(r, Ref::Int(5)));
    release_ref(&mut interp, r);

    // Back in the global environment it is gone.
    let r = eval(&mut interp, sym, genv);
    assert!(r.is_nil());
    release_ref(&mut interp, r);

    release_ref(&mut interp, sym);
    stack_enter(&mut interp, genv);
    release_ref(&mut interp, child);
    interp.shutdown();
}

#[test]
fn sibling_environments_shadow_independently() {
    let mut interp = Interp::new();
    let genv = interp.global_env();

    let left = make_stack(&mut interp, genv);
    let right = make_stack(&mut interp, genv);
    let sym = make_symbol(&mut interp, b"side");
    stack_let(&mut interp, left, sym, Ref::Int(1));
    stack_let(&mut interp, right, sym, Ref::Int(2));

    let r = eval(&mut interp, sym, left);
    assert!(matches!(r, Ref::Int(1)));
    release_ref(&mut interp, r);

    let r = eval(&mut interp, sym, right);
    assert!(matches!(r, Ref::Int(2)));
    release_ref(&mut interp, r);

    let r = eval(&mut interp, sym, left);
    assert!(matches!(r, Ref::Int(1)));
    release_ref(&mut interp, r);

    release_ref(&mut interp, sym);
    stack_enter(&mut interp, genv);
    release_ref(&mut interp, left);
    release_ref(&mut interp, right);
    interp.shutdown();
}

#[test]
fn writes_through_a_shared_frame_reach_the_current_cache() {
    let mut interp = Interp::new();
    let genv = interp.global_env();

    let sym = make_symbol(&mut interp, b"x");
    stack_let(&mut interp, genv, sym, Ref::Int(1));

    // The child shares the global frame; enter it, then write through the
    // non-current global stack.
    let child = make_stack(&mut interp, genv);
    stack_enter(&mut interp, child);
    stack_set(&mut interp, genv, sym, Ref::Int(9));

    // The shared frame is visible from the current stack, so the cache
    // reflects the write without a switch.
    let r = eval(&mut interp, sym, child);
    assert!(matches!(r, Ref::Int(9)));
    release_ref(&mut interp, r);

    release_ref(&mut interp, sym);
    stack_enter(&mut interp, genv);
    release_ref(&mut interp, child);
    interp.shutdown();
}

#[test]
fn deeper_frames_shadow_and_unwind() {
    let mut interp = Interp::new();
    let genv = interp.global_env();

    let sym = make_symbol(&mut interp, b"d");
    stack_let(&mut interp, genv, sym, Ref::Int(0));

    let inner = make_stack(&mut interp, genv);
    stack_let(&mut interp, inner, sym, Ref::Int(1));

    let innermost = make_stack(&mut interp, inner);
    stack_let(&mut interp, innermost, sym, Ref::Int(2));

    let r = eval(&mut interp, sym, innermost);
    assert!(matches!(r, Ref::Int(2)));
    release_ref(&mut interp, r);

    let r = eval(&mut interp, sym, inner);
    assert!(matches!(r, Ref::Int(1)));
    release_ref(&mut interp, r);

    let r = eval(&mut interp, sym, genv);
    assert!(matches!(r, Ref::Int(0)));
    release_ref(&mut interp, r);

    release_ref(&mut interp, sym);
    stack_enter(&mut interp, genv);
    release_ref(&mut interp, innermost);
    release_ref(&mut interp, inner);
    interp.shutdown();
}

#[test]
fn switch_counters_track_the_protocol() {
    let mut interp = Interp::new();
    let genv = interp.global_env();

    let before = interp.stats().stack_switches;
    let child = make_stack(&mut interp, genv);
    stack_enter(&mut interp, child);
    // Re-entering the current stack is free.
    stack_enter(&mut interp, child);
    stack_enter(&mut interp, genv);
    assert_eq!(interp.stats().stack_switches, before + 2);

    release_ref(&mut interp, child);
    interp.shutdown();
}

#[test]
fn set_through_the_session_reaches_the_defining_frame() {
    let mut interp = Interp::new();
    let answer = interp.eval_source(
        "(let counter 0) \
         (let bump (fn () (set counter (+ counter 1)))) \
         (bump) (bump) (bump) \
         counter",
    );
    assert!(matches!(answer, Ref::Int(3)));
    release_ref(&mut interp, answer);
    interp.shutdown();
}
