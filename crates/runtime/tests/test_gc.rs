//! Memory manager tests: count discipline, saturation, root pinning, and
//! cycle reclamation through the tracer.

use sprig_runtime::{
    Interp, Ref, add_ref, clone_ref, collect_garbage, make_cons, register_gc_root, release_ref,
    unregister_gc_root,
};

#[test]
fn releasing_the_last_count_frees_immediately() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    let c = make_cons(&mut interp, Ref::Int(1), Ref::Int(2));
    assert_eq!(interp.live_objects(), baseline + 1);

    let c2 = clone_ref(&mut interp, c);
    release_ref(&mut interp, c2);
    assert_eq!(interp.live_objects(), baseline + 1);

    release_ref(&mut interp, c);
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn release_cascades_through_list_spines() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    let inner = make_cons(&mut interp, Ref::Int(2), Ref::Nil);
    let outer = make_cons(&mut interp, Ref::Int(1), inner);
    release_ref(&mut interp, inner);
    assert_eq!(interp.live_objects(), baseline + 2);

    release_ref(&mut interp, outer);
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn saturated_counts_are_never_decremented() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    let c = make_cons(&mut interp, Ref::Int(1), Ref::Int(2));
    for _ in 0..300 {
        add_ref(&mut interp, c);
    }
    for _ in 0..600 {
        release_ref(&mut interp, c);
    }
    // Counting can no longer reclaim it.
    assert_eq!(interp.live_objects(), baseline + 1);

    // The tracer can: the object is reachable from no root.
    collect_garbage(&mut interp);
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn collection_spares_rooted_objects() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    let c = make_cons(&mut interp, Ref::Int(1), Ref::Int(2));
    register_gc_root(&mut interp, c);

    collect_garbage(&mut interp);
    assert_eq!(interp.live_objects(), baseline + 1);

    unregister_gc_root(&mut interp, c);
    release_ref(&mut interp, c);
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn collection_spares_everything_reachable_from_the_current_stack() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    // A binding in the global environment is reachable without any
    // explicit root.
    let answer = interp.eval_source("(let keep (cons 1 2)) nil");
    release_ref(&mut interp, answer);
    collect_garbage(&mut interp);
    assert_eq!(interp.live_objects(), baseline + 1);
    interp.shutdown();
}

#[test]
fn unreferenced_values_are_swept_between_forms() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    let answer = interp.eval_source("(cons 1 2)");
    release_ref(&mut interp, answer);
    collect_garbage(&mut interp);
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn closure_environment_cycles_are_reclaimed() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    // The closure captures the scope environment that binds the closure
    // itself: a cycle counting alone cannot break. The trailing form moves
    // the current stack back to the global environment.
    let answer = interp.eval_source("(scope (let self (fn (x) self)) nil) 1");
    release_ref(&mut interp, answer);
    collect_garbage(&mut interp);
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn gc_collect_primitive_reclaims_at_the_next_quiescent_point() {
    let mut interp = Interp::new();
    let baseline = interp.live_objects();

    let answer =
        interp.eval_source("(scope (let self (fn (x) self)) nil) (gc-collect) (gc-collect)");
    release_ref(&mut interp, answer);
    // The session loop collected between the top-level forms above; the
    // cycle from the first form is already gone.
    assert_eq!(interp.live_objects(), baseline);
    interp.shutdown();
}

#[test]
fn shutdown_reclaims_the_whole_heap() {
    let mut interp = Interp::new();
    let answer = interp.eval_source(
        "(let x (cons 1 (cons 2 nil))) \
         (let f (fn (y) (cons y x))) \
         (f 3)",
    );
    release_ref(&mut interp, answer);
    interp.shutdown();
    assert_eq!(interp.live_objects(), 0);
}

#[test]
fn collection_is_idempotent_at_quiescent_points() {
    let mut interp = Interp::new();
    let answer = interp.eval_source("(let x (cons 1 2)) nil");
    release_ref(&mut interp, answer);
    collect_garbage(&mut interp);
    let after_first = interp.live_objects();
    collect_garbage(&mut interp);
    assert_eq!(interp.live_objects(), after_first);
    interp.shutdown();
}
