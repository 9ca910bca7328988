//! Sprig runtime: the evaluation core of a small s-expression language.
//!
//! Key design points:
//! - `Ref`: a fixed-size tagged value; all per-type behavior goes through a
//!   static capability table (`Traits`), checked for presence and dispatched
//! - memory: byte-wide saturating reference counts, backed by a mark/sweep
//!   collector that reclaims cycles between top-level forms
//! - environments: a current stack of frames mirrored into per-symbol
//!   binding caches, giving O(1) symbol lookup and O(delta) stack switches

pub mod arithmetic;
pub mod closures;
pub mod cons;
pub mod corelib;
pub mod eval;
pub mod frame;
pub mod gc;
pub mod interp;
pub mod reader;
pub mod stack;
pub mod strings;
pub mod symbol;
pub mod value;

// Re-export the working vocabulary.
pub use closures::{apply, make_closure, make_function, make_macro};
pub use cons::{cadr, caddr, car, cdr, list2, list3, list_from_slice, make_cons};
pub use corelib::{register_core_lib, register_foreign};
pub use eval::{call, eq, eql, eval, map_eval};
pub use gc::{collect_garbage, register_gc_root, unregister_gc_root};
pub use interp::{Interp, Stats};
pub use reader::read_form;
pub use stack::{make_stack, stack_debug_print, stack_enter, stack_let, stack_set};
pub use strings::make_string;
pub use symbol::make_symbol;
pub use value::{ForeignFn, ObjTag, Ref, Traits, add_ref, clone_ref, print_to_string, release_ref};
