//! The interpreter context.
//!
//! Everything that would otherwise be ambient process state lives here: the
//! heap and its root set, the string and symbol tables, and the
//! current-stack pointer. One `Interp` is one independent interpreter;
//! everything in the crate threads `&mut Interp` instead of touching
//! globals.

use std::io::{Read, Write};

use crate::corelib::register_core_lib;
use crate::eval::eval;
use crate::gc::{Heap, collect_garbage, register_gc_root, unregister_gc_root};
use crate::reader::{Reader, read_form};
use crate::stack::{make_stack, stack_enter, stack_let};
use crate::strings::StringTable;
use crate::symbol::{SymbolTable, make_symbol};
use crate::value::{ObjId, Ref, release_ref};

/// Session counters, dumped by the front-end's statistics flag.
#[derive(Default, Debug, Clone, Copy)]
pub struct Stats {
    pub symbol_evals: u64,
    pub stack_switches: u64,
    pub gc_cycles: u64,
    pub objects_swept: u64,
}

pub struct Interp {
    pub(crate) heap: Heap,
    pub(crate) strings: StringTable,
    pub(crate) symbols: SymbolTable,
    pub(crate) current_stack: Option<ObjId>,
    pub(crate) reader: Reader,
    out: Box<dyn Write>,
    pub(crate) stats: Stats,
    global_env: Ref,
    finished: bool,
    trace: bool,
    collect_requested: bool,
}

impl Interp {
    /// A fully bootstrapped interpreter: global environment created,
    /// registered as a collector root and entered, `t` bound to itself,
    /// `nil` bound to the nil value, core library installed. Input defaults
    /// to stdin, output to stdout.
    pub fn new() -> Interp {
        let mut interp = Interp {
            heap: Heap::new(),
            strings: StringTable::new(),
            symbols: SymbolTable::new(),
            current_stack: None,
            reader: Reader::new(Box::new(std::io::stdin())),
            out: Box::new(std::io::stdout()),
            stats: Stats::default(),
            global_env: Ref::Nil,
            finished: false,
            trace: false,
            collect_requested: false,
        };

        let env = make_stack(&mut interp, Ref::Nil);
        register_gc_root(&mut interp, env);
        stack_enter(&mut interp, env);

        let t = make_symbol(&mut interp, b"t");
        stack_let(&mut interp, env, t, t);
        release_ref(&mut interp, t);

        let nil = make_symbol(&mut interp, b"nil");
        stack_let(&mut interp, env, nil, Ref::Nil);
        release_ref(&mut interp, nil);

        register_core_lib(&mut interp, env);
        interp.global_env = env;
        interp
    }

    /// The top-level environment. The interpreter holds its count; callers
    /// must not release it.
    pub fn global_env(&self) -> Ref {
        self.global_env
    }

    pub fn set_input(&mut self, src: Box<dyn Read>) {
        self.reader = Reader::new(src);
    }

    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    pub fn write_out(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()) {
            tracing::warn!(error = %e, "write error on output stream");
        }
    }

    pub fn flush_out(&mut self) {
        let _ = self.out.flush();
    }

    /// Read one form from the current input; `None` at end of input.
    pub fn read_form(&mut self) -> Option<Ref> {
        read_form(self)
    }

    /// Run one mark/sweep cycle. Only call between top-level forms.
    pub fn collect(&mut self) {
        self.collect_requested = false;
        collect_garbage(self);
    }

    pub(crate) fn request_collect(&mut self) {
        self.collect_requested = true;
    }

    /// Whether a collection was requested from inside an evaluation.
    /// Session loops that do not collect after every form can poll this.
    pub fn collect_requested(&self) -> bool {
        self.collect_requested
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_finished(&mut self, finished: bool) {
        self.finished = finished;
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace
    }

    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Live heap objects: the retained-object hook.
    pub fn live_objects(&self) -> usize {
        self.heap.live_objects()
    }

    /// Feed `src` through the session loop: read, evaluate in the global
    /// environment, collect once after every form. Returns the last answer
    /// with one count owned by the caller.
    pub fn eval_source(&mut self, src: &str) -> Ref {
        self.reader = Reader::from_bytes(src.as_bytes().to_vec());
        let genv = self.global_env;
        let mut answer = Ref::Nil;
        while let Some(form) = read_form(self) {
            release_ref(self, answer);
            answer = eval(self, form, genv);
            release_ref(self, form);
            // The answer lives in a host local the marker cannot see; pin
            // it across the between-forms collection.
            register_gc_root(self, answer);
            collect_garbage(self);
            unregister_gc_root(self, answer);
            if self.finished {
                break;
            }
        }
        answer
    }

    /// Tear the session down: leave the current stack, drop the global
    /// environment from the root set, and collect. Afterwards the heap
    /// holds nothing.
    pub fn shutdown(&mut self) {
        stack_enter(self, Ref::Nil);
        let env = self.global_env;
        self.global_env = Ref::Nil;
        if !env.is_nil() {
            unregister_gc_root(self, env);
            release_ref(self, env);
        }
        collect_garbage(self);
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}
