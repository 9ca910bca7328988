//! Sprig command-line front-end.
//!
//! Wires files and flags to the runtime and drives the read-eval-print
//! loop. Also registers the session primitives that only make sense when a
//! loop and a tracing subscriber exist: `exit`, `trace`, `no-trace`,
//! `dump-stack` and `profile`.

use std::fs::File;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sprig_runtime::corelib::prim_do;
use sprig_runtime::{
    Interp, ObjTag, Ref, car, cdr, eval, print_to_string, register_foreign, release_ref,
    stack_debug_print,
};

#[derive(Parser)]
#[command(name = "sprig")]
#[command(version)]
#[command(about = "Sprig s-expression interpreter", long_about = None)]
struct Cli {
    /// Script to run; standard input when omitted
    input: Option<PathBuf>,

    /// Write top-level results to this file instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Don't print the results of top-level evaluations
    #[arg(short, long)]
    quiet: bool,

    /// Dump evaluation statistics at exit
    #[arg(short, long)]
    stats: bool,

    /// Write trace output to this file and enable the TRACE level
    #[arg(long, value_name = "PATH")]
    trace_file: Option<PathBuf>,
}

fn init_tracing(trace_file: Option<&Path>) -> std::io::Result<()> {
    match trace_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")),
                )
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// `(exit)`: end the session after the current form.
fn prim_exit(interp: &mut Interp, _args: Ref, _assoc: Ref) -> Ref {
    interp.set_finished(true);
    Ref::Nil
}

/// `(trace forms...)`: evaluate the body with the evaluation tracer on.
fn prim_trace(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let prev = interp.trace_enabled();
    interp.set_trace(true);
    let result = prim_do(interp, args, assoc);
    interp.set_trace(prev);
    result
}

/// `(no-trace forms...)`: evaluate the body with the tracer off.
fn prim_no_trace(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let prev = interp.trace_enabled();
    interp.set_trace(false);
    let result = prim_do(interp, args, assoc);
    interp.set_trace(prev);
    result
}

/// `(dump-stack)` or `(dump-stack env)`: log an environment's frames.
fn prim_dump_stack(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let arg = car(interp, args);
    if !arg.is_nil() {
        let arge = eval(interp, arg, assoc);
        match arge {
            Ref::Obj(ObjTag::Stack, id) => {
                let dump = stack_debug_print(interp, id);
                tracing::info!("\n{dump}");
            }
            _ => tracing::warn!("dump-stack called with an invalid argument"),
        }
        release_ref(interp, arge);
    } else if let Ref::Obj(ObjTag::Stack, id) = assoc {
        let dump = stack_debug_print(interp, id);
        tracing::info!("\n{dump}");
    }
    release_ref(interp, arg);
    Ref::Nil
}

/// `(profile name forms...)`: time the body and log it under `name`.
fn prim_profile(interp: &mut Interp, args: Ref, assoc: Ref) -> Ref {
    let block_name = car(interp, args);
    let block = cdr(interp, args);

    let start = Instant::now();
    let result = prim_do(interp, block, assoc);
    let micros = start.elapsed().as_micros() as u64;

    tracing::info!(
        block = %print_to_string(interp, block_name),
        micros,
        "profile"
    );
    release_ref(interp, block);
    release_ref(interp, block_name);
    result
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.trace_file.as_deref()) {
        eprintln!(
            "could not open trace file {}: {e}",
            cli.trace_file
                .as_deref()
                .unwrap_or(Path::new("?"))
                .display()
        );
        process::exit(1);
    }

    let mut interp = Interp::new();

    let prompt = match &cli.input {
        Some(path) => {
            match File::open(path) {
                Ok(file) => interp.set_input(Box::new(file)),
                Err(e) => {
                    eprintln!("could not open input file {}: {e}", path.display());
                    process::exit(1);
                }
            }
            false
        }
        None => std::io::stdin().is_terminal(),
    };

    if let Some(path) = &cli.output {
        match File::create(path) {
            Ok(file) => interp.set_output(Box::new(file)),
            Err(e) => {
                eprintln!("could not open output file {}: {e}", path.display());
                process::exit(1);
            }
        }
    }

    let genv = interp.global_env();
    register_foreign(&mut interp, genv, "exit", prim_exit);
    register_foreign(&mut interp, genv, "trace", prim_trace);
    register_foreign(&mut interp, genv, "no-trace", prim_no_trace);
    register_foreign(&mut interp, genv, "dump-stack", prim_dump_stack);
    register_foreign(&mut interp, genv, "profile", prim_profile);

    let start = Instant::now();
    while !interp.is_finished() {
        if prompt {
            print!("> ");
            let _ = std::io::stdout().flush();
        }
        let Some(val) = interp.read_form() else {
            break;
        };
        let answer = eval(&mut interp, val, genv);
        release_ref(&mut interp, val);
        if !cli.quiet {
            let mut text = print_to_string(&interp, answer);
            text.push('\n');
            interp.write_out(&text);
            interp.flush_out();
        }
        release_ref(&mut interp, answer);
        interp.collect();
    }

    interp.shutdown();

    if cli.stats {
        let stats = interp.stats();
        eprintln!(
            "elapsed: {:.3}s; symbol evals: {}; stack switches: {}; gc cycles: {}; objects swept: {}",
            start.elapsed().as_secs_f64(),
            stats.symbol_evals,
            stats.stack_switches,
            stats.gc_cycles,
            stats.objects_swept,
        );
    }
}
