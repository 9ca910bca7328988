//! Front-end tests: run the built binary against script files.

use std::process::Command;

fn sprig() -> Command {
    Command::new(env!("CARGO_BIN_EXE_sprig"))
}

#[test]
fn runs_a_script_and_prints_each_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    std::fs::write(&script, "(let x 2)\n(+ x 3)\n").expect("write script");

    let out = sprig().arg(&script).output().expect("run sprig");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "2\n5\n");
}

#[test]
fn quiet_suppresses_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    std::fs::write(&script, "(+ 1 2)\n").expect("write script");

    let out = sprig().arg("--quiet").arg(&script).output().expect("run sprig");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "");
}

#[test]
fn output_flag_redirects_results() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    let results = dir.path().join("results.txt");
    std::fs::write(&script, "(* 6 7)\n").expect("write script");

    let out = sprig()
        .arg("--output")
        .arg(&results)
        .arg(&script)
        .output()
        .expect("run sprig");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "");
    assert_eq!(std::fs::read_to_string(&results).expect("results"), "42\n");
}

#[test]
fn exit_ends_the_session_early() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    std::fs::write(&script, "1\n(exit)\n2\n").expect("write script");

    let out = sprig().arg(&script).output().expect("run sprig");
    assert!(out.status.success());
    // The (exit) form itself still prints its nil result.
    assert_eq!(String::from_utf8_lossy(&out.stdout), "1\nnil\n");
}

#[test]
fn stats_flag_reports_counters() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    std::fs::write(&script, "(+ 1 2)\n").expect("write script");

    let out = sprig().arg("--stats").arg(&script).output().expect("run sprig");
    assert!(out.status.success());
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("symbol evals"), "stderr was: {err}");
}

#[test]
fn trace_file_receives_trace_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    let trace = dir.path().join("trace.log");
    std::fs::write(&script, "(trace (+ 1 2))\n").expect("write script");

    let out = sprig()
        .arg("--trace-file")
        .arg(&trace)
        .arg(&script)
        .output()
        .expect("run sprig");
    assert!(out.status.success());
    let log = std::fs::read_to_string(&trace).expect("trace log");
    assert!(log.contains("eval form"), "trace log was: {log}");
}

#[test]
fn missing_input_file_exits_with_one() {
    let out = sprig().arg("/no/such/file.sl").output().expect("run sprig");
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn reader_errors_do_not_stop_the_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("prog.sl");
    std::fs::write(&script, ")\n(+ 1 2)\n").expect("write script");

    let out = sprig().arg(&script).output().expect("run sprig");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "nil\n3\n");
}
