use std::path::PathBuf;

use jspy_host::{CliOptions, Value};

fn parse(args: &[&str]) -> CliOptions {
    CliOptions::try_parse_from(std::iter::once("jspy").chain(args.iter().copied()))
        .expect("arguments parse")
}

#[test]
fn reads_recognized_flags() {
    let options = parse(&[
        "-f",
        "main.jspy",
        "--srcRoot",
        "scripts",
        "-e",
        "run",
        "-o",
        "out.log",
    ]);
    assert_eq!(options.file.as_deref(), Some("main.jspy"));
    assert_eq!(options.src_root, "scripts/");
    assert_eq!(options.entry_function.as_deref(), Some("run"));
    assert_eq!(options.output, Some(PathBuf::from("out.log")));
    assert!(!options.version);
}

#[test]
fn accepts_equals_form_and_positional_script() {
    let options = parse(&["--file=first.jspy", "--srcRoot=src///"]);
    assert_eq!(options.file.as_deref(), Some("first.jspy"));
    assert_eq!(options.src_root, "src/");

    let positional = parse(&["second.jspy"]);
    assert_eq!(positional.file.as_deref(), Some("second.jspy"));
    assert!(positional.src_root.is_empty());
}

#[test]
fn collects_free_form_parameters() {
    let options = parse(&["main.jspy", "--param1=someValue1", "--dryRun", "--empty="]);
    assert_eq!(options.params.get("param1"), Some(&Value::string("someValue1")));
    assert_eq!(options.params.get("dryRun"), Some(&Value::bool(true)));
    assert_eq!(options.params.get("empty"), Some(&Value::string("")));
}

#[test]
fn parameters_include_recognized_options() {
    let options = parse(&["-f", "main.jspy", "-s", "app", "--region=eu"]);
    let keys: Vec<&str> = options.params.keys().map(String::as_str).collect();
    assert_eq!(keys, ["file", "srcRoot", "region"]);
    assert_eq!(options.params.get("srcRoot"), Some(&Value::string("app/")));

    let adapter = options.adapter_options("/work");
    assert_eq!(adapter.working_root, PathBuf::from("/work"));
    assert_eq!(adapter.src_root, "app/");
    assert_eq!(adapter.params.len(), 3);
}

#[test]
fn version_flag_is_recorded() {
    let options = parse(&["-v"]);
    assert!(options.version);
    assert!(options.file.is_none());
    assert_eq!(options.params.get("version"), Some(&Value::bool(true)));
}
