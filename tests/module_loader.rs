mod common;

use common::{CaptureSink, sink_ref, write_file};
use jspy_host::{HostError, ModuleLoader, PathResolver};
use tempfile::tempdir;

#[test]
fn loads_source_from_the_configured_root() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "lib/helpers.jspy", "fn helper() { 1 }");
    let sink = CaptureSink::new();
    let loader = ModuleLoader::new(PathResolver::new(dir.path()), "lib/", sink_ref(&sink));

    assert_eq!(loader.load("helpers").expect("module loads"), "fn helper() { 1 }");
    assert!(sink.lines().is_empty());
}

#[test]
fn every_load_reads_the_file_again() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "lib/counter.jspy", "1");
    let sink = CaptureSink::new();
    let loader = ModuleLoader::new(PathResolver::new(dir.path()), "lib/", sink_ref(&sink));

    assert_eq!(loader.load("counter").expect("first load"), "1");
    write_file(dir.path(), "lib/counter.jspy", "2");
    assert_eq!(loader.load("counter").expect("second load"), "2");
}

#[test]
fn failures_are_logged_and_propagated() {
    let dir = tempdir().expect("create temp dir");
    let sink = CaptureSink::new();
    let loader = ModuleLoader::new(PathResolver::new(dir.path()), "lib/", sink_ref(&sink));

    let err = loader.load("absent").expect_err("module is missing");
    assert!(matches!(err, HostError::Resolution { .. }));
    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("* module loader error cannot resolve `absent`"));
}
