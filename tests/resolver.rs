mod common;

use common::write_file;
use jspy_host::{
    HostError, PathResolver,
    resolver::{normalize, normalize_root},
};
use tempfile::tempdir;

#[test]
fn resolves_logical_name_with_script_extension() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "scripts/lib/helpers.jspy", "fn double(x) { x * 2 }");

    let resolver = PathResolver::new(dir.path());
    let path = resolver
        .resolve("lib/helpers", "scripts/")
        .expect("module should resolve");
    assert_eq!(path, dir.path().join("scripts/lib/helpers.jspy"));
}

#[test]
fn prefers_extension_over_exact_name() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "lib/a.jspy", "1");
    write_file(dir.path(), "lib/a", "2");

    let resolver = PathResolver::new(dir.path());
    let path = resolver.resolve("lib/a", "").expect("module should resolve");
    assert_eq!(path, dir.path().join("lib/a.jspy"));
}

#[test]
fn falls_back_to_exact_name_then_src_directory() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "scripts/data.txt", "raw");
    write_file(dir.path(), "src/shared.jspy", "let x = 1;");

    let resolver = PathResolver::new(dir.path());
    assert_eq!(
        resolver.resolve("data.txt", "scripts/").expect("exact name"),
        dir.path().join("scripts/data.txt")
    );
    assert_eq!(
        resolver
            .resolve("shared.jspy", "scripts/")
            .expect("src fallback"),
        dir.path().join("src/shared.jspy")
    );
}

#[test]
fn normalizes_separators_and_trailing_dots() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "lib/helpers.jspy", "1");

    let resolver = PathResolver::new(dir.path());
    let expected = dir.path().join("lib/helpers.jspy");
    assert_eq!(resolver.resolve("/lib/helpers/", "").expect("slashes"), expected);
    assert_eq!(resolver.resolve("lib/helpers.", "").expect("dot"), expected);
    assert_eq!(normalize("\\lib/helpers..\\"), "lib/helpers");
}

#[test]
fn reports_every_candidate_when_unresolved() {
    let dir = tempdir().expect("create temp dir");
    let resolver = PathResolver::new(dir.path());

    let candidates = resolver.candidates("missing", "scripts/");
    assert_eq!(
        candidates,
        vec![
            dir.path().join("scripts/missing.jspy"),
            dir.path().join("scripts/missing"),
            dir.path().join("src/missing"),
        ]
    );

    match resolver.resolve("missing", "scripts/") {
        Err(HostError::Resolution { name, tried }) => {
            assert_eq!(name, "missing");
            assert_eq!(tried, candidates);
        }
        other => panic!("expected resolution error, received {other:?}"),
    }
}

#[test]
fn lookup_exposes_candidates_and_result() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "src/tool", "1");

    let resolved = PathResolver::new(dir.path()).lookup("tool", "");
    assert_eq!(resolved.candidates.len(), 3);
    assert_eq!(resolved.resolved, Some(dir.path().join("src/tool")));
}

#[test]
fn source_root_ends_with_single_separator() {
    assert_eq!(normalize_root(""), "");
    assert_eq!(normalize_root("/"), "");
    assert_eq!(normalize_root("src"), "src/");
    assert_eq!(normalize_root("src///"), "src/");
    assert_eq!(normalize_root("app/scripts/"), "app/scripts/");
}
