mod common;

use std::{cell::Cell, path::Path, rc::Rc};

use common::write_file;
use futures_util::FutureExt;
use indexmap::IndexMap;
use jspy_host::{AppModule, AppModuleLoader, BootstrapLifecycle, HostError, Result, Scope, Value};
use tempfile::tempdir;

#[derive(Default)]
struct Counters {
    loads: Cell<usize>,
    init: Cell<usize>,
    init_async: Cell<usize>,
}

struct CountingLoader(Rc<Counters>);

impl AppModuleLoader for CountingLoader {
    fn load(&self, _path: &Path) -> Result<AppModule> {
        self.0.loads.set(self.0.loads.get() + 1);
        let exports: IndexMap<String, Value> =
            [("greeting".to_string(), Value::string("hi"))].into_iter().collect();
        let init = Rc::clone(&self.0);
        let init_async = Rc::clone(&self.0);
        Ok(AppModule::new(exports)
            .with_init(move || {
                init.init.set(init.init.get() + 1);
                Ok(())
            })
            .with_init_async(move || {
                async move {
                    init_async.init_async.set(init_async.init_async.get() + 1);
                    Ok::<(), HostError>(())
                }
                .boxed_local()
            }))
    }
}

struct FailingLoader;

impl AppModuleLoader for FailingLoader {
    fn load(&self, path: &Path) -> Result<AppModule> {
        Err(HostError::Evaluation(format!("cannot compile {}", path.display())))
    }
}

#[tokio::test(flavor = "current_thread")]
async fn hooks_run_once_and_config_merges_every_time() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "app.json", r#"{"env": "test", "retries": 2}"#);
    write_file(dir.path(), "app.jspy", "export const greeting = \"hi\";");

    let counters = Rc::new(Counters::default());
    let mut lifecycle = BootstrapLifecycle::new(dir.path(), CountingLoader(Rc::clone(&counters)));
    let mut scope = Scope::bootstrap();

    lifecycle.initialize("", &mut scope).await.expect("first initialize");
    lifecycle.initialize("", &mut scope).await.expect("second initialize");

    assert_eq!(counters.loads.get(), 1);
    assert_eq!(counters.init.get(), 1);
    assert_eq!(counters.init_async.get(), 1);
    assert_eq!(scope.get("greeting"), Some(&Value::string("hi")));

    let app = scope.get("app").expect("app member");
    assert_eq!(app.get("env"), Some(&Value::string("test")));
    assert_eq!(app.get("retries"), Some(&Value::int(2)));
    assert!(scope.get("session").is_some_and(|session| session.as_map().is_some()));
}

#[tokio::test(flavor = "current_thread")]
async fn config_merge_keeps_existing_app_members() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "scripts/app.json", r#"{"env": "prod"}"#);

    let mut lifecycle = BootstrapLifecycle::new(dir.path(), FailingLoader);
    let mut scope = Scope::bootstrap();
    scope.merge_into("app", [("name".to_string(), Value::string("demo"))]);

    lifecycle
        .initialize("scripts/", &mut scope)
        .await
        .expect("initialize without a bootstrap module");

    let app = scope.get("app").expect("app member");
    assert_eq!(app.get("name"), Some(&Value::string("demo")));
    assert_eq!(app.get("env"), Some(&Value::string("prod")));
}

#[tokio::test(flavor = "current_thread")]
async fn bootstrap_files_fall_back_to_src_directory() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "src/app.json", r#"{"from": "src"}"#);
    write_file(dir.path(), "src/app.jspy", "");

    let counters = Rc::new(Counters::default());
    let mut lifecycle = BootstrapLifecycle::new(dir.path(), CountingLoader(Rc::clone(&counters)));
    let mut scope = Scope::bootstrap();
    lifecycle
        .initialize("scripts/", &mut scope)
        .await
        .expect("initialize");

    assert_eq!(counters.loads.get(), 1);
    let app = scope.get("app").expect("app member");
    assert_eq!(app.get("from"), Some(&Value::string("src")));
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_config_is_reported() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "app.json", "{ not json");

    let mut lifecycle = BootstrapLifecycle::new(dir.path(), FailingLoader);
    let mut scope = Scope::bootstrap();
    match lifecycle.initialize("", &mut scope).await {
        Err(HostError::Config { path, .. }) => assert_eq!(path, dir.path().join("app.json")),
        other => panic!("expected config error, received {other:?}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn loader_failure_propagates() {
    let dir = tempdir().expect("create temp dir");
    write_file(dir.path(), "app.jspy", "broken(");

    let mut lifecycle = BootstrapLifecycle::new(dir.path(), FailingLoader);
    let mut scope = Scope::bootstrap();
    let err = lifecycle
        .initialize("", &mut scope)
        .await
        .expect_err("loader failure surfaces");
    assert!(err.to_string().starts_with("cannot compile"));
}
