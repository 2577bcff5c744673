//! Composition root: wires loaders, assertions, bootstrap and output around an
//! embedded interpreter.

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    assert::{AssertEngine, AssertLedger, AssertRecord, LedgerRef},
    bootstrap::{AppModuleLoader, BootstrapLifecycle},
    error::{HostError, Result},
    http,
    log::{ActivityLevel, Reporter, SinkRef},
    module_loader::ModuleLoader,
    packages::{PackageGateway, PackageHandle, display_joined},
    resolver::PathResolver,
    scope::Scope,
    value::{VARIADIC, Value},
};

pub type ModuleLoaderFn = Rc<dyn Fn(&str) -> Result<String>>;
pub type PackageLoaderFn = Rc<dyn Fn(&str) -> Result<PackageHandle>>;

/// The embedded interpreter. The adapter never evaluates scripts itself.
#[allow(async_fn_in_trait)]
pub trait Interpreter {
    fn info(&self) -> String;

    fn register_module_loader(&mut self, loader: ModuleLoaderFn);

    fn register_packages_loader(&mut self, loader: PackageLoaderFn);

    async fn evaluate(
        &mut self,
        script: &str,
        scope: Scope,
        entry_function: Option<&str>,
        module_name: Option<&str>,
    ) -> Result<Value>;
}

#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    /// Directory every relative path is resolved against.
    pub working_root: PathBuf,
    /// Source root prefix, empty or ending in `/`.
    pub src_root: String,
    pub entry_function: Option<String>,
    pub params: IndexMap<String, Value>,
}

pub struct HostAdapter<I: Interpreter> {
    interpreter: I,
    options: AdapterOptions,
    ledger: LedgerRef,
    reporter: Rc<Reporter>,
    scope: Scope,
    bootstrap: BootstrapLifecycle,
    bootstrapped: bool,
}

impl<I: Interpreter> HostAdapter<I> {
    pub fn new(
        mut interpreter: I,
        options: AdapterOptions,
        sink: SinkRef,
        app_loader: impl AppModuleLoader + 'static,
    ) -> Self {
        let resolver = PathResolver::new(&options.working_root);
        let modules = ModuleLoader::new(resolver, &options.src_root, Rc::clone(&sink));
        let packages =
            PackageGateway::new(&options.working_root, &options.src_root, Rc::clone(&sink));
        interpreter.register_module_loader(Rc::new(move |path: &str| modules.load(path)));
        interpreter.register_packages_loader(Rc::new(move |name: &str| packages.load(name)));

        let bootstrap = BootstrapLifecycle::new(&options.working_root, app_loader);
        Self {
            interpreter,
            options,
            ledger: Rc::new(RefCell::new(AssertLedger::new())),
            reporter: Rc::new(Reporter::new(sink)),
            scope: Scope::bootstrap(),
            bootstrap,
            bootstrapped: false,
        }
    }

    pub fn info(&self) -> String {
        self.interpreter.info()
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    pub fn sink(&self) -> &SinkRef {
        self.reporter.sink()
    }

    /// The bootstrap scope shared by every evaluation.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn asserts(&self) -> Vec<AssertRecord> {
        self.ledger.borrow().records().to_vec()
    }

    pub fn assert_engine(&self) -> AssertEngine {
        AssertEngine::new(Rc::clone(&self.ledger), Rc::clone(&self.reporter))
    }

    /// Runs the bootstrap lifecycle. Its hooks fire once per adapter; the
    /// configuration file is merged again on every call.
    pub async fn initialize(&mut self) -> Result<()> {
        self.bootstrap
            .initialize(&self.options.src_root, &mut self.scope)
            .await?;
        self.bootstrapped = true;
        Ok(())
    }

    /// Clears the assert ledger, bootstraps on first use, then delegates to the
    /// interpreter with the composed scope. Failures are reported to the sink
    /// before they are returned.
    pub async fn evaluate(
        &mut self,
        script: &str,
        scope: Option<Scope>,
        entry_function: Option<&str>,
        module_name: Option<&str>,
    ) -> Result<Value> {
        let result = self
            .run(script, scope.unwrap_or_default(), entry_function, module_name)
            .await;
        if let Err(err) = &result {
            self.sink().error(&format!("JSPython execution failed: {err}"));
        }
        result
    }

    async fn run(
        &mut self,
        script: &str,
        scope: Scope,
        entry_function: Option<&str>,
        module_name: Option<&str>,
    ) -> Result<Value> {
        self.ledger.borrow_mut().clear();
        if !self.bootstrapped {
            self.initialize().await?;
        }
        let scope = self.compose_scope(scope);
        self.interpreter
            .evaluate(script, scope, entry_function, module_name)
            .await
    }

    /// Reads `path` (relative to the working root) and evaluates it with the
    /// configured entry function.
    pub async fn evaluate_file(&mut self, path: &Path, scope: Option<Scope>) -> Result<Value> {
        let full_path = self.options.working_root.join(path);
        if !full_path.is_file() {
            return Err(HostError::FileNotFound(full_path));
        }
        let script = fs::read_to_string(&full_path)?;
        let entry_function = self.options.entry_function.clone();
        let module_name = path.to_string_lossy().into_owned();
        self.evaluate(&script, scope, entry_function.as_deref(), Some(&module_name)).await
    }

    /// Bootstrap members, host functions, `args`, then caller entries; later
    /// entries win.
    fn compose_scope(&self, caller: Scope) -> Scope {
        let mut scope = self.scope.clone();
        scope.merge(self.host_functions());
        scope.define("args", Value::map(self.options.params.clone()));
        scope.merge(caller);
        scope
    }

    /// `assert`, `showAsserts`, `params`, `print` and the HTTP helpers.
    pub fn host_functions(&self) -> Scope {
        let mut functions = Scope::new();

        let engine = self.assert_engine();
        functions.define(
            "assert",
            Value::native("assert", VARIADIC, move |args| {
                let name = args.first().map(ToString::to_string).unwrap_or_default();
                let data = args.get(1).cloned().unwrap_or_else(Value::null);
                Ok(engine
                    .assert(&name, data)
                    .map_or_else(Value::null, Value::assert_chain))
            }),
        );

        let engine = self.assert_engine();
        functions.define(
            "showAsserts",
            Value::native("showAsserts", 0, move |_| {
                engine.show_asserts();
                Ok(Value::null())
            }),
        );

        let params = self.options.params.clone();
        functions.define(
            "params",
            Value::native("params", 1, move |args| {
                let value = args[0].as_str().and_then(|name| params.get(name)).cloned();
                Ok(value.unwrap_or_else(Value::null))
            }),
        );

        let reporter = Rc::clone(&self.reporter);
        functions.define(
            "print",
            Value::native("print", VARIADIC, move |args| {
                reporter.report(ActivityLevel::Info, &display_joined(args));
                Ok(Value::null())
            }),
        );

        for (name, function) in http::host_functions() {
            functions.define(name, function);
        }
        functions
    }
}
