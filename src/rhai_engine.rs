//! [`Interpreter`] binding for the `rhai` embeddable engine.
//!
//! Host values cross the boundary as [`Dynamic`]s; host functions become
//! engine functions, packages and script imports become engine modules.

use std::{fmt, fs, path::Path, rc::Rc};

use futures_util::FutureExt;
use indexmap::IndexMap;
use rhai::{
    AST, CallFnOptions, Dynamic, Engine, EvalAltResult, FnAccess, FnPtr, Map, Module,
    ModuleResolver, NativeCallContext, Position, Scope as ScriptScope, Shared,
};

use crate::{
    adapter::{Interpreter, ModuleLoaderFn, PackageLoaderFn},
    assert::{AssertChain, Operand},
    bootstrap::{AppModule, AppModuleLoader},
    error::{HostError, Result},
    log::SinkRef,
    packages::{LoadedModule, PackageHandle},
    resolver::SCRIPT_EXTENSION,
    scope::Scope,
    value::{NativeFunction, VARIADIC, Value, ValueKind},
};

type ScriptResult<T> = std::result::Result<T, Box<EvalAltResult>>;

/// Variadic host functions are registered for every argument count up to this.
pub const MAX_VARIADIC_ARGS: usize = 4;

pub const INIT_HOOK: &str = "_init";
pub const INIT_ASYNC_HOOK: &str = "_initAsync";

/// Name prefix the engine gives closures compiled into a script.
const ANONYMOUS_FN_PREFIX: &str = "anon$";

/// Scope members handled by the engine itself rather than registered as functions.
const ENGINE_HANDLED: &[&str] = &["print"];

#[derive(Default)]
pub struct RhaiInterpreter {
    modules: Option<ModuleLoaderFn>,
    packages: Option<PackageLoaderFn>,
}

impl RhaiInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_engine(&self, scope: &Scope) -> Engine {
        let mut engine = Engine::new();
        engine.set_module_resolver(HostModuleResolver {
            modules: self.modules.clone(),
            packages: self.packages.clone(),
        });
        register_assert_api(&mut engine);

        let mut globals = Module::new();
        for (name, value) in scope.iter() {
            if let Some(function) = value.as_function()
                && !ENGINE_HANDLED.contains(&name.as_str())
            {
                install_function(&mut globals, name, function);
            }
        }
        globals.build_index();
        engine.register_global_module(globals.into());

        if let Some(print) = scope.get("print").and_then(Value::as_function).cloned() {
            engine.on_print(move |text| {
                if let Err(err) = print.call(&[Value::string(text)]) {
                    tracing::warn!(error = %err, "print failed");
                }
            });
        }
        engine
    }
}

impl Interpreter for RhaiInterpreter {
    fn info(&self) -> String {
        format!("jspy host v{} (rhai engine)", env!("CARGO_PKG_VERSION"))
    }

    fn register_module_loader(&mut self, loader: ModuleLoaderFn) {
        self.modules = Some(loader);
    }

    fn register_packages_loader(&mut self, loader: PackageLoaderFn) {
        self.packages = Some(loader);
    }

    async fn evaluate(
        &mut self,
        script: &str,
        scope: Scope,
        entry_function: Option<&str>,
        module_name: Option<&str>,
    ) -> Result<Value> {
        let engine = self.build_engine(&scope);
        let mut variables = ScriptScope::new();
        for (name, value) in scope.iter() {
            if value.as_function().is_none() {
                variables.push_dynamic(name.as_str(), to_dynamic(value));
            }
        }

        let mut ast = engine.compile(script).map_err(evaluation_error)?;
        if let Some(name) = module_name {
            ast.set_source(name);
        }
        tracing::debug!(
            module = module_name,
            entry = entry_function,
            "evaluating script"
        );

        let result = match entry_function {
            Some(entry) => engine.call_fn::<Dynamic>(&mut variables, &ast, entry, ()),
            None => engine.eval_ast_with_scope::<Dynamic>(&mut variables, &ast),
        };
        result.map(from_dynamic).map_err(evaluation_error)
    }
}

/// Routes `import` statements to the host's module and package loaders.
struct HostModuleResolver {
    modules: Option<ModuleLoaderFn>,
    packages: Option<PackageLoaderFn>,
}

impl HostModuleResolver {
    fn load_script(&self, engine: &Engine, path: &str, pos: Position) -> ScriptResult<Module> {
        let loader = self
            .modules
            .as_ref()
            .ok_or_else(|| EvalAltResult::ErrorModuleNotFound(path.to_string(), pos))?;
        let source = loader(path).map_err(|err| script_error(err, pos))?;
        compile_module(engine, path, &source)
    }

    fn load_package(&self, engine: &Engine, name: &str, pos: Position) -> ScriptResult<Module> {
        let loader = self
            .packages
            .as_ref()
            .ok_or_else(|| EvalAltResult::ErrorModuleNotFound(name.to_string(), pos))?;
        match loader(name).map_err(|err| script_error(err, pos))? {
            PackageHandle::System(module) => Ok(module_from_exports(&module.exports)),
            PackageHandle::LocalFile(loaded) | PackageHandle::ThirdParty(loaded) => match loaded {
                LoadedModule::Data(data) => Ok(data_module(&data)),
                LoadedModule::Script { path, source } => {
                    compile_module(engine, &path.display().to_string(), &source)
                }
            },
        }
    }
}

impl ModuleResolver for HostModuleResolver {
    fn resolve(
        &self,
        engine: &Engine,
        _source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> ScriptResult<Shared<Module>> {
        let module = if is_script_import(path) {
            self.load_script(engine, path, pos)?
        } else {
            self.load_package(engine, path, pos)?
        };
        Ok(module.into())
    }
}

fn is_script_import(path: &str) -> bool {
    path.ends_with(&format!(".{SCRIPT_EXTENSION}"))
        || path.starts_with('/')
        || path.starts_with('.')
}

fn compile_module(engine: &Engine, label: &str, source: &str) -> ScriptResult<Module> {
    let mut ast = engine.compile(source)?;
    ast.set_source(label);
    Module::eval_ast_as_new(ScriptScope::new(), &ast, engine)
}

fn module_from_exports<'a>(exports: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Module {
    let mut module = Module::new();
    for (name, value) in exports {
        match value.as_function() {
            Some(function) => install_function(&mut module, name, function),
            None => {
                module.set_var(name.as_str(), to_dynamic(value));
            }
        }
    }
    module.build_index();
    module
}

/// Map data becomes one variable per key; anything else is exposed as `value`.
fn data_module(data: &Value) -> Module {
    match data.as_map() {
        Some(map) => module_from_exports(map),
        None => {
            let mut module = Module::new();
            module.set_var("value", to_dynamic(data));
            module.build_index();
            module
        }
    }
}

fn install_function(module: &mut Module, name: &str, function: &NativeFunction) {
    let arities = if function.arity == VARIADIC {
        0..=MAX_VARIADIC_ARGS
    } else {
        function.arity..=function.arity
    };
    for arity in arities {
        let f = function.clone();
        match arity {
            0 => {
                module.set_native_fn(name, move || call_native(&f, Vec::new()));
            }
            1 => {
                module.set_native_fn(name, move |a: Dynamic| call_native(&f, vec![a]));
            }
            2 => {
                module.set_native_fn(name, move |a: Dynamic, b: Dynamic| {
                    call_native(&f, vec![a, b])
                });
            }
            3 => {
                module.set_native_fn(name, move |a: Dynamic, b: Dynamic, c: Dynamic| {
                    call_native(&f, vec![a, b, c])
                });
            }
            4 => {
                module.set_native_fn(
                    name,
                    move |a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
                        call_native(&f, vec![a, b, c, d])
                    },
                );
            }
            _ => tracing::warn!(
                function = name,
                arity,
                "arity not supported by the rhai binding"
            ),
        }
    }
}

fn call_native(function: &NativeFunction, args: Vec<Dynamic>) -> ScriptResult<Dynamic> {
    let args: Vec<Value> = args.into_iter().map(from_dynamic).collect();
    let result = function.call(&args).map_err(|err| err.to_string())?;
    Ok(to_dynamic(&result))
}

type UnaryCheck = for<'a> fn(&AssertChain, Operand<'a>) -> Result<()>;
type BinaryCheck = for<'a> fn(&AssertChain, Operand<'a>, Operand<'a>) -> Result<()>;
type TernaryCheck = for<'a> fn(&AssertChain, Operand<'a>, Operand<'a>, Operand<'a>) -> Result<()>;

fn register_assert_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<AssertChain>("Assert")
        .register_get("name", |chain: &mut AssertChain| chain.name())
        .register_get("status", |chain: &mut AssertChain| chain.status())
        .register_get("message", |chain: &mut AssertChain| {
            chain.message().map_or(Dynamic::UNIT, Dynamic::from)
        });

    register_binary(engine, "equal", |chain, a, b| chain.equal(a, b).map(drop));
    register_binary(engine, "notEqual", |chain, a, b| chain.not_equal(a, b).map(drop));
    register_unary(engine, "isTrue", |chain, v| chain.is_true(v).map(drop));
    register_unary(engine, "isFalse", |chain, v| chain.is_false(v).map(drop));
    register_binary(engine, "greaterThan", |chain, a, b| {
        chain.greater_than(a, b).map(drop)
    });
    register_binary(engine, "greaterOrEqualThan", |chain, a, b| {
        chain.greater_or_equal_than(a, b).map(drop)
    });
    register_binary(engine, "lessThan", |chain, a, b| chain.less_than(a, b).map(drop));
    register_binary(engine, "lessOrEqualThan", |chain, a, b| {
        chain.less_or_equal_than(a, b).map(drop)
    });
    register_ternary(engine, "between", |chain, v, min, max| {
        chain.between(v, min, max).map(drop)
    });
    register_ternary(engine, "inRange", |chain, v, min, max| {
        chain.in_range(v, min, max).map(drop)
    });
}

fn register_unary(engine: &mut Engine, name: &str, check: UnaryCheck) {
    engine.register_fn(
        name,
        move |ctx: NativeCallContext,
              chain: &mut AssertChain,
              value: Dynamic|
              -> ScriptResult<AssertChain> {
            check(chain, operand(&ctx, value)).map_err(|err| err.to_string())?;
            Ok(chain.clone())
        },
    );
}

fn register_binary(engine: &mut Engine, name: &str, check: BinaryCheck) {
    engine.register_fn(
        name,
        move |ctx: NativeCallContext,
              chain: &mut AssertChain,
              left: Dynamic,
              right: Dynamic|
              -> ScriptResult<AssertChain> {
            check(chain, operand(&ctx, left), operand(&ctx, right))
                .map_err(|err| err.to_string())?;
            Ok(chain.clone())
        },
    );
}

fn register_ternary(engine: &mut Engine, name: &str, check: TernaryCheck) {
    engine.register_fn(
        name,
        move |ctx: NativeCallContext,
              chain: &mut AssertChain,
              value: Dynamic,
              min: Dynamic,
              max: Dynamic|
              -> ScriptResult<AssertChain> {
            check(
                chain,
                operand(&ctx, value),
                operand(&ctx, min),
                operand(&ctx, max),
            )
            .map_err(|err| err.to_string())?;
            Ok(chain.clone())
        },
    );
}

/// Closures are kept unevaluated and called with the chain's data context.
fn operand<'a>(ctx: &'a NativeCallContext<'_>, value: Dynamic) -> Operand<'a> {
    match value.clone().try_cast::<FnPtr>() {
        Some(function) => Operand::lazy(move |data| {
            function
                .call_within_context::<Dynamic>(ctx, (to_dynamic(data),))
                .map(from_dynamic)
                .map_err(evaluation_error)
        }),
        None => Operand::from(from_dynamic(value)),
    }
}

pub fn to_dynamic(value: &Value) -> Dynamic {
    match value.kind() {
        ValueKind::Null => Dynamic::UNIT,
        ValueKind::Bool(b) => Dynamic::from(*b),
        ValueKind::Int(n) => Dynamic::from(*n),
        ValueKind::Float(f) => Dynamic::from(*f),
        ValueKind::String(s) => Dynamic::from(s.clone()),
        ValueKind::Array(values) => Dynamic::from_array(values.iter().map(to_dynamic).collect()),
        ValueKind::Map(map) => Dynamic::from_map(
            map.iter()
                .map(|(key, value)| (key.as_str().into(), to_dynamic(value)))
                .collect(),
        ),
        ValueKind::Module(module) => Dynamic::from_map(
            module
                .exports
                .iter()
                .map(|(key, value)| (key.as_str().into(), to_dynamic(value)))
                .collect(),
        ),
        ValueKind::NativeFunction(function) => Dynamic::from(function.clone()),
        ValueKind::Assert(chain) => Dynamic::from(chain.clone()),
    }
}

pub fn from_dynamic(value: Dynamic) -> Value {
    if value.is_unit() {
        Value::null()
    } else if let Ok(b) = value.as_bool() {
        Value::bool(b)
    } else if let Ok(n) = value.as_int() {
        Value::int(n)
    } else if let Ok(f) = value.as_float() {
        Value::float(f)
    } else if let Ok(c) = value.as_char() {
        Value::string(c)
    } else if value.is_string() {
        Value::string(value.into_string().unwrap_or_default())
    } else if value.is_array() {
        let values = value.into_array().unwrap_or_default();
        Value::array(values.into_iter().map(from_dynamic).collect())
    } else if value.is_map() {
        let map = value.try_cast::<Map>().unwrap_or_default();
        Value::map(
            map.into_iter()
                .map(|(key, value)| (key.to_string(), from_dynamic(value)))
                .collect(),
        )
    } else if value.is::<AssertChain>() {
        value
            .try_cast::<AssertChain>()
            .map_or_else(Value::null, Value::assert_chain)
    } else if value.is::<NativeFunction>() {
        value.try_cast::<NativeFunction>().map_or_else(Value::null, |function| {
            Value::new(ValueKind::NativeFunction(function))
        })
    } else {
        Value::string(value.to_string())
    }
}

fn evaluation_error(err: impl fmt::Display) -> HostError {
    HostError::Evaluation(err.to_string())
}

fn script_error(err: impl fmt::Display, pos: Position) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(err.to_string().into(), pos).into()
}

/// Compiles `app.jspy` as a module: exported variables and public functions
/// become bootstrap scope members, `_init` and `_initAsync` become the one-time
/// hooks.
pub struct RhaiAppLoader {
    sink: SinkRef,
}

impl RhaiAppLoader {
    pub fn new(sink: SinkRef) -> Self {
        Self { sink }
    }
}

impl AppModuleLoader for RhaiAppLoader {
    fn load(&self, path: &Path) -> Result<AppModule> {
        let source = fs::read_to_string(path)?;
        let mut engine = Engine::new();
        let sink = Rc::clone(&self.sink);
        engine.on_print(move |text| sink.info(text));

        let mut ast = engine.compile(&source).map_err(evaluation_error)?;
        ast.set_source(path.display().to_string());
        let module =
            Module::eval_ast_as_new(ScriptScope::new(), &ast, &engine).map_err(evaluation_error)?;
        let mut exports: IndexMap<String, Value> = module
            .iter_var()
            .map(|(name, value)| (name.to_string(), from_dynamic(value.clone())))
            .collect();

        let defines = |hook: &str| ast.iter_functions().any(|function| function.name == hook);
        let has_init = defines(INIT_HOOK);
        let has_init_async = defines(INIT_ASYNC_HOOK);
        let functions: Vec<(String, usize)> = ast
            .iter_functions()
            .filter(|function| is_exported_function(function.name, function.access))
            .map(|function| (function.name.to_string(), function.params.len()))
            .collect();

        let engine = Rc::new(engine);
        let ast = Rc::new(ast);
        for (name, arity) in functions {
            let function = script_function(&engine, &ast, &name, arity);
            exports.insert(name, function);
        }

        let mut app = AppModule::new(exports);
        if has_init {
            let (engine, ast) = (Rc::clone(&engine), Rc::clone(&ast));
            app = app.with_init(move || call_hook(&engine, &ast, INIT_HOOK));
        }
        if has_init_async {
            app = app.with_init_async(move || {
                async move { call_hook(&engine, &ast, INIT_ASYNC_HOOK) }.boxed_local()
            });
        }
        Ok(app)
    }
}

fn is_exported_function(name: &str, access: FnAccess) -> bool {
    access != FnAccess::Private
        && name != INIT_HOOK
        && name != INIT_ASYNC_HOOK
        && !name.starts_with(ANONYMOUS_FN_PREFIX)
}

/// A script function callable from any later evaluation as a host function.
fn script_function(engine: &Rc<Engine>, ast: &Rc<AST>, name: &str, arity: usize) -> Value {
    let (engine, ast, function) = (Rc::clone(engine), Rc::clone(ast), name.to_string());
    Value::native(name, arity, move |args| {
        let args = args.iter().map(to_dynamic).collect();
        call_script_fn(&engine, &ast, &function, args)
    })
}

fn call_hook(engine: &Engine, ast: &AST, name: &str) -> Result<()> {
    call_script_fn(engine, ast, name, Vec::new()).map(drop)
}

/// Calls a function without re-running the module's top-level statements.
fn call_script_fn(engine: &Engine, ast: &AST, name: &str, args: Vec<Dynamic>) -> Result<Value> {
    let options = CallFnOptions::new().eval_ast(false);
    engine
        .call_fn_with_options::<Dynamic>(options, &mut ScriptScope::new(), ast, name, args)
        .map(from_dynamic)
        .map_err(evaluation_error)
}
