//! Host adapter that embeds a JSPython-style interpreter in a command-line
//! runtime. Provides module resolution, native package loading, script
//! assertions, output redirection and one-time application bootstrap around an
//! interpreter that implements [`Interpreter`].

pub mod adapter;
pub mod assert;
pub mod bootstrap;
pub mod error;
pub mod http;
pub mod log;
pub mod module_loader;
pub mod options;
pub mod packages;
pub mod resolver;
pub mod rhai_engine;
pub mod scope;
pub mod value;

pub use adapter::{AdapterOptions, HostAdapter, Interpreter};
pub use assert::{AssertChain, AssertEngine, AssertLedger, AssertRecord};
pub use bootstrap::{AppModule, AppModuleLoader, BootstrapLifecycle};
pub use error::{HostError, Result};
pub use log::{LogSink, Reporter, TeeSink, TerminalSink};
pub use module_loader::ModuleLoader;
pub use options::CliOptions;
pub use packages::{PackageGateway, PackageHandle, PackageKind};
pub use resolver::PathResolver;
pub use rhai_engine::{RhaiAppLoader, RhaiInterpreter};
pub use scope::Scope;
pub use value::{Value, ValueKind};
