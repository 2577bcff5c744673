//! One-time application initialization from `app.json` and the `app` bootstrap
//! module, merged into the scope shared by every evaluation.

use std::{
    fs,
    path::{Path, PathBuf},
};

use futures_util::future::LocalBoxFuture;
use indexmap::IndexMap;

use crate::{
    error::{HostError, Result},
    resolver::{FALLBACK_ROOT, SCRIPT_EXTENSION},
    scope::Scope,
    value::Value,
};

pub const CONFIG_FILE: &str = "app.json";
pub const BOOTSTRAP_MODULE: &str = "app";

pub type InitHook = Box<dyn FnOnce() -> Result<()>>;
pub type AsyncInitHook = Box<dyn FnOnce() -> LocalBoxFuture<'static, Result<()>>>;

/// A loaded bootstrap module: exported members plus up to two one-time hooks.
/// A hook that is absent, or already run, is `None`.
#[derive(Default)]
pub struct AppModule {
    exports: IndexMap<String, Value>,
    init: Option<InitHook>,
    init_async: Option<AsyncInitHook>,
}

impl AppModule {
    pub fn new(exports: IndexMap<String, Value>) -> Self {
        Self {
            exports,
            ..Self::default()
        }
    }

    pub fn with_init(mut self, hook: impl FnOnce() -> Result<()> + 'static) -> Self {
        self.init = Some(Box::new(hook));
        self
    }

    pub fn with_init_async(
        mut self,
        hook: impl FnOnce() -> LocalBoxFuture<'static, Result<()>> + 'static,
    ) -> Self {
        self.init_async = Some(Box::new(hook));
        self
    }

    pub fn exports(&self) -> &IndexMap<String, Value> {
        &self.exports
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_init_async(&self) -> bool {
        self.init_async.is_some()
    }
}

/// Turns the bootstrap module file into an [`AppModule`].
pub trait AppModuleLoader {
    fn load(&self, path: &Path) -> Result<AppModule>;
}

pub struct BootstrapLifecycle {
    working_root: PathBuf,
    module_file: String,
    loader: Box<dyn AppModuleLoader>,
    module: Option<AppModule>,
}

impl BootstrapLifecycle {
    pub fn new(working_root: impl Into<PathBuf>, loader: impl AppModuleLoader + 'static) -> Self {
        Self {
            working_root: working_root.into(),
            module_file: format!("{BOOTSTRAP_MODULE}.{SCRIPT_EXTENSION}"),
            loader: Box::new(loader),
            module: None,
        }
    }

    /// Merges `app.json` into `scope.app` and the bootstrap module's exports into
    /// `scope`. Hooks run on the first call only; the configuration is merged on
    /// every call.
    pub async fn initialize(&mut self, src_root: &str, scope: &mut Scope) -> Result<()> {
        if let Some(path) = self.locate(src_root, CONFIG_FILE) {
            let entries = read_config(&path)?;
            tracing::debug!(
                path = %path.display(),
                keys = entries.len(),
                "merging app configuration"
            );
            scope.merge_into("app", entries);
        }

        if self.module.is_none()
            && let Some(path) = self.locate(src_root, &self.module_file)
        {
            tracing::debug!(path = %path.display(), "loading bootstrap module");
            self.module = Some(self.loader.load(&path)?);
        }

        let Some(module) = self.module.as_mut() else {
            return Ok(());
        };
        if let Some(init) = module.init.take() {
            init()?;
        }
        if let Some(init_async) = module.init_async.take() {
            init_async().await?;
        }
        scope.merge(module.exports.clone());
        Ok(())
    }

    fn locate(&self, src_root: &str, file_name: &str) -> Option<PathBuf> {
        [
            format!("{src_root}{file_name}"),
            format!("{FALLBACK_ROOT}{file_name}"),
        ]
        .into_iter()
        .map(|candidate| self.working_root.join(candidate))
        .find(|path| path.is_file())
    }
}

fn read_config(path: &Path) -> Result<IndexMap<String, Value>> {
    let text = fs::read_to_string(path)?;
    let data: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| HostError::Config {
            path: path.to_path_buf(),
            source,
        })?;
    match Value::from(data).as_map() {
        Some(map) => Ok(map.clone()),
        None => Err(HostError::runtime(format!(
            "`{}` must contain a JSON object",
            path.display()
        ))),
    }
}
