//! Native package loading: trusted system capabilities, local file modules and
//! third-party dependencies.

mod capabilities;

use std::{
    fs,
    path::{Path, PathBuf},
};

pub(crate) use capabilities::display_joined;
pub use capabilities::{CapabilityRegistry, Provider};

use crate::{
    error::{HostError, Result},
    log::SinkRef,
    resolver::SCRIPT_EXTENSION,
    value::{ModuleValue, Value},
};

pub const DATA_EXTENSION: &str = "json";
pub const DEPENDENCY_DIR: &str = "jspy_modules";

/// Contents of a package that lives on disk.
#[derive(Debug, Clone)]
pub enum LoadedModule {
    Data(Value),
    Script { path: PathBuf, source: String },
}

pub enum PackageHandle {
    System(ModuleValue),
    LocalFile(LoadedModule),
    ThirdParty(LoadedModule),
}

impl PackageHandle {
    pub fn kind(&self) -> PackageKind {
        match self {
            Self::System(_) => PackageKind::System,
            Self::LocalFile(_) => PackageKind::LocalFile,
            Self::ThirdParty(_) => PackageKind::ThirdParty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    System,
    LocalFile,
    ThirdParty,
}

/// Strategy for turning a package path into a loaded module.
pub trait ModuleProvider {
    fn load(&self, path: &Path) -> Result<LoadedModule>;
}

/// Reads a single file: `.json` as data, anything else as script source.
#[derive(Debug, Default)]
pub struct FileModuleProvider;

impl ModuleProvider for FileModuleProvider {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        let source = fs::read_to_string(path)?;
        if has_extension(&path.to_string_lossy(), DATA_EXTENSION) {
            let data: serde_json::Value =
                serde_json::from_str(&source).map_err(|source| HostError::Config {
                    path: path.to_path_buf(),
                    source,
                })?;
            return Ok(LoadedModule::Data(Value::from(data)));
        }
        Ok(LoadedModule::Script {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loads a dependency that is either a file or a directory with an index module.
#[derive(Debug, Default)]
pub struct DependencyDirProvider;

impl ModuleProvider for DependencyDirProvider {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        if path.is_file() {
            return FileModuleProvider.load(path);
        }
        let candidates = vec![
            path.join(format!("index.{SCRIPT_EXTENSION}")),
            path.join(format!("index.{DATA_EXTENSION}")),
        ];
        match candidates.iter().find(|candidate| candidate.is_file()) {
            Some(index) => FileModuleProvider.load(index),
            None => Err(HostError::Resolution {
                name: path.display().to_string(),
                tried: candidates,
            }),
        }
    }
}

pub struct PackageGateway {
    registry: CapabilityRegistry,
    local: Box<dyn ModuleProvider>,
    third_party: Box<dyn ModuleProvider>,
    working_root: PathBuf,
    src_root: String,
    dependency_dir: String,
    sink: SinkRef,
}

impl PackageGateway {
    pub fn new(
        working_root: impl Into<PathBuf>,
        src_root: impl Into<String>,
        sink: SinkRef,
    ) -> Self {
        Self {
            registry: CapabilityRegistry::with_defaults(),
            local: Box::new(FileModuleProvider),
            third_party: Box::new(DependencyDirProvider),
            working_root: working_root.into(),
            src_root: src_root.into(),
            dependency_dir: DEPENDENCY_DIR.to_string(),
            sink,
        }
    }

    pub fn with_registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_local_provider(mut self, provider: impl ModuleProvider + 'static) -> Self {
        self.local = Box::new(provider);
        self
    }

    pub fn with_third_party_provider(mut self, provider: impl ModuleProvider + 'static) -> Self {
        self.third_party = Box::new(provider);
        self
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn classify(&self, package_name: &str) -> PackageKind {
        if self.registry.contains(package_name) {
            PackageKind::System
        } else if has_extension(package_name, SCRIPT_EXTENSION)
            || has_extension(package_name, DATA_EXTENSION)
        {
            PackageKind::LocalFile
        } else {
            PackageKind::ThirdParty
        }
    }

    /// Failures are reported to the sink and returned wrapped in
    /// [`HostError::Import`].
    pub fn load(&self, package_name: &str) -> Result<PackageHandle> {
        let kind = self.classify(package_name);
        tracing::debug!(package = package_name, ?kind, "loading package");
        self.load_as(kind, package_name).map_err(|err| {
            self.sink.error(&format!("Import Error: {package_name}: {err}"));
            HostError::import(package_name, err)
        })
    }

    fn load_as(&self, kind: PackageKind, package_name: &str) -> Result<PackageHandle> {
        match kind {
            PackageKind::System => self
                .registry
                .load(package_name, &self.sink)
                .map(PackageHandle::System)
                .ok_or_else(|| {
                    HostError::runtime(format!("no provider for system package `{package_name}`"))
                }),
            PackageKind::LocalFile => {
                let path = self
                    .working_root
                    .join(format!("{}{package_name}", self.src_root));
                self.local.load(&path).map(PackageHandle::LocalFile)
            }
            PackageKind::ThirdParty => {
                let path = self
                    .working_root
                    .join(&self.dependency_dir)
                    .join(package_name);
                self.third_party.load(&path).map(PackageHandle::ThirdParty)
            }
        }
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    name.to_ascii_lowercase().ends_with(&format!(".{extension}"))
}
