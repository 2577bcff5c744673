use std::fs;

use crate::{error::Result, log::SinkRef, resolver::PathResolver};

/// Supplies source text for script-level `import` statements.
///
/// Nothing is cached: every import reads the file again.
pub struct ModuleLoader {
    resolver: PathResolver,
    src_root: String,
    sink: SinkRef,
}

impl ModuleLoader {
    pub fn new(resolver: PathResolver, src_root: impl Into<String>, sink: SinkRef) -> Self {
        Self {
            resolver,
            src_root: src_root.into(),
            sink,
        }
    }

    pub fn load(&self, module_path: &str) -> Result<String> {
        self.read(module_path).map_err(|err| {
            self.sink.error(&format!("* module loader error {err}"));
            err
        })
    }

    fn read(&self, module_path: &str) -> Result<String> {
        let path = self.resolver.resolve(module_path, &self.src_root)?;
        Ok(fs::read_to_string(path)?)
    }
}
