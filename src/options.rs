//! Command-line options for the `jspy` binary.
//!
//! Recognized flags go through clap. Every other `--key=value` or bare `--flag`
//! token is collected into the free-form parameter map scripts read through
//! `params(name)`.

use std::{ffi::OsString, path::PathBuf};

use clap::Parser;
use indexmap::IndexMap;

use crate::{adapter::AdapterOptions, resolver::normalize_root, value::Value};

const KNOWN_LONG: &[&str] = &[
    "file",
    "srcRoot",
    "entryFunction",
    "version",
    "output",
    "help",
];

#[derive(Parser, Debug, Default)]
#[command(name = "jspy", about = "Run JSPython scripts from the command line")]
pub struct CliArgs {
    /// Script to run, relative to the source root
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,
    /// Source root prefix for the script, imports and app.json
    #[arg(short = 's', long = "srcRoot")]
    pub src_root: Option<String>,
    /// Function to call after the script has run
    #[arg(short = 'e', long = "entryFunction")]
    pub entry_function: Option<String>,
    /// Print version information
    #[arg(short = 'v', long = "version")]
    pub version: bool,
    /// Also write all output to this file, with colors stripped
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Script to run when `--file` is not given
    pub script: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub file: Option<String>,
    pub src_root: String,
    pub entry_function: Option<String>,
    pub version: bool,
    pub output: Option<PathBuf>,
    pub params: IndexMap<String, Value>,
}

impl CliOptions {
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from(std::env::args_os())
    }

    /// `args` includes the program name, as with [`std::env::args_os`].
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let (known, params) = partition(args.into_iter().map(Into::into));
        let cli = CliArgs::try_parse_from(known)?;
        Ok(Self::from_parts(cli, params))
    }

    fn from_parts(cli: CliArgs, free: IndexMap<String, Value>) -> Self {
        let file = cli.file.or(cli.script);
        let src_root = normalize_root(cli.src_root.as_deref().unwrap_or_default());

        let mut params = IndexMap::new();
        if let Some(file) = &file {
            params.insert("file".to_string(), Value::string(file.as_str()));
        }
        if !src_root.is_empty() {
            params.insert("srcRoot".to_string(), Value::string(src_root.as_str()));
        }
        if let Some(entry) = &cli.entry_function {
            params.insert("entryFunction".to_string(), Value::string(entry.as_str()));
        }
        if let Some(output) = &cli.output {
            params.insert(
                "output".to_string(),
                Value::string(output.display().to_string()),
            );
        }
        if cli.version {
            params.insert("version".to_string(), Value::bool(true));
        }
        params.extend(free);

        Self {
            file,
            src_root,
            entry_function: cli.entry_function,
            version: cli.version,
            output: cli.output,
            params,
        }
    }

    /// Adapter options rooted at `working_root`.
    pub fn adapter_options(&self, working_root: impl Into<PathBuf>) -> AdapterOptions {
        AdapterOptions {
            working_root: working_root.into(),
            src_root: self.src_root.clone(),
            entry_function: self.entry_function.clone(),
            params: self.params.clone(),
        }
    }
}

/// Splits raw arguments into the ones clap understands and free-form parameters.
fn partition(args: impl Iterator<Item = OsString>) -> (Vec<OsString>, IndexMap<String, Value>) {
    let mut known = Vec::new();
    let mut params = IndexMap::new();
    for arg in args {
        let Some(param) = arg.to_str().and_then(free_param) else {
            known.push(arg);
            continue;
        };
        params.insert(param.0, param.1);
    }
    (known, params)
}

fn free_param(arg: &str) -> Option<(String, Value)> {
    let body = arg.strip_prefix("--")?;
    let (key, value) = match body.split_once('=') {
        Some((key, value)) => (key, Value::string(value)),
        None => (body, Value::bool(true)),
    };
    if key.is_empty() || KNOWN_LONG.contains(&key) {
        return None;
    }
    Some((key.to_string(), value))
}
