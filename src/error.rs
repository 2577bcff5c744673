use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the host adapter.
#[derive(Debug, Error)]
pub enum HostError {
    /// A module or package was not found after the whole fallback chain.
    #[error("cannot resolve `{name}` (tried: {})", display_candidates(.tried))]
    Resolution { name: String, tried: Vec<PathBuf> },
    /// Loading a package failed; the cause is kept for the caller.
    #[error("cannot import `{package}`: {source}")]
    Import {
        package: String,
        #[source]
        source: Box<HostError>,
    },
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("{0}")]
    Evaluation(String),
    #[error("invalid configuration in `{}`: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Runtime(String),
    #[error("http request to `{url}` failed: {message}")]
    Http { url: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    pub fn import(package: impl Into<String>, source: HostError) -> Self {
        Self::Import {
            package: package.into(),
            source: Box::new(source),
        }
    }

    /// The innermost message, without the import wrapper.
    pub fn root_message(&self) -> String {
        match self {
            Self::Import { source, .. } => source.root_message(),
            other => other.to_string(),
        }
    }
}

fn display_candidates(tried: &[PathBuf]) -> String {
    tried
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, HostError>;
