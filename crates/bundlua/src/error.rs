//! Error taxonomy for bundling
//!
//! Every variant is fatal. Dynamic `require` calls are not errors; they are
//! collected as [`crate::visitors::DynamicReference`] records instead.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::lexer::SourceLocation;

pub type BundleResult<T> = Result<T, BundleError>;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("entry file not found: {}", .path.display())]
    EntryNotFound { path: PathBuf },

    #[error("module '{module}' not found:{}", AttemptedPaths(.attempted))]
    ModuleNotFound {
        module: String,
        attempted: Vec<PathBuf>,
    },

    #[error(
        "module '{module}' required by '{referenced_from}' at {location} could not be \
         resolved:{}",
        AttemptedPaths(.attempted)
    )]
    UnresolvedModule {
        module: String,
        referenced_from: String,
        location: SourceLocation,
        attempted: Vec<PathBuf>,
    },

    #[error("module name '{name}' refers to two files: {} and {}", .first.display(), .second.display())]
    CanonicalNameConflict {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("invalid search path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("syntax error in '{module}' at {location}: {message}")]
    Syntax {
        module: String,
        location: SourceLocation,
        message: String,
    },

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write bundle to {}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode bundle metadata")]
    Metadata(#[from] serde_json::Error),

    #[error("invalid configuration in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl BundleError {
    /// Name of the module the error is about, when there is one
    pub fn module_name(&self) -> Option<&str> {
        match self {
            Self::ModuleNotFound { module, .. } | Self::UnresolvedModule { module, .. } => {
                Some(module)
            }
            Self::Syntax { module, .. } => Some(module),
            Self::CanonicalNameConflict { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Renders the attempted paths as an indented list
struct AttemptedPaths<'a>(&'a [PathBuf]);

impl fmt::Display for AttemptedPaths<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(" no search paths configured");
        }
        for path in self.0 {
            write!(f, "\n    no file '{}'", path.display())?;
        }
        Ok(())
    }
}
