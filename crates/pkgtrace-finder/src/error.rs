//! Errors raised by the finders

use std::io;
use std::path::PathBuf;

use pkgtrace_packages::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("The target entry-point \"{name}\" has missing dependencies:\n{}", list_missing(.missing))]
    MissingTargetDependencies { name: String, missing: Vec<String> },
    #[error("The entry-point manifest at {} is invalid: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },
    #[error("failed to encode entry-point manifest: {0}")]
    Json(#[from] serde_json::Error),
}

fn list_missing(missing: &[String]) -> String {
    missing.iter().map(|dep| format!(" - {}\n", dep)).collect()
}

impl FinderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FinderError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_dependencies_message() {
        let error = FinderError::MissingTargetDependencies {
            name: "lib".to_string(),
            missing: vec!["missing-a".to_string(), "missing-b".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "The target entry-point \"lib\" has missing dependencies:\n - missing-a\n - missing-b\n"
        );
    }
}
