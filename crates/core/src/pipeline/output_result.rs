use std::path::{Path, PathBuf};

use crate::shared::error::AnonymizeError;

/// The single value an anonymization job reports back to its caller.
#[derive(Debug)]
pub enum OutputResult {
    /// The anonymized file, complete and verified.
    Success { path: PathBuf },
    Failed { error: AnonymizeError },
    /// Stopped on request; no output file is left behind.
    Cancelled,
}

impl OutputResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OutputResult::Success { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            OutputResult::Success { path } => Some(path),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AnonymizeError> {
        match self {
            OutputResult::Failed { error } => Some(error),
            _ => None,
        }
    }
}
