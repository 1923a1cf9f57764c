use std::{
    io,
    path::{Path, PathBuf},
    process::ExitStatus,
};

use crate::results::ComparisonPoint;

/// Errors produced by the pipeline driver and the result plotter.
#[derive(Debug)]
pub enum Error {
    /// A required input file does not exist.
    MissingFile(PathBuf),
    /// A required input directory does not exist.
    MissingDirectory(PathBuf),
    /// An external tool exited unsuccessfully.
    ToolFailed { program: PathBuf, status: ExitStatus },
    /// A result file line could not be parsed.
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    /// A comparison point did not match exactly one result record.
    Cardinality {
        path: PathBuf,
        point: ComparisonPoint,
        matches: usize,
    },
    InvalidInput(String),
    Render(String),
    Config(serde_json::Error),
    Io(io::Error),
}

impl Error {
    pub(crate) fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }

    /// Process exit status to report for this error.
    ///
    /// Tool failures propagate the tool's own status; everything else exits with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ToolFailed { status, .. } => status
                .code()
                .and_then(|c| u8::try_from(c).ok())
                .filter(|c| *c != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFile(p) => write!(f, "file {} does not exist", p.display()),
            Self::MissingDirectory(p) => write!(f, "directory {} does not exist", p.display()),
            Self::ToolFailed { program, status } => {
                write!(f, "{} failed: {status}", program.display())
            }
            Self::Malformed { path, line, reason } => {
                write!(f, "{}:{line}: malformed result record: {reason}", path.display())
            }
            Self::Cardinality {
                path,
                point,
                matches,
            } => write!(
                f,
                "{}: expected exactly one record for {point}, found {matches}",
                path.display()
            ),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Render(msg) => write!(f, "chart rendering failed: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
