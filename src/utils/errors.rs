use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DualpackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A source file the transform rule set could not compile
    #[error("Compile error in {}: {message}", path.display())]
    Compile { path: PathBuf, message: String },

    /// An import no alias, field or file could satisfy
    #[error("Module not found: '{request}' imported from {}", requester.display())]
    Resolution { request: String, requester: PathBuf },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The orchestrator observed a state no valid job can produce
    #[error("Build defect: {0}")]
    Defect(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("{0}")]
    Other(String),
}

impl DualpackError {
    pub fn compile(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Compile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn resolution(request: impl Into<String>, requester: impl Into<PathBuf>) -> Self {
        Self::Resolution {
            request: request.into(),
            requester: requester.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn defect(message: impl Into<String>) -> Self {
        Self::Defect(message.into())
    }

    /// File the error points at, if any. Used for problem markers.
    pub fn file(&self) -> Option<&PathBuf> {
        match self {
            Self::Compile { path, .. } => Some(path),
            Self::Resolution { requester, .. } => Some(requester),
            _ => None,
        }
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, Self::Compile { .. })
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, DualpackError>;

impl From<regex::Error> for DualpackError {
    fn from(err: regex::Error) -> Self {
        DualpackError::config(format!("Invalid rule pattern: {}", err))
    }
}

impl From<serde_json::Error> for DualpackError {
    fn from(err: serde_json::Error) -> Self {
        DualpackError::config(format!("Invalid JSON: {}", err))
    }
}

/// Every error one build job surfaced, tagged with the job's target.
#[derive(Debug)]
pub struct JobFailure {
    pub target: String,
    pub errors: Vec<DualpackError>,
}

impl JobFailure {
    pub fn new(target: impl Into<String>, errors: Vec<DualpackError>) -> Self {
        Self {
            target: target.into(),
            errors,
        }
    }

    pub fn single(target: impl Into<String>, error: DualpackError) -> Self {
        Self::new(target, vec![error])
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target '{}' failed with {} error(s)", self.target, self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  [{}] {}", self.target, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for JobFailure {}
