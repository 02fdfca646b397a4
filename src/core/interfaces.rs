use crate::core::models::*;
use crate::core::orchestrator::BuildJob;
use crate::utils::{JobFailure, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    /// Regular files directly inside `dir`, sorted. A missing directory is empty.
    async fn list_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    async fn remove_file(&self, path: &Path) -> Result<()>;
    fn file_exists(&self, path: &Path) -> bool;
}

/// A compiler capability a transform rule delegates to.
///
/// Takes raw source text plus the rule's options and returns compiled text
/// with an optional source map pointing back at `file`.
pub trait SourceCompiler: Send + Sync {
    fn name(&self) -> &str;
    fn compile(
        &self,
        file: &SourceFile,
        source: &str,
        options: &CompilerOptions,
    ) -> Result<CompiledModule>;
}

/// Executes one build job in isolation.
#[async_trait]
pub trait BuildService: Send + Sync {
    async fn run_job(&self, job: &BuildJob) -> std::result::Result<JobArtifacts, JobFailure>;
}
