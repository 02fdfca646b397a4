use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable that switches a build into release mode.
pub const OPTIMIZATION_ENV_VAR: &str = "production";

/// An input file. Never mutated by a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    pub path: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }

    pub fn module_type(&self) -> ModuleType {
        ModuleType::from_extension(self.extension().unwrap_or(""))
    }

    /// Path with forward slashes, used for pattern matching on every platform.
    pub fn normalized_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleType {
    JavaScript,
    TypeScript,
    Json,
    Unknown,
}

impl ModuleType {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" | "jsx" => ModuleType::JavaScript,
            "ts" | "mts" | "cts" | "tsx" => ModuleType::TypeScript,
            "json" => ModuleType::Json,
            _ => ModuleType::Unknown,
        }
    }
}

/// Host environment a target runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeKind {
    /// Worker-style host: no file system, no process APIs.
    Sandboxed,
    /// Host process with full system access.
    FullAccess,
}

impl RuntimeKind {
    /// Whether host built-in modules (`fs`, `path`, `node:*`) may be required.
    pub fn permits_host_builtins(self) -> bool {
        matches!(self, RuntimeKind::FullAccess)
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Sandboxed => write!(f, "sandboxed"),
            RuntimeKind::FullAccess => write!(f, "full-access"),
        }
    }
}

/// How the entry module's exports are handed to the host loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Each export assigned onto the host's `exports` object.
    CommonJs,
    /// The export object replaces `module.exports`.
    CommonJs2,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::CommonJs => write!(f, "commonjs"),
            OutputFormat::CommonJs2 => write!(f, "commonjs2"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkPolicy {
    /// Dynamic imports may be emitted as separate lazily-loaded files.
    Unconstrained,
    /// Everything reachable from the entry lands in one file.
    SingleUnitOnly,
}

impl ChunkPolicy {
    pub fn max_files(self) -> Option<usize> {
        match self {
            ChunkPolicy::Unconstrained => None,
            ChunkPolicy::SingleUnitOnly => Some(1),
        }
    }
}

/// Release switch for dead-code elimination and minification.
///
/// Both passes always follow the same value. The gate is read once when a
/// build is invoked and handed to the orchestrator; jobs never consult the
/// environment themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationGate {
    #[default]
    Off,
    On,
}

impl OptimizationGate {
    /// Only the literal string `"true"` turns the gate on.
    pub fn from_signal(value: Option<&str>) -> Self {
        match value {
            Some("true") => OptimizationGate::On,
            _ => OptimizationGate::Off,
        }
    }

    pub fn from_env() -> Self {
        let value = std::env::var(OPTIMIZATION_ENV_VAR).ok();
        Self::from_signal(value.as_deref())
    }

    pub fn is_on(self) -> bool {
        matches!(self, OptimizationGate::On)
    }

    pub fn dead_code_elimination(self) -> bool {
        self.is_on()
    }

    pub fn minification(self) -> bool {
        self.is_on()
    }
}

impl fmt::Display for OptimizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationGate::Off => write!(f, "off"),
            OptimizationGate::On => write!(f, "on"),
        }
    }
}

/// Logical output name mapped to the source file it is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub name: String,
    pub source: PathBuf,
}

impl EntryPoint {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub dir: PathBuf,
    /// `[name]` is replaced with the entry's logical name.
    pub filename: String,
    pub format: OutputFormat,
    /// `[resource-path]` is replaced with the root-relative source path.
    pub source_path_template: String,
}

impl OutputDescriptor {
    pub fn file_name(&self, entry_name: &str) -> String {
        self.filename.replace("[name]", entry_name)
    }

    pub fn chunk_file_name(&self, entry_name: &str, index: usize) -> String {
        let main = self.file_name(entry_name);
        match main.strip_suffix(".js") {
            Some(stem) => format!("{}.{}.js", stem, index),
            None => format!("{}.{}", main, index),
        }
    }

    /// True for a chunk file name of `entry_name`, or its map, with any index.
    pub fn is_chunk_file_name(&self, entry_name: &str, candidate: &str) -> bool {
        let main = self.file_name(entry_name);
        let (stem, suffix) = match main.strip_suffix(".js") {
            Some(stem) => (stem, ".js"),
            None => (main.as_str(), ""),
        };
        let candidate = candidate.strip_suffix(".map").unwrap_or(candidate);

        candidate
            .strip_prefix(stem)
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|rest| rest.strip_suffix(suffix))
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
    }

    pub fn source_path(&self, root_relative: &str) -> String {
        self.source_path_template
            .replace("[resource-path]", root_relative)
    }
}

/// Complete build settings for one deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub name: String,
    pub runtime: RuntimeKind,
    pub root: PathBuf,
    pub entry: EntryPoint,
    pub output: OutputDescriptor,
    /// Package descriptor fields consulted in order when resolving a package.
    pub main_fields: Vec<String>,
    pub extensions: Vec<String>,
    pub chunking: ChunkPolicy,
    /// Logical module name to substitute path; wins over field resolution.
    pub alias: BTreeMap<String, String>,
    /// Modules left to the host loader.
    pub externals: Vec<String>,
}

impl TargetProfile {
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry.source)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    pub fn relative_to_root(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }
}

/// Compiler invocation descriptor carried by a transform rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Target language level, e.g. `es2020`.
    pub target: String,
    /// Project settings file. Opaque to dualpack.
    pub tsconfig: PathBuf,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            target: "es2020".to_string(),
            tsconfig: PathBuf::from("./tsconfig.json"),
        }
    }
}

/// Output of one compiler invocation.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub code: String,
    pub source_map: Option<String>,
}

/// A module in a job's dependency graph.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub id: String,
    pub path: PathBuf,
    pub module_type: ModuleType,
    pub code: String,
    pub source_map: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OutputFile {
    pub path: PathBuf,
    pub content: String,
    pub size: usize,
}

impl OutputFile {
    pub fn new(path: PathBuf, content: String) -> Self {
        let size = content.len();
        Self { path, content, size }
    }

    pub fn is_source_map(&self) -> bool {
        self.path
            .extension()
            .map(|ext| ext == "map")
            .unwrap_or(false)
    }

    pub fn fingerprint(&self) -> String {
        blake3::hash(self.content.as_bytes()).to_hex().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeShakingStats {
    pub total_modules: usize,
    pub total_exports: usize,
    pub removed_exports: usize,
    pub reduction_percentage: f64,
}

impl fmt::Display for TreeShakingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tree shaking: {} of {} exports removed across {} modules ({:.1}%)",
            self.removed_exports, self.total_exports, self.total_modules, self.reduction_percentage
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinificationStats {
    pub original_size: usize,
    pub minified_size: usize,
    pub reduction_percentage: f64,
}

impl MinificationStats {
    pub fn new(original_size: usize, minified_size: usize) -> Self {
        let reduction_percentage = if original_size == 0 {
            0.0
        } else {
            (original_size as f64 - minified_size as f64) / original_size as f64 * 100.0
        };
        Self {
            original_size,
            minified_size,
            reduction_percentage,
        }
    }
}

impl fmt::Display for MinificationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Minification: {:.1}% reduction ({} -> {} bytes)",
            self.reduction_percentage, self.original_size, self.minified_size
        )
    }
}

/// What a successful job wrote.
#[derive(Debug, Clone, Default)]
pub struct JobArtifacts {
    pub target: String,
    pub output_files: Vec<OutputFile>,
    pub modules: usize,
    pub tree_shaking_stats: Option<TreeShakingStats>,
    pub minification_stats: Option<MinificationStats>,
    pub build_time: std::time::Duration,
}

impl JobArtifacts {
    /// Files the host loads, i.e. everything except source maps.
    pub fn code_files(&self) -> impl Iterator<Item = &OutputFile> {
        self.output_files.iter().filter(|f| !f.is_source_map())
    }
}
