use crate::core::models::TargetProfile;
use crate::utils::{DualpackError, Logger, PathAliasResolver, Result};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Host built-in modules available to full-access targets.
static HOST_BUILTINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
        "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "fs/promises",
        "http", "http2", "https", "inspector", "module", "net", "os", "path", "path/posix",
        "path/win32", "perf_hooks", "process", "punycode", "querystring", "readline", "repl",
        "stream", "stream/promises", "string_decoder", "sys", "timers", "timers/promises", "tls",
        "trace_events", "tty", "url", "util", "util/types", "v8", "vm", "wasi", "worker_threads",
        "zlib",
    ]
    .into_iter()
    .collect()
});

/// Where an import request ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedModule {
    /// A file bundled into the job's output.
    File(PathBuf),
    /// Left to the host's own `require`.
    External(String),
}

/// Module resolution driven entirely by a target profile's data.
pub struct ProfileResolver<'p> {
    profile: &'p TargetProfile,
    /// Cache of package.json files
    package_cache: HashMap<PathBuf, Option<Value>>,
}

impl<'p> ProfileResolver<'p> {
    pub fn new(profile: &'p TargetProfile) -> Self {
        Self {
            profile,
            package_cache: HashMap::new(),
        }
    }

    /// Resolve `request` as imported from `requester`.
    ///
    /// An alias entry short-circuits every other rule.
    pub async fn resolve(&mut self, request: &str, requester: &Path) -> Result<ResolvedModule> {
        Logger::resolving(request, &requester.display().to_string());

        let aliases = PathAliasResolver::new(&self.profile.alias, &self.profile.root);
        if let Some(target) = aliases.resolve(request) {
            return self
                .resolve_file_or_directory(&target)
                .await
                .map(ResolvedModule::File)
                .ok_or_else(|| DualpackError::resolution(request, requester));
        }

        if self.is_external(request) {
            return Ok(ResolvedModule::External(request.to_string()));
        }

        if let Some(name) = request.strip_prefix("node:") {
            if self.profile.runtime.permits_host_builtins() {
                return Ok(ResolvedModule::External(request.to_string()));
            }
            Logger::debug(&format!(
                "host built-in '{}' is not available to {} target '{}'",
                name, self.profile.runtime, self.profile.name
            ));
            return Err(DualpackError::resolution(request, requester));
        }

        if is_host_builtin(request) && self.profile.runtime.permits_host_builtins() {
            return Ok(ResolvedModule::External(request.to_string()));
        }

        let resolved = if is_relative(request) {
            let base = requester.parent().unwrap_or(&self.profile.root);
            self.resolve_file_or_directory(&base.join(request)).await
        } else if Path::new(request).is_absolute() {
            self.resolve_file_or_directory(Path::new(request)).await
        } else {
            self.resolve_node_module(request, requester).await
        };

        match resolved {
            Some(path) => {
                Logger::resolved(request, &path.display().to_string());
                Ok(ResolvedModule::File(path))
            }
            None => Err(DualpackError::resolution(request, requester)),
        }
    }

    fn is_external(&self, request: &str) -> bool {
        self.profile.externals.iter().any(|ext| {
            request == ext
                || request
                    .strip_prefix(ext.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Walk up from the requester looking in each `node_modules`.
    async fn resolve_node_module(&mut self, request: &str, requester: &Path) -> Option<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(request);
        let mut current = requester.parent();

        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(&package_name);
            if package_dir.is_dir() {
                let entry = match &subpath {
                    Some(sub) => self.resolve_file_or_directory(&package_dir.join(sub)).await,
                    None => self.resolve_package_entry(&package_dir).await,
                };
                if entry.is_some() {
                    return entry;
                }
            }
            current = dir.parent();
        }

        None
    }

    /// Consult the profile's fields in order; the first one naming an
    /// existing file wins. Falls back to `index.<ext>`.
    async fn resolve_package_entry(&mut self, package_dir: &Path) -> Option<PathBuf> {
        if let Some(package) = self.read_package_json(&package_dir.join("package.json")).await {
            for field in &self.profile.main_fields {
                let Some(entry) = package.get(field).and_then(Value::as_str) else {
                    continue;
                };
                let candidate = package_dir.join(entry);
                if let Some(file) = self.resolve_as_file(&candidate) {
                    Logger::debug(&format!(
                        "package {} entry via '{}' field",
                        package_dir.display(),
                        field
                    ));
                    return Some(file);
                }
                if let Some(index) = self.resolve_index(&candidate) {
                    return Some(index);
                }
            }
        }

        self.resolve_index(package_dir)
    }

    async fn resolve_file_or_directory(&mut self, path: &Path) -> Option<PathBuf> {
        let path = normalize(path);
        if let Some(file) = self.resolve_as_file(&path) {
            return Some(file);
        }
        if path.is_dir() {
            return self.resolve_package_entry(&path).await;
        }
        None
    }

    /// Exact path, then each resolution extension appended.
    fn resolve_as_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(normalize(path));
        }

        self.profile.extensions.iter().find_map(|ext| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then(|| normalize(&candidate))
        })
    }

    fn resolve_index(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }
        self.profile.extensions.iter().find_map(|ext| {
            let index = dir.join(format!("index{}", ext));
            index.is_file().then(|| normalize(&index))
        })
    }

    /// Read and cache package.json
    async fn read_package_json(&mut self, path: &Path) -> Option<Value> {
        if let Some(cached) = self.package_cache.get(path) {
            return cached.clone();
        }

        let parsed = match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str::<Value>(&content)
                .ok()
                .filter(Value::is_object),
            Err(_) => None,
        };

        self.package_cache.insert(path.to_path_buf(), parsed.clone());
        parsed
    }
}

pub fn is_relative(request: &str) -> bool {
    request == "." || request == ".." || request.starts_with("./") || request.starts_with("../")
}

pub fn is_host_builtin(request: &str) -> bool {
    let name = request.strip_prefix("node:").unwrap_or(request);
    HOST_BUILTINS.contains(name)
}

/// Split `@scope/pkg/sub/path` into (`@scope/pkg`, `Some("sub/path")`).
pub fn parse_package_specifier(specifier: &str) -> (String, Option<String>) {
    let segments = if specifier.starts_with('@') { 2 } else { 1 };
    let mut parts = specifier.splitn(segments + 1, '/');
    let name: Vec<&str> = parts.by_ref().take(segments).collect();
    let subpath = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    (name.join("/"), subpath)
}

/// Collapse `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
