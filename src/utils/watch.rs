// Watch mode
// Monitors the source tree and re-runs every build job on change

use crate::core::interfaces::BuildService;
use crate::core::orchestrator::{BuildOrchestrator, ExecutionMode};
use crate::utils::{DualpackError, Logger, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const SOURCE_EXTENSIONS: &[&str] = &["ts", "js", "json", "mjs", "cjs"];

/// Configuration for watch mode
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub root: PathBuf,
    /// Debounce delay in milliseconds
    pub debounce_ms: u64,
    pub mode: ExecutionMode,
}

impl WatchConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            debounce_ms: 100,
            mode: ExecutionMode::Parallel,
        }
    }
}

/// Decides which file events trigger a rebuild.
///
/// Anything under a target's output directory is ignored so emitting
/// artifacts never retriggers the build.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    ignored_dirs: Vec<PathBuf>,
}

impl WatchFilter {
    pub fn new(ignored_dirs: Vec<PathBuf>) -> Self {
        Self { ignored_dirs }
    }

    pub fn for_orchestrator(orchestrator: &BuildOrchestrator) -> Self {
        Self::new(
            orchestrator
                .profiles()
                .iter()
                .map(|profile| profile.output_dir())
                .collect(),
        )
    }

    pub fn is_relevant(&self, path: &Path) -> bool {
        if self.ignored_dirs.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        let hidden = path.components().any(|component| match component {
            Component::Normal(name) => name == "node_modules" || name == ".git",
            _ => false,
        });
        if hidden {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
    }

    fn event_paths(&self, event: &Event) -> Vec<PathBuf> {
        match event.kind {
            EventKind::Access(_) | EventKind::Other => Vec::new(),
            _ => event
                .paths
                .iter()
                .filter(|path| self.is_relevant(path))
                .cloned()
                .collect(),
        }
    }
}

pub struct DualpackWatcher {
    config: WatchConfig,
    orchestrator: BuildOrchestrator,
    service: Arc<dyn BuildService>,
}

impl DualpackWatcher {
    pub fn new(
        config: WatchConfig,
        orchestrator: BuildOrchestrator,
        service: Arc<dyn BuildService>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            service,
        }
    }

    /// Initial build, then rebuild on every debounced batch of changes
    /// until Ctrl+C.
    pub async fn watch(&self) -> Result<()> {
        let filter = WatchFilter::for_orchestrator(&self.orchestrator);
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| DualpackError::Watch(format!("failed to create watcher: {}", e)))?;

        watcher
            .watch(&self.config.root, RecursiveMode::Recursive)
            .map_err(|e| {
                DualpackError::Watch(format!("failed to watch {}: {}", self.config.root.display(), e))
            })?;

        Logger::info(&format!("watching {} (Ctrl+C to stop)", self.config.root.display()));
        self.rebuild().await;

        let debounce = Duration::from_millis(self.config.debounce_ms);
        let mut changed: BTreeSet<PathBuf> = BTreeSet::new();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    Logger::info("stopping watch mode");
                    break;
                }
                event = rx.recv() => {
                    let Some(event) = event else {
                        Logger::warn("watch channel disconnected");
                        break;
                    };
                    changed.extend(filter.event_paths(&event));
                }
                _ = tokio::time::sleep(debounce), if !changed.is_empty() => {
                    Logger::info(&format!("{} file(s) changed, rebuilding", changed.len()));
                    for path in &changed {
                        Logger::debug(&format!("changed: {}", path.display()));
                    }
                    changed.clear();
                    self.rebuild().await;
                }
            }
        }

        Ok(())
    }

    async fn rebuild(&self) {
        let report = self
            .orchestrator
            .run(Arc::clone(&self.service), self.config.mode)
            .await;
        if !report.is_success() {
            Logger::error("build failed; waiting for changes");
        }
    }
}
